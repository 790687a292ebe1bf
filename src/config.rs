//! Match configuration
//!
//! Loaded from a JSON file or built from defaults; the native runner lets CLI
//! flags override individual fields.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_TIME_LIMIT, MAX_PLAYERS, SYNC_RATE_HZ, WIN_POINTS};
use crate::error::{Error, Result};
use crate::sim::Difficulty;

/// Who drives a player slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    /// Driven by this process' input
    Local,
    /// Driven by the other endpoint's reported input
    Remote,
    /// Driven by the decision agent
    Agent(Difficulty),
}

impl Slot {
    pub fn difficulty(&self) -> Option<Difficulty> {
        match self {
            Slot::Agent(d) => Some(*d),
            _ => None,
        }
    }
}

/// Settings for one match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Seed for map generation and agent decisions
    pub seed: u64,
    /// Round length in seconds
    pub time_limit: f32,
    /// Round wins needed to take the match
    pub win_points: u32,
    /// Snapshot rate (authority only)
    pub sync_rate_hz: f32,
    /// Slot assignment, indexed by player id
    pub slots: [Slot; MAX_PLAYERS],
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self::solo(Difficulty::Normal, Difficulty::Normal, Difficulty::Normal)
    }
}

impl MatchConfig {
    /// One local player against three agents
    pub fn solo(cpu1: Difficulty, cpu2: Difficulty, cpu3: Difficulty) -> Self {
        Self {
            seed: 0,
            time_limit: DEFAULT_TIME_LIMIT,
            win_points: WIN_POINTS,
            sync_rate_hz: SYNC_RATE_HZ,
            slots: [
                Slot::Local,
                Slot::Agent(cpu1),
                Slot::Agent(cpu2),
                Slot::Agent(cpu3),
            ],
        }
    }

    /// Two networked humans plus two agents. `local_id` is 0 on the host, 1 on
    /// the peer; anything above 1 is treated as the peer.
    pub fn networked(local_id: u8, cpu1: Difficulty, cpu2: Difficulty) -> Self {
        let mut slots = [Slot::Remote, Slot::Remote, Slot::Agent(cpu1), Slot::Agent(cpu2)];
        slots[usize::from(local_id.min(1))] = Slot::Local;
        Self {
            slots,
            ..Self::solo(cpu1, cpu1, cpu2)
        }
    }

    /// Four agents, no local player (headless demo)
    pub fn all_agents(difficulty: Difficulty) -> Self {
        Self {
            slots: [Slot::Agent(difficulty); MAX_PLAYERS],
            ..Self::default()
        }
    }

    /// Parse from JSON text, validating the result
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json(&text)?;
        log::info!("Loaded match config from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.time_limit <= 0.0 {
            return Err(Error::InvalidConfig("time_limit must be positive".into()));
        }
        if self.win_points == 0 {
            return Err(Error::InvalidConfig("win_points must be at least 1".into()));
        }
        if self.sync_rate_hz <= 0.0 {
            return Err(Error::InvalidConfig("sync_rate_hz must be positive".into()));
        }
        if self.slots.iter().filter(|s| **s == Slot::Local).count() > 1 {
            return Err(Error::InvalidConfig("at most one local slot".into()));
        }
        Ok(())
    }

    /// Id of the locally controlled player, if any
    pub fn local_player(&self) -> Option<u8> {
        self.slots
            .iter()
            .position(|s| *s == Slot::Local)
            .map(|i| i as u8)
    }

    /// Difficulties of the agents in slots 2 and 3 (the pair carried by `start_round`)
    pub fn cpu_pair(&self) -> (Option<Difficulty>, Option<Difficulty>) {
        (self.slots[2].difficulty(), self.slots[3].difficulty())
    }
}
