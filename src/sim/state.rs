//! Match state and the round state machine
//!
//! `MatchState` owns everything a running match needs: players, the current
//! round's map, bombs and ghosts, the seeded RNG and the phase. Phase changes
//! go through [`MatchState::transition`], which checks the transition table
//! and runs each phase's entry actions.

use glam::IVec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::ai::{Agent, Difficulty};
use super::bomb::BombEngine;
use super::map::{ItemKind, TileMap};
use super::misobon::GhostRoster;
use super::player::{Bump, Player};
use crate::SPAWN_POSITIONS;
use crate::config::{MatchConfig, Slot};
use crate::consts::*;

/// Match / round phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    /// Neutral state: no round running
    #[default]
    Waiting,
    Countdown,
    Playing,
    /// Last stretch: ghosts are out and blocks fall
    SuddenDeath,
    /// Result hold after a round
    RoundEnd,
    MatchEnd,
}

impl MatchPhase {
    /// The transition table. Any phase may fall back to `Waiting` (abort).
    pub fn can_transition_to(self, next: MatchPhase) -> bool {
        use MatchPhase::*;
        matches!(
            (self, next),
            (_, Waiting)
                | (Waiting, Countdown)
                | (RoundEnd, Countdown)
                | (MatchEnd, Countdown)
                | (Countdown, Playing)
                | (Playing, SuddenDeath)
                | (Playing, RoundEnd)
                | (SuddenDeath, RoundEnd)
                | (RoundEnd, MatchEnd)
        )
    }

    /// Phases in which the arena is live
    pub fn is_live(self) -> bool {
        matches!(self, MatchPhase::Playing | MatchPhase::SuddenDeath)
    }
}

/// Which side of a networked match this process is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Runs the rules (host or solo)
    Authority,
    /// Mirrors the authority's snapshots, moves only its own player
    Replica,
}

/// Something that happened during a tick, for the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    RoundStarted { round: u32 },
    PhaseChanged { from: MatchPhase, to: MatchPhase },
    BombPlaced { player_id: u8, pos: IVec2 },
    Exploded { owner_id: u8, origin: IVec2, cells: usize },
    ItemPicked { player_id: u8, kind: ItemKind },
    BecameGhost { player_id: u8 },
    Swapped { ghost_id: u8, hit_id: u8 },
    Died { player_id: u8 },
    SuddenDeath,
    BlockDropped { pos: IVec2 },
    RoundEnded { winner: Option<u8> },
    MatchEnded { champion: u8 },
    Disconnected,
}

/// A whole match, one process' view of it
#[derive(Debug, Clone)]
pub struct MatchState {
    pub config: MatchConfig,
    pub role: Role,
    /// Indexed by player id
    pub players: Vec<Player>,
    /// Decision state for agent slots (authority only), indexed by player id
    pub agents: Vec<Option<Agent>>,
    pub map: TileMap,
    pub bombs: BombEngine,
    pub ghosts: GhostRoster,
    pub rng: Pcg32,
    pub phase: MatchPhase,
    /// Round clock (seconds)
    pub time_remaining: f32,
    /// Rounds started so far
    pub round: u32,
    /// Winner of the last finished round (`None` for a draw)
    pub round_winner: Option<u8>,
    pub(crate) countdown: f32,
    pub(crate) round_end_timer: f32,
    pub(crate) falling_timer: f32,
    /// Bump kick the local player owes the authority this tick (replica only)
    pub(crate) pending_bump: Option<Bump>,
    /// Accumulated events; drained by the consumer
    pub events: Vec<GameEvent>,
}

impl MatchState {
    pub fn new(config: MatchConfig, role: Role) -> Self {
        let players = (0..MAX_PLAYERS)
            .map(|i| Player::new(i as u8, SPAWN_POSITIONS[i]))
            .collect();
        let rng = Pcg32::seed_from_u64(config.seed);
        let map = TileMap::open(config.seed);
        Self {
            time_remaining: config.time_limit,
            config,
            role,
            players,
            agents: vec![None; MAX_PLAYERS],
            map,
            bombs: BombEngine::new(),
            ghosts: GhostRoster::new(),
            rng,
            phase: MatchPhase::Waiting,
            round: 0,
            round_winner: None,
            countdown: 0.0,
            round_end_timer: 0.0,
            falling_timer: 0.0,
            pending_bump: None,
            events: Vec::new(),
        }
    }

    pub fn is_authority(&self) -> bool {
        self.role == Role::Authority
    }

    /// Id of the player driven by this process' input
    pub fn local_player(&self) -> Option<u8> {
        self.config.local_player()
    }

    /// Whether slot `id` is driven by an agent
    pub fn is_agent(&self, id: u8) -> bool {
        self.agent_difficulty(id).is_some()
    }

    pub fn agent_difficulty(&self, id: u8) -> Option<Difficulty> {
        self.config
            .slots
            .get(id as usize)
            .and_then(|slot| slot.difficulty())
    }

    pub fn player(&self, id: u8) -> Option<&Player> {
        self.players.get(id as usize)
    }

    pub fn player_mut(&mut self, id: u8) -> Option<&mut Player> {
        self.players.get_mut(id as usize)
    }

    /// Take the accumulated events
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Move to `next` if the table allows it, running the entry actions.
    /// Returns false (and changes nothing) for an illegal transition.
    pub fn transition(&mut self, next: MatchPhase) -> bool {
        let from = self.phase;
        if from == next {
            return true;
        }
        if !from.can_transition_to(next) {
            log::warn!("Rejected phase transition {:?} -> {:?}", from, next);
            return false;
        }
        self.phase = next;
        log::info!("Phase {:?} -> {:?}", from, next);
        self.events.push(GameEvent::PhaseChanged { from, to: next });

        match next {
            MatchPhase::Waiting => {
                self.bombs.clear();
                self.ghosts.clear();
            }
            MatchPhase::Countdown => self.countdown = COUNTDOWN_SECS,
            MatchPhase::SuddenDeath => {
                self.ghosts.eliminate_all(&mut self.players);
                self.falling_timer = 0.0;
                self.events.push(GameEvent::SuddenDeath);
            }
            MatchPhase::RoundEnd => self.round_end_timer = ROUND_END_SECS,
            MatchPhase::Playing | MatchPhase::MatchEnd => {}
        }
        true
    }

    /// Authority: generate a fresh map and start the next round.
    /// Starting from match end begins a new match (scores cleared).
    pub fn start_round(&mut self) {
        if self.phase == MatchPhase::MatchEnd {
            for player in &mut self.players {
                player.score = 0;
            }
        }
        let map_seed: u64 = self.rng.random();
        self.begin_round(TileMap::generate(map_seed));
    }

    /// Reset everything round-scoped around `map` and enter the countdown.
    /// Used directly by replicas, which receive the map from the authority.
    pub fn begin_round(&mut self, map: TileMap) {
        self.transition(MatchPhase::Waiting);
        self.map = map;
        self.bombs.clear();
        self.ghosts.clear();
        for (i, player) in self.players.iter_mut().enumerate() {
            player.reset(SPAWN_POSITIONS[i]);
        }
        self.agents = self
            .config
            .slots
            .iter()
            .map(|slot| match (self.role, slot) {
                (Role::Authority, Slot::Agent(d)) => Some(Agent::new(*d)),
                _ => None,
            })
            .collect();
        self.time_remaining = self.config.time_limit;
        self.falling_timer = 0.0;
        self.round_winner = None;
        self.round += 1;
        self.events.push(GameEvent::RoundStarted { round: self.round });
        log::info!("Round {} starting", self.round);
        self.transition(MatchPhase::Countdown);
    }

    /// Close the round. Only valid while the arena is live; the winner scores.
    pub fn end_round(&mut self, winner: Option<u8>) -> bool {
        if !self.phase.is_live() {
            return false;
        }
        if let Some(player) = winner.and_then(|id| self.player_mut(id)) {
            player.score += 1;
        }
        self.round_winner = winner;
        match winner {
            Some(id) => log::info!("Round {} won by player {}", self.round, id),
            None => log::info!("Round {} is a draw", self.round),
        }
        self.events.push(GameEvent::RoundEnded { winner });
        self.transition(MatchPhase::RoundEnd)
    }

    /// First player at the win threshold, if any
    pub fn champion(&self) -> Option<u8> {
        self.players
            .iter()
            .find(|p| p.score >= self.config.win_points)
            .map(|p| p.id)
    }

    /// After the result hold: finish the match or start the next round
    pub fn advance_after_round(&mut self) {
        match self.champion() {
            Some(champion) => {
                if self.transition(MatchPhase::MatchEnd) {
                    log::info!("Player {} takes the match", champion);
                    self.events.push(GameEvent::MatchEnded { champion });
                }
            }
            None => self.start_round(),
        }
    }

    /// Tear the round down and return to the neutral state
    pub fn abort(&mut self) {
        self.transition(MatchPhase::Waiting);
        self.bombs.clear();
        self.ghosts.clear();
    }

    /// Place a bomb under an active player, capacity permitting
    pub fn place_bomb(&mut self, player_id: u8) -> bool {
        let Some((pos, power, capacity)) = self
            .player(player_id)
            .filter(|p| p.is_active())
            .map(|p| (p.tile(), p.fire_power, p.max_bombs))
        else {
            return false;
        };
        let placed = self.bombs.place(pos, player_id, power, capacity);
        if placed {
            log::debug!("Player {} placed a bomb at {}", player_id, pos);
            self.events.push(GameEvent::BombPlaced { player_id, pos });
        }
        placed
    }

    /// A ghost lobs a bomb at its aim tile
    pub fn throw_ghost_bomb(&mut self, player_id: u8) -> bool {
        let Some(target) = self.ghosts.get(player_id).map(|g| g.target) else {
            return false;
        };
        let placed = self.bombs.place_ghost_bomb(target, player_id, &self.map);
        if placed {
            self.events.push(GameEvent::BombPlaced {
                player_id,
                pos: target,
            });
        }
        placed
    }

    /// Collect any item under the player
    pub fn pick_up(&mut self, player_id: u8) {
        let Some(player) = self.players.get_mut(player_id as usize) else {
            return;
        };
        if let Some(kind) = player.pick_up(&mut self.map) {
            self.events.push(GameEvent::ItemPicked { player_id, kind });
        }
    }
}
