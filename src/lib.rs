//! Blast Arena - a 2-4 player grid bomb arena
//!
//! Core modules:
//! - `sim`: Deterministic match simulation (map, bombs, movement, AI, rounds)
//! - `net`: Host-authoritative replication protocol and transport seam
//! - `config`: Match configuration
//! - `error`: Error type for fallible boundaries

pub mod config;
pub mod error;
pub mod net;
pub mod sim;

pub use config::{MatchConfig, Slot};
pub use error::{Error, Result};

use glam::{IVec2, Vec2};
use serde::{Deserialize, Serialize};

/// Game configuration constants
pub mod consts {
    /// Grid width in tiles
    pub const COLS: i32 = 13;
    /// Grid height in tiles
    pub const ROWS: i32 = 11;
    /// Players per match
    pub const MAX_PLAYERS: usize = 4;

    /// Fixed simulation timestep for the headless runner (60 Hz)
    pub const SIM_DT: f32 = 1.0 / 60.0;
    /// Largest delta-time a single tick will integrate (avoids big jumps after stalls)
    pub const MAX_DT: f32 = 0.05;

    /// Bomb fuse in milliseconds
    pub const BOMB_TIMER_MS: f32 = 3000.0;
    /// Lifetime of an explosion cell in milliseconds
    pub const EXPLOSION_MS: f32 = 500.0;
    /// Kicked bomb speed (tiles/sec)
    pub const BOMB_KICK_SPEED: f32 = 5.0;
    pub const DEFAULT_FIRE_POWER: u32 = 1;
    pub const DEFAULT_BOMB_COUNT: u32 = 1;

    /// Player speed (tiles/sec)
    pub const PLAYER_SPEED: f32 = 3.5;
    /// Half extent of the player collision box (tiles)
    pub const PLAYER_HALF_SIZE: f32 = 0.3;
    /// Stick deflection (0..1) below which directional input is ignored
    pub const INPUT_DEAD_ZONE: f32 = 0.22;
    /// Tile-snapped movement arrival tolerance
    pub const SNAP_EPSILON: f32 = 0.05;

    /// Item drop chance when a block is destroyed
    pub const ITEM_DROP_RATE: f32 = 0.5;
    /// Destructible block density on generation
    pub const BLOCK_DENSITY: f32 = 0.75;

    /// Ghost (misobon) loadout and patrol speed
    pub const MISOBON_FIRE_POWER: u32 = 1;
    pub const MISOBON_BOMB_COUNT: usize = 1;
    pub const MISOBON_SPEED: f32 = 2.5;
    /// Per-tick chance that an agent-owned ghost lobs a bomb
    pub const MISOBON_THROW_CHANCE: f32 = 0.02;

    /// Sudden death starts when this many seconds remain
    pub const SUDDEN_DEATH_SECS: f32 = 30.0;
    /// Interval between falling blocks (ms)
    pub const FALLING_BLOCK_INTERVAL_MS: f32 = 300.0;

    pub const DEFAULT_TIME_LIMIT: f32 = 150.0;
    /// Round wins needed to take the match
    pub const WIN_POINTS: u32 = 2;
    pub const COUNTDOWN_SECS: f32 = 3.0;
    pub const ROUND_END_SECS: f32 = 3.0;

    /// Snapshots per second sent by the authority
    pub const SYNC_RATE_HZ: f32 = 20.0;

    /// Agents hold their first bomb until this much match time has passed
    pub const AGENT_BOMB_DELAY_SECS: f32 = 3.0;
    /// BFS radius when escaping danger
    pub const DANGER_SEARCH_STEPS: u32 = 10;
    /// BFS radius for item / block / enemy searches
    pub const SEARCH_STEPS: u32 = 25;
}

/// Spawn corners, indexed by player id
pub const SPAWN_POSITIONS: [IVec2; consts::MAX_PLAYERS] = [
    IVec2::new(1, 1),
    IVec2::new(consts::COLS - 2, consts::ROWS - 2),
    IVec2::new(consts::COLS - 2, 1),
    IVec2::new(1, consts::ROWS - 2),
];

/// Cardinal direction on the grid (y grows downward)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Search order used everywhere a stable direction order matters
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    #[inline]
    pub fn delta(self) -> IVec2 {
        match self {
            Direction::Up => IVec2::new(0, -1),
            Direction::Down => IVec2::new(0, 1),
            Direction::Left => IVec2::new(-1, 0),
            Direction::Right => IVec2::new(1, 0),
        }
    }

    pub fn reverse(self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    /// Direction of a unit offset; x wins when both axes are set
    pub fn from_offset(offset: IVec2) -> Option<Direction> {
        if offset.x > 0 {
            Some(Direction::Right)
        } else if offset.x < 0 {
            Some(Direction::Left)
        } else if offset.y > 0 {
            Some(Direction::Down)
        } else if offset.y < 0 {
            Some(Direction::Up)
        } else {
            None
        }
    }
}

/// Tile containing a continuous position (nearest tile center)
#[inline]
pub fn tile_of(pos: Vec2) -> IVec2 {
    pos.round().as_ivec2()
}

/// Manhattan distance between two tiles
#[inline]
pub fn manhattan(a: IVec2, b: IVec2) -> i32 {
    let d = (a - b).abs();
    d.x + d.y
}
