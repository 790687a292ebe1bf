//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only (delta-time clamped per tick)
//! - Seeded RNG only
//! - Stable iteration order (by player id, then insertion order)
//! - No presentation or transport dependencies

pub mod ai;
pub mod bomb;
pub mod map;
pub mod misobon;
pub mod player;
pub mod state;
pub mod tick;

pub use ai::{Agent, Difficulty, Intent};
pub use bomb::{Blast, Bomb, BombEngine, Explosion, HitTest};
pub use map::{Item, ItemKind, Tile, TileMap};
pub use misobon::{Ghost, GhostRoster, Side};
pub use player::{Bump, Player};
pub use state::{GameEvent, MatchPhase, MatchState, Role};
pub use tick::{TickInput, tick};
