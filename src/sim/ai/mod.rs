//! Decision agent for computer-controlled players
//!
//! Agents decide only while resting on a tile center; mid-step they keep going
//! in the last direction they chose. Escaping danger overrides everything and
//! is re-checked every tick. The remaining behaviors come from the difficulty's
//! [`Policy`], with an inertial random walk as the final fallback.

pub mod policy;
pub mod search;

use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use self::policy::{Context, NormalPolicy, Policy, StrongPolicy, WeakPolicy};
use self::search::DangerField;
use super::bomb::BombEngine;
use super::map::TileMap;
use super::player::Player;
use crate::Direction;
use crate::consts::*;
use crate::error::Error;

/// Agent strength
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Weak,
    #[default]
    Normal,
    Strong,
}

impl FromStr for Difficulty {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weak" => Ok(Difficulty::Weak),
            "normal" => Ok(Difficulty::Normal),
            "strong" => Ok(Difficulty::Strong),
            _ => Err(Error::InvalidConfig(format!(
                "unknown difficulty '{}' (weak, normal, strong)",
                s
            ))),
        }
    }
}

/// What an agent wants to do this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Intent {
    pub dir: Option<Direction>,
    /// Drop a bomb on the current tile before moving
    pub place_bomb: bool,
}

impl Intent {
    pub const IDLE: Intent = Intent {
        dir: None,
        place_bomb: false,
    };

    pub fn walk(dir: Direction) -> Self {
        Self {
            dir: Some(dir),
            place_bomb: false,
        }
    }

    pub fn bomb_and_flee(dir: Direction) -> Self {
        Self {
            dir: Some(dir),
            place_bomb: true,
        }
    }

    pub fn bomb_in_place() -> Self {
        Self {
            dir: None,
            place_bomb: true,
        }
    }
}

/// Per-player decision state. Rebuilt every round.
#[derive(Debug, Clone)]
pub struct Agent {
    pub difficulty: Difficulty,
    /// Direction held while between tile centers
    pending_dir: Option<Direction>,
    /// Bias for the inertial walk
    last_move_dir: Option<Direction>,
    /// Time since the round started playing
    game_time: f32,
}

impl Agent {
    pub fn new(difficulty: Difficulty) -> Self {
        Self {
            difficulty,
            pending_dir: None,
            last_move_dir: None,
            game_time: 0.0,
        }
    }

    pub fn decide(
        &mut self,
        player: &Player,
        players: &[Player],
        map: &TileMap,
        bombs: &BombEngine,
        dt: f32,
        rng: &mut impl Rng,
    ) -> Intent {
        self.game_time += dt;
        let here = player.tile();

        let danger = DangerField::new(map, bombs);
        if danger.contains(here) {
            if let Some(dir) = search::find_safe_direction(map, bombs, &danger, here) {
                self.pending_dir = Some(dir);
                return Intent::walk(dir);
            }
            let dirs = search::walkable_dirs(map, bombs, here);
            if dirs.is_empty() {
                return Intent::IDLE;
            }
            return Intent::walk(dirs[rng.random_range(0..dirs.len())]);
        }

        if !player.is_at_target() {
            return Intent {
                dir: self.pending_dir,
                place_bomb: false,
            };
        }

        let can_bomb = self.game_time > AGENT_BOMB_DELAY_SECS;
        let walkable = search::walkable_dirs(map, bombs, here);

        // Boxed in: blasting a neighbor block is the only way out
        if can_bomb && walkable.is_empty() && search::adjacent_block(map, here).is_some() {
            return Intent::bomb_in_place();
        }

        let ctx = Context {
            player,
            players,
            map,
            bombs,
            can_bomb,
        };
        let planned = match self.difficulty {
            Difficulty::Weak => WeakPolicy.plan(&ctx, rng),
            Difficulty::Normal => NormalPolicy.plan(&ctx, rng),
            Difficulty::Strong => StrongPolicy.plan(&ctx, rng),
        };

        match planned {
            Some(intent) => {
                if intent.dir.is_some() {
                    self.pending_dir = intent.dir;
                }
                intent
            }
            None => self.inertial_move(&walkable, rng),
        }
    }

    /// Random walk that prefers to keep going and avoids turning straight back
    fn inertial_move(&mut self, walkable: &[Direction], rng: &mut impl Rng) -> Intent {
        if walkable.is_empty() {
            self.pending_dir = None;
            return Intent::IDLE;
        }

        if let Some(last) = self.last_move_dir {
            if walkable.contains(&last) && rng.random::<f32>() < 0.70 {
                self.pending_dir = Some(last);
                return Intent::walk(last);
            }
        }

        let forward: Vec<Direction> = walkable
            .iter()
            .copied()
            .filter(|d| Some(d.reverse()) != self.last_move_dir)
            .collect();
        let candidates: &[Direction] = if forward.is_empty() { walkable } else { &forward };
        let dir = candidates[rng.random_range(0..candidates.len())];
        self.pending_dir = Some(dir);
        self.last_move_dir = Some(dir);
        Intent::walk(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::map::Tile;
    use glam::IVec2;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn lone_agent(pos: IVec2) -> Vec<Player> {
        vec![
            Player::new(0, pos),
            Player::new(1, IVec2::new(11, 9)),
        ]
    }

    #[test]
    fn test_flees_from_bomb_blast() {
        let map = TileMap::open(0);
        let mut bombs = BombEngine::new();
        bombs.place(IVec2::new(3, 1), 1, 2, 1);
        let players = lone_agent(IVec2::new(1, 1));
        let mut agent = Agent::new(Difficulty::Strong);
        let mut rng = Pcg32::seed_from_u64(0);
        let intent = agent.decide(&players[0], &players, &map, &bombs, 0.016, &mut rng);
        // Only way out of the row is down the left column
        assert_eq!(intent, Intent::walk(Direction::Down));
    }

    #[test]
    fn test_mid_step_keeps_pending_direction() {
        let map = TileMap::open(0);
        let bombs = BombEngine::new();
        let mut players = lone_agent(IVec2::new(1, 1));
        let mut agent = Agent::new(Difficulty::Normal);
        let mut rng = Pcg32::seed_from_u64(3);

        let first = agent.decide(&players[0], &players, &map, &bombs, 0.016, &mut rng);
        let dir = first.dir.unwrap();
        players[0].move_to_tile(IVec2::new(1, 1) + dir.delta(), 0.05);
        assert!(!players[0].is_at_target());

        let next = agent.decide(&players[0], &players, &map, &bombs, 0.016, &mut rng);
        assert_eq!(next, Intent::walk(dir));
    }

    #[test]
    fn test_forced_bomb_when_boxed_in() {
        let mut map = TileMap::open(0);
        map.set_tile(IVec2::new(2, 1), Tile::Block);
        map.set_tile(IVec2::new(1, 2), Tile::Block);
        let bombs = BombEngine::new();
        let players = lone_agent(IVec2::new(1, 1));
        let mut agent = Agent::new(Difficulty::Weak);
        let mut rng = Pcg32::seed_from_u64(0);

        let early = agent.decide(&players[0], &players, &map, &bombs, 1.0, &mut rng);
        assert!(!early.place_bomb);
        let late = agent.decide(&players[0], &players, &map, &bombs, 3.0, &mut rng);
        assert_eq!(late, Intent::bomb_in_place());
    }

    #[test]
    fn test_inertia_never_reverses_when_avoidable() {
        let mut agent = Agent::new(Difficulty::Weak);
        let mut rng = Pcg32::seed_from_u64(11);
        agent.last_move_dir = Some(Direction::Right);
        for _ in 0..200 {
            let intent = agent.inertial_move(&[Direction::Left, Direction::Up], &mut rng);
            assert_ne!(intent.dir, Some(Direction::Left));
            agent.last_move_dir = Some(Direction::Right);
        }
        // Only the reverse is open
        let intent = agent.inertial_move(&[Direction::Left], &mut rng);
        assert_eq!(intent.dir, Some(Direction::Left));
        assert_eq!(agent.inertial_move(&[], &mut rng), Intent::IDLE);
    }

    #[test]
    fn test_agents_wander_without_targets() {
        // Nothing to chase: a bare arena with no other active player
        let map = TileMap::open(0);
        let bombs = BombEngine::new();
        let player = Player::new(0, IVec2::new(5, 5));
        let players = vec![player.clone()];
        let mut agent = Agent::new(Difficulty::Normal);
        let mut rng = Pcg32::seed_from_u64(5);
        let intent = agent.decide(&player, &players, &map, &bombs, 0.016, &mut rng);
        assert!(intent.dir.is_some());
        assert!(!intent.place_bomb);
    }

    #[test]
    fn test_difficulty_parses_from_cli_text() {
        assert_eq!("weak".parse::<Difficulty>().unwrap(), Difficulty::Weak);
        assert_eq!("Normal".parse::<Difficulty>().unwrap(), Difficulty::Normal);
        assert_eq!(" STRONG ".parse::<Difficulty>().unwrap(), Difficulty::Strong);
        assert!(matches!(
            "hard".parse::<Difficulty>(),
            Err(Error::InvalidConfig(msg)) if msg.contains("hard")
        ));
    }
}
