//! Difficulty-specific behavior rankings
//!
//! Each policy walks its ranked behaviors and returns the first that applies.
//! `None` hands control to the inertial walk in [`super::Agent`].

use glam::IVec2;
use rand::Rng;

use super::Intent;
use super::search;
use crate::sim::bomb::BombEngine;
use crate::sim::map::TileMap;
use crate::sim::player::Player;

/// Read-only view of the world for one decision
pub struct Context<'a> {
    pub player: &'a Player,
    pub players: &'a [Player],
    pub map: &'a TileMap,
    pub bombs: &'a BombEngine,
    /// Opening grace period is over
    pub can_bomb: bool,
}

impl Context<'_> {
    fn here(&self) -> IVec2 {
        self.player.tile()
    }

    fn toward_item(&self) -> Option<Intent> {
        search::toward_item(self.map, self.bombs, self.here()).map(Intent::walk)
    }

    fn toward_block(&self) -> Option<Intent> {
        search::toward_block(self.map, self.bombs, self.here()).map(Intent::walk)
    }

    fn pursue(&self, enemy: &Player) -> Option<Intent> {
        search::toward(self.map, self.bombs, self.here(), enemy.tile()).map(Intent::walk)
    }

    fn enemy(&self) -> Option<&Player> {
        search::nearest_enemy(self.player, self.players)
    }

    fn distance_to(&self, enemy: &Player) -> i32 {
        crate::manhattan(self.here(), enemy.tile())
    }

    fn next_to_block(&self) -> bool {
        search::adjacent_block(self.map, self.here()).is_some()
    }

    fn threatens(&self, enemy: &Player) -> bool {
        search::in_blast_line(self.map, self.here(), self.player.fire_power, enemy.tile())
    }

    /// Drop a bomb here, but only with a proven way out
    fn bomb_and_flee(&self) -> Option<Intent> {
        if !self.can_bomb {
            return None;
        }
        search::safe_bomb_escape(self.map, self.bombs, self.here(), self.player.fire_power)
            .map(|route| Intent::bomb_and_flee(route.first_step))
    }

    /// Bomb the enemy when within `range` and either lined up or within `close`
    fn attack(&self, enemy: &Player, range: i32, close: i32) -> Option<Intent> {
        let dist = self.distance_to(enemy);
        if !self.can_bomb || dist > range {
            return None;
        }
        if self.threatens(enemy) || dist <= close {
            self.bomb_and_flee()
        } else {
            None
        }
    }
}

/// A ranked list of behaviors for one difficulty
pub trait Policy {
    fn plan<R: Rng>(&self, ctx: &Context<'_>, rng: &mut R) -> Option<Intent>;
}

/// Timid: mostly wanders after items and blocks, rarely attacks
pub struct WeakPolicy;

impl Policy for WeakPolicy {
    fn plan<R: Rng>(&self, ctx: &Context<'_>, rng: &mut R) -> Option<Intent> {
        if rng.random::<f32>() < 0.35 {
            if let Some(intent) = ctx.toward_item() {
                return Some(intent);
            }
        }

        if ctx.can_bomb && ctx.next_to_block() && rng.random::<f32>() < 0.20 {
            if let Some(intent) = ctx.bomb_and_flee() {
                return Some(intent);
            }
        }

        let enemy = ctx.enemy();
        if let Some(enemy) = enemy {
            if ctx.can_bomb && rng.random::<f32>() < 0.10 && ctx.distance_to(enemy) <= 4 {
                if let Some(intent) = ctx.bomb_and_flee() {
                    return Some(intent);
                }
            }
        }

        if rng.random::<f32>() < 0.5 {
            if let Some(intent) = ctx.toward_block() {
                return Some(intent);
            }
        }

        enemy.and_then(|e| ctx.pursue(e))
    }
}

/// Balanced: grabs items, attacks at mid range, otherwise digs
pub struct NormalPolicy;

impl Policy for NormalPolicy {
    fn plan<R: Rng>(&self, ctx: &Context<'_>, _rng: &mut R) -> Option<Intent> {
        if let Some(intent) = ctx.toward_item() {
            return Some(intent);
        }

        let enemy = ctx.enemy();
        if let Some(enemy) = enemy {
            if let Some(intent) = ctx.attack(enemy, 5, 3) {
                return Some(intent);
            }
            if ctx.distance_to(enemy) > 3 {
                if let Some(intent) = ctx.pursue(enemy) {
                    return Some(intent);
                }
            }
        }

        if ctx.next_to_block() {
            if let Some(intent) = ctx.bomb_and_flee() {
                return Some(intent);
            }
        }

        ctx.toward_block()
            .or_else(|| enemy.and_then(|e| ctx.pursue(e)))
    }
}

/// Hunter: attacks from longer range and always closes in
pub struct StrongPolicy;

impl Policy for StrongPolicy {
    fn plan<R: Rng>(&self, ctx: &Context<'_>, _rng: &mut R) -> Option<Intent> {
        if let Some(enemy) = ctx.enemy() {
            if let Some(intent) = ctx.attack(enemy, 6, 4) {
                return Some(intent);
            }
            if let Some(intent) = ctx.pursue(enemy) {
                return Some(intent);
            }
        }

        if let Some(intent) = ctx.toward_item() {
            return Some(intent);
        }

        if ctx.next_to_block() {
            if let Some(intent) = ctx.bomb_and_flee() {
                return Some(intent);
            }
        }

        ctx.toward_block()
    }
}
