//! Player entities: continuous and tile-snapped movement, collision, powerups

use glam::{IVec2, Vec2};
use serde::{Deserialize, Serialize};

use super::bomb::BombEngine;
use super::map::{ItemKind, TileMap};
use crate::consts::*;
use crate::{Direction, manhattan, tile_of};

/// A bomb a kick-capable player walked into. Movement only reports it; the
/// authority decides whether the bomb actually slides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bump {
    pub tile: IVec2,
    pub dir: Direction,
}

/// A player (human or agent)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: u8,
    /// Continuous position in tile units (tile centers are integers)
    pub pos: Vec2,
    pub alive: bool,
    /// Eliminated but patrolling the boundary as a ghost
    pub is_misobon: bool,
    pub fire_power: u32,
    pub max_bombs: u32,
    pub has_kick: bool,
    pub direction: Direction,
    pub moving: bool,
    /// Round wins, carried across rounds
    pub score: u32,
    /// Destination of tile-snapped movement
    pub target_tile: IVec2,
}

impl Player {
    pub fn new(id: u8, spawn: IVec2) -> Self {
        let mut player = Self {
            id,
            pos: spawn.as_vec2(),
            alive: true,
            is_misobon: false,
            fire_power: DEFAULT_FIRE_POWER,
            max_bombs: DEFAULT_BOMB_COUNT,
            has_kick: false,
            direction: Direction::Down,
            moving: false,
            score: 0,
            target_tile: spawn,
        };
        player.reset(spawn);
        player
    }

    /// Reset the per-round fields. Score is kept.
    pub fn reset(&mut self, spawn: IVec2) {
        self.pos = spawn.as_vec2();
        self.alive = true;
        self.is_misobon = false;
        self.reset_loadout();
        self.direction = Direction::Down;
        self.moving = false;
        self.target_tile = spawn;
    }

    fn reset_loadout(&mut self) {
        self.fire_power = DEFAULT_FIRE_POWER;
        self.max_bombs = DEFAULT_BOMB_COUNT;
        self.has_kick = false;
    }

    /// Tile the player currently counts as standing on
    pub fn tile(&self) -> IVec2 {
        tile_of(self.pos)
    }

    /// Alive and on the field (not a ghost)
    pub fn is_active(&self) -> bool {
        self.alive && !self.is_misobon
    }

    pub fn die(&mut self) {
        self.alive = false;
    }

    pub fn become_ghost(&mut self) {
        self.alive = false;
        self.is_misobon = true;
    }

    /// Return from ghost duty at `pos` with the default loadout
    pub fn revive_at(&mut self, pos: Vec2) {
        self.alive = true;
        self.is_misobon = false;
        self.pos = pos;
        self.target_tile = tile_of(pos);
        self.reset_loadout();
    }

    pub fn apply_item(&mut self, kind: ItemKind) {
        match kind {
            ItemKind::FireUp => self.fire_power += 1,
            ItemKind::BombUp => self.max_bombs += 1,
            ItemKind::Kick => self.has_kick = true,
        }
    }

    /// Collect the item under the player, if any
    pub fn pick_up(&mut self, map: &mut TileMap) -> Option<ItemKind> {
        if !self.is_active() {
            return None;
        }
        let kind = map.take_item_at(self.tile())?;
        self.apply_item(kind);
        log::debug!("Player {} picked up {:?}", self.id, kind);
        Some(kind)
    }

    /// Analog movement for human players.
    ///
    /// Axis-separated: X is resolved first, then Y, each probing the tile(s)
    /// under the leading edge of a box of half-width `PLAYER_HALF_SIZE`. A
    /// blocked axis keeps its old value and, when moving along one axis only,
    /// the player slides toward the centerline of its row/column so corners
    /// are easier to take.
    ///
    /// Returns the first bomb bumped this frame when the player can kick.
    pub fn move_continuous(
        &mut self,
        input: Vec2,
        dt: f32,
        map: &TileMap,
        bombs: &BombEngine,
    ) -> Option<Bump> {
        if !self.is_active() {
            return None;
        }

        let (dx, dy) = (input.x, input.y);
        let speed = PLAYER_SPEED * dt;
        let half = PLAYER_HALF_SIZE;
        let old = self.pos;
        let mut new_x = old.x + dx * speed;
        let mut new_y = old.y + dy * speed;
        let mut bump = None;
        let mut blocked_at = |tile: IVec2| {
            let blocked = self.is_tile_blocked(tile, map, bombs);
            if blocked && bump.is_none() {
                bump = self.bump_at(tile, bombs);
            }
            blocked
        };

        if dx != 0.0 {
            let edge = new_x + if dx > 0.0 { half } else { -half };
            let tile_x = (edge + 0.5).floor() as i32;
            let top = (old.y - half + 0.5).floor() as i32;
            let bottom = (old.y + half - 0.01 + 0.5).floor() as i32;
            let blocked = (top..=bottom).any(|ty| blocked_at(IVec2::new(tile_x, ty)));
            if blocked {
                new_x = old.x;
                if dy == 0.0 {
                    let diff = old.y.round() - old.y;
                    if diff.abs() > SNAP_EPSILON {
                        new_y = old.y + diff.signum() * speed.min(diff.abs());
                    }
                }
            }
        }

        if dy != 0.0 {
            let edge = new_y + if dy > 0.0 { half } else { -half };
            let tile_y = (edge + 0.5).floor() as i32;
            let left = (new_x - half + 0.5).floor() as i32;
            let right = (new_x + half - 0.01 + 0.5).floor() as i32;
            let blocked = (left..=right).any(|tx| blocked_at(IVec2::new(tx, tile_y)));
            if blocked {
                new_y = old.y;
                if dx == 0.0 {
                    let diff = old.x.round() - old.x;
                    if diff.abs() > SNAP_EPSILON {
                        new_x = old.x + diff.signum() * speed.min(diff.abs());
                    }
                }
            }
        }

        self.pos = Vec2::new(
            new_x.clamp(0.5, COLS as f32 - 1.5),
            new_y.clamp(0.5, ROWS as f32 - 1.5),
        );

        let requested = dx != 0.0 || dy != 0.0;
        if requested {
            self.direction = if dx.abs() > dy.abs() {
                if dx > 0.0 { Direction::Right } else { Direction::Left }
            } else if dy > 0.0 {
                Direction::Down
            } else {
                Direction::Up
            };
        }
        self.moving = requested && self.pos != old;
        bump
    }

    /// Tile-snapped movement for agents: X settles fully before Y moves
    pub fn move_to_tile(&mut self, target: IVec2, dt: f32) {
        if !self.is_active() {
            return;
        }
        self.target_tile = target;
        let speed = PLAYER_SPEED * dt;
        let goal = target.as_vec2();
        let diff = goal - self.pos;

        if diff.x.abs() > SNAP_EPSILON {
            self.pos.x += diff.x.signum() * speed.min(diff.x.abs());
            self.direction = if diff.x > 0.0 { Direction::Right } else { Direction::Left };
            self.moving = true;
        } else if diff.y.abs() > SNAP_EPSILON {
            self.pos.x = goal.x;
            self.pos.y += diff.y.signum() * speed.min(diff.y.abs());
            self.direction = if diff.y > 0.0 { Direction::Down } else { Direction::Up };
            self.moving = true;
        } else {
            self.pos = goal;
            self.moving = false;
        }
    }

    pub fn is_at_target(&self) -> bool {
        let diff = (self.target_tile.as_vec2() - self.pos).abs();
        diff.x < SNAP_EPSILON && diff.y < SNAP_EPSILON
    }

    /// Collision predicate for continuous movement.
    ///
    /// Non-walkable tiles block. A bomb tile blocks too, except the player's own tile.
    pub fn is_tile_blocked(&self, tile: IVec2, map: &TileMap, bombs: &BombEngine) -> bool {
        if !map.is_walkable(tile) {
            return true;
        }
        bombs.has_bomb_at(tile) && tile != self.tile()
    }

    fn bump_at(&self, tile: IVec2, bombs: &BombEngine) -> Option<Bump> {
        let own = self.tile();
        if !self.has_kick || tile == own || !bombs.has_bomb_at(tile) {
            return None;
        }
        Direction::from_offset(tile - own).map(|dir| Bump { tile, dir })
    }

    /// Kick a bumped bomb away. The bump must be next to the player (corner
    /// checks may reach a diagonal neighbour) and point away from it.
    pub fn kick_bumped(&self, bump: Bump, bombs: &mut BombEngine) -> bool {
        let own = self.tile();
        if !self.is_active() || !self.has_kick || manhattan(bump.tile, own) > 2 {
            return false;
        }
        if Direction::from_offset(bump.tile - own) != Some(bump.dir) {
            return false;
        }
        bombs.kick(bump.tile, bump.dir)
    }

    /// Kick trigger: kick the bomb on the adjacent tile in the facing direction
    pub fn request_kick(&self, bombs: &mut BombEngine) -> bool {
        if !self.is_active() || !self.has_kick {
            return false;
        }
        bombs.kick(self.tile() + self.direction.delta(), self.direction)
    }
}
