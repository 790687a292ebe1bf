//! Misobon: eliminated players patrol the boundary as ghosts
//!
//! A ghost walks along one outer edge and lobs weak bombs at the interior tile
//! next to it. If a ghost's blast hits a living player, the two swap places.

use glam::{IVec2, Vec2};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::player::Player;
use crate::consts::*;

/// Which outer edge a ghost patrols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Top,
    Bottom,
    Left,
    Right,
}

impl Side {
    const ALL: [Side; 4] = [Side::Top, Side::Bottom, Side::Left, Side::Right];

    fn horizontal(self) -> bool {
        matches!(self, Side::Top | Side::Bottom)
    }
}

/// A boundary-patrolling ghost
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ghost {
    pub player_id: u8,
    /// Position just outside the grid (half a tile past the border)
    pub pos: Vec2,
    /// Interior tile bombs are lobbed at
    pub target: IVec2,
    pub side: Side,
}

impl Ghost {
    fn spawn(player_id: u8, rng: &mut impl Rng) -> Self {
        let side = Side::ALL[rng.random_range(0..4)];
        let pos = match side {
            Side::Top => Vec2::new(rng.random_range(0..COLS) as f32, -0.5),
            Side::Bottom => Vec2::new(rng.random_range(0..COLS) as f32, ROWS as f32 - 0.5),
            Side::Left => Vec2::new(-0.5, rng.random_range(0..ROWS) as f32),
            Side::Right => Vec2::new(COLS as f32 - 0.5, rng.random_range(0..ROWS) as f32),
        };
        let mut ghost = Self {
            player_id,
            pos,
            target: IVec2::ZERO,
            side,
        };
        ghost.update_target();
        ghost
    }

    /// Aim at the edge-adjacent interior tile nearest the patrol position
    fn update_target(&mut self) {
        let col = self.pos.x.clamp(1.0, (COLS - 2) as f32).round() as i32;
        let row = self.pos.y.clamp(1.0, (ROWS - 2) as f32).round() as i32;
        self.target = match self.side {
            Side::Top => IVec2::new(col, 1),
            Side::Bottom => IVec2::new(col, ROWS - 2),
            Side::Left => IVec2::new(1, row),
            Side::Right => IVec2::new(COLS - 2, row),
        };
    }

    /// Slide along the patrolled edge; the off-axis input component is ignored
    pub fn patrol(&mut self, input: Vec2, dt: f32) {
        let step = MISOBON_SPEED * dt;
        if self.side.horizontal() {
            self.pos.x = (self.pos.x + input.x * step).clamp(-0.5, COLS as f32 - 0.5);
        } else {
            self.pos.y = (self.pos.y + input.y * step).clamp(-0.5, ROWS as f32 - 0.5);
        }
        self.update_target();
    }

    /// Jump to a reported position, projected onto the patrolled edge
    pub fn move_to(&mut self, pos: Vec2) {
        if self.side.horizontal() {
            self.pos.x = pos.x.clamp(-0.5, COLS as f32 - 0.5);
        } else {
            self.pos.y = pos.y.clamp(-0.5, ROWS as f32 - 0.5);
        }
        self.update_target();
    }
}

/// All ghosts of the current round, at most one per owner
#[derive(Debug, Clone, Default)]
pub struct GhostRoster {
    ghosts: Vec<Ghost>,
}

impl GhostRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ghosts(&self) -> &[Ghost] {
        &self.ghosts
    }

    pub fn is_empty(&self) -> bool {
        self.ghosts.is_empty()
    }

    pub fn get(&self, player_id: u8) -> Option<&Ghost> {
        self.ghosts.iter().find(|g| g.player_id == player_id)
    }

    pub fn get_mut(&mut self, player_id: u8) -> Option<&mut Ghost> {
        self.ghosts.iter_mut().find(|g| g.player_id == player_id)
    }

    /// Convert a player into a ghost on a random edge
    pub fn add(&mut self, player: &mut Player, rng: &mut impl Rng) {
        self.ghosts.retain(|g| g.player_id != player.id);
        let ghost = Ghost::spawn(player.id, rng);
        log::debug!("Player {} became a ghost on {:?}", player.id, ghost.side);
        self.ghosts.push(ghost);
        player.become_ghost();
    }

    /// Agent-owned ghost: shuffle along the edge toward the first living opponent
    pub fn agent_patrol(&mut self, player_id: u8, players: &[Player], dt: f32) {
        let Some(prey) = players
            .iter()
            .find(|p| p.is_active() && p.id != player_id)
            .map(|p| p.tile())
        else {
            return;
        };
        let Some(ghost) = self.get_mut(player_id) else {
            return;
        };
        let diff = if ghost.side.horizontal() {
            prey.x as f32 - ghost.pos.x
        } else {
            prey.y as f32 - ghost.pos.y
        };
        let step = MISOBON_SPEED * dt;
        if diff.abs() < f32::EPSILON || step <= 0.0 {
            return;
        }
        // Scaled so the ghost stops exactly in line instead of overshooting
        let amount = (diff / step).clamp(-1.0, 1.0);
        let input = if ghost.side.horizontal() {
            Vec2::new(amount, 0.0)
        } else {
            Vec2::new(0.0, amount)
        };
        ghost.patrol(input, dt);
    }

    /// A ghost's blast hit `hit_id`: the ghost's owner returns to play at the
    /// hit player's position and the hit player becomes the new ghost.
    pub fn swap(
        &mut self,
        ghost_id: u8,
        hit_id: u8,
        players: &mut [Player],
        rng: &mut impl Rng,
    ) -> bool {
        if ghost_id == hit_id || self.get(ghost_id).is_none() {
            return false;
        }
        let Some(hit_pos) = players.iter().find(|p| p.id == hit_id).map(|p| p.pos) else {
            return false;
        };
        let Some(returning) = players.iter_mut().find(|p| p.id == ghost_id) else {
            return false;
        };
        returning.revive_at(hit_pos);
        self.ghosts.retain(|g| g.player_id != ghost_id);

        if let Some(hit) = players.iter_mut().find(|p| p.id == hit_id) {
            self.add(hit, rng);
        }
        log::info!("Ghost {} swapped back in for player {}", ghost_id, hit_id);
        true
    }

    /// Round reset
    pub fn clear(&mut self) {
        self.ghosts.clear();
    }

    /// Sudden death: every ghost's owner is permanently out
    pub fn eliminate_all(&mut self, players: &mut [Player]) {
        for ghost in self.ghosts.drain(..) {
            if let Some(player) = players.iter_mut().find(|p| p.id == ghost.player_id) {
                player.alive = false;
                player.is_misobon = false;
            }
        }
    }

    /// Replace all ghosts (replica snapshot)
    pub fn replace(&mut self, ghosts: Vec<Ghost>) {
        self.ghosts = ghosts;
    }
}
