//! Bombs, kicks and chain-reaction detonation
//!
//! `BombEngine` is the single owner of live bombs and explosion cells. Movement,
//! kicks and the AI only query it or request changes through its methods.

use std::collections::{HashSet, VecDeque};

use glam::IVec2;
use serde::{Deserialize, Serialize};

use super::map::{Tile, TileMap};
use crate::Direction;
use crate::consts::*;

/// A live bomb
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bomb {
    pub x: i32,
    pub y: i32,
    pub owner_id: u8,
    pub fire_power: u32,
    /// Remaining fuse (ms)
    pub timer: f32,
    pub kicked: bool,
    pub kick_dir: Option<Direction>,
    /// Progress toward the next tile while kicked (0..1)
    #[serde(default)]
    pub kick_progress: f32,
}

impl Bomb {
    pub fn new(pos: IVec2, owner_id: u8, fire_power: u32) -> Self {
        Self {
            x: pos.x,
            y: pos.y,
            owner_id,
            fire_power,
            timer: BOMB_TIMER_MS,
            kicked: false,
            kick_dir: None,
            kick_progress: 0.0,
        }
    }

    pub fn pos(&self) -> IVec2 {
        IVec2::new(self.x, self.y)
    }
}

/// A timed blast marker (visual + hazard)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explosion {
    pub x: i32,
    pub y: i32,
    /// Remaining display time (ms)
    pub timer: f32,
}

impl Explosion {
    pub fn pos(&self) -> IVec2 {
        IVec2::new(self.x, self.y)
    }
}

/// One bomb's detonation, as reported to the hit-test collaborator
#[derive(Debug, Clone, PartialEq)]
pub struct Blast {
    pub owner_id: u8,
    pub origin: IVec2,
    /// Every cell covered, origin first
    pub cells: Vec<IVec2>,
}

/// Receives each detonation's covered cells so damage rules can be applied
pub trait HitTest {
    fn on_blast(&mut self, blast: &Blast);
}

impl<F: FnMut(&Blast)> HitTest for F {
    fn on_blast(&mut self, blast: &Blast) {
        self(blast)
    }
}

/// Cells a blast covers along one ray, plus the tile that stopped it (if any)
pub fn blast_ray(
    map: &TileMap,
    origin: IVec2,
    dir: Direction,
    fire_power: u32,
) -> (Vec<IVec2>, Option<IVec2>) {
    let mut cells = Vec::with_capacity(fire_power as usize);
    for step in 1..=fire_power as i32 {
        let pos = origin + dir.delta() * step;
        if !map.can_explosion_pass(pos) {
            return (cells, Some(pos));
        }
        cells.push(pos);
    }
    (cells, None)
}

/// Full cross a bomb would cover right now, origin included. Terrain is not modified.
pub fn blast_cells(map: &TileMap, origin: IVec2, fire_power: u32) -> Vec<IVec2> {
    let mut cells = vec![origin];
    for dir in Direction::ALL {
        cells.extend(blast_ray(map, origin, dir, fire_power).0);
    }
    cells
}

/// Owner of live bombs and explosion cells for one round
#[derive(Debug, Clone, Default)]
pub struct BombEngine {
    bombs: Vec<Bomb>,
    explosions: Vec<Explosion>,
}

impl BombEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bombs(&self) -> &[Bomb] {
        &self.bombs
    }

    pub fn explosions(&self) -> &[Explosion] {
        &self.explosions
    }

    pub fn bomb_at(&self, pos: IVec2) -> Option<&Bomb> {
        self.bombs.iter().find(|b| b.pos() == pos)
    }

    pub fn has_bomb_at(&self, pos: IVec2) -> bool {
        self.bomb_at(pos).is_some()
    }

    pub fn is_explosion_at(&self, pos: IVec2) -> bool {
        self.explosions.iter().any(|e| e.pos() == pos)
    }

    pub fn owned_by(&self, owner_id: u8) -> usize {
        self.bombs.iter().filter(|b| b.owner_id == owner_id).count()
    }

    /// Place a bomb. Fails if the tile is taken or the owner is at capacity.
    pub fn place(&mut self, pos: IVec2, owner_id: u8, fire_power: u32, capacity: u32) -> bool {
        if self.has_bomb_at(pos) || self.owned_by(owner_id) >= capacity as usize {
            return false;
        }
        self.bombs.push(Bomb::new(pos, owner_id, fire_power));
        true
    }

    /// Ghost lob: the aim tile must be interior, walkable and bomb-free
    pub fn place_ghost_bomb(&mut self, target: IVec2, owner_id: u8, map: &TileMap) -> bool {
        let interior = target.x >= 1 && target.x < COLS - 1 && target.y >= 1 && target.y < ROWS - 1;
        if !interior || !map.is_walkable(target) {
            return false;
        }
        self.place(
            target,
            owner_id,
            MISOBON_FIRE_POWER,
            MISOBON_BOMB_COUNT as u32,
        )
    }

    /// Start an un-kicked bomb sliding. No-op when absent or already moving.
    pub fn kick(&mut self, pos: IVec2, dir: Direction) -> bool {
        match self.bombs.iter_mut().find(|b| b.pos() == pos) {
            Some(bomb) if !bomb.kicked => {
                bomb.kicked = true;
                bomb.kick_dir = Some(dir);
                bomb.kick_progress = 0.0;
                true
            }
            _ => false,
        }
    }

    /// Remove any bomb on a tile without detonating it (falling blocks)
    pub fn remove_at(&mut self, pos: IVec2) {
        self.bombs.retain(|b| b.pos() != pos);
    }

    /// Replace all state (replica snapshot)
    pub fn replace(&mut self, bombs: Vec<Bomb>, explosions: Vec<Explosion>) {
        self.bombs = bombs;
        self.explosions = explosions;
    }

    pub fn clear(&mut self) {
        self.bombs.clear();
        self.explosions.clear();
    }

    /// Age explosion cells, advance fuses and kicks, then detonate lapsed bombs
    /// (with chain reactions). `occupied` holds tiles of living players, which
    /// stop kicked bombs.
    pub fn update(
        &mut self,
        dt: f32,
        map: &mut TileMap,
        occupied: &[IVec2],
        hits: &mut impl HitTest,
    ) -> Vec<Blast> {
        self.explosions.retain_mut(|e| {
            e.timer -= dt * 1000.0;
            e.timer > 0.0
        });

        let mut lapsed = Vec::new();
        for i in 0..self.bombs.len() {
            if self.bombs[i].kicked {
                self.advance_kick(i, dt, map, occupied);
            }
            let bomb = &mut self.bombs[i];
            bomb.timer -= dt * 1000.0;
            if bomb.timer <= 0.0 {
                lapsed.push(bomb.pos());
            }
        }

        self.detonate(lapsed, map, hits)
    }

    fn advance_kick(&mut self, i: usize, dt: f32, map: &TileMap, occupied: &[IVec2]) {
        let Some(dir) = self.bombs[i].kick_dir else {
            self.bombs[i].kicked = false;
            return;
        };
        self.bombs[i].kick_progress += BOMB_KICK_SPEED * dt;
        if self.bombs[i].kick_progress < 1.0 {
            return;
        }
        self.bombs[i].kick_progress = 0.0;
        let next = self.bombs[i].pos() + dir.delta();
        let free = map.is_walkable(next) && !self.has_bomb_at(next) && !occupied.contains(&next);
        let bomb = &mut self.bombs[i];
        if free {
            bomb.x = next.x;
            bomb.y = next.y;
        } else {
            bomb.kicked = false;
            bomb.kick_dir = None;
        }
    }

    /// Chain-reaction detonation. Each position detonates at most once per call.
    fn detonate(
        &mut self,
        seeds: Vec<IVec2>,
        map: &mut TileMap,
        hits: &mut impl HitTest,
    ) -> Vec<Blast> {
        let mut queue: VecDeque<IVec2> = seeds.into();
        let mut detonated = HashSet::new();
        let mut blasts = Vec::new();

        while let Some(pos) = queue.pop_front() {
            if !detonated.insert(pos) {
                continue;
            }
            let Some(idx) = self.bombs.iter().position(|b| b.pos() == pos) else {
                continue;
            };
            let bomb = self.bombs.remove(idx);

            let mut cells = vec![pos];
            for dir in Direction::ALL {
                let (ray, blocker) = blast_ray(map, pos, dir, bomb.fire_power);
                if let Some(blocker) = blocker {
                    if map.tile(blocker) == Some(Tile::Block) {
                        map.destroy_block(blocker);
                    }
                }
                for cell in ray {
                    if self.has_bomb_at(cell) {
                        queue.push_back(cell);
                    }
                    cells.push(cell);
                }
            }

            for cell in &cells {
                self.mark_explosion(*cell);
            }
            let blast = Blast {
                owner_id: bomb.owner_id,
                origin: pos,
                cells,
            };
            log::debug!(
                "Bomb of player {} detonated at {} ({} cells)",
                blast.owner_id,
                pos,
                blast.cells.len()
            );
            hits.on_blast(&blast);
            blasts.push(blast);
        }
        blasts
    }

    fn mark_explosion(&mut self, pos: IVec2) {
        match self.explosions.iter_mut().find(|e| e.pos() == pos) {
            Some(existing) => existing.timer = EXPLOSION_MS,
            None => self.explosions.push(Explosion {
                x: pos.x,
                y: pos.y,
                timer: EXPLOSION_MS,
            }),
        }
    }
}
