//! Tile map: terrain grid, item placements, falling-block order
//!
//! The grid is row-major (`y * COLS + x`). Border ring is always `Wall`;
//! interior cells with both coordinates even are `Pillar` and never change.

use glam::IVec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::SPAWN_POSITIONS;
use crate::consts::*;

/// Terrain kind of one cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tile {
    #[default]
    Empty,
    /// Indestructible border
    Wall,
    /// Indestructible interior lattice
    Pillar,
    /// Destructible block (may drop an item)
    Block,
    /// Sudden-death falling block
    Falling,
}

/// Power-up kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    FireUp,
    BombUp,
    Kick,
}

impl ItemKind {
    /// Weighted draw among the kinds (0.4 / 0.4 / 0.2)
    fn roll(rng: &mut impl Rng) -> Self {
        let r: f32 = rng.random();
        if r < 0.4 {
            ItemKind::FireUp
        } else if r < 0.8 {
            ItemKind::BombUp
        } else {
            ItemKind::Kick
        }
    }
}

/// An item lying on the map (at most one per tile)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub x: i32,
    pub y: i32,
    #[serde(rename = "type")]
    pub kind: ItemKind,
}

impl Item {
    pub fn pos(&self) -> IVec2 {
        IVec2::new(self.x, self.y)
    }
}

#[inline]
pub fn in_bounds(pos: IVec2) -> bool {
    pos.x >= 0 && pos.x < COLS && pos.y >= 0 && pos.y < ROWS
}

#[inline]
fn index(pos: IVec2) -> usize {
    (pos.y * COLS + pos.x) as usize
}

/// Fixed terrain for a cell, ignoring blocks: `Wall`, `Pillar` or `Empty`
fn base_tile(x: i32, y: i32) -> Tile {
    if x == 0 || x == COLS - 1 || y == 0 || y == ROWS - 1 {
        Tile::Wall
    } else if x % 2 == 0 && y % 2 == 0 {
        Tile::Pillar
    } else {
        Tile::Empty
    }
}

/// Cells kept free of blocks so each spawn has an escape pocket
fn in_spawn_pocket(pos: IVec2) -> bool {
    SPAWN_POSITIONS
        .iter()
        .any(|sp| crate::manhattan(*sp, pos) <= 2)
}

/// Spiral over the interior: top row left→right, right column down,
/// bottom row right→left, left column up, shrinking inward.
pub fn spiral_order() -> Vec<IVec2> {
    let mut order = Vec::with_capacity(((COLS - 2) * (ROWS - 2)) as usize);
    let (mut top, mut bottom, mut left, mut right) = (1, ROWS - 2, 1, COLS - 2);

    while top <= bottom && left <= right {
        for x in left..=right {
            order.push(IVec2::new(x, top));
        }
        top += 1;
        for y in top..=bottom {
            order.push(IVec2::new(right, y));
        }
        right -= 1;
        if top <= bottom {
            for x in (left..=right).rev() {
                order.push(IVec2::new(x, bottom));
            }
            bottom -= 1;
        }
        if left <= right {
            for y in (top..=bottom).rev() {
                order.push(IVec2::new(left, y));
            }
            left += 1;
        }
    }
    order
}

/// The arena terrain for one round
#[derive(Debug, Clone)]
pub struct TileMap {
    grid: Vec<Tile>,
    /// Items on the map, one per tile at most
    pub items: Vec<Item>,
    falling_order: Vec<IVec2>,
    falling_index: usize,
    /// Drives block placement and item drops
    rng: Pcg32,
}

impl TileMap {
    /// Border walls and pillar lattice only, no blocks
    pub fn open(seed: u64) -> Self {
        let mut grid = Vec::with_capacity((COLS * ROWS) as usize);
        for y in 0..ROWS {
            for x in 0..COLS {
                grid.push(base_tile(x, y));
            }
        }
        Self {
            grid,
            items: Vec::new(),
            falling_order: spiral_order(),
            falling_index: 0,
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    /// Full round map: walls, pillars, then blocks at 75% density outside spawn pockets
    pub fn generate(seed: u64) -> Self {
        let mut map = Self::open(seed);
        for y in 1..ROWS - 1 {
            for x in 1..COLS - 1 {
                let pos = IVec2::new(x, y);
                if map.grid[index(pos)] == Tile::Empty
                    && !in_spawn_pocket(pos)
                    && map.rng.random::<f32>() < BLOCK_DENSITY
                {
                    map.grid[index(pos)] = Tile::Block;
                }
            }
        }
        log::debug!(
            "Generated map (seed {}): {} blocks",
            seed,
            map.grid.iter().filter(|t| **t == Tile::Block).count()
        );
        map
    }

    /// Rebuild from a replicated grid (`rows[y][x]`). The falling order is recomputed.
    pub fn from_rows(rows: &[Vec<Tile>], items: Vec<Item>, seed: u64) -> Self {
        let mut map = Self::open(seed);
        map.set_rows(rows);
        map.items = items;
        map
    }

    /// Overwrite the grid from `rows[y][x]`; out-of-range entries are ignored
    pub fn set_rows(&mut self, rows: &[Vec<Tile>]) {
        for (y, row) in rows.iter().enumerate().take(ROWS as usize) {
            for (x, tile) in row.iter().enumerate().take(COLS as usize) {
                self.grid[y * COLS as usize + x] = *tile;
            }
        }
    }

    /// Grid as `rows[y][x]` (wire layout)
    pub fn rows(&self) -> Vec<Vec<Tile>> {
        self.grid
            .chunks(COLS as usize)
            .map(|row| row.to_vec())
            .collect()
    }

    pub fn tile(&self, pos: IVec2) -> Option<Tile> {
        in_bounds(pos).then(|| self.grid[index(pos)])
    }

    pub fn set_tile(&mut self, pos: IVec2, tile: Tile) {
        if in_bounds(pos) {
            self.grid[index(pos)] = tile;
        }
    }

    /// Only empty, in-bounds cells can be walked on
    pub fn is_walkable(&self, pos: IVec2) -> bool {
        self.tile(pos) == Some(Tile::Empty)
    }

    /// Blasts travel through exactly the walkable cells
    pub fn can_explosion_pass(&self, pos: IVec2) -> bool {
        self.is_walkable(pos)
    }

    /// Turn a block into floor, maybe dropping an item. Returns false on non-block tiles.
    pub fn destroy_block(&mut self, pos: IVec2) -> bool {
        if self.tile(pos) != Some(Tile::Block) {
            return false;
        }
        self.grid[index(pos)] = Tile::Empty;
        if self.rng.random::<f32>() < ITEM_DROP_RATE {
            let kind = ItemKind::roll(&mut self.rng);
            self.remove_item_at(pos);
            self.items.push(Item {
                x: pos.x,
                y: pos.y,
                kind,
            });
        }
        true
    }

    /// Release the next falling block in spiral order; `None` once exhausted
    pub fn drop_next_block(&mut self) -> Option<IVec2> {
        let pos = *self.falling_order.get(self.falling_index)?;
        self.falling_index += 1;
        if self.tile(pos) != Some(Tile::Wall) {
            self.grid[index(pos)] = Tile::Falling;
            self.remove_item_at(pos);
        }
        Some(pos)
    }

    pub fn falling_order(&self) -> &[IVec2] {
        &self.falling_order
    }

    pub fn item_at(&self, pos: IVec2) -> Option<&Item> {
        self.items.iter().find(|i| i.pos() == pos)
    }

    /// Remove and return the item on a tile
    pub fn take_item_at(&mut self, pos: IVec2) -> Option<ItemKind> {
        let idx = self.items.iter().position(|i| i.pos() == pos)?;
        Some(self.items.remove(idx).kind)
    }

    pub fn remove_item_at(&mut self, pos: IVec2) {
        self.items.retain(|i| i.pos() != pos);
    }
}
