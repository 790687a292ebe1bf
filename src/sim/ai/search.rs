//! Grid search and danger analysis shared by every policy
//!
//! All searches are unweighted BFS over the 4-connected graph of walkable,
//! bomb-free tiles and report only the first step of the shortest path.

use std::collections::{HashSet, VecDeque};

use glam::IVec2;

use crate::Direction;
use crate::consts::*;
use crate::sim::bomb::{BombEngine, blast_cells, blast_ray};
use crate::sim::map::{Tile, TileMap};
use crate::sim::player::Player;

/// Result of a successful search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    /// First step of the shortest path
    pub first_step: Direction,
    /// Tile that satisfied the search
    pub goal: IVec2,
    /// Path length in steps
    pub distance: u32,
}

/// Every tile a live bomb will cover when it goes off, plus active explosion cells
#[derive(Debug, Clone, Default)]
pub struct DangerField {
    cells: HashSet<IVec2>,
}

impl DangerField {
    pub fn new(map: &TileMap, bombs: &BombEngine) -> Self {
        let mut cells: HashSet<IVec2> = bombs.explosions().iter().map(|e| e.pos()).collect();
        for bomb in bombs.bombs() {
            cells.extend(blast_cells(map, bomb.pos(), bomb.fire_power));
        }
        Self { cells }
    }

    /// Add a hypothetical bomb
    pub fn with_bomb(mut self, map: &TileMap, pos: IVec2, fire_power: u32) -> Self {
        self.cells.extend(blast_cells(map, pos, fire_power));
        self
    }

    pub fn contains(&self, pos: IVec2) -> bool {
        self.cells.contains(&pos)
    }
}

/// Steps an agent can cover before a freshly placed bomb goes off
pub fn fuse_reach() -> u32 {
    (BOMB_TIMER_MS / 1000.0 * PLAYER_SPEED).floor() as u32
}

fn passable(map: &TileMap, bombs: &BombEngine, pos: IVec2) -> bool {
    map.is_walkable(pos) && !bombs.has_bomb_at(pos)
}

/// Nearest tile (excluding `start`) within `max_dist` steps that satisfies `goal`
pub fn bfs(
    map: &TileMap,
    bombs: &BombEngine,
    start: IVec2,
    max_dist: u32,
    mut goal: impl FnMut(IVec2) -> bool,
) -> Option<Route> {
    let mut queue = VecDeque::from([(start, None::<Direction>, 0u32)]);
    let mut visited = HashSet::from([start]);

    while let Some((pos, first, dist)) = queue.pop_front() {
        if let Some(first_step) = first {
            if goal(pos) {
                return Some(Route {
                    first_step,
                    goal: pos,
                    distance: dist,
                });
            }
        }
        if dist >= max_dist {
            continue;
        }
        for dir in Direction::ALL {
            let next = pos + dir.delta();
            if !passable(map, bombs, next) || !visited.insert(next) {
                continue;
            }
            queue.push_back((next, first.or(Some(dir)), dist + 1));
        }
    }
    None
}

/// Directions whose neighbor tile can be entered right now
pub fn walkable_dirs(map: &TileMap, bombs: &BombEngine, pos: IVec2) -> Vec<Direction> {
    Direction::ALL
        .into_iter()
        .filter(|d| passable(map, bombs, pos + d.delta()))
        .collect()
}

/// First direction with a destructible block next to `pos`
pub fn adjacent_block(map: &TileMap, pos: IVec2) -> Option<Direction> {
    Direction::ALL
        .into_iter()
        .find(|d| map.tile(pos + d.delta()) == Some(Tile::Block))
}

/// Way out of current danger, if a safe tile is close enough
pub fn find_safe_direction(
    map: &TileMap,
    bombs: &BombEngine,
    danger: &DangerField,
    start: IVec2,
) -> Option<Direction> {
    bfs(map, bombs, start, DANGER_SEARCH_STEPS, |p| !danger.contains(p)).map(|r| r.first_step)
}

/// Safety search: with a bomb of `fire_power` simulated at `start`, find a
/// tile outside every danger zone that is reachable before the fuse runs out.
/// `None` means the bomb must not be placed.
pub fn safe_bomb_escape(
    map: &TileMap,
    bombs: &BombEngine,
    start: IVec2,
    fire_power: u32,
) -> Option<Route> {
    let danger = DangerField::new(map, bombs).with_bomb(map, start, fire_power);
    bfs(map, bombs, start, fuse_reach(), |p| !danger.contains(p))
}

/// Closest other active player by Manhattan distance (lowest id on ties)
pub fn nearest_enemy<'a>(player: &Player, players: &'a [Player]) -> Option<&'a Player> {
    let here = player.tile();
    players
        .iter()
        .filter(|o| o.id != player.id && o.is_active())
        .min_by_key(|o| crate::manhattan(here, o.tile()))
}

/// Would a bomb at `origin` reach `target` along one of its rays
pub fn in_blast_line(map: &TileMap, origin: IVec2, fire_power: u32, target: IVec2) -> bool {
    Direction::ALL
        .into_iter()
        .any(|d| blast_ray(map, origin, d, fire_power).0.contains(&target))
}

pub fn toward_item(map: &TileMap, bombs: &BombEngine, start: IVec2) -> Option<Direction> {
    bfs(map, bombs, start, SEARCH_STEPS, |p| map.item_at(p).is_some()).map(|r| r.first_step)
}

/// Toward the nearest tile that has a destructible block next to it
pub fn toward_block(map: &TileMap, bombs: &BombEngine, start: IVec2) -> Option<Direction> {
    bfs(map, bombs, start, SEARCH_STEPS, |p| {
        adjacent_block(map, p).is_some()
    })
    .map(|r| r.first_step)
}

pub fn toward(map: &TileMap, bombs: &BombEngine, start: IVec2, target: IVec2) -> Option<Direction> {
    bfs(map, bombs, start, SEARCH_STEPS, |p| p == target).map(|r| r.first_step)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::bomb::Blast;
    use proptest::prelude::*;

    #[test]
    fn test_bfs_returns_first_step_of_shortest_path() {
        let map = TileMap::open(0);
        let bombs = BombEngine::new();
        let route = bfs(&map, &bombs, IVec2::new(1, 1), SEARCH_STEPS, |p| {
            p == IVec2::new(5, 1)
        })
        .unwrap();
        assert_eq!(route.first_step, Direction::Right);
        assert_eq!(route.distance, 4);
        assert_eq!(route.goal, IVec2::new(5, 1));
    }

    #[test]
    fn test_bfs_never_matches_start_and_respects_cap() {
        let map = TileMap::open(0);
        let bombs = BombEngine::new();
        assert!(bfs(&map, &bombs, IVec2::new(1, 1), 10, |p| p == IVec2::new(1, 1)).is_none());
        assert!(bfs(&map, &bombs, IVec2::new(1, 1), 3, |p| p == IVec2::new(5, 1)).is_none());
    }

    #[test]
    fn test_bombs_block_search() {
        let map = TileMap::open(0);
        let mut bombs = BombEngine::new();
        // Corner (1,1): exits are (2,1) and (1,2)
        bombs.place(IVec2::new(2, 1), 9, 1, 5);
        bombs.place(IVec2::new(1, 2), 9, 1, 5);
        assert!(walkable_dirs(&map, &bombs, IVec2::new(1, 1)).is_empty());
        assert!(toward(&map, &bombs, IVec2::new(1, 1), IVec2::new(5, 5)).is_none());
    }

    #[test]
    fn test_danger_field_covers_rays_and_explosions() {
        let mut map = TileMap::open(0);
        map.set_tile(IVec2::new(5, 3), Tile::Block);
        let mut bombs = BombEngine::new();
        bombs.place(IVec2::new(3, 3), 0, 3, 1);
        let danger = DangerField::new(&map, &bombs);
        assert!(danger.contains(IVec2::new(3, 3)));
        assert!(danger.contains(IVec2::new(4, 3)));
        // Stopped by the block
        assert!(!danger.contains(IVec2::new(5, 3)));
        assert!(!danger.contains(IVec2::new(6, 3)));
        // Pillar at (2,2) does not sit on the cross
        assert!(danger.contains(IVec2::new(3, 1)));
        assert!(!danger.contains(IVec2::new(2, 2)));
    }

    #[test]
    fn test_safe_escape_in_open_corner() {
        let map = TileMap::open(0);
        let bombs = BombEngine::new();
        let route = safe_bomb_escape(&map, &bombs, IVec2::new(1, 1), 1).unwrap();
        // (2,1) and (1,2) are on the cross; the first safe tile is two steps away
        assert_eq!(route.distance, 2);
        assert!(route.distance <= fuse_reach());
    }

    #[test]
    fn test_no_escape_in_dead_end() {
        let mut map = TileMap::open(0);
        // Corridor (1,1)-(1,2)-(1,3) sealed by blocks
        map.set_tile(IVec2::new(2, 1), Tile::Block);
        map.set_tile(IVec2::new(2, 3), Tile::Block);
        map.set_tile(IVec2::new(1, 4), Tile::Block);
        let bombs = BombEngine::new();
        assert!(safe_bomb_escape(&map, &bombs, IVec2::new(1, 1), 3).is_none());
        assert!(safe_bomb_escape(&map, &bombs, IVec2::new(1, 1), 1).is_some());
    }

    #[test]
    fn test_nearest_enemy_skips_ghosts_and_self() {
        let me = Player::new(0, IVec2::new(1, 1));
        let mut near = Player::new(1, IVec2::new(3, 1));
        near.become_ghost();
        let far = Player::new(2, IVec2::new(5, 5));
        let players = vec![me.clone(), near, far];
        assert_eq!(nearest_enemy(&me, &players).map(|p| p.id), Some(2));
    }

    #[test]
    fn test_blast_line_respects_obstructions() {
        let mut map = TileMap::open(0);
        assert!(in_blast_line(&map, IVec2::new(1, 1), 2, IVec2::new(3, 1)));
        assert!(!in_blast_line(&map, IVec2::new(1, 1), 1, IVec2::new(3, 1)));
        map.set_tile(IVec2::new(2, 1), Tile::Block);
        assert!(!in_blast_line(&map, IVec2::new(1, 1), 2, IVec2::new(3, 1)));
    }

    fn random_map(blocks: &[(i32, i32)]) -> TileMap {
        let mut map = TileMap::open(0);
        for &(x, y) in blocks {
            let pos = IVec2::new(x, y);
            if map.is_walkable(pos) {
                map.set_tile(pos, Tile::Block);
            }
        }
        map
    }

    proptest! {
        /// A bomb accepted by the safety search never catches its owner at the
        /// escape tile, and the escape tile is reachable within the fuse.
        #[test]
        fn prop_accepted_bomb_is_survivable(
            blocks in prop::collection::vec((1..COLS - 1, 1..ROWS - 1), 0..60),
            start in (1..COLS - 1, 1..ROWS - 1),
            power in 1u32..5,
        ) {
            let start = IVec2::new(start.0, start.1);
            let mut map = random_map(&blocks);
            prop_assume!(map.is_walkable(start));
            let mut bombs = BombEngine::new();

            if let Some(route) = safe_bomb_escape(&map, &bombs, start, power) {
                let travel_ms = route.distance as f32 / PLAYER_SPEED * 1000.0;
                prop_assert!(travel_ms <= BOMB_TIMER_MS);

                prop_assert!(bombs.place(start, 0, power, 1));
                let mut hit = false;
                let goal = route.goal;
                let mut check = |blast: &Blast| hit |= blast.cells.contains(&goal);
                bombs.update(BOMB_TIMER_MS / 1000.0, &mut map, &[], &mut check);
                prop_assert!(!hit);
            }
        }
    }
}
