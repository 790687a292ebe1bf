//! Fixed timestep simulation tick
//!
//! Advances a `MatchState` by one step. The authority runs every rule; a
//! replica runs the countdown and moves its own player, everything else
//! arrives in snapshots.

use glam::Vec2;
use rand::Rng;
use rand_pcg::Pcg32;

use super::ai::Intent;
use super::bomb::{Blast, BombEngine, HitTest};
use super::map::TileMap;
use super::misobon::GhostRoster;
use super::player::Player;
use super::state::{GameEvent, MatchPhase, MatchState};
use crate::consts::*;

/// Input for the locally controlled player for one tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickInput {
    /// Movement direction, dead-zone filtered (zero when idle)
    pub dir: Vec2,
    /// Place-bomb trigger (ghosts: lob a bomb)
    pub bomb: bool,
    /// Kick trigger
    pub kick: bool,
}

impl TickInput {
    /// Build from a raw stick deflection; anything inside the dead zone is idle
    pub fn from_stick(raw: Vec2, bomb: bool, kick: bool) -> Self {
        let dir = if raw.length() <= INPUT_DEAD_ZONE {
            Vec2::ZERO
        } else {
            raw.normalize()
        };
        Self { dir, bomb, kick }
    }
}

/// Advance the match by `dt` seconds (clamped to `MAX_DT`)
pub fn tick(state: &mut MatchState, input: &TickInput, dt: f32) {
    let dt = dt.min(MAX_DT);
    if dt <= 0.0 {
        return;
    }

    match state.phase {
        MatchPhase::Waiting | MatchPhase::MatchEnd => {}
        MatchPhase::Countdown => {
            state.countdown -= dt;
            if state.countdown <= 0.0 {
                state.transition(MatchPhase::Playing);
            }
        }
        MatchPhase::Playing | MatchPhase::SuddenDeath => {
            if state.is_authority() {
                update_authority(state, input, dt);
            } else {
                drive_local(state, input, dt);
            }
        }
        MatchPhase::RoundEnd => {
            state.round_end_timer -= dt;
            if state.is_authority() && state.round_end_timer <= 0.0 {
                state.advance_after_round();
            }
        }
    }
}

fn update_authority(state: &mut MatchState, input: &TickInput, dt: f32) {
    state.time_remaining -= dt;
    if state.phase == MatchPhase::Playing && state.time_remaining <= SUDDEN_DEATH_SECS {
        state.transition(MatchPhase::SuddenDeath);
    }
    if state.phase == MatchPhase::SuddenDeath {
        drop_blocks(state, dt);
    }

    drive_local(state, input, dt);
    run_agents(state, dt);
    update_bombs(state, dt);

    // Win check: last one standing takes the round, nobody left or time up is a draw
    let active: Vec<u8> = state
        .players
        .iter()
        .filter(|p| p.is_active())
        .map(|p| p.id)
        .collect();
    if active.len() <= 1 {
        state.end_round(active.first().copied());
    } else if state.time_remaining <= 0.0 {
        state.end_round(None);
    }
}

fn drop_blocks(state: &mut MatchState, dt: f32) {
    state.falling_timer += dt * 1000.0;
    if state.falling_timer < FALLING_BLOCK_INTERVAL_MS {
        return;
    }
    state.falling_timer -= FALLING_BLOCK_INTERVAL_MS;
    let Some(pos) = state.map.drop_next_block() else {
        return;
    };
    state.events.push(GameEvent::BlockDropped { pos });
    for player in state.players.iter_mut().filter(|p| p.alive && p.tile() == pos) {
        player.die();
        log::info!("Player {} crushed by a falling block", player.id);
        state.events.push(GameEvent::Died {
            player_id: player.id,
        });
    }
    state.bombs.remove_at(pos);
}

/// Local player (or its ghost). Only the authority applies the triggers and
/// bump kicks; a replica forwards them in its input report.
fn drive_local(state: &mut MatchState, input: &TickInput, dt: f32) {
    let Some(id) = state.local_player() else {
        return;
    };
    let authority = state.is_authority();
    state.pending_bump = None;
    let Some(player) = state.players.get_mut(id as usize) else {
        return;
    };

    if player.is_active() {
        let bump = player.move_continuous(input.dir, dt, &state.map, &state.bombs);
        if !authority {
            state.pending_bump = bump;
        } else {
            if let Some(bump) = bump {
                player.kick_bumped(bump, &mut state.bombs);
            }
            if input.kick {
                player.request_kick(&mut state.bombs);
            }
            if input.bomb {
                state.place_bomb(id);
            }
            state.pick_up(id);
        }
    } else if player.is_misobon {
        if let Some(ghost) = state.ghosts.get_mut(id) {
            ghost.patrol(input.dir, dt);
        }
        if authority && input.bomb {
            state.throw_ghost_bomb(id);
        }
    }
}

fn run_agents(state: &mut MatchState, dt: f32) {
    for idx in 0..state.players.len() {
        let id = idx as u8;
        let Some(agent) = state.agents.get_mut(idx).and_then(|a| a.as_mut()) else {
            continue;
        };
        let player = &state.players[idx];

        if player.is_active() {
            let intent = agent.decide(
                player,
                &state.players,
                &state.map,
                &state.bombs,
                dt,
                &mut state.rng,
            );
            if intent.place_bomb {
                state.place_bomb(id);
            }
            steer_agent(&mut state.players[idx], intent, &state.map, &state.bombs, dt);
            state.pick_up(id);
        } else if player.is_misobon {
            state.ghosts.agent_patrol(id, &state.players, dt);
            if state.rng.random::<f32>() < MISOBON_THROW_CHANCE {
                state.throw_ghost_bomb(id);
            }
        }
    }
}

/// Turn an agent's intent into a tile-snapped step. While between tiles the
/// committed destination is kept as long as the intent still points at it.
fn steer_agent(player: &mut Player, intent: Intent, map: &TileMap, bombs: &BombEngine, dt: f32) {
    let here = player.tile();
    let Some(dir) = intent.dir else {
        player.move_to_tile(here, dt);
        return;
    };
    let toward_target =
        (player.target_tile.as_vec2() - player.pos).dot(dir.delta().as_vec2()) > 0.0;
    let target = if !player.is_at_target() && toward_target {
        player.target_tile
    } else {
        here + dir.delta()
    };
    if map.is_walkable(target) && !bombs.has_bomb_at(target) {
        player.move_to_tile(target, dt);
    } else {
        player.move_to_tile(here, dt);
    }
}

fn update_bombs(state: &mut MatchState, dt: f32) {
    let occupied: Vec<_> = state
        .players
        .iter()
        .filter(|p| p.is_active())
        .map(|p| p.tile())
        .collect();
    let mut resolver = HitResolver {
        players: &mut state.players,
        ghosts: &mut state.ghosts,
        rng: &mut state.rng,
        events: &mut state.events,
        sudden_death: state.phase == MatchPhase::SuddenDeath,
        revived: Vec::new(),
    };
    let blasts = state
        .bombs
        .update(dt, &mut state.map, &occupied, &mut resolver);
    for blast in blasts {
        state.events.push(GameEvent::Exploded {
            owner_id: blast.owner_id,
            origin: blast.origin,
            cells: blast.cells.len(),
        });
    }
}

/// Damage rules for blasts
///
/// Before sudden death a hit player becomes a ghost, unless the bomb belongs
/// to a ghost, in which case the two swap. In sudden death a hit is final.
struct HitResolver<'a> {
    players: &'a mut [Player],
    ghosts: &'a mut GhostRoster,
    rng: &'a mut Pcg32,
    events: &'a mut Vec<GameEvent>,
    sudden_death: bool,
    /// Players swapped back in during this update; the blast that freed them
    /// cannot also catch them.
    revived: Vec<u8>,
}

impl HitTest for HitResolver<'_> {
    fn on_blast(&mut self, blast: &Blast) {
        for cell in &blast.cells {
            for idx in 0..self.players.len() {
                let player = &self.players[idx];
                if !player.is_active() || player.tile() != *cell || self.revived.contains(&player.id)
                {
                    continue;
                }
                let hit_id = player.id;

                if self.sudden_death {
                    self.players[idx].die();
                    log::info!("Player {} eliminated", hit_id);
                    self.events.push(GameEvent::Died { player_id: hit_id });
                    continue;
                }

                let owner = blast.owner_id;
                let owner_is_ghost = self.players.iter().any(|p| p.id == owner && p.is_misobon);
                if owner_is_ghost && self.ghosts.swap(owner, hit_id, self.players, self.rng) {
                    self.revived.push(owner);
                    self.events.push(GameEvent::Swapped {
                        ghost_id: owner,
                        hit_id,
                    });
                } else {
                    self.ghosts.add(&mut self.players[idx], self.rng);
                    self.events.push(GameEvent::BecameGhost { player_id: hit_id });
                }
            }
        }
    }
}
