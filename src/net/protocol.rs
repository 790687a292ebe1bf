//! Wire messages and snapshot capture/apply
//!
//! Messages are JSON objects tagged by a `type` field. The authority sends
//! `start_round` and throttled `game_state` snapshots; the replica reports its
//! local player every tick with `player_input`.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::config::Slot;
use crate::{Direction, tile_of};
use crate::error::Result;
use crate::sim::{
    Bomb, Bump, Difficulty, Explosion, GameEvent, Ghost, Item, MatchPhase, MatchState, Player,
    Tile, TileMap,
};

/// Everything that crosses the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    StartRound(RoundStart),
    PlayerInput(InputReport),
    GameState(Snapshot),
}

pub fn encode(message: &Message) -> Result<String> {
    Ok(serde_json::to_string(message)?)
}

pub fn decode(text: &str) -> Result<Message> {
    Ok(serde_json::from_str(text)?)
}

/// Authority → replica: full round (re)initialization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundStart {
    pub map_grid: Vec<Vec<Tile>>,
    pub map_items: Vec<Item>,
    pub time_limit: f32,
    pub cpu1_diff: Option<Difficulty>,
    pub cpu2_diff: Option<Difficulty>,
}

impl RoundStart {
    pub fn capture(state: &MatchState) -> Self {
        let (cpu1_diff, cpu2_diff) = state.config.cpu_pair();
        Self {
            map_grid: state.map.rows(),
            map_items: state.map.items.clone(),
            time_limit: state.config.time_limit,
            cpu1_diff,
            cpu2_diff,
        }
    }

    /// Rebuild the round locally from the authority's map
    pub fn apply(&self, state: &mut MatchState) {
        state.config.time_limit = self.time_limit;
        for (slot, diff) in [(2, self.cpu1_diff), (3, self.cpu2_diff)] {
            if let Some(diff) = diff {
                state.config.slots[slot] = Slot::Agent(diff);
            }
        }
        let map = TileMap::from_rows(&self.map_grid, self.map_items.clone(), state.config.seed);
        state.begin_round(map);
    }
}

/// Replica → authority: the local player's state and triggers for one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputReport {
    pub player_id: u8,
    /// Player position, or the ghost's patrol position while a ghost
    pub x: f32,
    pub y: f32,
    pub dx: f32,
    pub dy: f32,
    pub bomb: bool,
    pub direction: Direction,
    #[serde(default)]
    pub kick: bool,
    /// Bomb walked into this tick, kicked by the authority
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bump: Option<Bump>,
    /// Sent as a ghost; the authority drops reports that no longer match
    #[serde(default)]
    pub is_misobon: bool,
}

/// Per-player part of a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub x: f32,
    pub y: f32,
    pub alive: bool,
    pub is_misobon: bool,
    pub fire_power: u32,
    pub max_bombs: u32,
    pub has_kick: bool,
    pub direction: Direction,
    pub moving: bool,
    pub score: u32,
}

impl From<&Player> for PlayerState {
    fn from(p: &Player) -> Self {
        Self {
            x: p.pos.x,
            y: p.pos.y,
            alive: p.alive,
            is_misobon: p.is_misobon,
            fire_power: p.fire_power,
            max_bombs: p.max_bombs,
            has_kick: p.has_kick,
            direction: p.direction,
            moving: p.moving,
            score: p.score,
        }
    }
}

/// Authority → replica: the whole world
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub players: Vec<PlayerState>,
    pub bombs: Vec<Bomb>,
    pub explosions: Vec<Explosion>,
    pub items: Vec<Item>,
    pub map_grid: Vec<Vec<Tile>>,
    pub time_remaining: f32,
    pub state: MatchPhase,
    pub misobons: Vec<Ghost>,
}

impl Snapshot {
    pub fn capture(state: &MatchState) -> Self {
        Self {
            players: state.players.iter().map(PlayerState::from).collect(),
            bombs: state.bombs.bombs().to_vec(),
            explosions: state.bombs.explosions().to_vec(),
            items: state.map.items.clone(),
            map_grid: state.map.rows(),
            time_remaining: state.time_remaining,
            state: state.phase,
            misobons: state.ghosts.ghosts().to_vec(),
        }
    }

    /// Overwrite local state with the snapshot. The local player's position,
    /// facing and motion (and its ghost's patrol position) stay local, except
    /// when the snapshot brings the local player back from ghost duty: then it
    /// reappears where the authority put it.
    /// Applying the same snapshot twice leaves the same state.
    pub fn apply(&self, state: &mut MatchState) {
        let local = state.local_player();
        let previous_scores: Vec<u32> = state.players.iter().map(|p| p.score).collect();

        for (player, ps) in state.players.iter_mut().zip(&self.players) {
            let revived = !player.is_active() && ps.alive && !ps.is_misobon;
            if Some(player.id) != local || revived {
                player.pos = Vec2::new(ps.x, ps.y);
                player.direction = ps.direction;
                player.moving = ps.moving;
            }
            if revived {
                player.target_tile = tile_of(player.pos);
            }
            player.alive = ps.alive;
            player.is_misobon = ps.is_misobon;
            player.fire_power = ps.fire_power;
            player.max_bombs = ps.max_bombs;
            player.has_kick = ps.has_kick;
            player.score = ps.score;
        }

        state.bombs.replace(self.bombs.clone(), self.explosions.clone());
        state.map.items = self.items.clone();
        state.map.set_rows(&self.map_grid);
        state.time_remaining = self.time_remaining;

        let local_ghost_pos = local.and_then(|id| state.ghosts.get(id)).map(|g| (g.side, g.pos));
        state.ghosts.replace(self.misobons.clone());
        if let Some((side, pos)) = local_ghost_pos {
            if let Some(ghost) = local.and_then(|id| state.ghosts.get_mut(id)) {
                if ghost.side == side {
                    ghost.move_to(pos);
                }
            }
        }

        if state.phase != self.state {
            let from = state.phase;
            state.phase = self.state;
            log::debug!("Replica phase {:?} -> {:?}", from, self.state);
            state.events.push(GameEvent::PhaseChanged {
                from,
                to: self.state,
            });
            if self.state == MatchPhase::RoundEnd {
                let winner = state
                    .players
                    .iter()
                    .zip(&previous_scores)
                    .find(|(p, old)| p.score > **old)
                    .map(|(p, _)| p.id);
                state.round_winner = winner;
                state.events.push(GameEvent::RoundEnded { winner });
            }
        }
    }
}

impl InputReport {
    /// Report for the local player, if it has anything to report
    pub fn capture(state: &MatchState, dir: Vec2, bomb: bool, kick: bool) -> Option<Self> {
        let id = state.local_player()?;
        let player = state.player(id)?;
        let (pos, bump) = if player.is_active() {
            (player.pos, state.pending_bump)
        } else if player.is_misobon {
            (state.ghosts.get(id)?.pos, None)
        } else {
            return None;
        };
        Some(Self {
            player_id: id,
            x: pos.x,
            y: pos.y,
            dx: dir.x,
            dy: dir.y,
            bomb,
            direction: player.direction,
            kick,
            bump,
            is_misobon: player.is_misobon,
        })
    }

    /// Authority side: adopt the reported position and act on the triggers
    pub fn apply(&self, state: &mut MatchState) {
        if !state.phase.is_live() {
            return;
        }
        let id = self.player_id;
        let Some(player) = state.players.get_mut(id as usize) else {
            log::warn!("Input report for unknown player {}", id);
            return;
        };
        let pos = Vec2::new(self.x, self.y);

        if player.is_misobon != self.is_misobon {
            log::debug!("Dropping stale input report from player {}", id);
            return;
        }

        if player.is_active() {
            player.pos = pos;
            player.direction = self.direction;
            player.moving = self.dx != 0.0 || self.dy != 0.0;
            if let Some(bump) = self.bump {
                player.kick_bumped(bump, &mut state.bombs);
            }
            if self.kick {
                player.request_kick(&mut state.bombs);
            }
            if self.bomb {
                state.place_bomb(id);
            }
            state.pick_up(id);
        } else if player.is_misobon {
            if let Some(ghost) = state.ghosts.get_mut(id) {
                ghost.move_to(pos);
            }
            if self.bomb {
                state.throw_ghost_bomb(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchConfig;
    use crate::sim::{Role, TickInput, tick};
    use glam::IVec2;

    fn host() -> MatchState {
        let mut config = MatchConfig::networked(0, Difficulty::Weak, Difficulty::Strong);
        config.seed = 21;
        let mut state = MatchState::new(config, Role::Authority);
        state.start_round();
        state.transition(MatchPhase::Playing);
        state
    }

    fn peer() -> MatchState {
        let config = MatchConfig::networked(1, Difficulty::Normal, Difficulty::Normal);
        MatchState::new(config, Role::Replica)
    }

    #[test]
    fn test_message_shape() {
        let report = Message::PlayerInput(InputReport {
            player_id: 1,
            x: 2.5,
            y: 3.0,
            dx: 1.0,
            dy: 0.0,
            bomb: true,
            direction: Direction::Right,
            kick: false,
            bump: None,
            is_misobon: false,
        });
        let json = encode(&report).unwrap();
        assert!(json.contains(r#""type":"player_input""#));
        assert!(json.contains(r#""playerId":1"#));
        assert_eq!(decode(&json).unwrap(), report);
        assert!(decode(r#"{"type":"warp_drive"}"#).is_err());
    }

    #[test]
    fn test_start_round_rebuilds_peer_round() {
        let host = host();
        let mut peer = peer();
        peer.players[1].score = 1;

        let msg = Message::StartRound(RoundStart::capture(&host));
        let Message::StartRound(start) = decode(&encode(&msg).unwrap()).unwrap() else {
            panic!("wrong message kind");
        };
        start.apply(&mut peer);

        assert_eq!(peer.map.rows(), host.map.rows());
        assert_eq!(peer.map.items, host.map.items);
        assert_eq!(peer.phase, MatchPhase::Countdown);
        assert_eq!(peer.players[1].score, 1);
        assert_eq!(peer.config.slots[2], Slot::Agent(Difficulty::Weak));
        assert_eq!(peer.config.slots[3], Slot::Agent(Difficulty::Strong));
        // Replicas never run agents
        assert!(peer.agents.iter().all(|a| a.is_none()));
    }

    #[test]
    fn test_snapshot_reproduces_world_except_local_position() {
        let mut host = host();
        host.bombs.place(IVec2::new(1, 2), 0, 2, 1);
        host.players[1].pos = Vec2::new(10.5, 9.0);
        host.players[3].fire_power = 4;
        for _ in 0..30 {
            tick(&mut host, &TickInput::default(), 0.05);
        }

        let mut peer = peer();
        RoundStart::capture(&host).apply(&mut peer);
        peer.players[1].pos = Vec2::new(11.0, 8.2);

        let snapshot = Snapshot::capture(&host);
        let wire = encode(&Message::GameState(snapshot.clone())).unwrap();
        let Message::GameState(received) = decode(&wire).unwrap() else {
            panic!("wrong message kind");
        };
        received.apply(&mut peer);

        assert_eq!(peer.map.rows(), host.map.rows());
        assert_eq!(peer.map.items, host.map.items);
        assert_eq!(peer.bombs.bombs(), host.bombs.bombs());
        assert_eq!(peer.bombs.explosions(), host.bombs.explosions());
        assert_eq!(peer.phase, host.phase);
        assert_eq!(peer.time_remaining, host.time_remaining);
        for id in [0usize, 2, 3] {
            assert_eq!(peer.players[id].pos, host.players[id].pos);
            assert_eq!(peer.players[id].fire_power, host.players[id].fire_power);
        }
        // Local player keeps its own position
        assert_eq!(peer.players[1].pos, Vec2::new(11.0, 8.2));

        // Idempotent
        let players = peer.players.clone();
        let rows = peer.map.rows();
        received.apply(&mut peer);
        assert_eq!(peer.players, players);
        assert_eq!(peer.map.rows(), rows);
        assert_eq!(Snapshot::capture(&peer).bombs, snapshot.bombs);
    }

    #[test]
    fn test_snapshot_round_end_names_winner() {
        let mut host = host();
        let mut peer = peer();
        RoundStart::capture(&host).apply(&mut peer);
        host.end_round(Some(3));
        Snapshot::capture(&host).apply(&mut peer);
        assert_eq!(peer.phase, MatchPhase::RoundEnd);
        assert_eq!(peer.round_winner, Some(3));
        assert!(peer.events.contains(&GameEvent::RoundEnded { winner: Some(3) }));
    }

    #[test]
    fn test_input_report_drives_remote_player() {
        let mut host = host();
        let report = InputReport {
            player_id: 1,
            x: 10.4,
            y: 9.0,
            dx: -1.0,
            dy: 0.0,
            bomb: true,
            direction: Direction::Left,
            kick: false,
            bump: None,
            is_misobon: false,
        };
        report.apply(&mut host);
        assert_eq!(host.players[1].pos, Vec2::new(10.4, 9.0));
        assert_eq!(host.players[1].direction, Direction::Left);
        assert!(host.players[1].moving);
        assert!(host.bombs.has_bomb_at(IVec2::new(10, 9)));
    }

    #[test]
    fn test_ghost_report_stays_on_edge() {
        let mut host = host();
        let (players, ghosts, rng) = (&mut host.players, &mut host.ghosts, &mut host.rng);
        ghosts.add(&mut players[1], rng);
        let before = host.ghosts.get(1).cloned().unwrap();

        let report = InputReport {
            player_id: 1,
            x: 5.0,
            y: 5.0,
            dx: 0.0,
            dy: 0.0,
            bomb: false,
            direction: Direction::Down,
            kick: false,
            bump: None,
            is_misobon: true,
        };
        report.apply(&mut host);
        let ghost = host.ghosts.get(1).unwrap();
        assert_eq!(ghost.side, before.side);
        // Projected onto its own edge
        assert!(ghost.pos.x == before.pos.x || ghost.pos.y == before.pos.y);
    }

    #[test]
    fn test_reports_from_a_previous_life_are_dropped() {
        let mut host = host();
        let spawn = host.players[1].pos;
        let as_ghost = InputReport {
            player_id: 1,
            x: 5.0,
            y: -0.5,
            dx: 0.0,
            dy: 0.0,
            bomb: true,
            direction: Direction::Down,
            kick: false,
            bump: None,
            is_misobon: true,
        };
        as_ghost.apply(&mut host);
        assert_eq!(host.players[1].pos, spawn);
        assert!(host.bombs.bombs().is_empty());

        let (players, ghosts, rng) = (&mut host.players, &mut host.ghosts, &mut host.rng);
        ghosts.add(&mut players[1], rng);
        let ghost_before = host.ghosts.get(1).cloned().unwrap();
        let as_player = InputReport {
            is_misobon: false,
            x: 9.0,
            y: 9.0,
            ..as_ghost
        };
        as_player.apply(&mut host);
        assert_eq!(host.ghosts.get(1), Some(&ghost_before));
        assert!(host.bombs.bombs().is_empty());
    }

    #[test]
    fn test_reported_bump_kicks_on_host() {
        let mut host = host();
        host.players[1].has_kick = true;
        host.bombs.place(IVec2::new(10, 9), 2, 1, 1);
        let bump = Bump {
            tile: IVec2::new(10, 9),
            dir: Direction::Left,
        };
        let report = InputReport {
            player_id: 1,
            x: 10.75,
            y: 9.0,
            dx: -1.0,
            dy: 0.0,
            bomb: false,
            direction: Direction::Left,
            kick: false,
            bump: Some(bump),
            is_misobon: false,
        };
        let wire = encode(&Message::PlayerInput(report)).unwrap();
        assert!(wire.contains(r#""bump""#));
        let Message::PlayerInput(received) = decode(&wire).unwrap() else {
            panic!("wrong message kind");
        };
        received.apply(&mut host);
        let bomb = host.bombs.bomb_at(IVec2::new(10, 9)).unwrap();
        assert!(bomb.kicked);
        assert_eq!(bomb.kick_dir, Some(Direction::Left));
    }

    #[test]
    fn test_revived_local_player_takes_authority_position() {
        let mut host = host();
        let mut peer = peer();
        RoundStart::capture(&host).apply(&mut peer);

        let (players, ghosts, rng) = (&mut host.players, &mut host.ghosts, &mut host.rng);
        ghosts.add(&mut players[1], rng);
        Snapshot::capture(&host).apply(&mut peer);
        assert!(peer.players[1].is_misobon);
        let died_at = peer.players[1].pos;

        let victim = host.players[2].pos;
        let (players, ghosts, rng) = (&mut host.players, &mut host.ghosts, &mut host.rng);
        assert!(ghosts.swap(1, 2, players, rng));
        assert_ne!(victim, died_at);

        Snapshot::capture(&host).apply(&mut peer);
        assert!(peer.players[1].is_active());
        assert_eq!(peer.players[1].pos, victim);
        assert_eq!(peer.players[1].target_tile, tile_of(victim));

        // Once active again, the local position is local
        peer.players[1].pos = victim + Vec2::new(0.2, 0.0);
        Snapshot::capture(&host).apply(&mut peer);
        assert_eq!(peer.players[1].pos, victim + Vec2::new(0.2, 0.0));
    }
}
