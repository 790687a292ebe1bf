//! One endpoint of a host-authoritative match
//!
//! The authority announces every round with `start_round` and streams
//! snapshots at the configured rate, plus one immediately whenever a round or
//! the match ends. The replica reports its local player every live tick.

use super::protocol::{InputReport, Message, RoundStart, Snapshot};
use super::transport::Transport;
use crate::error::Error;
use crate::sim::{GameEvent, MatchPhase, MatchState, TickInput, tick};

pub struct Session<T: Transport> {
    transport: T,
    sync_interval: f32,
    sync_timer: f32,
    /// Last round announced to the peer (authority only)
    announced_round: u32,
    last_phase: MatchPhase,
    connected: bool,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T, sync_rate_hz: f32) -> Self {
        Self {
            transport,
            sync_interval: 1.0 / sync_rate_hz.max(1.0),
            sync_timer: 0.0,
            announced_round: 0,
            last_phase: MatchPhase::Waiting,
            connected: true,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Receive, simulate, send
    pub fn step(&mut self, state: &mut MatchState, input: &TickInput, dt: f32) {
        self.pump(state);
        tick(state, input, dt);
        self.flush(state, input, dt);
    }

    /// Apply every queued inbound message
    pub fn pump(&mut self, state: &mut MatchState) {
        while self.connected {
            match self.transport.poll() {
                Ok(Some(message)) => self.receive(state, message),
                Ok(None) => break,
                Err(Error::Disconnected) => self.disconnect(state),
                Err(e) => log::warn!("Dropping unreadable message: {}", e),
            }
        }
    }

    fn receive(&mut self, state: &mut MatchState, message: Message) {
        match (state.is_authority(), message) {
            (true, Message::PlayerInput(report)) => {
                if Some(report.player_id) == state.local_player() {
                    log::warn!("Peer sent input for the host's player {}", report.player_id);
                } else {
                    report.apply(state);
                }
            }
            (false, Message::StartRound(start)) => start.apply(state),
            (false, Message::GameState(snapshot)) => snapshot.apply(state),
            (authority, message) => {
                log::warn!("Unexpected message (authority: {}): {:?}", authority, message)
            }
        }
    }

    /// Send whatever this tick produced
    pub fn flush(&mut self, state: &mut MatchState, input: &TickInput, dt: f32) {
        if !self.connected {
            return;
        }
        if state.is_authority() {
            self.flush_authority(state, dt);
        } else if state.phase.is_live() {
            if let Some(report) = InputReport::capture(state, input.dir, input.bomb, input.kick) {
                self.send(state, Message::PlayerInput(report));
            }
        }
    }

    fn flush_authority(&mut self, state: &mut MatchState, dt: f32) {
        if state.round != self.announced_round {
            self.announced_round = state.round;
            self.send(state, Message::StartRound(RoundStart::capture(state)));
        }

        let phase_changed = state.phase != self.last_phase;
        self.last_phase = state.phase;
        let round_over = matches!(state.phase, MatchPhase::RoundEnd | MatchPhase::MatchEnd);

        if phase_changed && round_over {
            self.sync_timer = 0.0;
            self.send(state, Message::GameState(Snapshot::capture(state)));
        } else if state.phase.is_live() {
            self.sync_timer += dt;
            if self.sync_timer >= self.sync_interval {
                self.sync_timer -= self.sync_interval;
                self.send(state, Message::GameState(Snapshot::capture(state)));
            }
        }
    }

    fn send(&mut self, state: &mut MatchState, message: Message) {
        match self.transport.send(&message) {
            Ok(()) => {}
            Err(Error::Disconnected) => self.disconnect(state),
            Err(e) => log::warn!("Failed to send message: {}", e),
        }
    }

    /// Peer gone: tear the round down and tell the consumer
    fn disconnect(&mut self, state: &mut MatchState) {
        if !self.connected {
            return;
        }
        self.connected = false;
        log::warn!("Peer disconnected; aborting round {}", state.round);
        state.abort();
        state.events.push(GameEvent::Disconnected);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchConfig;
    use crate::consts::SIM_DT;
    use crate::net::transport::LoopbackTransport;
    use crate::sim::{Difficulty, Role};
    use crate::tile_of;
    use glam::{IVec2, Vec2};

    fn endpoints() -> (
        MatchState,
        Session<LoopbackTransport>,
        MatchState,
        Session<LoopbackTransport>,
    ) {
        let mut host_cfg = MatchConfig::networked(0, Difficulty::Normal, Difficulty::Weak);
        host_cfg.seed = 5;
        let peer_cfg = MatchConfig::networked(1, Difficulty::Strong, Difficulty::Strong);
        let (a, b) = LoopbackTransport::pair();
        let rate = host_cfg.sync_rate_hz;
        (
            MatchState::new(host_cfg, Role::Authority),
            Session::new(a, rate),
            MatchState::new(peer_cfg, Role::Replica),
            Session::new(b, rate),
        )
    }

    fn run(
        host: &mut MatchState,
        host_session: &mut Session<LoopbackTransport>,
        peer: &mut MatchState,
        peer_session: &mut Session<LoopbackTransport>,
        peer_input: &TickInput,
        ticks: usize,
    ) {
        for _ in 0..ticks {
            host_session.step(host, &TickInput::default(), SIM_DT);
            peer_session.step(peer, peer_input, SIM_DT);
        }
    }

    #[test]
    fn test_peer_follows_host_round() {
        let (mut host, mut hs, mut peer, mut ps) = endpoints();
        host.start_round();
        run(&mut host, &mut hs, &mut peer, &mut ps, &TickInput::default(), 2);

        assert_eq!(peer.round, 1);
        assert_eq!(peer.map.rows(), host.map.rows());
        assert_eq!(peer.config.cpu_pair(), host.config.cpu_pair());

        // Through the countdown and into live play
        run(&mut host, &mut hs, &mut peer, &mut ps, &TickInput::default(), 240);
        assert!(host.phase.is_live());
        assert_eq!(peer.phase, host.phase);
        assert!((peer.time_remaining - host.time_remaining).abs() < 0.5);
        for id in [2usize, 3] {
            let drift = peer.players[id].pos.distance(host.players[id].pos);
            assert!(drift < 1.0, "agent {} drifted {}", id, drift);
        }
    }

    #[test]
    fn test_peer_movement_and_bomb_reach_host() {
        let (mut host, mut hs, mut peer, mut ps) = endpoints();
        host.start_round();
        run(&mut host, &mut hs, &mut peer, &mut ps, &TickInput::default(), 200);
        assert!(host.phase.is_live());

        let start = host.players[1].pos;
        let walk = TickInput::from_stick(Vec2::new(-1.0, 0.0), false, false);
        run(&mut host, &mut hs, &mut peer, &mut ps, &walk, 10);
        hs.pump(&mut host);
        assert_ne!(peer.players[1].pos, start);
        assert_eq!(host.players[1].pos, peer.players[1].pos);

        let bomb = TickInput::from_stick(Vec2::ZERO, true, false);
        let tile: IVec2 = tile_of(peer.players[1].pos);
        run(&mut host, &mut hs, &mut peer, &mut ps, &bomb, 1);
        hs.pump(&mut host);
        assert!(host.bombs.bomb_at(tile).is_some_and(|b| b.owner_id == 1));

        // Replicated back on the next snapshot
        run(&mut host, &mut hs, &mut peer, &mut ps, &TickInput::default(), 4);
        assert!(peer.bombs.has_bomb_at(tile));
    }

    #[test]
    fn test_peer_bump_kick_is_performed_by_host() {
        let (mut host, mut hs, mut peer, mut ps) = endpoints();
        host.start_round();
        run(&mut host, &mut hs, &mut peer, &mut ps, &TickInput::default(), 200);
        host.players[1].has_kick = true;
        let bomb_tile = IVec2::new(10, 9);
        assert!(host.bombs.place(bomb_tile, 2, 1, 1));
        run(&mut host, &mut hs, &mut peer, &mut ps, &TickInput::default(), 4);
        assert!(peer.players[1].has_kick);
        assert!(peer.bombs.has_bomb_at(bomb_tile));

        let walk = TickInput::from_stick(Vec2::new(-1.0, 0.0), false, false);
        run(&mut host, &mut hs, &mut peer, &mut ps, &walk, 30);

        let bomb = host.bombs.bombs().iter().find(|b| b.owner_id == 2);
        assert!(bomb.is_some_and(|b| b.pos() != bomb_tile));
    }

    #[test]
    fn test_revived_peer_stays_where_the_host_put_it() {
        let (mut host, mut hs, mut peer, mut ps) = endpoints();
        host.start_round();
        run(&mut host, &mut hs, &mut peer, &mut ps, &TickInput::default(), 200);

        let (players, ghosts, rng) = (&mut host.players, &mut host.ghosts, &mut host.rng);
        ghosts.add(&mut players[1], rng);
        run(&mut host, &mut hs, &mut peer, &mut ps, &TickInput::default(), 10);
        assert!(peer.players[1].is_misobon);

        let victim = host.players[2].pos;
        let (players, ghosts, rng) = (&mut host.players, &mut host.ghosts, &mut host.rng);
        assert!(ghosts.swap(1, 2, players, rng));
        run(&mut host, &mut hs, &mut peer, &mut ps, &TickInput::default(), 10);
        hs.pump(&mut host);

        assert!(peer.players[1].is_active());
        assert_eq!(peer.players[1].pos, victim);
        assert_eq!(host.players[1].pos, victim);
    }

    #[test]
    fn test_round_end_synced_immediately() {
        let (mut host, mut hs, mut peer, mut ps) = endpoints();
        host.start_round();
        run(&mut host, &mut hs, &mut peer, &mut ps, &TickInput::default(), 200);
        host.end_round(Some(2));
        hs.flush(&mut host, &TickInput::default(), 0.0);
        ps.pump(&mut peer);
        assert_eq!(peer.phase, MatchPhase::RoundEnd);
        assert_eq!(peer.players[2].score, 1);
        assert_eq!(peer.round_winner, Some(2));
    }

    #[test]
    fn test_disconnect_aborts_round() {
        let (mut host, mut hs, _peer, ps) = endpoints();
        host.start_round();
        hs.step(&mut host, &TickInput::default(), SIM_DT);
        drop(ps);

        hs.step(&mut host, &TickInput::default(), SIM_DT);
        assert!(!hs.is_connected());
        assert_eq!(host.phase, MatchPhase::Waiting);
        assert!(host.events.contains(&GameEvent::Disconnected));
        assert!(host.bombs.bombs().is_empty());
    }
}
