//! Blast Arena headless runner
//!
//! Plays an all-agent match at the fixed simulation step and logs the result.
//! With `--loopback` a replica mirrors the match over an in-process transport.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;

use blast_arena::MatchConfig;
use blast_arena::consts::SIM_DT;
use blast_arena::net::{LoopbackTransport, Session};
use blast_arena::sim::{Difficulty, GameEvent, MatchPhase, MatchState, Role, TickInput, tick};

#[derive(Debug, Parser)]
#[command(name = "blast-arena", about = "Run a headless Blast Arena match")]
struct Args {
    /// Match config (JSON); defaults to four agents
    #[arg(long)]
    config: Option<PathBuf>,

    /// RNG seed (random when omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Round length in seconds
    #[arg(long)]
    time_limit: Option<f32>,

    /// Agent difficulty when no config is given
    #[arg(long, default_value = "normal")]
    difficulty: Difficulty,

    /// Give up after this many simulation ticks
    #[arg(long, default_value_t = 60 * 60 * 20)]
    max_ticks: u64,

    /// Mirror the match into a replica over a loopback transport
    #[arg(long)]
    loopback: bool,
}

fn build_config(args: &Args) -> Result<MatchConfig> {
    let mut config = match &args.config {
        Some(path) => MatchConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => MatchConfig::all_agents(args.difficulty),
    };
    config.seed = args.seed.unwrap_or_else(rand::random);
    if let Some(limit) = args.time_limit {
        config.time_limit = limit;
    }
    config.validate().context("invalid match config")?;
    Ok(config)
}

fn log_event(tick_no: u64, event: &GameEvent) {
    match event {
        GameEvent::RoundStarted { .. }
        | GameEvent::RoundEnded { .. }
        | GameEvent::MatchEnded { .. }
        | GameEvent::SuddenDeath
        | GameEvent::Disconnected => log::info!("[{}] {:?}", tick_no, event),
        _ => log::debug!("[{}] {:?}", tick_no, event),
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = build_config(&args)?;
    log::info!("Blast Arena starting with seed {}", config.seed);

    let mut host = MatchState::new(config.clone(), Role::Authority);
    let mut mirror = if args.loopback {
        let (a, b) = LoopbackTransport::pair();
        let replica = MatchState::new(config.clone(), Role::Replica);
        Some((
            Session::new(a, config.sync_rate_hz),
            replica,
            Session::new(b, config.sync_rate_hz),
        ))
    } else {
        None
    };

    host.start_round();
    let input = TickInput::default();
    let mut ticks = 0;
    while host.phase != MatchPhase::MatchEnd {
        if ticks >= args.max_ticks {
            bail!("match did not finish within {} ticks", args.max_ticks);
        }
        match &mut mirror {
            Some((host_session, replica, replica_session)) => {
                host_session.step(&mut host, &input, SIM_DT);
                replica_session.step(replica, &input, SIM_DT);
            }
            None => tick(&mut host, &input, SIM_DT),
        }
        for event in host.drain_events() {
            log_event(ticks, &event);
        }
        ticks += 1;
    }

    let champion = host.champion().context("match ended without a champion")?;
    println!(
        "Player {} wins after {} rounds ({:.1}s simulated)",
        champion,
        host.round,
        ticks as f32 * SIM_DT
    );
    for player in &host.players {
        println!("  player {}: {} points", player.id, player.score);
    }

    if let Some((_, mut replica, mut replica_session)) = mirror {
        replica_session.pump(&mut replica);
        let host_scores: Vec<u32> = host.players.iter().map(|p| p.score).collect();
        let replica_scores: Vec<u32> = replica.players.iter().map(|p| p.score).collect();
        if host_scores != replica_scores {
            bail!("replica diverged: {:?} vs {:?}", replica_scores, host_scores);
        }
        log::info!("Replica agrees on the final score");
    }
    Ok(())
}
