//! Haunts host binary.
//!
//! Loads the data directory, builds a runtime for one scenario and drives it
//! at the configured frame rate until the scenario ends, the frame limit is
//! reached or the process is interrupted. The host is headless: dialogs take
//! their first choice and rosters are placed front to back.
//!
//! ```bash
//! RUST_LOG=runtime::turn=debug haunts lvl1 --seed 7 --max-frames 20000
//! ```

mod logging;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use haunts_content::ContentFactory;
use haunts_core::Side;
use haunts_runtime::{
    AiTarget, Event, FrameStatus, NetIdStore, Runtime, RuntimeConfig, Topic, TurnEvent,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

/// Turn-based haunted-house skirmish
#[derive(Parser, Debug)]
#[command(name = "haunts")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Scenario script under `data/scenarios`
    #[arg(default_value = "lvl1")]
    scenario: String,

    /// Content root; overrides HAUNTS_DATA_DIR
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// PRNG seed; random when omitted
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many frames
    #[arg(long)]
    max_frames: Option<u64>,

    /// Let an AI script play the intruders
    #[arg(long, value_name = "AI")]
    autoplay: Option<String>,

    /// Player record to update when the game ends
    #[arg(long, default_value = "player")]
    player: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let _guard = logging::setup_logging()?;

    let mut config = RuntimeConfig::from_env();
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    let seed = cli.seed.unwrap_or_else(rand::random);
    info!(target: "client", scenario = %cli.scenario, seed, data = %config.data_dir.display(), "starting");

    match NetIdStore::open(NetIdStore::default_dir()).and_then(|mut store| store.net_id()) {
        Ok(id) => info!(target: "client", net_id = %id, "identity"),
        Err(e) => warn!(target: "client", error = %e, "net identity unavailable"),
    }

    let players = ContentFactory::new(&config.data_dir).players();
    let frame_rate = config.frame_rate;
    let mut runtime = Runtime::builder()
        .config(config)
        .seed(seed)
        .scenario(&cli.scenario)
        .build()
        .with_context(|| format!("failed to start scenario {}", cli.scenario))?;
    if let Some(ai) = &cli.autoplay {
        runtime
            .bind_ai(AiTarget::Intruders, ai)
            .with_context(|| format!("failed to bind ai {ai}"))?;
    }
    let logger = tokio::spawn(log_turns(runtime.events().subscribe(Topic::Turn)));

    let status = drive(&mut runtime, frame_rate, cli.max_frames).await;
    logger.abort();

    if status == FrameStatus::Ended {
        let won = runtime
            .game()
            .side_entities(Side::Intruders)
            .any(|e| e.is_alive());
        let mut record = players.load_or_new(&cli.player)?;
        record.record_game(won);
        players.save(&record)?;
        info!(target: "client", player = %record.name, won, games = record.games_played, "game recorded");
    }
    info!(target: "client", ?status, turn = runtime.game().turn, "shutdown");
    runtime.shutdown();
    Ok(())
}

/// Frame loop. Frames run on a worker thread because the script bridge and
/// scripted AIs block briefly while they hand over.
async fn drive(runtime: &mut Runtime, frame_rate: u32, max_frames: Option<u64>) -> FrameStatus {
    let dt = 1.0 / f64::from(frame_rate.max(1));
    let mut ticker = tokio::time::interval(Duration::from_secs_f64(dt));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut frames = 0u64;
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!(target: "client", "interrupted");
                return FrameStatus::Quit;
            }
        }
        let status = tokio::task::block_in_place(|| runtime.frame(dt));
        if status != FrameStatus::Running {
            return status;
        }
        frames += 1;
        if max_frames.is_some_and(|max| frames >= max) {
            info!(target: "client", frames, "frame limit reached");
            return FrameStatus::Quit;
        }
    }
}

async fn log_turns(mut rx: tokio::sync::broadcast::Receiver<Event>) {
    loop {
        match rx.recv().await {
            Ok(Event::Turn(TurnEvent::StateChanged { turn, side, to, .. })) => {
                info!(target: "client", turn, %side, state = %to, "turn state");
            }
            Ok(Event::Turn(TurnEvent::ScriptFailed { callback, message })) => {
                warn!(target: "client", %callback, %message, "script callback failed");
            }
            Ok(_) => {}
            Err(RecvError::Lagged(n)) => warn!(target: "client", skipped = n, "turn log lagged"),
            Err(RecvError::Closed) => return,
        }
    }
}
