//! Replay a recorded StratSync event stream.
//!
//! Feeds a JSON-lines recording of server events (initialization first)
//! through a read-only session store and prints the resulting strategy.
//!
//! Usage:
//!   stratsync-replay events.jsonl
//!   stratsync-replay events.jsonl --seed strategy.json --json
//!   RUST_LOG=stratsync_client=trace stratsync-replay events.jsonl

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use stratsync_client::constants::CONFIG_FILE_NAME;
use stratsync_client::{ClientConfig, ConnectOptions, ServerEvent, StratSyncStore};
use stratsync_types::{Raid, RaidId, Strategy, StrategyId};

/// Replay a recorded strategy event stream.
#[derive(Parser, Debug)]
#[command(name = "stratsync-replay")]
#[command(about = "Replay a recorded StratSync event stream and print the result")]
struct Args {
    /// Recording: one JSON server event per line
    recording: PathBuf,

    /// Seed strategy (JSON) carrying raid data and notes
    #[arg(long)]
    seed: Option<PathBuf>,

    /// Client config (RON). Defaults to ./stratsync.ron when present
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the final strategy as JSON instead of a summary
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;
    let seed = match &args.seed {
        Some(path) => load_seed(path)?,
        None => Strategy::new(StrategyId::new(), "replay", Raid::empty(RaidId::new(), "unknown")),
    };

    let recording = std::fs::read_to_string(&args.recording)
        .with_context(|| format!("failed to read {}", args.recording.display()))?;
    let store = replay(seed, &recording, &config)?;

    let doc = store.doc().canonicalize();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&doc)?);
    } else {
        print!("{}", summarize(&store));
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<ClientConfig> {
    let path = match path {
        Some(path) => path,
        None if Path::new(CONFIG_FILE_NAME).exists() => Path::new(CONFIG_FILE_NAME),
        None => return Ok(ClientConfig::default()),
    };
    tracing::debug!(path = %path.display(), "loading config");
    ClientConfig::load(path).with_context(|| format!("invalid config {}", path.display()))
}

fn load_seed(path: &Path) -> Result<Strategy> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid seed {}", path.display()))
}

/// Apply every event in `recording` to a fresh read-only store.
fn replay(seed: Strategy, recording: &str, config: &ClientConfig) -> Result<StratSyncStore> {
    let mut store = StratSyncStore::with_history_capacity(seed, config.history_capacity);
    store.begin_connect(ConnectOptions::default())?;

    let mut applied = 0usize;
    for (index, line) in recording.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let event: ServerEvent = serde_json::from_str(line)
            .with_context(|| format!("line {}: not a server event", index + 1))?;
        store
            .apply_event(event)
            .with_context(|| format!("line {}: replay stopped", index + 1))?;
        applied += 1;
    }

    if applied == 0 {
        bail!("recording is empty");
    }
    tracing::info!(events = applied, revision = store.revision(), "replay complete");
    Ok(store)
}

fn summarize(store: &StratSyncStore) -> String {
    let doc = store.doc().canonicalize();
    let mut out = String::new();

    let _ = writeln!(out, "{} ({}) revision {}", doc.name, doc.raid.name, store.revision());
    for player in doc.players.iter() {
        let job = player.job.map(|j| j.to_string()).unwrap_or_else(|| "-".into());
        let _ = writeln!(out, "  [{}] {job} {}", player.order, player.id);
        for entry in player.entries.iter() {
            let _ = writeln!(out, "      {:>5}s  {}", entry.use_at, entry.action);
        }
    }
    let _ = writeln!(out, "damage options: {}", doc.damage_options.len());
    for note in doc.notes.iter() {
        let _ = writeln!(out, "note ({}, {}): {}", note.x, note.y, note.content);
    }
    out
}
