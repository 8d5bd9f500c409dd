//! citymine-node: replays block scripts against the citymine protocol.
//!
//! Startup sequence:
//!   1. Load genesis params (file, or the built-in devnet) and apply overrides
//!   2. Open the state database if `--data-dir` is given, else run in memory
//!   3. Resume from the stored snapshot or start from genesis
//!   4. Feed script blocks through a channel into the block loop
//!   5. Print a JSON summary of the final state to stdout

mod script;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use citymine_core::params::ProtocolParams;
use citymine_crypto::Blake3Draw;
use citymine_genesis::{apply_genesis, genesis_fingerprint, GenesisParams};
use citymine_state::{StateDb, StateEngine};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::script::{RunSummary, Script, ScriptBlock, Tally};

const META_GENESIS: &str = "genesis_fingerprint";

#[derive(Parser, Debug)]
#[command(
    name = "citymine-node",
    version,
    about = "citymine node: applies mining and stacking blocks and reports protocol state"
)]
struct Args {
    /// Directory for the persistent state database. In-memory when omitted.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Path to genesis params JSON (only read on first run).
    #[arg(long)]
    genesis: Option<PathBuf>,

    /// Protocol params JSON that replaces the genesis params' protocol section.
    #[arg(long)]
    params: Option<PathBuf>,

    /// Block script JSON to replay.
    #[arg(long)]
    script: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,citymine=debug")),
        )
        .init();

    let args = Args::parse();
    info!("citymine node starting");

    // ── Genesis ──────────────────────────────────────────────────────────────
    let mut genesis_params = load_or_default_genesis_params(args.genesis.as_deref())?;
    if let Some(path) = &args.params {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading protocol params from {}", path.display()))?;
        genesis_params.params = ProtocolParams::from_json(&json).context("parsing protocol params")?;
    }
    let genesis = apply_genesis(&genesis_params).context("applying genesis")?;
    let fingerprint = genesis_fingerprint(&genesis_params)?;

    // ── State engine ─────────────────────────────────────────────────────────
    let engine = match &args.data_dir {
        Some(dir) => {
            let data_dir = expand_tilde(dir);
            std::fs::create_dir_all(&data_dir)
                .with_context(|| format!("creating data dir {}", data_dir.display()))?;
            let db = Arc::new(StateDb::open(&data_dir).context("opening state database")?);
            match db.get_meta(META_GENESIS)? {
                Some(stored) if stored != fingerprint => {
                    bail!("database at {} was built from different genesis params", data_dir.display())
                }
                Some(_) => {}
                None => db.put_meta(META_GENESIS, &fingerprint)?,
            }
            StateEngine::open(db, genesis, Box::new(Blake3Draw)).context("opening state engine")?
        }
        None => StateEngine::new(genesis),
    };
    info!(height = engine.current_height(), "state engine ready");

    // ── Block loop ───────────────────────────────────────────────────────────
    let script = match &args.script {
        Some(path) => Script::from_path(path)?,
        None => Script::default(),
    };

    let (block_tx, mut block_rx) = mpsc::channel::<ScriptBlock>(64);
    tokio::spawn(async move {
        for block in script.blocks {
            if block_tx.send(block).await.is_err() {
                break;
            }
        }
    });

    let mut tally = Tally::default();
    while let Some(block) = block_rx.recv().await {
        if let Some(height) = block.height {
            let tip = engine.current_height();
            if height <= tip {
                bail!("script block pinned at height {height} is not above the tip ({tip})");
            }
            engine
                .mine_empty_blocks_until(height - 1)
                .with_context(|| format!("advancing to height {}", height - 1))?;
        }
        let receipt = engine.apply_block(block.submissions).context("applying block")?;
        for r in receipt.receipts.iter().filter(|r| !r.is_ok()) {
            if let Err(e) = &r.result {
                warn!(height = receipt.height, sender = %r.sender, code = e.code(), error = %e, "submission rejected");
            }
        }
        tally.record(&receipt);
    }

    let summary = engine.query(|q| RunSummary::collect(q, tally));
    info!(
        height = summary.height,
        accepted = summary.accepted,
        rejected = summary.rejected.len(),
        "script replay finished"
    );
    println!("{}", serde_json::to_string_pretty(&summary).context("encoding summary")?);
    Ok(())
}

/// Load genesis parameters from a JSON file, or fall back to the devnet.
fn load_or_default_genesis_params(path: Option<&Path>) -> anyhow::Result<GenesisParams> {
    if let Some(p) = path {
        let json = std::fs::read_to_string(p)
            .with_context(|| format!("reading genesis params from {}", p.display()))?;
        return GenesisParams::from_json(&json).context("parsing genesis params JSON");
    }
    warn!("No --genesis provided. Using devnet params; DO NOT USE IN PRODUCTION.");
    Ok(GenesisParams::devnet())
}

/// Expand a leading `~` to the user's home directory (`HOME` or `USERPROFILE`).
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}
