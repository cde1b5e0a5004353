//! Trellis Demo
//!
//! Walks through the signals page and the deferrable page in the terminal,
//! with a script standing in for the user.
//!
//! Run with: cargo run -p trellis-demo -- --timer-ms 2000
//!
//! # Configuration
//!
//! - `--config <path>`: JSON runtime configuration (see `trellis_core::config`)
//! - `RUST_LOG`: Log filter (default: trellis_core=info,trellis_demo=info)

mod deferrable_demo;
mod signals_demo;
mod widgets;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trellis_core::config::Config;
use trellis_core::defer::FragmentState;
use trellis_core::reactive::Runtime;

use deferrable_demo::{DemoOptions, FRAGMENT_NAMES};

#[derive(Parser)]
#[command(name = "trellis-demo")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Scripted walkthrough of reactive signals and deferred fragments")]
struct Cli {
    /// Runtime configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Delay before the weather widget's timer trigger fires
    #[arg(long, default_value_t = 10_000)]
    timer_ms: u64,

    /// Simulated load time of every fragment
    #[arg(long, default_value_t = 300)]
    latency_ms: u64,

    /// Make this fragment's loader fail (chart, data-table, map, weather, prefetch)
    #[arg(long)]
    fail: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trellis_core=info,trellis_demo=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    if let Some(name) = &cli.fail {
        if !FRAGMENT_NAMES.contains(&name.as_str()) {
            bail!("unknown fragment {name:?}, expected one of {}", FRAGMENT_NAMES.join(", "));
        }
    }

    let config = match &cli.config {
        Some(path) => Config::from_path(path).with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };
    tracing::info!(?config, "starting trellis demo v{}", env!("CARGO_PKG_VERSION"));
    Runtime::configure(config.reactive.clone());

    let signals = signals_demo::run();

    let options = DemoOptions {
        timer: Duration::from_millis(cli.timer_ms),
        latency: Duration::from_millis(cli.latency_ms),
        fail: cli.fail,
    };
    let states = deferrable_demo::run(options, config.defer).await?;

    signals.dispose();
    let failed = states.iter().filter(|(_, state)| *state == FragmentState::Error).count();
    tracing::info!(fragments = states.len(), failed, "demo finished");

    Ok(())
}
