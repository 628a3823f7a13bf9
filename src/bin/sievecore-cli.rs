//! A thin demo binary: loads a config file, scans one message file through
//! an otherwise-empty engine (concrete symbol callbacks are out of scope,
//! spec §1), and prints the resulting scan result as JSON.

use clap::Parser;
use serde::Serialize;
use sievecore::composite::CompositeRegistry;
use sievecore::config::{load_config, FileConfigSource};
use sievecore::scheduler::SymbolRegistry;
use sievecore::task::{Envelope, MessageHandle, Settings, Task};
use sievecore::Engine;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "sievecore-cli", version, about = "Scan a message file against a sievecore configuration")]
struct Cli {
    /// Path to the TOML configuration document.
    #[arg(long)]
    config: PathBuf,

    /// Path to the message to scan.
    message: PathBuf,

    /// Per-task deadline in milliseconds.
    #[arg(long, default_value_t = 10_000)]
    deadline_ms: u64,
}

#[derive(Serialize)]
struct ScanResultJson {
    action: String,
    score: f64,
    message: Option<String>,
    symbols: Vec<ScanSymbolJson>,
}

#[derive(Serialize)]
struct ScanSymbolJson {
    name: String,
    score: f64,
    options: Vec<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = match load_config(&FileConfigSource::new(&cli.config)) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("error: cannot load config '{}': {e}", cli.config.display());
            std::process::exit(1);
        }
    };

    let raw = match std::fs::read(&cli.message) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("error: cannot read message '{}': {e}", cli.message.display());
            std::process::exit(1);
        }
    };

    let symbols = SymbolRegistry::new();
    let mut composites = CompositeRegistry::new();
    for (name, def, policy) in config.composite_defs() {
        if let Err(e) = composites.register(name, &def.expression, def.score, policy, def.group.clone(), def.priority) {
            tracing::warn!(composite = name, error = %e, "dropping unparseable composite");
        }
    }

    let (engine, warnings) = Engine::build(symbols, composites, config, Duration::from_secs(1));
    for warning in &warnings {
        tracing::warn!(?warning, "non-fatal freeze warning");
    }

    let task = Task::new(MessageHandle::new(raw), Envelope::default(), Settings::default(), Duration::from_millis(cli.deadline_ms));
    let (result, errors) = engine.run_task(task);
    for error in &errors {
        tracing::warn!(%error, "scheduler error during scan");
    }

    let json = ScanResultJson {
        action: result.action.to_string(),
        score: result.score,
        message: result.message,
        symbols: result
            .symbols
            .into_iter()
            .map(|s| ScanSymbolJson {
                name: s.name,
                score: s.score,
                options: s.options,
            })
            .collect(),
    };
    println!("{}", serde_json::to_string_pretty(&json).expect("scan result always serializes"));
}
