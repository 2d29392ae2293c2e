#![forbid(unsafe_code)]

mod config;
mod drain;
mod tracing_setup;

use bg_storage::SqliteStore;
use config::{Command, WorkerConfig, env_var, load_tracking_config, parse_args, usage};
use std::time::Duration;
use tracing_setup::{Verbosity, init_subscriber};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let cfg = match parse_args(&args, env_var)? {
        Command::Help => {
            print!("{}", usage());
            return Ok(());
        }
        Command::Run(cfg) => cfg,
    };
    init_subscriber(Verbosity::from_flags(cfg.verbose, cfg.quiet));
    run(&cfg)
}

fn run(cfg: &WorkerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let tracking = load_tracking_config(cfg.config_path.as_deref())?;
    let mut store = SqliteStore::open(&cfg.storage_dir)?;
    tracing::info!(
        target: "boardgraph.worker",
        op = "start",
        storage_dir = %cfg.storage_dir.display(),
        poll_ms = cfg.poll_ms,
        claim_limit = cfg.claim_limit,
        once = cfg.once,
        "worker started"
    );

    loop {
        let stats = drain::drain_once(&mut store, &tracking, cfg.claim_limit)?;
        // A full batch means more may already be due.
        if stats.claimed >= cfg.claim_limit {
            continue;
        }
        if cfg.once {
            return Ok(());
        }
        std::thread::sleep(Duration::from_millis(cfg.poll_ms));
    }
}
