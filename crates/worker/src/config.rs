#![forbid(unsafe_code)]

use bg_core::TrackingConfig;
use std::path::{Path, PathBuf};

pub(crate) const DEFAULT_POLL_MS: u64 = 1_000;
pub(crate) const DEFAULT_CLAIM_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct WorkerConfig {
    pub(crate) storage_dir: PathBuf,
    pub(crate) poll_ms: u64,
    pub(crate) claim_limit: usize,
    pub(crate) config_path: Option<PathBuf>,
    pub(crate) once: bool,
    pub(crate) verbose: bool,
    pub(crate) quiet: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Command {
    Help,
    Run(WorkerConfig),
}

pub(crate) fn usage() -> &'static str {
    "bg_worker — run due board-graph tracking tasks from the schedule queue\n\n\
USAGE:\n\
  bg_worker [--storage-dir DIR] [--poll-ms MS] [--claim-limit N]\n\
            [--config FILE] [--once] [-v|--verbose] [-q|--quiet]\n\n\
ENV:\n\
  BOARDGRAPH_STORAGE_DIR, BOARDGRAPH_POLL_MS, BOARDGRAPH_CLAIM_LIMIT,\n\
  BOARDGRAPH_CONFIG (flags win), BOARDGRAPH_LOG / RUST_LOG (log filter).\n\n\
NOTES:\n\
  - `--config` points at a JSON tracking config; omitted keys keep their defaults.\n\
  - `--once` drains what is due now and exits.\n"
}

pub(crate) fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Flags override the environment; `env` is looked up for every setting.
pub(crate) fn parse_args<F>(args: &[String], env: F) -> Result<Command, String>
where
    F: Fn(&str) -> Option<String>,
{
    if args.iter().any(|a| a == "-h" || a == "--help") {
        return Ok(Command::Help);
    }

    let mut storage_dir: Option<PathBuf> = env("BOARDGRAPH_STORAGE_DIR").map(PathBuf::from);
    let mut poll_ms: u64 = match env("BOARDGRAPH_POLL_MS") {
        Some(v) => v
            .parse()
            .map_err(|_| "BOARDGRAPH_POLL_MS must be an integer (milliseconds)")?,
        None => DEFAULT_POLL_MS,
    };
    let mut claim_limit: usize = match env("BOARDGRAPH_CLAIM_LIMIT") {
        Some(v) => v
            .parse()
            .map_err(|_| "BOARDGRAPH_CLAIM_LIMIT must be a positive integer")?,
        None => DEFAULT_CLAIM_LIMIT,
    };
    let mut config_path: Option<PathBuf> = env("BOARDGRAPH_CONFIG").map(PathBuf::from);
    let mut once = false;
    let mut verbose = false;
    let mut quiet = false;

    let mut i = 0usize;
    while i < args.len() {
        let a = args[i].as_str();
        match a {
            "--storage-dir" => {
                i += 1;
                let v = args.get(i).ok_or("--storage-dir requires DIR")?;
                storage_dir = Some(PathBuf::from(v));
            }
            "--poll-ms" => {
                i += 1;
                let v = args.get(i).ok_or("--poll-ms requires MS")?;
                poll_ms = v
                    .parse::<u64>()
                    .map_err(|_| "--poll-ms must be an integer (milliseconds)")?;
            }
            "--claim-limit" => {
                i += 1;
                let v = args.get(i).ok_or("--claim-limit requires N")?;
                claim_limit = v
                    .parse::<usize>()
                    .map_err(|_| "--claim-limit must be a positive integer")?;
            }
            "--config" => {
                i += 1;
                let v = args.get(i).ok_or("--config requires FILE")?;
                config_path = Some(PathBuf::from(v));
            }
            "--once" => once = true,
            "-v" | "--verbose" => verbose = true,
            "-q" | "--quiet" => quiet = true,
            other => return Err(format!("unknown argument: {other}\n\n{}", usage())),
        }
        i += 1;
    }

    if claim_limit == 0 {
        return Err("claim limit must be positive".to_string());
    }
    let storage_dir = storage_dir.ok_or("--storage-dir (or BOARDGRAPH_STORAGE_DIR) is required")?;

    Ok(Command::Run(WorkerConfig {
        storage_dir,
        poll_ms: poll_ms.max(10),
        claim_limit,
        config_path,
        once,
        verbose,
        quiet,
    }))
}

pub(crate) fn load_tracking_config(path: Option<&Path>) -> Result<TrackingConfig, String> {
    let Some(path) = path else {
        return Ok(TrackingConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    TrackingConfig::from_json(&raw).map_err(|e| format!("{}: {e}", path.display()))
}
