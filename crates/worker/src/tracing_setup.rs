#![forbid(unsafe_code)]

//! Subscriber setup for the worker binary.
//!
//! Filter priority: `BOARDGRAPH_LOG` > `RUST_LOG` > `-v`/`-q` flags.
//! Output goes to stderr.

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

const TARGET_PREFIX: &str = "boardgraph";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

impl Verbosity {
    /// Verbose wins when both flags are given.
    pub(crate) const fn from_flags(verbose: bool, quiet: bool) -> Self {
        if verbose {
            Self::Verbose
        } else if quiet {
            Self::Quiet
        } else {
            Self::Normal
        }
    }

    pub(crate) const fn default_level(self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::WARN,
            Self::Verbose => Level::DEBUG,
        }
    }
}

/// Installs the global subscriber; a second call is a no-op.
pub(crate) fn init_subscriber(verbosity: Verbosity) {
    let filter = build_env_filter(verbosity);
    let use_ansi = std::io::IsTerminal::is_terminal(&std::io::stderr());

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(use_ansi)
        .with_target(true)
        .with_level(true);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer.with_timer(fmt::time::uptime()))
        .try_init();
}

fn build_env_filter(verbosity: Verbosity) -> EnvFilter {
    if let Ok(directives) = std::env::var("BOARDGRAPH_LOG")
        && let Ok(filter) = EnvFilter::try_new(&directives)
    {
        return filter;
    }

    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    EnvFilter::try_new(fallback_directive(verbosity))
        .unwrap_or_else(|_| EnvFilter::new(verbosity.default_level().as_str()))
}

// Normal mode still reports persists and deferrals from the engine.
fn fallback_directive(verbosity: Verbosity) -> String {
    let level = verbosity.default_level();
    match verbosity {
        Verbosity::Verbose => format!("{level},{TARGET_PREFIX}=debug"),
        Verbosity::Normal => format!("{level},{TARGET_PREFIX}=info"),
        Verbosity::Quiet => level.to_string(),
    }
}
