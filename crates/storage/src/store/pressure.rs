#![forbid(unsafe_code)]

use super::*;

/// Thresholds turning the schedule-queue backlog into a pressure signal.
///
/// Only tasks overdue by more than `overdue_grace_secs` count. A threshold
/// of zero disables that signal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PressureConfig {
    pub any_pressure_backlog: u64,
    pub heavy_pressure_backlog: u64,
    pub overdue_grace_secs: i64,
}

impl Default for PressureConfig {
    fn default() -> Self {
        Self {
            any_pressure_backlog: 100,
            heavy_pressure_backlog: 1_000,
            overdue_grace_secs: 60,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Backlog {
    pub pending: u64,
    pub overdue: u64,
}

impl SqliteStore {
    pub(crate) fn backlog_at_least(&self, threshold: u64, signal: &'static str) -> bool {
        if threshold == 0 {
            return false;
        }
        match self.backlog(self.current_time()) {
            Ok(backlog) => backlog.overdue >= threshold,
            Err(err) => {
                tracing::warn!(
                    target: "boardgraph.storage",
                    op = "pressure",
                    signal,
                    error = %err,
                    "pressure probe failed; assuming no pressure"
                );
                false
            }
        }
    }
}
