#![forbid(unsafe_code)]

//! Downstream/upstream board-graph maintenance.
//!
//! Boards link to each other through buttons. For every board this crate keeps
//! a best-effort transitive closure of reachable boards plus aggregate stats
//! over that closure, recomputed incrementally and asynchronously:
//!
//! - [`edges`] derives a board's immediate outgoing edges from its button grid.
//! - [`Engine::run_tracking_sequence`] discovers the closure and persists changes.
//! - [`Engine::propagate_upstream`] repairs back-edges and fans out to parents.
//! - [`Engine::defer_tracking`] coalesces postponed work onto the schedule queue.
//!
//! Storage, the job queue and the pressure signal are collaborators described
//! by the traits in [`ports`]; [`memory::MemoryGraph`] implements all of them.

pub mod board;
pub mod config;
pub mod edges;
mod engine;
pub mod ids;
pub mod memory;
pub mod ports;
mod propagate;
pub mod roots;
mod scope;
pub mod stats;
mod touch;
mod tracker;
mod visited;

pub use board::{Board, BoardPatch, Button, ButtonGrid, DeferredTracking, DeferredUpdate, LoadBoard};
pub use config::{ConfigError, TrackingConfig};
pub use edges::EdgeUpdate;
pub use engine::{Engine, TaskRun};
pub use ids::{BoardId, BoardIdError};
pub use ports::{
    AVAILABLE_BOARDS_ACTION, Backend, Clock, GraphError, GraphStore, PressureSignal,
    ScheduleQueue, ScheduledTask, TRACK_ACTION, TaskKey,
};
pub use propagate::{FanOutReport, Sequence};
pub use scope::JobScope;
pub use stats::EditStats;
pub use tracker::{ClosureChanges, FollowUp, TrackOutcome, TrackReport, TrackRequest, TrackStatus};
pub use visited::VisitedSet;

#[cfg(test)]
mod tests;
