#![forbid(unsafe_code)]

//! SQLite backend for the board graph: board records, user home boards and
//! the de-duplicated schedule queue, behind the `bg_core` collaborator traits.

mod store;

pub use store::{Backlog, PressureConfig, SqliteStore, StoreError};
