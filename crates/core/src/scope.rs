#![forbid(unsafe_code)]

use crate::ids::BoardId;
use crate::roots::RootMemo;
use std::collections::BTreeSet;

/// State accumulated over one job (one queue task or one request).
///
/// Passed by `&mut` through tracking and propagation; the caller hands it to
/// [`Engine::finish_job`](crate::Engine::finish_job) once the job is done.
#[derive(Debug, Default)]
pub struct JobScope {
    pub(crate) roots: RootMemo,
    available_boards_users: BTreeSet<String>,
    tracked: Vec<BoardId>,
    deferred: Vec<BoardId>,
}

impl JobScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_available_boards(&mut self, user_id: &str) {
        self.available_boards_users.insert(user_id.to_string());
    }

    pub fn available_boards_users(&self) -> impl Iterator<Item = &str> {
        self.available_boards_users.iter().map(String::as_str)
    }

    pub(crate) fn take_available_boards_users(&mut self) -> BTreeSet<String> {
        std::mem::take(&mut self.available_boards_users)
    }

    /// Boards whose closure was computed during this job, in order.
    pub fn tracked(&self) -> &[BoardId] {
        &self.tracked
    }

    /// Boards handed to the schedule queue during this job, in order.
    pub fn deferred(&self) -> &[BoardId] {
        &self.deferred
    }

    pub(crate) fn record_tracked(&mut self, id: &BoardId) {
        self.tracked.push(id.clone());
    }

    pub(crate) fn record_deferred(&mut self, id: &BoardId) {
        self.deferred.push(id.clone());
    }
}
