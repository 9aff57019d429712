//! Per-puzzle and per-session result reporting.
//!
//! Reporting is best-effort. The session never waits on a reporter before
//! changing state and never rolls anything back when one fails.

mod json_reporter;

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::puzzle::PuzzleId;

pub use json_reporter::JsonResultReporter;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("persistence error: {0}")]
    Persistence(#[from] crate::persistence::PersistenceError),
    #[error("reporter unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of one puzzle attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuzzleResult {
    pub puzzle_id: PuzzleId,
    pub session_id: String,
    pub solved: bool,
    /// User move attempts that reached the solution check.
    pub attempts: u32,
    pub correct_moves: u32,
    pub incorrect_moves: u32,
    pub time_spent_secs: u64,
}

/// Summary sent once when a session ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCompletion {
    pub session_id: String,
    pub total_time_secs: u64,
    pub puzzles_completed: u32,
    pub total_correct_moves: u32,
}

/// Reporter's answer to a completed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionAck {
    /// Unix milliseconds before which no new session should start.
    pub next_available_at: Option<u64>,
}

/// Receiver of training results.
///
/// Methods return `impl Future + Send` so calls can run on spawned tasks.
pub trait ResultReporter: Send + Sync {
    fn record_puzzle_result(
        &self,
        result: &PuzzleResult,
    ) -> impl Future<Output = Result<(), ReportError>> + Send;

    fn complete_session(
        &self,
        completion: &SessionCompletion,
    ) -> impl Future<Output = Result<SessionAck, ReportError>> + Send;
}

/// Reporter that only writes to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ResultReporter for LogReporter {
    async fn record_puzzle_result(&self, result: &PuzzleResult) -> Result<(), ReportError> {
        tracing::info!(
            "Puzzle {} {} ({} correct, {} incorrect, {}s)",
            result.puzzle_id,
            if result.solved { "solved" } else { "failed" },
            result.correct_moves,
            result.incorrect_moves,
            result.time_spent_secs
        );
        Ok(())
    }

    async fn complete_session(
        &self,
        completion: &SessionCompletion,
    ) -> Result<SessionAck, ReportError> {
        tracing::info!(
            "Session {} complete: {} puzzle(s) in {}s",
            completion.session_id,
            completion.puzzles_completed,
            completion.total_time_secs
        );
        Ok(SessionAck::default())
    }
}
