use chess::{MoveId, Position};
use serde::Serialize;

/// Where the session is in the puzzle lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Loading,
    Playing,
    Reviewing,
    Advancing,
    SessionComplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    InProgress,
    Solved,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailReason {
    WrongMove,
    TimeExpired,
    /// The puzzle record could not be replayed and was skipped.
    Corrupt,
}

/// Manual navigation through the solution while reviewing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewStep {
    Previous,
    Next,
    Start,
    End,
}

/// One user move checked against the solution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveAttempt {
    pub attempted: MoveId,
    pub expected: MoveId,
    pub was_correct: bool,
    pub timestamp_ms: u64,
}

/// Live state of the puzzle being attempted. Replaced on every load.
#[derive(Debug, Clone)]
pub struct AttemptState {
    pub slot: usize,
    pub move_index: usize,
    pub outcome: Outcome,
    pub fail_reason: Option<FailReason>,
    pub history: Vec<MoveAttempt>,
    /// Always a result of oracle application, never edited by hand.
    pub position: Position,
    pub started_at_ms: u64,
    pub awaiting_reply: bool,
    /// Transient message for the last rejected move.
    pub last_error: Option<String>,
}

impl AttemptState {
    pub fn new(slot: usize, position: Position, started_at_ms: u64) -> Self {
        Self {
            slot,
            move_index: 0,
            outcome: Outcome::InProgress,
            fail_reason: None,
            history: Vec::new(),
            position,
            started_at_ms,
            awaiting_reply: false,
            last_error: None,
        }
    }

    pub fn correct_moves(&self) -> u32 {
        self.history.iter().filter(|m| m.was_correct).count() as u32
    }

    pub fn incorrect_moves(&self) -> u32 {
        self.history.iter().filter(|m| !m.was_correct).count() as u32
    }
}

/// Solution playback. Independent of the attempt it follows.
#[derive(Debug, Clone, Default)]
pub struct ReplayState {
    pub show_solution: bool,
    pub replay_index: usize,
    pub auto_play: bool,
    pub position: Option<Position>,
}

/// Running totals for the whole sitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SessionSummary {
    pub puzzles_completed: u32,
    pub puzzles_failed: u32,
    pub total_correct_moves: u32,
    pub total_incorrect_moves: u32,
    pub session_start_ms: u64,
}

impl SessionSummary {
    pub fn starting_at(session_start_ms: u64) -> Self {
        Self {
            session_start_ms,
            ..Self::default()
        }
    }

    pub fn record(&mut self, result: &crate::report::PuzzleResult) {
        if result.solved {
            self.puzzles_completed += 1;
        } else {
            self.puzzles_failed += 1;
        }
        self.total_correct_moves += result.correct_moves;
        self.total_incorrect_moves += result.incorrect_moves;
    }

    pub fn elapsed_secs(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.session_start_ms) / 1000
    }
}
