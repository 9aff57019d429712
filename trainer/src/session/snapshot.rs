use chess::PieceColor;

use super::state::{FailReason, MoveAttempt, Outcome, Phase, SessionSummary};

/// Complete, immutable snapshot of session state.
/// Sent to subscribers on every state change and on subscribe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub phase: Phase,
    pub paused: bool,
    /// 1-based position in the order and the order's length.
    pub progress: (usize, usize),
    pub puzzle: Option<PuzzleSnapshot>,
    pub replay: Option<ReplaySnapshot>,
    pub review_remaining_secs: Option<u32>,
    pub timer: TimerSnapshot,
    pub summary: SessionSummary,
}

/// The puzzle being attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PuzzleSnapshot {
    pub puzzle_id: String,
    pub theme: String,
    pub side_to_move: PieceColor,
    /// Position to show: the live attempt's, or the replayed one in review.
    pub fen: String,
    pub move_index: usize,
    pub solution_len: usize,
    pub outcome: Outcome,
    pub fail_reason: Option<FailReason>,
    pub history: Vec<MoveAttempt>,
    pub awaiting_reply: bool,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaySnapshot {
    pub replay_index: usize,
    pub auto_play: bool,
    /// The full solution, revealed once the attempt is resolved.
    pub solution: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSnapshot {
    pub remaining_secs: u32,
    pub running: bool,
}
