//! What the engine asks its caller to do.

use std::time::Duration;

use chess::MoveId;

use super::state::FailReason;
use crate::puzzle::PuzzleId;
use crate::report::PuzzleResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredTask {
    OpponentReply,
    ReviewTick,
    ReplayStep,
}

/// A deferred callback stamped with the attempt it belongs to. Tasks from an
/// earlier generation are ignored on delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deferred {
    pub generation: u64,
    pub task: DeferredTask,
}

/// Things worth telling the user about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    PuzzleLoaded {
        slot: usize,
        puzzle_id: PuzzleId,
    },
    PuzzleSkipped {
        puzzle_id: PuzzleId,
        reason: String,
    },
    MoveAccepted(MoveId),
    WrongMove {
        attempted: MoveId,
        expected: MoveId,
    },
    OpponentMoved(MoveId),
    PuzzleSolved(PuzzleId),
    PuzzleFailed {
        puzzle_id: PuzzleId,
        reason: FailReason,
    },
    ReplayAdvanced(usize),
    SessionComplete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    ArmTimer {
        puzzle_key: String,
        budget: Duration,
        /// Pick up a persisted deadline for this key if there is one.
        resume: bool,
    },
    StopTimer,
    Schedule {
        deferred: Deferred,
        delay: Duration,
    },
    CancelDeferred,
    ReportPuzzle(PuzzleResult),
    CompleteSession,
    Notice(SessionNotice),
}
