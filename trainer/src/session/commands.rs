use chess::MoveRequest;
use tokio::sync::{broadcast, oneshot};

use super::events::SessionEvent;
use super::snapshot::SessionSnapshot;
use super::state::ReviewStep;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Illegal move: {0}")]
    IllegalMove(String),
    #[error("Malformed move: {0}")]
    MalformedMove(String),
    #[error("No puzzle is being played")]
    NotPlaying,
    #[error("Puzzle is already resolved")]
    PuzzleResolved,
    #[error("Waiting for the opponent's reply")]
    AwaitingOpponent,
    #[error("Session is paused")]
    Paused,
    #[error("Session is not paused")]
    NotPaused,
    #[error("No solution is being reviewed")]
    NotReviewing,
    #[error("Session is complete")]
    SessionComplete,
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Commands sent to the session actor. Each embeds a oneshot for the reply.
pub enum SessionCommand {
    SubmitMove {
        request: MoveRequest,
        reply: oneshot::Sender<Result<SessionSnapshot, SessionError>>,
    },
    StepReview {
        step: ReviewStep,
        reply: oneshot::Sender<Result<SessionSnapshot, SessionError>>,
    },
    NextPuzzle {
        reply: oneshot::Sender<Result<SessionSnapshot, SessionError>>,
    },
    Pause {
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Resume {
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    SetVisible {
        visible: bool,
        reply: oneshot::Sender<()>,
    },
    Finish {
        reply: oneshot::Sender<Result<SessionSnapshot, SessionError>>,
    },
    GetSnapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Subscribe {
        reply: oneshot::Sender<(SessionSnapshot, broadcast::Receiver<SessionEvent>)>,
    },
    Shutdown,
}
