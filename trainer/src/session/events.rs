use super::effects::SessionNotice;
use super::snapshot::SessionSnapshot;
use crate::report::SessionAck;

/// Events broadcast from the session actor to all subscribers.
#[derive(Debug, Clone)]
#[allow(clippy::large_enum_variant)]
pub enum SessionEvent {
    /// Full state snapshot after any mutation.
    StateChanged(SessionSnapshot),
    /// Something happened that deserves a message.
    Notice(SessionNotice),
    /// The reporter acknowledged the completed session.
    SessionAcknowledged(SessionAck),
    /// Error notification.
    Error(String),
}
