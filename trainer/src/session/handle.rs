use chess::MoveRequest;
use tokio::sync::{broadcast, mpsc, oneshot};

use super::commands::*;
use super::events::SessionEvent;
use super::snapshot::SessionSnapshot;
use super::state::ReviewStep;

/// Cheap, cloneable handle to a session actor.
#[derive(Clone)]
pub struct SessionHandle {
    id: String,
    cmd_tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub(crate) fn new(id: String, cmd_tx: mpsc::Sender<SessionCommand>) -> Self {
        Self { id, cmd_tx }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn submit_move(&self, request: MoveRequest) -> Result<SessionSnapshot, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::SubmitMove { request, reply: tx })
            .await?;
        rx.await
            .map_err(|_| SessionError::Internal("Reply dropped".into()))?
    }

    /// Submit a move written as `<from><to>[promotion]`.
    pub async fn submit_move_str(&self, text: &str) -> Result<SessionSnapshot, SessionError> {
        let id = chess::MoveId::new(text.trim().to_ascii_lowercase());
        let parts = id
            .decode()
            .map_err(|e| SessionError::MalformedMove(e.to_string()))?;
        self.submit_move(parts.into()).await
    }

    pub async fn step_review(&self, step: ReviewStep) -> Result<SessionSnapshot, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::StepReview { step, reply: tx })
            .await?;
        rx.await
            .map_err(|_| SessionError::Internal("Reply dropped".into()))?
    }

    pub async fn next_puzzle(&self) -> Result<SessionSnapshot, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::NextPuzzle { reply: tx }).await?;
        rx.await
            .map_err(|_| SessionError::Internal("Reply dropped".into()))?
    }

    pub async fn pause(&self) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Pause { reply: tx }).await?;
        rx.await
            .map_err(|_| SessionError::Internal("Reply dropped".into()))?
    }

    pub async fn resume(&self) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Resume { reply: tx }).await?;
        rx.await
            .map_err(|_| SessionError::Internal("Reply dropped".into()))?
    }

    pub async fn set_visible(&self, visible: bool) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::SetVisible { visible, reply: tx })
            .await?;
        rx.await
            .map_err(|_| SessionError::Internal("Reply dropped".into()))
    }

    pub async fn finish(&self) -> Result<SessionSnapshot, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Finish { reply: tx }).await?;
        rx.await
            .map_err(|_| SessionError::Internal("Reply dropped".into()))?
    }

    pub async fn get_snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::GetSnapshot { reply: tx }).await?;
        rx.await
            .map_err(|_| SessionError::Internal("Reply dropped".into()))
    }

    pub async fn subscribe(
        &self,
    ) -> Result<(SessionSnapshot, broadcast::Receiver<SessionEvent>), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Subscribe { reply: tx }).await?;
        rx.await
            .map_err(|_| SessionError::Internal("Reply dropped".into()))
    }

    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(SessionCommand::Shutdown).await;
    }

    async fn send(&self, cmd: SessionCommand) -> Result<(), SessionError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| SessionError::Internal("Session actor closed".into()))
    }
}
