use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use super::{PuzzleResult, ReportError, ResultReporter, SessionAck, SessionCompletion};
use crate::clock::{Clock, SystemClock};
use crate::persistence::{PuzzleResultRecord, ResultStore, SessionRecord};

/// Writes results as JSON files under the data directory.
pub struct JsonResultReporter {
    store: ResultStore,
    cooldown: Option<Duration>,
    clock: Arc<dyn Clock>,
}

impl JsonResultReporter {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            store: ResultStore::new(data_dir),
            cooldown: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Ask for a pause of `cooldown` after each completed session.
    pub fn with_cooldown(mut self, cooldown: Option<Duration>) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }
}

impl ResultReporter for JsonResultReporter {
    async fn record_puzzle_result(&self, result: &PuzzleResult) -> Result<(), ReportError> {
        let record = PuzzleResultRecord {
            record_id: Uuid::new_v4().to_string(),
            result: result.clone(),
            recorded_at: self.clock.now_ms(),
        };
        self.store.save_result(&record)?;
        tracing::debug!("Stored result {} for puzzle {}", record.record_id, result.puzzle_id);
        Ok(())
    }

    async fn complete_session(
        &self,
        completion: &SessionCompletion,
    ) -> Result<SessionAck, ReportError> {
        let now = self.clock.now_ms();
        let next_available_at = self
            .cooldown
            .map(|c| now.saturating_add(c.as_millis() as u64));
        self.store.save_session(&SessionRecord {
            completion: completion.clone(),
            completed_at: now,
            next_available_at,
        })?;
        tracing::info!(
            "Session {} stored ({} puzzle(s) completed)",
            completion.session_id,
            completion.puzzles_completed
        );
        Ok(SessionAck { next_available_at })
    }
}
