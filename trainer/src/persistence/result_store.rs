use super::json_store::{JsonStore, Storable};
use super::PersistenceError;
use crate::report::{PuzzleResult, SessionCompletion};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A stored puzzle result. Each attempt gets its own record, so a puzzle seen
/// twice in a wrapping session is stored twice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PuzzleResultRecord {
    pub record_id: String,
    #[serde(flatten)]
    pub result: PuzzleResult,
    pub recorded_at: u64,
}

impl Storable for PuzzleResultRecord {
    fn id(&self) -> &str {
        &self.record_id
    }
}

/// A stored session summary, keyed by session id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    #[serde(flatten)]
    pub completion: SessionCompletion,
    pub completed_at: u64,
    pub next_available_at: Option<u64>,
}

impl Storable for SessionRecord {
    fn id(&self) -> &str {
        &self.completion.session_id
    }
}

/// Results under `<data_dir>/results` and sessions under `<data_dir>/sessions`.
pub struct ResultStore {
    results: JsonStore<PuzzleResultRecord>,
    sessions: JsonStore<SessionRecord>,
}

impl ResultStore {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            results: JsonStore::new(data_dir.join("results")),
            sessions: JsonStore::new(data_dir.join("sessions")),
        }
    }

    pub fn save_result(&self, record: &PuzzleResultRecord) -> Result<String, PersistenceError> {
        self.results.save(record)
    }

    pub fn save_session(&self, record: &SessionRecord) -> Result<String, PersistenceError> {
        self.sessions.save(record)
    }

    /// Results of one session, oldest first.
    pub fn results_for(&self, session_id: &str) -> Result<Vec<PuzzleResultRecord>, PersistenceError> {
        let mut results: Vec<_> = self
            .results
            .load_all()?
            .into_iter()
            .filter(|r| r.result.session_id == session_id)
            .collect();
        results.sort_by(|a, b| {
            a.recorded_at
                .cmp(&b.recorded_at)
                .then_with(|| a.record_id.cmp(&b.record_id))
        });
        Ok(results)
    }

    /// All sessions, most recent first.
    pub fn sessions(&self) -> Result<Vec<SessionRecord>, PersistenceError> {
        let mut sessions = self.sessions.load_all()?;
        sessions.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        Ok(sessions)
    }

    /// The cool-down of the most recent session, if any.
    pub fn latest_next_available_at(&self) -> Result<Option<u64>, PersistenceError> {
        Ok(self.sessions()?.first().and_then(|s| s.next_available_at))
    }

    pub fn results_dir(&self) -> &std::path::Path {
        self.results.dir()
    }
}
