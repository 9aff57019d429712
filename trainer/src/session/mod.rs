//! Puzzle sessions.
//!
//! [`PuzzleEngine`] is the pure state machine, [`SessionDriver`] feeds it time
//! and carries out its effects, and the actor runs a driver on a tokio task
//! behind a [`SessionHandle`].

pub mod actor;
pub mod commands;
pub mod driver;
pub mod effects;
pub mod engine;
pub mod events;
pub mod handle;
pub mod scheduler;
pub mod snapshot;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use chess::PositionOracle;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::clock::Clock;
use crate::puzzle::PuzzleSupply;
use crate::report::ResultReporter;
use crate::timer::{PauseMode, PersistentTimer, TimerStore};
use actor::{run_session_actor, ActorState};

pub use commands::SessionError;
pub use driver::{DriverOutput, ReportRequest, SessionDriver};
pub use effects::{Deferred, DeferredTask, Effect, SessionNotice};
pub use engine::{EngineSettings, PuzzleEngine};
pub use events::SessionEvent;
pub use handle::SessionHandle;
pub use snapshot::{PuzzleSnapshot, ReplaySnapshot, SessionSnapshot, TimerSnapshot};
pub use state::{FailReason, MoveAttempt, Outcome, Phase, ReviewStep, SessionSummary};

/// How a spawned session runs.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub engine: EngineSettings,
    pub tick: Duration,
    pub heartbeat: Duration,
    pub pause_mode: PauseMode,
    /// Pick up a deadline persisted by an earlier run for the first puzzle.
    pub resume: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            engine: EngineSettings::default(),
            tick: Duration::from_millis(16),
            heartbeat: Duration::from_secs(1),
            pause_mode: PauseMode::default(),
            resume: false,
        }
    }
}

impl From<&crate::config::TrainerConfig> for SessionOptions {
    fn from(config: &crate::config::TrainerConfig) -> Self {
        Self {
            engine: config.engine.clone(),
            tick: config.tick,
            heartbeat: config.heartbeat,
            pause_mode: config.pause_mode,
            resume: false,
        }
    }
}

/// Spawn a session actor on the current runtime.
///
/// The returned join handle completes after [`SessionHandle::shutdown`] once
/// every queued report has been delivered.
pub fn spawn_session<O, S, R>(
    oracle: O,
    supply: PuzzleSupply,
    store: S,
    reporter: Arc<R>,
    clock: Arc<dyn Clock>,
    options: SessionOptions,
) -> (SessionHandle, JoinHandle<()>)
where
    O: PositionOracle + 'static,
    S: TimerStore + 'static,
    R: ResultReporter + 'static,
{
    let session_id = Uuid::new_v4().to_string();
    let engine = PuzzleEngine::new(oracle, supply, options.engine, session_id.clone());
    let timer = PersistentTimer::new(store, options.pause_mode);

    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let (event_tx, _) = broadcast::channel(256);

    let state = ActorState {
        session_id: session_id.clone(),
        driver: SessionDriver::new(engine, timer),
        clock,
        tick: options.tick,
        heartbeat: options.heartbeat,
        resume: options.resume,
    };

    tracing::info!("Spawning session {}", session_id);
    let join = tokio::spawn(async move {
        run_session_actor(state, reporter, cmd_rx, event_tx).await;
    });

    (SessionHandle::new(session_id, cmd_tx), join)
}
