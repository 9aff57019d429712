//! Synchronous runtime around [`PuzzleEngine`].
//!
//! The driver owns everything the engine must not touch: the countdown, the
//! deferred task queue and the session totals. Time only enters through the
//! `now_ms` arguments, so a manual clock drives it exactly like the real one.

use chess::{MoveRequest, PositionOracle};

use super::commands::SessionError;
use super::effects::{Effect, SessionNotice};
use super::engine::PuzzleEngine;
use super::scheduler::Scheduler;
use super::snapshot::{PuzzleSnapshot, ReplaySnapshot, SessionSnapshot, TimerSnapshot};
use super::state::{ReviewStep, SessionSummary};
use crate::report::{PuzzleResult, SessionCompletion};
use crate::timer::{PersistentTimer, TimerStore};

/// A call the reporter should receive, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportRequest {
    Puzzle(PuzzleResult),
    Session(SessionCompletion),
}

/// What one driver call produced.
#[derive(Debug, Default)]
pub struct DriverOutput {
    pub notices: Vec<SessionNotice>,
    pub reports: Vec<ReportRequest>,
    /// Whether a fresh snapshot is worth publishing.
    pub changed: bool,
}

impl DriverOutput {
    fn merge(&mut self, other: DriverOutput) {
        self.notices.extend(other.notices);
        self.reports.extend(other.reports);
        self.changed |= other.changed;
    }
}

pub struct SessionDriver<O, S> {
    engine: PuzzleEngine<O>,
    timer: PersistentTimer<S>,
    scheduler: Scheduler,
    summary: SessionSummary,
    paused_at: Option<u64>,
    last_remaining: Option<u32>,
    carry: DriverOutput,
}

impl<O: PositionOracle, S: TimerStore> SessionDriver<O, S> {
    pub fn new(engine: PuzzleEngine<O>, timer: PersistentTimer<S>) -> Self {
        Self {
            engine,
            timer,
            scheduler: Scheduler::new(),
            summary: SessionSummary::default(),
            paused_at: None,
            last_remaining: None,
            carry: DriverOutput::default(),
        }
    }

    pub fn engine(&self) -> &PuzzleEngine<O> {
        &self.engine
    }

    pub fn timer(&self) -> &PersistentTimer<S> {
        &self.timer
    }

    pub fn summary(&self) -> &SessionSummary {
        &self.summary
    }

    pub fn pending_tasks(&self) -> usize {
        self.scheduler.len()
    }

    /// Load the first puzzle. With `resume`, a deadline persisted by an
    /// earlier run for that puzzle is picked up instead of a fresh budget.
    pub fn start(&mut self, now_ms: u64, resume: bool) -> DriverOutput {
        self.summary = SessionSummary::starting_at(now_ms);
        let effects = self.engine.start(now_ms, resume);
        self.apply(effects, now_ms, now_ms)
    }

    pub fn submit_move(
        &mut self,
        request: MoveRequest,
        now_ms: u64,
    ) -> Result<DriverOutput, SessionError> {
        self.after_catch_up(now_ms, |engine| engine.submit_move(request, now_ms))
    }

    pub fn step_review(
        &mut self,
        step: ReviewStep,
        now_ms: u64,
    ) -> Result<DriverOutput, SessionError> {
        let mut out = self.after_catch_up(now_ms, |engine| engine.step_review(step))?;
        out.changed = true;
        Ok(out)
    }

    pub fn next_puzzle(&mut self, now_ms: u64) -> Result<DriverOutput, SessionError> {
        self.after_catch_up(now_ms, |engine| engine.next_puzzle(now_ms))
    }

    /// Poll first so the command sees current state. If the command fails,
    /// whatever the poll produced is handed out by the next call instead.
    fn after_catch_up(
        &mut self,
        now_ms: u64,
        command: impl FnOnce(&mut PuzzleEngine<O>) -> Result<Vec<Effect>, SessionError>,
    ) -> Result<DriverOutput, SessionError> {
        let mut out = self.poll(now_ms);
        match command(&mut self.engine) {
            Ok(effects) => {
                out.merge(self.apply(effects, now_ms, now_ms));
                Ok(out)
            }
            Err(e) => {
                self.carry = out;
                Err(e)
            }
        }
    }

    pub fn finish(&mut self, now_ms: u64) -> DriverOutput {
        let mut out = self.poll(now_ms);
        let effects = self.engine.finish(now_ms);
        out.merge(self.apply(effects, now_ms, now_ms));
        out
    }

    /// Pause the session. Deferred tasks are held until [`resume`](Self::resume).
    pub fn pause(&mut self, now_ms: u64) -> Result<(), SessionError> {
        self.engine.pause()?;
        self.timer.pause(now_ms);
        self.paused_at = Some(now_ms);
        Ok(())
    }

    pub fn resume(&mut self, now_ms: u64) -> Result<(), SessionError> {
        self.engine.resume()?;
        self.timer.resume(now_ms);
        if let Some(paused_at) = self.paused_at.take() {
            self.scheduler.shift(now_ms.saturating_sub(paused_at));
        }
        Ok(())
    }

    /// Becoming visible re-reads the persisted deadline and catches up.
    pub fn set_visible(&mut self, visible: bool, now_ms: u64) -> DriverOutput {
        if !visible {
            tracing::debug!("Session hidden");
            return DriverOutput::default();
        }
        self.timer.refresh();
        let mut out = self.poll(now_ms);
        out.changed = true;
        out
    }

    pub fn heartbeat(&mut self, now_ms: u64) {
        self.timer.heartbeat(now_ms);
    }

    /// Fire everything that came due up to `now_ms`, in due order.
    ///
    /// A timer expiry and deferred tasks are interleaved by their instants, so
    /// an opponent reply due before the deadline is still played even when
    /// the poll itself comes late.
    pub fn poll(&mut self, now_ms: u64) -> DriverOutput {
        let mut out = std::mem::take(&mut self.carry);
        if !self.engine.is_paused() {
            loop {
                let deadline = self
                    .timer
                    .is_running()
                    .then(|| self.timer.clock().map(|c| c.deadline_ms))
                    .flatten()
                    .filter(|&d| d <= now_ms);
                let task_due = self.scheduler.next_due().filter(|&d| d <= now_ms);

                match (deadline, task_due) {
                    (Some(deadline), Some(due)) if due < deadline => self.run_task(now_ms, &mut out),
                    (Some(deadline), _) => {
                        if self.timer.tick(now_ms).is_none() {
                            break;
                        }
                        let effects = self.engine.timer_expired(deadline);
                        out.merge(self.apply(effects, now_ms, now_ms));
                    }
                    (None, Some(_)) => self.run_task(now_ms, &mut out),
                    (None, None) => break,
                }
            }
        }

        let remaining = self.timer.remaining_secs(now_ms);
        if self.last_remaining != Some(remaining) {
            self.last_remaining = Some(remaining);
            out.changed = true;
        }
        out
    }

    fn run_task(&mut self, now_ms: u64, out: &mut DriverOutput) {
        if let Some((due_ms, deferred)) = self.scheduler.pop_due(now_ms) {
            // The engine sees the instant the task was due, not the late poll.
            let effects = self.engine.deliver(deferred, due_ms);
            out.merge(self.apply(effects, due_ms, now_ms));
        }
    }

    /// Stop without completing: pending tasks are dropped, the persisted
    /// deadline is kept for a later resume.
    pub fn shutdown(&mut self, now_ms: u64) {
        self.scheduler.cancel_all();
        self.timer.stop(now_ms);
    }

    /// Carry out engine effects. Follow-up tasks are scheduled relative to
    /// `base_ms`, the instant the triggering task was due, so a late poll
    /// does not stretch the cadence.
    fn apply(&mut self, effects: Vec<Effect>, base_ms: u64, now_ms: u64) -> DriverOutput {
        let mut out = DriverOutput {
            changed: !effects.is_empty(),
            ..DriverOutput::default()
        };
        for effect in effects {
            match effect {
                Effect::ArmTimer {
                    puzzle_key,
                    budget,
                    resume,
                } => {
                    if resume {
                        self.timer.arm_or_resume(&puzzle_key, budget, now_ms);
                    } else {
                        self.timer.arm(&puzzle_key, budget, now_ms);
                    }
                }
                Effect::StopTimer => self.timer.stop(now_ms),
                Effect::Schedule { deferred, delay } => {
                    let due = base_ms.saturating_add(delay.as_millis() as u64);
                    self.scheduler.schedule(deferred, due);
                }
                Effect::CancelDeferred => self.scheduler.cancel_all(),
                Effect::ReportPuzzle(result) => {
                    self.summary.record(&result);
                    out.reports.push(ReportRequest::Puzzle(result));
                }
                Effect::CompleteSession => {
                    out.reports
                        .push(ReportRequest::Session(self.completion(now_ms)));
                }
                Effect::Notice(notice) => out.notices.push(notice),
            }
        }
        out
    }

    fn completion(&self, now_ms: u64) -> SessionCompletion {
        SessionCompletion {
            session_id: self.engine.session_id().to_string(),
            total_time_secs: self.summary.elapsed_secs(now_ms),
            puzzles_completed: self.summary.puzzles_completed,
            total_correct_moves: self.summary.total_correct_moves,
        }
    }

    pub fn snapshot(&self, now_ms: u64) -> SessionSnapshot {
        let engine = &self.engine;
        let supply = engine.supply();

        let puzzle = engine.attempt().and_then(|attempt| {
            let record = supply.get(attempt.slot)?;
            Some(PuzzleSnapshot {
                puzzle_id: record.id.to_string(),
                theme: record.theme.clone(),
                side_to_move: record.side_to_move,
                fen: engine
                    .display_position()
                    .map(|p| p.to_fen())
                    .unwrap_or_else(|| record.initial_position.clone()),
                move_index: attempt.move_index,
                solution_len: record.solution_len(),
                outcome: attempt.outcome,
                fail_reason: attempt.fail_reason,
                history: attempt.history.clone(),
                awaiting_reply: attempt.awaiting_reply,
                last_error: attempt.last_error.clone(),
            })
        });

        let replay = engine
            .replay()
            .show_solution
            .then(|| engine.current_puzzle())
            .flatten()
            .map(|record| ReplaySnapshot {
                replay_index: engine.replay().replay_index,
                auto_play: engine.replay().auto_play,
                solution: record.solution.iter().map(|m| m.to_string()).collect(),
            });

        SessionSnapshot {
            session_id: engine.session_id().to_string(),
            phase: engine.phase(),
            paused: engine.is_paused(),
            progress: (engine.slot() + 1, supply.len()),
            puzzle,
            replay,
            review_remaining_secs: engine.review_remaining(),
            timer: TimerSnapshot {
                remaining_secs: self.timer.remaining_secs(now_ms),
                running: self.timer.is_running(),
            },
            summary: self.summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::puzzle::{PuzzleRecord, PuzzleSupply};
    use crate::session::{EngineSettings, Outcome, Phase};
    use crate::timer::{MemoryTimerStore, PauseMode};
    use chess::{CozyOracle, MoveId, PieceColor, START_FEN};

    fn driver(store: MemoryTimerStore) -> SessionDriver<CozyOracle, MemoryTimerStore> {
        let puzzles = vec![PuzzleRecord::new(
            "p1",
            START_FEN,
            ["e2e4", "e7e5", "g1f3"],
            PieceColor::White,
        )];
        let supply = PuzzleSupply::ordered(puzzles).unwrap();
        let engine = PuzzleEngine::new(CozyOracle, supply, EngineSettings::default(), "s1");
        SessionDriver::new(engine, PersistentTimer::new(store, PauseMode::WallClock))
    }

    fn req(id: &str) -> MoveRequest {
        MoveId::new(id).decode().unwrap().into()
    }

    #[test]
    fn test_reply_played_after_delay() {
        let mut d = driver(MemoryTimerStore::new());
        d.start(0, false);
        d.submit_move(req("e2e4"), 1_000).unwrap();
        assert!(d.poll(1_499).notices.is_empty());
        let out = d.poll(1_500);
        assert!(out
            .notices
            .contains(&SessionNotice::OpponentMoved(MoveId::new("e7e5"))));
        assert_eq!(d.snapshot(1_500).puzzle.unwrap().move_index, 2);
    }

    #[test]
    fn test_late_poll_plays_reply_before_deadline() {
        let mut d = driver(MemoryTimerStore::new());
        d.start(0, false);
        d.submit_move(req("e2e4"), 119_000).unwrap();
        let out = d.poll(200_000);
        assert_eq!(out.notices[0], SessionNotice::OpponentMoved(MoveId::new("e7e5")));
        let snap = d.snapshot(200_000);
        assert_eq!(snap.puzzle.unwrap().outcome, Outcome::Failed);
        assert_eq!(snap.summary.puzzles_failed, 1);
    }

    #[test]
    fn test_summary_counts_solved_puzzles() {
        let mut d = driver(MemoryTimerStore::new());
        d.start(0, false);
        d.submit_move(req("e2e4"), 0).unwrap();
        d.poll(500);
        let out = d.submit_move(req("g1f3"), 2_000).unwrap();
        assert!(matches!(out.reports[0], ReportRequest::Puzzle(ref r) if r.solved));
        assert_eq!(d.summary().puzzles_completed, 1);
        assert_eq!(d.summary().total_correct_moves, 2);

        let out = d.finish(10_000);
        assert_eq!(
            out.reports,
            vec![ReportRequest::Session(SessionCompletion {
                session_id: "s1".into(),
                total_time_secs: 10,
                puzzles_completed: 1,
                total_correct_moves: 2,
            })]
        );
        assert_eq!(d.engine().phase(), Phase::SessionComplete);
    }

    #[test]
    fn test_pause_holds_deferred_tasks() {
        let mut d = driver(MemoryTimerStore::new());
        d.start(0, false);
        d.submit_move(req("e2e4"), 0).unwrap();
        d.pause(100).unwrap();
        assert!(d.poll(5_000).notices.is_empty());
        d.resume(5_000).unwrap();
        assert!(d.poll(5_399).notices.is_empty());
        assert_eq!(d.poll(5_400).notices.len(), 1);
    }

    #[test]
    fn test_snapshot_reports_remaining_time() {
        let mut d = driver(MemoryTimerStore::new());
        d.start(0, false);
        let snap = d.snapshot(30_500);
        assert_eq!(snap.timer.remaining_secs, 90);
        assert!(snap.timer.running);
        assert_eq!(snap.progress, (1, 1));
        assert!(snap.replay.is_none());
    }
}
