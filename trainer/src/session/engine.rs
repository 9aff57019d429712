//! The puzzle session state machine.
//!
//! Every input (a command, a delivered deferred task, a timer expiry) pushes
//! transitions onto an internal queue which [`PuzzleEngine::run`] drains
//! through a single `apply` function. The engine performs no I/O and never
//! reads a clock; it returns [`Effect`]s for its caller to carry out.

use std::collections::VecDeque;
use std::time::Duration;

use chess::{MoveId, MoveRequest, Position, PositionOracle};

use super::commands::SessionError;
use super::effects::{Deferred, DeferredTask, Effect, SessionNotice};
use super::state::{
    AttemptState, FailReason, MoveAttempt, Outcome, Phase, ReplayState, ReviewStep,
};
use crate::puzzle::{PuzzleRecord, PuzzleSupply};
use crate::replay::{self, ReplayError};
use crate::report::PuzzleResult;

const REVIEW_TICK: Duration = Duration::from_secs(1);

/// Timing knobs of the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub puzzle_budget: Duration,
    pub reply_delay: Duration,
    pub solved_review_secs: u32,
    pub failed_review_secs: u32,
    pub replay_step: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            puzzle_budget: Duration::from_secs(120),
            reply_delay: Duration::from_millis(500),
            solved_review_secs: 5,
            failed_review_secs: 15,
            replay_step: Duration::from_secs(3),
        }
    }
}

#[derive(Debug)]
enum Transition {
    Load { slot: usize, resume: bool },
    UserMoveAccepted { move_id: MoveId, position: Position },
    UserMoveRejected { attempted: String, reason: String },
    OpponentReplyDue,
    PuzzleSolved,
    PuzzleFailed(FailReason),
    ReviewElapsed,
    Advance,
}

pub struct PuzzleEngine<O> {
    oracle: O,
    supply: PuzzleSupply,
    settings: EngineSettings,
    session_id: String,
    phase: Phase,
    slot: usize,
    attempt: Option<AttemptState>,
    replay: ReplayState,
    review_remaining: Option<u32>,
    generation: u64,
    paused: bool,
    corrupt_streak: usize,
    completed: bool,
    now_ms: u64,
    queue: VecDeque<Transition>,
    effects: Vec<Effect>,
}

impl<O: PositionOracle> PuzzleEngine<O> {
    pub fn new(
        oracle: O,
        supply: PuzzleSupply,
        settings: EngineSettings,
        session_id: impl Into<String>,
    ) -> Self {
        let slot = supply.start();
        Self {
            oracle,
            supply,
            settings,
            session_id: session_id.into(),
            phase: Phase::Loading,
            slot,
            attempt: None,
            replay: ReplayState::default(),
            review_remaining: None,
            generation: 0,
            paused: false,
            corrupt_streak: 0,
            completed: false,
            now_ms: 0,
            queue: VecDeque::new(),
            effects: Vec::new(),
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn supply(&self) -> &PuzzleSupply {
        &self.supply
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn attempt(&self) -> Option<&AttemptState> {
        self.attempt.as_ref()
    }

    pub fn replay(&self) -> &ReplayState {
        &self.replay
    }

    pub fn review_remaining(&self) -> Option<u32> {
        self.review_remaining
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn current_puzzle(&self) -> Option<&PuzzleRecord> {
        self.attempt.as_ref().and_then(|a| self.supply.get(a.slot))
    }

    /// The position to show: the replayed one while reviewing, otherwise the
    /// live attempt's.
    pub fn display_position(&self) -> Option<&Position> {
        if self.replay.show_solution {
            if let Some(pos) = self.replay.position.as_ref() {
                return Some(pos);
            }
        }
        self.attempt.as_ref().map(|a| &a.position)
    }

    // ── Inputs ────────────────────────────────────────────────────────

    /// Load the supply's starting puzzle.
    pub fn start(&mut self, now_ms: u64, resume: bool) -> Vec<Effect> {
        self.now_ms = now_ms;
        if self.phase == Phase::Loading && self.attempt.is_none() {
            self.queue.push_back(Transition::Load {
                slot: self.supply.start(),
                resume,
            });
        }
        self.run()
    }

    pub fn submit_move(
        &mut self,
        request: MoveRequest,
        now_ms: u64,
    ) -> Result<Vec<Effect>, SessionError> {
        self.now_ms = now_ms;
        self.check_can_move()?;
        let attempt = self.attempt.as_ref().ok_or(SessionError::NotPlaying)?;

        match self.oracle.apply_move(&attempt.position, &request) {
            Ok(applied) => {
                self.queue.push_back(Transition::UserMoveAccepted {
                    move_id: MoveId::encode(&applied),
                    position: applied.position,
                });
                Ok(self.run())
            }
            Err(e) => {
                let reason = e.to_string();
                self.queue.push_back(Transition::UserMoveRejected {
                    attempted: request.to_string(),
                    reason: reason.clone(),
                });
                self.run();
                Err(SessionError::IllegalMove(reason))
            }
        }
    }

    fn check_can_move(&self) -> Result<(), SessionError> {
        if self.phase == Phase::SessionComplete {
            return Err(SessionError::SessionComplete);
        }
        if self.paused {
            return Err(SessionError::Paused);
        }
        let attempt = match (&self.attempt, self.phase) {
            (Some(a), Phase::Playing | Phase::Reviewing) => a,
            _ => return Err(SessionError::NotPlaying),
        };
        if attempt.outcome != Outcome::InProgress || self.replay.show_solution {
            return Err(SessionError::PuzzleResolved);
        }
        if attempt.awaiting_reply {
            return Err(SessionError::AwaitingOpponent);
        }
        Ok(())
    }

    /// Hand back a deferred task that came due.
    pub fn deliver(&mut self, deferred: Deferred, now_ms: u64) -> Vec<Effect> {
        self.now_ms = now_ms;
        if deferred.generation != self.generation {
            tracing::debug!(
                "Ignoring stale {:?} from generation {}",
                deferred.task,
                deferred.generation
            );
            return Vec::new();
        }

        match deferred.task {
            DeferredTask::OpponentReply => self.queue.push_back(Transition::OpponentReplyDue),
            DeferredTask::ReviewTick => self.review_tick(),
            DeferredTask::ReplayStep => self.replay_step(),
        }
        self.run()
    }

    pub fn timer_expired(&mut self, now_ms: u64) -> Vec<Effect> {
        self.now_ms = now_ms;
        let in_progress = self
            .attempt
            .as_ref()
            .is_some_and(|a| a.outcome == Outcome::InProgress);
        if self.phase == Phase::Playing && in_progress {
            self.queue
                .push_back(Transition::PuzzleFailed(FailReason::TimeExpired));
        }
        self.run()
    }

    /// Navigate the solution by hand. Stops the automatic replay.
    pub fn step_review(&mut self, step: ReviewStep) -> Result<Vec<Effect>, SessionError> {
        if self.paused {
            return Err(SessionError::Paused);
        }
        if self.phase != Phase::Reviewing || !self.replay.show_solution {
            return Err(SessionError::NotReviewing);
        }
        let len = self.current_puzzle().map_or(0, PuzzleRecord::solution_len);
        let index = match step {
            ReviewStep::Previous => self.replay.replay_index.saturating_sub(1),
            ReviewStep::Next => (self.replay.replay_index + 1).min(len),
            ReviewStep::Start => 0,
            ReviewStep::End => len,
        };
        self.replay.auto_play = false;
        self.set_replay_index(index);
        Ok(self.run())
    }

    /// Skip the rest of the review.
    pub fn next_puzzle(&mut self, now_ms: u64) -> Result<Vec<Effect>, SessionError> {
        self.now_ms = now_ms;
        match self.phase {
            Phase::SessionComplete => Err(SessionError::SessionComplete),
            _ if self.paused => Err(SessionError::Paused),
            Phase::Reviewing => {
                self.queue.push_back(Transition::Advance);
                Ok(self.run())
            }
            _ => Err(SessionError::NotReviewing),
        }
    }

    /// End the session now.
    pub fn finish(&mut self, now_ms: u64) -> Vec<Effect> {
        self.now_ms = now_ms;
        self.complete_session();
        self.run()
    }

    pub fn pause(&mut self) -> Result<(), SessionError> {
        match self.phase {
            Phase::SessionComplete => Err(SessionError::SessionComplete),
            _ if self.paused => Err(SessionError::Paused),
            _ => {
                self.paused = true;
                tracing::info!("Session paused");
                Ok(())
            }
        }
    }

    pub fn resume(&mut self) -> Result<(), SessionError> {
        if !self.paused {
            return Err(SessionError::NotPaused);
        }
        self.paused = false;
        tracing::info!("Session resumed");
        Ok(())
    }

    // ── Transition function ───────────────────────────────────────────

    fn run(&mut self) -> Vec<Effect> {
        while let Some(transition) = self.queue.pop_front() {
            self.apply(transition);
        }
        std::mem::take(&mut self.effects)
    }

    fn apply(&mut self, transition: Transition) {
        tracing::trace!("Applying {:?}", transition);
        match transition {
            Transition::Load { slot, resume } => self.load(slot, resume),
            Transition::UserMoveAccepted { move_id, position } => {
                self.user_move_accepted(move_id, position)
            }
            Transition::UserMoveRejected { attempted, reason } => {
                tracing::debug!("Illegal move {}: {}", attempted, reason);
                if let Some(attempt) = self.attempt.as_mut() {
                    attempt.last_error = Some(format!("Illegal move {}", attempted));
                }
            }
            Transition::OpponentReplyDue => self.opponent_reply(),
            Transition::PuzzleSolved => self.puzzle_solved(),
            Transition::PuzzleFailed(reason) => self.puzzle_failed(reason),
            Transition::ReviewElapsed => {
                if self.phase == Phase::Reviewing {
                    self.queue.push_back(Transition::Advance);
                }
            }
            Transition::Advance => self.advance(),
        }
    }

    fn load(&mut self, slot: usize, resume: bool) {
        self.generation += 1;
        self.phase = Phase::Loading;
        self.slot = slot;
        self.attempt = None;
        self.replay = ReplayState::default();
        self.review_remaining = None;
        self.effects.push(Effect::CancelDeferred);

        let Some(puzzle) = self.supply.get(slot) else {
            tracing::error!("Slot {} is outside the puzzle order", slot);
            self.complete_session();
            return;
        };

        let checked = replay::validate(&self.oracle, puzzle).and_then(|()| {
            self.oracle
                .parse(&puzzle.initial_position)
                .map_err(ReplayError::InvalidInitialPosition)
        });

        match checked {
            Ok(position) => {
                let puzzle_id = puzzle.id.clone();
                let puzzle_key = puzzle.timer_key().to_string();
                tracing::info!(
                    "Loaded puzzle {} ({} of {})",
                    puzzle_id,
                    slot + 1,
                    self.supply.len()
                );
                self.corrupt_streak = 0;
                self.attempt = Some(AttemptState::new(slot, position, self.now_ms));
                self.phase = Phase::Playing;
                self.effects.push(Effect::ArmTimer {
                    puzzle_key,
                    budget: self.settings.puzzle_budget,
                    resume,
                });
                self.effects
                    .push(Effect::Notice(SessionNotice::PuzzleLoaded { slot, puzzle_id }));
            }
            Err(e) => self.skip_corrupt(slot, e),
        }
    }

    fn skip_corrupt(&mut self, slot: usize, error: ReplayError) {
        let Some(puzzle) = self.supply.get(slot) else {
            return;
        };
        tracing::warn!("Skipping puzzle {}: {}", puzzle.id, error);
        let puzzle_id = puzzle.id.clone();

        self.effects.push(Effect::StopTimer);
        self.effects.push(Effect::ReportPuzzle(PuzzleResult {
            puzzle_id: puzzle_id.clone(),
            session_id: self.session_id.clone(),
            solved: false,
            attempts: 0,
            correct_moves: 0,
            incorrect_moves: 0,
            time_spent_secs: 0,
        }));
        self.effects.push(Effect::Notice(SessionNotice::PuzzleSkipped {
            puzzle_id: puzzle_id.clone(),
            reason: error.to_string(),
        }));
        self.effects.push(Effect::Notice(SessionNotice::PuzzleFailed {
            puzzle_id,
            reason: FailReason::Corrupt,
        }));

        self.corrupt_streak += 1;
        if self.corrupt_streak >= self.supply.len() {
            tracing::error!("Every puzzle in the set is unplayable, ending session");
            self.complete_session();
        } else {
            self.queue.push_back(Transition::Advance);
        }
    }

    fn user_move_accepted(&mut self, move_id: MoveId, position: Position) {
        let Some(expected) = self
            .current_puzzle()
            .and_then(|p| self.attempt.as_ref().and_then(|a| p.solution.get(a.move_index)))
            .cloned()
        else {
            return;
        };
        let generation = self.generation;
        let reply_delay = self.settings.reply_delay;
        let solution_len = self.current_puzzle().map_or(0, PuzzleRecord::solution_len);
        let now_ms = self.now_ms;
        let Some(attempt) = self.attempt.as_mut() else {
            return;
        };

        attempt.last_error = None;
        let was_correct = move_id == expected;
        attempt.history.push(MoveAttempt {
            attempted: move_id.clone(),
            expected: expected.clone(),
            was_correct,
            timestamp_ms: now_ms,
        });

        if was_correct {
            tracing::debug!("Correct move {}", move_id);
            attempt.position = position;
            attempt.move_index += 1;
            self.effects
                .push(Effect::Notice(SessionNotice::MoveAccepted(move_id)));
            if attempt.move_index == solution_len {
                self.queue.push_back(Transition::PuzzleSolved);
            } else {
                attempt.awaiting_reply = true;
                self.effects.push(Effect::Schedule {
                    deferred: Deferred {
                        generation,
                        task: DeferredTask::OpponentReply,
                    },
                    delay: reply_delay,
                });
            }
        } else {
            // The attempt keeps its pre-move position; the wrong move is
            // never committed.
            tracing::debug!("Wrong move {} (expected {})", move_id, expected);
            self.effects.push(Effect::Notice(SessionNotice::WrongMove {
                attempted: move_id,
                expected,
            }));
            self.queue
                .push_back(Transition::PuzzleFailed(FailReason::WrongMove));
        }
    }

    fn opponent_reply(&mut self) {
        let waiting = self.phase == Phase::Playing
            && self
                .attempt
                .as_ref()
                .is_some_and(|a| a.awaiting_reply && a.outcome == Outcome::InProgress);
        if !waiting {
            return;
        }
        let Some((index, move_id, solution_len)) = self.current_puzzle().and_then(|p| {
            let index = self.attempt.as_ref()?.move_index;
            Some((index, p.solution.get(index)?.clone(), p.solution_len()))
        }) else {
            return;
        };
        let Some(attempt) = self.attempt.as_ref() else {
            return;
        };

        let applied = move_id
            .decode()
            .map_err(|e| e.to_string())
            .and_then(|parts| {
                self.oracle
                    .apply_move(&attempt.position, &MoveRequest::from(parts))
                    .map_err(|e| e.to_string())
            });

        match applied {
            Ok(applied) => {
                if let Some(attempt) = self.attempt.as_mut() {
                    attempt.position = applied.position;
                    attempt.move_index = index + 1;
                    attempt.awaiting_reply = false;
                }
                tracing::debug!("Opponent played {}", move_id);
                self.effects
                    .push(Effect::Notice(SessionNotice::OpponentMoved(move_id)));
                if index + 1 == solution_len {
                    self.queue.push_back(Transition::PuzzleSolved);
                }
            }
            Err(reason) => {
                tracing::error!("Opponent move {} cannot be played: {}", move_id, reason);
                self.queue
                    .push_back(Transition::PuzzleFailed(FailReason::Corrupt));
            }
        }
    }

    fn puzzle_solved(&mut self) {
        let Some(attempt) = self.attempt.as_mut() else {
            return;
        };
        if attempt.outcome != Outcome::InProgress {
            return;
        }
        attempt.outcome = Outcome::Solved;
        attempt.awaiting_reply = false;

        self.effects.push(Effect::StopTimer);
        if let Some(result) = self.puzzle_result(true) {
            tracing::info!(
                "Puzzle {} solved in {}s",
                result.puzzle_id,
                result.time_spent_secs
            );
            self.effects.push(Effect::Notice(SessionNotice::PuzzleSolved(
                result.puzzle_id.clone(),
            )));
            self.effects.push(Effect::ReportPuzzle(result));
        }
        self.enter_review(self.settings.solved_review_secs);
    }

    fn puzzle_failed(&mut self, reason: FailReason) {
        let Some(attempt) = self.attempt.as_mut() else {
            return;
        };
        if attempt.outcome != Outcome::InProgress {
            return;
        }
        attempt.outcome = Outcome::Failed;
        attempt.fail_reason = Some(reason);
        attempt.awaiting_reply = false;

        self.effects.push(Effect::StopTimer);
        self.effects.push(Effect::CancelDeferred);
        if let Some(result) = self.puzzle_result(false) {
            tracing::info!("Puzzle {} failed ({:?})", result.puzzle_id, reason);
            self.effects.push(Effect::Notice(SessionNotice::PuzzleFailed {
                puzzle_id: result.puzzle_id.clone(),
                reason,
            }));
            self.effects.push(Effect::ReportPuzzle(result));
        }
        self.enter_review(self.settings.failed_review_secs);
    }

    fn puzzle_result(&self, solved: bool) -> Option<PuzzleResult> {
        let attempt = self.attempt.as_ref()?;
        let puzzle = self.supply.get(attempt.slot)?;
        Some(PuzzleResult {
            puzzle_id: puzzle.id.clone(),
            session_id: self.session_id.clone(),
            solved,
            attempts: attempt.history.len() as u32,
            correct_moves: attempt.correct_moves(),
            incorrect_moves: attempt.incorrect_moves(),
            time_spent_secs: (self.now_ms.saturating_sub(attempt.started_at_ms) / 1000)
                .min(self.settings.puzzle_budget.as_secs()),
        })
    }

    fn enter_review(&mut self, review_secs: u32) {
        self.phase = Phase::Reviewing;
        self.replay = ReplayState {
            show_solution: true,
            replay_index: 0,
            auto_play: true,
            position: None,
        };
        self.set_replay_index(0);
        self.review_remaining = Some(review_secs);

        if review_secs == 0 {
            self.queue.push_back(Transition::ReviewElapsed);
        } else {
            self.schedule(DeferredTask::ReviewTick, REVIEW_TICK);
        }
        if self.current_puzzle().is_some_and(|p| p.solution_len() > 0) {
            self.schedule(DeferredTask::ReplayStep, self.settings.replay_step);
        }
    }

    fn review_tick(&mut self) {
        if self.phase != Phase::Reviewing {
            return;
        }
        let remaining = self.review_remaining.unwrap_or(0).saturating_sub(1);
        self.review_remaining = Some(remaining);
        if remaining == 0 {
            self.queue.push_back(Transition::ReviewElapsed);
        } else {
            self.schedule(DeferredTask::ReviewTick, REVIEW_TICK);
        }
    }

    fn replay_step(&mut self) {
        if self.phase != Phase::Reviewing || !self.replay.auto_play {
            return;
        }
        let len = self.current_puzzle().map_or(0, PuzzleRecord::solution_len);
        if self.replay.replay_index >= len {
            return;
        }
        let index = self.replay.replay_index + 1;
        self.set_replay_index(index);
        self.effects
            .push(Effect::Notice(SessionNotice::ReplayAdvanced(index)));
        if index < len {
            self.schedule(DeferredTask::ReplayStep, self.settings.replay_step);
        }
    }

    fn set_replay_index(&mut self, index: usize) {
        self.replay.replay_index = index;
        let position = match self.current_puzzle() {
            Some(puzzle) => match replay::replay_position(&self.oracle, puzzle, index) {
                Ok(position) => Some(position),
                Err(e) => {
                    tracing::warn!("Cannot replay {} to {}: {}", puzzle.id, index, e);
                    None
                }
            },
            None => None,
        };
        self.replay.position = position;
    }

    fn advance(&mut self) {
        if self.phase == Phase::SessionComplete {
            return;
        }
        self.phase = Phase::Advancing;
        self.effects.push(Effect::CancelDeferred);
        match self.supply.next_slot(self.slot) {
            Some(next) => self.queue.push_back(Transition::Load {
                slot: next,
                resume: false,
            }),
            None => self.complete_session(),
        }
    }

    fn complete_session(&mut self) {
        if self.completed {
            return;
        }
        self.completed = true;
        self.phase = Phase::SessionComplete;
        self.queue.clear();
        self.review_remaining = None;
        self.effects.push(Effect::StopTimer);
        self.effects.push(Effect::CancelDeferred);
        self.effects.push(Effect::CompleteSession);
        self.effects
            .push(Effect::Notice(SessionNotice::SessionComplete));
        tracing::info!("Session complete");
    }

    fn schedule(&mut self, task: DeferredTask, delay: Duration) {
        self.effects.push(Effect::Schedule {
            deferred: Deferred {
                generation: self.generation,
                task,
            },
            delay,
        });
    }
}
