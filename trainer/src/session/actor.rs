use std::sync::Arc;

use chess::PositionOracle;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::Instrument;

use super::commands::*;
use super::driver::{DriverOutput, ReportRequest, SessionDriver};
use super::events::SessionEvent;
use crate::clock::Clock;
use crate::report::ResultReporter;
use crate::timer::TimerStore;

/// Everything the actor loop owns. No locks.
pub(crate) struct ActorState<O, S> {
    pub session_id: String,
    pub driver: SessionDriver<O, S>,
    pub clock: Arc<dyn Clock>,
    pub tick: time::Duration,
    pub heartbeat: time::Duration,
    pub resume: bool,
}

/// The main session actor loop.
/// Processes commands, display ticks, heartbeats and deferred tasks
/// sequentially.
pub(crate) async fn run_session_actor<O, S, R>(
    state: ActorState<O, S>,
    reporter: Arc<R>,
    cmd_rx: mpsc::Receiver<SessionCommand>,
    event_tx: broadcast::Sender<SessionEvent>,
) where
    O: PositionOracle + 'static,
    S: TimerStore + 'static,
    R: ResultReporter + 'static,
{
    let session_id = state.session_id.clone();
    run_session_actor_inner(state, reporter, cmd_rx, event_tx)
        .instrument(tracing::info_span!("session", id = %session_id))
        .await;
}

async fn run_session_actor_inner<O, S, R>(
    mut state: ActorState<O, S>,
    reporter: Arc<R>,
    mut cmd_rx: mpsc::Receiver<SessionCommand>,
    event_tx: broadcast::Sender<SessionEvent>,
) where
    O: PositionOracle + 'static,
    S: TimerStore + 'static,
    R: ResultReporter + 'static,
{
    tracing::info!("Session actor started");

    let (report_tx, report_worker) = spawn_report_worker(reporter, event_tx.clone());

    let mut tick_interval = time::interval(state.tick);
    tick_interval.set_missed_tick_behavior(time::MissedTickBehavior::Skip);
    let mut heartbeat_interval = time::interval(state.heartbeat);
    heartbeat_interval.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

    let now = state.clock.now_ms();
    let out = state.driver.start(now, state.resume);
    publish(&state, out, &event_tx, &report_tx);

    loop {
        tokio::select! {
            biased;

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(SessionCommand::Shutdown) | None => {
                        tracing::info!("Session actor shutting down");
                        state.driver.shutdown(state.clock.now_ms());
                        break;
                    }
                    Some(cmd) => handle_command(&mut state, cmd, &event_tx, &report_tx),
                }
            }

            _ = tick_interval.tick() => {
                let out = state.driver.poll(state.clock.now_ms());
                publish(&state, out, &event_tx, &report_tx);
            }

            _ = heartbeat_interval.tick() => {
                state.driver.heartbeat(state.clock.now_ms());
            }
        }
    }

    // Let queued reports go out before the actor exits.
    drop(report_tx);
    if let Err(e) = report_worker.await {
        tracing::warn!("Report worker ended abnormally: {}", e);
    }

    tracing::info!("Session actor exited");
}

fn handle_command<O, S>(
    state: &mut ActorState<O, S>,
    cmd: SessionCommand,
    event_tx: &broadcast::Sender<SessionEvent>,
    report_tx: &mpsc::UnboundedSender<ReportRequest>,
) where
    O: PositionOracle,
    S: TimerStore,
{
    let now = state.clock.now_ms();
    match cmd {
        SessionCommand::SubmitMove { request, reply } => {
            let result = state.driver.submit_move(request, now);
            respond_with_snapshot(state, result, reply, event_tx, report_tx);
        }
        SessionCommand::StepReview { step, reply } => {
            let result = state.driver.step_review(step, now);
            respond_with_snapshot(state, result, reply, event_tx, report_tx);
        }
        SessionCommand::NextPuzzle { reply } => {
            let result = state.driver.next_puzzle(now);
            respond_with_snapshot(state, result, reply, event_tx, report_tx);
        }
        SessionCommand::Finish { reply } => {
            let out = state.driver.finish(now);
            respond_with_snapshot(state, Ok(out), reply, event_tx, report_tx);
        }
        SessionCommand::Pause { reply } => {
            let result = state.driver.pause(now);
            if result.is_ok() {
                let _ = event_tx.send(SessionEvent::StateChanged(state.driver.snapshot(now)));
            }
            let _ = reply.send(result);
        }
        SessionCommand::Resume { reply } => {
            let result = state.driver.resume(now);
            if result.is_ok() {
                let _ = event_tx.send(SessionEvent::StateChanged(state.driver.snapshot(now)));
            }
            let _ = reply.send(result);
        }
        SessionCommand::SetVisible { visible, reply } => {
            let out = state.driver.set_visible(visible, now);
            publish(state, out, event_tx, report_tx);
            let _ = reply.send(());
        }
        SessionCommand::GetSnapshot { reply } => {
            let _ = reply.send(state.driver.snapshot(now));
        }
        SessionCommand::Subscribe { reply } => {
            let snapshot = state.driver.snapshot(now);
            let rx = event_tx.subscribe();
            let _ = reply.send((snapshot, rx));
        }
        SessionCommand::Shutdown => unreachable!(),
    }
}

fn respond_with_snapshot<O, S>(
    state: &ActorState<O, S>,
    result: Result<DriverOutput, SessionError>,
    reply: tokio::sync::oneshot::Sender<Result<super::SessionSnapshot, SessionError>>,
    event_tx: &broadcast::Sender<SessionEvent>,
    report_tx: &mpsc::UnboundedSender<ReportRequest>,
) where
    O: PositionOracle,
    S: TimerStore,
{
    match result {
        Ok(out) => {
            let snapshot = state.driver.snapshot(state.clock.now_ms());
            publish_output(out, event_tx, report_tx);
            let _ = event_tx.send(SessionEvent::StateChanged(snapshot.clone()));
            let _ = reply.send(Ok(snapshot));
        }
        Err(e) => {
            // A rejected move still leaves a transient error to display.
            if matches!(e, SessionError::IllegalMove(_)) {
                let snapshot = state.driver.snapshot(state.clock.now_ms());
                let _ = event_tx.send(SessionEvent::StateChanged(snapshot));
            }
            let _ = reply.send(Err(e));
        }
    }
}

fn publish<O, S>(
    state: &ActorState<O, S>,
    out: DriverOutput,
    event_tx: &broadcast::Sender<SessionEvent>,
    report_tx: &mpsc::UnboundedSender<ReportRequest>,
) where
    O: PositionOracle,
    S: TimerStore,
{
    let changed = out.changed;
    publish_output(out, event_tx, report_tx);
    if changed {
        let _ = event_tx.send(SessionEvent::StateChanged(
            state.driver.snapshot(state.clock.now_ms()),
        ));
    }
}

fn publish_output(
    out: DriverOutput,
    event_tx: &broadcast::Sender<SessionEvent>,
    report_tx: &mpsc::UnboundedSender<ReportRequest>,
) {
    for notice in out.notices {
        let _ = event_tx.send(SessionEvent::Notice(notice));
    }
    for report in out.reports {
        if report_tx.send(report).is_err() {
            tracing::warn!("Report worker gone, dropping report");
        }
    }
}

/// Reporter calls run on their own task, in order, so a slow or failing
/// reporter never holds up the session loop.
fn spawn_report_worker<R: ResultReporter + 'static>(
    reporter: Arc<R>,
    event_tx: broadcast::Sender<SessionEvent>,
) -> (mpsc::UnboundedSender<ReportRequest>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<ReportRequest>();
    let handle = tokio::spawn(
        async move {
            while let Some(request) = rx.recv().await {
                match request {
                    ReportRequest::Puzzle(result) => {
                        if let Err(e) = reporter.record_puzzle_result(&result).await {
                            tracing::warn!(
                                "Failed to report result for {}: {}",
                                result.puzzle_id,
                                e
                            );
                        }
                    }
                    ReportRequest::Session(completion) => {
                        match reporter.complete_session(&completion).await {
                            Ok(ack) => {
                                let _ = event_tx.send(SessionEvent::SessionAcknowledged(ack));
                            }
                            Err(e) => {
                                tracing::warn!("Failed to report session completion: {}", e);
                                let _ = event_tx.send(SessionEvent::Error(format!(
                                    "Session summary not recorded: {}",
                                    e
                                )));
                            }
                        }
                    }
                }
            }
        }
        .in_current_span(),
    );
    (tx, handle)
}
