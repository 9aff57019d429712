//! The session actor driven by a manual clock and real tokio ticks.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chess::{CozyOracle, PieceColor, START_FEN};
use puzzle_trainer::clock::ManualClock;
use puzzle_trainer::puzzle::{PuzzleRecord, PuzzleSupply, SessionBound};
use puzzle_trainer::report::{
    PuzzleResult, ReportError, ResultReporter, SessionAck, SessionCompletion,
};
use puzzle_trainer::session::{
    spawn_session, Phase, ReportRequest, SessionError, SessionEvent, SessionHandle,
    SessionNotice, SessionOptions,
};
use puzzle_trainer::timer::{deadline_key, MemoryTimerStore, TimerStore};
use tokio::sync::broadcast;

#[derive(Default)]
struct RecordingReporter {
    calls: Mutex<Vec<ReportRequest>>,
}

impl ResultReporter for RecordingReporter {
    async fn record_puzzle_result(&self, result: &PuzzleResult) -> Result<(), ReportError> {
        self.calls
            .lock()
            .unwrap()
            .push(ReportRequest::Puzzle(result.clone()));
        Ok(())
    }

    async fn complete_session(
        &self,
        completion: &SessionCompletion,
    ) -> Result<SessionAck, ReportError> {
        self.calls
            .lock()
            .unwrap()
            .push(ReportRequest::Session(completion.clone()));
        Ok(SessionAck {
            next_available_at: Some(42),
        })
    }
}

fn opening() -> PuzzleRecord {
    PuzzleRecord::new("p1", START_FEN, ["e2e4", "e7e5", "g1f3"], PieceColor::White)
}

fn spawn(
    clock: &Arc<ManualClock>,
    store: MemoryTimerStore,
    reporter: &Arc<RecordingReporter>,
) -> (SessionHandle, tokio::task::JoinHandle<()>) {
    let supply = PuzzleSupply::ordered(vec![opening()])
        .unwrap()
        .bounded(SessionBound::Bounded);
    let options = SessionOptions {
        tick: Duration::from_millis(5),
        heartbeat: Duration::from_millis(20),
        ..SessionOptions::default()
    };
    spawn_session(
        CozyOracle,
        supply,
        store,
        Arc::clone(reporter),
        clock.clone(),
        options,
    )
}

async fn wait_for(
    events: &mut broadcast::Receiver<SessionEvent>,
    pred: impl Fn(&SessionEvent) -> bool,
) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

#[tokio::test]
async fn solved_puzzle_and_completion_reach_reporter_in_order() {
    let clock = Arc::new(ManualClock::at(1_000));
    let reporter = Arc::new(RecordingReporter::default());
    let (handle, join) = spawn(&clock, MemoryTimerStore::new(), &reporter);

    let (snapshot, mut events) = handle.subscribe().await.unwrap();
    assert_eq!(snapshot.phase, Phase::Playing);
    assert_eq!(snapshot.timer.remaining_secs, 120);

    let snap = handle.submit_move_str("E2E4").await.unwrap();
    assert!(snap.puzzle.unwrap().awaiting_reply);

    clock.advance_ms(500);
    wait_for(&mut events, |e| {
        matches!(e, SessionEvent::Notice(SessionNotice::OpponentMoved(_)))
    })
    .await;

    clock.advance_ms(1_500);
    let snap = handle.submit_move_str("g1f3").await.unwrap();
    assert_eq!(snap.phase, Phase::Reviewing);

    let snap = handle.finish().await.unwrap();
    assert_eq!(snap.phase, Phase::SessionComplete);
    let ack = wait_for(&mut events, |e| {
        matches!(e, SessionEvent::SessionAcknowledged(_))
    })
    .await;
    assert!(matches!(
        ack,
        SessionEvent::SessionAcknowledged(SessionAck {
            next_available_at: Some(42)
        })
    ));

    handle.shutdown().await;
    join.await.unwrap();

    let calls = reporter.calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    match &calls[0] {
        ReportRequest::Puzzle(result) => {
            assert!(result.solved);
            assert_eq!(result.attempts, 2);
            assert_eq!(result.time_spent_secs, 2);
        }
        other => panic!("expected puzzle result, got {:?}", other),
    }
    match &calls[1] {
        ReportRequest::Session(completion) => {
            assert_eq!(completion.puzzles_completed, 1);
            assert_eq!(completion.total_correct_moves, 2);
            assert_eq!(completion.session_id, handle.id());
        }
        other => panic!("expected session completion, got {:?}", other),
    }
}

#[tokio::test]
async fn malformed_input_is_rejected_before_the_engine() {
    let clock = Arc::new(ManualClock::at(0));
    let reporter = Arc::new(RecordingReporter::default());
    let (handle, join) = spawn(&clock, MemoryTimerStore::new(), &reporter);

    let err = handle.submit_move_str("e9e4").await.unwrap_err();
    assert!(matches!(err, SessionError::MalformedMove(_)));
    let snap = handle.get_snapshot().await.unwrap();
    assert!(snap.puzzle.unwrap().history.is_empty());

    handle.shutdown().await;
    join.await.unwrap();
}

#[tokio::test]
async fn shutdown_keeps_the_persisted_deadline() {
    let clock = Arc::new(ManualClock::at(0));
    let store = MemoryTimerStore::new();
    let reporter = Arc::new(RecordingReporter::default());
    let (handle, join) = spawn(&clock, store.clone(), &reporter);

    handle.get_snapshot().await.unwrap();
    clock.advance_ms(4_000);
    handle.shutdown().await;
    join.await.unwrap();

    assert_eq!(
        store.get(&deadline_key("p1")).unwrap().as_deref(),
        Some("120000")
    );
    assert!(reporter.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn pause_holds_the_opponent_reply() {
    let clock = Arc::new(ManualClock::at(0));
    let reporter = Arc::new(RecordingReporter::default());
    let (handle, join) = spawn(&clock, MemoryTimerStore::new(), &reporter);

    handle.submit_move_str("e2e4").await.unwrap();
    handle.pause().await.unwrap();
    assert_eq!(handle.pause().await.unwrap_err(), SessionError::Paused);

    clock.advance_ms(10_000);
    tokio::time::sleep(Duration::from_millis(30)).await;
    let snap = handle.get_snapshot().await.unwrap();
    assert!(snap.paused);
    assert_eq!(snap.puzzle.unwrap().move_index, 1);

    let (_, mut events) = handle.subscribe().await.unwrap();
    handle.resume().await.unwrap();
    clock.advance_ms(500);
    wait_for(&mut events, |e| {
        matches!(e, SessionEvent::Notice(SessionNotice::OpponentMoved(_)))
    })
    .await;

    handle.shutdown().await;
    join.await.unwrap();
}
