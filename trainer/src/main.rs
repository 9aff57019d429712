//! Line-oriented puzzle trainer.
//!
//! `play` runs a session on stdin/stdout: type moves as `e2e4` (promotion as
//! `e7e8q`) and control words such as `next`, `prev`, `pause` or `quit`.
//! `check` replays every solution in a puzzle file and lists the problems.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chess::CozyOracle;
use clap::{Parser, Subcommand};
use puzzle_trainer::clock::{Clock, SystemClock};
use puzzle_trainer::config::TrainerConfig;
use puzzle_trainer::puzzle::{load_puzzle_file, IngestReport, PuzzleSupply, SessionBound};
use puzzle_trainer::replay;
use puzzle_trainer::report::JsonResultReporter;
use puzzle_trainer::session::{
    spawn_session, FailReason, ReviewStep, SessionError, SessionEvent, SessionHandle,
    SessionNotice, SessionOptions, SessionSnapshot,
};
use puzzle_trainer::timer::{format_remaining, JsonTimerStore, MemoryTimerStore, TimerStore};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "puzzle-trainer", about = "Chess tactics trainer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Work through a puzzle file.
    Play {
        /// JSON puzzle file.
        file: PathBuf,
        /// Present puzzles in random order.
        #[arg(long)]
        shuffle: bool,
        /// Seed for --shuffle, for a repeatable order.
        #[arg(long, requires = "shuffle")]
        seed: Option<u64>,
        /// 1-based puzzle to start from.
        #[arg(long, default_value_t = 1)]
        start: usize,
        /// End the session after the last puzzle instead of wrapping around.
        #[arg(long)]
        bounded: bool,
        /// Continue the countdown left by an interrupted run.
        #[arg(long)]
        resume: bool,
        /// Start even if the last session asked for a cool-down.
        #[arg(long)]
        ignore_cooldown: bool,
    },
    /// Validate a puzzle file by replaying every solution.
    Check {
        /// JSON puzzle file.
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = TrainerConfig::from_env();

    // Stdout belongs to the session, so logs go to a file.
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let file_appender = tracing_appender::rolling::daily(&log_dir, "puzzle-trainer");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match cli.command {
        Commands::Check { file } => check(&file),
        Commands::Play {
            file,
            shuffle,
            seed,
            start,
            bounded,
            resume,
            ignore_cooldown,
        } => {
            let order = Order {
                shuffle,
                seed,
                start,
                bounded,
            };
            play(&config, &file, order, resume, ignore_cooldown).await
        }
    }
}

struct Order {
    shuffle: bool,
    seed: Option<u64>,
    start: usize,
    bounded: bool,
}

fn load(file: &Path) -> anyhow::Result<IngestReport> {
    let report = load_puzzle_file(file)
        .with_context(|| format!("Failed to read puzzles from {}", file.display()))?;
    for rejected in &report.rejected {
        eprintln!("Skipping record #{}: {}", rejected.index + 1, rejected.error);
    }
    Ok(report)
}

fn check(file: &Path) -> anyhow::Result<()> {
    let report = load(file)?;
    let mut problems = report.rejected.len();
    for puzzle in &report.records {
        match replay::validate(&CozyOracle, puzzle) {
            Ok(()) => println!("ok    {} ({} plies)", puzzle.id, puzzle.solution_len()),
            Err(e) => {
                problems += 1;
                println!("FAIL  {}: {}", puzzle.id, e);
            }
        }
    }
    println!(
        "{} puzzle(s) checked, {} problem(s)",
        report.records.len(),
        problems
    );
    if problems > 0 {
        anyhow::bail!("{} problem(s) found in {}", problems, file.display());
    }
    Ok(())
}

async fn play(
    config: &TrainerConfig,
    file: &Path,
    order: Order,
    resume: bool,
    ignore_cooldown: bool,
) -> anyhow::Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let reporter = Arc::new(
        JsonResultReporter::new(config.data_dir.clone()).with_cooldown(config.session_cooldown),
    );

    if !ignore_cooldown {
        if let Some(at) = reporter.store().latest_next_available_at()? {
            let now = clock.now_ms();
            if at > now {
                anyhow::bail!(
                    "Next session available in {}s (use --ignore-cooldown to start anyway)",
                    (at - now).div_ceil(1000)
                );
            }
        }
    }

    let report = load(file)?;
    if report.records.is_empty() {
        anyhow::bail!("No usable puzzles in {}", file.display());
    }
    let total = report.records.len();
    let supply = if order.shuffle {
        let mut rng = match order.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        PuzzleSupply::shuffled(report.records, &mut rng)?
    } else {
        PuzzleSupply::ordered(report.records)?
    };
    let supply = supply
        .starting_at(order.start.saturating_sub(1))?
        .bounded(if order.bounded {
            SessionBound::Bounded
        } else {
            SessionBound::Wrapping
        });

    let store: Arc<dyn TimerStore> = match JsonTimerStore::open(config.data_dir.join("timer.json"))
    {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::warn!("Timer store unavailable, countdown will not survive restarts: {}", e);
            Arc::new(MemoryTimerStore::new())
        }
    };

    let options = SessionOptions {
        resume,
        ..SessionOptions::from(config)
    };
    let (handle, join) = spawn_session(CozyOracle, supply, store, reporter, clock, options);
    tracing::info!("Playing {} puzzle(s) from {}", total, file.display());

    let (snapshot, events) = handle.subscribe().await?;
    println!("Session {} ({} puzzles). Type `help` for commands.", handle.id(), total);
    print_position(&snapshot);
    let printer = tokio::spawn(print_events(snapshot, events));

    run_input_loop(&handle).await?;

    handle.shutdown().await;
    join.await.context("Session task failed")?;
    printer.abort();
    Ok(())
}

async fn run_input_loop(handle: &SessionHandle) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let input = line.trim().to_ascii_lowercase();
        let result = match input.as_str() {
            "" => continue,
            "help" | "?" => {
                print_help();
                continue;
            }
            "quit" | "q" | "exit" => {
                let snapshot = handle.finish().await?;
                print_summary(&snapshot);
                return Ok(());
            }
            "status" | "s" => handle.get_snapshot().await.map(|s| print_status(&s)),
            "next" | "n" | "skip" => handle.next_puzzle().await.map(drop),
            "prev" | "p" => handle.step_review(ReviewStep::Previous).await.map(drop),
            "fwd" | "f" => handle.step_review(ReviewStep::Next).await.map(drop),
            "start" => handle.step_review(ReviewStep::Start).await.map(drop),
            "end" => handle.step_review(ReviewStep::End).await.map(drop),
            "pause" => handle.pause().await,
            "resume" => handle.resume().await,
            "hide" => handle.set_visible(false).await,
            "show" => handle.set_visible(true).await,
            mv => handle.submit_move_str(mv).await.map(drop),
        };
        if let Err(e) = result {
            match e {
                SessionError::Internal(_) => return Err(e.into()),
                e => println!("! {}", e),
            }
        }
    }
    // Stdin closed: end the session properly.
    let snapshot = handle.finish().await?;
    print_summary(&snapshot);
    Ok(())
}

async fn print_events(mut last: SessionSnapshot, mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(SessionEvent::StateChanged(snapshot)) => {
                let puzzle_changed = snapshot.progress != last.progress
                    || snapshot.puzzle.as_ref().map(|p| &p.puzzle_id)
                        != last.puzzle.as_ref().map(|p| &p.puzzle_id);
                let fen_changed = snapshot.puzzle.as_ref().map(|p| &p.fen)
                    != last.puzzle.as_ref().map(|p| &p.fen);
                if puzzle_changed || fen_changed {
                    print_position(&snapshot);
                }
                last = snapshot;
            }
            Ok(SessionEvent::Notice(notice)) => print_notice(&notice),
            Ok(SessionEvent::SessionAcknowledged(ack)) => {
                if let Some(at) = ack.next_available_at {
                    println!("Next session available at {} (unix ms)", at);
                }
            }
            Ok(SessionEvent::Error(message)) => println!("! {}", message),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!("Console lagged behind by {} event(s)", n);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn print_notice(notice: &SessionNotice) {
    match notice {
        SessionNotice::PuzzleLoaded { .. } => {}
        SessionNotice::PuzzleSkipped { puzzle_id, reason } => {
            println!("Skipping puzzle {}: {}", puzzle_id, reason)
        }
        SessionNotice::MoveAccepted(mv) => println!("  {} is correct", mv),
        SessionNotice::WrongMove {
            attempted,
            expected,
        } => println!("  {} is wrong, the move was {}", attempted, expected),
        SessionNotice::OpponentMoved(mv) => println!("  Opponent plays {}", mv),
        SessionNotice::PuzzleSolved(id) => println!("Puzzle {} solved!", id),
        SessionNotice::PuzzleFailed { puzzle_id, reason } => {
            let why = match reason {
                FailReason::WrongMove => "wrong move",
                FailReason::TimeExpired => "time is up",
                FailReason::Corrupt => "puzzle is broken",
            };
            println!("Puzzle {} failed: {}", puzzle_id, why);
        }
        SessionNotice::ReplayAdvanced(index) => println!("  Solution, ply {}", index),
        SessionNotice::SessionComplete => println!("Session complete."),
    }
}

fn print_position(snapshot: &SessionSnapshot) {
    let Some(puzzle) = snapshot.puzzle.as_ref() else {
        return;
    };
    let (n, total) = snapshot.progress;
    if snapshot.replay.is_none() && puzzle.move_index == 0 && puzzle.history.is_empty() {
        let theme = if puzzle.theme.is_empty() {
            String::new()
        } else {
            format!(" [{}]", puzzle.theme)
        };
        println!();
        println!(
            "Puzzle {} of {}{}: {} to move, {} left",
            n,
            total,
            theme,
            puzzle.side_to_move,
            format_remaining(snapshot.timer.remaining_secs)
        );
    }
    println!("  {}", puzzle.fen);
}

fn print_status(snapshot: &SessionSnapshot) {
    let (n, total) = snapshot.progress;
    println!("Phase {:?}{}", snapshot.phase, if snapshot.paused { " (paused)" } else { "" });
    println!("Puzzle {} of {}, {} left", n, total, format_remaining(snapshot.timer.remaining_secs));
    if let Some(puzzle) = &snapshot.puzzle {
        println!(
            "  {} / {} plies, {:?}, {} attempt(s)",
            puzzle.move_index,
            puzzle.solution_len,
            puzzle.outcome,
            puzzle.history.len()
        );
        if let Some(error) = &puzzle.last_error {
            println!("  last error: {}", error);
        }
    }
    if let Some(replay) = &snapshot.replay {
        println!(
            "  solution {} (showing ply {})",
            replay.solution.join(" "),
            replay.replay_index
        );
    }
    if let Some(secs) = snapshot.review_remaining_secs {
        println!("  next puzzle in {}s", secs);
    }
}

fn print_summary(snapshot: &SessionSnapshot) {
    let s = &snapshot.summary;
    println!(
        "Solved {}, failed {}, {} correct and {} incorrect move(s).",
        s.puzzles_completed, s.puzzles_failed, s.total_correct_moves, s.total_incorrect_moves
    );
}

fn print_help() {
    println!("Moves: e2e4, e7e8q ...");
    println!("During review: prev/p, fwd/f, start, end, next/n");
    println!("Other: status/s, pause, resume, hide, show, quit/q");
}
