//! Configuration for the puzzle trainer.
//!
//! Every tunable has a compile-time default and can be overridden at runtime
//! via a dedicated environment variable. Values that fail to parse fall back to
//! the default.
//!
//! The data directory follows this precedence:
//! 1. TRAINER_DATA_DIR environment variable
//! 2. ~/.config/puzzle-trainer/data (production default)
//! 3. ./data (fallback for development)

use std::path::PathBuf;
use std::time::Duration;

use crate::session::EngineSettings;
use crate::timer::PauseMode;

const DEFAULT_CONFIG_DIR: &str = ".config/puzzle-trainer/data";
const DEV_DATA_DIR: &str = "./data";

/// Time allowed per puzzle.
const DEFAULT_PUZZLE_SECS: u64 = 120;

/// Delay before the opponent's forced reply is played.
const DEFAULT_REPLY_DELAY_MS: u64 = 500;

/// Review countdown after a solved puzzle.
const DEFAULT_SOLVED_REVIEW_SECS: u32 = 5;

/// Review countdown after a failed puzzle. Longer, the user has to study the line.
const DEFAULT_FAILED_REVIEW_SECS: u32 = 15;

/// Cadence of the automatic solution replay.
const DEFAULT_REPLAY_STEP_MS: u64 = 3000;

/// Display tick. Roughly one frame at 60 Hz.
const DEFAULT_TICK_MS: u64 = 16;

/// Timer heartbeat. Must stay at or below one second.
const DEFAULT_HEARTBEAT_MS: u64 = 1000;

/// Get the data directory for persistence.
///
/// Priority:
/// 1. TRAINER_DATA_DIR env variable if set
/// 2. $HOME/.config/puzzle-trainer/data if HOME is set
/// 3. ./data as fallback
pub fn get_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("TRAINER_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(DEFAULT_CONFIG_DIR);
    }

    PathBuf::from(DEV_DATA_DIR)
}

/// Seconds allowed per puzzle (`TRAINER_PUZZLE_SECS`, default 120).
pub fn get_puzzle_secs() -> u64 {
    env_or("TRAINER_PUZZLE_SECS", DEFAULT_PUZZLE_SECS)
}

/// Opponent reply delay in ms (`TRAINER_REPLY_DELAY_MS`, default 500).
pub fn get_reply_delay_ms() -> u64 {
    env_or("TRAINER_REPLY_DELAY_MS", DEFAULT_REPLY_DELAY_MS)
}

/// Review countdown after success (`TRAINER_SOLVED_REVIEW_SECS`, default 5).
pub fn get_solved_review_secs() -> u32 {
    env_or("TRAINER_SOLVED_REVIEW_SECS", DEFAULT_SOLVED_REVIEW_SECS)
}

/// Review countdown after failure (`TRAINER_FAILED_REVIEW_SECS`, default 15).
pub fn get_failed_review_secs() -> u32 {
    env_or("TRAINER_FAILED_REVIEW_SECS", DEFAULT_FAILED_REVIEW_SECS)
}

/// Solution replay cadence in ms (`TRAINER_REPLAY_STEP_MS`, default 3000).
pub fn get_replay_step_ms() -> u64 {
    env_or("TRAINER_REPLAY_STEP_MS", DEFAULT_REPLAY_STEP_MS)
}

/// Display tick in ms (`TRAINER_TICK_MS`, default 16).
pub fn get_tick_ms() -> u64 {
    env_or("TRAINER_TICK_MS", DEFAULT_TICK_MS).max(1)
}

/// Heartbeat interval in ms (`TRAINER_HEARTBEAT_MS`, default 1000, capped at 1000).
pub fn get_heartbeat_ms() -> u64 {
    env_or("TRAINER_HEARTBEAT_MS", DEFAULT_HEARTBEAT_MS).clamp(1, DEFAULT_HEARTBEAT_MS)
}

/// Pause semantics (`TRAINER_PAUSE_MODE` = `wall` | `frozen`, default `wall`).
pub fn get_pause_mode() -> PauseMode {
    std::env::var("TRAINER_PAUSE_MODE")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or_default()
}

/// Optional cool-down between sessions (`TRAINER_SESSION_COOLDOWN_SECS`, unset by default).
pub fn get_session_cooldown_secs() -> Option<u64> {
    std::env::var("TRAINER_SESSION_COOLDOWN_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    parse_or(std::env::var(name).ok().as_deref(), default)
}

fn parse_or<T: std::str::FromStr>(value: Option<&str>, default: T) -> T {
    value.and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// A failed puzzle always gets a longer review than a solved one.
fn review_windows(solved_secs: u32, failed_secs: u32) -> (u32, u32) {
    if failed_secs > solved_secs {
        return (solved_secs, failed_secs);
    }
    let failed = solved_secs.saturating_add(1);
    tracing::warn!(
        "Failed review ({}s) must be longer than solved review ({}s), using {}s",
        failed_secs,
        solved_secs,
        failed
    );
    (solved_secs, failed)
}

/// All runtime tunables, resolved once at startup.
#[derive(Debug, Clone)]
pub struct TrainerConfig {
    pub data_dir: PathBuf,
    pub engine: EngineSettings,
    pub tick: Duration,
    pub heartbeat: Duration,
    pub pause_mode: PauseMode,
    pub session_cooldown: Option<Duration>,
}

impl TrainerConfig {
    pub fn from_env() -> Self {
        let (solved_review_secs, failed_review_secs) =
            review_windows(get_solved_review_secs(), get_failed_review_secs());
        Self {
            data_dir: get_data_dir(),
            engine: EngineSettings {
                puzzle_budget: Duration::from_secs(get_puzzle_secs()),
                reply_delay: Duration::from_millis(get_reply_delay_ms()),
                solved_review_secs,
                failed_review_secs,
                replay_step: Duration::from_millis(get_replay_step_ms()),
            },
            tick: Duration::from_millis(get_tick_ms()),
            heartbeat: Duration::from_millis(get_heartbeat_ms()),
            pause_mode: get_pause_mode(),
            session_cooldown: get_session_cooldown_secs().map(Duration::from_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_data_dir_fallback() {
        // Returns the env var when set, which is also correct behavior.
        let dir = get_data_dir();
        assert!(!dir.as_os_str().is_empty());
    }

    #[test]
    fn test_defaults_without_env() {
        if std::env::var("TRAINER_PUZZLE_SECS").is_err() {
            assert_eq!(get_puzzle_secs(), DEFAULT_PUZZLE_SECS);
        }
        if std::env::var("TRAINER_HEARTBEAT_MS").is_err() {
            assert_eq!(get_heartbeat_ms(), DEFAULT_HEARTBEAT_MS);
        }
    }

    #[test]
    fn test_env_or_unset_variable_uses_default() {
        // Variable name chosen so no real configuration collides with it.
        assert_eq!(env_or("TRAINER_TEST_UNSET_VARIABLE", 7u64), 7);
    }

    #[test]
    fn test_parse_or_falls_back_on_garbage() {
        assert_eq!(parse_or(Some("soon"), 7u64), 7);
        assert_eq!(parse_or(Some("-3"), 7u64), 7);
        assert_eq!(parse_or(Some("42"), 7u64), 42);
        assert_eq!(parse_or::<u64>(None, 7), 7);
    }

    #[test]
    fn test_review_windows_keep_failed_longer() {
        assert_eq!(review_windows(5, 15), (5, 15));
        assert_eq!(review_windows(10, 10), (10, 11));
        assert_eq!(review_windows(20, 3), (20, 21));
    }

    #[test]
    fn test_failed_review_longer_than_solved() {
        assert!(DEFAULT_FAILED_REVIEW_SECS > DEFAULT_SOLVED_REVIEW_SECS);
    }
}
