//! The puzzle countdown: a [`DeadlineClock`] backed by a [`TimerStore`].

use std::time::Duration;

use super::deadline::{self, DeadlineClock};
use super::store::{deadline_key, StoreError, TimerStore, DEADLINE_KEY_PREFIX, HEARTBEAT_KEY};

/// What pausing does to the deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PauseMode {
    /// The deadline stays where it is; time spent paused is lost.
    #[default]
    WallClock,
    /// The deadline moves back by the time spent paused.
    Frozen,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown pause mode {0:?} (expected \"wall\" or \"frozen\")")]
pub struct UnknownPauseMode(pub String);

impl std::str::FromStr for PauseMode {
    type Err = UnknownPauseMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wall" | "wallclock" | "wall-clock" => Ok(PauseMode::WallClock),
            "frozen" | "freeze" => Ok(PauseMode::Frozen),
            _ => Err(UnknownPauseMode(s.to_string())),
        }
    }
}

/// Fired once per armed deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerExpired {
    pub key: String,
}

/// Countdown for the current puzzle.
///
/// Storage failures never stop the countdown: the timer logs them and keeps
/// the deadline in memory from then on.
pub struct PersistentTimer<S> {
    store: S,
    mode: PauseMode,
    clock: Option<DeadlineClock>,
    running: bool,
    fired: bool,
    paused_at: Option<u64>,
    /// Remaining seconds shown after `stop`.
    stopped_secs: Option<u32>,
    last_heartbeat: Option<u64>,
    degraded: bool,
}

impl<S: TimerStore> PersistentTimer<S> {
    pub fn new(store: S, mode: PauseMode) -> Self {
        Self {
            store,
            mode,
            clock: None,
            running: false,
            fired: false,
            paused_at: None,
            stopped_secs: None,
            last_heartbeat: None,
            degraded: false,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn mode(&self) -> PauseMode {
        self.mode
    }

    pub fn clock(&self) -> Option<&DeadlineClock> {
        self.clock.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    pub fn last_heartbeat(&self) -> Option<u64> {
        self.last_heartbeat
    }

    /// Start a fresh countdown for `puzzle_key`. Deadlines persisted for any
    /// other puzzle are removed.
    pub fn arm(&mut self, puzzle_key: &str, budget: Duration, now_ms: u64) -> &DeadlineClock {
        self.purge_all();
        let clock = DeadlineClock::starting_at(puzzle_key, now_ms, budget);
        self.persist_deadline(&clock);
        tracing::debug!(
            "Timer armed for {}: {} ms (deadline {})",
            puzzle_key,
            budget.as_millis(),
            clock.deadline_ms
        );
        self.install(clock)
    }

    /// Resume a deadline persisted for `puzzle_key` or arm a fresh one.
    ///
    /// A persisted deadline that has already passed is kept as-is; it fires on
    /// the next [`tick`](Self::tick), never from here.
    pub fn arm_or_resume(
        &mut self,
        puzzle_key: &str,
        budget: Duration,
        now_ms: u64,
    ) -> &DeadlineClock {
        match self.read_deadline(puzzle_key) {
            Some(deadline_ms) => {
                self.purge_except(puzzle_key);
                tracing::info!(
                    "Resuming timer for {} with {} ms left",
                    puzzle_key,
                    deadline_ms.saturating_sub(now_ms)
                );
                self.install(DeadlineClock {
                    key: puzzle_key.to_string(),
                    deadline_ms,
                })
            }
            None => self.arm(puzzle_key, budget, now_ms),
        }
    }

    fn install(&mut self, clock: DeadlineClock) -> &DeadlineClock {
        self.running = true;
        self.fired = false;
        self.paused_at = None;
        self.stopped_secs = None;
        self.clock.insert(clock)
    }

    /// Display tick. Returns the expiry exactly once, then clears the
    /// persisted state.
    pub fn tick(&mut self, now_ms: u64) -> Option<TimerExpired> {
        if !self.running || self.fired || self.paused_at.is_some() {
            return None;
        }
        let clock = self.clock.as_ref()?;
        if !clock.is_expired(now_ms) {
            return None;
        }

        let key = clock.key.clone();
        self.fired = true;
        self.running = false;
        self.stopped_secs = Some(0);
        self.clear_persisted(&key);
        tracing::info!("Timer for {} expired", key);
        Some(TimerExpired { key })
    }

    /// Re-persist the unchanged deadline plus a liveness stamp.
    pub fn heartbeat(&mut self, now_ms: u64) {
        if !self.running || self.paused_at.is_some() {
            return;
        }
        if let Some(clock) = self.clock.clone() {
            self.persist_deadline(&clock);
            self.write(HEARTBEAT_KEY, &now_ms.to_string());
            self.last_heartbeat = Some(now_ms);
        }
    }

    /// Re-read the persisted deadline, as on becoming visible again.
    pub fn refresh(&mut self) {
        if !self.running {
            return;
        }
        let Some(key) = self.clock.as_ref().map(|c| c.key.clone()) else {
            return;
        };
        if let Some(deadline_ms) = self.read_deadline(&key) {
            if let Some(clock) = self.clock.as_mut() {
                clock.deadline_ms = deadline_ms;
            }
        }
    }

    pub fn pause(&mut self, now_ms: u64) {
        if self.running && self.paused_at.is_none() {
            self.paused_at = Some(now_ms);
        }
    }

    pub fn resume(&mut self, now_ms: u64) {
        let Some(paused_at) = self.paused_at.take() else {
            return;
        };
        self.give_back_paused(paused_at, now_ms);
    }

    /// Halt the countdown. The persisted deadline is kept; a frozen pause
    /// still in progress is credited to it first, so a restart sees the
    /// remaining time the display shows.
    pub fn stop(&mut self, now_ms: u64) {
        if self.running {
            self.stopped_secs = Some(self.remaining_secs(now_ms));
            if let Some(paused_at) = self.paused_at.take() {
                self.give_back_paused(paused_at, now_ms);
            }
            self.running = false;
        }
    }

    fn give_back_paused(&mut self, paused_at: u64, now_ms: u64) {
        if self.mode != PauseMode::Frozen {
            return;
        }
        if let Some(clock) = self.clock.take() {
            let clock = clock.postponed(now_ms.saturating_sub(paused_at));
            self.persist_deadline(&clock);
            self.clock = Some(clock);
        }
    }

    /// Forget the countdown and its persisted state.
    pub fn disarm(&mut self) {
        if let Some(clock) = self.clock.take() {
            self.clear_persisted(&clock.key);
        }
        self.running = false;
        self.paused_at = None;
        self.stopped_secs = None;
    }

    /// Seconds to show.
    pub fn remaining_secs(&self, now_ms: u64) -> u32 {
        if let Some(secs) = self.stopped_secs {
            return secs;
        }
        let Some(clock) = self.clock.as_ref() else {
            return 0;
        };
        let at = match (self.paused_at, self.mode) {
            (Some(paused_at), PauseMode::Frozen) => paused_at,
            _ => now_ms,
        };
        deadline::remaining_secs(clock, at)
    }

    fn read_deadline(&mut self, puzzle_key: &str) -> Option<u64> {
        if self.degraded {
            return None;
        }
        match self.store.get(&deadline_key(puzzle_key)) {
            Ok(Some(raw)) => match raw.parse() {
                Ok(ms) => Some(ms),
                Err(_) => {
                    tracing::warn!("Discarding unreadable deadline {:?} for {}", raw, puzzle_key);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                self.degrade(e);
                None
            }
        }
    }

    fn persist_deadline(&mut self, clock: &DeadlineClock) {
        self.write(&deadline_key(&clock.key), &clock.deadline_ms.to_string());
    }

    fn clear_persisted(&mut self, puzzle_key: &str) {
        self.remove(&deadline_key(puzzle_key));
        self.remove(HEARTBEAT_KEY);
    }

    fn purge_all(&mut self) {
        self.purge_matching(|_| true);
    }

    fn purge_except(&mut self, puzzle_key: &str) {
        let keep = deadline_key(puzzle_key);
        self.purge_matching(|k| k != keep);
    }

    fn purge_matching(&mut self, mut pred: impl FnMut(&str) -> bool) {
        if self.degraded {
            return;
        }
        let keys = match self.store.keys() {
            Ok(keys) => keys,
            Err(e) => return self.degrade(e),
        };
        for key in keys {
            if key.starts_with(DEADLINE_KEY_PREFIX) && pred(key.as_str()) {
                self.remove(&key);
            }
        }
        self.remove(HEARTBEAT_KEY);
    }

    fn write(&mut self, key: &str, value: &str) {
        if self.degraded {
            return;
        }
        if let Err(e) = self.store.set(key, value) {
            self.degrade(e);
        }
    }

    fn remove(&mut self, key: &str) {
        if self.degraded {
            return;
        }
        if let Err(e) = self.store.delete(key) {
            self.degrade(e);
        }
    }

    fn degrade(&mut self, error: StoreError) {
        tracing::warn!("Timer storage unavailable, keeping deadline in memory: {}", error);
        self.degraded = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::MemoryTimerStore;

    const TEN_SECS: Duration = Duration::from_secs(10);

    struct BrokenStore;

    impl TimerStore for BrokenStore {
        fn get(&self, _: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Unavailable("offline".into()))
        }
        fn set(&self, _: &str, _: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("offline".into()))
        }
        fn delete(&self, _: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("offline".into()))
        }
        fn keys(&self) -> Result<Vec<String>, StoreError> {
            Err(StoreError::Unavailable("offline".into()))
        }
    }

    #[test]
    fn test_fires_exactly_once_and_clears_storage() {
        let store = MemoryTimerStore::new();
        let mut timer = PersistentTimer::new(store.clone(), PauseMode::WallClock);
        timer.arm("p1", TEN_SECS, 0);
        assert_eq!(
            store.get("puzzle_timer_end_p1").unwrap().as_deref(),
            Some("10000")
        );

        assert_eq!(timer.tick(9_999), None);
        assert_eq!(
            timer.tick(10_000),
            Some(TimerExpired { key: "p1".into() })
        );
        assert_eq!(timer.tick(10_016), None);
        assert_eq!(timer.tick(20_000), None);
        assert!(store.keys().unwrap().is_empty());
        assert_eq!(timer.remaining_secs(20_000), 0);
    }

    #[test]
    fn test_reload_resumes_persisted_deadline() {
        let store = MemoryTimerStore::new();
        let mut first = PersistentTimer::new(store.clone(), PauseMode::WallClock);
        first.arm("p1", TEN_SECS, 1_000);
        drop(first);

        let mut reloaded = PersistentTimer::new(store, PauseMode::WallClock);
        reloaded.arm_or_resume("p1", TEN_SECS, 5_000);
        let secs = reloaded.remaining_secs(5_000);
        assert!((5..=6).contains(&secs), "remaining {}", secs);
    }

    #[test]
    fn test_expired_on_reload_fires_on_next_tick_only() {
        let store = MemoryTimerStore::new();
        PersistentTimer::new(store.clone(), PauseMode::WallClock).arm("p1", TEN_SECS, 0);

        let mut reloaded = PersistentTimer::new(store, PauseMode::WallClock);
        reloaded.arm_or_resume("p1", TEN_SECS, 60_000);
        assert!(reloaded.is_running());
        assert!(reloaded.tick(60_001).is_some());
    }

    #[test]
    fn test_arm_purges_other_puzzles() {
        let store = MemoryTimerStore::new();
        store.set("puzzle_timer_end_old", "1").unwrap();
        store.set("unrelated", "x").unwrap();
        let mut timer = PersistentTimer::new(store.clone(), PauseMode::WallClock);
        timer.arm("p2", TEN_SECS, 0);
        assert_eq!(
            store.keys().unwrap(),
            vec!["puzzle_timer_end_p2".to_string(), "unrelated".to_string()]
        );
    }

    #[test]
    fn test_heartbeat_keeps_deadline_fixed() {
        let store = MemoryTimerStore::new();
        let mut timer = PersistentTimer::new(store.clone(), PauseMode::WallClock);
        timer.arm("p1", TEN_SECS, 0);
        timer.heartbeat(3_000);
        timer.heartbeat(4_000);
        assert_eq!(store.get(HEARTBEAT_KEY).unwrap().as_deref(), Some("4000"));
        assert_eq!(
            store.get("puzzle_timer_end_p1").unwrap().as_deref(),
            Some("10000")
        );
        assert_eq!(timer.last_heartbeat(), Some(4_000));
    }

    #[test]
    fn test_refresh_reads_store() {
        let store = MemoryTimerStore::new();
        let mut timer = PersistentTimer::new(store.clone(), PauseMode::WallClock);
        timer.arm("p1", TEN_SECS, 0);
        store.set("puzzle_timer_end_p1", "4000").unwrap();
        timer.refresh();
        assert_eq!(timer.remaining_secs(1_000), 3);
    }

    #[test]
    fn test_stop_keeps_persisted_deadline() {
        let store = MemoryTimerStore::new();
        let mut timer = PersistentTimer::new(store.clone(), PauseMode::WallClock);
        timer.arm("p1", TEN_SECS, 0);
        timer.stop(2_500);
        assert!(!timer.is_running());
        assert_eq!(timer.remaining_secs(9_000), 8);
        assert_eq!(timer.tick(20_000), None);
        assert!(store.get("puzzle_timer_end_p1").unwrap().is_some());
    }

    #[test]
    fn test_wall_clock_pause_loses_time() {
        let mut timer = PersistentTimer::new(MemoryTimerStore::new(), PauseMode::WallClock);
        timer.arm("p1", TEN_SECS, 0);
        timer.pause(2_000);
        assert_eq!(timer.tick(12_000), None);
        timer.resume(12_000);
        assert!(timer.tick(12_000).is_some());
    }

    #[test]
    fn test_frozen_pause_pushes_deadline_back() {
        let store = MemoryTimerStore::new();
        let mut timer = PersistentTimer::new(store.clone(), PauseMode::Frozen);
        timer.arm("p1", TEN_SECS, 0);
        timer.pause(2_000);
        assert_eq!(timer.remaining_secs(7_000), 8);
        timer.resume(7_000);
        assert_eq!(timer.remaining_secs(7_000), 8);
        assert_eq!(
            store.get("puzzle_timer_end_p1").unwrap().as_deref(),
            Some("15000")
        );
        assert_eq!(timer.tick(14_999), None);
        assert!(timer.tick(15_000).is_some());
    }

    #[test]
    fn test_stop_during_frozen_pause_persists_paused_time() {
        let store = MemoryTimerStore::new();
        let mut timer = PersistentTimer::new(store.clone(), PauseMode::Frozen);
        timer.arm("p1", TEN_SECS, 0);
        timer.pause(2_000);
        timer.stop(7_000);
        assert_eq!(timer.remaining_secs(7_000), 8);
        assert_eq!(
            store.get("puzzle_timer_end_p1").unwrap().as_deref(),
            Some("15000")
        );

        let mut reloaded = PersistentTimer::new(store, PauseMode::Frozen);
        reloaded.arm_or_resume("p1", TEN_SECS, 7_000);
        assert_eq!(reloaded.remaining_secs(7_000), 8);
    }

    #[test]
    fn test_stop_during_wall_clock_pause_keeps_deadline() {
        let store = MemoryTimerStore::new();
        let mut timer = PersistentTimer::new(store.clone(), PauseMode::WallClock);
        timer.arm("p1", TEN_SECS, 0);
        timer.pause(2_000);
        timer.stop(7_000);
        assert_eq!(
            store.get("puzzle_timer_end_p1").unwrap().as_deref(),
            Some("10000")
        );
    }

    #[test]
    fn test_broken_store_degrades_to_memory() {
        let mut timer = PersistentTimer::new(BrokenStore, PauseMode::WallClock);
        timer.arm_or_resume("p1", TEN_SECS, 0);
        timer.heartbeat(1_000);
        assert_eq!(timer.remaining_secs(1_000), 9);
        assert!(timer.tick(10_000).is_some());
    }

    #[test]
    fn test_pause_mode_from_str() {
        assert_eq!("wall".parse::<PauseMode>(), Ok(PauseMode::WallClock));
        assert_eq!("Frozen".parse::<PauseMode>(), Ok(PauseMode::Frozen));
        assert!("sometimes".parse::<PauseMode>().is_err());
        assert_eq!(PauseMode::default(), PauseMode::WallClock);
    }
}
