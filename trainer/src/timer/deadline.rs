use std::time::Duration;

/// A countdown defined by the instant it ends, in unix milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadlineClock {
    pub key: String,
    pub deadline_ms: u64,
}

impl DeadlineClock {
    pub fn starting_at(key: impl Into<String>, now_ms: u64, budget: Duration) -> Self {
        Self {
            key: key.into(),
            deadline_ms: now_ms.saturating_add(budget.as_millis() as u64),
        }
    }

    /// Move the deadline later, e.g. to give back time spent paused.
    pub fn postponed(&self, by_ms: u64) -> Self {
        Self {
            key: self.key.clone(),
            deadline_ms: self.deadline_ms.saturating_add(by_ms),
        }
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.deadline_ms
    }
}

/// Time left on `clock` at `now_ms`, never negative.
pub fn remaining(clock: &DeadlineClock, now_ms: u64) -> Duration {
    Duration::from_millis(clock.deadline_ms.saturating_sub(now_ms))
}

/// Whole seconds left, rounded up so the display reads 0 only at expiry.
pub fn remaining_secs(clock: &DeadlineClock, now_ms: u64) -> u32 {
    let ms = clock.deadline_ms.saturating_sub(now_ms);
    u32::try_from(ms.div_ceil(1000)).unwrap_or(u32::MAX)
}

/// Format seconds as M:SS.
pub fn format_remaining(secs: u32) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}
