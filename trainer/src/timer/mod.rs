//! Reload-proof countdown timer.
//!
//! The deadline is an absolute wall-clock instant. Display and expiry are
//! derived from it on demand, so a late tick or a process restart never
//! drifts the countdown.

mod deadline;
mod persistent;
mod store;

pub use deadline::{format_remaining, remaining, remaining_secs, DeadlineClock};
pub use persistent::{PauseMode, PersistentTimer, TimerExpired, UnknownPauseMode};
pub use store::{
    deadline_key, JsonTimerStore, MemoryTimerStore, StoreError, TimerStore, DEADLINE_KEY_PREFIX,
    HEARTBEAT_KEY,
};
