//! Chess puzzle trainer.
//!
//! Drives tactical puzzle attempts: validates user moves against a solution
//! line, plays the opponent's forced replies, runs a reload-proof countdown and
//! replays the solution once the attempt resolves.

pub mod clock;
pub mod config;
pub mod persistence;
pub mod puzzle;
pub mod replay;
pub mod report;
pub mod session;
pub mod timer;
