//! Puzzle records and the sets they come in.

mod ingest;
mod record;
mod supply;

pub use ingest::{
    load_puzzle_file, parse_puzzle_set, IngestError, IngestReport, RecordError, RejectedRecord,
};
pub use record::{PuzzleId, PuzzleRecord};
pub use supply::{PuzzleSupply, SessionBound, SupplyError};
