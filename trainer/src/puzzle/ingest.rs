//! Normalization of puzzle sets from JSON.
//!
//! Puzzle files in the wild disagree on field names and on how moves are
//! written. Everything is folded into [`PuzzleRecord`] here so the session
//! engine only ever sees one shape. Shape errors are reported per record and
//! the caller decides what to do with them.

use std::path::Path;

use chess::fen::{self, FenError};
use chess::{MoveId, PieceColor};
use serde::Deserialize;

use super::record::PuzzleRecord;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why a single record could not be normalized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("record is not a puzzle object: {0}")]
    Shape(String),
    #[error("missing initial position")]
    MissingPosition,
    #[error("missing solution moves")]
    MissingMoves,
    #[error("solution is empty")]
    EmptySolution,
    #[error("unknown starting color {0:?}")]
    InvalidColor(String),
    #[error("invalid initial position: {0}")]
    InvalidPosition(#[from] FenError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRecord {
    /// Position of the record in the source list.
    pub index: usize,
    pub error: RecordError,
}

#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub records: Vec<PuzzleRecord>,
    pub rejected: Vec<RejectedRecord>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSet {
    List(Vec<serde_json::Value>),
    Wrapped { puzzles: Vec<serde_json::Value> },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(u64),
    Text(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawMove {
    Uci(String),
    Tagged {
        uci: String,
    },
    Parts {
        from: String,
        to: String,
        #[serde(default)]
        promotion: Option<String>,
    },
}

#[derive(Deserialize)]
struct RawPuzzle {
    #[serde(default)]
    id: Option<RawId>,
    #[serde(default, alias = "initialPosition", alias = "fen")]
    initial_fen: Option<String>,
    #[serde(default, alias = "solution")]
    moves: Option<Vec<RawMove>>,
    #[serde(default, alias = "side_to_move", alias = "startingColor")]
    starting_color: Option<String>,
    #[serde(default, alias = "theme")]
    motives: Option<String>,
}

impl RawMove {
    fn into_move_id(self) -> MoveId {
        let raw = match self {
            RawMove::Uci(s) | RawMove::Tagged { uci: s } => s,
            RawMove::Parts {
                from,
                to,
                promotion,
            } => format!("{}{}{}", from, to, promotion.unwrap_or_default()),
        };
        MoveId::new(raw.trim().to_ascii_lowercase())
    }
}

/// Parse a puzzle set: either a JSON array of puzzles or `{"puzzles": [...]}`.
pub fn parse_puzzle_set(json: &str) -> Result<IngestReport, IngestError> {
    let raw: RawSet = serde_json::from_str(json)?;
    let values = match raw {
        RawSet::List(v) | RawSet::Wrapped { puzzles: v } => v,
    };

    let mut report = IngestReport::default();
    for (index, value) in values.into_iter().enumerate() {
        match normalize(index, value) {
            Ok(record) => report.records.push(record),
            Err(error) => {
                tracing::warn!("Rejected puzzle #{}: {}", index, error);
                report.rejected.push(RejectedRecord { index, error });
            }
        }
    }

    tracing::debug!(
        "Ingested {} puzzle(s), rejected {}",
        report.records.len(),
        report.rejected.len()
    );
    Ok(report)
}

/// Read and parse a puzzle file.
pub fn load_puzzle_file(path: &Path) -> Result<IngestReport, IngestError> {
    let contents = std::fs::read_to_string(path)?;
    parse_puzzle_set(&contents)
}

fn normalize(index: usize, value: serde_json::Value) -> Result<PuzzleRecord, RecordError> {
    let raw: RawPuzzle =
        serde_json::from_value(value).map_err(|e| RecordError::Shape(e.to_string()))?;

    let id = match raw.id {
        Some(RawId::Number(n)) => n.to_string(),
        Some(RawId::Text(s)) if !s.trim().is_empty() => s.trim().to_string(),
        _ => format!("puzzle-{}", index + 1),
    };

    let fen = raw
        .initial_fen
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .ok_or(RecordError::MissingPosition)?;

    let solution: Vec<MoveId> = raw
        .moves
        .ok_or(RecordError::MissingMoves)?
        .into_iter()
        .map(RawMove::into_move_id)
        .collect();
    if solution.is_empty() {
        return Err(RecordError::EmptySolution);
    }

    // An explicit starting color wins over the FEN's side-to-move field.
    let (initial_position, side_to_move) = match raw.starting_color {
        Some(color) => {
            let side: PieceColor = color
                .parse()
                .map_err(|_| RecordError::InvalidColor(color.clone()))?;
            (fen::with_side_to_move(&fen, side)?, side)
        }
        None => {
            let side = fen::side_to_move(&fen)?;
            (fen, side)
        }
    };

    Ok(PuzzleRecord {
        id: super::record::PuzzleId::new(id),
        initial_position,
        solution,
        side_to_move,
        theme: raw.motives.unwrap_or_default().trim().to_string(),
    })
}
