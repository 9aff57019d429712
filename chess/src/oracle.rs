//! The move-legality oracle.
//!
//! Puzzle logic never evaluates chess rules itself. It hands a position and a
//! move request to a [`PositionOracle`] and gets back either the resulting
//! position or a rejection.

use cozy_chess::{Move, Square};

use crate::converters::format_square;
use crate::fen::FenError;
use crate::position::Position;
use crate::types::PieceKind;
use crate::uci::{convert_cozy_castling_to_uci, convert_uci_castling_to_cozy};

/// A move as requested by a player: squares in UCI convention plus an
/// optional promotion piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveRequest {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<PieceKind>,
}

impl MoveRequest {
    pub fn new(from: Square, to: Square) -> Self {
        Self {
            from,
            to,
            promotion: None,
        }
    }

    pub fn with_promotion(mut self, promotion: PieceKind) -> Self {
        self.promotion = Some(promotion);
        self
    }
}

impl std::fmt::Display for MoveRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", format_square(self.from), format_square(self.to))?;
        if let Some(p) = self.promotion {
            write!(f, "{}", p.to_char_lower())?;
        }
        Ok(())
    }
}

/// The oracle's answer to an accepted move request.
///
/// `from`/`to` are in UCI convention (castling as e1g1) and `promotion` is set
/// only when the move actually promoted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMove {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<PieceKind>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    #[error("Invalid position: {0}")]
    InvalidPosition(#[from] FenError),
    #[error("Illegal move: {0}")]
    IllegalMove(String),
}

/// Chess rules as an external collaborator.
pub trait PositionOracle: Send + Sync {
    /// Parse canonical notation into a position.
    fn parse(&self, notation: &str) -> Result<Position, OracleError>;

    /// Apply `request` to `position`, or reject it.
    fn apply_move(
        &self,
        position: &Position,
        request: &MoveRequest,
    ) -> Result<AppliedMove, OracleError>;

    /// Canonical notation for a position.
    fn to_notation(&self, position: &Position) -> String;
}

/// Oracle backed by cozy-chess move generation.
#[derive(Debug, Clone, Copy, Default)]
pub struct CozyOracle;

impl PositionOracle for CozyOracle {
    fn parse(&self, notation: &str) -> Result<Position, OracleError> {
        Ok(Position::from_fen(notation)?)
    }

    fn apply_move(
        &self,
        position: &Position,
        request: &MoveRequest,
    ) -> Result<AppliedMove, OracleError> {
        let legal = position.legal_moves();

        let plain = convert_uci_castling_to_cozy(
            Move {
                from: request.from,
                to: request.to,
                promotion: None,
            },
            &legal,
        );

        // A promotion letter on a non-promoting move is ignored, and a pawn
        // reaching the last rank without one promotes to a queen.
        let mv = if legal.contains(&plain) {
            plain
        } else {
            let promoted = Move {
                from: request.from,
                to: request.to,
                promotion: Some(request.promotion.unwrap_or(PieceKind::Queen).into()),
            };
            if !legal.contains(&promoted) {
                return Err(OracleError::IllegalMove(request.to_string()));
            }
            promoted
        };

        let uci = convert_cozy_castling_to_uci(position.board(), mv);
        Ok(AppliedMove {
            from: uci.from,
            to: uci.to,
            promotion: mv.promotion.map(PieceKind::from),
            position: position.after(mv),
        })
    }

    fn to_notation(&self, position: &Position) -> String {
        position.to_fen()
    }
}
