use cozy_chess::{Board, Move};

use crate::fen::{format_fen, parse_fen, FenError, START_FEN};
use crate::types::PieceColor;

/// A chess position. Equality is defined on the canonical FEN.
#[derive(Debug, Clone)]
pub struct Position {
    board: Board,
}

impl Position {
    pub fn start() -> Self {
        Self {
            board: Board::default(),
        }
    }

    pub fn from_fen(fen: &str) -> Result<Self, FenError> {
        Ok(Self {
            board: parse_fen(fen)?,
        })
    }

    pub fn to_fen(&self) -> String {
        format_fen(&self.board)
    }

    pub fn side_to_move(&self) -> PieceColor {
        PieceColor::from(self.board.side_to_move())
    }

    pub(crate) fn board(&self) -> &Board {
        &self.board
    }

    pub(crate) fn legal_moves(&self) -> Vec<Move> {
        let mut moves = Vec::new();
        self.board.generate_moves(|mvs| {
            moves.extend(mvs);
            false
        });
        moves
    }

    /// Play a move already known to be legal.
    pub(crate) fn after(&self, mv: Move) -> Self {
        let mut board = self.board.clone();
        board.play_unchecked(mv);
        Self { board }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::start()
    }
}

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.to_fen() == other.to_fen()
    }
}

impl Eq for Position {}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_fen())
    }
}

impl std::str::FromStr for Position {
    type Err = FenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_fen(s)
    }
}
