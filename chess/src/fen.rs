use cozy_chess::Board;

use crate::types::PieceColor;

/// The standard starting position.
pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Parse a FEN string into a Board
pub fn parse_fen(fen: &str) -> Result<Board, FenError> {
    let parts: Vec<&str> = fen.split_whitespace().collect();
    if parts.is_empty() {
        return Err(FenError::InvalidFormat);
    }
    if parts.len() < 4 {
        return Err(FenError::MissingFields(parts.len()));
    }

    fen.parse().map_err(|_| FenError::InvalidBoardLayout)
}

/// Format a Board as a FEN string
pub fn format_fen(board: &Board) -> String {
    board.to_string()
}

/// Read the side-to-move field without a full parse.
pub fn side_to_move(fen: &str) -> Result<PieceColor, FenError> {
    let field = fen
        .split_whitespace()
        .nth(1)
        .ok_or(FenError::MissingFields(1))?;
    field.parse().map_err(|_| FenError::InvalidSideToMove(field.to_string()))
}

/// Rewrite the side-to-move field of a FEN string.
///
/// The result is not validated; callers parse it afterwards.
pub fn with_side_to_move(fen: &str, side: PieceColor) -> Result<String, FenError> {
    let mut parts: Vec<String> = fen.split_whitespace().map(str::to_string).collect();
    if parts.len() < 2 {
        return Err(FenError::MissingFields(parts.len()));
    }
    parts[1] = side.fen_char().to_string();
    Ok(parts.join(" "))
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FenError {
    #[error("Invalid FEN format")]
    InvalidFormat,
    #[error("FEN has only {0} field(s)")]
    MissingFields(usize),
    #[error("Invalid side to move: {0:?}")]
    InvalidSideToMove(String),
    #[error("Invalid board layout")]
    InvalidBoardLayout,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_fen_round_trips() {
        let board = parse_fen(START_FEN).unwrap();
        assert_eq!(format_fen(&board), START_FEN);
    }

    #[test]
    fn test_parse_rejects_empty_and_short() {
        assert_eq!(parse_fen("").unwrap_err(), FenError::InvalidFormat);
        assert!(matches!(
            parse_fen("8/8/8/8/8/8/8/8"),
            Err(FenError::MissingFields(1))
        ));
    }

    #[test]
    fn test_side_to_move() {
        assert_eq!(side_to_move(START_FEN), Ok(PieceColor::White));
        assert!(side_to_move("8/8/8/8/8/8/8/8").is_err());
    }

    #[test]
    fn test_with_side_to_move() {
        let fen = with_side_to_move(START_FEN, PieceColor::Black).unwrap();
        assert_eq!(
            fen,
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR b KQkq - 0 1"
        );
        assert!(parse_fen(&fen).is_ok());
    }
}
