//! Canonical piece and color types for the project.
//! cozy-chess types are internal implementation details.

use serde::{Deserialize, Serialize};

/// Project-owned piece type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

/// Project-owned color type. Serialized as `"white"` / `"black"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PieceColor {
    White,
    Black,
}

impl PieceKind {
    pub fn to_char_lower(self) -> char {
        match self {
            Self::Pawn => 'p',
            Self::Knight => 'n',
            Self::Bishop => 'b',
            Self::Rook => 'r',
            Self::Queen => 'q',
            Self::King => 'k',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'p' => Some(Self::Pawn),
            'n' => Some(Self::Knight),
            'b' => Some(Self::Bishop),
            'r' => Some(Self::Rook),
            'q' => Some(Self::Queen),
            'k' => Some(Self::King),
            _ => None,
        }
    }

    /// Parse a promotion letter. Only knight, bishop, rook and queen qualify.
    pub fn from_promotion_char(c: char) -> Option<Self> {
        Self::from_char(c).filter(|kind| kind.is_promotion_target())
    }

    pub fn is_promotion_target(self) -> bool {
        matches!(self, Self::Knight | Self::Bishop | Self::Rook | Self::Queen)
    }
}

impl PieceColor {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::White => "white",
            Self::Black => "black",
        }
    }

    /// The side-to-move field used in FEN (`w` / `b`).
    pub fn fen_char(self) -> char {
        match self {
            Self::White => 'w',
            Self::Black => 'b',
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::White => Self::Black,
            Self::Black => Self::White,
        }
    }
}

impl std::str::FromStr for PieceColor {
    type Err = UnknownColor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "white" | "w" => Ok(Self::White),
            "black" | "b" => Ok(Self::Black),
            _ => Err(UnknownColor(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown color: {0:?}")]
pub struct UnknownColor(pub String);

impl From<cozy_chess::Piece> for PieceKind {
    fn from(p: cozy_chess::Piece) -> Self {
        match p {
            cozy_chess::Piece::Pawn => Self::Pawn,
            cozy_chess::Piece::Knight => Self::Knight,
            cozy_chess::Piece::Bishop => Self::Bishop,
            cozy_chess::Piece::Rook => Self::Rook,
            cozy_chess::Piece::Queen => Self::Queen,
            cozy_chess::Piece::King => Self::King,
        }
    }
}

impl From<PieceKind> for cozy_chess::Piece {
    fn from(p: PieceKind) -> Self {
        match p {
            PieceKind::Pawn => Self::Pawn,
            PieceKind::Knight => Self::Knight,
            PieceKind::Bishop => Self::Bishop,
            PieceKind::Rook => Self::Rook,
            PieceKind::Queen => Self::Queen,
            PieceKind::King => Self::King,
        }
    }
}

impl From<cozy_chess::Color> for PieceColor {
    fn from(c: cozy_chess::Color) -> Self {
        match c {
            cozy_chess::Color::White => Self::White,
            cozy_chess::Color::Black => Self::Black,
        }
    }
}

impl From<PieceColor> for cozy_chess::Color {
    fn from(c: PieceColor) -> Self {
        match c {
            PieceColor::White => Self::White,
            PieceColor::Black => Self::Black,
        }
    }
}

impl std::fmt::Display for PieceColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_promotion_chars() {
        assert_eq!(PieceKind::from_promotion_char('q'), Some(PieceKind::Queen));
        assert_eq!(PieceKind::from_promotion_char('N'), Some(PieceKind::Knight));
        assert_eq!(PieceKind::from_promotion_char('k'), None);
        assert_eq!(PieceKind::from_promotion_char('p'), None);
        assert_eq!(PieceKind::from_promotion_char('x'), None);
    }

    #[test]
    fn test_color_parse() {
        assert_eq!("white".parse::<PieceColor>(), Ok(PieceColor::White));
        assert_eq!(" Black ".parse::<PieceColor>(), Ok(PieceColor::Black));
        assert_eq!("b".parse::<PieceColor>(), Ok(PieceColor::Black));
        assert!("green".parse::<PieceColor>().is_err());
    }

    #[test]
    fn test_opposite_and_fen_char() {
        assert_eq!(PieceColor::White.opposite(), PieceColor::Black);
        assert_eq!(PieceColor::Black.fen_char(), 'b');
    }
}
