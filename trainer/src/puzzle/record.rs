use chess::{MoveId, PieceColor};
use serde::{Deserialize, Serialize};

/// Opaque puzzle identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PuzzleId(String);

impl PuzzleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PuzzleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Static description of one puzzle. Immutable once loaded.
///
/// Solution plies alternate between the user and the opponent, starting with
/// the user, so every even index is the user's move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuzzleRecord {
    pub id: PuzzleId,
    /// FEN of the position the user starts from.
    pub initial_position: String,
    pub solution: Vec<MoveId>,
    pub side_to_move: PieceColor,
    /// Tactical theme ("fork", "back rank", ...). May be empty.
    pub theme: String,
}

impl PuzzleRecord {
    pub fn new<I, M>(
        id: impl Into<String>,
        initial_position: impl Into<String>,
        solution: I,
        side_to_move: PieceColor,
    ) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<MoveId>,
    {
        Self {
            id: PuzzleId::new(id),
            initial_position: initial_position.into(),
            solution: solution.into_iter().map(Into::into).collect(),
            side_to_move,
            theme: String::new(),
        }
    }

    pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = theme.into();
        self
    }

    pub fn solution_len(&self) -> usize {
        self.solution.len()
    }

    /// Key scoping this puzzle's persisted timer state.
    pub fn timer_key(&self) -> &str {
        self.id.as_str()
    }

    /// The solution as a space separated string, for display.
    pub fn solution_line(&self) -> String {
        self.solution
            .iter()
            .map(MoveId::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_and_line() {
        let p = PuzzleRecord::new(
            "p1",
            chess::START_FEN,
            ["e2e4", "e7e5", "g1f3"],
            PieceColor::White,
        )
        .with_theme("opening");
        assert_eq!(p.solution_len(), 3);
        assert_eq!(p.solution_line(), "e2e4 e7e5 g1f3");
        assert_eq!(p.timer_key(), "p1");
        assert_eq!(p.theme, "opening");
    }
}
