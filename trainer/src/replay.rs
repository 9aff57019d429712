//! Reconstruction of intermediate positions along a solution line.
//!
//! Replay is independent of any live attempt: it always starts from the
//! puzzle's initial position and re-applies solution moves through the oracle.

use chess::{CodecError, MoveId, MoveRequest, OracleError, Position, PositionOracle};

use crate::puzzle::PuzzleRecord;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplayError {
    #[error("invalid initial position: {0}")]
    InvalidInitialPosition(OracleError),
    #[error("solution is empty")]
    EmptySolution,
    #[error("puzzle says {declared} to move but the position has {actual} to move")]
    SideToMoveMismatch {
        declared: chess::PieceColor,
        actual: chess::PieceColor,
    },
    #[error("solution move {index}: {source}")]
    MalformedMoveId { index: usize, source: CodecError },
    #[error("solution move {index} ({move_id}) cannot be played: {reason}")]
    ReplayDivergence {
        index: usize,
        move_id: MoveId,
        reason: String,
    },
}

/// Position after the first `upto` solution moves. `upto` past the end of the
/// solution is clamped.
pub fn replay_position<O: PositionOracle + ?Sized>(
    oracle: &O,
    puzzle: &PuzzleRecord,
    upto: usize,
) -> Result<Position, ReplayError> {
    let mut position = initial_position(oracle, puzzle)?;
    let upto = upto.min(puzzle.solution.len());
    for (index, move_id) in puzzle.solution[..upto].iter().enumerate() {
        position = apply_solution_move(oracle, &position, index, move_id)?.position;
    }
    Ok(position)
}

/// Every position along the line, from the initial one to the final one.
pub fn replay_line<O: PositionOracle + ?Sized>(
    oracle: &O,
    puzzle: &PuzzleRecord,
) -> Result<Vec<Position>, ReplayError> {
    let mut position = initial_position(oracle, puzzle)?;
    let mut line = Vec::with_capacity(puzzle.solution.len() + 1);
    line.push(position.clone());
    for (index, move_id) in puzzle.solution.iter().enumerate() {
        position = apply_solution_move(oracle, &position, index, move_id)?.position;
        line.push(position.clone());
    }
    Ok(line)
}

/// Check that a puzzle can be played at all.
///
/// Beyond replaying the line this requires a non-empty solution, a side to
/// move that agrees with the position, and solution moves written in the same
/// form the codec produces, since user moves are compared to them textually.
pub fn validate<O: PositionOracle + ?Sized>(
    oracle: &O,
    puzzle: &PuzzleRecord,
) -> Result<(), ReplayError> {
    if puzzle.solution.is_empty() {
        return Err(ReplayError::EmptySolution);
    }

    let mut position = initial_position(oracle, puzzle)?;
    let actual = position.side_to_move();
    if actual != puzzle.side_to_move {
        return Err(ReplayError::SideToMoveMismatch {
            declared: puzzle.side_to_move,
            actual,
        });
    }

    for (index, move_id) in puzzle.solution.iter().enumerate() {
        let applied = apply_solution_move(oracle, &position, index, move_id)?;
        let canonical = MoveId::encode(&applied);
        if &canonical != move_id {
            return Err(ReplayError::ReplayDivergence {
                index,
                move_id: move_id.clone(),
                reason: format!("plays as {} and can never be matched", canonical),
            });
        }
        position = applied.position;
    }
    Ok(())
}

fn initial_position<O: PositionOracle + ?Sized>(
    oracle: &O,
    puzzle: &PuzzleRecord,
) -> Result<Position, ReplayError> {
    oracle
        .parse(&puzzle.initial_position)
        .map_err(ReplayError::InvalidInitialPosition)
}

fn apply_solution_move<O: PositionOracle + ?Sized>(
    oracle: &O,
    position: &Position,
    index: usize,
    move_id: &MoveId,
) -> Result<chess::AppliedMove, ReplayError> {
    let parts = move_id
        .decode()
        .map_err(|source| ReplayError::MalformedMoveId { index, source })?;
    let request = MoveRequest::from(parts);
    oracle
        .apply_move(position, &request)
        .map_err(|e| ReplayError::ReplayDivergence {
            index,
            move_id: move_id.clone(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess::{CozyOracle, PieceColor, START_FEN};

    fn opening() -> PuzzleRecord {
        PuzzleRecord::new("p1", START_FEN, ["e2e4", "e7e5", "g1f3"], PieceColor::White)
    }

    #[test]
    fn test_replay_zero_is_initial() {
        let pos = replay_position(&CozyOracle, &opening(), 0).unwrap();
        assert_eq!(pos, Position::start());
    }

    #[test]
    fn test_full_replay_matches_sequential_application() {
        let puzzle = opening();
        let mut expected = Position::start();
        for id in &puzzle.solution {
            let request = id.decode().unwrap().into();
            expected = CozyOracle.apply_move(&expected, &request).unwrap().position;
        }
        let len = puzzle.solution_len();
        assert_eq!(replay_position(&CozyOracle, &puzzle, len).unwrap(), expected);
        // Clamped and idempotent.
        assert_eq!(
            replay_position(&CozyOracle, &puzzle, len + 10).unwrap(),
            expected
        );
        assert_eq!(replay_position(&CozyOracle, &puzzle, len).unwrap(), expected);
    }

    #[test]
    fn test_line_has_one_position_per_ply() {
        let line = replay_line(&CozyOracle, &opening()).unwrap();
        assert_eq!(line.len(), 4);
        assert_eq!(line[1], replay_position(&CozyOracle, &opening(), 1).unwrap());
    }

    #[test]
    fn test_divergence_reports_index() {
        let puzzle =
            PuzzleRecord::new("bad", START_FEN, ["e2e4", "e2e4"], PieceColor::White);
        match replay_position(&CozyOracle, &puzzle, 2) {
            Err(ReplayError::ReplayDivergence { index, move_id, .. }) => {
                assert_eq!(index, 1);
                assert_eq!(move_id.as_str(), "e2e4");
            }
            other => panic!("expected divergence, got {:?}", other),
        }
        // Positions before the bad move still replay.
        assert!(replay_position(&CozyOracle, &puzzle, 1).is_ok());
    }

    #[test]
    fn test_malformed_move_id() {
        let puzzle = PuzzleRecord::new("bad", START_FEN, ["e2e4", "xx"], PieceColor::White);
        assert!(matches!(
            replay_position(&CozyOracle, &puzzle, 2),
            Err(ReplayError::MalformedMoveId { index: 1, .. })
        ));
    }

    #[test]
    fn test_validate() {
        assert_eq!(validate(&CozyOracle, &opening()), Ok(()));

        let empty = PuzzleRecord::new("e", START_FEN, Vec::<&str>::new(), PieceColor::White);
        assert_eq!(validate(&CozyOracle, &empty), Err(ReplayError::EmptySolution));

        let wrong_side = PuzzleRecord::new("s", START_FEN, ["e2e4"], PieceColor::Black);
        assert!(matches!(
            validate(&CozyOracle, &wrong_side),
            Err(ReplayError::SideToMoveMismatch { .. })
        ));

        let bad_fen = PuzzleRecord::new("f", "garbage", ["e2e4"], PieceColor::White);
        assert!(matches!(
            validate(&CozyOracle, &bad_fen),
            Err(ReplayError::InvalidInitialPosition(_))
        ));
    }

    #[test]
    fn test_validate_rejects_unmatchable_promotion() {
        // A promotion written without its letter is played as a queen by the
        // oracle, so a user's e7e8q would never equal "e7e8".
        let puzzle = PuzzleRecord::new(
            "promo",
            "8/4P3/8/8/8/8/k7/4K3 w - - 0 1",
            ["e7e8"],
            PieceColor::White,
        );
        assert!(matches!(
            validate(&CozyOracle, &puzzle),
            Err(ReplayError::ReplayDivergence { index: 0, .. })
        ));
    }
}
