//! The ordered list of puzzles a session walks through.

use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;

use super::record::PuzzleRecord;

/// What happens after the last puzzle in the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionBound {
    /// Start over from the first slot.
    #[default]
    Wrapping,
    /// The session completes.
    Bounded,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SupplyError {
    #[error("puzzle supply is empty")]
    Empty,
    #[error("order refers to puzzle {index} but only {len} are loaded")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("order lists puzzle {0} more than once")]
    DuplicateIndex(usize),
    #[error("starting slot {start} is past the end of {len} puzzles")]
    StartOutOfRange { start: usize, len: usize },
}

/// Puzzles shared by reference plus the order to present them in.
///
/// A *slot* is a position in the order, not an index into the puzzle list.
#[derive(Debug, Clone)]
pub struct PuzzleSupply {
    puzzles: Arc<[PuzzleRecord]>,
    order: Vec<usize>,
    start: usize,
    bound: SessionBound,
}

impl PuzzleSupply {
    /// Puzzles in their given order.
    pub fn ordered(puzzles: impl Into<Arc<[PuzzleRecord]>>) -> Result<Self, SupplyError> {
        let puzzles = puzzles.into();
        if puzzles.is_empty() {
            return Err(SupplyError::Empty);
        }
        let order = (0..puzzles.len()).collect();
        Ok(Self {
            puzzles,
            order,
            start: 0,
            bound: SessionBound::Wrapping,
        })
    }

    /// Puzzles in a caller-supplied order. The order may be a subset.
    pub fn with_order(
        puzzles: impl Into<Arc<[PuzzleRecord]>>,
        order: Vec<usize>,
    ) -> Result<Self, SupplyError> {
        let puzzles = puzzles.into();
        if puzzles.is_empty() || order.is_empty() {
            return Err(SupplyError::Empty);
        }
        let mut seen = vec![false; puzzles.len()];
        for &index in &order {
            match seen.get_mut(index) {
                None => {
                    return Err(SupplyError::IndexOutOfRange {
                        index,
                        len: puzzles.len(),
                    })
                }
                Some(true) => return Err(SupplyError::DuplicateIndex(index)),
                Some(flag) => *flag = true,
            }
        }
        Ok(Self {
            puzzles,
            order,
            start: 0,
            bound: SessionBound::Wrapping,
        })
    }

    /// Puzzles in a random order drawn from `rng`.
    pub fn shuffled<R: Rng + ?Sized>(
        puzzles: impl Into<Arc<[PuzzleRecord]>>,
        rng: &mut R,
    ) -> Result<Self, SupplyError> {
        let mut supply = Self::ordered(puzzles)?;
        supply.order.shuffle(rng);
        Ok(supply)
    }

    pub fn starting_at(mut self, start: usize) -> Result<Self, SupplyError> {
        if start >= self.order.len() {
            return Err(SupplyError::StartOutOfRange {
                start,
                len: self.order.len(),
            });
        }
        self.start = start;
        Ok(self)
    }

    pub fn bounded(mut self, bound: SessionBound) -> Self {
        self.bound = bound;
        self
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn bound(&self) -> SessionBound {
        self.bound
    }

    pub fn get(&self, slot: usize) -> Option<&PuzzleRecord> {
        self.order.get(slot).and_then(|&i| self.puzzles.get(i))
    }

    /// The slot after `slot`, or `None` when a bounded session has run out.
    pub fn next_slot(&self, slot: usize) -> Option<usize> {
        let next = slot + 1;
        if next < self.order.len() {
            Some(next)
        } else {
            match self.bound {
                SessionBound::Wrapping => Some(0),
                SessionBound::Bounded => None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess::PieceColor;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn puzzles(n: usize) -> Vec<PuzzleRecord> {
        (0..n)
            .map(|i| {
                PuzzleRecord::new(
                    format!("p{}", i),
                    chess::START_FEN,
                    ["e2e4"],
                    PieceColor::White,
                )
            })
            .collect()
    }

    #[test]
    fn test_wrapping_and_bounded_advance() {
        let supply = PuzzleSupply::ordered(puzzles(3)).unwrap();
        assert_eq!(supply.next_slot(0), Some(1));
        assert_eq!(supply.next_slot(2), Some(0));

        let bounded = supply.bounded(SessionBound::Bounded);
        assert_eq!(bounded.next_slot(1), Some(2));
        assert_eq!(bounded.next_slot(2), None);
    }

    #[test]
    fn test_custom_order_and_start() {
        let supply = PuzzleSupply::with_order(puzzles(3), vec![2, 0])
            .unwrap()
            .starting_at(1)
            .unwrap();
        assert_eq!(supply.len(), 2);
        assert_eq!(supply.start(), 1);
        assert_eq!(supply.get(0).unwrap().id.as_str(), "p2");
        assert_eq!(supply.get(1).unwrap().id.as_str(), "p0");
        assert!(supply.get(2).is_none());
    }

    #[test]
    fn test_invalid_orders_rejected() {
        assert_eq!(
            PuzzleSupply::with_order(puzzles(2), vec![0, 5]).unwrap_err(),
            SupplyError::IndexOutOfRange { index: 5, len: 2 }
        );
        assert_eq!(
            PuzzleSupply::with_order(puzzles(2), vec![1, 1]).unwrap_err(),
            SupplyError::DuplicateIndex(1)
        );
        assert_eq!(
            PuzzleSupply::ordered(Vec::new()).unwrap_err(),
            SupplyError::Empty
        );
        assert!(PuzzleSupply::ordered(puzzles(2))
            .unwrap()
            .starting_at(2)
            .is_err());
    }

    #[test]
    fn test_shuffle_is_a_permutation_and_seeded() {
        let mut a = StdRng::seed_from_u64(42);
        let mut b = StdRng::seed_from_u64(42);
        let first = PuzzleSupply::shuffled(puzzles(10), &mut a).unwrap();
        let second = PuzzleSupply::shuffled(puzzles(10), &mut b).unwrap();
        assert_eq!(first.order, second.order);

        let mut sorted = first.order.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..10).collect::<Vec<_>>());
    }
}
