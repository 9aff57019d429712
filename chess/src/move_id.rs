//! Compact move identifiers: `<from><to>[promotion]`, e.g. `e2e4`, `e7e8q`.
//!
//! These are the comparison keys for solution lines and the storage format for
//! puzzle records.

use cozy_chess::Square;
use serde::{Deserialize, Serialize};

use crate::converters::{format_square, parse_square};
use crate::oracle::{AppliedMove, MoveRequest};
use crate::types::PieceKind;

/// A move identifier. Construction does not validate; [`MoveId::decode`] does.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MoveId(String);

/// The decoded parts of a [`MoveId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveParts {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<PieceKind>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("Malformed move id {0:?}")]
    MalformedMoveId(String),
}

impl MoveId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Encode the oracle's result for an accepted move.
    pub fn encode(applied: &AppliedMove) -> Self {
        Self::from_parts(MoveParts {
            from: applied.from,
            to: applied.to,
            promotion: applied.promotion,
        })
    }

    pub fn from_parts(parts: MoveParts) -> Self {
        let mut s = format!("{}{}", format_square(parts.from), format_square(parts.to));
        if let Some(p) = parts.promotion {
            s.push(p.to_char_lower());
        }
        Self(s)
    }

    /// Split into from, to and optional promotion.
    pub fn decode(&self) -> Result<MoveParts, CodecError> {
        let malformed = || CodecError::MalformedMoveId(self.0.clone());
        let s = self.0.as_str();

        if !s.is_ascii() || !(4..=5).contains(&s.len()) {
            return Err(malformed());
        }

        let from = parse_square(&s[0..2]).ok_or_else(malformed)?;
        let to = parse_square(&s[2..4]).ok_or_else(malformed)?;
        let promotion = match s[4..].chars().next() {
            Some(c) => Some(PieceKind::from_promotion_char(c).ok_or_else(malformed)?),
            None => None,
        };

        Ok(MoveParts {
            from,
            to,
            promotion,
        })
    }
}

impl From<MoveParts> for MoveRequest {
    fn from(parts: MoveParts) -> Self {
        MoveRequest {
            from: parts.from,
            to: parts.to,
            promotion: parts.promotion,
        }
    }
}

impl From<&str> for MoveId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for MoveId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{CozyOracle, PositionOracle};
    use crate::position::Position;
    use proptest::prelude::*;

    #[test]
    fn test_decode_plain_and_promotion() {
        let parts = MoveId::new("e2e4").decode().unwrap();
        assert_eq!(format_square(parts.from), "e2");
        assert_eq!(format_square(parts.to), "e4");
        assert_eq!(parts.promotion, None);

        let promo = MoveId::new("a7a8n").decode().unwrap();
        assert_eq!(promo.promotion, Some(PieceKind::Knight));
    }

    #[test]
    fn test_decode_rejects_malformed() {
        for bad in ["", "e2", "e2e", "e2e4qq", "z2e4", "e2e9", "e7e8k", "e2e4\u{e9}"] {
            assert_eq!(
                MoveId::new(bad).decode(),
                Err(CodecError::MalformedMoveId(bad.to_string())),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_encode_oracle_result() {
        let request = MoveId::new("g1f3").decode().unwrap().into();
        let applied = CozyOracle.apply_move(&Position::start(), &request).unwrap();
        assert_eq!(MoveId::encode(&applied), MoveId::new("g1f3"));
    }

    proptest! {
        #[test]
        fn prop_wrong_length_never_decodes(s in "[a-h1-8qnbr]{0,3}|[a-h1-8qnbr]{6,9}") {
            prop_assert!(MoveId::new(s).decode().is_err());
        }

        #[test]
        fn prop_valid_ids_decode_to_their_text(
            from in "[a-h][1-8]",
            to in "[a-h][1-8]",
            promo in proptest::option::of("[qrbn]"),
        ) {
            let raw = format!("{}{}{}", from, to, promo.unwrap_or_default());
            let id = MoveId::new(raw.clone());
            let parts = id.decode().unwrap();
            let rebuilt = MoveId::from_parts(parts);
            prop_assert_eq!(rebuilt.as_str(), raw.as_str());
        }
    }
}
