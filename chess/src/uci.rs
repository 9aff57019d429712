//! UCI castling conventions.
//!
//! UCI writes castling as the king moving two squares (e1g1), while cozy_chess
//! encodes it as the king capturing its own rook (e1h1). Solutions are stored in
//! UCI form, so every move crossing the oracle boundary is converted here.

use cozy_chess::{Board, File, Move, Piece, Rank, Square};

/// Rewrite a UCI castling move (e1g1, e1c1, e8g8, e8c8) into the cozy_chess
/// king-takes-rook form.
///
/// The rewrite only happens when the result is one of `legal_moves`; any
/// other move comes back unchanged.
pub fn convert_uci_castling_to_cozy(mv: Move, legal_moves: &[Move]) -> Move {
    if mv.promotion.is_some() || mv.from.file() != File::E {
        return mv;
    }
    let rook_file = match mv.to.file() {
        File::G => File::H,
        File::C => File::A,
        _ => return mv,
    };
    let back_rank = mv.from.rank();
    if !matches!(back_rank, Rank::First | Rank::Eighth) || mv.to.rank() != back_rank {
        return mv;
    }

    let converted = Move {
        from: mv.from,
        to: Square::new(rook_file, back_rank),
        promotion: None,
    };
    if legal_moves.contains(&converted) {
        converted
    } else {
        mv
    }
}

/// Convert a cozy_chess castling move (king takes own rook) back to UCI.
///
/// `board` must be the position *before* the move. Non-castling moves are
/// returned unchanged.
pub fn convert_cozy_castling_to_uci(board: &Board, mv: Move) -> Move {
    let is_king = board.piece_on(mv.from) == Some(Piece::King);
    let own_rook = board.piece_on(mv.to) == Some(Piece::Rook)
        && board.color_on(mv.to) == board.color_on(mv.from);

    if !(is_king && own_rook) {
        return mv;
    }

    let file = if mv.to.file() as u8 > mv.from.file() as u8 {
        File::G
    } else {
        File::C
    };
    Move {
        from: mv.from,
        to: Square::new(file, mv.from.rank()),
        promotion: None,
    }
}
