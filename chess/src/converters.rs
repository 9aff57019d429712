//! String conversions for squares.

use cozy_chess::{File, Rank, Square};

/// Format a square as algebraic notation (e.g. "e4").
pub fn format_square(square: Square) -> String {
    let file = match square.file() {
        File::A => 'a',
        File::B => 'b',
        File::C => 'c',
        File::D => 'd',
        File::E => 'e',
        File::F => 'f',
        File::G => 'g',
        File::H => 'h',
    };
    let rank = match square.rank() {
        Rank::First => '1',
        Rank::Second => '2',
        Rank::Third => '3',
        Rank::Fourth => '4',
        Rank::Fifth => '5',
        Rank::Sixth => '6',
        Rank::Seventh => '7',
        Rank::Eighth => '8',
    };
    format!("{}{}", file, rank)
}

/// Parse a square from algebraic notation. Only lowercase files are accepted.
pub fn parse_square(s: &str) -> Option<Square> {
    let mut chars = s.chars();
    let (file, rank, rest) = (chars.next()?, chars.next()?, chars.next());
    if rest.is_some() {
        return None;
    }
    let file = match file {
        'a' => File::A,
        'b' => File::B,
        'c' => File::C,
        'd' => File::D,
        'e' => File::E,
        'f' => File::F,
        'g' => File::G,
        'h' => File::H,
        _ => return None,
    };
    let rank = match rank {
        '1' => Rank::First,
        '2' => Rank::Second,
        '3' => Rank::Third,
        '4' => Rank::Fourth,
        '5' => Rank::Fifth,
        '6' => Rank::Sixth,
        '7' => Rank::Seventh,
        '8' => Rank::Eighth,
        _ => return None,
    };
    Some(Square::new(file, rank))
}
