pub mod converters;
pub mod fen;
pub mod move_id;
pub mod oracle;
pub mod position;
pub mod types;
pub mod uci;

pub use converters::{format_square, parse_square};
pub use fen::{FenError, START_FEN};
pub use move_id::{CodecError, MoveId, MoveParts};
pub use oracle::{AppliedMove, CozyOracle, MoveRequest, OracleError, PositionOracle};
pub use position::Position;
pub use types::{PieceColor, PieceKind};
