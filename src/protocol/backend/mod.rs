//! Server → client packets.

pub mod error;
pub mod prepare;
pub mod response;
pub mod row;

pub use error::{ERR_HEADER, ErrPacket};
pub use prepare::{ColumnDefinition, PrepareOk};
pub use response::{EOF_HEADER, EofPacket, OK_HEADER, OkPacket, is_eof};
pub use row::{Row, RowFormat};
