//! MariaDB wire protocol implementation.
//!
//! # Structure
//!
//! - `backend`: Server → Client packets (parsing)
//! - `frontend`: Client → Server commands (encoding)
//! - `codec`: Low-level encoding/decoding primitives
//! - `types`: Common protocol types (ColumnType, capability and status bits)

pub mod backend;
pub mod codec;
pub mod frontend;
pub mod types;

pub use frontend::{MessageKind, WireMessage};
pub use types::{ColumnType, STATEMENT_ID_UNASSIGNED, StatementId};
