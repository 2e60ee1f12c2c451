//! ERR packet.

use crate::error::{Error, Result, ServerError};
use crate::protocol::codec::{read_bytes, read_u8, read_u16};

/// Header byte of an ERR packet.
pub const ERR_HEADER: u8 = 0xff;

/// SQLSTATE reported when the server omits one.
const DEFAULT_SQL_STATE: &str = "HY000";

/// ERR packet: error code, optional `#` + 5-byte SQLSTATE, message.
#[derive(Debug, Clone)]
pub struct ErrPacket(pub ServerError);

impl ErrPacket {
    /// Parse an ERR packet payload, header byte included.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let (header, rest) = read_u8(payload)?;
        if header != ERR_HEADER {
            return Err(Error::Protocol(format!(
                "ERR packet: unexpected header 0x{header:02x}"
            )));
        }
        let (code, rest) = read_u16(rest)?;

        let (sql_state, message) = match rest.split_first() {
            Some((b'#', marked)) => {
                let (state, message) = read_bytes(marked, 5)?;
                (String::from_utf8_lossy(state).into_owned(), message)
            }
            _ => (DEFAULT_SQL_STATE.to_string(), rest),
        };

        Ok(Self(ServerError {
            code,
            sql_state,
            message: String::from_utf8_lossy(message).into_owned(),
        }))
    }

    /// Convert to the crate error.
    pub fn into_error(self) -> Error {
        Error::Server(self.0)
    }
}
