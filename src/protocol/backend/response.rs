//! OK and EOF packets.

use crate::error::{Error, Result};
use crate::protocol::codec::{read_lenenc_int, read_u8, read_u16};

/// Header byte of an OK packet.
pub const OK_HEADER: u8 = 0x00;

/// Header byte of an EOF packet (and of an OK packet ending a result set
/// when EOF is deprecated).
pub const EOF_HEADER: u8 = 0xfe;

/// EOF packets are always shorter than this; longer 0xfe packets are rows.
const EOF_MAX_LEN: usize = 9;

/// True when `payload` is an EOF packet (or its OK replacement).
pub fn is_eof(payload: &[u8]) -> bool {
    payload.first() == Some(&EOF_HEADER) && payload.len() < EOF_MAX_LEN
}

/// OK packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OkPacket {
    pub affected_rows: u64,
    pub last_insert_id: u64,
    pub status_flags: u16,
    pub warnings: u16,
}

impl OkPacket {
    /// Parse an OK packet payload, header byte included.
    ///
    /// Accepts both the 0x00 header and the 0xfe header sent in place of an
    /// EOF packet when `CLIENT_DEPRECATE_EOF` is negotiated.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let (header, rest) = read_u8(payload)?;
        if header != OK_HEADER && header != EOF_HEADER {
            return Err(Error::Protocol(format!(
                "OK packet: unexpected header 0x{header:02x}"
            )));
        }
        let (affected_rows, rest) = read_lenenc_int(rest)?;
        let (last_insert_id, rest) = read_lenenc_int(rest)?;
        let (status_flags, rest) = read_u16(rest)?;
        let (warnings, _info) = read_u16(rest)?;
        Ok(Self {
            affected_rows: affected_rows.unwrap_or(0),
            last_insert_id: last_insert_id.unwrap_or(0),
            status_flags,
            warnings,
        })
    }
}

/// EOF packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EofPacket {
    pub warnings: u16,
    pub status_flags: u16,
}

impl EofPacket {
    /// Parse an EOF packet payload, header byte included.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        if !is_eof(payload) {
            return Err(Error::Protocol("EOF packet: malformed".into()));
        }
        let (warnings, rest) = read_u16(&payload[1..])?;
        let (status_flags, _) = read_u16(rest)?;
        Ok(Self {
            warnings,
            status_flags,
        })
    }
}
