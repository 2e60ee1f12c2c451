//! MariaDB wire protocol encoding and decoding primitives.
//!
//! MariaDB uses little-endian byte order for all fixed-width integers.

use zerocopy::FromBytes;
use zerocopy::byteorder::little_endian::{U16 as U16LE, U32 as U32LE, U64 as U64LE};

use crate::error::{Error, Result};

/// Largest payload a single packet can carry.
pub const MAX_PACKET_PAYLOAD: usize = 0x00ff_ffff;

/// Read 1-byte unsigned integer.
#[inline]
pub fn read_u8(data: &[u8]) -> Result<(u8, &[u8])> {
    match data.split_first() {
        Some((&value, rest)) => Ok((value, rest)),
        None => Err(Error::Protocol("read_u8: empty buffer".into())),
    }
}

/// Read 2-byte little-endian unsigned integer.
#[inline]
pub fn read_u16(data: &[u8]) -> Result<(u16, &[u8])> {
    let (head, rest) = read_bytes(data, 2)?;
    let value = U16LE::ref_from_bytes(head)
        .map_err(|e| Error::Protocol(format!("read_u16: {e:?}")))?
        .get();
    Ok((value, rest))
}

/// Read 3-byte little-endian unsigned integer.
#[inline]
pub fn read_u24(data: &[u8]) -> Result<(u32, &[u8])> {
    let (head, rest) = read_bytes(data, 3)?;
    let value = u32::from(head[0]) | (u32::from(head[1]) << 8) | (u32::from(head[2]) << 16);
    Ok((value, rest))
}

/// Read 4-byte little-endian unsigned integer.
#[inline]
pub fn read_u32(data: &[u8]) -> Result<(u32, &[u8])> {
    let (head, rest) = read_bytes(data, 4)?;
    let value = U32LE::ref_from_bytes(head)
        .map_err(|e| Error::Protocol(format!("read_u32: {e:?}")))?
        .get();
    Ok((value, rest))
}

/// Read 8-byte little-endian unsigned integer.
#[inline]
pub fn read_u64(data: &[u8]) -> Result<(u64, &[u8])> {
    let (head, rest) = read_bytes(data, 8)?;
    let value = U64LE::ref_from_bytes(head)
        .map_err(|e| Error::Protocol(format!("read_u64: {e:?}")))?
        .get();
    Ok((value, rest))
}

/// Read fixed-length bytes.
#[inline]
pub fn read_bytes(data: &[u8], len: usize) -> Result<(&[u8], &[u8])> {
    if data.len() < len {
        return Err(Error::Protocol(format!(
            "read_bytes: buffer too short: {} < {}",
            data.len(),
            len
        )));
    }
    Ok(data.split_at(len))
}

/// Read a length-encoded integer.
///
/// Returns `None` for the NULL marker (0xfb).
pub fn read_lenenc_int(data: &[u8]) -> Result<(Option<u64>, &[u8])> {
    let (first, rest) = read_u8(data)?;
    match first {
        0xfb => Ok((None, rest)),
        0xfc => {
            let (v, rest) = read_u16(rest)?;
            Ok((Some(u64::from(v)), rest))
        }
        0xfd => {
            let (v, rest) = read_u24(rest)?;
            Ok((Some(u64::from(v)), rest))
        }
        0xfe => {
            let (v, rest) = read_u64(rest)?;
            Ok((Some(v), rest))
        }
        0xff => Err(Error::Protocol(
            "read_lenenc_int: unexpected 0xff marker".into(),
        )),
        v => Ok((Some(u64::from(v)), rest)),
    }
}

/// Read a length-encoded string as raw bytes.
pub fn read_lenenc_bytes(data: &[u8]) -> Result<(&[u8], &[u8])> {
    let (len, rest) = read_lenenc_int(data)?;
    let len = len.ok_or_else(|| Error::Protocol("read_lenenc_bytes: NULL length".into()))?;
    let len = usize::try_from(len)
        .map_err(|_| Error::Protocol(format!("read_lenenc_bytes: length {len} too large")))?;
    read_bytes(rest, len)
}

/// Read a length-encoded string as &str.
pub fn read_lenenc_str(data: &[u8]) -> Result<(&str, &[u8])> {
    let (bytes, rest) = read_lenenc_bytes(data)?;
    let s = simdutf8::basic::from_utf8(bytes)
        .map_err(|e| Error::Protocol(format!("read_lenenc_str: invalid UTF-8: {e}")))?;
    Ok((s, rest))
}

/// Write 1-byte unsigned integer.
#[inline]
pub fn write_u8(out: &mut Vec<u8>, value: u8) {
    out.push(value);
}

/// Write 2-byte little-endian unsigned integer.
#[inline]
pub fn write_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Write 3-byte little-endian unsigned integer.
#[inline]
pub fn write_u24(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes()[..3]);
}

/// Write 4-byte little-endian unsigned integer.
#[inline]
pub fn write_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Write 8-byte little-endian unsigned integer.
#[inline]
pub fn write_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Write raw bytes.
#[inline]
pub fn write_bytes(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(data);
}

/// Write a length-encoded integer.
pub fn write_lenenc_int(out: &mut Vec<u8>, value: u64) {
    if value < 0xfb {
        out.push(value as u8);
    } else if value <= 0xffff {
        out.push(0xfc);
        write_u16(out, value as u16);
    } else if value <= 0x00ff_ffff {
        out.push(0xfd);
        write_u24(out, value as u32);
    } else {
        out.push(0xfe);
        write_u64(out, value);
    }
}

/// Write a length-encoded string.
pub fn write_lenenc_bytes(out: &mut Vec<u8>, data: &[u8]) {
    write_lenenc_int(out, data.len() as u64);
    out.extend_from_slice(data);
}

/// Frame a command payload into packets.
///
/// Each packet carries a 3-byte payload length and a sequence id. Payloads of
/// `MAX_PACKET_PAYLOAD` bytes or more are split; an exact multiple is
/// terminated by an empty packet. Returns the next sequence id.
pub fn write_packets(out: &mut Vec<u8>, payload: &[u8], mut sequence_id: u8) -> u8 {
    let mut last_len = 0;
    for chunk in payload.chunks(MAX_PACKET_PAYLOAD) {
        write_u24(out, chunk.len() as u32);
        out.push(sequence_id);
        out.extend_from_slice(chunk);
        sequence_id = sequence_id.wrapping_add(1);
        last_len = chunk.len();
    }
    if payload.is_empty() || last_len == MAX_PACKET_PAYLOAD {
        write_u24(out, 0);
        out.push(sequence_id);
        sequence_id = sequence_id.wrapping_add(1);
    }
    sequence_id
}
