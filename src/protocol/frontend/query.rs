//! Text protocol command.

use crate::error::{Error, Result};
use crate::params::ParameterSet;
use crate::protocol::codec::write_u8;
use crate::protocol::types::command;

/// Write `COM_QUERY` with every `?` placeholder replaced by the text literal
/// of the matching parameter.
///
/// Placeholders inside single- or double-quoted strings are left alone.
pub fn write_query(out: &mut Vec<u8>, sql: &str, params: &ParameterSet) -> Result<()> {
    let estimate: usize = params.values().map(|v| v.approximate_text_length()).sum();
    out.reserve(1 + sql.len() + estimate);
    write_u8(out, command::QUERY);

    let mut values = params.values();
    let mut data = sql.as_bytes();
    while let Some(pos) = memchr::memchr3(b'?', b'\'', b'"', data) {
        out.extend_from_slice(&data[..pos]);
        let marker = data[pos];
        data = &data[pos + 1..];
        if marker == b'?' {
            let value = values.next().ok_or_else(|| {
                Error::ParameterBinding(format!(
                    "Parameter at position {} is not set",
                    params.len() + 1
                ))
            })?;
            value.write_text(out);
            continue;
        }
        let end = quoted_len(data, marker);
        out.push(marker);
        out.extend_from_slice(&data[..end]);
        data = &data[end..];
    }
    out.extend_from_slice(data);

    if values.next().is_some() {
        return Err(Error::ParameterBinding(format!(
            "Parameter at position {} is out of range",
            params.len()
        )));
    }
    Ok(())
}

/// Number of `?` placeholders outside quoted strings.
pub fn placeholder_count(sql: &str) -> usize {
    let mut count = 0;
    let mut data = sql.as_bytes();
    while let Some(pos) = memchr::memchr3(b'?', b'\'', b'"', data) {
        let marker = data[pos];
        data = &data[pos + 1..];
        if marker == b'?' {
            count += 1;
        } else {
            data = &data[quoted_len(data, marker)..];
        }
    }
    count
}

/// Length of a quoted string body including its closing quote, honoring
/// backslash escapes and doubled quotes. Unterminated strings run to the end.
fn quoted_len(data: &[u8], quote: u8) -> usize {
    let mut idx = 0;
    while let Some(pos) = memchr::memchr2(quote, b'\\', &data[idx..]) {
        let at = idx + pos;
        if data[at] == b'\\' {
            idx = (at + 2).min(data.len());
            continue;
        }
        if data.get(at + 1) == Some(&quote) {
            idx = at + 2;
            continue;
        }
        return at + 1;
    }
    data.len()
}
