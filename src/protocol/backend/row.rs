//! Result rows, in binary (prepared) and text (query) format.

use crate::error::{Error, Result};
use crate::protocol::codec::{read_bytes, read_lenenc_int, read_u8};
use crate::protocol::types::ColumnType;

use super::prepare::ColumnDefinition;

/// Header byte of a binary row.
pub const ROW_HEADER: u8 = 0x00;

/// Null bitmap bits are offset by two in binary rows.
const NULL_BITMAP_OFFSET: usize = 2;

/// Row encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowFormat {
    /// Binary protocol, sent for prepared statements
    Binary,
    /// Text protocol, sent for `COM_QUERY`
    Text,
}

/// A decoded row: one raw value slice per column, `None` for NULL.
///
/// Values keep the wire representation of the row's format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row<'a> {
    values: Vec<Option<&'a [u8]>>,
}

impl<'a> Row<'a> {
    /// Split a row payload into per-column values.
    pub fn parse(
        payload: &'a [u8],
        columns: &[ColumnDefinition],
        format: RowFormat,
    ) -> Result<Self> {
        match format {
            RowFormat::Binary => Self::parse_binary(payload, columns),
            RowFormat::Text => Self::parse_text(payload, columns.len()),
        }
    }

    /// Text rows: one length-encoded string per column, 0xfb for NULL.
    pub fn parse_text(payload: &'a [u8], num_columns: usize) -> Result<Self> {
        let mut values = Vec::with_capacity(num_columns);
        let mut data = payload;
        for _ in 0..num_columns {
            let (len, rest) = read_lenenc_int(data)?;
            let Some(len) = len else {
                values.push(None);
                data = rest;
                continue;
            };
            let len = usize::try_from(len)
                .map_err(|_| Error::Protocol(format!("text row: length {len} too large")))?;
            let (value, rest) = read_bytes(rest, len)?;
            values.push(Some(value));
            data = rest;
        }
        Ok(Self { values })
    }

    /// Binary rows: header, null bitmap, then the non-NULL values.
    pub fn parse_binary(payload: &'a [u8], columns: &[ColumnDefinition]) -> Result<Self> {
        let (header, rest) = read_u8(payload)?;
        if header != ROW_HEADER {
            return Err(Error::Protocol(format!(
                "binary row: unexpected header 0x{header:02x}"
            )));
        }
        let bitmap_len = (columns.len() + NULL_BITMAP_OFFSET + 7) / 8;
        let (bitmap, mut data) = read_bytes(rest, bitmap_len)?;

        let mut values = Vec::with_capacity(columns.len());
        for (idx, column) in columns.iter().enumerate() {
            let bit = idx + NULL_BITMAP_OFFSET;
            if bitmap[bit / 8] & (1 << (bit % 8)) != 0 {
                values.push(None);
                continue;
            }
            let (value, rest) = read_value(data, column.column_type)?;
            values.push(Some(value));
            data = rest;
        }
        Ok(Self { values })
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True for a row without columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw binary value of a column; `None` for NULL or out of range.
    pub fn get(&self, idx: usize) -> Option<&'a [u8]> {
        self.values.get(idx).copied().flatten()
    }

    /// True if the column is NULL.
    pub fn is_null(&self, idx: usize) -> bool {
        matches!(self.values.get(idx), Some(None))
    }
}

fn read_value(data: &[u8], column_type: ColumnType) -> Result<(&[u8], &[u8])> {
    let fixed = match column_type {
        ColumnType::Null => Some(0),
        ColumnType::Tiny => Some(1),
        ColumnType::Short | ColumnType::Year => Some(2),
        ColumnType::Long | ColumnType::Int24 | ColumnType::Float => Some(4),
        ColumnType::LongLong | ColumnType::Double => Some(8),
        _ => None,
    };
    if let Some(len) = fixed {
        return read_bytes(data, len);
    }
    match column_type {
        ColumnType::Date | ColumnType::DateTime | ColumnType::Timestamp | ColumnType::Time => {
            let (len, rest) = read_u8(data)?;
            read_bytes(rest, usize::from(len))
        }
        _ => {
            let (len, rest) = read_lenenc_int(data)?;
            let len = len.ok_or_else(|| Error::Protocol("binary row: NULL length".into()))?;
            let len = usize::try_from(len)
                .map_err(|_| Error::Protocol(format!("binary row: length {len} too large")))?;
            read_bytes(rest, len)
        }
    }
}
