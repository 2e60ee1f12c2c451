//! Prepared statement commands.

use std::ops::Range;

use crate::params::ParameterSet;
use crate::protocol::codec::{write_bytes, write_u8, write_u16, write_u32};
use crate::protocol::types::{ColumnType, StatementId, command};

/// `COM_STMT_EXECUTE` cursor flag: no cursor.
const CURSOR_TYPE_NO_CURSOR: u8 = 0;

/// `COM_STMT_BULK_EXECUTE` flag: parameter types follow the header.
pub const BULK_SEND_TYPES_TO_SERVER: u16 = 128;

/// Bulk indicator: a value follows.
const INDICATOR_NONE: u8 = 0;
/// Bulk indicator: NULL, no value follows.
const INDICATOR_NULL: u8 = 1;

/// Parameter type header entry: type code and unsigned flag.
type ParamType = (ColumnType, u8);

/// Write `COM_STMT_PREPARE`.
pub fn write_prepare(out: &mut Vec<u8>, sql: &str) {
    write_u8(out, command::STMT_PREPARE);
    write_bytes(out, sql.as_bytes());
}

/// Write `COM_STMT_CLOSE`.
pub fn write_close(out: &mut Vec<u8>, statement_id: StatementId) {
    write_u8(out, command::STMT_CLOSE);
    write_u32(out, statement_id);
}

/// Write `COM_STMT_EXECUTE`.
///
/// Layout: statement id, cursor flag, iteration count (always 1), then for a
/// statement with parameters the null bitmap, the new-params-bound flag, one
/// (type, flag) pair per parameter and the non-NULL values.
pub fn write_execute(out: &mut Vec<u8>, statement_id: StatementId, params: &ParameterSet) {
    write_u8(out, command::STMT_EXECUTE);
    write_u32(out, statement_id);
    write_u8(out, CURSOR_TYPE_NO_CURSOR);
    write_u32(out, 1);

    let count = params.len();
    if count == 0 {
        return;
    }

    let bitmap_start = out.len();
    out.resize(bitmap_start + count.div_ceil(8), 0);
    for (idx, value) in params.values().enumerate() {
        if value.is_null() {
            out[bitmap_start + idx / 8] |= 1 << (idx % 8);
        }
    }

    // new-params-bound
    write_u8(out, 1);
    for value in params.values() {
        let (ty, flag) = value.binary_type();
        write_u8(out, ty as u8);
        write_u8(out, flag);
    }
    for value in params.values() {
        value.write_binary(out);
    }
}

/// Write one `COM_STMT_BULK_EXECUTE` covering `rows`.
///
/// `types` is the header shared by every row; see [`bulk_runs`].
pub fn write_bulk_execute(
    out: &mut Vec<u8>,
    statement_id: StatementId,
    types: &[ParamType],
    rows: &[ParameterSet],
) {
    write_u8(out, command::STMT_BULK_EXECUTE);
    write_u32(out, statement_id);
    write_u16(out, BULK_SEND_TYPES_TO_SERVER);
    for (ty, flag) in types {
        write_u8(out, *ty as u8);
        write_u8(out, *flag);
    }
    for row in rows {
        for value in row.values() {
            if value.is_null() {
                write_u8(out, INDICATOR_NULL);
            } else {
                write_u8(out, INDICATOR_NONE);
                value.write_binary(out);
            }
        }
    }
}

/// Split bulk rows into runs that can share one type header.
///
/// NULL adopts whatever type its column already has in the run; a non-NULL
/// value of a different type starts a new run.
pub fn bulk_runs(rows: &[ParameterSet]) -> Vec<(Range<usize>, Vec<ParamType>)> {
    let mut runs: Vec<(Range<usize>, Vec<ParamType>)> = Vec::new();
    for (idx, row) in rows.iter().enumerate() {
        let row_types: Vec<ParamType> = row.values().map(|v| v.binary_type()).collect();
        if let Some((range, types)) = runs.last_mut() {
            if let Some(merged) = merge_types(types, &row_types) {
                *types = merged;
                range.end = idx + 1;
                continue;
            }
        }
        runs.push((idx..idx + 1, row_types));
    }
    runs
}

fn merge_types(current: &[ParamType], next: &[ParamType]) -> Option<Vec<ParamType>> {
    if current.len() != next.len() {
        return None;
    }
    current
        .iter()
        .zip(next)
        .map(|(&a, &b)| match (a.0, b.0) {
            (ColumnType::Null, _) => Some(b),
            (_, ColumnType::Null) => Some(a),
            _ if a == b => Some(a),
            _ => None,
        })
        .collect()
}
