//! `COM_STMT_PREPARE` response and column definition packets.

use std::mem::size_of;

use zerocopy::FromBytes;

use crate::error::{Error, Result};
use crate::protocol::codec::{read_lenenc_str, read_u8};
use crate::protocol::types::{
    ColumnDefinitionTail, ColumnType, PrepareOkBody, StatementId, column_flags,
};

use super::response::OK_HEADER;

/// First packet of a successful prepare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrepareOk {
    pub statement_id: StatementId,
    pub num_columns: u16,
    pub num_params: u16,
    pub warnings: u16,
}

impl PrepareOk {
    /// Parse the `COM_STMT_PREPARE_OK` payload, header byte included.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let (header, rest) = read_u8(payload)?;
        if header != OK_HEADER {
            return Err(Error::Protocol(format!(
                "PREPARE_OK: unexpected header 0x{header:02x}"
            )));
        }
        let (body, _) = PrepareOkBody::ref_from_prefix(rest)
            .map_err(|e| Error::Protocol(format!("PREPARE_OK body: {e:?}")))?;
        Ok(Self {
            statement_id: body.statement_id.get(),
            num_columns: body.num_columns.get(),
            num_params: body.num_params.get(),
            warnings: body.warnings.get(),
        })
    }
}

/// Column (or parameter) definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub schema: String,
    pub table: String,
    pub org_table: String,
    pub name: String,
    pub org_name: String,
    pub charset: u16,
    pub column_length: u32,
    pub column_type: ColumnType,
    pub flags: u16,
    pub decimals: u8,
}

impl ColumnDefinition {
    /// Parse a column definition payload.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let (_catalog, rest) = read_lenenc_str(payload)?;
        let (schema, rest) = read_lenenc_str(rest)?;
        let (table, rest) = read_lenenc_str(rest)?;
        let (org_table, rest) = read_lenenc_str(rest)?;
        let (name, rest) = read_lenenc_str(rest)?;
        let (org_name, rest) = read_lenenc_str(rest)?;

        const TAIL_SIZE: usize = size_of::<ColumnDefinitionTail>();
        let tail_bytes = rest.get(..TAIL_SIZE).ok_or_else(|| {
            Error::Protocol(format!(
                "column definition: tail needs {TAIL_SIZE} bytes, got {}",
                rest.len()
            ))
        })?;
        let tail = ColumnDefinitionTail::ref_from_bytes(tail_bytes)?;

        let type_code = tail.column_type;
        let column_type = ColumnType::from_u8(type_code).ok_or_else(|| {
            Error::Protocol(format!("column definition: unknown type 0x{type_code:02x}"))
        })?;

        Ok(Self {
            schema: schema.to_string(),
            table: table.to_string(),
            org_table: org_table.to_string(),
            name: name.to_string(),
            org_name: org_name.to_string(),
            charset: tail.charset.get(),
            column_length: tail.column_length.get(),
            column_type,
            flags: tail.flags.get(),
            decimals: tail.decimals,
        })
    }

    /// UNSIGNED numeric column
    pub fn is_unsigned(&self) -> bool {
        self.flags & column_flags::UNSIGNED != 0
    }

    /// NOT NULL column
    pub fn is_not_null(&self) -> bool {
        self.flags & column_flags::NOT_NULL != 0
    }
}
