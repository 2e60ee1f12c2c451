//! Client → server commands.

mod query;
mod statement;

pub use query::{placeholder_count, write_query};
pub use statement::{
    BULK_SEND_TYPES_TO_SERVER, bulk_runs, write_bulk_execute, write_close, write_execute,
    write_prepare,
};

use crate::error::Result;
use crate::params::ParameterSet;
use crate::protocol::types::{StatementId, command};

/// Command kinds, which determine how the reply is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Prepare,
    Execute,
    BulkExecute,
    Query,
    /// Session reset, answered by OK
    Reset,
    /// No server reply
    Close,
}

/// One encoded command payload, ready for packet framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireMessage {
    kind: MessageKind,
    payload: Vec<u8>,
}

impl WireMessage {
    /// `COM_STMT_PREPARE`
    pub fn prepare(sql: &str) -> Self {
        let mut payload = Vec::with_capacity(1 + sql.len());
        write_prepare(&mut payload, sql);
        Self {
            kind: MessageKind::Prepare,
            payload,
        }
    }

    /// `COM_STMT_EXECUTE`
    pub fn execute(statement_id: StatementId, params: &ParameterSet) -> Self {
        let mut payload = Vec::new();
        write_execute(&mut payload, statement_id, params);
        Self {
            kind: MessageKind::Execute,
            payload,
        }
    }

    /// `COM_STMT_BULK_EXECUTE`, one message per run of rows sharing
    /// parameter types.
    pub fn bulk_execute(statement_id: StatementId, rows: &[ParameterSet]) -> Vec<Self> {
        bulk_runs(rows)
            .into_iter()
            .map(|(range, types)| {
                let mut payload = Vec::new();
                write_bulk_execute(&mut payload, statement_id, &types, &rows[range]);
                Self {
                    kind: MessageKind::BulkExecute,
                    payload,
                }
            })
            .collect()
    }

    /// `COM_STMT_CLOSE`
    pub fn close(statement_id: StatementId) -> Self {
        let mut payload = Vec::with_capacity(5);
        write_close(&mut payload, statement_id);
        Self {
            kind: MessageKind::Close,
            payload,
        }
    }

    /// `COM_QUERY` with text-interpolated parameters.
    pub fn query(sql: &str, params: &ParameterSet) -> Result<Self> {
        let mut payload = Vec::new();
        write_query(&mut payload, sql, params)?;
        Ok(Self {
            kind: MessageKind::Query,
            payload,
        })
    }

    /// `COM_RESET_CONNECTION`
    pub fn reset_connection() -> Self {
        Self {
            kind: MessageKind::Reset,
            payload: vec![command::RESET_CONNECTION],
        }
    }

    /// Command kind.
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Encoded command payload, command byte first.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// False for commands the server never answers.
    pub fn expects_reply(&self) -> bool {
        self.kind != MessageKind::Close
    }
}
