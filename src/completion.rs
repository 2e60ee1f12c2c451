//! Execution results.

use std::sync::Arc;

use crate::error::{Result, SUCCESS_NO_INFO};
use crate::protocol::backend::{ColumnDefinition, Row, RowFormat};
use crate::protocol::types::StatementId;

/// Outcome of a statement that modified rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateResult {
    /// Rows changed, inserted or deleted
    pub affected_rows: u64,
    /// AUTO_INCREMENT value generated by the statement, if any
    pub last_insert_id: Option<u64>,
}

/// A result table.
///
/// Rows are kept as raw payloads and only split into values on access.
#[derive(Debug, Clone)]
pub struct RowResult {
    columns: Arc<[ColumnDefinition]>,
    rows: Vec<Vec<u8>>,
    format: RowFormat,
}

impl RowResult {
    pub(crate) fn new(
        columns: Arc<[ColumnDefinition]>,
        rows: Vec<Vec<u8>>,
        format: RowFormat,
    ) -> Self {
        Self {
            columns,
            rows,
            format,
        }
    }

    /// Keep at most `max_rows` rows.
    pub(crate) fn truncate(&mut self, max_rows: usize) {
        self.rows.truncate(max_rows);
    }

    /// Wire format of the row values.
    pub fn format(&self) -> RowFormat {
        self.format
    }

    /// Column definitions of the result.
    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if the result has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Decode the row at `idx`.
    pub fn row(&self, idx: usize) -> Option<Result<Row<'_>>> {
        self.rows
            .get(idx)
            .map(|payload| Row::parse(payload, &self.columns, self.format))
    }

    /// Iterate over decoded rows.
    pub fn iter(&self) -> impl Iterator<Item = Result<Row<'_>>> {
        self.rows
            .iter()
            .map(|payload| Row::parse(payload, &self.columns, self.format))
    }
}

/// Result of one execution unit.
#[derive(Debug, Clone)]
pub enum Completion {
    /// The statement produced a result table
    Rows(RowResult),
    /// The statement reported an update count
    Update(UpdateResult),
}

impl Completion {
    /// Affected rows, or [`SUCCESS_NO_INFO`] for row results.
    pub fn update_count(&self) -> i64 {
        match self {
            Completion::Update(update) => {
                i64::try_from(update.affected_rows).unwrap_or(i64::MAX)
            }
            Completion::Rows(_) => SUCCESS_NO_INFO,
        }
    }

    /// True for a result table.
    pub fn is_rows(&self) -> bool {
        matches!(self, Completion::Rows(_))
    }

    /// The result table, if any.
    pub fn as_rows(&self) -> Option<&RowResult> {
        match self {
            Completion::Rows(rows) => Some(rows),
            Completion::Update(_) => None,
        }
    }

    /// The update outcome, if any.
    pub fn as_update(&self) -> Option<&UpdateResult> {
        match self {
            Completion::Update(update) => Some(update),
            Completion::Rows(_) => None,
        }
    }
}

/// Server response to `COM_STMT_PREPARE`.
#[derive(Debug, Clone)]
pub struct PrepareResult {
    pub statement_id: StatementId,
    pub parameters: Vec<ColumnDefinition>,
    pub columns: Vec<ColumnDefinition>,
}

/// One reconciled reply of an exchange, in send order.
#[derive(Debug, Clone)]
pub enum Reply {
    Prepared(PrepareResult),
    Completion(Completion),
}
