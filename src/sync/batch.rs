//! Batch execution.
//!
//! A batch is consumed by exactly one strategy and is empty again when the
//! call returns, whatever the outcome.

use crate::completion::Completion;
use crate::error::{BatchError, Error, Result, SUCCESS_NO_INFO};
use crate::params::ParameterSet;
use crate::protocol::frontend::WireMessage;
use crate::protocol::types::STATEMENT_ID_UNASSIGNED;
use crate::strategy::{ExecutionStrategy, PIPELINE_DEPTH, SessionFlags, select_strategy};
use crate::transport::Transport;

use super::statement::{PreparedStatement, StatementState};

impl<T: Transport> PreparedStatement<'_, T> {
    /// Execute every parameter set added with
    /// [`add_batch`](Self::add_batch).
    ///
    /// On success there is one completion per parameter set, in order. On
    /// failure the error is [`Error::Batch`]: rows sent one by one keep going
    /// after a failed row and report what succeeded, pipelined and bulk
    /// batches report nothing.
    pub fn execute_batch(&self) -> Result<Vec<Completion>> {
        self.run_batch().map(|(_, completions)| completions)
    }

    /// Execute the batch and report one update count per parameter set.
    ///
    /// Row results and outcomes the server did not report individually (a
    /// bulk command answers with one aggregated count) read as
    /// [`SUCCESS_NO_INFO`].
    pub fn execute_batch_counts(&self) -> Result<Vec<i64>> {
        let (batch_size, completions) = self.run_batch()?;
        if completions.len() != batch_size {
            return Ok(vec![SUCCESS_NO_INFO; batch_size]);
        }
        Ok(completions.iter().map(Completion::update_count).collect())
    }

    fn run_batch(&self) -> Result<(usize, Vec<Completion>)> {
        let mut state = self.lock()?;
        let rows = std::mem::take(&mut state.batch);
        if rows.is_empty() {
            return Ok((0, Vec::new()));
        }
        self.validate_rows(&state, &rows)?;

        let mut transport = self.conn.lock_transport();
        let flags = transport.flags();
        let strategy = if self.is_binary() {
            select_strategy(rows.len(), &flags, self.generated_keys)
        } else {
            ExecutionStrategy::Standard
        };

        let completions = match strategy {
            ExecutionStrategy::Standard => self.run_standard(&mut state, &mut transport, &rows),
            ExecutionStrategy::Pipelined => {
                self.run_pipelined(&mut state, &mut transport, &rows, &flags)
            }
            ExecutionStrategy::Bulk => self.run_bulk(&mut state, &mut transport, &rows, &flags),
        }?;
        Ok((rows.len(), completions))
    }

    fn validate_rows(&self, state: &StatementState, rows: &[ParameterSet]) -> Result<()> {
        let expected = self
            .known_parameter_count(state)
            .unwrap_or_else(|| rows.first().map_or(0, ParameterSet::len));
        rows.iter().try_for_each(|row| row.validate(Some(expected)))
    }

    /// One round-trip per row. A failed row is recorded and the rest still run.
    fn run_standard(
        &self,
        state: &mut StatementState,
        transport: &mut T,
        rows: &[ParameterSet],
    ) -> Result<Vec<Completion>> {
        let mut completions = Vec::with_capacity(rows.len());
        let mut failed_rows = Vec::new();
        let mut first_error = None;

        for (idx, row) in rows.iter().enumerate() {
            match self.execute_one(state, transport, row) {
                Ok(row_completions) => completions.extend(row_completions),
                Err(e) => {
                    tracing::debug!(row = idx, error = %e, "batch row failed");
                    failed_rows.push(idx);
                    first_error.get_or_insert(e);
                    if self.conn.is_broken() {
                        break;
                    }
                }
            }
        }

        match first_error {
            None => Ok(completions),
            Some(e) => Err(BatchError::new(completions, rows.len(), failed_rows, e).into()),
        }
    }

    /// Executes pipelined in chunks of [`PIPELINE_DEPTH`].
    fn run_pipelined(
        &self,
        state: &mut StatementState,
        transport: &mut T,
        rows: &[ParameterSet],
        flags: &SessionFlags,
    ) -> Result<Vec<Completion>> {
        let abort = |e: Error| Error::from(BatchError::new(Vec::new(), rows.len(), Vec::new(), e));
        let mut completions = Vec::with_capacity(rows.len());

        for chunk in rows.chunks(PIPELINE_DEPTH) {
            let mut messages = Vec::with_capacity(chunk.len() + 1);
            let statement_id = match self.cached(state, flags).map_err(abort)? {
                Some(d) => d.statement_id(),
                None => {
                    messages.push(WireMessage::prepare(&self.command_text(state, flags)));
                    STATEMENT_ID_UNASSIGNED
                }
            };
            messages.extend(chunk.iter().map(|row| WireMessage::execute(statement_id, row)));
            tracing::debug!(messages = messages.len(), "sending pipelined batch chunk");

            let replies = self.exchange(state, transport, &messages).map_err(abort)?;
            let chunk_completions = self
                .take_completions(state, transport, replies, flags)
                .map_err(abort)?;
            completions.extend(chunk_completions);
        }
        Ok(completions)
    }

    /// One bulk command per run of rows sharing parameter types.
    fn run_bulk(
        &self,
        state: &mut StatementState,
        transport: &mut T,
        rows: &[ParameterSet],
        flags: &SessionFlags,
    ) -> Result<Vec<Completion>> {
        let abort = |e: Error| Error::from(BatchError::new(Vec::new(), rows.len(), Vec::new(), e));

        let mut messages = Vec::new();
        let statement_id = match self.cached(state, flags).map_err(abort)? {
            Some(d) => d.statement_id(),
            None => {
                messages.push(WireMessage::prepare(&self.command_text(state, flags)));
                STATEMENT_ID_UNASSIGNED
            }
        };
        messages.extend(WireMessage::bulk_execute(statement_id, rows));
        tracing::debug!(rows = rows.len(), messages = messages.len(), "sending bulk batch");

        let replies = self.exchange(state, transport, &messages).map_err(abort)?;
        self.take_completions(state, transport, replies, flags)
            .map_err(abort)
    }
}
