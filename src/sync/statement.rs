use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};

use crate::cache::PreparedDescriptor;
use crate::completion::{Completion, PrepareResult, Reply, RowResult, UpdateResult};
use crate::error::{Error, Result};
use crate::params::{ParameterSet, ToParams};
use crate::protocol::backend::ColumnDefinition;
use crate::protocol::frontend::{WireMessage, placeholder_count};
use crate::protocol::types::STATEMENT_ID_UNASSIGNED;
use crate::sql;
use crate::strategy::SessionFlags;
use crate::transport::Transport;
use crate::value::Value;

use super::conn::Connection;

/// Server-side plan of a statement.
#[derive(Debug)]
pub(super) enum Plan {
    /// Resolved from the cache or prepared on next execution
    Unprepared,
    Prepared(Arc<PreparedDescriptor>),
    Closed,
}

/// Mutable statement state, guarded by the statement lock.
#[derive(Debug)]
pub(super) struct StatementState {
    pub(super) plan: Plan,
    pub(super) parameters: ParameterSet,
    pub(super) batch: Vec<ParameterSet>,
    pub(super) max_rows: u64,
    pub(super) query_timeout: Option<Duration>,
}

/// A statement bound to a [`Connection`].
///
/// Every operation holds the statement lock for its full duration, so one
/// statement can be shared between threads. Statements on the same
/// connection only serialize on the transport.
pub struct PreparedStatement<'c, T: Transport> {
    pub(super) conn: &'c Connection<T>,
    pub(super) sql: String,
    pub(super) generated_keys: bool,
    pub(super) state: Mutex<StatementState>,
}

impl<'c, T: Transport> PreparedStatement<'c, T> {
    pub(super) fn new(conn: &'c Connection<T>, sql: &str, generated_keys: bool) -> Result<Self> {
        conn.statement_opened();
        let stmt = Self {
            conn,
            sql: sql.to_string(),
            generated_keys,
            state: Mutex::new(StatementState {
                plan: Plan::Unprepared,
                parameters: ParameterSet::new(),
                batch: Vec::new(),
                max_rows: 0,
                query_timeout: None,
            }),
        };

        // DML waits so its first execution can carry the prepare
        if stmt.is_binary() && !sql::is_preparable(sql) {
            let mut state = stmt.state.lock();
            let mut transport = conn.lock_transport();
            stmt.resolve(&mut state, &mut transport)?;
        }
        Ok(stmt)
    }

    /// SQL text as given.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Bind `value` at 1-based `position`.
    pub fn set(&self, position: usize, value: impl Into<Value>) -> Result<()> {
        let mut state = self.lock()?;
        let value = self.conn.adapt_value(value.into());
        state.parameters.set(position, value)
    }

    /// Bind NULL at 1-based `position`.
    pub fn set_null(&self, position: usize) -> Result<()> {
        self.set(position, Value::Null)
    }

    /// Replace every binding, e.g. with a tuple.
    pub fn bind<P: ToParams>(&self, params: P) -> Result<()> {
        let mut state = self.lock()?;
        state.parameters = params
            .into_parameter_set()
            .map_values(|v| self.conn.adapt_value(v));
        Ok(())
    }

    /// Drop every binding.
    pub fn clear_parameters(&self) -> Result<()> {
        self.lock()?.parameters.clear();
        Ok(())
    }

    /// Append a copy of the current bindings to the batch.
    pub fn add_batch(&self) -> Result<()> {
        let mut state = self.lock()?;
        let expected = self.known_parameter_count(&state);
        state.parameters.validate(expected)?;
        let row = state.parameters.clone();
        state.batch.push(row);
        Ok(())
    }

    /// Number of parameter sets waiting in the batch.
    pub fn batch_len(&self) -> usize {
        self.state.lock().batch.len()
    }

    /// Execute with the current bindings.
    ///
    /// Returns one completion per result; statements like `CALL` may report
    /// more than one.
    pub fn execute(&self) -> Result<Vec<Completion>> {
        let mut state = self.lock()?;
        let mut transport = self.conn.lock_transport();
        let params = std::mem::take(&mut state.parameters);
        let result = self.execute_one(&mut state, &mut transport, &params);
        state.parameters = params;
        result
    }

    /// Execute a statement that returns rows.
    pub fn execute_query(&self) -> Result<RowResult> {
        match self.execute()?.into_iter().next() {
            Some(Completion::Rows(rows)) => Ok(rows),
            Some(Completion::Update(_)) => Err(Error::InvalidUsage(
                "statement did not return a result set".into(),
            )),
            None => Err(Error::Protocol("no result for execution".into())),
        }
    }

    /// Execute a statement that modifies rows.
    pub fn execute_update(&self) -> Result<UpdateResult> {
        match self.execute()?.into_iter().next() {
            Some(Completion::Update(update)) => Ok(update),
            Some(Completion::Rows(_)) => Err(Error::InvalidUsage(
                "statement returned a result set".into(),
            )),
            None => Err(Error::Protocol("no result for execution".into())),
        }
    }

    /// Limit result sets to `max_rows` rows; 0 means no limit.
    ///
    /// The current plan is released; the next execution resolves a new one.
    pub fn set_max_rows(&self, max_rows: u64) -> Result<()> {
        let mut state = self.lock()?;
        state.max_rows = max_rows;
        self.release(&mut state);
        Ok(())
    }

    /// Current row limit.
    pub fn max_rows(&self) -> u64 {
        self.state.lock().max_rows
    }

    /// Abort executions running longer than `timeout`; `None` disables it.
    ///
    /// The current plan is released; the next execution resolves a new one.
    pub fn set_query_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        let mut state = self.lock()?;
        state.query_timeout = timeout;
        self.release(&mut state);
        Ok(())
    }

    /// Current query timeout.
    pub fn query_timeout(&self) -> Option<Duration> {
        self.state.lock().query_timeout
    }

    /// Number of bind parameters. Prepares the statement if needed.
    pub fn parameter_count(&self) -> Result<usize> {
        let mut state = self.lock()?;
        if !self.is_binary() {
            return Ok(placeholder_count(&self.sql));
        }
        let mut transport = self.conn.lock_transport();
        Ok(self.resolve(&mut state, &mut transport)?.parameter_count())
    }

    /// Result columns. Prepares the statement if needed.
    pub fn columns(&self) -> Result<Arc<[ColumnDefinition]>> {
        let mut state = self.lock()?;
        if !self.is_binary() {
            return Err(Error::Unsupported(
                "column metadata requires server-side prepared statements".into(),
            ));
        }
        let mut transport = self.conn.lock_transport();
        Ok(Arc::clone(self.resolve(&mut state, &mut transport)?.columns()))
    }

    /// True once [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        matches!(self.state.lock().plan, Plan::Closed)
    }

    /// Release the plan and close the statement. Closing twice is a no-op.
    pub fn close(&self) {
        let mut state = self.state.lock();
        if matches!(state.plan, Plan::Closed) {
            return;
        }
        self.release(&mut state);
        state.batch.clear();
        self.conn.statement_closed();
        state.plan = Plan::Closed;
        tracing::trace!(sql = %self.sql, "statement closed");
    }

    pub(super) fn lock(&self) -> Result<MutexGuard<'_, StatementState>> {
        let state = self.state.lock();
        if matches!(state.plan, Plan::Closed) {
            return Err(Error::AlreadyClosed);
        }
        Ok(state)
    }

    pub(super) fn is_binary(&self) -> bool {
        self.conn.opts().use_server_prep_stmts
    }

    /// Text sent to the server, also the cache key.
    pub(super) fn command_text(&self, state: &StatementState, flags: &SessionFlags) -> Cow<'_, str> {
        sql::command_text(
            &self.sql,
            state.query_timeout,
            state.max_rows,
            flags.server_statement_options,
        )
    }

    pub(super) fn known_parameter_count(&self, state: &StatementState) -> Option<usize> {
        match &state.plan {
            Plan::Prepared(d) if self.conn.cache().is_current(d) => Some(d.parameter_count()),
            _ if !self.is_binary() => Some(placeholder_count(&self.sql)),
            _ => None,
        }
    }

    /// Current descriptor, dropping one invalidated by a session reset.
    pub(super) fn current(&self, state: &mut StatementState) -> Result<Option<Arc<PreparedDescriptor>>> {
        let stale = match &state.plan {
            Plan::Closed => return Err(Error::AlreadyClosed),
            Plan::Prepared(d) if self.conn.cache().is_current(d) => return Ok(Some(Arc::clone(d))),
            Plan::Prepared(_) => true,
            Plan::Unprepared => false,
        };
        if stale {
            tracing::debug!(sql = %self.sql, "prepared statement is stale");
            state.plan = Plan::Unprepared;
        }
        Ok(None)
    }

    /// Current descriptor, from the cache if possible.
    pub(super) fn cached(
        &self,
        state: &mut StatementState,
        flags: &SessionFlags,
    ) -> Result<Option<Arc<PreparedDescriptor>>> {
        if let Some(d) = self.current(state)? {
            return Ok(Some(d));
        }
        let text = self.command_text(state, flags);
        let found = self.conn.cache().get(&text);
        if let Some(d) = &found {
            state.plan = Plan::Prepared(Arc::clone(d));
        }
        Ok(found)
    }

    /// Current descriptor, preparing the statement on a cache miss.
    pub(super) fn resolve(
        &self,
        state: &mut StatementState,
        transport: &mut T,
    ) -> Result<Arc<PreparedDescriptor>> {
        let flags = transport.flags();
        if let Some(d) = self.cached(state, &flags)? {
            return Ok(d);
        }
        let text = self.command_text(state, &flags);
        let replies = self.exchange(state, transport, &[WireMessage::prepare(&text)])?;
        match replies.into_iter().next() {
            Some(Reply::Prepared(prepared)) => {
                let d = self.conn.cache().insert(&text, prepared, transport);
                state.plan = Plan::Prepared(Arc::clone(&d));
                Ok(d)
            }
            _ => Err(Error::Protocol("expected a prepare reply".into())),
        }
    }

    /// Drop the reference to the current plan. A closed statement stays closed.
    pub(super) fn release(&self, state: &mut StatementState) {
        if let Plan::Prepared(d) = &state.plan {
            self.conn.cache().release(d);
            state.plan = Plan::Unprepared;
        }
    }

    /// Run one exchange.
    ///
    /// A statement prepared by an exchange that then failed is still adopted,
    /// so the server-side id stays tracked and is closed in time. Failures
    /// other than server errors release the plan.
    pub(super) fn exchange(
        &self,
        state: &mut StatementState,
        transport: &mut T,
        messages: &[WireMessage],
    ) -> Result<Vec<Reply>> {
        match self.conn.exchange(transport, messages) {
            Ok(replies) => Ok(replies),
            Err(Error::Exchange(exchange)) => {
                let (replies, cause) = exchange.into_parts();
                if let Some(Reply::Prepared(prepared)) = replies.into_iter().next() {
                    let flags = transport.flags();
                    self.adopt(state, transport, prepared, &flags);
                }
                Err(cause)
            }
            Err(e) => {
                if !e.is_server_error() {
                    self.release(state);
                }
                Err(e)
            }
        }
    }

    /// Register a prepare reply in the cache and make it the plan.
    fn adopt(
        &self,
        state: &mut StatementState,
        transport: &mut T,
        prepared: PrepareResult,
        flags: &SessionFlags,
    ) {
        let text = self.command_text(state, flags);
        let d = self.conn.cache().insert(&text, prepared, transport);
        self.release(state);
        state.plan = Plan::Prepared(d);
    }

    /// Execute one parameter set.
    pub(super) fn execute_one(
        &self,
        state: &mut StatementState,
        transport: &mut T,
        params: &ParameterSet,
    ) -> Result<Vec<Completion>> {
        let flags = transport.flags();
        if !self.is_binary() {
            params.validate(Some(placeholder_count(&self.sql)))?;
            let text = self.command_text(state, &flags);
            let message = WireMessage::query(&text, params)?;
            let replies = self.exchange(state, transport, &[message])?;
            return self.take_completions(state, transport, replies, &flags);
        }

        let replies = match self.cached(state, &flags)? {
            Some(d) => {
                params.validate(Some(d.parameter_count()))?;
                let message = WireMessage::execute(d.statement_id(), params);
                self.exchange(state, transport, &[message])?
            }
            None if flags.can_pipeline_prepare() => {
                params.validate(None)?;
                let text = self.command_text(state, &flags);
                let messages = [
                    WireMessage::prepare(&text),
                    WireMessage::execute(STATEMENT_ID_UNASSIGNED, params),
                ];
                self.exchange(state, transport, &messages)?
            }
            None => {
                params.validate(None)?;
                let d = self.resolve(state, transport)?;
                params.validate(Some(d.parameter_count()))?;
                let message = WireMessage::execute(d.statement_id(), params);
                self.exchange(state, transport, &[message])?
            }
        };
        self.take_completions(state, transport, replies, &flags)
    }

    /// Split an exchange's replies into completions.
    ///
    /// A leading prepare reply is registered in the cache and becomes the
    /// statement's plan.
    pub(super) fn take_completions(
        &self,
        state: &mut StatementState,
        transport: &mut T,
        replies: Vec<Reply>,
        flags: &SessionFlags,
    ) -> Result<Vec<Completion>> {
        let limit = (!flags.server_statement_options && state.max_rows > 0)
            .then(|| usize::try_from(state.max_rows).unwrap_or(usize::MAX));
        let mut completions = Vec::with_capacity(replies.len());
        for (idx, reply) in replies.into_iter().enumerate() {
            match reply {
                Reply::Prepared(prepared) if idx == 0 => {
                    self.adopt(state, transport, prepared, flags);
                }
                Reply::Prepared(_) => {
                    return Err(Error::Protocol("unexpected prepare reply".into()));
                }
                Reply::Completion(Completion::Rows(mut rows)) => {
                    if let Some(limit) = limit {
                        rows.truncate(limit);
                    }
                    completions.push(Completion::Rows(rows));
                }
                Reply::Completion(completion) => completions.push(completion),
            }
        }
        Ok(completions)
    }
}

impl<T: Transport> Drop for PreparedStatement<'_, T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T: Transport> std::fmt::Debug for PreparedStatement<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedStatement")
            .field("sql", &self.sql)
            .field("generated_keys", &self.generated_keys)
            .finish_non_exhaustive()
    }
}
