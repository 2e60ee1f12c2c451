use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};

use crate::cache::PrepareCache;
use crate::completion::Reply;
use crate::error::{Error, Result};
use crate::opts::Opts;
use crate::protocol::frontend::WireMessage;
use crate::strategy::SessionFlags;
use crate::transport::Transport;
use crate::value::{TimeParameter, Value};

use super::statement::PreparedStatement;

/// A session owning its transport and prepared statement cache.
///
/// Statements borrow the connection; any number of them may be used from
/// different threads. Exchanges are serialized on the transport.
pub struct Connection<T: Transport> {
    transport: Mutex<T>,
    cache: PrepareCache,
    opts: Opts,
    live_statements: AtomicUsize,
    is_broken: AtomicBool,
}

impl<T: Transport> Connection<T> {
    /// Wrap an established transport.
    pub fn new(transport: T, opts: Opts) -> Self {
        Self {
            transport: Mutex::new(transport),
            cache: PrepareCache::new(opts.prep_stmt_cache_size),
            opts,
            live_statements: AtomicUsize::new(0),
            is_broken: AtomicBool::new(false),
        }
    }

    /// Connection options.
    pub fn opts(&self) -> &Opts {
        &self.opts
    }

    /// The prepared statement cache.
    pub fn cache(&self) -> &PrepareCache {
        &self.cache
    }

    /// Current capability and configuration snapshot.
    pub fn session_flags(&self) -> SessionFlags {
        self.transport.lock().flags()
    }

    /// Check if the connection is broken.
    pub fn is_broken(&self) -> bool {
        self.is_broken.load(Ordering::Acquire)
    }

    /// Number of statements created and not yet closed.
    pub fn live_statements(&self) -> usize {
        self.live_statements.load(Ordering::Acquire)
    }

    /// Create a prepared statement.
    pub fn prepare_statement(&self, sql: &str) -> Result<PreparedStatement<'_, T>> {
        PreparedStatement::new(self, sql, false)
    }

    /// Create a prepared statement, optionally asking for generated keys.
    ///
    /// Batches that want generated keys are never sent as bulk commands,
    /// which report one aggregated result.
    pub fn prepare_statement_with(
        &self,
        sql: &str,
        return_generated_keys: bool,
    ) -> Result<PreparedStatement<'_, T>> {
        PreparedStatement::new(self, sql, return_generated_keys)
    }

    /// Reset the server session.
    ///
    /// The server discards every prepared statement; statements keep working
    /// and prepare again on their next execution.
    pub fn reset_session(&self) -> Result<()> {
        let mut transport = self.transport.lock();
        self.exchange(&mut transport, &[WireMessage::reset_connection()])?;
        self.cache.reset();
        Ok(())
    }

    /// TIME parameter for `instant`, rendered in the configured zone.
    pub fn time_value(&self, instant: DateTime<Utc>) -> Value {
        Value::Time(TimeParameter::new(
            instant,
            self.opts.time_zone(),
            self.opts.use_fractional_seconds,
        ))
    }

    /// Close cached statements on the server and drop the connection.
    pub fn close(self) {
        drop(self);
    }

    pub(crate) fn lock_transport(&self) -> MutexGuard<'_, T> {
        self.transport.lock()
    }

    /// Run one exchange, remembering fatal failures.
    ///
    /// Only an ERR reply leaves the reply stream in sync. Any other failure
    /// may leave packets of this exchange unread, so the connection is broken.
    pub(crate) fn exchange(&self, transport: &mut T, messages: &[WireMessage]) -> Result<Vec<Reply>> {
        if self.is_broken() {
            return Err(Error::ConnectionBroken);
        }
        let result = transport.send(messages);
        if let Err(e) = &result {
            if !e.is_server_error() {
                tracing::warn!(error = %e, "connection broken");
                self.is_broken.store(true, Ordering::Release);
            }
        }
        result
    }

    /// Adjust a bound value to the session options.
    pub(crate) fn adapt_value(&self, value: Value) -> Value {
        if self.opts.use_fractional_seconds {
            value
        } else {
            value.without_fractional_seconds()
        }
    }

    pub(crate) fn statement_opened(&self) {
        self.live_statements.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn statement_closed(&self) {
        let _ = self
            .live_statements
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }
}

impl<T: Transport> Drop for Connection<T> {
    fn drop(&mut self) {
        if self.is_broken() {
            return;
        }
        self.cache.close_all(self.transport.get_mut());
    }
}
