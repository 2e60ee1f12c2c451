//! Connection-scoped prepared statement cache.
//!
//! Descriptors live in an arena keyed by [`DescriptorKey`]; the LRU list maps
//! SQL text to keys. Reference counts are kept next to each descriptor and
//! only change under the cache lock. An entry is closed on the server only
//! when it is evicted with no statement holding it.

use std::collections::HashMap;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;

use crate::completion::PrepareResult;
use crate::protocol::backend::ColumnDefinition;
use crate::protocol::frontend::WireMessage;
use crate::protocol::types::{ColumnType, StatementId};
use crate::transport::Transport;

/// Stable arena index of a cached descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorKey(u64);

/// Server-side handle of one prepared statement. Immutable once created.
#[derive(Debug)]
pub struct PreparedDescriptor {
    key: DescriptorKey,
    epoch: u64,
    statement_id: StatementId,
    parameters: Vec<ColumnDefinition>,
    columns: Arc<[ColumnDefinition]>,
}

impl PreparedDescriptor {
    /// Server statement id.
    pub fn statement_id(&self) -> StatementId {
        self.statement_id
    }

    /// Number of bind parameters.
    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    /// Parameter types announced by the server.
    pub fn parameter_types(&self) -> impl ExactSizeIterator<Item = ColumnType> + '_ {
        self.parameters.iter().map(|p| p.column_type)
    }

    /// Result columns; empty for statements that produce no rows.
    pub fn columns(&self) -> &Arc<[ColumnDefinition]> {
        &self.columns
    }
}

#[derive(Debug)]
struct Entry {
    descriptor: Arc<PreparedDescriptor>,
    ref_count: usize,
}

#[derive(Debug)]
struct Inner {
    lru: LruCache<String, DescriptorKey>,
    entries: HashMap<DescriptorKey, Entry>,
    next_key: u64,
    epoch: u64,
}

/// Bounded, reference-counted map from SQL text to prepared descriptors.
#[derive(Debug)]
pub struct PrepareCache {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl PrepareCache {
    /// Create a cache holding up to `capacity` idle entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner {
                lru: LruCache::unbounded(),
                entries: HashMap::new(),
                next_key: 0,
                epoch: 0,
            }),
        }
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of cached entries, including ones above capacity.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// True if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up `sql`; a hit takes a reference.
    pub fn get(&self, sql: &str) -> Option<Arc<PreparedDescriptor>> {
        let mut inner = self.inner.lock();
        let Inner { lru, entries, .. } = &mut *inner;
        let Some(key) = lru.get(sql) else {
            tracing::debug!(sql, "prepare cache miss");
            return None;
        };
        let entry = entries.get_mut(key)?;
        entry.ref_count += 1;
        tracing::debug!(sql, ref_count = entry.ref_count, "prepare cache hit");
        Some(Arc::clone(&entry.descriptor))
    }

    /// Register a freshly prepared statement and take a reference to it.
    ///
    /// If another caller cached the same SQL in the meantime, the new server
    /// statement is closed and the existing entry is returned instead. Idle
    /// entries beyond capacity are evicted least recently used first and
    /// closed on the server; when every entry is in use the cache grows.
    pub fn insert<T: Transport + ?Sized>(
        &self,
        sql: &str,
        prepared: PrepareResult,
        transport: &mut T,
    ) -> Arc<PreparedDescriptor> {
        let mut to_close = Vec::new();
        let descriptor = {
            let mut inner = self.inner.lock();
            let Inner {
                lru,
                entries,
                next_key,
                epoch,
            } = &mut *inner;

            let existing = lru.get(sql).copied();
            if let Some(entry) = existing.and_then(|key| entries.get_mut(&key)) {
                entry.ref_count += 1;
                to_close.push(prepared.statement_id);
                Arc::clone(&entry.descriptor)
            } else {
                let key = DescriptorKey(*next_key);
                *next_key += 1;
                let descriptor = Arc::new(PreparedDescriptor {
                    key,
                    epoch: *epoch,
                    statement_id: prepared.statement_id,
                    parameters: prepared.parameters,
                    columns: Arc::from(prepared.columns),
                });
                lru.put(sql.to_string(), key);
                entries.insert(
                    key,
                    Entry {
                        descriptor: Arc::clone(&descriptor),
                        ref_count: 1,
                    },
                );
                tracing::debug!(sql, statement_id = descriptor.statement_id, "prepare cache insert");

                while lru.len() > self.capacity {
                    let victim = lru
                        .iter()
                        .rev()
                        .find(|(_, k)| entries.get(*k).is_some_and(|e| e.ref_count == 0))
                        .map(|(s, k)| (s.clone(), *k));
                    let Some((victim_sql, victim_key)) = victim else {
                        tracing::debug!(len = lru.len(), "prepare cache over capacity, all in use");
                        break;
                    };
                    lru.pop(&victim_sql);
                    if let Some(entry) = entries.remove(&victim_key) {
                        tracing::debug!(
                            sql = %victim_sql,
                            statement_id = entry.descriptor.statement_id,
                            "prepare cache evict"
                        );
                        to_close.push(entry.descriptor.statement_id);
                    }
                }
                descriptor
            }
        };

        close_best_effort(transport, &to_close);
        descriptor
    }

    /// Drop one reference. Never goes below zero; stale descriptors are ignored.
    pub fn release(&self, descriptor: &PreparedDescriptor) {
        let mut inner = self.inner.lock();
        if descriptor.epoch != inner.epoch {
            return;
        }
        if let Some(entry) = inner.entries.get_mut(&descriptor.key) {
            entry.ref_count = entry.ref_count.saturating_sub(1);
            tracing::trace!(
                statement_id = descriptor.statement_id,
                ref_count = entry.ref_count,
                "prepare cache release"
            );
        }
    }

    /// True if `descriptor` is still valid on the server.
    pub fn is_current(&self, descriptor: &PreparedDescriptor) -> bool {
        descriptor.epoch == self.inner.lock().epoch
    }

    /// Current reference count of the entry for `sql`.
    pub fn ref_count(&self, sql: &str) -> Option<usize> {
        let inner = self.inner.lock();
        let key = inner.lru.peek(sql)?;
        inner.entries.get(key).map(|e| e.ref_count)
    }

    /// Forget every entry after the server discarded its prepared statements.
    ///
    /// Descriptors still held by statements become stale.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.epoch += 1;
        inner.lru.clear();
        inner.entries.clear();
        tracing::debug!(epoch = inner.epoch, "prepare cache reset");
    }

    /// Close every cached statement on the server and forget them.
    pub fn close_all<T: Transport + ?Sized>(&self, transport: &mut T) {
        let ids: Vec<StatementId> = {
            let mut inner = self.inner.lock();
            inner.epoch += 1;
            inner.lru.clear();
            inner
                .entries
                .drain()
                .map(|(_, e)| e.descriptor.statement_id)
                .collect()
        };
        close_best_effort(transport, &ids);
    }
}

fn close_best_effort<T: Transport + ?Sized>(transport: &mut T, ids: &[StatementId]) {
    if ids.is_empty() {
        return;
    }
    let messages: Vec<WireMessage> = ids.iter().map(|id| WireMessage::close(*id)).collect();
    if let Err(e) = transport.send(&messages) {
        tracing::warn!(?ids, error = %e, "failed to close prepared statements");
    }
}
