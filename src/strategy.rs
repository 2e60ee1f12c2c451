//! Batch execution strategy selection.

use crate::protocol::types::capabilities;

/// How a batch is sent to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStrategy {
    /// One round-trip per row; keeps going after a failed row.
    Standard,
    /// One execute per row, up to [`PIPELINE_DEPTH`] rows per exchange.
    Pipelined,
    /// One combined bulk-execute for the whole batch.
    Bulk,
}

/// Largest number of executes sent in one pipelined exchange.
pub const PIPELINE_DEPTH: usize = 250;

/// Snapshot of server capabilities and session configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionFlags {
    /// Server implements `COM_STMT_BULK_EXECUTE`
    pub server_bulk_operations: bool,
    /// Server allows `LOAD DATA LOCAL INFILE`
    pub server_local_files: bool,
    /// Client enabled local infile
    pub local_infile_enabled: bool,
    /// Client allows bulk statements
    pub bulk_statements_enabled: bool,
    /// Server understands `SET STATEMENT ... FOR`
    pub server_statement_options: bool,
    /// Result sets end with OK instead of EOF
    pub eof_deprecated: bool,
}

impl SessionFlags {
    /// Build a snapshot from negotiated capability bits.
    pub fn from_capabilities(
        server_capabilities: u64,
        local_infile_enabled: bool,
        bulk_statements_enabled: bool,
    ) -> Self {
        Self {
            server_bulk_operations: server_capabilities
                & capabilities::MARIADB_CLIENT_STMT_BULK_OPERATIONS
                != 0,
            server_local_files: server_capabilities & capabilities::CLIENT_LOCAL_FILES != 0,
            local_infile_enabled,
            bulk_statements_enabled,
            // every server with bulk operations also has statement options
            server_statement_options: server_capabilities
                & capabilities::MARIADB_CLIENT_STMT_BULK_OPERATIONS
                != 0,
            eof_deprecated: server_capabilities & capabilities::CLIENT_DEPRECATE_EOF != 0,
        }
    }

    /// True when a prepare and its first execute can share one exchange.
    pub fn can_pipeline_prepare(&self) -> bool {
        self.server_bulk_operations
    }
}

/// Pick the strategy for a batch of `batch_size` rows.
pub fn select_strategy(
    batch_size: usize,
    flags: &SessionFlags,
    requests_generated_keys: bool,
) -> ExecutionStrategy {
    let strategy = if batch_size <= 1 || !flags.server_bulk_operations {
        ExecutionStrategy::Standard
    } else if flags.local_infile_enabled && flags.server_local_files {
        ExecutionStrategy::Standard
    } else if flags.bulk_statements_enabled && !requests_generated_keys {
        ExecutionStrategy::Bulk
    } else {
        ExecutionStrategy::Pipelined
    };
    tracing::debug!(batch_size, ?strategy, "selected batch strategy");
    strategy
}
