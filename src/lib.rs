//! Server-side prepared statements for the MariaDB wire protocol.
//!
//! # Features
//!
//! - **Prepare cache**: statements with the same text share one server-side
//!   prepared statement, reference counted and evicted least recently used
//! - **Batch strategies**: batches are sent row by row, pipelined, or as a
//!   single bulk command depending on server capabilities
//! - **Sans-I/O reply handling**: response parsing is separated from I/O
//! - **Pluggable transport**: anything implementing [`Transport`] can carry
//!   the exchanges
//!
//! # Example
//!
//! ```no_run
//! use std::net::TcpStream;
//!
//! use zero_mariadb::sync::{Connection, StreamTransport};
//! use zero_mariadb::Opts;
//!
//! fn main() -> zero_mariadb::Result<()> {
//!     let opts = Opts::try_from("mariadb://app@localhost:3306/shop?useBulkStmts=true")?;
//!
//!     // an already authenticated session
//!     let stream = TcpStream::connect(opts.address())?;
//!     let flags = opts.session_flags(0);
//!     let conn = Connection::new(StreamTransport::new(stream, flags), opts);
//!
//!     let insert = conn.prepare_statement("INSERT INTO t (id, name) VALUES (?, ?)")?;
//!     for (id, name) in [(1, "a"), (2, "b"), (3, "c")] {
//!         insert.bind((id, name))?;
//!         insert.add_batch()?;
//!     }
//!     let counts = insert.execute_batch_counts()?;
//!     println!("{counts:?}");
//!
//!     let select = conn.prepare_statement("SELECT name FROM t WHERE id = ?")?;
//!     select.set(1, 2)?;
//!     for row in select.execute_query()?.iter() {
//!         println!("{:?}", row?.get(0));
//!     }
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod completion;
pub mod error;
pub mod opts;
pub mod params;
pub mod protocol;
pub mod sql;
pub mod state;
pub mod strategy;
pub mod transport;
pub mod value;

#[cfg(feature = "sync")]
pub mod sync;

pub use cache::{PrepareCache, PreparedDescriptor};
pub use completion::{Completion, PrepareResult, Reply, RowResult, UpdateResult};
pub use error::{BatchError, Error, ExchangeError, Result, SUCCESS_NO_INFO, ServerError};
pub use opts::Opts;
pub use params::{ParameterSet, ToParams};
pub use protocol::backend::{ColumnDefinition, Row, RowFormat};
pub use protocol::{ColumnType, MessageKind, STATEMENT_ID_UNASSIGNED, StatementId, WireMessage};
pub use strategy::{ExecutionStrategy, PIPELINE_DEPTH, SessionFlags, select_strategy};
pub use transport::Transport;
pub use value::{DateTimeParameter, TimeParameter, Value};
