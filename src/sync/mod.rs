//! Synchronous statement execution.

mod batch;
mod conn;
mod statement;
mod stream;

pub use conn::Connection;
pub use statement::PreparedStatement;
pub use stream::StreamTransport;
