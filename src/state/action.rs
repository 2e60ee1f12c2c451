//! Action types for state machine I/O requests.

/// Action requested by a state machine.
///
/// The caller performs the requested I/O and feeds the result back through
/// the machine's `step()` method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Read one packet payload from the server (reassembled if it spans
    /// several max-size packets) and pass it to `step()`.
    ReadPacket,

    /// Every expected reply has been read.
    Finished,
}
