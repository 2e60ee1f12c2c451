//! Sans-I/O state machines for the MariaDB protocol.
//!
//! These state machines handle the protocol logic without performing any I/O.
//! They produce `Action` values that tell the caller what to do next.

pub mod action;
pub mod reply;

pub use action::Action;
pub use reply::ReplyStateMachine;
