//! The connection seam used by the statement engine.

use crate::completion::Reply;
use crate::error::Result;
use crate::protocol::frontend::WireMessage;
use crate::strategy::SessionFlags;

/// A connected, authenticated session that can run pipelined exchanges.
///
/// Implementations write every message before reading any reply and return
/// the replies in send order. Commands without a reply (`COM_STMT_CLOSE`)
/// contribute nothing to the returned list. When a reply is an ERR packet the
/// remaining replies of the exchange are still read, then the first error is
/// returned; replies read alongside it come back in
/// [`Error::Exchange`](crate::Error::Exchange).
/// Any other error means the reply stream was left unread and the session
/// can no longer be used.
pub trait Transport {
    /// Send `messages` as one exchange.
    fn send(&mut self, messages: &[WireMessage]) -> Result<Vec<Reply>>;

    /// Send a single message.
    fn send_single(&mut self, message: WireMessage) -> Result<Vec<Reply>> {
        self.send(std::slice::from_ref(&message))
    }

    /// Capability and configuration snapshot.
    fn flags(&self) -> SessionFlags;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send(&mut self, messages: &[WireMessage]) -> Result<Vec<Reply>> {
        (**self).send(messages)
    }

    fn flags(&self) -> SessionFlags {
        (**self).flags()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, messages: &[WireMessage]) -> Result<Vec<Reply>> {
        (**self).send(messages)
    }

    fn flags(&self) -> SessionFlags {
        (**self).flags()
    }
}
