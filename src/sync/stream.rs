use std::io::{BufReader, Read, Write};

use crate::completion::Reply;
use crate::error::Result;
use crate::protocol::codec::{MAX_PACKET_PAYLOAD, write_packets};
use crate::protocol::frontend::WireMessage;
use crate::state::{Action, ReplyStateMachine};
use crate::strategy::SessionFlags;
use crate::transport::Transport;

/// Read one packet payload, joining max-size continuation packets.
fn read_payload_into<S: Read>(stream: &mut S, payload: &mut Vec<u8>) -> Result<()> {
    payload.clear();
    loop {
        // 3-byte length, 1-byte sequence id
        let mut header = [0u8; 4];
        stream.read_exact(&mut header)?;
        let len = u32::from_le_bytes([header[0], header[1], header[2], 0]) as usize;

        let start = payload.len();
        payload.resize(start + len, 0);
        stream.read_exact(&mut payload[start..])?;

        if len < MAX_PACKET_PAYLOAD {
            return Ok(());
        }
    }
}

/// [`Transport`] over an authenticated MariaDB byte stream.
///
/// Connection setup happens elsewhere; the stream must be positioned at a
/// command boundary and the flags must describe the negotiated session.
pub struct StreamTransport<S: Read + Write> {
    stream: BufReader<S>,
    flags: SessionFlags,
    write_buffer: Vec<u8>,
    read_buffer: Vec<u8>,
}

impl<S: Read + Write> StreamTransport<S> {
    pub fn new(stream: S, flags: SessionFlags) -> Self {
        Self {
            stream: BufReader::new(stream),
            flags,
            write_buffer: Vec::new(),
            read_buffer: Vec::new(),
        }
    }

    /// Underlying stream.
    pub fn get_ref(&self) -> &S {
        self.stream.get_ref()
    }

    pub fn into_inner(self) -> S {
        self.stream.into_inner()
    }

    fn write_messages(&mut self, messages: &[WireMessage]) -> Result<()> {
        self.write_buffer.clear();
        for message in messages {
            // every command starts a new sequence
            write_packets(&mut self.write_buffer, message.payload(), 0);
        }
        let stream = self.stream.get_mut();
        stream.write_all(&self.write_buffer)?;
        stream.flush()?;
        Ok(())
    }
}

impl<S: Read + Write> Transport for StreamTransport<S> {
    fn send(&mut self, messages: &[WireMessage]) -> Result<Vec<Reply>> {
        self.write_messages(messages)?;

        let mut machine = ReplyStateMachine::new(messages, self.flags.eof_deprecated);
        let mut action = machine.start();
        while action == Action::ReadPacket {
            read_payload_into(&mut self.stream, &mut self.read_buffer)?;
            action = machine.step(&self.read_buffer)?;
        }
        machine.finish()
    }

    fn flags(&self) -> SessionFlags {
        self.flags
    }
}
