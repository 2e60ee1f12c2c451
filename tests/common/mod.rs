//! Scripted in-memory MariaDB server for engine tests.
//!
//! The mock answers every command with real protocol packets, which are then
//! read back through the crate's reply state machine.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use zero_mariadb::protocol::codec::{
    write_lenenc_bytes, write_lenenc_int, write_u8, write_u16, write_u32,
};
use zero_mariadb::protocol::frontend::placeholder_count;
use zero_mariadb::protocol::types::{ColumnType, capabilities, command};
use zero_mariadb::state::{Action, ReplyStateMachine};
use zero_mariadb::sync::Connection;
use zero_mariadb::{
    Error, MessageKind, Opts, Reply, Result, STATEMENT_ID_UNASSIGNED, SessionFlags, StatementId,
    Transport, WireMessage,
};

/// Error code used for injected row failures.
pub const DUPLICATE_KEY: u16 = 1062;

#[derive(Debug, Default)]
pub struct ServerState {
    /// Every exchange, in order
    pub exchanges: Vec<Vec<WireMessage>>,
    /// Statement ids closed by the client
    pub closed: Vec<StatementId>,
    /// Global indices of executes answered with a duplicate-key error
    pub fail_executes: Vec<usize>,
    /// Fail the next exchange with a timeout before anything is read
    pub time_out_next: bool,
    /// Rows returned by every SELECT
    pub rows_per_select: usize,
    /// Answer bulk executes with a duplicate-key error
    pub fail_bulk: bool,
    /// Answer the next execute or query with a LOCAL INFILE request,
    /// followed by the OK the server sends once the file was transferred
    pub local_infile_next: bool,
    executes: usize,
    next_statement_id: StatementId,
    last_prepared: Option<StatementId>,
    selects: HashMap<StatementId, bool>,
}

/// Handle shared between a test and its [`MockTransport`].
#[derive(Debug, Clone, Default)]
pub struct MockServer {
    state: Arc<Mutex<ServerState>>,
}

impl MockServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut ServerState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn exchanges(&self) -> Vec<Vec<WireMessage>> {
        self.with(|s| s.exchanges.clone())
    }

    /// Kinds of every message sent, per exchange.
    pub fn kinds(&self) -> Vec<Vec<MessageKind>> {
        self.with(|s| {
            s.exchanges
                .iter()
                .map(|e| e.iter().map(WireMessage::kind).collect())
                .collect()
        })
    }

    pub fn count(&self, kind: MessageKind) -> usize {
        self.kinds().iter().flatten().filter(|k| **k == kind).count()
    }

    pub fn transport(&self, flags: SessionFlags) -> MockTransport {
        MockTransport {
            server: self.clone(),
            flags,
        }
    }
}

/// Flags of a current MariaDB server with bulk support and deprecated EOF.
pub fn mariadb_flags() -> SessionFlags {
    SessionFlags::from_capabilities(
        capabilities::MARIADB_CLIENT_STMT_BULK_OPERATIONS | capabilities::CLIENT_DEPRECATE_EOF,
        false,
        true,
    )
}

/// Flags of a server without bulk operations (and so without pipelined prepare).
pub fn legacy_flags() -> SessionFlags {
    SessionFlags::from_capabilities(capabilities::CLIENT_DEPRECATE_EOF, false, true)
}

pub fn connect(server: &MockServer, flags: SessionFlags, opts: Opts) -> Connection<MockTransport> {
    Connection::new(server.transport(flags), opts)
}

pub struct MockTransport {
    server: MockServer,
    flags: SessionFlags,
}

impl Transport for MockTransport {
    fn send(&mut self, messages: &[WireMessage]) -> Result<Vec<Reply>> {
        let packets = self.server.with(|s| {
            s.exchanges.push(messages.to_vec());
            if std::mem::take(&mut s.time_out_next) {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "read timed out",
                )));
            }
            let mut packets = Vec::new();
            for message in messages {
                s.answer(message, &mut packets);
            }
            Ok(packets)
        })?;

        let mut machine = ReplyStateMachine::new(messages, self.flags.eof_deprecated);
        let mut packets = packets.into_iter();
        let mut action = machine.start();
        while action == Action::ReadPacket {
            let packet = packets
                .next()
                .ok_or_else(|| Error::Protocol("mock ran out of packets".into()))?;
            action = machine.step(&packet)?;
        }
        assert!(packets.next().is_none(), "unread packets left in mock");
        machine.finish()
    }

    fn flags(&self) -> SessionFlags {
        self.flags
    }
}

impl ServerState {
    fn answer(&mut self, message: &WireMessage, out: &mut Vec<Vec<u8>>) {
        let payload = message.payload();
        match payload[0] {
            command::STMT_PREPARE => {
                let sql = std::str::from_utf8(&payload[1..]).unwrap();
                self.next_statement_id += 1;
                let id = self.next_statement_id;
                let is_select = sql.contains("SELECT ");
                self.selects.insert(id, is_select);
                self.last_prepared = Some(id);

                let num_params = placeholder_count(sql);
                let num_columns = usize::from(is_select);
                out.push(prepare_ok(id, num_columns as u16, num_params as u16));
                for _ in 0..num_params {
                    out.push(column_definition("?", ColumnType::VarString));
                }
                if is_select {
                    out.push(column_definition("id", ColumnType::Long));
                }
            }
            command::STMT_EXECUTE => {
                let mut id = u32::from_le_bytes(payload[1..5].try_into().unwrap());
                if id == STATEMENT_ID_UNASSIGNED {
                    id = self.last_prepared.unwrap_or(0);
                }
                let index = self.executes;
                self.executes += 1;
                if std::mem::take(&mut self.local_infile_next) {
                    local_infile(out);
                } else if self.fail_executes.contains(&index) {
                    out.push(err_packet(DUPLICATE_KEY, "23000", "Duplicate entry"));
                } else if !self.selects.contains_key(&id) {
                    out.push(err_packet(1243, "HY000", "Unknown prepared statement handler"));
                } else if self.selects[&id] {
                    self.result_set(out, false);
                } else {
                    out.push(ok_packet(1, index as u64 + 1, 0x00));
                }
            }
            command::STMT_BULK_EXECUTE if self.fail_bulk => {
                out.push(err_packet(DUPLICATE_KEY, "23000", "Duplicate entry"));
            }
            command::STMT_BULK_EXECUTE => out.push(ok_packet(3, 0, 0x00)),
            command::QUERY => {
                let sql = std::str::from_utf8(&payload[1..]).unwrap();
                if std::mem::take(&mut self.local_infile_next) {
                    local_infile(out);
                } else if sql.contains("SELECT ") {
                    self.result_set(out, true);
                } else {
                    out.push(ok_packet(1, 0, 0x00));
                }
            }
            command::STMT_CLOSE => {
                let id = u32::from_le_bytes(payload[1..5].try_into().unwrap());
                self.selects.remove(&id);
                self.closed.push(id);
            }
            command::RESET_CONNECTION => {
                self.selects.clear();
                self.last_prepared = None;
                out.push(ok_packet(0, 0, 0x00));
            }
            other => panic!("unexpected command 0x{other:02x}"),
        }
    }

    fn result_set(&self, out: &mut Vec<Vec<u8>>, text: bool) {
        let mut count = Vec::new();
        write_lenenc_int(&mut count, 1);
        out.push(count);
        out.push(column_definition("id", ColumnType::Long));
        for n in 0..self.rows_per_select {
            let mut row = Vec::new();
            if text {
                write_lenenc_bytes(&mut row, n.to_string().as_bytes());
            } else {
                write_u8(&mut row, 0x00);
                write_u8(&mut row, 0x00);
                write_u32(&mut row, n as u32);
            }
            out.push(row);
        }
        let mut end = ok_packet(0, 0, 0x00);
        end[0] = 0xfe;
        out.push(end);
    }
}

fn local_infile(out: &mut Vec<Vec<u8>>) {
    out.push(b"\xfb/etc/passwd".to_vec());
    out.push(ok_packet(7, 0, 0x00));
}

pub fn ok_packet(affected_rows: u64, last_insert_id: u64, status: u16) -> Vec<u8> {
    let mut out = vec![0x00];
    write_lenenc_int(&mut out, affected_rows);
    write_lenenc_int(&mut out, last_insert_id);
    write_u16(&mut out, status);
    write_u16(&mut out, 0);
    out
}

pub fn err_packet(code: u16, sql_state: &str, message: &str) -> Vec<u8> {
    let mut out = vec![0xff];
    write_u16(&mut out, code);
    out.push(b'#');
    out.extend_from_slice(sql_state.as_bytes());
    out.extend_from_slice(message.as_bytes());
    out
}

pub fn prepare_ok(id: StatementId, num_columns: u16, num_params: u16) -> Vec<u8> {
    let mut out = vec![0x00];
    write_u32(&mut out, id);
    write_u16(&mut out, num_columns);
    write_u16(&mut out, num_params);
    write_u8(&mut out, 0);
    write_u16(&mut out, 0);
    out
}

pub fn column_definition(name: &str, ty: ColumnType) -> Vec<u8> {
    let mut out = Vec::new();
    for part in ["def", "test", "t", "t", name, name] {
        write_lenenc_bytes(&mut out, part.as_bytes());
    }
    write_u8(&mut out, 0x0c);
    write_u16(&mut out, 63);
    write_u32(&mut out, 11);
    write_u8(&mut out, ty as u8);
    write_u16(&mut out, 0);
    write_u8(&mut out, 0);
    write_u16(&mut out, 0);
    out
}
