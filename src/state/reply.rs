//! Reply reconciliation for one pipelined exchange.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::completion::{Completion, PrepareResult, Reply, RowResult, UpdateResult};
use crate::error::{Error, ExchangeError, Result};
use crate::protocol::backend::{
    ColumnDefinition, EOF_HEADER, ERR_HEADER, EofPacket, ErrPacket, OK_HEADER, OkPacket,
    PrepareOk, RowFormat, is_eof,
};
use crate::protocol::codec::{MAX_PACKET_PAYLOAD, read_lenenc_int};
use crate::protocol::frontend::{MessageKind, WireMessage};
use crate::protocol::types::server_status;

use super::action::Action;

/// Header of a LOCAL INFILE request.
const LOCAL_INFILE_HEADER: u8 = 0xfb;

#[derive(Debug)]
enum State {
    /// Waiting for the first packet of the next reply
    Next,
    PrepareParams {
        prepared: PrepareResult,
        remaining: usize,
        num_columns: usize,
    },
    PrepareParamsEof {
        prepared: PrepareResult,
        num_columns: usize,
    },
    PrepareColumns {
        prepared: PrepareResult,
        remaining: usize,
    },
    PrepareColumnsEof {
        prepared: PrepareResult,
    },
    ResultColumns {
        columns: Vec<ColumnDefinition>,
        remaining: usize,
    },
    ColumnsEof {
        columns: Vec<ColumnDefinition>,
    },
    Rows {
        columns: Vec<ColumnDefinition>,
        rows: Vec<Vec<u8>>,
    },
}

/// Reads the replies of one exchange, in send order.
///
/// Commands without a reply are skipped. An ERR packet ends the reply of its
/// command; the remaining replies are still read so the session stays in
/// sync, and the first error is reported by [`finish`](Self::finish).
#[derive(Debug)]
pub struct ReplyStateMachine {
    expected: VecDeque<MessageKind>,
    current: Option<MessageKind>,
    state: State,
    eof_deprecated: bool,
    replies: Vec<Reply>,
    first_error: Option<Error>,
}

impl ReplyStateMachine {
    /// Create a machine for the replies to `messages`.
    pub fn new(messages: &[WireMessage], eof_deprecated: bool) -> Self {
        Self {
            expected: messages
                .iter()
                .filter(|m| m.expects_reply())
                .map(WireMessage::kind)
                .collect(),
            current: None,
            state: State::Next,
            eof_deprecated,
            replies: Vec::new(),
            first_error: None,
        }
    }

    /// First action after the messages were written.
    pub fn start(&mut self) -> Action {
        self.advance()
    }

    /// Feed one packet payload.
    ///
    /// Errors returned here are fatal to the session: the reply stream could
    /// not be understood and the connection must not be reused.
    pub fn step(&mut self, payload: &[u8]) -> Result<Action> {
        let state = std::mem::replace(&mut self.state, State::Next);
        let kind = self
            .current
            .ok_or_else(|| Error::Protocol("unexpected packet after exchange end".into()))?;

        match state {
            State::Next => self.handle_first(kind, payload),
            State::PrepareParams {
                mut prepared,
                remaining,
                num_columns,
            } => {
                prepared.parameters.push(ColumnDefinition::parse(payload)?);
                if remaining > 1 {
                    self.state = State::PrepareParams {
                        prepared,
                        remaining: remaining - 1,
                        num_columns,
                    };
                    Ok(Action::ReadPacket)
                } else if self.eof_deprecated {
                    Ok(self.prepare_columns(prepared, num_columns))
                } else {
                    self.state = State::PrepareParamsEof {
                        prepared,
                        num_columns,
                    };
                    Ok(Action::ReadPacket)
                }
            }
            State::PrepareParamsEof {
                prepared,
                num_columns,
            } => {
                EofPacket::parse(payload)?;
                Ok(self.prepare_columns(prepared, num_columns))
            }
            State::PrepareColumns {
                mut prepared,
                remaining,
            } => {
                prepared.columns.push(ColumnDefinition::parse(payload)?);
                if remaining > 1 {
                    self.state = State::PrepareColumns {
                        prepared,
                        remaining: remaining - 1,
                    };
                    Ok(Action::ReadPacket)
                } else if self.eof_deprecated {
                    Ok(self.complete(Reply::Prepared(prepared)))
                } else {
                    self.state = State::PrepareColumnsEof { prepared };
                    Ok(Action::ReadPacket)
                }
            }
            State::PrepareColumnsEof { prepared } => {
                EofPacket::parse(payload)?;
                Ok(self.complete(Reply::Prepared(prepared)))
            }
            State::ResultColumns {
                mut columns,
                remaining,
            } => {
                columns.push(ColumnDefinition::parse(payload)?);
                self.state = if remaining > 1 {
                    State::ResultColumns {
                        columns,
                        remaining: remaining - 1,
                    }
                } else if self.eof_deprecated {
                    State::Rows {
                        columns,
                        rows: Vec::new(),
                    }
                } else {
                    State::ColumnsEof { columns }
                };
                Ok(Action::ReadPacket)
            }
            State::ColumnsEof { columns } => {
                EofPacket::parse(payload)?;
                self.state = State::Rows {
                    columns,
                    rows: Vec::new(),
                };
                Ok(Action::ReadPacket)
            }
            State::Rows { columns, mut rows } => match payload.first() {
                Some(&ERR_HEADER) => {
                    self.record_error(ErrPacket::parse(payload)?.into_error());
                    Ok(self.advance())
                }
                Some(&EOF_HEADER) if self.is_terminator(payload) => {
                    let status = if self.eof_deprecated {
                        OkPacket::parse(payload)?.status_flags
                    } else {
                        EofPacket::parse(payload)?.status_flags
                    };
                    let format = if kind == MessageKind::Query {
                        RowFormat::Text
                    } else {
                        RowFormat::Binary
                    };
                    let result = RowResult::new(Arc::from(columns), rows, format);
                    Ok(self.result(Completion::Rows(result), status))
                }
                _ => {
                    rows.push(payload.to_vec());
                    self.state = State::Rows { columns, rows };
                    Ok(Action::ReadPacket)
                }
            },
        }
    }

    /// Take the replies, or the first error reported by the server.
    ///
    /// When other commands of the exchange did reply, the error is an
    /// [`Error::Exchange`] carrying those replies.
    pub fn finish(self) -> Result<Vec<Reply>> {
        match self.first_error {
            None => Ok(self.replies),
            Some(err) if self.replies.is_empty() => Err(err),
            Some(err) => Err(ExchangeError::new(self.replies, err).into()),
        }
    }

    fn handle_first(&mut self, kind: MessageKind, payload: &[u8]) -> Result<Action> {
        let header = *payload
            .first()
            .ok_or_else(|| Error::Protocol("empty reply packet".into()))?;

        if header == ERR_HEADER {
            self.record_error(ErrPacket::parse(payload)?.into_error());
            return Ok(self.advance());
        }

        match kind {
            MessageKind::Prepare => {
                let ok = PrepareOk::parse(payload)?;
                let prepared = PrepareResult {
                    statement_id: ok.statement_id,
                    parameters: Vec::with_capacity(usize::from(ok.num_params)),
                    columns: Vec::with_capacity(usize::from(ok.num_columns)),
                };
                let num_columns = usize::from(ok.num_columns);
                if ok.num_params > 0 {
                    self.state = State::PrepareParams {
                        prepared,
                        remaining: usize::from(ok.num_params),
                        num_columns,
                    };
                    Ok(Action::ReadPacket)
                } else {
                    Ok(self.prepare_columns(prepared, num_columns))
                }
            }
            MessageKind::Reset => {
                OkPacket::parse(payload)?;
                Ok(self.advance_to_next())
            }
            MessageKind::Execute | MessageKind::BulkExecute | MessageKind::Query => {
                match header {
                    OK_HEADER => {
                        let ok = OkPacket::parse(payload)?;
                        let update = UpdateResult {
                            affected_rows: ok.affected_rows,
                            last_insert_id: (ok.last_insert_id != 0).then_some(ok.last_insert_id),
                        };
                        Ok(self.result(Completion::Update(update), ok.status_flags))
                    }
                    LOCAL_INFILE_HEADER => Err(Error::Unsupported(
                        "LOCAL INFILE requests are not supported".into(),
                    )),
                    _ => {
                        let (count, _) = read_lenenc_int(payload)?;
                        let count = count
                            .and_then(|c| usize::try_from(c).ok())
                            .filter(|c| *c > 0)
                            .ok_or_else(|| {
                                Error::Protocol("result set: invalid column count".into())
                            })?;
                        self.state = State::ResultColumns {
                            columns: Vec::with_capacity(count),
                            remaining: count,
                        };
                        Ok(Action::ReadPacket)
                    }
                }
            }
            MessageKind::Close => Err(Error::Protocol("COM_STMT_CLOSE has no reply".into())),
        }
    }

    fn prepare_columns(&mut self, prepared: PrepareResult, num_columns: usize) -> Action {
        if num_columns == 0 {
            return self.complete(Reply::Prepared(prepared));
        }
        self.state = State::PrepareColumns {
            prepared,
            remaining: num_columns,
        };
        Action::ReadPacket
    }

    /// A finished result; another one follows in the same reply when the
    /// server set `SERVER_MORE_RESULTS_EXISTS`.
    fn result(&mut self, completion: Completion, status_flags: u16) -> Action {
        self.replies.push(Reply::Completion(completion));
        if status_flags & server_status::MORE_RESULTS_EXISTS != 0 {
            self.state = State::Next;
            Action::ReadPacket
        } else {
            self.advance_to_next()
        }
    }

    fn complete(&mut self, reply: Reply) -> Action {
        self.replies.push(reply);
        self.advance_to_next()
    }

    fn advance_to_next(&mut self) -> Action {
        self.state = State::Next;
        self.advance()
    }

    fn advance(&mut self) -> Action {
        self.current = self.expected.pop_front();
        match self.current {
            Some(_) => Action::ReadPacket,
            None => Action::Finished,
        }
    }

    fn is_terminator(&self, payload: &[u8]) -> bool {
        if self.eof_deprecated {
            payload.len() < MAX_PACKET_PAYLOAD
        } else {
            is_eof(payload)
        }
    }

    fn record_error(&mut self, err: Error) {
        tracing::debug!(error = %err, "server error in exchange");
        if self.first_error.is_none() {
            self.first_error = Some(err);
        }
    }
}
