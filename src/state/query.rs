//! Result-flow state machine.
//!
//! One machine drives every flow that ends in ReadyForQuery and may carry
//! rows: the simple Query flow, portal execution in the extended flow, and
//! the drain after closing a statement. The first ErrorResponse of a run is
//! retained while the rest of the run is drained, so the caller sees the
//! error only once the connection is synchronized again.

use crate::error::{Error, Result, ServerError};
use crate::protocol::backend::{
    msg_type, Column, CommandComplete, ErrorResponse, RawMessage, ReadyForQuery, RowDescription,
};
use crate::protocol::types::TransactionStatus;

/// What the driver should do after feeding the machine one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryEvent {
    /// Read the next message.
    Continue,
    /// Column metadata is installed (RowDescription arrived, or the portal
    /// acknowledged Bind); rows may follow.
    Described,
    /// The current message is a DataRow; its payload is the row.
    Row,
    /// ReadyForQuery consumed; the run is over.
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Waiting for metadata or a completion message
    AwaitingResponse,
    /// Streaming rows of the first result
    Streaming,
    /// First result finished or errored; discarding until ReadyForQuery
    Draining,
    Finished,
}

/// State machine for one request/response cycle terminated by ReadyForQuery.
pub struct QueryMachine {
    state: State,
    columns: Vec<Column>,
    rows_affected: u64,
    error: Option<ServerError>,
    transaction_status: Option<TransactionStatus>,
}

impl QueryMachine {
    /// Machine for a simple Query flow; columns arrive via RowDescription.
    pub fn new() -> Self {
        Self {
            state: State::AwaitingResponse,
            columns: Vec::new(),
            rows_affected: 0,
            error: None,
            transaction_status: None,
        }
    }

    /// Machine for executing a prepared statement.
    ///
    /// The extended flow sends no Describe with Execute, so the column
    /// metadata collected at prepare time is installed up front.
    pub fn with_columns(columns: Vec<Column>) -> Self {
        Self {
            columns,
            ..Self::new()
        }
    }

    pub fn step(&mut self, msg: RawMessage<'_>) -> Result<QueryEvent> {
        debug_assert!(!msg.is_async(), "async messages are routed before stepping");

        if msg.tag == msg_type::ERROR_RESPONSE {
            let error = ErrorResponse::parse(msg.payload)?.0;
            if self.error.is_none() {
                self.error = Some(error);
            }
            self.state = State::Draining;
            return Ok(QueryEvent::Continue);
        }

        if msg.tag == msg_type::READY_FOR_QUERY {
            let ready = ReadyForQuery::parse(msg.payload)?;
            self.transaction_status = Some(ready.transaction_status()?);
            self.state = State::Finished;
            return Ok(QueryEvent::Finished);
        }

        match self.state {
            State::AwaitingResponse => self.handle_response(msg),
            State::Streaming => self.handle_row_stream(msg),
            State::Draining => Ok(QueryEvent::Continue),
            State::Finished => Err(Error::Protocol(format!(
                "message {:?} after ReadyForQuery",
                msg.tag as char
            ))),
        }
    }

    fn handle_response(&mut self, msg: RawMessage<'_>) -> Result<QueryEvent> {
        match msg.tag {
            msg_type::ROW_DESCRIPTION => {
                self.columns = RowDescription::parse(msg.payload)?.into_columns();
                self.state = State::Streaming;
                Ok(QueryEvent::Described)
            }
            msg_type::BIND_COMPLETE => {
                self.state = State::Streaming;
                Ok(QueryEvent::Described)
            }
            msg_type::COMMAND_COMPLETE => {
                // A multi-statement query completes each command in turn;
                // the trailing count wins.
                self.rows_affected = CommandComplete::parse(msg.payload)?.rows_affected();
                Ok(QueryEvent::Continue)
            }
            msg_type::EMPTY_QUERY_RESPONSE => Ok(QueryEvent::Continue),
            msg_type::PARSE_COMPLETE | msg_type::CLOSE_COMPLETE | msg_type::NO_DATA => {
                Ok(QueryEvent::Continue)
            }
            msg_type::DATA_ROW => Err(Error::Protocol(
                "DataRow before RowDescription".into(),
            )),
            other => {
                log::debug!("ignoring message {:?} in query flow", other as char);
                Ok(QueryEvent::Continue)
            }
        }
    }

    fn handle_row_stream(&mut self, msg: RawMessage<'_>) -> Result<QueryEvent> {
        match msg.tag {
            msg_type::DATA_ROW => Ok(QueryEvent::Row),
            msg_type::COMMAND_COMPLETE => {
                self.rows_affected = CommandComplete::parse(msg.payload)?.rows_affected();
                // Results of any further statements in the same query
                // string are discarded on the way to ReadyForQuery.
                self.state = State::Draining;
                Ok(QueryEvent::Continue)
            }
            msg_type::EMPTY_QUERY_RESPONSE => {
                self.state = State::Draining;
                Ok(QueryEvent::Continue)
            }
            msg_type::PORTAL_SUSPENDED | msg_type::NO_DATA | msg_type::CLOSE_COMPLETE => {
                Ok(QueryEvent::Continue)
            }
            other => Err(Error::Protocol(format!(
                "unexpected message {:?} while streaming rows",
                other as char
            ))),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state == State::Finished
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    /// The first server error of the run, if any. Available once; the
    /// caller surfaces it exactly when ReadyForQuery has been consumed.
    pub fn take_error(&mut self) -> Option<ServerError> {
        self.error.take()
    }

    /// Status byte from the terminating ReadyForQuery.
    pub fn transaction_status(&self) -> Option<TransactionStatus> {
        self.transaction_status
    }
}

impl Default for QueryMachine {
    fn default() -> Self {
        Self::new()
    }
}
