//! Prepare-flow state machine.

use crate::error::{Error, Result, ServerError};
use crate::protocol::backend::{
    msg_type, Column, ErrorResponse, ParameterDescription, RawMessage, ReadyForQuery,
    RowDescription,
};
use crate::protocol::types::{Oid, TransactionStatus};

/// What the driver should do after feeding the machine one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareEvent {
    /// Read the next message.
    Continue,
    /// ReadyForQuery consumed; the run is over.
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Collecting ParseComplete, ParameterDescription, RowDescription/NoData
    Collecting,
    /// Error retained; discarding until ReadyForQuery
    Draining,
    Finished,
}

/// Drives the response to a `Parse` + `Describe(statement)` + `Sync` group:
/// collects the statement's parameter types and result columns, with the
/// same retain-first-error-and-drain policy as the query flow.
pub struct PrepareMachine {
    state: State,
    param_oids: Vec<Oid>,
    columns: Vec<Column>,
    error: Option<ServerError>,
    transaction_status: Option<TransactionStatus>,
}

impl PrepareMachine {
    pub fn new() -> Self {
        Self {
            state: State::Collecting,
            param_oids: Vec::new(),
            columns: Vec::new(),
            error: None,
            transaction_status: None,
        }
    }

    pub fn step(&mut self, msg: RawMessage<'_>) -> Result<PrepareEvent> {
        debug_assert!(!msg.is_async(), "async messages are routed before stepping");

        if msg.tag == msg_type::ERROR_RESPONSE {
            let error = ErrorResponse::parse(msg.payload)?.0;
            if self.error.is_none() {
                self.error = Some(error);
            }
            self.state = State::Draining;
            return Ok(PrepareEvent::Continue);
        }

        if msg.tag == msg_type::READY_FOR_QUERY {
            let ready = ReadyForQuery::parse(msg.payload)?;
            self.transaction_status = Some(ready.transaction_status()?);
            self.state = State::Finished;
            return Ok(PrepareEvent::Finished);
        }

        match self.state {
            State::Collecting => self.handle_collecting(msg),
            State::Draining => Ok(PrepareEvent::Continue),
            State::Finished => Err(Error::Protocol(format!(
                "message {:?} after ReadyForQuery",
                msg.tag as char
            ))),
        }
    }

    fn handle_collecting(&mut self, msg: RawMessage<'_>) -> Result<PrepareEvent> {
        match msg.tag {
            msg_type::PARSE_COMPLETE => Ok(PrepareEvent::Continue),
            msg_type::PARAMETER_DESCRIPTION => {
                self.param_oids = ParameterDescription::parse(msg.payload)?.oids().to_vec();
                Ok(PrepareEvent::Continue)
            }
            msg_type::ROW_DESCRIPTION => {
                self.columns = RowDescription::parse(msg.payload)?.into_columns();
                Ok(PrepareEvent::Continue)
            }
            msg_type::NO_DATA => {
                self.columns.clear();
                Ok(PrepareEvent::Continue)
            }
            other => {
                log::debug!("ignoring message {:?} in prepare flow", other as char);
                Ok(PrepareEvent::Continue)
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state == State::Finished
    }

    pub fn param_oids(&self) -> &[Oid] {
        &self.param_oids
    }

    pub fn take_columns(&mut self) -> Vec<Column> {
        std::mem::take(&mut self.columns)
    }

    pub fn take_error(&mut self) -> Option<ServerError> {
        self.error.take()
    }

    pub fn transaction_status(&self) -> Option<TransactionStatus> {
        self.transaction_status
    }
}

impl Default for PrepareMachine {
    fn default() -> Self {
        Self::new()
    }
}
