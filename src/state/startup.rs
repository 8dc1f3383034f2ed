//! Startup and authentication handshake.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::opts::Opts;
use crate::protocol::backend::{
    msg_type, AuthenticationRequest, BackendKeyData, ErrorResponse, NoticeResponse,
    ParameterStatus, RawMessage, ReadyForQuery,
};
use crate::protocol::frontend::{md5_password, write_password, write_startup};
use crate::protocol::types::TransactionStatus;

/// What the driver should do after feeding the machine one message.
#[derive(Debug)]
pub enum StartupStep<'a> {
    /// Read the next message.
    Continue,
    /// Write these bytes, flush, then read the next message.
    Send(&'a [u8]),
    /// The session is ready for queries.
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Waiting for the first Authentication request
    AwaitingAuth,
    /// Password sent; waiting for AuthenticationOk
    AwaitingAuthOk,
    /// Authenticated; collecting session data until ReadyForQuery
    AwaitingReady,
    Done,
}

/// Drives the startup exchange: StartupMessage, authentication responses,
/// then session data (ParameterStatus, BackendKeyData) until ReadyForQuery.
///
/// An ErrorResponse at any point surfaces immediately: the server tears the
/// session down after a failed startup instead of promising ReadyForQuery.
pub struct StartupMachine {
    state: State,
    opts: Opts,
    write_buffer: Vec<u8>,
    runtime_params: HashMap<String, String>,
    backend_key: Option<(u32, u32)>,
    transaction_status: TransactionStatus,
}

impl StartupMachine {
    pub fn new(opts: Opts) -> Self {
        Self {
            state: State::AwaitingAuth,
            opts,
            write_buffer: Vec::new(),
            runtime_params: HashMap::new(),
            backend_key: None,
            transaction_status: TransactionStatus::Idle,
        }
    }

    /// Build the StartupMessage. The driver writes and flushes it, then
    /// reads messages into [`step`](Self::step).
    pub fn start(&mut self) -> &[u8] {
        self.write_buffer.clear();

        let database = self.opts.effective_database().to_string();
        let mut params: Vec<(&str, &str)> =
            vec![("user", &self.opts.user), ("client_encoding", "UTF8")];
        if !database.is_empty() {
            params.push(("database", &database));
        }
        for (name, value) in &self.opts.params {
            params.push((name, value));
        }

        write_startup(&mut self.write_buffer, &params);
        &self.write_buffer
    }

    pub fn step(&mut self, msg: RawMessage<'_>) -> Result<StartupStep<'_>> {
        if msg.is_async() {
            self.absorb_async(msg)?;
            return Ok(StartupStep::Continue);
        }

        if msg.tag == msg_type::ERROR_RESPONSE {
            return Err(ErrorResponse::parse(msg.payload)?.into_error());
        }

        match self.state {
            State::AwaitingAuth => self.handle_auth_request(msg),
            State::AwaitingAuthOk => self.handle_auth_result(msg),
            State::AwaitingReady => self.handle_session_data(msg),
            State::Done => Err(Error::Protocol(format!(
                "message {:?} after startup finished",
                msg.tag as char
            ))),
        }
    }

    /// Session state collected during the handshake.
    pub fn backend_key(&self) -> Option<(u32, u32)> {
        self.backend_key
    }

    pub fn take_runtime_params(&mut self) -> HashMap<String, String> {
        std::mem::take(&mut self.runtime_params)
    }

    pub fn transaction_status(&self) -> TransactionStatus {
        self.transaction_status
    }

    fn absorb_async(&mut self, msg: RawMessage<'_>) -> Result<()> {
        match msg.tag {
            msg_type::PARAMETER_STATUS => {
                let status = ParameterStatus::parse(msg.payload)?;
                self.runtime_params
                    .insert(status.name.to_string(), status.value.to_string());
            }
            msg_type::NOTICE_RESPONSE => {
                let notice = NoticeResponse::parse(msg.payload)?;
                log::warn!("server notice during startup: {}", notice.0);
            }
            _ => {
                log::debug!("ignoring message {:?} during startup", msg.tag as char);
            }
        }
        Ok(())
    }

    fn handle_auth_request(&mut self, msg: RawMessage<'_>) -> Result<StartupStep<'_>> {
        if msg.tag != msg_type::AUTHENTICATION {
            return Err(Error::Protocol(format!(
                "expected Authentication request, got {:?}",
                msg.tag as char
            )));
        }

        match AuthenticationRequest::parse(msg.payload)? {
            AuthenticationRequest::Ok => {
                self.state = State::AwaitingReady;
                Ok(StartupStep::Continue)
            }
            AuthenticationRequest::CleartextPassword => {
                let password = self.required_password()?.to_string();
                self.write_buffer.clear();
                write_password(&mut self.write_buffer, &password);
                self.state = State::AwaitingAuthOk;
                Ok(StartupStep::Send(&self.write_buffer))
            }
            AuthenticationRequest::Md5Password { salt } => {
                let password = self.required_password()?;
                let digest = md5_password(&self.opts.user, password, &salt);
                self.write_buffer.clear();
                write_password(&mut self.write_buffer, &digest);
                self.state = State::AwaitingAuthOk;
                Ok(StartupStep::Send(&self.write_buffer))
            }
            AuthenticationRequest::Unsupported(code) => Err(Error::Auth(format!(
                "unsupported authentication method (code {code})"
            ))),
        }
    }

    fn handle_auth_result(&mut self, msg: RawMessage<'_>) -> Result<StartupStep<'_>> {
        if msg.tag != msg_type::AUTHENTICATION {
            return Err(Error::Protocol(format!(
                "expected AuthenticationOk, got {:?}",
                msg.tag as char
            )));
        }

        match AuthenticationRequest::parse(msg.payload)? {
            AuthenticationRequest::Ok => {
                self.state = State::AwaitingReady;
                Ok(StartupStep::Continue)
            }
            other => Err(Error::Auth(format!(
                "expected authentication to conclude, server sent {other:?}"
            ))),
        }
    }

    fn handle_session_data(&mut self, msg: RawMessage<'_>) -> Result<StartupStep<'_>> {
        match msg.tag {
            msg_type::BACKEND_KEY_DATA => {
                let key = BackendKeyData::parse(msg.payload)?;
                self.backend_key = Some((key.process_id(), key.secret()));
                Ok(StartupStep::Continue)
            }
            msg_type::READY_FOR_QUERY => {
                let ready = ReadyForQuery::parse(msg.payload)?;
                self.transaction_status = ready.transaction_status()?;
                self.state = State::Done;
                Ok(StartupStep::Done)
            }
            other => Err(Error::Protocol(format!(
                "unexpected message {:?} during startup",
                other as char
            ))),
        }
    }

    fn required_password(&self) -> Result<&str> {
        self.opts
            .password
            .as_deref()
            .ok_or_else(|| Error::Auth("password required but not provided".into()))
    }
}
