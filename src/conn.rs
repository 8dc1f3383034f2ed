//! Blocking PostgreSQL connection.

use std::collections::HashMap;
use std::io::{BufReader, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};
use crate::logging::LogLevel;
use crate::opts::Opts;
use crate::protocol::backend::{
    msg_type, NoticeResponse, NotificationResponse, ParameterStatus, RawMessage, ReadyForQuery,
};
use crate::protocol::frontend::{
    write_bind, write_close_portal, write_close_statement, write_describe_statement,
    write_execute, write_parse, write_query, write_sync, write_terminate,
};
use crate::protocol::types::{Oid, TransactionStatus};
use crate::result_set::ResultSet;
use crate::state::prepare::{PrepareEvent, PrepareMachine};
use crate::state::query::{QueryEvent, QueryMachine};
use crate::state::startup::{StartupMachine, StartupStep};
use crate::statement::Statement;
use crate::value::Value;

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(0);

/// Connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnStatus {
    /// No usable session; the connection was closed or failed
    Disconnected,
    /// Between request/response cycles; any operation may start
    Ready,
    /// A result set is open and owns the stream until drained
    ProcessingQuery,
}

impl std::fmt::Display for ConnStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnStatus::Disconnected => "disconnected",
            ConnStatus::Ready => "ready",
            ConnStatus::ProcessingQuery => "processing query",
        };
        f.write_str(name)
    }
}

/// An asynchronous notification captured from a NOTIFY.
#[derive(Debug, Clone)]
pub struct Notification {
    pub pid: u32,
    pub channel: String,
    pub payload: String,
}

/// A blocking connection to a PostgreSQL server.
///
/// One owner at a time: operations never overlap, and while a
/// [`ResultSet`] is open it exclusively borrows the connection. Fatal
/// failures (I/O, timeout, protocol violations) leave the connection
/// `Disconnected`; server errors leave it `Ready` once the terminating
/// ReadyForQuery has been consumed.
pub struct Conn {
    id: u64,
    log_level: LogLevel,
    stream: BufReader<TcpStream>,
    write_buffer: Vec<u8>,
    frame_tag: u8,
    frame_payload: Vec<u8>,
    status: ConnStatus,
    transaction_status: TransactionStatus,
    backend_key: Option<(u32, u32)>,
    runtime_params: HashMap<String, String>,
    notifications: Vec<Notification>,
    next_statement_id: u64,
    next_portal_id: u64,
    next_savepoint_id: u64,
}

impl Conn {
    /// Connect using a connection string.
    ///
    /// Accepts `keyword = value` settings (`host`, `port`, `dbname`,
    /// `user`, `password`, `timeout`) or a `postgres://` URL; see
    /// [`Opts`].
    pub fn connect(conn_str: &str, log_level: LogLevel) -> Result<Self> {
        let opts = Opts::try_from(conn_str)?;
        Self::new(opts, log_level)
    }

    /// Connect using already-parsed options.
    pub fn new(opts: Opts, log_level: LogLevel) -> Result<Self> {
        if log_level >= LogLevel::Debug {
            log::debug!("connecting to {}:{}", opts.host, opts.port);
        }

        let result = Self::startup(opts, log_level);
        if let Err(ref err) = result {
            if log_level >= LogLevel::Fatal {
                log::error!("connect failed: {err}");
            }
        }
        result
    }

    fn startup(opts: Opts, log_level: LogLevel) -> Result<Self> {
        let tcp = TcpStream::connect((opts.host.as_str(), opts.port)).map_err(Error::from_io)?;
        tcp.set_read_timeout(opts.timeout)?;
        tcp.set_nodelay(true)?;

        let mut conn = Self {
            id: NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed),
            log_level,
            stream: BufReader::new(tcp),
            write_buffer: Vec::with_capacity(8192),
            frame_tag: 0,
            frame_payload: Vec::with_capacity(8192),
            status: ConnStatus::Disconnected,
            transaction_status: TransactionStatus::Idle,
            backend_key: None,
            runtime_params: HashMap::new(),
            notifications: Vec::new(),
            next_statement_id: 0,
            next_portal_id: 0,
            next_savepoint_id: 0,
        };

        let mut machine = StartupMachine::new(opts);
        conn.write_buffer.clear();
        conn.write_buffer.extend_from_slice(machine.start());
        conn.flush_write()?;

        loop {
            conn.read_frame()?;
            let msg = RawMessage::new(conn.frame_tag, &conn.frame_payload);
            match machine.step(msg)? {
                StartupStep::Continue => {}
                StartupStep::Send(bytes) => {
                    conn.write_buffer.clear();
                    conn.write_buffer.extend_from_slice(bytes);
                    conn.flush_write()?;
                }
                StartupStep::Done => break,
            }
        }

        conn.backend_key = machine.backend_key();
        conn.runtime_params = machine.take_runtime_params();
        conn.transaction_status = machine.transaction_status();
        conn.status = ConnStatus::Ready;

        if log_level >= LogLevel::Debug {
            log::debug!(
                "connected, backend pid {:?}",
                conn.backend_key.map(|(pid, _)| pid)
            );
        }
        Ok(conn)
    }

    /// Current connection status.
    pub fn status(&self) -> ConnStatus {
        self.status
    }

    /// Transaction status reported by the last ReadyForQuery.
    pub fn transaction_status(&self) -> TransactionStatus {
        self.transaction_status
    }

    /// Look up a server runtime parameter (e.g. `client_encoding`).
    ///
    /// The map reflects every ParameterStatus seen on this connection,
    /// latest value winning.
    pub fn runtime_parameter(&self, name: &str) -> Option<&str> {
        self.runtime_params.get(name).map(String::as_str)
    }

    /// Backend process id, for out-of-band cancel requests.
    pub fn backend_pid(&self) -> Option<u32> {
        self.backend_key.map(|(pid, _)| pid)
    }

    /// Backend secret key, for out-of-band cancel requests.
    pub fn backend_secret(&self) -> Option<u32> {
        self.backend_key.map(|(_, secret)| secret)
    }

    /// Drain the captured NOTIFY messages.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    /// Send one or more SQL statements and stream the first result.
    ///
    /// The returned [`ResultSet`] must be drained or closed before the
    /// connection accepts another operation.
    pub fn query(&mut self, sql: &str) -> Result<ResultSet<'_>> {
        self.expect_ready("query")?;
        match self.begin_query(sql) {
            Ok(machine) => Ok(ResultSet::new(self, machine)),
            Err(err) => Err(self.intercept(err)),
        }
    }

    /// Send a SQL command and return the number of rows affected.
    pub fn execute(&mut self, sql: &str) -> Result<u64> {
        let mut result_set = self.query(sql)?;
        result_set.close()?;
        Ok(result_set.rows_affected())
    }

    /// Prepare a statement for repeated execution.
    ///
    /// `param_types` declares the placeholder types; OID 0 (or an empty
    /// slice) lets the server infer them. The statement's true parameter
    /// types, as described by the server, are available on the result.
    pub fn prepare(&mut self, sql: &str, param_types: &[Oid]) -> Result<Statement> {
        self.expect_ready("prepare")?;
        match self.run_prepare(sql, param_types) {
            Ok(statement) => Ok(statement),
            Err(err) => Err(self.intercept(err)),
        }
    }

    /// Close the connection, sending Terminate first when possible.
    ///
    /// Closing an already-closed connection is a usage error.
    pub fn close(&mut self) -> Result<()> {
        match self.status {
            ConnStatus::Disconnected => {
                let err = Error::Usage("connection already closed".into());
                if self.log_level >= LogLevel::Warning {
                    log::warn!("{err}");
                }
                Err(err)
            }
            ConnStatus::Ready => self.send_terminate(),
            ConnStatus::ProcessingQuery => {
                // Only reachable when a result set was leaked; the stream
                // is mid-run, so discard up to the terminator first.
                let drained = self.drain_to_ready();
                let terminated = self.send_terminate();
                drained.and(terminated)
            }
        }
    }

    // === internals shared with ResultSet / Statement ===

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn log_level(&self) -> LogLevel {
        self.log_level
    }

    pub(crate) fn frame_payload(&self) -> &[u8] {
        &self.frame_payload
    }

    pub(crate) fn next_savepoint_name(&mut self) -> String {
        let name = format!("sp{}", self.next_savepoint_id);
        self.next_savepoint_id += 1;
        name
    }

    pub(crate) fn expect_ready(&self, operation: &str) -> Result<()> {
        match self.status {
            ConnStatus::Ready => Ok(()),
            ConnStatus::Disconnected => Err(Error::Usage(format!(
                "cannot {operation}: connection is closed"
            ))),
            ConnStatus::ProcessingQuery => Err(Error::Usage(format!(
                "cannot {operation}: a result set is still open on this connection"
            ))),
        }
    }

    /// Convert a failure at an operation boundary: fatal errors tear the
    /// connection down, everything else passes through untouched.
    pub(crate) fn intercept(&mut self, err: Error) -> Error {
        if err.is_fatal() {
            if self.log_level >= LogLevel::Fatal {
                log::error!("connection failed: {err}");
            }
            self.teardown();
        }
        err
    }

    /// Read frames and feed the query machine until it reports an event.
    pub(crate) fn pump_query(&mut self, machine: &mut QueryMachine) -> Result<QueryEvent> {
        loop {
            self.read_frame()?;
            let msg = RawMessage::new(self.frame_tag, &self.frame_payload);
            if msg.is_async() {
                self.absorb_async()?;
                continue;
            }
            match machine.step(msg)? {
                QueryEvent::Continue => continue,
                event => return Ok(event),
            }
        }
    }

    /// Apply the end of a query run: adopt the ReadyForQuery status, return
    /// to `Ready`, and surface the run's retained server error, if any.
    pub(crate) fn finish_query_run(&mut self, machine: &mut QueryMachine) -> Result<()> {
        if let Some(status) = machine.transaction_status() {
            self.transaction_status = status;
        }
        self.status = ConnStatus::Ready;
        match machine.take_error() {
            Some(fields) => {
                let err = Error::Server(fields);
                if self.log_level >= LogLevel::Error {
                    log::error!("{err}");
                }
                Err(err)
            }
            None => Ok(()),
        }
    }

    fn begin_query(&mut self, sql: &str) -> Result<QueryMachine> {
        if self.log_level >= LogLevel::Command {
            log::debug!("query: {sql}");
        }

        self.write_buffer.clear();
        write_query(&mut self.write_buffer, sql);
        self.flush_write()?;
        self.status = ConnStatus::ProcessingQuery;

        let mut machine = QueryMachine::new();
        self.read_until_described(&mut machine)?;
        Ok(machine)
    }

    /// Execute a prepared statement through a fresh portal.
    pub(crate) fn start_portal(
        &mut self,
        statement: &str,
        columns: Vec<crate::protocol::backend::Column>,
        values: &[Value],
    ) -> Result<QueryMachine> {
        let portal = format!("portal{}", self.next_portal_id);
        self.next_portal_id += 1;

        if self.log_level >= LogLevel::Command {
            log::debug!("execute {statement} via {portal}");
        }

        let mut formats = Vec::with_capacity(values.len());
        let mut bodies = Vec::with_capacity(values.len());
        for value in values {
            let (format, body) = value.encode();
            formats.push(format);
            bodies.push(body);
        }

        self.write_buffer.clear();
        write_bind(&mut self.write_buffer, &portal, statement, &formats, &bodies, &[]);
        write_execute(&mut self.write_buffer, &portal, 0);
        write_close_portal(&mut self.write_buffer, &portal);
        write_sync(&mut self.write_buffer);
        self.flush_write()?;
        self.status = ConnStatus::ProcessingQuery;

        let mut machine = QueryMachine::with_columns(columns);
        self.read_until_described(&mut machine)?;
        Ok(machine)
    }

    /// Eagerly read until column metadata is installed, so the caller has
    /// field descriptors before pulling the first row. Runs that finish
    /// without metadata (commands, errors) are completed here.
    fn read_until_described(&mut self, machine: &mut QueryMachine) -> Result<()> {
        loop {
            match self.pump_query(machine)? {
                QueryEvent::Described | QueryEvent::Row => return Ok(()),
                QueryEvent::Finished => return self.finish_query_run(machine),
                QueryEvent::Continue => continue,
            }
        }
    }

    fn run_prepare(&mut self, sql: &str, param_types: &[Oid]) -> Result<Statement> {
        let name = format!("stmt{}", self.next_statement_id);
        self.next_statement_id += 1;

        if self.log_level >= LogLevel::Command {
            log::debug!("prepare {name}: {sql}");
        }

        self.write_buffer.clear();
        write_parse(&mut self.write_buffer, &name, sql, param_types);
        write_describe_statement(&mut self.write_buffer, &name);
        write_sync(&mut self.write_buffer);
        self.flush_write()?;

        let mut machine = PrepareMachine::new();
        loop {
            self.read_frame()?;
            let msg = RawMessage::new(self.frame_tag, &self.frame_payload);
            if msg.is_async() {
                self.absorb_async()?;
                continue;
            }
            match machine.step(msg)? {
                PrepareEvent::Continue => continue,
                PrepareEvent::Finished => break,
            }
        }

        if let Some(status) = machine.transaction_status() {
            self.transaction_status = status;
        }
        if let Some(fields) = machine.take_error() {
            let err = Error::Server(fields);
            if self.log_level >= LogLevel::Error {
                log::error!("{err}");
            }
            return Err(err);
        }

        Ok(Statement::new(
            self.id,
            name,
            sql.to_string(),
            machine.param_oids().to_vec(),
            machine.take_columns(),
        ))
    }

    /// Release a named statement on the server.
    pub(crate) fn close_statement(&mut self, name: &str) -> Result<()> {
        self.run_close_statement(name).map_err(|err| self.intercept(err))
    }

    fn run_close_statement(&mut self, name: &str) -> Result<()> {
        if self.log_level >= LogLevel::Command {
            log::debug!("close statement {name}");
        }

        self.write_buffer.clear();
        write_close_statement(&mut self.write_buffer, name);
        write_sync(&mut self.write_buffer);
        self.flush_write()?;

        let mut machine = QueryMachine::new();
        loop {
            if let QueryEvent::Finished = self.pump_query(&mut machine)? {
                break;
            }
        }
        self.finish_query_run(&mut machine)
    }

    /// Read one backend frame into the connection's frame buffer.
    fn read_frame(&mut self) -> Result<()> {
        let mut header = [0u8; 5];
        self.stream.read_exact(&mut header).map_err(Error::from_io)?;

        let len = i32::from_be_bytes([header[1], header[2], header[3], header[4]]);
        if len < 4 {
            return Err(Error::Protocol(format!("invalid message length {len}")));
        }

        let payload_len = (len - 4) as usize;
        self.frame_payload.clear();
        self.frame_payload.resize(payload_len, 0);
        self.stream
            .read_exact(&mut self.frame_payload)
            .map_err(Error::from_io)?;
        self.frame_tag = header[0];

        if self.log_level >= LogLevel::Verbose {
            log::trace!("recv {:?} ({payload_len} bytes)", header[0] as char);
        }
        Ok(())
    }

    /// Route a ParameterStatus, NoticeResponse or NotificationResponse.
    fn absorb_async(&mut self) -> Result<()> {
        match self.frame_tag {
            msg_type::PARAMETER_STATUS => {
                let status = ParameterStatus::parse(&self.frame_payload)?;
                let (name, value) = (status.name.to_string(), status.value.to_string());
                self.runtime_params.insert(name, value);
            }
            msg_type::NOTICE_RESPONSE => {
                let notice = NoticeResponse::parse(&self.frame_payload)?;
                if self.log_level >= LogLevel::Warning {
                    log::warn!("server notice: {}", notice.0);
                }
            }
            msg_type::NOTIFICATION_RESPONSE => {
                let raw = NotificationResponse::parse(&self.frame_payload)?;
                let notification = Notification {
                    pid: raw.pid,
                    channel: raw.channel.to_string(),
                    payload: raw.payload.to_string(),
                };
                self.notifications.push(notification);
            }
            other => {
                log::debug!("ignoring message {:?}", other as char);
            }
        }
        Ok(())
    }

    /// Discard frames until ReadyForQuery, without a flow machine. Used
    /// when closing a connection whose result set was leaked.
    fn drain_to_ready(&mut self) -> Result<()> {
        loop {
            self.read_frame()?;
            let msg = RawMessage::new(self.frame_tag, &self.frame_payload);
            if msg.is_async() {
                self.absorb_async()?;
                continue;
            }
            if self.frame_tag == msg_type::READY_FOR_QUERY {
                let ready = ReadyForQuery::parse(&self.frame_payload)?;
                self.transaction_status = ready.transaction_status()?;
                self.status = ConnStatus::Ready;
                return Ok(());
            }
        }
    }

    fn send_terminate(&mut self) -> Result<()> {
        if self.log_level >= LogLevel::Command {
            log::debug!("terminate");
        }
        self.write_buffer.clear();
        write_terminate(&mut self.write_buffer);
        let result = self.flush_write();
        self.teardown();
        result
    }

    /// Write out the pending request group. Called exactly at operation
    /// boundaries so the server sees each group whole.
    fn flush_write(&mut self) -> Result<()> {
        let stream = self.stream.get_mut();
        stream
            .write_all(&self.write_buffer)
            .map_err(Error::from_io)?;
        stream.flush().map_err(Error::from_io)?;
        self.write_buffer.clear();
        Ok(())
    }

    fn teardown(&mut self) {
        let _ = self.stream.get_ref().shutdown(Shutdown::Both);
        self.status = ConnStatus::Disconnected;
    }
}

impl Drop for Conn {
    fn drop(&mut self) {
        if self.status != ConnStatus::Disconnected {
            self.write_buffer.clear();
            write_terminate(&mut self.write_buffer);
            let stream = self.stream.get_mut();
            let _ = stream.write_all(&self.write_buffer);
            let _ = stream.flush();
        }
    }
}

impl std::fmt::Debug for Conn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conn")
            .field("status", &self.status)
            .field("transaction_status", &self.transaction_status)
            .field("backend_pid", &self.backend_key.map(|(pid, _)| pid))
            .finish_non_exhaustive()
    }
}
