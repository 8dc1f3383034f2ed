//! PostgreSQL backend (server → client) messages.

pub mod auth;
pub mod error;
pub mod extended;
pub mod query;

pub use auth::{
    AuthenticationRequest, BackendKeyData, NotificationResponse, ParameterStatus, ReadyForQuery,
};
pub use error::{ErrorResponse, NoticeResponse};
pub use extended::{
    BindComplete, CloseComplete, NoData, ParameterDescription, ParseComplete, PortalSuspended,
};
pub use query::{Column, CommandComplete, DataRow, EmptyQueryResponse, RowDescription};

/// Backend message tags.
pub mod msg_type {
    /// Authentication request family
    pub const AUTHENTICATION: u8 = b'R';
    /// BackendKeyData
    pub const BACKEND_KEY_DATA: u8 = b'K';
    /// ParameterStatus
    pub const PARAMETER_STATUS: u8 = b'S';
    /// ReadyForQuery
    pub const READY_FOR_QUERY: u8 = b'Z';
    /// RowDescription
    pub const ROW_DESCRIPTION: u8 = b'T';
    /// DataRow
    pub const DATA_ROW: u8 = b'D';
    /// CommandComplete
    pub const COMMAND_COMPLETE: u8 = b'C';
    /// EmptyQueryResponse
    pub const EMPTY_QUERY_RESPONSE: u8 = b'I';
    /// ErrorResponse
    pub const ERROR_RESPONSE: u8 = b'E';
    /// NoticeResponse
    pub const NOTICE_RESPONSE: u8 = b'N';
    /// NotificationResponse
    pub const NOTIFICATION_RESPONSE: u8 = b'A';
    /// ParseComplete
    pub const PARSE_COMPLETE: u8 = b'1';
    /// BindComplete
    pub const BIND_COMPLETE: u8 = b'2';
    /// CloseComplete
    pub const CLOSE_COMPLETE: u8 = b'3';
    /// ParameterDescription
    pub const PARAMETER_DESCRIPTION: u8 = b't';
    /// NoData
    pub const NO_DATA: u8 = b'n';
    /// PortalSuspended
    pub const PORTAL_SUSPENDED: u8 = b's';
}

/// One framed message from the backend: tag byte plus payload.
///
/// Payloads are parsed on demand by whichever state machine consumes them.
#[derive(Debug, Clone, Copy)]
pub struct RawMessage<'a> {
    pub tag: u8,
    pub payload: &'a [u8],
}

impl<'a> RawMessage<'a> {
    pub fn new(tag: u8, payload: &'a [u8]) -> Self {
        Self { tag, payload }
    }

    /// True for messages that may arrive at any point in a session:
    /// ParameterStatus, NoticeResponse and NotificationResponse.
    pub fn is_async(&self) -> bool {
        matches!(
            self.tag,
            msg_type::PARAMETER_STATUS | msg_type::NOTICE_RESPONSE | msg_type::NOTIFICATION_RESPONSE
        )
    }
}
