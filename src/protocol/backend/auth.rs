//! Startup, authentication and session-status messages.

use zerocopy::byteorder::big_endian::U32 as U32BE;
use zerocopy::{FromBytes, Immutable, KnownLayout};

use crate::error::{Error, Result};
use crate::protocol::codec::{read_cstr, read_i32, read_u32};
use crate::protocol::types::TransactionStatus;

/// Authentication request sub-codes.
mod auth_code {
    pub const OK: i32 = 0;
    pub const CLEARTEXT_PASSWORD: i32 = 3;
    pub const MD5_PASSWORD: i32 = 5;
}

/// An Authentication message from the server.
///
/// Only the methods a 7.4-era server negotiates are understood; anything
/// else surfaces its sub-code so the handshake can fail with a clear error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthenticationRequest {
    /// Authentication succeeded
    Ok,
    /// Server wants the password in cleartext
    CleartextPassword,
    /// Server wants an MD5 digest computed with this salt
    Md5Password { salt: [u8; 4] },
    /// An authentication method this driver does not speak
    Unsupported(i32),
}

impl AuthenticationRequest {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let (code, rest) = read_i32(payload)?;
        match code {
            auth_code::OK => Ok(AuthenticationRequest::Ok),
            auth_code::CLEARTEXT_PASSWORD => Ok(AuthenticationRequest::CleartextPassword),
            auth_code::MD5_PASSWORD => {
                let salt: [u8; 4] = rest
                    .get(..4)
                    .and_then(|b| b.try_into().ok())
                    .ok_or_else(|| Error::Protocol("MD5Password request without salt".into()))?;
                Ok(AuthenticationRequest::Md5Password { salt })
            }
            other => Ok(AuthenticationRequest::Unsupported(other)),
        }
    }
}

/// BackendKeyData: process id and secret key for out-of-band cancellation.
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct BackendKeyData {
    pid: U32BE,
    secret_key: U32BE,
}

impl BackendKeyData {
    pub fn parse(payload: &[u8]) -> Result<&Self> {
        Self::ref_from_bytes(payload)
            .map_err(|_| Error::Protocol(format!("BackendKeyData: bad length {}", payload.len())))
    }

    pub fn process_id(&self) -> u32 {
        self.pid.get()
    }

    pub fn secret(&self) -> u32 {
        self.secret_key.get()
    }
}

/// ParameterStatus: a server runtime parameter changed or was announced.
#[derive(Debug, Clone)]
pub struct ParameterStatus<'a> {
    pub name: &'a str,
    pub value: &'a str,
}

impl<'a> ParameterStatus<'a> {
    pub fn parse(payload: &'a [u8]) -> Result<Self> {
        let (name, rest) = read_cstr(payload)?;
        let (value, _) = read_cstr(rest)?;
        Ok(Self { name, value })
    }
}

/// ReadyForQuery: the server finished a request cycle.
///
/// Carries the transaction status as a single byte: 'I' idle, 'T' in
/// transaction, 'E' in failed transaction.
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct ReadyForQuery {
    status: u8,
}

impl ReadyForQuery {
    pub fn parse(payload: &[u8]) -> Result<&Self> {
        Self::ref_from_bytes(payload)
            .map_err(|_| Error::Protocol(format!("ReadyForQuery: bad length {}", payload.len())))
    }

    pub fn transaction_status(&self) -> Result<TransactionStatus> {
        TransactionStatus::from_byte(self.status).ok_or_else(|| {
            Error::Protocol(format!(
                "ReadyForQuery: unknown transaction status {:?}",
                self.status as char
            ))
        })
    }
}

/// NotificationResponse: a NOTIFY delivered to this session.
#[derive(Debug, Clone)]
pub struct NotificationResponse<'a> {
    pub pid: u32,
    pub channel: &'a str,
    pub payload: &'a str,
}

impl<'a> NotificationResponse<'a> {
    pub fn parse(payload: &'a [u8]) -> Result<Self> {
        let (pid, rest) = read_u32(payload)?;
        let (channel, rest) = read_cstr(rest)?;
        let (body, _) = read_cstr(rest)?;
        Ok(Self {
            pid,
            channel,
            payload: body,
        })
    }
}
