//! ErrorResponse and NoticeResponse messages.

use crate::error::{Error, Result, ServerError};
use crate::protocol::codec::read_cstr;

/// Protocol field-type bytes for error and notice payloads.
mod field {
    pub const SEVERITY: u8 = b'S';
    pub const CODE: u8 = b'C';
    pub const MESSAGE: u8 = b'M';
    pub const DETAIL: u8 = b'D';
    pub const HINT: u8 = b'H';
    pub const POSITION: u8 = b'P';
}

/// Parse the field-coded body shared by ErrorResponse and NoticeResponse.
fn parse_fields(payload: &[u8]) -> Result<ServerError> {
    let mut out = ServerError::default();
    let mut data = payload;

    while let Some((&kind, rest)) = data.split_first() {
        if kind == 0 {
            break;
        }
        let (value, rest) = read_cstr(rest)?;
        match kind {
            field::SEVERITY => out.severity = Some(value.to_string()),
            field::CODE => out.code = Some(value.to_string()),
            field::MESSAGE => out.message = Some(value.to_string()),
            field::DETAIL => out.detail = Some(value.to_string()),
            field::HINT => out.hint = Some(value.to_string()),
            field::POSITION => out.position = value.parse().ok(),
            _ => out.other.push((kind, value.to_string())),
        }
        data = rest;
    }

    Ok(out)
}

/// ErrorResponse: the server rejected or aborted the current request.
#[derive(Debug, Clone)]
pub struct ErrorResponse(pub ServerError);

impl ErrorResponse {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        Ok(Self(parse_fields(payload)?))
    }

    pub fn into_error(self) -> Error {
        Error::Server(self.0)
    }
}

/// NoticeResponse: a non-fatal warning or informational message.
#[derive(Debug, Clone)]
pub struct NoticeResponse(pub ServerError);

impl NoticeResponse {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        Ok(Self(parse_fields(payload)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(fields: &[(u8, &str)]) -> Vec<u8> {
        let mut out = Vec::new();
        for (kind, value) in fields {
            out.push(*kind);
            out.extend_from_slice(value.as_bytes());
            out.push(0);
        }
        out.push(0);
        out
    }

    #[test]
    fn named_fields_extracted() {
        let payload = encode(&[
            (b'S', "ERROR"),
            (b'C', "42P01"),
            (b'M', "relation \"t\" does not exist"),
            (b'P', "15"),
            (b'R', "parserOpenTable"),
        ]);

        let err = ErrorResponse::parse(&payload).unwrap().0;
        assert_eq!(err.severity.as_deref(), Some("ERROR"));
        assert_eq!(err.code.as_deref(), Some("42P01"));
        assert_eq!(err.position, Some(15));
        assert_eq!(err.other, vec![(b'R', "parserOpenTable".to_string())]);
    }

    #[test]
    fn empty_payload_is_empty_error() {
        let err = ErrorResponse::parse(&[0]).unwrap().0;
        assert_eq!(err.severity, None);
        assert_eq!(err.message, None);
    }
}
