//! Extended query protocol acknowledgements.

use crate::error::{Error, Result};
use crate::protocol::codec::{read_i16, read_u32};
use crate::protocol::types::Oid;

macro_rules! empty_message {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy)]
        pub struct $name;

        impl $name {
            pub fn parse(payload: &[u8]) -> Result<Self> {
                if payload.is_empty() {
                    Ok(Self)
                } else {
                    Err(Error::Protocol(format!(
                        concat!(stringify!($name), ": unexpected {}-byte payload"),
                        payload.len()
                    )))
                }
            }
        }
    };
}

empty_message! {
    /// ParseComplete: the statement was parsed and stored.
    ParseComplete
}

empty_message! {
    /// BindComplete: the portal was created.
    BindComplete
}

empty_message! {
    /// CloseComplete: the statement or portal was released.
    CloseComplete
}

empty_message! {
    /// NoData: the described statement returns no rows.
    NoData
}

empty_message! {
    /// PortalSuspended: the row limit of an Execute was reached.
    PortalSuspended
}

/// ParameterDescription: declared types of a statement's parameters.
#[derive(Debug, Clone)]
pub struct ParameterDescription {
    oids: Vec<Oid>,
}

impl ParameterDescription {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let (count, mut rest) = read_i16(payload)?;
        let count = usize::try_from(count)
            .map_err(|_| Error::Protocol(format!("ParameterDescription: bad count {count}")))?;

        let mut oids = Vec::with_capacity(count);
        for _ in 0..count {
            let (oid, remaining) = read_u32(rest)?;
            oids.push(oid);
            rest = remaining;
        }
        Ok(Self { oids })
    }

    pub fn oids(&self) -> &[Oid] {
        &self.oids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_messages_reject_payload() {
        assert!(ParseComplete::parse(&[]).is_ok());
        assert!(BindComplete::parse(&[1]).is_err());
    }

    #[test]
    fn parameter_description() {
        let mut payload = 2_i16.to_be_bytes().to_vec();
        payload.extend_from_slice(&23_u32.to_be_bytes());
        payload.extend_from_slice(&25_u32.to_be_bytes());

        let desc = ParameterDescription::parse(&payload).unwrap();
        assert_eq!(desc.oids(), &[23, 25]);
    }
}
