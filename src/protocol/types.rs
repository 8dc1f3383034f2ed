//! Common PostgreSQL wire protocol types.

/// PostgreSQL Object Identifier (OID).
pub type Oid = u32;

/// Well-known type OIDs from `pg_type.h`.
pub mod oid {
    use super::Oid;

    pub const BOOL: Oid = 16;
    pub const BYTEA: Oid = 17;
    pub const CHAR: Oid = 18;
    pub const INT8: Oid = 20;
    pub const INT2: Oid = 21;
    pub const INT4: Oid = 23;
    pub const TEXT: Oid = 25;
    pub const FLOAT4: Oid = 700;
    pub const FLOAT8: Oid = 701;
    pub const VARCHAR: Oid = 1043;
    pub const DATE: Oid = 1082;
    pub const TIME: Oid = 1083;
    pub const TIMESTAMP: Oid = 1114;
    pub const TIMESTAMPTZ: Oid = 1184;
    pub const NUMERIC: Oid = 1700;
}

/// Data format code used for parameters and result fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i16)]
pub enum FormatCode {
    /// Human-readable UTF-8 text
    #[default]
    Text = 0,
    /// Type-specific packed representation
    Binary = 1,
}

impl FormatCode {
    /// Decode a wire format code; unknown values fall back to text.
    pub fn from_i16(value: i16) -> Self {
        match value {
            1 => FormatCode::Binary,
            _ => FormatCode::Text,
        }
    }
}

/// Transaction status byte carried by every ReadyForQuery message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum TransactionStatus {
    /// Not in a transaction block
    #[default]
    Idle = b'I',
    /// In a transaction block
    InTransaction = b'T',
    /// In a failed transaction block; queries rejected until rollback
    Failed = b'E',
}

impl TransactionStatus {
    /// Decode the status byte of a ReadyForQuery message.
    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            b'I' => Some(TransactionStatus::Idle),
            b'T' => Some(TransactionStatus::InTransaction),
            b'E' => Some(TransactionStatus::Failed),
            _ => None,
        }
    }

    /// True while inside a transaction block, failed or not.
    pub fn in_transaction(self) -> bool {
        !matches!(self, TransactionStatus::Idle)
    }

    /// True if the transaction block has failed.
    pub fn is_failed(self) -> bool {
        matches!(self, TransactionStatus::Failed)
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TransactionStatus::Idle => "not in transaction",
            TransactionStatus::InTransaction => "in transaction",
            TransactionStatus::Failed => "in failed transaction",
        };
        f.write_str(name)
    }
}
