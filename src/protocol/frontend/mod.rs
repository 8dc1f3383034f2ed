//! PostgreSQL frontend (client → server) messages.

pub mod auth;
pub mod extended;
pub mod simple;
pub mod startup;

pub use auth::{md5_password, write_password};
pub use extended::{
    write_bind, write_close_portal, write_close_statement, write_describe_statement,
    write_execute, write_parse, write_sync,
};
pub use simple::write_query;
pub use startup::{write_startup, write_terminate};

/// Frontend message tags.
pub mod msg_type {
    /// PasswordMessage (all authentication responses use 'p')
    pub const PASSWORD: u8 = b'p';
    /// Query (simple query protocol)
    pub const QUERY: u8 = b'Q';
    /// Parse (extended query protocol)
    pub const PARSE: u8 = b'P';
    /// Bind
    pub const BIND: u8 = b'B';
    /// Execute
    pub const EXECUTE: u8 = b'E';
    /// Describe
    pub const DESCRIBE: u8 = b'D';
    /// Close
    pub const CLOSE: u8 = b'C';
    /// Sync
    pub const SYNC: u8 = b'S';
    /// Terminate
    pub const TERMINATE: u8 = b'X';
}
