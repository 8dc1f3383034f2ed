//! A blocking PostgreSQL frontend library.
//!
//! pgsync speaks the v3 wire protocol to servers of version 7.4 and later
//! over TCP. One connection has one owner: queries, prepared statements,
//! transactions and savepoints all run strictly in sequence, and a live
//! result set exclusively borrows its connection until it is drained.
//!
//! # Design
//!
//! - **Sans-I/O state machines**: each protocol flow (startup, query,
//!   prepare) is a machine that consumes one backend message per step;
//!   the blocking socket loop lives in [`Conn`] alone.
//! - **Synchronized error handling**: the first server error of a run is
//!   retained while the rest of the run is drained to ReadyForQuery, so an
//!   error never leaves the connection out of sync.
//! - **Lazy result cursors**: [`ResultSet`] pulls rows from the socket on
//!   demand and drains itself when dropped.
//!
//! # Example
//!
//! ```no_run
//! use pgsync::{Conn, LogLevel};
//!
//! fn main() -> pgsync::Result<()> {
//!     let mut conn = Conn::connect("host=localhost user=alice dbname=test", LogLevel::Warning)?;
//!
//!     {
//!         let mut rows = conn.query("SELECT id, label FROM items")?;
//!         while rows.next()? {
//!             let (id, label): (i32, String) = rows.scan()?;
//!             println!("{id}: {label}");
//!         }
//!     } // dropping the cursor drains it
//!
//!     conn.close()?;
//!     Ok(())
//! }
//! ```

pub mod conn;
pub mod error;
pub mod logging;
pub mod opts;
pub mod protocol;
pub mod result_set;
pub mod row;
pub mod state;
pub mod statement;
pub mod transaction;
pub mod value;

pub use conn::{Conn, ConnStatus, Notification};
pub use error::{Error, Result, ServerError};
pub use logging::LogLevel;
pub use opts::Opts;
pub use protocol::backend::Column;
pub use protocol::types::{FormatCode, Oid, TransactionStatus};
pub use result_set::ResultSet;
pub use row::{FromRow, FromWireValue};
pub use statement::Statement;
pub use transaction::IsolationLevel;
pub use value::Value;
