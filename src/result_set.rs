//! Streaming result cursor.

use crate::conn::{Conn, ConnStatus};
use crate::error::{Error, Result};
use crate::logging::LogLevel;
use crate::protocol::backend::{Column, DataRow};
use crate::row::FromRow;
use crate::state::query::{QueryEvent, QueryMachine};

/// Lazily streamed rows of one query.
///
/// The cursor exclusively borrows its connection: while it is open the
/// connection is in [`ConnStatus::ProcessingQuery`] and accepts no other
/// operation. Dropping the cursor drains the remaining messages so the
/// connection comes back synchronized.
pub struct ResultSet<'conn> {
    conn: &'conn mut Conn,
    machine: QueryMachine,
    row_payload: Option<Vec<u8>>,
}

impl<'conn> ResultSet<'conn> {
    pub(crate) fn new(conn: &'conn mut Conn, machine: QueryMachine) -> Self {
        Self {
            conn,
            machine,
            row_payload: None,
        }
    }

    /// Column metadata, available before the first row.
    ///
    /// Empty for statements that return no rows.
    pub fn columns(&self) -> &[Column] {
        self.machine.columns()
    }

    /// Advance to the next row. Returns `false` once the result is
    /// exhausted; rows-affected and the connection's transaction status
    /// are final from then on.
    ///
    /// A server error that interrupted the stream surfaces here, after
    /// the run has been drained to its terminator.
    pub fn next(&mut self) -> Result<bool> {
        self.row_payload = None;
        if self.machine.is_finished() {
            return Ok(false);
        }

        loop {
            match self.conn.pump_query(&mut self.machine) {
                Ok(QueryEvent::Row) => {
                    self.row_payload = Some(self.conn.frame_payload().to_vec());
                    return Ok(true);
                }
                Ok(QueryEvent::Finished) => {
                    self.conn.finish_query_run(&mut self.machine)?;
                    return Ok(false);
                }
                Ok(QueryEvent::Described) | Ok(QueryEvent::Continue) => continue,
                Err(err) => return Err(self.conn.intercept(err)),
            }
        }
    }

    /// Decode the current row into a tuple of Rust values.
    ///
    /// NULL fields need `Option<_>` destinations. Fails unless a prior
    /// [`next`](Self::next) returned `true`.
    pub fn scan<'row, R: FromRow<'row>>(&'row self) -> Result<R> {
        let payload = self
            .row_payload
            .as_deref()
            .ok_or_else(|| Error::Usage("no current row to scan".into()))?;
        let row = DataRow::parse(payload)?;
        R::from_row(self.machine.columns(), row)
    }

    /// Fetch the next row and decode it, `None` at the end of the stream.
    pub fn scan_next<R: for<'row> FromRow<'row>>(&mut self) -> Result<Option<R>> {
        if self.next()? {
            Ok(Some(self.scan()?))
        } else {
            Ok(None)
        }
    }

    /// Rows affected, parsed from the final CommandComplete tag. Zero for
    /// tags without a count; final once the cursor is exhausted or closed.
    pub fn rows_affected(&self) -> u64 {
        self.machine.rows_affected()
    }

    /// True once the terminating ReadyForQuery has been consumed.
    pub fn is_complete(&self) -> bool {
        self.machine.is_finished()
    }

    /// Drain the remaining messages and release the connection.
    ///
    /// Idempotent. Surfaces the run's retained server error, if any.
    pub fn close(&mut self) -> Result<()> {
        self.row_payload = None;
        while !self.machine.is_finished() {
            match self.conn.pump_query(&mut self.machine) {
                Ok(QueryEvent::Finished) => {
                    if self.conn.log_level() >= LogLevel::Debug {
                        log::debug!("result set closed, {} rows affected", self.rows_affected());
                    }
                    return self.conn.finish_query_run(&mut self.machine);
                }
                Ok(_) => continue,
                Err(err) => return Err(self.conn.intercept(err)),
            }
        }
        Ok(())
    }
}

impl Drop for ResultSet<'_> {
    fn drop(&mut self) {
        if !self.machine.is_finished() && self.conn.status() == ConnStatus::ProcessingQuery {
            let _ = self.close();
        }
    }
}

impl std::fmt::Debug for ResultSet<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultSet")
            .field("columns", &self.machine.columns().len())
            .field("complete", &self.machine.is_finished())
            .finish_non_exhaustive()
    }
}
