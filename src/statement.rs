//! Prepared statements.

use crate::conn::Conn;
use crate::error::{Error, Result};
use crate::protocol::backend::Column;
use crate::protocol::types::Oid;
use crate::result_set::ResultSet;
use crate::value::Value;

/// A server-side prepared statement.
///
/// Created by [`Conn::prepare`]; holds the generated wire name (unique for
/// the connection's lifetime), the parameter types the server described,
/// and the result columns. Executing or closing it hands the connection
/// back in explicitly, and both verify the statement belongs to that
/// connection. [`close`](Self::close) consumes the statement, so a closed
/// statement cannot be executed again.
pub struct Statement {
    conn_id: u64,
    name: String,
    sql: String,
    param_oids: Vec<Oid>,
    columns: Vec<Column>,
}

impl Statement {
    pub(crate) fn new(
        conn_id: u64,
        name: String,
        sql: String,
        param_oids: Vec<Oid>,
        columns: Vec<Column>,
    ) -> Self {
        Self {
            conn_id,
            name,
            sql,
            param_oids,
            columns,
        }
    }

    /// The generated wire name, e.g. `stmt0`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The SQL text this statement was prepared from.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Parameter types as described by the server.
    pub fn param_types(&self) -> &[Oid] {
        &self.param_oids
    }

    /// Result columns; empty for statements that return no rows.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Bind `values` to the placeholders and execute.
    ///
    /// Runs Bind/Execute/Close(portal)/Sync as one flushed group against a
    /// fresh portal, and streams the result like a simple query.
    pub fn execute<'conn>(
        &self,
        conn: &'conn mut Conn,
        values: &[Value],
    ) -> Result<ResultSet<'conn>> {
        self.check_conn(conn)?;
        conn.expect_ready("execute statement")?;

        if values.len() != self.param_oids.len() {
            return Err(Error::Usage(format!(
                "statement {} takes {} parameters, {} given",
                self.name,
                self.param_oids.len(),
                values.len()
            )));
        }

        match conn.start_portal(&self.name, self.columns.clone(), values) {
            Ok(machine) => Ok(ResultSet::new(conn, machine)),
            Err(err) => Err(conn.intercept(err)),
        }
    }

    /// Release the statement on the server.
    pub fn close(self, conn: &mut Conn) -> Result<()> {
        self.check_conn(conn)?;
        conn.expect_ready("close statement")?;
        conn.close_statement(&self.name)
    }

    fn check_conn(&self, conn: &Conn) -> Result<()> {
        if self.conn_id != conn.id() {
            return Err(Error::Usage(format!(
                "statement {} belongs to a different connection",
                self.name
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement")
            .field("name", &self.name)
            .field("sql", &self.sql)
            .field("params", &self.param_oids.len())
            .finish()
    }
}
