//! Scoped transactions and savepoints.

use crate::conn::Conn;
use crate::error::{Error, Result};
use crate::logging::LogLevel;
use crate::protocol::types::TransactionStatus;

/// Transaction isolation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    #[default]
    ReadCommitted,
    Serializable,
}

impl IsolationLevel {
    /// The SQL spelling used in `SET TRANSACTION ISOLATION LEVEL`.
    pub fn as_sql(self) -> &'static str {
        match self {
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

impl std::fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl Conn {
    /// Run `body` inside a transaction.
    ///
    /// If no transaction is in progress one is started at the given
    /// isolation level, committed when `body` succeeds and rolled back when
    /// it fails. If a transaction is already active, `body` simply runs
    /// inside it and the enclosing scope keeps control of commit/rollback.
    /// Fails immediately when the connection is in a failed transaction.
    pub fn with_transaction<T, F>(&mut self, isolation: IsolationLevel, body: F) -> Result<T>
    where
        F: FnOnce(&mut Conn) -> Result<T>,
    {
        let entry_status = self.transaction_status();
        if entry_status.is_failed() {
            return Err(Error::Usage("error in transaction".into()));
        }
        let opened = entry_status == TransactionStatus::Idle;

        if opened {
            let begin = self.execute(&format!(
                "BEGIN; SET TRANSACTION ISOLATION LEVEL {};",
                isolation.as_sql()
            ));
            if let Err(err) = begin {
                // SET may fail after BEGIN already took effect.
                if self.transaction_status().in_transaction() {
                    let _ = self.execute("ROLLBACK;");
                }
                return Err(err);
            }
        }

        let outcome = body(self).and_then(|value| {
            if self.transaction_status().is_failed() {
                Err(Error::Usage("error in transaction".into()))
            } else {
                Ok(value)
            }
        });

        match outcome {
            Ok(value) => {
                if opened && self.transaction_status() == TransactionStatus::InTransaction {
                    self.execute("COMMIT;")?;
                }
                Ok(value)
            }
            Err(err) => {
                if opened {
                    // Surface the body's error, not a rollback failure.
                    if let Err(rollback_err) = self.execute("ROLLBACK;") {
                        if self.log_level() >= LogLevel::Error {
                            log::error!("rollback failed: {rollback_err}");
                        }
                    }
                }
                Err(err)
            }
        }
    }

    /// Run `body` under a savepoint inside the active transaction.
    ///
    /// On failure the transaction is rolled back to the savepoint and the
    /// error surfaced; on success the savepoint is left in place for the
    /// enclosing scope. Without an active transaction this is
    /// [`with_transaction`](Self::with_transaction); in a failed
    /// transaction it fails immediately.
    pub fn with_savepoint<T, F>(&mut self, isolation: IsolationLevel, body: F) -> Result<T>
    where
        F: FnOnce(&mut Conn) -> Result<T>,
    {
        match self.transaction_status() {
            TransactionStatus::Failed => Err(Error::Usage("error in transaction".into())),
            TransactionStatus::Idle => self.with_transaction(isolation, body),
            TransactionStatus::InTransaction => {
                let name = self.next_savepoint_name();
                self.execute(&format!("SAVEPOINT {name};"))?;

                let outcome = body(self).and_then(|value| {
                    if self.transaction_status().is_failed() {
                        Err(Error::Usage("error in transaction".into()))
                    } else {
                        Ok(value)
                    }
                });

                match outcome {
                    Ok(value) => Ok(value),
                    Err(err) => {
                        if let Err(rollback_err) = self.execute(&format!("ROLLBACK TO {name};")) {
                            if self.log_level() >= LogLevel::Error {
                                log::error!("rollback to {name} failed: {rollback_err}");
                            }
                        }
                        Err(err)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::IsolationLevel;

    #[test]
    fn isolation_sql_spelling() {
        assert_eq!(IsolationLevel::ReadCommitted.as_sql(), "READ COMMITTED");
        assert_eq!(IsolationLevel::Serializable.as_sql(), "SERIALIZABLE");
    }
}
