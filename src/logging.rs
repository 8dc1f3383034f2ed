//! Per-connection log verbosity.
//!
//! Emission goes through the `log` crate facade; the connection's
//! [`LogLevel`] decides what gets forwarded at all, so an application can
//! keep its global logger wide open and still silence a chatty connection.

/// Controls what a connection writes to the log.
///
/// Levels are cumulative: `Warning` also emits everything `Error` would.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    /// Log nothing.
    #[default]
    Nothing,
    /// Fatal errors only.
    Fatal,
    /// All errors.
    Error,
    /// Errors and server warnings/notices.
    Warning,
    /// Errors, warnings and sent commands.
    Command,
    /// Everything above plus protocol-level debug info.
    Debug,
    /// Everything, including per-message traffic.
    Verbose,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LogLevel::Nothing => "nothing",
            LogLevel::Fatal => "fatal",
            LogLevel::Error => "error",
            LogLevel::Warning => "warning",
            LogLevel::Command => "command",
            LogLevel::Debug => "debug",
            LogLevel::Verbose => "verbose",
        };
        f.write_str(name)
    }
}
