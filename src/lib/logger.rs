//! Generic logging facility with a default implementation.

use crate::context::Context;

/// Prefix applied to every message this program emits.
pub const LOG_PREFIX: &str = "[make]: ";

/// Generic trait any logger must implement. Informational messages (command echo, up-to-date
/// notices) go to the "out" channel; warnings and errors go to the "err" channel.
pub trait Logger {
    /// Write an informational message somewhere.
    fn write_out(&self, msg: String);

    /// Write a diagnostic message somewhere.
    fn write_err(&self, msg: String);

    /// Log an informational message.
    fn info(&self, msg: impl AsRef<str>) {
        self.write_out(format!("{LOG_PREFIX}{}", msg.as_ref()));
    }

    /// Log a warning.
    fn warn(&self, msg: impl AsRef<str>, context: Option<&Context>) {
        self.write_err(self.format_log(format!("warning: {}", msg.as_ref()), context));
    }

    /// Log an error.
    fn error(&self, msg: impl AsRef<str>, context: Option<&Context>) {
        self.write_err(self.format_log(msg.as_ref(), context));
    }

    /// Formatter for warning/error messages: prefix, message, context label, and the offending
    /// line when one is known.
    fn format_log(&self, msg: impl AsRef<str>, context: Option<&Context>) -> String {
        let context_label = context
            .and_then(|c| c.label())
            .map(|l| format!(" ({l})"))
            .unwrap_or_default();
        let context_line = context
            .and_then(|c| c.display_line())
            .map(|l| format!("\n{l}"))
            .unwrap_or_default();

        format!(
            "{LOG_PREFIX}{}{context_label}{context_line}",
            msg.as_ref()
        )
    }
}

/// Uses the default implementation and outputs to STDOUT/STDERR.
pub struct DefaultLogger {}

impl Logger for DefaultLogger {
    fn write_out(&self, msg: String) {
        println!("{}", msg);
    }

    fn write_err(&self, msg: String) {
        eprintln!("{}", msg);
    }
}
