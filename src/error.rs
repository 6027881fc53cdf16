use std::fmt;

/// Error type produced by a single collection task.
///
/// Every fetch/parse boundary in the exporter returns a `Result` with this
/// error instead of panicking or silently swallowing failures; the scheduler
/// catches it at the task boundary, logs it with the task name, and moves on.
#[derive(Debug)]
pub enum TaskError {
    /// Transport-level failure: connection refused, timeout, non-2xx status.
    Transport(String),
    /// The response arrived but could not be decoded into the expected shape.
    Decode(String),
    /// An external CLI invocation failed (spawn error or non-zero exit).
    Subprocess(String),
    /// An expected field or sub-structure was absent from an otherwise
    /// well-formed response.
    Missing(&'static str),
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskError::Transport(msg) => write!(f, "transport error: {msg}"),
            TaskError::Decode(msg) => write!(f, "decode error: {msg}"),
            TaskError::Subprocess(msg) => write!(f, "subprocess error: {msg}"),
            TaskError::Missing(what) => write!(f, "missing data: {what}"),
        }
    }
}

impl std::error::Error for TaskError {}
