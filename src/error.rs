//! Error types for the link tester.
//!
//! Only channel-open failures and settings/report file errors are meant to
//! end a run. Everything else is absorbed by the component that observed it
//! and turned into an absent value or a `Loss` outcome.

/// The error type for all channel, mode and file operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The serial port could not be opened.
    #[error("failed to open port '{port}': {source}")]
    ChannelOpen {
        port: String,
        #[source]
        source: serialport::Error,
    },

    /// A serial port operation failed after the port was opened.
    #[error("serial error: {0}")]
    Serial(#[from] serialport::Error),

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The channel was used after it had been closed.
    #[error("channel closed")]
    Closed,

    /// A modem command was issued while the session was not in command mode.
    #[error("not in command mode")]
    NotInCommandMode,

    /// A spreading factor outside 7..=12.
    #[error("invalid spreading factor: {0}")]
    InvalidSpreadingFactor(u8),

    /// A settings file could not be read.
    #[error("settings error: {0}")]
    Settings(String),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;
