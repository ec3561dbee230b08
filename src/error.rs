use thiserror::Error;

#[derive(Error, Debug)]
pub enum WrapperError {
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("D-Bus error: {0}")]
    DBus(#[from] zbus::Error),

    #[error("Cannot connect to the X server: {0}")]
    X11Connect(#[from] x11rb::errors::ConnectError),

    #[error("X11 connection error: {0}")]
    X11Connection(#[from] x11rb::errors::ConnectionError),

    #[error("X11 request failed: {0}")]
    X11Reply(#[from] x11rb::errors::ReplyError),

    #[error("Bad window ID: {0}")]
    InvalidWindow(crate::events::WindowHandle),

    #[error("Invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Invalid playtime log line {line}: {reason}")]
    InvalidLogLine { line: usize, reason: String },

    #[error("Hook not found: {0:?}")]
    UnknownHook(String),

    #[error("Failed to launch {program:?}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WrapperError {
    pub fn invalid_pattern<T>(pattern: &str, reason: impl Into<String>) -> Result<T> {
        Err(WrapperError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.into(),
        })
    }
}

pub type Result<T> = std::result::Result<T, WrapperError>;

#[macro_export]
macro_rules! wrapper_error {
    (unknown_hook, $($arg:tt)*) => {
        $crate::error::WrapperError::UnknownHook(format!($($arg)*))
    };
    (internal, $($arg:tt)*) => {
        $crate::error::WrapperError::Internal(format!($($arg)*))
    };
}
