use std::{fmt, time::Duration};

/// Core error type for the notifier.
///
/// Adapter crates map their specific errors (HTTP, Telegram, subprocess) into
/// this type so the poller can classify every failure with [`ErrorKind`] and
/// decide whether state may advance.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("timed out after {after:?}: {what}")]
    Timeout { what: String, after: Duration },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("malformed upstream response: {0}")]
    Malformed(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("already tracked: {0}")]
    Duplicate(String),

    #[error("limit of {limit} tracked channels reached")]
    LimitExceeded { limit: usize },

    #[error("payload of {size} bytes exceeds the {limit} byte limit")]
    Oversize { size: u64, limit: u64 },

    #[error("corrupt state file: {0}")]
    CorruptState(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Classification used in logs and for retry decisions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    FatalConfig,
    TransientNetwork,
    NotFound,
    InvalidInput,
    Duplicate,
    LimitExceeded,
    Oversize,
    CorruptState,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::FatalConfig => "fatal_config",
            ErrorKind::TransientNetwork => "transient_network",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Duplicate => "duplicate",
            ErrorKind::LimitExceeded => "limit_exceeded",
            ErrorKind::Oversize => "oversize",
            ErrorKind::CorruptState => "corrupt_state",
            ErrorKind::Internal => "internal",
        }
    }

    /// Worth retrying on the next cycle without operator involvement.
    pub fn is_transient(self) -> bool {
        matches!(self, ErrorKind::TransientNetwork | ErrorKind::NotFound)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) => ErrorKind::FatalConfig,
            Error::Network(_) | Error::Timeout { .. } => ErrorKind::TransientNetwork,
            // A malformed feed or an empty listing is "nothing usable right now".
            Error::NotFound(_) | Error::Malformed(_) => ErrorKind::NotFound,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::Duplicate(_) => ErrorKind::Duplicate,
            Error::LimitExceeded { .. } => ErrorKind::LimitExceeded,
            Error::Oversize { .. } => ErrorKind::Oversize,
            Error::CorruptState(_) | Error::Json(_) => ErrorKind::CorruptState,
            Error::Io(_) | Error::External(_) => ErrorKind::Internal,
        }
    }

    pub fn timeout(what: impl Into<String>, after: Duration) -> Self {
        Error::Timeout {
            what: what.into(),
            after,
        }
    }
}
