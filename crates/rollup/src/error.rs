use std::fmt;

#[derive(Debug)]
pub enum EngineError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (empty priority list, bad pattern, etc.).
    ConfigValidation(String),
    /// Reading or decoding the record snapshot failed.
    Source(String),
    /// The summary could not be written after every allowed attempt.
    Publish { attempts: u32, message: String },
    /// Summary serialization failed.
    Serialize(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::Source(msg) => write!(f, "record source error: {msg}"),
            Self::Publish { attempts, message } => {
                write!(
                    f,
                    "summary publish failed after {attempts} attempt{}: {message}",
                    if *attempts == 1 { "" } else { "s" }
                )
            }
            Self::Serialize(msg) => write!(f, "summary serialization error: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        Self::Source(err.to_string())
    }
}

/// Whether a store failure is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// Network hiccup, rate limit, 5xx: the same request may succeed later.
    Transient,
    /// Rejected request, bad path, malformed payload: retrying cannot help.
    Permanent,
}

/// Error reported by a record store or summary store adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub message: String,
}

impl StoreError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self { kind: StoreErrorKind::Transient, message: message.into() }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self { kind: StoreErrorKind::Permanent, message: message.into() }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == StoreErrorKind::Transient
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            StoreErrorKind::Transient => write!(f, "{} (transient)", self.message),
            StoreErrorKind::Permanent => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for StoreError {}
