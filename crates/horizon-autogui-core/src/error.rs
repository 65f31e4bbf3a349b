//! Error types for Horizon AutoGUI.

use std::path::PathBuf;

/// The main error type for Horizon AutoGUI operations.
#[derive(Debug, thiserror::Error)]
pub enum AutoGuiError {
    /// A host accessor failed.
    #[error("Accessor error: {0}")]
    Access(#[from] AccessError),
    /// A value could not be converted or parsed.
    #[error("Value error: {0}")]
    Value(#[from] ValueError),
    /// A task submitted to the task runner failed.
    #[error("Task error: {0}")]
    Task(#[from] TaskError),
    /// Preferences could not be read or written.
    #[error("Preferences error: {0}")]
    Preferences(#[from] PreferencesError),
    /// Engine configuration was invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// A specialized Result type for Horizon AutoGUI operations.
pub type Result<T> = std::result::Result<T, AutoGuiError>;

/// Errors raised while reading or writing a host object member.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AccessError {
    /// The member has no setter, or the representation is read-only.
    #[error("member '{0}' is read-only")]
    ReadOnly(String),
    /// The value handed to an accessor did not fit the member type.
    #[error("member '{member}': {source}")]
    Conversion {
        member: String,
        #[source]
        source: ValueError,
    },
    /// The owning object was expected but the parent context carried none.
    #[error("member '{0}' has no owning object")]
    MissingOwner(String),
    /// The owning object has a different concrete type than the member expects.
    #[error("member '{member}' expects an owner of type {expected}")]
    OwnerTypeMismatch {
        member: String,
        expected: &'static str,
    },
    /// A row index was outside the collection bounds.
    #[error("row {row} is out of bounds for a collection of {len} elements")]
    RowOutOfBounds { row: usize, len: usize },
    /// The context has no accessor for the requested operation.
    #[error("context '{0}' does not support this operation")]
    Unsupported(String),
    /// The host code itself reported a failure.
    #[error("{0}")]
    Host(String),
}

impl AccessError {
    /// Create an error reported by host code.
    pub fn host(message: impl Into<String>) -> Self {
        Self::Host(message.into())
    }

    /// Wrap a conversion failure for the given member.
    pub fn conversion(member: impl Into<String>, source: ValueError) -> Self {
        Self::Conversion {
            member: member.into(),
            source,
        }
    }
}

/// Errors raised while converting between host values and [`Value`](crate::Value).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValueError {
    /// The value had a different shape than the declared type.
    #[error("expected {expected}, got {got}")]
    TypeMismatch {
        expected: &'static str,
        got: &'static str,
    },
    /// A number did not fit the target numeric type.
    #[error("{value} is out of range for {target}")]
    OutOfRange { value: String, target: &'static str },
    /// Text could not be parsed back into a value.
    #[error("cannot parse '{text}' as {target}")]
    Parse { text: String, target: &'static str },
    /// An enum variant name was not known.
    #[error("unknown variant '{variant}' for {type_name}")]
    UnknownVariant {
        type_name: &'static str,
        variant: String,
    },
    /// The representation does not parse text back.
    #[error("{0} values cannot be parsed from text")]
    NotParsable(&'static str),
}

impl ValueError {
    /// Create a type mismatch error.
    pub fn mismatch(expected: &'static str, got: &'static str) -> Self {
        Self::TypeMismatch { expected, got }
    }

    /// Create a parse error.
    pub fn parse(text: impl Into<String>, target: &'static str) -> Self {
        Self::Parse {
            text: text.into(),
            target,
        }
    }
}

/// Errors surfaced by the task runner.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TaskError {
    /// The task body returned an accessor error.
    #[error(transparent)]
    Access(#[from] AccessError),
    /// The task body panicked.
    #[error("task panicked: {0}")]
    Panicked(String),
    /// The executor has shut down and no longer accepts work.
    #[error("executor '{0}' is not running")]
    ExecutorStopped(String),
    /// The executor queue was full.
    #[error("executor '{0}' queue is full")]
    QueueFull(String),
    /// The executor thread could not be started.
    #[error("failed to spawn executor '{name}': {message}")]
    Spawn { name: String, message: String },
    /// An action was activated while a previous activation was still running.
    #[error("action '{0}' is already running")]
    AlreadyRunning(String),
    /// The task was cancelled before producing a result.
    #[error("task was cancelled")]
    Cancelled,
}

/// Errors raised by preferences loading and saving.
#[derive(Debug, thiserror::Error)]
pub enum PreferencesError {
    /// The persisted blob was not valid JSON.
    #[error("invalid preferences JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// Reading or writing a text file failed.
    #[error("failed to access '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PreferencesError {
    /// Create an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised while building an engine configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// JSON settings could not be parsed.
    #[error("invalid JSON settings: {0}")]
    Json(#[from] serde_json::Error),
    /// TOML settings could not be parsed.
    #[error("invalid TOML settings: {0}")]
    Toml(#[from] toml::de::Error),
    /// The waiter pool could not be created.
    #[error("failed to create waiter pool: {0}")]
    WaiterPool(String),
    /// A setting had an unusable value.
    #[error("invalid value for '{key}': {message}")]
    InvalidValue { key: &'static str, message: String },
}
