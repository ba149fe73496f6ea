use std::io;

use crate::command::Command;

// ── Error taxonomy ─────────────────────────────────────────────────
//
//  RedlineError
//  ├── Connection          transport broke (retried once)
//  ├── Timeout             no reply in time (retried if configured)
//  ├── Protocol            malformed RESP data
//  ├── Redis               server rejected one command
//  │   ├── Err / WrongType / NoScript / Busy / ReadOnly / Loading
//  │   └── ExecAbort       MULTI/EXEC discarded by the server
//  ├── TransactionAborted  EXEC failed without a recorded staging error
//  ├── Watch               watched key changed, or watch lost with the socket
//  ├── ResponseCount       reply count does not match staged commands
//  ├── Usage               caller broke the pipeline state machine
//  ├── Type                reply could not be decoded into the expected shape
//  └── Config              bad URL or connection settings

/// Structured Redis error kinds for programmatic matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedisErrorKind {
    /// Generic ERR
    Err,
    /// WRONGTYPE Operation against a key holding the wrong kind of value
    WrongType,
    /// EXECABORT Transaction discarded because of previous errors
    ExecAbort,
    /// LOADING Redis is loading the dataset in memory
    Loading,
    /// READONLY You can't write against a read only replica
    ReadOnly,
    /// NOSCRIPT No matching script
    NoScript,
    /// BUSY Redis is busy running a script
    Busy,
    /// Any other Redis error prefix
    Other(String),
}

impl RedisErrorKind {
    /// Parse from a Redis error message string (e.g. "WRONGTYPE Operation against…").
    pub fn from_error_msg(msg: &str) -> (Self, String) {
        let kind = if msg.starts_with("WRONGTYPE") {
            Self::WrongType
        } else if msg.starts_with("EXECABORT") {
            Self::ExecAbort
        } else if msg.starts_with("LOADING") {
            Self::Loading
        } else if msg.starts_with("READONLY") {
            Self::ReadOnly
        } else if msg.starts_with("NOSCRIPT") {
            Self::NoScript
        } else if msg.starts_with("BUSY") {
            Self::Busy
        } else if msg.starts_with("ERR") {
            Self::Err
        } else {
            let prefix = msg.split_whitespace().next().unwrap_or("UNKNOWN");
            Self::Other(prefix.to_string())
        };
        (kind, msg.to_string())
    }
}

/// All error variants for redline.
#[derive(Debug, thiserror::Error)]
pub enum RedlineError {
    /// TCP / IO level errors
    #[error("connection error: {0}")]
    Connection(#[from] io::Error),

    /// RESP protocol parse errors
    #[error("protocol error: {0}")]
    Protocol(String),

    /// RESP parser needs more data. Used as control flow.
    #[error("incomplete RESP message")]
    Incomplete,

    /// Redis returned an error string with structured kind
    #[error("redis error: {message}")]
    Redis {
        kind: RedisErrorKind,
        message: String,
    },

    /// EXEC was rejected and no per-command error explains why
    #[error("transaction aborted: {0}")]
    TransactionAborted(String),

    /// A watched key changed before EXEC, or the watching connection died
    #[error("watch error: {0}")]
    Watch(String),

    /// The number of replies does not match the number of staged commands
    #[error("wrong number of response items from pipeline execution: expected {expected}, got {actual}")]
    ResponseCount { expected: usize, actual: usize },

    /// The caller violated the pipeline state machine or a builder contract
    #[error("usage error: {0}")]
    Usage(String),

    /// Type conversion errors (e.g. expected int, got string)
    #[error("type error: {0}")]
    Type(String),

    /// Operation timed out
    #[error("timeout: {0}")]
    Timeout(String),

    /// Malformed connection URL or settings
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl RedlineError {
    /// Create a Redis error from a raw error message, auto-parsing the kind.
    pub fn redis(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        let (kind, message) = RedisErrorKind::from_error_msg(&msg);
        Self::Redis { kind, message }
    }

    /// True for failures of the transport itself (socket closed, reset, EOF).
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// True when a read or connect deadline elapsed.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// True for failures that leave the socket in an unknown state and may
    /// be retried on a fresh connection.
    pub fn is_transient(&self) -> bool {
        self.is_connection_error() || self.is_timeout()
    }

    /// True when the server rejected a single command.
    pub fn is_response_error(&self) -> bool {
        matches!(self, Self::Redis { .. })
    }

    /// The structured kind of a server error, if this is one.
    pub fn redis_kind(&self) -> Option<&RedisErrorKind> {
        match self {
            Self::Redis { kind, .. } => Some(kind),
            _ => None,
        }
    }

    /// Prefix a server error with the pipeline position and command that
    /// caused it. Other variants are returned unchanged.
    pub fn annotate(self, number: usize, command: &Command) -> Self {
        match self {
            Self::Redis { kind, message } => Self::Redis {
                kind,
                message: format!(
                    "Command # {number} ({}) of pipeline caused error: {message}",
                    command.display_args()
                ),
            },
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, RedlineError>;

// ── Tests ──────────────────────────────────────────────────────────
