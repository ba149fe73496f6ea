use bytes::Bytes;

/// RESP protocol value types (RESP2 plus the RESP3 scalars and aggregates
/// a server may send after `HELLO 3`).
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    /// +OK\r\n
    SimpleString(String),
    /// -ERR message\r\n  (RESP2 simple error)
    Error(String),
    /// :1000\r\n
    Integer(i64),
    /// $6\r\nfoobar\r\n
    BulkString(Bytes),
    /// *2\r\n…
    Array(Vec<RespValue>),
    /// $-1\r\n  or  *-1\r\n  (RESP2), or _\r\n (RESP3)
    Null,
    /// ,3.14\r\n (RESP3)
    Double(f64),
    /// #t\r\n or #f\r\n (RESP3)
    Boolean(bool),
    /// %N\r\n (RESP3 map)
    Map(Vec<(RespValue, RespValue)>),
    /// ~N\r\n (RESP3 set)
    Set(Vec<RespValue>),
    /// (3492890328409238509324850943850943825024385\r\n (RESP3)
    BigNumber(String),
    /// !21\r\nSYNTAX invalid syntax\r\n (RESP3 bulk error)
    BulkError(String),
    /// =15\r\ntxt:Some string\r\n (RESP3)
    VerbatimString { encoding: String, data: String },
}

impl RespValue {
    /// Try to interpret this value as a UTF-8 string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::SimpleString(s) => Some(s),
            Self::BulkString(b) => std::str::from_utf8(b).ok(),
            Self::VerbatimString { data, .. } => Some(data),
            _ => None,
        }
    }

    /// Try to interpret this value as bytes.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::BulkString(b) => Some(b),
            Self::SimpleString(s) => Some(s.as_bytes()),
            Self::VerbatimString { data, .. } => Some(data.as_bytes()),
            _ => None,
        }
    }

    /// Try to interpret this value as i64.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns true when this value represents null / nil.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns true when this is a Redis error (simple or bulk).
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_) | Self::BulkError(_))
    }

    /// Returns the error message if this is an error value.
    pub fn as_error_msg(&self) -> Option<&str> {
        match self {
            Self::Error(msg) | Self::BulkError(msg) => Some(msg),
            _ => None,
        }
    }

    /// True for the `+OK` status reply.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::SimpleString(s) if s == "OK")
    }

    /// Returns the type name as a static string (useful for error messages).
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::SimpleString(_) => "simple_string",
            Self::Error(_) => "error",
            Self::Integer(_) => "integer",
            Self::BulkString(_) => "bulk_string",
            Self::Array(_) => "array",
            Self::Null => "null",
            Self::Double(_) => "double",
            Self::Boolean(_) => "boolean",
            Self::Map(_) => "map",
            Self::Set(_) => "set",
            Self::BigNumber(_) => "big_number",
            Self::BulkError(_) => "bulk_error",
            Self::VerbatimString { .. } => "verbatim_string",
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────
