//! Decoded, caller-facing reply values.
//!
//! [`RespValue`] mirrors the wire; [`Value`] is what a command table decoder
//! hands back. Server errors never appear inside a `Value`: they are
//! surfaced as [`RedlineError::Redis`] instead.

use std::time::SystemTime;

use bytes::Bytes;

use crate::error::{RedlineError, Result};
use crate::resp::types::RespValue;

/// A decoded Redis reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Bulk payload, binary safe.
    Bytes(Bytes),
    /// Status reply such as `OK` or `QUEUED`.
    Status(String),
    List(Vec<Value>),
    /// Unordered collection (SMEMBERS, SINTER, …). Duplicates are removed.
    Set(Vec<Value>),
    /// Field/value pairs in reply order.
    Map(Vec<(Value, Value)>),
    /// Sorted-set members with their cast scores.
    Scored(Vec<(Bytes, Value)>),
    /// One page of a SCAN-family iteration.
    Cursor { cursor: u64, items: Box<Value> },
    /// TIME reply.
    Time { seconds: i64, micros: i64 },
    /// LASTSAVE reply.
    Timestamp(SystemTime),
}

impl Value {
    /// Convert a raw reply 1:1, failing on embedded server errors.
    pub fn from_resp(raw: RespValue) -> Result<Value> {
        Ok(match raw {
            RespValue::SimpleString(s) => Value::Status(s),
            RespValue::Error(msg) | RespValue::BulkError(msg) => {
                return Err(RedlineError::redis(msg))
            }
            RespValue::Integer(i) => Value::Int(i),
            RespValue::BulkString(b) => Value::Bytes(b),
            RespValue::Array(items) => Value::List(convert_all(items)?),
            RespValue::Null => Value::Nil,
            RespValue::Double(f) => Value::Float(f),
            RespValue::Boolean(b) => Value::Bool(b),
            RespValue::Map(pairs) => Value::Map(
                pairs
                    .into_iter()
                    .map(|(k, v)| Ok((Value::from_resp(k)?, Value::from_resp(v)?)))
                    .collect::<Result<_>>()?,
            ),
            RespValue::Set(items) => Value::Set(convert_all(items)?),
            RespValue::BigNumber(n) => Value::Bytes(Bytes::from(n)),
            RespValue::VerbatimString { data, .. } => Value::Bytes(Bytes::from(data)),
        })
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bytes(b) => std::str::from_utf8(b).ok()?.parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            Value::Bytes(b) => std::str::from_utf8(b).ok()?.parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            Value::Status(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Bytes(b) => std::str::from_utf8(b).ok(),
            Value::Status(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow the elements of a list or set.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Set(items) => Some(items),
            _ => None,
        }
    }

    /// Look up a map entry by its string key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(pairs) => pairs
                .iter()
                .find(|(k, _)| k.as_str() == Some(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }
}

fn convert_all(items: Vec<RespValue>) -> Result<Vec<Value>> {
    items.into_iter().map(Value::from_resp).collect()
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Bytes(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

// ── Tests ──────────────────────────────────────────────────────────
