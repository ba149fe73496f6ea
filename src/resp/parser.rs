//! Streaming RESP2/RESP3 parser.
//!
//! [`parse`] takes a byte buffer and returns `Ok((RespValue, bytes_consumed))`
//! or `Err(Incomplete)` when more data is needed, or `Err(Protocol(…))` on
//! malformed input. Bulk strings are sliced out of the shared `Bytes`
//! buffer without copying.

use bytes::Bytes;
use memchr::memchr;

use crate::error::{RedlineError, Result};
use crate::resp::types::RespValue;

/// Maximum nesting depth for arrays, maps and sets.
const MAX_PARSE_DEPTH: usize = 512;

/// Parse one RESP value from the front of `buf`.
///
/// Returns `(value, bytes_consumed)` on success and `Err(Incomplete)` when
/// the buffer is too short; callers should read more data and retry.
pub fn parse(buf: &Bytes) -> Result<(RespValue, usize)> {
    parse_at(buf, 0, 0)
}

/// Convenience wrapper: parse from a byte slice (copies into `Bytes` first).
pub fn parse_slice(buf: &[u8]) -> Result<(RespValue, usize)> {
    parse(&Bytes::copy_from_slice(buf))
}

fn parse_at(buf: &Bytes, start: usize, depth: usize) -> Result<(RespValue, usize)> {
    if start >= buf.len() {
        return Err(RedlineError::Incomplete);
    }
    if depth > MAX_PARSE_DEPTH {
        return Err(RedlineError::Protocol("RESP nesting too deep".into()));
    }

    let body = start + 1;
    match buf[start] {
        b'+' => {
            let (line, next) = read_line(buf, body)?;
            Ok((RespValue::SimpleString(utf8(line, "simple string")?), next))
        }
        b'-' => {
            let (line, next) = read_line(buf, body)?;
            Ok((RespValue::Error(utf8(line, "error")?), next))
        }
        b':' => {
            let (line, next) = read_line(buf, body)?;
            Ok((RespValue::Integer(parse_int_from_bytes(line)?), next))
        }
        b'$' => match read_blob(buf, body)? {
            (None, next) => Ok((RespValue::Null, next)),
            (Some((from, to)), next) => Ok((RespValue::BulkString(buf.slice(from..to)), next)),
        },
        b'!' => match read_blob(buf, body)? {
            (None, _) => Err(RedlineError::Protocol("negative bulk error length".into())),
            (Some((from, to)), next) => {
                Ok((RespValue::BulkError(utf8(&buf[from..to], "bulk error")?), next))
            }
        },
        b'=' => match read_blob(buf, body)? {
            (None, _) => Err(RedlineError::Protocol(
                "negative verbatim string length".into(),
            )),
            (Some((from, to)), next) => {
                let content = &buf[from..to];
                if content.len() < 4 || content[3] != b':' {
                    return Err(RedlineError::Protocol(
                        "verbatim string missing encoding prefix".into(),
                    ));
                }
                let encoding = utf8(&content[..3], "verbatim encoding")?;
                let data = utf8(&content[4..], "verbatim string")?;
                Ok((RespValue::VerbatimString { encoding, data }, next))
            }
        },
        b'*' => {
            let (line, next) = read_line(buf, body)?;
            let count = parse_int_from_bytes(line)?;
            if count < 0 {
                return Ok((RespValue::Null, next));
            }
            let (items, next) = parse_elements(buf, next, count as usize, depth)?;
            Ok((RespValue::Array(items), next))
        }
        b'~' => {
            let (line, next) = read_line(buf, body)?;
            let count = non_negative(parse_int_from_bytes(line)?, "set")?;
            let (items, next) = parse_elements(buf, next, count, depth)?;
            Ok((RespValue::Set(items), next))
        }
        b'%' => {
            let (line, next) = read_line(buf, body)?;
            let count = non_negative(parse_int_from_bytes(line)?, "map")?;
            let flat_count = count
                .checked_mul(2)
                .ok_or_else(|| RedlineError::Protocol("map count overflow".into()))?;
            let (flat, next) = parse_elements(buf, next, flat_count, depth)?;
            let mut pairs = Vec::with_capacity(count);
            let mut it = flat.into_iter();
            while let (Some(k), Some(v)) = (it.next(), it.next()) {
                pairs.push((k, v));
            }
            Ok((RespValue::Map(pairs), next))
        }
        b'_' => {
            let (line, next) = read_line(buf, body)?;
            if !line.is_empty() {
                return Err(RedlineError::Protocol(
                    "null type not terminated by \\r\\n".into(),
                ));
            }
            Ok((RespValue::Null, next))
        }
        b'#' => {
            let (line, next) = read_line(buf, body)?;
            match line {
                b"t" => Ok((RespValue::Boolean(true), next)),
                b"f" => Ok((RespValue::Boolean(false), next)),
                _ => Err(RedlineError::Protocol("invalid boolean value".into())),
            }
        }
        b',' => {
            let (line, next) = read_line(buf, body)?;
            let s = utf8(line, "double")?;
            let d = match s.as_str() {
                "inf" => f64::INFINITY,
                "-inf" => f64::NEG_INFINITY,
                "nan" => f64::NAN,
                _ => s
                    .parse::<f64>()
                    .map_err(|e| RedlineError::Protocol(format!("invalid double: {e}")))?,
            };
            Ok((RespValue::Double(d), next))
        }
        b'(' => {
            let (line, next) = read_line(buf, body)?;
            let s = utf8(line, "big number")?;
            let digits = s.strip_prefix(['+', '-']).unwrap_or(s.as_str());
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(RedlineError::Protocol(format!("invalid big number: {s}")));
            }
            Ok((RespValue::BigNumber(s), next))
        }
        other => Err(RedlineError::Protocol(format!(
            "unknown RESP type byte: 0x{other:02x}"
        ))),
    }
}

// ── Helpers ────────────────────────────────────────────────────────

fn parse_elements(
    buf: &Bytes,
    mut next: usize,
    count: usize,
    depth: usize,
) -> Result<(Vec<RespValue>, usize)> {
    // Don't trust the count for the allocation: every element is at least 3 bytes.
    let mut items = Vec::with_capacity(count.min(buf.len().saturating_sub(next) / 3));
    for _ in 0..count {
        let (val, after) = parse_at(buf, next, depth + 1)?;
        items.push(val);
        next = after;
    }
    Ok((items, next))
}

/// Read a length-prefixed payload. Returns the payload range, or `None` for
/// a negative length, plus the index after the trailing CRLF.
fn read_blob(buf: &[u8], offset: usize) -> Result<(Option<(usize, usize)>, usize)> {
    let (line, next) = read_line(buf, offset)?;
    let len = parse_int_from_bytes(line)?;
    if len < 0 {
        return Ok((None, next));
    }
    let end = next + len as usize;
    if buf.len() < end + 2 {
        return Err(RedlineError::Incomplete);
    }
    if buf[end] != b'\r' || buf[end + 1] != b'\n' {
        return Err(RedlineError::Protocol(
            "bulk payload not terminated by \\r\\n".into(),
        ));
    }
    Ok((Some((next, end)), end + 2))
}

/// Read the line starting at `buf[offset]` up to `\r\n`.
/// Returns `(line_bytes, index_after_crlf)`.
#[inline]
fn read_line(buf: &[u8], offset: usize) -> Result<(&[u8], usize)> {
    let search = buf.get(offset..).ok_or(RedlineError::Incomplete)?;
    match memchr(b'\r', search) {
        Some(pos) => {
            let cr = offset + pos;
            if cr + 1 >= buf.len() {
                Err(RedlineError::Incomplete)
            } else if buf[cr + 1] != b'\n' {
                Err(RedlineError::Protocol("expected \\n after \\r".into()))
            } else {
                Ok((&buf[offset..cr], cr + 2))
            }
        }
        None => Err(RedlineError::Incomplete),
    }
}

/// Parse an integer from a byte slice (no allocations).
fn parse_int_from_bytes(bytes: &[u8]) -> Result<i64> {
    let (negative, digits) = match bytes.first() {
        Some(b'-') => (true, &bytes[1..]),
        Some(b'+') => (false, &bytes[1..]),
        _ => (false, bytes),
    };
    if digits.is_empty() {
        return Err(RedlineError::Protocol("integer has no digits".into()));
    }

    // Accumulate as negative so i64::MIN does not overflow.
    let mut n: i64 = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            return Err(RedlineError::Protocol(format!(
                "invalid byte in integer: 0x{b:02x}"
            )));
        }
        n = n
            .checked_mul(10)
            .and_then(|n| n.checked_sub((b - b'0') as i64))
            .ok_or_else(|| RedlineError::Protocol("integer overflow".into()))?;
    }
    if negative {
        Ok(n)
    } else {
        n.checked_neg()
            .ok_or_else(|| RedlineError::Protocol("integer overflow".into()))
    }
}

fn non_negative(count: i64, what: &str) -> Result<usize> {
    usize::try_from(count).map_err(|_| RedlineError::Protocol(format!("negative {what} count")))
}

fn utf8(bytes: &[u8], what: &str) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| RedlineError::Protocol(format!("invalid UTF-8 in {what}: {e}")))
}

// ── Tests ──────────────────────────────────────────────────────────
