//! Generic key commands and plain string values.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::{apply_limit, millis, ScanOptions};
use crate::callbacks::unix_seconds;
use crate::command::{Command, CommandOptions, ToArg};
use crate::error::{RedlineError, Result};

pub fn delete(names: impl IntoIterator<Item = impl ToArg>) -> Command {
    Command::new("DEL").args(names)
}

/// Serialized value of `name`, or nil.
pub fn dump(name: impl ToArg) -> Command {
    Command::new("DUMP").arg(name)
}

pub fn exists(name: impl ToArg) -> Command {
    Command::new("EXISTS").arg(name)
}

/// Expire `name` after `time`, rounded down to whole seconds.
pub fn expire(name: impl ToArg, time: Duration) -> Command {
    Command::new("EXPIRE").arg(name).arg(time.as_secs())
}

pub fn expireat(name: impl ToArg, when: SystemTime) -> Command {
    Command::new("EXPIREAT").arg(name).arg(unix_seconds(when))
}

pub fn get(name: impl ToArg) -> Command {
    Command::new("GET").arg(name)
}

/// Set `name` to `value` and return the previous value atomically.
pub fn getset(name: impl ToArg, value: impl ToArg) -> Command {
    Command::new("GETSET").arg(name).arg(value)
}

pub fn keys(pattern: impl ToArg) -> Command {
    Command::new("KEYS").arg(pattern)
}

pub fn mget(names: impl IntoIterator<Item = impl ToArg>) -> Command {
    Command::new("MGET").args(names)
}

pub fn mset<K: ToArg, V: ToArg>(pairs: impl IntoIterator<Item = (K, V)>) -> Command {
    pairs
        .into_iter()
        .fold(Command::new("MSET"), |cmd, (k, v)| cmd.arg(k).arg(v))
}

/// MSET that only succeeds if none of the keys exist.
pub fn msetnx<K: ToArg, V: ToArg>(pairs: impl IntoIterator<Item = (K, V)>) -> Command {
    pairs
        .into_iter()
        .fold(Command::new("MSETNX"), |cmd, (k, v)| cmd.arg(k).arg(v))
}

/// MOVE `name` to database `db`.
pub fn move_key(name: impl ToArg, db: u16) -> Command {
    Command::new("MOVE").arg(name).arg(db)
}

pub fn persist(name: impl ToArg) -> Command {
    Command::new("PERSIST").arg(name)
}

pub fn pexpire(name: impl ToArg, time: Duration) -> Command {
    Command::new("PEXPIRE").arg(name).arg(millis(time))
}

pub fn pexpireat(name: impl ToArg, when: SystemTime) -> Command {
    let ms = when
        .duration_since(UNIX_EPOCH)
        .map(millis)
        .unwrap_or(0);
    Command::new("PEXPIREAT").arg(name).arg(ms)
}

pub fn psetex(name: impl ToArg, time: Duration, value: impl ToArg) -> Command {
    Command::new("PSETEX").arg(name).arg(millis(time)).arg(value)
}

pub fn pttl(name: impl ToArg) -> Command {
    Command::new("PTTL").arg(name)
}

pub fn randomkey() -> Command {
    Command::new("RANDOMKEY")
}

pub fn rename(src: impl ToArg, dst: impl ToArg) -> Command {
    Command::new("RENAME").arg(src).arg(dst)
}

pub fn renamenx(src: impl ToArg, dst: impl ToArg) -> Command {
    Command::new("RENAMENX").arg(src).arg(dst)
}

/// Recreate a key from a DUMP payload; `ttl` of zero means no expiry.
pub fn restore(name: impl ToArg, ttl: Duration, value: impl ToArg) -> Command {
    Command::new("RESTORE").arg(name).arg(millis(ttl)).arg(value)
}

/// Modifiers for [`set`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetOptions {
    /// Expire after this many whole seconds (`EX`).
    pub ex: Option<Duration>,
    /// Expire after this many milliseconds (`PX`).
    pub px: Option<Duration>,
    /// Only set if the key does not exist.
    pub nx: bool,
    /// Only set if the key already exists.
    pub xx: bool,
}

/// SET with optional expiry and existence condition. Decodes to `false`
/// when NX/XX prevented the write.
pub fn set(name: impl ToArg, value: impl ToArg, options: &SetOptions) -> Command {
    let mut cmd = Command::new("SET").arg(name).arg(value);
    if let Some(ex) = options.ex.filter(|d| !d.is_zero()) {
        cmd = cmd.arg("EX").arg(ex.as_secs());
    }
    if let Some(px) = options.px.filter(|d| !d.is_zero()) {
        cmd = cmd.arg("PX").arg(millis(px));
    }
    cmd.arg_if(options.nx, "NX").arg_if(options.xx, "XX")
}

pub fn setex(name: impl ToArg, time: Duration, value: impl ToArg) -> Command {
    Command::new("SETEX").arg(name).arg(time.as_secs()).arg(value)
}

pub fn setnx(name: impl ToArg, value: impl ToArg) -> Command {
    Command::new("SETNX").arg(name).arg(value)
}

pub fn ttl(name: impl ToArg) -> Command {
    Command::new("TTL").arg(name)
}

/// TYPE of the value stored at `name`.
pub fn key_type(name: impl ToArg) -> Command {
    Command::new("TYPE").arg(name)
}

/// Arguments for [`sort`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortOptions {
    pub start: Option<i64>,
    pub num: Option<i64>,
    /// External key pattern to weight by, `*` marking the element.
    pub by: Option<String>,
    /// `GET` patterns, returned instead of the sorted elements.
    pub get: Vec<String>,
    pub desc: bool,
    pub alpha: bool,
    pub store: Option<String>,
    /// Group the reply into one tuple per element; needs two or more `get`
    /// patterns.
    pub groups: bool,
}

pub fn sort(name: impl ToArg, options: &SortOptions) -> Result<Command> {
    let mut cmd = Command::new("SORT").arg(name);
    if let Some(by) = &options.by {
        cmd = cmd.arg("BY").arg(by);
    }
    cmd = apply_limit(cmd, options.start, options.num)?;
    for pattern in &options.get {
        cmd = cmd.arg("GET").arg(pattern);
    }
    cmd = cmd.arg_if(options.desc, "DESC").arg_if(options.alpha, "ALPHA");
    if let Some(store) = &options.store {
        cmd = cmd.arg("STORE").arg(store);
    }

    if options.groups {
        if options.get.len() < 2 {
            return Err(RedlineError::Usage(
                "when using `groups` the `get` argument must contain at least two patterns".into(),
            ));
        }
        cmd = cmd.with_options(CommandOptions {
            groups: Some(options.get.len()),
            ..CommandOptions::default()
        });
    }
    Ok(cmd)
}

/// One SCAN page starting at `cursor`.
pub fn scan(cursor: u64, options: &ScanOptions) -> Command {
    options.apply(Command::new("SCAN").arg(cursor))
}

// ── Tests ──────────────────────────────────────────────────────────
