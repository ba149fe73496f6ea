//! Lists, including the blocking pops.

use std::time::Duration;

use crate::command::{Command, ToArg};

/// Where [`linsert`] puts the new element relative to the pivot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPosition {
    Before,
    After,
}

/// Pop from the first non-empty list in `keys`, waiting up to `timeout`
/// (whole seconds; zero waits forever).
pub fn blpop(keys: impl IntoIterator<Item = impl ToArg>, timeout: Duration) -> Command {
    Command::new("BLPOP").args(keys).arg(timeout.as_secs())
}

pub fn brpop(keys: impl IntoIterator<Item = impl ToArg>, timeout: Duration) -> Command {
    Command::new("BRPOP").args(keys).arg(timeout.as_secs())
}

pub fn lindex(name: impl ToArg, index: i64) -> Command {
    Command::new("LINDEX").arg(name).arg(index)
}

pub fn linsert(
    name: impl ToArg,
    position: InsertPosition,
    pivot: impl ToArg,
    value: impl ToArg,
) -> Command {
    let position = match position {
        InsertPosition::Before => "BEFORE",
        InsertPosition::After => "AFTER",
    };
    Command::new("LINSERT").arg(name).arg(position).arg(pivot).arg(value)
}

pub fn llen(name: impl ToArg) -> Command {
    Command::new("LLEN").arg(name)
}

pub fn lpop(name: impl ToArg) -> Command {
    Command::new("LPOP").arg(name)
}

pub fn lpush(name: impl ToArg, values: impl IntoIterator<Item = impl ToArg>) -> Command {
    Command::new("LPUSH").arg(name).args(values)
}

pub fn lpushx(name: impl ToArg, value: impl ToArg) -> Command {
    Command::new("LPUSHX").arg(name).arg(value)
}

pub fn lrange(name: impl ToArg, start: i64, end: i64) -> Command {
    Command::new("LRANGE").arg(name).arg(start).arg(end)
}

/// Remove up to `count` occurrences of `value` (from the tail if negative,
/// all of them if zero).
pub fn lrem(name: impl ToArg, count: i64, value: impl ToArg) -> Command {
    Command::new("LREM").arg(name).arg(count).arg(value)
}

pub fn lset(name: impl ToArg, index: i64, value: impl ToArg) -> Command {
    Command::new("LSET").arg(name).arg(index).arg(value)
}

pub fn ltrim(name: impl ToArg, start: i64, end: i64) -> Command {
    Command::new("LTRIM").arg(name).arg(start).arg(end)
}

pub fn rpop(name: impl ToArg) -> Command {
    Command::new("RPOP").arg(name)
}

pub fn rpush(name: impl ToArg, values: impl IntoIterator<Item = impl ToArg>) -> Command {
    Command::new("RPUSH").arg(name).args(values)
}

pub fn rpushx(name: impl ToArg, value: impl ToArg) -> Command {
    Command::new("RPUSHX").arg(name).arg(value)
}
