//! Unordered sets.

use super::ScanOptions;
use crate::command::{Command, ToArg};

pub fn sadd(name: impl ToArg, values: impl IntoIterator<Item = impl ToArg>) -> Command {
    Command::new("SADD").arg(name).args(values)
}

pub fn scard(name: impl ToArg) -> Command {
    Command::new("SCARD").arg(name)
}

pub fn sdiff(names: impl IntoIterator<Item = impl ToArg>) -> Command {
    Command::new("SDIFF").args(names)
}

pub fn sdiffstore(dest: impl ToArg, names: impl IntoIterator<Item = impl ToArg>) -> Command {
    Command::new("SDIFFSTORE").arg(dest).args(names)
}

pub fn sinter(names: impl IntoIterator<Item = impl ToArg>) -> Command {
    Command::new("SINTER").args(names)
}

pub fn sinterstore(dest: impl ToArg, names: impl IntoIterator<Item = impl ToArg>) -> Command {
    Command::new("SINTERSTORE").arg(dest).args(names)
}

pub fn sismember(name: impl ToArg, value: impl ToArg) -> Command {
    Command::new("SISMEMBER").arg(name).arg(value)
}

pub fn smembers(name: impl ToArg) -> Command {
    Command::new("SMEMBERS").arg(name)
}

/// Move `value` from `src` to `dst` atomically.
pub fn smove(src: impl ToArg, dst: impl ToArg, value: impl ToArg) -> Command {
    Command::new("SMOVE").arg(src).arg(dst).arg(value)
}

pub fn spop(name: impl ToArg) -> Command {
    Command::new("SPOP").arg(name)
}

/// One random member, or `number` of them when given.
pub fn srandmember(name: impl ToArg, number: Option<i64>) -> Command {
    let cmd = Command::new("SRANDMEMBER").arg(name);
    match number {
        Some(n) => cmd.arg(n),
        None => cmd,
    }
}

pub fn srem(name: impl ToArg, values: impl IntoIterator<Item = impl ToArg>) -> Command {
    Command::new("SREM").arg(name).args(values)
}

pub fn sscan(name: impl ToArg, cursor: u64, options: &ScanOptions) -> Command {
    options.apply(Command::new("SSCAN").arg(name).arg(cursor))
}

pub fn sunion(names: impl IntoIterator<Item = impl ToArg>) -> Command {
    Command::new("SUNION").args(names)
}

pub fn sunionstore(dest: impl ToArg, names: impl IntoIterator<Item = impl ToArg>) -> Command {
    Command::new("SUNIONSTORE").arg(dest).args(names)
}
