use super::ScanOptions;
use crate::command::{Command, ToArg};

pub fn hdel(name: impl ToArg, fields: impl IntoIterator<Item = impl ToArg>) -> Command {
    Command::new("HDEL").arg(name).args(fields)
}

pub fn hexists(name: impl ToArg, field: impl ToArg) -> Command {
    Command::new("HEXISTS").arg(name).arg(field)
}

pub fn hget(name: impl ToArg, field: impl ToArg) -> Command {
    Command::new("HGET").arg(name).arg(field)
}

/// Every field and value, decoded into a [`Value::Map`](crate::Value::Map).
pub fn hgetall(name: impl ToArg) -> Command {
    Command::new("HGETALL").arg(name)
}

pub fn hincrby(name: impl ToArg, field: impl ToArg, amount: i64) -> Command {
    Command::new("HINCRBY").arg(name).arg(field).arg(amount)
}

pub fn hincrbyfloat(name: impl ToArg, field: impl ToArg, amount: f64) -> Command {
    Command::new("HINCRBYFLOAT").arg(name).arg(field).arg(amount)
}

pub fn hkeys(name: impl ToArg) -> Command {
    Command::new("HKEYS").arg(name)
}

pub fn hlen(name: impl ToArg) -> Command {
    Command::new("HLEN").arg(name)
}

pub fn hmget(name: impl ToArg, fields: impl IntoIterator<Item = impl ToArg>) -> Command {
    Command::new("HMGET").arg(name).args(fields)
}

pub fn hmset<F: ToArg, V: ToArg>(name: impl ToArg, pairs: impl IntoIterator<Item = (F, V)>) -> Command {
    pairs
        .into_iter()
        .fold(Command::new("HMSET").arg(name), |cmd, (f, v)| cmd.arg(f).arg(v))
}

pub fn hset(name: impl ToArg, field: impl ToArg, value: impl ToArg) -> Command {
    Command::new("HSET").arg(name).arg(field).arg(value)
}

pub fn hsetnx(name: impl ToArg, field: impl ToArg, value: impl ToArg) -> Command {
    Command::new("HSETNX").arg(name).arg(field).arg(value)
}

pub fn hvals(name: impl ToArg) -> Command {
    Command::new("HVALS").arg(name)
}

pub fn hscan(name: impl ToArg, cursor: u64, options: &ScanOptions) -> Command {
    options.apply(Command::new("HSCAN").arg(name).arg(cursor))
}
