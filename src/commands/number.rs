//! Counters stored as strings.

use crate::command::{Command, ToArg};

/// Decrement by `amount`; a missing key starts at 0.
pub fn decr(name: impl ToArg, amount: i64) -> Command {
    Command::new("DECRBY").arg(name).arg(amount)
}

/// Increment by `amount`; a missing key starts at 0.
pub fn incr(name: impl ToArg, amount: i64) -> Command {
    Command::new("INCRBY").arg(name).arg(amount)
}

pub fn incrby(name: impl ToArg, amount: i64) -> Command {
    incr(name, amount)
}

pub fn incrbyfloat(name: impl ToArg, amount: f64) -> Command {
    Command::new("INCRBYFLOAT").arg(name).arg(amount)
}
