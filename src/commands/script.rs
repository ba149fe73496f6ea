//! Lua scripting. See also [`Script`](crate::Script) for SHA caching.

use bytes::Bytes;

use crate::command::{Command, ToArg};

pub fn script_exists(shas: impl IntoIterator<Item = impl ToArg>) -> Command {
    Command::new("SCRIPT EXISTS").args(shas)
}

pub fn script_load(source: impl ToArg) -> Command {
    Command::new("SCRIPT LOAD").arg(source)
}

pub fn script_flush() -> Command {
    Command::new("SCRIPT FLUSH")
}

pub fn script_kill() -> Command {
    Command::new("SCRIPT KILL")
}

fn with_keys_and_args(
    cmd: Command,
    keys: impl IntoIterator<Item = impl ToArg>,
    args: impl IntoIterator<Item = impl ToArg>,
) -> Command {
    let keys: Vec<Bytes> = keys.into_iter().map(|k| k.to_arg()).collect();
    cmd.arg(keys.len()).args(keys).args(args)
}

pub fn eval(
    source: impl ToArg,
    keys: impl IntoIterator<Item = impl ToArg>,
    args: impl IntoIterator<Item = impl ToArg>,
) -> Command {
    with_keys_and_args(Command::new("EVAL").arg(source), keys, args)
}

pub fn evalsha(
    sha: impl ToArg,
    keys: impl IntoIterator<Item = impl ToArg>,
    args: impl IntoIterator<Item = impl ToArg>,
) -> Command {
    with_keys_and_args(Command::new("EVALSHA").arg(sha), keys, args)
}
