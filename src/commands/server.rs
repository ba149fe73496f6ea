//! Server administration and introspection.

use crate::command::{Command, CommandOptions, ToArg};

pub fn bgrewriteaof() -> Command {
    Command::new("BGREWRITEAOF")
}

pub fn bgsave() -> Command {
    Command::new("BGSAVE")
}

/// Disconnect the client at `address` (`ip:port`).
pub fn client_kill(address: impl ToArg) -> Command {
    Command::new("CLIENT KILL").arg(address)
}

pub fn client_list() -> Command {
    Command::new("CLIENT LIST")
}

pub fn client_getname() -> Command {
    Command::new("CLIENT GETNAME")
}

pub fn client_setname(name: impl ToArg) -> Command {
    Command::new("CLIENT SETNAME").arg(name)
}

pub fn config_get(pattern: impl ToArg) -> Command {
    Command::new("CONFIG GET").arg(pattern)
}

pub fn config_set(name: impl ToArg, value: impl ToArg) -> Command {
    Command::new("CONFIG SET").arg(name).arg(value)
}

pub fn config_resetstat() -> Command {
    Command::new("CONFIG RESETSTAT")
}

pub fn config_rewrite() -> Command {
    Command::new("CONFIG REWRITE")
}

pub fn dbsize() -> Command {
    Command::new("DBSIZE")
}

pub fn debug_object(key: impl ToArg) -> Command {
    Command::new("DEBUG OBJECT").arg(key)
}

pub fn echo(value: impl ToArg) -> Command {
    Command::new("ECHO").arg(value)
}

pub fn flushall() -> Command {
    Command::new("FLUSHALL")
}

pub fn flushdb() -> Command {
    Command::new("FLUSHDB")
}

/// INFO, optionally restricted to one section.
pub fn info(section: Option<&str>) -> Command {
    let cmd = Command::new("INFO");
    match section {
        Some(section) => cmd.arg(section),
        None => cmd,
    }
}

pub fn lastsave() -> Command {
    Command::new("LASTSAVE")
}

/// OBJECT `infotype` (`encoding`, `idletime`, `refcount`, …) for `key`.
pub fn object(infotype: &str, key: impl ToArg) -> Command {
    Command::new("OBJECT")
        .arg(infotype)
        .arg(key)
        .with_options(CommandOptions {
            infotype: Some(infotype.to_ascii_lowercase()),
            ..CommandOptions::default()
        })
}

pub fn ping() -> Command {
    Command::new("PING")
}

pub fn save() -> Command {
    Command::new("SAVE")
}

pub fn shutdown() -> Command {
    Command::new("SHUTDOWN")
}

/// Replicate from `primary`, or promote to primary with `None`.
pub fn slaveof(primary: Option<(&str, u16)>) -> Command {
    match primary {
        Some((host, port)) => Command::new("SLAVEOF").arg(host).arg(port),
        None => Command::new("SLAVEOF").arg("NO").arg("ONE"),
    }
}

/// The slowlog, or only its `num` most recent entries.
pub fn slowlog_get(num: Option<u64>) -> Command {
    let cmd = Command::new("SLOWLOG GET");
    match num {
        Some(num) => cmd.arg(num),
        None => cmd,
    }
}

pub fn slowlog_len() -> Command {
    Command::new("SLOWLOG LEN")
}

pub fn slowlog_reset() -> Command {
    Command::new("SLOWLOG RESET")
}

pub fn time() -> Command {
    Command::new("TIME")
}
