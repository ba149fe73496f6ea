//! Command builders, one module per data type.
//!
//! Every builder returns a [`Command`] that can be run with
//! [`Client::execute_command`](crate::Client::execute_command) or staged on a
//! [`Pipeline`](crate::Pipeline). Builders that validate their arguments
//! return `Result<Command>` and fail with [`RedlineError::Usage`] before any
//! I/O happens.

pub mod hash;
pub mod hyperloglog;
pub mod key;
pub mod list;
pub mod number;
pub mod script;
pub mod server;
pub mod set;
pub mod zset;

use std::time::Duration;

use crate::command::Command;
use crate::error::{RedlineError, Result};

/// `MATCH` / `COUNT` modifiers shared by SCAN, SSCAN, HSCAN and ZSCAN.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanOptions {
    pub pattern: Option<String>,
    pub count: Option<u64>,
}

impl ScanOptions {
    pub fn matching(pattern: impl Into<String>) -> Self {
        Self {
            pattern: Some(pattern.into()),
            count: None,
        }
    }

    pub fn count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    pub(crate) fn apply(&self, mut cmd: Command) -> Command {
        if let Some(pattern) = &self.pattern {
            cmd = cmd.arg("MATCH").arg(pattern);
        }
        if let Some(count) = self.count {
            cmd = cmd.arg("COUNT").arg(count);
        }
        cmd
    }
}

/// `LIMIT start num` is only valid with both halves.
pub(crate) fn limit(start: Option<i64>, num: Option<i64>) -> Result<Option<(i64, i64)>> {
    match (start, num) {
        (Some(start), Some(num)) => Ok(Some((start, num))),
        (None, None) => Ok(None),
        _ => Err(RedlineError::Usage(
            "`start` and `num` must both be specified".into(),
        )),
    }
}

pub(crate) fn apply_limit(cmd: Command, start: Option<i64>, num: Option<i64>) -> Result<Command> {
    Ok(match limit(start, num)? {
        Some((start, num)) => cmd.arg("LIMIT").arg(start).arg(num),
        None => cmd,
    })
}

pub(crate) fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

// ── Tests ──────────────────────────────────────────────────────────
