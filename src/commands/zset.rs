//! Sorted sets.
//!
//! Range builders take a [`RangeOptions`] carrying `WITHSCORES`, the score
//! conversion and an optional `LIMIT`. The options travel with the command
//! so the reply decoder knows to pair members with scores.

use super::{apply_limit, ScanOptions};
use crate::command::{Command, CommandOptions, ScoreCast, ToArg};
use crate::error::{RedlineError, Result};

/// Score aggregation for ZINTERSTORE / ZUNIONSTORE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Sum,
    Min,
    Max,
}

impl Aggregate {
    fn as_str(self) -> &'static str {
        match self {
            Aggregate::Sum => "SUM",
            Aggregate::Min => "MIN",
            Aggregate::Max => "MAX",
        }
    }
}

/// Shape of a range reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeOptions {
    /// ZRANGE only: read in descending order (sends ZREVRANGE).
    pub desc: bool,
    pub withscores: bool,
    pub score_cast: ScoreCast,
    /// Offset for `LIMIT`; by-score and by-lex ranges only.
    pub start: Option<i64>,
    /// Count for `LIMIT`; must be given together with `start`.
    pub num: Option<i64>,
}

impl RangeOptions {
    pub fn withscores() -> Self {
        Self {
            withscores: true,
            ..Self::default()
        }
    }

    pub fn limit(mut self, start: i64, num: i64) -> Self {
        self.start = Some(start);
        self.num = Some(num);
        self
    }

    pub fn cast(mut self, score_cast: ScoreCast) -> Self {
        self.score_cast = score_cast;
        self
    }

    fn finish(&self, cmd: Command) -> Command {
        cmd.arg_if(self.withscores, "WITHSCORES")
            .with_options(CommandOptions {
                withscores: self.withscores,
                score_cast: self.score_cast,
                ..CommandOptions::default()
            })
    }
}

/// Add `(score, member)` pairs.
pub fn zadd<M: ToArg>(name: impl ToArg, pairs: impl IntoIterator<Item = (f64, M)>) -> Command {
    pairs
        .into_iter()
        .fold(Command::new("ZADD").arg(name), |cmd, (score, member)| {
            cmd.arg(score).arg(member)
        })
}

pub fn zcard(name: impl ToArg) -> Command {
    Command::new("ZCARD").arg(name)
}

/// Members with a score in `min..=max` (`"-inf"`, `"(1"` etc. accepted).
pub fn zcount(name: impl ToArg, min: impl ToArg, max: impl ToArg) -> Command {
    Command::new("ZCOUNT").arg(name).arg(min).arg(max)
}

pub fn zincrby(name: impl ToArg, member: impl ToArg, amount: f64) -> Command {
    Command::new("ZINCRBY").arg(name).arg(amount).arg(member)
}

fn aggregate_store(
    verb: &str,
    dest: impl ToArg,
    keys: impl IntoIterator<Item = impl ToArg>,
    weights: &[f64],
    aggregate: Option<Aggregate>,
) -> Result<Command> {
    let keys: Vec<_> = keys.into_iter().map(|k| k.to_arg()).collect();
    if !weights.is_empty() && weights.len() != keys.len() {
        return Err(RedlineError::Usage(format!(
            "{verb} got {} weights for {} keys",
            weights.len(),
            keys.len()
        )));
    }
    let mut cmd = Command::new(verb).arg(dest).arg(keys.len()).args(keys);
    if !weights.is_empty() {
        cmd = cmd.arg("WEIGHTS").args(weights.iter().copied());
    }
    if let Some(aggregate) = aggregate {
        cmd = cmd.arg("AGGREGATE").arg(aggregate.as_str());
    }
    Ok(cmd)
}

/// Intersect `keys` into `dest`. `weights`, when not empty, pairs up with
/// `keys` one to one.
pub fn zinterstore(
    dest: impl ToArg,
    keys: impl IntoIterator<Item = impl ToArg>,
    weights: &[f64],
    aggregate: Option<Aggregate>,
) -> Result<Command> {
    aggregate_store("ZINTERSTORE", dest, keys, weights, aggregate)
}

pub fn zunionstore(
    dest: impl ToArg,
    keys: impl IntoIterator<Item = impl ToArg>,
    weights: &[f64],
    aggregate: Option<Aggregate>,
) -> Result<Command> {
    aggregate_store("ZUNIONSTORE", dest, keys, weights, aggregate)
}

pub fn zlexcount(name: impl ToArg, min: impl ToArg, max: impl ToArg) -> Command {
    Command::new("ZLEXCOUNT").arg(name).arg(min).arg(max)
}

/// Members ranked `start..=end`; `options.desc` switches to ZREVRANGE.
pub fn zrange(name: impl ToArg, start: i64, end: i64, options: &RangeOptions) -> Command {
    if options.desc {
        return zrevrange(name, start, end, options);
    }
    options.finish(Command::new("ZRANGE").arg(name).arg(start).arg(end))
}

pub fn zrangebylex(
    name: impl ToArg,
    min: impl ToArg,
    max: impl ToArg,
    start: Option<i64>,
    num: Option<i64>,
) -> Result<Command> {
    apply_limit(
        Command::new("ZRANGEBYLEX").arg(name).arg(min).arg(max),
        start,
        num,
    )
}

pub fn zrangebyscore(
    name: impl ToArg,
    min: impl ToArg,
    max: impl ToArg,
    options: &RangeOptions,
) -> Result<Command> {
    let cmd = Command::new("ZRANGEBYSCORE").arg(name).arg(min).arg(max);
    Ok(options.finish(apply_limit(cmd, options.start, options.num)?))
}

pub fn zrank(name: impl ToArg, member: impl ToArg) -> Command {
    Command::new("ZRANK").arg(name).arg(member)
}

pub fn zrem(name: impl ToArg, members: impl IntoIterator<Item = impl ToArg>) -> Command {
    Command::new("ZREM").arg(name).args(members)
}

pub fn zremrangebylex(name: impl ToArg, min: impl ToArg, max: impl ToArg) -> Command {
    Command::new("ZREMRANGEBYLEX").arg(name).arg(min).arg(max)
}

pub fn zremrangebyrank(name: impl ToArg, start: i64, end: i64) -> Command {
    Command::new("ZREMRANGEBYRANK").arg(name).arg(start).arg(end)
}

pub fn zremrangebyscore(name: impl ToArg, min: impl ToArg, max: impl ToArg) -> Command {
    Command::new("ZREMRANGEBYSCORE").arg(name).arg(min).arg(max)
}

pub fn zrevrange(name: impl ToArg, start: i64, end: i64, options: &RangeOptions) -> Command {
    options.finish(Command::new("ZREVRANGE").arg(name).arg(start).arg(end))
}

/// Note the bounds order: `max` first, as on the wire.
pub fn zrevrangebyscore(
    name: impl ToArg,
    max: impl ToArg,
    min: impl ToArg,
    options: &RangeOptions,
) -> Result<Command> {
    let cmd = Command::new("ZREVRANGEBYSCORE").arg(name).arg(max).arg(min);
    Ok(options.finish(apply_limit(cmd, options.start, options.num)?))
}

pub fn zrevrank(name: impl ToArg, member: impl ToArg) -> Command {
    Command::new("ZREVRANK").arg(name).arg(member)
}

pub fn zscore(name: impl ToArg, member: impl ToArg) -> Command {
    Command::new("ZSCORE").arg(name).arg(member)
}

/// One ZSCAN page; scores are converted with `score_cast`.
pub fn zscan(name: impl ToArg, cursor: u64, options: &ScanOptions, score_cast: ScoreCast) -> Command {
    options
        .apply(Command::new("ZSCAN").arg(name).arg(cursor))
        .with_options(CommandOptions {
            score_cast,
            ..CommandOptions::default()
        })
}

// ── Tests ──────────────────────────────────────────────────────────
