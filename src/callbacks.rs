//! Command table: reply decoders keyed by command name.
//!
//! Every command that needs more than a 1:1 conversion of its raw reply has
//! an entry here. Names without an entry decode through
//! [`Value::from_resp`]. Clients and pipelines share one table, which can be
//! extended with [`CommandTable::insert`].

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;

use crate::command::{CommandOptions, ScoreCast};
use crate::error::{RedlineError, Result};
use crate::resp::types::RespValue;
use crate::value::Value;

/// Turns a raw reply into a [`Value`] using the command's options.
pub type Decoder = fn(RespValue, &CommandOptions) -> Result<Value>;

/// Name → decoder lookup.
#[derive(Clone)]
pub struct CommandTable {
    decoders: HashMap<String, Decoder>,
}

impl CommandTable {
    /// A table with no decoders: every reply is converted 1:1.
    pub fn empty() -> Self {
        Self { decoders: HashMap::new() }
    }

    /// Register (or replace) the decoder for `name`.
    pub fn insert(&mut self, name: &str, decoder: Decoder) {
        self.decoders.insert(name.to_ascii_uppercase(), decoder);
    }

    pub fn decoder(&self, name: &str) -> Option<Decoder> {
        self.decoders.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Decode `raw` as the reply to `name`. A server error reply is returned
    /// as `Err` without consulting the decoder.
    pub fn decode(&self, name: &str, raw: RespValue, options: &CommandOptions) -> Result<Value> {
        if let Some(msg) = raw.as_error_msg() {
            return Err(RedlineError::redis(msg));
        }
        match self.decoder(name) {
            Some(decode) => decode(raw, options),
            None => Value::from_resp(raw),
        }
    }

    fn register(&mut self, names: &str, decoder: Decoder) {
        for name in names.split(',') {
            self.insert(name.trim(), decoder);
        }
    }
}

impl Default for CommandTable {
    fn default() -> Self {
        let mut t = Self::empty();
        t.register(
            "AUTH, EXISTS, EXPIRE, EXPIREAT, HEXISTS, HMSET, MOVE, MSETNX, PERSIST, \
             PSETEX, RENAMENX, SISMEMBER, SMOVE, SETEX, SETNX",
            to_bool,
        );
        t.register(
            "BITCOUNT, BITPOS, DECRBY, DEL, GETBIT, HDEL, HLEN, INCRBY, LINSERT, LLEN, \
             LPUSHX, PFADD, PFCOUNT, RPUSHX, SADD, SCARD, SDIFFSTORE, SETBIT, \
             SETRANGE, SINTERSTORE, SREM, STRLEN, SUNIONSTORE, ZADD, ZCARD, \
             ZLEXCOUNT, ZREM, ZREMRANGEBYLEX, ZREMRANGEBYRANK, ZREMRANGEBYSCORE, SLOWLOG LEN",
            to_int,
        );
        t.register("INCRBYFLOAT, HINCRBYFLOAT", to_float);
        t.register("LPUSH, RPUSH", int_or_ok);
        t.register("SORT", sort_groups);
        t.register("ZSCORE, ZINCRBY", float_or_nil);
        t.register(
            "FLUSHALL, FLUSHDB, LSET, LTRIM, MSET, PFMERGE, RENAME, SAVE, SELECT, \
             SHUTDOWN, SLAVEOF, WATCH, UNWATCH, CLIENT KILL, CLIENT SETNAME, \
             CONFIG RESETSTAT, CONFIG SET, SCRIPT FLUSH, SCRIPT KILL, SLOWLOG RESET",
            bool_ok,
        );
        t.register("BLPOP, BRPOP", list_or_nil);
        t.register("SDIFF, SINTER, SMEMBERS, SUNION", to_set);
        t.register("ZRANGE, ZRANGEBYSCORE, ZREVRANGE, ZREVRANGEBYSCORE", zset_score_pairs);
        t.register("ZRANK, ZREVRANK", int_or_nil);
        t.register("BGREWRITEAOF, BGSAVE", always_true);
        t.register("CLIENT GETNAME, RANDOMKEY", string_or_nil);
        t.insert("CLIENT LIST", parse_client_list);
        t.insert("CONFIG GET", parse_config_get);
        t.insert("DEBUG OBJECT", parse_debug_object);
        t.insert("HGETALL", pairs_to_map);
        t.insert("HSCAN", parse_hscan);
        t.insert("INFO", parse_info);
        t.insert("LASTSAVE", timestamp);
        t.insert("OBJECT", parse_object);
        t.insert("PING", parse_ping);
        t.register("SCAN, SSCAN", parse_scan);
        t.insert("SCRIPT EXISTS", script_exists);
        t.insert("SCRIPT LOAD", to_text);
        t.insert("SET", parse_set);
        t.insert("SLOWLOG GET", parse_slowlog_get);
        t.insert("TIME", parse_time);
        t.insert("ZSCAN", parse_zscan);
        t
    }
}

impl std::fmt::Debug for CommandTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.decoders.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("CommandTable").field("decoders", &names).finish()
    }
}

// ── Conversion helpers ─────────────────────────────────────────────

fn type_error(expected: &str, raw: &RespValue) -> RedlineError {
    RedlineError::Type(format!("expected {expected}, got {}", raw.type_name()))
}

fn text(raw: &RespValue) -> Result<&str> {
    raw.as_str().ok_or_else(|| type_error("string", raw))
}

fn int_of(raw: &RespValue) -> Result<i64> {
    match raw {
        RespValue::Integer(i) => Ok(*i),
        other => text(other)?
            .trim()
            .parse()
            .map_err(|_| type_error("integer", other)),
    }
}

fn float_of(raw: &RespValue) -> Result<f64> {
    match raw {
        RespValue::Double(f) => Ok(*f),
        RespValue::Integer(i) => Ok(*i as f64),
        other => text(other)?
            .trim()
            .parse()
            .map_err(|_| type_error("float", other)),
    }
}

fn bytes_of(raw: RespValue) -> Result<Bytes> {
    match raw {
        RespValue::BulkString(b) => Ok(b),
        RespValue::SimpleString(s) => Ok(Bytes::from(s)),
        RespValue::VerbatimString { data, .. } => Ok(Bytes::from(data)),
        RespValue::Integer(i) => Ok(Bytes::from(i.to_string())),
        other => Err(type_error("bulk string", &other)),
    }
}

fn items_of(raw: RespValue) -> Result<Vec<RespValue>> {
    match raw {
        RespValue::Array(items) | RespValue::Set(items) => Ok(items),
        RespValue::Null => Ok(Vec::new()),
        RespValue::Map(pairs) => Ok(pairs.into_iter().flat_map(|(k, v)| [k, v]).collect()),
        other => Err(type_error("array", &other)),
    }
}

fn cast_score(raw: RespValue, cast: ScoreCast) -> Result<Value> {
    match cast {
        ScoreCast::Float => float_of(&raw).map(Value::Float),
        ScoreCast::Int => match int_of(&raw) {
            Ok(i) => Ok(Value::Int(i)),
            Err(_) => float_of(&raw).map(|f| Value::Int(f.trunc() as i64)),
        },
        ScoreCast::Raw => bytes_of(raw).map(Value::Bytes),
    }
}

fn scored_pairs(items: Vec<RespValue>, cast: ScoreCast) -> Result<Value> {
    let mut out = Vec::with_capacity(items.len() / 2);
    let mut it = items.into_iter();
    while let Some(member) = it.next() {
        let score = it
            .next()
            .ok_or_else(|| RedlineError::Type("odd number of items in scored reply".into()))?;
        out.push((bytes_of(member)?, cast_score(score, cast)?));
    }
    Ok(Value::Scored(out))
}

// RESP3 servers nest each member/score pair in a two-element array.
fn flatten_pairs(items: Vec<RespValue>) -> Vec<RespValue> {
    if items.iter().all(|i| matches!(i, RespValue::Array(a) if a.len() == 2)) && !items.is_empty() {
        items
            .into_iter()
            .flat_map(|i| match i {
                RespValue::Array(pair) => pair,
                other => vec![other],
            })
            .collect()
    } else {
        items
    }
}

fn map_from_flat(items: Vec<RespValue>) -> Result<Value> {
    let mut pairs = Vec::with_capacity(items.len() / 2);
    let mut it = items.into_iter();
    while let Some(k) = it.next() {
        let v = it
            .next()
            .ok_or_else(|| RedlineError::Type("odd number of items in field/value reply".into()))?;
        pairs.push((Value::from_resp(k)?, Value::from_resp(v)?));
    }
    Ok(Value::Map(pairs))
}

/// Split `s` at `sep` into a string-keyed map.
fn kv_map<'a>(parts: impl Iterator<Item = &'a str>, sep: char) -> Vec<(Value, Value)> {
    parts
        .filter_map(|part| part.split_once(sep))
        .map(|(k, v)| (Value::from(k), Value::from(v)))
        .collect()
}

fn cursor_of(raw: RespValue) -> Result<(u64, RespValue)> {
    let mut items = items_of(raw)?;
    if items.len() != 2 {
        return Err(RedlineError::Type(format!(
            "expected [cursor, items], got {} elements",
            items.len()
        )));
    }
    let page = items.pop().unwrap_or(RespValue::Null);
    let cursor = items.pop().unwrap_or(RespValue::Null);
    let cursor = text(&cursor)?
        .parse()
        .map_err(|_| type_error("cursor", &cursor))?;
    Ok((cursor, page))
}

// ── Decoders ───────────────────────────────────────────────────────

pub fn to_bool(raw: RespValue, _: &CommandOptions) -> Result<Value> {
    Ok(Value::Bool(match &raw {
        RespValue::Integer(i) => *i != 0,
        RespValue::Boolean(b) => *b,
        RespValue::Null => false,
        RespValue::SimpleString(s) => !s.is_empty(),
        RespValue::BulkString(b) => !b.is_empty(),
        other => return Err(type_error("boolean", other)),
    }))
}

pub fn to_int(raw: RespValue, _: &CommandOptions) -> Result<Value> {
    int_of(&raw).map(Value::Int)
}

pub fn to_float(raw: RespValue, _: &CommandOptions) -> Result<Value> {
    float_of(&raw).map(Value::Float)
}

pub fn int_or_nil(raw: RespValue, _: &CommandOptions) -> Result<Value> {
    if raw.is_null() {
        return Ok(Value::Nil);
    }
    int_of(&raw).map(Value::Int)
}

pub fn float_or_nil(raw: RespValue, _: &CommandOptions) -> Result<Value> {
    if raw.is_null() {
        return Ok(Value::Nil);
    }
    float_of(&raw).map(Value::Float)
}

pub fn bool_ok(raw: RespValue, _: &CommandOptions) -> Result<Value> {
    Ok(Value::Bool(raw.as_str() == Some("OK")))
}

/// LPUSH/RPUSH: the new length, or `true` from servers that answer `OK`.
pub fn int_or_ok(raw: RespValue, _: &CommandOptions) -> Result<Value> {
    match raw {
        RespValue::Integer(i) => Ok(Value::Int(i)),
        other => Ok(Value::Bool(other.as_str() == Some("OK"))),
    }
}

pub fn always_true(_: RespValue, _: &CommandOptions) -> Result<Value> {
    Ok(Value::Bool(true))
}

pub fn to_text(raw: RespValue, _: &CommandOptions) -> Result<Value> {
    bytes_of(raw).map(Value::Bytes)
}

pub fn string_or_nil(raw: RespValue, _: &CommandOptions) -> Result<Value> {
    match raw {
        RespValue::Null => Ok(Value::Nil),
        RespValue::BulkString(b) if b.is_empty() => Ok(Value::Nil),
        other => bytes_of(other).map(Value::Bytes),
    }
}

/// SORT with several GET patterns: regroup the flat reply into tuples.
pub fn sort_groups(raw: RespValue, options: &CommandOptions) -> Result<Value> {
    let n = match options.groups {
        Some(n) if n > 0 => n,
        _ => return Value::from_resp(raw),
    };
    let items = items_of(raw)?;
    let mut groups = Vec::with_capacity(items.len() / n);
    let mut it = items.into_iter().peekable();
    while it.peek().is_some() {
        let group = it.by_ref().take(n).map(Value::from_resp).collect::<Result<Vec<_>>>()?;
        if group.len() == n {
            groups.push(Value::List(group));
        }
    }
    Ok(Value::List(groups))
}

pub fn list_or_nil(raw: RespValue, _: &CommandOptions) -> Result<Value> {
    match raw {
        RespValue::Null => Ok(Value::Nil),
        RespValue::Array(items) if items.is_empty() => Ok(Value::Nil),
        other => Value::from_resp(other),
    }
}

pub fn to_set(raw: RespValue, _: &CommandOptions) -> Result<Value> {
    let mut members: Vec<Value> = Vec::new();
    for item in items_of(raw)? {
        let value = Value::from_resp(item)?;
        if !members.contains(&value) {
            members.push(value);
        }
    }
    Ok(Value::Set(members))
}

pub fn zset_score_pairs(raw: RespValue, options: &CommandOptions) -> Result<Value> {
    if !options.withscores || raw.is_null() {
        return Value::from_resp(raw);
    }
    scored_pairs(flatten_pairs(items_of(raw)?), options.score_cast)
}

pub fn parse_zscan(raw: RespValue, options: &CommandOptions) -> Result<Value> {
    let (cursor, page) = cursor_of(raw)?;
    let items = scored_pairs(items_of(page)?, options.score_cast)?;
    Ok(Value::Cursor { cursor, items: Box::new(items) })
}

pub fn parse_scan(raw: RespValue, _: &CommandOptions) -> Result<Value> {
    let (cursor, page) = cursor_of(raw)?;
    let items = Value::List(items_of(page)?.into_iter().map(Value::from_resp).collect::<Result<_>>()?);
    Ok(Value::Cursor { cursor, items: Box::new(items) })
}

pub fn parse_hscan(raw: RespValue, _: &CommandOptions) -> Result<Value> {
    let (cursor, page) = cursor_of(raw)?;
    let items = map_from_flat(items_of(page)?)?;
    Ok(Value::Cursor { cursor, items: Box::new(items) })
}

pub fn pairs_to_map(raw: RespValue, _: &CommandOptions) -> Result<Value> {
    map_from_flat(items_of(raw)?)
}

pub fn parse_config_get(raw: RespValue, _: &CommandOptions) -> Result<Value> {
    map_from_flat(items_of(raw)?)
}

/// CLIENT LIST: one `k=v k=v …` line per client.
pub fn parse_client_list(raw: RespValue, _: &CommandOptions) -> Result<Value> {
    let clients = text(&raw)?
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| Value::Map(kv_map(line.split(' '), '=')))
        .collect();
    Ok(Value::List(clients))
}

/// DEBUG OBJECT: `Value at:0x… refcount:1 encoding:raw …`. The leading word
/// is the object type and carries no key.
pub fn parse_debug_object(raw: RespValue, _: &CommandOptions) -> Result<Value> {
    const INT_FIELDS: [&str; 4] = ["refcount", "serializedlength", "lru", "lru_seconds_idle"];
    let line = format!("type:{}", text(&raw)?);
    let fields = line
        .split_whitespace()
        .filter_map(|kv| kv.split_once(':'))
        .map(|(k, v)| {
            let value = match v.parse::<i64>() {
                Ok(i) if INT_FIELDS.contains(&k) => Value::Int(i),
                _ => Value::from(v),
            };
            (Value::from(k), value)
        })
        .collect();
    Ok(Value::Map(fields))
}

fn info_value(raw: &str) -> Value {
    if raw.contains(',') && raw.contains('=') {
        let sub = raw
            .split(',')
            .filter_map(|item| item.rsplit_once('='))
            .map(|(k, v)| (Value::from(k), info_value(v)))
            .collect();
        return Value::Map(sub);
    }
    if raw.contains('.') {
        if let Ok(f) = raw.parse::<f64>() {
            return Value::Float(f);
        }
    } else if let Ok(i) = raw.parse::<i64>() {
        return Value::Int(i);
    }
    Value::from(raw)
}

/// INFO: `key:value` lines, section headers skipped. Lines without a colon
/// are collected under `__raw__`.
pub fn parse_info(raw: RespValue, _: &CommandOptions) -> Result<Value> {
    let mut fields = Vec::new();
    let mut unparsed = Vec::new();
    for line in text(&raw)?.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match line.split_once(':') {
            Some((k, v)) => fields.push((Value::from(k), info_value(v))),
            None => unparsed.push(Value::from(line)),
        }
    }
    if !unparsed.is_empty() {
        fields.push((Value::from("__raw__"), Value::List(unparsed)));
    }
    Ok(Value::Map(fields))
}

pub fn timestamp(raw: RespValue, _: &CommandOptions) -> Result<Value> {
    match int_of(&raw) {
        Ok(secs) if secs > 0 => Ok(Value::Timestamp(UNIX_EPOCH + Duration::from_secs(secs as u64))),
        _ => Ok(Value::Nil),
    }
}

pub fn parse_object(raw: RespValue, options: &CommandOptions) -> Result<Value> {
    match options.infotype.as_deref().map(str::to_ascii_lowercase).as_deref() {
        Some("idletime") | Some("refcount") => int_or_nil(raw, options),
        _ => Value::from_resp(raw),
    }
}

pub fn parse_ping(raw: RespValue, _: &CommandOptions) -> Result<Value> {
    Ok(Value::Bool(raw.as_str() == Some("PONG")))
}

pub fn script_exists(raw: RespValue, _: &CommandOptions) -> Result<Value> {
    let flags = items_of(raw)?
        .iter()
        .map(|item| int_of(item).map(|i| Value::Bool(i != 0)))
        .collect::<Result<_>>()?;
    Ok(Value::List(flags))
}

/// SET: `true` on OK, `false` when NX/XX prevented the write.
pub fn parse_set(raw: RespValue, _: &CommandOptions) -> Result<Value> {
    Ok(Value::Bool(raw.as_str() == Some("OK")))
}

/// SLOWLOG GET: `[id, start_time, duration, [argv…], …]` per entry.
pub fn parse_slowlog_get(raw: RespValue, _: &CommandOptions) -> Result<Value> {
    let mut entries = Vec::new();
    for entry in items_of(raw)? {
        let fields = items_of(entry)?;
        if fields.len() < 4 {
            return Err(RedlineError::Type("short SLOWLOG entry".into()));
        }
        let mut fields = fields.into_iter();
        let id = fields.next().unwrap_or(RespValue::Null);
        let start = fields.next().unwrap_or(RespValue::Null);
        let duration = fields.next().unwrap_or(RespValue::Null);
        let argv = items_of(fields.next().unwrap_or(RespValue::Null))?
            .into_iter()
            .map(bytes_of)
            .collect::<Result<Vec<_>>>()?;
        let command = argv.join(&b' ');
        entries.push(Value::Map(vec![
            (Value::from("id"), Value::Int(int_of(&id)?)),
            (Value::from("start_time"), Value::Int(int_of(&start)?)),
            (Value::from("duration"), Value::Int(int_of(&duration)?)),
            (Value::from("command"), Value::Bytes(Bytes::from(command))),
        ]));
    }
    Ok(Value::List(entries))
}

pub fn parse_time(raw: RespValue, _: &CommandOptions) -> Result<Value> {
    let items = items_of(raw)?;
    match items.as_slice() {
        [secs, micros] => Ok(Value::Time { seconds: int_of(secs)?, micros: int_of(micros)? }),
        _ => Err(RedlineError::Type("TIME reply must have two elements".into())),
    }
}

/// Seconds since the epoch of a [`Value::Timestamp`], for display.
pub fn unix_seconds(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

// ── Tests ──────────────────────────────────────────────────────────
