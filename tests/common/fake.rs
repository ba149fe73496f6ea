//! In-memory Redis stand-in that implements the `Connection` and `Pool`
//! traits, so the pipeline engine can be driven without a server.
//!
//! It keeps a tiny keyspace with per-key versions (for WATCH), per
//! connection MULTI queues, a script cache, and hooks to inject dropped
//! connections and read timeouts.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use redline::resp::{encode_pipeline, parse_slice, RespValue};
use redline::{Client, Command, CommandTable, Connection, Pool, RedlineError, Result};

enum Entry {
    Str(Bytes),
    Hash(Vec<(Bytes, Bytes)>),
    Set(BTreeSet<Bytes>),
    List(VecDeque<Bytes>),
}

#[derive(Default)]
struct Store {
    data: HashMap<Bytes, Entry>,
    versions: HashMap<Bytes, u64>,
    clock: u64,
    scripts: HashMap<String, String>,
}

impl Store {
    fn version(&self, key: &[u8]) -> u64 {
        self.versions.get(key).copied().unwrap_or(0)
    }

    fn touch(&mut self, key: &Bytes) {
        self.clock += 1;
        self.versions.insert(key.clone(), self.clock);
    }
}

/// Server-side state of one socket.
#[derive(Default)]
struct Session {
    watched: Vec<(Bytes, u64)>,
    queued: Option<Vec<Vec<Bytes>>>,
    dirty: bool,
    replies: VecDeque<RespValue>,
}

#[derive(Default)]
pub struct FakeServer {
    store: Mutex<Store>,
    log: Mutex<Vec<String>>,
    hangups: AtomicUsize,
    timeouts: AtomicUsize,
    /// Sockets opened so far.
    pub connections: AtomicUsize,
    /// Sockets closed by the client.
    pub disconnects: AtomicUsize,
}

pub fn sha_of(source: &str) -> String {
    let mut h = DefaultHasher::new();
    source.hash(&mut h);
    format!("{:040x}", h.finish())
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

impl FakeServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn client(self: &Arc<Self>) -> Client<FakePool> {
        self.client_with(false)
    }

    pub fn client_with(self: &Arc<Self>, retry_on_timeout: bool) -> Client<FakePool> {
        let pool = FakePool {
            server: self.clone(),
            idle: Mutex::new(Vec::new()),
            retry_on_timeout,
            checked_out: AtomicUsize::new(0),
        };
        Client::with_pool(Arc::new(pool), CommandTable::default())
    }

    /// The next `n` writes fail as if the socket had been reset.
    pub fn hang_up_next_sends(&self, n: usize) {
        self.hangups.store(n, Ordering::SeqCst);
    }

    /// The next `n` reads time out; the commands were still executed.
    pub fn time_out_next_reads(&self, n: usize) {
        self.timeouts.store(n, Ordering::SeqCst);
    }

    /// Every command the server processed, as space-joined words.
    pub fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    /// How many processed commands start with `name`.
    pub fn count(&self, name: &str) -> usize {
        self.log
            .lock()
            .iter()
            .filter(|line| line.split(' ').next() == Some(name))
            .count()
    }

    pub fn clear_log(&self) {
        self.log.lock().clear();
    }

    /// Read a string key directly, bypassing any connection.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        match self.store.lock().data.get(key.as_bytes()) {
            Some(Entry::Str(v)) => Some(v.clone()),
            _ => None,
        }
    }

    /// Write a string key as another client would, bumping its version.
    pub fn set(&self, key: &str, value: &str) {
        let key = Bytes::copy_from_slice(key.as_bytes());
        let mut store = self.store.lock();
        store
            .data
            .insert(key.clone(), Entry::Str(Bytes::copy_from_slice(value.as_bytes())));
        store.touch(&key);
    }

    pub fn flush_scripts(&self) {
        self.store.lock().scripts.clear();
    }

    fn handle(&self, session: &mut Session, args: &[Bytes]) -> RespValue {
        let name = String::from_utf8_lossy(&args[0]).to_ascii_uppercase();
        self.log.lock().push(
            args.iter()
                .map(|a| String::from_utf8_lossy(a).into_owned())
                .collect::<Vec<_>>()
                .join(" "),
        );
        let mut store = self.store.lock();

        if session.queued.is_some() {
            match name.as_str() {
                "EXEC" => {}
                "DISCARD" => {
                    session.queued = None;
                    session.dirty = false;
                    session.watched.clear();
                    return ok();
                }
                "MULTI" => return err("ERR MULTI calls can not be nested"),
                "WATCH" => {
                    session.dirty = true;
                    return err("ERR WATCH inside MULTI is not allowed");
                }
                _ => {
                    if let Some(e) = check_arity(&name, args.len()) {
                        session.dirty = true;
                        return e;
                    }
                    if let Some(queue) = session.queued.as_mut() {
                        queue.push(args.to_vec());
                    }
                    return RespValue::SimpleString("QUEUED".into());
                }
            }
        }

        match name.as_str() {
            "MULTI" => {
                session.queued = Some(Vec::new());
                session.dirty = false;
                ok()
            }
            "EXEC" => {
                let Some(queue) = session.queued.take() else {
                    return err("ERR EXEC without MULTI");
                };
                let watched = std::mem::take(&mut session.watched);
                if std::mem::take(&mut session.dirty) {
                    return err("EXECABORT Transaction discarded because of previous errors.");
                }
                if watched.iter().any(|(k, v)| store.version(k) != *v) {
                    return RespValue::Null;
                }
                RespValue::Array(queue.iter().map(|cmd| run(&mut store, cmd)).collect())
            }
            "DISCARD" => err("ERR DISCARD without MULTI"),
            "WATCH" => {
                if let Some(e) = check_arity(&name, args.len()) {
                    return e;
                }
                for key in &args[1..] {
                    let version = store.version(key);
                    session.watched.push((key.clone(), version));
                }
                ok()
            }
            "UNWATCH" => {
                session.watched.clear();
                ok()
            }
            _ => match check_arity(&name, args.len()) {
                Some(e) => e,
                None => run(&mut store, args),
            },
        }
    }
}

fn ok() -> RespValue {
    RespValue::SimpleString("OK".into())
}

fn err(msg: impl Into<String>) -> RespValue {
    RespValue::Error(msg.into())
}

fn int(n: i64) -> RespValue {
    RespValue::Integer(n)
}

fn bulk(b: &Bytes) -> RespValue {
    RespValue::BulkString(b.clone())
}

fn wrongtype() -> RespValue {
    err("WRONGTYPE Operation against a key holding the wrong kind of value")
}

fn not_int() -> RespValue {
    err("ERR value is not an integer or out of range")
}

fn parse_i64(b: &[u8]) -> Option<i64> {
    std::str::from_utf8(b).ok()?.parse().ok()
}

/// Minimum argument count (name included) of every supported command.
fn check_arity(name: &str, argc: usize) -> Option<RespValue> {
    let min = match name {
        "PING" | "MULTI" | "EXEC" | "DISCARD" | "UNWATCH" => 1,
        "ECHO" | "GET" | "DEL" | "EXISTS" | "INCR" | "MGET" | "HGETALL" | "SMEMBERS"
        | "WATCH" | "SCRIPT" => 2,
        "SET" | "INCRBY" | "DECRBY" | "HGET" | "SADD" | "RPUSH" | "LPUSH" | "EVALSHA"
        | "EVAL" => 3,
        "HSET" | "LRANGE" => 4,
        _ => return Some(err(format!("ERR unknown command '{name}'"))),
    };
    if argc < min {
        return Some(err(format!(
            "ERR wrong number of arguments for '{}' command",
            name.to_ascii_lowercase()
        )));
    }
    None
}

fn has_flag(args: &[Bytes], flag: &str) -> bool {
    args.iter().any(|a| a.eq_ignore_ascii_case(flag.as_bytes()))
}

fn run(store: &mut Store, args: &[Bytes]) -> RespValue {
    let name = String::from_utf8_lossy(&args[0]).to_ascii_uppercase();
    let a = &args[1..];
    match name.as_str() {
        "PING" => RespValue::SimpleString("PONG".into()),
        "ECHO" => bulk(&a[0]),
        "GET" => match store.data.get(&a[0]) {
            None => RespValue::Null,
            Some(Entry::Str(v)) => bulk(v),
            Some(_) => wrongtype(),
        },
        "SET" => {
            let exists = store.data.contains_key(&a[0]);
            if (has_flag(&a[2..], "NX") && exists) || (has_flag(&a[2..], "XX") && !exists) {
                return RespValue::Null;
            }
            store.data.insert(a[0].clone(), Entry::Str(a[1].clone()));
            store.touch(&a[0]);
            ok()
        }
        "DEL" => {
            let mut removed = 0;
            for key in a {
                if store.data.remove(key).is_some() {
                    store.touch(key);
                    removed += 1;
                }
            }
            int(removed)
        }
        "EXISTS" => int(a.iter().filter(|k| store.data.contains_key(*k)).count() as i64),
        "INCR" | "INCRBY" | "DECRBY" => {
            let delta = if name == "INCR" {
                1
            } else {
                match parse_i64(&a[1]) {
                    Some(d) if name == "DECRBY" => -d,
                    Some(d) => d,
                    None => return not_int(),
                }
            };
            let current = match store.data.get(&a[0]) {
                None => 0,
                Some(Entry::Str(v)) => match parse_i64(v) {
                    Some(n) => n,
                    None => return not_int(),
                },
                Some(_) => return wrongtype(),
            };
            let next = current + delta;
            store
                .data
                .insert(a[0].clone(), Entry::Str(Bytes::from(next.to_string())));
            store.touch(&a[0]);
            int(next)
        }
        "MGET" => RespValue::Array(
            a.iter()
                .map(|k| match store.data.get(k) {
                    Some(Entry::Str(v)) => bulk(v),
                    _ => RespValue::Null,
                })
                .collect(),
        ),
        "HSET" => {
            let entry = store
                .data
                .entry(a[0].clone())
                .or_insert_with(|| Entry::Hash(Vec::new()));
            let Entry::Hash(fields) = entry else {
                return wrongtype();
            };
            let mut added = 0;
            for pair in a[1..].chunks(2) {
                let [field, value] = pair else { break };
                match fields.iter_mut().find(|(f, _)| f == field) {
                    Some((_, v)) => *v = value.clone(),
                    None => {
                        fields.push((field.clone(), value.clone()));
                        added += 1;
                    }
                }
            }
            store.touch(&a[0]);
            int(added)
        }
        "HGET" => match store.data.get(&a[0]) {
            None => RespValue::Null,
            Some(Entry::Hash(fields)) => fields
                .iter()
                .find(|(f, _)| f == &a[1])
                .map(|(_, v)| bulk(v))
                .unwrap_or(RespValue::Null),
            Some(_) => wrongtype(),
        },
        "HGETALL" => match store.data.get(&a[0]) {
            None => RespValue::Array(Vec::new()),
            Some(Entry::Hash(fields)) => RespValue::Array(
                fields.iter().flat_map(|(f, v)| [bulk(f), bulk(v)]).collect(),
            ),
            Some(_) => wrongtype(),
        },
        "SADD" => {
            let entry = store
                .data
                .entry(a[0].clone())
                .or_insert_with(|| Entry::Set(BTreeSet::new()));
            let Entry::Set(members) = entry else {
                return wrongtype();
            };
            let added = a[1..].iter().filter(|m| members.insert((*m).clone())).count();
            store.touch(&a[0]);
            int(added as i64)
        }
        "SMEMBERS" => match store.data.get(&a[0]) {
            None => RespValue::Array(Vec::new()),
            Some(Entry::Set(members)) => RespValue::Array(members.iter().map(bulk).collect()),
            Some(_) => wrongtype(),
        },
        "RPUSH" | "LPUSH" => {
            let entry = store
                .data
                .entry(a[0].clone())
                .or_insert_with(|| Entry::List(VecDeque::new()));
            let Entry::List(items) = entry else {
                return wrongtype();
            };
            for v in &a[1..] {
                if name == "RPUSH" {
                    items.push_back(v.clone());
                } else {
                    items.push_front(v.clone());
                }
            }
            let len = items.len() as i64;
            store.touch(&a[0]);
            int(len)
        }
        "LRANGE" => {
            let (Some(start), Some(stop)) = (parse_i64(&a[1]), parse_i64(&a[2])) else {
                return not_int();
            };
            match store.data.get(&a[0]) {
                None => RespValue::Array(Vec::new()),
                Some(Entry::List(items)) => {
                    let len = items.len() as i64;
                    let norm = |i: i64| if i < 0 { (len + i).max(0) } else { i };
                    let (from, to) = (norm(start), norm(stop).min(len - 1));
                    if len == 0 || from > to {
                        return RespValue::Array(Vec::new());
                    }
                    RespValue::Array(
                        items
                            .iter()
                            .skip(from as usize)
                            .take((to - from + 1) as usize)
                            .map(bulk)
                            .collect(),
                    )
                }
                Some(_) => wrongtype(),
            }
        }
        "SCRIPT" => match String::from_utf8_lossy(&a[0]).to_ascii_uppercase().as_str() {
            "EXISTS" => RespValue::Array(
                a[1..]
                    .iter()
                    .map(|sha| {
                        let sha = String::from_utf8_lossy(sha);
                        int(i64::from(store.scripts.contains_key(&*sha)))
                    })
                    .collect(),
            ),
            "LOAD" if a.len() == 2 => {
                let source = String::from_utf8_lossy(&a[1]).into_owned();
                let sha = sha_of(&source);
                store.scripts.insert(sha.clone(), source);
                RespValue::BulkString(Bytes::from(sha))
            }
            "FLUSH" => {
                store.scripts.clear();
                ok()
            }
            _ => err("ERR unknown subcommand"),
        },
        // Scripts "run" by echoing their source back.
        "EVALSHA" => match store.scripts.get(&*String::from_utf8_lossy(&a[0])) {
            Some(source) => RespValue::BulkString(Bytes::from(source.clone())),
            None => err("NOSCRIPT No matching script. Please use EVAL."),
        },
        "EVAL" => bulk(&a[0]),
        _ => err(format!("ERR unknown command '{name}'")),
    }
}

/// One client socket. It (re)opens lazily on the next send.
pub struct FakeConn {
    server: Arc<FakeServer>,
    session: Option<Session>,
    retry_on_timeout: bool,
}

impl FakeConn {
    fn check_hangup(&mut self) -> Result<()> {
        if take_one(&self.server.hangups) {
            self.session = None;
            return Err(RedlineError::Connection(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            )));
        }
        Ok(())
    }

    fn process(&mut self, args: Vec<Bytes>) {
        if self.session.is_none() {
            self.server.connections.fetch_add(1, Ordering::SeqCst);
        }
        let server = self.server.clone();
        let session = self.session.get_or_insert_with(Session::default);
        let reply = server.handle(session, &args);
        session.replies.push_back(reply);
    }
}

impl Connection for FakeConn {
    async fn send_command(&mut self, command: &Command) -> Result<()> {
        self.check_hangup()?;
        self.process(command.tokens().to_vec());
        Ok(())
    }

    async fn send_packed_command(&mut self, packed: &[u8]) -> Result<()> {
        self.check_hangup()?;
        let mut pos = 0;
        while pos < packed.len() {
            let (frame, used) = parse_slice(&packed[pos..])?;
            pos += used;
            if let RespValue::Array(parts) = frame {
                let args = parts
                    .into_iter()
                    .filter_map(|p| match p {
                        RespValue::BulkString(b) => Some(b),
                        _ => None,
                    })
                    .collect();
                self.process(args);
            }
        }
        Ok(())
    }

    fn pack_commands(&self, commands: &[Command]) -> Vec<u8> {
        encode_pipeline(commands.iter().map(Command::tokens))
    }

    async fn read_response(&mut self) -> Result<RespValue> {
        if take_one(&self.server.timeouts) {
            return Err(RedlineError::Timeout("no reply from fake server".into()));
        }
        match self.session.as_mut().and_then(|s| s.replies.pop_front()) {
            Some(reply) => Ok(reply),
            None => Err(RedlineError::Connection(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed by server",
            ))),
        }
    }

    fn disconnect(&mut self) {
        if self.session.take().is_some() {
            self.server.disconnects.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn retry_on_timeout(&self) -> bool {
        self.retry_on_timeout
    }
}

pub struct FakePool {
    server: Arc<FakeServer>,
    idle: Mutex<Vec<FakeConn>>,
    retry_on_timeout: bool,
    /// Connections currently handed out.
    pub checked_out: AtomicUsize,
}

impl FakePool {
    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }
}

impl Pool for FakePool {
    type Conn = FakeConn;

    async fn get_connection(&self, _command_name: &str, _shard_hint: Option<&str>) -> Result<FakeConn> {
        self.checked_out.fetch_add(1, Ordering::SeqCst);
        let reused = self.idle.lock().pop();
        Ok(reused.unwrap_or_else(|| FakeConn {
            server: self.server.clone(),
            session: None,
            retry_on_timeout: self.retry_on_timeout,
        }))
    }

    fn release(&self, conn: FakeConn) {
        self.checked_out.fetch_sub(1, Ordering::SeqCst);
        if conn.session.is_some() {
            self.idle.lock().push(conn);
        }
    }
}
