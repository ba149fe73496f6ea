//! Pipelines and MULTI/EXEC transactions.
//!
//! A [`Pipeline`] buffers commands and sends them in one write when
//! [`Pipeline::execute`] is awaited. With `transaction` set (or after an
//! explicit [`Pipeline::multi`]) the batch is framed as `MULTI … EXEC` and
//! runs atomically.
//!
//! Optimistic locking follows the usual Redis pattern:
//!
//! 1. [`Pipeline::watch`] the keys. From then on commands run immediately
//!    so the caller can read current values.
//! 2. [`Pipeline::multi`], then stage the writes.
//! 3. [`Pipeline::execute`]. If a watched key changed, this fails with
//!    [`RedlineError::Watch`] and the whole cycle should be retried.
//!
//! The pipeline holds at most one pooled connection. It is returned to the
//! pool by [`Pipeline::reset`], which `execute` always runs before
//! returning.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::callbacks::CommandTable;
use crate::command::{Command, ToArg};
use crate::commands::script::{evalsha, script_exists, script_load};
use crate::connection::{round_trip, Connection, Pool};
use crate::error::{RedisErrorKind, RedlineError, Result};
use crate::resp::types::RespValue;
use crate::script::Script;
use crate::value::Value;

/// Commands whose successful reply ends every WATCH on the connection.
const UNWATCH_COMMANDS: [&str; 3] = ["DISCARD", "EXEC", "UNWATCH"];

/// Per-command results of one `execute`, in staging order.
pub type Replies = Vec<Result<Value>>;

/// What [`Pipeline::execute_command`] did with a command.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Buffered until the next `execute`.
    Queued,
    /// Sent immediately (the pipeline is watching); this is its reply.
    Value(Value),
}

impl Outcome {
    pub fn is_queued(&self) -> bool {
        matches!(self, Outcome::Queued)
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Outcome::Queued => None,
            Outcome::Value(v) => Some(v),
        }
    }
}

/// Batches commands over one connection checked out from `P`.
pub struct Pipeline<P: Pool> {
    pool: Arc<P>,
    table: Arc<CommandTable>,
    connection: Option<P::Conn>,
    transaction: bool,
    shard_hint: Option<String>,
    stack: Vec<Command>,
    scripts: Vec<Arc<Script>>,
    watching: bool,
    explicit_transaction: bool,
}

impl<P: Pool> Pipeline<P> {
    pub fn new(
        pool: Arc<P>,
        table: Arc<CommandTable>,
        transaction: bool,
        shard_hint: Option<String>,
    ) -> Self {
        Self {
            pool,
            table,
            connection: None,
            transaction,
            shard_hint,
            stack: Vec::new(),
            scripts: Vec::new(),
            watching: false,
            explicit_transaction: false,
        }
    }

    /// Number of staged commands.
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn is_watching(&self) -> bool {
        self.watching
    }

    /// True after [`Pipeline::multi`] until the next reset.
    pub fn in_transaction(&self) -> bool {
        self.explicit_transaction
    }

    /// Buffer a command for the next `execute`, regardless of watch state.
    pub fn stage(&mut self, command: Command) -> &mut Self {
        self.stack.push(command);
        self
    }

    /// Run `command` now if the pipeline is watching (or it is a WATCH)
    /// and no MULTI has been issued; otherwise stage it.
    pub async fn execute_command(&mut self, command: Command) -> Result<Outcome> {
        if (self.watching || command.name() == "WATCH") && !self.explicit_transaction {
            return self
                .immediate_execute_command(&command)
                .await
                .map(Outcome::Value);
        }
        self.stage(command);
        Ok(Outcome::Queued)
    }

    /// Send one command and read its reply right away.
    ///
    /// A transport failure is retried once on a fresh socket, unless the
    /// pipeline is watching: the WATCH died with the old socket, so the
    /// pipeline is reset and a [`RedlineError::Watch`] returned instead.
    /// Timeouts follow the same watch rule and are otherwise retried only
    /// with `retry_on_timeout`.
    pub async fn immediate_execute_command(&mut self, command: &Command) -> Result<Value> {
        if self.connection.is_none() {
            let conn = self
                .pool
                .get_connection(command.name(), self.shard_hint.as_deref())
                .await?;
            self.connection = Some(conn);
        }
        let Some(conn) = self.connection.as_mut() else {
            return Err(RedlineError::Usage("pipeline has no connection".into()));
        };

        let raw = match round_trip(conn, command).await {
            Err(e) if e.is_transient() => {
                conn.disconnect();
                if self.watching {
                    warn!(command = command.name(), error = %e, "connection lost while watching");
                    // the server dropped the WATCH along with the socket
                    self.watching = false;
                    self.reset().await;
                    return Err(RedlineError::Watch(
                        "a connection error occurred while watching one or more keys".into(),
                    ));
                }
                if e.is_timeout() && !conn.retry_on_timeout() {
                    return Err(e);
                }
                debug!(command = command.name(), error = %e, "retrying command");
                match round_trip(conn, command).await {
                    Ok(raw) => raw,
                    Err(retry_err) => {
                        conn.disconnect();
                        self.reset().await;
                        return Err(retry_err);
                    }
                }
            }
            Err(e) => {
                if breaks_connection(&e) {
                    conn.disconnect();
                    if self.watching {
                        self.watching = false;
                        self.reset().await;
                    }
                }
                return Err(e);
            }
            Ok(raw) => raw,
        };

        self.track_watch(command.name(), &raw);
        self.table.decode(command.name(), raw, command.options())
    }

    fn track_watch(&mut self, name: &str, raw: &RespValue) {
        if raw.is_error() {
            return;
        }
        if UNWATCH_COMMANDS.contains(&name) {
            self.watching = false;
        } else if name == "WATCH" {
            self.watching = true;
        }
    }

    /// WATCH `keys` immediately. Not allowed after MULTI.
    pub async fn watch<I>(&mut self, keys: I) -> Result<Value>
    where
        I: IntoIterator,
        I::Item: ToArg,
    {
        if self.explicit_transaction {
            return Err(RedlineError::Usage("Cannot issue a WATCH after a MULTI".into()));
        }
        let command = Command::new("WATCH").args(keys);
        debug!(keys = %command.display_args(), "watching");
        self.immediate_execute_command(&command).await
    }

    /// UNWATCH immediately if watching; otherwise succeed without I/O.
    pub async fn unwatch(&mut self) -> Result<Value> {
        if !self.watching {
            return Ok(Value::Bool(true));
        }
        self.immediate_execute_command(&Command::new("UNWATCH")).await
    }

    /// Start buffering the transaction body after WATCH.
    pub fn multi(&mut self) -> Result<()> {
        if self.explicit_transaction {
            return Err(RedlineError::Usage("Cannot issue nested calls to MULTI".into()));
        }
        if !self.stack.is_empty() {
            return Err(RedlineError::Usage(
                "Commands without an initial WATCH have already been issued".into(),
            ));
        }
        self.explicit_transaction = true;
        Ok(())
    }

    /// Clear staged commands and scripts, end any WATCH and hand the
    /// connection back to the pool. Safe to call repeatedly.
    pub async fn reset(&mut self) {
        self.stack.clear();
        self.scripts.clear();

        if self.watching {
            if let Some(conn) = self.connection.as_mut() {
                let unwatched = round_trip(conn, &Command::new("UNWATCH")).await;
                let failed = match &unwatched {
                    Ok(raw) => raw.is_error(),
                    Err(_) => true,
                };
                // closing the socket drops the server-side WATCH as well
                if failed {
                    debug!("UNWATCH failed during reset, dropping connection");
                    conn.disconnect();
                }
            }
        }

        self.watching = false;
        self.explicit_transaction = false;
        if let Some(conn) = self.connection.take() {
            self.pool.release(conn);
        }
    }

    /// Make sure `script` has a SHA (loading it now if needed) and register
    /// it for the pre-flight check in `execute`.
    pub async fn script_load_for_pipeline(&mut self, script: &Arc<Script>) -> Result<()> {
        if script.sha().is_none() {
            self.load_script(script).await?;
        }
        if !self.scripts.iter().any(|s| Arc::ptr_eq(s, script)) {
            self.scripts.push(script.clone());
        }
        Ok(())
    }

    /// Run `script` through EVALSHA as part of this pipeline.
    pub async fn eval_script<K, A>(&mut self, script: &Arc<Script>, keys: K, args: A) -> Result<Outcome>
    where
        K: IntoIterator,
        K::Item: ToArg,
        A: IntoIterator,
        A::Item: ToArg,
    {
        let keys: Vec<Bytes> = keys.into_iter().map(|k| k.to_arg()).collect();
        let args: Vec<Bytes> = args.into_iter().map(|a| a.to_arg()).collect();
        self.script_load_for_pipeline(script).await?;
        let sha = script
            .sha()
            .ok_or_else(|| RedlineError::Type("script SHA is unresolved".into()))?;
        self.execute_command(evalsha(&sha, keys, args)).await
    }

    async fn load_script(&mut self, script: &Script) -> Result<String> {
        let reply = self.immediate_execute_command(&script_load(script.source())).await?;
        let sha = reply
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| RedlineError::Type("SCRIPT LOAD did not return a SHA".into()))?;
        debug!(%sha, "loaded script");
        script.set_sha(sha.clone());
        Ok(sha)
    }

    /// SCRIPT EXISTS for every registered script, SCRIPT LOAD for the
    /// missing ones.
    async fn load_scripts(&mut self) -> Result<()> {
        let scripts = self.scripts.clone();
        let mut missing: Vec<Arc<Script>> = Vec::new();
        let mut known: Vec<(Arc<Script>, String)> = Vec::new();
        for script in scripts {
            match script.sha() {
                Some(sha) => known.push((script, sha)),
                None => missing.push(script),
            }
        }

        if !known.is_empty() {
            let exists = self
                .immediate_execute_command(&script_exists(known.iter().map(|(_, sha)| sha.as_str())))
                .await?;
            let flags = exists.as_list().unwrap_or(&[]);
            for (i, (script, _)) in known.iter().enumerate() {
                if flags.get(i).and_then(Value::as_bool) != Some(true) {
                    missing.push(script.clone());
                }
            }
        }

        for script in missing {
            self.load_script(&script).await?;
        }
        Ok(())
    }

    /// Send every staged command and collect the replies in order.
    ///
    /// With `raise_on_error` the first failed command is returned as `Err`;
    /// otherwise failures stay in place in the returned list. The pipeline
    /// is reset afterwards in every case.
    pub async fn execute(&mut self, raise_on_error: bool) -> Result<Replies> {
        if self.stack.is_empty() && !self.explicit_transaction {
            self.reset().await;
            return Ok(Vec::new());
        }
        let result = self.execute_stack(raise_on_error).await;
        self.reset().await;
        result
    }

    async fn execute_stack(&mut self, raise_on_error: bool) -> Result<Replies> {
        if !self.scripts.is_empty() {
            self.load_scripts().await?;
        }
        let transactional = self.transaction || self.explicit_transaction;

        if self.connection.is_none() {
            let conn = self
                .pool
                .get_connection("MULTI", self.shard_hint.as_deref())
                .await?;
            self.connection = Some(conn);
        }
        let Some(conn) = self.connection.as_mut() else {
            return Err(RedlineError::Usage("pipeline has no connection".into()));
        };

        let replies = match run_stack(conn, &self.table, &self.stack, transactional, raise_on_error).await {
            Err(e) if e.is_transient() => {
                conn.disconnect();
                if self.watching {
                    warn!(error = %e, "connection lost while watching");
                    self.watching = false;
                    return Err(RedlineError::Watch(
                        "a connection error occurred while watching one or more keys".into(),
                    ));
                }
                if e.is_timeout() && !conn.retry_on_timeout() {
                    return Err(e);
                }
                warn!(error = %e, commands = self.stack.len(), "retrying pipeline");
                let retried = run_stack(conn, &self.table, &self.stack, transactional, raise_on_error).await;
                if matches!(&retried, Err(e) if breaks_connection(e)) {
                    conn.disconnect();
                }
                retried
            }
            Err(e @ RedlineError::Protocol(_)) => {
                conn.disconnect();
                Err(e)
            }
            other => other,
        };

        if transactional {
            self.watching = false;
        }
        replies
    }
}

impl<P: Pool> Drop for Pipeline<P> {
    fn drop(&mut self) {
        if let Some(mut conn) = self.connection.take() {
            // the WATCH cannot be cleared synchronously; closing the socket does it
            if self.watching {
                conn.disconnect();
            }
            self.pool.release(conn);
        }
    }
}

/// Errors after which the socket cannot be reused: the peer is gone or the
/// reply stream is out of sync.
fn breaks_connection(e: &RedlineError) -> bool {
    e.is_transient() || matches!(e, RedlineError::Protocol(_))
}

async fn run_stack<C: Connection>(
    conn: &mut C,
    table: &CommandTable,
    commands: &[Command],
    transactional: bool,
    raise_on_error: bool,
) -> Result<Replies> {
    let replies = if transactional {
        execute_transaction(conn, table, commands).await?
    } else {
        execute_pipeline(conn, table, commands).await?
    };
    if raise_on_error {
        let values = replies.into_iter().collect::<Result<Vec<_>>>()?;
        return Ok(values.into_iter().map(Ok).collect());
    }
    Ok(replies)
}

fn decode_reply(
    table: &CommandTable,
    number: usize,
    command: &Command,
    reply: Result<RespValue>,
) -> Result<Value> {
    reply
        .and_then(|raw| table.decode(command.name(), raw, command.options()))
        .map_err(|e| e.annotate(number, command))
}

async fn execute_pipeline<C: Connection>(
    conn: &mut C,
    table: &CommandTable,
    commands: &[Command],
) -> Result<Replies> {
    let packed = conn.pack_commands(commands);
    conn.send_packed_command(&packed).await?;

    let mut replies = Vec::with_capacity(commands.len());
    for (i, command) in commands.iter().enumerate() {
        let raw = conn.read_response().await?;
        replies.push(decode_reply(table, i + 1, command, Ok(raw)));
    }
    Ok(replies)
}

async fn execute_transaction<C: Connection>(
    conn: &mut C,
    table: &CommandTable,
    commands: &[Command],
) -> Result<Replies> {
    let mut framed = Vec::with_capacity(commands.len() + 2);
    framed.push(Command::new("MULTI"));
    framed.extend_from_slice(commands);
    framed.push(Command::new("EXEC"));
    let packed = conn.pack_commands(&framed);
    conn.send_packed_command(&packed).await?;

    // every reply is read, errors included, so the stream stays in sync
    let multi_error = conn.read_response().await?.as_error_msg().map(RedlineError::redis);
    let mut staging_errors = Vec::new();
    for i in 0..commands.len() {
        if let Some(msg) = conn.read_response().await?.as_error_msg() {
            staging_errors.push((i, RedlineError::redis(msg)));
        }
    }
    let exec = conn.read_response().await?;

    if let Some(err) = multi_error {
        return Err(err);
    }
    let items = match exec {
        RespValue::Array(items) => items,
        RespValue::Null => {
            debug!("watched key changed, EXEC returned nil");
            return Err(RedlineError::Watch("Watched variable changed.".into()));
        }
        RespValue::Error(msg) | RespValue::BulkError(msg) => {
            return Err(exec_failure(msg, staging_errors, commands));
        }
        other => {
            conn.disconnect();
            return Err(RedlineError::Protocol(format!(
                "unexpected EXEC reply: {}",
                other.type_name()
            )));
        }
    };

    let mut replies: Vec<Result<RespValue>> = items.into_iter().map(Ok).collect();
    for (i, err) in staging_errors {
        let at = i.min(replies.len());
        replies.insert(at, Err(err));
    }
    if replies.len() != commands.len() {
        conn.disconnect();
        return Err(RedlineError::ResponseCount {
            expected: commands.len(),
            actual: replies.len(),
        });
    }

    Ok(replies
        .into_iter()
        .zip(commands)
        .enumerate()
        .map(|(i, (reply, command))| decode_reply(table, i + 1, command, reply))
        .collect())
}

/// EXECABORT is explained by the first command the server refused to queue.
fn exec_failure(
    msg: String,
    staging_errors: Vec<(usize, RedlineError)>,
    commands: &[Command],
) -> RedlineError {
    let err = RedlineError::redis(msg.as_str());
    if err.redis_kind() != Some(&RedisErrorKind::ExecAbort) {
        return err;
    }
    match staging_errors.into_iter().next() {
        Some((i, first)) => first.annotate(i + 1, &commands[i]),
        None => RedlineError::TransactionAborted(msg),
    }
}

// ── Tests ──────────────────────────────────────────────────────────
