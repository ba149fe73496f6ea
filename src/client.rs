//! Async Redis client.
//!
//! [`Client`] runs single commands over a connection pool and creates
//! [`Pipeline`]s that share its pool and command table. A failed command is
//! retried once on a fresh connection when the failure was in the transport
//! (timeouts only with `retry_on_timeout`).

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use crate::callbacks::CommandTable;
use crate::command::{Command, ScoreCast, ToArg};
use crate::commands::{hash, key, server, set, zset, ScanOptions};
use crate::config::ConnectionConfig;
use crate::connection::{round_trip, Connection, ConnectionPool, Pool};
use crate::error::{RedlineError, Result};
use crate::pipeline::{Pipeline, Replies};
use crate::value::Value;

/// A Redis client backed by a connection pool.
///
/// Cheap to clone; clones share the pool and the command table.
pub struct Client<P: Pool = ConnectionPool> {
    pool: Arc<P>,
    table: Arc<CommandTable>,
}

impl Client<ConnectionPool> {
    /// Client for one standalone server with the default command table.
    pub fn new(config: ConnectionConfig) -> Self {
        Self::with_pool(Arc::new(ConnectionPool::new(config)), CommandTable::default())
    }

    /// Build a client from a `redis://` URL.
    ///
    /// ```no_run
    /// # fn main() -> redline::error::Result<()> {
    /// let client = redline::Client::from_url("redis://:secret@localhost:6379/0")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_url(url: &str) -> Result<Self> {
        Ok(Self::new(ConnectionConfig::from_url(url)?))
    }
}

impl<P: Pool> Clone for Client<P> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            table: self.table.clone(),
        }
    }
}

impl<P: Pool> Client<P> {
    /// Client over any pool, with a caller-supplied command table.
    pub fn with_pool(pool: Arc<P>, table: CommandTable) -> Self {
        Self {
            pool,
            table: Arc::new(table),
        }
    }

    pub fn pool(&self) -> &P {
        &self.pool
    }

    pub fn command_table(&self) -> &CommandTable {
        &self.table
    }

    /// Run one command and decode its reply.
    pub async fn execute_command(&self, command: Command) -> Result<Value> {
        let mut conn = self.pool.get_connection(command.name(), None).await?;
        let result = self.run(&mut conn, &command).await;
        self.pool.release(conn);
        result
    }

    async fn run(&self, conn: &mut P::Conn, command: &Command) -> Result<Value> {
        let raw = match round_trip(conn, command).await {
            Err(e) if e.is_transient() => {
                conn.disconnect();
                if e.is_timeout() && !conn.retry_on_timeout() {
                    return Err(e);
                }
                debug!(command = command.name(), error = %e, "retrying command");
                match round_trip(conn, command).await {
                    Ok(raw) => raw,
                    Err(e) => {
                        conn.disconnect();
                        return Err(e);
                    }
                }
            }
            Err(e) => {
                conn.disconnect();
                return Err(e);
            }
            Ok(raw) => raw,
        };
        self.table.decode(command.name(), raw, command.options())
    }

    /// A new pipeline; with `transaction` the batch runs inside MULTI/EXEC.
    pub fn pipeline(&self, transaction: bool, shard_hint: Option<String>) -> Pipeline<P> {
        Pipeline::new(self.pool.clone(), self.table.clone(), transaction, shard_hint)
    }

    /// Optimistic-locking helper.
    ///
    /// Each attempt creates a transactional pipeline, WATCHes `keys` and
    /// hands the pipeline to `f`. `f` reads what it needs (commands run
    /// immediately while watching), calls [`Pipeline::multi`], stages its
    /// writes and returns the pipeline, which is then executed. When a
    /// watched key changed in between, the whole cycle starts over.
    pub async fn transaction<K, F, Fut>(
        &self,
        keys: &[K],
        shard_hint: Option<String>,
        mut f: F,
    ) -> Result<Replies>
    where
        K: ToArg,
        F: FnMut(Pipeline<P>) -> Fut,
        Fut: Future<Output = Result<Pipeline<P>>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let mut pipe = self.pipeline(true, shard_hint.clone());
            pipe.watch(keys.iter()).await?;

            let mut pipe = match f(pipe).await {
                Ok(pipe) => pipe,
                Err(RedlineError::Watch(msg)) => {
                    debug!(attempt, %msg, "watch failed, retrying transaction");
                    continue;
                }
                Err(e) => return Err(e),
            };

            match pipe.execute(true).await {
                Err(RedlineError::Watch(msg)) => {
                    debug!(attempt, %msg, "watched key changed, retrying transaction");
                }
                other => return other,
            }
        }
    }

    /// SHUTDOWN the server. The server closing the connection is success;
    /// any reply means the shutdown did not happen.
    pub async fn shutdown(&self) -> Result<()> {
        match self.execute_command(server::shutdown()).await {
            Err(e) if e.is_connection_error() => Ok(()),
            Err(e) => Err(e),
            Ok(_) => Err(RedlineError::Protocol("SHUTDOWN seems to have failed".into())),
        }
    }

    /// Follow a cursor until the server returns 0, collecting each page.
    async fn scan_pages<F>(&self, mut page: F) -> Result<Vec<Value>>
    where
        F: FnMut(u64) -> Command,
    {
        let mut cursor = 0;
        let mut pages = Vec::new();
        loop {
            match self.execute_command(page(cursor)).await? {
                Value::Cursor { cursor: next, items } => {
                    pages.push(*items);
                    if next == 0 {
                        return Ok(pages);
                    }
                    cursor = next;
                }
                other => {
                    return Err(RedlineError::Type(format!(
                        "expected a cursor reply, got {other:?}"
                    )))
                }
            }
        }
    }

    /// Every key matching `options`, across all SCAN pages.
    pub async fn scan_all(&self, options: &ScanOptions) -> Result<Vec<Value>> {
        let pages = self.scan_pages(|cursor| key::scan(cursor, options)).await?;
        Ok(pages.into_iter().flat_map(list_items).collect())
    }

    pub async fn sscan_all(&self, name: impl ToArg, options: &ScanOptions) -> Result<Vec<Value>> {
        let name = name.to_arg();
        let pages = self
            .scan_pages(|cursor| set::sscan(&name, cursor, options))
            .await?;
        Ok(pages.into_iter().flat_map(list_items).collect())
    }

    pub async fn hscan_all(
        &self,
        name: impl ToArg,
        options: &ScanOptions,
    ) -> Result<Vec<(Value, Value)>> {
        let name = name.to_arg();
        let pages = self
            .scan_pages(|cursor| hash::hscan(&name, cursor, options))
            .await?;
        Ok(pages
            .into_iter()
            .flat_map(|page| match page {
                Value::Map(pairs) => pairs,
                _ => Vec::new(),
            })
            .collect())
    }

    /// Every `(member, score)` of a sorted set, scores cast with `score_cast`.
    pub async fn zscan_all(
        &self,
        name: impl ToArg,
        options: &ScanOptions,
        score_cast: ScoreCast,
    ) -> Result<Vec<(Bytes, Value)>> {
        let name = name.to_arg();
        let pages = self
            .scan_pages(|cursor| zset::zscan(&name, cursor, options, score_cast))
            .await?;
        Ok(pages
            .into_iter()
            .flat_map(|page| match page {
                Value::Scored(pairs) => pairs,
                _ => Vec::new(),
            })
            .collect())
    }
}

fn list_items(page: Value) -> Vec<Value> {
    match page {
        Value::List(items) | Value::Set(items) => items,
        _ => Vec::new(),
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resp::parser::parse_slice;
    use crate::resp::types::RespValue;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Mock server: `handler` maps each command to raw reply bytes, or
    /// `None` to close the connection.
    async fn mock_server<F>(handler: F) -> String
    where
        F: Fn(&[String]) -> Option<Vec<u8>> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let handler = Arc::new(handler);

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let handler = handler.clone();
                tokio::spawn(async move {
                    let mut pending = Vec::new();
                    let mut buf = vec![0u8; 4096];
                    'conn: loop {
                        let n = match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => break,
                            Ok(n) => n,
                        };
                        pending.extend_from_slice(&buf[..n]);
                        while let Ok((frame, used)) = parse_slice(&pending) {
                            pending.drain(..used);
                            let RespValue::Array(parts) = frame else { break 'conn };
                            let words: Vec<String> = parts
                                .iter()
                                .map(|p| p.as_str().unwrap_or_default().to_string())
                                .collect();
                            match handler(&words) {
                                Some(reply) => {
                                    if socket.write_all(&reply).await.is_err() {
                                        break 'conn;
                                    }
                                }
                                None => break 'conn,
                            }
                        }
                    }
                });
            }
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        addr
    }

    fn client_for(addr: &str) -> Client {
        let (host, port) = addr.rsplit_once(':').unwrap();
        Client::new(ConnectionConfig {
            host: host.to_string(),
            port: port.parse().unwrap(),
            pool_size: 2,
            connect_timeout_ms: 1000,
            read_timeout_ms: 2000,
            ..ConnectionConfig::default()
        })
    }

    #[tokio::test]
    async fn execute_and_decode() {
        let addr = mock_server(|cmd| match cmd[0].as_str() {
            "SET" => Some(b"+OK\r\n".to_vec()),
            "GET" => Some(b"$3\r\nbar\r\n".to_vec()),
            "INCRBY" => Some(b":6\r\n".to_vec()),
            _ => Some(b"-ERR unknown command\r\n".to_vec()),
        })
        .await;
        let client = client_for(&addr);

        let set = client.execute_command(key::set("foo", "bar", &Default::default())).await;
        assert_eq!(set.unwrap(), Value::Bool(true));
        assert_eq!(client.execute_command(key::get("foo")).await.unwrap(), Value::from("bar"));
        assert_eq!(
            client.execute_command(crate::commands::number::incr("n", 5)).await.unwrap(),
            Value::Int(6)
        );
        assert_eq!(client.pool().idle_count(), 1);
    }

    #[tokio::test]
    async fn server_error_keeps_connection() {
        let addr = mock_server(|_| Some(b"-WRONGTYPE Operation against a key\r\n".to_vec())).await;
        let client = client_for(&addr);
        let e = client.execute_command(key::get("h")).await.unwrap_err();
        assert_eq!(e.redis_kind(), Some(&crate::error::RedisErrorKind::WrongType));
        assert_eq!(client.pool().idle_count(), 1);
    }

    #[tokio::test]
    async fn retries_once_after_connection_loss() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let addr = mock_server(move |_| {
            if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                None
            } else {
                Some(b"+PONG\r\n".to_vec())
            }
        })
        .await;
        let client = client_for(&addr);
        assert_eq!(client.execute_command(server::ping()).await.unwrap(), Value::Bool(true));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn shutdown_success_is_a_closed_connection() {
        let addr = mock_server(|_| None).await;
        assert!(client_for(&addr).shutdown().await.is_ok());

        let addr = mock_server(|_| Some(b"+OK\r\n".to_vec())).await;
        assert!(client_for(&addr).shutdown().await.is_err());
    }

    #[tokio::test]
    async fn scan_all_follows_cursor() {
        let addr = mock_server(|cmd| match cmd.get(1).map(String::as_str) {
            Some("0") => Some(b"*2\r\n$1\r\n7\r\n*2\r\n$1\r\na\r\n$1\r\nb\r\n".to_vec()),
            Some("7") => Some(b"*2\r\n$1\r\n0\r\n*1\r\n$1\r\nc\r\n".to_vec()),
            _ => Some(b"-ERR bad cursor\r\n".to_vec()),
        })
        .await;
        let client = client_for(&addr);
        let keys = client.scan_all(&ScanOptions::default()).await.unwrap();
        assert_eq!(keys, vec![Value::from("a"), Value::from("b"), Value::from("c")]);
    }

    #[tokio::test]
    async fn pipeline_over_tcp() {
        let addr = mock_server(|cmd| match cmd[0].as_str() {
            "MULTI" => Some(b"+OK\r\n".to_vec()),
            "EXEC" => Some(b"*2\r\n+OK\r\n:1\r\n".to_vec()),
            _ => Some(b"+QUEUED\r\n".to_vec()),
        })
        .await;
        let client = client_for(&addr);
        let mut pipe = client.pipeline(true, None);
        pipe.stage(key::set("a", 1, &Default::default()))
            .stage(key::delete(["b"]));
        let replies = pipe.execute(true).await.unwrap();
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].as_ref().unwrap(), &Value::Bool(true));
        assert_eq!(replies[1].as_ref().unwrap(), &Value::Int(1));
        assert_eq!(client.pool().idle_count(), 1);
    }

    #[test]
    fn from_url_rejects_unknown_scheme() {
        assert!(matches!(
            Client::from_url("http://localhost"),
            Err(RedlineError::Config(_))
        ));
    }
}
