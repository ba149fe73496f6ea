//! Async connection pool for Redis connections.
//!
//! A semaphore bounds the number of checked-out connections and a deque
//! holds idle ones for reuse. The idle queue uses `parking_lot::Mutex`
//! (sync, held very briefly) so connections can be released from `Drop`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex as SyncMutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::command::Command;
use crate::config::ConnectionConfig;
use crate::connection::tcp::RedisConnection;
use crate::connection::{Connection, Pool};
use crate::error::{RedlineError, Result};
use crate::resp::types::RespValue;

/// A bounded pool of connections to one server.
pub struct ConnectionPool {
    idle: SyncMutex<VecDeque<RedisConnection>>,
    semaphore: Arc<Semaphore>,
    config: Arc<ConnectionConfig>,
    max_size: usize,
    idle_timeout: Duration,
}

impl ConnectionPool {
    pub fn new(config: ConnectionConfig) -> Self {
        let max_size = config.pool_size.max(1);
        let idle_timeout = config.idle_timeout();
        Self {
            idle: SyncMutex::new(VecDeque::with_capacity(max_size)),
            semaphore: Arc::new(Semaphore::new(max_size)),
            config: Arc::new(config),
            max_size,
            idle_timeout,
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Number of currently idle connections.
    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    /// Configured max pool size.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Free checkout slots (roughly max_size - checked_out).
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Close every idle connection.
    pub fn clear_idle(&self) {
        self.idle.lock().clear();
    }

    /// Take a healthy connection from the idle queue (LIFO for cache warmth).
    fn take_idle(&self) -> Option<RedisConnection> {
        let mut idle = self.idle.lock();
        while let Some(conn) = idle.pop_back() {
            if conn.is_connected() && conn.last_used.elapsed() <= self.idle_timeout {
                return Some(conn);
            }
        }
        None
    }
}

impl Pool for ConnectionPool {
    type Conn = PooledConnection;

    async fn get_connection(
        &self,
        _command_name: &str,
        _shard_hint: Option<&str>,
    ) -> Result<PooledConnection> {
        let permit = self.semaphore.clone().acquire_owned().await.map_err(|_| {
            RedlineError::Connection(std::io::Error::new(
                std::io::ErrorKind::Other,
                "pool semaphore closed",
            ))
        })?;

        let conn = match self.take_idle() {
            Some(conn) => conn,
            None => {
                debug!(addr = %self.config.addr(), "opening pooled connection");
                RedisConnection::connect(self.config.clone()).await?
            }
        };

        Ok(PooledConnection { conn, _permit: permit })
    }

    fn release(&self, conn: PooledConnection) {
        let PooledConnection { conn, _permit } = conn;
        if !conn.is_connected() || conn.last_used.elapsed() > self.idle_timeout {
            return;
        }
        let mut idle = self.idle.lock();
        if idle.len() < self.max_size {
            idle.push_back(conn);
        }
    }
}

/// A checked-out connection. It holds one pool slot until it is released
/// or dropped; dropping it closes the socket instead of reusing it.
pub struct PooledConnection {
    conn: RedisConnection,
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }
}

impl Connection for PooledConnection {
    async fn send_command(&mut self, command: &Command) -> Result<()> {
        self.conn.send_command(command).await
    }

    async fn send_packed_command(&mut self, packed: &[u8]) -> Result<()> {
        self.conn.send_packed_command(packed).await
    }

    fn pack_commands(&self, commands: &[Command]) -> Vec<u8> {
        self.conn.pack_commands(commands)
    }

    async fn read_response(&mut self) -> Result<RespValue> {
        self.conn.read_response().await
    }

    fn disconnect(&mut self) {
        self.conn.disconnect()
    }

    fn retry_on_timeout(&self) -> bool {
        self.conn.retry_on_timeout()
    }
}

// ── Tests ──────────────────────────────────────────────────────────
