//! Async TCP connection to a Redis server.
//!
//! Wraps a `tokio::net::TcpStream` with an integrated read buffer and
//! RESP parser. The socket is dialled lazily: after [`Connection::disconnect`]
//! the next send reconnects and replays AUTH/SELECT.

use std::sync::Arc;
use std::time::Instant;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::command::Command;
use crate::config::ConnectionConfig;
use crate::connection::Connection;
use crate::error::{RedlineError, Result};
use crate::resp::parser::parse;
use crate::resp::types::RespValue;
use crate::resp::writer::{encode_command, encode_pipeline};

/// Initial read buffer capacity (64 KB).
const DEFAULT_BUF_CAPACITY: usize = 64 * 1024;

fn not_connected() -> RedlineError {
    RedlineError::Connection(std::io::Error::new(
        std::io::ErrorKind::NotConnected,
        "connection is closed",
    ))
}

/// A single connection to a Redis server.
pub struct RedisConnection {
    config: Arc<ConnectionConfig>,
    stream: Option<TcpStream>,
    /// Data read from the socket but not yet consumed by the parser.
    buf: BytesMut,
    /// Timestamp of last successful I/O (for idle checks).
    pub last_used: Instant,
}

impl RedisConnection {
    /// Create an unconnected handle; the first send dials the server.
    pub fn new(config: Arc<ConnectionConfig>) -> Self {
        Self {
            config,
            stream: None,
            buf: BytesMut::new(),
            last_used: Instant::now(),
        }
    }

    /// Dial the server and run AUTH/SELECT right away.
    pub async fn connect(config: Arc<ConnectionConfig>) -> Result<Self> {
        let mut conn = Self::new(config);
        conn.ensure_connected().await?;
        Ok(conn)
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn ensure_connected(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }
        // Without TLS support a rediss:// URL would silently send AUTH in plaintext
        if self.config.tls {
            return Err(RedlineError::Config(
                "TLS connections (rediss://) are not supported".into(),
            ));
        }

        let addr = self.config.addr();
        let timeout = self.config.connect_timeout();
        let stream = match tokio::time::timeout(timeout, TcpStream::connect(&addr)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(RedlineError::Timeout(format!(
                    "connection to {addr} timed out after {timeout:?}"
                )))
            }
        };
        stream.set_nodelay(true).ok();
        self.stream = Some(stream);
        self.buf = BytesMut::with_capacity(DEFAULT_BUF_CAPACITY);
        self.last_used = Instant::now();
        debug!(%addr, db = self.config.db, "connected");

        if let Err(e) = self.init().await {
            self.disconnect();
            return Err(e);
        }
        Ok(())
    }

    /// AUTH (when a password is configured) and SELECT (when db != 0).
    async fn init(&mut self) -> Result<()> {
        if let Some(password) = self.config.password.clone() {
            let cmd = Command::new("AUTH")
                .args(self.config.username.clone())
                .arg(password);
            self.expect_ok(&cmd).await?;
        }
        if self.config.db != 0 {
            let cmd = Command::new("SELECT").arg(self.config.db);
            self.expect_ok(&cmd).await?;
        }
        Ok(())
    }

    async fn expect_ok(&mut self, cmd: &Command) -> Result<()> {
        self.write(&encode_command(cmd.tokens())).await?;
        match self.read_frame().await? {
            RespValue::SimpleString(ref s) if s == "OK" => Ok(()),
            RespValue::Error(msg) | RespValue::BulkError(msg) => Err(RedlineError::redis(msg)),
            other => Err(RedlineError::Protocol(format!(
                "unexpected {} response: {}",
                cmd.name(),
                other.type_name()
            ))),
        }
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or_else(not_connected)?;
        let written = stream.write_all(data).await;
        if let Err(e) = written {
            self.disconnect();
            return Err(e.into());
        }
        self.last_used = Instant::now();
        Ok(())
    }

    /// Read and parse one complete RESP value.
    ///
    /// Freezes the read buffer to `Bytes` before parsing so bulk strings are
    /// zero-copy slices of it.
    async fn read_frame(&mut self) -> Result<RespValue> {
        loop {
            if !self.buf.is_empty() {
                let snapshot = self.buf.split().freeze();
                match parse(&snapshot) {
                    Ok((value, consumed)) => {
                        if consumed < snapshot.len() {
                            self.buf.extend_from_slice(&snapshot[consumed..]);
                        }
                        self.last_used = Instant::now();
                        return Ok(value);
                    }
                    Err(RedlineError::Incomplete) => {
                        self.buf.extend_from_slice(&snapshot);
                    }
                    Err(e) => {
                        self.buf.extend_from_slice(&snapshot);
                        return Err(e);
                    }
                }
            }

            self.grow_buf()?;
            let stream = self.stream.as_mut().ok_or_else(not_connected)?;
            let read = stream.read_buf(&mut self.buf).await;
            match read {
                Ok(0) => {
                    self.disconnect();
                    return Err(RedlineError::Connection(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "connection closed by server",
                    )));
                }
                Ok(_) if self.buf.len() > self.config.max_buffer_size => {
                    return Err(RedlineError::Protocol(format!(
                        "RESP message too large: buffer would exceed {} bytes",
                        self.config.max_buffer_size
                    )));
                }
                Ok(_) => {}
                Err(e) => {
                    self.disconnect();
                    return Err(e.into());
                }
            }
        }
    }

    /// Make room for the next socket read, doubling up to `max_buffer_size`.
    fn grow_buf(&mut self) -> Result<()> {
        if self.buf.capacity() - self.buf.len() >= 4096 {
            return Ok(());
        }
        let max = self.config.max_buffer_size;
        let new_cap = (self.buf.capacity() * 2).max(DEFAULT_BUF_CAPACITY);
        if new_cap > max {
            if self.buf.capacity() >= max {
                return Err(RedlineError::Protocol(format!(
                    "RESP message too large: buffer would exceed {max} bytes"
                )));
            }
            self.buf.reserve(max - self.buf.len());
        } else {
            self.buf.reserve(new_cap - self.buf.len());
        }
        Ok(())
    }
}

impl Connection for RedisConnection {
    async fn send_command(&mut self, command: &Command) -> Result<()> {
        self.ensure_connected().await?;
        self.write(&encode_command(command.tokens())).await
    }

    async fn send_packed_command(&mut self, packed: &[u8]) -> Result<()> {
        self.ensure_connected().await?;
        self.write(packed).await
    }

    fn pack_commands(&self, commands: &[Command]) -> Vec<u8> {
        encode_pipeline(commands.iter().map(Command::tokens))
    }

    async fn read_response(&mut self) -> Result<RespValue> {
        match self.config.read_timeout() {
            Some(limit) => match tokio::time::timeout(limit, self.read_frame()).await {
                Ok(result) => result,
                Err(_) => Err(RedlineError::Timeout(format!("no reply within {limit:?}"))),
            },
            None => self.read_frame().await,
        }
    }

    fn disconnect(&mut self) {
        if self.stream.take().is_some() {
            debug!(addr = %self.config.addr(), "disconnected");
        }
        self.buf.clear();
    }

    fn retry_on_timeout(&self) -> bool {
        self.config.retry_on_timeout
    }
}

// ── Tests ──────────────────────────────────────────────────────────
