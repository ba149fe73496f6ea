pub mod pool;
pub mod tcp;

pub use pool::{ConnectionPool, PooledConnection};
pub use tcp::RedisConnection;

use std::future::Future;

use crate::command::Command;
use crate::error::Result;
use crate::resp::types::RespValue;

/// One ordered request/reply stream to a Redis server.
///
/// Pipelines and the client only talk to the server through this trait, so
/// the execution engine can run against any transport.
pub trait Connection: Send {
    /// Encode and write one command.
    fn send_command(&mut self, command: &Command) -> impl Future<Output = Result<()>> + Send;

    /// Write bytes produced by [`Connection::pack_commands`] in one go.
    fn send_packed_command(&mut self, packed: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Encode several commands into one contiguous buffer.
    fn pack_commands(&self, commands: &[Command]) -> Vec<u8>;

    /// Read the next reply. Server error replies are returned as values,
    /// not as `Err`; only transport and protocol failures are errors.
    fn read_response(&mut self) -> impl Future<Output = Result<RespValue>> + Send;

    /// Drop the socket. The next send reconnects.
    fn disconnect(&mut self);

    /// Whether a timed-out command may be retried.
    fn retry_on_timeout(&self) -> bool;
}

/// Hands out connections and takes them back.
pub trait Pool: Send + Sync {
    type Conn: Connection;

    /// Check out a connection. `command_name` and `shard_hint` are routing
    /// hints; single-server pools ignore them.
    fn get_connection(
        &self,
        command_name: &str,
        shard_hint: Option<&str>,
    ) -> impl Future<Output = Result<Self::Conn>> + Send;

    /// Return a connection for reuse.
    fn release(&self, conn: Self::Conn);
}

/// Send one command and read its reply.
pub(crate) async fn round_trip<C: Connection>(conn: &mut C, command: &Command) -> Result<RespValue> {
    conn.send_command(command).await?;
    conn.read_response().await
}
