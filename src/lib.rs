//! Async Redis client with pipelining, MULTI/EXEC transactions and
//! optimistic locking.
//!
//! ```no_run
//! use redline::commands::{key, number};
//! use redline::Client;
//!
//! # async fn demo() -> redline::error::Result<()> {
//! let client = Client::from_url("redis://localhost:6379/0")?;
//!
//! let mut pipe = client.pipeline(true, None);
//! pipe.stage(key::set("visits", 0, &Default::default()))
//!     .stage(number::incr("visits", 1));
//! let replies = pipe.execute(true).await?;
//! assert_eq!(replies.len(), 2);
//! # Ok(())
//! # }
//! ```

pub mod callbacks;
pub mod client;
pub mod command;
pub mod commands;
pub mod config;
pub mod connection;
pub mod error;
pub mod pipeline;
pub mod resp;
pub mod script;
pub mod value;

pub use callbacks::CommandTable;
pub use client::Client;
pub use command::{Command, CommandOptions, ScoreCast, ToArg};
pub use config::ConnectionConfig;
pub use connection::{Connection, ConnectionPool, Pool};
pub use error::{RedisErrorKind, RedlineError, Result};
pub use pipeline::{Outcome, Pipeline, Replies};
pub use script::Script;
pub use value::Value;
