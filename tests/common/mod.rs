//! Shared helpers for integration tests.
//!
//! Most suites drive the engine through [`fake::FakeServer`]. The live
//! suites talk to a real server at `REDIS_URL` and are skipped when the
//! variable is unset or the server does not answer PING.

#![allow(dead_code)]

pub mod fake;

use std::sync::atomic::{AtomicUsize, Ordering};

use redline::commands::server;
use redline::{Client, ConnectionConfig, Value};

/// Global counter for generating unique key prefixes per test.
static TEST_ID: AtomicUsize = AtomicUsize::new(0);

/// Return a unique prefix for test keys to avoid collisions between tests.
pub fn test_prefix() -> String {
    let id = TEST_ID.fetch_add(1, Ordering::Relaxed);
    format!("redline_test_{}_{}", std::process::id(), id)
}

/// A client for the server at `REDIS_URL`, or `None` (test skipped) when
/// there is no reachable server.
pub async fn live_client() -> Option<Client> {
    let Ok(url) = std::env::var("REDIS_URL") else {
        eprintln!("REDIS_URL not set, skipping live test");
        return None;
    };
    let mut config = ConnectionConfig::from_url(&url).expect("invalid REDIS_URL");
    config.connect_timeout_ms = 1000;
    let client = Client::new(config);
    match client.execute_command(server::ping()).await {
        Ok(Value::Bool(true)) => Some(client),
        other => {
            eprintln!("Redis at {url} not reachable ({other:?}), skipping live test");
            None
        }
    }
}

/// Byte-string value, for comparing decoded replies.
pub fn bytes(s: &str) -> Value {
    Value::from(s)
}
