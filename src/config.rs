//! Connection configuration and URL parsing.
//!
//! Accepted form:
//! `redis[s]://[user:pass@]host[:port][/db][?option=value&…]`
//!
//! Recognised query options: `retry_on_timeout`, `pool_size`,
//! `connect_timeout_ms`, `read_timeout_ms`, `idle_timeout_ms`.

use std::time::Duration;

use crate::error::{RedlineError, Result};

/// Default Redis port.
pub const DEFAULT_PORT: u16 = 6379;

/// Default maximum read buffer size (512 MB).
pub const DEFAULT_MAX_BUF_SIZE: usize = 512 * 1024 * 1024;

/// Settings for connections to one Redis server.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    /// Optional username (Redis 6+ ACL).
    pub username: Option<String>,
    pub password: Option<String>,
    /// Database index selected on every new connection.
    pub db: u16,
    /// Set by `rediss://`. Not supported: connecting fails.
    pub tls: bool,
    /// Maximum number of checked-out connections.
    pub pool_size: usize,
    pub connect_timeout_ms: u64,
    /// Reply timeout in milliseconds (0 = wait forever).
    pub read_timeout_ms: u64,
    /// Idle connections older than this are closed instead of reused.
    pub idle_timeout_ms: u64,
    /// Maximum read buffer size per connection in bytes.
    pub max_buffer_size: usize,
    /// Whether a timed-out command may be retried on a fresh connection.
    pub retry_on_timeout: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            username: None,
            password: None,
            db: 0,
            tls: false,
            pool_size: 8,
            connect_timeout_ms: 5000,
            read_timeout_ms: 30_000,
            idle_timeout_ms: 300_000,
            max_buffer_size: DEFAULT_MAX_BUF_SIZE,
            retry_on_timeout: false,
        }
    }
}

impl ConnectionConfig {
    /// Parse a Redis URL into a ConnectionConfig.
    pub fn from_url(url: &str) -> Result<Self> {
        let mut config = Self::default();

        let (scheme, rest) = url
            .split_once("://")
            .ok_or_else(|| RedlineError::Config(format!("invalid URL, missing ://: {url}")))?;

        match scheme {
            "redis" => {}
            "rediss" => config.tls = true,
            _ => {
                return Err(RedlineError::Config(format!("unsupported URL scheme: {scheme}")));
            }
        }

        let (rest, query) = match rest.split_once('?') {
            Some((rest, query)) => (rest, Some(query)),
            None => (rest, None),
        };

        let (host_part, db_part) = split_path(rest);
        if let Some(db_str) = db_part {
            config.db = db_str
                .parse()
                .map_err(|_| RedlineError::Config(format!("invalid db number: {db_str}")))?;
        }

        let host_port = match host_part.rsplit_once('@') {
            Some((userinfo, hp)) => {
                parse_userinfo(&mut config, userinfo);
                hp
            }
            None => host_part,
        };
        let (host, port) = parse_host_port(host_port)?;
        config.host = host;
        config.port = port;

        if let Some(query) = query {
            apply_query(&mut config, query)?;
        }
        Ok(config)
    }

    /// Return the server address as "host:port".
    pub fn addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// `None` when replies may take arbitrarily long.
    pub fn read_timeout(&self) -> Option<Duration> {
        (self.read_timeout_ms > 0).then(|| Duration::from_millis(self.read_timeout_ms))
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

// ── URL parsing helpers ────────────────────────────────────────────

/// Split `rest` into (before_path, Some(path)) or (rest, None).
fn split_path(rest: &str) -> (&str, Option<&str>) {
    match rest.split_once('/') {
        Some((before, after)) if !after.is_empty() => (before, Some(after)),
        Some((before, _)) => (before, None),
        None => (rest, None),
    }
}

/// `user:pass`, `:pass`, or a bare password.
fn parse_userinfo(config: &mut ConnectionConfig, userinfo: &str) {
    match userinfo.split_once(':') {
        Some((user, pass)) => {
            if !user.is_empty() {
                config.username = Some(user.to_string());
            }
            if !pass.is_empty() {
                config.password = Some(pass.to_string());
            }
        }
        None if !userinfo.is_empty() => config.password = Some(userinfo.to_string()),
        None => {}
    }
}

/// `host[:port]` or `[ipv6]:port`. An empty host means localhost.
fn parse_host_port(s: &str) -> Result<(String, u16)> {
    let (host, port) = if let Some(inner) = s.strip_prefix('[') {
        let (host, after) = inner
            .split_once(']')
            .ok_or_else(|| RedlineError::Config(format!("unclosed IPv6 bracket: {s}")))?;
        let port = match after.strip_prefix(':') {
            Some(p) => parse_port(p)?,
            None => DEFAULT_PORT,
        };
        (host.to_string(), port)
    } else {
        match s.rsplit_once(':') {
            Some((h, _)) if h.contains(':') => (s.to_string(), DEFAULT_PORT),
            Some((h, p)) => (h.to_string(), parse_port(p)?),
            None => (s.to_string(), DEFAULT_PORT),
        }
    };

    if host.is_empty() {
        return Ok(("127.0.0.1".to_string(), port));
    }
    Ok((host, port))
}

fn parse_port(p: &str) -> Result<u16> {
    p.parse()
        .map_err(|_| RedlineError::Config(format!("invalid port: {p}")))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(RedlineError::Config(format!("invalid boolean for {key}: {value}"))),
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| RedlineError::Config(format!("invalid value for {key}: {value}")))
}

fn apply_query(config: &mut ConnectionConfig, query: &str) -> Result<()> {
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        match key {
            "retry_on_timeout" => config.retry_on_timeout = parse_bool(key, value)?,
            "pool_size" => {
                config.pool_size = parse_num(key, value)?;
                if config.pool_size == 0 {
                    return Err(RedlineError::Config("pool_size must be at least 1".into()));
                }
            }
            "connect_timeout_ms" => config.connect_timeout_ms = parse_num(key, value)?,
            "read_timeout_ms" => config.read_timeout_ms = parse_num(key, value)?,
            "idle_timeout_ms" => config.idle_timeout_ms = parse_num(key, value)?,
            // unknown options are ignored so URLs shared with other clients still parse
            _ => tracing::debug!(option = key, "ignoring unknown URL option"),
        }
    }
    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────
