//! Client configuration.
//!
//! Connection parameters are handed to the wire library as a conninfo
//! string (`host=localhost port=5432 dbname=app`). [`Config`] parses and
//! renders that format and carries the client-side settings the wire
//! library never sees.

use std::fmt;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::instrumentation::SanitizationConfig;

/// Effectively unbounded per-wait timeout (one hundred years).
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Configuration for a connection.
///
/// This struct is marked `#[non_exhaustive]` to allow adding new fields
/// in future releases without breaking semver. Use [`Config::default()`]
/// or [`Config::from_conninfo()`] to construct instances.
#[derive(Clone)]
#[non_exhaustive]
pub struct Config {
    /// Server hostname, IP address or socket directory.
    pub host: Option<String>,

    /// Server port.
    pub port: Option<u16>,

    /// Database name.
    pub dbname: Option<String>,

    /// User name.
    pub user: Option<String>,

    /// Password.
    pub password: Option<String>,

    /// Application name reported to the server.
    pub application_name: Option<String>,

    /// Handshake timeout enforced by the wire library.
    pub connect_timeout: Option<Duration>,

    /// Other conninfo keywords, passed through verbatim and in order.
    pub options: Vec<(String, String)>,

    /// Connection URI, used instead of the keyword form when set.
    pub uri: Option<String>,

    /// Timeout of one socket wait. Expiry just re-waits.
    pub wait_timeout: Duration,

    /// Whether server notices are forwarded to the log.
    pub log_notices: bool,

    /// Statement sanitization for log fields.
    pub sanitization: SanitizationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            dbname: None,
            user: None,
            password: None,
            application_name: None,
            connect_timeout: None,
            options: Vec::new(),
            uri: None,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            log_notices: true,
            sanitization: SanitizationConfig::default(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a conninfo string.
    ///
    /// Accepts the keyword form and `postgres://` / `postgresql://` URIs.
    /// Keyword values may be single-quoted; inside a value `\'` and `\\`
    /// escape a quote and a backslash.
    /// ```text
    /// host=localhost port=5432 dbname=app password='it\'s quoted'
    /// ```
    pub fn from_conninfo(conninfo: &str) -> Result<Self> {
        let mut config = Self::default();
        let trimmed = conninfo.trim();

        if trimmed.starts_with("postgres://") || trimmed.starts_with("postgresql://") {
            config.uri = Some(trimmed.to_string());
            return Ok(config);
        }

        for (key, value) in parse_pairs(trimmed)? {
            match key.as_str() {
                "host" => config.host = Some(value),
                "port" => {
                    config.port = Some(
                        value
                            .parse()
                            .map_err(|_| Error::Config(format!("invalid port: {value}")))?,
                    );
                }
                "dbname" => config.dbname = Some(value),
                "user" => config.user = Some(value),
                "password" => config.password = Some(value),
                "application_name" => config.application_name = Some(value),
                "connect_timeout" => {
                    let secs: u64 = value
                        .parse()
                        .map_err(|_| Error::Config(format!("invalid timeout: {value}")))?;
                    config.connect_timeout = Some(Duration::from_secs(secs));
                }
                _ => {
                    tracing::debug!(key = %key, "passing through conninfo option");
                    config.options.push((key, value));
                }
            }
        }

        Ok(config)
    }

    /// Render the conninfo string handed to the wire library.
    #[must_use]
    pub fn to_conninfo(&self) -> String {
        if let Some(uri) = &self.uri {
            return uri.clone();
        }

        let mut pairs: Vec<(&str, String)> = Vec::new();
        if let Some(host) = &self.host {
            pairs.push(("host", host.clone()));
        }
        if let Some(port) = self.port {
            pairs.push(("port", port.to_string()));
        }
        if let Some(dbname) = &self.dbname {
            pairs.push(("dbname", dbname.clone()));
        }
        if let Some(user) = &self.user {
            pairs.push(("user", user.clone()));
        }
        if let Some(password) = &self.password {
            pairs.push(("password", password.clone()));
        }
        if let Some(name) = &self.application_name {
            pairs.push(("application_name", name.clone()));
        }
        if let Some(timeout) = self.connect_timeout {
            pairs.push(("connect_timeout", timeout.as_secs().to_string()));
        }
        for (key, value) in &self.options {
            pairs.push((key.as_str(), value.clone()));
        }

        pairs
            .iter()
            .map(|(key, value)| format!("{key}={}", quote_value(value)))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Set the server host.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the server port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the database name.
    #[must_use]
    pub fn dbname(mut self, dbname: impl Into<String>) -> Self {
        self.dbname = Some(dbname.into());
        self
    }

    /// Set the user name.
    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Set the password.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the application name.
    #[must_use]
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    /// Set the handshake timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Add a conninfo keyword passed through to the wire library.
    #[must_use]
    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.push((key.into(), value.into()));
        self
    }

    /// Set the timeout of one socket wait.
    #[must_use]
    pub fn wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Enable or disable forwarding server notices to the log.
    #[must_use]
    pub fn log_notices(mut self, enabled: bool) -> Self {
        self.log_notices = enabled;
        self
    }

    /// Set the statement sanitization used in log fields.
    #[must_use]
    pub fn sanitization(mut self, sanitization: SanitizationConfig) -> Self {
        self.sanitization = sanitization;
        self
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("application_name", &self.application_name)
            .field("connect_timeout", &self.connect_timeout)
            .field("options", &self.options)
            .field("uri", &self.uri.as_ref().map(|_| "[REDACTED]"))
            .field("wait_timeout", &self.wait_timeout)
            .field("log_notices", &self.log_notices)
            .field("sanitization", &self.sanitization)
            .finish()
    }
}

impl std::str::FromStr for Config {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_conninfo(s)
    }
}

fn quote_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        if c == '\'' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('\'');
    out
}

/// Split a keyword conninfo string into `(key, value)` pairs.
fn parse_pairs(input: &str) -> Result<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(c) = chars.next_if(|c| *c != '=' && !c.is_whitespace()) {
            key.push(c);
        }
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.next() != Some('=') {
            return Err(Error::Config(format!(
                "missing \"=\" after \"{key}\" in connection info string"
            )));
        }
        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let mut value = String::new();
        if chars.next_if_eq(&'\'').is_some() {
            loop {
                match chars.next() {
                    Some('\\') => match chars.next() {
                        Some(c) => value.push(c),
                        None => break,
                    },
                    Some('\'') => break,
                    Some(c) => value.push(c),
                    None => {
                        return Err(Error::Config(
                            "unterminated quoted string in connection info string".into(),
                        ));
                    }
                }
            }
        } else {
            while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        value.push(escaped);
                    }
                } else {
                    value.push(c);
                }
            }
        }

        pairs.push((key, value));
    }

    Ok(pairs)
}
