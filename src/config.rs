//! Configuration loading and validation.
//!
//! The bot reads one TOML file:
//!
//! ```toml
//! [identity]
//! nick = "corvid"
//! user = "corvid"
//! realname = "Corvid IRC bot"
//!
//! [[connection]]
//! addr = "irc.libera.chat:6667"
//! channels = ["#corvid"]
//!
//! [keepalive]
//! ping_secs = 60
//! timeout_secs = 10
//!
//! [reconnect]
//! initial_secs = 5
//! max_secs = 60
//!
//! [commander]
//! leader = "!"
//! ```
//!
//! Every section except `[[connection]]` is optional and defaulted.

use std::path::Path;
use std::time::Duration;

use rand::Rng;
use serde::Deserialize;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading the config file failed.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// The file was not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// The file parsed but described an unusable setup.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Bot configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Bot identity.
    #[serde(default)]
    pub identity: IdentityConfig,
    /// Remote hosts to connect to.
    #[serde(default, rename = "connection")]
    pub connections: Vec<ConnectionConfig>,
    /// Keepalive probe timing.
    #[serde(default)]
    pub keepalive: KeepaliveConfig,
    /// Reconnect backoff policy.
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    /// Command router settings.
    #[serde(default)]
    pub commander: CommanderConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints the schema cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connections.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one [[connection]] block is required".into(),
            ));
        }
        if self.identity.nick.is_empty() || self.identity.user.is_empty() {
            return Err(ConfigError::Invalid("nick and user must be non-empty".into()));
        }
        for conn in &self.connections {
            if conn.addr.is_empty() {
                return Err(ConfigError::Invalid("connection addr must be non-empty".into()));
            }
        }
        if self.keepalive.ping_secs == 0 || self.keepalive.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "keepalive ping_secs and timeout_secs must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Bot identity template applied to every connection.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    /// Nick to use when connecting (default: randomized `corvid####`).
    #[serde(default = "default_nick")]
    pub nick: String,
    /// Username to use when connecting.
    #[serde(default = "default_user")]
    pub user: String,
    /// Realname sent during registration.
    #[serde(default = "default_realname")]
    pub realname: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            nick: default_nick(),
            user: default_user(),
            realname: default_realname(),
        }
    }
}

fn default_nick() -> String {
    format!("corvid{:04}", rand::thread_rng().gen_range(0..10000))
}

fn default_user() -> String {
    "corvid".to_string()
}

fn default_realname() -> String {
    concat!("corvid-", env!("CARGO_PKG_VERSION")).to_string()
}

/// One remote host.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Host and port, e.g. `irc.libera.chat:6667`.
    pub addr: String,
    /// Server password sent before registration.
    #[serde(default)]
    pub password: Option<String>,
    /// Channels joined after registration (comma-joined into one JOIN).
    #[serde(default)]
    pub channels: Vec<String>,
    /// NickServ password to identify with after registration.
    #[serde(default)]
    pub nickserv: Option<String>,
}

/// Keepalive probe timing.
#[derive(Debug, Clone, Deserialize)]
pub struct KeepaliveConfig {
    /// Seconds between liveness probes (default: 60).
    #[serde(default = "default_ping_interval")]
    pub ping_secs: u64,
    /// Seconds to wait for the probe reply before teardown (default: 10).
    #[serde(default = "default_ping_timeout")]
    pub timeout_secs: u64,
}

impl KeepaliveConfig {
    /// Probe interval as a duration.
    pub fn ping(&self) -> Duration {
        Duration::from_secs(self.ping_secs)
    }

    /// Probe reply timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            ping_secs: default_ping_interval(),
            timeout_secs: default_ping_timeout(),
        }
    }
}

fn default_ping_interval() -> u64 {
    60
}

fn default_ping_timeout() -> u64 {
    10
}

/// Reconnect backoff: exponential from `initial_secs` doubling up to
/// `max_secs`. Setting both equal gives a fixed delay.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectConfig {
    /// First retry delay in seconds (default: 5).
    #[serde(default = "default_reconnect_initial")]
    pub initial_secs: u64,
    /// Delay cap in seconds (default: 60).
    #[serde(default = "default_reconnect_max")]
    pub max_secs: u64,
}

impl ReconnectConfig {
    /// First retry delay as a duration.
    pub fn initial(&self) -> Duration {
        Duration::from_secs(self.initial_secs)
    }

    /// Delay cap as a duration.
    pub fn max(&self) -> Duration {
        Duration::from_secs(self.max_secs)
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_secs: default_reconnect_initial(),
            max_secs: default_reconnect_max(),
        }
    }
}

fn default_reconnect_initial() -> u64 {
    5
}

fn default_reconnect_max() -> u64 {
    60
}

/// Command router settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CommanderConfig {
    /// Leader character marking channel text as a command (default: `!`).
    #[serde(default = "default_leader")]
    pub leader: char,
    /// Whether the command router runs at all (default: true).
    #[serde(default = "default_commander_enabled")]
    pub enabled: bool,
}

impl Default for CommanderConfig {
    fn default() -> Self {
        Self {
            leader: default_leader(),
            enabled: default_commander_enabled(),
        }
    }
}

fn default_leader() -> char {
    '!'
}

fn default_commander_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FULL: &str = r##"
[identity]
nick = "testbot"
user = "test"
realname = "Test Bot"

[[connection]]
addr = "irc.example.com:6667"
password = "sekrit"
channels = ["#a", "#b"]
nickserv = "nspass"

[keepalive]
ping_secs = 30
timeout_secs = 5

[reconnect]
initial_secs = 2
max_secs = 120

[commander]
leader = "."
enabled = false
"##;

    #[test]
    fn test_parse_full() {
        let config: Config = toml::from_str(FULL).unwrap();
        config.validate().unwrap();
        assert_eq!(config.identity.nick, "testbot");
        assert_eq!(config.connections.len(), 1);
        assert_eq!(config.connections[0].channels, vec!["#a", "#b"]);
        assert_eq!(config.keepalive.ping(), Duration::from_secs(30));
        assert_eq!(config.commander.leader, '.');
        assert!(!config.commander.enabled);
    }

    #[test]
    fn test_defaults() {
        let config: Config = toml::from_str(
            r#"
[[connection]]
addr = "irc.example.com:6667"
"#,
        )
        .unwrap();
        config.validate().unwrap();
        assert!(config.identity.nick.starts_with("corvid"));
        assert_eq!(config.identity.user, "corvid");
        assert_eq!(config.keepalive.ping_secs, 60);
        assert_eq!(config.keepalive.timeout_secs, 10);
        assert_eq!(config.reconnect.initial_secs, 5);
        assert_eq!(config.commander.leader, '!');
        assert!(config.commander.enabled);
    }

    #[test]
    fn test_no_connections_rejected() {
        let config: Config = toml::from_str("").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_keepalive_rejected() {
        let config: Config = toml::from_str(
            r#"
[[connection]]
addr = "irc.example.com:6667"

[keepalive]
ping_secs = 0
"#,
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FULL.as_bytes()).unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.connections[0].addr, "irc.example.com:6667");
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/corvid.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
