//! Client configuration: a TOML file overlaid with `XABBER_*` environment
//! variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use jid::FullJid;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::entity::{AccountJid, EntityError};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid TOML at line {line}, column {column}: {message}")]
    InvalidToml {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("missing required fields: {fields:?}")]
    MissingRequiredFields { fields: Vec<String> },

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("I/O error reading configuration: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub account: AccountConfig,
    #[serde(default)]
    pub groupchat: GroupchatConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    pub jid: String,
    pub resource: Option<String>,
}

impl AccountConfig {
    pub fn account_jid(&self) -> Result<AccountJid, EntityError> {
        self.jid.parse()
    }

    /// `jid/resource`, or `None` when no resource is configured.
    pub fn own_jid(&self) -> Result<Option<FullJid>, EntityError> {
        let Some(resource) = self.resource.as_deref() else {
            return Ok(None);
        };
        let input = format!("{}/{resource}", self.jid);
        input
            .parse::<FullJid>()
            .map(Some)
            .map_err(|e| EntityError::InvalidJid {
                message: e.to_string(),
                input,
            })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupchatConfig {
    #[serde(default = "GroupchatConfig::default_reply_timeout_ms")]
    pub reply_timeout_ms: u64,
    #[serde(default = "GroupchatConfig::default_listener_capacity")]
    pub listener_capacity: usize,
}

impl GroupchatConfig {
    fn default_reply_timeout_ms() -> u64 {
        30_000
    }

    fn default_listener_capacity() -> usize {
        64
    }

    /// How long a request waits for its correlated reply.
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }
}

impl Default for GroupchatConfig {
    fn default() -> Self {
        Self {
            reply_timeout_ms: Self::default_reply_timeout_ms(),
            listener_capacity: Self::default_listener_capacity(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

pub(crate) const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

const TEMPLATE: &str = r#"[account]
jid = ""
# resource = "android"

[groupchat]
reply_timeout_ms = 30000
listener_capacity = 64

[logging]
level = "info"
"#;

impl Config {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.account.jid.is_empty() {
            return Err(ConfigError::MissingRequiredFields {
                fields: vec!["account.jid".to_string()],
            });
        }
        self.account
            .account_jid()
            .map_err(|e| invalid("account.jid", e))?;
        self.account
            .own_jid()
            .map_err(|e| invalid("account.resource", e))?;

        positive("groupchat.reply_timeout_ms", self.groupchat.reply_timeout_ms)?;
        positive(
            "groupchat.listener_capacity",
            self.groupchat.listener_capacity as u64,
        )?;

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(invalid(
                "logging.level",
                format_args!("must be one of: {}", LOG_LEVELS.join(", ")),
            ));
        }
        Ok(())
    }
}

fn invalid(field: &str, message: impl std::fmt::Display) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
}

fn positive(field: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(invalid(field, "must be greater than zero"));
    }
    Ok(())
}

/// Values from `XABBER_JID`, `XABBER_RESOURCE` and `XABBER_LOG_LEVEL`. Each
/// one that is set replaces the file's value.
#[derive(Debug, Default, Clone)]
struct EnvOverrides {
    jid: Option<String>,
    resource: Option<String>,
    log_level: Option<String>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok();
        Self {
            jid: var("XABBER_JID"),
            resource: var("XABBER_RESOURCE"),
            log_level: var("XABBER_LOG_LEVEL"),
        }
    }

    fn apply(self, config: &mut Config) {
        if let Some(jid) = self.jid {
            debug!("account.jid taken from XABBER_JID");
            config.account.jid = jid;
        }
        if self.resource.is_some() {
            config.account.resource = self.resource;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
    }
}

/// Platform configuration directory joined with `config.toml`, or a
/// relative `config.toml` when no home directory is known.
pub fn config_path() -> PathBuf {
    directories::ProjectDirs::from("com", "xabber", "xabber-groups")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(config_path())
}

/// Read `path`. When it does not exist a commented template is written
/// there and [`ConfigError::MissingRequiredFields`] is returned.
pub fn load_config_from(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    read_file(path.as_ref(), EnvOverrides::from_env())
}

pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    parse(toml_str, EnvOverrides::from_env())
}

fn read_file(path: &Path, overrides: EnvOverrides) -> Result<Config, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let config = parse(&contents, overrides)?;
            info!(path = %path.display(), account = %config.account.jid, "Configuration loaded");
            Ok(config)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            std::fs::write(path, TEMPLATE)?;
            warn!(path = %path.display(), "No configuration found, wrote a template");
            Err(ConfigError::MissingRequiredFields {
                fields: vec!["account.jid".to_string()],
            })
        }
        Err(e) => Err(e.into()),
    }
}

fn parse(source: &str, overrides: EnvOverrides) -> Result<Config, ConfigError> {
    let mut config: Config = toml::from_str(source).map_err(|e| toml_error(source, &e))?;
    overrides.apply(&mut config);
    config.validate()?;
    Ok(config)
}

/// 1-based line and column of the error's span start.
fn toml_error(source: &str, error: &toml::de::Error) -> ConfigError {
    let offset = error.span().map_or(0, |span| span.start).min(source.len());
    let before = &source[..offset];
    let line_start = before.rfind('\n').map_or(0, |nl| nl + 1);
    ConfigError::InvalidToml {
        line: before.matches('\n').count() + 1,
        column: before[line_start..].chars().count() + 1,
        message: error.message().to_string(),
    }
}
