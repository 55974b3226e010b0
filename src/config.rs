use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, trace};

use crate::error::{ConfigError, ConfigResult};
use crate::resolver::resolve_target;
use crate::util::get_smtp_password;

/// How a single round trip to the target is measured
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProbeConfig {
    /// ICMP echo through the system `ping` utility
    #[default]
    Icmp,

    /// TCP connect to the given port
    Tcp { port: u16 },
}

/// Delivery channel for alert mails
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DeliveryConfig {
    /// Alerts are only written to the alert log
    #[default]
    None,

    /// Direct delivery through an SMTP relay
    Smtp(SmtpConfig),

    /// Delivery through an HTTP transactional-mail API
    HttpApi(HttpApiConfig),
}

#[derive(Clone, serde::Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: Option<u16>,
    #[serde(default)]
    pub tls: SmtpTls,
    pub username: Option<String>,
    /// Falls back to `HOSTWATCH_SMTP_PASSWORD`
    pub password: Option<String>,
    pub from: String,
    pub to: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpTls {
    #[default]
    Starttls,
    Implicit,
    None,
}

#[derive(Clone, serde::Deserialize)]
pub struct HttpApiConfig {
    pub url: String,
    /// Falls back to `HOSTWATCH_API_KEY`
    pub api_key: Option<String>,
    pub from: String,
    pub to: Vec<String>,
}

impl SmtpConfig {
    /// Configured password, else `HOSTWATCH_SMTP_PASSWORD`
    pub fn resolve_password(&self) -> Option<String> {
        self.password.clone().or_else(get_smtp_password)
    }
}

// secrets stay out of the trace output
impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("from", &self.from)
            .field("to", &self.to)
            .finish()
    }
}

impl std::fmt::Debug for HttpApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpApiConfig")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("from", &self.from)
            .field("to", &self.to)
            .finish()
    }
}

/// Raw configuration as read from file or command line
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    /// IP literal or hostname of the target
    pub host: String,
    pub max_rtt_ms: u64,
    pub max_retries: u32,
    pub period_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_notify_timeout_ms")]
    pub notify_timeout_ms: u64,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    #[serde(default)]
    pub delivery: DeliveryConfig,
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_notify_timeout_ms() -> u64 {
    30_000
}

fn default_log_file() -> PathBuf {
    PathBuf::from("./hostwatch.log")
}

impl Config {
    /// Build a configuration from the positional command line arguments
    /// (`<HOST> <MAX_RTT> <MAX_RETRIES> <PERIOD>`). Everything else takes its
    /// default.
    pub fn from_args(host: String, max_rtt_ms: u64, max_retries: u32, period_ms: u64) -> Self {
        Self {
            host,
            max_rtt_ms,
            max_retries,
            period_ms,
            timeout_ms: default_timeout_ms(),
            notify_timeout_ms: default_notify_timeout_ms(),
            probe: ProbeConfig::default(),
            log_file: default_log_file(),
            delivery: DeliveryConfig::default(),
        }
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.period_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "period_ms must be greater than 0".to_string(),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.notify_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "notify_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if let ProbeConfig::Tcp { port: 0 } = self.probe {
            return Err(ConfigError::InvalidValue(
                "tcp probe port must not be 0".to_string(),
            ));
        }

        let recipients = match &self.delivery {
            DeliveryConfig::None => return Ok(()),
            DeliveryConfig::Smtp(smtp) => {
                if let Some(username) = &smtp.username
                    && smtp.resolve_password().is_none()
                {
                    return Err(ConfigError::InvalidValue(format!(
                        "smtp user '{username}' needs a password or HOSTWATCH_SMTP_PASSWORD"
                    )));
                }
                &smtp.to
            }
            DeliveryConfig::HttpApi(api) => &api.to,
        };
        if recipients.is_empty() {
            return Err(ConfigError::InvalidValue(
                "delivery needs at least one recipient".to_string(),
            ));
        }

        Ok(())
    }
}

/// Immutable, validated monitor configuration with a resolved target
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Target as given by the operator (for display)
    pub target: String,
    pub address: IpAddr,
    pub max_rtt: Duration,
    pub max_retries: u32,
    pub period: Duration,
    pub timeout: Duration,
    pub notify_timeout: Duration,
    pub probe: ProbeConfig,
}

impl MonitorConfig {
    /// Validate the raw configuration and resolve its target.
    pub async fn resolve(config: &Config) -> ConfigResult<Self> {
        config.validate()?;

        let address = resolve_target(&config.host).await?;
        debug!("resolved {} to {address}", config.host);

        Ok(Self {
            target: config.host.clone(),
            address,
            max_rtt: Duration::from_millis(config.max_rtt_ms),
            max_retries: config.max_retries,
            period: Duration::from_millis(config.period_ms),
            timeout: Duration::from_millis(config.timeout_ms),
            notify_timeout: Duration::from_millis(config.notify_timeout_ms),
            probe: config.probe.clone(),
        })
    }

    /// Target for log lines and messages, with the address if it differs
    pub fn display(&self) -> String {
        if self.target == self.address.to_string() {
            self.target.clone()
        } else {
            format!("{} ({})", self.target, self.address)
        }
    }
}

pub fn read_config_file(path: impl AsRef<Path>) -> ConfigResult<Config> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str::<Config>(&file_content)
        .map_err(ConfigError::from)
        .inspect(|config| trace!("loaded config: {config:?}"))
}
