//! Error types for configuration, probing and notification

use std::fmt;
use std::time::Duration;

/// Result type alias for startup configuration
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while loading and resolving the configuration
///
/// All of these are fatal at startup.
#[derive(Debug)]
pub enum ConfigError {
    /// Configuration file could not be read
    Io(std::io::Error),

    /// Configuration file is not valid (missing fields, unknown modes, ...)
    Parse(String),

    /// A field holds a value outside of its allowed range
    InvalidValue(String),

    /// The target is neither a valid IP literal nor a valid hostname
    InvalidAddress(String),

    /// The target hostname could not be resolved
    ResolutionFailure(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "failed to read configuration: {}", err),
            ConfigError::Parse(msg) => write!(f, "invalid configuration file provided: {}", msg),
            ConfigError::InvalidValue(msg) => write!(f, "invalid configuration value: {}", msg),
            ConfigError::InvalidAddress(addr) => write!(f, "invalid target address '{}'", addr),
            ConfigError::ResolutionFailure(msg) => {
                write!(f, "failed to resolve target: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

/// Errors of a single probe round trip
///
/// Every one of these is classified as an unreachable target.
#[derive(Debug)]
pub enum ProbeError {
    /// No reply within the probe timeout
    Timeout(Duration),

    /// Transport failure (socket error, ping utility missing, ...)
    Io(std::io::Error),

    /// The probe ran to completion but the target did not answer
    NoReply(String),

    /// The probe answered but no round trip time could be read from it
    Unparseable(String),
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::Timeout(timeout) => {
                write!(f, "no reply within {}ms", timeout.as_millis())
            }
            ProbeError::Io(err) => write!(f, "probe transport error: {}", err),
            ProbeError::NoReply(msg) => write!(f, "target did not reply: {}", msg),
            ProbeError::Unparseable(msg) => write!(f, "could not read round trip time: {}", msg),
        }
    }
}

impl std::error::Error for ProbeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProbeError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ProbeError {
    fn from(err: std::io::Error) -> Self {
        ProbeError::Io(err)
    }
}

/// Errors of a notification attempt
///
/// These are logged and never retried.
#[derive(Debug)]
pub enum NotifyError {
    /// Appending to the alert log failed
    LogFile(std::io::Error),

    /// The message could not be built (bad mailbox, ...)
    InvalidMessage(String),

    /// The delivery channel rejected or failed to send the message
    Delivery(String),

    /// The notification did not finish in time
    Timeout(Duration),
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotifyError::LogFile(err) => write!(f, "failed to write alert log: {}", err),
            NotifyError::InvalidMessage(msg) => write!(f, "invalid alert message: {}", msg),
            NotifyError::Delivery(msg) => write!(f, "alert delivery failed: {}", msg),
            NotifyError::Timeout(timeout) => {
                write!(f, "notification timed out after {}ms", timeout.as_millis())
            }
        }
    }
}

impl std::error::Error for NotifyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NotifyError::LogFile(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for NotifyError {
    fn from(err: reqwest::Error) -> Self {
        NotifyError::Delivery(err.to_string())
    }
}

impl From<lettre::transport::smtp::Error> for NotifyError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        NotifyError::Delivery(err.to_string())
    }
}

impl From<lettre::error::Error> for NotifyError {
    fn from(err: lettre::error::Error) -> Self {
        NotifyError::InvalidMessage(err.to_string())
    }
}
