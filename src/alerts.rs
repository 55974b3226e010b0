use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::SecondsFormat;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, instrument, trace};

use crate::config::MonitorConfig;
use crate::error::NotifyError;
use crate::mail::{Email, Mailer};
use crate::monitors::state::AlertTransition;

const RECOVERED: &str = "Host has recovered.";

/// Receives the alert transitions of the scheduler
#[async_trait]
pub trait Notify: Send + Sync {
    async fn notify(&self, transition: &AlertTransition) -> Result<(), NotifyError>;
}

#[async_trait]
impl<N> Notify for Arc<N>
where
    N: Notify + ?Sized,
{
    async fn notify(&self, transition: &AlertTransition) -> Result<(), NotifyError> {
        (**self).notify(transition).await
    }
}

/// Monitor settings quoted in alert messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertContext {
    pub target: String,
    pub max_rtt: Duration,
    pub max_retries: u32,
}

impl From<&MonitorConfig> for AlertContext {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            target: config.display(),
            max_rtt: config.max_rtt,
            max_retries: config.max_retries,
        }
    }
}

fn headline(transition: &AlertTransition) -> &'static str {
    match transition {
        AlertTransition::Raised { reason, .. } => reason.description(),
        AlertTransition::Cleared { .. } => RECOVERED,
    }
}

fn timestamp(transition: &AlertTransition) -> String {
    transition
        .occurred_at()
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Render the alert mail for a transition.
pub fn render_email(transition: &AlertTransition, context: &AlertContext) -> Email {
    let event = match transition {
        AlertTransition::Raised { reason, .. } => format!("ALERT ({})", reason.code()),
        AlertTransition::Cleared { .. } => "RECOVERED".to_string(),
    };

    Email {
        subject: format!("[hostwatch] {}: {}", context.target, headline(transition)),
        body: format!(
            "{}\n\n\
             Target:      {}\n\
             Event:       {}\n\
             Time:        {}\n\
             Max RTT:     {}ms\n\
             Max retries: {}\n",
            headline(transition),
            context.target,
            event,
            timestamp(transition),
            context.max_rtt.as_millis(),
            context.max_retries,
        ),
    }
}

/// Render the alert log line for a transition (without trailing newline).
pub fn render_log_line(transition: &AlertTransition, context: &AlertContext) -> String {
    let (kind, code) = match transition {
        AlertTransition::Raised { reason, .. } => ("RAISED", reason.code()),
        AlertTransition::Cleared { .. } => ("CLEARED", "-"),
    };

    format!(
        "{} {kind} {} {code} {}",
        timestamp(transition),
        context.target,
        headline(transition)
    )
}

/// Writes alert transitions to the alert log and mails them through the
/// configured delivery channel
pub struct AlertManager {
    context: AlertContext,
    log_file: Option<PathBuf>,
    mailer: Option<Box<dyn Mailer>>,
}

impl AlertManager {
    pub fn new(
        context: AlertContext,
        log_file: Option<PathBuf>,
        mailer: Option<Box<dyn Mailer>>,
    ) -> Self {
        Self {
            context,
            log_file,
            mailer,
        }
    }

    async fn append_log(&self, line: &str) -> Result<(), NotifyError> {
        let Some(path) = &self.log_file else {
            return Ok(());
        };

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(NotifyError::LogFile)?;
        file.write_all(format!("{line}\n").as_bytes())
            .await
            .map_err(NotifyError::LogFile)?;
        file.flush().await.map_err(NotifyError::LogFile)
    }
}

#[async_trait]
impl Notify for AlertManager {
    #[instrument(skip_all, fields(target = %self.context.target))]
    async fn notify(&self, transition: &AlertTransition) -> Result<(), NotifyError> {
        let line = render_log_line(transition, &self.context);
        info!("{line}");

        // the mail goes out even if the log file is broken
        let logged = self.append_log(&line).await;
        if let Err(e) = &logged {
            error!("{e}");
        }

        let Some(mailer) = &self.mailer else {
            trace!("no delivery channel configured");
            return logged;
        };

        let email = render_email(transition, &self.context);
        mailer.send(&email).await?;

        logged
    }
}
