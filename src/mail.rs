//! Mail delivery channels
//!
//! Alert mails go out either directly through an SMTP relay or through an
//! HTTP transactional-mail API. Both sit behind the [`Mailer`] trait and are
//! picked by the `delivery.mode` configuration.

use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, error, info, instrument};

use crate::config::{DeliveryConfig, HttpApiConfig, SmtpConfig, SmtpTls};
use crate::error::{ConfigError, ConfigResult, NotifyError};
use crate::util::get_api_key;

/// A rendered alert mail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Channel name for logging
    fn name(&self) -> &'static str;

    async fn send(&self, email: &Email) -> Result<(), NotifyError>;
}

/// Build the mailer selected by the configuration, `None` for log-only mode.
pub fn build_mailer(
    config: &DeliveryConfig,
    timeout: Duration,
) -> ConfigResult<Option<Box<dyn Mailer>>> {
    let mailer: Box<dyn Mailer> = match config {
        DeliveryConfig::None => return Ok(None),
        DeliveryConfig::Smtp(smtp) => Box::new(SmtpMailer::new(smtp, timeout)?),
        DeliveryConfig::HttpApi(api) => Box::new(HttpApiMailer::new(api, timeout)?),
    };
    debug!("using {} delivery", mailer.name());
    Ok(Some(mailer))
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig, timeout: Duration) -> ConfigResult<Self> {
        let invalid = |e: lettre::transport::smtp::Error| {
            ConfigError::InvalidValue(format!("smtp relay {}: {e}", config.host))
        };

        let mut builder = match config.tls {
            SmtpTls::Starttls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host).map_err(invalid)?
            }
            SmtpTls::Implicit => {
                AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host).map_err(invalid)?
            }
            SmtpTls::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host),
        };

        if let Some(port) = config.port {
            builder = builder.port(port);
        }

        if let Some(username) = &config.username {
            let password = config.resolve_password().ok_or_else(|| {
                ConfigError::InvalidValue(format!("smtp user '{username}' has no password"))
            })?;
            builder = builder.credentials(Credentials::new(username.clone(), password));
        }

        Ok(Self {
            transport: builder.timeout(Some(timeout)).build(),
            from: parse_mailbox(&config.from)?,
            to: config
                .to
                .iter()
                .map(|to| parse_mailbox(to))
                .collect::<ConfigResult<_>>()?,
        })
    }
}

fn parse_mailbox(address: &str) -> ConfigResult<Mailbox> {
    address
        .parse::<Mailbox>()
        .map_err(|e| ConfigError::InvalidValue(format!("mail address '{address}': {e}")))
}

#[async_trait]
impl Mailer for SmtpMailer {
    fn name(&self) -> &'static str {
        "smtp"
    }

    #[instrument(skip_all)]
    async fn send(&self, email: &Email) -> Result<(), NotifyError> {
        let mut builder = lettre::Message::builder()
            .from(self.from.clone())
            .subject(email.subject.clone())
            .header(ContentType::TEXT_PLAIN);
        for to in &self.to {
            builder = builder.to(to.clone());
        }
        let message = builder.body(email.body.clone())?;

        match self.transport.send(message).await {
            Ok(response) => {
                info!("Successfully sent alert mail via SMTP ({})", response.code());
                Ok(())
            }
            Err(e) => {
                error!("Failed to send alert mail via SMTP: {}", e);
                Err(e.into())
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiPayload<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    text: &'a str,
}

#[derive(Debug, Clone)]
pub struct HttpApiMailer {
    client: Client,
    url: String,
    api_key: Option<String>,
    from: String,
    to: Vec<String>,
}

impl HttpApiMailer {
    pub fn new(config: &HttpApiConfig, timeout: Duration) -> ConfigResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::InvalidValue(format!("http client: {e}")))?;

        Ok(Self {
            client,
            url: config.url.clone(),
            api_key: config.api_key.clone().or_else(get_api_key),
            from: config.from.clone(),
            to: config.to.clone(),
        })
    }
}

#[async_trait]
impl Mailer for HttpApiMailer {
    fn name(&self) -> &'static str {
        "http_api"
    }

    #[instrument(skip_all)]
    async fn send(&self, email: &Email) -> Result<(), NotifyError> {
        let payload = ApiPayload {
            from: &self.from,
            to: &self.to,
            subject: &email.subject,
            text: &email.body,
        };

        let mut request = self.client.post(&self.url).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        match request.send().await {
            Ok(response) => {
                if response.status().is_success() {
                    info!("Successfully sent alert mail via HTTP API");
                    Ok(())
                } else {
                    let status = response.status();
                    error!("Mail API request failed with status: {}", status);
                    let detail = response.text().await.unwrap_or_default();
                    if !detail.is_empty() {
                        error!("Mail API error response: {}", detail);
                    }
                    Err(NotifyError::Delivery(format!("mail API returned {status}")))
                }
            }
            Err(e) => {
                error!("Failed to send alert mail via HTTP API: {}", e);
                Err(e.into())
            }
        }
    }
}
