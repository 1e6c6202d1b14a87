//! SMTP submission with STARTTLS first and implicit TLS as fallback

use super::compose::{OutboundMessage, parse_mailbox};
use crate::config::SmtpConfig;
use crate::error::MailError;
use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use std::time::Duration;
use tracing::{debug, warn};

/// Port used for the implicit-TLS fallback
pub const IMPLICIT_TLS_PORT: u16 = 465;

/// How the connection is secured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    /// Plain connection upgraded with STARTTLS
    StartTls,
    /// TLS from the first byte
    Implicit,
}

/// Where and how to submit a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpEndpoint {
    /// Server hostname
    pub host: String,
    /// Server port
    pub port: u16,
    /// Connection security
    pub mode: TlsMode,
}

impl SmtpEndpoint {
    /// STARTTLS endpoint on the configured port
    pub fn primary(config: &SmtpConfig) -> Self {
        Self {
            host: config.server.clone(),
            port: config.port,
            mode: TlsMode::StartTls,
        }
    }

    /// Implicit-TLS endpoint on port 465
    pub fn fallback(config: &SmtpConfig) -> Self {
        Self {
            host: config.server.clone(),
            port: IMPLICIT_TLS_PORT,
            mode: TlsMode::Implicit,
        }
    }
}

impl std::fmt::Display for SmtpEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match self.mode {
            TlsMode::StartTls => "starttls",
            TlsMode::Implicit => "implicit-tls",
        };
        write!(f, "{}:{} ({mode})", self.host, self.port)
    }
}

/// Submits encoded messages to a mail server
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Deliver `message` through `endpoint`
    ///
    /// # Errors
    ///
    /// Returns [`MailError::Transport`] if connecting, authenticating or
    /// submitting fails, or a build error if the message cannot be encoded.
    async fn deliver(
        &self,
        endpoint: &SmtpEndpoint,
        message: &OutboundMessage,
    ) -> Result<(), MailError>;
}

/// Deliver via STARTTLS on the configured port, retrying once with implicit TLS
/// on port 465 if the submission itself fails
///
/// Returns the endpoint that accepted the message. Errors that do not depend
/// on the endpoint (address or encoding problems) are returned unchanged
/// without a second attempt.
pub async fn deliver_with_fallback(
    transport: &dyn MailTransport,
    config: &SmtpConfig,
    message: &OutboundMessage,
) -> Result<SmtpEndpoint, MailError> {
    let primary = SmtpEndpoint::primary(config);
    let first_error = match transport.deliver(&primary, message).await {
        Ok(()) => return Ok(primary),
        Err(e @ MailError::Transport { .. }) => e,
        Err(e) => return Err(e),
    };

    let fallback = SmtpEndpoint::fallback(config);
    warn!(
        recipient = %message.to,
        error = %first_error,
        fallback = %fallback,
        "STARTTLS submission failed, retrying with implicit TLS"
    );

    match transport.deliver(&fallback, message).await {
        Ok(()) => Ok(fallback),
        Err(e) => Err(MailError::Transport {
            endpoint: fallback.to_string(),
            reason: format!("{e} (after {primary} failed: {first_error})"),
        }),
    }
}

/// lettre-backed SMTP transport authenticating as the message sender
#[derive(Clone)]
pub struct SmtpMailTransport {
    secret: String,
    timeout: Duration,
}

impl SmtpMailTransport {
    /// Transport using `secret` as the password for every sender
    pub fn new(secret: impl Into<String>, timeout: Duration) -> Self {
        Self {
            secret: secret.into(),
            timeout,
        }
    }

    /// Transport from the account settings
    pub fn from_config(config: &SmtpConfig) -> Self {
        Self::new(config.secret.clone(), config.timeout)
    }
}

impl std::fmt::Debug for SmtpMailTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailTransport")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    async fn deliver(
        &self,
        endpoint: &SmtpEndpoint,
        message: &OutboundMessage,
    ) -> Result<(), MailError> {
        let transport_error = |reason: String| MailError::Transport {
            endpoint: endpoint.to_string(),
            reason,
        };

        let envelope = message.envelope()?;
        let raw = message.to_mime()?.formatted();
        let login = parse_mailbox(&message.from)?.email.to_string();

        let builder = match endpoint.mode {
            TlsMode::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&endpoint.host),
            TlsMode::Implicit => AsyncSmtpTransport::<Tokio1Executor>::relay(&endpoint.host),
        }
        .map_err(|e| transport_error(e.to_string()))?;

        let mailer = builder
            .port(endpoint.port)
            .credentials(Credentials::new(login, self.secret.clone()))
            .timeout(Some(self.timeout))
            .build();

        mailer
            .send_raw(&envelope, &raw)
            .await
            .map_err(|e| transport_error(e.to_string()))?;

        debug!(endpoint = %endpoint, recipients = envelope.to().len(), "message accepted");
        Ok(())
    }
}
