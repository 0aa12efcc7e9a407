//! Outbound email.
//!
//! `SmtpMailer` talks to a real relay; `LogMailer` is used when no SMTP host is
//! configured; `MemoryMailer` keeps messages in memory for tests and demos.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::domain::DomainError;
use crate::infrastructure::config::{Config, SmtpConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl EmailMessage {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), DomainError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(smtp: &SmtpConfig, from: &str) -> Result<Self, DomainError> {
        let builder = if smtp.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)
                .map_err(|e| DomainError::External(format!("SMTP relay: {}", e)))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&smtp.host)
        };
        let mut builder = builder.port(smtp.port);

        if let (Some(username), Some(password)) = (&smtp.username, &smtp.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        let from = from
            .parse::<Mailbox>()
            .map_err(|e| DomainError::Internal(format!("Invalid EMAIL_FROM: {}", e)))?;

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), DomainError> {
        let to = message
            .to
            .parse::<Mailbox>()
            .map_err(|e| DomainError::External(format!("Invalid recipient: {}", e)))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(message.body)
            .map_err(|e| DomainError::External(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| DomainError::External(format!("SMTP send failed: {}", e)))?;
        Ok(())
    }
}

/// Writes emails to the log instead of sending them.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), DomainError> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            "Email not sent (SMTP not configured)"
        );
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<EmailMessage>>,
}

impl MemoryMailer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn sent_to(&self, to: &str) -> Vec<EmailMessage> {
        self.sent().into_iter().filter(|m| m.to == to).collect()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), DomainError> {
        self.sent
            .lock()
            .map_err(|_| DomainError::Internal("mailer lock poisoned".to_string()))?
            .push(message);
        Ok(())
    }
}

pub fn build_mailer(config: &Config) -> Arc<dyn Mailer> {
    match &config.smtp {
        Some(smtp) => match SmtpMailer::new(smtp, &config.email_from) {
            Ok(mailer) => {
                tracing::info!("SMTP mailer configured for {}:{}", smtp.host, smtp.port);
                Arc::new(mailer)
            }
            Err(e) => {
                tracing::error!("Failed to configure SMTP, falling back to log mailer: {}", e);
                Arc::new(LogMailer)
            }
        },
        None => Arc::new(LogMailer),
    }
}

/// Sends a notification; failures are logged and never bubble up to the request.
pub async fn deliver(mailer: &dyn Mailer, message: EmailMessage) {
    let to = message.to.clone();
    let subject = message.subject.clone();
    if let Err(e) = mailer.send(message).await {
        tracing::warn!(to = %to, subject = %subject, "Email delivery failed: {}", e);
    }
}
