//! Outbound email
//!
//! The notification dispatcher talks to a [`Mailer`]. With SMTP configured it
//! is an [`SmtpMailer`] on lettre's async transport; otherwise a
//! [`LogMailer`] records what would have been sent.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;

use crate::config::EmailConfig;

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send one message to every address in `recipients`.
    async fn send(&self, subject: &str, body: &str, recipients: &[String]) -> Result<()>;
}

/// SMTP relay mailer.
///
/// Multiple recipients are addressed as Bcc on a single message sent to the
/// configured from-address, so followers never see each other's emails.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let from: Mailbox = format!("{} <{}>", config.from_name, config.from_address)
            .parse()
            .map_err(|e| anyhow!("Invalid from address: {}", e))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .with_context(|| format!("Failed to create SMTP transport for {}", config.smtp_host))?
            .port(config.smtp_port);
        if !config.smtp_username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    fn build_message(&self, subject: &str, body: &str, recipients: &[String]) -> Result<Message> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(self.from.clone())
            .subject(subject)
            .header(ContentType::TEXT_PLAIN);

        let mut accepted = 0;
        for recipient in recipients {
            match recipient.parse::<Mailbox>() {
                Ok(mailbox) => {
                    builder = builder.bcc(mailbox);
                    accepted += 1;
                }
                Err(e) => tracing::warn!("Skipping invalid recipient {}: {}", recipient, e),
            }
        }
        if accepted == 0 {
            return Err(anyhow!("No valid recipients"));
        }

        builder
            .body(body.to_string())
            .map_err(|e| anyhow!("Failed to build email: {}", e))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, subject: &str, body: &str, recipients: &[String]) -> Result<()> {
        if recipients.is_empty() {
            return Ok(());
        }
        let message = self.build_message(subject, body, recipients)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| anyhow!("Failed to send email: {}", e))?;
        tracing::debug!(count = recipients.len(), "Email sent: {}", subject);
        Ok(())
    }
}

/// Mailer used when no SMTP relay is configured
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, subject: &str, _body: &str, recipients: &[String]) -> Result<()> {
        tracing::info!(recipients = ?recipients, "Email (not sent, SMTP disabled): {}", subject);
        Ok(())
    }
}

/// Mailer for the given configuration
pub fn build_mailer(config: &EmailConfig) -> Result<Arc<dyn Mailer>> {
    if config.is_configured() {
        tracing::info!("SMTP mailer enabled via {}:{}", config.smtp_host, config.smtp_port);
        Ok(Arc::new(SmtpMailer::new(config)?))
    } else {
        tracing::info!("SMTP not configured, emails will only be logged");
        Ok(Arc::new(LogMailer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smtp_config() -> EmailConfig {
        EmailConfig {
            smtp_host: "smtp.example.com".to_string(),
            ..EmailConfig::default()
        }
    }

    #[tokio::test]
    async fn test_message_puts_recipients_in_bcc() {
        let mailer = SmtpMailer::new(&smtp_config()).unwrap();
        let message = mailer
            .build_message(
                "hello",
                "body",
                &["a@example.com".to_string(), "b@example.com".to_string()],
            )
            .unwrap();

        let envelope = message.envelope();
        assert_eq!(envelope.to().len(), 3);
        let headers = String::from_utf8(message.formatted()).unwrap();
        assert!(!headers.contains("a@example.com"));
    }

    #[tokio::test]
    async fn test_invalid_recipient_skipped() {
        let mailer = SmtpMailer::new(&smtp_config()).unwrap();
        let recipients = vec![
            "good1@example.com".to_string(),
            "ann smith@example.com".to_string(),
            "good2@example.com".to_string(),
        ];
        let message = mailer.build_message("s", "b", &recipients).unwrap();

        let envelope = message.envelope();
        let addresses: Vec<String> = envelope.to().iter().map(|a| a.to_string()).collect();
        assert_eq!(addresses.len(), 3);
        assert!(addresses.contains(&"good1@example.com".to_string()));
        assert!(addresses.contains(&"good2@example.com".to_string()));
    }

    #[tokio::test]
    async fn test_all_invalid_recipients_rejected() {
        let mailer = SmtpMailer::new(&smtp_config()).unwrap();
        assert!(mailer.build_message("s", "b", &["not an email".to_string()]).is_err());
    }

    #[tokio::test]
    async fn test_log_mailer_accepts_anything() {
        LogMailer.send("s", "b", &["x@example.com".to_string()]).await.unwrap();
    }
}
