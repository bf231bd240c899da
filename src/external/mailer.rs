use crate::config::SmtpConfig;
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> AppResult<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> AppResult<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| AppError::ExternalApiError(format!("SMTP relay setup failed: {e}")))?
            .port(config.port);
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from: config.from.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: OutgoingMail) -> AppResult<()> {
        let from = self
            .from
            .parse()
            .map_err(|e| AppError::InternalError(format!("Invalid sender address: {e}")))?;
        let to = mail
            .to
            .parse()
            .map_err(|e| AppError::ValidationError(format!("Invalid recipient address: {e}")))?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(mail.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(mail.body)
            .map_err(|e| AppError::InternalError(format!("Failed to build email: {e}")))?;

        match self.transport.send(message).await {
            Ok(_) => {
                log::info!("Email '{}' sent to {}", mail.subject, mail.to);
                Ok(())
            }
            Err(e) => {
                log::error!("Email '{}' to {} failed: {}", mail.subject, mail.to, e);
                Err(AppError::ExternalApiError(format!("Email sending failed: {e}")))
            }
        }
    }
}

/// Stand-in used when no SMTP host is configured. Drops the message.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> AppResult<()> {
        log::warn!(
            "Mail delivery is disabled; dropped '{}' for {}",
            mail.subject,
            mail.to
        );
        Ok(())
    }
}

pub fn create_mailer(config: &SmtpConfig) -> AppResult<Arc<dyn Mailer>> {
    if config.host.is_empty() {
        log::warn!("SMTP host not configured, outgoing mail will only be logged");
        return Ok(Arc::new(LogMailer));
    }
    Ok(Arc::new(SmtpMailer::new(config)?))
}

pub fn verification_mail(to: &str, username: &str, code: &str, ttl_minutes: i64) -> OutgoingMail {
    OutgoingMail {
        to: to.to_string(),
        subject: "Verify your email address".to_string(),
        body: format!(
            "Hi {username},\n\nYour verification code is: {code}\n\nIt expires in {ttl_minutes} minutes."
        ),
    }
}

pub fn reset_password_mail(to: &str, reset_link: &str, ttl_minutes: i64) -> OutgoingMail {
    OutgoingMail {
        to: to.to_string(),
        subject: "Reset your password".to_string(),
        body: format!(
            "We received a request to reset your password.\n\n\
             Open this link to choose a new one: {reset_link}\n\n\
             The link expires in {ttl_minutes} minutes. If you did not ask for a reset, ignore this email."
        ),
    }
}
