//! SMTP transport for loan notifications

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, Message},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Tokio1Executor,
};
use std::str::FromStr;

use crate::{
    config::EmailConfig,
    error::{AppError, AppResult},
    models::notification::EmailMessage,
    ports::Mailer,
};

#[derive(Clone)]
pub struct SmtpMailer {
    from: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// Build the SMTP transport once; the relay itself is contacted per send
    pub fn new(config: &EmailConfig) -> AppResult<Self> {
        let from_name = config.smtp_from_name.as_deref().unwrap_or("Library");
        let from = Mailbox::from_str(&format!("{} <{}>", from_name, config.smtp_from))
            .map_err(|e| AppError::Internal(format!("Invalid from address: {}", e)))?;

        let builder = if config.smtp_use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
                .map_err(|e| AppError::Internal(format!("Failed to create SMTP transport: {}", e)))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
        }
        .port(config.smtp_port)
        .timeout(Some(config.send_timeout()));

        let builder = if let (Some(username), Some(password)) =
            (&config.smtp_username, &config.smtp_password)
        {
            builder.credentials(Credentials::new(username.clone(), password.clone()))
        } else {
            builder
        };

        Ok(Self {
            from,
            transport: builder.build(),
        })
    }

    fn build_message(&self, message: &EmailMessage) -> AppResult<Message> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(message.subject.as_str());

        for recipient in &message.to {
            let mailbox = Mailbox::from_str(recipient)
                .map_err(|e| AppError::Validation(format!("Invalid to address {}: {}", recipient, e)))?;
            builder = builder.to(mailbox);
        }

        builder
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())
            .map_err(|e| AppError::Internal(format!("Failed to build email: {}", e)))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: &EmailMessage) -> AppResult<()> {
        let email = self.build_message(message)?;

        self.transport
            .send(email)
            .await
            .map_err(|e| AppError::Mail(format!("Failed to send email: {}", e)))?;

        tracing::debug!(to = ?message.to, subject = %message.subject, "Email sent");
        Ok(())
    }
}
