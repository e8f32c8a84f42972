//! Outgoing mail transport.

use std::sync::Arc;

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::response::Response,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{config::MailConfig, error::AppError};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address: {0}")]
    Address(String),
    #[error("could not render template: {0}")]
    Render(String),
    #[error("could not build message: {0}")]
    Build(String),
    #[error("transport failed: {0}")]
    Transport(String),
}

#[derive(Debug, Clone)]
pub struct OutgoingMail {
    pub from: Mailbox,
    pub to: Mailbox,
    pub subject: String,
    pub html: String,
}

/// What the transport told us about an accepted message.
#[derive(Debug, Clone)]
pub struct DeliveryReceipt {
    pub message_id: String,
    pub detail: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<DeliveryReceipt, MailError>;
}

/// SMTP when `SMTP_URL` is set, otherwise mail is only logged.
pub fn from_config(config: &MailConfig) -> Result<Arc<dyn Mailer>, AppError> {
    match config.smtp_url.as_deref() {
        Some(url) => {
            let mailer = SmtpMailer::from_url(url)
                .map_err(|err| AppError::Config(format!("invalid SMTP_URL: {err}")))?;
            Ok(Arc::new(mailer))
        }
        None => Ok(Arc::new(LogMailer)),
    }
}

fn new_message_id(from: &Mailbox) -> String {
    format!("<{}@{}>", Uuid::new_v4(), from.email.domain())
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn from_url(url: &str) -> Result<Self, MailError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::from_url(url)
            .map_err(|err| MailError::Transport(err.to_string()))?
            .build();
        Ok(Self { transport })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<DeliveryReceipt, MailError> {
        let message_id = new_message_id(&mail.from);
        let message = Message::builder()
            .message_id(Some(message_id.clone()))
            .from(mail.from)
            .to(mail.to)
            .subject(mail.subject)
            .header(ContentType::TEXT_HTML)
            .body(mail.html)
            .map_err(|err| MailError::Build(err.to_string()))?;

        let response = self
            .transport
            .send(message)
            .await
            .map_err(|err| MailError::Transport(err.to_string()))?;
        Ok(DeliveryReceipt {
            message_id,
            detail: response_detail(&response),
        })
    }
}

fn response_detail(response: &Response) -> String {
    format!(
        "{} {}",
        response.code(),
        response.message().collect::<Vec<_>>().join(" ")
    )
}

/// Development mailer: nothing leaves the process.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<DeliveryReceipt, MailError> {
        let message_id = new_message_id(&mail.from);
        info!(
            to = %mail.to,
            subject = %mail.subject,
            message_id = %message_id,
            "no SMTP transport configured, mail logged only"
        );
        debug!(html = %mail.html, "mail body");
        Ok(DeliveryReceipt {
            message_id,
            detail: "logged".into(),
        })
    }
}
