//! Outgoing mail: order confirmations and PDF receipt attachments.
//!
//! Thin wrapper over lettre's async SMTP transport. The transport is built
//! once at startup and cloned into the services; lettre pools connections
//! internally.

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;
use crate::error::{AppError, AppResult};

const SENDER_NAME: &str = "Floristería";

#[derive(Clone)]
pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl Mailer {
    pub fn from_config(cfg: &SmtpConfig) -> AppResult<Self> {
        // Plaintext SMTP to an internal relay.
        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&cfg.host)
            .port(cfg.port)
            .credentials(Credentials::new(cfg.user.clone(), cfg.pass.clone()))
            .build();
        let from: Mailbox = format!("{SENDER_NAME} <{}>", cfg.from)
            .parse()
            .map_err(|err: lettre::address::AddressError| AppError::Mail(err.to_string()))?;
        Ok(Self { transport, from })
    }

    /// Plain-text mail.
    pub async fn send_plain(&self, to: &str, subject: &str, body: String) -> AppResult<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse()?)
            .subject(subject)
            .body(body)?;
        self.transport.send(message).await?;
        Ok(())
    }

    /// Plain-text mail with one PDF attachment.
    pub async fn send_with_pdf(
        &self,
        to: &str,
        subject: &str,
        body: String,
        filename: &str,
        pdf: Vec<u8>,
    ) -> AppResult<()> {
        let content_type = ContentType::parse("application/pdf")
            .map_err(|err| AppError::Mail(err.to_string()))?;
        let attachment = Attachment::new(filename.to_string()).body(pdf, content_type);
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse()?)
            .subject(subject)
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(body))
                    .singlepart(attachment),
            )?;
        self.transport.send(message).await?;
        Ok(())
    }
}
