pub mod render;

pub use render::{markdown_to_html, render_email_html};

use lettre::message::{header::ContentType, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use subdigest_core::{DeliveryError, Digest, SmtpSettings};
use tracing::{debug, info};

/// Implicit-TLS submission port; every other port negotiates STARTTLS.
pub const IMPLICIT_TLS_PORT: u16 = 465;
pub const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Final destination of a generated digest.
#[allow(async_fn_in_trait)]
pub trait DigestSink {
    async fn deliver(&self, title: &str, digest: &Digest) -> Result<(), DeliveryError>;
}

/// Sends the digest as a multipart/alternative e-mail (plain Markdown, then HTML).
pub struct EmailSender {
    settings: SmtpSettings,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl EmailSender {
    pub fn new(settings: SmtpSettings) -> Result<Self, DeliveryError> {
        let from = parse_mailbox(&settings.from)?;
        let to = settings
            .to
            .iter()
            .map(|address| parse_mailbox(address))
            .collect::<Result<Vec<_>, _>>()?;

        if to.is_empty() {
            return Err(DeliveryError::NoRecipients);
        }

        Ok(Self { settings, from, to })
    }

    pub fn recipients(&self) -> &[Mailbox] {
        &self.to
    }

    pub fn build_message(&self, title: &str, digest: &Digest) -> Result<Message, DeliveryError> {
        let text_body = digest.as_str().to_string();
        let html_body = render_email_html(title, digest.as_str());

        let mut builder = Message::builder().from(self.from.clone()).subject(title);
        for recipient in &self.to {
            builder = builder.to(recipient.clone());
        }

        builder
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body),
                    ),
            )
            .map_err(|e| DeliveryError::MessageBuild {
                reason: e.to_string(),
            })
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, DeliveryError> {
        let server = &self.settings.server;
        let builder = if self.settings.port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(server)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(server)
        }
        .map_err(|e| DeliveryError::TransportSetup {
            server: server.clone(),
            reason: e.to_string(),
        })?;

        let creds = Credentials::new(
            self.settings.username.clone(),
            self.settings.password.clone(),
        );

        Ok(builder
            .port(self.settings.port)
            .credentials(creds)
            .timeout(Some(SMTP_TIMEOUT))
            .build())
    }
}

impl DigestSink for EmailSender {
    async fn deliver(&self, title: &str, digest: &Digest) -> Result<(), DeliveryError> {
        let message = self.build_message(title, digest)?;
        let mailer = self.transport()?;

        debug!(
            server = %self.settings.server,
            port = self.settings.port,
            recipients = self.to.len(),
            "Sending digest e-mail"
        );

        mailer
            .send(message)
            .await
            .map_err(|e| DeliveryError::Smtp {
                reason: e.to_string(),
                transient: e.is_transient(),
            })?;

        info!(
            recipients = self.to.len(),
            subject = title,
            "Email sent successfully"
        );
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, DeliveryError> {
    address
        .trim()
        .parse()
        .map_err(|_| DeliveryError::InvalidAddress {
            address: address.to_string(),
        })
}
