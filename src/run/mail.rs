//! Mail notification of run outcomes
//!
//! One message per finished (or refused) run: subject
//! `"<connector> <crawlType> <Success|Failure>"`, body carrying the last
//! error and the most recent error queue items. Notification is best
//! effort; a mail failure never fails the run.

use lettre::message::header::ContentType;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use log::{debug, warn};

use crate::config::MailConfig;

/// Outcome word used in the mail subject
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailStatus {
    Success,
    Failure,
}

impl MailStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Failure => "Failure",
        }
    }
}

/// SMTP notifier bound to the connector's mail configuration
#[derive(Debug, Clone)]
pub struct MailNotifier {
    config: MailConfig,
}

impl MailNotifier {
    #[must_use]
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }

    /// Send the run-outcome notification
    ///
    /// Silently skipped (with a debug log) when the mail endpoint is not
    /// configured.
    pub async fn notify(
        &self,
        connector: &str,
        crawl_type: &str,
        status: MailStatus,
        last_error: Option<&str>,
        error_items: &[String],
    ) {
        if !self.config.is_configured() {
            debug!("Mail endpoint not configured; skipping notification");
            return;
        }
        let (Some(host), Some(from)) = (self.config.smtp_host(), self.config.from_addr()) else {
            return;
        };

        let subject = format!("{connector} {crawl_type} {}", status.as_str());
        let mut body = String::new();
        body.push_str(&format!("Connector: {connector}\n"));
        body.push_str(&format!("Crawl type: {crawl_type}\n"));
        body.push_str(&format!("Status: {}\n", status.as_str()));
        if let Some(error) = last_error {
            body.push_str(&format!("Last error: {error}\n"));
        }
        if !error_items.is_empty() {
            body.push_str("\nError queue items:\n");
            for item in error_items {
                body.push_str(&format!("  {item}\n"));
            }
        }

        let Ok(from_mailbox) = from.parse::<lettre::message::Mailbox>() else {
            warn!("Invalid mail sender address '{from}'");
            return;
        };
        let mut builder = Message::builder()
            .from(from_mailbox)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN);
        for recipient in self.config.recipients() {
            match recipient.parse::<lettre::message::Mailbox>() {
                Ok(mailbox) => builder = builder.to(mailbox),
                Err(e) => warn!("Invalid mail recipient '{recipient}': {e}"),
            }
        }
        let message = match builder.body(body) {
            Ok(message) => message,
            Err(e) => {
                warn!("Failed to build notification mail: {e}");
                return;
            }
        };

        let transport =
            match AsyncSmtpTransport::<Tokio1Executor>::relay(host) {
                Ok(builder) => builder.build(),
                Err(e) => {
                    warn!("Failed to build SMTP transport for {host}: {e}");
                    return;
                }
            };
        match transport.send(message).await {
            Ok(_) => debug!("Sent run notification to {} recipient(s)", self.config.recipients().len()),
            Err(e) => warn!("Failed to send run notification: {e}"),
        }
    }
}
