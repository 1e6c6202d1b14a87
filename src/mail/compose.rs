//! Message composition

use super::attachment::AttachmentFetcher;
use crate::config::AttachmentErrorPolicy;
use crate::error::MailError;
use lettre::Address;
use lettre::address::Envelope;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, Message, MultiPart, SinglePart};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, warn};

/// Token replaced by the recipient's display name in subjects and bodies
pub const CLIENT_NAME_TOKEN: &str = "[Client Name]";

/// A named subject/body pair
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageTemplate {
    /// Template name as listed in the session
    pub name: String,
    /// Subject pattern
    pub subject: String,
    /// Plain-text body pattern
    pub body: String,
}

/// One row of the recipient list
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    /// Delivery address
    pub email: String,
    /// Name substituted for [`CLIENT_NAME_TOKEN`], may be empty
    #[serde(default)]
    pub display_name: String,
    /// Attachment URL or path, resolved only when attachments are requested
    #[serde(default)]
    pub attachment: Option<String>,
}

/// A file attached to an outbound message
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttachmentPart {
    /// Filename announced in `Content-Disposition`
    pub file_name: String,
    /// Raw bytes
    pub content: Vec<u8>,
}

/// A fully substituted message, not yet encoded
#[derive(Clone, Debug)]
pub struct OutboundMessage {
    /// Sender address
    pub from: String,
    /// Primary recipient
    pub to: String,
    /// Carbon-copy addresses
    pub cc: Vec<String>,
    /// Blind carbon-copy addresses
    pub bcc: Vec<String>,
    /// Final subject
    pub subject: String,
    /// Final plain-text body
    pub body: String,
    /// `Date` header value
    pub date: SystemTime,
    /// Optional binary attachment
    pub attachment: Option<AttachmentPart>,
}

impl OutboundMessage {
    /// SMTP envelope recipients: `To`, then every `Cc`, then every `Bcc`
    pub fn envelope_recipients(&self) -> Vec<&str> {
        std::iter::once(self.to.as_str())
            .chain(self.cc.iter().map(String::as_str))
            .chain(self.bcc.iter().map(String::as_str))
            .collect()
    }

    /// SMTP envelope for this message
    pub fn envelope(&self) -> Result<Envelope, MailError> {
        let from = parse_mailbox(&self.from)?.email;
        let to = self
            .envelope_recipients()
            .into_iter()
            .map(parse_address)
            .collect::<Result<Vec<_>, _>>()?;
        Envelope::new(Some(from), to).map_err(|e| MailError::Build(e.to_string()))
    }

    /// Encode as a `multipart/mixed` MIME message
    ///
    /// The `Bcc` header is not written to the encoded message; Bcc addresses only
    /// appear in the [`envelope`](Self::envelope).
    pub fn to_mime(&self) -> Result<Message, MailError> {
        let mut builder = Message::builder()
            .from(parse_mailbox(&self.from)?)
            .to(parse_mailbox(&self.to)?)
            .subject(self.subject.clone())
            .date(self.date);
        for cc in &self.cc {
            builder = builder.cc(parse_mailbox(cc)?);
        }
        for bcc in &self.bcc {
            builder = builder.bcc(parse_mailbox(bcc)?);
        }

        let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(self.body.clone()));
        if let Some(attachment) = &self.attachment {
            let content_type = ContentType::parse("application/octet-stream")
                .map_err(|e| MailError::Build(e.to_string()))?;
            parts = parts.singlepart(
                Attachment::new(attachment.file_name.clone())
                    .body(attachment.content.clone(), content_type),
            );
        }

        builder
            .multipart(parts)
            .map_err(|e| MailError::Build(e.to_string()))
    }
}

/// Replace every [`CLIENT_NAME_TOKEN`] in `pattern`
pub fn substitute(pattern: &str, display_name: &str) -> String {
    pattern.replace(CLIENT_NAME_TOKEN, display_name)
}

/// Split a comma-separated address list, trimming whitespace and dropping blanks
pub fn parse_address_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `addr@example.com` or `Name <addr@example.com>`
pub fn parse_mailbox(value: &str) -> Result<Mailbox, MailError> {
    value
        .trim()
        .parse::<Mailbox>()
        .map_err(|e| MailError::InvalidAddress {
            address: value.to_string(),
            reason: e.to_string(),
        })
}

fn parse_address(value: &str) -> Result<Address, MailError> {
    parse_mailbox(value).map(|m| m.email)
}

/// Builds per-recipient messages for one dispatch run
///
/// Cc and Bcc lists apply to every message the composer builds.
pub struct MessageComposer {
    sender: String,
    cc: Vec<String>,
    bcc: Vec<String>,
    fetcher: Arc<dyn AttachmentFetcher>,
    policy: AttachmentErrorPolicy,
}

impl MessageComposer {
    /// Composer sending as `sender`
    pub fn new(sender: impl Into<String>, fetcher: Arc<dyn AttachmentFetcher>) -> Self {
        Self {
            sender: sender.into(),
            cc: Vec::new(),
            bcc: Vec::new(),
            fetcher,
            policy: AttachmentErrorPolicy::default(),
        }
    }

    /// Copy every message to these addresses
    pub fn with_cc(mut self, cc: Vec<String>) -> Self {
        self.cc = cc;
        self
    }

    /// Blind-copy every message to these addresses
    pub fn with_bcc(mut self, bcc: Vec<String>) -> Self {
        self.bcc = bcc;
        self
    }

    /// Behavior when an attachment cannot be fetched
    pub fn with_attachment_policy(mut self, policy: AttachmentErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Build the message for one recipient
    ///
    /// When `include_attachment` is set and the recipient has a reference, the
    /// resource is fetched into a transient directory that is removed before
    /// this returns, whatever the outcome.
    pub async fn compose(
        &self,
        recipient: &Recipient,
        template: &MessageTemplate,
        include_attachment: bool,
    ) -> Result<OutboundMessage, MailError> {
        parse_mailbox(&recipient.email)?;

        let attachment = match recipient.attachment.as_deref().map(str::trim) {
            Some(reference) if include_attachment && !reference.is_empty() => {
                match self.fetch_attachment(reference).await {
                    Ok(part) => Some(part),
                    Err(e) if self.policy == AttachmentErrorPolicy::SendWithout => {
                        warn!(
                            recipient = %recipient.email,
                            error = %e,
                            "attachment unavailable, sending without it"
                        );
                        None
                    }
                    Err(e) => return Err(e),
                }
            }
            _ => None,
        };

        Ok(OutboundMessage {
            from: self.sender.clone(),
            to: recipient.email.trim().to_string(),
            cc: self.cc.clone(),
            bcc: self.bcc.clone(),
            subject: substitute(&template.subject, &recipient.display_name),
            body: substitute(&template.body, &recipient.display_name),
            date: SystemTime::now(),
            attachment,
        })
    }

    async fn fetch_attachment(&self, reference: &str) -> Result<AttachmentPart, MailError> {
        let staging = tempfile::Builder::new()
            .prefix("slm-attachment-")
            .tempdir()
            .map_err(|e| MailError::Fetch {
                url: reference.to_string(),
                reason: format!("failed to create staging directory: {e}"),
            })?;

        let local = self.fetcher.fetch(reference, staging.path()).await?;
        let content = tokio::fs::read(&local).await.map_err(|e| MailError::Fetch {
            url: reference.to_string(),
            reason: e.to_string(),
        })?;
        let file_name = file_name_of(&local);
        debug!(reference, file_name = %file_name, bytes = content.len(), "attached file");

        Ok(AttachmentPart { file_name, content })
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| super::attachment::FALLBACK_NAME.to_string())
}
