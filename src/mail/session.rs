//! Per-run dispatch inputs loaded from tabular rows

use super::compose::{MessageTemplate, Recipient};
use crate::error::MailError;
use crate::types::Record;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Recipient list column: delivery address
pub const COL_EMAIL: &str = "EmailAddress";
/// Recipient list column: display name
pub const COL_CLIENT_NAME: &str = "Client Name";
/// Recipient list column: attachment reference
pub const COL_ATTACHMENT: &str = "Attachment (for SLM)";
/// Template list column: template name
pub const COL_TEMPLATE_NAME: &str = "Template Name";
/// Template list column: subject pattern
pub const COL_SUBJECT: &str = "Subject";
/// Template list column: body pattern
pub const COL_BODY: &str = "Body";

/// The two named sections of a recipient/template workbook
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Workbook {
    /// Recipient rows
    #[serde(rename = "EmailList", default)]
    pub email_list: Vec<Record>,
    /// Template rows
    #[serde(rename = "BodySubject", default)]
    pub body_subject: Vec<Record>,
}

/// Templates, recipients and sender identity for one dispatch run
///
/// Built once before dispatch starts; dispatch only reads it.
#[derive(Clone, Debug, Default)]
pub struct Session {
    sender: String,
    templates: Vec<MessageTemplate>,
    recipients: Vec<Recipient>,
}

impl Session {
    /// Empty session sending as `sender`
    pub fn new(sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            ..Default::default()
        }
    }

    /// Session loaded from both workbook sections
    pub fn from_workbook(sender: impl Into<String>, workbook: &Workbook) -> Self {
        let mut session = Self::new(sender);
        session.load_templates(&workbook.body_subject);
        session.load_recipients(&workbook.email_list);
        session
    }

    /// Replace the templates with those in `rows`
    ///
    /// Rows without a name are skipped; a repeated name replaces the earlier row.
    pub fn load_templates(&mut self, rows: &[Record]) {
        self.templates.clear();
        for row in rows {
            let Some(name) = cell(row, COL_TEMPLATE_NAME) else {
                continue;
            };
            let template = MessageTemplate {
                name,
                subject: cell(row, COL_SUBJECT).unwrap_or_default(),
                body: cell(row, COL_BODY).unwrap_or_default(),
            };
            match self.templates.iter_mut().find(|t| t.name == template.name) {
                Some(existing) => *existing = template,
                None => self.templates.push(template),
            }
        }
        debug!(count = self.templates.len(), "loaded message templates");
    }

    /// Replace the recipients with those in `rows`
    ///
    /// Rows with a missing address or one without `@` are skipped.
    pub fn load_recipients(&mut self, rows: &[Record]) {
        self.recipients = rows
            .iter()
            .filter_map(|row| {
                let email = cell(row, COL_EMAIL).filter(|e| e.contains('@'))?;
                Some(Recipient {
                    email,
                    display_name: cell(row, COL_CLIENT_NAME).unwrap_or_default(),
                    attachment: cell(row, COL_ATTACHMENT),
                })
            })
            .collect();
        debug!(
            count = self.recipients.len(),
            skipped = rows.len() - self.recipients.len(),
            "loaded recipients"
        );
    }

    /// Add one template
    pub fn add_template(&mut self, template: MessageTemplate) {
        self.templates.retain(|t| t.name != template.name);
        self.templates.push(template);
    }

    /// Add one recipient
    pub fn add_recipient(&mut self, recipient: Recipient) {
        self.recipients.push(recipient);
    }

    /// Sender address
    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Template by name
    pub fn template(&self, name: &str) -> Result<&MessageTemplate, MailError> {
        self.templates
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| MailError::TemplateNotFound(name.to_string()))
    }

    /// Template names in load order
    pub fn template_names(&self) -> Vec<&str> {
        self.templates.iter().map(|t| t.name.as_str()).collect()
    }

    /// Recipients in load order
    pub fn recipients(&self) -> &[Recipient] {
        &self.recipients
    }
}

/// Trimmed cell text; blank cells and spreadsheet `nan` placeholders read as absent
fn cell(row: &Record, column: &str) -> Option<String> {
    row.text(column)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && s != "nan")
}
