//! Core types for slm-batch

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A single scalar cell of an input row
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum FieldValue {
    /// Free text
    Text(String),
    /// Numeric cell
    Number(f64),
    /// Typed calendar date
    Date(NaiveDate),
    /// Blank cell
    Empty,
}

impl FieldValue {
    /// Whether the value renders as an empty string
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Empty => true,
            FieldValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            // Integral numbers print without a trailing ".0"
            FieldValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            FieldValue::Number(n) => write!(f, "{n}"),
            FieldValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            FieldValue::Empty => Ok(()),
        }
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => FieldValue::Empty,
            serde_json::Value::Bool(b) => FieldValue::Text(b.to_string()),
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) => FieldValue::Number(f),
                None => FieldValue::Text(n.to_string()),
            },
            serde_json::Value::String(s) => FieldValue::Text(s),
            other => FieldValue::Text(other.to_string()),
        }
    }
}

impl From<FieldValue> for serde_json::Value {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Text(s) => serde_json::Value::String(s),
            FieldValue::Number(n) => serde_json::Number::from_f64(n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            FieldValue::Date(d) => serde_json::Value::String(d.format("%Y-%m-%d").to_string()),
            FieldValue::Empty => serde_json::Value::Null,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(d: NaiveDate) -> Self {
        FieldValue::Date(d)
    }
}

/// One row of input data, keyed by column name
///
/// Field presence is not guaranteed; consumers look fields up by name and degrade
/// gracefully when they are absent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, FieldValue>,
}

impl Record {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(field, value);
        self
    }

    /// Insert or replace a field
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Look up a field
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Rendered text of a field, `None` when absent or blank
    pub fn text(&self, field: &str) -> Option<String> {
        self.get(field)
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string())
    }

    /// Iterate fields in name order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Format tag of a produced document
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactFormat {
    /// Rendered template format (.docx)
    Source,
    /// Delivery format (.pdf)
    Converted,
}

impl ArtifactFormat {
    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactFormat::Source => "docx",
            ArtifactFormat::Converted => "pdf",
        }
    }
}

/// A filesystem-resident document
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Location on disk
    pub path: PathBuf,
    /// Format tag
    pub format: ArtifactFormat,
}

impl Artifact {
    /// Create an artifact handle
    pub fn new(path: impl Into<PathBuf>, format: ArtifactFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    /// Base filename, empty if the path has none
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Path accessor
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Event emitted while a batch or dispatch run is in progress
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Document batch accepted and about to start
    BatchStarted {
        /// Number of records
        total: usize,
    },

    /// A record is about to be rendered
    ItemStarted {
        /// 1-based record position
        index: usize,
        /// Number of records
        total: usize,
        /// Human-readable status line
        status: String,
    },

    /// A conversion strategy failed for a record
    ConversionWarning {
        /// 1-based record position
        index: usize,
        /// Strategy name
        strategy: String,
        /// Failure reason
        reason: String,
    },

    /// A record produced its final artifact
    ItemCompleted {
        /// 1-based record position
        index: usize,
        /// Number of records
        total: usize,
        /// Artifact filename
        file_name: String,
        /// Whether the artifact is in the delivery format
        converted: bool,
    },

    /// Every record was processed
    BatchCompleted {
        /// Number of records
        total: usize,
        /// Whether every record reached the delivery format
        all_converted: bool,
    },

    /// The batch halted on a run-fatal error
    BatchFailed {
        /// 1-based record position, 0 if the failure happened before the first record
        index: usize,
        /// Error message
        error: String,
    },

    /// Bulk dispatch accepted and about to start
    DispatchStarted {
        /// Number of recipients
        total: usize,
    },

    /// A message is being composed and submitted
    Sending {
        /// 1-based recipient position
        index: usize,
        /// Number of recipients
        total: usize,
        /// Recipient address
        recipient: String,
    },

    /// A message was accepted by the server
    Sent {
        /// 1-based recipient position
        index: usize,
        /// Recipient address
        recipient: String,
    },

    /// A recipient could not be served
    SendFailed {
        /// 1-based recipient position
        index: usize,
        /// Recipient address
        recipient: String,
        /// Failure reason
        error: String,
    },

    /// Every recipient was attempted
    DispatchCompleted {
        /// Messages accepted
        sent: usize,
        /// Recipients that failed
        failed: usize,
        /// Number of recipients
        total: usize,
    },
}
