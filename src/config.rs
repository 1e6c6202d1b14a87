//! Configuration types for slm-batch

use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Field preprocessing applied to every record before rendering
///
/// Each list names record fields; a field that is absent from a record is skipped.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Fields reformatted as `DD MonthName YYYY` with localized month names
    #[serde(default = "default_date_fields")]
    pub date_fields: Vec<String>,

    /// Fields formatted as currency (`Rp 1.234.567`)
    #[serde(default = "default_money_fields")]
    pub money_fields: Vec<String>,

    /// Fields zero-left-padded to `phone_width`
    #[serde(default = "default_phone_fields")]
    pub phone_fields: Vec<String>,

    /// Target width for phone fields (default: 12)
    #[serde(default = "default_phone_width")]
    pub phone_width: usize,

    /// Currency symbol prefixed to money fields (default: "Rp")
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            date_fields: default_date_fields(),
            money_fields: default_money_fields(),
            phone_fields: default_phone_fields(),
            phone_width: default_phone_width(),
            currency_symbol: default_currency_symbol(),
        }
    }
}

/// Document conversion strategies and external tool settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConvertConfig {
    /// Convert rendered documents at all (default: true)
    ///
    /// When disabled every record is delivered in source format.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Try office-suite automation through the platform scripting host (default: true)
    #[serde(default = "default_true")]
    pub desktop_suite: bool,

    /// Try direct COM scripting of the word processor on Windows (default: true)
    #[serde(default = "default_true")]
    pub com_automation: bool,

    /// Try a headless office binary (default: true)
    #[serde(default = "default_true")]
    pub headless: bool,

    /// Explicit headless converter path, probed before the built-in candidates
    #[serde(default)]
    pub headless_path: Option<PathBuf>,

    /// Built-in headless converter candidates, probed in order
    #[serde(default = "default_headless_candidates")]
    pub headless_candidates: Vec<PathBuf>,

    /// Time budget for a `--version` probe (default: 10 seconds)
    #[serde(default = "default_probe_timeout", with = "duration_serde")]
    pub probe_timeout: Duration,

    /// Time budget for one headless conversion (default: 60 seconds)
    #[serde(default = "default_convert_timeout", with = "duration_serde")]
    pub convert_timeout: Duration,

    /// Time budget for one desktop or COM automation run (default: 120 seconds)
    #[serde(default = "default_automation_timeout", with = "duration_serde")]
    pub automation_timeout: Duration,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            desktop_suite: true,
            com_automation: true,
            headless: true,
            headless_path: None,
            headless_candidates: default_headless_candidates(),
            probe_timeout: default_probe_timeout(),
            convert_timeout: default_convert_timeout(),
            automation_timeout: default_automation_timeout(),
        }
    }
}

/// Output naming for generated documents
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Leading document label in every filename (default: "SLM")
    #[serde(default = "default_label")]
    pub label: String,

    /// Record field used as the primary name component (default: "ClientName")
    #[serde(default = "default_identity_field")]
    pub identity_field: String,

    /// Record field shown in parentheses (default: "PlatformName")
    #[serde(default = "default_secondary_field")]
    pub secondary_field: String,

    /// Parent directory for batch workspaces (default: system temp dir)
    #[serde(default)]
    pub workspace_root: Option<PathBuf>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            label: default_label(),
            identity_field: default_identity_field(),
            secondary_field: default_secondary_field(),
            workspace_root: None,
        }
    }
}

/// Outbound SMTP account
///
/// The implicit-TLS fallback always targets port 465 and is not configurable.
#[derive(Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// SMTP server hostname (default: "smtp.gmail.com")
    #[serde(default = "default_smtp_server")]
    pub server: String,

    /// Submission port for the STARTTLS attempt (default: 587)
    #[serde(default = "default_smtp_port")]
    pub port: u16,

    /// Sender address, also used as the login name
    #[serde(default)]
    pub sender: String,

    /// Sender password or app secret
    #[serde(default, skip_serializing)]
    pub secret: String,

    /// Connection timeout per delivery attempt (default: 30 seconds)
    #[serde(default = "default_smtp_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            server: default_smtp_server(),
            port: default_smtp_port(),
            sender: String::new(),
            secret: String::new(),
            timeout: default_smtp_timeout(),
        }
    }
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("sender", &self.sender)
            .field("secret", &if self.secret.is_empty() { "" } else { "***" })
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// What to do when a recipient's attachment cannot be fetched
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentErrorPolicy {
    /// Count the recipient as failed and send nothing (default)
    #[default]
    FailRecipient,
    /// Log the failure and send the message without the attachment
    SendWithout,
}

/// Bulk dispatch behavior
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Fixed delay after every recipient (default: 1000 ms)
    #[serde(default = "default_pacing", with = "millis_serde")]
    pub pacing: Duration,

    /// Number of most recent log entries kept for live display (default: 10)
    #[serde(default = "default_log_window")]
    pub log_window: usize,

    /// Time budget for one attachment download (default: 30 seconds)
    #[serde(default = "default_attachment_timeout", with = "duration_serde")]
    pub attachment_timeout: Duration,

    /// Attachment fetch failure handling
    #[serde(default)]
    pub on_attachment_error: AttachmentErrorPolicy,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            pacing: default_pacing(),
            log_window: default_log_window(),
            attachment_timeout: default_attachment_timeout(),
            on_attachment_error: AttachmentErrorPolicy::default(),
        }
    }
}

/// Main configuration
///
/// Every section is optional in serialized form; missing sections and fields take
/// their defaults.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Record preprocessing
    #[serde(default)]
    pub render: RenderConfig,

    /// Conversion chain
    #[serde(default)]
    pub convert: ConvertConfig,

    /// Batch output naming
    #[serde(default)]
    pub batch: BatchConfig,

    /// SMTP account
    #[serde(default)]
    pub smtp: SmtpConfig,

    /// Bulk dispatch
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

impl Config {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> crate::Result<Self> {
        toml::from_str(content).map_err(|e| crate::Error::Config {
            message: format!("TOML parse error: {e}"),
            key: None,
        })
    }

    /// Load a TOML file
    pub fn load(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

fn default_true() -> bool {
    true
}

fn default_date_fields() -> Vec<String> {
    vec!["SLMDate".to_string(), "PaidDate".to_string()]
}

fn default_money_fields() -> Vec<String> {
    vec!["Outstanding".to_string(), "PaidAmount".to_string()]
}

fn default_phone_fields() -> Vec<String> {
    vec!["ClientPhone".to_string()]
}

fn default_phone_width() -> usize {
    12
}

fn default_currency_symbol() -> String {
    "Rp".to_string()
}

fn default_headless_candidates() -> Vec<PathBuf> {
    [
        "libreoffice",
        "soffice",
        "/usr/bin/libreoffice",
        "/usr/bin/soffice",
        "/Applications/LibreOffice.app/Contents/MacOS/soffice",
        "C:\\Program Files\\LibreOffice\\program\\soffice.exe",
        "C:\\Program Files (x86)\\LibreOffice\\program\\soffice.exe",
    ]
    .into_iter()
    .map(PathBuf::from)
    .collect()
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_convert_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_automation_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_label() -> String {
    "SLM".to_string()
}

fn default_identity_field() -> String {
    "ClientName".to_string()
}

fn default_secondary_field() -> String {
    "PlatformName".to_string()
}

fn default_smtp_server() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_pacing() -> Duration {
    Duration::from_secs(1)
}

fn default_log_window() -> usize {
    10
}

fn default_attachment_timeout() -> Duration {
    Duration::from_secs(30)
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds)
mod millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = Config::from_toml_str("").unwrap();

        assert_eq!(config.render.date_fields, vec!["SLMDate", "PaidDate"]);
        assert_eq!(config.render.phone_width, 12);
        assert!(config.convert.enabled);
        assert_eq!(config.convert.convert_timeout, Duration::from_secs(60));
        assert_eq!(config.convert.probe_timeout, Duration::from_secs(10));
        assert_eq!(config.batch.label, "SLM");
        assert_eq!(config.smtp.port, 587);
        assert_eq!(config.dispatch.pacing, Duration::from_secs(1));
        assert_eq!(config.dispatch.log_window, 10);
        assert_eq!(
            config.dispatch.on_attachment_error,
            AttachmentErrorPolicy::FailRecipient
        );
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = Config::from_toml_str(
            r#"
[convert]
headless_path = "/opt/libreoffice/program/soffice"
desktop_suite = false

[smtp]
server = "mail.example.com"
sender = "ops@example.com"
secret = "hunter2"

[dispatch]
pacing = 250
on_attachment_error = "send_without"
"#,
        )
        .unwrap();

        assert!(!config.convert.desktop_suite);
        assert!(config.convert.com_automation);
        assert_eq!(
            config.convert.headless_path,
            Some(PathBuf::from("/opt/libreoffice/program/soffice"))
        );
        assert_eq!(config.convert.headless_candidates.len(), 7);
        assert_eq!(config.smtp.server, "mail.example.com");
        assert_eq!(config.smtp.port, 587);
        assert_eq!(config.smtp.secret, "hunter2");
        assert_eq!(config.dispatch.pacing, Duration::from_millis(250));
        assert_eq!(
            config.dispatch.on_attachment_error,
            AttachmentErrorPolicy::SendWithout
        );
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = Config::from_toml_str("[smtp\nport = 1").unwrap_err();
        assert!(matches!(err, crate::Error::Config { .. }));
    }

    #[test]
    fn smtp_secret_is_never_serialized_or_printed() {
        let smtp = SmtpConfig {
            sender: "ops@example.com".into(),
            secret: "hunter2".into(),
            ..Default::default()
        };

        let json = serde_json::to_string(&smtp).unwrap();
        assert!(!json.contains("hunter2"));

        let debug = format!("{smtp:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn dispatch_config_round_trips_through_json() {
        let original = DispatchConfig {
            pacing: Duration::from_millis(1500),
            log_window: 5,
            attachment_timeout: Duration::from_secs(12),
            on_attachment_error: AttachmentErrorPolicy::SendWithout,
        };

        let json = serde_json::to_string(&original).expect("serialize failed");
        let back: DispatchConfig = serde_json::from_str(&json).expect("deserialize failed");

        assert_eq!(back.pacing, original.pacing);
        assert_eq!(back.log_window, 5);
        assert_eq!(back.attachment_timeout, original.attachment_timeout);
        assert_eq!(back.on_attachment_error, original.on_attachment_error);
    }
}
