//! Error types for slm-batch
//!
//! This module provides the error handling for the library, including:
//! - Domain-specific error types (Render, Conversion, Mail)
//! - Severity classification (run-fatal vs. per-item recoverable)
//! - Machine-readable error codes for hosts that surface errors to users

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for slm-batch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for slm-batch
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "smtp.server")
        key: Option<String>,
    },

    /// Sequence prefix does not match `ROMAN-NNN`
    #[error("invalid sequence prefix {0:?}: expected a roman numeral, a dash and three digits (e.g. VI-001)")]
    InvalidPrefix(String),

    /// Batch was started without any records
    #[error("no records to process")]
    NoRecords,

    /// Template rendering failed
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// Document conversion failed
    #[error("conversion error: {0}")]
    Conversion(#[from] ConversionError),

    /// Archive packaging failed
    #[error("archive error: {0}")]
    Archive(String),

    /// Mail composition or delivery failed
    #[error("mail error: {0}")]
    Mail(#[from] MailError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Template rendering errors
#[derive(Debug, Error)]
pub enum RenderError {
    /// Template file is missing
    #[error("template not found at {path}")]
    TemplateNotFound {
        /// Where the template was expected
        path: PathBuf,
    },

    /// Template is not a readable document package
    #[error("invalid template {path}: {reason}")]
    InvalidTemplate {
        /// The template that could not be read
        path: PathBuf,
        /// The reason the template is invalid
        reason: String,
    },

    /// Writing the rendered document failed
    #[error("failed to write rendered document {path}: {reason}")]
    WriteFailed {
        /// The output path
        path: PathBuf,
        /// The reason the write failed
        reason: String,
    },
}

/// Document conversion errors
#[derive(Debug, Error)]
pub enum ConversionError {
    /// Conversion backend is not present on this host
    #[error("{strategy} is not available on this host")]
    Unavailable {
        /// Strategy name
        strategy: &'static str,
    },

    /// External converter exceeded its time budget
    #[error("{strategy} timed out after {seconds}s")]
    TimedOut {
        /// Strategy name
        strategy: &'static str,
        /// Timeout that elapsed
        seconds: u64,
    },

    /// Converter ran but produced no output at the expected location
    #[error("{strategy} produced no output at {expected}")]
    MissingOutput {
        /// Strategy name
        strategy: &'static str,
        /// Where the converted file was expected
        expected: PathBuf,
    },

    /// Converter process exited with a failure status
    #[error("{strategy} failed: {reason}")]
    Failed {
        /// Strategy name
        strategy: &'static str,
        /// Captured stderr or other diagnostic
        reason: String,
    },
}

/// Mail composition and delivery errors
#[derive(Debug, Error)]
pub enum MailError {
    /// Address could not be parsed
    #[error("invalid address {address:?}: {reason}")]
    InvalidAddress {
        /// The rejected address
        address: String,
        /// Parser diagnostic
        reason: String,
    },

    /// Attachment could not be retrieved
    #[error("failed to fetch attachment from {url}: {reason}")]
    Fetch {
        /// The attachment reference
        url: String,
        /// The reason the fetch failed
        reason: String,
    },

    /// Attachment fetch exceeded its time budget
    #[error("attachment fetch from {url} timed out after {seconds}s")]
    FetchTimeout {
        /// The attachment reference
        url: String,
        /// Timeout that elapsed
        seconds: u64,
    },

    /// MIME message could not be built
    #[error("failed to build message: {0}")]
    Build(String),

    /// SMTP submission failed
    #[error("SMTP delivery via {endpoint} failed: {reason}")]
    Transport {
        /// `host:port (mode)` of the attempted endpoint
        endpoint: String,
        /// Transport diagnostic
        reason: String,
    },

    /// Named template is not in the session
    #[error("template {0:?} not found")]
    TemplateNotFound(String),
}

impl Error {
    /// Whether this error aborts a whole run rather than a single item
    ///
    /// The batch and dispatch loops count per-item failures instead of returning
    /// them, so only the lower-level APIs (converter, composer, transport) hand
    /// non-fatal errors back to callers.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Conversion(_) => false,
            Error::Mail(
                MailError::InvalidAddress { .. }
                | MailError::Fetch { .. }
                | MailError::FetchTimeout { .. }
                | MailError::Build(_)
                | MailError::Transport { .. },
            ) => false,
            _ => true,
        }
    }

    /// Machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::InvalidPrefix(_) => "invalid_prefix",
            Error::NoRecords => "no_records",
            Error::Render(e) => match e {
                RenderError::TemplateNotFound { .. } => "template_not_found",
                RenderError::InvalidTemplate { .. } => "invalid_template",
                RenderError::WriteFailed { .. } => "render_write_failed",
            },
            Error::Conversion(e) => match e {
                ConversionError::Unavailable { .. } => "converter_unavailable",
                ConversionError::TimedOut { .. } => "conversion_timeout",
                ConversionError::MissingOutput { .. } => "conversion_missing_output",
                ConversionError::Failed { .. } => "conversion_failed",
            },
            Error::Archive(_) => "archive_error",
            Error::Mail(e) => match e {
                MailError::InvalidAddress { .. } => "invalid_address",
                MailError::Fetch { .. } => "attachment_fetch_failed",
                MailError::FetchTimeout { .. } => "attachment_fetch_timeout",
                MailError::Build(_) => "message_build_failed",
                MailError::Transport { .. } => "smtp_failed",
                MailError::TemplateNotFound(_) => "template_not_found",
            },
            Error::Io(_) => "io_error",
            Error::Other(_) => "internal_error",
        }
    }

    /// Shorthand for a configuration error tied to a key
    pub(crate) fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(e: zip::result::ZipError) -> Self {
        Error::Archive(e.to_string())
    }
}
