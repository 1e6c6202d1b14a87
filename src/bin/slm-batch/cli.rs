//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// slm-batch - document batches and bulk templated email
#[derive(Parser, Debug)]
#[command(
    name = "slm-batch",
    author,
    version,
    about = "Batch document generation and bulk templated email",
    long_about = "Fills a .docx template once per record, converts the results to PDF \n\
                  and packs them into a zip archive, or sends a named email template \n\
                  to every recipient of a workbook."
)]
pub struct Cli {
    /// Default log level when RUST_LOG is not set
    #[arg(
        long,
        value_enum,
        default_value = "info",
        global = true,
        env = "SLM_LOG_LEVEL"
    )]
    pub log_level: LogLevel,

    /// Path to a TOML configuration file (defaults apply when omitted)
    #[arg(short, long, global = true, env = "SLM_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render, convert and archive one document per record
    Generate(GenerateArgs),

    /// Send a named template to every recipient of a workbook
    Send(SendArgs),

    /// Check a sequence prefix without doing anything else
    CheckPrefix(CheckPrefixArgs),
}

/// Arguments for the `generate` command
#[derive(Parser, Debug, Clone)]
pub struct GenerateArgs {
    /// JSON array of record objects
    #[arg(short, long)]
    pub records: PathBuf,

    /// The .docx template
    #[arg(short, long)]
    pub template: PathBuf,

    /// Sequence prefix, e.g. VI-001
    #[arg(short, long)]
    pub prefix: String,

    /// Directory receiving the zip archive
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,
}

/// Arguments for the `send` command
#[derive(Parser, Debug, Clone)]
pub struct SendArgs {
    /// JSON workbook with `EmailList` and `BodySubject` row arrays
    #[arg(short, long)]
    pub workbook: PathBuf,

    /// Name of the template to send
    #[arg(short, long)]
    pub template: String,

    /// Attach each recipient's referenced file
    #[arg(long)]
    pub attachments: bool,

    /// Comma separated Cc addresses
    #[arg(long, default_value = "")]
    pub cc: String,

    /// Comma separated Bcc addresses
    #[arg(long, default_value = "")]
    pub bcc: String,

    /// Override the configured sender address
    #[arg(long, env = "SLM_SMTP_SENDER")]
    pub sender: Option<String>,

    /// Sender secret (app password); overrides the configured one
    #[arg(long, env = "SLM_SMTP_SECRET", hide_env_values = true)]
    pub secret: Option<String>,
}

/// Arguments for the `check-prefix` command
#[derive(Parser, Debug, Clone)]
pub struct CheckPrefixArgs {
    /// Prefix to check, e.g. VI-001
    pub prefix: String,
}

/// Log level used when RUST_LOG is unset
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogLevel {
    /// Errors only
    Error,
    /// Warnings and errors
    Warn,
    /// Progress and summaries
    #[default]
    Info,
    /// Per-strategy and per-request detail
    Debug,
    /// Everything
    Trace,
}

impl LogLevel {
    /// Directive understood by `EnvFilter`
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}
