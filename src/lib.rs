//! # slm-batch
//!
//! Batch document generation and bulk templated email dispatch.
//!
//! ## Overview
//!
//! slm-batch covers two independent jobs:
//!
//! - **Document batches**: fill a `.docx` template once per spreadsheet record,
//!   convert each document to PDF through an ordered chain of fallback
//!   strategies, name the results from a sequence prefix such as `VI-001` and pack
//!   everything into one zip archive.
//! - **Mail dispatch**: send a named subject/body template to every recipient of a
//!   list, optionally with a per-recipient attachment, counting failures without
//!   stopping the run.
//!
//! Both jobs publish progress as [`Event`]s on a broadcast channel, so hosts can
//! render live status without polling.
//!
//! ## Quick Start
//!
//! ```no_run
//! use slm_batch::{BatchGenerator, Config, Record};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let generator = BatchGenerator::new(Config::default());
//!
//!     let mut events = generator.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let records = vec![
//!         Record::new()
//!             .with("ClientName", "ACME")
//!             .with("PlatformName", "WEB")
//!             .with("Outstanding", 1250000.0),
//!     ];
//!     let result = generator
//!         .run_batch(&records, Path::new("letter.docx"), "VI-001")
//!         .await?;
//!     let archive = result.write_archive(Path::new("."))?;
//!     println!("wrote {}", archive.display());
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Zip packaging of batch artifacts
pub mod archive;
/// Batch generation loop and naming
pub mod batch;
/// Configuration types
pub mod config;
/// Fallback document conversion
pub mod convert;
/// Error types
pub mod error;
/// Bulk templated email
pub mod mail;
/// Sequence prefix grammar
pub mod prefix;
/// Field preprocessing and template rendering
pub mod render;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use batch::{BatchGenerator, BatchResult};
pub use config::{
    AttachmentErrorPolicy, BatchConfig, Config, ConvertConfig, DispatchConfig, RenderConfig,
    SmtpConfig,
};
pub use convert::{
    ComAutomationStrategy, ConversionContext, ConversionOutcome, ConversionStrategy,
    DesktopSuiteStrategy, FormatConverter, HeadlessOfficeStrategy,
};
pub use error::{ConversionError, Error, MailError, RenderError, Result};
pub use mail::{
    DispatchOptions, DispatchSummary, Dispatcher, MailTransport, MessageTemplate, Recipient,
    Session, SmtpMailTransport, Workbook,
};
pub use prefix::{SequencePrefix, is_valid_prefix};
pub use render::{DocumentRenderer, DocxRenderer};
pub use types::{Artifact, ArtifactFormat, Event, FieldValue, Record};

/// Drive `work` to completion unless the process receives a termination signal
///
/// On a signal the future is dropped and `None` is returned. Dropping an
/// in-flight [`BatchGenerator::run_batch`] removes its temporary workspace.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use slm_batch::{BatchGenerator, Config, run_until_interrupted};
/// use std::path::Path;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let generator = BatchGenerator::new(Config::default());
///     let run = generator.run_batch(&[], Path::new("letter.docx"), "I-001");
///
///     match run_until_interrupted(run).await {
///         Some(result) => drop(result?),
///         None => eprintln!("interrupted"),
///     }
///     Ok(())
/// }
/// ```
pub async fn run_until_interrupted<F: std::future::Future>(work: F) -> Option<F::Output> {
    tokio::select! {
        output = work => Some(output),
        _ = wait_for_signal() => {
            tracing::warn!("interrupted, abandoning run");
            None
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // May fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completed_work_is_returned() {
        let output = run_until_interrupted(async { 41 + 1 }).await;
        assert_eq!(output, Some(42));
    }
}
