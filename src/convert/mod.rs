//! Document conversion with ordered fallback strategies
//!
//! This module turns rendered source documents into the delivery format by trying
//! a fixed list of strategies until one succeeds. When every strategy fails the
//! source document is returned unchanged and the outcome is marked as failed;
//! conversion problems never abort a batch.
//!
//! ## Architecture
//!
//! The core abstraction is the [`ConversionStrategy`] trait. Built-in strategies,
//! in priority order:
//!
//! - [`DesktopSuiteStrategy`]: drives the desktop word processor through the
//!   platform scripting host (AppleScript on macOS, PowerShell on Windows)
//! - [`ComAutomationStrategy`]: scripts `Word.Application` directly via `cscript`
//! - [`HeadlessOfficeStrategy`]: runs a headless office binary discovered from a
//!   candidate list and cached in the run's [`ConversionContext`]
//!
//! ## Usage
//!
//! ```no_run
//! use slm_batch::config::ConvertConfig;
//! use slm_batch::convert::{ConversionContext, FormatConverter};
//! use slm_batch::types::{Artifact, ArtifactFormat};
//! use std::path::Path;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let config = ConvertConfig::default();
//! let converter = FormatConverter::from_config(&config);
//! let ctx = ConversionContext::new(config);
//!
//! let source = Artifact::new("/tmp/letter.docx", ArtifactFormat::Source);
//! let outcome = converter.convert(&source, Path::new("/tmp/letter.pdf"), &ctx).await;
//! if !outcome.succeeded {
//!     for failure in &outcome.failures {
//!         println!("{}: {}", failure.strategy, failure.reason);
//!     }
//! }
//! # }
//! ```

mod com;
mod context;
mod desktop;
mod headless;
mod process;
mod traits;

pub use com::ComAutomationStrategy;
pub use context::ConversionContext;
pub use desktop::{AutomationHost, DesktopSuiteStrategy};
pub use headless::HeadlessOfficeStrategy;
pub use traits::{ConversionOutcome, ConversionStrategy, StrategyFailure};

use crate::config::ConvertConfig;
use crate::types::{Artifact, ArtifactFormat};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Runs conversion strategies in order until one succeeds
#[derive(Clone)]
pub struct FormatConverter {
    strategies: Vec<Arc<dyn ConversionStrategy>>,
}

impl FormatConverter {
    /// Converter with an explicit strategy order
    pub fn new(strategies: Vec<Arc<dyn ConversionStrategy>>) -> Self {
        Self { strategies }
    }

    /// Converter with the built-in strategies enabled in `config`
    ///
    /// With conversion disabled the chain is empty and every document is
    /// delivered in source format.
    pub fn from_config(config: &ConvertConfig) -> Self {
        let mut strategies: Vec<Arc<dyn ConversionStrategy>> = Vec::new();
        if config.enabled {
            if config.desktop_suite {
                strategies.push(Arc::new(DesktopSuiteStrategy::new()));
            }
            if config.com_automation {
                strategies.push(Arc::new(ComAutomationStrategy::new()));
            }
            if config.headless {
                strategies.push(Arc::new(HeadlessOfficeStrategy::new()));
            }
        }
        Self::new(strategies)
    }

    /// Strategy names in priority order
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Convert `source` to the delivery format at `target`
    ///
    /// Never fails: strategy errors are collected into the outcome's failure
    /// list and the source artifact is returned when nothing succeeds.
    pub async fn convert(
        &self,
        source: &Artifact,
        target: &Path,
        ctx: &ConversionContext,
    ) -> ConversionOutcome {
        let mut failures = Vec::new();

        for strategy in &self.strategies {
            let name = strategy.name();

            if !strategy.probe(ctx).await {
                debug!(strategy = name, "strategy not available, skipping");
                failures.push(StrategyFailure {
                    strategy: name.to_string(),
                    reason: "not available".to_string(),
                });
                continue;
            }

            ctx.record_attempt();
            // Only a file written by this attempt may count as its output
            if let Err(e) = clear_target(target) {
                ctx.record_failure();
                warn!(strategy = name, ?target, error = %e, "cannot clear conversion target");
                failures.push(StrategyFailure {
                    strategy: name.to_string(),
                    reason: format!("cannot clear existing {}: {e}", target.display()),
                });
                continue;
            }
            let reason = match strategy.convert(&source.path, target, ctx).await {
                Ok(()) if target.exists() => {
                    info!(strategy = name, ?target, "converted document");
                    return ConversionOutcome {
                        artifact: Artifact::new(target, ArtifactFormat::Converted),
                        succeeded: true,
                        strategy: Some(name),
                        failures,
                    };
                }
                Ok(()) => format!("reported success but left no file at {}", target.display()),
                Err(e) => e.to_string(),
            };

            ctx.record_failure();
            warn!(strategy = name, reason = %reason, "conversion strategy failed");
            failures.push(StrategyFailure {
                strategy: name.to_string(),
                reason,
            });
        }

        if let Err(e) = clear_target(target) {
            debug!(?target, error = %e, "failed to remove partial conversion output");
        }
        warn!(
            source = ?source.path,
            tried = failures.len(),
            "all conversion strategies failed, keeping source format"
        );
        ConversionOutcome {
            artifact: source.clone(),
            succeeded: false,
            strategy: None,
            failures,
        }
    }
}

fn clear_target(target: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(target) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
