//! Traits and types for document conversion

use super::context::ConversionContext;
use crate::types::Artifact;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One strategy's failure during a conversion attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyFailure {
    /// Strategy name
    pub strategy: String,
    /// Why it failed
    pub reason: String,
}

/// Result of running the conversion chain on one document
#[must_use]
#[derive(Debug, Clone)]
pub struct ConversionOutcome {
    /// The converted artifact, or the untouched source when every strategy failed
    pub artifact: Artifact,
    /// Whether the artifact is in the delivery format
    pub succeeded: bool,
    /// Name of the strategy that produced the artifact
    pub strategy: Option<&'static str>,
    /// Failures of the strategies tried before the winner (or of all of them)
    pub failures: Vec<StrategyFailure>,
}

/// A way of turning a source document into the delivery format
///
/// Strategies are tried in a fixed order by [`FormatConverter`](super::FormatConverter);
/// the first that leaves a file at the target path wins.
///
/// # Errors
///
/// `convert` returns an error if the backing tool cannot be started, exits
/// unsuccessfully, exceeds its time budget or produces no output.
#[async_trait]
pub trait ConversionStrategy: Send + Sync {
    /// Human-readable name for logging and failure reports
    fn name(&self) -> &'static str;

    /// Whether the strategy can run on this host
    async fn probe(&self, ctx: &ConversionContext) -> bool;

    /// Convert `source` into the delivery format at `target`
    async fn convert(
        &self,
        source: &Path,
        target: &Path,
        ctx: &ConversionContext,
    ) -> crate::Result<()>;
}
