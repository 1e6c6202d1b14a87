//! Renderer trait

use crate::types::{Artifact, Record};
use async_trait::async_trait;
use std::path::Path;

/// Merges one record into a document template
///
/// Implementations write the filled document to `output` and return it as a
/// source-format [`Artifact`]. Records are expected to be preprocessed already
/// (see [`preprocess`](super::preprocess)).
///
/// # Errors
///
/// Returns an error if:
/// - The template does not exist or cannot be parsed
/// - The output cannot be written
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    /// Render `record` into `template`, writing the result to `output`
    async fn render(
        &self,
        record: &Record,
        template: &Path,
        output: &Path,
    ) -> crate::Result<Artifact>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
