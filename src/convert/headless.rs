//! Headless office suite converter (LibreOffice `soffice`)

use super::context::ConversionContext;
use super::process::{failure_reason, run_bounded};
use super::traits::ConversionStrategy;
use crate::error::ConversionError;
use crate::types::ArtifactFormat;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

const NAME: &str = "headless-office";

/// Converts with a headless office binary discovered from a candidate list
///
/// The binary names its output after the source stem inside `--outdir`; the
/// strategy moves that file to the requested target when the names differ.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessOfficeStrategy;

impl HeadlessOfficeStrategy {
    /// Create the strategy
    pub fn new() -> Self {
        Self
    }
}

/// Where the converter writes its output for `source` inside `outdir`
pub(crate) fn produced_path(source: &Path, outdir: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    outdir.join(format!("{stem}.{}", ArtifactFormat::Converted.extension()))
}

#[async_trait]
impl ConversionStrategy for HeadlessOfficeStrategy {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn probe(&self, ctx: &ConversionContext) -> bool {
        ctx.headless_binary().await.is_some()
    }

    async fn convert(
        &self,
        source: &Path,
        target: &Path,
        ctx: &ConversionContext,
    ) -> crate::Result<()> {
        let binary = ctx
            .headless_binary()
            .await
            .ok_or(ConversionError::Unavailable { strategy: NAME })?;
        let outdir = target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut cmd = Command::new(binary);
        cmd.arg("--headless")
            .arg("--convert-to")
            .arg(ArtifactFormat::Converted.extension())
            .arg("--outdir")
            .arg(outdir)
            .arg(source);

        let output = run_bounded(cmd, ctx.config().convert_timeout, NAME).await?;

        let produced = produced_path(source, outdir);
        if !produced.exists() {
            if output.status.success() {
                return Err(ConversionError::MissingOutput {
                    strategy: NAME,
                    expected: produced,
                }
                .into());
            }
            return Err(ConversionError::Failed {
                strategy: NAME,
                reason: failure_reason(&output),
            }
            .into());
        }

        if produced != target {
            debug!(from = ?produced, to = ?target, "renaming converter output");
            tokio::fs::rename(&produced, target).await?;
        }

        Ok(())
    }
}
