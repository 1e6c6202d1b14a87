//! Batch document generation
//!
//! [`BatchGenerator::run_batch`] renders one document per record, tries to convert
//! each to the delivery format and collects the results in a [`BatchResult`]
//! that owns the temporary workspace. Records are processed strictly in order.
//!
//! Conversion failures are recoverable: the item is delivered in source format
//! and the batch is marked as not fully converted. Anything else that goes wrong
//! inside the loop (a template that cannot be rendered, a full disk) halts the
//! batch.

mod naming;

pub use naming::{archive_name, document_stem};

use crate::archive;
use crate::config::Config;
use crate::convert::{ConversionContext, FormatConverter};
use crate::error::{Error, RenderError, Result};
use crate::prefix::SequencePrefix;
use crate::render::{DocumentRenderer, DocxRenderer, preprocess};
use crate::types::{Artifact, ArtifactFormat, Event, Record};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Outcome of a completed batch
///
/// Owns the temporary workspace holding every artifact; dropping the result (or
/// packing it with [`into_archive`](Self::into_archive)) removes the workspace.
#[derive(Debug)]
pub struct BatchResult {
    workspace: TempDir,
    artifacts: Vec<Artifact>,
    all_converted: bool,
    archive_name: String,
}

impl BatchResult {
    /// Final artifacts in record order
    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    /// Whether every record reached the delivery format
    pub fn all_succeeded(&self) -> bool {
        self.all_converted
    }

    /// Number of artifacts
    pub fn count(&self) -> usize {
        self.artifacts.len()
    }

    /// Download name for the packed archive
    pub fn archive_name(&self) -> &str {
        &self.archive_name
    }

    /// Directory holding the artifacts until the result is dropped
    pub fn workspace(&self) -> &Path {
        self.workspace.path()
    }

    /// Pack every artifact into a zip archive and tear down the workspace
    pub fn into_archive(self) -> Result<Vec<u8>> {
        let blob = archive::pack(&self.artifacts)?;
        debug!(
            entries = self.artifacts.len(),
            bytes = blob.len(),
            "packed batch archive"
        );
        Ok(blob)
    }

    /// Write the archive into `dir` under [`archive_name`](Self::archive_name)
    /// and tear down the workspace
    pub fn write_archive(self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(&self.archive_name);
        archive::pack_to_file(&self.artifacts, &path)?;
        Ok(path)
    }
}

/// Renders, converts and names the documents of a batch
pub struct BatchGenerator {
    config: Arc<Config>,
    renderer: Arc<dyn DocumentRenderer>,
    converter: FormatConverter,
    event_tx: broadcast::Sender<Event>,
}

impl BatchGenerator {
    /// Generator with the built-in `.docx` renderer and the configured converters
    pub fn new(config: Config) -> Self {
        let converter = FormatConverter::from_config(&config.convert);
        Self::with_components(config, Arc::new(DocxRenderer::new()), converter)
    }

    /// Generator with an explicit renderer and conversion chain
    pub fn with_components(
        config: Config,
        renderer: Arc<dyn DocumentRenderer>,
        converter: FormatConverter,
    ) -> Self {
        let (event_tx, _rx) = broadcast::channel(1000);
        Self {
            config: Arc::new(config),
            renderer,
            converter,
            event_tx,
        }
    }

    /// Publish events on an existing channel instead of a private one
    pub fn with_event_sender(mut self, event_tx: broadcast::Sender<Event>) -> Self {
        self.event_tx = event_tx;
        self
    }

    /// Subscribe to batch progress events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    fn emit_event(&self, event: Event) {
        // No subscribers is fine
        self.event_tx.send(event).ok();
    }

    /// Generate one document per record
    ///
    /// `prefix` (e.g. `VI-001`) is validated before anything is written. The
    /// sequence advances by one per record whether or not its conversion
    /// succeeded.
    ///
    /// # Errors
    ///
    /// Returns a run-fatal error if the prefix is malformed, there are no records,
    /// the template is missing, the workspace cannot be created, or a record fails
    /// to render. No partial result is returned in those cases.
    pub async fn run_batch(
        &self,
        records: &[Record],
        template: &Path,
        prefix: &str,
    ) -> Result<BatchResult> {
        let prefix = self.check_preconditions(records, template, prefix)?;
        let workspace = self.create_workspace().inspect_err(|e| self.fail(0, e))?;

        let total = records.len();
        let batch = &self.config.batch;
        let ctx = ConversionContext::new(self.config.convert.clone());
        let mut counter = prefix.counter();
        let mut artifacts = Vec::with_capacity(total);
        let mut all_converted = true;

        info!(
            total,
            prefix = %prefix,
            workspace = ?workspace.path(),
            strategies = ?self.converter.strategy_names(),
            "starting batch"
        );
        self.emit_event(Event::BatchStarted { total });

        for (i, record) in records.iter().enumerate() {
            let index = i + 1;
            let status = format!(
                "Processing {} {index} of {total}: {}",
                batch.label,
                naming::display_name(record, &batch.identity_field)
            );
            self.emit_event(Event::ItemStarted {
                index,
                total,
                status,
            });

            let stem = document_stem(batch, prefix.roman(), counter.advance(), record);
            let source_path = workspace.path().join(format!(
                "{stem}.{}",
                ArtifactFormat::Source.extension()
            ));
            let target_path = workspace.path().join(format!(
                "{stem}.{}",
                ArtifactFormat::Converted.extension()
            ));

            let working = preprocess(record, &self.config.render);
            let source = self
                .renderer
                .render(&working, template, &source_path)
                .await
                .inspect_err(|e| self.fail(index, e))?;

            let outcome = self.converter.convert(&source, &target_path, &ctx).await;
            for failure in &outcome.failures {
                self.emit_event(Event::ConversionWarning {
                    index,
                    strategy: failure.strategy.clone(),
                    reason: failure.reason.clone(),
                });
            }

            if outcome.succeeded {
                if let Err(e) = std::fs::remove_file(&source.path) {
                    warn!(path = ?source.path, error = %e, "failed to remove superseded source document");
                }
            } else {
                all_converted = false;
            }

            let file_name = outcome.artifact.file_name();
            info!(index, total, file_name = %file_name, converted = outcome.succeeded, "processed record");
            self.emit_event(Event::ItemCompleted {
                index,
                total,
                file_name,
                converted: outcome.succeeded,
            });
            artifacts.push(outcome.artifact);
        }

        info!(
            total,
            all_converted,
            attempts = ctx.attempts(),
            failed_attempts = ctx.failures(),
            "batch complete"
        );
        self.emit_event(Event::BatchCompleted {
            total,
            all_converted,
        });

        Ok(BatchResult {
            workspace,
            artifacts,
            all_converted,
            archive_name: archive_name(batch, &prefix),
        })
    }

    fn check_preconditions(
        &self,
        records: &[Record],
        template: &Path,
        prefix: &str,
    ) -> Result<SequencePrefix> {
        let checked = prefix.parse::<SequencePrefix>().and_then(|prefix| {
            if records.is_empty() {
                return Err(Error::NoRecords);
            }
            if !template.is_file() {
                return Err(RenderError::TemplateNotFound {
                    path: template.to_path_buf(),
                }
                .into());
            }
            Ok(prefix)
        });
        checked.inspect_err(|e| self.fail(0, e))
    }

    fn create_workspace(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("slm-batch-");
        let dir = match &self.config.batch.workspace_root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        Ok(dir)
    }

    fn fail(&self, index: usize, error: &Error) {
        warn!(index, error = %error, "batch halted");
        self.emit_event(Event::BatchFailed {
            index,
            error: error.to_string(),
        });
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConvertConfig;
    use crate::convert::ConversionStrategy;
    use async_trait::async_trait;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Writes the record's fields as text instead of a real document
    struct PlainRenderer;

    #[async_trait]
    impl DocumentRenderer for PlainRenderer {
        async fn render(&self, record: &Record, _template: &Path, output: &Path) -> Result<Artifact> {
            let mut body = String::new();
            for (k, v) in record.iter() {
                body.push_str(&format!("{k}={v}\n"));
            }
            std::fs::write(output, body)?;
            Ok(Artifact::new(output, ArtifactFormat::Source))
        }

        fn name(&self) -> &'static str {
            "plain"
        }
    }

    /// Converts every item except the 1-based positions in `fail_on`
    struct SelectiveStrategy {
        fail_on: Vec<usize>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ConversionStrategy for SelectiveStrategy {
        fn name(&self) -> &'static str {
            "selective"
        }

        async fn probe(&self, _ctx: &ConversionContext) -> bool {
            true
        }

        async fn convert(&self, source: &Path, target: &Path, _ctx: &ConversionContext) -> Result<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on.contains(&call) {
                return Err(crate::error::ConversionError::Failed {
                    strategy: "selective",
                    reason: "simulated failure".into(),
                }
                .into());
            }
            std::fs::copy(source, target)?;
            Ok(())
        }
    }

    fn template(dir: &Path) -> PathBuf {
        let path = dir.join("template.docx");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"template").unwrap();
        path
    }

    fn records() -> Vec<Record> {
        vec![
            Record::new()
                .with("ClientName", "Acme Corp")
                .with("PlatformName", "Web")
                .with("Outstanding", 1234567.4),
            Record::new()
                .with("ClientName", "Beta/Co")
                .with("PlatformName", "App"),
            Record::new().with("PlatformName", "Web"),
        ]
    }

    fn generator(fail_on: Vec<usize>) -> BatchGenerator {
        let strategy = Arc::new(SelectiveStrategy {
            fail_on,
            calls: AtomicUsize::new(0),
        });
        BatchGenerator::with_components(
            Config::default(),
            Arc::new(PlainRenderer),
            FormatConverter::new(vec![strategy]),
        )
    }

    fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn produces_one_artifact_per_record_in_sequence() {
        let dir = TempDir::new().unwrap();
        let generator = generator(vec![]);

        let result = generator
            .run_batch(&records(), &template(dir.path()), "VI-007")
            .await
            .unwrap();

        assert!(result.all_succeeded());
        assert_eq!(result.count(), 3);
        let names: Vec<String> = result.artifacts().iter().map(|a| a.file_name()).collect();
        assert_eq!(
            names,
            vec![
                "SLM VI 007 ACME CORP (WEB).pdf",
                "SLM VI 008 BETA-CO (APP).pdf",
                "SLM VI 009 UNKNOWN (WEB).pdf",
            ]
        );
        assert_eq!(result.archive_name(), "SLM_VI_007.zip");

        // superseded sources removed
        for artifact in result.artifacts() {
            assert!(artifact.path.exists());
            assert!(!artifact.path.with_extension("docx").exists());
        }
    }

    #[tokio::test]
    async fn renders_preprocessed_working_copy() {
        let dir = TempDir::new().unwrap();
        let input = records();
        let result = generator(vec![])
            .run_batch(&input, &template(dir.path()), "I-001")
            .await
            .unwrap();

        let body = std::fs::read_to_string(&result.artifacts()[0].path).unwrap();
        assert!(body.contains("Outstanding=Rp 1.234.567"), "got: {body}");
        assert_eq!(
            input[0].get("Outstanding"),
            Some(&crate::types::FieldValue::Number(1234567.4))
        );
    }

    #[tokio::test]
    async fn conversion_failure_keeps_source_and_clears_flag() {
        let dir = TempDir::new().unwrap();
        let generator = generator(vec![2]);
        let mut rx = generator.subscribe();

        let result = generator
            .run_batch(&records(), &template(dir.path()), "VI-001")
            .await
            .unwrap();

        assert!(!result.all_succeeded());
        assert_eq!(result.count(), 3);
        assert_eq!(result.artifacts()[0].format, ArtifactFormat::Converted);
        assert_eq!(result.artifacts()[1].format, ArtifactFormat::Source);
        assert_eq!(
            result.artifacts()[1].file_name(),
            "SLM VI 002 BETA-CO (APP).docx"
        );
        // sequence keeps advancing past the failed item
        assert_eq!(
            result.artifacts()[2].file_name(),
            "SLM VI 003 UNKNOWN (WEB).pdf"
        );

        let events = drain(&mut rx);
        let warnings: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                Event::ConversionWarning { index, strategy, .. } => Some((*index, strategy.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(warnings, vec![(2, "selective".to_string())]);
        assert!(matches!(
            events.last(),
            Some(Event::BatchCompleted {
                total: 3,
                all_converted: false
            })
        ));
    }

    #[tokio::test]
    async fn progress_events_are_monotonic() {
        let dir = TempDir::new().unwrap();
        let generator = generator(vec![]);
        let mut rx = generator.subscribe();

        generator
            .run_batch(&records(), &template(dir.path()), "VI-001")
            .await
            .unwrap();

        let events = drain(&mut rx);
        assert!(matches!(events.first(), Some(Event::BatchStarted { total: 3 })));
        let started: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                Event::ItemStarted { index, .. } => Some(*index),
                _ => None,
            })
            .collect();
        assert_eq!(started, vec![1, 2, 3]);

        match &events[1] {
            Event::ItemStarted { status, .. } => {
                assert_eq!(status, "Processing SLM 1 of 3: Acme Corp");
            }
            other => panic!("expected ItemStarted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_prefix_fails_before_any_work() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("workspaces");
        std::fs::create_dir(&root).unwrap();
        let mut config = Config::default();
        config.batch.workspace_root = Some(root.clone());
        let generator = BatchGenerator::with_components(
            config,
            Arc::new(PlainRenderer),
            FormatConverter::new(vec![]),
        );
        let mut rx = generator.subscribe();

        let err = generator
            .run_batch(&records(), &template(dir.path()), "VI_001")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidPrefix(_)));
        assert!(err.is_fatal());
        assert_eq!(std::fs::read_dir(&root).unwrap().count(), 0);
        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Event::BatchFailed { index: 0, .. }));
    }

    #[tokio::test]
    async fn empty_records_and_missing_template_are_fatal() {
        let dir = TempDir::new().unwrap();
        let generator = generator(vec![]);

        let err = generator
            .run_batch(&[], &template(dir.path()), "VI-001")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoRecords));

        let err = generator
            .run_batch(&records(), &dir.path().join("missing.docx"), "VI-001")
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "template_not_found");
    }

    #[tokio::test]
    async fn render_failure_halts_the_batch() {
        struct FailSecond(AtomicUsize);

        #[async_trait]
        impl DocumentRenderer for FailSecond {
            async fn render(&self, _r: &Record, _t: &Path, output: &Path) -> Result<Artifact> {
                if self.0.fetch_add(1, Ordering::SeqCst) == 1 {
                    return Err(RenderError::WriteFailed {
                        path: output.to_path_buf(),
                        reason: "disk full".into(),
                    }
                    .into());
                }
                std::fs::write(output, b"ok")?;
                Ok(Artifact::new(output, ArtifactFormat::Source))
            }

            fn name(&self) -> &'static str {
                "fail-second"
            }
        }

        let dir = TempDir::new().unwrap();
        let generator = BatchGenerator::with_components(
            Config::default(),
            Arc::new(FailSecond(AtomicUsize::new(0))),
            FormatConverter::new(vec![]),
        );
        let mut rx = generator.subscribe();

        let err = generator
            .run_batch(&records(), &template(dir.path()), "VI-001")
            .await
            .unwrap_err();

        assert_eq!(err.error_code(), "render_write_failed");
        let events = drain(&mut rx);
        assert!(matches!(events.last(), Some(Event::BatchFailed { index: 2, .. })));
        assert!(!events.iter().any(|e| matches!(e, Event::BatchCompleted { .. })));
    }

    #[tokio::test]
    async fn dropping_result_removes_workspace() {
        let dir = TempDir::new().unwrap();
        let result = generator(vec![])
            .run_batch(&records(), &template(dir.path()), "VI-001")
            .await
            .unwrap();
        let workspace = result.workspace().to_path_buf();
        assert!(workspace.exists());

        let blob = result.into_archive().unwrap();
        assert!(!blob.is_empty());
        assert!(!workspace.exists());
    }

    #[tokio::test]
    async fn disabled_conversion_delivers_sources() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            convert: ConvertConfig {
                enabled: false,
                ..Default::default()
            },
            ..Default::default()
        };
        let generator = BatchGenerator::with_components(
            config.clone(),
            Arc::new(PlainRenderer),
            FormatConverter::from_config(&config.convert),
        );

        let result = generator
            .run_batch(&records(), &template(dir.path()), "VI-001")
            .await
            .unwrap();
        assert!(!result.all_succeeded());
        assert!(
            result
                .artifacts()
                .iter()
                .all(|a| a.format == ArtifactFormat::Source)
        );
    }
}
