//! Run-scoped conversion state

use super::process::run_bounded;
use crate::config::ConvertConfig;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// State shared by every conversion in one batch run
///
/// Holds the headless converter discovered on first use (a failed discovery is
/// cached too, so the candidate list is probed at most once per run) and counts
/// strategy attempts. Create a fresh context for every run.
#[derive(Debug)]
pub struct ConversionContext {
    config: ConvertConfig,
    headless: OnceCell<Option<PathBuf>>,
    attempts: AtomicUsize,
    failures: AtomicUsize,
}

impl ConversionContext {
    /// Create a context for one run
    pub fn new(config: ConvertConfig) -> Self {
        Self {
            config,
            headless: OnceCell::new(),
            attempts: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
        }
    }

    /// Create a context whose headless converter is already known
    pub fn with_headless_binary(config: ConvertConfig, binary: Option<PathBuf>) -> Self {
        Self {
            headless: OnceCell::new_with(Some(binary)),
            ..Self::new(config)
        }
    }

    /// Conversion settings for this run
    pub fn config(&self) -> &ConvertConfig {
        &self.config
    }

    /// Headless converter adopted for this run, discovering it on first call
    pub async fn headless_binary(&self) -> Option<&Path> {
        self.headless
            .get_or_init(|| discover_headless(&self.config))
            .await
            .as_deref()
    }

    /// Count one strategy invocation
    pub fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one failed strategy invocation
    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Strategy invocations so far
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Failed strategy invocations so far
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }
}

fn candidates(config: &ConvertConfig) -> Vec<PathBuf> {
    config
        .headless_path
        .iter()
        .chain(config.headless_candidates.iter())
        .cloned()
        .collect()
}

/// Resolve a bare program name through PATH; other paths are used as given
fn resolve(candidate: &Path) -> Option<PathBuf> {
    if candidate.components().count() == 1 && !candidate.is_absolute() {
        which::which(candidate).ok()
    } else if candidate.exists() {
        Some(candidate.to_path_buf())
    } else {
        None
    }
}

async fn discover_headless(config: &ConvertConfig) -> Option<PathBuf> {
    for candidate in candidates(config) {
        let Some(binary) = resolve(&candidate) else {
            debug!(candidate = ?candidate, "headless converter candidate not present");
            continue;
        };

        let mut cmd = Command::new(&binary);
        cmd.arg("--version");
        match run_bounded(cmd, config.probe_timeout, "headless-office").await {
            Ok(output) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
                info!(binary = ?binary, version = %version, "adopted headless converter");
                return Some(binary);
            }
            Ok(output) => {
                debug!(binary = ?binary, status = %output.status, "headless converter probe failed");
            }
            Err(e) => {
                debug!(binary = ?binary, error = %e, "headless converter probe failed");
            }
        }
    }

    warn!("no headless converter found on this host");
    None
}
