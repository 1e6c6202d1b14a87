//! Hand-written stand-ins for conversion tools and SMTP

use async_trait::async_trait;
use slm_batch::convert::ConversionContext;
use slm_batch::error::{ConversionError, MailError};
use slm_batch::mail::{MailTransport, OutboundMessage, SmtpEndpoint, TlsMode};
use slm_batch::{ConversionStrategy, Event};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::broadcast;

/// Writes a tiny PDF for every call whose 1-based position is not in `fail_on`
pub struct FakePdfStrategy {
    pub name: &'static str,
    pub available: bool,
    pub fail_on: Vec<usize>,
    pub calls: AtomicUsize,
}

impl FakePdfStrategy {
    pub fn working(name: &'static str) -> Self {
        Self {
            name,
            available: true,
            fail_on: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_on(name: &'static str, fail_on: Vec<usize>) -> Self {
        Self {
            fail_on,
            ..Self::working(name)
        }
    }

    pub fn unavailable(name: &'static str) -> Self {
        Self {
            available: false,
            ..Self::working(name)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConversionStrategy for FakePdfStrategy {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn probe(&self, _ctx: &ConversionContext) -> bool {
        self.available
    }

    async fn convert(
        &self,
        source: &Path,
        target: &Path,
        _ctx: &ConversionContext,
    ) -> slm_batch::Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on.contains(&call) {
            return Err(ConversionError::Failed {
                strategy: self.name,
                reason: format!("simulated failure on call {call}"),
            }
            .into());
        }
        let size = std::fs::metadata(source)?.len();
        std::fs::write(target, format!("%PDF-1.7 from {size} bytes"))?;
        Ok(())
    }
}

/// Records accepted messages; refuses STARTTLS when `starttls_down` is set
#[derive(Default)]
pub struct RecordingTransport {
    pub starttls_down: bool,
    pub reject: Vec<String>,
    pub delivered: Mutex<Vec<(SmtpEndpoint, OutboundMessage)>>,
}

#[async_trait]
impl MailTransport for RecordingTransport {
    async fn deliver(
        &self,
        endpoint: &SmtpEndpoint,
        message: &OutboundMessage,
    ) -> Result<(), MailError> {
        let refused = (self.starttls_down && endpoint.mode == TlsMode::StartTls)
            || self.reject.contains(&message.to);
        if refused {
            return Err(MailError::Transport {
                endpoint: endpoint.to_string(),
                reason: "connection refused".into(),
            });
        }
        self.delivered
            .lock()
            .expect("transport lock poisoned")
            .push((endpoint.clone(), message.clone()));
        Ok(())
    }
}

/// Every event currently queued on `rx`
pub fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
