//! Bulk dispatch with per-recipient failure accounting

use super::attachment::{AttachmentFetcher, HttpAttachmentFetcher};
use super::compose::{MessageComposer, parse_mailbox};
use super::session::Session;
use super::transport::{MailTransport, SmtpMailTransport, deliver_with_fallback};
use crate::config::{DispatchConfig, SmtpConfig};
use crate::error::{Error, Result};
use crate::types::Event;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Per-run dispatch choices
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DispatchOptions {
    /// Name of the session template to send
    pub template: String,
    /// Fetch and attach each recipient's attachment reference
    #[serde(default)]
    pub include_attachments: bool,
    /// Addresses copied on every message
    #[serde(default)]
    pub cc: Vec<String>,
    /// Addresses blind-copied on every message
    #[serde(default)]
    pub bcc: Vec<String>,
}

/// Outcome for one recipient
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Recipient address
    pub recipient: String,
    /// Whether the server accepted the message
    pub success: bool,
    /// Failure reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Append-only dispatch log with a bounded view of recent entries
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DispatchLog {
    #[serde(default)]
    entries: Vec<LogEntry>,
    #[serde(default = "default_window")]
    window: usize,
}

fn default_window() -> usize {
    DispatchConfig::default().log_window
}

impl Default for DispatchLog {
    fn default() -> Self {
        Self::new(default_window())
    }
}

impl DispatchLog {
    /// Empty log showing the last `window` entries
    pub fn new(window: usize) -> Self {
        Self {
            entries: Vec::new(),
            window,
        }
    }

    /// Append an entry
    pub fn push(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    /// Up to `window` most recent entries, oldest first
    pub fn recent(&self) -> &[LogEntry] {
        let start = self.entries.len().saturating_sub(self.window);
        &self.entries[start..]
    }

    /// Every entry in order
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Failed entries in order
    pub fn failures(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().filter(|e| !e.success)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Final accounting of a dispatch run
#[must_use]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DispatchSummary {
    /// Messages accepted by the server
    pub sent_count: usize,
    /// Recipients that could not be served
    pub failed_count: usize,
    /// Recipients attempted
    pub total: usize,
    /// Per-recipient outcomes
    pub log: DispatchLog,
}

/// Sends one templated message per recipient
pub struct Dispatcher {
    smtp: SmtpConfig,
    config: DispatchConfig,
    transport: Arc<dyn MailTransport>,
    fetcher: Arc<dyn AttachmentFetcher>,
    event_tx: broadcast::Sender<Event>,
}

impl Dispatcher {
    /// Dispatcher using SMTP and HTTP attachment fetching
    pub fn new(smtp: SmtpConfig, config: DispatchConfig) -> Self {
        let transport = Arc::new(SmtpMailTransport::from_config(&smtp));
        let fetcher = Arc::new(HttpAttachmentFetcher::new(config.attachment_timeout));
        Self::with_components(smtp, config, transport, fetcher)
    }

    /// Dispatcher with explicit transport and fetcher
    pub fn with_components(
        smtp: SmtpConfig,
        config: DispatchConfig,
        transport: Arc<dyn MailTransport>,
        fetcher: Arc<dyn AttachmentFetcher>,
    ) -> Self {
        let (event_tx, _rx) = broadcast::channel(1000);
        Self {
            smtp,
            config,
            transport,
            fetcher,
            event_tx,
        }
    }

    /// Publish events on an existing channel instead of a private one
    pub fn with_event_sender(mut self, event_tx: broadcast::Sender<Event>) -> Self {
        self.event_tx = event_tx;
        self
    }

    /// Subscribe to dispatch progress events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Send the selected template to every recipient of `session`, in order
    ///
    /// A recipient whose message cannot be composed or delivered is logged and
    /// counted; the run continues with the next one. The pacing delay is applied
    /// after every recipient.
    ///
    /// # Errors
    ///
    /// Returns a run-fatal error, before anything is sent, if the template is
    /// unknown, there are no recipients, the sender, secret or server is missing,
    /// or a Cc/Bcc address is malformed.
    pub async fn send_all(
        &self,
        session: &Session,
        options: &DispatchOptions,
    ) -> Result<DispatchSummary> {
        let template = session.template(&options.template)?;
        let recipients = session.recipients();
        self.check_preconditions(session, recipients.len())?;

        let composer = MessageComposer::new(session.sender(), self.fetcher.clone())
            .with_cc(options.cc.clone())
            .with_bcc(options.bcc.clone())
            .with_attachment_policy(self.config.on_attachment_error);
        check_addresses("smtp.sender", &[session.sender().to_string()])?;
        check_addresses("cc", &options.cc)?;
        check_addresses("bcc", &options.bcc)?;

        let total = recipients.len();
        let mut log = DispatchLog::new(self.config.log_window);
        let mut sent_count = 0;
        let mut failed_count = 0;

        info!(
            total,
            template = %template.name,
            attachments = options.include_attachments,
            cc = options.cc.len(),
            bcc = options.bcc.len(),
            "starting dispatch"
        );
        self.emit_event(Event::DispatchStarted { total });

        for (i, recipient) in recipients.iter().enumerate() {
            let index = i + 1;
            self.emit_event(Event::Sending {
                index,
                total,
                recipient: recipient.email.clone(),
            });

            let result = match composer
                .compose(recipient, template, options.include_attachments)
                .await
            {
                Ok(message) => {
                    deliver_with_fallback(self.transport.as_ref(), &self.smtp, &message).await
                }
                Err(e) => Err(e),
            };

            match result {
                Ok(endpoint) => {
                    sent_count += 1;
                    info!(index, total, recipient = %recipient.email, endpoint = %endpoint, "message sent");
                    log.push(LogEntry {
                        recipient: recipient.email.clone(),
                        success: true,
                        error: None,
                    });
                    self.emit_event(Event::Sent {
                        index,
                        recipient: recipient.email.clone(),
                    });
                }
                Err(e) => {
                    failed_count += 1;
                    warn!(index, total, recipient = %recipient.email, error = %e, "message failed");
                    log.push(LogEntry {
                        recipient: recipient.email.clone(),
                        success: false,
                        error: Some(e.to_string()),
                    });
                    self.emit_event(Event::SendFailed {
                        index,
                        recipient: recipient.email.clone(),
                        error: e.to_string(),
                    });
                }
            }

            tokio::time::sleep(self.config.pacing).await;
        }

        info!(sent_count, failed_count, total, "dispatch complete");
        self.emit_event(Event::DispatchCompleted {
            sent: sent_count,
            failed: failed_count,
            total,
        });

        Ok(DispatchSummary {
            sent_count,
            failed_count,
            total,
            log,
        })
    }

    fn check_preconditions(&self, session: &Session, recipients: usize) -> Result<()> {
        if recipients == 0 {
            return Err(Error::config("EmailList", "no recipients to send to"));
        }
        if session.sender().trim().is_empty() {
            return Err(Error::config("smtp.sender", "sender address is required"));
        }
        if self.smtp.secret.is_empty() {
            return Err(Error::config("smtp.secret", "sender secret is required"));
        }
        if self.smtp.server.trim().is_empty() {
            return Err(Error::config("smtp.server", "SMTP server is required"));
        }
        Ok(())
    }
}

fn check_addresses(key: &str, addresses: &[String]) -> Result<()> {
    for address in addresses {
        if let Err(e) = parse_mailbox(address) {
            return Err(Error::config(key, e.to_string()));
        }
    }
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AttachmentErrorPolicy;
    use crate::error::MailError;
    use crate::mail::compose::{MessageTemplate, OutboundMessage, Recipient};
    use crate::mail::transport::SmtpEndpoint;
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    /// Accepts everything except messages to `reject`, on any endpoint
    #[derive(Default)]
    struct RecordingTransport {
        reject: Vec<String>,
        delivered: Mutex<Vec<(SmtpEndpoint, OutboundMessage)>>,
    }

    #[async_trait]
    impl MailTransport for RecordingTransport {
        async fn deliver(
            &self,
            endpoint: &SmtpEndpoint,
            message: &OutboundMessage,
        ) -> std::result::Result<(), MailError> {
            if self.reject.contains(&message.to) {
                return Err(MailError::Transport {
                    endpoint: endpoint.to_string(),
                    reason: "550 mailbox unavailable".into(),
                });
            }
            self.delivered
                .lock()
                .unwrap()
                .push((endpoint.clone(), message.clone()));
            Ok(())
        }
    }

    struct FailingFetcher;

    #[async_trait]
    impl AttachmentFetcher for FailingFetcher {
        async fn fetch(
            &self,
            reference: &str,
            _dest_dir: &Path,
        ) -> std::result::Result<PathBuf, MailError> {
            Err(MailError::Fetch {
                url: reference.to_string(),
                reason: "HTTP 404 Not Found".into(),
            })
        }
    }

    fn smtp() -> SmtpConfig {
        SmtpConfig {
            server: "smtp.example.com".into(),
            sender: "ops@example.com".into(),
            secret: "s3cret".into(),
            ..Default::default()
        }
    }

    fn fast() -> DispatchConfig {
        DispatchConfig {
            pacing: Duration::ZERO,
            ..Default::default()
        }
    }

    fn session(count: usize) -> Session {
        let mut session = Session::new("ops@example.com");
        session.add_template(MessageTemplate {
            name: "Reminder".into(),
            subject: "Reminder for [Client Name]".into(),
            body: "Dear [Client Name]".into(),
        });
        for i in 1..=count {
            session.add_recipient(Recipient {
                email: format!("client{i}@example.com"),
                display_name: format!("Client {i}"),
                attachment: Some(format!("https://files.example.com/{i}.pdf")),
            });
        }
        session
    }

    fn options() -> DispatchOptions {
        DispatchOptions {
            template: "Reminder".into(),
            ..Default::default()
        }
    }

    fn dispatcher(transport: Arc<RecordingTransport>, config: DispatchConfig) -> Dispatcher {
        Dispatcher::with_components(smtp(), config, transport, Arc::new(FailingFetcher))
    }

    #[tokio::test]
    async fn one_failure_is_counted_and_run_continues() {
        let transport = Arc::new(RecordingTransport {
            reject: vec!["client3@example.com".into()],
            ..Default::default()
        });
        let dispatcher = dispatcher(transport.clone(), fast());

        let summary = dispatcher.send_all(&session(5), &options()).await.unwrap();

        assert_eq!(summary.total, 5);
        assert_eq!(summary.sent_count, 4);
        assert_eq!(summary.failed_count, 1);
        let failures: Vec<_> = summary.log.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].recipient, "client3@example.com");
        assert!(failures[0].error.as_deref().unwrap().contains("550"));
        assert_eq!(transport.delivered.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn messages_are_personalized_per_recipient() {
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = dispatcher(transport.clone(), fast());

        dispatcher.send_all(&session(2), &options()).await.unwrap();

        let delivered = transport.delivered.lock().unwrap();
        assert_eq!(delivered[0].1.subject, "Reminder for Client 1");
        assert_eq!(delivered[1].1.body, "Dear Client 2");
        assert_eq!(delivered[1].1.to, "client2@example.com");
    }

    #[tokio::test]
    async fn log_window_keeps_recent_tail_and_full_counts() {
        let transport = Arc::new(RecordingTransport::default());
        let config = DispatchConfig {
            log_window: 3,
            ..fast()
        };
        let summary = dispatcher(transport, config)
            .send_all(&session(7), &options())
            .await
            .unwrap();

        assert_eq!(summary.log.len(), 7);
        let recent: Vec<_> = summary.log.recent().iter().map(|e| e.recipient.as_str()).collect();
        assert_eq!(
            recent,
            vec!["client5@example.com", "client6@example.com", "client7@example.com"]
        );
    }

    #[tokio::test]
    async fn attachment_failure_fails_recipient_by_default() {
        let transport = Arc::new(RecordingTransport::default());
        let opts = DispatchOptions {
            include_attachments: true,
            ..options()
        };

        let summary = dispatcher(transport.clone(), fast())
            .send_all(&session(2), &opts)
            .await
            .unwrap();
        assert_eq!(summary.failed_count, 2);
        assert!(transport.delivered.lock().unwrap().is_empty());

        let lenient = DispatchConfig {
            on_attachment_error: AttachmentErrorPolicy::SendWithout,
            ..fast()
        };
        let summary = dispatcher(transport.clone(), lenient)
            .send_all(&session(2), &opts)
            .await
            .unwrap();
        assert_eq!(summary.sent_count, 2);
        assert!(
            transport
                .delivered
                .lock()
                .unwrap()
                .iter()
                .all(|(_, m)| m.attachment.is_none())
        );
    }

    #[tokio::test]
    async fn preconditions_abort_before_sending() {
        let transport = Arc::new(RecordingTransport::default());
        let d = dispatcher(transport.clone(), fast());

        let err = d
            .send_all(
                &session(2),
                &DispatchOptions {
                    template: "Missing".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(err.error_code(), "template_not_found");

        let err = d.send_all(&session(0), &options()).await.unwrap_err();
        assert!(matches!(err, Error::Config { .. }));

        let bad_cc = DispatchOptions {
            cc: vec!["boss@".into()],
            ..options()
        };
        let err = d.send_all(&session(2), &bad_cc).await.unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("boss@"));

        let no_secret = Dispatcher::with_components(
            SmtpConfig {
                secret: String::new(),
                ..smtp()
            },
            fast(),
            transport.clone(),
            Arc::new(FailingFetcher),
        );
        match no_secret.send_all(&session(1), &options()).await {
            Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("smtp.secret")),
            other => panic!("expected Config error, got {other:?}"),
        }

        assert!(transport.delivered.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn events_track_each_recipient() {
        let transport = Arc::new(RecordingTransport {
            reject: vec!["client2@example.com".into()],
            ..Default::default()
        });
        let d = dispatcher(transport, fast());
        let mut rx = d.subscribe();

        let _ = d.send_all(&session(2), &options()).await.unwrap();

        let mut events = Vec::new();
        while let Ok(e) = rx.try_recv() {
            events.push(e);
        }
        assert!(matches!(events[0], Event::DispatchStarted { total: 2 }));
        assert!(matches!(events[1], Event::Sending { index: 1, .. }));
        assert!(matches!(events[2], Event::Sent { index: 1, .. }));
        assert!(matches!(events[4], Event::SendFailed { index: 2, .. }));
        assert!(matches!(
            events[5],
            Event::DispatchCompleted {
                sent: 1,
                failed: 1,
                total: 2
            }
        ));
    }

    #[tokio::test]
    async fn pacing_applies_after_every_recipient() {
        let transport = Arc::new(RecordingTransport::default());
        let config = DispatchConfig {
            pacing: Duration::from_millis(40),
            ..Default::default()
        };
        let started = Instant::now();
        let _ = dispatcher(transport, config)
            .send_all(&session(3), &options())
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(120));
    }

    #[test]
    fn recent_is_whole_log_when_shorter_than_window() {
        let mut log = DispatchLog::new(10);
        log.push(LogEntry {
            recipient: "a@example.com".into(),
            success: true,
            error: None,
        });
        assert_eq!(log.recent().len(), 1);
        assert!(!log.is_empty());
    }

    #[test]
    fn log_without_window_uses_configured_default() {
        let entries: Vec<serde_json::Value> = (1..=12)
            .map(|i| serde_json::json!({ "recipient": format!("c{i}@example.com"), "success": true }))
            .collect();
        let log: DispatchLog =
            serde_json::from_value(serde_json::json!({ "entries": entries })).unwrap();

        assert_eq!(log.len(), 12);
        assert_eq!(log.recent().len(), 10);
        assert_eq!(log.recent()[0].recipient, "c3@example.com");
        assert_eq!(DispatchLog::default().recent().len(), 0);
    }
}
