//! Bulk templated email dispatch
//!
//! A [`Session`] holds the sender, the named templates and the recipient list for
//! one run. [`Dispatcher::send_all`] sends one message per recipient, in order,
//! through a [`MailTransport`] that tries STARTTLS first and implicit TLS second.
//! Individual failures are logged and counted without stopping the run.
//!
//! The transport and attachment fetcher are traits so hosts and tests can swap
//! them out:
//!
//! - [`SmtpMailTransport`] submits via lettre
//! - [`HttpAttachmentFetcher`] downloads `http(s)` references and copies local ones

mod attachment;
mod compose;
mod dispatch;
mod session;
mod transport;

pub use attachment::{AttachmentFetcher, FALLBACK_NAME, HttpAttachmentFetcher, attachment_name};
pub use compose::{
    AttachmentPart, CLIENT_NAME_TOKEN, MessageComposer, MessageTemplate, OutboundMessage,
    Recipient, parse_address_list, parse_mailbox, substitute,
};
pub use dispatch::{DispatchLog, DispatchOptions, DispatchSummary, Dispatcher, LogEntry};
pub use session::{
    COL_ATTACHMENT, COL_BODY, COL_CLIENT_NAME, COL_EMAIL, COL_SUBJECT, COL_TEMPLATE_NAME,
    Session, Workbook,
};
pub use transport::{
    IMPLICIT_TLS_PORT, MailTransport, SmtpEndpoint, SmtpMailTransport, TlsMode,
    deliver_with_fallback,
};
