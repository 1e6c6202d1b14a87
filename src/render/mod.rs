//! Template rendering
//!
//! Rendering is split into two deterministic steps:
//!
//! 1. [`preprocess`] builds a working copy of a [`Record`](crate::types::Record)
//!    with localized dates, currency amounts and padded phone numbers.
//! 2. A [`DocumentRenderer`] fills the template's placeholders from that copy.
//!
//! [`DocxRenderer`] is the built-in renderer for `.docx` templates.

mod docx;
mod fields;
mod traits;

pub use docx::{DocxRenderer, fill_placeholders};
pub use fields::{format_date, format_money, parse_date, preprocess};
pub use traits::DocumentRenderer;
