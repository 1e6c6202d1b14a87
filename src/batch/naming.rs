//! Output naming for batch documents

use crate::config::BatchConfig;
use crate::prefix::SequencePrefix;
use crate::types::Record;
use crate::utils::sanitize_component;

const UNKNOWN: &str = "Unknown";

/// `{label} {roman} {seq:03} {IDENTITY} ({SECONDARY})`, without extension
///
/// Missing name components become `UNKNOWN`; path separators in either component
/// are replaced by `-`.
pub fn document_stem(config: &BatchConfig, roman: &str, sequence: u32, record: &Record) -> String {
    format!(
        "{} {} {:03} {} ({})",
        config.label,
        roman,
        sequence,
        name_component(record, &config.identity_field),
        name_component(record, &config.secondary_field),
    )
}

/// Download name for a batch archive, e.g. `SLM_VI_001.zip`
pub fn archive_name(config: &BatchConfig, prefix: &SequencePrefix) -> String {
    format!("{}_{}.zip", config.label, prefix.archive_stem())
}

/// Display value of the identity field for status lines
pub(crate) fn display_name(record: &Record, field: &str) -> String {
    record.text(field).unwrap_or_else(|| UNKNOWN.to_string())
}

fn name_component(record: &Record, field: &str) -> String {
    sanitize_component(&display_name(record, field).to_uppercase())
}
