//! Word-processing template renderer
//!
//! A `.docx` file is a zip package. Every `word/*.xml` part (body, headers,
//! footers, footnotes) is scanned for `{{ Field }}` placeholders; all other parts
//! are copied through untouched.

use super::traits::DocumentRenderer;
use crate::error::{RenderError, Result};
use crate::types::{Artifact, ArtifactFormat, Record};
use async_trait::async_trait;
use regex::Regex;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;
use zip::write::FileOptions;

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        #[allow(clippy::expect_used)]
        Regex::new(r"\{\{\s*([^{}]*?)\s*\}\}").expect("placeholder pattern is valid")
    })
}

/// Renderer for Office Open XML word-processing templates
#[derive(Debug, Default, Clone, Copy)]
pub struct DocxRenderer;

impl DocxRenderer {
    /// Create a renderer
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DocumentRenderer for DocxRenderer {
    async fn render(&self, record: &Record, template: &Path, output: &Path) -> Result<Artifact> {
        if !template.exists() {
            return Err(RenderError::TemplateNotFound {
                path: template.to_path_buf(),
            }
            .into());
        }

        let values: BTreeMap<String, String> = record
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect();
        let template_owned = template.to_path_buf();
        let output_owned = output.to_path_buf();

        // zip I/O is blocking
        tokio::task::spawn_blocking(move || {
            render_package(&template_owned, &output_owned, &values)
        })
        .await
        .map_err(|e| crate::Error::Other(format!("render task panicked: {e}")))??;

        debug!(?output, "rendered document");
        Ok(Artifact::new(output, ArtifactFormat::Source))
    }

    fn name(&self) -> &'static str {
        "docx"
    }
}

fn render_package(
    template: &Path,
    output: &Path,
    values: &BTreeMap<String, String>,
) -> std::result::Result<(), RenderError> {
    let invalid = |reason: String| RenderError::InvalidTemplate {
        path: template.to_path_buf(),
        reason,
    };
    let write_failed = |reason: String| RenderError::WriteFailed {
        path: output.to_path_buf(),
        reason,
    };

    let file = std::fs::File::open(template).map_err(|e| invalid(e.to_string()))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| invalid(e.to_string()))?;

    let out_file = std::fs::File::create(output).map_err(|e| write_failed(e.to_string()))?;
    let mut writer = zip::ZipWriter::new(out_file);

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| invalid(e.to_string()))?;
        let name = entry.name().to_string();

        if entry.is_dir() {
            writer
                .add_directory(name, FileOptions::default())
                .map_err(|e| write_failed(e.to_string()))?;
            continue;
        }

        let mut data = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut data)
            .map_err(|e| invalid(format!("{name}: {e}")))?;

        if is_word_xml_part(&name) {
            let xml = String::from_utf8(data)
                .map_err(|e| invalid(format!("{name} is not UTF-8: {e}")))?;
            data = fill_placeholders(&xml, values).into_bytes();
        }

        let options = FileOptions::default().compression_method(entry.compression());
        writer
            .start_file(name, options)
            .map_err(|e| write_failed(e.to_string()))?;
        writer
            .write_all(&data)
            .map_err(|e| write_failed(e.to_string()))?;
    }

    writer.finish().map_err(|e| write_failed(e.to_string()))?;
    Ok(())
}

fn is_word_xml_part(name: &str) -> bool {
    name.starts_with("word/") && name.ends_with(".xml")
}

/// Substitute `{{ Field }}` tokens in a WordprocessingML part
///
/// Word frequently splits a typed token over several runs
/// (`{{</w:t></w:r><w:r><w:t>Name }}`). Placeholders are matched against the
/// concatenated character data with markup removed, then the matched characters
/// are deleted in place and the value is written where the token began. Markup
/// between the pieces is kept, so the part stays well-formed.
pub fn fill_placeholders(xml: &str, values: &BTreeMap<String, String>) -> String {
    // Byte offsets into `xml` for every byte of character data
    let mut offsets = Vec::with_capacity(xml.len());
    let mut text = String::with_capacity(xml.len());
    let mut in_tag = false;
    let mut run_start = 0;

    for (i, b) in xml.bytes().enumerate() {
        match b {
            b'<' if !in_tag => {
                text.push_str(&xml[run_start..i]);
                in_tag = true;
            }
            b'>' if in_tag => {
                in_tag = false;
                run_start = i + 1;
            }
            _ if !in_tag => offsets.push(i),
            _ => {}
        }
    }
    if !in_tag {
        text.push_str(&xml[run_start..]);
    }

    let mut removed = vec![false; xml.len()];
    let mut inserted: BTreeMap<usize, String> = BTreeMap::new();

    for caps in placeholder_pattern().captures_iter(&text) {
        let (Some(whole), Some(field)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let field = decode_entities(field.as_str());
        let value = match values.get(field.as_str()) {
            Some(v) => v.as_str(),
            None => {
                debug!(field = %field, "placeholder has no matching field, rendering empty");
                ""
            }
        };

        for &pos in &offsets[whole.start()..whole.end()] {
            removed[pos] = true;
        }
        inserted.insert(offsets[whole.start()], escape_xml(value));
    }

    if inserted.is_empty() {
        return xml.to_string();
    }

    let mut out = Vec::with_capacity(xml.len());
    for (i, b) in xml.bytes().enumerate() {
        if let Some(value) = inserted.get(&i) {
            out.extend_from_slice(value.as_bytes());
        }
        if !removed[i] {
            out.push(b);
        }
    }

    // Only whole UTF-8 sequences are ever removed: a match always begins and ends
    // on a char boundary of `text` and runs never split a character
    String::from_utf8(out).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn decode_entities(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
