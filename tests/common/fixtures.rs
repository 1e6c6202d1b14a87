//! In-memory `.docx` templates and record fixtures

use slm_batch::Record;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;

/// Body of a reminder letter with placeholders in several forms
pub const LETTER_BODY: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#,
    "<w:p><w:r><w:t>Kepada {{ ClientName }} ({{ PlatformName }})</w:t></w:r></w:p>",
    "<w:p><w:r><w:t>Tanggal: {{ SLMDate }}</w:t></w:r></w:p>",
    "<w:p><w:r><w:t>Tagihan: {</w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t>{ Outstanding }}</w:t></w:r></w:p>",
    "<w:p><w:r><w:t>Telepon: {{ClientPhone}}</w:t></w:r></w:p>",
    "</w:body></w:document>"
);

/// Header part with its own placeholder
pub const HEADER_BODY: &str = concat!(
    r#"<w:hdr xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
    "<w:p><w:r><w:t>Ref {{ ClientName }}</w:t></w:r></w:p></w:hdr>"
);

const CONTENT_TYPES: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8"?>"#,
    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
    r#"<Default Extension="xml" ContentType="application/xml"/>"#,
    r#"<Default Extension="png" ContentType="image/png"/>"#,
    r#"<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>"#,
    r#"</Types>"#
);

const PACKAGE_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>"#,
    r#"</Relationships>"#
);

/// Write a minimal word-processing package into `dir`
pub fn write_docx_template(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    let file = std::fs::File::create(&path).expect("Failed to create template");
    let mut zip = zip::ZipWriter::new(file);
    let options = FileOptions::default();

    let parts: [(&str, &[u8]); 5] = [
        ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
        ("_rels/.rels", PACKAGE_RELS.as_bytes()),
        ("word/document.xml", LETTER_BODY.as_bytes()),
        ("word/header1.xml", HEADER_BODY.as_bytes()),
        ("word/media/stamp.png", &[0x89, b'P', b'N', b'G', 0x0d, 0x0a]),
    ];
    for (part, data) in parts {
        zip.start_file(part, options).expect("Failed to start part");
        zip.write_all(data).expect("Failed to write part");
    }
    zip.finish().expect("Failed to finish template");
    path
}

/// Text content of one package part
pub fn read_part(package: &Path, part: &str) -> String {
    let file = std::fs::File::open(package).expect("Failed to open package");
    let mut archive = zip::ZipArchive::new(file).expect("Not a zip package");
    let mut entry = archive.by_name(part).expect("Part missing");
    let mut text = String::new();
    entry.read_to_string(&mut text).expect("Part is not UTF-8");
    text
}

/// Two well-formed client records and one with a path separator in its name
pub fn client_records() -> Vec<Record> {
    serde_json::from_str(
        r#"[
            {"ClientName": "Acme Corp", "PlatformName": "Web", "SLMDate": "2024-08-07",
             "Outstanding": 1234567.4, "ClientPhone": 8123456789},
            {"ClientName": "Beta/Co", "PlatformName": "App", "SLMDate": "2024-12-01",
             "Outstanding": "250000", "ClientPhone": "81298765"},
            {"ClientName": "Gamma", "PlatformName": null, "SLMDate": "soon",
             "Outstanding": null}
        ]"#,
    )
    .expect("Invalid record fixture")
}
