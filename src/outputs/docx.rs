//! Word (`.docx`) rendering of report text.
//!
//! A `.docx` file is a zip archive of WordprocessingML parts. The document
//! body is generated with `quick-xml` from the blocks parsed out of the model
//! output; styles and relationships are fixed.
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── local_news.docx
//! ├── regional_news.docx
//! ├── national_news.docx
//! └── global_news.docx
//! ```
//!
//! With the dated layout the files land in `output_dir/<YYYY-MM-DD>/<provider>/`.
//!
//! The archive is assembled in memory, written to `<stem>.docx.tmp` and then
//! renamed over `<stem>.docx`. A failed write leaves any previous document
//! with that name untouched.

use crate::error::WriteError;
use crate::report::{Block, parse_blocks};
use chrono::{SecondsFormat, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/><Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/></Relationships>"#;

const DOCUMENT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:qFormat/><w:pPr><w:spacing w:after="160" w:line="259" w:lineRule="auto"/></w:pPr><w:rPr><w:sz w:val="22"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:keepNext/><w:spacing w:before="240" w:after="120"/><w:outlineLvl w:val="0"/></w:pPr><w:rPr><w:b/><w:sz w:val="36"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="Heading2"><w:name w:val="heading 2"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:keepNext/><w:spacing w:before="200" w:after="80"/><w:outlineLvl w:val="1"/></w:pPr><w:rPr><w:b/><w:sz w:val="28"/></w:rPr></w:style></w:styles>"#;

/// Anything that turns report text into a file on disk.
pub trait DocumentWriter {
    /// Write `text` as `<stem>.<ext>` and return the path written.
    async fn write(&self, text: &str, stem: &str) -> Result<PathBuf, WriteError>;
}

/// Writes `.docx` files into a single directory.
#[derive(Debug, Clone)]
pub struct DocxWriter {
    output_dir: PathBuf,
}

impl DocxWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// `<base>/<YYYY-MM-DD>/<provider>/`, using today's local date.
    pub fn dated(base: impl AsRef<Path>, provider: &str) -> Self {
        let date = chrono::Local::now().format("%Y-%m-%d").to_string();
        Self::new(base.as_ref().join(date).join(provider))
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn path_for(&self, stem: &str) -> PathBuf {
        self.output_dir.join(format!("{stem}.docx"))
    }
}

impl DocumentWriter for DocxWriter {
    #[instrument(level = "info", skip(self, text), fields(dir = %self.output_dir.display()))]
    async fn write(&self, text: &str, stem: &str) -> Result<PathBuf, WriteError> {
        let blocks = parse_blocks(text);
        if blocks.is_empty() {
            return Err(WriteError::EmptyDocument);
        }
        let title = blocks
            .iter()
            .find_map(|b| match b {
                Block::Title(t) => Some(t.as_str()),
                _ => None,
            })
            .unwrap_or(stem);

        let bytes = build_docx(&blocks, title)?;

        fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|source| WriteError::Io {
                path: self.output_dir.clone(),
                source,
            })?;

        let path = self.path_for(stem);
        let tmp = path.with_extension("docx.tmp");
        if let Err(source) = fs::write(&tmp, &bytes).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(WriteError::Io { path: tmp, source });
        }
        if let Err(source) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(WriteError::Io {
                path: path.clone(),
                source,
            });
        }

        info!(path = %path.display(), blocks = blocks.len(), bytes = bytes.len(), "Wrote report document");
        Ok(path)
    }
}

/// Package blocks into the bytes of a `.docx` archive.
pub fn build_docx(blocks: &[Block], title: &str) -> Result<Vec<u8>, WriteError> {
    let document = document_xml(blocks)?;
    let core = core_xml(title)?;

    let archive = |e: zip::result::ZipError| WriteError::Archive(e.to_string());
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    let parts: [(&str, &[u8]); 6] = [
        ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
        ("_rels/.rels", PACKAGE_RELS.as_bytes()),
        ("docProps/core.xml", core.as_slice()),
        ("word/_rels/document.xml.rels", DOCUMENT_RELS.as_bytes()),
        ("word/styles.xml", STYLES.as_bytes()),
        ("word/document.xml", document.as_slice()),
    ];
    for (name, bytes) in parts {
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        zip.start_file(name, options).map_err(archive)?;
        zip.write_all(bytes)
            .map_err(|e| WriteError::Archive(e.to_string()))?;
    }

    Ok(zip.finish().map_err(archive)?.into_inner())
}

/// Thin wrapper mapping quick-xml write failures into [`WriteError`].
struct Xml {
    writer: Writer<Vec<u8>>,
}

impl Xml {
    fn new() -> Result<Self, WriteError> {
        let mut xml = Self {
            writer: Writer::new(Vec::new()),
        };
        xml.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
        Ok(xml)
    }

    fn event(&mut self, event: Event<'_>) -> Result<(), WriteError> {
        self.writer
            .write_event(event)
            .map_err(|e| WriteError::Xml(e.to_string()))
    }

    fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), WriteError> {
        let el = BytesStart::new(name).with_attributes(attrs.iter().copied());
        self.event(Event::Start(el))
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), WriteError> {
        let el = BytesStart::new(name).with_attributes(attrs.iter().copied());
        self.event(Event::Empty(el))
    }

    fn end(&mut self, name: &str) -> Result<(), WriteError> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    fn text(&mut self, text: &str) -> Result<(), WriteError> {
        self.event(Event::Text(BytesText::new(text)))
    }

    fn element(&mut self, name: &str, text: &str) -> Result<(), WriteError> {
        self.start(name, &[])?;
        self.text(text)?;
        self.end(name)
    }

    fn into_bytes(self) -> Vec<u8> {
        self.writer.into_inner()
    }
}

fn document_xml(blocks: &[Block]) -> Result<Vec<u8>, WriteError> {
    let mut xml = Xml::new()?;
    xml.start("w:document", &[("xmlns:w", W_NS)])?;
    xml.start("w:body", &[])?;

    for block in blocks {
        xml.start("w:p", &[])?;
        let style = match block {
            Block::Title(_) => Some("Heading1"),
            Block::Heading(_) => Some("Heading2"),
            Block::Paragraph(_) => None,
        };
        if let Some(style) = style {
            xml.start("w:pPr", &[])?;
            xml.empty("w:pStyle", &[("w:val", style)])?;
            xml.end("w:pPr")?;
        }
        xml.start("w:r", &[])?;
        xml.start("w:t", &[("xml:space", "preserve")])?;
        xml.text(block.text())?;
        xml.end("w:t")?;
        xml.end("w:r")?;
        xml.end("w:p")?;
    }

    // US Letter, one-inch margins
    xml.start("w:sectPr", &[])?;
    xml.empty("w:pgSz", &[("w:w", "12240"), ("w:h", "15840")])?;
    xml.empty(
        "w:pgMar",
        &[
            ("w:top", "1440"),
            ("w:right", "1440"),
            ("w:bottom", "1440"),
            ("w:left", "1440"),
            ("w:header", "720"),
            ("w:footer", "720"),
            ("w:gutter", "0"),
        ],
    )?;
    xml.end("w:sectPr")?;

    xml.end("w:body")?;
    xml.end("w:document")?;
    Ok(xml.into_bytes())
}

fn core_xml(title: &str) -> Result<Vec<u8>, WriteError> {
    let created = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    let mut xml = Xml::new()?;
    xml.start(
        "cp:coreProperties",
        &[
            (
                "xmlns:cp",
                "http://schemas.openxmlformats.org/package/2006/metadata/core-properties",
            ),
            ("xmlns:dc", "http://purl.org/dc/elements/1.1/"),
            ("xmlns:dcterms", "http://purl.org/dc/terms/"),
            ("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"),
        ],
    )?;
    xml.element("dc:title", title)?;
    xml.element("dc:creator", env!("CARGO_PKG_NAME"))?;
    xml.start("dcterms:created", &[("xsi:type", "dcterms:W3CDTF")])?;
    xml.text(&created)?;
    xml.end("dcterms:created")?;
    xml.end("cp:coreProperties")?;
    Ok(xml.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "scope_news_docx_{}_{}",
            std::process::id(),
            name
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    fn read_part(path: &Path, part: &str) -> String {
        let file = std::fs::File::open(path).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        let mut entry = archive.by_name(part).unwrap();
        let mut out = String::new();
        entry.read_to_string(&mut out).unwrap();
        out
    }

    const REPORT: &str =
        "@@H1@@Reston Today@@H1@@@@H2@@Schools & Parks@@H2@@@@P@@Budget <approved>.@@P@@";

    #[tokio::test]
    async fn test_write_creates_docx_with_styled_blocks() {
        let dir = temp_dir("styled");
        let writer = DocxWriter::new(&dir);

        let path = writer.write(REPORT, "local_news").await.unwrap();
        assert_eq!(path, dir.join("local_news.docx"));
        assert!(path.exists());

        let document = read_part(&path, "word/document.xml");
        assert!(document.contains(r#"<w:pStyle w:val="Heading1"/>"#));
        assert!(document.contains(r#"<w:pStyle w:val="Heading2"/>"#));
        assert!(document.contains("Reston Today"));
        assert!(document.contains("Schools &amp; Parks"));
        assert!(document.contains("Budget &lt;approved&gt;."));

        let core = read_part(&path, "docProps/core.xml");
        assert!(core.contains("<dc:title>Reston Today</dc:title>"));

        let styles = read_part(&path, "word/styles.xml");
        assert!(styles.contains(r#"w:styleId="Heading1""#));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_write_overwrites_same_path() {
        let dir = temp_dir("overwrite");
        let writer = DocxWriter::new(&dir);

        let first = writer.write("@@P@@first run@@P@@", "global_news").await.unwrap();
        let second = writer.write("@@P@@second run@@P@@", "global_news").await.unwrap();
        assert_eq!(first, second);

        let entries = std::fs::read_dir(&dir).unwrap().count();
        assert_eq!(entries, 1);
        let document = read_part(&second, "word/document.xml");
        assert!(document.contains("second run"));
        assert!(!document.contains("first run"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_write_rejects_empty_document() {
        let dir = temp_dir("empty");
        let writer = DocxWriter::new(&dir);

        let err = writer.write("@@H1@@ @@H1@@", "national_news").await.unwrap_err();
        assert!(matches!(err, WriteError::EmptyDocument));
        assert!(!writer.path_for("national_news").exists());
    }

    #[tokio::test]
    async fn test_write_reports_io_failure() {
        let dir = temp_dir("blocked");
        std::fs::create_dir_all(dir.parent().unwrap()).unwrap();
        // A regular file where the output directory should be
        std::fs::write(&dir, b"not a directory").unwrap();

        let writer = DocxWriter::new(dir.join("nested"));
        let err = writer.write(REPORT, "local_news").await.unwrap_err();
        assert!(matches!(err, WriteError::Io { .. }));

        let _ = std::fs::remove_file(&dir);
    }

    #[tokio::test]
    async fn test_failed_write_keeps_previous_document() {
        let dir = temp_dir("keep_previous");
        let writer = DocxWriter::new(&dir);
        let path = writer.write("@@P@@first run@@P@@", "regional_news").await.unwrap();

        // Occupy the staging path so the second write cannot create it
        let staging = dir.join("regional_news.docx.tmp");
        std::fs::create_dir_all(staging.join("blocker")).unwrap();

        let err = writer
            .write("@@P@@second run@@P@@", "regional_news")
            .await
            .unwrap_err();
        assert!(matches!(err, WriteError::Io { .. }));
        assert!(read_part(&path, "word/document.xml").contains("first run"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_dated_layout() {
        let writer = DocxWriter::dated("/tmp/out", "openai");
        let date = chrono::Local::now().format("%Y-%m-%d").to_string();
        assert_eq!(
            writer.path_for("local_news"),
            PathBuf::from("/tmp/out").join(date).join("openai").join("local_news.docx")
        );
    }
}
