//! Format-specific text extraction (PDF pages, DOCX, markdown, plain text).
//!
//! Extraction is byte-in, text-out: the loader reads files and decides which
//! extractor applies from the file extension. PDF extraction returns one
//! string per page so the loader can classify pages for OCR fallback.

use std::io::Read;
use std::path::Path;

use quick_xml::events::Event;
use thiserror::Error;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file type: {0}")]
    Unsupported(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("DOCX extraction failed: {0}")]
    Docx(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// File formats the loader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Text,
    Markdown,
    Docx,
    Pdf,
}

impl DocumentKind {
    /// Classify by extension (case-insensitive). `None` means skip silently.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "txt" | "log" => Some(DocumentKind::Text),
            "md" | "markdown" => Some(DocumentKind::Markdown),
            "docx" => Some(DocumentKind::Docx),
            "pdf" => Some(DocumentKind::Pdf),
            _ => None,
        }
    }
}

/// Decode bytes as UTF-8, replacing invalid sequences.
pub fn decode_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Render markdown to HTML, then strip tags to leave plain text.
pub fn markdown_to_text(markdown: &str) -> String {
    let parser = pulldown_cmark::Parser::new(markdown);
    let mut html = String::with_capacity(markdown.len() * 3 / 2);
    pulldown_cmark::html::push_html(&mut html, parser);
    decode_entities(&strip_tags(&html)).trim().to_string()
}

/// Remove every `<`, one or more non-`<` characters, `>` run, taking the
/// shortest match. The first character after `<` may itself be `>`.
fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        if let Some(first) = after.chars().next().filter(|&c| c != '<') {
            let body = &after[first.len_utf8()..];
            if let Some(i) = body.find(['<', '>']) {
                if body[i..].starts_with('>') {
                    rest = &body[i + 1..];
                    continue;
                }
            }
        }
        out.push('<');
        rest = after;
    }
    out.push_str(rest);
    out
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Embedded text of each PDF page, in page order.
pub fn pdf_page_texts(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    pdf_extract::extract_text_from_mem_by_pages(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

/// Paragraph texts of a DOCX document joined with `\n`, trimmed.
pub fn docx_text(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    let mut doc_xml = Vec::new();
    entry.take(MAX_XML_ENTRY_BYTES).read_to_end(&mut doc_xml)?;
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Docx(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }
    let paragraphs = docx_paragraphs(&doc_xml)?;
    Ok(paragraphs.join("\n").trim().to_string())
}

fn docx_paragraphs(xml: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text = true;
                }
            }
            Ok(Event::Text(te)) if in_text => {
                let text = te.unescape().map_err(|e| ExtractError::Docx(e.to_string()))?;
                current.push_str(&text);
            }
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => current.push('\t'),
                b"br" | b"cr" => current.push('\n'),
                b"p" => paragraphs.push(String::new()),
                _ => {}
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => paragraphs.push(std::mem::take(&mut current)),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(paragraphs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn docx_with_body(body: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            let xml = format!(
                "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
                body
            );
            zip.write_all(xml.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        buf
    }

    #[test]
    fn kind_by_extension() {
        assert_eq!(DocumentKind::from_path(Path::new("a/b.PDF")), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::from_path(Path::new("x.log")), Some(DocumentKind::Text));
        assert_eq!(
            DocumentKind::from_path(Path::new("x.markdown")),
            Some(DocumentKind::Markdown)
        );
        assert_eq!(DocumentKind::from_path(Path::new("x.docx")), Some(DocumentKind::Docx));
        assert_eq!(DocumentKind::from_path(Path::new("x.png")), None);
        assert_eq!(DocumentKind::from_path(Path::new("Makefile")), None);
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let text = decode_text(b"caf\xff ok");
        assert!(text.starts_with("caf"));
        assert!(text.ends_with(" ok"));
        assert!(text.contains('\u{FFFD}'));
    }

    #[test]
    fn markdown_is_rendered_and_stripped() {
        let text = markdown_to_text("# Runbook\n\nRestart the **worker** & check `logs`.\n");
        assert_eq!(text, "Runbook\nRestart the worker & check logs.");
    }

    #[test]
    fn stray_angle_bracket_survives_stripping() {
        assert_eq!(strip_tags("a <b>bold</b> 1 < 2"), "a bold 1 < 2");
        assert_eq!(strip_tags("<>"), "<>");
        assert_eq!(strip_tags("x<>>y"), "xy");
        assert_eq!(strip_tags("<<b>>"), "<>");
        assert_eq!(strip_tags("a <x"), "a <x");
    }

    #[test]
    fn docx_paragraphs_joined_with_newlines() {
        let bytes = docx_with_body(
            "<w:p><w:r><w:t>First </w:t></w:r><w:r><w:t>line</w:t></w:r></w:p>\
             <w:p/>\
             <w:p><w:r><w:t>Second &amp; last</w:t></w:r></w:p>",
        );
        assert_eq!(docx_text(&bytes).unwrap(), "First line\n\nSecond & last");
    }

    #[test]
    fn docx_without_document_xml_errors() {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            zip.start_file("other.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(b"<x/>").unwrap();
            zip.finish().unwrap();
        }
        assert!(matches!(docx_text(&buf), Err(ExtractError::Docx(_))));
    }

    #[test]
    fn invalid_zip_returns_error_for_docx() {
        assert!(matches!(docx_text(b"not a zip"), Err(ExtractError::Docx(_))));
    }

    #[test]
    fn invalid_pdf_returns_error() {
        assert!(matches!(pdf_page_texts(b"not a pdf"), Err(ExtractError::Pdf(_))));
    }
}
