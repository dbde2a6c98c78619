//! Content loader: turns files and directory trees into [`DocumentUnit`]s.
//!
//! Text-like files become one unit each. PDFs become one unit per page,
//! using the embedded text layer when it has at least `min_chars`
//! characters and OCR otherwise. Pages with no text from either path are
//! dropped.
//!
//! Load failures never abort a directory walk: each failing file yields a
//! unit carrying the error, which the ingestion job reports and skips.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, warn};
use walkdir::WalkDir;

use docgate_core::models::{DocumentUnit, ExtractionMode};

use crate::config::Config;
use crate::extract::{self, DocumentKind};
use crate::ocr::{self, CachedOcr, OcrCache, TesseractOcr};

pub struct Loader {
    ocr: CachedOcr,
    min_chars: usize,
    excludes: GlobSet,
}

impl Loader {
    pub fn new(ocr: CachedOcr, min_chars: usize, exclude_globs: &[String]) -> Result<Self> {
        Ok(Self {
            ocr,
            min_chars,
            excludes: build_globset(exclude_globs)?,
        })
    }

    /// Loader wired to the `pdftoppm`/`tesseract` pipeline and `{cache_dir}/ocr`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let engine = TesseractOcr::new(&config.ocr.pdftoppm, &config.ocr.tesseract);
        let ocr = CachedOcr::new(
            Arc::new(engine),
            OcrCache::new(config.paths.ocr_cache_dir()),
            config.ocr.dpi,
            &config.ocr.lang,
        );
        Self::new(ocr, config.ocr.min_chars, &config.ingest.exclude_globs)
    }

    /// Load a file or every supported file under a directory.
    ///
    /// Never fails: errors are returned as units with `error` set.
    pub async fn load_path(&self, path: &Path) -> Vec<DocumentUnit> {
        if path.is_dir() {
            return self.load_dir(path).await;
        }
        if !path.exists() {
            return vec![DocumentUnit::failed(path, "path does not exist")];
        }
        match self.load_file(path).await {
            Ok(units) => units,
            Err(e) => vec![DocumentUnit::failed(path, format!("{:#}", e))],
        }
    }

    async fn load_dir(&self, root: &Path) -> Vec<DocumentUnit> {
        let mut units = Vec::new();
        let mut files: Vec<PathBuf> = Vec::new();

        for entry in WalkDir::new(root) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().unwrap_or(root).to_path_buf();
                    warn!(path = %path.display(), error = %e, "walk error");
                    units.push(DocumentUnit::failed(path, e.to_string()));
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path);
            if self.excludes.is_match(relative) {
                debug!(path = %path.display(), "excluded");
                continue;
            }
            if DocumentKind::from_path(path).is_none() {
                continue;
            }
            files.push(path.to_path_buf());
        }

        // Sort for deterministic ordering
        files.sort();

        for path in files {
            match self.load_file(&path).await {
                Ok(loaded) => units.extend(loaded),
                Err(e) => units.push(DocumentUnit::failed(&path, format!("{:#}", e))),
            }
        }
        units
    }

    /// Load one file. Unsupported extensions yield no units.
    pub async fn load_file(&self, path: &Path) -> Result<Vec<DocumentUnit>> {
        let Some(kind) = DocumentKind::from_path(path) else {
            return Ok(Vec::new());
        };
        let text = match kind {
            DocumentKind::Pdf => return self.load_pdf_pages(path).await,
            DocumentKind::Text => extract::decode_text(&read_file(path).await?)
                .trim()
                .to_string(),
            DocumentKind::Markdown => {
                extract::markdown_to_text(&extract::decode_text(&read_file(path).await?))
            }
            DocumentKind::Docx => extract::docx_text(&read_file(path).await?)?,
        };

        if text.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![DocumentUnit::file(path, text)])
    }

    /// One unit per non-empty page, numbered from 1.
    pub async fn load_pdf_pages(&self, path: &Path) -> Result<Vec<DocumentUnit>> {
        let bytes = read_file(path).await?;
        let pdf_hash = ocr::content_hash(&bytes);
        let pages = tokio::task::spawn_blocking(move || extract::pdf_page_texts(&bytes))
            .await
            .context("PDF extraction task panicked")??;

        let mut units = Vec::new();
        for (idx, raw) in pages.iter().enumerate() {
            let page_number = idx as u32 + 1;
            let extracted = raw.trim();

            let (text, mode) = if extracted.chars().count() >= self.min_chars {
                (extracted.to_string(), ExtractionMode::Text)
            } else {
                let text = self
                    .ocr
                    .page_text(path, &pdf_hash, page_number)
                    .await
                    .with_context(|| format!("OCR failed for page {}", page_number))?;
                (text, ExtractionMode::Ocr)
            };

            if text.is_empty() {
                debug!(path = %path.display(), page = page_number, "empty page dropped");
                continue;
            }
            units.push(DocumentUnit::page(path, page_number, text, mode));
        }
        Ok(units)
    }
}

async fn read_file(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::{OcrEngine, OcrError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct FixedOcr {
        text: String,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl OcrEngine for FixedOcr {
        async fn recognize_page(&self, _: &Path, _: u32, _: u32, _: &str) -> Result<String, OcrError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.text.clone())
        }
    }

    fn loader_with(tmp: &TempDir, ocr_text: &str, min_chars: usize) -> (Loader, Arc<FixedOcr>) {
        let engine = Arc::new(FixedOcr {
            text: ocr_text.to_string(),
            calls: AtomicUsize::new(0),
        });
        let ocr = CachedOcr::new(engine.clone(), OcrCache::new(tmp.path().join("cache")), 250, "eng");
        let loader = Loader::new(ocr, min_chars, &["**/.git/**".to_string()]).unwrap();
        (loader, engine)
    }

    /// Single-page PDF whose content stream shows `phrase`.
    fn pdf_with_phrase(phrase: &str) -> Vec<u8> {
        let content = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET", phrase);
        let mut out = Vec::new();
        out.extend_from_slice(b"%PDF-1.4\n");
        let o1 = out.len();
        out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
        let o2 = out.len();
        out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
        let o3 = out.len();
        out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
        let o4 = out.len();
        out.extend_from_slice(
            format!(
                "4 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
                content.len(),
                content
            )
            .as_bytes(),
        );
        let o5 = out.len();
        out.extend_from_slice(
            b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
        );
        let xref_start = out.len();
        out.extend_from_slice(b"xref\n0 6\n");
        out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
        for offset in [o1, o2, o3, o4, o5] {
            out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
        out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
        out.extend_from_slice(b"%%EOF\n");
        out
    }

    #[tokio::test]
    async fn text_files_become_single_units() {
        let tmp = TempDir::new().unwrap();
        let (loader, _) = loader_with(&tmp, "", 80);
        let path = tmp.path().join("notes.txt");
        std::fs::write(&path, "  hello world \n").unwrap();

        let units = loader.load_file(&path).await.unwrap();
        assert_eq!(units, vec![DocumentUnit::file(&path, "hello world")]);
    }

    #[tokio::test]
    async fn whitespace_file_yields_nothing() {
        let tmp = TempDir::new().unwrap();
        let (loader, _) = loader_with(&tmp, "", 80);
        let path = tmp.path().join("blank.log");
        std::fs::write(&path, " \n\t ").unwrap();
        assert!(loader.load_file(&path).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn directory_walk_skips_unsupported_and_captures_errors() {
        let tmp = TempDir::new().unwrap();
        let (loader, _) = loader_with(&tmp, "", 80);
        let docs = tmp.path().join("docs");
        std::fs::create_dir_all(docs.join("OPS-TEAM")).unwrap();
        std::fs::create_dir_all(docs.join(".git")).unwrap();
        std::fs::write(docs.join("readme.md"), "# Hello\n\nWorld").unwrap();
        std::fs::write(docs.join("OPS-TEAM/runbook.txt"), "restart the service").unwrap();
        std::fs::write(docs.join("image.png"), [0u8, 1, 2]).unwrap();
        std::fs::write(docs.join("broken.docx"), b"not a zip").unwrap();
        std::fs::write(docs.join(".git/HEAD.txt"), "ref").unwrap();

        let units = loader.load_path(&docs).await;
        let ok: Vec<_> = units.iter().filter(|u| u.error.is_none()).collect();
        let failed: Vec<_> = units.iter().filter(|u| u.error.is_some()).collect();

        assert_eq!(ok.len(), 2);
        assert_eq!(ok[0].path, docs.join("OPS-TEAM/runbook.txt"));
        assert_eq!(ok[1].text, "Hello\nWorld");
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].path, docs.join("broken.docx"));
        assert!(failed[0].text.is_empty());
    }

    #[tokio::test]
    async fn missing_single_file_is_captured() {
        let tmp = TempDir::new().unwrap();
        let (loader, _) = loader_with(&tmp, "", 80);
        let units = loader.load_path(&tmp.path().join("nope.txt")).await;
        assert_eq!(units.len(), 1);
        assert!(units[0].error.is_some());
    }

    #[tokio::test]
    async fn pdf_page_with_enough_text_skips_ocr() {
        let tmp = TempDir::new().unwrap();
        let (loader, engine) = loader_with(&tmp, "ocr text", 5);
        let path = tmp.path().join("report.pdf");
        std::fs::write(&path, pdf_with_phrase("quarterly revenue summary")).unwrap();

        let units = loader.load_pdf_pages(&path).await.unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].page_number, Some(1));
        assert_eq!(units[0].mode, Some(ExtractionMode::Text));
        assert!(units[0].text.contains("quarterly revenue summary"));
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn short_pdf_page_falls_back_to_ocr_once() {
        let tmp = TempDir::new().unwrap();
        let (loader, engine) = loader_with(&tmp, "  scanned invoice  ", 80);
        let path = tmp.path().join("scan.pdf");
        std::fs::write(&path, pdf_with_phrase("x")).unwrap();

        let first = loader.load_pdf_pages(&path).await.unwrap();
        let second = loader.load_pdf_pages(&path).await.unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(first[0].mode, Some(ExtractionMode::Ocr));
        assert_eq!(first[0].text, "scanned invoice");
        assert_eq!(first, second);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_ocr_page_is_dropped() {
        let tmp = TempDir::new().unwrap();
        let (loader, _) = loader_with(&tmp, "   ", 80);
        let path = tmp.path().join("blank.pdf");
        std::fs::write(&path, pdf_with_phrase("x")).unwrap();
        assert!(loader.load_pdf_pages(&path).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_pdf_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let (loader, _) = loader_with(&tmp, "", 80);
        let path = tmp.path().join("bad.pdf");
        std::fs::write(&path, b"%PDF-garbage").unwrap();
        assert!(loader.load_pdf_pages(&path).await.is_err());
        let units = loader.load_path(&path).await;
        assert!(units[0].error.is_some());
    }
}
