//! OCR fallback for image-only PDF pages, with an on-disk result cache.
//!
//! Pages are rendered with poppler's `pdftoppm` and recognized with the
//! `tesseract` CLI. Results are cached as plain UTF-8 files keyed by the
//! SHA-1 of the PDF bytes, the page number, the DPI and the language set,
//! so moving or renaming a PDF keeps its cache while any byte change
//! invalidates it.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use sha1::{Digest, Sha1};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },
    #[error("OCR I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Converts one page of a PDF to text.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// `page` is 1-based.
    async fn recognize_page(
        &self,
        pdf: &Path,
        page: u32,
        dpi: u32,
        lang: &str,
    ) -> Result<String, OcrError>;
}

/// `pdftoppm | tesseract` pipeline.
pub struct TesseractOcr {
    pdftoppm: String,
    tesseract: String,
}

impl TesseractOcr {
    pub fn new(pdftoppm: impl Into<String>, tesseract: impl Into<String>) -> Self {
        Self {
            pdftoppm: pdftoppm.into(),
            tesseract: tesseract.into(),
        }
    }

    async fn render_png(&self, pdf: &Path, page: u32, dpi: u32) -> Result<Vec<u8>, OcrError> {
        let page_arg = page.to_string();
        let output = Command::new(&self.pdftoppm)
            .args(["-f", &page_arg, "-l", &page_arg])
            .args(["-r", &dpi.to_string()])
            .args(["-png", "-singlefile"])
            .arg(pdf)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| OcrError::Spawn {
                tool: self.pdftoppm.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(OcrError::ToolFailed {
                tool: self.pdftoppm.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }

    async fn recognize_png(&self, png: Vec<u8>, lang: &str) -> Result<String, OcrError> {
        let mut child = Command::new(&self.tesseract)
            .args(["stdin", "stdout", "-l", lang])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| OcrError::Spawn {
                tool: self.tesseract.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            let writer = tokio::spawn(async move {
                let result = stdin.write_all(&png).await;
                drop(stdin);
                result
            });
            let output = child.wait_with_output().await?;
            // A failed write usually means tesseract exited early; its status says why.
            let write_result = writer.await.map_err(std::io::Error::other)?;
            if !output.status.success() {
                return Err(OcrError::ToolFailed {
                    tool: self.tesseract.clone(),
                    status: output.status.to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                });
            }
            write_result?;
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        Err(OcrError::Io(std::io::Error::other("tesseract stdin unavailable")))
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize_page(
        &self,
        pdf: &Path,
        page: u32,
        dpi: u32,
        lang: &str,
    ) -> Result<String, OcrError> {
        let png = self.render_png(pdf, page, dpi).await?;
        if png.is_empty() {
            return Ok(String::new());
        }
        self.recognize_png(png, lang).await
    }
}

/// Lowercase hex SHA-1 of the PDF's bytes.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha1::digest(bytes))
}

/// Directory of cached page text, one file per (content hash, page, dpi, lang).
#[derive(Debug, Clone)]
pub struct OcrCache {
    dir: PathBuf,
}

impl OcrCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cache file name: `{sha1}_p{page}_dpi{dpi}_{lang}.txt` with `+` in `lang` replaced by `-`.
    pub fn key(pdf_hash: &str, page: u32, dpi: u32, lang: &str) -> String {
        format!(
            "{}_p{}_dpi{}_{}.txt",
            pdf_hash,
            page,
            dpi,
            lang.replace('+', "-")
        )
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, OcrError> {
        match tokio::fs::read(self.dir.join(key)).await {
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).trim().to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Whole-file write via a temp file and rename, so readers never see partial text.
    pub async fn put(&self, key: &str, text: &str) -> Result<(), OcrError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let tmp = self
            .dir
            .join(format!(".{}.{}.tmp", key, uuid::Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, text.as_bytes()).await?;
        tokio::fs::rename(&tmp, self.dir.join(key)).await?;
        Ok(())
    }
}

/// OCR engine fronted by [`OcrCache`].
pub struct CachedOcr {
    engine: Arc<dyn OcrEngine>,
    cache: OcrCache,
    dpi: u32,
    lang: String,
}

impl CachedOcr {
    pub fn new(engine: Arc<dyn OcrEngine>, cache: OcrCache, dpi: u32, lang: impl Into<String>) -> Self {
        Self {
            engine,
            cache,
            dpi,
            lang: lang.into(),
        }
    }

    /// Trimmed OCR text for `page` (1-based), read from the cache when present.
    pub async fn page_text(&self, pdf: &Path, pdf_hash: &str, page: u32) -> Result<String, OcrError> {
        let key = OcrCache::key(pdf_hash, page, self.dpi, &self.lang);
        if let Some(text) = self.cache.get(&key).await? {
            debug!(pdf = %pdf.display(), page, key = %key, "OCR cache hit");
            return Ok(text);
        }

        debug!(pdf = %pdf.display(), page, dpi = self.dpi, lang = %self.lang, "OCR cache miss");
        let text = self
            .engine
            .recognize_page(pdf, page, self.dpi, &self.lang)
            .await?
            .trim()
            .to_string();
        self.cache.put(&key, &text).await?;
        Ok(text)
    }
}
