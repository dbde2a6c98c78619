//! Core data models for the ingest and query paths.
//!
//! A [`DocumentUnit`] is produced by a loader, split into [`Chunk`]s,
//! persisted as [`IndexedPoint`]s, and surfaced again as [`ScoredHit`]s.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::identity::PointId;

/// How the text of a unit was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    /// Embedded text layer (PDF text operators).
    Text,
    /// Optical character recognition of a rendered page image.
    Ocr,
}

impl ExtractionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMode::Text => "text",
            ExtractionMode::Ocr => "ocr",
        }
    }
}

/// One ingestible item: a whole text-like file, or a single PDF page.
///
/// Units carrying an `error` have empty `text` and are reported and
/// skipped by the ingestion job rather than aborting it.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentUnit {
    pub path: PathBuf,
    pub text: String,
    /// 1-based page number; `None` for non-PDF sources.
    pub page_number: Option<u32>,
    /// Set for PDF pages only.
    pub mode: Option<ExtractionMode>,
    pub error: Option<String>,
}

impl DocumentUnit {
    /// A whole-file unit (text, markdown, docx).
    pub fn file(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
            page_number: None,
            mode: None,
            error: None,
        }
    }

    /// A single PDF page.
    pub fn page(
        path: impl Into<PathBuf>,
        page_number: u32,
        text: impl Into<String>,
        mode: ExtractionMode,
    ) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
            page_number: Some(page_number),
            mode: Some(mode),
            error: None,
        }
    }

    /// A unit recording a load failure.
    pub fn failed(path: impl Into<PathBuf>, error: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: String::new(),
            page_number: None,
            mode: None,
            error: Some(error.into()),
        }
    }

    /// Source string used in payloads and chunk identity.
    pub fn source(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}

/// Metadata attached to every chunk of a unit at ingest time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitMetadata {
    /// Access group; `None` means public.
    pub doc_group: Option<String>,
    pub mode: Option<ExtractionMode>,
}

/// A bounded span of a unit's text. This is also the stored point payload.
///
/// `doc_group` is always serialized (as `null` when public) so that index
/// filters on "field is absent or null" match consistently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub source: String,
    #[serde(default)]
    pub page_number: Option<u32>,
    pub chunk_index: usize,
    pub text: String,
    #[serde(default)]
    pub doc_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ExtractionMode>,
}

/// The persisted unit in the vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedPoint {
    pub id: PointId,
    /// L2-normalized embedding.
    pub vector: Vec<f32>,
    pub payload: Chunk,
}

/// A search result, ordered by descending `score`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredHit {
    pub score: f32,
    pub source: String,
    pub page_number: Option<u32>,
    pub chunk_index: usize,
    pub text: String,
    pub doc_group: Option<String>,
}

impl ScoredHit {
    pub fn from_payload(score: f32, payload: Chunk) -> Self {
        Self {
            score,
            source: payload.source,
            page_number: payload.page_number,
            chunk_index: payload.chunk_index,
            text: payload.text,
            doc_group: payload.doc_group,
        }
    }
}
