//! # docgate
//!
//! Group-aware document retrieval gateway. Internal documents (PDF, DOCX,
//! Markdown, plain text) are loaded, with OCR for scanned PDF pages, split
//! into overlapping chunks, embedded, and stored in Qdrant with an access
//! group taken from the folder they live in. Searches only see public
//! documents and documents in the caller's groups.
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────────────┐   ┌─────────┐
//! │  Loader  │──▶│ Chunk + Group │──▶│ RetrievalEngine  │──▶│ Qdrant  │
//! │ +OCR     │   │  (core)       │   │ embed / upsert   │   │         │
//! └──────────┘   └──────────────┘   └────────┬─────────┘   └─────────┘
//!                                            │
//!                               ┌────────────┴──────────┐
//!                               ▼                       ▼
//!                          ┌─────────┐            ┌───────────┐
//!                          │   CLI   │            │ HTTP / LLM│
//!                          └─────────┘            └───────────┘
//! ```
//!
//! Pure retrieval logic lives in the `docgate-core` crate; this crate adds
//! I/O: file extraction, OCR, embedding providers, the Qdrant client, and
//! the CLI and HTTP surfaces.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overrides |
//! | [`extract`] | Text extraction per file type |
//! | [`ocr`] | `pdftoppm` + `tesseract` OCR with an on-disk cache |
//! | [`loader`] | Files and directory trees into document units |
//! | [`embedding`] | Embedding providers |
//! | [`qdrant`] | Qdrant REST vector index |
//! | [`engine`] | Engine wiring from config |
//! | [`ingest`] | Batch ingestion job |
//! | [`search`] | Search CLI |
//! | [`prompt`] | Grounded system prompt |
//! | [`server`] | HTTP gateway |

pub mod config;
pub mod embedding;
pub mod engine;
pub mod extract;
pub mod ingest;
pub mod loader;
pub mod ocr;
pub mod prompt;
pub mod qdrant;
pub mod search;
pub mod server;
