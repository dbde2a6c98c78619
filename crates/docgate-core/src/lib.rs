//! # docgate core
//!
//! Pure retrieval logic for docgate: data models, the sliding-window
//! chunker, stable chunk identity, access-group classification, the
//! embedding and vector-index traits, and the [`engine::RetrievalEngine`]
//! that ties them together.
//!
//! This crate performs no filesystem or network I/O of its own. Concrete
//! embedding providers, the Qdrant client, and document loaders live in
//! the `docgate` app crate and are injected into the engine.

pub mod access;
pub mod chunk;
pub mod embedding;
pub mod engine;
pub mod identity;
pub mod index;
pub mod models;
