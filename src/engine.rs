//! Wiring: build a [`RetrievalEngine`] from configuration.

use std::sync::Arc;

use anyhow::{Context, Result};

use docgate_core::engine::RetrievalEngine;

use crate::config::Config;
use crate::embedding::create_provider;
use crate::qdrant::QdrantIndex;

/// Engine backed by the configured embedding provider and Qdrant.
pub fn build_engine(config: &Config) -> Result<RetrievalEngine> {
    let embedder = create_provider(&config.embedding)?;
    let index = QdrantIndex::from_config(&config.index)?;
    Ok(RetrievalEngine::new(
        embedder,
        Arc::new(index),
        config.engine_settings(),
    ))
}

/// [`build_engine`] followed by the one-time collection bootstrap.
pub async fn connect(config: &Config) -> Result<RetrievalEngine> {
    let engine = build_engine(config)?;
    engine.bootstrap().await.with_context(|| {
        format!(
            "Failed to bootstrap collection '{}' at {}",
            config.index.collection, config.index.url
        )
    })?;
    Ok(engine)
}
