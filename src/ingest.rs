//! Batch ingestion job.
//!
//! Loads a file or directory tree, infers each unit's access group from its
//! location under the document root, and pushes every unit through
//! [`RetrievalEngine::upsert_chunked`]. Units that failed to load are logged
//! and counted as skipped; an embedding or index failure aborts the run.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use docgate_core::access::{infer_group, normalize_path};
use docgate_core::chunk::chunk_text;
use docgate_core::engine::{EngineSettings, RetrievalEngine};
use docgate_core::models::{DocumentUnit, UnitMetadata};

use crate::config::Config;
use crate::engine;
use crate::loader::Loader;

/// Aggregate counts for one ingestion run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Units that were chunked and upserted.
    pub units: usize,
    pub chunks: usize,
    /// Units that failed to load.
    pub skipped: usize,
}

/// Resolve the ingest target: default to `docs_root`, and join relative
/// targets onto it. The result has no `.` or `..` segments.
pub fn resolve_target(docs_root: &Path, target: Option<&Path>) -> PathBuf {
    let joined = match target {
        None => docs_root.to_path_buf(),
        Some(t) if t.is_absolute() => t.to_path_buf(),
        Some(t) => docs_root.join(t),
    };
    normalize_path(&joined)
}

fn metadata_for(unit: &DocumentUnit, docs_root: &Path) -> UnitMetadata {
    UnitMetadata {
        doc_group: infer_group(&unit.path, docs_root),
        mode: unit.mode,
    }
}

/// Upsert every loaded unit. Failed units are reported and skipped.
pub async fn ingest_units(
    engine: &RetrievalEngine,
    docs_root: &Path,
    units: Vec<DocumentUnit>,
) -> Result<IngestReport> {
    let mut report = IngestReport::default();

    for unit in units {
        if let Some(err) = &unit.error {
            warn!(path = %unit.path.display(), error = %err, "[SKIP]");
            report.skipped += 1;
            continue;
        }

        let meta = metadata_for(&unit, docs_root);
        let n = engine
            .upsert_chunked(&unit.source(), &unit.text, unit.page_number, &meta)
            .await?;
        report.units += 1;
        report.chunks += n;
        info!(
            path = %unit.path.display(),
            page = unit.page_number,
            group = meta.doc_group.as_deref(),
            chunks = n,
            "[INGEST]"
        );
    }

    Ok(report)
}

/// Chunk counts without embedding or writing.
pub fn estimate_units(settings: &EngineSettings, units: &[DocumentUnit]) -> IngestReport {
    let mut report = IngestReport::default();
    for unit in units {
        if unit.error.is_some() {
            report.skipped += 1;
            continue;
        }
        report.units += 1;
        report.chunks += chunk_text(&unit.text, settings.chunk_size, settings.chunk_overlap).len();
    }
    report
}

/// Load `target` and ingest it.
pub async fn ingest_path(
    engine: &RetrievalEngine,
    loader: &Loader,
    docs_root: &Path,
    target: &Path,
) -> Result<IngestReport> {
    let units = loader.load_path(target).await;
    ingest_units(engine, docs_root, units).await
}

/// CLI entry point for `docgate ingest`.
pub async fn run_ingest(config: &Config, target: Option<&Path>, dry_run: bool) -> Result<()> {
    let target = resolve_target(&config.paths.docs_root, target);
    let loader = Loader::from_config(config)?;

    if dry_run {
        let units = loader.load_path(&target).await;
        let report = estimate_units(&config.engine_settings(), &units);
        println!("ingest {} (dry-run)", target.display());
        println!("  units found: {}", report.units);
        println!("  estimated chunks: {}", report.chunks);
        println!("  skipped: {}", report.skipped);
        return Ok(());
    }

    let engine = engine::connect(config).await?;
    let report = ingest_path(&engine, &loader, &config.paths.docs_root, &target).await?;
    println!(
        "Done. ingested_units={}, chunks={}, skipped={}, target={}",
        report.units,
        report.chunks,
        report.skipped,
        target.display()
    );
    Ok(())
}
