//! `docgate search`: run a retrieval query from the command line.

use anyhow::Result;

use docgate_core::models::ScoredHit;

use crate::config::Config;
use crate::engine;

const EXCERPT_CHARS: usize = 200;

pub async fn run_search(
    config: &Config,
    query: &str,
    top_k: Option<usize>,
    groups: &[String],
) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let engine = engine::connect(config).await?;
    let allowed = if groups.is_empty() { None } else { Some(groups) };
    let hits = engine.search(query, top_k, allowed).await?;

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        print!("{}", format_hit(i + 1, hit));
    }
    Ok(())
}

fn format_hit(rank: usize, hit: &ScoredHit) -> String {
    let mut out = format!("{}. [{:.4}] {}\n", rank, hit.score, hit.source);
    if let Some(page) = hit.page_number {
        out.push_str(&format!("    page: {}\n", page));
    }
    out.push_str(&format!("    chunk: {}\n", hit.chunk_index));
    out.push_str(&format!(
        "    group: {}\n",
        hit.doc_group.as_deref().unwrap_or("(public)")
    ));
    out.push_str(&format!("    excerpt: \"{}\"\n\n", excerpt(&hit.text)));
    out
}

fn excerpt(text: &str) -> String {
    let flat = text.replace('\n', " ");
    let trimmed = flat.trim();
    match trimmed.char_indices().nth(EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}
