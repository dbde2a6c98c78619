//! TOML configuration parsing, environment overrides, and validation.
//!
//! Configuration is read from `--config` (default `./config/docgate.toml`).
//! A handful of deployment-oriented environment variables override the file
//! after parsing so container setups can keep one config file per image.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use docgate_core::engine::EngineSettings;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub index: IndexConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

/// Vector store (Qdrant) connection.
#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    pub url: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_collection() -> String {
    "internal_docs".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for Ollama (default `http://localhost:11434`).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    900
}
fn default_chunk_overlap() -> usize {
    150
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    6
}

#[derive(Debug, Deserialize, Clone)]
pub struct OcrConfig {
    /// Tesseract language set, e.g. `eng` or `eng+vie`.
    #[serde(default = "default_ocr_lang")]
    pub lang: String,
    #[serde(default = "default_ocr_dpi")]
    pub dpi: u32,
    /// Pages with fewer extracted characters than this are OCR'd.
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,
    #[serde(default = "default_pdftoppm")]
    pub pdftoppm: String,
    #[serde(default = "default_tesseract")]
    pub tesseract: String,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            lang: default_ocr_lang(),
            dpi: default_ocr_dpi(),
            min_chars: default_min_chars(),
            pdftoppm: default_pdftoppm(),
            tesseract: default_tesseract(),
        }
    }
}

fn default_ocr_lang() -> String {
    "eng".to_string()
}
fn default_ocr_dpi() -> u32 {
    250
}
fn default_min_chars() -> usize {
    80
}
fn default_pdftoppm() -> String {
    "pdftoppm".to_string()
}
fn default_tesseract() -> String {
    "tesseract".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    #[serde(default = "default_docs_root")]
    pub docs_root: PathBuf,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            docs_root: default_docs_root(),
            cache_dir: default_cache_dir(),
        }
    }
}

fn default_docs_root() -> PathBuf {
    PathBuf::from("/app/docs")
}
fn default_cache_dir() -> PathBuf {
    PathBuf::from("/app/.cache")
}

impl PathsConfig {
    /// Directory holding cached OCR page text.
    pub fn ocr_cache_dir(&self) -> PathBuf {
        self.cache_dir.join("ocr")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Paths (relative to the walked directory) to skip, as globs.
    #[serde(default = "default_exclude_globs")]
    pub exclude_globs: Vec<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            exclude_globs: default_exclude_globs(),
        }
    }
}

fn default_exclude_globs() -> Vec<String> {
    vec!["**/.git/**".to_string(), "**/.cache/**".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Shared bearer key. Unset means no authentication.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Header carrying the caller's comma-separated groups, set by a trusted proxy.
    #[serde(default = "default_groups_header")]
    pub groups_header: String,
    /// Group required for `/admin/*` when set.
    #[serde(default)]
    pub admin_group: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            api_key: None,
            groups_header: default_groups_header(),
            admin_group: None,
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}
fn default_groups_header() -> String {
    "x-auth-groups".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// OpenAI-compatible base URL, e.g. `http://vllm:8000/v1`.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: String,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            model: String::new(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_timeout_secs() -> u64 {
    120
}

impl Config {
    /// Retrieval engine settings derived from this config.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            collection: self.index.collection.clone(),
            chunk_size: self.chunking.chunk_size,
            chunk_overlap: self.chunking.chunk_overlap,
            top_k: self.retrieval.top_k,
        }
    }

    /// Apply environment overrides using `lookup` (normally `std::env::var`).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("QDRANT_URL") {
            self.index.url = v;
        }
        if let Some(v) = lookup("QDRANT_COLLECTION") {
            self.index.collection = v;
        }
        if let Some(v) = lookup("EMBED_MODEL") {
            self.embedding.model = Some(v);
        }
        if let Some(v) = lookup("CHUNK_SIZE") {
            self.chunking.chunk_size = parse_env("CHUNK_SIZE", &v)?;
        }
        if let Some(v) = lookup("CHUNK_OVERLAP") {
            self.chunking.chunk_overlap = parse_env("CHUNK_OVERLAP", &v)?;
        }
        if let Some(v) = lookup("TOP_K") {
            self.retrieval.top_k = parse_env("TOP_K", &v)?;
        }
        if let Some(v) = lookup("OCR_LANG") {
            self.ocr.lang = v;
        }
        if let Some(v) = lookup("OCR_DPI") {
            self.ocr.dpi = parse_env("OCR_DPI", &v)?;
        }
        if let Some(v) = lookup("PDF_TEXT_MIN_CHARS") {
            self.ocr.min_chars = parse_env("PDF_TEXT_MIN_CHARS", &v)?;
        }
        if let Some(v) = lookup("CACHE_DIR") {
            self.paths.cache_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("DOCS_ROOT") {
            self.paths.docs_root = PathBuf::from(v);
        }
        if let Some(v) = lookup("LLM_BASE_URL") {
            self.llm.base_url = Some(v);
        }
        if let Some(v) = lookup("LLM_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = lookup("API_KEY") {
            self.server.api_key = Some(v).filter(|k| !k.is_empty());
        }
        if let Some(v) = lookup("ADMIN_GROUP") {
            self.server.admin_group = Some(v).filter(|g| !g.is_empty());
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.index.url.trim().is_empty() {
            anyhow::bail!("index.url must not be empty");
        }

        if self.chunking.chunk_size == 0 {
            anyhow::bail!("chunking.chunk_size must be > 0");
        }

        if self.retrieval.top_k < 1 {
            anyhow::bail!("retrieval.top_k must be >= 1");
        }

        if self.ocr.dpi == 0 {
            anyhow::bail!("ocr.dpi must be > 0");
        }

        match self.embedding.provider.as_str() {
            "disabled" | "local" => {}
            "openai" | "ollama" => {
                if self.embedding.dims.is_none() || self.embedding.dims == Some(0) {
                    anyhow::bail!(
                        "embedding.dims must be > 0 when provider is '{}'",
                        self.embedding.provider
                    );
                }
                if self.embedding.model.is_none() {
                    anyhow::bail!(
                        "embedding.model must be specified when provider is '{}'",
                        self.embedding.provider
                    );
                }
            }
            other => anyhow::bail!(
                "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
                other
            ),
        }

        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("invalid {}='{}': {}", name, value, e))
}

/// Parse TOML text without environment overrides.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

/// Read, override from the process environment, and validate.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.apply_overrides(|name| std::env::var(name).ok())?;
    config.validate()?;
    Ok(config)
}
