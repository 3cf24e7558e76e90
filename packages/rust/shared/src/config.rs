//! Application configuration for Grounder.
//!
//! User config lives at `~/.grounder/grounder.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GrounderError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "grounder.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".grounder";

// ---------------------------------------------------------------------------
// Config structs (matching grounder.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// The site being answered about.
    #[serde(default)]
    pub site: SiteConfig,

    /// Retrieval caps and sizes.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// OpenAI-compatible API settings.
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Keyword heuristics (domain terms live here, not in code).
    #[serde(default)]
    pub intents: IntentConfig,

    /// Prompt framing.
    #[serde(default)]
    pub prompt: PromptConfig,
}

/// `[site]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Site origin, e.g. `https://www.example.com`.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Paths to fetch as retrieval candidates, in priority order.
    #[serde(default = "default_candidate_paths")]
    pub candidate_paths: Vec<String>,

    /// URL substring pattern marking the products page.
    #[serde(default = "default_products_path_hint")]
    pub products_path_hint: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            candidate_paths: default_candidate_paths(),
            products_path_hint: default_products_path_hint(),
        }
    }
}

fn default_origin() -> String {
    "https://www.example.com".into()
}
fn default_candidate_paths() -> Vec<String> {
    vec![
        "/".into(),
        "/produkte/".into(),
        "/loesungen/".into(),
        "/leistungen/".into(),
        "/preise/".into(),
        "/faq/".into(),
    ]
}
fn default_products_path_hint() -> String {
    "produkte|portfolio|product".into()
}

/// `[retrieval]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Maximum candidate pages fetched per request.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Global chunk cap across all pages per request.
    #[serde(default = "default_max_chunks")]
    pub max_chunks: usize,

    /// Chunk size in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between adjacent chunks, in characters. Must be < chunk_size.
    #[serde(default = "default_overlap")]
    pub overlap: usize,

    /// How many ranked chunks go into the prompt.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Per-chunk excerpt cap in the prompt, in characters.
    #[serde(default = "default_excerpt_limit")]
    pub excerpt_limit: usize,

    /// Maximum products returned per request.
    #[serde(default = "default_max_products")]
    pub max_products: usize,

    /// Maximum anchors examined per page during product extraction.
    #[serde(default = "default_max_anchors")]
    pub max_anchors: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            max_chunks: default_max_chunks(),
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
            top_k: default_top_k(),
            excerpt_limit: default_excerpt_limit(),
            max_products: default_max_products(),
            max_anchors: default_max_anchors(),
        }
    }
}

fn default_max_pages() -> usize {
    5
}
fn default_max_chunks() -> usize {
    10
}
fn default_chunk_size() -> usize {
    1200
}
fn default_overlap() -> usize {
    120
}
fn default_top_k() -> usize {
    5
}
fn default_excerpt_limit() -> usize {
    1200
}
fn default_max_products() -> usize {
    10
}
fn default_max_anchors() -> usize {
    200
}

/// `[openai]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// API base URL (OpenAI-compatible).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Embedding model id.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Chat model id.
    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    /// Completion token cap.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            embedding_model: default_embedding_model(),
            chat_model: default_chat_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn default_chat_model() -> String {
    "gpt-4o-mini".into()
}
fn default_max_tokens() -> u32 {
    450
}
fn default_temperature() -> f32 {
    0.2
}

/// `[intents]` section: replaceable keyword sets, matched case-insensitively
/// as substrings of the query / anchor label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentConfig {
    /// Query terms that signal product intent.
    #[serde(default = "default_product_query_terms")]
    pub product_query_terms: Vec<String>,

    /// Anchor-label terms that mark a link as product-like.
    #[serde(default = "default_product_link_terms")]
    pub product_link_terms: Vec<String>,

    /// Anchor labels with at most this many words count as name-like.
    #[serde(default = "default_max_link_words")]
    pub max_link_words: usize,
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            product_query_terms: default_product_query_terms(),
            product_link_terms: default_product_link_terms(),
            max_link_words: default_max_link_words(),
        }
    }
}

fn default_product_query_terms() -> Vec<String> {
    ["produkt", "portfolio", "angebot", "empfehl", "welches", "was passt", "kaufen", "vergleich"]
        .map(String::from)
        .to_vec()
}
fn default_product_link_terms() -> Vec<String> {
    ["produkt", "lösung", "loesung", "service", "paket", "plan", "module", "sdk", "api"]
        .map(String::from)
        .to_vec()
}
fn default_max_link_words() -> usize {
    6
}

/// `[prompt]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Leading persona line of the system prompt.
    #[serde(default = "default_persona")]
    pub persona: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            persona: default_persona(),
        }
    }
}

fn default_persona() -> String {
    "You are the site's support assistant. Answer concisely and factually.".into()
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Fail-fast validation of retrieval parameters and the site origin.
    ///
    /// Called once at pipeline construction so misconfiguration surfaces as a
    /// config error at startup, never mid-request. In particular a
    /// non-positive chunk stride (`overlap >= chunk_size`) would stall the
    /// chunk cursor.
    pub fn validate(&self) -> Result<()> {
        let r = &self.retrieval;
        if r.chunk_size == 0 {
            return Err(GrounderError::config("retrieval.chunk_size must be > 0"));
        }
        if r.overlap >= r.chunk_size {
            return Err(GrounderError::config(format!(
                "retrieval.overlap ({}) must be smaller than retrieval.chunk_size ({})",
                r.overlap, r.chunk_size
            )));
        }
        if r.max_pages == 0 {
            return Err(GrounderError::config("retrieval.max_pages must be > 0"));
        }
        if r.top_k == 0 {
            return Err(GrounderError::config("retrieval.top_k must be > 0"));
        }
        if self.site.candidate_paths.is_empty() {
            return Err(GrounderError::config(
                "site.candidate_paths must list at least one path",
            ));
        }
        url::Url::parse(&self.site.origin).map_err(|e| {
            GrounderError::config(format!("site.origin '{}' is not a valid URL: {e}", self.site.origin))
        })?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.grounder/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| GrounderError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.grounder/grounder.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| GrounderError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| GrounderError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| GrounderError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| GrounderError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| GrounderError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    let var_name = &config.openai.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(()),
        _ => Err(GrounderError::config(format!(
            "API key not found. Set the {var_name} environment variable."
        ))),
    }
}
