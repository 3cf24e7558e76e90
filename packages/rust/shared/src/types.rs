//! Core domain types for the Grounder retrieval pipeline.
//!
//! All of these are scoped to a single pipeline invocation; nothing here is
//! cached or shared across requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RequestId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one pipeline invocation (time-sortable).
///
/// Only used for log correlation; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub Uuid);

impl RequestId {
    /// Generate a new time-sortable request identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Page
// ---------------------------------------------------------------------------

/// A successfully fetched page with its extracted text.
///
/// `raw` keeps the unmodified markup so product extraction can re-scan it;
/// the page is dropped once chunking and product extraction are done.
#[derive(Debug, Clone)]
pub struct Page {
    /// Final URL the page was fetched from.
    pub url: Url,
    /// First `<title>` inner text, or empty if the page has none.
    pub title: String,
    /// Tag-stripped, whitespace-collapsed body text.
    pub text: String,
    /// Raw markup as fetched.
    pub raw: String,
    /// When the fetch completed.
    pub fetched_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Chunk / ScoredChunk
// ---------------------------------------------------------------------------

/// A bounded contiguous slice of one page's extracted text, the minimum
/// retrievable unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// URL of the page this chunk was cut from.
    pub source_url: Url,
    /// Title of the source page.
    pub title: String,
    /// Chunk text, at most `chunk_size` characters.
    pub text: String,
}

/// A chunk with its cosine similarity against the query.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Cosine similarity in roughly [-1, 1].
    pub score: f32,
}

// ---------------------------------------------------------------------------
// Product
// ---------------------------------------------------------------------------

/// A product candidate scraped from an anchor element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Anchor label (visible text, tags stripped).
    pub name: String,
    /// Absolute, same-origin URL the anchor points at.
    pub url: Url,
}

// ---------------------------------------------------------------------------
// ContextPayload / GroundedAnswer
// ---------------------------------------------------------------------------

/// Everything prompt assembly needs: the top-ranked chunks and any products
/// found. Built and consumed within one request.
#[derive(Debug, Clone, Default)]
pub struct ContextPayload {
    /// At most `top_k` chunks, sorted by descending score.
    pub top_chunks: Vec<ScoredChunk>,
    /// Deduplicated, capped product list (empty unless the query asked).
    pub products: Vec<Product>,
}

impl ContextPayload {
    /// True when no context could be retrieved at all.
    pub fn is_empty(&self) -> bool {
        self.top_chunks.is_empty() && self.products.is_empty()
    }
}

/// The pipeline's public result: a generated answer plus the source URLs
/// it was grounded on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundedAnswer {
    /// Generated answer text.
    pub answer: String,
    /// Distinct source URLs in rank order, at most 3.
    pub citations: Vec<String>,
}
