//! End-to-end answer pipeline: fetch → extract → chunk → embed → rank →
//! products → prompt → generate.
//!
//! The pipeline is stateless: every invocation fetches and embeds afresh,
//! and nothing outlives the request.

use std::future::Future;

use chrono::Utc;
use regex::Regex;
use tracing::{debug, info, instrument, warn};
use url::Url;

use grounder_extract::{ProductHeuristics, extract_products, extract_text};
use grounder_fetch::{FetchOutcome, RawPage, SiteFetcher};
use grounder_llm::OpenAiClient;
use grounder_retrieval::{ChunkParams, chunk_text, rank_chunks};
use grounder_shared::{
    AppConfig, Chunk, ContextPayload, GrounderError, GroundedAnswer, Page, RequestId, Result,
};

use crate::prompt;

// ---------------------------------------------------------------------------
// Collaborator seams
// ---------------------------------------------------------------------------

/// Fetches the candidate pages, isolating per-URL failures.
pub trait PageSource {
    /// Fetch every URL; the outcomes follow the input order.
    fn fetch_all(&self, urls: &[Url]) -> impl Future<Output = Vec<FetchOutcome>> + Send;
}

/// Maps an ordered list of texts to index-aligned embedding vectors in one
/// atomic batched call.
pub trait Embedder {
    fn embed(&self, inputs: &[String]) -> impl Future<Output = Result<Vec<Vec<f32>>>> + Send;
}

/// Produces the final answer from a system prompt and the user message.
pub trait TextGenerator {
    fn generate(&self, system: &str, user: &str) -> impl Future<Output = Result<String>> + Send;
}

impl PageSource for SiteFetcher {
    fn fetch_all(&self, urls: &[Url]) -> impl Future<Output = Vec<FetchOutcome>> + Send {
        SiteFetcher::fetch_all(self, urls)
    }
}

impl Embedder for OpenAiClient {
    fn embed(&self, inputs: &[String]) -> impl Future<Output = Result<Vec<Vec<f32>>>> + Send {
        OpenAiClient::embed(self, inputs)
    }
}

impl TextGenerator for OpenAiClient {
    fn generate(&self, system: &str, user: &str) -> impl Future<Output = Result<String>> + Send {
        OpenAiClient::generate(self, system, user)
    }
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called per successfully fetched page.
    fn page_fetched(&self, url: &str, current: usize, total: usize);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn page_fetched(&self, _url: &str, _current: usize, _total: usize) {}
}

// ---------------------------------------------------------------------------
// AnswerPipeline
// ---------------------------------------------------------------------------

/// The retrieval pipeline, generic over its collaborator seams.
#[derive(Debug)]
pub struct AnswerPipeline<F, E, G> {
    fetcher: F,
    embedder: E,
    generator: G,

    /// Candidate URLs in priority order, capped to `max_pages`.
    candidates: Vec<Url>,
    origin: Url,
    chunk_params: ChunkParams,
    top_k: usize,
    excerpt_limit: usize,
    max_products: usize,
    max_anchors: usize,
    persona: String,

    /// Query terms signalling product intent.
    product_intent_re: Regex,
    /// URL pattern preferring a products page for extraction.
    products_page_re: Regex,
    heuristics: ProductHeuristics,
}

impl<F, E, G> AnswerPipeline<F, E, G>
where
    F: PageSource,
    E: Embedder,
    G: TextGenerator,
{
    /// Build a pipeline from validated configuration.
    ///
    /// All validation happens here, once, so a bad config is a startup
    /// error and `build_answer` can assume well-formed parameters.
    pub fn new(config: &AppConfig, fetcher: F, embedder: E, generator: G) -> Result<Self> {
        config.validate()?;

        let origin = Url::parse(&config.site.origin)
            .map_err(|e| GrounderError::config(format!("site.origin: {e}")))?;

        let candidates = config
            .site
            .candidate_paths
            .iter()
            .take(config.retrieval.max_pages)
            .map(|path| {
                if path.starts_with("http") {
                    Url::parse(path)
                } else {
                    origin.join(path)
                }
                .map_err(|e| {
                    GrounderError::config(format!("candidate path '{path}' is invalid: {e}"))
                })
            })
            .collect::<Result<Vec<Url>>>()?;

        let chunk_params = ChunkParams {
            chunk_size: config.retrieval.chunk_size,
            overlap: config.retrieval.overlap,
            max_chunks: config.retrieval.max_chunks,
        };
        chunk_params.validate()?;

        let product_intent_re = keyword_regex(
            &config.intents.product_query_terms,
            "intents.product_query_terms",
        )?;
        let products_page_re = Regex::new(&format!("(?i){}", config.site.products_path_hint))
            .map_err(|e| {
                GrounderError::config(format!("site.products_path_hint is invalid: {e}"))
            })?;
        let heuristics = ProductHeuristics::from_terms(
            &config.intents.product_link_terms,
            config.intents.max_link_words,
        )?;

        Ok(Self {
            fetcher,
            embedder,
            generator,
            candidates,
            origin,
            chunk_params,
            top_k: config.retrieval.top_k,
            excerpt_limit: config.retrieval.excerpt_limit,
            max_products: config.retrieval.max_products,
            max_anchors: config.retrieval.max_anchors,
            persona: config.prompt.persona.clone(),
            product_intent_re,
            products_page_re,
            heuristics,
        })
    }

    /// Answer a user message grounded in the configured site.
    ///
    /// Returns either a complete grounded answer or a typed failure naming
    /// the failing stage, never a partial answer.
    #[instrument(skip_all, fields(request_id = tracing::field::Empty))]
    pub async fn build_answer(
        &self,
        message: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<GroundedAnswer> {
        let request_id = RequestId::new();
        tracing::Span::current().record("request_id", tracing::field::display(&request_id));

        info!(message_chars = message.chars().count(), "starting answer pipeline");

        let payload = self.build_context(message, progress).await?;

        progress.phase("Assembling prompt");
        let assembled = prompt::assemble(&payload, self.excerpt_limit, &self.persona);

        progress.phase("Generating answer");
        let answer = self.generator.generate(&assembled.system, message).await?;

        info!(
            top_chunks = payload.top_chunks.len(),
            products = payload.products.len(),
            citations = assembled.citations.len(),
            "answer generated"
        );

        Ok(GroundedAnswer {
            answer,
            citations: assembled.citations,
        })
    }

    /// Run the retrieval half of the pipeline: fetch, extract, chunk, embed,
    /// rank, and (on product intent) extract products.
    async fn build_context(
        &self,
        message: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<ContextPayload> {
        // --- Fetch all candidates concurrently, tolerating failures ---
        progress.phase("Fetching pages");
        let outcomes = self.fetcher.fetch_all(&self.candidates).await;
        let total = outcomes.len();

        let mut pages: Vec<Page> = Vec::new();
        for outcome in outcomes {
            match outcome.result {
                Ok(raw_page) => {
                    progress.page_fetched(raw_page.url.as_str(), pages.len() + 1, total);
                    pages.push(make_page(raw_page));
                }
                Err(e) => {
                    warn!(url = %outcome.url, error = %e, "page fetch failed, excluding");
                }
            }
        }

        if pages.is_empty() {
            return Err(GrounderError::NoContext(format!(
                "all {total} candidate page fetches failed"
            )));
        }

        // --- Chunk pages in candidate order up to the global cap ---
        let mut chunks: Vec<Chunk> = Vec::new();
        for page in &pages {
            if chunks.len() >= self.chunk_params.max_chunks {
                break;
            }
            let params = ChunkParams {
                max_chunks: self.chunk_params.max_chunks - chunks.len(),
                ..self.chunk_params
            };
            for text in chunk_text(&page.text, &params) {
                chunks.push(Chunk {
                    source_url: page.url.clone(),
                    title: page.title.clone(),
                    text: text.to_string(),
                });
            }
        }

        debug!(pages = pages.len(), chunks = chunks.len(), "chunking complete");

        if chunks.is_empty() {
            debug!("no text chunks extracted, skipping embedding");
            return Ok(ContextPayload::default());
        }

        // --- One batched embedding call: query first, then chunks ---
        progress.phase("Embedding query and chunks");
        let mut inputs: Vec<String> = Vec::with_capacity(chunks.len() + 1);
        inputs.push(message.to_string());
        inputs.extend(chunks.iter().map(|c| c.text.clone()));

        let vectors = self.embedder.embed(&inputs).await?;
        if vectors.len() != inputs.len() {
            return Err(GrounderError::Embedding(format!(
                "got {} vectors for {} inputs",
                vectors.len(),
                inputs.len()
            )));
        }

        progress.phase("Ranking chunks");
        let top_chunks = rank_chunks(&vectors[0], &vectors[1..], chunks, self.top_k);

        // --- Products, only when the query asks for them ---
        let products = if self.product_intent_re.is_match(message) {
            let page = pages
                .iter()
                .find(|p| self.products_page_re.is_match(p.url.as_str()))
                .unwrap_or(&pages[0]);
            debug!(page = %page.url, "product intent detected");
            extract_products(
                &page.raw,
                &page.url,
                &self.origin,
                &self.heuristics,
                self.max_products,
                self.max_anchors,
            )
        } else {
            Vec::new()
        };

        Ok(ContextPayload {
            top_chunks,
            products,
        })
    }
}

/// Extract text from a fetched page.
fn make_page(raw_page: RawPage) -> Page {
    let extracted = extract_text(&raw_page.raw);
    Page {
        url: raw_page.url,
        title: extracted.title,
        text: extracted.text,
        raw: raw_page.raw,
        fetched_at: Utc::now(),
    }
}

/// Compile a case-insensitive alternation from a configured keyword list.
fn keyword_regex(terms: &[String], field: &str) -> Result<Regex> {
    if terms.is_empty() {
        return Err(GrounderError::config(format!(
            "{field} must list at least one term"
        )));
    }
    let pattern = format!(
        "(?i){}",
        terms
            .iter()
            .map(|t| regex::escape(t))
            .collect::<Vec<_>>()
            .join("|")
    );
    Regex::new(&pattern).map_err(|e| GrounderError::config(format!("{field} is invalid: {e}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::ready;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // --- Fakes for the collaborator seams ---

    /// Serves canned page bodies; `None` simulates a failed fetch.
    #[derive(Debug)]
    struct FakeFetcher {
        pages: Vec<(Url, Option<String>)>,
    }

    impl PageSource for FakeFetcher {
        fn fetch_all(&self, _urls: &[Url]) -> impl Future<Output = Vec<FetchOutcome>> + Send {
            let outcomes = self
                .pages
                .iter()
                .map(|(url, body)| FetchOutcome {
                    url: url.clone(),
                    result: match body {
                        Some(raw) => Ok(RawPage {
                            url: url.clone(),
                            raw: raw.clone(),
                        }),
                        None => Err(GrounderError::Fetch(format!("{url}: HTTP 503"))),
                    },
                })
                .collect();
            ready(outcomes)
        }
    }

    /// Deterministic bag-of-words embeddings over a fixed vocabulary, so
    /// chunks sharing words with the query rank highest.
    #[derive(Debug)]
    struct FakeEmbedder {
        vocab: Vec<&'static str>,
        calls: Arc<AtomicUsize>,
        last_input_count: Arc<AtomicUsize>,
    }

    impl FakeEmbedder {
        fn new(vocab: Vec<&'static str>) -> Self {
            Self {
                vocab,
                calls: Arc::new(AtomicUsize::new(0)),
                last_input_count: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl Embedder for FakeEmbedder {
        fn embed(&self, inputs: &[String]) -> impl Future<Output = Result<Vec<Vec<f32>>>> + Send {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.last_input_count.store(inputs.len(), Ordering::SeqCst);
            let vectors = inputs
                .iter()
                .map(|text| {
                    let lower = text.to_lowercase();
                    self.vocab
                        .iter()
                        .map(|word| lower.matches(word).count() as f32)
                        .collect()
                })
                .collect();
            ready(Ok(vectors))
        }
    }

    /// Records the system prompt and echoes a canned answer.
    #[derive(Debug)]
    struct FakeGenerator {
        last_system: Arc<std::sync::Mutex<String>>,
    }

    impl FakeGenerator {
        fn new() -> Self {
            Self {
                last_system: Arc::new(std::sync::Mutex::new(String::new())),
            }
        }
    }

    impl TextGenerator for FakeGenerator {
        fn generate(&self, system: &str, _user: &str) -> impl Future<Output = Result<String>> + Send {
            *self.last_system.lock().unwrap() = system.to_string();
            ready(Ok("Hier ist die Antwort. [1]".to_string()))
        }
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn test_config() -> AppConfig {
        AppConfig::default()
    }

    // --- End-to-end scenarios ---

    #[tokio::test]
    async fn product_query_extracts_products_from_products_page() {
        let home = "<html><title>Example Home</title><body>\
                    <p>Wir bieten Software für die Luftfahrt.</p></body></html>";
        let products_page = r#"<html><title>Produkte</title><body>
            <p>Unser Portfolio im Überblick.</p>
            <a href="/produkte/ops">OPS Paket</a>
            <a href="/produkte/connect">Connect Service</a>
        </body></html>"#;

        let fetcher = FakeFetcher {
            pages: vec![
                (url("https://www.example.com/"), Some(home.into())),
                (
                    url("https://www.example.com/produkte/"),
                    Some(products_page.into()),
                ),
            ],
        };
        let embedder = FakeEmbedder::new(vec!["produkte", "portfolio", "software"]);
        let generator = FakeGenerator::new();
        let last_system = generator.last_system.clone();

        let pipeline =
            AnswerPipeline::new(&test_config(), fetcher, embedder, generator).unwrap();
        let answer = pipeline
            .build_answer("Was sind eure Produkte?", &SilentProgress)
            .await
            .unwrap();

        let system = last_system.lock().unwrap().clone();
        assert!(system.contains("# PRODUCTS (from site)"));
        assert!(system.contains("- OPS Paket (https://www.example.com/produkte/ops)"));
        assert!(system.contains("- Connect Service (https://www.example.com/produkte/connect)"));
        assert!(!answer.citations.is_empty());
        assert!(answer.answer.contains("Antwort"));
    }

    #[tokio::test]
    async fn non_product_query_skips_product_extraction() {
        let page = "<html><title>FAQ</title><body>\
                    <a href=\"/produkte/ops\">OPS Paket</a>\
                    <p>Öffnungszeiten: werktags 9 bis 17 Uhr.</p></body></html>";

        let fetcher = FakeFetcher {
            pages: vec![(url("https://www.example.com/faq/"), Some(page.into()))],
        };
        let generator = FakeGenerator::new();
        let last_system = generator.last_system.clone();

        let pipeline = AnswerPipeline::new(
            &test_config(),
            fetcher,
            FakeEmbedder::new(vec!["uhr"]),
            generator,
        )
        .unwrap();

        pipeline
            .build_answer("Wann habt ihr geöffnet?", &SilentProgress)
            .await
            .unwrap();

        let system = last_system.lock().unwrap().clone();
        assert!(!system.contains("# PRODUCTS"));
    }

    #[tokio::test]
    async fn all_fetches_failed_returns_no_context_without_embedding() {
        let fetcher = FakeFetcher {
            pages: vec![
                (url("https://www.example.com/"), None),
                (url("https://www.example.com/produkte/"), None),
            ],
        };
        let embedder = FakeEmbedder::new(vec!["x"]);
        let calls = embedder.calls.clone();

        let pipeline =
            AnswerPipeline::new(&test_config(), fetcher, embedder, FakeGenerator::new()).unwrap();
        let err = pipeline
            .build_answer("Was sind eure Produkte?", &SilentProgress)
            .await
            .unwrap_err();

        assert_eq!(err.stage(), "fetch-all-failed");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn partial_fetch_failure_is_tolerated() {
        let fetcher = FakeFetcher {
            pages: vec![
                (url("https://www.example.com/"), None),
                (
                    url("https://www.example.com/faq/"),
                    Some("<html><title>FAQ</title><body>Antworten auf Fragen.</body></html>".into()),
                ),
            ],
        };

        let pipeline = AnswerPipeline::new(
            &test_config(),
            fetcher,
            FakeEmbedder::new(vec!["fragen"]),
            FakeGenerator::new(),
        )
        .unwrap();

        let answer = pipeline
            .build_answer("Wo finde ich Antworten?", &SilentProgress)
            .await
            .unwrap();

        assert_eq!(answer.citations, vec!["https://www.example.com/faq/"]);
    }

    #[tokio::test]
    async fn short_page_yields_exactly_one_chunk() {
        let fetcher = FakeFetcher {
            pages: vec![(
                url("https://www.example.com/"),
                Some("<html><body>Kurzer Text über das Angebot.</body></html>".into()),
            )],
        };
        let embedder = FakeEmbedder::new(vec!["angebot"]);
        let input_count = embedder.last_input_count.clone();

        let pipeline =
            AnswerPipeline::new(&test_config(), fetcher, embedder, FakeGenerator::new()).unwrap();
        pipeline
            .build_answer("Welches Angebot gibt es?", &SilentProgress)
            .await
            .unwrap();

        // Query plus exactly one chunk.
        assert_eq!(input_count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn chunk_cap_stops_accumulating_across_pages() {
        // chunk_size 10 / overlap 2 gives stride 8; 40 chars of text yield
        // exactly 5 chunks per page.
        let mut config = test_config();
        config.retrieval.chunk_size = 10;
        config.retrieval.overlap = 2;
        config.retrieval.max_chunks = 10;

        let body = |c: char| {
            format!(
                "<html><body>{}</body></html>",
                std::iter::repeat(c).take(40).collect::<String>()
            )
        };
        let fetcher = FakeFetcher {
            pages: vec![
                (url("https://www.example.com/a"), Some(body('a'))),
                (url("https://www.example.com/b"), Some(body('b'))),
                (url("https://www.example.com/c"), Some(body('c'))),
            ],
        };
        let embedder = FakeEmbedder::new(vec!["a", "b", "c"]);
        let input_count = embedder.last_input_count.clone();

        let pipeline =
            AnswerPipeline::new(&config, fetcher, embedder, FakeGenerator::new()).unwrap();
        pipeline
            .build_answer("egal was", &SilentProgress)
            .await
            .unwrap();

        // Query + 10 capped chunks; page c contributed nothing.
        assert_eq!(input_count.load(Ordering::SeqCst), 11);
    }

    #[tokio::test]
    async fn pages_without_text_short_circuit_before_embedding() {
        let fetcher = FakeFetcher {
            pages: vec![(
                url("https://www.example.com/"),
                Some("<html><script>only_code();</script></html>".into()),
            )],
        };
        let embedder = FakeEmbedder::new(vec!["x"]);
        let calls = embedder.calls.clone();
        let generator = FakeGenerator::new();
        let last_system = generator.last_system.clone();

        let pipeline =
            AnswerPipeline::new(&test_config(), fetcher, embedder, generator).unwrap();
        let answer = pipeline
            .build_answer("Irgendeine Frage", &SilentProgress)
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(answer.citations.is_empty());
        let system = last_system.lock().unwrap().clone();
        assert!(system.contains("No context could be retrieved."));
    }

    #[tokio::test]
    async fn best_matching_chunk_ranks_first_in_citations() {
        let pricing = "<html><title>Preise</title><body>\
                       Preise und Tarife für alle Pakete im Detail.</body></html>";
        let about = "<html><title>Über uns</title><body>\
                     Unser Team arbeitet seit Jahren an Luftfahrtsoftware.</body></html>";

        let fetcher = FakeFetcher {
            pages: vec![
                (url("https://www.example.com/ueber-uns/"), Some(about.into())),
                (url("https://www.example.com/preise/"), Some(pricing.into())),
            ],
        };

        let pipeline = AnswerPipeline::new(
            &test_config(),
            fetcher,
            FakeEmbedder::new(vec!["preise", "tarife", "team"]),
            FakeGenerator::new(),
        )
        .unwrap();

        let answer = pipeline
            .build_answer("Was kosten die Tarife? Preise?", &SilentProgress)
            .await
            .unwrap();

        assert_eq!(answer.citations[0], "https://www.example.com/preise/");
    }

    // --- Construction validation ---

    #[test]
    fn invalid_stride_fails_at_construction() {
        let mut config = test_config();
        config.retrieval.overlap = config.retrieval.chunk_size + 5;

        let result = AnswerPipeline::new(
            &config,
            FakeFetcher { pages: vec![] },
            FakeEmbedder::new(vec![]),
            FakeGenerator::new(),
        );
        assert!(matches!(result.unwrap_err(), GrounderError::Config { .. }));
    }

    #[test]
    fn candidates_are_capped_to_max_pages() {
        let mut config = test_config();
        config.site.candidate_paths = (0..10).map(|i| format!("/page-{i}/")).collect();
        config.retrieval.max_pages = 3;

        let pipeline = AnswerPipeline::new(
            &config,
            FakeFetcher { pages: vec![] },
            FakeEmbedder::new(vec![]),
            FakeGenerator::new(),
        )
        .unwrap();
        assert_eq!(pipeline.candidates.len(), 3);
    }

    #[test]
    fn empty_intent_terms_fail_at_construction() {
        let mut config = test_config();
        config.intents.product_query_terms.clear();

        let result = AnswerPipeline::new(
            &config,
            FakeFetcher { pages: vec![] },
            FakeEmbedder::new(vec![]),
            FakeGenerator::new(),
        );
        assert!(result.is_err());
    }
}
