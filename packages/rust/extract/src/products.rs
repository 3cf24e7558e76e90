//! Product-link discovery over anchor elements.

use std::collections::HashSet;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use grounder_shared::{GrounderError, Product, Result};

use crate::text::collapse_whitespace;

// ---------------------------------------------------------------------------
// ProductHeuristics
// ---------------------------------------------------------------------------

/// Compiled acceptance heuristic for anchor labels.
///
/// An anchor is a product candidate when its visible text matches the
/// configured keyword pattern, or when it is short enough to look like a
/// bare product name.
#[derive(Debug, Clone)]
pub struct ProductHeuristics {
    link_re: Regex,
    max_link_words: usize,
}

impl ProductHeuristics {
    /// Compile the heuristic from a configured keyword list.
    pub fn from_terms(terms: &[String], max_link_words: usize) -> Result<Self> {
        if terms.is_empty() {
            return Err(GrounderError::config(
                "intents.product_link_terms must list at least one term",
            ));
        }

        let pattern = format!(
            "(?i){}",
            terms
                .iter()
                .map(|t| regex::escape(t))
                .collect::<Vec<_>>()
                .join("|")
        );
        let link_re = Regex::new(&pattern).map_err(|e| {
            GrounderError::config(format!("invalid product link terms: {e}"))
        })?;

        Ok(Self {
            link_re,
            max_link_words,
        })
    }

    /// Does this anchor label look like a product link?
    fn accepts(&self, label: &str) -> bool {
        self.link_re.is_match(label)
            || label.split_whitespace().count() <= self.max_link_words
    }
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Scan one page's raw markup for product-looking anchors.
///
/// At most `max_anchors` anchors are examined (bounded cost, not exhaustive).
/// Accepted hrefs are resolved against `base_url` and kept only when they
/// share `origin`'s origin. Duplicate URLs keep the first occurrence; the
/// result is capped at `max_products`. Absence of matches yields an empty
/// list; there is no error path.
pub fn extract_products(
    raw: &str,
    base_url: &Url,
    origin: &Url,
    heuristics: &ProductHeuristics,
    max_products: usize,
    max_anchors: usize,
) -> Vec<Product> {
    let doc = Html::parse_document(raw);
    let anchor_sel = Selector::parse("a[href]").expect("valid selector");

    let mut seen = HashSet::new();
    let mut products = Vec::new();

    for el in doc.select(&anchor_sel).take(max_anchors) {
        if products.len() >= max_products {
            break;
        }

        let Some(href) = el.value().attr("href") else {
            continue;
        };
        // Skip anchors, javascript:, mailto:
        if href.starts_with('#') || href.starts_with("javascript:") || href.starts_with("mailto:")
        {
            continue;
        }

        let name = collapse_whitespace(&el.text().collect::<String>());
        if name.is_empty() || !heuristics.accepts(&name) {
            continue;
        }

        let Ok(resolved) = base_url.join(href) else {
            continue;
        };
        if resolved.origin() != origin.origin() {
            continue;
        }

        if seen.insert(resolved.to_string()) {
            products.push(Product {
                name,
                url: resolved,
            });
        }
    }

    debug!(count = products.len(), page = %base_url, "product extraction complete");
    products
}
