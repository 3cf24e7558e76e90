//! Grounded prompt assembly with citation tracking.

use grounder_shared::ContextPayload;

/// Hard cap on the machine-readable citation list.
const MAX_CITATIONS: usize = 3;

/// Fixed grounding instructions prepended to every prompt. The persona line
/// (domain, tone, answer language) comes from config.
const INSTRUCTIONS: &str = "\
Use ONLY the context below. If the context does not contain the answer, \
say you are not sure and point to the closest page.
When you recommend a product, pick from the PRODUCTS list (if present) and \
explain briefly why.
Always include 1-3 citations as numbered markers like [1], [2] matching the \
context blocks, and list their URLs at the end under \"Sources\".";

/// The rendered system prompt plus the citation list for the response
/// metadata. Citations are independent of the prose: the deduplicated,
/// insertion-ordered source URLs of the top chunks, capped to 3.
#[derive(Debug, Clone)]
pub struct AssembledPrompt {
    pub system: String,
    pub citations: Vec<String>,
}

/// Render the context payload into a single grounding prompt.
///
/// Each top chunk becomes a numbered `[[n]]` block with title, source URL,
/// and an excerpt truncated to `excerpt_limit` characters, even when
/// upstream caps should already bound chunk length.
pub fn assemble(payload: &ContextPayload, excerpt_limit: usize, persona: &str) -> AssembledPrompt {
    let context = if payload.top_chunks.is_empty() {
        "No context could be retrieved.".to_string()
    } else {
        payload
            .top_chunks
            .iter()
            .enumerate()
            .map(|(i, scored)| {
                format!(
                    "[[{}]] {}\nURL: {}\n{}",
                    i + 1,
                    scored.chunk.title,
                    scored.chunk.source_url,
                    truncate_chars(&scored.chunk.text, excerpt_limit),
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    };

    let mut system = format!("{persona}\n{INSTRUCTIONS}\n\n# CONTEXT\n{context}");

    if !payload.products.is_empty() {
        system.push_str("\n\n# PRODUCTS (from site)\n");
        for product in &payload.products {
            system.push_str(&format!("- {} ({})\n", product.name, product.url));
        }
    }

    let mut citations: Vec<String> = Vec::new();
    for scored in &payload.top_chunks {
        if citations.len() == MAX_CITATIONS {
            break;
        }
        let url = scored.chunk.source_url.to_string();
        if !citations.contains(&url) {
            citations.push(url);
        }
    }

    AssembledPrompt { system, citations }
}

/// First `max` chars of `s`, cut on a char boundary.
fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
