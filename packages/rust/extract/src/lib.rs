//! Heuristic markup scanning: plain-text extraction and product-link
//! discovery.
//!
//! Both passes are deliberately approximate: tag stripping and anchor
//! matching, no readability algorithm. They sit behind narrow entry points
//! ([`extract_text`], [`extract_products`]) so a stricter parser could be
//! substituted without touching chunking or ranking.

pub mod products;
pub mod text;

pub use products::{ProductHeuristics, extract_products};
pub use text::{ExtractedText, extract_text};
