//! Pipeline orchestration and prompt assembly for Grounder.
//!
//! This crate ties fetching, extraction, chunking, embedding, and ranking
//! into the end-to-end `build_answer` flow and renders the grounded prompt.

pub mod pipeline;
pub mod prompt;

pub use pipeline::{
    AnswerPipeline, Embedder, PageSource, ProgressReporter, SilentProgress, TextGenerator,
};
pub use prompt::AssembledPrompt;
