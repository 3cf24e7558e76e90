//! Tag-stripping text extraction.

use std::sync::LazyLock;

use regex::Regex;

/// Blocks whose content must never leak into the extracted text.
static SCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script[^>]*>.*?</script>").expect("valid regex")
});
static STYLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<style[^>]*>.*?</style>").expect("valid regex")
});
static NOSCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<noscript[^>]*>.*?</noscript>").expect("valid regex")
});
static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"));

static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid regex")
});

/// Any remaining tag.
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));

/// Result of extracting readable text from raw markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    /// First `<title>` inner text, or empty if absent.
    pub title: String,
    /// Visible body text with tags stripped and whitespace collapsed.
    pub text: String,
}

/// Strip markup down to a title and plain text.
///
/// Script/style/noscript blocks and comments are removed wholesale, all other
/// tags are replaced with spaces, and whitespace runs collapse to single
/// spaces. Malformed markup degrades to reduced or empty text; this never
/// fails.
pub fn extract_text(raw: &str) -> ExtractedText {
    let stripped = SCRIPT_RE.replace_all(raw, "");
    let stripped = STYLE_RE.replace_all(&stripped, "");
    let stripped = NOSCRIPT_RE.replace_all(&stripped, "");
    let stripped = COMMENT_RE.replace_all(&stripped, "");

    let title = TITLE_RE
        .captures(&stripped)
        .map(|c| collapse_whitespace(&TAG_RE.replace_all(&c[1], " ")))
        .unwrap_or_default();

    let text = collapse_whitespace(&TAG_RE.replace_all(&stripped, " "));

    ExtractedText { title, text }
}

/// Collapse whitespace runs to single spaces and trim.
pub(crate) fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
