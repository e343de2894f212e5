//! The ticker-extraction collaborator (spec §6): `extract_tickers(query)
//! -> Vec<String>`. The Decomposer calls this before planning to obtain
//! "likely subjects" hints; a concrete vendor catalog lookup is out of
//! scope (spec §1 Non-goals), so this module defines the trait, an
//! LLM-assisted implementation, and a dependency-free fallback (SPEC_FULL
//! §12: "ticker extraction is LLM-assisted with a keyword fallback").

use async_trait::async_trait;

use crate::llm::{ChatModel, ChatRequest};

/// Looks up candidate ticker symbols mentioned in a query. Implementors
/// may consult a static company catalog, an LLM, or both; failure is not
/// fatal to planning (spec §4.3 point 1: "If ticker extraction fails,
/// planning proceeds without hints").
#[async_trait]
pub trait TickerExtractor: Send + Sync {
    async fn extract_tickers(&self, query: &str) -> Vec<String>;
}

/// Matches bare uppercase tokens of 1-5 letters, optionally prefixed with
/// `$` (a common ticker-mention convention). This is the fallback the
/// original system falls back to when its LLM-assisted extraction path
/// is unavailable (SPEC_FULL §12) — a cheap, dependency-free heuristic,
/// not a replacement for a real catalog lookup.
pub struct KeywordTickerExtractor {
    known_words: std::collections::HashSet<&'static str>,
}

impl Default for KeywordTickerExtractor {
    fn default() -> Self {
        // Common uppercase English words that would otherwise be
        // misread as tickers ("I", "A", "CEO", ...).
        let known_words = [
            "I", "A", "CEO", "CFO", "USD", "GDP", "Q1", "Q2", "Q3", "Q4", "IPO", "ETF", "SEC",
        ]
        .into_iter()
        .collect();
        KeywordTickerExtractor { known_words }
    }
}

#[async_trait]
impl TickerExtractor for KeywordTickerExtractor {
    async fn extract_tickers(&self, query: &str) -> Vec<String> {
        self.extract_tickers_sync(query)
    }
}

impl KeywordTickerExtractor {
    fn extract_tickers_sync(&self, query: &str) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut tickers = Vec::new();
        for raw in query.split_whitespace() {
            let token = raw.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '$');
            let candidate = token.strip_prefix('$').unwrap_or(token);
            if candidate.len() < 1 || candidate.len() > 5 {
                continue;
            }
            if !candidate.chars().all(|c| c.is_ascii_uppercase()) {
                continue;
            }
            if self.known_words.contains(candidate) {
                continue;
            }
            if seen.insert(candidate.to_string()) {
                tickers.push(candidate.to_string());
            }
        }
        tickers
    }
}

const CLASSIFIER_SYSTEM_PROMPT: &str = "You identify stock ticker symbols that a financial \
query is about. Given the query, respond with a comma-separated list of uppercase ticker \
symbols (e.g. \"AAPL,MSFT\"), using the company's primary listed sector/industry knowledge to \
resolve plain-language company names to tickers. Respond with an empty line if none apply. No \
other text.";

/// LLM-assisted extraction (SPEC_FULL §12), falling back to
/// [`KeywordTickerExtractor`] on any LLM failure or empty/unparseable
/// response — extraction failure must never block planning (spec §4.3
/// point 1).
pub struct LlmTickerExtractor {
    llm: std::sync::Arc<dyn ChatModel>,
    fallback: KeywordTickerExtractor,
}

impl LlmTickerExtractor {
    pub fn new(llm: std::sync::Arc<dyn ChatModel>) -> Self {
        LlmTickerExtractor {
            llm,
            fallback: KeywordTickerExtractor::default(),
        }
    }
}

#[async_trait]
impl TickerExtractor for LlmTickerExtractor {
    async fn extract_tickers(&self, query: &str) -> Vec<String> {
        let request = ChatRequest::new(CLASSIFIER_SYSTEM_PROMPT, query.to_string())
            .with_temperature(0.0)
            .with_max_tokens(64);

        match self.llm.complete(request).await {
            Ok(text) => {
                let parsed = parse_ticker_list(&text);
                if parsed.is_empty() {
                    self.fallback.extract_tickers_sync(query)
                } else {
                    parsed
                }
            }
            Err(_) => self.fallback.extract_tickers_sync(query),
        }
    }
}

fn parse_ticker_list(text: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut tickers = Vec::new();
    for raw in text.split(|c: char| c == ',' || c.is_whitespace()) {
        let candidate = raw.trim().trim_matches(|c: char| !c.is_ascii_alphanumeric());
        if candidate.is_empty() || candidate.len() > 5 {
            continue;
        }
        if !candidate.chars().all(|c| c.is_ascii_uppercase()) {
            continue;
        }
        if seen.insert(candidate.to_string()) {
            tickers.push(candidate.to_string());
        }
    }
    tickers
}
