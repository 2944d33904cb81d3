//! Relevance gating: does a browsing context belong to the active task?
//!
//! The default strategy is a lexical heuristic. Task title and notes are
//! split into keywords, widened through a small synonym table, and matched
//! as substrings against the context's URL and title. A context on a host
//! the task has captured before also counts as a match.


use microfocus_storage::{BrowsingContext, Task};
use serde::Serialize;
use url::Url;

/// Share of keywords that must match before a context is considered relevant
pub const DEFAULT_THRESHOLD_RATIO: f64 = 0.3;

/// Minimum keyword length kept by the tokenizer
const MIN_KEYWORD_LEN: usize = 3;

/// Topic -> related terms
const SYNONYMS: &[(&str, &[&str])] = &[
    ("blog", &["post", "article", "writing", "content"]),
    (
        "esp32",
        &["iot", "embedded", "microcontroller", "firmware", "ota", "update"],
    ),
    (
        "coding",
        &["code", "programming", "developer", "script", "function"],
    ),
    ("design", &["ui", "ux", "figma", "sketch", "layout", "visual"]),
    ("video", &["youtube", "vimeo", "stream", "watch", "media"]),
    (
        "documentation",
        &["docs", "guide", "manual", "reference", "spec"],
    ),
    ("research", &["article", "paper", "study", "academic", "journal"]),
    ("testing", &["test", "debug", "qa", "cypress", "jest"]),
    (
        "deployment",
        &["deploy", "production", "server", "hosting", "cloud"],
    ),
];

/// Gate outcome for one context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Allow,
    Deny,
}

/// Pluggable scoring. A non-negative score allows the context.
pub trait RelevanceStrategy: Send + Sync {
    fn score_relevance(&self, context: &BrowsingContext, task: &Task) -> i32;
}

/// How a keyword score was reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelevanceBreakdown {
    pub keywords: Vec<String>,
    pub score: i32,
    pub matched: usize,
    pub threshold: usize,
}

impl RelevanceBreakdown {
    #[must_use]
    pub const fn is_relevant(&self) -> bool {
        self.matched >= self.threshold
    }
}

/// Keyword + synonym + captured-host heuristic
#[derive(Debug, Clone)]
pub struct KeywordRelevance {
    threshold_ratio: f64,
}

impl Default for KeywordRelevance {
    fn default() -> Self {
        Self::new()
    }
}

impl KeywordRelevance {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            threshold_ratio: DEFAULT_THRESHOLD_RATIO,
        }
    }

    #[must_use]
    pub const fn with_threshold_ratio(threshold_ratio: f64) -> Self {
        Self { threshold_ratio }
    }

    /// Number of matches required for `keyword_count` keywords, at least one
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn threshold(&self, keyword_count: usize) -> usize {
        let raw = (keyword_count as f64 * self.threshold_ratio).ceil();
        (raw.max(0.0) as usize).max(1)
    }

    /// Score a context and report how the score was reached
    #[must_use]
    pub fn breakdown(&self, context: &BrowsingContext, task: &Task) -> RelevanceBreakdown {
        let keywords = extract_keywords(&task.keyword_source());
        if keywords.is_empty() {
            // Nothing to gate on
            return RelevanceBreakdown {
                keywords,
                score: 1,
                matched: 0,
                threshold: 0,
            };
        }

        let url = context.url().unwrap_or_default();
        let haystack = format!("{} {}", url, context.title.as_deref().unwrap_or_default())
            .to_lowercase();

        let mut score = 0;
        let mut matched = 0;

        for keyword in &keywords {
            if haystack.contains(keyword.as_str()) {
                matched += 1;
                score += 2;
            }
        }

        for term in expand_keywords(&keywords) {
            if !keywords.contains(&term) && haystack.contains(term.as_str()) {
                matched += 1;
                score += 1;
            }
        }

        if let Some(host) = host_of(url) {
            let seen_before = task
                .captured
                .iter()
                .any(|c| host_of(&c.url).as_deref() == Some(host.as_str()));
            if seen_before {
                matched += 1;
                score += 3;
            }
        }

        let threshold = self.threshold(keywords.len());
        RelevanceBreakdown {
            keywords,
            score,
            matched,
            threshold,
        }
    }
}

impl RelevanceStrategy for KeywordRelevance {
    fn score_relevance(&self, context: &BrowsingContext, task: &Task) -> i32 {
        let breakdown = self.breakdown(context, task);
        log::debug!(
            "Relevance of {} for '{}': score={} matched={}/{}",
            context.id,
            task.title,
            breakdown.score,
            breakdown.matched,
            breakdown.threshold
        );
        if breakdown.is_relevant() {
            breakdown.score
        } else {
            -1
        }
    }
}

/// Pure (context, task) -> verdict function wrapping a scoring strategy
pub struct RelevanceEvaluator {
    strategy: Box<dyn RelevanceStrategy>,
}

impl Default for RelevanceEvaluator {
    fn default() -> Self {
        Self::new(Box::new(KeywordRelevance::new()))
    }
}

impl RelevanceEvaluator {
    #[must_use]
    pub fn new(strategy: Box<dyn RelevanceStrategy>) -> Self {
        Self { strategy }
    }

    /// Missing URLs and non-web schemes are never gated
    #[must_use]
    pub fn evaluate(&self, context: &BrowsingContext, task: &Task) -> Verdict {
        if is_exempt(context.url()) {
            return Verdict::Allow;
        }
        if self.strategy.score_relevance(context, task) >= 0 {
            Verdict::Allow
        } else {
            Verdict::Deny
        }
    }
}

/// Lowercase alphanumeric words of at least three characters, first occurrence order
#[must_use]
pub fn extract_keywords(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut keywords: Vec<String> = Vec::new();
    for word in lowered.split(|c: char| !(c.is_ascii_lowercase() || c.is_ascii_digit())) {
        if word.len() >= MIN_KEYWORD_LEN && !keywords.iter().any(|k| k == word) {
            keywords.push(word.to_string());
        }
    }
    keywords
}

/// Keywords plus every related term from the synonym table, without duplicates
#[must_use]
pub fn expand_keywords(keywords: &[String]) -> Vec<String> {
    let mut expanded: Vec<String> = keywords.to_vec();
    for keyword in keywords {
        let related = SYNONYMS
            .iter()
            .find(|(topic, _)| *topic == keyword.as_str())
            .map_or(&[][..], |(_, terms)| *terms);
        for term in related {
            if !expanded.iter().any(|e| e == *term) {
                expanded.push((*term).to_string());
            }
        }
    }
    expanded
}

/// Network host (with explicit port) of a URL
#[must_use]
pub fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str().filter(|h| !h.is_empty())?;
    Some(match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Missing URLs and URLs with a non-web scheme bypass scoring
#[must_use]
pub fn is_exempt(url: Option<&str>) -> bool {
    match url {
        None => true,
        Some(url) => Url::parse(url).is_ok_and(|u| !matches!(u.scheme(), "http" | "https")),
    }
}
