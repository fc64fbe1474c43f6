//! Category classification and scoring.
//!
//! Buckets a flat result list into the static category taxonomy. Every category gets three
//! sub-scores on a 0..=100 scale:
//!
//! - relevance: keyword coverage of the category across results, keyword hits in the whole
//!   corpus (results, generated answer, query), query mention, and source affinity from the
//!   priority table. Key Insights uses query-term coverage instead of keywords.
//! - credibility: mean domain reputation of the matched results plus a diversity bonus.
//! - accuracy: how many of the figures quoted by matched results (percentages, dollar
//!   amounts) are corroborated by at least two distinct domains.
//!
//! Selection keeps categories whose three sub-scores all meet the threshold (70, or 65 when
//! fewer than 3 categories pass at 70), always puts a qualifying Key Insights first, and
//! appends at most 5 others by weighted score.

use std::collections::{HashMap, HashSet};

use regex::Regex;
use search_common::types::SearchResult;
use serde::{Deserialize, Serialize};

use crate::categories::{self, Category, CategoryId};
use crate::sources::Source;

pub const THRESHOLD: f64 = 70.0;
pub const FALLBACK_THRESHOLD: f64 = 65.0;
/// Fewer categories than this passing at [`THRESHOLD`] triggers the fallback threshold.
const MIN_QUALIFYING: usize = 3;
pub const MAX_OTHER_CATEGORIES: usize = 5;
const KEY_INSIGHTS_MAX_CONTENT: usize = 5;
/// Share of query terms a result must contain to count as a Key Insights result.
const KEY_INSIGHTS_MIN_COVERAGE: f64 = 0.5;
/// Accuracy when matched results quote no figures at all.
const NEUTRAL_ACCURACY: f64 = 75.0;
const UNKNOWN_DOMAIN_REPUTATION: f64 = 70.0;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "what", "how", "are", "was", "from", "about", "into", "that",
    "this", "its", "why", "who", "when", "which", "does", "will", "have", "has",
];

/// Raw sub-scores, each 0..=100.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SubScores {
    pub relevance: f64,
    pub credibility: f64,
    pub accuracy: f64,
}

impl SubScores {
    pub fn new(relevance: f64, credibility: f64, accuracy: f64) -> Self {
        Self {
            relevance,
            credibility,
            accuracy,
        }
    }

    /// Relevance counts double.
    pub fn weighted(&self) -> f64 {
        (self.relevance * 2.0 + self.credibility + self.accuracy) / 4.0
    }

    pub fn meets(&self, threshold: f64) -> bool {
        self.relevance >= threshold && self.credibility >= threshold && self.accuracy >= threshold
    }
}

/// Score of one category for one classify call.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryScore {
    pub id: CategoryId,
    pub scores: SubScores,
    pub weighted_score: f64,
}

impl CategoryScore {
    pub fn new(id: CategoryId, scores: SubScores) -> Self {
        Self {
            id,
            scores,
            weighted_score: scores.weighted(),
        }
    }
}

/// Threshold in effect for a set of scores.
pub fn effective_threshold(scores: &[CategoryScore]) -> f64 {
    let passing = scores.iter().filter(|s| s.scores.meets(THRESHOLD)).count();
    if passing < MIN_QUALIFYING {
        FALLBACK_THRESHOLD
    } else {
        THRESHOLD
    }
}

/// Filter by the effective threshold and order the survivors: Key Insights first (when it
/// qualifies), then up to [`MAX_OTHER_CATEGORIES`] others by weighted score, descending.
pub fn select_categories(scores: &[CategoryScore]) -> Vec<CategoryScore> {
    let threshold = effective_threshold(scores);
    let (key_insights, mut others): (Vec<CategoryScore>, Vec<CategoryScore>) = scores
        .iter()
        .filter(|s| s.scores.meets(threshold))
        .cloned()
        .partition(|s| s.id == CategoryId::KeyInsights);

    others.sort_by(|a, b| {
        b.weighted_score
            .total_cmp(&a.weighted_score)
            .then_with(|| a.id.category().priority.cmp(&b.id.category().priority))
    });
    others.truncate(MAX_OTHER_CATEGORIES);

    key_insights.into_iter().take(1).chain(others).collect()
}

/// Displayed quality metrics, each 0..=1.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Metrics {
    pub relevance: f64,
    pub accuracy: f64,
    pub credibility: f64,
    pub overall: f64,
}

impl Metrics {
    pub const ZERO: Metrics = Metrics {
        relevance: 0.0,
        accuracy: 0.0,
        credibility: 0.0,
        overall: 0.0,
    };

    pub fn new(relevance: f64, accuracy: f64, credibility: f64) -> Self {
        Self {
            relevance,
            accuracy,
            credibility,
            overall: relevance * 0.4 + accuracy * 0.35 + credibility * 0.25,
        }
    }

    /// Baseline metrics nudged by keywords in the category name.
    pub fn for_category_name(name: &str) -> Self {
        let name = name.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| name.contains(w));

        let (mut relevance, mut accuracy, mut credibility) = (0.8, 0.75, 0.7);
        if has(&["financial", "market"]) {
            accuracy = 0.85;
            credibility = 0.9;
        } else if has(&["expert", "research", "regulatory"]) {
            accuracy = 0.8;
            credibility = 0.85;
        } else if has(&["social", "sentiment"]) {
            accuracy = 0.65;
            credibility = 0.6;
        }
        if has(&["news", "trend", "key insights"]) {
            relevance = 0.85;
        }
        Self::new(relevance, accuracy, credibility)
    }

    /// Field-wise mean; zero for an empty slice.
    pub fn mean(items: &[Metrics]) -> Self {
        if items.is_empty() {
            return Self::ZERO;
        }
        let n = items.len() as f64;
        let sum = |f: fn(&Metrics) -> f64| items.iter().map(f).sum::<f64>() / n;
        Self {
            relevance: sum(|m| m.relevance),
            accuracy: sum(|m| m.accuracy),
            credibility: sum(|m| m.credibility),
            overall: sum(|m| m.overall),
        }
    }
}

/// Final per-category bundle returned to the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizedResult {
    pub id: String,
    pub name: String,
    pub content: Vec<SearchResult>,
    #[serde(default)]
    pub metrics: Metrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_terms: Vec<String>,
}

impl CategorizedResult {
    /// Pseudo-category shown when nothing qualifies.
    pub fn all_results(results: Vec<SearchResult>) -> Self {
        let metrics = if results.is_empty() {
            Metrics::ZERO
        } else {
            Metrics::for_category_name("All Results")
        };
        Self {
            id: "all-results".to_string(),
            name: "All Results".to_string(),
            content: results,
            metrics,
            icon: Some("list".to_string()),
            color: None,
            key_terms: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Classification {
    pub categories: Vec<CategorizedResult>,
    /// Mean of the selected categories' metrics.
    pub metrics: Metrics,
    pub threshold: f64,
}

/// Lowercased text with its token set, for keyword checks.
struct Text {
    lower: String,
    tokens: HashSet<String>,
}

impl Text {
    fn new(raw: &str) -> Self {
        let lower = raw.to_lowercase();
        let tokens = tokenize(&lower).map(str::to_string).collect();
        Self { lower, tokens }
    }

    /// Single words match whole tokens; phrases match as substrings.
    fn contains(&self, keyword: &str) -> bool {
        if keyword.contains(' ') {
            self.lower.contains(keyword)
        } else {
            self.tokens.contains(keyword)
        }
    }
}

fn tokenize(lower: &str) -> impl Iterator<Item = &str> {
    lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
}

struct Document<'a> {
    result: &'a SearchResult,
    text: Text,
    domain: Option<String>,
    source: Option<Source>,
    weight: f64,
}

struct Evaluation {
    score: CategoryScore,
    matched: Vec<usize>,
    key_terms: Vec<String>,
}

/// Stateless apart from compiled patterns; one instance is shared by all requests.
pub struct Classifier {
    figure_re: Regex,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier {
    pub fn new() -> Self {
        let figure_re = Regex::new(
            r"(?i)\$\s?\d[\d,]*(?:\.\d+)?(?:\s?(?:trillion|billion|million|bn))?|\d+(?:\.\d+)?\s?%",
        )
        .expect("valid regex");
        Self { figure_re }
    }

    /// Classify `results` for `query`. `answer` is the generated answer, empty when none.
    pub fn classify(&self, query: &str, answer: &str, results: &[SearchResult]) -> Classification {
        if results.is_empty() {
            return Classification {
                categories: Vec::new(),
                metrics: Metrics::ZERO,
                threshold: THRESHOLD,
            };
        }

        let documents = documents(results);
        let evaluations = self.evaluate(query, answer, &documents);
        let scores: Vec<CategoryScore> = evaluations.iter().map(|e| e.score.clone()).collect();
        let threshold = effective_threshold(&scores);

        let categories: Vec<CategorizedResult> = select_categories(&scores)
            .into_iter()
            .filter_map(|selected| evaluations.iter().find(|e| e.score.id == selected.id))
            .map(|evaluation| to_categorized(evaluation, &documents))
            .collect();
        let metrics = Metrics::mean(&categories.iter().map(|c| c.metrics).collect::<Vec<_>>());

        tracing::debug!(
            threshold,
            selected = categories.len(),
            results = results.len(),
            "classified results"
        );
        Classification {
            categories,
            metrics,
            threshold,
        }
    }

    fn evaluate(&self, query: &str, answer: &str, documents: &[Document<'_>]) -> Vec<Evaluation> {
        let query_text = Text::new(query);
        let answer_text = Text::new(answer);
        let corpus = Text::new(&format!(
            "{query} {answer} {}",
            documents
                .iter()
                .map(|d| d.text.lower.as_str())
                .collect::<Vec<_>>()
                .join(" ")
        ));

        categories::all()
            .iter()
            .map(|category| {
                if category.is_special {
                    self.evaluate_key_insights(category, &query_text, &answer_text, documents)
                } else {
                    self.evaluate_keywords(category, &query_text, &corpus, documents)
                }
            })
            .collect()
    }

    fn evaluate_keywords(
        &self,
        category: &Category,
        query: &Text,
        corpus: &Text,
        documents: &[Document<'_>],
    ) -> Evaluation {
        let matched: Vec<usize> = documents
            .iter()
            .enumerate()
            .filter(|(_, d)| category.keywords.iter().any(|kw| d.text.contains(kw)))
            .map(|(i, _)| i)
            .collect();
        let key_terms: Vec<String> = category
            .keywords
            .iter()
            .filter(|kw| corpus.contains(kw))
            .map(|kw| kw.to_string())
            .collect();

        let relevance = if matched.is_empty() {
            0.0
        } else {
            let coverage = matched.len() as f64 / documents.len() as f64;
            let keyword_score = (key_terms.len() as f64 / 3.0).min(1.0);
            let query_bonus = if category.keywords.iter().any(|kw| query.contains(kw)) {
                1.0
            } else {
                0.0
            };
            let boost = source_affinity(category.id, &matched, documents);
            100.0 * (0.35 * coverage + 0.25 * keyword_score + 0.2 * query_bonus + 0.2 * boost)
        };

        Evaluation {
            score: CategoryScore::new(
                category.id,
                SubScores::new(
                    clamp(relevance),
                    credibility(&matched, documents),
                    self.accuracy(&matched, documents),
                ),
            ),
            matched,
            key_terms,
        }
    }

    fn evaluate_key_insights(
        &self,
        category: &Category,
        query: &Text,
        answer: &Text,
        documents: &[Document<'_>],
    ) -> Evaluation {
        let terms: Vec<&str> = query_terms(query);
        let coverage_of = |text: &Text| {
            if terms.is_empty() {
                return 1.0;
            }
            terms.iter().filter(|t| text.tokens.contains(**t)).count() as f64 / terms.len() as f64
        };

        let coverages: Vec<f64> = documents.iter().map(|d| coverage_of(&d.text)).collect();
        let mean_coverage = coverages.iter().sum::<f64>() / coverages.len().max(1) as f64;

        let mut matched: Vec<usize> = (0..documents.len())
            .filter(|&i| coverages[i] >= KEY_INSIGHTS_MIN_COVERAGE)
            .collect();
        matched.sort_by(|&a, &b| coverages[b].total_cmp(&coverages[a]));
        matched.truncate(KEY_INSIGHTS_MAX_CONTENT);

        let support = if answer.lower.trim().is_empty() {
            source_affinity(category.id, &matched, documents)
        } else {
            coverage_of(answer)
        };
        let relevance = if matched.is_empty() {
            0.0
        } else {
            100.0 * (0.8 * mean_coverage + 0.2 * support)
        };

        Evaluation {
            score: CategoryScore::new(
                category.id,
                SubScores::new(
                    clamp(relevance),
                    credibility(&matched, documents),
                    self.accuracy(&matched, documents),
                ),
            ),
            matched,
            key_terms: terms.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Share of quoted figures that at least two distinct domains agree on.
    fn accuracy(&self, matched: &[usize], documents: &[Document<'_>]) -> f64 {
        if matched.is_empty() {
            return 0.0;
        }

        let mut figures: HashMap<String, HashSet<&str>> = HashMap::new();
        for &i in matched {
            let doc = &documents[i];
            let origin = doc.domain.as_deref().unwrap_or(doc.result.url.as_str());
            for m in self.figure_re.find_iter(&doc.text.lower) {
                let figure: String = m
                    .as_str()
                    .chars()
                    .filter(|c| !c.is_whitespace() && *c != ',')
                    .collect();
                figures.entry(figure).or_default().insert(origin);
            }
        }

        if figures.is_empty() {
            return NEUTRAL_ACCURACY;
        }
        let corroborated = figures.values().filter(|origins| origins.len() >= 2).count();
        clamp(70.0 + 30.0 * corroborated as f64 / figures.len() as f64)
    }
}

fn documents(results: &[SearchResult]) -> Vec<Document<'_>> {
    results
        .iter()
        .map(|result| {
            let source = Source::from_tag(&result.source);
            let weight = source.as_ref().map_or(1.0, |s| s.priority().weight);
            Document {
                result,
                text: Text::new(&result.searchable_text()),
                domain: result.domain(),
                source,
                weight,
            }
        })
        .collect()
}

fn query_terms(query: &Text) -> Vec<&str> {
    let mut seen = HashSet::new();
    tokenize(&query.lower)
        .filter(|t| t.chars().count() > 2 && !STOPWORDS.contains(t))
        .filter(|t| seen.insert(*t))
        .collect()
}

/// Mean affinity of matched results' sources to `id`: 1 for primary, 0.5 for secondary.
fn source_affinity(id: CategoryId, matched: &[usize], documents: &[Document<'_>]) -> f64 {
    if matched.is_empty() {
        return 0.0;
    }
    let total: f64 = matched
        .iter()
        .map(|&i| match &documents[i].source {
            Some(source) => {
                let priority = source.priority();
                if priority.primary.contains(&id) {
                    1.0
                } else if priority.secondary.contains(&id) {
                    0.5
                } else {
                    0.0
                }
            }
            None => 0.0,
        })
        .sum();
    total / matched.len() as f64
}

fn credibility(matched: &[usize], documents: &[Document<'_>]) -> f64 {
    if matched.is_empty() {
        return 0.0;
    }
    let reputation: f64 = matched
        .iter()
        .map(|&i| domain_reputation(documents[i].domain.as_deref()))
        .sum::<f64>()
        / matched.len() as f64;
    let distinct: HashSet<&str> = matched
        .iter()
        .filter_map(|&i| documents[i].domain.as_deref())
        .collect();
    let diversity = 10.0 * distinct.len() as f64 / matched.len() as f64;
    clamp(reputation + diversity)
}

/// Static reputation lookup by domain.
pub fn domain_reputation(domain: Option<&str>) -> f64 {
    let Some(domain) = domain else {
        return 50.0;
    };
    let is = |candidates: &[&str]| {
        candidates
            .iter()
            .any(|c| domain == *c || domain.ends_with(&format!(".{c}")))
    };

    if domain.ends_with(".gov") || domain.ends_with(".edu") || domain.contains(".gov.") {
        95.0
    } else if is(&[
        "reuters.com",
        "bloomberg.com",
        "ft.com",
        "wsj.com",
        "economist.com",
        "nature.com",
    ]) {
        92.0
    } else if is(&[
        "wikipedia.org",
        "crunchbase.com",
        "gartner.com",
        "mckinsey.com",
        "statista.com",
        "forbes.com",
        "cnbc.com",
        "techcrunch.com",
    ]) {
        85.0
    } else if is(&["linkedin.com"]) {
        75.0
    } else if is(&["medium.com", "substack.com"]) {
        65.0
    } else if is(&["twitter.com", "x.com"]) {
        60.0
    } else if is(&["reddit.com", "quora.com"]) {
        55.0
    } else {
        UNKNOWN_DOMAIN_REPUTATION
    }
}

fn to_categorized(evaluation: &Evaluation, documents: &[Document<'_>]) -> CategorizedResult {
    let category = evaluation.score.id.category();

    let mut ordered: Vec<&Document<'_>> = evaluation.matched.iter().map(|&i| &documents[i]).collect();
    if !category.is_special {
        ordered.sort_by(|a, b| b.weight.total_cmp(&a.weight));
    }
    let content: Vec<SearchResult> = ordered.into_iter().map(|d| d.result.clone()).collect();

    let metrics = if content.is_empty() {
        Metrics::ZERO
    } else {
        Metrics::for_category_name(category.name)
    };

    CategorizedResult {
        id: category.id.as_str().to_string(),
        name: category.name.to_string(),
        content,
        metrics,
        icon: Some(category.icon.to_string()),
        color: Some(category.color.to_string()),
        key_terms: evaluation.key_terms.clone(),
    }
}

fn clamp(score: f64) -> f64 {
    score.clamp(0.0, 100.0)
}
