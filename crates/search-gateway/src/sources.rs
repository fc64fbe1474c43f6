//! Source-specific fetchers.
//!
//! A platform source (LinkedIn, Reuters, ...) is the general web search restricted to the
//! platform's domain. Each source carries a fixed priority entry: the categories it mostly
//! feeds (primary), the ones it sometimes feeds (secondary), and a weight used to order the
//! merged result list and to boost category relevance.

use std::fmt;

use search_common::error::CommonError;
use search_common::provider::SearchProvider;
use search_common::types::SearchResult;

use crate::categories::CategoryId;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Source {
    /// Unrestricted web search.
    Web,
    LinkedIn,
    Twitter,
    Reddit,
    Crunchbase,
    Bloomberg,
    Reuters,
    Wikipedia,
    News,
    /// A user-supplied site, identified by host.
    Custom(String),
}

/// Static priority entry for a source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourcePriority {
    pub primary: &'static [CategoryId],
    pub secondary: &'static [CategoryId],
    pub weight: f64,
}

const CUSTOM_PRIORITY: SourcePriority = SourcePriority {
    primary: &[],
    secondary: &[CategoryId::KeyInsights],
    weight: 1.2,
};

/// Curated sources searched in verified mode when the request names none.
pub const DEFAULT_VERIFIED: [Source; 5] = [
    Source::Reuters,
    Source::Bloomberg,
    Source::Crunchbase,
    Source::Wikipedia,
    Source::LinkedIn,
];

impl Source {
    /// Parse a source id from the request. Unknown ids yield `None`.
    pub fn parse(id: &str) -> Option<Self> {
        let source = match id.trim().to_ascii_lowercase().as_str() {
            "web" => Self::Web,
            "linkedin" => Self::LinkedIn,
            "twitter" | "x" => Self::Twitter,
            "reddit" => Self::Reddit,
            "crunchbase" => Self::Crunchbase,
            "bloomberg" => Self::Bloomberg,
            "reuters" => Self::Reuters,
            "wikipedia" => Self::Wikipedia,
            "news" => Self::News,
            _ => return None,
        };
        Some(source)
    }

    /// Inverse of [`Source::tag`], used to recover the source of a stored result.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.strip_prefix("custom:") {
            Some(host) => Some(Self::Custom(host.to_string())),
            None => Self::parse(tag),
        }
    }

    /// Tag written into [`SearchResult::source`].
    pub fn tag(&self) -> String {
        match self {
            Self::Web => "web".to_string(),
            Self::LinkedIn => "linkedin".to_string(),
            Self::Twitter => "twitter".to_string(),
            Self::Reddit => "reddit".to_string(),
            Self::Crunchbase => "crunchbase".to_string(),
            Self::Bloomberg => "bloomberg".to_string(),
            Self::Reuters => "reuters".to_string(),
            Self::Wikipedia => "wikipedia".to_string(),
            Self::News => "news".to_string(),
            Self::Custom(host) => format!("custom:{host}"),
        }
    }

    fn site(&self) -> Option<&str> {
        match self {
            Self::Web | Self::News => None,
            Self::LinkedIn => Some("linkedin.com"),
            Self::Twitter => Some("twitter.com"),
            Self::Reddit => Some("reddit.com"),
            Self::Crunchbase => Some("crunchbase.com"),
            Self::Bloomberg => Some("bloomberg.com"),
            Self::Reuters => Some("reuters.com"),
            Self::Wikipedia => Some("wikipedia.org"),
            Self::Custom(host) => Some(host.as_str()),
        }
    }

    /// Query actually sent to the provider for this source.
    pub fn provider_query(&self, query: &str) -> String {
        match (self, self.site()) {
            (Self::News, _) => format!("{query} latest news"),
            (_, Some(site)) => format!("site:{site} {query}"),
            (_, None) => query.to_string(),
        }
    }

    pub fn priority(&self) -> SourcePriority {
        use CategoryId::*;
        match self {
            Self::Web => SourcePriority {
                primary: &[KeyInsights],
                secondary: &[],
                weight: 1.0,
            },
            Self::LinkedIn => SourcePriority {
                primary: &[ExpertOpinions, CompetitiveLandscape],
                secondary: &[IndustryTrends],
                weight: 1.1,
            },
            Self::Twitter => SourcePriority {
                primary: &[SocialSentiment, NewsUpdates],
                secondary: &[IndustryTrends],
                weight: 0.8,
            },
            Self::Reddit => SourcePriority {
                primary: &[SocialSentiment],
                secondary: &[TechnologyInnovation],
                weight: 0.7,
            },
            Self::Crunchbase => SourcePriority {
                primary: &[FinancialAnalysis, CompetitiveLandscape],
                secondary: &[MarketOverview],
                weight: 1.3,
            },
            Self::Bloomberg => SourcePriority {
                primary: &[FinancialAnalysis, MarketOverview],
                secondary: &[NewsUpdates],
                weight: 1.4,
            },
            Self::Reuters => SourcePriority {
                primary: &[NewsUpdates, MarketOverview],
                secondary: &[RegulatoryPolicy, FinancialAnalysis],
                weight: 1.4,
            },
            Self::Wikipedia => SourcePriority {
                primary: &[KeyInsights],
                secondary: &[TechnologyInnovation],
                weight: 1.0,
            },
            Self::News => SourcePriority {
                primary: &[NewsUpdates],
                secondary: &[IndustryTrends, RegulatoryPolicy],
                weight: 0.9,
            },
            Self::Custom(_) => CUSTOM_PRIORITY,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag())
    }
}

/// Source scope of a search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchMode {
    /// Web-wide search plus any requested sources.
    #[default]
    Open,
    /// Curated sources only.
    Verified,
}

impl SearchMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "open" => Some(Self::Open),
            "verified" => Some(Self::Verified),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Verified => "verified",
        }
    }
}

/// Decide which sources a search fans out to.
///
/// Duplicates are removed while keeping first-seen order. Verified mode never includes the
/// unrestricted web search.
pub fn plan_sources(mode: SearchMode, requested: &[Source], custom_hosts: &[String]) -> Vec<Source> {
    fn push(source: Source, plan: &mut Vec<Source>) {
        if !plan.contains(&source) {
            plan.push(source);
        }
    }

    let mut plan: Vec<Source> = Vec::new();

    match mode {
        SearchMode::Open => {
            push(Source::Web, &mut plan);
            for source in requested {
                push(source.clone(), &mut plan);
            }
        }
        SearchMode::Verified => {
            let curated: Vec<&Source> = requested.iter().filter(|s| **s != Source::Web).collect();
            if curated.is_empty() {
                for source in DEFAULT_VERIFIED.iter() {
                    push(source.clone(), &mut plan);
                }
            } else {
                for source in curated {
                    push(source.clone(), &mut plan);
                }
            }
        }
    }

    for host in custom_hosts {
        push(Source::Custom(host.clone()), &mut plan);
    }
    plan
}

/// Results from one source, with the weight they are ordered by.
#[derive(Debug, Clone)]
pub struct SourceBatch {
    pub source: Source,
    pub weight: f64,
    pub results: Vec<SearchResult>,
}

/// Run one source fetch against `provider` and tag every result with the source.
pub async fn fetch_source<P: SearchProvider>(
    provider: &P,
    source: &Source,
    query: &str,
    limit: usize,
) -> Result<SourceBatch, CommonError> {
    let results = provider
        .search(&source.provider_query(query), limit)
        .await?
        .into_iter()
        .map(|r| SearchResult {
            source: source.tag(),
            ..r
        })
        .collect();
    Ok(SourceBatch {
        source: source.clone(),
        weight: source.priority().weight,
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_known_ids_case_insensitively() {
        assert_eq!(Source::parse("LinkedIn"), Some(Source::LinkedIn));
        assert_eq!(Source::parse(" x "), Some(Source::Twitter));
        assert_eq!(Source::parse("myspace"), None);
    }

    #[test]
    fn tag_round_trips_through_from_tag() {
        for source in [
            Source::Web,
            Source::Reddit,
            Source::News,
            Source::Custom("example.com".into()),
        ] {
            assert_eq!(Source::from_tag(&source.tag()), Some(source));
        }
    }

    #[test]
    fn provider_query_applies_site_restriction() {
        assert_eq!(
            Source::LinkedIn.provider_query("cloud computing"),
            "site:linkedin.com cloud computing"
        );
        assert_eq!(
            Source::Custom("gartner.com".into()).provider_query("cloud"),
            "site:gartner.com cloud"
        );
        assert_eq!(Source::Web.provider_query("cloud"), "cloud");
        assert_eq!(Source::News.provider_query("cloud"), "cloud latest news");
    }

    #[test]
    fn open_mode_starts_with_web_and_dedupes() {
        let plan = plan_sources(
            SearchMode::Open,
            &[Source::Reddit, Source::Web, Source::Reddit],
            &["example.com".to_string()],
        );
        assert_eq!(
            plan,
            vec![
                Source::Web,
                Source::Reddit,
                Source::Custom("example.com".into())
            ]
        );
    }

    #[test]
    fn verified_mode_defaults_to_curated_list() {
        let plan = plan_sources(SearchMode::Verified, &[Source::Web], &[]);
        assert_eq!(plan, DEFAULT_VERIFIED.to_vec());
    }

    #[test]
    fn verified_mode_keeps_requested_curated_sources() {
        let plan = plan_sources(SearchMode::Verified, &[Source::Bloomberg], &[]);
        assert_eq!(plan, vec![Source::Bloomberg]);
    }

    #[test]
    fn priority_table_weights_institutional_sources_highest() {
        assert!(Source::Bloomberg.priority().weight > Source::Web.priority().weight);
        assert!(Source::Reddit.priority().weight < Source::Web.priority().weight);
        assert!(Source::Crunchbase
            .priority()
            .primary
            .contains(&CategoryId::FinancialAnalysis));
    }

    #[test]
    fn mode_parses_from_path_segment() {
        assert_eq!(SearchMode::parse("Verified"), Some(SearchMode::Verified));
        assert_eq!(SearchMode::parse("open"), Some(SearchMode::Open));
        assert_eq!(SearchMode::parse("deep"), None);
    }
}
