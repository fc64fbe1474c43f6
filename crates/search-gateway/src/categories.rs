//! Static category taxonomy.
//!
//! Categories are not created per request; the registry is a fixed table looked up by
//! [`CategoryId`].

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CategoryId {
    KeyInsights,
    MarketOverview,
    FinancialAnalysis,
    IndustryTrends,
    CompetitiveLandscape,
    TechnologyInnovation,
    ExpertOpinions,
    SocialSentiment,
    NewsUpdates,
    RegulatoryPolicy,
}

impl CategoryId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeyInsights => "key-insights",
            Self::MarketOverview => "market-overview",
            Self::FinancialAnalysis => "financial-analysis",
            Self::IndustryTrends => "industry-trends",
            Self::CompetitiveLandscape => "competitive-landscape",
            Self::TechnologyInnovation => "technology-innovation",
            Self::ExpertOpinions => "expert-opinions",
            Self::SocialSentiment => "social-sentiment",
            Self::NewsUpdates => "news-updates",
            Self::RegulatoryPolicy => "regulatory-policy",
        }
    }

    pub fn category(&self) -> &'static Category {
        // Registry order matches the enum order.
        &REGISTRY[*self as usize]
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A predefined taxonomy entry.
#[derive(Debug)]
pub struct Category {
    pub id: CategoryId,
    pub name: &'static str,
    /// Lower sorts first when weighted scores tie.
    pub priority: u8,
    pub color: &'static str,
    pub icon: &'static str,
    pub keywords: &'static [&'static str],
    /// Special categories (Key Insights) are scored on query coverage instead of keywords
    /// and are always placed first when they qualify.
    pub is_special: bool,
}

pub static REGISTRY: [Category; 10] = [
    Category {
        id: CategoryId::KeyInsights,
        name: "Key Insights",
        priority: 0,
        color: "#6366f1",
        icon: "lightbulb",
        keywords: &["key", "insight", "summary", "overview", "highlights", "takeaway"],
        is_special: true,
    },
    Category {
        id: CategoryId::MarketOverview,
        name: "Market Overview",
        priority: 1,
        color: "#0ea5e9",
        icon: "chart-pie",
        keywords: &[
            "market", "market size", "market share", "demand", "growth", "segment", "cagr",
            "forecast",
        ],
        is_special: false,
    },
    Category {
        id: CategoryId::FinancialAnalysis,
        name: "Financial Analysis",
        priority: 2,
        color: "#10b981",
        icon: "currency-dollar",
        keywords: &[
            "revenue", "profit", "earnings", "valuation", "funding", "investment", "financial",
            "margin", "billion", "million",
        ],
        is_special: false,
    },
    Category {
        id: CategoryId::IndustryTrends,
        name: "Industry Trends",
        priority: 3,
        color: "#f59e0b",
        icon: "trending-up",
        keywords: &["trend", "trends", "emerging", "adoption", "shift", "outlook", "future"],
        is_special: false,
    },
    Category {
        id: CategoryId::CompetitiveLandscape,
        name: "Competitive Landscape",
        priority: 4,
        color: "#ef4444",
        icon: "users",
        keywords: &[
            "competitor", "competitors", "competition", "leader", "leaders", "rival",
            "market leader", "versus",
        ],
        is_special: false,
    },
    Category {
        id: CategoryId::TechnologyInnovation,
        name: "Technology & Innovation",
        priority: 5,
        color: "#8b5cf6",
        icon: "cpu",
        keywords: &[
            "technology", "innovation", "ai", "platform", "cloud", "software", "patent",
            "launch",
        ],
        is_special: false,
    },
    Category {
        id: CategoryId::ExpertOpinions,
        name: "Expert Opinions",
        priority: 6,
        color: "#14b8a6",
        icon: "academic-cap",
        keywords: &["analyst", "expert", "according to", "research", "study", "report", "says"],
        is_special: false,
    },
    Category {
        id: CategoryId::SocialSentiment,
        name: "Social Sentiment",
        priority: 7,
        color: "#ec4899",
        icon: "chat",
        keywords: &["users", "community", "reddit", "twitter", "opinion", "sentiment", "discussion"],
        is_special: false,
    },
    Category {
        id: CategoryId::NewsUpdates,
        name: "News & Updates",
        priority: 8,
        color: "#64748b",
        icon: "newspaper",
        keywords: &["announced", "news", "today", "latest", "update", "week", "breaking"],
        is_special: false,
    },
    Category {
        id: CategoryId::RegulatoryPolicy,
        name: "Regulatory & Policy",
        priority: 9,
        color: "#a16207",
        icon: "scale",
        keywords: &["regulation", "regulatory", "policy", "compliance", "law", "government", "antitrust"],
        is_special: false,
    },
];

pub fn all() -> &'static [Category] {
    &REGISTRY
}
