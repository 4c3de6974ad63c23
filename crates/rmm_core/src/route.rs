//! Keyword routing.
//!
//! A prompt is dispatched to a route by scanning an ordered table of
//! `(route, keywords)` rules. Matching is case-insensitive substring
//! containment; the first rule with any matching keyword wins and
//! everything else falls through to [`Route::General`].
//!
//! The table is plain data, so adding a route means registering a rule,
//! not editing the classifier.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Dispatch target for a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Route {
    /// Structured incident-response pipeline.
    #[serde(rename = "incident_agent")]
    Incident,
    /// Conversational passthrough to the model.
    #[serde(rename = "general")]
    General,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Incident => "incident_agent",
            Route::General => "general",
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Keywords that send a prompt down the incident pipeline.
pub const INCIDENT_KEYWORDS: &[&str] = &[
    "incident",
    "issue",
    "problem",
    "error",
    "alert",
    "down",
    "outage",
    "critical",
    "failure",
    "not working",
    "broken",
    "crash",
    "remediate",
    "fix",
    "resolve",
    "troubleshoot",
    "diagnose",
];

/// A single routing rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRule {
    pub route: Route,
    /// Lowercased keywords; any one of them matching selects the route.
    pub keywords: Vec<String>,
}

impl RouteRule {
    pub fn new<I, S>(route: Route, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            route,
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// Returns the first keyword contained in the (already lowercased) text.
    pub fn matched_keyword(&self, lowered: &str) -> Option<&str> {
        self.keywords
            .iter()
            .find(|k| lowered.contains(k.as_str()))
            .map(|k| k.as_str())
    }
}

/// Ordered table of routing rules.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    /// Create an empty table. Every prompt classifies as [`Route::General`].
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// The standard table: a single incident rule.
    pub fn standard() -> Self {
        let mut table = Self::new();
        table.register(RouteRule::new(Route::Incident, INCIDENT_KEYWORDS));
        table
    }

    /// Append a rule. Earlier rules take precedence.
    pub fn register(&mut self, rule: RouteRule) {
        debug!(route = %rule.route, keywords = rule.keywords.len(), "Registering route rule");
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Outcome of classification with the keyword that decided it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecision {
    pub route: Route,
    pub matched_keyword: Option<String>,
}

/// Maps prompt text to a [`Route`] without touching the model.
#[derive(Debug, Clone)]
pub struct Router {
    table: RouteTable,
}

impl Router {
    pub fn new(table: RouteTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Classify a prompt.
    pub fn classify(&self, prompt: &str) -> Route {
        self.explain(prompt).route
    }

    /// Classify a prompt and report which keyword matched.
    pub fn explain(&self, prompt: &str) -> RouteDecision {
        let lowered = prompt.to_lowercase();
        for rule in self.table.rules() {
            if let Some(keyword) = rule.matched_keyword(&lowered) {
                debug!(route = %rule.route, keyword, "Prompt matched route rule");
                return RouteDecision {
                    route: rule.route,
                    matched_keyword: Some(keyword.to_string()),
                };
            }
        }
        RouteDecision {
            route: Route::General,
            matched_keyword: None,
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new(RouteTable::standard())
    }
}
