//! Routing and escalation classifier.
//!
//! A pure function of the query tokens. Routes and contract domains come from ordered
//! `(keywords → tag)` tables; output order is table order, never query order.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const MIN_ESCALATION: u8 = 1;
pub const MAX_ESCALATION: u8 = 3;

#[derive(Debug, Clone, Copy)]
struct KeywordRule {
    tag: &'static str,
    keywords: &'static [&'static str],
}

const fn rule(tag: &'static str, keywords: &'static [&'static str]) -> KeywordRule {
    KeywordRule { tag, keywords }
}

const ROUTE_TABLE: &[KeywordRule] = &[
    rule(
        "auth",
        &[
            "auth", "authn", "authz", "authentication", "authorization", "login", "logout",
            "session", "sessions", "oauth", "jwt", "password", "passwords", "credential",
            "credentials", "permission", "permissions", "rbac", "sso",
        ],
    ),
    rule(
        "db",
        &[
            "db", "database", "databases", "sql", "postgres", "postgresql", "mysql", "sqlite",
            "schema", "schemas", "table", "tables", "orm", "transaction", "transactions",
            "migration", "migrations",
        ],
    ),
    rule(
        "api",
        &[
            "api", "apis", "endpoint", "endpoints", "rest", "graphql", "grpc", "http", "request",
            "requests", "response", "responses", "handler", "handlers", "webhook", "webhooks",
        ],
    ),
    rule(
        "ui",
        &[
            "ui", "ux", "frontend", "component", "components", "css", "layout", "style",
            "styling", "theme", "design", "typography", "spacing", "color", "accessibility",
            "a11y", "aria", "hydration", "ssr", "page", "pages",
        ],
    ),
    rule(
        "infra",
        &[
            "infra", "infrastructure", "deploy", "deployment", "deployments", "docker",
            "kubernetes", "k8s", "terraform", "ci", "helm", "cloud", "aws", "gcp", "azure",
        ],
    ),
    rule(
        "testing",
        &[
            "test", "tests", "testing", "e2e", "unit", "integration", "fixture", "fixtures",
            "mock", "mocks", "coverage", "flaky",
        ],
    ),
];

const CONTRACT_TABLE: &[KeywordRule] = &[
    rule(
        "http",
        &[
            "http", "https", "rest", "endpoint", "endpoints", "request", "requests", "response",
            "responses", "header", "headers", "status",
        ],
    ),
    rule(
        "middleware",
        &["middleware", "middlewares", "interceptor", "interceptors"],
    ),
    rule(
        "auth",
        &[
            "auth", "authn", "authz", "authentication", "authorization", "login", "logout",
            "session", "sessions", "oauth", "jwt", "password", "permission", "permissions",
        ],
    ),
    rule(
        "database",
        &[
            "db", "database", "sql", "postgres", "postgresql", "mysql", "sqlite", "schema",
            "migration", "migrations", "transaction", "transactions", "orm",
        ],
    ),
    rule(
        "validation",
        &["validation", "validate", "validator", "validators", "sanitize", "input"],
    ),
    rule(
        "errors",
        &["error", "errors", "exception", "exceptions", "panic", "failure", "failures"],
    ),
    rule(
        "caching",
        &["cache", "caches", "caching", "cached", "ttl", "invalidation", "redis"],
    ),
    rule(
        "events",
        &[
            "event", "events", "emit", "pubsub", "publisher", "subscriber", "webhook", "webhooks",
            "kafka",
        ],
    ),
    rule(
        "jobs",
        &[
            "job", "jobs", "worker", "workers", "queue", "queues", "cron", "scheduler",
            "background",
        ],
    ),
    rule(
        "config",
        &["config", "configuration", "settings", "env", "environment", "flag", "flags"],
    ),
    rule(
        "logging",
        &[
            "log", "logs", "logging", "logger", "tracing", "telemetry", "observability", "metrics",
        ],
    ),
    rule(
        "ui-design",
        &[
            "design", "theme", "spacing", "typography", "color", "component", "components", "css",
            "style", "styling",
        ],
    ),
    rule(
        "routing",
        &["routing", "router", "routes", "navigation", "url", "urls"],
    ),
    rule(
        "serialization",
        &[
            "serialization", "serialize", "deserialize", "json", "yaml", "protobuf", "encoding",
            "decoding",
        ],
    ),
];

/// A term whose meaning depends on the vocabulary around it.
#[derive(Debug, Clone, Copy)]
struct AmbiguousTerm {
    terms: &'static [&'static str],
    context: &'static [&'static str],
    /// `(route, contract)` when the context vocabulary co-occurs.
    with_context: (&'static str, &'static str),
    otherwise: (&'static str, &'static str),
}

const AMBIGUOUS_TERMS: &[AmbiguousTerm] = &[AmbiguousTerm {
    terms: &["token", "tokens"],
    context: &["design", "theme", "spacing", "typography", "color", "component"],
    with_context: ("ui", "ui-design"),
    otherwise: ("auth", "auth"),
}];

/// Evaluated highest tier first; the first matching row wins.
const ESCALATION_TABLE: &[(u8, &[&str])] = &[
    (
        3,
        &[
            "refactor", "refactoring", "migration", "migrations", "migrate", "incident",
            "incidents", "outage",
        ],
    ),
    (
        2,
        &[
            "modify", "change", "update", "edit", "behavior", "behaviour", "invariant",
            "invariants", "contract", "contracts",
        ],
    ),
];

/// Terms that pull in the design-profile summary.
pub const DESIGN_PROFILE_TRIGGERS: &[&str] = &[
    "ui", "ux", "accessibility", "a11y", "aria", "hydration", "ssr", "layout", "css", "style",
    "styling",
];

/// Terms that pull in the ledger.
pub const LEDGER_TRIGGERS: &[&str] = &[
    "refactor", "refactoring", "rewrite", "migration", "migrations", "migrate",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct QueryRouting {
    pub routes: Vec<String>,
    pub contracts: Vec<String>,
    pub escalation_level: u8,
}

impl QueryRouting {
    pub fn has_route(&self, route: &str) -> bool {
        self.routes.iter().any(|r| r == route)
    }

    /// Routed depths to fetch for this tier.
    pub fn depths(&self) -> std::ops::RangeInclusive<u8> {
        MIN_ESCALATION..=self.escalation_level
    }
}

pub struct RoutingClassifier;

impl RoutingClassifier {
    /// Classify query tokens. `explicit_routes` replaces the derived routes when non-empty;
    /// `escalation` overrides the derived tier and is clamped to `1..=3`.
    #[must_use]
    pub fn classify(
        tokens: &[String],
        explicit_routes: Option<&[String]>,
        escalation: Option<u8>,
    ) -> QueryRouting {
        let present: HashSet<&str> = tokens.iter().map(String::as_str).collect();

        let routes = match explicit_routes.map(normalize_routes) {
            Some(routes) if !routes.is_empty() => routes,
            _ => Self::tags(&present, ROUTE_TABLE, |(route, _)| route),
        };
        let contracts = Self::tags(&present, CONTRACT_TABLE, |(_, contract)| contract);
        let escalation_level = escalation
            .map(|level| level.clamp(MIN_ESCALATION, MAX_ESCALATION))
            .unwrap_or_else(|| Self::escalation(&present));

        QueryRouting {
            routes,
            contracts,
            escalation_level,
        }
    }

    #[must_use]
    pub fn escalation(present: &HashSet<&str>) -> u8 {
        ESCALATION_TABLE
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| present.contains(k)))
            .map_or(MIN_ESCALATION, |(tier, _)| *tier)
    }

    #[must_use]
    pub fn wants_design_profile(tokens: &[String], routing: &QueryRouting) -> bool {
        routing.has_route("ui") || mentions_any(tokens, DESIGN_PROFILE_TRIGGERS)
    }

    #[must_use]
    pub fn wants_ledger(tokens: &[String], include_state: bool) -> bool {
        include_state || mentions_any(tokens, LEDGER_TRIGGERS)
    }

    fn tags(
        present: &HashSet<&str>,
        table: &[KeywordRule],
        pick: impl Fn((&'static str, &'static str)) -> &'static str,
    ) -> Vec<String> {
        let mut matched: HashSet<&str> = table
            .iter()
            .filter(|rule| rule.keywords.iter().any(|k| present.contains(k)))
            .map(|rule| rule.tag)
            .collect();
        for ambiguous in AMBIGUOUS_TERMS {
            if !ambiguous.terms.iter().any(|t| present.contains(t)) {
                continue;
            }
            let resolved = if ambiguous.context.iter().any(|c| present.contains(c)) {
                ambiguous.with_context
            } else {
                ambiguous.otherwise
            };
            matched.insert(pick(resolved));
        }
        table
            .iter()
            .filter(|rule| matched.contains(rule.tag))
            .map(|rule| rule.tag.to_string())
            .collect()
    }
}

/// First explicit route that is not a plain directory name, as given.
///
/// Routes name directories under `routes/`, so only `[a-z0-9_-]+` is accepted after
/// trimming and lower-casing. Blank entries are ignored.
pub fn invalid_route(routes: &[String]) -> Option<&String> {
    routes.iter().find(|route| {
        let route = route.trim().to_lowercase();
        !route.is_empty()
            && !route
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
    })
}

fn normalize_routes(routes: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    routes
        .iter()
        .map(|route| route.trim().to_lowercase())
        .filter(|route| !route.is_empty())
        .filter(|route| seen.insert(route.clone()))
        .collect()
}

fn mentions_any(tokens: &[String], vocabulary: &[&str]) -> bool {
    tokens.iter().any(|t| vocabulary.contains(&t.as_str()))
}
