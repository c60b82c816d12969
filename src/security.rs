//! Route authorization.
//!
//! The access policy is a plain ordered list of `(patterns, requirement)` rules evaluated by
//! `RuleSet::evaluate`, a pure function of the request path and the caller identity. The
//! `authorize` middleware in `lib.rs` is the only place that applies it to live requests.

use crate::auth::CallerIdentity;
use crate::models::{ROLE_ADMIN, ROLE_USER};

/// Paths reachable by everyone, in front of the standard rules.
pub const OPEN_ENDPOINTS: [&str; 5] = [
    "/login",
    "/logout",
    "/health",
    "/swagger-ui/**",
    "/api-docs/**",
];

/// Outcome of evaluating the rule set for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// A requirement was not met and the caller has not logged in.
    RedirectToLogin,
    /// The caller is logged in but lacks the required role.
    Forbidden,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// `*`: exactly one segment.
    AnySegment,
    /// `**`: zero or more segments.
    AnyDepth,
}

/// PathPattern
///
/// Ant-style path pattern compared segment by segment. Empty segments are ignored on both
/// sides, so `/admin/`, `//admin` and `/admin` are the same path, and `/` is the empty path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    source: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Self {
        let segments = pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match s {
                "**" => Segment::AnyDepth,
                "*" => Segment::AnySegment,
                literal => Segment::Literal(literal.to_string()),
            })
            .collect();
        Self {
            source: pattern.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, path: &str) -> bool {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        match_segments(&self.segments, &parts)
    }
}

fn match_segments(pattern: &[Segment], path: &[&str]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((Segment::AnyDepth, rest)) => {
            (0..=path.len()).any(|skip| match_segments(rest, &path[skip..]))
        }
        Some((Segment::AnySegment, rest)) => {
            !path.is_empty() && match_segments(rest, &path[1..])
        }
        Some((Segment::Literal(literal), rest)) => {
            path.first() == Some(&literal.as_str()) && match_segments(rest, &path[1..])
        }
    }
}

/// What a matching rule demands of the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    PermitAll,
    /// Allows callers that are not fully authenticated. For an authenticated caller the rule
    /// does not decide and evaluation continues with the next rule.
    NotFullyAuthenticated,
    HasAuthority(String),
    HasAnyAuthority(Vec<String>),
    Authenticated,
}

impl Requirement {
    /// `None` means "this rule does not decide".
    fn check(&self, caller: &CallerIdentity) -> Option<Decision> {
        let satisfied = match self {
            Requirement::PermitAll => true,
            Requirement::NotFullyAuthenticated => {
                return (!caller.authenticated).then_some(Decision::Allow);
            }
            Requirement::HasAuthority(role) => caller.authenticated && caller.has_role(role),
            Requirement::HasAnyAuthority(roles) => {
                caller.authenticated && roles.iter().any(|role| caller.has_role(role))
            }
            Requirement::Authenticated => caller.authenticated,
        };

        Some(if satisfied {
            Decision::Allow
        } else if caller.authenticated {
            Decision::Forbidden
        } else {
            Decision::RedirectToLogin
        })
    }
}

/// One entry of the rule list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRule {
    pub patterns: Vec<PathPattern>,
    pub requirement: Requirement,
}

impl AccessRule {
    pub fn new(patterns: &[&str], requirement: Requirement) -> Self {
        Self {
            patterns: patterns.iter().map(|p| PathPattern::parse(p)).collect(),
            requirement,
        }
    }

    pub fn applies_to(&self, path: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.matches(path))
    }
}

/// RuleSet
///
/// Ordered rules; the first rule that matches the path and decides wins. A path no rule
/// decides requires authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSet {
    rules: Vec<AccessRule>,
}

impl RuleSet {
    pub fn new(rules: Vec<AccessRule>) -> Self {
        Self { rules }
    }

    /// The four application rules, in priority order.
    ///
    /// Rule one grants the landing and registration pages to callers who are *not* logged in;
    /// logged-in callers fall through to the catch-all rule.
    pub fn standard() -> Self {
        Self::new(vec![
            AccessRule::new(
                &["/registration", "/index", "/"],
                Requirement::NotFullyAuthenticated,
            ),
            AccessRule::new(
                &["/admin/**"],
                Requirement::HasAuthority(ROLE_ADMIN.to_string()),
            ),
            AccessRule::new(
                &["/user/**"],
                Requirement::HasAnyAuthority(vec![ROLE_ADMIN.to_string(), ROLE_USER.to_string()]),
            ),
            AccessRule::new(&["/**"], Requirement::Authenticated),
        ])
    }

    /// `standard()` preceded by a permit-all rule for `OPEN_ENDPOINTS`.
    pub fn application() -> Self {
        let mut rules = vec![AccessRule::new(&OPEN_ENDPOINTS, Requirement::PermitAll)];
        rules.extend(Self::standard().rules);
        Self::new(rules)
    }

    pub fn rules(&self) -> &[AccessRule] {
        &self.rules
    }

    pub fn evaluate(&self, path: &str, caller: &CallerIdentity) -> Decision {
        self.rules
            .iter()
            .filter(|rule| rule.applies_to(path))
            .find_map(|rule| rule.requirement.check(caller))
            .unwrap_or_else(|| {
                Requirement::Authenticated
                    .check(caller)
                    .unwrap_or(Decision::RedirectToLogin)
            })
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::application()
    }
}
