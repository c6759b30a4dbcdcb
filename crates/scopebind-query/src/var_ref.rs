//! Variable references: `$scope.path.to.field`
//!
//! A filter leaf whose value is a string starting with `$` is a *variable
//! reference*. The first `.`-separated component may name a scope:
//!
//! - `$global`, `$session`, `$role`, `$query`, `$prev` → a named scope
//!   (`$token` is the legacy spelling of `$session`),
//! - `$<digits>` → a relative ancestor depth (`$1` is the nearest ancestor),
//! - anything else → no scope; the whole token is a path into the flat
//!   top-level context (kept for backwards compatibility).
//!
//! A single-component token (`$userId`) never carries a scope.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Segment = String;

// ============================================================================
// Scopes
// ============================================================================

/// The closed set of named variable scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamedScope {
    Global,
    Session,
    Role,
    Query,
    Prev,
}

impl NamedScope {
    pub const ALL: [NamedScope; 5] = [
        NamedScope::Global,
        NamedScope::Session,
        NamedScope::Role,
        NamedScope::Query,
        NamedScope::Prev,
    ];

    /// Canonical `$`-prefixed spelling.
    pub fn token(self) -> &'static str {
        match self {
            NamedScope::Global => "$global",
            NamedScope::Session => "$session",
            NamedScope::Role => "$role",
            NamedScope::Query => "$query",
            NamedScope::Prev => "$prev",
        }
    }

    /// Bare name, as used for top-level context keys.
    pub fn name(self) -> &'static str {
        &self.token()[1..]
    }

    /// Parse a bare scope name (no `$`). `token` is accepted as `session`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "global" => Some(NamedScope::Global),
            "session" | "token" => Some(NamedScope::Session),
            "role" => Some(NamedScope::Role),
            "query" => Some(NamedScope::Query),
            "prev" => Some(NamedScope::Prev),
            _ => None,
        }
    }
}

impl std::fmt::Display for NamedScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

/// Scope of a parsed variable reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarScope {
    /// No explicit scope: resolve against the flat top-level context.
    None,
    Named(NamedScope),
    /// Ancestor depth in the entity stack (`$1` = nearest ancestor).
    Relative(u32),
}

impl VarScope {
    pub fn is_relational(&self) -> bool {
        matches!(self, VarScope::Relative(_))
    }

    /// Scope category used by permission/tooling code: `"relational"` for
    /// ancestor references, the canonical `$name` for named scopes.
    pub fn kind(&self) -> &'static str {
        match self {
            VarScope::None => "unscoped",
            VarScope::Named(scope) => scope.token(),
            VarScope::Relative(_) => "relational",
        }
    }
}

/// Outcome of classifying the first component of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeClass {
    Named(NamedScope),
    Relative(u32),
    Unrecognized,
}

/// Classify a candidate leading segment such as `$session` or `$2`.
pub fn classify_scope(segment: &str) -> ScopeClass {
    match segment {
        "$global" => ScopeClass::Named(NamedScope::Global),
        "$session" | "$token" => ScopeClass::Named(NamedScope::Session),
        "$role" => ScopeClass::Named(NamedScope::Role),
        "$query" => ScopeClass::Named(NamedScope::Query),
        "$prev" => ScopeClass::Named(NamedScope::Prev),
        _ => match segment.strip_prefix('$') {
            Some(digits) if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
                // All-digit text only fails to parse on overflow.
                digits
                    .parse::<u32>()
                    .map(ScopeClass::Relative)
                    .unwrap_or(ScopeClass::Unrecognized)
            }
            _ => ScopeClass::Unrecognized,
        },
    }
}

// ============================================================================
// References
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VarRefError {
    #[error("malformed variable reference `{token}`: {reason}")]
    Malformed { token: String, reason: &'static str },
}

/// A parsed variable reference.
///
/// The verbatim token is kept next to the parsed form: resolution first
/// looks the token up as-is in the context before interpreting it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VarRef {
    token: String,
    scope: VarScope,
    path: Vec<Segment>,
}

/// `true` when `value` is a string that should be read as a variable.
pub fn is_value_variable(value: &serde_json::Value) -> bool {
    value.as_str().is_some_and(|s| s.starts_with('$'))
}

impl VarRef {
    pub fn parse(token: &str) -> Result<Self, VarRefError> {
        let malformed = |reason| VarRefError::Malformed {
            token: token.to_string(),
            reason,
        };

        let body = token
            .strip_prefix('$')
            .ok_or_else(|| malformed("must start with `$`"))?;
        if body.is_empty() {
            return Err(malformed("no path components"));
        }

        let components: Vec<&str> = token.split('.').collect();
        let (scope, path): (VarScope, Vec<&str>) = if components.len() == 1 {
            (VarScope::None, vec![body])
        } else {
            match classify_scope(components[0]) {
                ScopeClass::Named(scope) => (VarScope::Named(scope), components[1..].to_vec()),
                ScopeClass::Relative(depth) => {
                    (VarScope::Relative(depth), components[1..].to_vec())
                }
                ScopeClass::Unrecognized => (VarScope::None, body.split('.').collect()),
            }
        };

        if path.iter().any(|segment| segment.is_empty()) {
            return Err(malformed("empty path segment"));
        }

        Ok(Self {
            token: token.to_string(),
            scope,
            path: path.into_iter().map(str::to_string).collect(),
        })
    }

    /// Build a relative reference `$<depth>.<path>`.
    pub fn relative(depth: u32, path: Vec<Segment>) -> Result<Self, VarRefError> {
        Self::parse(&format!("${depth}.{}", path.join(".")))
    }

    /// Build a named-scope reference using the canonical scope spelling.
    pub fn named(scope: NamedScope, path: Vec<Segment>) -> Result<Self, VarRefError> {
        Self::parse(&format!("{}.{}", scope.token(), path.join(".")))
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn scope(&self) -> VarScope {
        self.scope
    }

    pub fn path(&self) -> &[Segment] {
        &self.path
    }

    pub fn depth(&self) -> Option<u32> {
        match self.scope {
            VarScope::Relative(depth) => Some(depth),
            _ => None,
        }
    }

    /// Same path at another ancestor depth, rendered canonically.
    ///
    /// Only meaningful for relative references; the result always has a
    /// relative scope.
    pub fn with_depth(&self, depth: u32) -> Self {
        Self {
            token: format!("${depth}.{}", self.path.join(".")),
            scope: VarScope::Relative(depth),
            path: self.path.clone(),
        }
    }
}

impl std::fmt::Display for VarRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.token)
    }
}

impl std::str::FromStr for VarRef {
    type Err = VarRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
