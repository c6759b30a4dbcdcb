//! Variable resolution.
//!
//! Order of interpretation for a reference:
//! 1. the verbatim token as a key in `bindings` (already-normalized keys),
//! 2. `$<n>.path`: `path` inside the `n`-th ancestor of the entity stack,
//! 3. unscoped `$view_<id>.path`: `path` broadcast over every view item,
//! 4. `$<scope>.path`: `path` inside the named scope's record,
//! 5. unscoped `$path`: `path` against the flat top level.
//!
//! Step 1 wins even when the token would also parse as a relative or named
//! reference.

use scopebind_query::{VarRef, VarScope};
use serde_json::Value;

use crate::context::VarContext;
use crate::error::ResolveError;
use crate::pointer::get_path;

const VIEW_PREFIX: &str = "view_";

/// Result of resolving a reference. Owned; never borrows from the context.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// The reference is well-formed but nothing is there.
    Absent,
    Value(Value),
}

impl Resolved {
    pub fn into_value(self) -> Option<Value> {
        match self {
            Resolved::Absent => None,
            Resolved::Value(value) => Some(value),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Resolved::Absent)
    }
}

impl From<Option<&Value>> for Resolved {
    fn from(value: Option<&Value>) -> Self {
        value.map_or(Resolved::Absent, |v| Resolved::Value(v.clone()))
    }
}

/// Parse `token` and resolve it. The verbatim-key check runs before
/// parsing, so keys that are not valid references still resolve.
pub fn resolve_token(token: &str, ctx: &VarContext) -> Result<Resolved, ResolveError> {
    if let Some(value) = ctx.bindings.get(token) {
        return Ok(Resolved::Value(value.clone()));
    }
    resolve(&VarRef::parse(token)?, ctx)
}

pub fn resolve(var: &VarRef, ctx: &VarContext) -> Result<Resolved, ResolveError> {
    if let Some(value) = ctx.bindings.get(var.token()) {
        tracing::trace!(token = %var, "resolved from verbatim context key");
        return Ok(Resolved::Value(value.clone()));
    }

    let path = var.path();
    let resolved = match var.scope() {
        VarScope::Relative(depth) => {
            let entity = ctx.entity_stack.ancestor(depth, var.token()).inspect_err(|err| {
                tracing::warn!(token = %var, error = %err, "relative reference out of bounds");
            })?;
            Resolved::from(get_path(entity, path))
        }
        VarScope::None if path[0].starts_with(VIEW_PREFIX) => broadcast_view(var, ctx)?,
        VarScope::Named(scope) => Resolved::from(get_path(ctx.scope(scope), path)),
        VarScope::None => {
            Resolved::from(ctx.top_level(&path[0]).and_then(|root| get_path(root, &path[1..])))
        }
    };

    tracing::trace!(token = %var, absent = resolved.is_absent(), "resolved variable");
    Ok(resolved)
}

/// `$view_<id>.a.b` → `[item0.a.b, item1.a.b, ...]` in view order.
///
/// Always array-shaped, one element per item; items where the path is
/// missing contribute `null`.
fn broadcast_view(var: &VarRef, ctx: &VarContext) -> Result<Resolved, ResolveError> {
    let view_name = &var.path()[0];
    let item_path = &var.path()[1..];

    let Some(view) = ctx.bindings.get(view_name.as_str()) else {
        let err = ResolveError::UndefinedView {
            token: var.token().to_string(),
            view: view_name.clone(),
        };
        tracing::warn!(token = %var, error = %err, "view is not materialized");
        return Err(err);
    };
    let Value::Array(items) = view else {
        return Err(ResolveError::NotAView {
            token: var.token().to_string(),
            view: view_name.clone(),
        });
    };

    tracing::debug!(token = %var, items = items.len(), "broadcasting path over view");
    let values = items
        .iter()
        .map(|item| get_path(item, item_path).cloned().unwrap_or(Value::Null))
        .collect();
    Ok(Resolved::Value(Value::Array(values)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scopebind_query::NamedScope;
    use serde_json::json;

    fn var(token: &str) -> VarRef {
        VarRef::parse(token).unwrap()
    }

    #[test]
    fn relative_depth_one_is_the_nearest_ancestor() {
        let ctx = VarContext::new()
            .with_entity(json!({"id": 1, "ownerId": "outer"}))
            .with_entity(json!({"id": 2, "ownerId": "inner"}));
        assert_eq!(
            resolve(&var("$1.ownerId"), &ctx).unwrap(),
            Resolved::Value(json!("inner"))
        );
        assert_eq!(
            resolve(&var("$2.ownerId"), &ctx).unwrap(),
            Resolved::Value(json!("outer"))
        );
        assert_eq!(resolve(&var("$1.missing"), &ctx).unwrap(), Resolved::Absent);
    }

    #[test]
    fn out_of_bounds_is_an_error_not_a_default() {
        let ctx = VarContext::new().with_entity(json!({"ownerId": 7}));
        assert_eq!(
            resolve(&var("$1.ownerId"), &ctx).unwrap(),
            Resolved::Value(json!(7))
        );
        assert!(matches!(
            resolve(&var("$2.ownerId"), &ctx),
            Err(ResolveError::OutOfBoundsScope { depth: 2, stack_len: 1, .. })
        ));
        assert!(matches!(
            resolve(&var("$1.ownerId"), &VarContext::new()),
            Err(ResolveError::OutOfBoundsScope { stack_len: 0, .. })
        ));
    }

    #[test]
    fn view_references_broadcast_over_items() {
        let ctx = VarContext::new().with_view(7, vec![json!({"tag": "x"}), json!({"tag": "y"})]);
        assert_eq!(
            resolve(&var("$view_7.tag"), &ctx).unwrap(),
            Resolved::Value(json!(["x", "y"]))
        );

        let single = VarContext::new().with_view(1, vec![json!({"tag": "only"})]);
        assert_eq!(
            resolve(&var("$view_1.tag"), &single).unwrap(),
            Resolved::Value(json!(["only"]))
        );

        let sparse = VarContext::new().with_view(2, vec![json!({"tag": "a"}), json!({})]);
        assert_eq!(
            resolve(&var("$view_2.tag"), &sparse).unwrap(),
            Resolved::Value(json!(["a", null]))
        );
    }

    #[test]
    fn view_errors() {
        assert!(matches!(
            resolve(&var("$view_9.tag"), &VarContext::new()),
            Err(ResolveError::UndefinedView { ref view, .. }) if view == "view_9"
        ));
        let ctx = VarContext::new().with_binding("view_9", json!({"tag": "x"}));
        assert!(matches!(
            resolve(&var("$view_9.tag"), &ctx),
            Err(ResolveError::NotAView { .. })
        ));
    }

    #[test]
    fn named_scopes_resolve_inside_their_record() {
        let ctx = VarContext::new()
            .with_scope(NamedScope::Session, json!({"user": {"id": "u1"}}))
            .with_scope(NamedScope::Role, json!({"name": "editor"}));
        assert_eq!(
            resolve(&var("$session.user.id"), &ctx).unwrap(),
            Resolved::Value(json!("u1"))
        );
        assert_eq!(
            resolve(&var("$role.name"), &ctx).unwrap(),
            Resolved::Value(json!("editor"))
        );
        assert_eq!(resolve(&var("$query.limit"), &ctx).unwrap(), Resolved::Absent);
    }

    #[test]
    fn token_and_session_resolve_identically() {
        let ctx = VarContext::new().with_scope(NamedScope::Session, json!({"sub": "abc"}));
        assert_eq!(
            resolve(&var("$token.sub"), &ctx).unwrap(),
            resolve(&var("$session.sub"), &ctx).unwrap()
        );
    }

    #[test]
    fn unscoped_references_use_the_flat_top_level() {
        let ctx = VarContext::new()
            .with_binding("userId", json!("u9"))
            .with_binding("org", json!({"plan": "pro"}))
            .with_scope(NamedScope::Session, json!({"sub": "s"}));
        assert_eq!(resolve(&var("$userId"), &ctx).unwrap(), Resolved::Value(json!("u9")));
        assert_eq!(resolve(&var("$org.plan"), &ctx).unwrap(), Resolved::Value(json!("pro")));
        assert_eq!(
            resolve(&var("$session"), &ctx).unwrap(),
            Resolved::Value(json!({"sub": "s"}))
        );
        assert_eq!(resolve(&var("$nope.x"), &ctx).unwrap(), Resolved::Absent);
    }

    #[test]
    fn verbatim_key_wins_over_relative_interpretation() {
        let ctx = VarContext::new()
            .with_entity(json!({"id": "from-stack"}))
            .with_binding("$1.id", json!("from-key"));
        assert_eq!(
            resolve(&var("$1.id"), &ctx).unwrap(),
            Resolved::Value(json!("from-key"))
        );

        // The key also short-circuits an otherwise out-of-bounds depth.
        let ctx = VarContext::new().with_binding("$5.id", json!(5));
        assert_eq!(resolve(&var("$5.id"), &ctx).unwrap(), Resolved::Value(json!(5)));
    }

    #[test]
    fn resolve_token_checks_verbatim_keys_before_parsing() {
        let ctx = VarContext::new().with_binding("$", json!("odd"));
        assert_eq!(resolve_token("$", &ctx).unwrap(), Resolved::Value(json!("odd")));
        assert!(matches!(
            resolve_token("$session.", &VarContext::new()),
            Err(ResolveError::Malformed(_))
        ));
    }
}
