//! Runtime variable context.
//!
//! Built by the query executor once per query (and per subquery re-entry)
//! and only read here.

use scopebind_query::NamedScope;
use serde_json::{Map, Value};

use crate::error::ResolveError;

/// Ancestor entities of the subquery currently being evaluated, nearest
/// ancestor last.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityStack {
    entities: Vec<Value>,
}

impl EntityStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entity: Value) {
        self.entities.push(entity);
    }

    pub fn pop(&mut self) -> Option<Value> {
        self.entities.pop()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// The entity `depth` levels up (`1` = nearest ancestor).
    ///
    /// `token` is only used to describe the failure.
    pub fn ancestor(&self, depth: u32, token: &str) -> Result<&Value, ResolveError> {
        let out_of_bounds = || ResolveError::OutOfBoundsScope {
            token: token.to_string(),
            depth,
            stack_len: self.entities.len(),
        };
        let depth = usize::try_from(depth).map_err(|_| out_of_bounds())?;
        if depth == 0 || depth > self.entities.len() {
            return Err(out_of_bounds());
        }
        Ok(&self.entities[self.entities.len() - depth])
    }
}

impl From<Vec<Value>> for EntityStack {
    fn from(entities: Vec<Value>) -> Self {
        Self { entities }
    }
}

impl FromIterator<Value> for EntityStack {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self {
            entities: iter.into_iter().collect(),
        }
    }
}

/// Variables available to a query.
///
/// Named scopes and the entity stack are typed fields. Everything else
/// (verbatim keys, `view_<id>` views, unscoped top-level data) lives in
/// the open `bindings` map.
#[derive(Debug, Clone, PartialEq)]
pub struct VarContext {
    pub global: Value,
    pub session: Value,
    pub role: Value,
    pub query: Value,
    pub prev: Value,
    pub entity_stack: EntityStack,
    pub bindings: Map<String, Value>,
}

impl Default for VarContext {
    fn default() -> Self {
        Self {
            global: Value::Object(Map::new()),
            session: Value::Object(Map::new()),
            role: Value::Object(Map::new()),
            query: Value::Object(Map::new()),
            prev: Value::Object(Map::new()),
            entity_stack: EntityStack::new(),
            bindings: Map::new(),
        }
    }
}

impl VarContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scope(&self, scope: NamedScope) -> &Value {
        match scope {
            NamedScope::Global => &self.global,
            NamedScope::Session => &self.session,
            NamedScope::Role => &self.role,
            NamedScope::Query => &self.query,
            NamedScope::Prev => &self.prev,
        }
    }

    pub fn scope_mut(&mut self, scope: NamedScope) -> &mut Value {
        match scope {
            NamedScope::Global => &mut self.global,
            NamedScope::Session => &mut self.session,
            NamedScope::Role => &mut self.role,
            NamedScope::Query => &mut self.query,
            NamedScope::Prev => &mut self.prev,
        }
    }

    pub fn with_scope(mut self, scope: NamedScope, value: Value) -> Self {
        *self.scope_mut(scope) = value;
        self
    }

    pub fn with_entity(mut self, entity: Value) -> Self {
        self.entity_stack.push(entity);
        self
    }

    pub fn with_entity_stack(mut self, stack: impl Into<EntityStack>) -> Self {
        self.entity_stack = stack.into();
        self
    }

    /// Bind a materialized view under `view_<id>`.
    pub fn with_view(mut self, id: impl std::fmt::Display, items: Vec<Value>) -> Self {
        self.bindings
            .insert(format!("view_{id}"), Value::Array(items));
        self
    }

    pub fn with_binding(mut self, key: impl Into<String>, value: Value) -> Self {
        self.bindings.insert(key.into(), value);
        self
    }

    /// Look up a top-level name for unscoped references: explicit bindings
    /// first, then the named scope records under their bare names.
    pub fn top_level(&self, key: &str) -> Option<&Value> {
        self.bindings
            .get(key)
            .or_else(|| NamedScope::from_name(key).map(|scope| self.scope(scope)))
    }

    /// Build a context from the flat record hosts usually pass around:
    ///
    /// ```text
    /// {"$session": {...}, "role": {...}, "entityStack": [...], "view_7": [...], "limit": 3}
    /// ```
    ///
    /// Named scope keys (with or without `$`; `token` is `session`) go to
    /// their typed fields. When several keys name the same scope, the winner
    /// does not depend on key order: `$session` beats `session`, which beats
    /// `$token`, which beats `token`.
    ///
    /// An array `entityStack` becomes the entity stack and also stays in
    /// `bindings`, so `$entityStack.0.id` still resolves. Everything else is
    /// kept in `bindings`.
    pub fn from_json(value: Value) -> Self {
        let mut ctx = Self::default();
        let Value::Object(map) = value else {
            return ctx;
        };
        let mut ranks = [None::<u8>; NamedScope::ALL.len()];
        for (key, value) in map {
            if key == "entityStack" {
                if let Value::Array(entities) = &value {
                    ctx.entity_stack = EntityStack::from(entities.clone());
                }
                ctx.bindings.insert(key, value);
                continue;
            }
            let bare = key.strip_prefix('$').unwrap_or(&key);
            let Some(scope) = NamedScope::from_name(bare) else {
                ctx.bindings.insert(key, value);
                continue;
            };
            let rank = scope_key_rank(&key, scope);
            let slot = &mut ranks[scope as usize];
            if slot.is_some_and(|held| held > rank) {
                tracing::debug!(key = %key, scope = %scope, "scope already set by a stronger key");
                continue;
            }
            *slot = Some(rank);
            *ctx.scope_mut(scope) = value;
        }
        ctx
    }
}

/// Canonical names outrank aliases; `$`-prefixed keys outrank bare ones.
fn scope_key_rank(key: &str, scope: NamedScope) -> u8 {
    let prefixed = key.starts_with('$');
    let bare = key.strip_prefix('$').unwrap_or(key);
    let canonical = bare == scope.name();
    u8::from(canonical) * 2 + u8::from(prefixed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ancestor_counts_from_the_end() {
        let stack: EntityStack = vec![json!({"id": 1}), json!({"id": 2})].into();
        assert_eq!(stack.ancestor(1, "$1.id").unwrap(), &json!({"id": 2}));
        assert_eq!(stack.ancestor(2, "$2.id").unwrap(), &json!({"id": 1}));
        assert!(matches!(
            stack.ancestor(3, "$3.id"),
            Err(ResolveError::OutOfBoundsScope { depth: 3, stack_len: 2, .. })
        ));
        assert!(matches!(
            stack.ancestor(0, "$0.id"),
            Err(ResolveError::OutOfBoundsScope { depth: 0, .. })
        ));
    }

    #[test]
    fn from_json_routes_known_keys() {
        let ctx = VarContext::from_json(json!({
            "$token": {"sub": "u1"},
            "role": {"name": "admin"},
            "entityStack": [{"id": 42}],
            "view_3": [{"tag": "x"}],
            "limit": 10
        }));
        assert_eq!(ctx.session, json!({"sub": "u1"}));
        assert_eq!(ctx.role, json!({"name": "admin"}));
        assert_eq!(ctx.entity_stack.len(), 1);
        assert_eq!(ctx.bindings.get("view_3"), Some(&json!([{"tag": "x"}])));
        assert_eq!(ctx.top_level("limit"), Some(&json!(10)));
        assert_eq!(ctx.top_level("session"), Some(&json!({"sub": "u1"})));
    }

    #[test]
    fn duplicate_scope_keys_resolve_by_precedence_not_order() {
        let ctx = VarContext::from_json(json!({
            "$session": {"from": "$session"},
            "session": {"from": "session"},
            "token": {"from": "token"}
        }));
        assert_eq!(ctx.session, json!({"from": "$session"}));

        let ctx = VarContext::from_json(json!({
            "$token": {"from": "$token"},
            "session": {"from": "session"},
            "token": {"from": "token"}
        }));
        assert_eq!(ctx.session, json!({"from": "session"}));
    }

    #[test]
    fn entity_stack_stays_visible_as_a_binding() {
        let ctx = VarContext::from_json(json!({"entityStack": [{"id": 42}]}));
        assert_eq!(ctx.entity_stack.len(), 1);
        assert_eq!(ctx.top_level("entityStack"), Some(&json!([{"id": 42}])));

        let ctx = VarContext::from_json(json!({"entityStack": "oops"}));
        assert!(ctx.entity_stack.is_empty());
        assert_eq!(ctx.bindings.get("entityStack"), Some(&json!("oops")));
    }

    #[test]
    fn builders_compose() {
        let ctx = VarContext::new()
            .with_scope(NamedScope::Global, json!({"tenant": "t"}))
            .with_entity(json!({"id": 1}))
            .with_view(9, vec![json!({"a": 1})]);
        assert_eq!(ctx.scope(NamedScope::Global), &json!({"tenant": "t"}));
        assert_eq!(ctx.entity_stack.len(), 1);
        assert!(ctx.bindings.contains_key("view_9"));
    }
}
