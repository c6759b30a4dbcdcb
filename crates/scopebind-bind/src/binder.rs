//! Filter binding: replace every variable reference in a filter tree with
//! its resolved value.
//!
//! Array-shaped resolutions become a [`ValueSet`]. Multi-value attributes
//! are stored as liveness maps (`{"a": true, "b": false}`, where `false`
//! marks a removed member), so a record inside such an array contributes
//! only its alive keys.

use scopebind_query::{
    EmbeddedQuery, FilterGroup, FilterStatement, FilterTree, FilterValue, RelationshipExists,
    Scalar, SubqueryExists, ValueSet, VarRef, Where,
};
use serde_json::Value;

use crate::config::{BindConfig, LivenessDecoding};
use crate::context::VarContext;
use crate::error::BindError;
use crate::resolve::{resolve, Resolved};

/// Binds filter trees against a context under a fixed configuration.
#[derive(Debug, Clone, Default)]
pub struct Binder {
    config: BindConfig,
}

impl Binder {
    pub fn new(config: BindConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BindConfig {
        &self.config
    }

    pub fn bind(&self, tree: &FilterTree, ctx: &VarContext) -> Result<FilterTree, BindError> {
        match tree {
            FilterTree::Statement(s) => Ok(FilterTree::Statement(FilterStatement {
                attribute: s.attribute.clone(),
                operator: s.operator.clone(),
                value: self.bind_value(&s.value, ctx)?,
            })),
            FilterTree::Group(g) => Ok(FilterTree::Group(FilterGroup {
                mode: g.mode,
                filters: self.bind_where(&g.filters, ctx)?,
            })),
            FilterTree::SubqueryExists(s) => Ok(FilterTree::SubqueryExists(SubqueryExists {
                exists: EmbeddedQuery {
                    collection_name: s.exists.collection_name.clone(),
                    where_clause: self.bind_optional_where(s.exists.where_clause.as_ref(), ctx)?,
                    rest: s.exists.rest.clone(),
                },
            })),
            FilterTree::RelationshipExists(r) => {
                Ok(FilterTree::RelationshipExists(RelationshipExists {
                    relation: r.relation.clone(),
                    where_clause: self.bind_optional_where(r.where_clause.as_ref(), ctx)?,
                }))
            }
        }
    }

    pub fn bind_where(&self, where_clause: &Where, ctx: &VarContext) -> Result<Where, BindError> {
        where_clause.iter().map(|f| self.bind(f, ctx)).collect()
    }

    fn bind_optional_where(
        &self,
        where_clause: Option<&Where>,
        ctx: &VarContext,
    ) -> Result<Option<Where>, BindError> {
        where_clause.map(|w| self.bind_where(w, ctx)).transpose()
    }

    fn bind_value(&self, value: &FilterValue, ctx: &VarContext) -> Result<FilterValue, BindError> {
        let FilterValue::Variable(var) = value else {
            return Ok(value.clone());
        };
        match resolve(var, ctx)? {
            Resolved::Absent if self.config.require_resolved => Err(BindError::Unresolved {
                token: var.token().to_string(),
            }),
            Resolved::Absent => Ok(FilterValue::Undefined),
            Resolved::Value(Value::Array(items)) => {
                let set = reconcile_array(var, &items, self.config.liveness)?;
                tracing::debug!(token = %var, members = set.len(), "bound variable to value set");
                Ok(FilterValue::Set(set))
            }
            Resolved::Value(other) => Ok(FilterValue::Literal(other)),
        }
    }
}

/// Flatten an array-valued resolution into a set.
///
/// Scalars are added as-is. Records are liveness maps: each key whose
/// value is truthy is added as a string member. Nested arrays (a view
/// broadcast over an array attribute) contribute their members the same way.
pub fn reconcile_array(
    var: &VarRef,
    items: &[Value],
    liveness: LivenessDecoding,
) -> Result<ValueSet, BindError> {
    let mut set = ValueSet::new();
    collect_members(var, items, liveness, &mut set)?;
    Ok(set)
}

fn collect_members(
    var: &VarRef,
    items: &[Value],
    liveness: LivenessDecoding,
    set: &mut ValueSet,
) -> Result<(), BindError> {
    for item in items {
        match item {
            Value::Object(members) => {
                if liveness == LivenessDecoding::Disabled {
                    return Err(BindError::RecordInSet {
                        token: var.token().to_string(),
                    });
                }
                for (member, alive) in members {
                    if is_truthy(alive) {
                        set.insert(Scalar::String(member.clone()));
                    }
                }
            }
            Value::Array(nested) => collect_members(var, nested, liveness, set)?,
            scalar => {
                if let Some(scalar) = Scalar::from_json(scalar) {
                    set.insert(scalar);
                }
            }
        }
    }
    Ok(())
}

/// JSON truthiness: `false`, `null`, `0` and `""` are falsy.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Bind a tree with the default configuration.
pub fn bind(tree: &FilterTree, ctx: &VarContext) -> Result<FilterTree, BindError> {
    Binder::default().bind(tree, ctx)
}

pub fn bind_with(
    tree: &FilterTree,
    ctx: &VarContext,
    config: &BindConfig,
) -> Result<FilterTree, BindError> {
    Binder::new(config.clone()).bind(tree, ctx)
}

/// Bind every filter of a `where` clause with the default configuration.
pub fn bind_where(where_clause: &Where, ctx: &VarContext) -> Result<Where, BindError> {
    let bound = Binder::default().bind_where(where_clause, ctx)?;
    tracing::debug!(filters = bound.len(), "bound where clause");
    Ok(bound)
}
