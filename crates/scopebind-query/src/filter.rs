//! Filter trees.
//!
//! A query's `where` clause is an ordered list of [`FilterTree`] nodes that
//! are implicitly AND-ed. Each node is one of four explicit variants.
//!
//! Wire form (JSON), as written by query authors:
//!
//! ```text
//! statement     ["status", "=", "$session.role"]
//! group         {"mod": "and" | "or", "filters": [ ... ]}
//! subquery      {"exists": {"collectionName": "posts", "where": [ ... ], ...}}
//! relationship  {"exists": {"relation": "author", "where": [ ... ]}}
//! ```
//!
//! Decoding is a fixed decision procedure over these shapes; anything else
//! is a [`FilterShapeError`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::value::FilterValue;
use crate::var_ref::VarRefError;

/// An ordered list of filters, implicitly AND-ed.
pub type Where = Vec<FilterTree>;

// ============================================================================
// Model
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupMode {
    And,
    Or,
}

impl GroupMode {
    fn as_str(self) -> &'static str {
        match self {
            GroupMode::And => "and",
            GroupMode::Or => "or",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "and" | "AND" => Some(GroupMode::And),
            "or" | "OR" => Some(GroupMode::Or),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterStatement {
    pub attribute: String,
    pub operator: String,
    pub value: FilterValue,
}

impl FilterStatement {
    pub fn new(
        attribute: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<FilterValue>,
    ) -> Self {
        Self {
            attribute: attribute.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterGroup {
    pub mode: GroupMode,
    pub filters: Where,
}

/// A nested query embedded in an `exists` filter.
///
/// Only `where` is interpreted here; every other field of the query is
/// carried through `rest` untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedQuery {
    pub collection_name: String,
    pub where_clause: Option<Where>,
    pub rest: Map<String, Value>,
}

impl EmbeddedQuery {
    pub fn new(collection_name: impl Into<String>, where_clause: Option<Where>) -> Self {
        Self {
            collection_name: collection_name.into(),
            where_clause,
            rest: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubqueryExists {
    pub exists: EmbeddedQuery,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipExists {
    pub relation: String,
    pub where_clause: Option<Where>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum FilterTree {
    Statement(FilterStatement),
    Group(FilterGroup),
    SubqueryExists(SubqueryExists),
    RelationshipExists(RelationshipExists),
}

impl FilterTree {
    pub fn statement(
        attribute: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<FilterValue>,
    ) -> Self {
        FilterTree::Statement(FilterStatement::new(attribute, operator, value))
    }

    pub fn and(filters: Where) -> Self {
        FilterTree::Group(FilterGroup {
            mode: GroupMode::And,
            filters,
        })
    }

    pub fn or(filters: Where) -> Self {
        FilterTree::Group(FilterGroup {
            mode: GroupMode::Or,
            filters,
        })
    }

    pub fn subquery(query: EmbeddedQuery) -> Self {
        FilterTree::SubqueryExists(SubqueryExists { exists: query })
    }

    pub fn relationship(relation: impl Into<String>, where_clause: Option<Where>) -> Self {
        FilterTree::RelationshipExists(RelationshipExists {
            relation: relation.into(),
            where_clause,
        })
    }

    /// `true` if any statement in this tree (including nested `where`
    /// clauses) still holds a variable reference.
    pub fn has_variables(&self) -> bool {
        match self {
            FilterTree::Statement(s) => s.value.is_variable(),
            FilterTree::Group(g) => g.filters.iter().any(FilterTree::has_variables),
            FilterTree::SubqueryExists(s) => where_has_variables(s.exists.where_clause.as_ref()),
            FilterTree::RelationshipExists(r) => where_has_variables(r.where_clause.as_ref()),
        }
    }
}

fn where_has_variables(where_clause: Option<&Where>) -> bool {
    where_clause.is_some_and(|w| w.iter().any(FilterTree::has_variables))
}

/// A top-level collection query. Like [`EmbeddedQuery`], only `where` is
/// interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct CollectionQuery {
    pub collection_name: String,
    pub where_clause: Option<Where>,
    pub rest: Map<String, Value>,
}

// ============================================================================
// Wire codec
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterShapeError {
    #[error("statement must be a 3-element array [attribute, operator, value], got {len} elements")]
    StatementArity { len: usize },
    #[error("statement {field} must be a string")]
    StatementField { field: &'static str },
    #[error(transparent)]
    Variable(#[from] VarRefError),
    #[error("filter group mode must be \"and\" or \"or\", got {0}")]
    GroupMode(Value),
    #[error("filter group `filters` must be an array")]
    GroupFilters,
    #[error("`exists` must be an object with either `relation` or `collectionName`")]
    Exists,
    #[error("`where` must be an array of filters")]
    WhereClause,
    #[error("unrecognized filter shape: {0}")]
    Unrecognized(Value),
}

impl TryFrom<Value> for FilterTree {
    type Error = FilterShapeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Array(items) => decode_statement(items),
            Value::Object(mut obj) => {
                if let Some(exists) = obj.remove("exists") {
                    return decode_exists(exists);
                }
                let mode = obj.remove("mod").or_else(|| obj.remove("mode"));
                match (mode, obj.remove("filters")) {
                    (Some(mode), Some(filters)) => {
                        let Some(mode) = mode.as_str().and_then(GroupMode::parse) else {
                            return Err(FilterShapeError::GroupMode(mode));
                        };
                        let Value::Array(filters) = filters else {
                            return Err(FilterShapeError::GroupFilters);
                        };
                        Ok(FilterTree::Group(FilterGroup {
                            mode,
                            filters: decode_list(filters)?,
                        }))
                    }
                    _ => Err(FilterShapeError::Unrecognized(Value::Object(obj))),
                }
            }
            other => Err(FilterShapeError::Unrecognized(other)),
        }
    }
}

fn decode_statement(items: Vec<Value>) -> Result<FilterTree, FilterShapeError> {
    let len = items.len();
    let Ok([attribute, operator, value]) = <[Value; 3]>::try_from(items) else {
        return Err(FilterShapeError::StatementArity { len });
    };
    let Value::String(attribute) = attribute else {
        return Err(FilterShapeError::StatementField { field: "attribute" });
    };
    let Value::String(operator) = operator else {
        return Err(FilterShapeError::StatementField { field: "operator" });
    };
    Ok(FilterTree::Statement(FilterStatement {
        attribute,
        operator,
        value: FilterValue::from_json(value)?,
    }))
}

fn decode_exists(exists: Value) -> Result<FilterTree, FilterShapeError> {
    let Value::Object(mut obj) = exists else {
        return Err(FilterShapeError::Exists);
    };
    if let Some(relation) = obj.remove("relation") {
        let Value::String(relation) = relation else {
            return Err(FilterShapeError::Exists);
        };
        return Ok(FilterTree::RelationshipExists(RelationshipExists {
            relation,
            where_clause: decode_where(obj.remove("where"))?,
        }));
    }
    match obj.remove("collectionName") {
        Some(Value::String(collection_name)) => {
            let where_clause = decode_where(obj.remove("where"))?;
            Ok(FilterTree::SubqueryExists(SubqueryExists {
                exists: EmbeddedQuery {
                    collection_name,
                    where_clause,
                    rest: obj,
                },
            }))
        }
        _ => Err(FilterShapeError::Exists),
    }
}

fn decode_where(value: Option<Value>) -> Result<Option<Where>, FilterShapeError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => decode_list(items).map(Some),
        Some(_) => Err(FilterShapeError::WhereClause),
    }
}

fn decode_list(items: Vec<Value>) -> Result<Where, FilterShapeError> {
    items.into_iter().map(FilterTree::try_from).collect()
}

/// Decode a `where` clause (JSON array of filters).
pub fn parse_where(value: Value) -> Result<Where, FilterShapeError> {
    match value {
        Value::Array(items) => decode_list(items),
        _ => Err(FilterShapeError::WhereClause),
    }
}

fn encode_where(where_clause: &Where) -> Value {
    Value::Array(where_clause.iter().map(Value::from).collect())
}

impl From<&FilterTree> for Value {
    fn from(tree: &FilterTree) -> Self {
        match tree {
            FilterTree::Statement(s) => Value::Array(vec![
                Value::String(s.attribute.clone()),
                Value::String(s.operator.clone()),
                s.value.to_json(),
            ]),
            FilterTree::Group(g) => {
                let mut obj = Map::new();
                obj.insert("mod".into(), Value::String(g.mode.as_str().into()));
                obj.insert("filters".into(), encode_where(&g.filters));
                Value::Object(obj)
            }
            FilterTree::SubqueryExists(s) => {
                let mut query = s.exists.rest.clone();
                query.insert(
                    "collectionName".into(),
                    Value::String(s.exists.collection_name.clone()),
                );
                if let Some(w) = &s.exists.where_clause {
                    query.insert("where".into(), encode_where(w));
                }
                let mut obj = Map::new();
                obj.insert("exists".into(), Value::Object(query));
                Value::Object(obj)
            }
            FilterTree::RelationshipExists(r) => {
                let mut exists = Map::new();
                exists.insert("relation".into(), Value::String(r.relation.clone()));
                if let Some(w) = &r.where_clause {
                    exists.insert("where".into(), encode_where(w));
                }
                let mut obj = Map::new();
                obj.insert("exists".into(), Value::Object(exists));
                Value::Object(obj)
            }
        }
    }
}

impl From<FilterTree> for Value {
    fn from(tree: FilterTree) -> Self {
        Value::from(&tree)
    }
}

impl TryFrom<Value> for CollectionQuery {
    type Error = FilterShapeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Value::Object(mut obj) = value else {
            return Err(FilterShapeError::Unrecognized(value));
        };
        let Some(Value::String(collection_name)) = obj.remove("collectionName") else {
            return Err(FilterShapeError::Unrecognized(Value::Object(obj)));
        };
        let where_clause = decode_where(obj.remove("where"))?;
        Ok(CollectionQuery {
            collection_name,
            where_clause,
            rest: obj,
        })
    }
}

impl From<CollectionQuery> for Value {
    fn from(query: CollectionQuery) -> Self {
        let mut obj = query.rest;
        obj.insert(
            "collectionName".into(),
            Value::String(query.collection_name),
        );
        if let Some(w) = &query.where_clause {
            obj.insert("where".into(), encode_where(w));
        }
        Value::Object(obj)
    }
}
