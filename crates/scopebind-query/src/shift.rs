//! Subquery scope shifting.
//!
//! Relative references (`$1.id`, `$2.ownerId`, ...) count ancestors from the
//! point where a filter is evaluated. When a filter subtree moves one
//! subquery level deeper, every relative reference inside it must point one
//! level further up to keep naming the same ancestor (and the reverse when
//! it moves shallower). Named-scope and unscoped references do not move.
//!
//! Shifting preserves shape: same variants, same child counts, same order,
//! same non-relational leaves.

use thiserror::Error;

use crate::filter::{
    CollectionQuery, EmbeddedQuery, FilterGroup, FilterStatement, FilterTree, RelationshipExists,
    SubqueryExists, Where,
};
use crate::value::FilterValue;
use crate::var_ref::{VarRef, VarScope};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShiftError {
    #[error("shifting `{token}` by {step} would move above the outermost query")]
    DepthUnderflow { token: String, step: i64 },
    #[error("shifting `{token}` by {step} exceeds the maximum relative depth")]
    DepthOverflow { token: String, step: i64 },
}

/// Shift a single reference. Non-relative references are returned as-is.
pub fn shift_variable(var: &VarRef, step: i64) -> Result<VarRef, ShiftError> {
    let VarScope::Relative(depth) = var.scope() else {
        return Ok(var.clone());
    };
    let shifted = i64::from(depth) + step;
    if shifted < 0 {
        return Err(ShiftError::DepthUnderflow {
            token: var.token().to_string(),
            step,
        });
    }
    let shifted = u32::try_from(shifted).map_err(|_| ShiftError::DepthOverflow {
        token: var.token().to_string(),
        step,
    })?;
    Ok(var.with_depth(shifted))
}

/// Shift every relative reference in `tree` by `step` levels.
pub fn shift(tree: &FilterTree, step: i64) -> Result<FilterTree, ShiftError> {
    match tree {
        FilterTree::Statement(s) => {
            let value = match &s.value {
                FilterValue::Variable(var) => FilterValue::Variable(shift_variable(var, step)?),
                other => other.clone(),
            };
            Ok(FilterTree::Statement(FilterStatement {
                attribute: s.attribute.clone(),
                operator: s.operator.clone(),
                value,
            }))
        }
        FilterTree::Group(g) => Ok(FilterTree::Group(FilterGroup {
            mode: g.mode,
            filters: shift_where(&g.filters, step)?,
        })),
        FilterTree::SubqueryExists(s) => Ok(FilterTree::SubqueryExists(SubqueryExists {
            exists: EmbeddedQuery {
                collection_name: s.exists.collection_name.clone(),
                where_clause: shift_optional_where(s.exists.where_clause.as_ref(), step)?,
                rest: s.exists.rest.clone(),
            },
        })),
        FilterTree::RelationshipExists(r) => {
            Ok(FilterTree::RelationshipExists(RelationshipExists {
                relation: r.relation.clone(),
                where_clause: shift_optional_where(r.where_clause.as_ref(), step)?,
            }))
        }
    }
}

pub fn shift_where(where_clause: &Where, step: i64) -> Result<Where, ShiftError> {
    where_clause.iter().map(|f| shift(f, step)).collect()
}

fn shift_optional_where(
    where_clause: Option<&Where>,
    step: i64,
) -> Result<Option<Where>, ShiftError> {
    where_clause.map(|w| shift_where(w, step)).transpose()
}

/// Shift a whole query's `where` clause; a query without one is unchanged.
pub fn shift_query(query: &CollectionQuery, step: i64) -> Result<CollectionQuery, ShiftError> {
    Ok(CollectionQuery {
        collection_name: query.collection_name.clone(),
        where_clause: shift_optional_where(query.where_clause.as_ref(), step)?,
        rest: query.rest.clone(),
    })
}
