//! Query-side data model for variable binding.
//!
//! - `var_ref`: `$scope.path` variable references and scope classification
//! - `value`: filter operands (literals, references, bound value sets)
//! - `filter`: the four-variant filter tree and its JSON wire form
//! - `shift`: re-targeting relative references when subqueries nest

pub mod filter;
pub mod shift;
pub mod value;
pub mod var_ref;

pub use filter::{
    parse_where, CollectionQuery, EmbeddedQuery, FilterGroup, FilterShapeError, FilterStatement,
    FilterTree, GroupMode, RelationshipExists, SubqueryExists, Where,
};
pub use shift::{shift, shift_query, shift_variable, shift_where, ShiftError};
pub use value::{FilterValue, Scalar, ValueSet};
pub use var_ref::{
    classify_scope, is_value_variable, NamedScope, ScopeClass, VarRef, VarRefError, VarScope,
};
