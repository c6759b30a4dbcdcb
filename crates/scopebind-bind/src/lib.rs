//! Variable resolution and filter binding.
//!
//! Before predicates are evaluated, the executor hands a filter tree and a
//! [`VarContext`] to [`bind`], which returns a new tree with no outstanding
//! variable references:
//!
//! ```text
//!   ["ownerId", "=", "$1.id"]  ──resolve──►  entity_stack[len - 1].id
//!   ["tag", "in", "$view_7.tag"] ──broadcast──► {"x", "y"}  (value set)
//! ```
//!
//! Everything here is a pure function over borrowed inputs; outputs are
//! freshly allocated and never alias the context.
//!
//! ## Module Organization
//!
//! - `context`: named scopes, entity stack, open bindings (views etc.)
//! - `pointer`: get-by-path with an explicit absent result
//! - `resolve`: reference → value
//! - `binder`: tree rewriting and liveness-map reconciliation
//! - `config`: binder options

pub mod binder;
pub mod config;
pub mod context;
pub mod error;
pub mod pointer;
pub mod resolve;

pub use binder::{bind, bind_where, bind_with, reconcile_array, Binder};
pub use config::{BindConfig, LivenessDecoding};
pub use context::{EntityStack, VarContext};
pub use error::{BindError, ResolveError};
pub use pointer::get_path;
pub use resolve::{resolve, resolve_token, Resolved};

pub use scopebind_query as query;
