use scopebind_query::VarRefError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Malformed(#[from] VarRefError),
    #[error("variable `{token}` is out of bounds: depth {depth} in an entity stack of size {stack_len}")]
    OutOfBoundsScope {
        token: String,
        depth: u32,
        stack_len: usize,
    },
    #[error("view `{view}` referenced by `{token}` is not bound in the variable context")]
    UndefinedView { token: String, view: String },
    #[error("binding `{view}` referenced by `{token}` is not a view (expected an array of entities)")]
    NotAView { token: String, view: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("`{token}` resolved to an array containing a record, but liveness-map decoding is disabled")]
    RecordInSet { token: String },
    #[error("variable `{token}` did not resolve to a value")]
    Unresolved { token: String },
}
