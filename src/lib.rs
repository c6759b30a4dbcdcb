//! Workspace root. The libraries live under `crates/`; this package only
//! carries the cross-crate integration tests.
