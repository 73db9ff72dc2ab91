//! Data models shared by the registry and the statement layer.

pub mod query;

pub use query::{ExecResult, QueryParam, Row};
