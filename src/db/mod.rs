//! Database layer.
//!
//! This module provides:
//! - The named pool registry and its lifecycle operations
//! - Pool handles and the statement API
//! - Statement instrumentation (hooks, timing, SQL advisor)
//! - Parameter binding and row decoding for MySQL

pub mod advisor;
pub mod context;
pub mod executor;
pub mod global;
pub mod handle;
pub mod hook;
pub(crate) mod params;
pub mod pool;
pub mod types;

pub use advisor::Advisor;
pub use context::QueryContext;
pub use executor::{Executor, MySqlExecutor};
pub use global::{client, close, global, health_check, register, use_db};
pub use handle::Db;
pub use hook::{ExecutionSpan, Hook, Instrumented, QueryLogger, SQL_TARGET};
pub use pool::{Connector, MySqlConnector, Registry};
