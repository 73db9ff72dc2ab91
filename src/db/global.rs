//! Process-wide default registry.
//!
//! Convenience wrappers for callers that want global access. The registry is
//! created on first use; call [`close`] once at shutdown.

use crate::config::PoolConfig;
use crate::db::handle::Db;
use crate::db::pool::Registry;
use crate::error::DbResult;
use std::sync::LazyLock;

static DEFAULT: LazyLock<Registry> = LazyLock::new(Registry::new);

/// The default process-wide registry.
pub fn global() -> &'static Registry {
    &DEFAULT
}

/// Register `name` on the default registry. See [`Registry::register`].
pub async fn register(name: &str, config: PoolConfig) -> DbResult<Db> {
    DEFAULT.register(name, config).await
}

/// Look up `name` on the default registry.
pub fn client(name: &str) -> DbResult<Db> {
    DEFAULT.client(name)
}

/// Look up `name` on the default registry, `None` if not registered.
pub fn use_db(name: &str) -> Option<Db> {
    DEFAULT.use_db(name)
}

/// Ping every pool on the default registry.
pub async fn health_check() -> DbResult<()> {
    DEFAULT.health_check().await
}

/// Close every pool on the default registry.
pub async fn close() -> DbResult<()> {
    DEFAULT.close_all().await
}
