//! Handle to a registered pool.

use crate::config::PoolConfig;
use crate::db::context::QueryContext;
use crate::db::executor::Executor;
use crate::error::SqlError;
use crate::models::{ExecResult, QueryParam, Row};
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;

/// A shared, cheaply clonable handle to one named pool.
///
/// Every caller registering or looking up the same name receives a handle to
/// the same pool. Handles cannot close the pool; only the registry can.
#[derive(Clone)]
pub struct Db {
    inner: Arc<DbInner>,
}

struct DbInner {
    name: String,
    config: PoolConfig,
    executor: Arc<dyn Executor>,
}

impl Db {
    pub(crate) fn new(
        name: impl Into<String>,
        config: PoolConfig,
        executor: Arc<dyn Executor>,
    ) -> Self {
        Self {
            inner: Arc::new(DbInner {
                name: name.into(),
                config,
                executor,
            }),
        }
    }

    /// Logical name this pool was registered under.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The finalized configuration the pool was built from.
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// True if both handles refer to the same pool.
    pub fn same_pool(&self, other: &Db) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub async fn execute(
        &self,
        ctx: &QueryContext,
        sql: &str,
        args: &[QueryParam],
    ) -> Result<ExecResult, SqlError> {
        self.inner.executor.execute(ctx, sql, args).await
    }

    pub async fn fetch_all(
        &self,
        ctx: &QueryContext,
        sql: &str,
        args: &[QueryParam],
    ) -> Result<Vec<Row>, SqlError> {
        self.inner.executor.fetch_all(ctx, sql, args).await
    }

    pub async fn fetch_optional(
        &self,
        ctx: &QueryContext,
        sql: &str,
        args: &[QueryParam],
    ) -> Result<Option<Row>, SqlError> {
        self.inner.executor.fetch_optional(ctx, sql, args).await
    }

    /// First row of the result, or [`SqlError::NoRows`].
    pub async fn fetch_one(
        &self,
        ctx: &QueryContext,
        sql: &str,
        args: &[QueryParam],
    ) -> Result<Row, SqlError> {
        self.fetch_optional(ctx, sql, args)
            .await?
            .ok_or(SqlError::NoRows)
    }

    /// Decode the first row into `T`, mapping column names through the
    /// pool's name mapper.
    pub async fn get<T: DeserializeOwned>(
        &self,
        ctx: &QueryContext,
        sql: &str,
        args: &[QueryParam],
    ) -> Result<T, SqlError> {
        self.fetch_one(ctx, sql, args)
            .await?
            .decode(self.inner.config.mapper())
    }

    /// Decode every row into `T`.
    pub async fn select<T: DeserializeOwned>(
        &self,
        ctx: &QueryContext,
        sql: &str,
        args: &[QueryParam],
    ) -> Result<Vec<T>, SqlError> {
        let mapper = self.inner.config.mapper();
        self.fetch_all(ctx, sql, args)
            .await?
            .into_iter()
            .map(|row| row.decode(mapper))
            .collect()
    }

    /// Round-trip to the server.
    pub async fn ping(&self) -> Result<(), SqlError> {
        self.inner.executor.ping().await
    }

    pub(crate) async fn close(&self) -> Result<(), SqlError> {
        self.inner.executor.close().await
    }
}

impl fmt::Debug for Db {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Db")
            .field("name", &self.inner.name)
            .field("max_open_conns", &self.inner.config.max_open_conns)
            .field("max_idle_conns", &self.inner.config.max_idle_conns)
            .field("instrument", &self.inner.config.instrument)
            .field("executor", &self.inner.executor)
            .finish()
    }
}
