//! Shared fakes for registry integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use mysql_registry::config::PoolConfig;
use mysql_registry::db::{Connector, ExecutionSpan, Executor, Hook};
use mysql_registry::{DbResult, ExecResult, QueryContext, QueryParam, Row, SqlError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory pool. Statements whose text starts with `FAIL` return a
/// transport error; everything else succeeds.
#[derive(Debug, Default)]
pub struct FakePool {
    pub id: usize,
    pub closes: AtomicUsize,
    pub pings: AtomicUsize,
    pub unreachable: bool,
}

#[async_trait]
impl Executor for FakePool {
    async fn execute(
        &self,
        _ctx: &QueryContext,
        sql: &str,
        _args: &[QueryParam],
    ) -> Result<ExecResult, SqlError> {
        if sql.starts_with("FAIL") {
            return Err(SqlError::transport("boom"));
        }
        Ok(ExecResult {
            rows_affected: 1,
            last_insert_id: None,
        })
    }

    async fn fetch_all(
        &self,
        _ctx: &QueryContext,
        _sql: &str,
        _args: &[QueryParam],
    ) -> Result<Vec<Row>, SqlError> {
        Ok(Vec::new())
    }

    async fn fetch_optional(
        &self,
        _ctx: &QueryContext,
        _sql: &str,
        _args: &[QueryParam],
    ) -> Result<Option<Row>, SqlError> {
        Ok(None)
    }

    async fn ping(&self) -> Result<(), SqlError> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        if self.unreachable {
            Err(SqlError::transport("connection refused"))
        } else {
            Ok(())
        }
    }

    async fn close(&self) -> Result<(), SqlError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Connector that records every pool it builds. Names listed in
/// `unreachable` produce pools whose ping fails.
#[derive(Debug, Default, Clone)]
pub struct FakeConnector {
    pools: Arc<Mutex<Vec<Arc<FakePool>>>>,
    unreachable: Vec<String>,
    build_delay: Option<Duration>,
}

impl FakeConnector {
    pub fn with_unreachable(mut self, name: &str) -> Self {
        self.unreachable.push(name.to_string());
        self
    }

    /// Simulate slow pool construction to widen registration races.
    pub fn with_build_delay(mut self, delay: Duration) -> Self {
        self.build_delay = Some(delay);
        self
    }

    pub fn pools(&self) -> Vec<Arc<FakePool>> {
        self.pools.lock().unwrap().clone()
    }
}

impl Connector for FakeConnector {
    fn open(&self, name: &str, _config: &PoolConfig) -> DbResult<Arc<dyn Executor>> {
        if let Some(delay) = self.build_delay {
            std::thread::sleep(delay);
        }
        let mut pools = self.pools.lock().unwrap();
        let pool = Arc::new(FakePool {
            id: pools.len(),
            unreachable: self.unreachable.iter().any(|n| n == name),
            ..FakePool::default()
        });
        pools.push(Arc::clone(&pool));
        Ok(pool)
    }
}

/// Hook that records each stage it sees.
#[derive(Debug, Default, Clone)]
pub struct RecordingHook {
    calls: Arc<Mutex<Vec<String>>>,
}

impl RecordingHook {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Hook for RecordingHook {
    fn before(&self, ctx: &QueryContext, sql: &str, _args: &[QueryParam]) -> ExecutionSpan {
        self.calls.lock().unwrap().push(format!("before {sql}"));
        ExecutionSpan::start(ctx)
    }

    async fn after(
        &self,
        _span: ExecutionSpan,
        _ctx: &QueryContext,
        sql: &str,
        _args: &[QueryParam],
    ) {
        self.calls.lock().unwrap().push(format!("after {sql}"));
    }

    fn on_error(
        &self,
        _span: ExecutionSpan,
        _ctx: &QueryContext,
        err: SqlError,
        sql: &str,
        _args: &[QueryParam],
    ) -> SqlError {
        self.calls.lock().unwrap().push(format!("on_error {sql}"));
        err
    }
}
