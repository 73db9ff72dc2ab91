//! Statement instrumentation.
//!
//! A [`Hook`] observes every statement in three stages: `before` runs first and
//! returns an [`ExecutionSpan`]; the span is then consumed by exactly one of
//! `after` (success) or `on_error` (failure). [`Instrumented`] is the
//! decorator that drives a hook around an inner [`Executor`], and
//! [`QueryLogger`] is the default hook: it times statements, logs them on the
//! `mysql_registry::sql` target, and optionally runs the SQL [`Advisor`].

use crate::db::advisor::Advisor;
use crate::db::context::QueryContext;
use crate::db::executor::Executor;
use crate::error::SqlError;
use crate::models::{ExecResult, QueryParam, Row};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{Level, debug, error};

/// Log target for statement telemetry.
pub const SQL_TARGET: &str = "mysql_registry::sql";

/// Per-statement timing state, created by [`Hook::before`].
#[derive(Debug, Default)]
pub struct ExecutionSpan {
    started_at: Option<Instant>,
    request_id: Option<String>,
}

impl ExecutionSpan {
    /// Start timing a statement issued under `ctx`.
    pub fn start(ctx: &QueryContext) -> Self {
        Self {
            started_at: Some(Instant::now()),
            request_id: ctx.request_id().map(str::to_string),
        }
    }

    /// A span with no start time. Hooks treat it as "nothing to report".
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Milliseconds since the span started, rounded to two decimals.
    pub fn elapsed_ms(&self) -> Option<f64> {
        self.started_at
            .map(|started| nanos_to_ms(started.elapsed().as_nanos()))
    }
}

/// Convert nanoseconds to milliseconds, rounded half-up to two decimals.
pub fn nanos_to_ms(nanos: u128) -> f64 {
    ((nanos as f64 / 1_000_000.0 + 0.005) * 100.0).trunc() / 100.0
}

/// Observer invoked around every statement.
#[async_trait]
pub trait Hook: Send + Sync + std::fmt::Debug {
    /// Called before the statement runs. Must not perform I/O.
    fn before(&self, ctx: &QueryContext, sql: &str, args: &[QueryParam]) -> ExecutionSpan;

    /// Called after the statement succeeded. Must never fail the statement.
    async fn after(&self, span: ExecutionSpan, ctx: &QueryContext, sql: &str, args: &[QueryParam]);

    /// Called after the statement failed. Returns the error the caller sees.
    fn on_error(
        &self,
        span: ExecutionSpan,
        ctx: &QueryContext,
        err: SqlError,
        sql: &str,
        args: &[QueryParam],
    ) -> SqlError;
}

/// Executor decorator that runs a [`Hook`] around every statement.
///
/// `ping` and `close` are forwarded without hooks.
#[derive(Debug, Clone)]
pub struct Instrumented {
    inner: Arc<dyn Executor>,
    hook: Arc<dyn Hook>,
}

impl Instrumented {
    pub fn new(inner: Arc<dyn Executor>, hook: Arc<dyn Hook>) -> Self {
        Self { inner, hook }
    }
}

#[async_trait]
impl Executor for Instrumented {
    async fn execute(
        &self,
        ctx: &QueryContext,
        sql: &str,
        args: &[QueryParam],
    ) -> Result<ExecResult, SqlError> {
        let span = self.hook.before(ctx, sql, args);
        match self.inner.execute(ctx, sql, args).await {
            Ok(result) => {
                self.hook.after(span, ctx, sql, args).await;
                Ok(result)
            }
            Err(err) => Err(self.hook.on_error(span, ctx, err, sql, args)),
        }
    }

    async fn fetch_all(
        &self,
        ctx: &QueryContext,
        sql: &str,
        args: &[QueryParam],
    ) -> Result<Vec<Row>, SqlError> {
        let span = self.hook.before(ctx, sql, args);
        match self.inner.fetch_all(ctx, sql, args).await {
            Ok(rows) => {
                self.hook.after(span, ctx, sql, args).await;
                Ok(rows)
            }
            Err(err) => Err(self.hook.on_error(span, ctx, err, sql, args)),
        }
    }

    async fn fetch_optional(
        &self,
        ctx: &QueryContext,
        sql: &str,
        args: &[QueryParam],
    ) -> Result<Option<Row>, SqlError> {
        let span = self.hook.before(ctx, sql, args);
        match self.inner.fetch_optional(ctx, sql, args).await {
            Ok(row) => {
                self.hook.after(span, ctx, sql, args).await;
                Ok(row)
            }
            Err(err) => Err(self.hook.on_error(span, ctx, err, sql, args)),
        }
    }

    async fn ping(&self) -> Result<(), SqlError> {
        self.inner.ping().await
    }

    async fn close(&self) -> Result<(), SqlError> {
        self.inner.close().await
    }
}

/// Default hook: statement timing, debug/error logging, optional advisor.
#[derive(Debug, Clone, Default)]
pub struct QueryLogger {
    advisor: Option<Advisor>,
}

impl QueryLogger {
    pub fn new(advisor: Option<Advisor>) -> Self {
        Self { advisor }
    }

    /// Logger with the advisor discovered from the environment.
    pub fn from_env() -> Self {
        Self::new(Advisor::discover())
    }

    pub fn advisor(&self) -> Option<&Advisor> {
        self.advisor.as_ref()
    }

    async fn advice(&self, ctx: &QueryContext, sql: &str) -> Option<String> {
        let advisor = self.advisor.as_ref()?;
        match advisor.advise(ctx, sql).await {
            Ok(output) => Some(output),
            Err(e) => {
                debug!(target: SQL_TARGET, error = %e, "SQL advisor failed");
                None
            }
        }
    }
}

#[async_trait]
impl Hook for QueryLogger {
    fn before(&self, ctx: &QueryContext, _sql: &str, _args: &[QueryParam]) -> ExecutionSpan {
        ExecutionSpan::start(ctx)
    }

    async fn after(&self, span: ExecutionSpan, ctx: &QueryContext, sql: &str, args: &[QueryParam]) {
        let Some(took) = span.elapsed_ms() else {
            return;
        };
        if ctx.is_done() || !tracing::enabled!(target: SQL_TARGET, Level::DEBUG) {
            return;
        }

        let advice = self.advice(ctx, sql).await;
        debug!(
            target: SQL_TARGET,
            span = "sql",
            took,
            request_id = span.request_id(),
            advice = advice.as_deref(),
            "> {}. {:?}",
            sql,
            args
        );
    }

    fn on_error(
        &self,
        span: ExecutionSpan,
        _ctx: &QueryContext,
        err: SqlError,
        sql: &str,
        args: &[QueryParam],
    ) -> SqlError {
        if err.is_driver_signal() {
            return err;
        }

        if let Some(took) = span.elapsed_ms() {
            error!(
                target: SQL_TARGET,
                span = "sql",
                took,
                request_id = span.request_id(),
                error = %err,
                "> {}. {:?}",
                sql,
                args
            );
        }
        err
    }
}
