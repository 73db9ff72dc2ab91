//! External SQL analysis ("soar").
//!
//! When the `soar` binary is on `PATH` and `MYSQL_SOAR_ENABLE` is set, the
//! statement logger passes each statement's text to it and appends the output
//! to the debug log line. Output is opaque diagnostic text.

use crate::db::context::QueryContext;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout_at;

/// Name of the analysis binary looked up on `PATH`.
pub const ADVISOR_PROGRAM: &str = "soar";

/// Any non-empty value enables the advisor.
pub const ADVISOR_ENABLE_VAR: &str = "MYSQL_SOAR_ENABLE";

#[derive(Error, Debug)]
pub enum AdvisorError {
    #[error("failed to run advisor: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("advisor exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("advisor did not finish before the statement deadline")]
    TimedOut,

    #[error("statement context already cancelled")]
    Cancelled,
}

/// Handle to the external analysis tool.
#[derive(Debug, Clone)]
pub struct Advisor {
    program: PathBuf,
}

impl Advisor {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Find the advisor if it is installed and explicitly enabled.
    pub fn discover() -> Option<Self> {
        let enabled = std::env::var_os(ADVISOR_ENABLE_VAR).is_some_and(|v| !v.is_empty());
        if !enabled {
            return None;
        }
        match which::which(ADVISOR_PROGRAM) {
            Ok(program) => {
                tracing::info!(program = %program.display(), "SQL advisor enabled");
                Some(Self::new(program))
            }
            Err(e) => {
                tracing::debug!(error = %e, "SQL advisor requested but not found on PATH");
                None
            }
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Run `<program> -query <sql>` and return its standard output.
    ///
    /// Bounded by the context deadline; the child is killed if the deadline
    /// passes first.
    pub async fn advise(&self, ctx: &QueryContext, sql: &str) -> Result<String, AdvisorError> {
        if ctx.is_cancelled() {
            return Err(AdvisorError::Cancelled);
        }

        let mut cmd = Command::new(&self.program);
        cmd.arg("-query")
            .arg(sql)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = match ctx.deadline() {
            Some(deadline) => timeout_at(deadline.into(), cmd.output())
                .await
                .map_err(|_| AdvisorError::TimedOut)??,
            None => cmd.output().await?,
        };

        if !output.status.success() {
            return Err(AdvisorError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let advisor = Advisor::new("/nonexistent/path/to/soar");
        let err = advisor
            .advise(&QueryContext::new(), "SELECT 1")
            .await
            .unwrap_err();
        assert!(matches!(err, AdvisorError::Spawn(_)));
    }

    #[tokio::test]
    async fn test_cancelled_context_skips_advisor() {
        let ctx = QueryContext::new();
        ctx.cancel();
        let err = Advisor::new("echo").advise(&ctx, "SELECT 1").await.unwrap_err();
        assert!(matches!(err, AdvisorError::Cancelled));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_output_is_returned_verbatim() {
        let output = Advisor::new("echo")
            .advise(&QueryContext::new(), "SELECT * FROM t")
            .await
            .unwrap();
        assert_eq!(output, "-query SELECT * FROM t\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_failure() {
        let err = Advisor::new("false")
            .advise(&QueryContext::new(), "SELECT 1")
            .await
            .unwrap_err();
        assert!(matches!(err, AdvisorError::Failed { .. }));
    }
}
