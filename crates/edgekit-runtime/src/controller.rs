use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::process::Command;

use crate::error::RestartError;

pub const DEFAULT_RESTART_TIMEOUT: Duration = Duration::from_secs(30);

/// Restarts the execution runtime so it reloads the shared secret file.
///
/// `restart` never fails: every error is logged and reported as `false`.
/// By the time a restart is attempted the secret file has already been
/// rewritten, so callers surface `false` as a warning, not a failure.
///
/// Uses `Pin<Box<dyn Future>>` so the trait stays dyn-compatible.
pub trait RuntimeController: Send + Sync {
    fn restart<'a>(&'a self) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>>;

    /// Controller name for logging.
    fn name(&self) -> &str;
}

/// Runs an external command (`docker restart <container>` by default)
/// bounded by a timeout.
#[derive(Debug, Clone)]
pub struct CommandController {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandController {
    pub fn new(command: Vec<String>, timeout: Duration) -> Result<Self, RestartError> {
        let mut parts = command.into_iter();
        let program = parts.next().ok_or(RestartError::EmptyCommand)?;
        Ok(Self {
            program,
            args: parts.collect(),
            timeout,
        })
    }

    /// Restart the runtime, reporting why it failed.
    pub async fn try_restart(&self) -> Result<(), RestartError> {
        tracing::info!(
            program = %self.program,
            args = ?self.args,
            timeout = ?self.timeout,
            "Restarting edge runtime"
        );

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| RestartError::Timeout(self.timeout))?
            .map_err(|source| RestartError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(RestartError::Failed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        tracing::info!(program = %self.program, "Edge runtime restarted");
        Ok(())
    }
}

impl RuntimeController for CommandController {
    fn restart<'a>(&'a self) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
        Box::pin(async move {
            match self.try_restart().await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(program = %self.program, error = %e, "Edge runtime restart failed");
                    false
                }
            }
        })
    }

    fn name(&self) -> &str {
        "command"
    }
}

/// Used when restarts are disabled in configuration. Always reports `false`
/// so callers know the runtime may still hold stale secrets.
#[derive(Debug, Default)]
pub struct NoopController;

impl RuntimeController for NoopController {
    fn restart<'a>(&'a self) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
        Box::pin(async move {
            tracing::warn!(error = %RestartError::Disabled, "Edge runtime not restarted");
            false
        })
    }

    fn name(&self) -> &str {
        "noop"
    }
}

/// Controller with a fixed outcome that counts restart requests. For tests.
#[derive(Debug)]
pub struct StubController {
    succeed: bool,
    calls: AtomicUsize,
}

impl StubController {
    pub fn succeeding() -> Self {
        Self {
            succeed: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            succeed: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RuntimeController for StubController {
    fn restart<'a>(&'a self) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.succeed
        })
    }

    fn name(&self) -> &str {
        "stub"
    }
}
