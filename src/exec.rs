//! Remote command execution inside a running workload.
//!
//! The executor is a pure transport: it hands a shell pipeline to the
//! [`RemoteTransport`] and returns captured stdout/stderr untouched. Output
//! interpretation lives with the benchmark that built the pipeline.

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("exec in {workload}/{process} failed: {reason}")]
    Transport {
        workload: String,
        process: String,
        reason: String,
    },

    #[error("command in {workload} exited with code {code}: {stderr}")]
    NonZeroExit {
        workload: String,
        code: i32,
        stderr: String,
    },

    #[error("unexpected stderr from {workload}: {stderr}")]
    UnexpectedStderr { workload: String, stderr: String },
}

/// Captured output channels of one remote invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Execution transport collaborator (e.g. `kubectl exec`).
#[async_trait::async_trait]
pub trait RemoteTransport: Send + Sync {
    async fn execute(
        &self,
        namespace: &str,
        workload: &str,
        process: &str,
        args: &[String],
    ) -> Result<ExecOutput, ExecError>;
}

/// Shell used to interpret a pipeline inside the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
    Bash,
    Sh,
}

impl Shell {
    pub fn program(&self) -> &'static str {
        match self {
            Shell::Bash => "bash",
            Shell::Sh => "sh",
        }
    }

    pub fn wrap(&self, pipeline: &str) -> Vec<String> {
        vec![
            self.program().to_string(),
            "-c".to_string(),
            pipeline.to_string(),
        ]
    }
}

/// Runs commands in one designated driver workload.
pub struct RemoteExecutor<'a> {
    transport: &'a dyn RemoteTransport,
    namespace: &'a str,
    workload: &'a str,
    process: &'a str,
}

impl<'a> RemoteExecutor<'a> {
    pub fn new(
        transport: &'a dyn RemoteTransport,
        namespace: &'a str,
        workload: &'a str,
        process: &'a str,
    ) -> Self {
        Self {
            transport,
            namespace,
            workload,
            process,
        }
    }

    pub fn workload(&self) -> &str {
        self.workload
    }

    /// Run `pipeline` through `shell -c` and wait for it to finish.
    pub async fn run(&self, shell: Shell, pipeline: &str) -> Result<ExecOutput, ExecError> {
        debug!(
            workload = self.workload,
            process = self.process,
            %pipeline,
            "remote exec"
        );
        self.transport
            .execute(self.namespace, self.workload, self.process, &shell.wrap(pipeline))
            .await
    }
}
