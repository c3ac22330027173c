//! Top-level error taxonomy of a benchmark run.
//!
//! Each variant renders the inner error in its message and does not expose it
//! as a source, so an anyhow chain prints every detail once.

use thiserror::Error;

use crate::cluster::ClusterError;
use crate::exec::ExecError;
use crate::topology::provision::ProvisionError;

#[derive(Debug, Error)]
pub enum BenchError {
    /// Workload/service creation or readiness failed. Aborts the suite.
    #[error("provisioning failed: {0}")]
    Provision(ProvisionError),

    /// Namespace or host discovery failed before any suite ran.
    #[error("cluster setup failed: {0}")]
    Cluster(ClusterError),

    /// Remote command transport failed. Aborts the scenario.
    #[error("execution failed: {0}")]
    Execution(ExecError),
}

impl From<ProvisionError> for BenchError {
    fn from(e: ProvisionError) -> Self {
        BenchError::Provision(e)
    }
}

impl From<ClusterError> for BenchError {
    fn from(e: ClusterError) -> Self {
        BenchError::Cluster(e)
    }
}

impl From<ExecError> for BenchError {
    fn from(e: ExecError) -> Self {
        BenchError::Execution(e)
    }
}
