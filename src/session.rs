//! A benchmark session: one throwaway namespace, the hosts chosen for
//! placement, and the suites run inside it.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::bench::report::{RunReport, ScenarioOutcome, SuiteReport};
use crate::bench::runner::BenchmarkRunner;
use crate::bench::Suite;
use crate::cluster::{ClusterClient, ClusterError, HostInfo};
use crate::config::BenchConfig;
use crate::error::BenchError;
use crate::exec::{RemoteExecutor, RemoteTransport};
use crate::topology::provision::{Hosts, Provisioner};
use crate::topology::Topology;

/// `<prefix>-<8 hex chars>`, unique per session.
pub fn namespace_name(prefix: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &id[..8])
}

pub struct Session {
    namespace: String,
    readiness: Duration,
    hosts: Hosts,
    cluster: Arc<dyn ClusterClient>,
    transport: Arc<dyn RemoteTransport>,
}

impl Session {
    /// Create the session namespace and pick placement hosts. If host
    /// discovery fails the namespace is removed again.
    pub async fn setup(
        config: &BenchConfig,
        cluster: Arc<dyn ClusterClient>,
        transport: Arc<dyn RemoteTransport>,
    ) -> Result<Self, BenchError> {
        let namespace = namespace_name(&config.cluster.namespace_prefix);
        cluster.create_namespace(&namespace).await?;
        info!(%namespace, "namespace created");

        let hosts = match discover_hosts(cluster.as_ref(), config).await {
            Ok(hosts) => hosts,
            Err(e) => {
                if let Err(cleanup) = cluster.delete_namespace(&namespace).await {
                    warn!(%namespace, error = %cleanup, "failed to delete namespace after setup error");
                }
                return Err(e.into());
            }
        };
        info!(
            reference = %hosts.reference,
            secondary = hosts.secondary.as_deref().unwrap_or("-"),
            "placement hosts"
        );

        Ok(Self {
            namespace,
            readiness: config.timeouts.readiness(),
            hosts,
            cluster,
            transport,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn hosts(&self) -> &Hosts {
        &self.hosts
    }

    /// Provision `suite` and run each of its benchmarks against every
    /// requested topology. A provisioning failure aborts the suite; a failed
    /// scenario is recorded and the next one runs.
    pub async fn run_suite(
        &self,
        suite: Suite,
        topologies: &[Topology],
    ) -> Result<SuiteReport, BenchError> {
        info!(%suite, "provisioning suite");
        let deployment = Provisioner::new(
            self.cluster.as_ref(),
            &self.namespace,
            &self.hosts,
            self.readiness,
        )
        .provision(suite, topologies)
        .await?;

        let executor = RemoteExecutor::new(
            self.transport.as_ref(),
            &self.namespace,
            &deployment.driver.name,
            &deployment.driver.container,
        );
        let runner = BenchmarkRunner::new(executor);

        let mut scenarios = Vec::new();
        for &benchmark in suite.benchmarks() {
            for target in &deployment.targets {
                info!(%benchmark, topology = %target.topology, target = %target.workload.name, "scenario start");
                let result = runner
                    .run(benchmark, target.topology, &target.addresses)
                    .await;
                if let Err(e) = &result {
                    error!(%benchmark, topology = %target.topology, error = %e, "scenario failed");
                }
                scenarios.push(ScenarioOutcome {
                    benchmark,
                    topology: target.topology,
                    result,
                });
            }
        }

        Ok(SuiteReport { suite, scenarios })
    }

    /// Run `suites` in order. Every suite is attempted even if an earlier one
    /// aborted.
    pub async fn run(&self, suites: &[Suite], topologies: &[Topology]) -> RunReport {
        let started_at = Utc::now();
        let mut results = Vec::with_capacity(suites.len());

        for &suite in suites {
            let outcome = self.run_suite(suite, topologies).await;
            if let Err(e) = &outcome {
                error!(%suite, error = %e, "suite aborted");
            }
            results.push((suite, outcome));
        }

        RunReport {
            namespace: self.namespace.clone(),
            started_at,
            finished_at: Utc::now(),
            suites: results,
        }
    }

    /// Delete the namespace and everything provisioned in it.
    pub async fn teardown(self) -> Result<(), BenchError> {
        self.cluster.delete_namespace(&self.namespace).await?;
        info!(namespace = %self.namespace, "namespace deleted");
        Ok(())
    }
}

async fn discover_hosts(
    cluster: &dyn ClusterClient,
    config: &BenchConfig,
) -> Result<Hosts, ClusterError> {
    let known = cluster.list_hosts().await?;
    let reference = config.cluster.reference_host.as_deref();
    let secondary = config.cluster.secondary_host.as_deref();

    for wanted in reference.iter().chain(secondary.iter()) {
        if !known.iter().any(|h: &HostInfo| h.name == *wanted) {
            return Err(ClusterError::NoHost(format!("configured host {wanted} not found")));
        }
    }

    let hosts = Hosts::resolve(&known, reference, secondary)
        .ok_or_else(|| ClusterError::NoHost("cluster reports no nodes".to_string()))?;
    if hosts.secondary.as_deref() == Some(hosts.reference.as_str()) {
        return Err(ClusterError::NoHost(format!(
            "secondary host {} is also the reference host",
            hosts.reference
        )));
    }
    Ok(hosts)
}
