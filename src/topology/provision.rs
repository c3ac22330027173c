//! Topology provisioner: driver/target placement, services, and address
//! resolution for one suite.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use super::{Topology, TrafficPath};
use crate::bench::Suite;
use crate::cluster::service::{multi_port_service, selector_for, APP_LABEL};
use crate::cluster::{
    ClusterClient, ClusterError, ContainerPort, HostInfo, IpFamily, ServiceHandle, ServiceType,
    WorkloadHandle, WorkloadSpec,
};

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("failed to {step} {name}: {cause}")]
    Step {
        step: &'static str,
        name: String,
        cause: ClusterError,
    },

    #[error("pod {name} has no IPv4 address")]
    NoIpv4 { name: String },

    #[error("no host available for {0} placement")]
    NoHost(Topology),
}

impl ProvisionError {
    fn step<'a>(step: &'static str, name: &'a str) -> impl FnOnce(ClusterError) -> Self + 'a {
        move |cause| ProvisionError::Step {
            step,
            name: name.to_string(),
            cause,
        }
    }
}

/// Hosts used for placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hosts {
    /// Runs the driver and every same-host target.
    pub reference: String,
    /// Runs cross-host targets.
    pub secondary: Option<String>,
}

impl Hosts {
    /// Pick the reference host (first control-plane node, or first node) and
    /// the first other node as secondary. Explicit overrides win.
    pub fn resolve(
        hosts: &[HostInfo],
        reference: Option<&str>,
        secondary: Option<&str>,
    ) -> Option<Self> {
        let reference = match reference {
            Some(r) => r.to_string(),
            None => hosts
                .iter()
                .find(|h| h.control_plane)
                .or_else(|| hosts.first())?
                .name
                .clone(),
        };
        let secondary = match secondary {
            Some(s) => Some(s.to_string()),
            None => hosts
                .iter()
                .find(|h| h.name != reference)
                .map(|h| h.name.clone()),
        };
        Some(Self {
            reference,
            secondary,
        })
    }

    pub fn for_topology(&self, topology: Topology) -> Option<&str> {
        match topology {
            Topology::SameHost => Some(&self.reference),
            Topology::CrossHost => self.secondary.as_deref(),
        }
    }
}

/// Resolved addresses of one target: direct pod address and service VIP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressSet {
    pub direct: IpAddr,
    pub service: IpAddr,
}

impl AddressSet {
    pub fn for_path(&self, path: TrafficPath) -> IpAddr {
        match path {
            TrafficPath::PodToPod => self.direct,
            TrafficPath::PodToService => self.service,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TargetEndpoint {
    pub topology: Topology,
    pub workload: WorkloadHandle,
    pub service: ServiceHandle,
    pub addresses: AddressSet,
}

/// One provisioned suite: a shared driver and a target per topology.
#[derive(Debug, Clone)]
pub struct Deployment {
    pub suite: Suite,
    pub driver: WorkloadHandle,
    pub targets: Vec<TargetEndpoint>,
}

pub struct Provisioner<'a> {
    cluster: &'a dyn ClusterClient,
    namespace: &'a str,
    hosts: &'a Hosts,
    timeout: Duration,
}

impl<'a> Provisioner<'a> {
    pub fn new(
        cluster: &'a dyn ClusterClient,
        namespace: &'a str,
        hosts: &'a Hosts,
        timeout: Duration,
    ) -> Self {
        Self {
            cluster,
            namespace,
            hosts,
            timeout,
        }
    }

    /// Create services, the driver, and one target per topology, blocking
    /// until each target is running and addressed. The first failing step
    /// aborts; cleanup is left to namespace teardown.
    pub async fn provision(
        &self,
        suite: Suite,
        topologies: &[Topology],
    ) -> Result<Deployment, ProvisionError> {
        // Reject impossible placements before creating anything.
        for &topology in topologies {
            if self.hosts.for_topology(topology).is_none() {
                return Err(ProvisionError::NoHost(topology));
            }
        }

        let mut services = Vec::with_capacity(topologies.len());
        for &topology in topologies {
            let name = suite.target_name(topology);
            let spec = multi_port_service(
                &name,
                &suite.service_ports(),
                selector_for(&name),
                false,
                ServiceType::ClusterIP,
                Some(IpFamily::IPv4),
                suite.service_protocols(),
            );
            let svc = self
                .cluster
                .create_service_endpoint(self.namespace, &spec)
                .await
                .map_err(ProvisionError::step("create service", &name))?;
            info!(suite = %suite, service = %svc.name, cluster_ip = %svc.cluster_ip, "service created");
            services.push(svc);
        }

        let driver_name = suite.driver_name();
        let driver = self
            .cluster
            .create_workload_on_host(
                self.namespace,
                &workload(
                    &driver_name,
                    &self.hosts.reference,
                    suite.driver_image(),
                    suite.driver_command(),
                    Vec::new(),
                ),
            )
            .await
            .map_err(ProvisionError::step("create driver", &driver_name))?;
        self.cluster
            .wait_for_running(self.namespace, &driver_name, self.timeout)
            .await
            .map_err(ProvisionError::step("wait for driver", &driver_name))?;
        info!(suite = %suite, driver = %driver.name, host = %driver.host, "driver running");

        let mut targets = Vec::with_capacity(topologies.len());
        for (&topology, service) in topologies.iter().zip(services) {
            let host = self
                .hosts
                .for_topology(topology)
                .ok_or(ProvisionError::NoHost(topology))?;
            let name = suite.target_name(topology);
            let handle = self
                .cluster
                .create_workload_on_host(
                    self.namespace,
                    &workload(
                        &name,
                        host,
                        suite.target_image(),
                        suite.target_command(),
                        suite.target_ports(),
                    ),
                )
                .await
                .map_err(ProvisionError::step("create target", &name))?;
            self.cluster
                .wait_for_running(self.namespace, &name, self.timeout)
                .await
                .map_err(ProvisionError::step("wait for target", &name))?;
            let ips = self
                .cluster
                .wait_for_addresses(self.namespace, &name, self.timeout)
                .await
                .map_err(ProvisionError::step("resolve addresses of", &name))?;
            let direct = ips
                .ipv4
                .map(IpAddr::V4)
                .ok_or_else(|| ProvisionError::NoIpv4 { name: name.clone() })?;

            info!(
                suite = %suite,
                %topology,
                target = %handle.name,
                host = %handle.host,
                %direct,
                service = %service.cluster_ip,
                "target ready"
            );
            targets.push(TargetEndpoint {
                topology,
                workload: handle,
                addresses: AddressSet {
                    direct,
                    service: service.cluster_ip,
                },
                service,
            });
        }

        Ok(Deployment {
            suite,
            driver,
            targets,
        })
    }
}

fn workload(
    name: &str,
    host: &str,
    image: &str,
    command: Option<Vec<String>>,
    ports: Vec<ContainerPort>,
) -> WorkloadSpec {
    WorkloadSpec {
        name: name.to_string(),
        host: host.to_string(),
        image: image.to_string(),
        command,
        ports,
        labels: BTreeMap::from([(APP_LABEL.to_string(), name.to_string())]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(name: &str, control_plane: bool) -> HostInfo {
        HostInfo {
            name: name.to_string(),
            control_plane,
        }
    }

    #[test]
    fn test_resolve_prefers_control_plane() {
        let hosts = [host("worker-a", false), host("cp", true), host("worker-b", false)];
        let resolved = Hosts::resolve(&hosts, None, None).unwrap();
        assert_eq!(resolved.reference, "cp");
        assert_eq!(resolved.secondary.as_deref(), Some("worker-a"));
    }

    #[test]
    fn test_resolve_overrides() {
        let hosts = [host("cp", true), host("worker-a", false)];
        let resolved = Hosts::resolve(&hosts, Some("worker-a"), Some("worker-z")).unwrap();
        assert_eq!(resolved.reference, "worker-a");
        assert_eq!(resolved.secondary.as_deref(), Some("worker-z"));
    }

    #[test]
    fn test_single_node_has_no_secondary() {
        let resolved = Hosts::resolve(&[host("solo", false)], None, None).unwrap();
        assert_eq!(resolved.for_topology(Topology::SameHost), Some("solo"));
        assert_eq!(resolved.for_topology(Topology::CrossHost), None);
        assert!(Hosts::resolve(&[], None, None).is_none());
    }

    #[test]
    fn test_address_set_paths() {
        let set = AddressSet {
            direct: "10.244.1.5".parse().unwrap(),
            service: "10.96.0.20".parse().unwrap(),
        };
        assert_eq!(set.for_path(TrafficPath::PodToPod).to_string(), "10.244.1.5");
        assert_eq!(set.for_path(TrafficPath::PodToService).to_string(), "10.96.0.20");
    }
}
