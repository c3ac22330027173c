//! Cluster control-plane collaborator: workload/service creation and readiness.
//!
//! The benchmark core never talks to the API server directly. Everything it
//! needs from the cluster goes through [`ClusterClient`], so the engine can be
//! driven by the kubectl adapter in production and by in-memory fakes in tests.

pub mod kubectl;
pub mod service;

use std::collections::BTreeMap;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("failed to create {kind} {name}: {reason}")]
    CreateFailed {
        kind: &'static str,
        name: String,
        reason: String,
    },

    #[error("timed out after {timeout:?} waiting for pod {name} to be {condition}")]
    Timeout {
        name: String,
        condition: &'static str,
        timeout: Duration,
    },

    #[error("pod {name} terminated in phase {phase}")]
    PodTerminated { name: String, phase: String },

    #[error("no schedulable host found: {0}")]
    NoHost(String),

    #[error("unexpected response from cluster: {0}")]
    InvalidResponse(String),

    #[error("cluster command `{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("io error talking to cluster: {0}")]
    Io(#[from] std::io::Error),
}

/// Transport protocol of a container or service port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerPort {
    pub port: u16,
    pub protocol: Protocol,
}

/// Everything needed to pin one single-container workload onto a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadSpec {
    pub name: String,
    pub host: String,
    pub image: String,
    /// `None` keeps the image's default entrypoint.
    pub command: Option<Vec<String>>,
    pub ports: Vec<ContainerPort>,
    pub labels: BTreeMap<String, String>,
}

impl WorkloadSpec {
    /// Name of the single container (the "process" remote commands target).
    pub fn container_name(&self) -> String {
        container_name_for(&self.image)
    }
}

/// Derive a container name from an image reference: last path segment, tag
/// and digest stripped (`networkstatic/iperf3:latest` -> `iperf3`).
pub fn container_name_for(image: &str) -> String {
    let last = image.rsplit('/').next().unwrap_or(image);
    let last = last.split('@').next().unwrap_or(last);
    last.split(':').next().unwrap_or(last).to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadHandle {
    pub name: String,
    pub host: String,
    pub container: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceType {
    ClusterIP,
    NodePort,
    LoadBalancer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionAffinity {
    None,
    ClientIP,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IpFamily {
    IPv4,
    IPv6,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServicePort {
    pub name: String,
    pub port: u16,
    pub target_port: u16,
    pub protocol: Protocol,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub selector: BTreeMap<String, String>,
    pub ports: Vec<ServicePort>,
    pub service_type: ServiceType,
    pub session_affinity: SessionAffinity,
    pub ip_families: Vec<IpFamily>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceHandle {
    pub name: String,
    pub cluster_ip: IpAddr,
}

/// Addresses assigned to a running pod.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PodIps {
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<Ipv6Addr>,
}

impl PodIps {
    pub fn is_empty(&self) -> bool {
        self.ipv4.is_none() && self.ipv6.is_none()
    }

    /// Sort a list of textual pod IPs into their families. Unparseable entries
    /// are skipped; the first address of each family wins.
    pub fn from_strings<'a>(ips: impl IntoIterator<Item = &'a str>) -> Self {
        let mut out = Self::default();
        for raw in ips {
            match raw.parse::<IpAddr>() {
                Ok(IpAddr::V4(v4)) if out.ipv4.is_none() => out.ipv4 = Some(v4),
                Ok(IpAddr::V6(v6)) if out.ipv6.is_none() => out.ipv6 = Some(v6),
                _ => {}
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    pub name: String,
    pub control_plane: bool,
}

/// Control-plane operations the benchmark engine consumes.
#[async_trait::async_trait]
pub trait ClusterClient: Send + Sync {
    async fn create_namespace(&self, namespace: &str) -> Result<(), ClusterError>;

    /// Delete the namespace and everything created in it.
    async fn delete_namespace(&self, namespace: &str) -> Result<(), ClusterError>;

    async fn list_hosts(&self) -> Result<Vec<HostInfo>, ClusterError>;

    async fn create_workload_on_host(
        &self,
        namespace: &str,
        spec: &WorkloadSpec,
    ) -> Result<WorkloadHandle, ClusterError>;

    async fn create_service_endpoint(
        &self,
        namespace: &str,
        spec: &ServiceSpec,
    ) -> Result<ServiceHandle, ClusterError>;

    async fn wait_for_running(
        &self,
        namespace: &str,
        name: &str,
        timeout: Duration,
    ) -> Result<(), ClusterError>;

    /// Wait until the pod is running and has at least one address.
    async fn wait_for_addresses(
        &self,
        namespace: &str,
        name: &str,
        timeout: Duration,
    ) -> Result<PodIps, ClusterError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_name_from_image() {
        assert_eq!(container_name_for("networkstatic/iperf3"), "iperf3");
        assert_eq!(container_name_for("sirot/netperf-latest"), "netperf-latest");
        assert_eq!(container_name_for("ricoli/hey"), "hey");
        assert_eq!(container_name_for("nginx:1.21.6-alpine"), "nginx");
        assert_eq!(
            container_name_for("registry.example.com:5000/team/nginx:1.21"),
            "nginx"
        );
        assert_eq!(container_name_for("busybox@sha256:abcd"), "busybox");
    }

    #[test]
    fn test_pod_ips_from_strings() {
        let ips = PodIps::from_strings(["10.244.1.5", "fd00::5", "10.244.1.6", "garbage"]);
        assert_eq!(ips.ipv4, Some(Ipv4Addr::new(10, 244, 1, 5)));
        assert_eq!(ips.ipv6, Some("fd00::5".parse().unwrap()));
        assert!(!ips.is_empty());
        assert!(PodIps::from_strings(Vec::<&str>::new()).is_empty());
    }
}
