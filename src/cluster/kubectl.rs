//! `kubectl`-backed cluster client and exec transport.
//!
//! Everything goes through the kubectl binary:
//! manifests are rendered as JSON and piped to `kubectl apply -f -`, state is
//! read back with `kubectl get -o json`, and remote commands go through
//! `kubectl exec`.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::{
    ClusterClient, ClusterError, HostInfo, PodIps, ServiceHandle, ServiceSpec, WorkloadHandle,
    WorkloadSpec,
};
use crate::config::BenchConfig;
use crate::exec::{ExecError, ExecOutput, RemoteTransport};

const CONTROL_PLANE_LABELS: [&str; 2] = [
    "node-role.kubernetes.io/control-plane",
    "node-role.kubernetes.io/master",
];

pub struct KubectlClient {
    program: String,
    kubeconfig: Option<PathBuf>,
    poll_interval: Duration,
}

impl KubectlClient {
    pub fn new(program: impl Into<String>, kubeconfig: Option<PathBuf>, poll_interval: Duration) -> Self {
        Self {
            program: program.into(),
            kubeconfig,
            poll_interval,
        }
    }

    pub fn from_config(config: &BenchConfig) -> Self {
        Self::new(
            config.cluster.kubectl.clone(),
            config.cluster.kubeconfig.clone(),
            config.timeouts.poll_interval(),
        )
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        if let Some(path) = &self.kubeconfig {
            cmd.arg("--kubeconfig").arg(path);
        }
        cmd.kill_on_drop(true);
        cmd
    }

    /// Run kubectl with `args`, optionally feeding `stdin`, and return stdout.
    async fn kubectl(&self, args: &[&str], stdin: Option<&str>) -> Result<String, ClusterError> {
        let rendered = format!("{} {}", self.program, args.join(" "));
        debug!(command = %rendered, "kubectl");

        let mut cmd = self.command();
        cmd.args(args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn()?;
        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes()).await?;
            // Closing stdin lets `apply -f -` see EOF.
            drop(pipe);
        }
        let output = child.wait_with_output().await?;

        if !output.status.success() {
            return Err(ClusterError::CommandFailed {
                command: rendered,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn apply(&self, kind: &'static str, name: &str, manifest: &Value) -> Result<(), ClusterError> {
        let body = manifest.to_string();
        self.kubectl(&["apply", "-f", "-"], Some(&body))
            .await
            .map(|_| ())
            .map_err(|e| ClusterError::CreateFailed {
                kind,
                name: name.to_string(),
                reason: e.to_string(),
            })
    }

    async fn pod_state(&self, namespace: &str, name: &str) -> Result<PodState, ClusterError> {
        let raw = self
            .kubectl(&["-n", namespace, "get", "pod", name, "-o", "json"], None)
            .await?;
        parse_pod_state(&raw)
    }

    /// Poll the pod until `ready` yields a value. Terminal phases end the
    /// wait early.
    async fn wait_for_pod<T: Send>(
        &self,
        namespace: &str,
        name: &str,
        timeout: Duration,
        condition: &'static str,
        ready: impl Fn(&PodState) -> Option<T> + Send,
    ) -> Result<T, ClusterError> {
        let start = Instant::now();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let state = self.pod_state(namespace, name).await?;

            if state.is_terminated() {
                return Err(ClusterError::PodTerminated {
                    name: name.to_string(),
                    phase: state.phase,
                });
            }
            if let Some(value) = ready(&state) {
                debug!(pod = name, condition, attempts, "pod ready");
                return Ok(value);
            }
            if start.elapsed() >= timeout {
                return Err(ClusterError::Timeout {
                    name: name.to_string(),
                    condition,
                    timeout,
                });
            }

            debug!(pod = name, phase = %state.phase, attempt = attempts, "pod not ready, retrying");
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[async_trait::async_trait]
impl ClusterClient for KubectlClient {
    async fn create_namespace(&self, namespace: &str) -> Result<(), ClusterError> {
        self.kubectl(&["create", "namespace", namespace], None)
            .await
            .map(|_| ())
            .map_err(|e| ClusterError::CreateFailed {
                kind: "namespace",
                name: namespace.to_string(),
                reason: e.to_string(),
            })
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<(), ClusterError> {
        self.kubectl(&["delete", "namespace", namespace, "--ignore-not-found=true"], None)
            .await
            .map(|_| ())
    }

    async fn list_hosts(&self) -> Result<Vec<HostInfo>, ClusterError> {
        let raw = self.kubectl(&["get", "nodes", "-o", "json"], None).await?;
        let hosts = parse_nodes(&raw)?;
        if hosts.is_empty() {
            return Err(ClusterError::NoHost("cluster reports no nodes".to_string()));
        }
        Ok(hosts)
    }

    async fn create_workload_on_host(
        &self,
        namespace: &str,
        spec: &WorkloadSpec,
    ) -> Result<WorkloadHandle, ClusterError> {
        self.apply("pod", &spec.name, &workload_manifest(namespace, spec))
            .await?;
        Ok(WorkloadHandle {
            name: spec.name.clone(),
            host: spec.host.clone(),
            container: spec.container_name(),
        })
    }

    async fn create_service_endpoint(
        &self,
        namespace: &str,
        spec: &ServiceSpec,
    ) -> Result<ServiceHandle, ClusterError> {
        self.apply("service", &spec.name, &service_manifest(namespace, spec))
            .await?;
        let raw = self
            .kubectl(&["-n", namespace, "get", "service", &spec.name, "-o", "json"], None)
            .await?;
        Ok(ServiceHandle {
            name: spec.name.clone(),
            cluster_ip: parse_cluster_ip(&raw)?,
        })
    }

    async fn wait_for_running(
        &self,
        namespace: &str,
        name: &str,
        timeout: Duration,
    ) -> Result<(), ClusterError> {
        self.wait_for_pod(namespace, name, timeout, "running", |s| {
            s.is_running().then_some(())
        })
        .await
    }

    async fn wait_for_addresses(
        &self,
        namespace: &str,
        name: &str,
        timeout: Duration,
    ) -> Result<PodIps, ClusterError> {
        self.wait_for_pod(namespace, name, timeout, "addressed", |s| {
            (s.is_running() && !s.ips.is_empty()).then_some(s.ips)
        })
        .await
    }
}

#[async_trait::async_trait]
impl RemoteTransport for KubectlClient {
    async fn execute(
        &self,
        namespace: &str,
        workload: &str,
        process: &str,
        args: &[String],
    ) -> Result<ExecOutput, ExecError> {
        let output = self
            .command()
            .args(["-n", namespace, "exec", workload, "-c", process, "--"])
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ExecError::Transport {
                workload: workload.to_string(),
                process: process.to_string(),
                reason: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        match output.status.code() {
            Some(0) => Ok(ExecOutput { stdout, stderr }),
            Some(code) => Err(ExecError::NonZeroExit {
                workload: workload.to_string(),
                code,
                stderr: stderr.trim().to_string(),
            }),
            None => Err(ExecError::Transport {
                workload: workload.to_string(),
                process: process.to_string(),
                reason: "kubectl exec terminated by signal".to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Manifests
// ---------------------------------------------------------------------------

/// Single-container pod pinned to `spec.host`, tolerating control-plane
/// taints so the reference host may be a control-plane node.
pub fn workload_manifest(namespace: &str, spec: &WorkloadSpec) -> Value {
    let ports: Vec<Value> = spec
        .ports
        .iter()
        .map(|p| json!({ "containerPort": p.port, "protocol": p.protocol }))
        .collect();
    let tolerations: Vec<Value> = CONTROL_PLANE_LABELS
        .iter()
        .map(|key| json!({ "key": key, "operator": "Exists", "effect": "NoSchedule" }))
        .collect();

    let mut container = json!({
        "name": spec.container_name(),
        "image": spec.image,
        "imagePullPolicy": "IfNotPresent",
        "ports": ports,
    });
    if let Some(command) = &spec.command {
        container["command"] = json!(command);
    }

    json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": {
            "name": spec.name,
            "namespace": namespace,
            "labels": spec.labels,
        },
        "spec": {
            "nodeName": spec.host,
            "restartPolicy": "Never",
            "tolerations": tolerations,
            "containers": [container],
        },
    })
}

pub fn service_manifest(namespace: &str, spec: &ServiceSpec) -> Value {
    let ports: Vec<Value> = spec
        .ports
        .iter()
        .map(|p| {
            json!({
                "name": p.name,
                "port": p.port,
                "targetPort": p.target_port,
                "protocol": p.protocol,
            })
        })
        .collect();

    let mut svc_spec = json!({
        "type": spec.service_type,
        "sessionAffinity": spec.session_affinity,
        "selector": spec.selector,
        "ports": ports,
    });
    if !spec.ip_families.is_empty() {
        svc_spec["ipFamilies"] = json!(spec.ip_families);
    }

    json!({
        "apiVersion": "v1",
        "kind": "Service",
        "metadata": {
            "name": spec.name,
            "namespace": namespace,
            "labels": spec.labels,
        },
        "spec": svc_spec,
    })
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ObjectList<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    name: String,
    #[serde(default)]
    labels: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct NodeObject {
    metadata: Metadata,
}

#[derive(Debug, Deserialize)]
struct PodObject {
    #[serde(default)]
    status: PodStatusObject,
}

#[derive(Debug, Default, Deserialize)]
struct PodStatusObject {
    #[serde(default)]
    phase: String,
    #[serde(rename = "podIP")]
    pod_ip: Option<String>,
    #[serde(rename = "podIPs", default)]
    pod_ips: Vec<PodIpObject>,
}

#[derive(Debug, Deserialize)]
struct PodIpObject {
    ip: String,
}

#[derive(Debug, Deserialize)]
struct ServiceObject {
    spec: ServiceSpecObject,
}

#[derive(Debug, Deserialize)]
struct ServiceSpecObject {
    #[serde(rename = "clusterIP")]
    cluster_ip: Option<String>,
}

/// Phase and addresses of a pod as last observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodState {
    pub phase: String,
    pub ips: PodIps,
}

impl PodState {
    pub fn is_running(&self) -> bool {
        self.phase == "Running"
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self.phase.as_str(), "Succeeded" | "Failed")
    }
}

fn invalid(what: &str, err: serde_json::Error) -> ClusterError {
    ClusterError::InvalidResponse(format!("{what}: {err}"))
}

pub fn parse_nodes(raw: &str) -> Result<Vec<HostInfo>, ClusterError> {
    let list: ObjectList<NodeObject> =
        serde_json::from_str(raw).map_err(|e| invalid("node list", e))?;
    Ok(list
        .items
        .into_iter()
        .map(|node| HostInfo {
            control_plane: CONTROL_PLANE_LABELS
                .iter()
                .any(|l| node.metadata.labels.contains_key(*l)),
            name: node.metadata.name,
        })
        .collect())
}

pub fn parse_pod_state(raw: &str) -> Result<PodState, ClusterError> {
    let pod: PodObject = serde_json::from_str(raw).map_err(|e| invalid("pod", e))?;
    let status = pod.status;
    let ips = if status.pod_ips.is_empty() {
        PodIps::from_strings(status.pod_ip.as_deref())
    } else {
        PodIps::from_strings(status.pod_ips.iter().map(|p| p.ip.as_str()))
    };
    Ok(PodState {
        phase: status.phase,
        ips,
    })
}

pub fn parse_cluster_ip(raw: &str) -> Result<IpAddr, ClusterError> {
    let svc: ServiceObject = serde_json::from_str(raw).map_err(|e| invalid("service", e))?;
    let ip = svc
        .spec
        .cluster_ip
        .ok_or_else(|| ClusterError::InvalidResponse("service has no clusterIP".to_string()))?;
    ip.parse()
        .map_err(|_| ClusterError::InvalidResponse(format!("service clusterIP {ip:?} is not an address")))
}
