//! Dry-run description of what a run would create and execute.

use std::fmt::Write;

use super::Suite;
use crate::cluster::container_name_for;
use crate::cluster::service::{multi_port_service, selector_for};
use crate::cluster::{IpFamily, ServiceType};
use crate::topology::{Topology, TrafficPath};

fn placeholder(path: TrafficPath) -> &'static str {
    match path {
        TrafficPath::PodToPod => "<pod-ip>",
        TrafficPath::PodToService => "<svc-ip>",
    }
}

fn host_placeholder(topology: Topology) -> &'static str {
    match topology {
        Topology::SameHost => "<reference-host>",
        Topology::CrossHost => "<secondary-host>",
    }
}

fn command_text(command: Option<Vec<String>>) -> String {
    command
        .map(|c| c.join(" "))
        .unwrap_or_else(|| "(image default)".to_string())
}

/// Workloads, services and remote pipelines for `suites` x `topologies`,
/// without touching a cluster.
pub fn format_plan(suites: &[Suite], topologies: &[Topology]) -> String {
    let mut out = String::new();

    for &suite in suites {
        let _ = writeln!(out, "== {} ==", suite);
        let _ = writeln!(
            out,
            "  driver  {:<22} on {:<18} image {} [{}] cmd: {}",
            suite.driver_name(),
            host_placeholder(Topology::SameHost),
            suite.driver_image(),
            container_name_for(suite.driver_image()),
            command_text(suite.driver_command())
        );

        for &topology in topologies {
            let name = suite.target_name(topology);
            let _ = writeln!(
                out,
                "  target  {:<22} on {:<18} image {} [{}] cmd: {}",
                name,
                host_placeholder(topology),
                suite.target_image(),
                container_name_for(suite.target_image()),
                command_text(suite.target_command())
            );

            let svc = multi_port_service(
                &name,
                &suite.service_ports(),
                selector_for(&name),
                false,
                ServiceType::ClusterIP,
                Some(IpFamily::IPv4),
                suite.service_protocols(),
            );
            let ports: Vec<&str> = svc.ports.iter().map(|p| p.name.as_str()).collect();
            let _ = writeln!(out, "  service {:<22} ports {}", svc.name, ports.join(" "));
        }

        for benchmark in suite.benchmarks() {
            let _ = writeln!(
                out,
                "  {} ({}), {} rounds:",
                benchmark.metric(),
                benchmark.unit(),
                super::ROUND_NUM
            );
            for path in TrafficPath::ALL {
                for &port in benchmark.ports() {
                    let _ = writeln!(
                        out,
                        "    {} -c \"{}\"",
                        benchmark.shell().program(),
                        benchmark.pipeline_template(placeholder(path), port)
                    );
                }
            }
        }
        out.push('\n');
    }
    out
}
