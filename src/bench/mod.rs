//! Benchmark suites: tool images, workload layout, and command templates.
//!
//! Everything here is a fixed protocol constant of the suite. Nothing is read
//! from configuration so results stay comparable between clusters.

pub mod aggregate;
pub mod extract;
pub mod plan;
pub mod report;
pub mod runner;

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::Serialize;

use crate::cluster::{ContainerPort, Protocol};
use crate::exec::Shell;
use crate::topology::Topology;

use self::extract::ExtractionRule;

/// Rounds averaged into every aggregate result.
pub const ROUND_NUM: u32 = 3;

pub const IPERF_PORT: u16 = 5201;
pub const NETPERF_CONTROL_PORT: u16 = 12865;
/// One netperf data stream per port.
pub const NETPERF_DATA_PORTS: [u16; 3] = [10000, 10001, 10002];
pub const HTTP_PORT: u16 = 80;

pub const HEY_CONCURRENCY: u32 = 1;
pub const HEY_REQUESTS: u32 = 5000;

pub const IPERF_IMAGE: &str = "networkstatic/iperf3";
pub const NETPERF_IMAGE: &str = "sirot/netperf-latest";
pub const HEY_IMAGE: &str = "ricoli/hey";
pub const NGINX_IMAGE: &str = "nginx:1.21.6-alpine";

const IPERF_RECEIVER: ExtractionRule = ExtractionRule::new("receiver", 7);
const NETPERF_STREAM: ExtractionRule = ExtractionRule::new("16384", 5);
const NETPERF_RR: ExtractionRule = ExtractionRule::new("131072 1", 6);
const HEY_RPS: ExtractionRule = ExtractionRule::new("Requests/sec:", 2);

/// A tool family deployed together: one driver, one target per topology, one
/// service per target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Suite {
    Iperf,
    Netperf,
    Nginx,
}

impl Suite {
    pub const ALL: [Suite; 3] = [Suite::Iperf, Suite::Netperf, Suite::Nginx];

    pub fn name(&self) -> &'static str {
        match self {
            Suite::Iperf => "iperf",
            Suite::Netperf => "netperf",
            Suite::Nginx => "nginx",
        }
    }

    pub fn benchmarks(&self) -> &'static [Benchmark] {
        match self {
            Suite::Iperf => &[Benchmark::UdpBandwidth],
            Suite::Netperf => &[
                Benchmark::TcpStream,
                Benchmark::TcpRequestResponse,
                Benchmark::TcpConnectRequestResponse,
            ],
            Suite::Nginx => &[Benchmark::HttpRequests],
        }
    }

    pub fn driver_name(&self) -> String {
        format!("{}-local-client", self.name())
    }

    pub fn target_name(&self, topology: Topology) -> String {
        match topology {
            Topology::SameHost => format!("{}-local-server", self.name()),
            Topology::CrossHost => format!("{}-remote-server", self.name()),
        }
    }

    pub fn driver_image(&self) -> &'static str {
        match self {
            Suite::Iperf => IPERF_IMAGE,
            Suite::Netperf => NETPERF_IMAGE,
            Suite::Nginx => HEY_IMAGE,
        }
    }

    pub fn target_image(&self) -> &'static str {
        match self {
            Suite::Iperf => IPERF_IMAGE,
            Suite::Netperf => NETPERF_IMAGE,
            Suite::Nginx => NGINX_IMAGE,
        }
    }

    /// The driver keeps running the server process too (or just sleeps) so
    /// that it stays alive for `exec`.
    pub fn driver_command(&self) -> Option<Vec<String>> {
        match self {
            Suite::Iperf | Suite::Netperf => self.target_command(),
            Suite::Nginx => Some(vec!["sleep".to_string(), "7d".to_string()]),
        }
    }

    pub fn target_command(&self) -> Option<Vec<String>> {
        match self {
            Suite::Iperf => Some(vec!["iperf3".to_string(), "-s".to_string()]),
            Suite::Netperf => Some(vec!["netserver".to_string(), "-D".to_string()]),
            Suite::Nginx => None,
        }
    }

    pub fn target_ports(&self) -> Vec<ContainerPort> {
        match self {
            Suite::Iperf => vec![
                ContainerPort {
                    port: IPERF_PORT,
                    protocol: Protocol::Tcp,
                },
                ContainerPort {
                    port: IPERF_PORT,
                    protocol: Protocol::Udp,
                },
            ],
            Suite::Netperf | Suite::Nginx => Vec::new(),
        }
    }

    /// Service port -> target port.
    pub fn service_ports(&self) -> BTreeMap<u16, u16> {
        match self {
            Suite::Iperf => BTreeMap::from([(IPERF_PORT, IPERF_PORT)]),
            Suite::Netperf => std::iter::once(NETPERF_CONTROL_PORT)
                .chain(NETPERF_DATA_PORTS)
                .map(|p| (p, p))
                .collect(),
            Suite::Nginx => BTreeMap::from([(HTTP_PORT, HTTP_PORT)]),
        }
    }

    pub fn service_protocols(&self) -> &'static [Protocol] {
        match self {
            Suite::Iperf | Suite::Netperf => &[Protocol::Tcp, Protocol::Udp],
            Suite::Nginx => &[Protocol::Tcp],
        }
    }
}

impl fmt::Display for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Suite {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "iperf" | "iperf3" => Ok(Suite::Iperf),
            "netperf" => Ok(Suite::Netperf),
            "nginx" | "hey" => Ok(Suite::Nginx),
            other => Err(format!("unknown suite: {other}")),
        }
    }
}

/// Parse a comma-separated suite selection; `all` expands to every suite.
pub fn parse_suites(s: &str) -> Result<Vec<Suite>, String> {
    let mut out = Vec::new();
    for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let picked = if part.eq_ignore_ascii_case("all") {
            Suite::ALL.to_vec()
        } else {
            vec![part.parse()?]
        };
        for suite in picked {
            if !out.contains(&suite) {
                out.push(suite);
            }
        }
    }
    if out.is_empty() {
        return Err(format!("empty suite selection: {s:?}"));
    }
    Ok(out)
}

/// What to do when a tool writes to stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StderrPolicy {
    /// Abort the scenario.
    Fatal,
    /// Keep the sample but mark the aggregate invalid.
    Report,
    /// Only surfaced alongside a parse failure.
    Ignore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Benchmark {
    /// iperf3 UDP bandwidth.
    UdpBandwidth,
    /// netperf TCP_STREAM.
    TcpStream,
    /// netperf TCP_RR.
    TcpRequestResponse,
    /// netperf TCP_CRR (connection churn).
    TcpConnectRequestResponse,
    /// hey against nginx.
    HttpRequests,
}

impl Benchmark {
    pub fn suite(&self) -> Suite {
        match self {
            Benchmark::UdpBandwidth => Suite::Iperf,
            Benchmark::TcpStream
            | Benchmark::TcpRequestResponse
            | Benchmark::TcpConnectRequestResponse => Suite::Netperf,
            Benchmark::HttpRequests => Suite::Nginx,
        }
    }

    /// Metric description used in report lines.
    pub fn metric(&self) -> &'static str {
        match self {
            Benchmark::UdpBandwidth => "UDP bandwidth",
            Benchmark::TcpStream => "TCP bandwidth",
            Benchmark::TcpRequestResponse => "TCP_RR",
            Benchmark::TcpConnectRequestResponse => "TCP_CRR",
            Benchmark::HttpRequests => "hey test",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Benchmark::UdpBandwidth | Benchmark::TcpStream => "Mbits/sec",
            Benchmark::TcpRequestResponse | Benchmark::TcpConnectRequestResponse => "trans/sec",
            Benchmark::HttpRequests => "reqs/sec",
        }
    }

    pub fn rule(&self) -> ExtractionRule {
        match self {
            Benchmark::UdpBandwidth => IPERF_RECEIVER,
            Benchmark::TcpStream => NETPERF_STREAM,
            Benchmark::TcpRequestResponse | Benchmark::TcpConnectRequestResponse => NETPERF_RR,
            Benchmark::HttpRequests => HEY_RPS,
        }
    }

    pub fn shell(&self) -> Shell {
        match self {
            Benchmark::HttpRequests => Shell::Sh,
            _ => Shell::Bash,
        }
    }

    pub fn stderr_policy(&self) -> StderrPolicy {
        match self {
            Benchmark::UdpBandwidth => StderrPolicy::Report,
            Benchmark::TcpStream
            | Benchmark::TcpRequestResponse
            | Benchmark::TcpConnectRequestResponse => StderrPolicy::Fatal,
            Benchmark::HttpRequests => StderrPolicy::Ignore,
        }
    }

    /// Sub-invocations per round. netperf runs one stream per data port and
    /// the per-port samples are summed, not averaged.
    pub fn ports(&self) -> &'static [Option<u16>] {
        const NETPERF: [Option<u16>; 3] = [
            Some(NETPERF_DATA_PORTS[0]),
            Some(NETPERF_DATA_PORTS[1]),
            Some(NETPERF_DATA_PORTS[2]),
        ];
        match self {
            Benchmark::TcpStream
            | Benchmark::TcpRequestResponse
            | Benchmark::TcpConnectRequestResponse => &NETPERF,
            Benchmark::UdpBandwidth | Benchmark::HttpRequests => &[None],
        }
    }

    /// The bare tool invocation, before output filtering.
    pub fn invocation(&self, addr: IpAddr, port: Option<u16>) -> String {
        self.render(&addr.to_string(), &url_host(addr), port)
    }

    /// Full remote pipeline: invocation reduced to a single numeric token.
    pub fn pipeline(&self, addr: IpAddr, port: Option<u16>) -> String {
        format!("{}{}", self.invocation(addr, port), self.rule().to_pipeline())
    }

    /// Pipeline with a textual placeholder in place of the target address.
    pub fn pipeline_template(&self, placeholder: &str, port: Option<u16>) -> String {
        format!(
            "{}{}",
            self.render(placeholder, placeholder, port),
            self.rule().to_pipeline()
        )
    }

    fn render(&self, host: &str, url_host: &str, port: Option<u16>) -> String {
        let data_port = port.unwrap_or(NETPERF_DATA_PORTS[0]);
        match self {
            Benchmark::UdpBandwidth => {
                format!("iperf3 -u -b 0 -f m -w 256K -O 1 -c {host}")
            }
            Benchmark::TcpStream => {
                format!("netperf -H {host} -t TCP_STREAM -- -P {data_port}")
            }
            Benchmark::TcpRequestResponse => {
                format!("netperf -H {host} -t TCP_RR -- -P {data_port}")
            }
            Benchmark::TcpConnectRequestResponse => {
                format!("netperf -H {host} -t TCP_CRR -- -P {data_port}")
            }
            Benchmark::HttpRequests => format!(
                "hey -c {HEY_CONCURRENCY} -n {HEY_REQUESTS} -disable-keepalive http://{url_host}"
            ),
        }
    }
}

impl fmt::Display for Benchmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.metric())
    }
}

fn url_host(addr: IpAddr) -> String {
    match addr {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => format!("[{v6}]"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    const ADDR: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 244, 1, 7));

    #[test]
    fn test_iperf_pipeline() {
        assert_eq!(
            Benchmark::UdpBandwidth.pipeline(ADDR, None),
            "iperf3 -u -b 0 -f m -w 256K -O 1 -c 10.244.1.7 | grep 'receiver' | awk '{print $7}'"
        );
    }

    #[test]
    fn test_netperf_pipelines_carry_data_port() {
        assert_eq!(
            Benchmark::TcpStream.pipeline(ADDR, Some(10001)),
            "netperf -H 10.244.1.7 -t TCP_STREAM -- -P 10001 | grep '16384' | awk '{print $5}'"
        );
        assert_eq!(
            Benchmark::TcpConnectRequestResponse.pipeline(ADDR, Some(10002)),
            "netperf -H 10.244.1.7 -t TCP_CRR -- -P 10002 | grep '131072 1' | awk '{print $6}'"
        );
    }

    #[test]
    fn test_hey_pipeline() {
        assert_eq!(
            Benchmark::HttpRequests.pipeline(ADDR, None),
            "hey -c 1 -n 5000 -disable-keepalive http://10.244.1.7 | grep 'Requests/sec:' | awk '{print $2}'"
        );
        let v6: IpAddr = "fd00::7".parse().unwrap();
        assert!(Benchmark::HttpRequests.invocation(v6, None).ends_with("http://[fd00::7]"));
    }

    #[test]
    fn test_pipeline_template_uses_placeholder() {
        assert_eq!(
            Benchmark::TcpStream.pipeline_template("<svc-ip>", Some(10000)),
            "netperf -H <svc-ip> -t TCP_STREAM -- -P 10000 | grep '16384' | awk '{print $5}'"
        );
        assert!(Benchmark::HttpRequests
            .pipeline_template("<pod-ip>", None)
            .contains("http://<pod-ip> |"));
    }

    #[test]
    fn test_netperf_runs_three_streams_per_round() {
        assert_eq!(
            Benchmark::TcpRequestResponse.ports(),
            &[Some(10000), Some(10001), Some(10002)]
        );
        assert_eq!(Benchmark::UdpBandwidth.ports(), &[None]);
        assert_eq!(Benchmark::HttpRequests.ports(), &[None]);
    }

    #[test]
    fn test_suite_layout() {
        assert_eq!(Suite::Netperf.driver_name(), "netperf-local-client");
        assert_eq!(Suite::Netperf.target_name(Topology::SameHost), "netperf-local-server");
        assert_eq!(Suite::Iperf.target_name(Topology::CrossHost), "iperf-remote-server");
        assert_eq!(Suite::Netperf.service_ports().len(), 4);
        assert!(Suite::Netperf.service_ports().contains_key(&NETPERF_CONTROL_PORT));
        assert_eq!(Suite::Iperf.service_ports().len(), 1);
        assert_eq!(Suite::Nginx.service_protocols(), &[Protocol::Tcp]);
        assert_eq!(
            Suite::Nginx.driver_command(),
            Some(vec!["sleep".to_string(), "7d".to_string()])
        );
        assert_eq!(Suite::Nginx.target_command(), None);
        for suite in Suite::ALL {
            for b in suite.benchmarks() {
                assert_eq!(b.suite(), suite);
            }
        }
    }

    #[test]
    fn test_suite_from_str() {
        assert_eq!("iperf".parse::<Suite>().unwrap(), Suite::Iperf);
        assert_eq!("NETPERF".parse::<Suite>().unwrap(), Suite::Netperf);
        assert_eq!("hey".parse::<Suite>().unwrap(), Suite::Nginx);
        assert!("ping".parse::<Suite>().is_err());
    }

    #[test]
    fn test_parse_suites() {
        assert_eq!(parse_suites("all").unwrap(), Suite::ALL.to_vec());
        assert_eq!(
            parse_suites("nginx, iperf,nginx").unwrap(),
            vec![Suite::Nginx, Suite::Iperf]
        );
        assert!(parse_suites("").is_err());
        assert!(parse_suites("iperf,ping").is_err());
    }
}
