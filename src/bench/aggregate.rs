//! Round accumulation and the per-scenario aggregate result.

use std::fmt;

use serde::Serialize;
use tracing::{info, warn};

use super::{Benchmark, ROUND_NUM};
use crate::topology::{Topology, TrafficPath};

/// A sample that could not be used as-is.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleFailure {
    pub round: u32,
    pub port: Option<u16>,
    pub reason: String,
}

impl fmt::Display for SampleFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "round {} port {}: {}", self.round, port, self.reason),
            None => write!(f, "round {}: {}", self.round, self.reason),
        }
    }
}

/// Running sum over the rounds of one (benchmark, topology, path).
///
/// The mean always divides by [`ROUND_NUM`], never by the number of samples:
/// for multi-stream tools the per-round samples add up to the combined
/// throughput of all streams.
#[derive(Debug, Default)]
pub struct Accumulator {
    sum: f64,
    samples: u32,
    rounds: u32,
    failures: Vec<SampleFailure>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, sample: f64) {
        self.sum += sample;
        self.samples += 1;
    }

    /// Flag a failed sample. It contributes nothing to the sum.
    pub fn flag(&mut self, failure: SampleFailure) {
        self.failures.push(failure);
    }

    pub fn end_round(&mut self) {
        self.rounds += 1;
    }

    pub fn mean(&self) -> f64 {
        self.sum / f64::from(ROUND_NUM)
    }

    pub fn finish(self, benchmark: Benchmark, topology: Topology, path: TrafficPath) -> AggregateResult {
        AggregateResult {
            benchmark,
            topology,
            path,
            value: self.mean(),
            samples: self.samples,
            rounds: self.rounds,
            failures: self.failures,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResult {
    pub benchmark: Benchmark,
    pub topology: Topology,
    pub path: TrafficPath,
    pub value: f64,
    pub samples: u32,
    pub rounds: u32,
    pub failures: Vec<SampleFailure>,
}

impl AggregateResult {
    pub fn unit(&self) -> &'static str {
        self.benchmark.unit()
    }

    /// Complete rounds with no flagged samples.
    pub fn is_valid(&self) -> bool {
        self.failures.is_empty() && self.rounds == ROUND_NUM
    }

    /// `<Intra|Inter> node pod to <pod|svc> <metric>: <value> <unit>`
    pub fn report_line(&self) -> String {
        format!(
            "{} node pod to {} {}: {:.2} {}",
            self.topology.label(),
            self.path.label(),
            self.benchmark.metric(),
            self.value,
            self.unit()
        )
    }

    /// Emit the result as a structured log line.
    pub fn report(&self) {
        let line = self.report_line();
        if self.is_valid() {
            info!(
                topology = %self.topology,
                path = %self.path,
                metric = self.benchmark.metric(),
                value = self.value,
                unit = self.unit(),
                "{line}"
            );
        } else {
            warn!(
                topology = %self.topology,
                path = %self.path,
                metric = self.benchmark.metric(),
                failures = self.failures.len(),
                "{line} (invalid)"
            );
        }
    }
}

impl fmt::Display for AggregateResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.report_line())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_rounds(per_round: &[&[f64]]) -> Accumulator {
        let mut acc = Accumulator::new();
        for round in per_round {
            for &s in *round {
                acc.add(s);
            }
            acc.end_round();
        }
        acc
    }

    #[test]
    fn test_mean_of_three_samples() {
        let acc = run_rounds(&[&[10.0], &[20.0], &[45.0]]);
        assert_eq!(acc.mean(), 25.0);
    }

    #[test]
    fn test_multi_stream_sum_is_not_divided_by_port_count() {
        let acc = run_rounds(&[&[100.0, 100.0, 100.0], &[100.0, 100.0, 100.0], &[100.0, 100.0, 100.0]]);
        assert_eq!(acc.mean(), 300.0);
    }

    #[test]
    fn test_report_line_format() {
        let acc = run_rounds(&[&[937.0], &[937.0], &[937.0]]);
        let res = acc.finish(Benchmark::UdpBandwidth, Topology::SameHost, TrafficPath::PodToPod);
        assert!(res.is_valid());
        assert_eq!(res.samples, 3);
        assert_eq!(
            res.report_line(),
            "Intra node pod to pod UDP bandwidth: 937.00 Mbits/sec"
        );
        assert_eq!(res.to_string(), res.report_line());
    }

    #[test]
    fn test_flagged_sample_invalidates_result() {
        let mut acc = Accumulator::new();
        acc.add(150.0);
        acc.end_round();
        acc.flag(SampleFailure {
            round: 1,
            port: Some(10001),
            reason: "expected a single number".to_string(),
        });
        acc.end_round();
        acc.add(150.0);
        acc.end_round();

        let res = acc.finish(
            Benchmark::TcpRequestResponse,
            Topology::CrossHost,
            TrafficPath::PodToService,
        );
        assert!(!res.is_valid());
        assert_eq!(res.value, 100.0);
        assert_eq!(res.failures[0].to_string(), "round 1 port 10001: expected a single number");
        assert_eq!(
            res.report_line(),
            "Inter node pod to svc TCP_RR: 100.00 trans/sec"
        );
    }

    #[test]
    fn test_incomplete_rounds_are_invalid() {
        let acc = run_rounds(&[&[1.0], &[1.0]]);
        let res = acc.finish(Benchmark::HttpRequests, Topology::SameHost, TrafficPath::PodToPod);
        assert!(!res.is_valid());
    }
}
