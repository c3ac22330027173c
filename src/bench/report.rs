//! Scenario/suite outcomes and the end-of-run summary.

use chrono::{DateTime, Utc};

use super::aggregate::AggregateResult;
use super::{Benchmark, Suite};
use crate::error::BenchError;
use crate::topology::Topology;

/// One (benchmark, topology) subtest.
#[derive(Debug)]
pub struct ScenarioOutcome {
    pub benchmark: Benchmark,
    pub topology: Topology,
    pub result: Result<Vec<AggregateResult>, BenchError>,
}

impl ScenarioOutcome {
    pub fn name(&self) -> String {
        scenario_name(self.benchmark, self.topology)
    }

    /// Completed without error and every aggregate is valid.
    pub fn passed(&self) -> bool {
        match &self.result {
            Ok(results) => results.iter().all(AggregateResult::is_valid),
            Err(_) => false,
        }
    }
}

pub fn scenario_name(benchmark: Benchmark, topology: Topology) -> String {
    format!("{}, {}Node", benchmark.metric(), topology.label())
}

#[derive(Debug)]
pub struct SuiteReport {
    pub suite: Suite,
    pub scenarios: Vec<ScenarioOutcome>,
}

impl SuiteReport {
    pub fn failures(&self) -> usize {
        self.scenarios.iter().filter(|s| !s.passed()).count()
    }

    pub fn results(&self) -> impl Iterator<Item = &AggregateResult> {
        self.scenarios
            .iter()
            .filter_map(|s| s.result.as_ref().ok())
            .flatten()
    }
}

/// Everything a `run` produced. Suites that failed to provision carry the
/// provisioning error instead of a report.
#[derive(Debug)]
pub struct RunReport {
    pub namespace: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub suites: Vec<(Suite, Result<SuiteReport, BenchError>)>,
}

impl RunReport {
    pub fn failures(&self) -> usize {
        self.suites
            .iter()
            .map(|(_, r)| match r {
                Ok(report) => report.failures(),
                Err(_) => 1,
            })
            .sum()
    }

    pub fn is_success(&self) -> bool {
        self.failures() == 0
    }
}

/// Human-readable summary table of a run.
pub fn format_summary(report: &RunReport) -> String {
    let elapsed = report.finished_at - report.started_at;
    let mut out = format!(
        "podbench run in namespace {} ({}s)\n",
        report.namespace,
        elapsed.num_seconds()
    );
    out.push_str(&format!(
        "{:<8} | {:<22} | {:<6} | {:>12} | {:<10} | Status\n",
        "Suite", "Scenario", "Path", "Value", "Unit"
    ));
    out.push_str(&format!(
        "{:-<8}-|-{:-<22}-|-{:-<6}-|-{:->12}-|-{:-<10}-|-{:-<6}\n",
        "", "", "", "", "", ""
    ));

    for (suite, outcome) in &report.suites {
        let suite_report = match outcome {
            Ok(r) => r,
            Err(e) => {
                out.push_str(&format!("{:<8} | ABORTED: {}\n", suite.name(), e));
                continue;
            }
        };
        for scenario in &suite_report.scenarios {
            match &scenario.result {
                Ok(results) => {
                    for r in results {
                        out.push_str(&format!(
                            "{:<8} | {:<22} | {:<6} | {:>12.2} | {:<10} | {}\n",
                            suite.name(),
                            scenario.name(),
                            r.path.label(),
                            r.value,
                            r.unit(),
                            if r.is_valid() { "PASS" } else { "FAIL" }
                        ));
                    }
                }
                Err(e) => {
                    out.push_str(&format!(
                        "{:<8} | {:<22} | FAIL: {}\n",
                        suite.name(),
                        scenario.name(),
                        e
                    ));
                }
            }
        }
    }

    let failures = report.failures();
    if failures == 0 {
        out.push_str("\nOVERALL: PASS\n");
    } else {
        out.push_str(&format!(
            "\nOVERALL: FAIL ({} failing scenario{})\n",
            failures,
            if failures == 1 { "" } else { "s" }
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::aggregate::Accumulator;
    use crate::exec::ExecError;
    use crate::topology::TrafficPath;

    fn result(benchmark: Benchmark, path: TrafficPath, per_round: f64) -> AggregateResult {
        let mut acc = Accumulator::new();
        for _ in 0..crate::bench::ROUND_NUM {
            acc.add(per_round);
            acc.end_round();
        }
        acc.finish(benchmark, Topology::SameHost, path)
    }

    fn sample_report() -> RunReport {
        let started_at = Utc::now();
        RunReport {
            namespace: "podbench-1234abcd".to_string(),
            started_at,
            finished_at: started_at + chrono::Duration::seconds(42),
            suites: vec![
                (
                    Suite::Iperf,
                    Ok(SuiteReport {
                        suite: Suite::Iperf,
                        scenarios: vec![ScenarioOutcome {
                            benchmark: Benchmark::UdpBandwidth,
                            topology: Topology::SameHost,
                            result: Ok(vec![
                                result(Benchmark::UdpBandwidth, TrafficPath::PodToPod, 937.0),
                                result(Benchmark::UdpBandwidth, TrafficPath::PodToService, 901.5),
                            ]),
                        }],
                    }),
                ),
                (
                    Suite::Netperf,
                    Ok(SuiteReport {
                        suite: Suite::Netperf,
                        scenarios: vec![ScenarioOutcome {
                            benchmark: Benchmark::TcpRequestResponse,
                            topology: Topology::CrossHost,
                            result: Err(BenchError::Execution(ExecError::UnexpectedStderr {
                                workload: "netperf-local-client".to_string(),
                                stderr: "netperf: connection refused".to_string(),
                            })),
                        }],
                    }),
                ),
            ],
        }
    }

    #[test]
    fn test_summary_lists_results_and_failures() {
        let report = sample_report();
        let summary = format_summary(&report);

        assert!(summary.contains("podbench-1234abcd (42s)"));
        assert!(summary.contains("UDP bandwidth, IntraNode"));
        assert!(summary.contains("937.00"));
        assert!(summary.contains("901.50"));
        assert!(summary.contains("TCP_RR, InterNode"));
        assert!(summary.contains("FAIL: execution failed"));
        assert!(summary.contains("OVERALL: FAIL (1 failing scenario)"));
        assert_eq!(report.failures(), 1);
        assert!(!report.is_success());
    }

    #[test]
    fn test_suite_results_skip_failed_scenarios() {
        let report = sample_report();
        let (_, iperf) = &report.suites[0];
        let iperf = iperf.as_ref().unwrap();
        assert_eq!(iperf.results().count(), 2);
        assert_eq!(iperf.failures(), 0);
    }
}
