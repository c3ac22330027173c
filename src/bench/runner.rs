//! Round loop: run each benchmark against the pod and service address of a
//! target and fold the samples into aggregate results.

use tracing::{debug, warn};

use super::aggregate::{Accumulator, AggregateResult, SampleFailure};
use super::extract::parse_sample;
use super::{Benchmark, StderrPolicy, ROUND_NUM};
use crate::error::BenchError;
use crate::exec::{ExecError, RemoteExecutor};
use crate::topology::provision::AddressSet;
use crate::topology::{Topology, TrafficPath};

pub struct BenchmarkRunner<'a> {
    executor: RemoteExecutor<'a>,
}

impl<'a> BenchmarkRunner<'a> {
    pub fn new(executor: RemoteExecutor<'a>) -> Self {
        Self { executor }
    }

    /// Measure `benchmark` pod-to-pod, then pod-to-service. Each result is
    /// reported as soon as it is complete.
    pub async fn run(
        &self,
        benchmark: Benchmark,
        topology: Topology,
        addresses: &AddressSet,
    ) -> Result<Vec<AggregateResult>, BenchError> {
        let mut results = Vec::with_capacity(TrafficPath::ALL.len());
        for path in TrafficPath::ALL {
            let result = self.measure(benchmark, topology, path, addresses).await?;
            result.report();
            results.push(result);
        }
        Ok(results)
    }

    /// [`ROUND_NUM`] rounds, each round one invocation per benchmark port.
    pub async fn measure(
        &self,
        benchmark: Benchmark,
        topology: Topology,
        path: TrafficPath,
        addresses: &AddressSet,
    ) -> Result<AggregateResult, BenchError> {
        let addr = addresses.for_path(path);
        let mut acc = Accumulator::new();

        for round in 0..ROUND_NUM {
            for &port in benchmark.ports() {
                let pipeline = benchmark.pipeline(addr, port);
                self.sample(benchmark, round, port, &pipeline, &mut acc)
                    .await?;
            }
            acc.end_round();
        }

        Ok(acc.finish(benchmark, topology, path))
    }

    async fn sample(
        &self,
        benchmark: Benchmark,
        round: u32,
        port: Option<u16>,
        pipeline: &str,
        acc: &mut Accumulator,
    ) -> Result<(), ExecError> {
        let out = self.executor.run(benchmark.shell(), pipeline).await?;
        let stderr = out.stderr.trim();
        let policy = benchmark.stderr_policy();

        if !stderr.is_empty() && policy == StderrPolicy::Fatal {
            return Err(ExecError::UnexpectedStderr {
                workload: self.executor.workload().to_string(),
                stderr: stderr.to_string(),
            });
        }

        // One failure per sample; stderr rides along with a parse error.
        match parse_sample(&out.stdout) {
            Ok(value) => {
                debug!(%benchmark, round, ?port, value, "sample");
                acc.add(value);
                if !stderr.is_empty() && policy == StderrPolicy::Report {
                    warn!(%benchmark, round, ?port, %stderr, "wrong results from client");
                    acc.flag(SampleFailure {
                        round,
                        port,
                        reason: format!("stderr: {stderr}"),
                    });
                }
            }
            Err(e) => {
                let reason = if stderr.is_empty() {
                    e.to_string()
                } else {
                    format!("{e} (stderr: {stderr})")
                };
                warn!(%benchmark, round, ?port, %reason, "error parsing sample");
                acc.flag(SampleFailure {
                    round,
                    port,
                    reason,
                });
            }
        }
        Ok(())
    }
}
