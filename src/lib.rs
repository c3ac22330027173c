//! podbench -- pod-to-pod and pod-to-service network benchmarks for
//! Kubernetes clusters.
//!
//! A run provisions an iperf, netperf, or nginx/hey suite in a throwaway
//! namespace, drives the tools from a client pod against targets on the same
//! and on a different node, and reduces the tool output to one aggregate
//! value per benchmark, topology, and traffic path.

pub mod bench;
pub mod cluster;
pub mod config;
pub mod error;
pub mod exec;
pub mod session;
pub mod topology;

pub use bench::report::{format_summary, RunReport};
pub use bench::{Benchmark, Suite};
pub use config::BenchConfig;
pub use error::BenchError;
pub use session::Session;
pub use topology::{Topology, TrafficPath};
