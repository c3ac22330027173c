use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use podbench::bench::parse_suites;
use podbench::bench::plan::format_plan;
use podbench::cluster::kubectl::KubectlClient;
use podbench::topology::parse_selection;
use podbench::{format_summary, BenchConfig, Session};

#[derive(Parser)]
#[command(
    name = "podbench",
    about = "Pod-to-pod and pod-to-service network benchmarks for Kubernetes",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run benchmark suites against the current cluster
    Run {
        /// Suites to run: iperf, netperf, nginx, or all (comma-separated)
        #[arg(long, default_value = "all")]
        suite: String,

        /// Placements to test: intra, inter, or all (comma-separated)
        #[arg(long, default_value = "all")]
        topology: String,

        /// Config file (defaults to $PODBENCH_CONFIG, then /etc/podbench/podbench.toml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Leave the test namespace in place for inspection
        #[arg(long)]
        keep_namespace: bool,
    },

    /// Print workloads, services and commands without touching a cluster
    Plan {
        /// Suites to describe: iperf, netperf, nginx, or all (comma-separated)
        #[arg(long, default_value = "all")]
        suite: String,

        /// Placements to describe: intra, inter, or all (comma-separated)
        #[arg(long, default_value = "all")]
        topology: String,
    },
}

fn bootstrap_subscriber() -> impl tracing::Subscriber + Send + Sync {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish()
}

fn init_tracing(config: &BenchConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            suite,
            topology,
            config,
            keep_namespace,
        } => {
            // Config diagnostics are logged before the configured subscriber exists.
            let config = tracing::subscriber::with_default(bootstrap_subscriber(), || match config {
                Some(path) => BenchConfig::load(&path),
                None => Ok(BenchConfig::load_or_default()),
            })?;
            init_tracing(&config);

            let suites = parse_suites(&suite).map_err(anyhow::Error::msg)?;
            let topologies = parse_selection(&topology)?;
            tracing::info!(?suites, ?topologies, "Starting podbench run");

            let client = Arc::new(KubectlClient::from_config(&config));
            let session = Session::setup(&config, client.clone(), client).await?;
            let report = session.run(&suites, &topologies).await;

            println!("\n{}", format_summary(&report));

            if keep_namespace {
                tracing::info!(namespace = session.namespace(), "Keeping test namespace");
            } else if let Err(e) = session.teardown().await {
                tracing::warn!(error = %e, "Failed to delete test namespace");
            }

            if !report.is_success() {
                bail!("{} benchmark scenario(s) failed", report.failures());
            }
        }
        Commands::Plan { suite, topology } => {
            let suites = parse_suites(&suite).map_err(anyhow::Error::msg)?;
            let topologies = parse_selection(&topology)?;
            print!("{}", format_plan(&suites, &topologies));
        }
    }

    Ok(())
}
