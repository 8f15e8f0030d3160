//! wadasctl: run the WADAS inference scheduler from the command line.
//!
//! # Usage
//!
//! ```text
//! wadasctl --config wadas.toml select --policy monitoring
//! wadasctl --config wadas.toml select --policy optimum --every 30s --format json
//! wadasctl --config wadas.toml nodes
//! wadasctl scrape --url http://10.0.0.7:8002/ --metric gpu_utilization
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use wadas_core::PolicyKind;

mod commands;

#[derive(Parser)]
#[command(
    name = "wadasctl",
    about = "WADAS: cluster-aware placement of detection and classification",
    version,
    propagate_version = true
)]
struct Cli {
    /// Scheduler configuration file (TOML). Built-in defaults when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pick a node and device for the detection and classification stages.
    Select {
        /// Scoring policy: monitoring, actuator or optimum.
        #[arg(short, long, default_value = "monitoring")]
        policy: PolicyKind,
        /// Re-run on this interval (e.g. "30s") until interrupted.
        #[arg(long)]
        every: Option<String>,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
        /// Also print every scored candidate.
        #[arg(long)]
        ranking: bool,
    },
    /// List the alive nodes known to the inventory.
    Nodes {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Scrape one metrics endpoint and print what was parsed.
    Scrape {
        /// Endpoint URL, e.g. http://10.0.0.7:8002/
        #[arg(long)]
        url: String,
        /// Metric names to keep; all metrics when omitted.
        #[arg(short, long = "metric")]
        metrics: Vec<String>,
        /// Output format: text, json or prom
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,wadas=debug"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Select {
            policy,
            every,
            format,
            ranking,
        } => commands::select::run(&config, policy, every.as_deref(), &format, ranking).await,
        Commands::Nodes { format } => commands::nodes::run(&config, &format).await,
        Commands::Scrape {
            url,
            metrics,
            format,
        } => commands::scrape::run(&config, &url, &metrics, &format).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_select_with_options() {
        let cli = Cli::try_parse_from([
            "wadasctl",
            "--config",
            "wadas.toml",
            "select",
            "--policy",
            "optimum",
            "--every",
            "30s",
            "--format",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("wadas.toml")));
        match cli.command {
            Commands::Select {
                policy,
                every,
                format,
                ranking,
            } => {
                assert_eq!(policy, PolicyKind::Optimum);
                assert_eq!(every.as_deref(), Some("30s"));
                assert_eq!(format, "json");
                assert!(!ranking);
            }
            _ => panic!("expected select"),
        }
    }

    #[test]
    fn select_defaults_to_monitoring() {
        let cli = Cli::try_parse_from(["wadasctl", "select"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Select {
                policy: PolicyKind::Monitoring,
                ..
            }
        ));
    }

    #[test]
    fn rejects_unknown_policy() {
        assert!(Cli::try_parse_from(["wadasctl", "select", "--policy", "fastest"]).is_err());
    }

    #[test]
    fn scrape_collects_repeated_metrics() {
        let cli = Cli::try_parse_from([
            "wadasctl",
            "scrape",
            "--url",
            "http://10.0.0.7:8004/",
            "--metric",
            "network_tx_bytes_per_second",
            "-m",
            "network_rx_bytes_per_second",
            "--log-json",
        ])
        .unwrap();
        assert!(cli.log_json);
        match cli.command {
            Commands::Scrape { metrics, .. } => assert_eq!(metrics.len(), 2),
            _ => panic!("expected scrape"),
        }
    }
}
