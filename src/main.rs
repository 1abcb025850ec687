//! swarmgate - Docker-compatible gateway for container clusters
//!
//! This is the main CLI entry point for swarmgate.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use swarmgate::daemon::{GatewayServer, RouteTable};
use swarmgate::swarm::{EngineClient, Node, SwarmCluster};
use swarmgate::GatewayConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// swarmgate - Docker-compatible gateway for container clusters
#[derive(Parser)]
#[command(name = "swarmgate")]
#[command(author = "Evoker Industries")]
#[command(version)]
#[command(about = "A Docker-compatible API gateway for container clusters", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Configuration file (defaults to <config dir>/swarmgate/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the Docker API for a cluster of engines
    Manage {
        /// Address to listen on (host:port or unix://<path>)
        #[arg(short = 'H', long)]
        host: Option<String>,
        /// Seconds between engine polls
        #[arg(long)]
        refresh_interval: Option<u64>,
        /// Engine addresses, added to those in the configuration file
        nodes: Vec<String>,
    },

    /// List the API routes the gateway registers
    Routes,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<GatewayConfig> {
    match path {
        Some(path) => GatewayConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => match GatewayConfig::default_path().filter(|p| p.exists()) {
            Some(path) => GatewayConfig::load(&path)
                .with_context(|| format!("Failed to load config {}", path.display())),
            None => Ok(GatewayConfig::default()),
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.debug {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Manage {
            host,
            refresh_interval,
            nodes,
        } => {
            if let Some(host) = host {
                config.listen_addr = host;
            }
            if let Some(secs) = refresh_interval {
                config.refresh_interval_secs = secs;
            }
            config.nodes.extend(nodes);
            config.validate()?;

            let cluster = Arc::new(SwarmCluster::new());
            for addr in &config.nodes {
                cluster.add_node(Node::new(addr)?)?;
            }
            let summary = cluster.info()?;
            info!("Cluster {} with {} nodes", summary.id, summary.node_count);

            let client = EngineClient::new(config.engine_timeout())?;
            let refresher = cluster.spawn_refresher(client, config.refresh_interval());

            let server = GatewayServer::new(&config.listen_addr, cluster)
                .context("Failed to build the API route table")?;
            let result = server.run().await;

            refresher.abort();
            result?;
        }

        Commands::Routes => {
            let cluster = Arc::new(SwarmCluster::new());
            let table = RouteTable::build(cluster)?;
            for route in table.routes() {
                println!("{}", route);
            }
        }
    }

    Ok(())
}
