use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use danube_pubsub::{run_consumer, run_producer, ConsumerArgs, ProducerArgs};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "danube-pubsub")]
#[command(about = "Pub-sub demo: HTTP ingress producers and logging consumers on Danube")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Serve the HTTP ingress and forward payloads to the configured producers")]
    Producer(ProducerArgs),

    #[command(about = "Subscribe the configured consumers and log received messages")]
    Consumer(ConsumerArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown signal received");
                signal_token.cancel();
            }
            Err(e) => error!(error = %e, "unable to listen for shutdown signal"),
        }
    });

    // a returned error is printed once, on stderr, with a non-zero exit
    match cli.command {
        Commands::Producer(args) => run_producer(args, shutdown)
            .await
            .context("producer mode failed"),
        Commands::Consumer(args) => run_consumer(args, shutdown)
            .await
            .context("consumer mode failed"),
    }
}
