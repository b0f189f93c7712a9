use std::path::PathBuf;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    client::{BrokerClient, DanubeBroker},
    config::{load_config, ConsumerConfig},
    consumer_pool::{ConsumerPool, ConsumerSummary},
    errors::Result,
};

#[derive(Debug, Clone, Parser)]
#[command(after_help = EXAMPLES_TEXT)]
pub struct ConsumerArgs {
    #[arg(long, help = "Consumer configuration YAML file")]
    pub cons_config: PathBuf,

    #[arg(
        long,
        default_value = "0.0.0.0:6650",
        help = "Address of the Danube Broker"
    )]
    pub danube_addr: String,
}

const EXAMPLES_TEXT: &str = r#"
EXAMPLES:
    danube-pubsub consumer --cons-config ./config/consumer.yaml \
        --danube-addr 127.0.0.1:6650

NOTE:
    - subscription_type is one of exclusive, shared, failover (any case)
    - Press Ctrl+C to stop consuming
"#;

/// Consumer mode: subscribe every declared consumer and log what they
/// receive until `shutdown` is cancelled or all streams end. Returns `Ok`
/// in both cases, and right away when no consumer is declared.
pub async fn run_consumer(args: ConsumerArgs, shutdown: CancellationToken) -> Result<()> {
    let config: ConsumerConfig = load_config(&args.cons_config)?;
    if config.consumers.is_empty() {
        warn!(config = ?args.cons_config, "no consumers declared");
    }

    let client = DanubeBroker::connect(&args.danube_addr).await?;

    consume(&config, &client, shutdown).await?;
    Ok(())
}

pub async fn consume(
    config: &ConsumerConfig,
    client: &dyn BrokerClient,
    shutdown: CancellationToken,
) -> Result<Vec<ConsumerSummary>> {
    let pool = ConsumerPool::start_all(&config.consumers, client, shutdown).await?;
    if pool.is_empty() {
        warn!("no receive loops started, consumer mode exits");
        return Ok(Vec::new());
    }
    info!(consumers = pool.len(), "all consumers subscribed");

    let summaries = pool.wait().await;
    for summary in &summaries {
        info!(
            consumer = %summary.name,
            received = summary.received,
            "consumer stopped"
        );
    }

    Ok(summaries)
}
