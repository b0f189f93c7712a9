use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    client::{BrokerClient, DanubeBroker},
    config::{load_config, ProducerConfig},
    errors::Result,
    ingress,
    producer_registry::ProducerRegistry,
};

#[derive(Debug, Clone, Parser)]
#[command(after_help = EXAMPLES_TEXT)]
pub struct ProducerArgs {
    #[arg(
        long,
        default_value = "0.0.0.0:4040",
        help = "Address to bind the HTTP server"
    )]
    pub server_addr: String,

    #[arg(long, help = "Producer configuration YAML file")]
    pub prod_config: PathBuf,

    #[arg(
        long,
        default_value = "0.0.0.0:6650",
        help = "Address of the Danube Broker"
    )]
    pub danube_addr: String,
}

const EXAMPLES_TEXT: &str = r#"
EXAMPLES:
    danube-pubsub producer --prod-config ./config/producer.yaml \
        --danube-addr 127.0.0.1:6650 --server-addr 0.0.0.0:4040

    curl -X PUT -H "Content-Type: application/json" \
        -d '{"field1":"value","field2":42}' http://localhost:4040/pubsub/json
    curl -X PUT -d 'hello danube' http://localhost:4040/pubsub/string
    curl -X PUT -d '42' http://localhost:4040/pubsub/number
"#;

/// Producer mode: load the declarations, create every producer, then serve
/// the HTTP ingress until `shutdown` is cancelled.
pub async fn run_producer(args: ProducerArgs, shutdown: CancellationToken) -> Result<()> {
    let config: ProducerConfig = load_config(&args.prod_config)?;
    if config.producers.is_empty() {
        warn!(config = ?args.prod_config, "no producers declared");
    }

    let client = DanubeBroker::connect(&args.danube_addr).await?;

    serve_producers(&config, &client, &args.server_addr, shutdown).await
}

/// Registration completes before the listener is bound, so every request sees
/// the fully built registry.
pub async fn serve_producers(
    config: &ProducerConfig,
    client: &dyn BrokerClient,
    server_addr: &str,
    shutdown: CancellationToken,
) -> Result<()> {
    let registry = Arc::new(ProducerRegistry::build_all(&config.producers, client).await?);
    info!(producers = registry.len(), "producer registry ready");

    let listener = ingress::bind(server_addr).await?;
    ingress::serve(listener, registry, shutdown).await
}
