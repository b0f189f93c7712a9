use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    client::{BrokerClient, MessageConsumer, ReceivedMessage},
    config::{ConsumerSpec, SubscriptionKind},
    errors::Result,
};

// payloads above this size are not echoed in full
const LARGE_MESSAGE_THRESHOLD: usize = 1024;

/// What a receive loop reports once it has stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerSummary {
    pub name: String,
    pub received: u64,
}

/// One receive loop per declared consumer, all stopped by the same token.
#[derive(Debug)]
pub struct ConsumerPool {
    tasks: Vec<(String, JoinHandle<u64>)>,
    shutdown: CancellationToken,
}

impl ConsumerPool {
    /// Subscribes every declared consumer and starts its receive loop.
    ///
    /// Subscription kinds are resolved for all declarations before the first
    /// subscribe. If a subscribe fails, the loops already started are
    /// cancelled and the error is returned.
    pub async fn start_all(
        specs: &[ConsumerSpec],
        client: &dyn BrokerClient,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        let kinds = specs
            .iter()
            .map(ConsumerSpec::subscription_kind)
            .collect::<Result<Vec<SubscriptionKind>>>()?;

        let mut tasks = Vec::with_capacity(specs.len());

        for (spec, kind) in specs.iter().zip(kinds) {
            let consumer = match client.subscribe(spec, kind).await {
                Ok(consumer) => consumer,
                Err(e) => {
                    shutdown.cancel();
                    return Err(e);
                }
            };

            info!(
                consumer = %spec.name,
                topic = %spec.topic,
                subscription = %spec.subscription_name,
                subscription_type = %kind,
                "Consumer {} created for topic {}",
                spec.name,
                spec.topic
            );

            let handle = tokio::spawn(receive_loop(
                spec.name.clone(),
                consumer,
                shutdown.child_token(),
            ));
            tasks.push((spec.name.clone(), handle));
        }

        Ok(ConsumerPool { tasks, shutdown })
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Token that stops every receive loop of this pool.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Waits for every receive loop to stop, either because its stream ended
    /// or because the pool was cancelled.
    pub async fn wait(self) -> Vec<ConsumerSummary> {
        let (names, handles): (Vec<_>, Vec<_>) = self.tasks.into_iter().unzip();

        join_all(handles)
            .await
            .into_iter()
            .zip(names)
            .map(|(joined, name)| {
                let received = joined.unwrap_or_else(|e| {
                    error!(consumer = %name, error = %e, "receive loop panicked");
                    0
                });
                ConsumerSummary { name, received }
            })
            .collect()
    }
}

async fn receive_loop(
    name: String,
    mut consumer: Box<dyn MessageConsumer>,
    cancel: CancellationToken,
) -> u64 {
    let mut received = 0u64;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!(consumer = %name, received, "receive loop cancelled");
                break;
            }
            next = consumer.next_message() => match next {
                Some(message) => {
                    received += 1;
                    log_message(&name, &message);
                    // arm bodies are not raced against the cancel branch, the ack always runs
                    if let Err(e) = consumer.ack(&message).await {
                        warn!(consumer = %name, error = %e, "failed to acknowledge message");
                    }
                }
                None => {
                    warn!(consumer = %name, received, "message stream ended");
                    break;
                }
            }
        }
    }

    consumer.close().await;
    received
}

fn log_message(consumer: &str, message: &ReceivedMessage) {
    info!(
        consumer = %consumer,
        message_id = %message.message_id,
        size = message.payload.len(),
        "Consumer {} received message: {}",
        consumer,
        preview(&message.payload)
    );
}

pub(crate) fn preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) if payload.len() <= LARGE_MESSAGE_THRESHOLD => text.to_string(),
        Ok(text) => {
            let cut = (0..=LARGE_MESSAGE_THRESHOLD)
                .rev()
                .find(|i| text.is_char_boundary(*i))
                .unwrap_or(0);
            format!("{}... [{} bytes]", &text[..cut], payload.len())
        }
        Err(_) => format!("[binary data - {} bytes]", payload.len()),
    }
}
