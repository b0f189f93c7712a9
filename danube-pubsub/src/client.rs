//! The broker boundary.
//!
//! Everything the harness needs from the message broker goes through the
//! [`BrokerClient`], [`MessageProducer`] and [`MessageConsumer`] traits. The
//! production implementation is [`DanubeBroker`], backed by a single shared
//! `DanubeClient`.

use std::sync::Arc;

use async_trait::async_trait;
use danube_client::{Consumer, DanubeClient, Producer, SchemaType};
use danube_core::message::StreamMessage;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::{
    config::{ConsumerSpec, ProducerSpec, SchemaKind, SubscriptionKind},
    errors::{PubSubError, Result},
    producer_registry::SchemaDescriptor,
};

/// A message handed to a consumer receive loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub payload: Vec<u8>,
    pub message_id: String,
}

#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Registers the producer against the broker. May block on a remote call.
    async fn create_producer(
        &self,
        spec: &ProducerSpec,
        schema: &SchemaDescriptor,
    ) -> Result<Arc<dyn MessageProducer>>;

    /// Builds a consumer and subscribes it, returning a handle that yields the
    /// inbound message stream.
    async fn subscribe(
        &self,
        spec: &ConsumerSpec,
        kind: SubscriptionKind,
    ) -> Result<Box<dyn MessageConsumer>>;
}

#[async_trait]
pub trait MessageProducer: Send + Sync {
    /// Sends the payload as-is and returns the broker assigned message id.
    async fn send(&self, payload: Vec<u8>) -> Result<u64>;
}

#[async_trait]
pub trait MessageConsumer: Send {
    /// Waits for the next inbound message. `None` once the stream has ended.
    /// The message stays unacknowledged until [`MessageConsumer::ack`].
    async fn next_message(&mut self) -> Option<ReceivedMessage>;

    /// Acknowledges a message previously returned by `next_message`.
    async fn ack(&mut self, _message: &ReceivedMessage) -> Result<()> {
        Ok(())
    }

    async fn close(&mut self) {}
}

impl From<SchemaKind> for SchemaType {
    fn from(kind: SchemaKind) -> Self {
        match kind {
            SchemaKind::Json => SchemaType::JsonSchema,
            SchemaKind::String => SchemaType::String,
            SchemaKind::Number => SchemaType::Number,
        }
    }
}

/// Broker client backed by the Danube client library.
#[derive(Debug, Clone)]
pub struct DanubeBroker {
    client: DanubeClient,
}

impl DanubeBroker {
    /// Builds the one client handle shared by every producer and consumer of
    /// this process. The connection itself is established lazily, so an
    /// unreachable broker only shows up on producer creation or subscribe.
    pub async fn connect(address: &str) -> Result<Self> {
        let url = service_url(address)?;
        let client = DanubeClient::builder().service_url(&url).build().await?;
        info!(service_url = %url, "Danube client initialized");
        Ok(DanubeBroker { client })
    }
}

/// Accepts either a bare `host:port` or a full URL, the Danube client needs
/// the scheme.
pub fn service_url(address: &str) -> Result<String> {
    let address = address.trim();
    if address.is_empty() {
        return Err(PubSubError::InvalidServiceAddress(address.to_string()));
    }
    if address.contains("://") {
        Ok(address.to_string())
    } else {
        Ok(format!("http://{}", address))
    }
}

#[async_trait]
impl BrokerClient for DanubeBroker {
    async fn create_producer(
        &self,
        spec: &ProducerSpec,
        schema: &SchemaDescriptor,
    ) -> Result<Arc<dyn MessageProducer>> {
        let mut schema_client = self.client.schema();
        let schema_id = schema_client
            .register_schema(&schema.subject)
            .with_type(schema.kind.into())
            .with_schema_data(schema.definition.clone())
            .execute()
            .await?;

        info!(
            producer = %spec.name,
            subject = %schema.subject,
            schema_id,
            "schema registered"
        );

        let mut producer = self
            .client
            .new_producer()
            .with_topic(spec.topic.clone())
            .with_name(spec.name.clone())
            .with_schema_subject(&schema.subject)
            .build()?;

        producer.create().await?;

        Ok(Arc::new(DanubeProducer { producer }))
    }

    async fn subscribe(
        &self,
        spec: &ConsumerSpec,
        kind: SubscriptionKind,
    ) -> Result<Box<dyn MessageConsumer>> {
        let mut consumer = self
            .client
            .new_consumer()
            .with_topic(spec.topic.clone())
            .with_consumer_name(spec.name.clone())
            .with_subscription(spec.subscription_name.clone())
            .with_subscription_type(kind.into())
            .build()?;

        consumer.subscribe().await?;
        let stream = consumer.receive().await?;

        Ok(Box::new(DanubeConsumer {
            name: spec.name.clone(),
            consumer,
            stream,
            unacked: None,
        }))
    }
}

struct DanubeProducer {
    producer: Producer,
}

#[async_trait]
impl MessageProducer for DanubeProducer {
    async fn send(&self, payload: Vec<u8>) -> Result<u64> {
        Ok(self.producer.send(payload, None).await?)
    }
}

struct DanubeConsumer {
    name: String,
    consumer: Consumer,
    stream: mpsc::Receiver<StreamMessage>,
    // last delivered message, kept until the receive loop acks it
    unacked: Option<StreamMessage>,
}

#[async_trait]
impl MessageConsumer for DanubeConsumer {
    async fn next_message(&mut self) -> Option<ReceivedMessage> {
        let message = self.stream.recv().await?;

        if let Some(previous) = self.unacked.take() {
            warn!(
                consumer = %self.name,
                message_id = %previous.msg_id,
                "message replaced before it was acknowledged"
            );
        }

        let received = ReceivedMessage {
            message_id: message.msg_id.to_string(),
            payload: message.payload.clone(),
        };
        self.unacked = Some(message);
        Some(received)
    }

    async fn ack(&mut self, message: &ReceivedMessage) -> Result<()> {
        match self.unacked.take() {
            Some(pending) if pending.msg_id.to_string() == message.message_id => {
                self.consumer.ack(&pending).await?;
                Ok(())
            }
            other => {
                self.unacked = other;
                warn!(
                    consumer = %self.name,
                    message_id = %message.message_id,
                    "no pending delivery for acknowledgement"
                );
                Ok(())
            }
        }
    }

    async fn close(&mut self) {
        self.consumer.close().await;
    }
}
