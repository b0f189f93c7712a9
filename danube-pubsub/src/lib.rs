//! Danube-PubSub
//!
//! Demo harness around the Danube client: a producer mode that exposes an HTTP
//! ingress forwarding payloads into topics, and a consumer mode that
//! subscribes to topics and logs every received message.

pub mod client;
pub use client::{BrokerClient, DanubeBroker, MessageConsumer, MessageProducer, ReceivedMessage};

pub mod config;
pub use config::{
    ConsumerConfig, ConsumerSpec, ProducerConfig, ProducerSpec, SchemaKind, SubscriptionKind,
};

pub mod errors;
pub use errors::{PubSubError, Result};

pub mod producer_registry;
pub use producer_registry::{ProducerRegistry, RegisteredProducer, SchemaDescriptor};

pub mod ingress;

pub mod consumer_pool;
pub use consumer_pool::{ConsumerPool, ConsumerSummary};

mod producer;
pub use producer::{run_producer, serve_producers, ProducerArgs};

mod consumer;
pub use consumer::{consume, run_consumer, ConsumerArgs};
