#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use danube_client::errors::DanubeError;
use danube_pubsub::{
    BrokerClient, ConsumerSpec, MessageConsumer, MessageProducer, ProducerSpec, ReceivedMessage,
    Result, SchemaDescriptor, SubscriptionKind,
};

/// Producer that records every payload it is asked to send.
#[derive(Default)]
pub struct MockProducer {
    pub sent: Mutex<Vec<Vec<u8>>>,
    next_id: AtomicU64,
    fail_sends: bool,
}

impl MockProducer {
    pub fn new() -> Arc<Self> {
        Arc::new(MockProducer::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(MockProducer {
            fail_sends: true,
            ..Default::default()
        })
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageProducer for MockProducer {
    async fn send(&self, payload: Vec<u8>) -> Result<u64> {
        if self.fail_sends {
            return Err(DanubeError::Unrecoverable("broker unavailable".into()).into());
        }
        self.sent.lock().unwrap().push(payload);
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

/// Consumer fed from a fixed list of payloads. Once drained it either ends
/// the stream or, when `hold_open` is set, waits forever like a live
/// subscription.
pub struct MockConsumer {
    name: String,
    pending: VecDeque<Vec<u8>>,
    hold_open: bool,
    closed: Arc<AtomicBool>,
    acked: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl MessageConsumer for MockConsumer {
    async fn next_message(&mut self) -> Option<ReceivedMessage> {
        match self.pending.pop_front() {
            Some(payload) => Some(ReceivedMessage {
                message_id: format!("{}-{}", self.name, self.pending.len()),
                payload,
            }),
            None if self.hold_open => std::future::pending().await,
            None => None,
        }
    }

    async fn ack(&mut self, message: &ReceivedMessage) -> Result<()> {
        self.acked.lock().unwrap().push(message.message_id.clone());
        Ok(())
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// In-memory stand-in for the Danube broker.
#[derive(Default)]
pub struct MockBroker {
    pub created: Mutex<Vec<(String, SchemaDescriptor)>>,
    pub producers: Mutex<HashMap<String, Arc<MockProducer>>>,
    pub subscribed: Mutex<Vec<(String, SubscriptionKind)>>,
    pub closed: Mutex<HashMap<String, Arc<AtomicBool>>>,
    pub acked: Mutex<HashMap<String, Arc<Mutex<Vec<String>>>>>,
    inbox: Mutex<HashMap<String, Vec<Vec<u8>>>>,
    unreachable: HashSet<String>,
    hold_open: bool,
}

impl MockBroker {
    pub fn new() -> Self {
        MockBroker::default()
    }

    /// Producer creation or subscribe fails for these declaration names.
    pub fn unreachable_for(names: &[&str]) -> Self {
        MockBroker {
            unreachable: names.iter().map(|name| name.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn holding_streams_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    pub fn deliver(self, consumer: &str, payloads: &[&str]) -> Self {
        self.inbox.lock().unwrap().insert(
            consumer.to_string(),
            payloads.iter().map(|p| p.as_bytes().to_vec()).collect(),
        );
        self
    }

    pub fn producer(&self, name: &str) -> Arc<MockProducer> {
        self.producers.lock().unwrap()[name].clone()
    }

    pub fn is_closed(&self, consumer: &str) -> bool {
        self.closed.lock().unwrap()[consumer].load(Ordering::SeqCst)
    }

    /// Message ids acknowledged by this consumer, in order.
    pub fn acked(&self, consumer: &str) -> Vec<String> {
        self.acked.lock().unwrap()[consumer].lock().unwrap().clone()
    }
}

#[async_trait]
impl BrokerClient for MockBroker {
    async fn create_producer(
        &self,
        spec: &ProducerSpec,
        schema: &SchemaDescriptor,
    ) -> Result<Arc<dyn MessageProducer>> {
        if self.unreachable.contains(&spec.name) {
            return Err(DanubeError::Unrecoverable("connection refused".into()).into());
        }

        let producer = MockProducer::new();
        self.created
            .lock()
            .unwrap()
            .push((spec.name.clone(), schema.clone()));
        self.producers
            .lock()
            .unwrap()
            .insert(spec.name.clone(), producer.clone());
        Ok(producer)
    }

    async fn subscribe(
        &self,
        spec: &ConsumerSpec,
        kind: SubscriptionKind,
    ) -> Result<Box<dyn MessageConsumer>> {
        if self.unreachable.contains(&spec.name) {
            return Err(DanubeError::Unrecoverable("connection refused".into()).into());
        }

        self.subscribed
            .lock()
            .unwrap()
            .push((spec.name.clone(), kind));

        let closed = Arc::new(AtomicBool::new(false));
        self.closed
            .lock()
            .unwrap()
            .insert(spec.name.clone(), closed.clone());

        let acked = Arc::new(Mutex::new(Vec::new()));
        self.acked
            .lock()
            .unwrap()
            .insert(spec.name.clone(), acked.clone());

        let pending = self
            .inbox
            .lock()
            .unwrap()
            .remove(&spec.name)
            .unwrap_or_default();

        Ok(Box::new(MockConsumer {
            name: spec.name.clone(),
            pending: pending.into(),
            hold_open: self.hold_open,
            closed,
            acked,
        }))
    }
}

pub fn producer_spec(name: &str, schema: &str, json_schema: Option<&str>) -> ProducerSpec {
    ProducerSpec {
        name: name.to_string(),
        topic: format!("/default/{}", name),
        schema: schema.to_string(),
        json_schema: json_schema.map(str::to_string),
    }
}

pub fn consumer_spec(name: &str, subscription_type: &str) -> ConsumerSpec {
    ConsumerSpec {
        name: name.to_string(),
        topic: format!("/default/{}", name),
        subscription_name: format!("{}_subscription", name),
        subscription_type: subscription_type.to_string(),
    }
}
