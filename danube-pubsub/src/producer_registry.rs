use std::{collections::HashMap, sync::Arc};

use tracing::{info, warn};

use crate::{
    client::{BrokerClient, MessageProducer},
    config::{ProducerSpec, SchemaKind},
    errors::{PubSubError, Result},
};

/// Schema registration for a producer, as sent to the broker's schema registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDescriptor {
    pub subject: String,
    pub kind: SchemaKind,
    pub definition: Vec<u8>,
}

impl SchemaDescriptor {
    /// Validates the schema requirements of a producer declaration.
    ///
    /// `json` needs a non-blank `json_schema`, passed to the registry as-is.
    /// Text that does not parse as JSON is only warned about, the registry
    /// has the final say. `string` and `number` carry no user schema text.
    pub fn for_producer(spec: &ProducerSpec) -> Result<Self> {
        let kind = spec.schema_kind()?;

        let definition = match kind {
            SchemaKind::Json => {
                let text = spec
                    .json_schema
                    .as_deref()
                    .map(str::trim)
                    .filter(|text| !text.is_empty())
                    .ok_or_else(|| PubSubError::MissingJsonSchema(spec.name.clone()))?;

                if let Err(e) = serde_json::from_str::<serde_json::Value>(text) {
                    warn!(
                        producer = %spec.name,
                        error = %e,
                        "json_schema of producer {} is not valid JSON",
                        spec.name
                    );
                }

                text.as_bytes().to_vec()
            }
            SchemaKind::String | SchemaKind::Number => {
                if has_schema_text(spec) {
                    warn!(
                        producer = %spec.name,
                        schema = %kind,
                        "json_schema is ignored for producer {} with schema type '{}'",
                        spec.name,
                        kind
                    );
                }
                Vec::new()
            }
        };

        Ok(SchemaDescriptor {
            subject: subject_for_topic(&spec.topic),
            kind,
            definition,
        })
    }
}

fn has_schema_text(spec: &ProducerSpec) -> bool {
    spec.json_schema
        .as_deref()
        .is_some_and(|text| !text.trim().is_empty())
}

// "/default/orders" -> "default-orders"
fn subject_for_topic(topic: &str) -> String {
    topic.trim_start_matches('/').replace('/', "-")
}

/// A live producer together with the declaration it was created from.
#[derive(Clone)]
pub struct RegisteredProducer {
    pub name: String,
    pub topic: String,
    pub handle: Arc<dyn MessageProducer>,
}

impl std::fmt::Debug for RegisteredProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredProducer")
            .field("name", &self.name)
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}

/// Producers keyed by schema kind. Built once at startup and read-only
/// afterwards, so it is shared by the HTTP handlers without locking.
#[derive(Debug, Default)]
pub struct ProducerRegistry {
    producers: HashMap<SchemaKind, RegisteredProducer>,
}

impl ProducerRegistry {
    /// Creates every declared producer, all or nothing.
    ///
    /// All declarations are validated before the first remote call. Producers
    /// are then created in declaration order and the first failure is
    /// returned. The registry is keyed by kind, so when two declarations share
    /// a schema kind the later one replaces the earlier.
    pub async fn build_all(specs: &[ProducerSpec], client: &dyn BrokerClient) -> Result<Self> {
        let descriptors = specs
            .iter()
            .map(SchemaDescriptor::for_producer)
            .collect::<Result<Vec<_>>>()?;

        let mut registry = ProducerRegistry::default();

        for (spec, descriptor) in specs.iter().zip(descriptors) {
            let handle = client.create_producer(spec, &descriptor).await?;

            info!(
                producer = %spec.name,
                topic = %spec.topic,
                schema = %descriptor.kind,
                "Producer {} created for topic {}",
                spec.name,
                spec.topic
            );

            registry.insert(
                descriptor.kind,
                RegisteredProducer {
                    name: spec.name.clone(),
                    topic: spec.topic.clone(),
                    handle,
                },
            );
        }

        Ok(registry)
    }

    pub fn insert(&mut self, kind: SchemaKind, producer: RegisteredProducer) {
        let name = producer.name.clone();
        if let Some(replaced) = self.producers.insert(kind, producer) {
            warn!(
                schema = %kind,
                replaced = %replaced.name,
                producer = %name,
                "duplicate schema kind, producer {} is no longer reachable",
                replaced.name
            );
        }
    }

    pub fn get(&self, kind: SchemaKind) -> Option<&Arc<dyn MessageProducer>> {
        self.producers.get(&kind).map(|entry| &entry.handle)
    }

    pub fn entry(&self, kind: SchemaKind) -> Option<&RegisteredProducer> {
        self.producers.get(&kind)
    }

    pub fn kinds(&self) -> Vec<SchemaKind> {
        SchemaKind::ALL
            .into_iter()
            .filter(|kind| self.producers.contains_key(kind))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.producers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.producers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(schema: &str, json_schema: Option<&str>) -> ProducerSpec {
        ProducerSpec {
            name: "prod".into(),
            topic: "/default/events".into(),
            schema: schema.into(),
            json_schema: json_schema.map(Into::into),
        }
    }

    #[test]
    fn test_json_descriptor_carries_schema_text() {
        let schema = r#"{"type": "object", "properties": {"a": {"type": "integer"}}}"#;
        let descriptor = SchemaDescriptor::for_producer(&spec("json", Some(schema))).unwrap();
        assert_eq!(descriptor.kind, SchemaKind::Json);
        assert_eq!(descriptor.subject, "default-events");
        assert_eq!(descriptor.definition, schema.as_bytes());
    }

    #[test]
    fn test_json_descriptor_requires_schema_text() {
        for missing in [None, Some(""), Some("   ")] {
            let err = SchemaDescriptor::for_producer(&spec("json", missing)).unwrap_err();
            assert!(matches!(err, PubSubError::MissingJsonSchema(ref name) if name == "prod"));
        }
    }

    #[test]
    fn test_json_descriptor_passes_unparsable_schema_through() {
        let descriptor = SchemaDescriptor::for_producer(&spec("json", Some("{not json"))).unwrap();
        assert_eq!(descriptor.kind, SchemaKind::Json);
        assert_eq!(descriptor.definition, b"{not json");
    }

    #[test]
    fn test_string_and_number_ignore_schema_text() {
        let plain = spec("string", None);
        assert!(!has_schema_text(&plain));
        let descriptor = SchemaDescriptor::for_producer(&plain).unwrap();
        assert_eq!(descriptor.kind, SchemaKind::String);
        assert!(descriptor.definition.is_empty());

        let stray = spec("number", Some("ignored"));
        assert!(has_schema_text(&stray));
        let descriptor = SchemaDescriptor::for_producer(&stray).unwrap();
        assert_eq!(descriptor.kind, SchemaKind::Number);
        assert!(descriptor.definition.is_empty());

        assert!(!has_schema_text(&spec("string", Some("  "))));
    }

    #[test]
    fn test_unknown_schema_is_rejected() {
        let err = SchemaDescriptor::for_producer(&spec("JSON", None)).unwrap_err();
        assert!(matches!(err, PubSubError::UnknownSchema { ref schema, .. } if schema == "JSON"));
    }
}
