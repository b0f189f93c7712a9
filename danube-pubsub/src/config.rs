use std::{fmt, fs, path::Path, str::FromStr};

use danube_client::SubType;
use serde::{de::DeserializeOwned, Deserialize};

use crate::errors::{PubSubError, Result};

/// Producer mode configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProducerConfig {
    #[serde(default)]
    pub producers: Vec<ProducerSpec>,
}

/// Consumer mode configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConsumerConfig {
    #[serde(default)]
    pub consumers: Vec<ConsumerSpec>,
}

/// A producer declaration. `schema` stays a raw string here, it is resolved
/// into a [`SchemaKind`] when the producer is registered.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProducerSpec {
    pub name: String,
    pub topic: String,
    pub schema: String,
    // required iff schema == "json"
    #[serde(default)]
    pub json_schema: Option<String>,
}

impl ProducerSpec {
    pub fn schema_kind(&self) -> Result<SchemaKind> {
        self.schema
            .parse()
            .map_err(|_| PubSubError::UnknownSchema {
                producer: self.name.clone(),
                schema: self.schema.clone(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConsumerSpec {
    pub name: String,
    pub topic: String,
    pub subscription_name: String,
    pub subscription_type: String,
}

impl ConsumerSpec {
    pub fn subscription_kind(&self) -> Result<SubscriptionKind> {
        self.subscription_type
            .parse()
            .map_err(|_| PubSubError::UnknownSubscription {
                consumer: self.name.clone(),
                subscription_type: self.subscription_type.clone(),
            })
    }
}

/// Payload encoding declared by a producer. Each kind owns one ingress route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaKind {
    Json,
    String,
    Number,
}

impl SchemaKind {
    pub const ALL: [SchemaKind; 3] = [SchemaKind::Json, SchemaKind::String, SchemaKind::Number];

    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaKind::Json => "json",
            SchemaKind::String => "string",
            SchemaKind::Number => "number",
        }
    }
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchemaKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "json" => Ok(SchemaKind::Json),
            "string" => Ok(SchemaKind::String),
            "number" => Ok(SchemaKind::Number),
            other => Err(format!("unknown schema type: '{}'", other)),
        }
    }
}

/// Delivery-sharing mode of a consumer subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionKind {
    Exclusive,
    Shared,
    Failover,
}

impl fmt::Display for SubscriptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubscriptionKind::Exclusive => "exclusive",
            SubscriptionKind::Shared => "shared",
            SubscriptionKind::Failover => "failover",
        };
        f.write_str(name)
    }
}

impl FromStr for SubscriptionKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exclusive" => Ok(SubscriptionKind::Exclusive),
            "shared" => Ok(SubscriptionKind::Shared),
            "failover" => Ok(SubscriptionKind::Failover),
            other => Err(format!("unknown subscription type: '{}'", other)),
        }
    }
}

impl From<SubscriptionKind> for SubType {
    fn from(kind: SubscriptionKind) -> Self {
        match kind {
            SubscriptionKind::Exclusive => SubType::Exclusive,
            SubscriptionKind::Shared => SubType::Shared,
            SubscriptionKind::Failover => SubType::FailOver,
        }
    }
}

/// Reads and decodes a YAML configuration file. No defaults are filled in
/// for missing required fields, the decode fails instead.
pub fn load_config<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| PubSubError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;

    serde_yaml::from_str(&content).map_err(|source| PubSubError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}
