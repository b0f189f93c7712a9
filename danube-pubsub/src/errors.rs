use std::path::PathBuf;

use danube_client::errors::DanubeError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PubSubError>;

#[derive(Debug, Error)]
pub enum PubSubError {
    #[error("failed to open config file {path:?}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path:?}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("JSON schema is required for producer {0} with schema type 'json'")]
    MissingJsonSchema(String),

    #[error("unknown schema type {schema} for producer {producer}")]
    UnknownSchema { producer: String, schema: String },

    #[error("unknown subscription type {subscription_type} for consumer {consumer}")]
    UnknownSubscription {
        consumer: String,
        subscription_type: String,
    },

    #[error("unable to parse the service address: {0}")]
    InvalidServiceAddress(String),

    #[error("danube client error: {0}")]
    Client(#[from] DanubeError),

    #[error("failed to bind HTTP server on {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("HTTP server error: {0}")]
    Serve(std::io::Error),
}
