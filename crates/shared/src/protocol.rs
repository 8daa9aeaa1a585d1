use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    domain::{ConfigurationStatus, DataSet, InitParams},
    error::EnvelopeError,
};

pub const KIND_INIT: &str = "Init";
pub const KIND_DATASET: &str = "Dataset";
pub const KIND_CONFIG_OK: &str = "ConfigOk";
pub const KIND_CONFIG_INVALID: &str = "ConfigInvalid";

const KNOWN_KINDS: [&str; 4] = [KIND_INIT, KIND_DATASET, KIND_CONFIG_OK, KIND_CONFIG_INVALID];

/// Lifecycle message exchanged between host and component.
///
/// `Init` and `Dataset` flow host to component; the configuration signals
/// flow back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload")]
pub enum Envelope {
    Init(InitParams),
    Dataset(DataSet),
    ConfigOk,
    ConfigInvalid { reason: String },
}

impl Envelope {
    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::Init(_) => KIND_INIT,
            Envelope::Dataset(_) => KIND_DATASET,
            Envelope::ConfigOk => KIND_CONFIG_OK,
            Envelope::ConfigInvalid { .. } => KIND_CONFIG_INVALID,
        }
    }

    pub fn configuration_status(&self) -> Option<ConfigurationStatus> {
        match self {
            Envelope::ConfigOk => Some(ConfigurationStatus::Ok),
            Envelope::ConfigInvalid { reason } => Some(ConfigurationStatus::invalid(reason.clone())),
            _ => None,
        }
    }
}

impl From<ConfigurationStatus> for Envelope {
    fn from(value: ConfigurationStatus) -> Self {
        match value {
            ConfigurationStatus::Ok => Envelope::ConfigOk,
            ConfigurationStatus::Invalid { reason } => Envelope::ConfigInvalid { reason },
        }
    }
}

/// Undecoded envelope as moved by a transport.
///
/// The content is frozen at construction; clones share it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEnvelope(Arc<Value>);

impl RawEnvelope {
    pub fn encode(envelope: &Envelope) -> Result<Self, EnvelopeError> {
        let value = serde_json::to_value(envelope).map_err(|source| EnvelopeError::Encode {
            kind: envelope.kind(),
            source,
        })?;
        Ok(Self(Arc::new(value)))
    }

    pub fn from_value(value: Value) -> Self {
        Self(Arc::new(value))
    }

    pub fn from_json_str(raw: &str) -> Result<Self, EnvelopeError> {
        Ok(Self::from_value(serde_json::from_str(raw)?))
    }

    pub fn to_json_string(&self) -> String {
        self.0.to_string()
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn kind(&self) -> Option<&str> {
        self.0.get("kind").and_then(Value::as_str)
    }

    pub fn decode(&self) -> Result<Envelope, EnvelopeError> {
        let kind = self.kind().ok_or(EnvelopeError::MissingKind)?;
        if !KNOWN_KINDS.contains(&kind) {
            return Err(EnvelopeError::UnknownKind(kind.to_string()));
        }
        Envelope::deserialize(self.0.as_ref()).map_err(|source| EnvelopeError::Malformed {
            kind: kind.to_string(),
            source,
        })
    }
}

impl TryFrom<&Envelope> for RawEnvelope {
    type Error = EnvelopeError;

    fn try_from(value: &Envelope) -> Result<Self, Self::Error> {
        RawEnvelope::encode(value)
    }
}
