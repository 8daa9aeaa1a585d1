//! Component-facing callback registry and configuration signal.

use std::{
    str::FromStr,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use serde::{
    de::{self, IntoDeserializer},
    Deserialize,
};
use shared::{
    domain::{ConfigurationStatus, DataSet, InitParams},
    protocol::Envelope,
};
use tracing::debug;

use crate::{bus::Bus, error::ComponentError};

pub type InitCallback = Arc<dyn Fn(InitParams) + Send + Sync>;
pub type DataSetCallback = Arc<dyn Fn(DataSet) + Send + Sync>;

/// What happens to an event that arrives while no callback is registered
/// for its kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryPolicy {
    /// The event is discarded.
    #[default]
    #[serde(alias = "drop", alias = "drop-unhandled")]
    DropUnhandled,
    /// The latest unhandled event of each kind is kept and handed once to
    /// the next callback registered for that kind.
    #[serde(alias = "replay", alias = "replay-latest")]
    ReplayLatest,
}

impl DeliveryPolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        raw.parse().ok()
    }
}

/// Accepts the same spellings as a config file, ignoring case.
impl FromStr for DeliveryPolicy {
    type Err = de::value::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        Self::deserialize(normalized.as_str().into_deserializer())
    }
}

#[derive(Default)]
struct CallbackRegistry {
    on_init: Option<InitCallback>,
    on_dataset: Option<DataSetCallback>,
    pending_init: Option<InitParams>,
    pending_dataset: Option<DataSet>,
    paused: bool,
}

pub struct ComponentController {
    bus: Arc<dyn Bus>,
    policy: DeliveryPolicy,
    registry: Mutex<CallbackRegistry>,
}

impl ComponentController {
    pub fn new(bus: Arc<dyn Bus>) -> Self {
        Self::with_policy(bus, DeliveryPolicy::default())
    }

    pub fn with_policy(bus: Arc<dyn Bus>, policy: DeliveryPolicy) -> Self {
        Self {
            bus,
            policy,
            registry: Mutex::new(CallbackRegistry::default()),
        }
    }

    pub fn policy(&self) -> DeliveryPolicy {
        self.policy
    }

    pub fn set_on_init<F>(&self, callback: F)
    where
        F: Fn(InitParams) + Send + Sync + 'static,
    {
        self.set_init_callback(Arc::new(callback));
    }

    pub fn set_on_dataset<F>(&self, callback: F)
    where
        F: Fn(DataSet) + Send + Sync + 'static,
    {
        self.set_dataset_callback(Arc::new(callback));
    }

    /// Replaces the init callback. Under [`DeliveryPolicy::ReplayLatest`] a
    /// held init event is handed to it before this returns, or on the next
    /// resume while the dispatcher is stopped.
    pub fn set_init_callback(&self, callback: InitCallback) {
        let replay = {
            let mut registry = self.registry();
            registry.on_init = Some(callback.clone());
            if registry.paused {
                None
            } else {
                registry.pending_init.take()
            }
        };
        if let Some(params) = replay {
            debug!(kind = "Init", "replaying held event to new callback");
            callback(params);
        }
    }

    pub fn set_dataset_callback(&self, callback: DataSetCallback) {
        let replay = {
            let mut registry = self.registry();
            registry.on_dataset = Some(callback.clone());
            if registry.paused {
                None
            } else {
                registry.pending_dataset.take()
            }
        };
        if let Some(dataset) = replay {
            debug!(kind = "Dataset", "replaying held event to new callback");
            callback(dataset);
        }
    }

    pub fn has_init_callback(&self) -> bool {
        self.registry().on_init.is_some()
    }

    pub fn has_dataset_callback(&self) -> bool {
        self.registry().on_dataset.is_some()
    }

    pub fn report_configuration_ok(&self) -> Result<(), ComponentError> {
        self.report_configuration(ConfigurationStatus::Ok)
    }

    pub fn report_configuration_invalid(
        &self,
        reason: impl Into<String>,
    ) -> Result<(), ComponentError> {
        self.report_configuration(ConfigurationStatus::invalid(reason))
    }

    /// Sends the status to the host. Repeated identical reports are all sent.
    pub fn report_configuration(&self, status: ConfigurationStatus) -> Result<(), ComponentError> {
        if let ConfigurationStatus::Invalid { reason } = &status {
            if reason.trim().is_empty() {
                return Err(ComponentError::InvalidReason);
            }
        }
        let envelope = Envelope::from(status);
        self.bus.send_envelope(&envelope)?;
        debug!(kind = envelope.kind(), "configuration status sent");
        Ok(())
    }

    pub(crate) fn deliver_init(&self, params: InitParams) {
        let callback = {
            let mut registry = self.registry();
            match registry.on_init.clone() {
                Some(callback) => {
                    registry.pending_init = None;
                    callback
                }
                None => {
                    if self.policy == DeliveryPolicy::ReplayLatest {
                        registry.pending_init = Some(params);
                    }
                    debug!(kind = "Init", policy = ?self.policy, "no callback registered");
                    return;
                }
            }
        };
        callback(params);
    }

    pub(crate) fn deliver_dataset(&self, dataset: DataSet) {
        let callback = {
            let mut registry = self.registry();
            match registry.on_dataset.clone() {
                Some(callback) => {
                    registry.pending_dataset = None;
                    callback
                }
                None => {
                    if self.policy == DeliveryPolicy::ReplayLatest {
                        registry.pending_dataset = Some(dataset);
                    }
                    debug!(kind = "Dataset", policy = ?self.policy, "no callback registered");
                    return;
                }
            }
        };
        callback(dataset);
    }

    /// Holds replays back while the dispatcher is stopped.
    pub(crate) fn pause(&self) {
        self.registry().paused = true;
    }

    /// Lifts [`pause`](Self::pause) and replays events held for callbacks
    /// registered in the meantime.
    pub(crate) fn resume(&self) {
        let (init, dataset) = {
            let mut registry = self.registry();
            registry.paused = false;
            let init = match registry.on_init.clone() {
                Some(callback) => registry.pending_init.take().map(|params| (callback, params)),
                None => None,
            };
            let dataset = match registry.on_dataset.clone() {
                Some(callback) => registry
                    .pending_dataset
                    .take()
                    .map(|dataset| (callback, dataset)),
                None => None,
            };
            (init, dataset)
        };
        if let Some((callback, params)) = init {
            debug!(kind = "Init", "replaying held event on resume");
            callback(params);
        }
        if let Some((callback, dataset)) = dataset {
            debug!(kind = "Dataset", "replaying held event on resume");
            callback(dataset);
        }
    }

    fn registry(&self) -> MutexGuard<'_, CallbackRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
