use std::sync::Arc;

use anyhow::Result;
use component_api::{Bus, LocalBus, SubscriptionId, TransportError};
use shared::{
    domain::{DataSet, InitParams},
    protocol::{Envelope, RawEnvelope},
};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Init,
    Dataset,
    Run,
    Restart,
    Destroy,
    Status,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "init" => Some(Self::Init),
            "dataset" | "data" => Some(Self::Dataset),
            "run" => Some(Self::Run),
            "restart" => Some(Self::Restart),
            "destroy" => Some(Self::Destroy),
            "status" => Some(Self::Status),
            "quit" | "exit" => Some(Self::Quit),
            _ => None,
        }
    }

    pub const HELP: &str = "commands: init | dataset | run | restart | destroy | status | quit";
}

/// Host end of the link, standing in for the page that embeds the component.
pub struct DevPane {
    host: LocalBus,
    init_params: InitParams,
    dataset: DataSet,
}

impl DevPane {
    pub fn new(host: LocalBus, init_params: InitParams, dataset: DataSet) -> Self {
        Self {
            host,
            init_params,
            dataset,
        }
    }

    /// Logs every configuration report the component sends back.
    pub fn watch_status(&self) -> Result<SubscriptionId, TransportError> {
        self.host.subscribe(Arc::new(|raw: RawEnvelope| match raw.decode() {
            Ok(Envelope::ConfigOk) => info!("component reported a valid configuration"),
            Ok(Envelope::ConfigInvalid { reason }) => {
                warn!(reason = %reason, "component reported an invalid configuration")
            }
            Ok(other) => debug!(kind = other.kind(), "unexpected envelope on host end"),
            Err(err) => warn!(error = %err, "undecodable envelope on host end"),
        }))
    }

    pub fn send_init(&self) -> Result<(), TransportError> {
        info!(keys = self.init_params.len(), "sending Init");
        self.host
            .send_envelope(&Envelope::Init(self.init_params.clone()))
    }

    pub fn send_dataset(&self) -> Result<(), TransportError> {
        info!(rows = self.dataset.row_count(), "sending Dataset");
        self.host
            .send_envelope(&Envelope::Dataset(self.dataset.clone()))
    }
}

#[cfg(test)]
#[path = "tests/pane_tests.rs"]
mod tests;
