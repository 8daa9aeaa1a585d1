//! Decodes inbound envelopes and routes them to the controller.
//!
//! ```text
//! New ──init()──► Listening ──stop()──► Stopped ──init()──► Listening
//! ```
//!
//! Every delivery re-checks the lifecycle before touching the controller, so
//! an envelope the transport had already queued when `stop()` ran is dropped.
//! `stop()` returns only after a delivery already under way has finished,
//! unless it is called from inside that delivery.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use shared::{
    error::EnvelopeError,
    protocol::{Envelope, RawEnvelope},
};
use tracing::{debug, info, warn};

use crate::{
    bus::{Bus, SubscriptionId},
    controller::ComponentController,
    error::ComponentError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    New,
    Listening,
    Stopped,
}

struct Lifecycle {
    state: DispatcherState,
    generation: u64,
    subscription: Option<SubscriptionId>,
}

pub struct ComponentDispatcher {
    bus: Arc<dyn Bus>,
    controller: Arc<ComponentController>,
    lifecycle: Arc<Mutex<Lifecycle>>,
}

impl ComponentDispatcher {
    pub fn new(bus: Arc<dyn Bus>, controller: Arc<ComponentController>) -> Self {
        Self {
            bus,
            controller,
            lifecycle: Arc::new(Mutex::new(Lifecycle {
                state: DispatcherState::New,
                generation: 0,
                subscription: None,
            })),
        }
    }

    pub fn state(&self) -> DispatcherState {
        lock(&self.lifecycle).state
    }

    /// Subscribes to the bus. A no-op while already listening; a failed
    /// subscription leaves the state untouched.
    pub fn init(&self) -> Result<(), ComponentError> {
        self.listen()?;
        self.controller.resume();
        Ok(())
    }

    fn listen(&self) -> Result<(), ComponentError> {
        let mut lifecycle = lock(&self.lifecycle);
        if lifecycle.state == DispatcherState::Listening {
            return Ok(());
        }

        let generation = lifecycle.generation + 1;
        let guard = self.lifecycle.clone();
        let controller = self.controller.clone();
        let subscription = self.bus.subscribe(Arc::new(move |raw: RawEnvelope| {
            if !is_current(&guard, generation) {
                debug!(
                    kind = raw.kind().unwrap_or("<none>"),
                    "dropping envelope delivered after stop"
                );
                return;
            }
            route(&controller, raw);
        }))?;

        lifecycle.generation = generation;
        lifecycle.subscription = Some(subscription);
        lifecycle.state = DispatcherState::Listening;
        info!(subscription = subscription.0, "component dispatcher listening");
        Ok(())
    }

    pub fn stop(&self) {
        let subscription = {
            let mut lifecycle = lock(&self.lifecycle);
            if lifecycle.state == DispatcherState::Stopped {
                return;
            }
            lifecycle.state = DispatcherState::Stopped;
            lifecycle.subscription.take()
        };
        self.controller.pause();
        // The handler takes the lifecycle lock, so it must be released
        // before waiting on the bus.
        if let Some(subscription) = subscription {
            self.bus.unsubscribe(subscription);
        }
        info!("component dispatcher stopped");
    }
}

impl Drop for ComponentDispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock(lifecycle: &Mutex<Lifecycle>) -> MutexGuard<'_, Lifecycle> {
    lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
}

fn is_current(lifecycle: &Mutex<Lifecycle>, generation: u64) -> bool {
    let lifecycle = lock(lifecycle);
    lifecycle.state == DispatcherState::Listening && lifecycle.generation == generation
}

fn route(controller: &ComponentController, raw: RawEnvelope) {
    match raw.decode() {
        Ok(Envelope::Init(params)) => {
            debug!(kind = "Init", keys = params.len(), "routing envelope");
            controller.deliver_init(params);
        }
        Ok(Envelope::Dataset(dataset)) => {
            debug!(kind = "Dataset", rows = dataset.row_count(), "routing envelope");
            controller.deliver_dataset(dataset);
        }
        Ok(other) => {
            debug!(kind = other.kind(), "ignoring component-to-host envelope");
        }
        Err(EnvelopeError::UnknownKind(kind)) => {
            debug!(kind = %kind, "ignoring envelope of unknown kind");
        }
        Err(err) => {
            warn!(error = %err, "dropping malformed envelope");
        }
    }
}

#[cfg(test)]
#[path = "tests/dispatcher_tests.rs"]
mod tests;
