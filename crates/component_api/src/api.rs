use std::sync::Arc;

use crate::{
    bus::{Bus, LocalBus},
    controller::{ComponentController, DataSetCallback, DeliveryPolicy, InitCallback},
    dispatcher::{ComponentDispatcher, DispatcherState},
    error::ComponentError,
};

/// Owns the bus, controller and dispatcher of one embedded component.
///
/// The dispatcher is listening as soon as construction returns. The
/// controller outlives restarts, so registered callbacks survive them.
pub struct ComponentApi {
    bus: Arc<dyn Bus>,
    controller: Arc<ComponentController>,
    dispatcher: ComponentDispatcher,
}

impl ComponentApi {
    pub fn new(bus: Arc<dyn Bus>) -> Result<Self, ComponentError> {
        Self::with_policy(bus, DeliveryPolicy::default())
    }

    pub fn with_policy(bus: Arc<dyn Bus>, policy: DeliveryPolicy) -> Result<Self, ComponentError> {
        let controller = Arc::new(ComponentController::with_policy(bus.clone(), policy));
        let dispatcher = ComponentDispatcher::new(bus.clone(), controller.clone());
        dispatcher.init()?;
        Ok(Self {
            bus,
            controller,
            dispatcher,
        })
    }

    /// Builds the component side of an in-process link and returns the host end with it.
    pub fn local(policy: DeliveryPolicy) -> Result<(Self, LocalBus), ComponentError> {
        let (component_end, host_end) = LocalBus::pair();
        let api = Self::with_policy(Arc::new(component_end), policy)?;
        Ok((api, host_end))
    }

    pub fn get_controller(
        &self,
        on_init: Option<InitCallback>,
        on_dataset: Option<DataSetCallback>,
    ) -> Arc<ComponentController> {
        if let Some(callback) = on_init {
            self.controller.set_init_callback(callback);
        }
        if let Some(callback) = on_dataset {
            self.controller.set_dataset_callback(callback);
        }
        self.controller.clone()
    }

    pub fn controller(&self) -> Arc<ComponentController> {
        self.controller.clone()
    }

    pub fn bus(&self) -> &Arc<dyn Bus> {
        &self.bus
    }

    pub fn state(&self) -> DispatcherState {
        self.dispatcher.state()
    }

    pub fn restart(&self) -> Result<(), ComponentError> {
        self.destroy();
        self.dispatcher.init()
    }

    pub fn destroy(&self) {
        self.dispatcher.stop();
    }
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
