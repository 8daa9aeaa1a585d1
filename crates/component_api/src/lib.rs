//! Lifecycle protocol between a host dashboard and an embedded component.
//!
//! ```text
//! host ──► Bus ──► ComponentDispatcher (decode + route) ──► ComponentController ──► callbacks
//! component ──► ComponentController::report_configuration_* ──► Bus ──► host
//! ```
//!
//! [`ComponentApi`] wires the three pieces together and owns their lifecycle.

pub mod api;
pub mod bus;
pub mod controller;
pub mod dispatcher;
pub mod error;

pub use api::ComponentApi;
pub use bus::{Bus, EnvelopeHandler, LocalBus, Side, SubscriptionId};
pub use controller::{ComponentController, DataSetCallback, DeliveryPolicy, InitCallback};
pub use dispatcher::{ComponentDispatcher, DispatcherState};
pub use error::{ComponentError, TransportError};
