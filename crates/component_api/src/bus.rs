//! Transport seam between a host and an embedded component.
//!
//! [`Bus`] is the only thing the dispatcher and controller know about the
//! channel. [`LocalBus`] is the in-process implementation: a duplex link with
//! a host end and a component end, where a send on one end is delivered to
//! the subscribers of the other.
//!
//! ```text
//!  host end ── send ──► [component inbox] ──► per-subscription queue ──► task ──► handler
//!  component end ── send ──► [host inbox] ──► per-subscription queue ──► task ──► handler
//! ```
//!
//! - `send` never waits for delivery and never runs a handler inline.
//! - Each subscription drains its own queue in order, so envelopes from one
//!   sender reach one subscriber FIFO.
//! - `unsubscribe` flips the subscription inactive before its queue is
//!   dropped; anything still queued is discarded, not delivered late. It
//!   then waits for a handler call already running on another thread.

use std::{
    cell::Cell,
    collections::HashMap,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use shared::protocol::{Envelope, RawEnvelope};
use tokio::{runtime::Handle, sync::mpsc};
use tracing::{debug, warn};

use crate::error::TransportError;

pub type EnvelopeHandler = Arc<dyn Fn(RawEnvelope) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

pub trait Bus: Send + Sync {
    /// Queues `envelope` for every subscriber on the receiving side.
    fn send(&self, envelope: RawEnvelope) -> Result<(), TransportError>;

    fn subscribe(&self, handler: EnvelopeHandler) -> Result<SubscriptionId, TransportError>;

    /// No invocation of the handler starts after this returns, and one
    /// already running on another thread has finished. Called from inside
    /// the handler itself, it returns without waiting.
    fn unsubscribe(&self, subscription: SubscriptionId);

    fn send_envelope(&self, envelope: &Envelope) -> Result<(), TransportError> {
        self.send(RawEnvelope::encode(envelope)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Host,
    Component,
}

impl Side {
    fn as_str(self) -> &'static str {
        match self {
            Side::Host => "host",
            Side::Component => "component",
        }
    }
}

thread_local! {
    /// Gate of the handler running on this thread, `0` outside delivery.
    static DELIVERING: Cell<usize> = const { Cell::new(0) };
}

/// Held for the whole of one handler call.
type Gate = Arc<Mutex<()>>;

fn gate_key(gate: &Mutex<()>) -> usize {
    gate as *const Mutex<()> as usize
}

fn lock_gate(gate: &Mutex<()>) -> MutexGuard<'_, ()> {
    gate.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Subscriber {
    tx: mpsc::UnboundedSender<RawEnvelope>,
    active: Arc<AtomicBool>,
    gate: Gate,
}

impl Subscriber {
    fn deactivate(self) {
        self.active.store(false, Ordering::Release);
        drop(self.tx);
        if DELIVERING.with(Cell::get) != gate_key(&self.gate) {
            drop(lock_gate(&self.gate));
        }
    }
}

#[derive(Default)]
struct Inbox {
    subscribers: Mutex<HashMap<SubscriptionId, Subscriber>>,
}

impl Inbox {
    fn subscribers(&self) -> MutexGuard<'_, HashMap<SubscriptionId, Subscriber>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn clear(&self) {
        let drained: Vec<Subscriber> = self.subscribers().drain().map(|(_, s)| s).collect();
        for subscriber in drained {
            subscriber.deactivate();
        }
    }
}

#[derive(Default)]
struct Link {
    closed: AtomicBool,
    next_id: AtomicU64,
    host_inbox: Inbox,
    component_inbox: Inbox,
}

/// One end of an in-process duplex channel.
#[derive(Clone)]
pub struct LocalBus {
    side: Side,
    link: Arc<Link>,
}

impl LocalBus {
    /// Returns `(component_end, host_end)` of a fresh link.
    pub fn pair() -> (LocalBus, LocalBus) {
        let link = Arc::new(Link::default());
        (
            LocalBus {
                side: Side::Component,
                link: link.clone(),
            },
            LocalBus {
                side: Side::Host,
                link,
            },
        )
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Makes the link unavailable in both directions and drops every queued envelope.
    pub fn close(&self) {
        self.link.closed.store(true, Ordering::Release);
        self.link.host_inbox.clear();
        self.link.component_inbox.clear();
        debug!(side = self.side.as_str(), "local bus closed");
    }

    pub fn is_closed(&self) -> bool {
        self.link.closed.load(Ordering::Acquire)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inbound().subscribers().len()
    }

    fn inbound(&self) -> &Inbox {
        match self.side {
            Side::Host => &self.link.host_inbox,
            Side::Component => &self.link.component_inbox,
        }
    }

    fn outbound(&self) -> &Inbox {
        match self.side {
            Side::Host => &self.link.component_inbox,
            Side::Component => &self.link.host_inbox,
        }
    }
}

impl Bus for LocalBus {
    fn send(&self, envelope: RawEnvelope) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let subscribers = self.outbound().subscribers();
        for (id, subscriber) in subscribers.iter() {
            if subscriber.tx.send(envelope.clone()).is_err() {
                debug!(
                    side = self.side.as_str(),
                    subscription = id.0,
                    "subscriber queue already gone"
                );
            }
        }
        Ok(())
    }

    fn subscribe(&self, handler: EnvelopeHandler) -> Result<SubscriptionId, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let runtime = Handle::try_current().map_err(|_| TransportError::NoRuntime)?;

        let id = SubscriptionId(self.link.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        let active = Arc::new(AtomicBool::new(true));
        let gate = Gate::default();
        runtime.spawn(deliver(
            self.side,
            id,
            rx,
            active.clone(),
            gate.clone(),
            handler,
        ));

        self.inbound()
            .subscribers()
            .insert(id, Subscriber { tx, active, gate });
        debug!(side = self.side.as_str(), subscription = id.0, "subscribed");
        Ok(id)
    }

    fn unsubscribe(&self, subscription: SubscriptionId) {
        let removed = self.inbound().subscribers().remove(&subscription);
        if let Some(subscriber) = removed {
            subscriber.deactivate();
            debug!(
                side = self.side.as_str(),
                subscription = subscription.0,
                "unsubscribed"
            );
        }
    }
}

async fn deliver(
    side: Side,
    id: SubscriptionId,
    mut rx: mpsc::UnboundedReceiver<RawEnvelope>,
    active: Arc<AtomicBool>,
    gate: Gate,
    handler: EnvelopeHandler,
) {
    while let Some(envelope) = rx.recv().await {
        if !deliver_one(side, id, &active, &gate, &handler, envelope) {
            break;
        }
    }
}

/// Runs the handler under the gate. Returns `false` once the subscription
/// is inactive.
fn deliver_one(
    side: Side,
    id: SubscriptionId,
    active: &AtomicBool,
    gate: &Mutex<()>,
    handler: &EnvelopeHandler,
    envelope: RawEnvelope,
) -> bool {
    let _held = lock_gate(gate);
    if !active.load(Ordering::Acquire) {
        return false;
    }

    let kind = envelope.kind().unwrap_or("<none>").to_string();
    let outer = DELIVERING.with(|current| current.replace(gate_key(gate)));
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(envelope)));
    DELIVERING.with(|current| current.set(outer));

    if outcome.is_err() {
        warn!(
            side = side.as_str(),
            subscription = id.0,
            kind = %kind,
            "envelope handler panicked"
        );
    }
    true
}

#[cfg(test)]
#[path = "tests/bus_tests.rs"]
mod tests;
