//! Fan-out of freshly read device state to registered listeners.
//!
//! Listener bookkeeping belongs to the host. It hands us its current listeners through
//! [`NotificationSink`], in registration order, and we tell it which value each one gets.

use tracing::debug;

use crate::{
    address::FloatAddress,
    status::{DeviceState, STATUS_BIT_COUNT},
};

/// Host-side identity of a registered listener.
pub type SubscriberHandle = u32;

/// A registered listener and the logical address it listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscriber {
    pub handle: SubscriberHandle,
    pub address: u32,
}

/// Host side of the notification path.
pub trait NotificationSink {
    /// Listeners for boolean status bits, in registration order.
    fn status_subscribers(&self) -> Vec<Subscriber>;

    /// Listeners for scalar values, in registration order.
    fn scalar_subscribers(&self) -> Vec<Subscriber>;

    fn deliver_status(&mut self, subscriber: &Subscriber, value: bool);

    fn deliver_scalar(&mut self, subscriber: &Subscriber, value: f64);
}

/// Scalar value a listener at `address` should receive, if any.
fn scalar_for(state: &DeviceState, address: u32) -> Option<f64> {
    match FloatAddress::try_from(address).ok()? {
        FloatAddress::SetpointCurrent => Some(state.setpoint_current),
        FloatAddress::ReadbackCurrent => Some(state.readback_current),
        _ => None,
    }
}

/// Deliver `state` to every interested listener.
///
/// Does nothing unless the host is `ready` to take notifications. Returns how many deliveries
/// were made.
pub fn fan_out<N: NotificationSink + ?Sized>(state: &DeviceState, ready: bool, sink: &mut N) -> usize {
    if !ready {
        return 0;
    }

    let mut delivered = 0;
    for subscriber in sink.status_subscribers() {
        if subscriber.address < STATUS_BIT_COUNT {
            sink.deliver_status(&subscriber, state.status.bit(subscriber.address));
            delivered += 1;
        }
    }
    for subscriber in sink.scalar_subscribers() {
        if let Some(value) = scalar_for(state, subscriber.address) {
            sink.deliver_scalar(&subscriber, value);
            delivered += 1;
        }
    }
    debug!(delivered, "status fan-out");
    delivered
}

/// A sink that stores listeners and records every delivery, for hosts without their own
/// listener substrate and for tests.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    pub status: Vec<Subscriber>,
    pub scalar: Vec<Subscriber>,
    pub status_deliveries: Vec<(SubscriberHandle, bool)>,
    pub scalar_deliveries: Vec<(SubscriberHandle, f64)>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe_status(&mut self, handle: SubscriberHandle, address: u32) {
        self.status.push(Subscriber { handle, address });
    }

    pub fn subscribe_scalar(&mut self, handle: SubscriberHandle, address: u32) {
        self.scalar.push(Subscriber { handle, address });
    }

    pub fn clear_deliveries(&mut self) {
        self.status_deliveries.clear();
        self.scalar_deliveries.clear();
    }
}

impl NotificationSink for RecordingSink {
    fn status_subscribers(&self) -> Vec<Subscriber> {
        self.status.clone()
    }

    fn scalar_subscribers(&self) -> Vec<Subscriber> {
        self.scalar.clone()
    }

    fn deliver_status(&mut self, subscriber: &Subscriber, value: bool) {
        self.status_deliveries.push((subscriber.handle, value));
    }

    fn deliver_scalar(&mut self, subscriber: &Subscriber, value: f64) {
        self.scalar_deliveries.push((subscriber.handle, value));
    }
}
