//! Listener contracts and event values.
//!
//! Two independent listener kinds exist:
//! - [`EngineStatusListener`]: engine lifecycle (`started`, `closed`),
//! - [`ControllerListener`]: per-controller `connected` / `disconnected` /
//!   `pressed` / `released`.
//!
//! All callbacks run synchronously on the polling thread, in registration order.
//! Listeners receive `&Controller` and never own it. Every method has a no-op
//! default so implementors only override what they care about.
//!
//! A panicking callback is caught and logged by the dispatcher; the remaining
//! listeners, buttons and devices of the tick are still processed.
//!
//! For consumers that prefer values over callbacks, [`ChannelListener`] forwards
//! each callback as a timestamped [`ControllerEvent`] into an `mpsc` channel.

use crate::button::Button;
use crate::controller::Controller;
use std::sync::mpsc::Sender;
use std::time::Instant;

/// Engine lifecycle observer.
pub trait EngineStatusListener: Send + Sync {
    /// Device layer initialized, first tick about to run.
    fn started(&self) {}
    /// Loop exited and the device layer was released.
    fn closed(&self) {}
}

/// Controller event observer.
pub trait ControllerListener: Send + Sync {
    /// Fired once the identity is fully resolved (GUID and name).
    fn connected(&self, _controller: &Controller) {}
    /// Fired with the removed identity; its state is the last one observed.
    fn disconnected(&self, _controller: &Controller) {}
    fn pressed(&self, _controller: &Controller, _button: Button) {}
    fn released(&self, _controller: &Controller, _button: Button) {}
}

/// What happened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    Connected,
    Disconnected,
    Pressed(Button),
    Released(Button),
}

/// Timestamped controller event, as produced by [`ChannelListener`].
#[derive(Clone, Debug)]
pub struct ControllerEvent {
    /// Dispatch time (monotonic).
    pub at: Instant,
    /// Identity as seen at dispatch time.
    pub controller: Controller,
    pub kind: EventKind,
}

/// Forwards every controller callback into a channel.
///
/// Send errors (receiver dropped) are ignored.
pub struct ChannelListener {
    tx: Sender<ControllerEvent>,
}

impl ChannelListener {
    pub fn new(tx: Sender<ControllerEvent>) -> Self {
        Self { tx }
    }

    fn send(&self, controller: &Controller, kind: EventKind) {
        let _ = self.tx.send(ControllerEvent {
            at: Instant::now(),
            controller: controller.clone(),
            kind,
        });
    }
}

impl ControllerListener for ChannelListener {
    fn connected(&self, controller: &Controller) {
        self.send(controller, EventKind::Connected);
    }

    fn disconnected(&self, controller: &Controller) {
        self.send(controller, EventKind::Disconnected);
    }

    fn pressed(&self, controller: &Controller, button: Button) {
        self.send(controller, EventKind::Pressed(button));
    }

    fn released(&self, controller: &Controller, button: Button) {
        self.send(controller, EventKind::Released(button));
    }
}
