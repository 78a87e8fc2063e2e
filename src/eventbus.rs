//! Listener registry and fan-out.
//!
//! Listener sequences are append-only and copy-on-write: registering clones the
//! current vector and swaps in the new one, dispatch grabs the current `Arc` and
//! iterates it without holding any lock. A listener registered from another thread,
//! or from inside a callback, is therefore picked up by the *next* notification
//! pass and can never disturb the one in progress.
//!
//! Each individual callback runs under `catch_unwind`; a panic is logged and the
//! pass continues with the next listener.

use crate::button::ButtonMap;
use crate::controller::Controller;
use crate::diff::Edges;
use crate::event::{ControllerListener, EngineStatusListener};
use parking_lot::RwLock;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Append-only, snapshot-on-iterate listener sequence.
pub struct Listeners<T: ?Sized> {
    inner: RwLock<Arc<Vec<Arc<T>>>>,
}

impl<T: ?Sized> Default for Listeners<T> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(Arc::new(Vec::new())),
        }
    }
}

impl<T: ?Sized> Listeners<T> {
    /// Append a listener. Insertion order is dispatch order.
    pub fn add(&self, listener: Arc<T>) {
        let mut guard = self.inner.write();
        let mut next = Vec::with_capacity(guard.len() + 1);
        next.extend(guard.iter().cloned());
        next.push(listener);
        *guard = Arc::new(next);
    }

    /// Current sequence; later registrations do not affect it.
    pub fn snapshot(&self) -> Arc<Vec<Arc<T>>> {
        self.inner.read().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fans engine and controller notifications out to registered listeners.
#[derive(Default)]
pub struct Dispatcher {
    status: Listeners<dyn EngineStatusListener>,
    controllers: Listeners<dyn ControllerListener>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_status_listener(&self, listener: Arc<dyn EngineStatusListener>) {
        self.status.add(listener);
    }

    pub fn add_controller_listener(&self, listener: Arc<dyn ControllerListener>) {
        self.controllers.add(listener);
    }

    pub fn status_listener_count(&self) -> usize {
        self.status.len()
    }

    pub fn controller_listener_count(&self) -> usize {
        self.controllers.len()
    }

    pub fn started(&self) {
        for l in self.status.snapshot().iter() {
            guarded("started", || l.started());
        }
    }

    pub fn closed(&self) {
        for l in self.status.snapshot().iter() {
            guarded("closed", || l.closed());
        }
    }

    pub fn connected(&self, controller: &Controller) {
        for l in self.controllers.snapshot().iter() {
            guarded("connected", || l.connected(controller));
        }
    }

    pub fn disconnected(&self, controller: &Controller) {
        for l in self.controllers.snapshot().iter() {
            guarded("disconnected", || l.disconnected(controller));
        }
    }

    /// Dispatch one device's edges: pressed bits ascending, then released bits ascending.
    ///
    /// Bits without a button in `map` are logged and skipped.
    pub fn edges(&self, controller: &Controller, edges: Edges, map: &ButtonMap) {
        if edges.is_empty() {
            return;
        }
        let listeners = self.controllers.snapshot();

        for bit in edges.pressed_bits() {
            let Some(button) = map.lookup(bit) else {
                warn!(id = controller.id, bit, "unknown button pressed");
                continue;
            };
            debug!(id = controller.id, %button, "pressed");
            for l in listeners.iter() {
                guarded("pressed", || l.pressed(controller, button));
            }
        }

        for bit in edges.released_bits() {
            let Some(button) = map.lookup(bit) else {
                warn!(id = controller.id, bit, "unknown button released");
                continue;
            };
            debug!(id = controller.id, %button, "released");
            for l in listeners.iter() {
                guarded("released", || l.released(controller, button));
            }
        }
    }
}

/// Run one listener callback, containing any panic.
fn guarded(callback: &'static str, f: impl FnOnce()) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(f)) {
        error!(callback, reason = panic_message(&*payload), "listener panicked");
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::button::Button;
    use crate::diff::diff;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Log(Mutex<Vec<String>>);

    impl Log {
        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.0.lock())
        }
    }

    struct Tagged {
        tag: &'static str,
        log: Arc<Log>,
    }

    impl ControllerListener for Tagged {
        fn pressed(&self, c: &Controller, b: Button) {
            self.log.0.lock().push(format!("{}:{}+{}", self.tag, c.id, b));
        }
        fn released(&self, c: &Controller, b: Button) {
            self.log.0.lock().push(format!("{}:{}-{}", self.tag, c.id, b));
        }
    }

    struct Bomb;

    impl ControllerListener for Bomb {
        fn pressed(&self, _c: &Controller, b: Button) {
            if b == Button::Button1 {
                panic!("listener failure");
            }
        }
    }

    fn pad(id: u32) -> Controller {
        Controller::new(id, "g".into(), "Pad".into())
    }

    #[test]
    fn dispatches_in_registration_order() {
        let log = Arc::new(Log::default());
        let d = Dispatcher::new();
        d.add_controller_listener(Arc::new(Tagged { tag: "a", log: log.clone() }));
        d.add_controller_listener(Arc::new(Tagged { tag: "b", log: log.clone() }));

        d.edges(&pad(1), diff(0b10, 0b01), &ButtonMap::default());
        assert_eq!(log.take(), vec!["a:1+1", "b:1+1", "a:1-2", "b:1-2"]);
    }

    #[test]
    fn unknown_bits_dispatch_nothing() {
        let log = Arc::new(Log::default());
        let d = Dispatcher::new();
        d.add_controller_listener(Arc::new(Tagged { tag: "a", log: log.clone() }));

        d.edges(&pad(1), diff(0, 1 << 31), &ButtonMap::default());
        d.edges(&pad(1), diff(1 << 31, 0), &ButtonMap::default());
        assert!(log.take().is_empty());
    }

    #[test]
    fn panicking_listener_is_isolated() {
        let log = Arc::new(Log::default());
        let d = Dispatcher::new();
        d.add_controller_listener(Arc::new(Bomb));
        d.add_controller_listener(Arc::new(Tagged { tag: "a", log: log.clone() }));

        // Button1 and Button2 pressed together
        d.edges(&pad(1), diff(0, 0b11), &ButtonMap::default());
        assert_eq!(log.take(), vec!["a:1+1", "a:1+2"]);
    }

    struct Registrar {
        dispatcher: Arc<Dispatcher>,
        log: Arc<Log>,
    }

    impl ControllerListener for Registrar {
        fn connected(&self, _c: &Controller) {
            self.dispatcher.add_controller_listener(Arc::new(Tagged {
                tag: "late",
                log: self.log.clone(),
            }));
        }
    }

    #[test]
    fn registering_during_dispatch_applies_to_next_pass() {
        let log = Arc::new(Log::default());
        let d = Arc::new(Dispatcher::new());
        d.add_controller_listener(Arc::new(Registrar {
            dispatcher: d.clone(),
            log: log.clone(),
        }));

        d.connected(&pad(1));
        assert_eq!(d.controller_listener_count(), 2);

        d.edges(&pad(1), diff(0, 1), &ButtonMap::default());
        assert_eq!(log.take(), vec!["late:1+1"]);
    }

    #[test]
    fn panic_message_extracts_payloads() {
        let p = catch_unwind(|| panic!("boom {}", 1)).unwrap_err();
        assert_eq!(panic_message(&*p), "boom 1");
        let p = catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_message(&*p), "static");
    }
}
