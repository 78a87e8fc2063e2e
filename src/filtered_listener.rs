use crate::button::Button;
use crate::controller::Controller;
use crate::event::ControllerListener;

/// Wraps a listener and forwards only callbacks for controllers matching a predicate.
///
/// Useful to follow a single model (by GUID) or a single slot (by id):
///
/// ```
/// use padwatch::filtered_listener::FilteredListener;
/// use padwatch::logger::LogListener;
///
/// let only_arcade = FilteredListener::new(
///     |c| c.guid == "030044f05e040000e002000000007200",
///     LogListener::new(),
/// );
/// # let _ = only_arcade;
/// ```
pub struct FilteredListener<L> {
    predicate: Box<dyn Fn(&Controller) -> bool + Send + Sync>,
    inner: L,
}

impl<L: ControllerListener> FilteredListener<L> {
    pub fn new(predicate: impl Fn(&Controller) -> bool + Send + Sync + 'static, inner: L) -> Self {
        Self {
            predicate: Box::new(predicate),
            inner,
        }
    }

    pub fn inner(&self) -> &L {
        &self.inner
    }
}

impl<L: ControllerListener> ControllerListener for FilteredListener<L> {
    fn connected(&self, controller: &Controller) {
        if (self.predicate)(controller) {
            self.inner.connected(controller);
        }
    }

    fn disconnected(&self, controller: &Controller) {
        if (self.predicate)(controller) {
            self.inner.disconnected(controller);
        }
    }

    fn pressed(&self, controller: &Controller, button: Button) {
        if (self.predicate)(controller) {
            self.inner.pressed(controller, button);
        }
    }

    fn released(&self, controller: &Controller, button: Button) {
        if (self.predicate)(controller) {
            self.inner.released(controller, button);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ChannelListener, EventKind};
    use std::sync::mpsc;

    #[test]
    fn forwards_only_matching_controllers() {
        let (tx, rx) = mpsc::channel();
        let l = FilteredListener::new(|c| c.id == 2, ChannelListener::new(tx));

        let one = Controller::new(1, "g".into(), "One".into());
        let two = Controller::new(2, "g".into(), "Two".into());
        l.connected(&one);
        l.connected(&two);
        l.pressed(&one, Button::L1);
        l.pressed(&two, Button::R1);

        let got: Vec<(u32, EventKind)> = rx.try_iter().map(|e| (e.controller.id, e.kind)).collect();
        assert_eq!(
            got,
            vec![(2, EventKind::Connected), (2, EventKind::Pressed(Button::R1))]
        );
    }
}
