use crate::button::Button;
use crate::controller::Controller;
use crate::event::{ControllerListener, EngineStatusListener};
use tracing::info;

/// Listener that logs every engine and controller callback through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogListener;

impl LogListener {
    pub fn new() -> Self {
        LogListener
    }
}

impl EngineStatusListener for LogListener {
    fn started(&self) {
        info!("controller engine started");
    }

    fn closed(&self) {
        info!("controller engine closed");
    }
}

impl ControllerListener for LogListener {
    fn connected(&self, controller: &Controller) {
        info!(id = controller.id, guid = %controller.guid, name = %controller.name, "controller connected");
    }

    fn disconnected(&self, controller: &Controller) {
        info!(id = controller.id, name = %controller.name, state = controller.state, "controller disconnected");
    }

    fn pressed(&self, controller: &Controller, button: Button) {
        info!(id = controller.id, %button, "press");
    }

    fn released(&self, controller: &Controller, button: Button) {
        info!(id = controller.id, %button, "release");
    }
}
