//! Poll real HID gamepads and log every event until Ctrl-C.
//!
//! `cargo run --example hid_poll --features hid [config.toml]`

use std::sync::Arc;

use padwatch::backends::hid::HidPort;
use padwatch::{Engine, EngineConfig, LogListener};
use tracing_subscriber::EnvFilter;

fn main() -> padwatch::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    let mut engine = Engine::new(HidPort::default(), config);
    engine
        .handle()
        .add_engine_status_listener(Arc::new(LogListener))
        .add_controller_listener(Arc::new(LogListener));

    // blocks on this thread; the process is expected to be interrupted
    engine.run()
}
