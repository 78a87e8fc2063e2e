//! Scripted hot-plug session against the in-memory device layer.
//!
//! Run with `RUST_LOG=debug cargo run --example virtual_demo` to see per-edge logs.

use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use padwatch::backends::virtual_input::VirtualPort;
use padwatch::config::ARCADE_STICK_GUID;
use padwatch::{ChannelListener, Engine, EngineConfig, EventKind, LogListener};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let port = VirtualPort::new();
    let engine = Engine::new(port.clone(), EngineConfig::default());
    let (tx, rx) = mpsc::channel();
    engine
        .handle()
        .add_engine_status_listener(Arc::new(LogListener))
        .add_controller_listener(Arc::new(ChannelListener::new(tx)));

    let running = engine.start().expect("virtual device layer");

    port.plug(0, ARCADE_STICK_GUID, "Pro Controller");
    port.plug(1, "03000000-demo", "Demo Pad");
    thread::sleep(Duration::from_millis(60));

    port.press_button(0, 0);
    port.press_button(1, 9);
    thread::sleep(Duration::from_millis(60));
    port.release_button(0, 0);
    port.set_state(1, 1 << 31); // unmapped bit, logged only
    thread::sleep(Duration::from_millis(60));

    port.unplug(1);
    thread::sleep(Duration::from_millis(60));

    println!("connected now:");
    for c in running.handle().controllers().iter() {
        println!("- {c}");
    }

    running.shutdown().expect("polling thread");

    for ev in rx.try_iter() {
        let what = match ev.kind {
            EventKind::Connected => "connected".to_string(),
            EventKind::Disconnected => "disconnected".to_string(),
            EventKind::Pressed(b) => format!("press {b}"),
            EventKind::Released(b) => format!("release {b}"),
        };
        println!("{:>3}: {}", ev.controller.id, what);
    }
}
