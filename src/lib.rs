//! padwatch: fixed-cadence controller polling.
//!
//! A device layer reports one raw button bitmask per controller. `padwatch` polls
//! it every tick, tracks controller identity across hot-plug, diffs consecutive
//! samples and delivers `connected` / `disconnected` / `pressed` / `released`
//! callbacks to registered listeners.
//!
//! ```no_run
//! use std::sync::Arc;
//! use padwatch::backends::virtual_input::VirtualPort;
//! use padwatch::{Engine, EngineConfig, LogListener};
//!
//! let engine = Engine::new(VirtualPort::new(), EngineConfig::default());
//! engine
//!     .handle()
//!     .add_engine_status_listener(Arc::new(LogListener))
//!     .add_controller_listener(Arc::new(LogListener));
//!
//! let running = engine.start().expect("device layer");
//! // ...
//! running.shutdown().expect("polling thread");
//! ```

pub mod backends;
pub mod button;
pub mod config;
pub mod controller;
pub mod device;
pub mod diff;
pub mod engine;
pub mod error;
pub mod event;
pub mod eventbus;
pub mod filtered_listener;
pub mod logger;
pub mod registry;
pub mod snapshot;

pub use button::{BitBinding, Button, ButtonMap};
pub use config::EngineConfig;
pub use controller::Controller;
pub use device::{DeviceId, DeviceQuery};
pub use engine::{Engine, EngineHandle, RunningEngine};
pub use error::{Error, Result};
pub use event::{ChannelListener, ControllerEvent, ControllerListener, EngineStatusListener, EventKind};
pub use filtered_listener::FilteredListener;
pub use logger::LogListener;
pub use snapshot::Snapshot;
