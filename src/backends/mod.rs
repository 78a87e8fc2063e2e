//! Device Query Port implementations shipped with `padwatch`.
//!
//! - [`virtual_input::VirtualPort`]: scriptable in-memory port, always available.
//!   Drives the tests and the `virtual_demo` example.
//! - [`callback::CallbackPort`]: port fed by a native input callback through a
//!   [`callback::CallbackSink`], always available.
//! - [`hid::HidPort`]: `hidapi`-backed port for Generic Desktop joysticks and
//!   gamepads.
//!
//! # Feature flags
//! - **`hid`**: builds [`hid`] and pulls in `hidapi` (off by default, it needs the
//!   platform HID libraries at build time).
//!
//! Real applications usually bring their own port (SDL, a platform API) by
//! implementing [`DeviceQuery`](crate::device::DeviceQuery).

pub mod callback;

#[cfg(feature = "hid")]
#[cfg_attr(docsrs, doc(cfg(feature = "hid")))]
pub mod hid;

pub mod virtual_input;
