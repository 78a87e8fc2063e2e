//! Button semantic table.
//!
//! Devices only report bit positions. A [`ButtonMap`] turns a bit index into a
//! logical [`Button`]; bits without an entry are "unknown" and never produce an
//! event (the engine only logs them).
//!
//! The map is plain configuration data and (de)serializes as a list of bindings:
//!
//! ```toml
//! width = 16
//! bindings = [
//!     { bit = 0, button = "Button1" },
//!     { bit = 9, button = "L1" },
//! ]
//! ```

use crate::controller::Controller;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Highest supported bitmask width.
pub const MAX_WIDTH: u8 = 32;

/// Logical controller button.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Button {
    Button1,
    Button2,
    Button3,
    Button4,
    L1,
    R1,
    Select,
    Start,
    Up,
    Down,
    Left,
    Right,
}

impl Button {
    pub const ALL: [Button; 12] = [
        Button::Button1,
        Button::Button2,
        Button::Button3,
        Button::Button4,
        Button::L1,
        Button::R1,
        Button::Select,
        Button::Start,
        Button::Up,
        Button::Down,
        Button::Left,
        Button::Right,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Button::Button1 => "1",
            Button::Button2 => "2",
            Button::Button3 => "3",
            Button::Button4 => "4",
            Button::L1 => "L1",
            Button::R1 => "R1",
            Button::Select => "Select",
            Button::Start => "Start",
            Button::Up => "Up",
            Button::Down => "Down",
            Button::Left => "Left",
            Button::Right => "Right",
        }
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One `bit → button` entry, as it appears in config files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitBinding {
    pub bit: u8,
    pub button: Button,
}

/// Fixed mapping from bit index to [`Button`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ButtonMapDef", into = "ButtonMapDef")]
pub struct ButtonMap {
    width: u8,
    table: [Option<Button>; MAX_WIDTH as usize],
}

impl ButtonMap {
    /// Empty map covering `width` bits. `width` is clamped to `1..=32`.
    pub fn empty(width: u8) -> Self {
        Self {
            width: width.clamp(1, MAX_WIDTH),
            table: [None; MAX_WIDTH as usize],
        }
    }

    /// Build a map from bindings.
    ///
    /// Fails on a bit outside `0..width` or on a bit bound twice.
    pub fn new(width: u8, bindings: &[BitBinding]) -> Result<Self> {
        if width == 0 || width > MAX_WIDTH {
            return Err(Error::ButtonTable(format!(
                "width must be in 1..={MAX_WIDTH}, got {width}"
            )));
        }
        let mut map = Self::empty(width);
        for b in bindings {
            if b.bit >= width {
                return Err(Error::ButtonTable(format!(
                    "bit {} is outside a {width}-bit mask",
                    b.bit
                )));
            }
            let slot = &mut map.table[b.bit as usize];
            if let Some(existing) = slot {
                return Err(Error::ButtonTable(format!(
                    "bit {} bound twice ({existing:?} and {:?})",
                    b.bit, b.button
                )));
            }
            *slot = Some(b.button);
        }
        Ok(map)
    }

    /// Number of significant bits in a raw sample.
    #[inline]
    pub fn width(&self) -> u8 {
        self.width
    }

    /// Mask selecting the significant bits of a raw sample.
    #[inline]
    pub fn mask(&self) -> u32 {
        if self.width >= MAX_WIDTH {
            u32::MAX
        } else {
            (1u32 << self.width) - 1
        }
    }

    /// Logical button for `bit`, or `None` when the bit is unknown.
    #[inline]
    pub fn lookup(&self, bit: u8) -> Option<Button> {
        self.table.get(bit as usize).copied().flatten()
    }

    /// Bit index carrying `button`, if mapped.
    pub fn bit_of(&self, button: Button) -> Option<u8> {
        self.table
            .iter()
            .position(|b| *b == Some(button))
            .map(|i| i as u8)
    }

    /// Whether `button` is held in the controller's last observed state.
    pub fn is_pressed(&self, controller: &Controller, button: Button) -> bool {
        self.bit_of(button)
            .is_some_and(|bit| controller.is_bit_set(bit))
    }

    /// Current bindings, ascending by bit.
    pub fn bindings(&self) -> Vec<BitBinding> {
        self.table
            .iter()
            .enumerate()
            .filter_map(|(bit, b)| {
                b.map(|button| BitBinding {
                    bit: bit as u8,
                    button,
                })
            })
            .collect()
    }
}

impl Default for ButtonMap {
    /// Layout reported by the SDL-backed device layer.
    fn default() -> Self {
        let mut map = Self::empty(MAX_WIDTH);
        for (bit, button) in [
            (0, Button::Button1),
            (1, Button::Button2),
            (2, Button::Button3),
            (3, Button::Button4),
            (4, Button::Select),
            (6, Button::Start),
            (9, Button::L1),
            (10, Button::R1),
            (11, Button::Up),
            (12, Button::Down),
            (13, Button::Left),
            (14, Button::Right),
        ] {
            map.table[bit] = Some(button);
        }
        map
    }
}

#[derive(Serialize, Deserialize)]
struct ButtonMapDef {
    #[serde(default = "default_width")]
    width: u8,
    bindings: Vec<BitBinding>,
}

fn default_width() -> u8 {
    MAX_WIDTH
}

impl TryFrom<ButtonMapDef> for ButtonMap {
    type Error = Error;

    fn try_from(def: ButtonMapDef) -> Result<Self> {
        ButtonMap::new(def.width, &def.bindings)
    }
}

impl From<ButtonMap> for ButtonMapDef {
    fn from(map: ButtonMap) -> Self {
        ButtonMapDef {
            width: map.width,
            bindings: map.bindings(),
        }
    }
}
