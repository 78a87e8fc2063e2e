//! Engine configuration.
//!
//! The engine recognizes three knobs, all supplied at construction:
//! - `tick_ms`: polling period in milliseconds (default `20`),
//! - `name_overrides`: GUID → display name, consulted before the device-reported name,
//! - `buttons`: the [`ButtonMap`] (bit width and bit → button table).
//!
//! Configs can be written by hand as TOML or JSON:
//!
//! ```toml
//! tick_ms = 10
//!
//! [name_overrides]
//! "030044f05e040000e002000000007200" = "8BitDo Arcade Stick Switch"
//!
//! [buttons]
//! width = 16
//! bindings = [{ bit = 0, button = "Button1" }]
//! ```
//!
//! Missing fields fall back to [`EngineConfig::default`].

use crate::button::ButtonMap;
use crate::controller::UNDEFINED_NAME;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Default polling period.
pub const DEFAULT_TICK_MS: u64 = 20;

/// GUID of the 8BitDo Arcade Stick in Switch mode, which reports a generic name.
pub const ARCADE_STICK_GUID: &str = "030044f05e040000e002000000007200";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tick_ms: u64,
    pub name_overrides: BTreeMap<String, String>,
    pub buttons: ButtonMap,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let mut name_overrides = BTreeMap::new();
        name_overrides.insert(
            ARCADE_STICK_GUID.to_string(),
            "8BitDo Arcade Stick Switch".to_string(),
        );
        Self {
            tick_ms: DEFAULT_TICK_MS,
            name_overrides,
            buttons: ButtonMap::default(),
        }
    }
}

impl EngineConfig {
    /// Polling period, never shorter than 1 ms.
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    /// Builder-style override of the polling period.
    pub fn with_tick(mut self, period: Duration) -> Self {
        self.tick_ms = period.as_millis().max(1) as u64;
        self
    }

    /// Builder-style override of the button table.
    pub fn with_buttons(mut self, buttons: ButtonMap) -> Self {
        self.buttons = buttons;
        self
    }

    /// Add or replace a GUID → name override.
    pub fn with_override(mut self, guid: impl Into<String>, name: impl Into<String>) -> Self {
        self.name_overrides.insert(guid.into(), name.into());
        self
    }

    /// Display name for a device: override, then reported name, then `"Undefined"`.
    pub fn resolve_name(&self, guid: &str, reported: Option<String>) -> String {
        if let Some(name) = self.name_overrides.get(guid) {
            return name.clone();
        }
        reported.unwrap_or_else(|| UNDEFINED_NAME.to_string())
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Load a `.toml` or `.json` file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&text),
            Some("json") => Self::from_json_str(&text),
            _ => Err(Error::UnsupportedConfigFormat(path.to_path_buf())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::button::Button;

    #[test]
    fn defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.tick_period(), Duration::from_millis(20));
        assert_eq!(cfg.buttons, ButtonMap::default());
        assert_eq!(
            cfg.name_overrides.get(ARCADE_STICK_GUID).map(String::as_str),
            Some("8BitDo Arcade Stick Switch")
        );
    }

    #[test]
    fn override_beats_reported_name() {
        let cfg = EngineConfig::default();
        let name = cfg.resolve_name(ARCADE_STICK_GUID, Some("Pro Controller".into()));
        assert_eq!(name, "8BitDo Arcade Stick Switch");
        assert_eq!(cfg.resolve_name("other", Some("Pad".into())), "Pad");
        assert_eq!(cfg.resolve_name("other", None), UNDEFINED_NAME);
    }

    #[test]
    fn parses_toml() {
        let cfg = EngineConfig::from_toml_str(
            r#"
            tick_ms = 5

            [name_overrides]
            "abcd" = "Stick"

            [buttons]
            width = 16
            bindings = [
                { bit = 0, button = "Button1" },
                { bit = 15, button = "Start" },
            ]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.tick_period(), Duration::from_millis(5));
        assert_eq!(cfg.name_overrides.len(), 1);
        assert_eq!(cfg.buttons.width(), 16);
        assert_eq!(cfg.buttons.lookup(15), Some(Button::Start));
        assert_eq!(cfg.buttons.lookup(1), None);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let cfg = EngineConfig::from_json_str(r#"{ "tick_ms": 0 }"#).unwrap();
        assert_eq!(cfg.tick_period(), Duration::from_millis(1));
        assert_eq!(cfg.buttons, ButtonMap::default());
    }

    #[test]
    fn rejects_bad_button_table() {
        let err = EngineConfig::from_toml_str(
            r#"
            [buttons]
            width = 8
            bindings = [{ bit = 9, button = "L1" }]
            "#,
        );
        assert!(matches!(err, Err(Error::ConfigToml(_))));
    }

    #[test]
    fn load_rejects_unknown_extension() {
        let dir = std::env::temp_dir().join("padwatch-config-test.yaml");
        std::fs::write(&dir, "tick_ms: 5").unwrap();
        let err = EngineConfig::load(&dir);
        let _ = std::fs::remove_file(&dir);
        assert!(matches!(err, Err(Error::UnsupportedConfigFormat(_))));
    }
}
