//! Observer Configuration
//!
//! Two process-wide switches control observer components:
//!
//! - **static rendering**: renders run plainly, without tracking or
//!   subscriptions. Meant for one-shot output such as
//!   [`render_to_string`](crate::host::render_to_string). Can be toggled
//!   both ways.
//! - **devtools**: enables render/destroy reports on the instrumentation
//!   channel. Once enabled it stays enabled.
//!
//! [`ObserverConfig::global`] is the default every plain
//! [`observer`](crate::observer()) call uses. Tests and embedders that need
//! isolation create their own with [`ObserverConfig::new`] and pass it to
//! [`observer_with`](crate::observer_with). Each config carries the
//! [`Instrumentation`] its components report to.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

use crate::error::ObserverError;
use crate::instrument::Instrumentation;

/// Serializable form of a config's switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub static_rendering: bool,
    pub devtools: bool,
}

/// Shared handle to one set of switches and its instrumentation channel.
#[derive(Clone)]
pub struct ObserverConfig {
    inner: Arc<ConfigInner>,
}

struct ConfigInner {
    static_rendering: AtomicBool,
    devtools: AtomicBool,
    instrumentation: Instrumentation,
}

static GLOBAL: OnceLock<ObserverConfig> = OnceLock::new();

impl ObserverConfig {
    /// A fresh config with both switches off.
    pub fn new() -> Self {
        Self::from_settings(Settings::default())
    }

    /// The process-wide default.
    pub fn global() -> &'static ObserverConfig {
        GLOBAL.get_or_init(ObserverConfig::new)
    }

    pub fn from_settings(settings: Settings) -> Self {
        Self {
            inner: Arc::new(ConfigInner {
                static_rendering: AtomicBool::new(settings.static_rendering),
                devtools: AtomicBool::new(settings.devtools),
                instrumentation: Instrumentation::new(),
            }),
        }
    }

    /// Parse [`Settings`] from JSON, e.g. `{"static_rendering": true}`.
    pub fn from_json(json: &str) -> Result<Self, ObserverError> {
        let settings: Settings = serde_json::from_str(json)?;
        Ok(Self::from_settings(settings))
    }

    /// Builder form of [`use_static_rendering`](Self::use_static_rendering).
    pub fn with_static_rendering(self, enabled: bool) -> Self {
        self.use_static_rendering(enabled);
        self
    }

    /// Builder form of [`enable_devtools`](Self::enable_devtools).
    pub fn with_devtools(self) -> Self {
        self.enable_devtools();
        self
    }

    /// Switch static rendering on or off.
    ///
    /// Components already subscribed keep their tracking sessions; they
    /// stop re-rendering reactively only once they render in static mode.
    pub fn use_static_rendering(&self, enabled: bool) {
        let previous = self.inner.static_rendering.swap(enabled, Ordering::SeqCst);
        if previous != enabled {
            tracing::debug!(enabled, "static rendering toggled");
        }
    }

    pub fn is_static_rendering(&self) -> bool {
        self.inner.static_rendering.load(Ordering::SeqCst)
    }

    /// Enable render/destroy reports. There is no way back.
    pub fn enable_devtools(&self) {
        if !self.inner.devtools.swap(true, Ordering::SeqCst) {
            tracing::debug!("devtools enabled");
        }
    }

    pub fn devtools_enabled(&self) -> bool {
        self.inner.devtools.load(Ordering::SeqCst)
    }

    pub fn instrumentation(&self) -> &Instrumentation {
        &self.inner.instrumentation
    }

    /// Current switches.
    pub fn settings(&self) -> Settings {
        Settings {
            static_rendering: self.is_static_rendering(),
            devtools: self.devtools_enabled(),
        }
    }

    /// Whether both handles share the same switches.
    pub fn ptr_eq(a: &ObserverConfig, b: &ObserverConfig) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObserverConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverConfig")
            .field("settings", &self.settings())
            .finish()
    }
}

/// Toggle static rendering on the global config.
pub fn use_static_rendering(enabled: bool) {
    ObserverConfig::global().use_static_rendering(enabled);
}

/// Whether the global config renders statically.
pub fn is_using_static_rendering() -> bool {
    ObserverConfig::global().is_static_rendering()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_rendering_toggles_both_ways() {
        let config = ObserverConfig::new();
        assert!(!config.is_static_rendering());

        config.use_static_rendering(true);
        assert!(config.is_static_rendering());

        config.use_static_rendering(false);
        assert!(!config.is_static_rendering());
    }

    #[test]
    fn clones_share_switches() {
        let config = ObserverConfig::new();
        let clone = config.clone();
        clone.enable_devtools();

        assert!(config.devtools_enabled());
        assert!(ObserverConfig::ptr_eq(&config, &clone));
        assert!(!ObserverConfig::ptr_eq(&config, &ObserverConfig::new()));
    }

    #[test]
    fn settings_parse_from_json() {
        let config = ObserverConfig::from_json(r#"{"devtools": true}"#).unwrap();
        assert_eq!(
            config.settings(),
            Settings {
                static_rendering: false,
                devtools: true,
            }
        );
    }

    #[test]
    fn unknown_settings_are_rejected() {
        let err = ObserverConfig::from_json(r#"{"dev_tools": true}"#).unwrap_err();
        assert!(matches!(err, ObserverError::InvalidSettings(_)));
    }
}
