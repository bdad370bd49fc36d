//! Configuration with layered resolution using figment.
//!
//! Resolution order (highest priority last):
//! 1. Compiled defaults (`Config::default()`)
//! 2. User config: `~/.config/graphlens/config.toml` (XDG) or platform config dir
//! 3. Project config: `.graphlens.toml`
//! 4. Environment variables: `GRAPHLENS_*` (nested keys separated by `__`)
//!
//! # Example
//!
//! ```toml
//! [viewport]
//! min_zoom = 0.2
//! max_zoom = 4.0
//!
//! [engine]
//! default_layout = "concentric"
//! debounce_ms = 500
//!
//! [source]
//! data_dir = "/var/lib/graphlens"
//! ```

use std::ops::Deref;
use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Boxed wrapper for figment::Error to reduce Result size on the stack.
#[derive(Debug)]
pub struct ConfigError(Box<figment::Error>);

impl Deref for ConfigError {
    type Target = figment::Error;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self(Box::new(err))
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub viewport: ViewportConfig,
    pub engine: EngineConfig,
    pub scene: SceneConfig,
    pub export: ExportConfig,
    pub source: SourceConfig,
}

/// Zoom bounds and fit padding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    /// Lowest zoom level reachable through any viewport operation.
    pub min_zoom: f64,
    /// Highest zoom level reachable through any viewport operation.
    pub max_zoom: f64,
    /// Multiplier applied by `zoom_in`.
    pub zoom_in_factor: f64,
    /// Multiplier applied by `zoom_out`. The reciprocal of `zoom_in_factor`
    /// keeps an in/out pair an exact round trip.
    pub zoom_out_factor: f64,
    /// Padding (screen pixels) used by `fit_to_view`.
    pub fit_padding: f64,
    /// Padding (screen pixels) used when fitting search matches.
    pub search_fit_padding: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            min_zoom: 0.1,
            max_zoom: 10.0,
            zoom_in_factor: 1.2,
            zoom_out_factor: 1.0 / 1.2,
            fit_padding: 50.0,
            search_fit_padding: 80.0,
        }
    }
}

impl ViewportConfig {
    /// Usable `(min, max)` zoom bounds.
    ///
    /// Non-finite or non-positive bounds fall back to the defaults and an
    /// inverted pair is swapped, so clamping against the result never panics.
    pub fn zoom_bounds(&self) -> (f64, f64) {
        let defaults = ViewportConfig::default();
        let valid = |z: f64| z.is_finite() && z > 0.0;
        let min = if valid(self.min_zoom) { self.min_zoom } else { defaults.min_zoom };
        let max = if valid(self.max_zoom) { self.max_zoom } else { defaults.max_zoom };
        (min.min(max), min.max(max))
    }
}

/// Load sequencing and layout defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Layout used when none is requested (or an unknown one is).
    pub default_layout: String,
    /// Delay before the first initialization so the mount point has a size.
    pub init_delay_ms: u64,
    /// How many extra delays to wait for a zero-sized mount point.
    pub init_retries: u32,
    /// Debounce window for filter changes.
    pub debounce_ms: u64,
    /// `max_nodes` used when filters do not set one.
    pub default_max_nodes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_layout: "force-directed".to_string(),
            init_delay_ms: 50,
            init_retries: 5,
            debounce_ms: 300,
            default_max_nodes: 200,
        }
    }
}

/// Visual node sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub min_node_size: f64,
    pub max_node_size: f64,
    pub size_per_connection: f64,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            min_node_size: 20.0,
            max_node_size: 60.0,
            size_per_connection: 2.0,
        }
    }
}

/// Raster export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Upscaling factor applied to the full-scene raster.
    pub scale: f64,
    /// Solid background fill (hex color).
    pub background: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            scale: 2.0,
            background: "#ffffff".to_string(),
        }
    }
}

/// File-backed graph source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Directory holding `<project>.json` graph files.
    pub data_dir: PathBuf,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Load config with layered resolution (defaults → user → project → env).
    pub fn load() -> Result<Self, ConfigError> {
        Self::figment().extract().map_err(ConfigError::from)
    }

    fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            // User config
            .merge(Toml::file(Self::user_config_path()))
            // Project config
            .merge(Toml::file(".graphlens.toml"))
            // Environment variables (highest priority)
            .merge(Env::prefixed("GRAPHLENS_").split("__"))
    }

    /// User config path: ~/.config/graphlens/config.toml (XDG) or platform config dir.
    fn user_config_path() -> PathBuf {
        if let Some(home) = dirs::home_dir() {
            let xdg_path = home.join(".config").join("graphlens").join("config.toml");
            if xdg_path.exists() {
                return xdg_path;
            }
        }
        dirs::config_dir()
            .map(|p| p.join("graphlens").join("config.toml"))
            .unwrap_or_default()
    }
}
