use serde::Deserialize;
use std::path::Path;

use crate::error::SyncError;

/// Allowed difference between corresponding orientation components before two
/// image planes are considered differently oriented. Small compared to the
/// unit length, so roughly an angle in radians (about 3 degrees).
pub const DEFAULT_ORIENTATION_TOLERANCE: f64 = 0.05;

/// Session settings, usually read from a TOML file.
///
/// ```toml
/// [registration]
/// orientation_tolerance = 0.05
/// staleness = "either"
///
/// [zoom_pan]
/// sync_zoom = true
/// sync_pan = false
///
/// [[synchronizer]]
/// id = "ct-pet-camera"
/// kind = "camera"
/// sources = ["ct"]
/// targets = ["ct", "pet"]
/// ```
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    pub registration: RegistrationConfig,
    pub zoom_pan: ZoomPanOptions,
    #[serde(rename = "synchronizer")]
    pub synchronizers: Vec<SynchronizerConfig>,
}

impl SyncConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, SyncError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, SyncError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| SyncError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RegistrationConfig {
    pub orientation_tolerance: f64,
    pub staleness: StalenessPolicy,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            orientation_tolerance: DEFAULT_ORIENTATION_TOLERANCE,
            staleness: StalenessPolicy::default(),
        }
    }
}

/// When a cached transform counts as stale.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StalenessPolicy {
    /// Reject the entry if either viewport's recorded frame disagrees.
    #[default]
    Either,
    /// Reject only if both disagree. Lets a single-viewport frame change
    /// return an outdated transform; kept for hosts relying on the old behavior.
    Both,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ZoomPanOptions {
    pub sync_zoom: bool,
    pub sync_pan: bool,
}

impl Default for ZoomPanOptions {
    fn default() -> Self {
        Self {
            sync_zoom: true,
            sync_pan: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SynchronizerKind {
    Camera,
    Voi,
    ZoomPan,
    StackImage,
}

/// A synchronizer group declared up front.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SynchronizerConfig {
    pub id: String,
    pub kind: SynchronizerKind,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub targets: Vec<String>,
}
