//! Configuration types for podcast assembly.
//!
//! [`MixConfig`] is project-level metadata supplied by the caller
//! (background music, sound-effect map, target sample rate).
//! [`GenerationSettings`] is the per-segment synthesis configuration,
//! parsed from the upstream settings blob with unknown keys rejected.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::{MixcastError, Result};

/// Default canonical sample rate in Hz (matches the TTS model output).
pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;

/// Project-level mix metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MixConfig {
    /// Background music bed settings.
    pub background_music: BackgroundMusicConfig,
    /// Sound-effect name → asset file.
    pub sound_effects: HashMap<String, PathBuf>,
    /// Canonical sample rate all audio is resampled to before compositing.
    pub target_sample_rate: u32,
}

impl Default for MixConfig {
    fn default() -> Self {
        Self {
            background_music: BackgroundMusicConfig::default(),
            sound_effects: HashMap::new(),
            target_sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

impl MixConfig {
    /// Parse mix metadata from the caller's JSON representation.
    ///
    /// # Errors
    ///
    /// Returns [`MixcastError::Config`] if the JSON is malformed.
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| MixcastError::Config(format!("failed to parse mix metadata: {e}")))
    }
}

/// Background music bed configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundMusicConfig {
    /// Whether a music bed is mixed under the program.
    pub enabled: bool,
    /// Music asset file (looped to cover the full program length).
    pub file: Option<PathBuf>,
    /// Linear fade-in duration at the head, in ms.
    pub fade_in_ms: u64,
    /// Linear fade-out duration at the tail, in ms.
    pub fade_out_ms: u64,
    /// Gain applied to the bed before summing.
    pub volume: f32,
}

impl Default for BackgroundMusicConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            file: None,
            fade_in_ms: 5_000,
            fade_out_ms: 10_000,
            volume: 0.15,
        }
    }
}

/// Per-segment synthesis settings.
///
/// The upstream script parser hands these over as a free-form JSON
/// object; parsing is strict so a typo'd key fails loudly instead of
/// being silently ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerationSettings {
    /// Synthesis language code.
    pub language: String,
    /// Deterministic sampling seed, if pinned.
    pub seed: Option<u64>,
    /// Free-text style instruction passed to the synthesis model.
    pub style: Option<String>,
    /// Model variant to synthesize with (e.g. `"1.7B"`, `"0.6B"`).
    pub model_variant: String,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            language: "en".to_owned(),
            seed: None,
            style: None,
            model_variant: "1.7B".to_owned(),
        }
    }
}

impl GenerationSettings {
    /// Parse settings from the upstream JSON blob.
    ///
    /// An empty or absent blob yields the defaults; unknown keys are
    /// rejected explicitly.
    ///
    /// # Errors
    ///
    /// Returns [`MixcastError::Config`] on malformed JSON or unknown keys.
    pub fn from_json(raw: Option<&str>) -> Result<Self> {
        match raw {
            None => Ok(Self::default()),
            Some(s) if s.trim().is_empty() => Ok(Self::default()),
            Some(s) => serde_json::from_str(s).map_err(|e| {
                MixcastError::Config(format!("invalid generation settings: {e}"))
            }),
        }
    }
}
