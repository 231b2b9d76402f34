//! Synthesis client boundary.
//!
//! The actual TTS model lives behind [`SynthesisClient`]; the
//! orchestrator only sees finite rendered buffers. The model is a
//! single shared, stateful resource: switching variants is a blocking
//! reload and serializes all work against it, so implementations take
//! `&self` and guard internal state themselves.

use async_trait::async_trait;

use crate::error::Result;

/// One synthesis call's inputs.
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    /// Text to speak.
    pub text: String,
    /// Resolved voice reference.
    pub voice: String,
    /// Language code (e.g. `"en"`).
    pub language: String,
    /// Deterministic sampling seed, if pinned.
    pub seed: Option<u64>,
    /// Free-text style instruction, if any.
    pub style: Option<String>,
}

/// A finite rendered speech buffer.
#[derive(Debug, Clone)]
pub struct SynthesizedSpeech {
    /// Mono f32 samples.
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl SynthesizedSpeech {
    /// Rendered duration in ms (sample count / sample rate).
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.samples.len() as u64 * 1_000) / self.sample_rate as u64
    }
}

/// Text-to-speech synthesis backend.
///
/// Implementations must fail with a distinguishable error rather than
/// silently returning empty audio.
#[async_trait]
pub trait SynthesisClient: Send + Sync {
    /// The currently loaded model variant, if any.
    async fn loaded_variant(&self) -> Option<String>;

    /// Load a model variant, replacing the current one.
    ///
    /// Blocking with respect to synthesis: only one variant is active
    /// at a time.
    ///
    /// # Errors
    ///
    /// Returns an error if the variant cannot be loaded.
    async fn load_variant(&self, variant: &str) -> Result<()>;

    /// Synthesize one request to a finite audio buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if synthesis fails for any reason.
    async fn synthesize(&self, request: SynthesisRequest) -> Result<SynthesizedSpeech>;
}
