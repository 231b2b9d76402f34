//! Sample-accurate timeline compositor.
//!
//! Places rendered clips at their computed offsets, loops and fades
//! the background-music bed, inserts sound effects, peak-normalizes,
//! and encodes one mono WAV stream at the canonical sample rate.
//!
//! All inputs are read-only; the engine never mutates segment or
//! project state. A missing or unreadable asset contributes silence
//! (with a warning) — only encoding the final buffer can fail.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::assets::load_audio_mono;
use crate::config::{BackgroundMusicConfig, MixConfig};
use crate::error::{MixcastError, Result};
use crate::project::{TimelineItem, TimelineSource};

/// Timeline compositor for one project.
#[derive(Debug, Clone)]
pub struct Mixer {
    target_sample_rate: u32,
}

impl Mixer {
    /// Create a mixer producing output at `target_sample_rate`.
    pub fn new(target_sample_rate: u32) -> Self {
        Self { target_sample_rate }
    }

    /// Canonical output sample rate.
    pub fn target_sample_rate(&self) -> u32 {
        self.target_sample_rate
    }

    /// Composite all timeline items into one encoded WAV stream.
    ///
    /// Deterministic given identical inputs and identical underlying
    /// assets. Zero speech items produce a valid zero-length stream.
    ///
    /// # Errors
    ///
    /// Returns [`MixcastError::Encoding`] only if encoding the final
    /// buffer fails; per-item asset failures degrade to silence.
    pub fn mix(&self, items: &[TimelineItem], config: &MixConfig) -> Result<Vec<u8>> {
        let total_samples = self.output_length_samples(items);
        let mut buffer = vec![0.0f32; total_samples];

        self.place_clips(&mut buffer, items);

        if config.background_music.enabled {
            self.mix_background(&mut buffer, &config.background_music);
        }

        if !config.sound_effects.is_empty() {
            self.insert_effects(&mut buffer, items, &config.sound_effects);
        }

        peak_normalize(&mut buffer);

        info!(
            "mixed {} items into {} samples @ {} Hz",
            items.len(),
            buffer.len(),
            self.target_sample_rate
        );

        self.encode_wav(&buffer)
    }

    /// Output length: the furthest end of any rendered speech clip.
    fn output_length_samples(&self, items: &[TimelineItem]) -> usize {
        let mut max_end_ms: u64 = 0;
        for item in items {
            let TimelineSource::Clip(generation) = &item.source else {
                continue;
            };
            let effective_ms = generation
                .duration_ms
                .saturating_sub(item.trim_start_ms)
                .saturating_sub(item.trim_end_ms);
            max_end_ms = max_end_ms.max(item.start_time_ms + effective_ms);
        }
        self.ms_to_samples(max_end_ms)
    }

    /// Sum every rendered clip into the buffer at its offset.
    ///
    /// Additive placement lets overlapping tracks (e.g. simultaneous
    /// speakers) co-exist.
    fn place_clips(&self, buffer: &mut [f32], items: &[TimelineItem]) {
        for item in items {
            let TimelineSource::Clip(generation) = &item.source else {
                continue;
            };

            let mut clip = match load_audio_mono(&generation.asset_path, self.target_sample_rate) {
                Ok(samples) => samples,
                Err(e) => {
                    warn!(
                        "skipping clip {}: {e}",
                        generation.asset_path.display()
                    );
                    continue;
                }
            };

            let trim_start = self.ms_to_samples(item.trim_start_ms);
            let trim_end = self.ms_to_samples(item.trim_end_ms);
            if trim_start + trim_end >= clip.len() {
                continue;
            }
            clip.truncate(clip.len() - trim_end);
            clip.drain(..trim_start);

            add_at(buffer, &clip, self.ms_to_samples(item.start_time_ms), item.volume);
        }
    }

    /// Loop the music bed across the whole program, fade, and sum.
    fn mix_background(&self, buffer: &mut [f32], bg: &BackgroundMusicConfig) {
        let Some(file) = &bg.file else {
            return;
        };

        let bed = match load_audio_mono(file, self.target_sample_rate) {
            Ok(samples) => samples,
            Err(e) => {
                warn!("skipping background music {}: {e}", file.display());
                return;
            }
        };
        if bed.is_empty() || buffer.is_empty() {
            return;
        }

        let mut looped = tile_to_length(&bed, buffer.len());
        apply_fades(
            &mut looped,
            self.ms_to_samples(bg.fade_in_ms),
            self.ms_to_samples(bg.fade_out_ms),
        );

        for (out, s) in buffer.iter_mut().zip(looped.iter()) {
            *out += s * bg.volume;
        }
    }

    /// Sum matching effect assets at their marker offsets, untrimmed.
    fn insert_effects(
        &self,
        buffer: &mut [f32],
        items: &[TimelineItem],
        effects: &HashMap<String, PathBuf>,
    ) {
        for item in items {
            let TimelineSource::Marker { name } = &item.source else {
                continue;
            };
            let Some(file) = effects.get(name) else {
                continue;
            };

            let effect = match load_audio_mono(file, self.target_sample_rate) {
                Ok(samples) => samples,
                Err(e) => {
                    warn!("skipping sound effect '{name}' ({}): {e}", file.display());
                    continue;
                }
            };

            add_at(buffer, &effect, self.ms_to_samples(item.start_time_ms), 1.0);
        }
    }

    /// Encode the mix buffer as 16-bit PCM mono WAV bytes.
    fn encode_wav(&self, buffer: &[f32]) -> Result<Vec<u8>> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.target_sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut bytes = Vec::new();
        {
            let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec)
                .map_err(|e| MixcastError::Encoding(format!("failed to create wav writer: {e}")))?;
            for &s in buffer {
                let clamped = s.clamp(-1.0, 1.0);
                let v = (clamped * i16::MAX as f32).round() as i16;
                writer
                    .write_sample(v)
                    .map_err(|e| MixcastError::Encoding(format!("failed to write sample: {e}")))?;
            }
            writer
                .finalize()
                .map_err(|e| MixcastError::Encoding(format!("failed to finalize wav: {e}")))?;
        }
        Ok(bytes)
    }

    fn ms_to_samples(&self, ms: u64) -> usize {
        ((ms * self.target_sample_rate as u64) / 1_000) as usize
    }
}

/// Sum `clip` into `buffer` starting at `offset`, clipped to bounds.
fn add_at(buffer: &mut [f32], clip: &[f32], offset: usize, volume: f32) {
    if offset >= buffer.len() {
        return;
    }
    let end = (offset + clip.len()).min(buffer.len());
    for (out, s) in buffer[offset..end].iter_mut().zip(clip.iter()) {
        *out += s * volume;
    }
}

/// Repeat `source` end-to-end until it covers `length`, truncating the
/// final repetition.
fn tile_to_length(source: &[f32], length: usize) -> Vec<f32> {
    let mut out = Vec::with_capacity(length);
    while out.len() < length {
        let remaining = length - out.len();
        let take = remaining.min(source.len());
        out.extend_from_slice(&source[..take]);
    }
    out
}

/// Apply linear fade-in and fade-out ramps, clamped to track length.
fn apply_fades(track: &mut [f32], fade_in_samples: usize, fade_out_samples: usize) {
    let len = track.len();
    if len == 0 {
        return;
    }

    let fade_in = fade_in_samples.min(len);
    if fade_in > 0 {
        for (i, s) in track[..fade_in].iter_mut().enumerate() {
            *s *= i as f32 / fade_in as f32;
        }
    }

    let fade_out = fade_out_samples.min(len);
    if fade_out > 0 {
        let start = len - fade_out;
        for (i, s) in track[start..].iter_mut().enumerate() {
            *s *= 1.0 - (i + 1) as f32 / fade_out as f32;
        }
    }
}

/// Scale the whole buffer down so the loudest sample is exactly 1.0.
///
/// Never scales up: a quiet mix stays quiet. Clip prevention, not
/// loudness normalization.
fn peak_normalize(buffer: &mut [f32]) {
    let peak = buffer.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
    if peak > 1.0 {
        let scale = 1.0 / peak;
        for s in buffer.iter_mut() {
            *s *= scale;
        }
    }
}
