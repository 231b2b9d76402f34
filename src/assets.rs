//! Asset storage and loading for rendered clips and mix sources.
//!
//! Rendered speech is saved as 16-bit mono WAV under a caller-provided
//! root, named by generation id. Loading decodes any container
//! symphonia supports (wav/mp3/aac/mp4) to mono f32 and resamples to
//! the requested rate with linear interpolation.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{MixcastError, Result};

/// On-disk store for rendered audio clips.
#[derive(Debug, Clone)]
pub struct AssetLibrary {
    root: PathBuf,
}

impl AssetLibrary {
    /// Create a library rooted at `root`. The directory is created on
    /// first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the library.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Save a rendered clip as `<root>/<generation_id>.wav`.
    ///
    /// Returns the path written. This is the one-time write that fills
    /// a generation result's asset path.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the WAV
    /// cannot be written.
    pub fn save_clip(
        &self,
        generation_id: &str,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<PathBuf> {
        fs::create_dir_all(&self.root)?;
        let path = self.root.join(format!("{generation_id}.wav"));
        write_wav_f32_mono(&path, samples, sample_rate)?;
        info!(
            "saved clip {} ({} samples @ {sample_rate} Hz)",
            path.display(),
            samples.len()
        );
        Ok(path)
    }
}

/// Decode an audio file to mono f32 at `target_rate`.
///
/// Multi-channel sources are downmixed by averaging; sources at a
/// different native rate are resampled with linear interpolation.
///
/// # Errors
///
/// Returns [`MixcastError::AssetLoad`] if the file cannot be opened,
/// probed, or decoded.
pub fn load_audio_mono(path: &Path, target_rate: u32) -> Result<Vec<f32>> {
    let (samples, native_rate) = decode_audio_to_mono_f32(path)?;
    if native_rate == target_rate {
        Ok(samples)
    } else {
        Ok(resample_linear_mono(&samples, native_rate, target_rate))
    }
}

fn decode_audio_to_mono_f32(path: &Path) -> Result<(Vec<f32>, u32)> {
    use symphonia::core::audio::SampleBuffer;
    use symphonia::core::codecs::DecoderOptions;
    use symphonia::core::errors::Error as SymphError;
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    let file = std::fs::File::open(path)
        .map_err(|e| MixcastError::AssetLoad(format!("failed to open {}: {e}", path.display())))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| MixcastError::AssetLoad(format!("failed to probe audio: {e}")))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| MixcastError::AssetLoad("no default audio track".into()))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| MixcastError::AssetLoad("unknown sample rate".into()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| MixcastError::AssetLoad(format!("failed to create decoder: {e}")))?;

    let mut out: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphError::IoError(e)) => {
                if e.kind() == std::io::ErrorKind::UnexpectedEof {
                    break;
                }
                return Err(MixcastError::AssetLoad(format!("audio read error: {e}")));
            }
            Err(e) => return Err(MixcastError::AssetLoad(format!("audio read error: {e}"))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphError::DecodeError(_)) => continue,
            Err(e) => return Err(MixcastError::AssetLoad(format!("audio decode error: {e}"))),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count();
        let frames = decoded.frames() as u64;

        let frames_usize = usize::try_from(frames).unwrap_or(usize::MAX);
        let required = frames_usize.saturating_mul(channels);
        let needs_new = match sample_buf.as_ref() {
            Some(b) => b.capacity() < required,
            None => true,
        };

        if needs_new {
            sample_buf = Some(SampleBuffer::<f32>::new(frames, spec));
        } else if let Some(b) = sample_buf.as_mut() {
            b.clear();
        }

        if let Some(b) = sample_buf.as_mut() {
            b.copy_interleaved_ref(decoded);
        }

        let data = match sample_buf.as_ref() {
            Some(b) => b.samples(),
            None => &[],
        };
        if channels <= 1 {
            out.extend_from_slice(data);
        } else {
            for frame in data.chunks_exact(channels) {
                let mut sum = 0.0f32;
                for s in frame {
                    sum += *s;
                }
                out.push(sum / channels as f32);
            }
        }
    }

    Ok((out, sample_rate))
}

/// Write mono f32 samples as a 16-bit PCM WAV file.
pub(crate) fn write_wav_f32_mono(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| MixcastError::Encoding(format!("failed to create wav writer: {e}")))?;

    for &s in samples {
        let clamped = s.clamp(-1.0, 1.0);
        let v = (clamped * i16::MAX as f32).round() as i16;
        writer
            .write_sample(v)
            .map_err(|e| MixcastError::Encoding(format!("failed to write wav sample: {e}")))?;
    }
    writer
        .finalize()
        .map_err(|e| MixcastError::Encoding(format!("failed to finalize wav: {e}")))?;
    Ok(())
}

/// Linear-interpolation resampler for mono buffers.
pub(crate) fn resample_linear_mono(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if input.is_empty() || from_rate == to_rate {
        return input.to_vec();
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let out_len = ((input.len() as f64) * ratio).round() as usize;
    let mut out = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let src_pos = (i as f64) / ratio;
        let src_i0 = src_pos.floor() as isize;
        let src_i1 = src_i0 + 1;
        let t = (src_pos - src_i0 as f64) as f32;

        let s0 = sample_clamped(input, src_i0);
        let s1 = sample_clamped(input, src_i1);
        out.push(s0 * (1.0 - t) + s1 * t);
    }

    out
}

fn sample_clamped(input: &[f32], idx: isize) -> f32 {
    if idx <= 0 {
        return input[0];
    }
    let idx = idx as usize;
    if idx >= input.len() {
        return input[input.len() - 1];
    }
    input[idx]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_and_load_round_trip() {
        let dir = match tempfile::tempdir() {
            Ok(d) => d,
            Err(e) => panic!("tempdir failed: {e}"),
        };
        let library = AssetLibrary::new(dir.path());

        // 100ms of a quiet ramp at 24kHz.
        let samples: Vec<f32> = (0..2_400).map(|i| (i as f32 / 2_400.0) * 0.5).collect();
        let path = match library.save_clip("gen-1", &samples, 24_000) {
            Ok(p) => p,
            Err(e) => panic!("save failed: {e}"),
        };
        assert!(path.ends_with("gen-1.wav"));

        let loaded = match load_audio_mono(&path, 24_000) {
            Ok(s) => s,
            Err(e) => panic!("load failed: {e}"),
        };
        assert_eq!(loaded.len(), samples.len());
        // 16-bit quantization bounds the round-trip error.
        for (a, b) in loaded.iter().zip(samples.iter()) {
            assert!((a - b).abs() < 2.0 / i16::MAX as f32);
        }
    }

    #[test]
    fn load_resamples_to_target_rate() {
        let dir = match tempfile::tempdir() {
            Ok(d) => d,
            Err(e) => panic!("tempdir failed: {e}"),
        };
        let library = AssetLibrary::new(dir.path());
        let samples = vec![0.25f32; 48_000];
        let path = match library.save_clip("gen-2", &samples, 48_000) {
            Ok(p) => p,
            Err(e) => panic!("save failed: {e}"),
        };

        let loaded = match load_audio_mono(&path, 24_000) {
            Ok(s) => s,
            Err(e) => panic!("load failed: {e}"),
        };
        assert_eq!(loaded.len(), 24_000);
    }

    #[test]
    fn load_missing_file_is_asset_error() {
        let result = load_audio_mono(Path::new("/nonexistent/clip.wav"), 24_000);
        assert!(matches!(result, Err(MixcastError::AssetLoad(_))));
    }

    #[test]
    fn load_downmixes_stereo() {
        let dir = match tempfile::tempdir() {
            Ok(d) => d,
            Err(e) => panic!("tempdir failed: {e}"),
        };
        let path = dir.path().join("stereo.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 24_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = match hound::WavWriter::create(&path, spec) {
            Ok(w) => w,
            Err(e) => panic!("writer failed: {e}"),
        };
        for _ in 0..1_000 {
            writer.write_sample(8_000i16).unwrap();
            writer.write_sample(-8_000i16).unwrap();
        }
        writer.finalize().unwrap();

        let loaded = match load_audio_mono(&path, 24_000) {
            Ok(s) => s,
            Err(e) => panic!("load failed: {e}"),
        };
        assert_eq!(loaded.len(), 1_000);
        // L and R cancel when averaged.
        assert!(loaded.iter().all(|s| s.abs() < 1e-3));
    }

    #[test]
    fn resample_identity_when_rates_match() {
        let input = vec![0.1, 0.2, 0.3];
        assert_eq!(resample_linear_mono(&input, 24_000, 24_000), input);
    }

    #[test]
    fn resample_halves_length() {
        let input = vec![0.5f32; 1_000];
        let out = resample_linear_mono(&input, 48_000, 24_000);
        assert_eq!(out.len(), 500);
        assert!(out.iter().all(|s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn resample_empty_input() {
        assert!(resample_linear_mono(&[], 44_100, 24_000).is_empty());
    }
}
