//! Domain model for podcast assembly projects.
//!
//! A [`Project`] is the aggregate root: it exclusively owns its ordered
//! [`Segment`]s and the [`TimelineItem`]s produced from them. Pipeline
//! and segment states are closed enums so every transition is matched
//! exhaustively.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::{GenerationSettings, MixConfig};
use crate::error::{MixcastError, Result};

/// Lifecycle state of a project's generation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Created, generation not yet started.
    Idle,
    /// The orchestrator loop is driving synthesis.
    Generating,
    /// Cooperatively paused between segments.
    Paused,
    /// Halted by a segment failure; requires `resume_from` to continue.
    PausedError,
    /// All segments terminal, mixdown succeeded.
    Completed,
    /// Mixdown or export failed.
    Error,
}

impl PipelineState {
    /// Whether `start()` may (re-)enter the generation loop from here.
    pub fn can_start(self) -> bool {
        matches!(
            self,
            Self::Idle | Self::Paused | Self::PausedError | Self::Completed | Self::Error
        )
    }
}

/// Status of a single segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentStatus {
    /// Not yet processed.
    Pending,
    /// Synthesis in flight.
    Generating,
    /// Rendered (or trivially completed for markers).
    Completed,
    /// Synthesis failed; error text recorded on the segment.
    Failed,
    /// Explicitly skipped by `resume_from`.
    Skipped,
}

impl SegmentStatus {
    /// Terminal statuses never re-enter the generation loop.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }
}

/// What a segment contains: a spoken line or a marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SegmentKind {
    /// A line of script to synthesize.
    Text {
        /// Speaker name from the script (e.g. `"host"`, `"jane"`).
        speaker: String,
        /// The text to speak.
        text: String,
        /// Resolved voice reference, mapped from the speaker upstream.
        voice: Option<String>,
        /// Per-segment synthesis settings.
        settings: GenerationSettings,
    },
    /// A sound-effect marker, resolved from the project's effect map.
    SoundEffect {
        /// Effect name looked up in [`MixConfig::sound_effects`].
        name: String,
    },
    /// A music cue marker.
    MusicCue {
        /// Cue name.
        name: String,
    },
}

impl SegmentKind {
    /// Whether this segment requires synthesis.
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text { .. })
    }
}

/// One ordered unit of the script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Unique segment id.
    pub id: String,
    /// Position within the project; contiguous `0..N-1`.
    pub order: usize,
    /// Spoken text or marker.
    pub kind: SegmentKind,
    /// Processing status.
    pub status: SegmentStatus,
    /// Error text captured from a failed synthesis call.
    pub error: Option<String>,
    /// The rendered output, once synthesis completes.
    pub generation: Option<GenerationResult>,
}

impl Segment {
    /// Create a text segment.
    pub fn text(
        order: usize,
        speaker: impl Into<String>,
        text: impl Into<String>,
        voice: Option<String>,
    ) -> Self {
        Self::new(
            order,
            SegmentKind::Text {
                speaker: speaker.into(),
                text: text.into(),
                voice,
                settings: GenerationSettings::default(),
            },
        )
    }

    /// Create a sound-effect marker segment.
    pub fn sound_effect(order: usize, name: impl Into<String>) -> Self {
        Self::new(order, SegmentKind::SoundEffect { name: name.into() })
    }

    /// Create a music-cue marker segment.
    pub fn music_cue(order: usize, name: impl Into<String>) -> Self {
        Self::new(order, SegmentKind::MusicCue { name: name.into() })
    }

    fn new(order: usize, kind: SegmentKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            order,
            kind,
            status: SegmentStatus::Pending,
            error: None,
            generation: None,
        }
    }
}

/// Immutable record of one synthesis result.
///
/// Created once when a segment completes; the asset path is the only
/// field written after the synthesis call returns, and only once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Unique generation id (also names the stored asset).
    pub id: String,
    /// Where the rendered audio was saved.
    pub asset_path: PathBuf,
    /// Native sample rate of the rendered audio.
    pub sample_rate: u32,
    /// Rendered duration in ms (sample count / sample rate).
    pub duration_ms: u64,
}

/// Mixing bus a timeline item is summed onto.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Track {
    /// Spoken program material.
    #[default]
    Voice,
    /// Background music bed.
    Music,
    /// Sound effects.
    Effects,
}

/// What a timeline item places: rendered audio or a marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum TimelineSource {
    /// A rendered clip backed by a generation result.
    Clip(GenerationResult),
    /// A marker resolved against mix metadata at mixdown time.
    Marker {
        /// Marker name (effect or cue).
        name: String,
    },
}

/// Placement record: where, how trimmed, and on which bus a piece of
/// audio sits in the final mix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineItem {
    /// The segment this item was produced from.
    pub segment_id: String,
    /// Placement offset from program start, in ms.
    pub start_time_ms: u64,
    /// Samples' worth of ms removed from the clip head before placement.
    pub trim_start_ms: u64,
    /// Samples' worth of ms removed from the clip tail before placement.
    pub trim_end_ms: u64,
    /// Mixing bus.
    pub track: Track,
    /// Gain applied to the clip before summing.
    pub volume: f32,
    /// Clip or marker.
    pub source: TimelineSource,
}

impl TimelineItem {
    /// Placeholder item for a freshly completed text segment.
    ///
    /// `start_time_ms` stays 0 until the timeline builder finalizes all
    /// placements in one batch.
    pub fn placeholder_clip(segment_id: impl Into<String>, generation: GenerationResult) -> Self {
        Self {
            segment_id: segment_id.into(),
            start_time_ms: 0,
            trim_start_ms: 0,
            trim_end_ms: 0,
            track: Track::Voice,
            volume: 1.0,
            source: TimelineSource::Clip(generation),
        }
    }

    /// Placeholder item for a marker segment.
    pub fn marker(segment_id: impl Into<String>, name: impl Into<String>, track: Track) -> Self {
        Self {
            segment_id: segment_id.into(),
            start_time_ms: 0,
            trim_start_ms: 0,
            trim_end_ms: 0,
            track,
            volume: 1.0,
            source: TimelineSource::Marker { name: name.into() },
        }
    }
}

/// One assembly run: the aggregate root owning segments and timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Unique project id.
    pub id: String,
    /// Human-readable title (from script frontmatter).
    pub title: String,
    /// Pipeline lifecycle state.
    pub state: PipelineState,
    /// Cursor into `segments`; monotonically non-decreasing except on
    /// an explicit `resume_from` reset.
    pub current_segment_index: usize,
    /// Segments that reached `Completed`.
    pub completed_count: u32,
    /// Segments that reached `Failed`.
    pub failed_count: u32,
    /// Segments that reached `Skipped`.
    pub skipped_count: u32,
    /// Project-level mix metadata.
    pub mix: MixConfig,
    /// Ordered segments, exclusively owned.
    pub segments: Vec<Segment>,
    /// Placement records, exclusively owned.
    pub timeline: Vec<TimelineItem>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// First `start()` time.
    pub started_at: Option<DateTime<Utc>>,
    /// Completion time.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Project {
    /// Create a project from an ordered segment list.
    ///
    /// # Errors
    ///
    /// Returns [`MixcastError::Validation`] if segment orders are not
    /// contiguous `0..N-1`.
    pub fn new(title: impl Into<String>, mix: MixConfig, segments: Vec<Segment>) -> Result<Self> {
        for (i, segment) in segments.iter().enumerate() {
            if segment.order != i {
                return Err(MixcastError::Validation(format!(
                    "segment order must be contiguous: expected {i}, found {}",
                    segment.order
                )));
            }
        }

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            state: PipelineState::Idle,
            current_segment_index: 0,
            completed_count: 0,
            failed_count: 0,
            skipped_count: 0,
            mix,
            segments,
            timeline: Vec::new(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        })
    }

    /// Total number of segments.
    pub fn total_segments(&self) -> usize {
        self.segments.len()
    }

    /// Whether every segment has reached a terminal status.
    pub fn all_segments_terminal(&self) -> bool {
        self.segments.iter().all(|s| s.status.is_terminal())
    }

    /// Mark still-`Pending` segments with order below `index` as
    /// `Skipped`, incrementing `skipped_count` per segment.
    ///
    /// Idempotent: segments already terminal are left alone, so calling
    /// again with the same index marks nothing.
    pub fn skip_pending_before(&mut self, index: usize) -> u32 {
        let mut marked = 0;
        for segment in self.segments.iter_mut().filter(|s| s.order < index) {
            if segment.status == SegmentStatus::Pending {
                segment.status = SegmentStatus::Skipped;
                marked += 1;
            }
        }
        self.skipped_count += marked;
        marked
    }

    /// Reconcile state after loading from storage.
    ///
    /// A crash can leave at most one segment in `Generating` and the
    /// project itself mid-`Generating`. Both are demoted so the next
    /// `start()` re-drives the in-flight segment instead of wedging.
    pub fn normalize_after_load(&mut self) {
        for segment in &mut self.segments {
            if segment.status == SegmentStatus::Generating {
                segment.status = SegmentStatus::Pending;
            }
        }
        if self.state == PipelineState::Generating {
            self.state = PipelineState::Paused;
        }
    }
}
