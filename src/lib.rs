//! Mixcast: multi-speaker podcast assembly from synthesized segments.
//!
//! The crate drives a resumable generation pipeline and a
//! sample-accurate mixdown:
//! Segments → Synthesis → Timeline → Mixdown → encoded WAV
//!
//! # Architecture
//!
//! - **Orchestrator**: sequential per-segment synthesis with
//!   write-through persistence; a crash never loses more than the
//!   in-flight segment
//! - **Timeline builder**: pure timecode pass over terminal segments
//!   (300 ms inter-segment gap)
//! - **Mixdown engine**: places clips, loops/fades the music bed,
//!   inserts sound effects, peak-normalizes, and encodes mono WAV
//! - **Run supervisor**: keyed table of per-project run handles with
//!   join and cooperative pause
//!
//! The synthesis model and the persistent store are external
//! collaborators behind the [`synth::SynthesisClient`] and
//! [`store::ProjectStore`] traits.

pub mod assets;
pub mod config;
pub mod error;
pub mod mixdown;
pub mod orchestrator;
pub mod progress;
pub mod project;
pub mod store;
pub mod supervisor;
pub mod synth;
pub mod timeline;

pub use assets::AssetLibrary;
pub use config::{GenerationSettings, MixConfig};
pub use error::{MixcastError, Result};
pub use mixdown::Mixer;
pub use orchestrator::{Orchestrator, RunOutcome};
pub use progress::{ProgressHub, ProgressUpdate};
pub use project::{PipelineState, Project, Segment, SegmentStatus};
pub use store::{MemoryProjectStore, ProjectStore};
pub use supervisor::RunSupervisor;
pub use synth::{SynthesisClient, SynthesisRequest, SynthesizedSpeech};
