//! Generation orchestrator: the resumable per-segment synthesis loop.
//!
//! Drives segments strictly in order, persisting the whole project
//! aggregate after every state transition so a crash never loses more
//! than the in-flight segment. One logical worker per project; the
//! synthesis model is a shared stateful resource, so calls are awaited
//! sequentially and a variant switch is a blocking reload.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::assets::AssetLibrary;
use crate::error::{MixcastError, Result};
use crate::mixdown::Mixer;
use crate::progress::{ProgressHub, ProgressUpdate};
use crate::project::{
    GenerationResult, PipelineState, Project, SegmentKind, SegmentStatus, TimelineItem, Track,
};
use crate::store::ProjectStore;
use crate::synth::{SynthesisClient, SynthesisRequest};
use crate::timeline;

/// How a `start()` invocation ended, short of an error.
#[derive(Debug)]
pub enum RunOutcome {
    /// Every segment is terminal and mixdown produced the encoded program.
    Completed(Vec<u8>),
    /// The run was cooperatively paused between segments.
    Paused,
}

/// Drives generation, timeline finalization, and mixdown for projects.
///
/// Cheaply cloneable; clones share the store, synthesis client, asset
/// library, and progress hub.
#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<dyn ProjectStore>,
    synth: Arc<dyn SynthesisClient>,
    assets: AssetLibrary,
    progress: ProgressHub,
}

impl Orchestrator {
    /// Create an orchestrator over the given collaborators.
    pub fn new(
        store: Arc<dyn ProjectStore>,
        synth: Arc<dyn SynthesisClient>,
        assets: AssetLibrary,
        progress: ProgressHub,
    ) -> Self {
        Self {
            store,
            synth,
            assets,
            progress,
        }
    }

    /// The progress hub updates are published to.
    pub fn progress(&self) -> &ProgressHub {
        &self.progress
    }

    /// Reconcile a project after a process restart.
    ///
    /// A crash leaves at most one segment in `Generating`; it is
    /// demoted to `Pending` (and the project to `Paused`) so the next
    /// `start()` re-drives it. Call once per project before resuming
    /// after a restart.
    ///
    /// # Errors
    ///
    /// Returns an error if the project cannot be loaded or committed.
    pub async fn recover(&self, project_id: &str) -> Result<()> {
        let mut project = self.store.load(project_id).await?;
        project.normalize_after_load();
        self.commit(&project).await?;
        Ok(())
    }

    /// Start or resume generation for a project.
    ///
    /// Iterates segments from the current cursor, synthesizing text
    /// segments and trivially completing markers. After all segments
    /// are terminal, finalizes the timeline and runs mixdown; the
    /// encoded program is returned to the caller.
    ///
    /// `pause` is checked between segments only — it cannot interrupt
    /// an in-flight synthesis call.
    ///
    /// # Errors
    ///
    /// - [`MixcastError::Pipeline`] if the project is already generating.
    /// - [`MixcastError::Validation`] if a processable text segment has
    ///   no voice reference (checked before any synthesis).
    /// - [`MixcastError::Synthesis`] when a segment fails; the project
    ///   is left in `PausedError` and later segments are not attempted.
    /// - [`MixcastError::Persistence`] if a commit fails; the in-flight
    ///   transition is aborted.
    pub async fn start(&self, project_id: &str, pause: &CancellationToken) -> Result<RunOutcome> {
        let mut project = self.store.load(project_id).await?;

        if !project.state.can_start() {
            return Err(MixcastError::Pipeline(format!(
                "project {project_id} is already generating"
            )));
        }

        validate_voices(&project)?;

        project.state = PipelineState::Generating;
        if project.started_at.is_none() {
            project.started_at = Some(chrono::Utc::now());
        }
        self.commit(&project).await?;
        self.emit_progress(&project).await;
        info!("project {project_id}: generation started");

        while project.current_segment_index < project.segments.len() {
            if pause.is_cancelled() {
                project.state = PipelineState::Paused;
                self.commit(&project).await?;
                self.emit_progress(&project).await;
                info!("project {project_id}: paused between segments");
                return Ok(RunOutcome::Paused);
            }

            let index = project.current_segment_index;
            if project.segments[index].status == SegmentStatus::Completed {
                project.current_segment_index = index + 1;
                self.commit(&project).await?;
                continue;
            }

            self.process_segment(&mut project, index).await?;
        }

        let artifact = self.finish(&mut project).await?;
        Ok(RunOutcome::Completed(artifact))
    }

    /// Resume generation from a specific segment index.
    ///
    /// Marks still-`Pending` segments before `index` as `Skipped`,
    /// resets the cursor, and re-enters [`Self::start`]. Idempotent:
    /// called again with the same index after completion it marks
    /// nothing and re-runs only timeline + mixdown.
    ///
    /// # Errors
    ///
    /// As [`Self::start`].
    pub async fn resume_from(
        &self,
        project_id: &str,
        index: usize,
        pause: &CancellationToken,
    ) -> Result<RunOutcome> {
        let mut project = self.store.load(project_id).await?;

        if !project.state.can_start() {
            return Err(MixcastError::Pipeline(format!(
                "project {project_id} is already generating"
            )));
        }

        let marked = project.skip_pending_before(index);
        project.current_segment_index = index;
        self.commit(&project).await?;
        info!("project {project_id}: resuming from segment {index} ({marked} skipped)");

        self.start(project_id, pause).await
    }

    /// Process one non-completed segment at `index`.
    async fn process_segment(&self, project: &mut Project, index: usize) -> Result<()> {
        match project.segments[index].kind.clone() {
            SegmentKind::SoundEffect { name } => {
                self.complete_marker(project, index, name, Track::Effects)
                    .await
            }
            SegmentKind::MusicCue { name } => {
                self.complete_marker(project, index, name, Track::Music).await
            }
            SegmentKind::Text {
                speaker,
                text,
                voice,
                settings,
            } => {
                let voice = voice.ok_or_else(|| {
                    MixcastError::Validation(format!("speaker '{speaker}' has no voice reference"))
                })?;

                // Re-driving a previously failed segment withdraws its
                // failure from the counters.
                if project.segments[index].status == SegmentStatus::Failed {
                    project.failed_count = project.failed_count.saturating_sub(1);
                }
                project.segments[index].status = SegmentStatus::Generating;
                project.segments[index].error = None;
                self.commit(project).await?;
                self.emit_progress(project).await;

                let request = SynthesisRequest {
                    text,
                    voice,
                    language: settings.language.clone(),
                    seed: settings.seed,
                    style: settings.style.clone(),
                };

                match self.render_text(&settings.model_variant, request).await {
                    Ok(generation) => {
                        let segment_id = project.segments[index].id.clone();
                        project.timeline.push(TimelineItem::placeholder_clip(
                            segment_id,
                            generation.clone(),
                        ));
                        project.segments[index].generation = Some(generation);
                        project.segments[index].status = SegmentStatus::Completed;
                        project.completed_count += 1;
                        project.current_segment_index = index + 1;
                        self.commit(project).await?;
                        self.emit_progress(project).await;
                        Ok(())
                    }
                    Err(e) => {
                        error!("project {}: segment {index} failed: {e}", project.id);
                        project.segments[index].status = SegmentStatus::Failed;
                        project.segments[index].error = Some(e.to_string());
                        project.failed_count += 1;
                        project.state = PipelineState::PausedError;
                        self.commit(project).await?;
                        self.emit_progress(project).await;
                        Err(MixcastError::Synthesis(format!("segment {index}: {e}")))
                    }
                }
            }
        }
    }

    /// Trivially complete a marker segment and create its timeline item.
    async fn complete_marker(
        &self,
        project: &mut Project,
        index: usize,
        name: String,
        track: Track,
    ) -> Result<()> {
        let segment_id = project.segments[index].id.clone();
        project
            .timeline
            .push(TimelineItem::marker(segment_id, name, track));
        project.segments[index].status = SegmentStatus::Completed;
        project.completed_count += 1;
        project.current_segment_index = index + 1;
        self.commit(project).await?;
        self.emit_progress(project).await;
        Ok(())
    }

    /// Synthesize one text segment and persist its rendered clip.
    ///
    /// Reloads the model first when the segment's variant differs from
    /// the loaded one — a blocking operation that serializes throughput.
    async fn render_text(
        &self,
        model_variant: &str,
        request: SynthesisRequest,
    ) -> Result<GenerationResult> {
        if self.synth.loaded_variant().await.as_deref() != Some(model_variant) {
            info!("switching synthesis model to variant {model_variant}");
            self.synth.load_variant(model_variant).await?;
        }

        let speech = self.synth.synthesize(request).await?;
        if speech.samples.is_empty() {
            return Err(MixcastError::Synthesis(
                "synthesis returned empty audio".into(),
            ));
        }

        let generation_id = uuid::Uuid::new_v4().to_string();
        let duration_ms = speech.duration_ms();
        let asset_path =
            self.assets
                .save_clip(&generation_id, &speech.samples, speech.sample_rate)?;

        Ok(GenerationResult {
            id: generation_id,
            asset_path,
            sample_rate: speech.sample_rate,
            duration_ms,
        })
    }

    /// Finalize the timeline and run mixdown once all segments are terminal.
    async fn finish(&self, project: &mut Project) -> Result<Vec<u8>> {
        debug_assert!(project.all_segments_terminal());

        let placements = timeline::speech_start_times(&project.segments);
        timeline::apply_placements(&mut project.timeline, &placements);
        self.commit(project).await?;
        info!(
            "project {}: timeline finalized ({} placements)",
            project.id,
            placements.len()
        );

        let mixer = Mixer::new(project.mix.target_sample_rate);
        let mixed = tokio::task::block_in_place(|| mixer.mix(&project.timeline, &project.mix));

        match mixed {
            Ok(artifact) => {
                project.state = PipelineState::Completed;
                project.completed_at = Some(chrono::Utc::now());
                self.commit(project).await?;
                self.emit_progress(project).await;
                info!(
                    "project {}: completed ({} bytes encoded)",
                    project.id,
                    artifact.len()
                );
                Ok(artifact)
            }
            Err(e) => {
                error!("project {}: mixdown failed: {e}", project.id);
                project.state = PipelineState::Error;
                self.commit(project).await?;
                self.emit_progress(project).await;
                Err(e)
            }
        }
    }

    async fn commit(&self, project: &Project) -> Result<()> {
        self.store.commit(project).await
    }

    async fn emit_progress(&self, project: &Project) {
        let total = project.total_segments();
        let position = (project.current_segment_index + 1).min(total.max(1));
        self.progress
            .publish(ProgressUpdate {
                project_id: project.id.clone(),
                current_count: project.completed_count,
                total_count: total as u32,
                label: format!("Segment {position}/{total}"),
                pipeline_state: project.state,
            })
            .await;
    }
}

/// Reject unmapped voice references before any synthesis begins.
fn validate_voices(project: &Project) -> Result<()> {
    for segment in &project.segments {
        if segment.status.is_terminal() && segment.status != SegmentStatus::Failed {
            continue;
        }
        if let SegmentKind::Text { speaker, voice, .. } = &segment.kind {
            match voice {
                Some(v) if !v.is_empty() => {}
                _ => {
                    warn!(
                        "project {}: speaker '{speaker}' has no voice mapping",
                        project.id
                    );
                    return Err(MixcastError::Validation(format!(
                        "speaker '{speaker}' (segment {}) has no voice reference",
                        segment.order
                    )));
                }
            }
        }
    }
    Ok(())
}
