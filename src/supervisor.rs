//! Supervision of active generation runs.
//!
//! An explicit keyed table of per-project task handles with join and
//! pause operations, instead of an ambient global registry. At most
//! one run per project id is live at any time; a second spawn is
//! rejected, never a concurrent duplicate.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{MixcastError, Result};
use crate::orchestrator::{Orchestrator, RunOutcome};

struct RunHandle {
    pause: CancellationToken,
    join: JoinHandle<Result<RunOutcome>>,
}

/// Owns the table of active per-project generation runs.
#[derive(Clone)]
pub struct RunSupervisor {
    orchestrator: Orchestrator,
    runs: Arc<Mutex<HashMap<String, RunHandle>>>,
}

impl RunSupervisor {
    /// Create a supervisor driving runs through `orchestrator`.
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator,
            runs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Spawn a generation run for a project.
    ///
    /// # Errors
    ///
    /// Returns [`MixcastError::Pipeline`] if the project already has a
    /// run in the table (active or finished-but-unjoined).
    pub async fn spawn(&self, project_id: &str) -> Result<()> {
        self.spawn_inner(project_id, None).await
    }

    /// Spawn a run that first skips to `segment_index` (resume-from).
    ///
    /// # Errors
    ///
    /// As [`Self::spawn`].
    pub async fn spawn_resume(&self, project_id: &str, segment_index: usize) -> Result<()> {
        self.spawn_inner(project_id, Some(segment_index)).await
    }

    async fn spawn_inner(&self, project_id: &str, resume_index: Option<usize>) -> Result<()> {
        let mut runs = self.runs.lock().await;
        if runs.contains_key(project_id) {
            return Err(MixcastError::Pipeline(format!(
                "project {project_id} already has a run (join it first)"
            )));
        }

        let pause = CancellationToken::new();
        let task_token = pause.clone();
        let orchestrator = self.orchestrator.clone();
        let id = project_id.to_owned();

        let join = tokio::spawn(async move {
            match resume_index {
                Some(index) => orchestrator.resume_from(&id, index, &task_token).await,
                None => orchestrator.start(&id, &task_token).await,
            }
        });

        runs.insert(project_id.to_owned(), RunHandle { pause, join });
        info!("spawned run for project {project_id}");
        Ok(())
    }

    /// Await a run's outcome and remove it from the table.
    ///
    /// # Errors
    ///
    /// Returns [`MixcastError::Pipeline`] if no run exists for the
    /// project or the run task panicked; otherwise propagates the
    /// run's own result.
    pub async fn join(&self, project_id: &str) -> Result<RunOutcome> {
        let handle = {
            let mut runs = self.runs.lock().await;
            runs.remove(project_id).ok_or_else(|| {
                MixcastError::Pipeline(format!("no run for project {project_id}"))
            })?
        };

        handle
            .join
            .await
            .map_err(|e| MixcastError::Pipeline(format!("run task failed: {e}")))?
    }

    /// Request a cooperative pause (honored between segments).
    ///
    /// The run stays in the table until joined; joining returns
    /// [`RunOutcome::Paused`] once the loop observes the request.
    ///
    /// # Errors
    ///
    /// Returns [`MixcastError::Pipeline`] if no run exists.
    pub async fn pause(&self, project_id: &str) -> Result<()> {
        let runs = self.runs.lock().await;
        let handle = runs.get(project_id).ok_or_else(|| {
            MixcastError::Pipeline(format!("no run for project {project_id}"))
        })?;
        handle.pause.cancel();
        info!("pause requested for project {project_id}");
        Ok(())
    }

    /// Whether the project has a run still executing.
    pub async fn is_running(&self, project_id: &str) -> bool {
        let runs = self.runs.lock().await;
        runs.get(project_id)
            .map(|h| !h.join.is_finished())
            .unwrap_or(false)
    }
}
