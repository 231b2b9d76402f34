//! Project persistence trait and in-memory implementation.
//!
//! The orchestrator commits the full [`Project`] aggregate through
//! [`ProjectStore`] after every state transition — write-through, one
//! commit per segment, never batched. The relational backend lives
//! behind this trait as an external collaborator;
//! [`MemoryProjectStore`] ships for tests and ephemeral usage.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{MixcastError, Result};
use crate::project::Project;

/// Async project storage backend.
///
/// A `commit` must persist the aggregate atomically: either the whole
/// transition lands or none of it does, so a crash never leaves a
/// half-written project.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Persist a newly created project.
    async fn create(&self, project: &Project) -> Result<()>;

    /// Load a project aggregate by id.
    async fn load(&self, id: &str) -> Result<Project>;

    /// Commit the current state of a project aggregate.
    async fn commit(&self, project: &Project) -> Result<()>;

    /// Delete a project and everything it owns.
    ///
    /// Returns `Ok(())` even if the project did not exist.
    async fn delete(&self, id: &str) -> Result<()>;
}

/// In-memory project store for testing and ephemeral usage.
///
/// Thread-safe and cheaply cloneable; contents are lost on drop.
#[derive(Debug, Clone, Default)]
pub struct MemoryProjectStore {
    projects: Arc<RwLock<HashMap<String, Project>>>,
}

impl MemoryProjectStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProjectStore for MemoryProjectStore {
    async fn create(&self, project: &Project) -> Result<()> {
        let mut projects = self.projects.write().await;
        if projects.contains_key(&project.id) {
            return Err(MixcastError::Persistence(format!(
                "project already exists: {}",
                project.id
            )));
        }
        projects.insert(project.id.clone(), project.clone());
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Project> {
        let projects = self.projects.read().await;
        projects
            .get(id)
            .cloned()
            .ok_or_else(|| MixcastError::Persistence(format!("project not found: {id}")))
    }

    async fn commit(&self, project: &Project) -> Result<()> {
        let mut projects = self.projects.write().await;
        projects.insert(project.id.clone(), project.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut projects = self.projects.write().await;
        projects.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MixConfig;
    use crate::project::{PipelineState, Segment};

    fn sample_project() -> Project {
        let segments = vec![Segment::text(0, "host", "Hello.", Some("voice_a".into()))];
        match Project::new("Test", MixConfig::default(), segments) {
            Ok(p) => p,
            Err(e) => panic!("project build failed: {e}"),
        }
    }

    #[tokio::test]
    async fn create_and_load_round_trip() {
        let store = MemoryProjectStore::new();
        let project = sample_project();
        assert!(store.create(&project).await.is_ok());

        let loaded = store.load(&project.id).await;
        let loaded = match loaded {
            Ok(p) => p,
            Err(e) => panic!("load failed: {e}"),
        };
        assert_eq!(loaded.id, project.id);
        assert_eq!(loaded.segments.len(), 1);
    }

    #[tokio::test]
    async fn create_rejects_duplicate_id() {
        let store = MemoryProjectStore::new();
        let project = sample_project();
        assert!(store.create(&project).await.is_ok());
        let result = store.create(&project).await;
        assert!(matches!(result, Err(MixcastError::Persistence(_))));
    }

    #[tokio::test]
    async fn load_unknown_id_fails() {
        let store = MemoryProjectStore::new();
        let result = store.load("nope").await;
        assert!(matches!(result, Err(MixcastError::Persistence(_))));
    }

    #[tokio::test]
    async fn commit_overwrites_state() {
        let store = MemoryProjectStore::new();
        let mut project = sample_project();
        assert!(store.create(&project).await.is_ok());

        project.state = PipelineState::Generating;
        project.current_segment_index = 1;
        assert!(store.commit(&project).await.is_ok());

        let loaded = match store.load(&project.id).await {
            Ok(p) => p,
            Err(e) => panic!("load failed: {e}"),
        };
        assert_eq!(loaded.state, PipelineState::Generating);
        assert_eq!(loaded.current_segment_index, 1);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemoryProjectStore::new();
        let project = sample_project();
        assert!(store.create(&project).await.is_ok());
        assert!(store.delete(&project.id).await.is_ok());
        assert!(store.delete(&project.id).await.is_ok());
        assert!(store.load(&project.id).await.is_err());
    }

    #[test]
    fn store_is_object_safe() {
        fn _takes_dyn(_store: &dyn ProjectStore) {}
        fn _takes_arc(_store: Arc<dyn ProjectStore>) {}
    }
}
