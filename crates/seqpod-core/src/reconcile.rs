use std::sync::Arc;

use seqpod_model::{Pod, TASK_API_VERSION, TASK_KIND, TaskProgress};
use tracing::{debug, instrument};

use crate::{BuildError, BuildOutcome, PodBuilder, TaskApi};

/// Entry point called by a control loop for every Task or Pod event.
pub struct Reconciler {
    tasks: Arc<dyn TaskApi>,
    builder: PodBuilder,
}

impl Reconciler {
    pub fn new(tasks: Arc<dyn TaskApi>, builder: PodBuilder) -> Self {
        Self { tasks, builder }
    }

    pub fn builder(&self) -> &PodBuilder {
        &self.builder
    }

    /// Runs one build pass for the task `namespace/name`.
    ///
    /// Returns `Ok(None)` when the task no longer exists; its pod goes away with it through
    /// the owner reference.
    #[instrument(level = "debug", skip(self))]
    pub async fn reconcile(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BuildOutcome>, BuildError> {
        let task = match self.tasks.get_task(namespace, name).await {
            Ok(task) => task,
            Err(e) if e.is_not_found() => {
                debug!("task is gone; nothing to reconcile");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        self.builder.build(&task).await.map(Some)
    }

    /// Progress of the task's pod, `None` if the task or its pod does not exist.
    pub async fn progress(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<TaskProgress>, BuildError> {
        let task = match self.tasks.get_task(namespace, name).await {
            Ok(task) => task,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let Some(uid) = task.uid() else {
            return Ok(None);
        };
        Ok(self
            .builder
            .find_pod(&task, uid)
            .await?
            .map(|pod| TaskProgress::from_pod(&pod)))
    }
}

/// `(namespace, name)` of the task controlling `pod`, used to requeue the task on pod updates.
pub fn task_key_for_pod(pod: &Pod) -> Option<(String, String)> {
    pod.metadata
        .owner_references
        .iter()
        .find(|o| {
            o.controller == Some(true) && o.kind == TASK_KIND && o.api_version == TASK_API_VERSION
        })
        .map(|o| (pod.namespace().to_string(), o.name.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BuilderConfig, MemoryApi};
    use seqpod_image::{ImageCache, ImageResolver, MemoryRegistry, PlatformConfig};
    use seqpod_model::{OwnerReference, PodPhase, Task, TaskStep};

    fn reconciler(api: &MemoryApi) -> Reconciler {
        let registry = MemoryRegistry::new().with_image(
            "alpine:3.12",
            PlatformConfig::new("linux", "amd64", &["/bin/sh"], &["-c", "true"]),
        );
        let resolver = Arc::new(ImageResolver::new(Arc::new(registry), ImageCache::default()));
        let builder = PodBuilder::new(
            Arc::new(api.clone()),
            resolver,
            Arc::new(BuilderConfig::default()),
        );
        Reconciler::new(Arc::new(api.clone()), builder)
    }

    #[tokio::test]
    async fn missing_task_is_not_an_error() {
        let api = MemoryApi::new();
        assert_eq!(reconciler(&api).reconcile("ci", "ghost").await.unwrap(), None);
    }

    #[tokio::test]
    async fn reconcile_creates_then_reports_progress() {
        let api = MemoryApi::new();
        let task = api.put_task(
            Task::new("ci", "demo", "uid-7").with_step(TaskStep::image("s1", "alpine:3.12")),
        );
        let r = reconciler(&api);

        assert_eq!(r.progress("ci", "demo").await.unwrap(), None);
        let outcome = r.reconcile("ci", "demo").await.unwrap().unwrap();
        let BuildOutcome::Created(pod) = outcome else {
            panic!("expected creation, got {outcome:?}");
        };
        assert!(pod.metadata.is_owned_by(task.uid().unwrap()));
        assert_eq!(
            r.progress("ci", "demo").await.unwrap(),
            Some(TaskProgress::Pending)
        );

        api.set_phase("ci", pod.name(), PodPhase::Running).unwrap();
        r.reconcile("ci", "demo").await.unwrap();
        assert_eq!(
            r.progress("ci", "demo").await.unwrap(),
            Some(TaskProgress::Running { step: 1, total: 1 })
        );
    }

    #[test]
    fn pod_events_map_to_owning_task() {
        let task = Task::new("ci", "demo", "uid-1");
        let mut pod = Pod::default();
        pod.metadata.namespace = "ci".into();
        assert_eq!(task_key_for_pod(&pod), None);

        pod.metadata.owner_references.push(OwnerReference {
            api_version: "apps/v1".into(),
            kind: "ReplicaSet".into(),
            name: "rs".into(),
            uid: "x".into(),
            controller: Some(true),
            block_owner_deletion: None,
        });
        assert_eq!(task_key_for_pod(&pod), None);

        pod.metadata.owner_references.push(task.owner_reference().unwrap());
        assert_eq!(
            task_key_for_pod(&pod),
            Some(("ci".to_string(), "demo".to_string()))
        );
    }
}
