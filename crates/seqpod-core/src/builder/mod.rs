mod pod;
pub use pod::{managed_selector, pod_labels};

use std::{collections::HashSet, sync::Arc};

use seqpod_image::ImageResolver;
use seqpod_model::{Pod, PodPhase, StepPointer, Task};
use tracing::{debug, info, instrument, warn};

use crate::{
    BuildError, BuilderConfig, PodApi, ProgressError, StepCompiler, compiler::default_step_name,
    forward,
};

/// Result of one [`PodBuilder::build`] pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// No pod existed; this one was submitted.
    Created(Pod),
    /// The step pointer of `pod` was moved to `pointer`.
    Progressed { pod: String, pointer: StepPointer },
    /// The pod exists and nothing had to change.
    Unchanged { pod: String },
}

/// Creates the single execution pod of a task and drives its step pointer.
pub struct PodBuilder {
    api: Arc<dyn PodApi>,
    compiler: StepCompiler,
    config: Arc<BuilderConfig>,
}

impl PodBuilder {
    pub fn new(api: Arc<dyn PodApi>, resolver: Arc<ImageResolver>, config: Arc<BuilderConfig>) -> Self {
        Self {
            api,
            compiler: StepCompiler::new(resolver, config.clone()),
            config,
        }
    }

    /// One reconcile pass for `task`.
    ///
    /// Without a pod, the task is validated, every step is compiled and the pod is created
    /// with the pointer at `0`; any error aborts before anything is submitted. With a running
    /// pod, a `0` pointer is kicked off to `1`, otherwise the pointer is forwarded by at most
    /// one step. An existing pod is driven from its own containers, so later edits to the
    /// task's steps do not affect it.
    #[instrument(level = "debug", skip(self, task), fields(namespace = %task.namespace(), task = %task.name()))]
    pub async fn build(&self, task: &Task) -> Result<BuildOutcome, BuildError> {
        let uid = owner_uid(task)?;

        if let Some(existing) = self.find_pod(task, uid).await? {
            if existing.phase() != PodPhase::Running {
                debug!(pod = %existing.name(), phase = ?existing.phase(), "pod not running; nothing to do");
                return Ok(BuildOutcome::Unchanged {
                    pod: existing.name().to_string(),
                });
            }
            return self.advance(existing).await;
        }

        let pod = self.assemble(task).await?;
        let created = self.api.create_pod(pod).await?;
        info!(
            target: "seqpod.core.build",
            pod = %created.name(),
            steps = created.step_count(),
            "task pod created"
        );
        Ok(BuildOutcome::Created(created))
    }

    /// Compiles every step of `task` and assembles its pod without submitting it.
    pub async fn assemble(&self, task: &Task) -> Result<Pod, BuildError> {
        validate_steps(task)?;
        let owner = task
            .owner_reference()
            .ok_or_else(|| BuildError::MissingUid(task.name().to_string()))?;

        let mut containers = Vec::with_capacity(task.spec.steps.len());
        for (index, step) in task.spec.steps.iter().enumerate() {
            containers.push(self.compiler.compile(index, step).await?);
        }
        Ok(pod::task_pod(&self.config, task, owner, containers))
    }

    /// The pod owned by `task`, found among the managed pods of its namespace.
    pub async fn find_pod(&self, task: &Task, uid: &str) -> Result<Option<Pod>, BuildError> {
        let pods = self
            .api
            .list_pods(task.namespace(), &managed_selector())
            .await?;
        Ok(pods.into_iter().find(|p| p.metadata.is_owned_by(uid)))
    }

    /// Moves the pointer of a running pod by one transition.
    ///
    /// The write is checked against the pod's version; on conflict the pod is re-read and the
    /// transition recomputed from the fresh copy.
    async fn advance(&self, mut pod: Pod) -> Result<BuildOutcome, BuildError> {
        let attempts = self.config.conflict_retries.max(1);
        for attempt in 1..=attempts {
            let Some(next) = next_pointer(&pod)? else {
                return Ok(BuildOutcome::Unchanged {
                    pod: pod.name().to_string(),
                });
            };

            let previous = pod.step_pointer().unwrap_or_default();
            let mut updated = pod.clone();
            updated.set_step_pointer(next);
            match self.api.update_pod(updated).await {
                Ok(stored) => {
                    log_transition(&stored, previous, next);
                    return Ok(BuildOutcome::Progressed {
                        pod: stored.name().to_string(),
                        pointer: next,
                    });
                }
                Err(e) if e.is_conflict() => {
                    debug!(pod = %pod.name(), attempt, "pointer update conflicted; re-reading pod");
                    let (namespace, name) = (pod.namespace().to_string(), pod.name().to_string());
                    pod = self.api.get_pod(&namespace, &name).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(pod = %pod.name(), attempts, "giving up on pointer update");
        Err(BuildError::RetriesExhausted {
            pod: pod.name().to_string(),
            attempts,
        })
    }
}

/// Kickoff for a pending pointer, [`forward`] otherwise. Non-running pods are left alone.
fn next_pointer(pod: &Pod) -> Result<Option<StepPointer>, ProgressError> {
    if pod.phase() != PodPhase::Running {
        return Ok(None);
    }
    match pod.step_pointer() {
        Ok(StepPointer::Pending) => Ok(Some(StepPointer::Released(1))),
        _ => forward(pod),
    }
}

fn log_transition(pod: &Pod, from: StepPointer, to: StepPointer) {
    match to {
        StepPointer::Aborted => warn!(
            target: "seqpod.core.build",
            pod = %pod.name(),
            failed_step = from.value(),
            "step failed; task halted"
        ),
        StepPointer::Released(1) if from == StepPointer::Pending => info!(
            target: "seqpod.core.build",
            pod = %pod.name(),
            "task kicked off"
        ),
        _ => info!(
            target: "seqpod.core.build",
            pod = %pod.name(),
            from = from.value(),
            to = to.value(),
            "step pointer advanced"
        ),
    }
}

fn owner_uid(task: &Task) -> Result<&str, BuildError> {
    task.uid()
        .filter(|u| !u.is_empty())
        .ok_or_else(|| BuildError::MissingUid(task.name().to_string()))
}

/// Checks the steps of a task that is about to get its pod.
///
/// Step names end up as container names and as script file names, so each must be a
/// DNS-1123 label.
fn validate_steps(task: &Task) -> Result<(), BuildError> {
    owner_uid(task)?;
    if task.spec.steps.is_empty() {
        return Err(BuildError::NoSteps(task.name().to_string()));
    }

    let mut seen = HashSet::new();
    for (index, step) in task.spec.steps.iter().enumerate() {
        let name = match step.container.name.as_str() {
            "" => default_step_name(index),
            name => name.to_string(),
        };
        if !is_dns_label(&name) {
            return Err(BuildError::InvalidStepName {
                task: task.name().to_string(),
                step: name,
            });
        }
        if !seen.insert(name.clone()) {
            return Err(BuildError::DuplicateStep {
                task: task.name().to_string(),
                step: name,
            });
        }
    }
    Ok(())
}

/// Lowercase alphanumerics and `-`, alphanumeric at both ends, at most 63 bytes.
fn is_dns_label(name: &str) -> bool {
    let bytes = name.as_bytes();
    let edge_ok = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    !bytes.is_empty()
        && bytes.len() <= 63
        && bytes.first().is_some_and(edge_ok)
        && bytes.last().is_some_and(edge_ok)
        && bytes.iter().all(|b| edge_ok(b) || *b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        MemoryApi,
        config::{VOLUME_HELPER, VOLUME_PODINFO, VOLUME_SCRIPTS},
    };
    use seqpod_image::{ImageCache, MemoryRegistry, PlatformConfig};
    use seqpod_model::{
        ANNOTATION_STEP_POINTER, ContainerStatus, LABEL_TASK_NAME, RestartPolicy, TaskStep,
        VolumeSource,
    };

    struct Fixture {
        api: MemoryApi,
        builder: PodBuilder,
        registry: Arc<MemoryRegistry>,
    }

    fn fixture() -> Fixture {
        let api = MemoryApi::new();
        let registry = Arc::new(MemoryRegistry::new().with_image(
            "alpine:3.12",
            PlatformConfig::new("linux", "amd64", &["/bin/sh"], &["-c", "true"]),
        ));
        let resolver = Arc::new(ImageResolver::new(registry.clone(), ImageCache::default()));
        let builder = PodBuilder::new(
            Arc::new(api.clone()),
            resolver,
            Arc::new(BuilderConfig::default()),
        );
        Fixture {
            api,
            builder,
            registry,
        }
    }

    fn task(steps: usize) -> Task {
        (1..=steps).fold(Task::new("ci", "demo", "uid-1"), |t, i| {
            t.with_step(TaskStep::image(format!("s{i}"), "alpine:3.12"))
        })
    }

    async fn created(f: &Fixture, task: &Task) -> Pod {
        match f.builder.build(task).await.unwrap() {
            BuildOutcome::Created(pod) => pod,
            other => panic!("expected a new pod, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn creates_one_pod_with_full_layout() {
        let f = fixture();
        let pod = created(&f, &task(3)).await;

        assert!(pod.name().starts_with("task-pod-demo-"));
        assert_eq!(pod.namespace(), "ci");
        assert_eq!(pod.metadata.annotation(ANNOTATION_STEP_POINTER), Some("0"));
        assert_eq!(pod.metadata.labels.get(LABEL_TASK_NAME).map(String::as_str), Some("demo"));
        assert_eq!(pod.spec.restart_policy, Some(RestartPolicy::Never));
        assert!(pod.metadata.is_owned_by("uid-1"));
        assert_eq!(pod.metadata.owner_references[0].controller, Some(true));

        let names: Vec<_> = pod.spec.containers.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["s1", "s2", "s3"]);

        let init = &pod.spec.init_containers[0];
        assert_eq!(init.command, vec!["cp", "/app/entrypoint", "/entrypoint/bin"]);

        let volumes: Vec<_> = pod.spec.volumes.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(volumes, vec![VOLUME_HELPER, VOLUME_SCRIPTS, VOLUME_PODINFO]);
        match &pod.spec.volumes[2].source {
            VolumeSource::DownwardApi(src) => {
                assert_eq!(src.items[0].path, "order");
                assert_eq!(
                    src.items[0].field_ref.field_path,
                    "metadata.annotations['seqpod.io/step-pointer']"
                );
            }
            other => panic!("unexpected podinfo source {other:?}"),
        }
    }

    #[tokio::test]
    async fn existing_pod_is_never_recreated() {
        let f = fixture();
        let t = task(2);
        let pod = created(&f, &t).await;

        // pending phase: nothing to do
        let outcome = f.builder.build(&t).await.unwrap();
        assert_eq!(outcome, BuildOutcome::Unchanged { pod: pod.name().to_string() });
        assert_eq!(f.api.pods("ci").len(), 1);
        // image was resolved once for both steps and never again
        assert_eq!(f.registry.manifest_requests(), 1);
    }

    #[tokio::test]
    async fn kickoff_then_forward() {
        let f = fixture();
        let t = task(2);
        let pod = created(&f, &t).await;
        f.api.set_phase("ci", pod.name(), PodPhase::Running).unwrap();

        let outcome = f.builder.build(&t).await.unwrap();
        assert_eq!(
            outcome,
            BuildOutcome::Progressed { pod: pod.name().to_string(), pointer: StepPointer::Released(1) }
        );

        // step 1 still running: no change
        f.api
            .set_container_status("ci", pod.name(), ContainerStatus::running("s1"))
            .unwrap();
        assert!(matches!(f.builder.build(&t).await.unwrap(), BuildOutcome::Unchanged { .. }));

        f.api
            .set_container_status("ci", pod.name(), ContainerStatus::terminated("s1", 0))
            .unwrap();
        assert!(matches!(
            f.builder.build(&t).await.unwrap(),
            BuildOutcome::Progressed { pointer: StepPointer::Released(2), .. }
        ));
    }

    #[tokio::test]
    async fn compile_failure_creates_nothing() {
        let f = fixture();
        let t = task(1).with_step(TaskStep::image("missing", "ghcr.io/nobody/none:1"));
        let err = f.builder.build(&t).await.unwrap_err();
        assert!(matches!(err, BuildError::Compile(_)));
        assert!(f.api.pods("ci").is_empty());
    }

    #[tokio::test]
    async fn rejects_unbuildable_tasks() {
        let f = fixture();
        assert!(matches!(
            f.builder.build(&task(0)).await.unwrap_err(),
            BuildError::NoSteps(_)
        ));

        let mut no_uid = task(1);
        no_uid.metadata.uid = None;
        assert!(matches!(
            f.builder.build(&no_uid).await.unwrap_err(),
            BuildError::MissingUid(_)
        ));

        let dup = task(1).with_step(TaskStep::image("s1", "alpine:3.12"));
        assert!(matches!(
            f.builder.build(&dup).await.unwrap_err(),
            BuildError::DuplicateStep { .. }
        ));
    }

    #[tokio::test]
    async fn step_names_must_be_dns_labels() {
        let f = fixture();
        for bad in [
            "x\"; touch /tmp/owned; \"",
            "../../entrypoint/bin/entrypoint",
            "Build",
            "-lead",
            "trail-",
            "a.b",
        ] {
            let t = task(1).with_step(TaskStep::script(bad, "alpine:3.12", "true"));
            let err = f.builder.build(&t).await.unwrap_err();
            assert!(
                matches!(&err, BuildError::InvalidStepName { step, .. } if step == bad),
                "{bad:?} -> {err:?}"
            );
        }
        assert!(f.api.pods("ci").is_empty());

        let long = "a".repeat(64);
        assert!(!is_dns_label(&long));
        assert!(is_dns_label(&long[..63]));
        assert!(is_dns_label("step-12"));
    }

    #[tokio::test]
    async fn edited_task_does_not_stall_running_pod() {
        let f = fixture();
        let t = task(2);
        let pod = created(&f, &t).await;
        f.api.set_phase("ci", pod.name(), PodPhase::Running).unwrap();
        f.builder.build(&t).await.unwrap();
        f.api
            .set_container_status("ci", pod.name(), ContainerStatus::terminated("s1", 0))
            .unwrap();

        // steps edited after creation: duplicate name, then none at all
        let dup = t.clone().with_step(TaskStep::image("s1", "alpine:3.12"));
        assert!(matches!(
            f.builder.build(&dup).await.unwrap(),
            BuildOutcome::Progressed { pointer: StepPointer::Released(2), .. }
        ));

        let mut emptied = t.clone();
        emptied.spec.steps.clear();
        f.api
            .set_container_status("ci", pod.name(), ContainerStatus::terminated("s2", 0))
            .unwrap();
        assert!(matches!(
            f.builder.build(&emptied).await.unwrap(),
            BuildOutcome::Unchanged { .. }
        ));
        assert_eq!(
            f.api.get_pod("ci", pod.name()).await.unwrap().step_pointer().unwrap(),
            StepPointer::Released(2)
        );
        assert_eq!(f.api.pods("ci").len(), 1);
    }

    #[tokio::test]
    async fn conflicting_update_is_retried_from_fresh_state() {
        let f = fixture();
        let t = task(2);
        let pod = created(&f, &t).await;
        f.api.set_phase("ci", pod.name(), PodPhase::Running).unwrap();

        f.api.inject_conflicts(2);
        let outcome = f.builder.build(&t).await.unwrap();
        assert!(matches!(outcome, BuildOutcome::Progressed { pointer: StepPointer::Released(1), .. }));
        let stored = f.api.get_pod("ci", pod.name()).await.unwrap();
        assert_eq!(stored.step_pointer().unwrap(), StepPointer::Released(1));
    }

    #[tokio::test]
    async fn persistent_conflicts_give_up() {
        let f = fixture();
        let t = task(1);
        let pod = created(&f, &t).await;
        f.api.set_phase("ci", pod.name(), PodPhase::Running).unwrap();

        f.api.inject_conflicts(100);
        let err = f.builder.build(&t).await.unwrap_err();
        assert!(matches!(err, BuildError::RetriesExhausted { attempts: 5, .. }));
    }

    #[tokio::test]
    async fn pods_of_other_tasks_are_ignored() {
        let f = fixture();
        let first = task(1);
        created(&f, &first).await;

        let mut second = task(1);
        second.metadata.uid = Some("uid-2".into());
        created(&f, &second).await;
        assert_eq!(f.api.pods("ci").len(), 2);
    }
}
