use std::{
    collections::BTreeMap,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use async_trait::async_trait;
use seqpod_model::{ContainerStatus, Pod, PodPhase, PodStatus, StringMap, Task};
use tracing::trace;
use uuid::Uuid;

use super::{PodApi, TaskApi};
use crate::ApiError;

type Key = (String, String);

/// In-process object store with optimistic concurrency.
///
/// Every write bumps a store-wide version that is stamped into `resourceVersion`; updates
/// carrying an older version are rejected with [`ApiError::Conflict`]. The status helpers
/// play the role of the kubelet so tests can walk a pod through its lifecycle.
#[derive(Clone, Default)]
pub struct MemoryApi {
    inner: Arc<RwLock<MemoryInner>>,
}

#[derive(Default)]
struct MemoryInner {
    tasks: BTreeMap<Key, Task>,
    pods: BTreeMap<Key, Pod>,
    version: u64,
    /// Pending conflicts forced onto the next updates.
    injected_conflicts: u32,
}

impl MemoryInner {
    fn bump(&mut self) -> String {
        self.version += 1;
        self.version.to_string()
    }
}

impl MemoryApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `task`, assigning a uid if it has none. Returns the stored copy.
    pub fn put_task(&self, mut task: Task) -> Task {
        let mut inner = self.write();
        if task.metadata.uid.is_none() {
            task.metadata.uid = Some(Uuid::new_v4().to_string());
        }
        task.metadata.resource_version = Some(inner.bump());
        let key = (task.namespace().to_string(), task.name().to_string());
        inner.tasks.insert(key, task.clone());
        task
    }

    /// Snapshot of all pods in `namespace`, ordered by name.
    pub fn pods(&self, namespace: &str) -> Vec<Pod> {
        self.read()
            .pods
            .values()
            .filter(|p| p.namespace() == namespace)
            .cloned()
            .collect()
    }

    /// Pod owned by the object with `uid`, if any.
    pub fn pod_owned_by(&self, uid: &str) -> Option<Pod> {
        self.read()
            .pods
            .values()
            .find(|p| p.metadata.is_owned_by(uid))
            .cloned()
    }

    pub fn set_phase(&self, namespace: &str, name: &str, phase: PodPhase) -> Result<Pod, ApiError> {
        self.mutate_status(namespace, name, |status| status.phase = phase)
    }

    /// Records `status`, replacing the entry of the same container.
    pub fn set_container_status(
        &self,
        namespace: &str,
        name: &str,
        status: ContainerStatus,
    ) -> Result<Pod, ApiError> {
        self.mutate_status(namespace, name, |pod_status| {
            match pod_status
                .container_statuses
                .iter_mut()
                .find(|s| s.name == status.name)
            {
                Some(existing) => *existing = status,
                None => pod_status.container_statuses.push(status),
            }
        })
    }

    /// Makes the next `count` calls to [`PodApi::update_pod`] fail with a conflict.
    pub fn inject_conflicts(&self, count: u32) {
        self.write().injected_conflicts = count;
    }

    fn mutate_status(
        &self,
        namespace: &str,
        name: &str,
        f: impl FnOnce(&mut PodStatus),
    ) -> Result<Pod, ApiError> {
        let mut inner = self.write();
        let version = inner.bump();
        let pod = inner
            .pods
            .get_mut(&(namespace.to_string(), name.to_string()))
            .ok_or_else(|| not_found("pod", namespace, name))?;
        f(pod.status.get_or_insert_with(PodStatus::default));
        pod.metadata.resource_version = Some(version);
        Ok(pod.clone())
    }

    fn read(&self) -> RwLockReadGuard<'_, MemoryInner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, MemoryInner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn not_found(kind: &'static str, namespace: &str, name: &str) -> ApiError {
    ApiError::NotFound {
        kind,
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

/// Five lowercase alphanumerics, like the platform's generated-name suffix.
fn name_suffix() -> String {
    Uuid::new_v4().simple().to_string()[..5].to_string()
}

#[async_trait]
impl TaskApi for MemoryApi {
    async fn get_task(&self, namespace: &str, name: &str) -> Result<Task, ApiError> {
        self.read()
            .tasks
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| not_found("task", namespace, name))
    }
}

#[async_trait]
impl PodApi for MemoryApi {
    async fn list_pods(&self, namespace: &str, selector: &StringMap) -> Result<Vec<Pod>, ApiError> {
        Ok(self
            .read()
            .pods
            .values()
            .filter(|p| p.namespace() == namespace && p.metadata.matches_labels(selector))
            .cloned()
            .collect())
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod, ApiError> {
        self.read()
            .pods
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| not_found("pod", namespace, name))
    }

    async fn create_pod(&self, mut pod: Pod) -> Result<Pod, ApiError> {
        if pod.metadata.namespace.is_empty() {
            return Err(ApiError::Invalid("pod namespace is required".into()));
        }
        let mut inner = self.write();

        if pod.metadata.name.is_empty() {
            let prefix = pod
                .metadata
                .generate_name
                .clone()
                .ok_or_else(|| ApiError::Invalid("pod needs name or generateName".into()))?;
            pod.metadata.name = loop {
                let candidate = format!("{prefix}{}", name_suffix());
                let key = (pod.metadata.namespace.clone(), candidate.clone());
                if !inner.pods.contains_key(&key) {
                    break candidate;
                }
            };
        }

        let key = (pod.metadata.namespace.clone(), pod.metadata.name.clone());
        if inner.pods.contains_key(&key) {
            return Err(ApiError::Conflict {
                namespace: key.0,
                name: key.1,
            });
        }

        pod.metadata.uid = Some(Uuid::new_v4().to_string());
        pod.metadata.resource_version = Some(inner.bump());
        pod.status = Some(PodStatus::default());
        trace!(namespace = %key.0, name = %key.1, "pod created");
        inner.pods.insert(key, pod.clone());
        Ok(pod)
    }

    async fn update_pod(&self, mut pod: Pod) -> Result<Pod, ApiError> {
        let mut inner = self.write();
        let key = (pod.metadata.namespace.clone(), pod.metadata.name.clone());
        let conflict = || ApiError::Conflict {
            namespace: key.0.clone(),
            name: key.1.clone(),
        };

        if inner.injected_conflicts > 0 {
            inner.injected_conflicts -= 1;
            return Err(conflict());
        }

        let stored = inner
            .pods
            .get(&key)
            .ok_or_else(|| not_found("pod", &key.0, &key.1))?;
        if pod.metadata.resource_version.is_some()
            && pod.metadata.resource_version != stored.metadata.resource_version
        {
            return Err(conflict());
        }

        // status and identity are owned by the store
        pod.status = stored.status.clone();
        pod.metadata.uid = stored.metadata.uid.clone();
        pod.metadata.resource_version = Some(inner.bump());
        inner.pods.insert(key.clone(), pod.clone());
        Ok(pod)
    }
}
