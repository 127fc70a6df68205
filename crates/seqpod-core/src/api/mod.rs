//! Narrow view of the platform object store.
//!
//! The builder only needs to list, read, create and update pods and to read tasks.
//! Implementations talk to a real cluster; [`MemoryApi`] keeps everything in process.

mod memory;
pub use memory::MemoryApi;

use async_trait::async_trait;
use seqpod_model::{Pod, StringMap, Task};

use crate::ApiError;

#[async_trait]
pub trait TaskApi: Send + Sync + 'static {
    /// Current state of the task `namespace/name`.
    async fn get_task(&self, namespace: &str, name: &str) -> Result<Task, ApiError>;
}

#[async_trait]
pub trait PodApi: Send + Sync + 'static {
    /// Pods in `namespace` carrying every label of `selector`.
    async fn list_pods(&self, namespace: &str, selector: &StringMap) -> Result<Vec<Pod>, ApiError>;

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod, ApiError>;

    /// Creates `pod`, completing `generateName` and assigning uid and version.
    async fn create_pod(&self, pod: Pod) -> Result<Pod, ApiError>;

    /// Replaces the stored pod.
    ///
    /// Fails with [`ApiError::Conflict`] when `pod.metadata.resource_version` is not the
    /// current version of the stored object.
    async fn update_pod(&self, pod: Pod) -> Result<Pod, ApiError>;
}
