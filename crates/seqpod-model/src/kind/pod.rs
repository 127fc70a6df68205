use serde::{Deserialize, Serialize};

use crate::{ANNOTATION_STEP_POINTER, Container, ObjectMeta, PointerError, StepPointer};

/// Execution unit hosting all steps of a task.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pod {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PodSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PodStatus>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub init_containers: Vec<Container>,
    #[serde(default)]
    pub containers: Vec<Container>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart_policy: Option<RestartPolicy>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestartPolicy {
    Always,
    OnFailure,
    Never,
}

/// Named pod volume.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub name: String,
    #[serde(flatten)]
    pub source: VolumeSource,
}

/// Backing store of a [`Volume`]. Only the sources seqpod generates are modeled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VolumeSource {
    EmptyDir(EmptyDirVolumeSource),
    #[serde(rename = "downwardAPI")]
    DownwardApi(DownwardApiVolumeSource),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyDirVolumeSource {}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownwardApiVolumeSource {
    #[serde(default)]
    pub items: Vec<DownwardApiVolumeFile>,
}

/// File projected from an object field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownwardApiVolumeFile {
    pub path: String,
    pub field_ref: ObjectFieldSelector,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectFieldSelector {
    pub field_path: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodStatus {
    #[serde(default)]
    pub phase: PodPhase,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub container_statuses: Vec<ContainerStatus>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PodPhase {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStatus {
    pub name: String,
    #[serde(default)]
    pub state: ContainerState,
}

/// Current state of a container. At most one of the fields is set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waiting: Option<ContainerStateWaiting>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running: Option<ContainerStateRunning>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminated: Option<ContainerStateTerminated>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerStateWaiting {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStateRunning {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStateTerminated {
    pub exit_code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Pod {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    pub fn phase(&self) -> PodPhase {
        self.status.as_ref().map(|s| s.phase).unwrap_or_default()
    }

    /// Number of steps hosted by the pod.
    pub fn step_count(&self) -> usize {
        self.spec.containers.len()
    }

    /// Parses the step pointer annotation. A missing annotation is reported as not an integer.
    pub fn step_pointer(&self) -> Result<StepPointer, PointerError> {
        self.metadata
            .annotation(ANNOTATION_STEP_POINTER)
            .unwrap_or_default()
            .parse()
    }

    pub fn set_step_pointer(&mut self, pointer: StepPointer) {
        self.metadata
            .annotations
            .insert(ANNOTATION_STEP_POINTER.to_string(), pointer.to_string());
    }

    /// Status of the container that runs step `step` (1-based), matched by container name.
    pub fn step_status(&self, step: u32) -> Option<&ContainerStatus> {
        let idx = (step as usize).checked_sub(1)?;
        let container = self.spec.containers.get(idx)?;
        self.status
            .as_ref()?
            .container_statuses
            .iter()
            .find(|s| s.name == container.name)
    }
}

impl ContainerStatus {
    pub fn terminated(name: impl Into<String>, exit_code: i32) -> Self {
        Self {
            name: name.into(),
            state: ContainerState {
                terminated: Some(ContainerStateTerminated {
                    exit_code,
                    reason: None,
                }),
                ..Default::default()
            },
        }
    }

    pub fn running(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: ContainerState {
                running: Some(ContainerStateRunning::default()),
                ..Default::default()
            },
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.state.terminated.as_ref().map(|t| t.exit_code)
    }
}

fn default_api_version() -> String {
    "v1".to_string()
}

fn default_kind() -> String {
    "Pod".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pod_with(names: &[&str]) -> Pod {
        let mut pod = Pod::default();
        pod.spec.containers = names
            .iter()
            .map(|n| Container {
                name: n.to_string(),
                ..Default::default()
            })
            .collect();
        pod
    }

    #[test]
    fn step_status_matches_by_name_not_position() {
        let mut pod = pod_with(&["a", "b"]);
        pod.status = Some(PodStatus {
            phase: PodPhase::Running,
            container_statuses: vec![
                ContainerStatus::terminated("b", 3),
                ContainerStatus::terminated("a", 0),
            ],
        });
        assert_eq!(pod.step_status(1).unwrap().exit_code(), Some(0));
        assert_eq!(pod.step_status(2).unwrap().exit_code(), Some(3));
        assert!(pod.step_status(0).is_none());
        assert!(pod.step_status(3).is_none());
    }

    #[test]
    fn pointer_annotation_roundtrip() {
        let mut pod = pod_with(&["a"]);
        assert!(pod.step_pointer().is_err());
        pod.set_step_pointer(StepPointer::Released(1));
        assert_eq!(
            pod.metadata.annotation(ANNOTATION_STEP_POINTER),
            Some("1")
        );
        assert_eq!(pod.step_pointer().unwrap(), StepPointer::Released(1));
    }

    #[test]
    fn volumes_serialize_in_platform_shape() {
        let v = Volume {
            name: "podinfo".into(),
            source: VolumeSource::DownwardApi(DownwardApiVolumeSource {
                items: vec![DownwardApiVolumeFile {
                    path: "order".into(),
                    field_ref: ObjectFieldSelector {
                        field_path: "metadata.annotations['x']".into(),
                    },
                }],
            }),
        };
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["name"], "podinfo");
        assert_eq!(json["downwardAPI"]["items"][0]["path"], "order");
        assert_eq!(
            json["downwardAPI"]["items"][0]["fieldRef"]["fieldPath"],
            "metadata.annotations['x']"
        );

        let e = Volume {
            name: "bin".into(),
            source: VolumeSource::EmptyDir(EmptyDirVolumeSource {}),
        };
        let json = serde_json::to_value(&e).unwrap();
        assert!(json["emptyDir"].is_object());
    }

    #[test]
    fn status_phase_defaults_to_pending() {
        let pod: Pod = serde_json::from_str(r#"{"metadata":{"name":"p"}}"#).unwrap();
        assert_eq!(pod.phase(), PodPhase::Pending);

        let pod: Pod = serde_json::from_str(
            r#"{"status":{"phase":"Running","containerStatuses":[{"name":"a","state":{"terminated":{"exitCode":1}}}]}}"#,
        )
        .unwrap();
        assert_eq!(pod.phase(), PodPhase::Running);
        assert_eq!(
            pod.status.unwrap().container_statuses[0].exit_code(),
            Some(1)
        );
    }
}
