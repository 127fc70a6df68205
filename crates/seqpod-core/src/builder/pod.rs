use seqpod_model::{
    ANNOTATION_STEP_POINTER, Container, DownwardApiVolumeFile, DownwardApiVolumeSource,
    EmptyDirVolumeSource, LABEL_MANAGED_BY, LABEL_TASK_NAME, MANAGED_BY_VALUE,
    ObjectFieldSelector, ObjectMeta, OwnerReference, Pod, PodSpec, PullPolicy, RestartPolicy,
    StepPointer, StringMap, Task, Volume, VolumeMount, VolumeSource,
};

use crate::{
    BuilderConfig,
    config::{POINTER_FILE, VOLUME_HELPER, VOLUME_PODINFO, VOLUME_SCRIPTS},
};

pub(crate) const INIT_CONTAINER_NAME: &str = "seqpod-init";

/// Labels every task pod carries.
pub fn pod_labels(task_name: &str) -> StringMap {
    StringMap::from([
        (LABEL_MANAGED_BY.to_string(), MANAGED_BY_VALUE.to_string()),
        (LABEL_TASK_NAME.to_string(), task_name.to_string()),
    ])
}

/// Selector matching every pod seqpod manages.
pub fn managed_selector() -> StringMap {
    StringMap::from([(LABEL_MANAGED_BY.to_string(), MANAGED_BY_VALUE.to_string())])
}

/// Pod hosting `containers` for `task`, with the pointer at its initial value.
pub(crate) fn task_pod(
    config: &BuilderConfig,
    task: &Task,
    owner: OwnerReference,
    containers: Vec<Container>,
) -> Pod {
    let mut pod = Pod {
        metadata: ObjectMeta {
            generate_name: Some(format!("{}{}-", config.pod_prefix, task.name())),
            namespace: task.namespace().to_string(),
            labels: pod_labels(task.name()),
            owner_references: vec![owner],
            ..Default::default()
        },
        spec: PodSpec {
            init_containers: vec![init_container(config)],
            containers,
            volumes: volumes(),
            restart_policy: Some(RestartPolicy::Never),
        },
        ..Default::default()
    };
    pod.set_step_pointer(StepPointer::Pending);
    pod
}

/// Copies the helper binary out of the helper image into the shared bin volume.
fn init_container(config: &BuilderConfig) -> Container {
    Container {
        name: INIT_CONTAINER_NAME.to_string(),
        image: config.helper_image.clone(),
        image_pull_policy: Some(PullPolicy::IfNotPresent),
        command: vec![
            "cp".to_string(),
            config.helper_source.clone(),
            config.bin_dir.clone(),
        ],
        volume_mounts: vec![VolumeMount::new(VOLUME_HELPER, config.bin_dir.clone())],
        ..Default::default()
    }
}

fn volumes() -> Vec<Volume> {
    vec![
        Volume {
            name: VOLUME_HELPER.to_string(),
            source: VolumeSource::EmptyDir(EmptyDirVolumeSource {}),
        },
        Volume {
            name: VOLUME_SCRIPTS.to_string(),
            source: VolumeSource::EmptyDir(EmptyDirVolumeSource {}),
        },
        Volume {
            name: VOLUME_PODINFO.to_string(),
            source: VolumeSource::DownwardApi(DownwardApiVolumeSource {
                items: vec![DownwardApiVolumeFile {
                    path: POINTER_FILE.to_string(),
                    field_ref: ObjectFieldSelector {
                        field_path: format!("metadata.annotations['{ANNOTATION_STEP_POINTER}']"),
                    },
                }],
            }),
        },
    ]
}
