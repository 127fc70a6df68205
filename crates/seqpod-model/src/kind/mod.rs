mod container;
pub use container::{Container, EnvVar, PullPolicy, ResourceRequirements, VolumeMount};

mod pod;
pub use pod::{
    ContainerState, ContainerStateRunning, ContainerStateTerminated, ContainerStateWaiting,
    ContainerStatus, DownwardApiVolumeFile, DownwardApiVolumeSource, EmptyDirVolumeSource,
    ObjectFieldSelector, Pod, PodPhase, PodSpec, PodStatus, RestartPolicy, Volume, VolumeSource,
};

mod task;
pub use task::{Task, TaskSpec, TaskStep};
