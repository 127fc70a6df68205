/// API group/version of the `Task` resource.
pub const TASK_API_VERSION: &str = "seqpod.io/v1alpha1";

/// Kind of the `Task` resource.
pub const TASK_KIND: &str = "Task";

/// Annotation holding the step pointer of an execution pod.
pub const ANNOTATION_STEP_POINTER: &str = "seqpod.io/step-pointer";

/// Label marking a pod as managed by seqpod.
pub const LABEL_MANAGED_BY: &str = "seqpod.io/managed-by";

/// Value of [`LABEL_MANAGED_BY`] on execution pods.
pub const MANAGED_BY_VALUE: &str = "seqpod";

/// Label carrying the owning task's name.
pub const LABEL_TASK_NAME: &str = "seqpod.io/task";
