use serde::{Deserialize, Serialize};

use crate::{Container, ObjectMeta, OwnerReference, TASK_API_VERSION, TASK_KIND};

/// User-authored ordered list of steps executed one after another in a single pod.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: TaskSpec,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Steps in execution order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<TaskStep>,
}

/// One step of a task.
///
/// Either runs the image's command (image mode) or, when `script` is non-empty, an inline
/// shell script (script mode). In script mode `command` and `args` are ignored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStep {
    #[serde(flatten)]
    pub container: Container,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub script: String,
}

impl Task {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, uid: impl Into<String>) -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            metadata: ObjectMeta {
                name: name.into(),
                namespace: namespace.into(),
                uid: Some(uid.into()),
                ..Default::default()
            },
            spec: TaskSpec::default(),
        }
    }

    pub fn with_step(mut self, step: TaskStep) -> Self {
        self.spec.steps.push(step);
        self
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    pub fn uid(&self) -> Option<&str> {
        self.metadata.uid.as_deref()
    }

    /// Controller owner reference pointing back at this task.
    ///
    /// Returns `None` while the task has no UID (it was never persisted).
    pub fn owner_reference(&self) -> Option<OwnerReference> {
        Some(OwnerReference {
            api_version: self.api_version.clone(),
            kind: self.kind.clone(),
            name: self.metadata.name.clone(),
            uid: self.metadata.uid.clone()?,
            controller: Some(true),
            block_owner_deletion: Some(true),
        })
    }
}

impl TaskStep {
    /// Image-mode step.
    pub fn image(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            container: Container {
                name: name.into(),
                image: image.into(),
                ..Default::default()
            },
            script: String::new(),
        }
    }

    /// Script-mode step.
    pub fn script(name: impl Into<String>, image: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            ..Self::image(name, image)
        }
    }

    pub fn with_command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.container.command = command.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.container.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_script(&self) -> bool {
        !self.script.is_empty()
    }
}

fn default_api_version() -> String {
    TASK_API_VERSION.to_string()
}

fn default_kind() -> String {
    TASK_KIND.to_string()
}
