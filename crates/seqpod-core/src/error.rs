use seqpod_image::ImageError;
use seqpod_model::PointerError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("script compression failed: {0}")]
    Compress(String),
    #[error("script payload is not valid base64: {0}")]
    Base64(String),
    #[error("script payload is not valid gzip: {0}")]
    Decompress(String),
}

impl From<std::io::Error> for ScriptError {
    fn from(e: std::io::Error) -> Self {
        ScriptError::Compress(e.to_string())
    }
}

/// Failure turning one step into a container.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("step {step}: {source}")]
    Image {
        step: String,
        #[source]
        source: ImageError,
    },
    #[error("step {step}: {source}")]
    Script {
        step: String,
        #[source]
        source: ScriptError,
    },
    #[error("step {step}: no command to run (image has neither entrypoint nor cmd)")]
    EmptyCommand { step: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProgressError {
    #[error("pod {pod}: {source}")]
    Pointer {
        pod: String,
        #[source]
        source: PointerError,
    },
}

/// Errors reported by the platform object store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: &'static str,
        namespace: String,
        name: String,
    },
    #[error("conflict updating {namespace}/{name}: object was modified")]
    Conflict { namespace: String, name: String },
    #[error("invalid object: {0}")]
    Invalid(String),
    #[error("platform error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, ApiError::Conflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }
}

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("task {0} has no steps")]
    NoSteps(String),
    #[error("task {0} has no uid")]
    MissingUid(String),
    #[error("task {task}: step name {step:?} is used more than once")]
    DuplicateStep { task: String, step: String },
    #[error("task {task}: step name {step:?} is not a valid DNS-1123 label")]
    InvalidStepName { task: String, step: String },
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("pod {pod}: gave up after {attempts} conflicting updates")]
    RetriesExhausted { pod: String, attempts: u32 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}
