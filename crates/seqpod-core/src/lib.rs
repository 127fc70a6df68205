//! Sequential step execution for seqpod tasks.
//!
//! A task's steps become the containers of one pod. Each container runs a small helper that
//! blocks until the pod's step pointer (an annotation projected into the containers as a
//! file) names its position, then runs the step. [`PodBuilder`] creates that pod and moves
//! the pointer one step at a time as containers finish.

mod error;
pub use error::{ApiError, BuildError, CompileError, ConfigError, ProgressError, ScriptError};

pub mod config;
pub use config::BuilderConfig;

mod script;
pub use script::{decode_script, encode_script};

mod compiler;
pub use compiler::StepCompiler;

mod progress;
pub use progress::forward;

pub mod api;
pub use api::{MemoryApi, PodApi, TaskApi};

mod builder;
pub use builder::{BuildOutcome, PodBuilder, managed_selector, pod_labels};

mod reconcile;
pub use reconcile::{Reconciler, task_key_for_pod};
