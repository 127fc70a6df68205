mod constants;
pub use constants::*;

mod meta;
pub use meta::{ObjectMeta, OwnerReference};

mod step_pointer;
pub use step_pointer::{PointerError, StepPointer};

mod progress;
pub use progress::TaskProgress;

/// Unique identifier assigned by the platform to an object.
pub type Uid = String;

/// Ordered string map used for labels and annotations.
pub type StringMap = std::collections::BTreeMap<String, String>;
