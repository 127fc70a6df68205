use seqpod_image::{DEFAULT_CACHE_CAPACITY, Platform};

use crate::ConfigError;

/// Volume the init container stages the helper binary into.
pub const VOLUME_HELPER: &str = "seqpod-helper";
/// Volume holding decoded step scripts.
pub const VOLUME_SCRIPTS: &str = "seqpod-scripts";
/// Downward-API volume exposing the step pointer.
pub const VOLUME_PODINFO: &str = "seqpod-podinfo";
/// File (inside the podinfo volume) carrying the step pointer.
pub const POINTER_FILE: &str = "order";

/// Layout and policy of generated pods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuilderConfig {
    /// Image that ships the wait/exec helper.
    pub helper_image: String,
    /// Path of the helper binary inside `helper_image`.
    pub helper_source: String,
    /// Mount point of the helper volume in every container.
    pub bin_dir: String,
    /// Mount point of the scripts volume.
    pub scripts_dir: String,
    /// Mount point of the podinfo volume.
    pub podinfo_dir: String,
    /// Generated pod names are `{pod_prefix}{task}-{suffix}`.
    pub pod_prefix: String,
    /// Platform whose image defaults are used for steps without a command.
    pub platform: Platform,
    pub cache_capacity: usize,
    /// Attempts for a step pointer update that keeps hitting version conflicts.
    pub conflict_retries: u32,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            helper_image: "docker.io/shenyisyn/entrypoint:v1.1".to_string(),
            helper_source: "/app/entrypoint".to_string(),
            bin_dir: "/entrypoint/bin".to_string(),
            scripts_dir: "/seqpod/scripts".to_string(),
            podinfo_dir: "/etc/podinfo".to_string(),
            pod_prefix: "task-pod-".to_string(),
            platform: Platform::default(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            conflict_retries: 5,
        }
    }
}

impl BuilderConfig {
    /// Defaults overridden by `SEQPOD_*` environment variables.
    ///
    /// | variable                       | field              |
    /// |--------------------------------|--------------------|
    /// | `SEQPOD_HELPER_IMAGE`          | `helper_image`     |
    /// | `SEQPOD_HELPER_SOURCE`         | `helper_source`    |
    /// | `SEQPOD_BIN_DIR`               | `bin_dir`          |
    /// | `SEQPOD_SCRIPTS_DIR`           | `scripts_dir`      |
    /// | `SEQPOD_PODINFO_DIR`           | `podinfo_dir`      |
    /// | `SEQPOD_POD_PREFIX`            | `pod_prefix`       |
    /// | `SEQPOD_PLATFORM`              | `platform`         |
    /// | `SEQPOD_IMAGE_CACHE_CAPACITY`  | `cache_capacity`   |
    /// | `SEQPOD_CONFLICT_RETRIES`      | `conflict_retries` |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`BuilderConfig::from_env`] with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("SEQPOD_HELPER_IMAGE") {
            cfg.helper_image = v;
        }
        if let Some(v) = get("SEQPOD_HELPER_SOURCE") {
            cfg.helper_source = v;
        }
        if let Some(v) = get("SEQPOD_BIN_DIR") {
            cfg.bin_dir = absolute("SEQPOD_BIN_DIR", v)?;
        }
        if let Some(v) = get("SEQPOD_SCRIPTS_DIR") {
            cfg.scripts_dir = absolute("SEQPOD_SCRIPTS_DIR", v)?;
        }
        if let Some(v) = get("SEQPOD_PODINFO_DIR") {
            cfg.podinfo_dir = absolute("SEQPOD_PODINFO_DIR", v)?;
        }
        if let Some(v) = get("SEQPOD_POD_PREFIX") {
            cfg.pod_prefix = v;
        }
        if let Some(v) = get("SEQPOD_PLATFORM") {
            cfg.platform = v.parse().map_err(|reason| ConfigError::Invalid {
                var: "SEQPOD_PLATFORM",
                reason,
            })?;
        }
        if let Some(v) = get("SEQPOD_IMAGE_CACHE_CAPACITY") {
            cfg.cache_capacity = v.trim().parse().map_err(|e| ConfigError::Invalid {
                var: "SEQPOD_IMAGE_CACHE_CAPACITY",
                reason: format!("{e}"),
            })?;
        }
        if let Some(v) = get("SEQPOD_CONFLICT_RETRIES") {
            let retries: u32 = v.trim().parse().map_err(|e| ConfigError::Invalid {
                var: "SEQPOD_CONFLICT_RETRIES",
                reason: format!("{e}"),
            })?;
            if retries == 0 {
                return Err(ConfigError::Invalid {
                    var: "SEQPOD_CONFLICT_RETRIES",
                    reason: "must be at least 1".into(),
                });
            }
            cfg.conflict_retries = retries;
        }
        Ok(cfg)
    }

    /// Full path of the helper binary inside step containers.
    pub fn helper_path(&self) -> String {
        format!("{}/entrypoint", self.bin_dir.trim_end_matches('/'))
    }

    /// Full path of the projected step pointer file.
    pub fn pointer_path(&self) -> String {
        format!("{}/{POINTER_FILE}", self.podinfo_dir.trim_end_matches('/'))
    }

    /// Full path a script step's decoded payload is written to.
    pub fn script_path(&self, step: &str) -> String {
        format!("{}/{step}", self.scripts_dir.trim_end_matches('/'))
    }
}

fn absolute(var: &'static str, value: String) -> Result<String, ConfigError> {
    if value.starts_with('/') {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            var,
            reason: format!("{value:?} is not an absolute path"),
        })
    }
}
