//! OCI / Docker distribution documents: manifests, indexes and image configs.
//!
//! Only the fields needed to walk from a reference to the per-platform image config are
//! modeled; unknown fields are ignored.

use serde::{Deserialize, Serialize};

pub const DOCKER_MANIFEST_V2: &str = "application/vnd.docker.distribution.manifest.v2+json";
pub const DOCKER_MANIFEST_LIST_V2: &str =
    "application/vnd.docker.distribution.manifest.list.v2+json";
pub const OCI_MANIFEST_V1: &str = "application/vnd.oci.image.manifest.v1+json";
pub const OCI_INDEX_V1: &str = "application/vnd.oci.image.index.v1+json";
pub const DOCKER_CONFIG_V1: &str = "application/vnd.docker.container.image.v1+json";
pub const OCI_CONFIG_V1: &str = "application/vnd.oci.image.config.v1+json";

/// `Accept` header for manifest requests. Index types come first so multi-platform
/// references return the index instead of a single platform picked by the registry.
pub const MANIFEST_ACCEPT: &str = "application/vnd.docker.distribution.manifest.list.v2+json, \
     application/vnd.oci.image.index.v1+json, \
     application/vnd.docker.distribution.manifest.v2+json, \
     application/vnd.oci.image.manifest.v1+json";

/// Kind of document a manifest endpoint returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaType {
    /// Single-platform image manifest.
    ImageManifest,
    /// Multi-platform index / manifest list.
    ImageIndex,
    Other(String),
}

impl MediaType {
    pub fn parse(media_type: &str) -> Self {
        // Content-Type may carry parameters ("...+json; charset=utf-8").
        let bare = media_type.split(';').next().unwrap_or_default().trim();
        match bare {
            DOCKER_MANIFEST_V2 | OCI_MANIFEST_V1 => MediaType::ImageManifest,
            DOCKER_MANIFEST_LIST_V2 | OCI_INDEX_V1 => MediaType::ImageIndex,
            other => MediaType::Other(other.to_string()),
        }
    }

    /// Determines the type of a manifest body.
    ///
    /// The body's own `mediaType` wins, then the response content type; bodies that declare
    /// neither are classified by shape (`manifests` array means index).
    pub fn detect(content_type: Option<&str>, body: &[u8]) -> Self {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Probe {
            media_type: Option<String>,
            manifests: Option<serde_json::Value>,
        }

        let probe: Option<Probe> = serde_json::from_slice(body).ok();
        if let Some(mt) = probe.as_ref().and_then(|p| p.media_type.as_deref()) {
            return MediaType::parse(mt);
        }
        if let Some(ct) = content_type {
            let parsed = MediaType::parse(ct);
            if parsed != MediaType::Other("application/json".into()) {
                return parsed;
            }
        }
        match probe {
            Some(p) if p.manifests.is_some() => MediaType::ImageIndex,
            _ => MediaType::ImageManifest,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, MediaType::ImageManifest)
    }

    pub fn is_index(&self) -> bool {
        matches!(self, MediaType::ImageIndex)
    }
}

/// Content descriptor referenced from manifests and indexes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    #[serde(default)]
    pub media_type: String,
    pub digest: String,
    #[serde(default)]
    pub size: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<PlatformSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformSpec {
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub architecture: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

/// Single-platform image manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageManifest {
    #[serde(default)]
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    pub config: Descriptor,
    #[serde(default)]
    pub layers: Vec<Descriptor>,
}

/// Multi-platform index (OCI index or Docker manifest list).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexManifest {
    #[serde(default)]
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default)]
    pub manifests: Vec<Descriptor>,
}

/// Image configuration blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub architecture: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<RunConfig>,
}

/// Runtime defaults of an image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(rename = "Entrypoint", default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<Vec<String>>,
    #[serde(rename = "Cmd", default, skip_serializing_if = "Option::is_none")]
    pub cmd: Option<Vec<String>>,
}

impl ConfigFile {
    pub fn entrypoint(&self) -> Vec<String> {
        self.config
            .as_ref()
            .and_then(|c| c.entrypoint.clone())
            .unwrap_or_default()
    }

    pub fn cmd(&self) -> Vec<String> {
        self.config
            .as_ref()
            .and_then(|c| c.cmd.clone())
            .unwrap_or_default()
    }
}
