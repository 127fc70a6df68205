use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use serde::Serialize;

use crate::{
    ImageError, ImageReference, MediaType,
    manifest::{
        ConfigFile, Descriptor, IndexManifest, ImageManifest, OCI_CONFIG_V1, OCI_INDEX_V1,
        OCI_MANIFEST_V1, PlatformSpec, RunConfig,
    },
};

use super::{RawManifest, Registry, sha256_digest};

/// Platform entry published through [`MemoryRegistry`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformConfig {
    pub os: String,
    pub arch: String,
    pub entrypoint: Vec<String>,
    pub cmd: Vec<String>,
}

impl PlatformConfig {
    pub fn new(os: &str, arch: &str, entrypoint: &[&str], cmd: &[&str]) -> Self {
        Self {
            os: os.to_string(),
            arch: arch.to_string(),
            entrypoint: entrypoint.iter().map(|s| s.to_string()).collect(),
            cmd: cmd.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// In-process registry serving real OCI documents.
///
/// Manifests and configs are serialized to JSON and addressed by their sha256 digest, so
/// everything [`inspect`](super::inspect) does against a network registry happens here too.
/// Request counters let tests observe how often the registry is hit.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    /// `(registry/repository, tag-or-digest)` -> manifest.
    manifests: HashMap<(String, String), RawManifest>,
    /// digest -> blob.
    blobs: HashMap<String, Vec<u8>>,
    manifest_requests: AtomicUsize,
    blob_requests: AtomicUsize,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a single-platform image under `reference`.
    ///
    /// # Panics
    /// Panics if `reference` does not parse; intended for fixtures.
    pub fn with_image(mut self, reference: &str, platform: PlatformConfig) -> Self {
        let image = fixture_ref(reference);
        let manifest = self.put_platform(&image, &platform);
        self.put_manifest(&image, image.identifier().to_string(), manifest);
        self
    }

    /// Publishes a multi-platform index under `reference`.
    ///
    /// # Panics
    /// Panics if `reference` does not parse; intended for fixtures.
    pub fn with_index(
        mut self,
        reference: &str,
        platforms: impl IntoIterator<Item = PlatformConfig>,
    ) -> Self {
        let image = fixture_ref(reference);
        let mut index = IndexManifest {
            schema_version: 2,
            media_type: Some(OCI_INDEX_V1.to_string()),
            manifests: Vec::new(),
        };
        for platform in platforms {
            let manifest = self.put_platform(&image, &platform);
            index.manifests.push(Descriptor {
                media_type: OCI_MANIFEST_V1.to_string(),
                digest: manifest.digest.clone(),
                size: manifest.body.len() as i64,
                platform: Some(PlatformSpec {
                    os: platform.os.clone(),
                    architecture: platform.arch.clone(),
                    variant: None,
                }),
            });
        }

        let body = to_json(&index);
        let raw = RawManifest {
            media_type: MediaType::ImageIndex,
            digest: sha256_digest(&body),
            body,
        };
        self.put_manifest(&image, image.identifier().to_string(), raw);
        self
    }

    /// Number of manifest requests served so far, including failed lookups.
    pub fn manifest_requests(&self) -> usize {
        self.manifest_requests.load(Ordering::SeqCst)
    }

    pub fn blob_requests(&self) -> usize {
        self.blob_requests.load(Ordering::SeqCst)
    }

    fn put_platform(&mut self, image: &ImageReference, platform: &PlatformConfig) -> RawManifest {
        let config = ConfigFile {
            os: platform.os.clone(),
            architecture: platform.arch.clone(),
            config: Some(RunConfig {
                entrypoint: (!platform.entrypoint.is_empty()).then(|| platform.entrypoint.clone()),
                cmd: (!platform.cmd.is_empty()).then(|| platform.cmd.clone()),
            }),
        };
        let config_body = to_json(&config);
        let config_digest = sha256_digest(&config_body);
        let config_size = config_body.len() as i64;
        self.blobs.insert(config_digest.clone(), config_body);

        let manifest = ImageManifest {
            schema_version: 2,
            media_type: Some(OCI_MANIFEST_V1.to_string()),
            config: Descriptor {
                media_type: OCI_CONFIG_V1.to_string(),
                digest: config_digest,
                size: config_size,
                platform: None,
            },
            layers: Vec::new(),
        };
        let body = to_json(&manifest);
        let raw = RawManifest {
            media_type: MediaType::ImageManifest,
            digest: sha256_digest(&body),
            body,
        };
        self.put_manifest(image, raw.digest.clone(), raw.clone());
        raw
    }

    fn put_manifest(&mut self, image: &ImageReference, reference: String, raw: RawManifest) {
        self.manifests.insert((repository_key(image), reference), raw);
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    async fn manifest(
        &self,
        image: &ImageReference,
        reference: &str,
    ) -> Result<RawManifest, ImageError> {
        self.manifest_requests.fetch_add(1, Ordering::SeqCst);
        self.manifests
            .get(&(repository_key(image), reference.to_string()))
            .cloned()
            .ok_or_else(|| ImageError::NotFound(format!("{image} ({reference})")))
    }

    async fn blob(&self, image: &ImageReference, digest: &str) -> Result<Vec<u8>, ImageError> {
        self.blob_requests.fetch_add(1, Ordering::SeqCst);
        self.blobs
            .get(digest)
            .cloned()
            .ok_or_else(|| ImageError::NotFound(format!("{image} blob {digest}")))
    }
}

fn repository_key(image: &ImageReference) -> String {
    format!("{}/{}", image.registry(), image.repository())
}

fn fixture_ref(reference: &str) -> ImageReference {
    match ImageReference::parse(reference) {
        Ok(image) => image,
        Err(e) => panic!("fixture reference {reference:?}: {e}"),
    }
}

fn to_json<T: Serialize>(value: &T) -> Vec<u8> {
    // Plain structs of strings and vectors always serialize.
    serde_json::to_vec(value).unwrap_or_default()
}
