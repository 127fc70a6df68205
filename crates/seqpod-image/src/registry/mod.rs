//! Registry access.
//!
//! [`Registry`] is the narrow seam to a distribution API: fetch a manifest by tag or digest,
//! fetch a blob by digest. [`inspect`] walks those documents from a reference down to the
//! image config of every platform it exposes.

mod auth;

mod http;
pub use http::{HttpRegistry, RegistryConfig};

mod memory;
pub use memory::{MemoryRegistry, PlatformConfig};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::{debug, trace};

use crate::{
    ImageError, ImageInfo, ImageReference, MediaType,
    manifest::{ConfigFile, ImageManifest, IndexManifest},
};

/// Manifest document as returned by a registry.
#[derive(Debug, Clone)]
pub struct RawManifest {
    pub media_type: MediaType,
    /// Content digest of `body`.
    pub digest: String,
    pub body: Vec<u8>,
}

#[async_trait]
pub trait Registry: Send + Sync + 'static {
    /// Fetches the manifest of `image` addressed by `reference` (tag or digest).
    async fn manifest(
        &self,
        image: &ImageReference,
        reference: &str,
    ) -> Result<RawManifest, ImageError>;

    /// Fetches a blob of `image`'s repository by digest.
    async fn blob(&self, image: &ImageReference, digest: &str) -> Result<Vec<u8>, ImageError>;
}

/// Resolves the default command of every platform `image` provides.
///
/// A single-platform manifest contributes one entry keyed by its config's `os/arch`. An index
/// contributes one entry per image manifest it lists; entries that are not image manifests
/// (nested indexes, attestations with an `unknown` platform) are skipped.
pub async fn inspect(registry: &dyn Registry, image: &ImageReference) -> Result<ImageInfo, ImageError> {
    let top = registry.manifest(image, image.identifier()).await?;
    let mut info = ImageInfo::new(image.clone(), top.digest.clone());

    match &top.media_type {
        MediaType::ImageManifest => {
            let config = config_of(registry, image, &top.body).await?;
            record(&mut info, &config);
        }
        MediaType::ImageIndex => {
            let index: IndexManifest = serde_json::from_slice(&top.body)?;
            for entry in &index.manifests {
                if !MediaType::parse(&entry.media_type).is_image() {
                    debug!(image = %image, digest = %entry.digest, media_type = %entry.media_type, "skipping non-image index entry");
                    continue;
                }
                if entry.platform.as_ref().is_some_and(|p| p.os == "unknown") {
                    trace!(image = %image, digest = %entry.digest, "skipping attestation manifest");
                    continue;
                }
                let manifest = registry.manifest(image, &entry.digest).await?;
                let config = config_of(registry, image, &manifest.body).await?;
                record(&mut info, &config);
            }
        }
        MediaType::Other(other) => return Err(ImageError::UnsupportedMediaType(other.clone())),
    }

    debug!(image = %image, digest = %info.digest, platforms = info.commands.len(), "image inspected");
    Ok(info)
}

async fn config_of(
    registry: &dyn Registry,
    image: &ImageReference,
    manifest: &[u8],
) -> Result<ConfigFile, ImageError> {
    let manifest: ImageManifest = serde_json::from_slice(manifest)?;
    let blob = registry.blob(image, &manifest.config.digest).await?;
    Ok(serde_json::from_slice(&blob)?)
}

/// `sha256:<hex>` content digest.
pub(crate) fn sha256_digest(body: &[u8]) -> String {
    format!("sha256:{:x}", Sha256::digest(body))
}

fn record(info: &mut ImageInfo, config: &ConfigFile) {
    info.add_command(
        &config.os,
        &config.architecture,
        config.entrypoint(),
        config.cmd(),
    );
}
