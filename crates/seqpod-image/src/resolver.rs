use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tracing::{debug, instrument};

use crate::{
    ImageCache, ImageCommand, ImageError, ImageInfo, ImageReference, Platform,
    registry::{self, Registry},
};

type Gate = Arc<tokio::sync::Mutex<()>>;

/// Resolves image references to their default commands, memoizing results.
///
/// Concurrent resolutions of the same reference share one registry round-trip; failures are
/// returned to every waiter and never cached.
pub struct ImageResolver {
    registry: Arc<dyn Registry>,
    cache: ImageCache,
    inflight: Mutex<HashMap<ImageReference, Gate>>,
}

impl ImageResolver {
    pub fn new(registry: Arc<dyn Registry>, cache: ImageCache) -> Self {
        Self {
            registry,
            cache,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    /// Parses `image` and resolves it.
    pub async fn resolve(&self, image: &str) -> Result<Arc<ImageInfo>, ImageError> {
        let reference = ImageReference::parse(image)?;
        self.resolve_ref(&reference).await
    }

    #[instrument(level = "debug", skip(self, image), fields(image = %image))]
    pub async fn resolve_ref(&self, image: &ImageReference) -> Result<Arc<ImageInfo>, ImageError> {
        if let Some(info) = self.cache.get(image) {
            debug!("image cache hit");
            return Ok(info);
        }

        let gate = self.gate(image);
        let result = {
            let _held = gate.lock().await;
            match self.cache.get(image) {
                Some(info) => Ok(info),
                None => registry::inspect(self.registry.as_ref(), image)
                    .await
                    .map(|info| {
                        let info = Arc::new(info);
                        self.cache.insert(info.clone());
                        info
                    }),
            }
        };
        self.release(image, gate);
        result
    }

    /// Default command of `image` on `platform`.
    pub async fn command_for(
        &self,
        image: &str,
        platform: &Platform,
    ) -> Result<ImageCommand, ImageError> {
        let info = self.resolve(image).await?;
        info.command_for(platform)
            .cloned()
            .ok_or_else(|| ImageError::MissingPlatform {
                image: info.name.clone(),
                platform: platform.key(),
            })
    }

    fn gate(&self, image: &ImageReference) -> Gate {
        let mut inflight = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
        inflight.entry(image.clone()).or_default().clone()
    }

    /// Gives up our handle and forgets the gate once nobody else holds it.
    fn release(&self, image: &ImageReference, gate: Gate) {
        drop(gate);
        let mut inflight = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
        if inflight
            .get(image)
            .is_some_and(|current| Arc::strong_count(current) == 1)
        {
            inflight.remove(image);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryRegistry, PlatformConfig};

    fn resolver(registry: Arc<MemoryRegistry>) -> ImageResolver {
        ImageResolver::new(registry, ImageCache::default())
    }

    fn alpine() -> Arc<MemoryRegistry> {
        Arc::new(MemoryRegistry::new().with_image(
            "alpine:3.12",
            PlatformConfig::new("linux", "amd64", &[], &["/bin/sh"]),
        ))
    }

    #[tokio::test]
    async fn second_resolve_is_served_from_cache() {
        let registry = alpine();
        let resolver = resolver(registry.clone());

        let first = resolver.resolve("alpine:3.12").await.unwrap();
        let fetched = registry.manifest_requests();
        let second = resolver.resolve("docker.io/library/alpine:3.12").await.unwrap();

        assert_eq!(registry.manifest_requests(), fetched);
        assert_eq!(first, second);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn concurrent_resolves_fetch_once() {
        let registry = alpine();
        let resolver = Arc::new(resolver(registry.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let resolver = resolver.clone();
                tokio::spawn(async move { resolver.resolve("alpine:3.12").await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(registry.manifest_requests(), 1);
        assert_eq!(registry.blob_requests(), 1);
        assert!(resolver.inflight.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let registry = alpine();
        let resolver = resolver(registry.clone());

        assert!(matches!(
            resolver.resolve("ghost:1").await,
            Err(ImageError::NotFound(_))
        ));
        assert!(resolver.resolve("ghost:1").await.is_err());
        assert_eq!(registry.manifest_requests(), 2);
        assert!(resolver.cache().is_empty());
    }

    #[tokio::test]
    async fn command_for_missing_platform() {
        let resolver = resolver(alpine());

        let cmd = resolver
            .command_for("alpine:3.12", &Platform::default())
            .await
            .unwrap();
        assert_eq!(cmd.args, vec!["/bin/sh"]);

        let err = resolver
            .command_for("alpine:3.12", &Platform::new("linux", "s390x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ImageError::MissingPlatform { .. }));
    }

    #[tokio::test]
    async fn bad_reference_is_rejected_before_fetch() {
        let registry = alpine();
        let resolver = resolver(registry.clone());
        assert!(matches!(
            resolver.resolve("UPPER/case").await,
            Err(ImageError::Reference(_))
        ));
        assert_eq!(registry.manifest_requests(), 0);
    }
}
