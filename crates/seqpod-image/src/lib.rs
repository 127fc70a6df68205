//! Image metadata resolution for seqpod.
//!
//! Given an image reference, [`ImageResolver`] fetches the manifest (or multi-platform index)
//! and image config from the registry, extracts the default entrypoint and arguments for every
//! platform it finds, and keeps the result in a shared, bounded [`ImageCache`].

mod error;
pub use error::{ImageError, ReferenceError};

mod reference;
pub use reference::ImageReference;

mod platform;
pub use platform::Platform;

mod info;
pub use info::{ImageCommand, ImageInfo};

pub mod manifest;
pub use manifest::MediaType;

pub mod registry;
pub use registry::{
    HttpRegistry, MemoryRegistry, PlatformConfig, RawManifest, Registry, RegistryConfig, inspect,
};

mod cache;
pub use cache::{DEFAULT_CAPACITY as DEFAULT_CACHE_CAPACITY, ImageCache};

mod resolver;
pub use resolver::ImageResolver;
