use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    #[error("image reference is empty")]
    Empty,
    #[error("invalid repository name in {0:?}")]
    InvalidRepository(String),
    #[error("invalid tag in {0:?}")]
    InvalidTag(String),
    #[error("invalid digest in {0:?} (expected <algorithm>:<hex>)")]
    InvalidDigest(String),
}

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("bad image reference: {0}")]
    Reference(#[from] ReferenceError),

    #[error("registry request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("registry returned {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("registry authorization failed: {0}")]
    Unauthorized(String),

    #[error("malformed registry document: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("unsupported manifest media type: {0}")]
    UnsupportedMediaType(String),

    #[error("manifest not found: {0}")]
    NotFound(String),

    #[error("image {image} has no command for platform {platform}")]
    MissingPlatform { image: String, platform: String },
}
