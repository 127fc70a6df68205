use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    RequestBuilder, Response, StatusCode,
    header::{ACCEPT, CONTENT_TYPE, WWW_AUTHENTICATE},
};
use tracing::{debug, instrument, warn};

use crate::{ImageError, ImageReference, MediaType, manifest::MANIFEST_ACCEPT};

use super::{
    RawManifest, Registry,
    auth::{Challenge, TokenCache},
    sha256_digest,
};

const DIGEST_HEADER: &str = "Docker-Content-Digest";

/// Settings of [`HttpRegistry`].
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Registry hosts reached over plain HTTP (`localhost:5000`).
    pub insecure: Vec<String>,
    /// Per-request timeout. `None` (the default) imposes none.
    pub timeout: Option<Duration>,
    pub user_agent: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            insecure: Vec::new(),
            timeout: None,
            user_agent: format!("seqpod/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Distribution API client with anonymous bearer-token support.
#[derive(Debug)]
pub struct HttpRegistry {
    client: reqwest::Client,
    config: RegistryConfig,
    tokens: TokenCache,
}

impl HttpRegistry {
    pub fn new(config: RegistryConfig) -> Result<Self, ImageError> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            config,
            tokens: TokenCache::default(),
        })
    }

    fn base_url(&self, image: &ImageReference) -> String {
        let host = image.registry_host();
        let plain = self.config.insecure.iter().any(|h| h == host)
            || host.starts_with("localhost")
            || host.starts_with("127.0.0.1");
        let scheme = if plain { "http" } else { "https" };
        format!("{scheme}://{host}/v2/{}", image.repository())
    }

    /// Sends the request built by `make`, answering one bearer challenge if the registry asks.
    async fn send(
        &self,
        image: &ImageReference,
        make: impl Fn() -> RequestBuilder,
    ) -> Result<Response, ImageError> {
        let resp = make().send().await?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return Ok(resp);
        }

        let header = resp
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let challenge = Challenge::parse(&header).ok_or_else(|| {
            ImageError::Unauthorized(format!("{image}: unsupported challenge {header:?}"))
        })?;
        let token = self
            .tokens
            .token(&self.client, &challenge, image.repository())
            .await?;

        let resp = make().bearer_auth(token).send().await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            warn!(image = %image, "registry rejected token");
            return Err(ImageError::Unauthorized(image.to_string()));
        }
        Ok(resp)
    }
}

fn check(resp: &Response, what: &str) -> Result<(), ImageError> {
    let status = resp.status();
    if status == StatusCode::NOT_FOUND {
        return Err(ImageError::NotFound(what.to_string()));
    }
    if !status.is_success() {
        return Err(ImageError::Status {
            url: resp.url().to_string(),
            status: status.as_u16(),
        });
    }
    Ok(())
}

#[async_trait]
impl Registry for HttpRegistry {
    #[instrument(level = "debug", skip(self, image), fields(image = %image))]
    async fn manifest(
        &self,
        image: &ImageReference,
        reference: &str,
    ) -> Result<RawManifest, ImageError> {
        let url = format!("{}/manifests/{reference}", self.base_url(image));
        let resp = self
            .send(image, || self.client.get(&url).header(ACCEPT, MANIFEST_ACCEPT))
            .await?;
        check(&resp, &format!("{image} ({reference})"))?;

        let header = |name: &str| {
            resp.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let content_type = header(CONTENT_TYPE.as_str());
        let digest = header(DIGEST_HEADER);

        let body = resp.bytes().await?.to_vec();
        let digest = digest.unwrap_or_else(|| sha256_digest(&body));
        let media_type = MediaType::detect(content_type.as_deref(), &body);
        debug!(digest = %digest, media_type = ?media_type, bytes = body.len(), "manifest fetched");

        Ok(RawManifest {
            media_type,
            digest,
            body,
        })
    }

    #[instrument(level = "debug", skip(self, image), fields(image = %image))]
    async fn blob(&self, image: &ImageReference, digest: &str) -> Result<Vec<u8>, ImageError> {
        let url = format!("{}/blobs/{digest}", self.base_url(image));
        let resp = self.send(image, || self.client.get(&url)).await?;
        check(&resp, &format!("{image} blob {digest}"))?;
        Ok(resp.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_timeout_by_default() {
        assert_eq!(RegistryConfig::default().timeout, None);
    }

    #[test]
    fn base_url_scheme() {
        let registry = HttpRegistry::new(RegistryConfig {
            insecure: vec!["registry.lan:5000".into()],
            ..RegistryConfig::default()
        })
        .unwrap();

        let hub = ImageReference::parse("alpine:3.12").unwrap();
        assert_eq!(
            registry.base_url(&hub),
            "https://registry-1.docker.io/v2/library/alpine"
        );

        let lan = ImageReference::parse("registry.lan:5000/team/app:1").unwrap();
        assert_eq!(registry.base_url(&lan), "http://registry.lan:5000/v2/team/app");

        let local = ImageReference::parse("localhost:5000/app").unwrap();
        assert!(registry.base_url(&local).starts_with("http://localhost:5000/"));
    }
}
