//! Anonymous bearer-token flow of the distribution API.
//!
//! A registry that wants a token answers `401` with
//! `WWW-Authenticate: Bearer realm="...",service="...",scope="..."`. The token is fetched from
//! the realm and reused until shortly before it expires.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::ImageError;

/// Lifetime assumed when the token endpoint does not send `expires_in`.
const DEFAULT_TOKEN_EXPIRY_SECS: u64 = 300;
/// Tokens are dropped this long before they actually expire.
const TOKEN_EXPIRY_SAFETY_MARGIN_SECS: u64 = 30;

/// Parsed `Bearer` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Challenge {
    pub realm: String,
    pub service: Option<String>,
    pub scope: Option<String>,
}

impl Challenge {
    /// Parses a `WWW-Authenticate` value. Returns `None` for non-bearer schemes or a missing realm.
    pub fn parse(header: &str) -> Option<Self> {
        let params = header.trim().strip_prefix("Bearer ")?;

        let mut realm = None;
        let mut service = None;
        let mut scope = None;
        for (key, value) in split_params(params) {
            match key {
                "realm" => realm = Some(value),
                "service" => service = Some(value),
                "scope" => scope = Some(value),
                _ => {}
            }
        }

        Some(Self {
            realm: realm?,
            service,
            scope,
        })
    }

    /// Token endpoint URL. Falls back to a pull scope on `repository` when the challenge has none.
    pub fn token_url(&self, repository: &str) -> String {
        let scope = self
            .scope
            .clone()
            .unwrap_or_else(|| format!("repository:{repository}:pull"));
        let mut url = self.realm.clone();
        url.push(if url.contains('?') { '&' } else { '?' });
        if let Some(service) = &self.service {
            url.push_str(&format!("service={service}&"));
        }
        url.push_str(&format!("scope={scope}"));
        url
    }
}

/// Splits `k="v",k2="v2"` honoring commas inside quotes (scopes may list several actions).
fn split_params(params: &str) -> Vec<(&str, String)> {
    let mut out = Vec::new();
    let mut rest = params.trim();
    while !rest.is_empty() {
        let Some(eq) = rest.find('=') else { break };
        let key = rest[..eq].trim().trim_start_matches(',').trim();
        let after = &rest[eq + 1..];

        let (value, tail) = if let Some(quoted) = after.strip_prefix('"') {
            match quoted.find('"') {
                Some(end) => (&quoted[..end], &quoted[end + 1..]),
                None => (quoted, ""),
            }
        } else {
            match after.find(',') {
                Some(end) => (&after[..end], &after[end..]),
                None => (after, ""),
            }
        };

        out.push((key, value.trim().to_string()));
        rest = tail.trim_start_matches(',').trim();
    }
    out
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Tokens keyed by token URL.
#[derive(Debug, Default)]
pub(super) struct TokenCache {
    tokens: RwLock<HashMap<String, CachedToken>>,
}

impl TokenCache {
    pub async fn get(&self, key: &str) -> Option<String> {
        let tokens = self.tokens.read().await;
        tokens
            .get(key)
            .filter(|cached| cached.expires_at > Instant::now())
            .map(|cached| cached.token.clone())
    }

    pub async fn insert(&self, key: String, token: String, expires_in: Option<u64>) {
        let lifetime = expires_in
            .unwrap_or(DEFAULT_TOKEN_EXPIRY_SECS)
            .saturating_sub(TOKEN_EXPIRY_SAFETY_MARGIN_SECS);
        let now = Instant::now();
        let mut tokens = self.tokens.write().await;
        tokens.retain(|_, cached| cached.expires_at > now);
        tokens.insert(
            key,
            CachedToken {
                token,
                expires_at: now + Duration::from_secs(lifetime),
            },
        );
    }

    /// Returns a token for `challenge`, hitting the realm only on a cache miss.
    pub async fn token(
        &self,
        client: &reqwest::Client,
        challenge: &Challenge,
        repository: &str,
    ) -> Result<String, ImageError> {
        let url = challenge.token_url(repository);
        if let Some(token) = self.get(&url).await {
            debug!(url = %url, "using cached registry token");
            return Ok(token);
        }

        let resp = client.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ImageError::Unauthorized(format!(
                "token endpoint {url} returned {}",
                status.as_u16()
            )));
        }
        let body: TokenResponse = resp.json().await?;
        let token = body
            .token
            .or(body.access_token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ImageError::Unauthorized(format!("no token in response from {url}")))?;

        debug!(url = %url, expires_in = ?body.expires_in, "fetched registry token");
        self.insert(url, token.clone(), body.expires_in).await;
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_docker_hub_challenge() {
        let c = Challenge::parse(
            r#"Bearer realm="https://auth.docker.io/token",service="registry.docker.io",scope="repository:library/nginx:pull""#,
        )
        .unwrap();
        assert_eq!(c.realm, "https://auth.docker.io/token");
        assert_eq!(c.service.as_deref(), Some("registry.docker.io"));
        assert_eq!(
            c.token_url("library/nginx"),
            "https://auth.docker.io/token?service=registry.docker.io&scope=repository:library/nginx:pull"
        );
    }

    #[test]
    fn scope_with_comma_stays_intact() {
        let c = Challenge::parse(
            r#"Bearer realm="https://ghcr.io/token",scope="repository:org/tool:pull,push""#,
        )
        .unwrap();
        assert_eq!(c.scope.as_deref(), Some("repository:org/tool:pull,push"));
        assert_eq!(c.service, None);
    }

    #[test]
    fn missing_scope_defaults_to_pull() {
        let c = Challenge::parse(r#"Bearer realm="https://r.example/token""#).unwrap();
        assert_eq!(
            c.token_url("team/app"),
            "https://r.example/token?scope=repository:team/app:pull"
        );
    }

    #[test]
    fn basic_or_realmless_challenges_are_rejected() {
        assert!(Challenge::parse(r#"Basic realm="registry""#).is_none());
        assert!(Challenge::parse(r#"Bearer service="x""#).is_none());
    }

    #[tokio::test]
    async fn cached_tokens_expire_with_margin() {
        let cache = TokenCache::default();
        cache.insert("a".into(), "tok".into(), Some(3600)).await;
        assert_eq!(cache.get("a").await.as_deref(), Some("tok"));

        // Lifetime shorter than the margin is already expired.
        cache.insert("b".into(), "tok".into(), Some(10)).await;
        assert_eq!(cache.get("b").await, None);
    }
}
