use std::fmt;

use crate::error::ReferenceError;

const DEFAULT_REGISTRY: &str = "docker.io";
const DEFAULT_REGISTRY_HOST: &str = "registry-1.docker.io";
const DEFAULT_TAG: &str = "latest";
const MAX_TAG_LEN: usize = 128;

/// Parsed, canonical image reference.
///
/// Parsing is permissive: any registry host is accepted, a missing registry means Docker Hub,
/// single-component Docker Hub names get the `library/` prefix, and a reference with neither
/// tag nor digest is tagged `latest`. Two spellings of the same image (`alpine:3.12` and
/// `docker.io/library/alpine:3.12`) parse to equal values, which makes the type usable as a
/// cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    registry: String,
    repository: String,
    tag: Option<String>,
    digest: Option<String>,
}

impl ImageReference {
    pub fn parse(input: &str) -> Result<Self, ReferenceError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ReferenceError::Empty);
        }

        let (name, digest) = match input.split_once('@') {
            Some((name, digest)) => {
                validate_digest(digest).ok_or_else(|| ReferenceError::InvalidDigest(input.into()))?;
                (name, Some(digest.to_string()))
            }
            None => (input, None),
        };

        // A ':' after the last '/' separates the tag; earlier ones belong to a registry port.
        let (name, tag) = match name.rfind(':') {
            Some(i) if !name[i..].contains('/') => {
                let tag = &name[i + 1..];
                if !valid_tag(tag) {
                    return Err(ReferenceError::InvalidTag(input.into()));
                }
                (&name[..i], Some(tag.to_string()))
            }
            _ => (name, None),
        };

        let (registry, repository) = match name.split_once('/') {
            Some((head, rest)) if is_registry(head) => (normalize_registry(head), rest.to_string()),
            _ => (DEFAULT_REGISTRY.to_string(), name.to_string()),
        };

        if !valid_repository(&repository) {
            return Err(ReferenceError::InvalidRepository(input.into()));
        }
        let repository = if registry == DEFAULT_REGISTRY && !repository.contains('/') {
            format!("library/{repository}")
        } else {
            repository
        };

        let tag = match (&tag, &digest) {
            (None, None) => Some(DEFAULT_TAG.to_string()),
            _ => tag,
        };

        Ok(Self {
            registry,
            repository,
            tag,
            digest,
        })
    }

    /// Registry name as written in references (`docker.io`, `ghcr.io`, `localhost:5000`).
    pub fn registry(&self) -> &str {
        &self.registry
    }

    /// Host serving the distribution API for this registry.
    pub fn registry_host(&self) -> &str {
        if self.registry == DEFAULT_REGISTRY {
            DEFAULT_REGISTRY_HOST
        } else {
            &self.registry
        }
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    /// Tag or digest used to address the top-level manifest. A digest wins over a tag.
    pub fn identifier(&self) -> &str {
        self.digest
            .as_deref()
            .or(self.tag.as_deref())
            .unwrap_or(DEFAULT_TAG)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.registry, self.repository)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{tag}")?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{digest}")?;
        }
        Ok(())
    }
}

fn is_registry(component: &str) -> bool {
    component.contains('.') || component.contains(':') || component == "localhost"
}

fn normalize_registry(registry: &str) -> String {
    match registry {
        "index.docker.io" | "registry-1.docker.io" => DEFAULT_REGISTRY.to_string(),
        other => other.to_ascii_lowercase(),
    }
}

fn valid_repository(repo: &str) -> bool {
    !repo.is_empty()
        && repo.split('/').all(|part| {
            !part.is_empty()
                && part.chars().all(|c| {
                    c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-')
                })
        })
}

fn valid_tag(tag: &str) -> bool {
    !tag.is_empty()
        && tag.len() <= MAX_TAG_LEN
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

fn validate_digest(digest: &str) -> Option<()> {
    let (algo, hex) = digest.split_once(':')?;
    let algo_ok = !algo.is_empty()
        && algo
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '_' | '-'));
    let hex_ok = !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit());
    (algo_ok && hex_ok).then_some(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn docker_hub_short_name() {
        let r = ImageReference::parse("alpine:3.12").unwrap();
        assert_eq!(r.registry(), "docker.io");
        assert_eq!(r.registry_host(), "registry-1.docker.io");
        assert_eq!(r.repository(), "library/alpine");
        assert_eq!(r.tag(), Some("3.12"));
        assert_eq!(r.to_string(), "docker.io/library/alpine:3.12");
    }

    #[test]
    fn missing_tag_defaults_to_latest() {
        let r = ImageReference::parse("busybox").unwrap();
        assert_eq!(r.identifier(), "latest");
        assert_eq!(r.to_string(), "docker.io/library/busybox:latest");
    }

    #[test]
    fn equivalent_spellings_are_equal() {
        let a = ImageReference::parse("alpine:3.12").unwrap();
        let b = ImageReference::parse("docker.io/library/alpine:3.12").unwrap();
        let c = ImageReference::parse("index.docker.io/library/alpine:3.12").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn custom_registry_with_port() {
        let r = ImageReference::parse("localhost:5000/team/tool").unwrap();
        assert_eq!(r.registry(), "localhost:5000");
        assert_eq!(r.registry_host(), "localhost:5000");
        assert_eq!(r.repository(), "team/tool");
        assert_eq!(r.tag(), Some("latest"));

        let r = ImageReference::parse("harbor.internal.example/ci/entry:v1.1").unwrap();
        assert_eq!(r.registry(), "harbor.internal.example");
        assert_eq!(r.repository(), "ci/entry");
        assert_eq!(r.identifier(), "v1.1");
    }

    #[test]
    fn user_repository_on_hub_keeps_namespace() {
        let r = ImageReference::parse("someuser/tool:1").unwrap();
        assert_eq!(r.repository(), "someuser/tool");
    }

    #[test]
    fn digest_reference() {
        let d = "sha256:0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";
        let r = ImageReference::parse(&format!("ghcr.io/org/app@{d}")).unwrap();
        assert_eq!(r.digest(), Some(d));
        assert_eq!(r.tag(), None);
        assert_eq!(r.identifier(), d);

        let r = ImageReference::parse(&format!("ghcr.io/org/app:1.0@{d}")).unwrap();
        assert_eq!(r.tag(), Some("1.0"));
        assert_eq!(r.identifier(), d);
    }

    #[test]
    fn rejects_malformed() {
        assert_eq!(ImageReference::parse("  "), Err(ReferenceError::Empty));
        assert!(matches!(
            ImageReference::parse("Alpine:3"),
            Err(ReferenceError::InvalidRepository(_))
        ));
        assert!(matches!(
            ImageReference::parse("alpine:"),
            Err(ReferenceError::InvalidTag(_))
        ));
        assert!(matches!(
            ImageReference::parse("alpine@sha256"),
            Err(ReferenceError::InvalidDigest(_))
        ));
        assert!(matches!(
            ImageReference::parse("alpine@sha256:xyz"),
            Err(ReferenceError::InvalidDigest(_))
        ));
        assert!(matches!(
            ImageReference::parse("ghcr.io//app"),
            Err(ReferenceError::InvalidRepository(_))
        ));
    }
}
