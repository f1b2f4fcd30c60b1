//! Image reference parsing
//!
//! Accepts the usual shorthand: `nginx`, `nginx:1.27`, `ghcr.io/org/app:1.0`,
//! `localhost:5000/app@sha256:...`, optionally prefixed with `http://` or `https://`.

use crate::common::ValidationUtils;
use crate::error::{RegistryError, Result};
use crate::registry::endpoint::{RegistryEndpoint, RegistryFlavor};
use std::fmt;

pub const DOCKER_HUB_REGISTRY: &str = "registry-1.docker.io";
pub const DEFAULT_TAG: &str = "latest";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub scheme: String,
    /// Registry authority, host with optional port
    pub registry: String,
    pub repository: String,
    /// Tag, or a digest when `is_digest()` holds
    pub reference: String,
}

impl ImageReference {
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let (scheme, rest) = if let Some(rest) = input.strip_prefix("https://") {
            ("https", rest)
        } else if let Some(rest) = input.strip_prefix("http://") {
            ("http", rest)
        } else {
            ("https", input)
        };
        let rest = rest.trim_matches('/');
        if rest.is_empty() {
            return Err(RegistryError::Validation(format!(
                "invalid image reference '{}'",
                input
            )));
        }

        let (name, digest) = match rest.split_once('@') {
            Some((name, digest)) => (name, Some(digest)),
            None => (rest, None),
        };

        // A colon after the last slash separates the tag
        let last_slash = name.rfind('/').map(|i| i + 1).unwrap_or(0);
        let (name, tag) = match name[last_slash..].rfind(':') {
            Some(i) => (&name[..last_slash + i], Some(&name[last_slash + i + 1..])),
            None => (name, None),
        };

        let (registry, repository) = match name.split_once('/') {
            Some((first, remainder))
                if first.contains('.') || first.contains(':') || first == "localhost" =>
            {
                (first.to_string(), remainder.to_string())
            }
            _ => (DOCKER_HUB_REGISTRY.to_string(), name.to_string()),
        };
        let registry = match registry.as_str() {
            "docker.io" | "index.docker.io" => DOCKER_HUB_REGISTRY.to_string(),
            _ => registry,
        };

        let repository = if registry == DOCKER_HUB_REGISTRY && !repository.contains('/') {
            format!("library/{}", repository)
        } else {
            repository
        };

        let reference = digest
            .map(str::to_string)
            .or_else(|| tag.map(str::to_string))
            .unwrap_or_else(|| DEFAULT_TAG.to_string());
        ValidationUtils::validate_repository(&repository)
            .and_then(|_| ValidationUtils::validate_reference(&reference))
            .map_err(|e| e.context(&format!("image reference '{}'", input)))?;

        Ok(Self {
            scheme: scheme.to_string(),
            registry,
            repository,
            reference,
        })
    }

    /// Same repository at another tag
    pub fn with_tag(&self, tag: &str) -> Self {
        Self {
            reference: tag.to_string(),
            ..self.clone()
        }
    }

    pub fn is_digest(&self) -> bool {
        self.reference.contains(':')
    }

    pub fn endpoint(&self) -> RegistryEndpoint {
        RegistryEndpoint {
            scheme: self.scheme.clone(),
            host: self.registry.clone(),
            path: String::new(),
            flavor: RegistryFlavor::Oci,
        }
    }

    /// Credential aliases to try, most specific first
    pub fn credential_aliases(&self) -> Vec<String> {
        let mut aliases = vec![self.registry.clone()];
        if let Some((host, _port)) = self.registry.split_once(':') {
            aliases.push(host.to_string());
        }
        aliases
    }

    /// Filesystem-safe name without tag or digest semantics
    pub fn folder_name(&self) -> String {
        folder_name(&format!("{}/{}", self.registry, self.repository))
    }
}

/// Keep alphanumerics, collapse every other run of characters into one `_`
pub fn folder_name(image: &str) -> String {
    let image = image.split('@').next().unwrap_or(image);
    let mut out = String::with_capacity(image.len());
    for c in image.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = if self.is_digest() { '@' } else { ':' };
        write!(f, "{}/{}{}{}", self.registry, self.repository, sep, self.reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn official_image_shorthand() {
        let r = ImageReference::parse("nginx").unwrap();
        assert_eq!(r.registry, DOCKER_HUB_REGISTRY);
        assert_eq!(r.repository, "library/nginx");
        assert_eq!(r.reference, "latest");
    }

    #[test]
    fn registry_with_port_and_tag() {
        let r = ImageReference::parse("localhost:5000/team/app:1.2").unwrap();
        assert_eq!(r.registry, "localhost:5000");
        assert_eq!(r.repository, "team/app");
        assert_eq!(r.reference, "1.2");
        assert_eq!(r.credential_aliases(), vec!["localhost:5000", "localhost"]);
    }

    #[test]
    fn user_repository_on_docker_hub() {
        let r = ImageReference::parse("bitnami/redis:7").unwrap();
        assert_eq!(r.registry, DOCKER_HUB_REGISTRY);
        assert_eq!(r.repository, "bitnami/redis");
    }

    #[test]
    fn digest_reference_and_scheme() {
        let digest = format!("sha256:{}", "a".repeat(64));
        let r = ImageReference::parse(&format!("http://reg.local/app@{}", digest)).unwrap();
        assert_eq!(r.scheme, "http");
        assert_eq!(r.reference, digest);
        assert!(r.is_digest());
        assert_eq!(r.to_string(), format!("reg.local/app@{}", digest));
    }

    #[test]
    fn folder_names_are_filesystem_safe() {
        let r = ImageReference::parse("ghcr.io/org/my-app:1.0").unwrap();
        assert_eq!(r.folder_name(), "ghcr_io_org_my_app");
        assert_eq!(folder_name("__a//b@sha256:ff"), "a_b");
    }
}
