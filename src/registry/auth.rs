//! Bearer challenge authentication
//!
//! The broker probes the repository's manifest endpoint without credentials. A 200 means the
//! registry is open and yields an empty token; a 401 carries a `Bearer` challenge naming the
//! token service. Tokens are fetched fresh for every artifact and never cached.

use crate::cli::config::AuthConfig;
use crate::error::handlers::NetworkErrorHandler;
use crate::error::{RegistryError, Result};
use crate::image::manifest::MANIFEST_ACCEPT;
use crate::logging::Logger;
use crate::registry::endpoint::RegistryEndpoint;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Access an operation needs on the repository
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessScope {
    Pull,
    Push,
}

/// Parsed `WWW-Authenticate: Bearer ...` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerChallenge {
    pub realm: String,
    pub service: Option<String>,
    pub scope: Option<String>,
}

impl BearerChallenge {
    pub fn parse(header: &str) -> Result<Self> {
        let header = header.trim();
        let params = match header.split_once(char::is_whitespace) {
            Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest,
            _ if header.eq_ignore_ascii_case("bearer") => "",
            _ => {
                return Err(RegistryError::Auth(format!(
                    "unsupported authentication scheme: {}",
                    header
                )));
            }
        };

        let mut params = parse_challenge_params(params);
        let realm = params.remove("realm").ok_or_else(|| {
            RegistryError::Auth("bearer challenge is missing realm".to_string())
        })?;

        Ok(Self {
            realm,
            service: params.remove("service"),
            scope: params.remove("scope"),
        })
    }

    /// Widen a `...:pull` scope to `...:pull,push`
    pub fn for_access(mut self, access: AccessScope) -> Self {
        if access == AccessScope::Push {
            if let Some(scope) = self.scope.as_mut() {
                if scope.ends_with(":pull") {
                    scope.push_str(",push");
                }
            }
        }
        self
    }
}

/// Quoted `key="value"` pairs; quoted values may contain commas
fn parse_challenge_params(input: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut rest = input.trim();

    while let Some(eq) = rest.find('=') {
        let key = rest[..eq].trim().to_ascii_lowercase();
        let after = rest[eq + 1..].trim_start();

        let (value, remaining) = if let Some(quoted) = after.strip_prefix('"') {
            match quoted.find('"') {
                Some(end) => (&quoted[..end], &quoted[end + 1..]),
                None => (quoted, ""),
            }
        } else {
            let end = after.find(',').unwrap_or(after.len());
            (after[..end].trim(), &after[end..])
        };

        if !key.is_empty() {
            params.insert(key, value.to_string());
        }
        rest = remaining.trim_start().trim_start_matches(',').trim_start();
    }

    params
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
}

/// Authorization attached to registry requests
#[derive(Clone, Default, PartialEq, Eq)]
pub enum AuthHeaders {
    #[default]
    Anonymous,
    Bearer(String),
    Basic { username: String, password: String },
}

impl AuthHeaders {
    /// Token first, then basic credentials, then nothing
    pub fn resolve(token: String, creds: &AuthConfig) -> Self {
        if !token.is_empty() {
            AuthHeaders::Bearer(token)
        } else {
            Self::basic(creds)
        }
    }

    pub fn basic(creds: &AuthConfig) -> Self {
        if creds.has_credentials() {
            AuthHeaders::Basic {
                username: creds.username.clone(),
                password: creds.password.clone(),
            }
        } else {
            AuthHeaders::Anonymous
        }
    }

    /// Value for the `Authorization` header, if any
    pub fn header_value(&self) -> Option<String> {
        match self {
            AuthHeaders::Anonymous => None,
            AuthHeaders::Bearer(token) => Some(format!("Bearer {}", token)),
            AuthHeaders::Basic { username, password } => Some(format!(
                "Basic {}",
                STANDARD.encode(format!("{}:{}", username, password))
            )),
        }
    }

    pub fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self.header_value() {
            Some(value) => request.header(reqwest::header::AUTHORIZATION, value),
            None => request,
        }
    }
}

impl fmt::Debug for AuthHeaders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthHeaders::Anonymous => f.write_str("Anonymous"),
            AuthHeaders::Bearer(token) => write!(f, "Bearer(<{} chars>)", token.len()),
            AuthHeaders::Basic { username, .. } => write!(f, "Basic({})", username),
        }
    }
}

/// Runs the challenge/token flow against one registry
#[derive(Clone)]
pub struct AuthBroker {
    client: Client,
    output: Logger,
    probe_timeout: Duration,
    metadata_timeout: Duration,
}

impl AuthBroker {
    pub fn new(
        client: Client,
        output: Logger,
        probe_timeout: Duration,
        metadata_timeout: Duration,
    ) -> Self {
        Self {
            client,
            output,
            probe_timeout,
            metadata_timeout,
        }
    }

    /// Returns a bearer token, or an empty string when the registry needs none
    pub async fn resolve_token(
        &self,
        endpoint: &RegistryEndpoint,
        repository: &str,
        reference: &str,
        creds: &AuthConfig,
        access: AccessScope,
    ) -> Result<String> {
        let probe_url = format!(
            "{}/manifests/{}",
            endpoint.repository_url(repository),
            reference
        );
        self.output.detail(&format!("Auth probe: GET {}", probe_url));

        let response = self
            .client
            .get(&probe_url)
            .header(reqwest::header::ACCEPT, MANIFEST_ACCEPT)
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "auth probe"))?;

        let status = response.status();
        match status {
            StatusCode::OK => {
                self.output.detail(&format!("{} does not require a token", endpoint.host));
                return Ok(String::new());
            }
            // Anonymous push probes see 404 for tags that do not exist yet
            StatusCode::NOT_FOUND if access == AccessScope::Push => {
                self.output.detail(&format!(
                    "{} answered 404 without credentials, pushing anonymously",
                    endpoint.host
                ));
                return Ok(String::new());
            }
            StatusCode::UNAUTHORIZED => {}
            other => {
                return Err(RegistryError::Auth(format!(
                    "unexpected status {} from {} (expected 401 or 200)",
                    other, probe_url
                )));
            }
        }

        let header = response
            .headers()
            .get(reqwest::header::WWW_AUTHENTICATE)
            .and_then(|h| h.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let challenge = BearerChallenge::parse(&header)?.for_access(access);
        self.output.detail(&format!(
            "Bearer challenge: realm={}, service={:?}, scope={:?}",
            challenge.realm, challenge.service, challenge.scope
        ));

        self.fetch_token(&challenge, creds).await
    }

    /// Resolve the headers to use for an OCI operation on `repository`
    pub async fn authorize(
        &self,
        endpoint: &RegistryEndpoint,
        repository: &str,
        reference: &str,
        creds: &AuthConfig,
        access: AccessScope,
    ) -> Result<AuthHeaders> {
        let token = self
            .resolve_token(endpoint, repository, reference, creds, access)
            .await?;
        Ok(AuthHeaders::resolve(token, creds))
    }

    async fn fetch_token(&self, challenge: &BearerChallenge, creds: &AuthConfig) -> Result<String> {
        let mut query: Vec<(&str, &str)> = Vec::new();
        if let Some(service) = &challenge.service {
            query.push(("service", service.as_str()));
        }
        if let Some(scope) = &challenge.scope {
            query.push(("scope", scope.as_str()));
        }

        let mut request = self
            .client
            .get(&challenge.realm)
            .query(&query)
            .timeout(self.metadata_timeout);
        if creds.has_credentials() {
            self.output.detail(&format!("Requesting token as {}", creds.username));
            request = request.basic_auth(&creds.username, Some(&creds.password));
        }

        let response = request
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "token request"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RegistryError::Transport(format!(
                "token request to {} failed (status {}): {}",
                challenge.realm,
                status,
                body.trim()
            )));
        }

        let body: TokenResponse = response.json().await.map_err(|e| {
            RegistryError::Parse(format!("invalid token response from {}: {}", challenge.realm, e))
        })?;
        let token = body.token.or(body.access_token).ok_or_else(|| {
            RegistryError::Parse(format!("token response from {} has no token", challenge.realm))
        })?;

        self.output.detail(&format!("Token obtained ({} chars)", token.len()));
        Ok(token)
    }
}
