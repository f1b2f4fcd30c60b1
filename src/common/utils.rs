//! Common utilities and helper functions
//!
//! Small pieces shared by the chart, image and configuration code.

use crate::error::{RegistryError, Result};
use serde::{Deserialize, Deserializer};
use std::path::Path;

/// File and path utilities
pub struct PathUtils;

impl PathUtils {
    /// Ensure directory exists, create if not
    pub fn ensure_dir_exists(path: &Path) -> Result<()> {
        std::fs::create_dir_all(path).map_err(|e| {
            RegistryError::Io(format!("Failed to create directory {}: {}", path.display(), e))
        })
    }

    /// gzip magic bytes
    pub fn is_gzipped(data: &[u8]) -> bool {
        data.len() >= 2 && data[0] == 0x1f && data[1] == 0x8b
    }
}

/// Validation utilities
pub struct ValidationUtils;

impl ValidationUtils {
    /// Validate repository name
    pub fn validate_repository(repository: &str) -> Result<()> {
        if repository.is_empty() {
            return Err(RegistryError::Validation(
                "Repository cannot be empty".to_string(),
            ));
        }
        if repository.contains("//") || repository.starts_with('/') || repository.ends_with('/') {
            return Err(RegistryError::Validation(format!(
                "Invalid repository format: {}",
                repository
            )));
        }
        Ok(())
    }

    /// Validate reference (tag, version or digest)
    pub fn validate_reference(reference: &str) -> Result<()> {
        if reference.is_empty() {
            return Err(RegistryError::Validation(
                "Reference cannot be empty".to_string(),
            ));
        }
        if reference.chars().any(char::is_whitespace) || reference.contains('/') {
            return Err(RegistryError::Validation(format!(
                "Invalid reference: '{}'",
                reference
            )));
        }
        Ok(())
    }
}

/// YAML scalars (`1.0`, `7`, `true`) as strings; versions are often written unquoted
pub fn scalar_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn deserialize_scalar<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_yaml::Value::deserialize(deserializer)?;
    scalar_string(&value).ok_or_else(|| serde::de::Error::custom("expected a scalar value"))
}

pub fn deserialize_scalar_list<'de, D>(
    deserializer: D,
) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<Vec<serde_yaml::Value>>::deserialize(deserializer)?.unwrap_or_default();
    values
        .iter()
        .map(|v| {
            scalar_string(v).ok_or_else(|| serde::de::Error::custom("expected a scalar value"))
        })
        .collect()
}
