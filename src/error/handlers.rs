//! Conversion of HTTP statuses and transport failures into the error taxonomy

use crate::error::RegistryError;
use reqwest::{Response, StatusCode};

/// Maps non-2xx responses onto error kinds
pub struct HttpErrorHandler;

impl HttpErrorHandler {
    /// Classify a failed response status for the given operation
    pub fn from_status(status: StatusCode, error_text: &str, context: &str) -> RegistryError {
        let error_text = error_text.trim();
        match status.as_u16() {
            404 => RegistryError::NotFound(format!("{} (status 404): {}", context, error_text)),
            401 => RegistryError::Auth(format!(
                "unauthorized during {}: {}",
                context, error_text
            )),
            403 => RegistryError::Auth(format!(
                "permission denied for {}: {}",
                context, error_text
            )),
            429 => RegistryError::Transport(format!(
                "rate limited during {}: {}",
                context, error_text
            )),
            500 => RegistryError::Transport(format!(
                "registry server error during {}: {}",
                context, error_text
            )),
            502 | 503 => RegistryError::Transport(format!(
                "registry unavailable during {}: {}",
                context, error_text
            )),
            _ => RegistryError::Transport(format!(
                "{} failed (status {}): {}",
                context, status, error_text
            )),
        }
    }

    /// Consume a failed response and classify it, reading the body for the message
    pub async fn from_response(response: Response, context: &str) -> RegistryError {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read error response".to_string());
        Self::from_status(status, &error_text, context)
    }
}

/// Network error categorization
pub struct NetworkErrorHandler;

impl NetworkErrorHandler {
    /// Every library-level fault is a transport failure; the message says which one
    pub fn handle_network_error(error: &reqwest::Error, context: &str) -> RegistryError {
        if error.is_timeout() {
            RegistryError::Transport(format!("{} timeout: {}", context, error))
        } else if error.is_connect() {
            RegistryError::Transport(format!("connection error during {}: {}", context, error))
        } else if error.is_decode() {
            RegistryError::Parse(format!("could not decode {} response: {}", context, error))
        } else if let Some(status) = error.status() {
            HttpErrorHandler::from_status(status, &error.to_string(), context)
        } else {
            RegistryError::Transport(format!("{} network error: {}", context, error))
        }
    }
}
