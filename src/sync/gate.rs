//! Push gates
//!
//! A gate is consulted before an image tag is transferred. Scanner integrations implement
//! [`PushGate`] and are registered by the name image resources refer to in `scan:`.

use crate::error::Result;
use crate::image::reference::ImageReference;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateVerdict {
    pub allowed: bool,
    pub message: String,
}

impl GateVerdict {
    pub fn allow(message: impl Into<String>) -> Self {
        Self {
            allowed: true,
            message: message.into(),
        }
    }

    pub fn deny(message: impl Into<String>) -> Self {
        Self {
            allowed: false,
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait PushGate: Send + Sync {
    /// Decide whether `image` at `tag` may be pushed to the target
    async fn evaluate(&self, image: &ImageReference, tag: &str) -> Result<GateVerdict>;
}

/// Gates by name
#[derive(Clone, Default)]
pub struct GateRegistry {
    gates: HashMap<String, Arc<dyn PushGate>>,
}

impl GateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `gate` under `name`, replacing an earlier one
    pub fn register(&mut self, name: impl Into<String>, gate: Arc<dyn PushGate>) {
        self.gates.insert(name.into(), gate);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn PushGate>> {
        self.gates.get(name).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }
}
