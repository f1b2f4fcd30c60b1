//! Registry protocol client: classification, auth, manifests and blobs

pub mod auth;
pub mod classifier;
pub mod client;
pub mod endpoint;
pub mod operations;

pub use auth::{AccessScope, AuthBroker, AuthHeaders, BearerChallenge};
pub use classifier::{Classification, RegistryClassifier};
pub use client::{RegistryClient, RegistryClientBuilder};
pub use endpoint::{RegistryEndpoint, RegistryFlavor};
