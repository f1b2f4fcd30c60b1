//! Container image handling
//!
//! Manifest documents and media types, image reference parsing, and the pull/push transfer
//! that stages an image on disk between source and target.
//!
//! # Examples
//!
//! ```no_run
//! use airgap_mirror::image::ImageReference;
//!
//! let image = ImageReference::parse("ghcr.io/org/app:1.0").unwrap();
//! assert_eq!(image.registry, "ghcr.io");
//! assert_eq!(image.repository, "org/app");
//! ```

pub mod manifest;
pub mod reference;
pub mod transfer;

pub use manifest::{Descriptor, Manifest, ManifestDocument, ManifestIndex, ManifestType};
pub use reference::ImageReference;
pub use transfer::ImageTransfer;
