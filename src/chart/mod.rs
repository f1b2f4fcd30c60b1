//! Helm charts: package format, legacy index lookup and transfers

pub mod index;
pub mod package;
pub mod transfer;

pub use index::HelmIndex;
pub use package::{ChartLayer, ChartPackage};
pub use transfer::ChartTransfer;
