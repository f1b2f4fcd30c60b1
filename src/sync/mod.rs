//! Resource synchronization: push gates, orchestration and reporting

pub mod gate;
pub mod orchestrator;
pub mod report;

pub use gate::{GateRegistry, GateVerdict, PushGate};
pub use orchestrator::SyncOrchestrator;
pub use report::{SyncReport, SyncResult};
