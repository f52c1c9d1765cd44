pub mod orchestrator;

#[cfg(test)]
mod tests;

pub use orchestrator::{DriverStats, OrchestratorError, SyncOrchestrator};
