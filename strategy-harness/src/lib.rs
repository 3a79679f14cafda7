pub mod error;
pub mod config;
pub mod fees;
pub mod accounts;
pub mod artifacts;
pub mod contracts;
pub mod chain;
pub mod events;
pub mod snapshot;
pub mod invariants;
pub mod resolver;
pub mod provision;
pub mod scenario;

pub use chain::{Checkpoint, ForkChain};
pub use config::HarnessConfig;
pub use error::HarnessError;
pub use fees::FeeConfig;
pub use provision::{DeployedSystem, Fixture};
pub use resolver::{GlpFarmerResolver, StrategyResolver};
pub use scenario::{ScenarioRunner, StepOutcome};
pub use snapshot::{Scalar, Snapshot, SnapshotDiff, Snapshotter};
