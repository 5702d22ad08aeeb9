//! # print_fleet
//!
//! Coordinator for a fleet of 3D printers. It keeps printer availability,
//! spool material accounting and the print job state machine consistent
//! under concurrent callers, and turns camera-frame failure scores into
//! forced job failures.
//!
//! Components, leaf first:
//!
//! - [`printer::PrinterRegistry`] owns printer status and availability.
//! - [`inventory::InventoryLedger`] owns spool weights and deduplicated alerts.
//! - [`print_job::JobLifecycleManager`] owns the job state machine and drives
//!   the two above.
//! - [`detection::FailureMonitor`] scores frames and force-fails jobs.
//!
//! [`fleet::FleetCoordinator`] wires them to one [`store::FleetStore`] and a
//! [`fleet_shared::Clock`].

pub mod config;
pub mod detection;
pub mod error;
pub mod fleet;
pub mod inventory;
pub mod print_job;
pub mod printer;
pub mod store;

pub use config::{load_config, Config, ConfigError};
pub use detection::{Detection, DetectionOutcome, FailureMonitor, FailureScorer, FrameScorer, ScorerSet, ScoringError};
pub use error::{FleetError, FleetResult};
pub use fleet::{load_manifest, FleetCoordinator, FleetManifest, SeedReport};
pub use inventory::InventoryLedger;
pub use print_job::JobLifecycleManager;
pub use printer::PrinterRegistry;
pub use store::{FleetState, FleetStore, FleetView, StorageError, UnitOfWork};
