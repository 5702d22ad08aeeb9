// src/fleet.rs - Coordinator facade wiring store, clock and components
use std::sync::Arc;

use fleet_shared::api_models::{FleetSnapshot, FleetSummary};
use fleet_shared::{Clock, JobState, NewPrinter, NewSpool, PrinterStatus, SystemClock};
use serde::{Deserialize, Serialize};

use crate::config::{Config, ConfigError, DetectionConfig};
use crate::detection::{FailureMonitor, FrameScorer};
use crate::error::FleetResult;
use crate::inventory::InventoryLedger;
use crate::print_job::JobLifecycleManager;
use crate::printer::PrinterRegistry;
use crate::store::{FleetStore, StorageError};

/// Printers and spools to make sure exist at startup.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FleetManifest {
    #[serde(default)]
    pub printers: Vec<NewPrinter>,
    #[serde(default)]
    pub spools: Vec<NewSpool>,
}

pub fn load_manifest(path: &str) -> Result<FleetManifest, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            tracing::error!("Failed to read fleet manifest '{}': {}", path, e);
            return Err(ConfigError::Io(e));
        }
    };
    toml::from_str(&contents).map_err(|e| {
        tracing::error!("Failed to parse fleet manifest TOML: {}", e);
        ConfigError::Toml(e)
    })
}

/// Counts of what [`FleetCoordinator::seed`] actually inserted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub printers_added: usize,
    pub spools_added: usize,
    pub skipped: usize,
}

pub struct FleetCoordinator {
    store: Arc<FleetStore>,
    clock: Arc<dyn Clock>,
    printers: PrinterRegistry,
    inventory: InventoryLedger,
    jobs: JobLifecycleManager,
    detection: DetectionConfig,
}

impl FleetCoordinator {
    /// Build from configuration with the system clock, opening the snapshot
    /// file when one is configured.
    pub fn new(config: &Config) -> Result<Self, StorageError> {
        let store = match &config.storage.snapshot_path {
            Some(path) => FleetStore::open(path)?,
            None => FleetStore::new(),
        };
        Ok(Self::with_parts(Arc::new(store), Arc::new(SystemClock), config))
    }

    pub fn with_parts(store: Arc<FleetStore>, clock: Arc<dyn Clock>, config: &Config) -> Self {
        let printers = PrinterRegistry::new(store.clone(), clock.clone());
        let inventory = InventoryLedger::new(store.clone(), clock.clone(), config.inventory.clone());
        let jobs = JobLifecycleManager::new(store.clone(), clock.clone(), printers.clone(), inventory.clone());
        Self {
            store,
            clock,
            printers,
            inventory,
            jobs,
            detection: config.detection.clone(),
        }
    }

    pub fn printers(&self) -> &PrinterRegistry {
        &self.printers
    }

    pub fn inventory(&self) -> &InventoryLedger {
        &self.inventory
    }

    pub fn jobs(&self) -> &JobLifecycleManager {
        &self.jobs
    }

    /// A failure monitor over this fleet using the given scorer.
    pub fn monitor(&self, scorer: Arc<dyn FrameScorer>) -> FailureMonitor {
        FailureMonitor::new(
            self.store.clone(),
            self.clock.clone(),
            self.jobs.clone(),
            scorer,
            self.detection.clone(),
        )
    }

    /// Register whatever the manifest lists that is not already present.
    /// All inserts commit together or not at all.
    pub async fn seed(&self, manifest: FleetManifest) -> FleetResult<SeedReport> {
        let mut report = SeedReport::default();
        let mut uow = self.store.begin().await;
        for printer in manifest.printers {
            if uow.printers().any(|p| p.serial_no == printer.serial_no) {
                tracing::debug!("Printer {} already registered", printer.serial_no);
                report.skipped += 1;
                continue;
            }
            self.printers.register_in(&mut uow, printer)?;
            report.printers_added += 1;
        }
        for spool in manifest.spools {
            if uow.spool_by_code(&spool.spool_code).is_some() {
                tracing::debug!("Spool {} already stocked", spool.spool_code);
                report.skipped += 1;
                continue;
            }
            self.inventory.create_spool_in(&mut uow, spool)?;
            report.spools_added += 1;
        }
        uow.commit()?;
        tracing::info!(
            "Seeded fleet: {} printers, {} spools added ({} already present)",
            report.printers_added,
            report.spools_added,
            report.skipped
        );
        Ok(report)
    }

    /// One consistent read of the whole fleet for dashboards.
    pub async fn snapshot(&self) -> FleetSnapshot {
        let view = self.store.read().await;
        let printers: Vec<_> = view.printers().cloned().collect();
        let spools: Vec<_> = view.spools().cloned().collect();
        let active_jobs: Vec<_> = view.jobs().filter(|j| j.status.is_active()).cloned().collect();

        let count_printers = |status: PrinterStatus| printers.iter().filter(|p| p.status == status).count();
        let count_jobs = |status: JobState| active_jobs.iter().filter(|j| j.status == status).count();
        let summary = FleetSummary {
            printers_idle: count_printers(PrinterStatus::Idle),
            printers_printing: count_printers(PrinterStatus::Printing),
            printers_error: count_printers(PrinterStatus::Error),
            printers_maintenance: count_printers(PrinterStatus::Maintenance),
            jobs_queued: count_jobs(JobState::Queued),
            jobs_printing: count_jobs(JobState::Printing),
            low_inventory_spools: spools.iter().filter(|s| s.is_low_inventory).count(),
            locked_spools: spools.iter().filter(|s| !s.is_active).count(),
        };

        FleetSnapshot {
            taken_at: self.clock.now(),
            unresolved_alerts: view.alerts().filter(|a| !a.is_resolved).cloned().collect(),
            unresolved_failures: view.failures().filter(|e| !e.resolved).cloned().collect(),
            printers,
            spools,
            active_jobs,
            summary,
        }
    }
}
