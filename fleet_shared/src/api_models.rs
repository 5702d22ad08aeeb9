//! Read models handed to the presentation collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{FailureEvent, InventoryAlert, PrintJob, Printer, Spool};

/// Everything a dashboard poll needs, captured from one consistent view of the store.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FleetSnapshot {
    pub taken_at: DateTime<Utc>,
    pub printers: Vec<Printer>,
    pub spools: Vec<Spool>,
    /// Jobs that are queued or printing.
    pub active_jobs: Vec<PrintJob>,
    pub unresolved_alerts: Vec<InventoryAlert>,
    pub unresolved_failures: Vec<FailureEvent>,
    pub summary: FleetSummary,
}

/// Headline counts for the snapshot.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct FleetSummary {
    pub printers_idle: usize,
    pub printers_printing: usize,
    pub printers_error: usize,
    pub printers_maintenance: usize,
    pub jobs_queued: usize,
    pub jobs_printing: usize,
    pub low_inventory_spools: usize,
    pub locked_spools: usize,
}
