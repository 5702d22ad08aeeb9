//! In-process persistence for the five fleet tables.
//!
//! [`FleetStore`] keeps the whole fleet state behind one async mutex.
//! [`FleetStore::begin`] takes the lock and hands back a [`UnitOfWork`]
//! holding a staged copy of the state. Operations read and write the staged
//! copy only; [`UnitOfWork::commit`] publishes it (writing the JSON snapshot
//! first when one is configured) and dropping the unit without committing
//! discards every staged write. The lock is held for the unit's whole
//! lifetime, so each operation's read-check-write sequence is serialized
//! against every other operation. Read-only queries use
//! [`FleetStore::read`], which borrows the published state without copying it.

use std::collections::BTreeMap;
use std::io::Write;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use fleet_shared::{EntityId, FailureEvent, InventoryAlert, PrintJob, Printer, Spool};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Snapshot encoding error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Unique constraint violated on {table}: '{key}'")]
    UniqueViolation { table: &'static str, key: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct IdCounters {
    printer: EntityId,
    spool: EntityId,
    job: EntityId,
    failure: EntityId,
    alert: EntityId,
}

fn bump(counter: &mut EntityId) -> EntityId {
    *counter += 1;
    *counter
}

/// The complete persisted state. Id counters live here so a rolled-back
/// operation never burns an id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FleetState {
    printers: BTreeMap<EntityId, Printer>,
    spools: BTreeMap<EntityId, Spool>,
    jobs: BTreeMap<EntityId, PrintJob>,
    failures: BTreeMap<EntityId, FailureEvent>,
    alerts: BTreeMap<EntityId, InventoryAlert>,
    next_ids: IdCounters,
}

impl FleetState {
    pub fn printer(&self, id: EntityId) -> Option<&Printer> {
        self.printers.get(&id)
    }

    pub fn printers(&self) -> impl Iterator<Item = &Printer> {
        self.printers.values()
    }

    pub fn spool_by_code(&self, code: &str) -> Option<&Spool> {
        self.spools.values().find(|s| s.spool_code == code)
    }

    pub fn spools(&self) -> impl Iterator<Item = &Spool> {
        self.spools.values()
    }

    pub fn job(&self, id: EntityId) -> Option<&PrintJob> {
        self.jobs.get(&id)
    }

    pub fn job_by_code(&self, code: &str) -> Option<&PrintJob> {
        self.jobs.values().find(|j| j.job_code == code)
    }

    pub fn jobs(&self) -> impl Iterator<Item = &PrintJob> {
        self.jobs.values()
    }

    pub fn failure(&self, id: EntityId) -> Option<&FailureEvent> {
        self.failures.get(&id)
    }

    pub fn failures(&self) -> impl Iterator<Item = &FailureEvent> {
        self.failures.values()
    }

    pub fn alert(&self, id: EntityId) -> Option<&InventoryAlert> {
        self.alerts.get(&id)
    }

    pub fn alerts(&self) -> impl Iterator<Item = &InventoryAlert> {
        self.alerts.values()
    }
}

pub struct FleetStore {
    state: Mutex<FleetState>,
    snapshot_path: Option<PathBuf>,
}

impl FleetStore {
    /// Memory-only store.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FleetState::default()),
            snapshot_path: None,
        }
    }

    /// Store backed by a JSON snapshot at `path`. An existing snapshot is
    /// loaded; a missing file starts an empty fleet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let state = if path.exists() {
            let bytes = std::fs::read(&path)?;
            let state: FleetState = serde_json::from_slice(&bytes)?;
            tracing::info!(
                "Loaded fleet snapshot from {} ({} printers, {} spools, {} jobs)",
                path.display(),
                state.printers.len(),
                state.spools.len(),
                state.jobs.len()
            );
            state
        } else {
            tracing::info!("No snapshot at {}, starting with an empty fleet", path.display());
            FleetState::default()
        };
        Ok(Self {
            state: Mutex::new(state),
            snapshot_path: Some(path),
        })
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    /// Borrow the published state for a read-only query. Waits until no
    /// unit of work is open.
    pub async fn read(&self) -> FleetView<'_> {
        FleetView {
            guard: self.state.lock().await,
        }
    }

    /// Open a unit of work. Waits until no other unit is open.
    pub async fn begin(&self) -> UnitOfWork<'_> {
        let guard = self.state.lock().await;
        let staged = guard.clone();
        UnitOfWork {
            guard,
            staged,
            snapshot_path: self.snapshot_path.as_deref(),
        }
    }
}

impl Default for FleetStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of the committed state.
pub struct FleetView<'a> {
    guard: MutexGuard<'a, FleetState>,
}

impl Deref for FleetView<'_> {
    type Target = FleetState;

    fn deref(&self) -> &FleetState {
        &self.guard
    }
}

/// One operation's view of the fleet. Dropping it without [`commit`](Self::commit)
/// rolls everything back.
pub struct UnitOfWork<'a> {
    guard: MutexGuard<'a, FleetState>,
    staged: FleetState,
    snapshot_path: Option<&'a Path>,
}

impl Deref for UnitOfWork<'_> {
    type Target = FleetState;

    fn deref(&self) -> &FleetState {
        &self.staged
    }
}

impl<'a> UnitOfWork<'a> {
    pub fn commit(mut self) -> Result<(), StorageError> {
        if let Some(path) = self.snapshot_path {
            if let Err(e) = write_snapshot(path, &self.staged) {
                tracing::error!("Snapshot write to {} failed, rolling back: {}", path.display(), e);
                return Err(e);
            }
        }
        *self.guard = std::mem::take(&mut self.staged);
        Ok(())
    }

    // --- printers ---

    pub(crate) fn printer_mut(&mut self, id: EntityId) -> Option<&mut Printer> {
        self.staged.printers.get_mut(&id)
    }

    pub(crate) fn insert_printer(&mut self, mut printer: Printer) -> Result<&Printer, StorageError> {
        if self.staged.printers.values().any(|p| p.serial_no == printer.serial_no) {
            return Err(StorageError::UniqueViolation { table: "printer", key: printer.serial_no });
        }
        let id = bump(&mut self.staged.next_ids.printer);
        printer.id = id;
        Ok(&*self.staged.printers.entry(id).or_insert(printer))
    }

    // --- spools ---

    pub(crate) fn spool_by_code_mut(&mut self, code: &str) -> Option<&mut Spool> {
        self.staged.spools.values_mut().find(|s| s.spool_code == code)
    }

    pub(crate) fn insert_spool(&mut self, mut spool: Spool) -> Result<&Spool, StorageError> {
        if self.spool_by_code(&spool.spool_code).is_some() {
            return Err(StorageError::UniqueViolation { table: "spool", key: spool.spool_code });
        }
        let id = bump(&mut self.staged.next_ids.spool);
        spool.id = id;
        Ok(&*self.staged.spools.entry(id).or_insert(spool))
    }

    // --- jobs ---

    pub(crate) fn job_by_code_mut(&mut self, code: &str) -> Option<&mut PrintJob> {
        self.staged.jobs.values_mut().find(|j| j.job_code == code)
    }

    pub(crate) fn insert_job(&mut self, mut job: PrintJob) -> Result<&PrintJob, StorageError> {
        if self.job_by_code(&job.job_code).is_some() {
            return Err(StorageError::UniqueViolation { table: "job", key: job.job_code });
        }
        let id = bump(&mut self.staged.next_ids.job);
        job.id = id;
        Ok(&*self.staged.jobs.entry(id).or_insert(job))
    }

    pub(crate) fn remove_job(&mut self, id: EntityId) -> Option<PrintJob> {
        self.staged.jobs.remove(&id)
    }

    // --- failure events ---

    pub(crate) fn failure_mut(&mut self, id: EntityId) -> Option<&mut FailureEvent> {
        self.staged.failures.get_mut(&id)
    }

    pub(crate) fn insert_failure(&mut self, mut event: FailureEvent) -> &FailureEvent {
        let id = bump(&mut self.staged.next_ids.failure);
        event.id = id;
        self.staged.failures.entry(id).or_insert(event)
    }

    // --- inventory alerts ---

    pub(crate) fn alert_mut(&mut self, id: EntityId) -> Option<&mut InventoryAlert> {
        self.staged.alerts.get_mut(&id)
    }

    pub(crate) fn insert_alert(&mut self, mut alert: InventoryAlert) -> &InventoryAlert {
        let id = bump(&mut self.staged.next_ids.alert);
        alert.id = id;
        self.staged.alerts.entry(id).or_insert(alert)
    }
}

/// Atomically replace the snapshot: write a sibling temp file, then rename over.
fn write_snapshot(path: &Path, state: &FleetState) -> Result<(), StorageError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let bytes = serde_json::to_vec_pretty(state)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(&bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StorageError::Io(e.error))?;
    tracing::debug!("Wrote fleet snapshot to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fleet_shared::PrinterStatus;
    use tempfile::tempdir;

    fn printer(serial: &str) -> Printer {
        let now = Utc::now();
        Printer {
            id: 0,
            serial_no: serial.to_string(),
            machine_name: format!("machine {}", serial),
            status: PrinterStatus::Idle,
            is_active: true,
            location: None,
            model: None,
            max_bed_temp: None,
            max_nozzle_temp: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn dropped_unit_rolls_back() {
        let store = FleetStore::new();
        {
            let mut uow = store.begin().await;
            uow.insert_printer(printer("SN-1")).unwrap();
            // dropped without commit
        }
        let uow = store.begin().await;
        assert_eq!(uow.printers().count(), 0);
    }

    #[tokio::test]
    async fn committed_unit_is_visible_and_ids_are_not_burned_by_rollback() {
        let store = FleetStore::new();
        {
            let mut uow = store.begin().await;
            uow.insert_printer(printer("SN-1")).unwrap();
        }
        let mut uow = store.begin().await;
        let id = uow.insert_printer(printer("SN-2")).unwrap().id;
        uow.commit().unwrap();
        assert_eq!(id, 1);
        let uow = store.begin().await;
        assert_eq!(uow.printer(1).unwrap().serial_no, "SN-2");
    }

    #[tokio::test]
    async fn read_view_sees_only_committed_state() {
        let store = FleetStore::new();
        {
            let mut uow = store.begin().await;
            uow.insert_printer(printer("SN-1")).unwrap();
        }
        assert_eq!(store.read().await.printers().count(), 0);

        let mut uow = store.begin().await;
        uow.insert_printer(printer("SN-2")).unwrap();
        uow.commit().unwrap();

        let view = store.read().await;
        let first = view.printer(1).unwrap();
        assert_eq!(first.serial_no, "SN-2");
        assert!(std::ptr::eq(first, view.printers().next().unwrap()));
        drop(view);

        // the view releases the lock so writers can proceed
        let mut uow = store.begin().await;
        uow.insert_printer(printer("SN-3")).unwrap();
        uow.commit().unwrap();
        assert_eq!(store.read().await.printers().count(), 2);
    }

    #[tokio::test]
    async fn serial_uniqueness_enforced() {
        let store = FleetStore::new();
        let mut uow = store.begin().await;
        uow.insert_printer(printer("SN-1")).unwrap();
        let err = uow.insert_printer(printer("SN-1")).unwrap_err();
        assert!(matches!(err, StorageError::UniqueViolation { table: "printer", .. }));
    }

    #[tokio::test]
    async fn snapshot_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fleet.json");
        {
            let store = FleetStore::open(&path).unwrap();
            let mut uow = store.begin().await;
            uow.insert_printer(printer("SN-9")).unwrap();
            uow.commit().unwrap();
        }
        let reopened = FleetStore::open(&path).unwrap();
        let uow = reopened.begin().await;
        assert_eq!(uow.printers().next().unwrap().serial_no, "SN-9");
    }

    #[tokio::test]
    async fn failed_snapshot_write_leaves_state_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("fleet.json");
        let store = FleetStore::open(&path).unwrap();
        let mut uow = store.begin().await;
        uow.insert_printer(printer("SN-1")).unwrap();
        assert!(matches!(uow.commit(), Err(StorageError::Io(_))));
        let uow = store.begin().await;
        assert_eq!(uow.printers().count(), 0);
    }
}
