// src/printer.rs - Printer availability registry
use std::sync::Arc;

use fleet_shared::{Clock, EntityId, NewPrinter, Printer, PrinterStatus};

use crate::error::{FleetError, FleetResult};
use crate::store::{FleetState, FleetStore, UnitOfWork};

/// Owns every write to printer records.
///
/// The `*_in` methods run inside a caller's [`UnitOfWork`]; the async
/// methods open and commit their own. A printer only enters or leaves
/// `printing` through the job lifecycle, so the operator-facing methods
/// refuse to touch a printer that is currently printing.
#[derive(Clone)]
pub struct PrinterRegistry {
    store: Arc<FleetStore>,
    clock: Arc<dyn Clock>,
}

impl PrinterRegistry {
    pub fn new(store: Arc<FleetStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn get_in<'u>(&self, state: &'u FleetState, id: EntityId) -> FleetResult<&'u Printer> {
        state.printer(id).ok_or_else(|| FleetError::not_found("printer", id))
    }

    pub fn is_available_in(&self, state: &FleetState, id: EntityId) -> FleetResult<bool> {
        Ok(self.get_in(state, id)?.is_available())
    }

    /// Unchecked status write for the job lifecycle (claim, release, error).
    pub(crate) fn set_status_in(&self, uow: &mut UnitOfWork<'_>, id: EntityId, status: PrinterStatus) -> FleetResult<()> {
        let now = self.clock.now();
        let printer = uow.printer_mut(id).ok_or_else(|| FleetError::not_found("printer", id))?;
        if printer.status != status {
            tracing::info!("Printer {} ({}): {} -> {}", printer.id, printer.serial_no, printer.status, status);
        }
        printer.status = status;
        printer.updated_at = now;
        Ok(())
    }

    pub fn register_in(&self, uow: &mut UnitOfWork<'_>, new: NewPrinter) -> FleetResult<Printer> {
        if new.serial_no.trim().is_empty() {
            return Err(FleetError::Validation("printer serial number must not be empty".to_string()));
        }
        if new.machine_name.trim().is_empty() {
            return Err(FleetError::Validation("printer machine name must not be empty".to_string()));
        }
        for (name, limit) in [("max_bed_temp", new.max_bed_temp), ("max_nozzle_temp", new.max_nozzle_temp)] {
            if let Some(value) = limit {
                if !value.is_finite() || value <= 0.0 {
                    return Err(FleetError::Validation(format!("{} must be a positive temperature, got {}", name, value)));
                }
            }
        }
        let now = self.clock.now();
        let printer = uow.insert_printer(Printer {
            id: 0,
            serial_no: new.serial_no,
            machine_name: new.machine_name,
            status: PrinterStatus::Idle,
            is_active: true,
            location: new.location,
            model: new.model,
            max_bed_temp: new.max_bed_temp,
            max_nozzle_temp: new.max_nozzle_temp,
            created_at: now,
            updated_at: now,
        })?;
        tracing::info!("Registered printer {} ({})", printer.id, printer.serial_no);
        Ok(printer.clone())
    }

    pub async fn register(&self, new: NewPrinter) -> FleetResult<Printer> {
        let mut uow = self.store.begin().await;
        let printer = self.register_in(&mut uow, new)?;
        uow.commit()?;
        Ok(printer)
    }

    pub async fn get(&self, id: EntityId) -> FleetResult<Printer> {
        let view = self.store.read().await;
        self.get_in(&view, id).cloned()
    }

    pub async fn is_available(&self, id: EntityId) -> FleetResult<bool> {
        let view = self.store.read().await;
        self.is_available_in(&view, id)
    }

    /// Active printers only.
    pub async fn list(&self) -> Vec<Printer> {
        let view = self.store.read().await;
        view.printers().filter(|p| p.is_active).cloned().collect()
    }

    pub async fn list_all(&self) -> Vec<Printer> {
        let view = self.store.read().await;
        view.printers().cloned().collect()
    }

    /// Operator status change (maintenance windows, clearing errors).
    pub async fn set_status(&self, id: EntityId, status: PrinterStatus) -> FleetResult<Printer> {
        let mut uow = self.store.begin().await;
        let current = self.get_in(&uow, id)?.status;
        if status == PrinterStatus::Printing {
            return Err(FleetError::InvalidState(format!(
                "printer {} can only enter printing by starting a job",
                id
            )));
        }
        if current == PrinterStatus::Printing {
            return Err(FleetError::InvalidState(format!(
                "printer {} is printing; complete or fail its job first",
                id
            )));
        }
        self.set_status_in(&mut uow, id, status)?;
        let printer = self.get_in(&uow, id)?.clone();
        uow.commit()?;
        Ok(printer)
    }

    /// Return a printer to service (e.g. after a forced failure left it in `error`).
    pub async fn activate(&self, id: EntityId) -> FleetResult<Printer> {
        self.set_status(id, PrinterStatus::Idle).await
    }

    /// Retire or reinstate a printer. A printing printer cannot be retired.
    pub async fn set_active(&self, id: EntityId, active: bool) -> FleetResult<Printer> {
        let mut uow = self.store.begin().await;
        let now = self.clock.now();
        let printer = uow.printer_mut(id).ok_or_else(|| FleetError::not_found("printer", id))?;
        if !active && printer.status == PrinterStatus::Printing {
            return Err(FleetError::InvalidState(format!("printer {} is printing and cannot be retired", id)));
        }
        printer.is_active = active;
        printer.updated_at = now;
        let printer = printer.clone();
        uow.commit()?;
        tracing::info!("Printer {} ({}) active={}", printer.id, printer.serial_no, active);
        Ok(printer)
    }
}
