// src/print_job.rs - Job lifecycle: queued -> printing -> completed | failed
use std::sync::Arc;

use chrono::{DateTime, Utc};
use fleet_shared::{AlertType, Clock, EntityId, FailureEvent, JobState, NewJob, PrintJob, PrinterStatus};

use crate::error::{FleetError, FleetResult};
use crate::inventory::InventoryLedger;
use crate::printer::PrinterRegistry;
use crate::store::{FleetState, FleetStore, UnitOfWork};

/// `JOB_` followed by eight upper-case hex digits.
fn new_job_code() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("JOB_{}", hex[..8].to_uppercase())
}

fn elapsed_minutes(start: Option<DateTime<Utc>>, end: DateTime<Utc>) -> Option<i64> {
    start.map(|start| ((end - start).num_seconds() as f64 / 60.0).round() as i64)
}

/// Owns the job state machine. Every public operation runs as one unit of
/// work; printer and spool records are only touched through
/// [`PrinterRegistry`] and [`InventoryLedger`].
#[derive(Clone)]
pub struct JobLifecycleManager {
    store: Arc<FleetStore>,
    clock: Arc<dyn Clock>,
    printers: PrinterRegistry,
    inventory: InventoryLedger,
}

impl JobLifecycleManager {
    pub fn new(store: Arc<FleetStore>, clock: Arc<dyn Clock>, printers: PrinterRegistry, inventory: InventoryLedger) -> Self {
        Self { store, clock, printers, inventory }
    }

    pub fn printers(&self) -> &PrinterRegistry {
        &self.printers
    }

    pub fn inventory(&self) -> &InventoryLedger {
        &self.inventory
    }

    pub fn get_in<'u>(&self, state: &'u FleetState, job_code: &str) -> FleetResult<&'u PrintJob> {
        state.job_by_code(job_code).ok_or_else(|| FleetError::not_found("job", job_code))
    }

    fn job_mut<'u>(&self, uow: &'u mut UnitOfWork<'_>, job_code: &str) -> FleetResult<&'u mut PrintJob> {
        uow.job_by_code_mut(job_code).ok_or_else(|| FleetError::not_found("job", job_code))
    }

    fn require_printing(job: &PrintJob, action: &str) -> FleetResult<()> {
        if job.status != JobState::Printing {
            return Err(FleetError::InvalidState(format!(
                "cannot {} job {}: status is {}",
                action, job.job_code, job.status
            )));
        }
        Ok(())
    }

    /// Queue a job. The printer must be free now; the spool only has to exist,
    /// since feasibility is checked again at start.
    pub async fn create_job(&self, new: NewJob) -> FleetResult<PrintJob> {
        if new.part_name.trim().is_empty() {
            return Err(FleetError::Validation("part name must not be empty".to_string()));
        }
        if let Some(grams) = new.material_grams {
            if !grams.is_finite() || grams < 0.0 {
                return Err(FleetError::Validation(format!("material requirement must be >= 0 grams, got {}", grams)));
            }
        }
        if new.estimated_minutes == Some(0) {
            return Err(FleetError::Validation("estimated duration must be > 0 minutes".to_string()));
        }

        let mut uow = self.store.begin().await;
        let printer = self.printers.get_in(&uow, new.printer_id)?;
        if !printer.is_available() {
            return Err(FleetError::ResourceUnavailable(format!(
                "printer {} is not available (status: {}, active: {})",
                printer.id, printer.status, printer.is_active
            )));
        }
        if let Some(code) = new.spool_code.as_deref() {
            self.inventory.get_in(&uow, code)?;
        }

        let job_code = loop {
            let code = new_job_code();
            if uow.job_by_code(&code).is_none() {
                break code;
            }
        };
        let now = self.clock.now();
        let job = uow
            .insert_job(PrintJob {
                id: 0,
                job_code,
                printer_id: new.printer_id,
                spool_code: new.spool_code,
                part_name: new.part_name,
                part_description: new.part_description,
                batch: new.batch,
                operator: new.operator,
                status: JobState::Queued,
                material_grams: new.material_grams,
                progress_percentage: 0.0,
                current_layer: 0,
                total_layers: new.total_layers,
                estimated_minutes: new.estimated_minutes,
                actual_minutes: None,
                start_time: None,
                end_time: None,
                created_at: now,
                updated_at: now,
            })?
            .clone();
        uow.commit()?;
        tracing::info!("Created job {} for printer {}", job.job_code, job.printer_id);
        Ok(job)
    }

    /// Claim the printer (and spool) and move the job to printing.
    ///
    /// A spool that cannot cover the job's requirement gets an
    /// `insufficient_material` alert, which is committed on its own before
    /// the refusal is returned.
    pub async fn start_job(&self, job_code: &str) -> FleetResult<PrintJob> {
        let mut uow = self.store.begin().await;
        let job = self.get_in(&uow, job_code)?.clone();
        if job.status != JobState::Queued {
            return Err(FleetError::InvalidState(format!(
                "job {} is not queued (status: {})",
                job_code, job.status
            )));
        }

        let printer = self.printers.get_in(&uow, job.printer_id)?;
        if !printer.is_available() {
            tracing::warn!("Refusing to start {}: printer {} is {}", job_code, printer.id, printer.status);
            return Err(FleetError::ResourceUnavailable(format!(
                "printer {} is occupied or unavailable (status: {}, active: {})",
                printer.id, printer.status, printer.is_active
            )));
        }

        if let Some(spool_code) = job.spool_code.as_deref() {
            let spool = self.inventory.get_in(&uow, spool_code)?.clone();
            if !spool.is_active {
                return Err(FleetError::ResourceUnavailable(format!(
                    "spool {} is inactive for job {}",
                    spool_code, job_code
                )));
            }
            if let Some(required) = job.material_grams {
                if spool.remaining_weight_g < required {
                    let total = spool.total_weight_g.max(f64::EPSILON);
                    self.inventory.ensure_alert_in(
                        &mut uow,
                        spool_code,
                        AlertType::InsufficientMaterial,
                        format!(
                            "Spool {} has {:.1}g, job requires {:.1}g",
                            spool_code, spool.remaining_weight_g, required
                        ),
                        Some(required / total),
                        Some(spool.remaining_weight_g / total),
                    )?;
                    uow.commit()?;
                    tracing::warn!("Refusing to start {}: spool {} has insufficient material", job_code, spool_code);
                    return Err(FleetError::ResourceUnavailable(format!(
                        "spool {} has insufficient material for job {} ({:.1}g left, {:.1}g required)",
                        spool_code, job_code, spool.remaining_weight_g, required
                    )));
                }
            }
            if let Some(holder) = uow
                .jobs()
                .find(|j| j.id != job.id && j.claims_resources() && j.spool_code.as_deref() == Some(spool_code))
            {
                return Err(FleetError::ResourceUnavailable(format!(
                    "spool {} already in use by job {}",
                    spool_code, holder.job_code
                )));
            }
        }

        let now = self.clock.now();
        let started = {
            let job = self.job_mut(&mut uow, job_code)?;
            job.status = JobState::Printing;
            job.start_time = Some(now);
            job.updated_at = now;
            job.clone()
        };
        self.printers.set_status_in(&mut uow, started.printer_id, PrinterStatus::Printing)?;
        uow.commit()?;
        tracing::info!("Started job {} on printer {}", job_code, started.printer_id);
        Ok(started)
    }

    /// Record progress, drawing material for any forward movement.
    ///
    /// Progress is clamped to [0, 100]. A backwards report is stored as-is
    /// and draws nothing; material already drawn is not returned.
    pub async fn update_progress(&self, job_code: &str, progress: f64, current_layer: Option<u32>) -> FleetResult<PrintJob> {
        if progress.is_nan() {
            return Err(FleetError::Validation(format!("progress for job {} is not a number", job_code)));
        }
        let new_progress = progress.clamp(0.0, 100.0);

        let mut uow = self.store.begin().await;
        let now = self.clock.now();
        let (job, previous) = {
            let job = self.job_mut(&mut uow, job_code)?;
            Self::require_printing(job, "update progress of")?;
            let previous = job.progress_percentage;
            // stored first so the ledger's scan sees the post-update requirement
            job.progress_percentage = new_progress;
            if let Some(layer) = current_layer {
                job.current_layer = layer;
            }
            job.updated_at = now;
            (job.clone(), previous)
        };

        let delta = new_progress - previous;
        if delta < 0.0 {
            tracing::warn!(
                "Job {} progress went backwards ({:.1}% -> {:.1}%); no material returned",
                job_code,
                previous,
                new_progress
            );
        }
        if delta > 0.0 {
            if let (Some(spool_code), Some(required)) = (job.spool_code.as_deref(), job.material_grams) {
                if required > 0.0 {
                    let spool = self.inventory.consume_material_in(&mut uow, spool_code, required * delta / 100.0)?;
                    let still_needed = job.outstanding_grams();
                    if spool.remaining_weight_g < still_needed {
                        self.inventory.ensure_insufficient_in(&mut uow, &spool, still_needed)?;
                    }
                }
            }
        }

        uow.commit()?;
        tracing::debug!("Job {} progress {:.1}%", job_code, new_progress);
        Ok(job)
    }

    /// Finish a printing job and free its printer. A successful job draws
    /// whatever share of its requirement progress reports had not covered.
    pub async fn complete_job(&self, job_code: &str, success: bool) -> FleetResult<PrintJob> {
        let mut uow = self.store.begin().await;
        let now = self.clock.now();
        let job = {
            let job = self.job_mut(&mut uow, job_code)?;
            Self::require_printing(job, "complete")?;
            job.status = if success { JobState::Completed } else { JobState::Failed };
            job.end_time = Some(now);
            job.actual_minutes = elapsed_minutes(job.start_time, now);
            job.updated_at = now;
            job.clone()
        };
        self.printers.set_status_in(&mut uow, job.printer_id, PrinterStatus::Idle)?;

        if success {
            if let (Some(spool_code), Some(_)) = (job.spool_code.as_deref(), job.material_grams) {
                let remainder = job.outstanding_grams();
                if remainder > 0.0 {
                    self.inventory.consume_material_in(&mut uow, spool_code, remainder)?;
                }
            }
        }

        uow.commit()?;
        tracing::info!("Completed job {} with status: {}", job_code, job.status);
        Ok(job)
    }

    /// Fail a printing job on the failure monitor's behalf: the printer is
    /// parked in `error` and the spool locked until an operator releases them.
    pub fn force_fail_in(
        &self,
        uow: &mut UnitOfWork<'_>,
        job_code: &str,
        category: &str,
        confidence: f32,
        image_ref: Option<String>,
    ) -> FleetResult<FailureEvent> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(FleetError::Validation(format!("confidence must be in [0, 1], got {}", confidence)));
        }
        let now = self.clock.now();
        let job = {
            let job = self.job_mut(uow, job_code)?;
            Self::require_printing(job, "force-fail")?;
            job.status = JobState::Failed;
            job.end_time = Some(now);
            job.actual_minutes = elapsed_minutes(job.start_time, now);
            job.updated_at = now;
            job.clone()
        };
        self.printers.set_status_in(uow, job.printer_id, PrinterStatus::Error)?;
        if let Some(spool_code) = job.spool_code.as_deref() {
            self.inventory.set_active_in(uow, spool_code, false)?;
        }
        let event = uow
            .insert_failure(FailureEvent {
                id: 0,
                job_id: job.id,
                failure_type: category.to_string(),
                confidence_score: confidence,
                image_ref,
                description: format!("Detected {} with {:.2} confidence", category, confidence),
                detected_at: now,
                resolved: false,
            })
            .clone();
        tracing::warn!("Failure detected for job {}: {} ({:.2})", job_code, category, confidence);
        Ok(event)
    }

    pub async fn force_fail(&self, job_code: &str, category: &str, confidence: f32, image_ref: Option<String>) -> FleetResult<FailureEvent> {
        let mut uow = self.store.begin().await;
        let event = self.force_fail_in(&mut uow, job_code, category, confidence, image_ref)?;
        uow.commit()?;
        Ok(event)
    }

    /// Remove a job that never started.
    pub async fn delete_job(&self, job_code: &str) -> FleetResult<()> {
        let mut uow = self.store.begin().await;
        let job = self.get_in(&uow, job_code)?;
        if job.status != JobState::Queued {
            return Err(FleetError::InvalidState(format!(
                "only queued jobs can be deleted; job {} is {}",
                job_code, job.status
            )));
        }
        let id = job.id;
        uow.remove_job(id);
        uow.commit()?;
        tracing::info!("Deleted queued job {}", job_code);
        Ok(())
    }

    pub async fn get(&self, job_code: &str) -> FleetResult<PrintJob> {
        let view = self.store.read().await;
        self.get_in(&view, job_code).cloned()
    }

    /// Jobs that are queued or printing.
    pub async fn list_active(&self) -> Vec<PrintJob> {
        let view = self.store.read().await;
        view.jobs().filter(|j| j.status.is_active()).cloned().collect()
    }

    pub async fn list_by_printer(&self, printer_id: EntityId) -> Vec<PrintJob> {
        let view = self.store.read().await;
        view.jobs().filter(|j| j.printer_id == printer_id).cloned().collect()
    }

    pub async fn list_all(&self) -> Vec<PrintJob> {
        let view = self.store.read().await;
        view.jobs().cloned().collect()
    }

    /// Failure events, optionally narrowed to one job. An unknown job code yields NotFound.
    pub async fn list_failure_events(&self, job_code: Option<&str>) -> FleetResult<Vec<FailureEvent>> {
        let view = self.store.read().await;
        let job_id = match job_code {
            Some(code) => Some(self.get_in(&view, code)?.id),
            None => None,
        };
        Ok(view
            .failures()
            .filter(|e| job_id.map_or(true, |id| e.job_id == id))
            .cloned()
            .collect())
    }

    /// Operator acknowledgement of a failure event.
    pub async fn resolve_failure_event(&self, event_id: EntityId) -> FleetResult<FailureEvent> {
        let mut uow = self.store.begin().await;
        let event = uow
            .failure_mut(event_id)
            .ok_or_else(|| FleetError::not_found("failure event", event_id))?;
        event.resolved = true;
        let event = event.clone();
        uow.commit()?;
        tracing::info!("Resolved failure event {}", event_id);
        Ok(event)
    }
}
