//! Material ledger: spool accounting and deduplicated inventory alerts.
//!
//! Every spool write goes through [`InventoryLedger`]. Consumption recomputes
//! the derived fields from the post-write remaining weight and raises alerts
//! through [`InventoryLedger::ensure_alert_in`], which never opens a second
//! unresolved alert of the same kind for the same spool. Because the check
//! and the insert happen inside the caller's [`UnitOfWork`], and units are
//! serialized by the store lock, the dedup cannot race.

use std::sync::Arc;

use fleet_shared::{AlertType, Clock, EntityId, InventoryAlert, JobState, NewSpool, Spool};

use crate::config::InventoryConfig;
use crate::error::{FleetError, FleetResult};
use crate::store::{FleetState, FleetStore, UnitOfWork};

#[derive(Clone)]
pub struct InventoryLedger {
    store: Arc<FleetStore>,
    clock: Arc<dyn Clock>,
    config: InventoryConfig,
}

impl InventoryLedger {
    pub fn new(store: Arc<FleetStore>, clock: Arc<dyn Clock>, config: InventoryConfig) -> Self {
        Self { store, clock, config }
    }

    pub fn alert_threshold(&self) -> f64 {
        self.config.alert_threshold
    }

    pub fn get_in<'u>(&self, state: &'u FleetState, spool_code: &str) -> FleetResult<&'u Spool> {
        state.spool_by_code(spool_code).ok_or_else(|| FleetError::not_found("spool", spool_code))
    }

    pub fn create_spool_in(&self, uow: &mut UnitOfWork<'_>, new: NewSpool) -> FleetResult<Spool> {
        if new.spool_code.trim().is_empty() {
            return Err(FleetError::Validation("spool code must not be empty".to_string()));
        }
        if new.material_type.trim().is_empty() {
            return Err(FleetError::Validation("spool material type must not be empty".to_string()));
        }
        if !new.total_weight_g.is_finite() || new.total_weight_g <= 0.0 {
            return Err(FleetError::Validation(format!(
                "spool total weight must be a positive number of grams, got {}",
                new.total_weight_g
            )));
        }
        let now = self.clock.now();
        let spool = uow.insert_spool(Spool {
            id: 0,
            spool_code: new.spool_code,
            material_type: new.material_type,
            color: new.color,
            brand: new.brand,
            total_weight_g: new.total_weight_g,
            remaining_weight_g: new.total_weight_g,
            usage_percentage: 0.0,
            is_active: true,
            is_low_inventory: false,
            created_at: now,
            updated_at: now,
        })?;
        tracing::info!("Created spool {} ({}, {:.1}g)", spool.spool_code, spool.material_type, spool.total_weight_g);
        Ok(spool.clone())
    }

    /// Draw `grams` from a spool, then raise whatever alerts the new level calls for.
    pub fn consume_material_in(&self, uow: &mut UnitOfWork<'_>, spool_code: &str, grams: f64) -> FleetResult<Spool> {
        if !grams.is_finite() || grams < 0.0 {
            return Err(FleetError::Validation(format!("material usage must be >= 0 grams, got {}", grams)));
        }
        let now = self.clock.now();
        let threshold = self.config.alert_threshold;
        let spool = uow
            .spool_by_code_mut(spool_code)
            .ok_or_else(|| FleetError::not_found("spool", spool_code))?;
        let became_low = spool.draw_down(grams, threshold);
        spool.updated_at = now;
        let spool = spool.clone();
        tracing::info!(
            "Updated spool {}: {:.1}g remaining ({:.1}%)",
            spool.spool_code,
            spool.remaining_weight_g,
            spool.remaining_fraction() * 100.0
        );

        if became_low {
            let remaining = spool.remaining_fraction();
            self.ensure_alert_in(
                uow,
                spool_code,
                AlertType::LowInventory,
                format!(
                    "Spool {} ({}) is running low: {:.1}% remaining",
                    spool.spool_code,
                    spool.material_type,
                    remaining * 100.0
                ),
                Some(threshold),
                Some(remaining),
            )?;
        }

        let short: Vec<f64> = uow
            .jobs()
            .filter(|j| j.status == JobState::Printing && j.spool_code.as_deref() == Some(spool_code))
            .map(|j| j.outstanding_grams())
            .filter(|needed| spool.remaining_weight_g < *needed)
            .collect();
        for needed in short {
            self.ensure_insufficient_in(uow, &spool, needed)?;
        }
        Ok(spool)
    }

    /// Raise `insufficient_material` for a spool that cannot cover `needed` grams.
    pub(crate) fn ensure_insufficient_in(&self, uow: &mut UnitOfWork<'_>, spool: &Spool, needed: f64) -> FleetResult<()> {
        let total = spool.total_weight_g.max(f64::EPSILON);
        self.ensure_alert_in(
            uow,
            &spool.spool_code,
            AlertType::InsufficientMaterial,
            format!(
                "Spool {} may not complete job: {:.1}g left, needs {:.1}g",
                spool.spool_code, spool.remaining_weight_g, needed
            ),
            Some(needed / total),
            Some(spool.remaining_weight_g / total),
        )?;
        Ok(())
    }

    /// Insert an alert unless an unresolved one of the same type already exists
    /// for this spool. Returns the new alert, or `None` when deduplicated.
    pub fn ensure_alert_in(
        &self,
        uow: &mut UnitOfWork<'_>,
        spool_code: &str,
        alert_type: AlertType,
        message: String,
        threshold_percentage: Option<f64>,
        current_percentage: Option<f64>,
    ) -> FleetResult<Option<InventoryAlert>> {
        self.get_in(uow, spool_code)?;
        if uow.alerts().any(|a| a.is_open_for(spool_code, alert_type)) {
            tracing::debug!("Alert {} already open for spool {}", alert_type, spool_code);
            return Ok(None);
        }
        let alert = uow.insert_alert(InventoryAlert {
            id: 0,
            spool_code: spool_code.to_string(),
            alert_type,
            threshold_percentage: threshold_percentage.unwrap_or(0.0),
            current_percentage: current_percentage.unwrap_or(0.0),
            message,
            is_resolved: false,
            created_at: self.clock.now(),
            resolved_at: None,
        });
        tracing::warn!("Created {} alert {} for spool {}: {}", alert.alert_type, alert.id, spool_code, alert.message);
        Ok(Some(alert.clone()))
    }

    pub fn resolve_alert_in(&self, uow: &mut UnitOfWork<'_>, alert_id: EntityId) -> FleetResult<InventoryAlert> {
        let now = self.clock.now();
        let alert = uow.alert_mut(alert_id).ok_or_else(|| FleetError::not_found("alert", alert_id))?;
        if !alert.is_resolved {
            alert.is_resolved = true;
            alert.resolved_at = Some(now);
            tracing::info!("Resolved alert {}", alert_id);
        }
        Ok(alert.clone())
    }

    pub(crate) fn set_active_in(&self, uow: &mut UnitOfWork<'_>, spool_code: &str, active: bool) -> FleetResult<Spool> {
        let now = self.clock.now();
        let spool = uow
            .spool_by_code_mut(spool_code)
            .ok_or_else(|| FleetError::not_found("spool", spool_code))?;
        if spool.is_active != active {
            tracing::info!("Spool {} active: {} -> {}", spool_code, spool.is_active, active);
        }
        spool.is_active = active;
        spool.updated_at = now;
        Ok(spool.clone())
    }

    // --- operations with their own unit of work ---

    pub async fn create_spool(&self, new: NewSpool) -> FleetResult<Spool> {
        let mut uow = self.store.begin().await;
        let spool = self.create_spool_in(&mut uow, new)?;
        uow.commit()?;
        Ok(spool)
    }

    /// Manual usage correction outside any job.
    pub async fn consume_material(&self, spool_code: &str, grams: f64) -> FleetResult<Spool> {
        let mut uow = self.store.begin().await;
        let spool = self.consume_material_in(&mut uow, spool_code, grams)?;
        uow.commit()?;
        Ok(spool)
    }

    pub async fn ensure_alert(
        &self,
        spool_code: &str,
        alert_type: AlertType,
        message: String,
        threshold_percentage: Option<f64>,
        current_percentage: Option<f64>,
    ) -> FleetResult<Option<InventoryAlert>> {
        let mut uow = self.store.begin().await;
        let alert = self.ensure_alert_in(&mut uow, spool_code, alert_type, message, threshold_percentage, current_percentage)?;
        uow.commit()?;
        Ok(alert)
    }

    pub async fn resolve_alert(&self, alert_id: EntityId) -> FleetResult<InventoryAlert> {
        let mut uow = self.store.begin().await;
        let alert = self.resolve_alert_in(&mut uow, alert_id)?;
        uow.commit()?;
        Ok(alert)
    }

    /// Operator release of a spool, e.g. after a forced failure locked it.
    pub async fn activate_spool(&self, spool_code: &str) -> FleetResult<Spool> {
        let mut uow = self.store.begin().await;
        let spool = self.set_active_in(&mut uow, spool_code, true)?;
        uow.commit()?;
        Ok(spool)
    }

    pub async fn deactivate_spool(&self, spool_code: &str) -> FleetResult<Spool> {
        let mut uow = self.store.begin().await;
        let spool = self.set_active_in(&mut uow, spool_code, false)?;
        uow.commit()?;
        Ok(spool)
    }

    pub async fn get_by_spool_code(&self, spool_code: &str) -> FleetResult<Spool> {
        let view = self.store.read().await;
        self.get_in(&view, spool_code).cloned()
    }

    pub async fn list_active(&self) -> Vec<Spool> {
        let view = self.store.read().await;
        view.spools().filter(|s| s.is_active).cloned().collect()
    }

    pub async fn list_all(&self) -> Vec<Spool> {
        let view = self.store.read().await;
        view.spools().cloned().collect()
    }

    pub async fn list_low_inventory(&self) -> Vec<Spool> {
        let view = self.store.read().await;
        view.spools().filter(|s| s.is_low_inventory).cloned().collect()
    }

    pub async fn list_unresolved_alerts(&self) -> Vec<InventoryAlert> {
        let view = self.store.read().await;
        view.alerts().filter(|a| !a.is_resolved).cloned().collect()
    }

    pub async fn list_alerts(&self) -> Vec<InventoryAlert> {
        let view = self.store.read().await;
        view.alerts().cloned().collect()
    }

    pub async fn alerts_for_spool(&self, spool_code: &str) -> Vec<InventoryAlert> {
        let view = self.store.read().await;
        view.alerts().filter(|a| a.spool_code == spool_code).cloned().collect()
    }
}
