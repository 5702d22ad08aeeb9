use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    LowInventory,
    InsufficientMaterial,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::LowInventory => "low_inventory",
            AlertType::InsufficientMaterial => "insufficient_material",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// At most one unresolved alert exists per `(spool_code, alert_type)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryAlert {
    pub id: EntityId,
    pub spool_code: String,
    pub alert_type: AlertType,
    pub threshold_percentage: f64,
    pub current_percentage: f64,
    pub message: String,
    pub is_resolved: bool,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl InventoryAlert {
    pub fn is_open_for(&self, spool_code: &str, alert_type: AlertType) -> bool {
        !self.is_resolved && self.alert_type == alert_type && self.spool_code == spool_code
    }
}
