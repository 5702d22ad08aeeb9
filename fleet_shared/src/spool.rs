use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::EntityId;

/// A reel of filament. `total_weight_g` never changes after creation and
/// `remaining_weight_g` only ever goes down, bottoming out at zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spool {
    pub id: EntityId,
    pub spool_code: String,
    pub material_type: String,
    pub color: Option<String>,
    pub brand: Option<String>,
    pub total_weight_g: f64,
    pub remaining_weight_g: f64,
    pub usage_percentage: f64,
    pub is_active: bool,
    pub is_low_inventory: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Spool {
    /// Fraction of the spool still on the reel, in [0, 1].
    pub fn remaining_fraction(&self) -> f64 {
        if self.total_weight_g <= 0.0 {
            return 0.0;
        }
        self.remaining_weight_g / self.total_weight_g
    }

    /// Removes `grams` from the reel and refreshes the derived fields from the
    /// new remaining weight. Returns true when this call flipped the spool
    /// into low inventory.
    pub fn draw_down(&mut self, grams: f64, low_threshold: f64) -> bool {
        self.remaining_weight_g = (self.remaining_weight_g - grams).max(0.0);
        self.usage_percentage = if self.total_weight_g > 0.0 {
            (self.total_weight_g - self.remaining_weight_g) / self.total_weight_g
        } else {
            0.0
        };
        let was_low = self.is_low_inventory;
        self.is_low_inventory = self.remaining_fraction() <= low_threshold;
        self.is_low_inventory && !was_low
    }
}

/// Creation request for a spool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewSpool {
    pub spool_code: String,
    pub material_type: String,
    pub total_weight_g: f64,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
}

impl NewSpool {
    pub fn new(spool_code: impl Into<String>, material_type: impl Into<String>, total_weight_g: f64) -> Self {
        Self {
            spool_code: spool_code.into(),
            material_type: material_type.into(),
            total_weight_g,
            ..Default::default()
        }
    }
}
