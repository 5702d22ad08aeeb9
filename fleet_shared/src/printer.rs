use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrinterStatus {
    Idle,
    Printing,
    Error,
    Maintenance,
}

impl PrinterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrinterStatus::Idle => "idle",
            PrinterStatus::Printing => "printing",
            PrinterStatus::Error => "error",
            PrinterStatus::Maintenance => "maintenance",
        }
    }
}

impl fmt::Display for PrinterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A machine in the fleet. Thermal limits are fixed at registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Printer {
    pub id: EntityId,
    pub serial_no: String,
    pub machine_name: String,
    pub status: PrinterStatus,
    pub is_active: bool,
    pub location: Option<String>,
    pub model: Option<String>,
    pub max_bed_temp: Option<f64>,
    pub max_nozzle_temp: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Printer {
    pub fn is_available(&self) -> bool {
        self.status == PrinterStatus::Idle && self.is_active
    }
}

/// Registration request for a printer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewPrinter {
    pub serial_no: String,
    pub machine_name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub max_bed_temp: Option<f64>,
    #[serde(default)]
    pub max_nozzle_temp: Option<f64>,
}

impl NewPrinter {
    pub fn new(serial_no: impl Into<String>, machine_name: impl Into<String>) -> Self {
        Self {
            serial_no: serial_no.into(),
            machine_name: machine_name.into(),
            ..Default::default()
        }
    }
}
