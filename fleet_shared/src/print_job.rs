use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::EntityId;

/// `Queued -> Printing -> {Completed, Failed}`; the last two are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Printing,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Printing => "printing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, JobState::Queued | JobState::Printing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintJob {
    pub id: EntityId,
    pub job_code: String,
    pub printer_id: EntityId,
    pub spool_code: Option<String>,
    pub part_name: String,
    pub part_description: Option<String>,
    pub batch: Option<String>,
    pub operator: Option<String>,
    pub status: JobState,
    pub material_grams: Option<f64>,
    pub progress_percentage: f64,
    pub current_layer: u32,
    pub total_layers: Option<u32>,
    pub estimated_minutes: Option<u32>,
    pub actual_minutes: Option<i64>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PrintJob {
    /// Grams still to be drawn if the job runs to completion from its stored progress.
    pub fn outstanding_grams(&self) -> f64 {
        match self.material_grams {
            Some(total) => (total * (1.0 - self.progress_percentage / 100.0)).max(0.0),
            None => 0.0,
        }
    }

    /// True while this job holds its printer and spool.
    pub fn claims_resources(&self) -> bool {
        self.status == JobState::Printing
    }
}

/// Creation request for a job. Only `printer_id` and `part_name` are required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewJob {
    pub printer_id: EntityId,
    pub part_name: String,
    #[serde(default)]
    pub spool_code: Option<String>,
    #[serde(default)]
    pub material_grams: Option<f64>,
    #[serde(default)]
    pub part_description: Option<String>,
    #[serde(default)]
    pub batch: Option<String>,
    #[serde(default)]
    pub operator: Option<String>,
    #[serde(default)]
    pub estimated_minutes: Option<u32>,
    #[serde(default)]
    pub total_layers: Option<u32>,
}

impl NewJob {
    pub fn new(printer_id: EntityId, part_name: impl Into<String>) -> Self {
        Self {
            printer_id,
            part_name: part_name.into(),
            ..Default::default()
        }
    }

    pub fn with_spool(mut self, spool_code: impl Into<String>, material_grams: f64) -> Self {
        self.spool_code = Some(spool_code.into());
        self.material_grams = Some(material_grams);
        self
    }

    pub fn with_estimate(mut self, minutes: u32) -> Self {
        self.estimated_minutes = Some(minutes);
        self
    }
}
