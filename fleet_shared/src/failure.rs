use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::EntityId;

/// Record of a forced failure. Only created alongside the job's transition to failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureEvent {
    pub id: EntityId,
    pub job_id: EntityId,
    pub failure_type: String,
    pub confidence_score: f32,
    pub image_ref: Option<String>,
    pub description: String,
    pub detected_at: DateTime<Utc>,
    pub resolved: bool,
}
