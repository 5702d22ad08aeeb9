// src/detection/mod.rs - Camera-frame failure monitor
pub mod scoring;

pub use scoring::{Detection, FailureScorer, FrameScorer, ScorerSet, ScoringError};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use fleet_shared::{Clock, FailureEvent, JobState, PrintJob};

use crate::config::DetectionConfig;
use crate::error::{FleetError, FleetResult};
use crate::print_job::JobLifecycleManager;
use crate::store::FleetStore;

#[derive(Debug, Clone)]
pub enum DetectionOutcome {
    /// The job was force-failed. `material_used_g` is the trailing usage
    /// charged to its spool before the failure was recorded.
    Failure { event: FailureEvent, material_used_g: f64 },
    /// Nothing crossed the threshold. `best` is the strongest detection seen.
    Negative { best: Option<Detection> },
}

impl DetectionOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, DetectionOutcome::Failure { .. })
    }
}

/// Turns scored camera frames into forced job failures.
pub struct FailureMonitor {
    store: Arc<FleetStore>,
    clock: Arc<dyn Clock>,
    jobs: JobLifecycleManager,
    scorer: Arc<dyn FrameScorer>,
    config: DetectionConfig,
}

impl FailureMonitor {
    pub fn new(
        store: Arc<FleetStore>,
        clock: Arc<dyn Clock>,
        jobs: JobLifecycleManager,
        scorer: Arc<dyn FrameScorer>,
        config: DetectionConfig,
    ) -> Self {
        Self { store, clock, jobs, scorer, config }
    }

    pub fn threshold(&self) -> f32 {
        self.config.failure_threshold
    }

    /// Material printed during the trailing window before a failure:
    /// `min(window, elapsed) / estimated duration * requirement`.
    pub fn trailing_usage(&self, job: &PrintJob, now: DateTime<Utc>) -> f64 {
        let required = match job.material_grams {
            Some(grams) if grams > 0.0 => grams,
            _ => return 0.0,
        };
        let window = f64::from(self.config.failure_window_seconds);
        let window = match job.start_time {
            Some(start) => window.min((now - start).num_seconds().max(0) as f64),
            None => window,
        };
        let minutes = job.estimated_minutes.unwrap_or(self.config.default_estimated_minutes);
        let total_seconds = (f64::from(minutes) * 60.0).max(1.0);
        window / total_seconds * required
    }

    /// Score one frame for a printing job and fail the job if the strongest
    /// detection is above the threshold.
    ///
    /// Scoring runs on the blocking pool before the store is locked; the job
    /// is checked on both sides of it. Trailing usage, the forced failure and the failure
    /// event are committed together.
    pub async fn inspect_frame(&self, job_code: &str, frame: &[u8], image_ref: Option<String>) -> FleetResult<DetectionOutcome> {
        if frame.is_empty() {
            return Err(FleetError::Validation(format!("empty frame submitted for job {}", job_code)));
        }
        let job = self.jobs.get(job_code).await?;
        if job.status != JobState::Printing {
            return Err(FleetError::InvalidState(format!(
                "job {} is not printing (status: {})",
                job_code, job.status
            )));
        }

        let scorer = self.scorer.clone();
        let owned = frame.to_vec();
        let detections = tokio::task::spawn_blocking(move || scorer.score_frame(&owned))
            .await
            .map_err(|e| ScoringError::Failed {
                scorer: "frame scorer".to_string(),
                reason: e.to_string(),
            })??;
        // ties go to the earliest detection
        let best = detections
            .into_iter()
            .filter(|d| d.confidence.is_finite())
            .map(|d| Detection::new(d.label, d.confidence.clamp(0.0, 1.0)))
            .reduce(|best, d| if d.confidence > best.confidence { d } else { best });

        let winner = match best {
            Some(d) if d.confidence > self.config.failure_threshold => d,
            other => {
                match &other {
                    Some(d) => tracing::info!(
                        "Failure detection for job {}: {} with confidence {:.2}",
                        job_code,
                        d.label,
                        d.confidence
                    ),
                    None => tracing::info!("Failure detection for job {}: no detections", job_code),
                }
                return Ok(DetectionOutcome::Negative { best: other });
            }
        };

        let mut uow = self.store.begin().await;
        let job = self.jobs.get_in(&uow, job_code)?.clone();
        if job.status != JobState::Printing {
            return Err(FleetError::InvalidState(format!(
                "job {} stopped printing while its frame was scored (status: {})",
                job_code, job.status
            )));
        }

        let material_used_g = self.trailing_usage(&job, self.clock.now());
        if let Some(spool_code) = job.spool_code.as_deref() {
            if material_used_g > 0.0 {
                self.jobs.inventory().consume_material_in(&mut uow, spool_code, material_used_g)?;
            }
        }
        let event = self
            .jobs
            .force_fail_in(&mut uow, job_code, &winner.label, winner.confidence, image_ref)?;
        uow.commit()?;
        tracing::warn!(
            "Job {} force-failed: {} ({:.2}), {:.1}g charged to spool",
            job_code,
            winner.label,
            winner.confidence,
            material_used_g
        );
        Ok(DetectionOutcome::Failure { event, material_used_g })
    }
}
