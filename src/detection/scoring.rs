// src/detection/scoring.rs - Frame scoring contract
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("Scorer '{scorer}' failed: {reason}")]
    Failed { scorer: String, reason: String },
    #[error("Frame is empty")]
    EmptyFrame,
}

/// One labelled confidence produced for a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self { label: label.into(), confidence }
    }
}

/// A single named heuristic, e.g. stringing or warping.
pub trait FailureScorer: Send + Sync {
    fn label(&self) -> &str;
    fn score(&self, frame: &[u8]) -> Result<f32, ScoringError>;
}

/// What the failure monitor consumes: frame bytes in, detections out.
pub trait FrameScorer: Send + Sync {
    fn score_frame(&self, frame: &[u8]) -> Result<Vec<Detection>, ScoringError>;
}

impl<F> FrameScorer for F
where
    F: Fn(&[u8]) -> Result<Vec<Detection>, ScoringError> + Send + Sync,
{
    fn score_frame(&self, frame: &[u8]) -> Result<Vec<Detection>, ScoringError> {
        self(frame)
    }
}

/// Runs every registered scorer against a frame.
///
/// A scorer that errors is logged and left out of the result. Only when
/// every scorer errors does the set itself report a failure. Scores that
/// are not finite are dropped; the rest are clamped into [0, 1].
#[derive(Default)]
pub struct ScorerSet {
    scorers: Vec<Box<dyn FailureScorer>>,
}

impl ScorerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, scorer: impl FailureScorer + 'static) -> Self {
        self.scorers.push(Box::new(scorer));
        self
    }

    pub fn push(&mut self, scorer: Box<dyn FailureScorer>) {
        self.scorers.push(scorer);
    }

    pub fn len(&self) -> usize {
        self.scorers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scorers.is_empty()
    }
}

impl FrameScorer for ScorerSet {
    fn score_frame(&self, frame: &[u8]) -> Result<Vec<Detection>, ScoringError> {
        if frame.is_empty() {
            return Err(ScoringError::EmptyFrame);
        }
        let mut detections = Vec::with_capacity(self.scorers.len());
        let mut failures = 0;
        let mut last_error = None;
        for scorer in &self.scorers {
            match scorer.score(frame) {
                Ok(score) if score.is_finite() => {
                    detections.push(Detection::new(scorer.label(), score.clamp(0.0, 1.0)));
                }
                Ok(score) => {
                    tracing::warn!("Scorer '{}' returned non-finite score {}, ignoring", scorer.label(), score);
                }
                Err(e) => {
                    tracing::error!("Scorer '{}' failed: {}", scorer.label(), e);
                    failures += 1;
                    last_error = Some(e);
                }
            }
        }
        match last_error {
            Some(e) if failures == self.scorers.len() => Err(e),
            _ => Ok(detections),
        }
    }
}
