use std::sync::Arc;

use chrono::Duration;
use fleet_shared::{JobState, ManualClock, NewJob, NewPrinter, NewSpool, PrinterStatus};
use print_fleet::{
    Config, DetectionOutcome, FailureScorer, FleetCoordinator, FleetStore, ScorerSet, ScoringError,
};

struct Heuristic {
    label: &'static str,
    score: f32,
}

impl FailureScorer for Heuristic {
    fn label(&self) -> &str {
        self.label
    }

    fn score(&self, _frame: &[u8]) -> Result<f32, ScoringError> {
        Ok(self.score)
    }
}

struct Crashing;

impl FailureScorer for Crashing {
    fn label(&self) -> &str {
        "layer_separation"
    }

    fn score(&self, _frame: &[u8]) -> Result<f32, ScoringError> {
        Err(ScoringError::Failed {
            scorer: "layer_separation".to_string(),
            reason: "histogram overflow".to_string(),
        })
    }
}

fn scorers(stringing: f32, warping: f32) -> Arc<ScorerSet> {
    Arc::new(
        ScorerSet::new()
            .with(Heuristic { label: "stringing", score: stringing })
            .with(Crashing)
            .with(Heuristic { label: "warping", score: warping }),
    )
}

async fn printing_fleet() -> (Arc<ManualClock>, FleetCoordinator, String) {
    let clock = Arc::new(ManualClock::default());
    let fleet = FleetCoordinator::with_parts(Arc::new(FleetStore::new()), clock.clone(), &Config::default());
    let printer = fleet.printers().register(NewPrinter::new("PRU-001", "Prusa 1")).await.unwrap();
    fleet.inventory().create_spool(NewSpool::new("S", "PLA", 1000.0)).await.unwrap();
    // no estimate: the 60 minute default applies
    let job = fleet
        .jobs()
        .create_job(NewJob::new(printer.id, "vase").with_spool("S", 360.0))
        .await
        .unwrap();
    fleet.jobs().start_job(&job.job_code).await.unwrap();
    (clock, fleet, job.job_code)
}

#[tokio::test]
async fn test_positive_detection_fails_job_and_locks_resources() {
    let (clock, fleet, code) = printing_fleet().await;
    clock.advance(Duration::minutes(20));
    fleet.jobs().update_progress(&code, 30.0, None).await.unwrap();

    let monitor = fleet.monitor(scorers(0.35, 0.88));
    let outcome = monitor.inspect_frame(&code, &[0xFF, 0xD8, 0xFF], None).await.unwrap();
    assert!(outcome.is_failure());
    let DetectionOutcome::Failure { event, material_used_g } = outcome else {
        unreachable!()
    };
    // 30s of a 3600s job needing 360g
    assert!((material_used_g - 3.0).abs() < 1e-9);
    assert_eq!(event.failure_type, "warping");
    assert_eq!(event.confidence_score, 0.88);
    assert!(!event.resolved);

    let job = fleet.jobs().get(&code).await.unwrap();
    assert_eq!(job.status, JobState::Failed);
    assert_eq!(job.actual_minutes, Some(20));
    let spool = fleet.inventory().get_by_spool_code("S").await.unwrap();
    assert!(!spool.is_active);
    assert!((spool.remaining_weight_g - (1000.0 - 108.0 - 3.0)).abs() < 1e-9);
    let printer = fleet.printers().get(job.printer_id).await.unwrap();
    assert_eq!(printer.status, PrinterStatus::Error);

    let snapshot = fleet.snapshot().await;
    assert_eq!(snapshot.unresolved_failures.len(), 1);
    assert_eq!(snapshot.summary.printers_error, 1);
    assert_eq!(snapshot.summary.locked_spools, 1);

    // a second frame for the same job is refused, nothing double-charged
    assert!(monitor.inspect_frame(&code, b"frame", None).await.is_err());
    assert_eq!(fleet.jobs().list_failure_events(Some(&code)).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_operator_recovers_after_failure() {
    let (_clock, fleet, code) = printing_fleet().await;
    let monitor = fleet.monitor(scorers(0.95, 0.1));
    let outcome = monitor.inspect_frame(&code, b"frame", Some("frames/0001.jpg".to_string())).await.unwrap();
    let DetectionOutcome::Failure { event, .. } = outcome else {
        panic!("expected failure");
    };
    assert_eq!(event.failure_type, "stringing");
    assert_eq!(event.image_ref.as_deref(), Some("frames/0001.jpg"));

    let printer_id = fleet.jobs().get(&code).await.unwrap().printer_id;
    fleet.jobs().resolve_failure_event(event.id).await.unwrap();
    fleet.printers().activate(printer_id).await.unwrap();
    fleet.inventory().activate_spool("S").await.unwrap();

    let retry = fleet
        .jobs()
        .create_job(NewJob::new(printer_id, "vase").with_spool("S", 360.0))
        .await
        .unwrap();
    fleet.jobs().start_job(&retry.job_code).await.unwrap();
    assert!(fleet.snapshot().await.unresolved_failures.is_empty());
}

#[tokio::test]
async fn test_below_threshold_changes_nothing() {
    let (_clock, fleet, code) = printing_fleet().await;
    let before = fleet.inventory().get_by_spool_code("S").await.unwrap();
    let monitor = fleet.monitor(scorers(0.2, 0.69));
    match monitor.inspect_frame(&code, b"frame", None).await.unwrap() {
        DetectionOutcome::Negative { best } => {
            let best = best.unwrap();
            assert_eq!(best.label, "warping");
            assert_eq!(best.confidence, 0.69);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(fleet.jobs().get(&code).await.unwrap().status, JobState::Printing);
    assert_eq!(fleet.inventory().get_by_spool_code("S").await.unwrap(), before);
    assert!(fleet.jobs().list_failure_events(None).await.unwrap().is_empty());
}
