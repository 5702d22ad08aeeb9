use std::sync::Arc;

use chrono::Duration;
use fleet_shared::{AlertType, JobState, ManualClock, NewJob, NewPrinter, NewSpool, PrinterStatus};
use print_fleet::{Config, FleetCoordinator, FleetError, FleetStore};

fn fleet() -> (Arc<ManualClock>, FleetCoordinator) {
    let clock = Arc::new(ManualClock::default());
    let fleet = FleetCoordinator::with_parts(Arc::new(FleetStore::new()), clock.clone(), &Config::default());
    (clock, fleet)
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

#[tokio::test]
async fn test_full_job_draws_exactly_its_requirement() {
    let (clock, fleet) = fleet();
    let printer = fleet.printers().register(NewPrinter::new("PRU-001", "Prusa 1")).await.unwrap();
    fleet.inventory().create_spool(NewSpool::new("S", "PLA", 1000.0)).await.unwrap();
    let job = fleet
        .jobs()
        .create_job(NewJob::new(printer.id, "bracket").with_spool("S", 900.0))
        .await
        .unwrap();
    assert_eq!(job.status, JobState::Queued);
    fleet.jobs().start_job(&job.job_code).await.unwrap();
    assert_eq!(fleet.printers().get(printer.id).await.unwrap().status, PrinterStatus::Printing);

    fleet.jobs().update_progress(&job.job_code, 50.0, Some(120)).await.unwrap();
    let spool = fleet.inventory().get_by_spool_code("S").await.unwrap();
    assert!(close(spool.remaining_weight_g, 550.0));
    assert!(fleet.inventory().list_unresolved_alerts().await.is_empty());

    fleet.jobs().update_progress(&job.job_code, 100.0, Some(240)).await.unwrap();
    let spool = fleet.inventory().get_by_spool_code("S").await.unwrap();
    assert!(close(spool.remaining_weight_g, 100.0));
    assert!(spool.is_low_inventory);
    let alerts = fleet.inventory().list_unresolved_alerts().await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, AlertType::LowInventory);

    clock.advance(Duration::minutes(45));
    let job = fleet.jobs().complete_job(&job.job_code, true).await.unwrap();
    assert_eq!(job.status, JobState::Completed);
    assert_eq!(job.actual_minutes, Some(45));
    let spool = fleet.inventory().get_by_spool_code("S").await.unwrap();
    assert!(close(spool.remaining_weight_g, 100.0));
    assert_eq!(fleet.printers().get(printer.id).await.unwrap().status, PrinterStatus::Idle);
}

#[tokio::test]
async fn test_completion_charges_the_unreported_remainder() {
    let (_clock, fleet) = fleet();
    let printer = fleet.printers().register(NewPrinter::new("PRU-001", "Prusa 1")).await.unwrap();
    fleet.inventory().create_spool(NewSpool::new("S", "PETG", 1000.0)).await.unwrap();
    let job = fleet
        .jobs()
        .create_job(NewJob::new(printer.id, "hinge").with_spool("S", 200.0))
        .await
        .unwrap();
    fleet.jobs().start_job(&job.job_code).await.unwrap();
    fleet.jobs().update_progress(&job.job_code, 37.5, None).await.unwrap();
    fleet.jobs().update_progress(&job.job_code, 80.0, None).await.unwrap();
    fleet.jobs().complete_job(&job.job_code, true).await.unwrap();
    let spool = fleet.inventory().get_by_spool_code("S").await.unwrap();
    assert!(close(1000.0 - spool.remaining_weight_g, 200.0));
}

#[tokio::test]
async fn test_insufficient_spool_refuses_start_and_alerts_once() {
    let (_clock, fleet) = fleet();
    let printer = fleet.printers().register(NewPrinter::new("PRU-001", "Prusa 1")).await.unwrap();
    fleet.inventory().create_spool(NewSpool::new("S", "PLA", 1000.0)).await.unwrap();
    fleet.inventory().consume_material("S", 900.0).await.unwrap();
    let job = fleet
        .jobs()
        .create_job(NewJob::new(printer.id, "housing").with_spool("S", 500.0))
        .await
        .unwrap();

    for _ in 0..3 {
        let err = fleet.jobs().start_job(&job.job_code).await.unwrap_err();
        assert!(matches!(err, FleetError::ResourceUnavailable(_)));
    }
    let insufficient: Vec<_> = fleet
        .inventory()
        .alerts_for_spool("S")
        .await
        .into_iter()
        .filter(|a| a.alert_type == AlertType::InsufficientMaterial && !a.is_resolved)
        .collect();
    assert_eq!(insufficient.len(), 1);
    assert!(close(insufficient[0].threshold_percentage, 0.5));
    assert!(close(insufficient[0].current_percentage, 0.1));

    // the refusal left the job queued and the printer free
    assert_eq!(fleet.jobs().get(&job.job_code).await.unwrap().status, JobState::Queued);
    assert!(fleet.printers().is_available(printer.id).await.unwrap());
}

#[tokio::test]
async fn test_progress_raises_insufficient_when_spool_falls_behind() {
    let (_clock, fleet) = fleet();
    let printer = fleet.printers().register(NewPrinter::new("PRU-001", "Prusa 1")).await.unwrap();
    fleet.inventory().create_spool(NewSpool::new("S", "PLA", 1000.0)).await.unwrap();
    let job = fleet
        .jobs()
        .create_job(NewJob::new(printer.id, "tray").with_spool("S", 600.0))
        .await
        .unwrap();
    fleet.jobs().start_job(&job.job_code).await.unwrap();
    // someone pulls material off the reel by hand
    fleet.inventory().consume_material("S", 300.0).await.unwrap();
    let alerts = fleet.inventory().alerts_for_spool("S").await;
    assert!(alerts.is_empty());

    fleet.jobs().update_progress(&job.job_code, 50.0, None).await.unwrap();
    // 400g left, 300g still needed: fine
    assert!(fleet.inventory().alerts_for_spool("S").await.is_empty());
    fleet.inventory().consume_material("S", 150.0).await.unwrap();
    // 250g left, 300g still needed
    let alerts = fleet.inventory().alerts_for_spool("S").await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, AlertType::InsufficientMaterial);

    fleet.jobs().update_progress(&job.job_code, 60.0, None).await.unwrap();
    assert_eq!(fleet.inventory().alerts_for_spool("S").await.len(), 1);
}

#[tokio::test]
async fn test_spool_exclusivity_and_locked_spools() {
    let (_clock, fleet) = fleet();
    let a = fleet.printers().register(NewPrinter::new("PRU-001", "Prusa 1")).await.unwrap();
    let b = fleet.printers().register(NewPrinter::new("PRU-002", "Prusa 2")).await.unwrap();
    fleet.inventory().create_spool(NewSpool::new("S", "PLA", 1000.0)).await.unwrap();
    let first = fleet.jobs().create_job(NewJob::new(a.id, "one").with_spool("S", 100.0)).await.unwrap();
    let second = fleet.jobs().create_job(NewJob::new(b.id, "two").with_spool("S", 100.0)).await.unwrap();
    fleet.jobs().start_job(&first.job_code).await.unwrap();
    let err = fleet.jobs().start_job(&second.job_code).await.unwrap_err();
    assert!(matches!(err, FleetError::ResourceUnavailable(ref msg) if msg.contains(&first.job_code)));

    fleet.jobs().complete_job(&first.job_code, true).await.unwrap();
    fleet.inventory().deactivate_spool("S").await.unwrap();
    assert!(matches!(
        fleet.jobs().start_job(&second.job_code).await,
        Err(FleetError::ResourceUnavailable(_))
    ));
    fleet.inventory().activate_spool("S").await.unwrap();
    fleet.jobs().start_job(&second.job_code).await.unwrap();
}

#[tokio::test]
async fn test_printer_guard_rules() {
    let (_clock, fleet) = fleet();
    let printer = fleet.printers().register(NewPrinter::new("PRU-001", "Prusa 1")).await.unwrap();
    let job = fleet.jobs().create_job(NewJob::new(printer.id, "clip")).await.unwrap();
    fleet.jobs().start_job(&job.job_code).await.unwrap();

    // job creation refuses a busy printer
    assert!(matches!(
        fleet.jobs().create_job(NewJob::new(printer.id, "clip 2")).await,
        Err(FleetError::ResourceUnavailable(_))
    ));
    // operators cannot pull a printing printer out from under its job
    for status in [PrinterStatus::Idle, PrinterStatus::Maintenance, PrinterStatus::Error] {
        assert!(matches!(
            fleet.printers().set_status(printer.id, status).await,
            Err(FleetError::InvalidState(_))
        ));
    }
    assert!(matches!(
        fleet.printers().set_active(printer.id, false).await,
        Err(FleetError::InvalidState(_))
    ));
    fleet.jobs().complete_job(&job.job_code, true).await.unwrap();
    fleet.printers().set_status(printer.id, PrinterStatus::Maintenance).await.unwrap();
}

#[tokio::test]
async fn test_delete_then_lookup_is_not_found() {
    let (_clock, fleet) = fleet();
    let printer = fleet.printers().register(NewPrinter::new("PRU-001", "Prusa 1")).await.unwrap();
    let queued = fleet.jobs().create_job(NewJob::new(printer.id, "spare")).await.unwrap();
    fleet.jobs().delete_job(&queued.job_code).await.unwrap();
    assert!(fleet.jobs().get(&queued.job_code).await.unwrap_err().is_not_found());

    let done = fleet.jobs().create_job(NewJob::new(printer.id, "spare")).await.unwrap();
    fleet.jobs().start_job(&done.job_code).await.unwrap();
    fleet.jobs().complete_job(&done.job_code, true).await.unwrap();
    assert!(matches!(
        fleet.jobs().delete_job(&done.job_code).await,
        Err(FleetError::InvalidState(_))
    ));
}
