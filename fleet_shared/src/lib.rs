// fleet_shared: entity types and shared traits for the coordinator and its collaborators

pub mod alert;
pub mod api_models;
pub mod clock;
pub mod failure;
pub mod print_job;
pub mod printer;
pub mod spool;

pub use alert::{AlertType, InventoryAlert};
pub use clock::{Clock, ManualClock, SystemClock};
pub use failure::FailureEvent;
pub use print_job::{JobState, NewJob, PrintJob};
pub use printer::{NewPrinter, Printer, PrinterStatus};
pub use spool::{NewSpool, Spool};

/// Store-assigned identity shared by every entity table.
pub type EntityId = u64;
