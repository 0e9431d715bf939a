pub mod orchestrator;
pub mod report;
pub mod rules;
pub mod sets;
pub mod stacks;

pub use orchestrator::{reconcile, reconcile_domain};
pub use report::{Level, Outcome, Report, ReportEntry, Summary};
