pub mod scheduler;
pub mod store;

pub use scheduler::{MonitorFactory, Scheduler, SchedulerState, default_monitors};
pub use store::{AddOutcome, NotificationStore};
