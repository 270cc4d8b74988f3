pub mod alerts;
pub mod engine;
pub mod features;
pub mod jobs;
pub mod report;
pub mod rule;

pub use alerts::AlertDispatcher;
pub use engine::{TickAborted, TickOutcome, TickReport, TrackerHandle, TrackingEngine};
pub use jobs::{Job, JobRunner, JobSchedule};
