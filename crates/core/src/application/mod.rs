// Application Layer - Use Cases and Business Logic

pub mod handlers;
pub mod lead;
pub mod recovery;
pub mod retry;
pub mod scheduler;
pub mod status;
pub mod worker;

// Re-exports
pub use lead::{LeadService, LeadUpdate};
pub use recovery::LeaseReaper;
pub use retry::{RetryDecision, RetryPolicy};
pub use scheduler::{
    CustomEmailRequest, EmailPriority, JobScheduler, ReminderRequest, RescheduledJob, ScheduledJob,
};
pub use status::{JobStatusService, JobStatusView, PendingJobView, QueueStats, StatusKind};
pub use worker::{
    shutdown_channel, HandlerDeps, JobContext, JobHandler, JobRegistry, ShutdownSender,
    ShutdownToken, Worker,
};
