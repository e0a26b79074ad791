// Mention pipeline — cursor, poller, history retrieval, orchestration.

pub mod backoff;
pub mod cursor;
pub mod history;
pub mod orchestrator;
pub mod poller;

pub use backoff::BackoffPolicy;
pub use cursor::ProcessedCursor;
pub use orchestrator::{BotOrchestrator, CycleReport, MentionOutcome, MentionState, OrchestratorSettings};
pub use poller::{NotificationPoller, PollBatch, Polled};
