pub mod accumulator;
pub mod ingest;
pub mod merge;
pub mod notify;
pub mod scheduler;

pub use accumulator::BatchAccumulator;
pub use ingest::{Arrival, AttachmentEvent, MediaIngestor};
pub use merge::{BatchOutcome, OutcomeKind, merge_capped};
pub use notify::{NotificationSink, NotifyError, describe_outcome};
pub use scheduler::{DEFAULT_QUIET_WINDOW, DebounceScheduler};
