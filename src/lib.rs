// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod clock;
pub mod config;
pub mod extract;
pub mod ingest;
pub mod metrics;
pub mod notify;
pub mod report;
pub mod scheduler;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::clock::{Clock, SystemClock};
pub use crate::config::{AppConfig, ConfigLoader, CycleConfig, Source};
pub use crate::extract::{extract, LeakDraft, CONTENT_PLACEHOLDER, LINKS_PLACEHOLDER};
pub use crate::ingest::{HttpFeedFetcher, Ingestor, PassSummary, RawEntry};
pub use crate::notify::{Dispatcher, Message, MessageKind};
pub use crate::scheduler::{QuietHours, RunMode, Tracker};
pub use crate::store::{LeakItem, LeakStore, ReportKind, ReportWindow};
