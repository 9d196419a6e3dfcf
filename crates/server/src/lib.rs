pub mod config;
pub mod error;
pub mod routes;
pub mod telemetry;

use agency_core::DeadlinePolicy;
use agency_import::StatementExtractor;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_STALE_IMPORT: Duration = Duration::from_secs(300);

#[derive(Clone)]
pub struct AppState {
    pub db: agency_storage::DbPool,
    pub extractor: Arc<StatementExtractor>,
    pub deadline_policy: DeadlinePolicy,
    /// How long an import may sit in `processing` before an upload of the
    /// same file takes it over.
    pub stale_import_after: Duration,
}

impl AppState {
    pub fn new(
        db: agency_storage::DbPool,
        extractor: StatementExtractor,
        deadline_policy: DeadlinePolicy,
    ) -> Self {
        Self {
            db,
            extractor: Arc::new(extractor),
            deadline_policy,
            stale_import_after: DEFAULT_STALE_IMPORT,
        }
    }

    pub fn with_stale_import_after(mut self, stale_import_after: Duration) -> Self {
        self.stale_import_after = stale_import_after;
        self
    }
}

pub use routes::router;
