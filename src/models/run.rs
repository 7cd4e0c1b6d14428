use chrono::{DateTime, Utc};

use super::product::ProductRecord;

/// Everything one pagination sweep produced. Owned by the extractor while
/// the sweep runs, then handed to the sink.
#[derive(Debug, Clone)]
pub struct ExtractionRun {
    pub filter_term: String,
    pub max_pages: Option<u32>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub records: Vec<ProductRecord>,
    /// `totalRegistros` reported by the server on the first page.
    pub total_reported: u32,
    pub page_size: u32,
    pub pages_fetched: u32,
    /// Rows rejected by the normalizer. Counted, never raised.
    pub dropped: u32,
}

impl ExtractionRun {
    pub fn is_filtered(&self) -> bool {
        !self.filter_term.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}
