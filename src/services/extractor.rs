use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::clients::ProductSearch;
use crate::error::Result;
use crate::models::{ExtractionRun, ProductRecord, PAGE_SIZE};
use crate::storage::JsonSink;

/// Accumulated records are checkpointed to the backup file this often.
pub const CHECKPOINT_PAGES: u32 = 50;

/// Sequential sweep over the paginated product search. One request at a
/// time, a fixed pause between pages, no retries of its own: a failed page
/// aborts the run and retrying is the task layer's call.
pub struct ProductExtractor<S> {
    search: Arc<S>,
    page_delay: Duration,
    sink: Option<Arc<JsonSink>>,
}

impl<S: ProductSearch> ProductExtractor<S> {
    pub fn new(search: Arc<S>, page_delay: Duration) -> Self {
        Self {
            search,
            page_delay,
            sink: None,
        }
    }

    pub fn with_checkpoints(mut self, sink: Arc<JsonSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub async fn fetch(&self, filter: &str, max_pages: Option<u32>) -> Result<ExtractionRun> {
        let started_at = Utc::now();

        info!(filter, max_pages, "Starting product extraction");

        let mut records: Vec<ProductRecord> = Vec::new();
        let mut dropped = 0u32;
        let mut total_reported = 0u32;
        let mut page_size = PAGE_SIZE;
        let mut pages_fetched = 0u32;
        let mut page = 1u32;

        loop {
            let response = self.search.search(filter, page).await?;
            pages_fetched = page;

            if page == 1 {
                total_reported = response.total_registros;
                debug!(total_reported, "Server reported catalogue size");
            }
            page_size = response.registros_por_pagina;

            let fetched = response.lista.len() as u32;
            if fetched == 0 {
                debug!(page, "Empty page, stopping");
                break;
            }

            let collected_at = Utc::now();
            for raw in &response.lista {
                match ProductRecord::from_raw(raw, collected_at) {
                    Some(record) => records.push(record),
                    None => dropped += 1,
                }
            }

            info!(
                page,
                fetched,
                accumulated = records.len(),
                total_reported,
                "Page processed"
            );

            // A short page is authoritative last-page evidence even when
            // totalRegistros claims more.
            let reached_cap = max_pages.is_some_and(|cap| page >= cap);
            let full_page = fetched == page_size;
            let below_total = (records.len() as u32) < total_reported;
            if reached_cap || !full_page || !below_total {
                break;
            }

            if page % CHECKPOINT_PAGES == 0 {
                if let Some(sink) = &self.sink {
                    sink.checkpoint(&records, page, filter).await?;
                }
            }

            page += 1;
            sleep(self.page_delay).await;
        }

        let finished_at = Utc::now();

        info!(
            records = records.len(),
            dropped,
            pages = pages_fetched,
            elapsed_secs = (finished_at - started_at).num_seconds(),
            "Extraction finished"
        );

        Ok(ExtractionRun {
            filter_term: filter.to_string(),
            max_pages,
            started_at,
            finished_at,
            records,
            total_reported,
            page_size,
            pages_fetched,
            dropped,
        })
    }
}
