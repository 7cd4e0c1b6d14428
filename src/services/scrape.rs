use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::clients::{CallbackClient, PortalClient};
use crate::config::Settings;
use crate::error::Result;
use crate::models::{ExtractionRun, ProductRecord};
use crate::services::extractor::ProductExtractor;
use crate::storage::JsonSink;

/// Scrape orchestration: portal sweep, JSON persistence, and (for queued
/// runs) delivery of the records to the callback API.
pub struct ScrapeService {
    settings: Settings,
}

/// Task-facing result of a queued scrape.
#[derive(Debug, Serialize)]
pub struct ScrapeReport {
    pub filter: Option<String>,
    pub records: usize,
    pub dropped: u32,
    pub pages: u32,
    pub total_reported: u32,
    pub output_file: String,
    pub duration_secs: f64,
    pub callback_delivered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_error: Option<String>,
}

impl ScrapeService {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Runs one sweep and persists it. Configuration problems surface here,
    /// before any request leaves the machine.
    pub async fn scrape(
        &self,
        filter: &str,
        max_pages: Option<u32>,
    ) -> Result<(ExtractionRun, PathBuf)> {
        let portal = PortalClient::new(&self.settings.portal)?;
        let sink = Arc::new(JsonSink::new(&self.settings.storage)?);

        let extractor = ProductExtractor::new(
            Arc::new(portal),
            Duration::from_secs(self.settings.scrape.page_delay_secs),
        )
        .with_checkpoints(sink.clone());

        let run = extractor.fetch(filter, max_pages).await?;
        let path = sink.save(&run).await?;

        Ok((run, path))
    }

    /// Queued variant: scrape, persist, then push the records to the
    /// callback API. A delivery failure is reported in the result but does
    /// not invalidate the completed scrape.
    pub async fn scrape_and_deliver(
        &self,
        filter: &str,
        max_pages: Option<u32>,
    ) -> Result<ScrapeReport> {
        let (run, path) = self.scrape(filter, max_pages).await?;

        let (callback_delivered, callback_error) = match self.deliver(&run.records).await {
            Ok(count) => {
                info!(count, "Scrape delivered to callback API");
                (true, None)
            }
            Err(e) => {
                error!(error = %e, "Callback delivery failed; scrape output kept");
                (false, Some(e.to_string()))
            }
        };

        Ok(ScrapeReport {
            filter: run.is_filtered().then(|| run.filter_term.clone()),
            records: run.records.len(),
            dropped: run.dropped,
            pages: run.pages_fetched,
            total_reported: run.total_reported,
            output_file: path.display().to_string(),
            duration_secs: run.duration_secs(),
            callback_delivered,
            callback_error,
        })
    }

    async fn deliver(&self, records: &[ProductRecord]) -> Result<usize> {
        let mut callback = CallbackClient::new(&self.settings.callback)?;
        callback.authenticate().await?;
        callback.send_products(records).await
    }
}
