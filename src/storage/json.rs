use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::StorageConfig;
use crate::error::Result;
use crate::models::{ExtractionRun, ProductRecord};

// One fixed destination per run type; every save is a full overwrite of the
// previous run of the same type.
pub const ALL_PRODUCTS_FILE: &str = "servimed_produtos_completos.json";
pub const FILTERED_PRODUCTS_FILE: &str = "servimed_produtos_filtrados.json";
pub const BACKUP_FILE: &str = "servimed_backup.json";

pub const SOURCE_LABEL: &str = "Portal Servimed";

/// Sink for finished runs and mid-run checkpoints. Concurrent runs of the
/// same type race on the same destination; last write wins.
pub struct JsonSink {
    dir: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunDocument {
    pub metadata: RunMetadata,
    pub records: Vec<ProductRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunMetadata {
    pub total_records: usize,
    pub filter: Option<String>,
    pub collected_at: DateTime<Utc>,
    pub source: String,
    pub pages_fetched: u32,
    pub dropped: u32,
    pub total_reported: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct BackupDocument {
    metadata: BackupMetadata,
    records: Vec<ProductRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct BackupMetadata {
    records_so_far: usize,
    current_page: u32,
    filter: Option<String>,
    saved_at: DateTime<Utc>,
    source: String,
}

impl JsonSink {
    pub fn new(config: &StorageConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.output_dir)?;
        Ok(Self {
            dir: config.output_dir.clone(),
        })
    }

    /// Where a run of this filter ends up.
    pub fn destination(&self, filter: &str) -> PathBuf {
        if filter.is_empty() {
            self.dir.join(ALL_PRODUCTS_FILE)
        } else {
            self.dir.join(FILTERED_PRODUCTS_FILE)
        }
    }

    pub fn backup_path(&self) -> PathBuf {
        self.dir.join(BACKUP_FILE)
    }

    /// Writes the finished run. The metadata timestamp comes from the run
    /// itself, so saving the same run twice produces identical bytes.
    pub async fn save(&self, run: &ExtractionRun) -> Result<PathBuf> {
        let document = RunDocument {
            metadata: RunMetadata {
                total_records: run.records.len(),
                filter: run.is_filtered().then(|| run.filter_term.clone()),
                collected_at: run.finished_at,
                source: SOURCE_LABEL.to_string(),
                pages_fetched: run.pages_fetched,
                dropped: run.dropped,
                total_reported: run.total_reported,
            },
            records: run.records.clone(),
        };

        let path = self.destination(&run.filter_term);
        write_pretty(&path, &document).await?;

        info!(
            path = %path.display(),
            records = document.metadata.total_records,
            "Run saved"
        );
        Ok(path)
    }

    /// Mid-run checkpoint. A single backup file is overwritten each time;
    /// it is a crash-recovery aid, not a versioned history.
    pub async fn checkpoint(
        &self,
        records: &[ProductRecord],
        current_page: u32,
        filter: &str,
    ) -> Result<PathBuf> {
        let document = BackupDocument {
            metadata: BackupMetadata {
                records_so_far: records.len(),
                current_page,
                filter: (!filter.is_empty()).then(|| filter.to_string()),
                saved_at: Utc::now(),
                source: SOURCE_LABEL.to_string(),
            },
            records: records.to_vec(),
        };

        let path = self.backup_path();
        write_pretty(&path, &document).await?;

        debug!(
            path = %path.display(),
            records = records.len(),
            current_page,
            "Checkpoint saved"
        );
        Ok(path)
    }
}

async fn write_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    tokio::fs::write(path, bytes).await?;
    Ok(())
}
