use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

use crate::config::QueueConfig;
use crate::models::OrderRequest;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskRequest {
    Scrape {
        filter: String,
        max_pages: Option<u32>,
    },
    Order {
        order: OrderRequest,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    Pending,
    Started,
    Retry,
    Success,
    Failure,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Failure)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReport {
    pub task_id: Uuid,
    pub status: TaskStatus,
    pub ready: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl TaskReport {
    pub fn pending(task_id: Uuid) -> Self {
        Self::with_status(task_id, TaskStatus::Pending)
    }

    pub fn started(task_id: Uuid) -> Self {
        Self::with_status(task_id, TaskStatus::Started)
    }

    pub fn retrying(task_id: Uuid) -> Self {
        Self::with_status(task_id, TaskStatus::Retry)
    }

    pub fn success(task_id: Uuid, result: Value) -> Self {
        let mut report = Self::with_status(task_id, TaskStatus::Success);
        report.result = Some(result);
        report
    }

    pub fn failure(task_id: Uuid, error: String) -> Self {
        let mut report = Self::with_status(task_id, TaskStatus::Failure);
        report.error = Some(error);
        report
    }

    fn with_status(task_id: Uuid, status: TaskStatus) -> Self {
        Self {
            task_id,
            status,
            ready: status.is_terminal(),
            result: None,
            error: None,
            updated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl From<&QueueConfig> for RetryPolicy {
    fn from(config: &QueueConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            delay: Duration::from_secs(config.retry_delay_secs),
        }
    }
}
