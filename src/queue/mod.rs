pub mod store;
pub mod task;

pub use store::StatusStore;
pub use task::{RetryPolicy, TaskReport, TaskRequest, TaskStatus};

use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};

struct QueuedTask {
    task_id: Uuid,
    request: TaskRequest,
}

/// In-process task queue with a disk-backed status store. Tasks run
/// concurrently with each other; each task retries sequentially under
/// its policy and always settles as SUCCESS or FAILURE.
pub struct TaskQueue {
    tx: mpsc::UnboundedSender<QueuedTask>,
    store: Arc<StatusStore>,
}

impl TaskQueue {
    pub fn start<H, Fut>(store: StatusStore, policy: RetryPolicy, handler: H) -> Self
    where
        H: Fn(TaskRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let store = Arc::new(store);
        let handler = Arc::new(handler);
        let (tx, mut rx) = mpsc::unbounded_channel::<QueuedTask>();

        let worker_store = store.clone();
        tokio::spawn(async move {
            while let Some(task) = rx.recv().await {
                let store = worker_store.clone();
                let handler = handler.clone();
                tokio::spawn(run_task(store, policy, handler, task));
            }
        });

        Self { tx, store }
    }

    pub fn enqueue(&self, request: TaskRequest) -> Result<Uuid> {
        let task_id = Uuid::new_v4();
        self.store.put(&TaskReport::pending(task_id))?;
        self.tx
            .send(QueuedTask { task_id, request })
            .map_err(|_| Error::QueueClosed)?;
        debug!(task_id = %task_id, "Task enqueued");
        Ok(task_id)
    }

    pub fn status(&self, task_id: Uuid) -> Result<TaskReport> {
        self.store.get(task_id)
    }

    pub async fn wait(&self, task_id: Uuid, poll_interval: Duration) -> Result<TaskReport> {
        loop {
            let report = self.store.get(task_id)?;
            if report.ready {
                return Ok(report);
            }
            sleep(poll_interval).await;
        }
    }
}

async fn run_task<H, Fut>(
    store: Arc<StatusStore>,
    policy: RetryPolicy,
    handler: Arc<H>,
    task: QueuedTask,
) where
    H: Fn(TaskRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    record(&store, TaskReport::started(task.task_id));

    let mut attempt = 0;
    loop {
        match handler(task.request.clone()).await {
            Ok(result) => {
                info!(task_id = %task.task_id, "Task completed");
                record(&store, TaskReport::success(task.task_id, result));
                return;
            }
            Err(e) if attempt < policy.max_retries => {
                attempt += 1;
                warn!(
                    task_id = %task.task_id,
                    attempt,
                    max_retries = policy.max_retries,
                    delay_secs = policy.delay.as_secs(),
                    error = %e,
                    "Task failed, will retry"
                );
                record(&store, TaskReport::retrying(task.task_id));
                sleep(policy.delay).await;
            }
            Err(e) => {
                error!(task_id = %task.task_id, error = %e, "Task failed permanently");
                record(&store, TaskReport::failure(task.task_id, e.to_string()));
                return;
            }
        }
    }
}

fn record(store: &StatusStore, report: TaskReport) {
    if let Err(e) = store.put(&report) {
        error!(task_id = %report.task_id, error = %e, "Failed to persist task status");
    }
}
