pub mod clients;
pub mod config;
pub mod error;
pub mod models;
pub mod queue;
pub mod services;
pub mod storage;

pub use clients::{CallbackClient, PortalClient, ProductSearch};
pub use config::Settings;
pub use error::{Error, Result};
pub use models::{
    CallbackProduct, ExtractionRun, LineItem, OrderConfirmation, OrderRequest, ProductRecord,
};
pub use queue::{RetryPolicy, StatusStore, TaskQueue, TaskReport, TaskRequest, TaskStatus};
pub use services::{OrderReport, OrderService, ProductExtractor, ScrapeReport, ScrapeService};
pub use storage::JsonSink;
