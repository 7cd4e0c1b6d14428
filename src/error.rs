use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] rquest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Missing required setting: {0}")]
    MissingSetting(&'static str),

    #[error("Setting {0} is not a valid header value")]
    InvalidHeader(&'static str),

    #[error("Portal returned HTTP {status} on {endpoint}")]
    PortalStatus { endpoint: &'static str, status: u16 },

    #[error("Callback API error: {0}")]
    Callback(String),

    #[error("Order rejected by portal: {0}")]
    OrderRejected(String),

    #[error("Order has no orderable items")]
    EmptyOrder,

    #[error("Task queue is not running")]
    QueueClosed,
}
