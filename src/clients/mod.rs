pub mod callback;
pub mod portal;

pub use callback::CallbackClient;
pub use portal::{PortalClient, ProductSearch};
