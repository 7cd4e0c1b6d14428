mod order;
mod product;
mod response;
mod run;

pub use order::{
    confirmation_code, LineItem, OrderConfirmation, OrderItemPayload, OrderPayload, OrderRequest,
};
pub use product::{CallbackProduct, ProductRecord, RawProduct};
pub use response::{CreatedOrder, OrderResponse, SearchResponse, TokenResponse, PAGE_SIZE};
pub use run::ExtractionRun;
