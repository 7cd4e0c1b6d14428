use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::clients::{CallbackClient, PortalClient, ProductSearch};
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::models::{
    confirmation_code, LineItem, OrderConfirmation, OrderItemPayload, OrderPayload, OrderRequest,
    ProductRecord,
};
use crate::services::extractor::ProductExtractor;

/// Order flow: verify the requested products against the live catalogue,
/// transmit the vendor order, then report the synthesized confirmation to
/// the callback API.
pub struct OrderService {
    settings: Settings,
}

#[derive(Debug, Serialize)]
pub struct OrderReport {
    pub order_id: String,
    pub remote_order_id: Option<String>,
    pub confirmation_code: String,
    pub items_submitted: usize,
    pub total_quantity: u32,
    pub confirmation_delivered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_error: Option<String>,
}

impl OrderService {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub async fn process(&self, order: &OrderRequest) -> Result<OrderReport> {
        if order.line_items.is_empty() {
            return Err(Error::EmptyOrder);
        }

        let portal = Arc::new(PortalClient::new(&self.settings.portal)?);
        let extractor = ProductExtractor::new(
            portal.clone(),
            Duration::from_secs(self.settings.scrape.page_delay_secs),
        );

        let mut itens = Vec::new();
        for item in &order.line_items {
            match verify_item(&extractor, item).await {
                Some(payload_item) => itens.push(payload_item),
                None => warn!(code = %item.code, "Line item skipped"),
            }
        }
        if itens.is_empty() {
            return Err(Error::EmptyOrder);
        }

        let payload = OrderPayload::new(portal.client_id(), portal.logged_user(), itens);
        let response = portal.transmit_order(&payload).await?;
        if !response.accepted() {
            return Err(Error::OrderRejected(response.executado));
        }

        let code = confirmation_code(
            Utc::now(),
            payload.itens[0].id,
            payload.total_quantity(),
            portal.client_id(),
        );
        info!(order_id = %order.order_id, code = %code, "Order accepted by portal");

        // Vendor said yes; from here on a callback problem is a partial
        // success, never a failed order.
        let (remote_order_id, confirmation_delivered, callback_error) =
            match self.confirm(order, &code).await {
                Ok(remote) => (Some(remote), true, None),
                Err(e) => {
                    error!(error = %e, "Confirmation delivery failed; order stands");
                    (None, false, Some(e.to_string()))
                }
            };

        Ok(OrderReport {
            order_id: order.order_id.clone(),
            remote_order_id,
            confirmation_code: code,
            items_submitted: payload.itens.len(),
            total_quantity: payload.total_quantity(),
            confirmation_delivered,
            callback_error,
        })
    }

    async fn confirm(&self, order: &OrderRequest, code: &str) -> Result<String> {
        let mut config = self.settings.callback.clone();
        if !order.callback_url.is_empty() {
            config.base_url = order.callback_url.clone();
        }

        let mut callback = CallbackClient::new(&config)?;
        callback.authenticate().await?;

        let remote = callback.create_order().await?;
        callback
            .confirm_order(&remote, &OrderConfirmation::fulfilled(code.to_string()))
            .await?;
        Ok(remote)
    }
}

/// Looks the line item up with a one-page filtered sweep and prices it from
/// the live record. `None` means the item cannot go on the order.
async fn verify_item<S: ProductSearch>(
    extractor: &ProductExtractor<S>,
    item: &LineItem,
) -> Option<OrderItemPayload> {
    let id: i64 = match item.code.trim().parse() {
        Ok(id) => id,
        Err(_) => {
            warn!(code = %item.code, "Line item code is not numeric");
            return None;
        }
    };

    let run = match extractor.fetch(&item.code, Some(1)).await {
        Ok(run) => run,
        Err(e) => {
            warn!(code = %item.code, error = %e, "Verification lookup failed");
            return None;
        }
    };

    let record = match_record(&run.records, item)?;
    info!(
        code = %record.code,
        price = record.factory_price,
        stock = record.stock_quantity,
        "Line item verified"
    );

    Some(OrderItemPayload::new(id, record.factory_price, item.quantity))
}

fn match_record<'a>(records: &'a [ProductRecord], item: &LineItem) -> Option<&'a ProductRecord> {
    records
        .iter()
        .find(|record| record.code == item.code)
        .or_else(|| {
            if item.gtin.is_empty() {
                None
            } else {
                records.iter().find(|record| record.gtin == item.gtin)
            }
        })
}
