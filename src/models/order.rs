use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// Fixed fields TrasmitirPedido requires on every submission. The tax
// multiplier and ST/IVA rate are the portal's, not ours.
const DAYS_OF_PLOTS: u32 = 28;
const PLOT_PIECES: [&str; 3] = ["21", "28", "35"];
const QUANTITY_PLOTS: u32 = 1;
const SELL_ID: u32 = 1;
const SELECTED_PROMOTION_NONE: i64 = -1;
const TAX_MULTIPLIER: f64 = 1.46;
const ST_IVA: f64 = 3.77;

/// Caller-side order: what to buy and where to confirm it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub order_id: String,
    pub line_items: Vec<LineItem>,
    pub callback_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub code: String,
    #[serde(default)]
    pub gtin: String,
    pub quantity: u32,
}

/// Wire shape of `POST /api/Pedido/TrasmitirPedido`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPayload {
    pub customer_id: i64,
    pub user_code: i64,
    pub days_of_plots: u32,
    pub pieces: Vec<String>,
    pub quantity_plots: u32,
    pub sell_id: u32,
    pub itens: Vec<OrderItemPayload>,
}

impl OrderPayload {
    pub fn new(customer_id: i64, user_code: i64, itens: Vec<OrderItemPayload>) -> Self {
        Self {
            customer_id,
            user_code,
            days_of_plots: DAYS_OF_PLOTS,
            pieces: PLOT_PIECES.iter().map(|p| p.to_string()).collect(),
            quantity_plots: QUANTITY_PLOTS,
            sell_id: SELL_ID,
            itens,
        }
    }

    pub fn total_quantity(&self) -> u32 {
        self.itens.iter().map(|item| item.quantity_requested).sum()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemPayload {
    pub id: i64,
    #[serde(rename = "selectedPromotionID")]
    pub selected_promotion_id: i64,
    pub tax_value: f64,
    pub quantity_requested: u32,
    pub base_value: f64,
    pub total_st_iva_value: f64,
    pub total_value: f64,
    pub discount: f64,
    pub descontos: Vec<Value>,
    pub discount_value: f64,
    #[serde(rename = "stIVA")]
    pub st_iva: f64,
}

impl OrderItemPayload {
    pub fn new(id: i64, base_value: f64, quantity: u32) -> Self {
        let taxed = base_value * TAX_MULTIPLIER;
        Self {
            id,
            selected_promotion_id: SELECTED_PROMOTION_NONE,
            tax_value: taxed,
            quantity_requested: quantity,
            base_value,
            total_st_iva_value: taxed,
            total_value: taxed * f64::from(quantity),
            discount: 0.0,
            descontos: Vec::new(),
            discount_value: base_value,
            st_iva: ST_IVA,
        }
    }
}

/// Body of the confirmation PATCH on the callback API.
#[derive(Debug, Clone, Serialize)]
pub struct OrderConfirmation {
    pub codigo_confirmacao: String,
    pub status: String,
}

impl OrderConfirmation {
    pub fn fulfilled(codigo_confirmacao: String) -> Self {
        Self {
            codigo_confirmacao,
            status: "pedido_realizado".to_string(),
        }
    }
}

/// TrasmitirPedido answers only `{"executado": "Ok"}`, so the confirmation
/// code is synthesized locally. The timestamp is an argument to keep the
/// synthesis a pure function of its inputs.
pub fn confirmation_code(
    at: DateTime<Utc>,
    first_item_id: i64,
    total_quantity: u32,
    client_id: i64,
) -> String {
    let client = client_id.to_string();
    let suffix_start = client.len().saturating_sub(4);
    format!(
        "SERVIMED_{}_{}_{}_{:02}_{}",
        at.format("%d%m%Y"),
        at.format("%H%M"),
        first_item_id,
        total_quantity,
        &client[suffix_start..],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn item_payload_applies_portal_multipliers() {
        let item = OrderItemPayload::new(444212, 10.0, 3);
        assert_eq!(item.tax_value, 14.6);
        assert_eq!(item.total_st_iva_value, 14.6);
        assert!((item.total_value - 43.8).abs() < 1e-9);
        assert_eq!(item.base_value, 10.0);
        assert_eq!(item.discount_value, 10.0);
        assert_eq!(item.st_iva, 3.77);
        assert_eq!(item.selected_promotion_id, -1);
    }

    #[test]
    fn payload_serializes_with_portal_keys() {
        let payload = OrderPayload::new(267511, 267511, vec![OrderItemPayload::new(1, 2.0, 1)]);
        let value = serde_json::to_value(&payload).unwrap();

        assert_eq!(value["customerId"], json!(267511));
        assert_eq!(value["userCode"], json!(267511));
        assert_eq!(value["daysOfPlots"], json!(28));
        assert_eq!(value["pieces"], json!(["21", "28", "35"]));
        assert_eq!(value["quantityPlots"], json!(1));
        assert_eq!(value["sellId"], json!(1));

        let item = &value["itens"][0];
        assert_eq!(item["selectedPromotionID"], json!(-1));
        assert_eq!(item["stIVA"], json!(3.77));
        assert!(item.get("quantityRequested").is_some());
        assert!(item.get("totalStIvaValue").is_some());
        assert!(item.get("discountValue").is_some());
        assert_eq!(item["descontos"], json!([]));
    }

    #[test]
    fn total_quantity_sums_items() {
        let payload = OrderPayload::new(
            1,
            1,
            vec![
                OrderItemPayload::new(1, 2.0, 2),
                OrderItemPayload::new(2, 3.0, 5),
            ],
        );
        assert_eq!(payload.total_quantity(), 7);
    }

    #[test]
    fn confirmation_code_is_deterministic() {
        let at: DateTime<Utc> = "2025-08-21T14:35:00Z".parse().unwrap();
        let code = confirmation_code(at, 444212, 2, 267511);
        assert_eq!(code, "SERVIMED_21082025_1435_444212_02_7511");
        assert_eq!(code, confirmation_code(at, 444212, 2, 267511));
    }

    #[test]
    fn confirmation_code_pads_quantity_and_slices_short_client_ids() {
        let at: DateTime<Utc> = "2025-01-02T03:04:00Z".parse().unwrap();
        assert_eq!(
            confirmation_code(at, 7, 1, 42),
            "SERVIMED_02012025_0304_7_01_42"
        );
    }

    #[test]
    fn fulfilled_confirmation_carries_expected_status() {
        let confirmation = OrderConfirmation::fulfilled("ABC".to_string());
        let value = serde_json::to_value(&confirmation).unwrap();
        assert_eq!(
            value,
            json!({"codigo_confirmacao": "ABC", "status": "pedido_realizado"})
        );
    }
}
