use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw product row as the portal returns it. Field types vary between
/// catalogue segments (numbers arrive as strings and vice versa), so the
/// volatile fields stay as `Value` until coercion.
#[derive(Debug, Clone, Deserialize)]
pub struct RawProduct {
    #[serde(rename = "codigoBarras", default)]
    pub codigo_barras: Value,
    #[serde(rename = "codigoExterno", default)]
    pub codigo_externo: Value,
    #[serde(default)]
    pub descricao: Value,
    #[serde(rename = "valorBase", default)]
    pub valor_base: Value,
    #[serde(rename = "precoVenda", default)]
    pub preco_venda: Value,
    #[serde(rename = "quantidadeEstoque", default)]
    pub quantidade_estoque: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub gtin: String,
    pub code: String,
    pub description: String,
    pub factory_price: f64,
    pub stock_quantity: i64,
    pub collected_at: DateTime<Utc>,
}

impl ProductRecord {
    /// Normalizes a raw row. Returns `None` when the row has no usable
    /// product code; every other malformed field falls back to a default.
    pub fn from_raw(raw: &RawProduct, collected_at: DateTime<Utc>) -> Option<Self> {
        let code = coerce_string(&raw.codigo_externo);
        if code.is_empty() {
            return None;
        }

        let factory_price = coerce_f64(&raw.valor_base)
            .or_else(|| coerce_f64(&raw.preco_venda))
            .unwrap_or(0.0);

        Some(Self {
            gtin: coerce_string(&raw.codigo_barras),
            code,
            description: coerce_string(&raw.descricao),
            factory_price,
            stock_quantity: coerce_i64(&raw.quantidade_estoque).unwrap_or(0).max(0),
            collected_at,
        })
    }
}

/// Wire shape the callback API expects on `POST /produto`.
#[derive(Debug, Clone, Serialize)]
pub struct CallbackProduct {
    pub gtin: String,
    pub codigo: String,
    pub descricao: String,
    pub preco_fabrica: f64,
    pub estoque: i64,
}

impl From<&ProductRecord> for CallbackProduct {
    fn from(record: &ProductRecord) -> Self {
        Self {
            gtin: record.gtin.clone(),
            codigo: record.code.clone(),
            descricao: record.description.clone(),
            preco_fabrica: record.factory_price,
            estoque: record.stock_quantity,
        }
    }
}

pub(crate) fn coerce_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

pub(crate) fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn coerce_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().map(|f| f.trunc() as i64))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawProduct {
        serde_json::from_value(value).unwrap()
    }

    fn fixed_instant() -> DateTime<Utc> {
        "2025-08-21T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn maps_portal_fields() {
        let raw = raw(json!({
            "codigoBarras": "7891058001415",
            "codigoExterno": 444212,
            "descricao": "DIPIRONA 500MG",
            "valorBase": 12.5,
            "quantidadeEstoque": 42,
        }));

        let record = ProductRecord::from_raw(&raw, fixed_instant()).unwrap();
        assert_eq!(record.gtin, "7891058001415");
        assert_eq!(record.code, "444212");
        assert_eq!(record.description, "DIPIRONA 500MG");
        assert_eq!(record.factory_price, 12.5);
        assert_eq!(record.stock_quantity, 42);
        assert_eq!(record.collected_at, fixed_instant());
    }

    #[test]
    fn missing_code_drops_record() {
        let no_code = raw(json!({"descricao": "SEM CODIGO", "valorBase": 1.0}));
        assert!(ProductRecord::from_raw(&no_code, fixed_instant()).is_none());

        let empty_code = raw(json!({"codigoExterno": "  ", "valorBase": 1.0}));
        assert!(ProductRecord::from_raw(&empty_code, fixed_instant()).is_none());

        let null_code = raw(json!({"codigoExterno": null, "valorBase": 1.0}));
        assert!(ProductRecord::from_raw(&null_code, fixed_instant()).is_none());
    }

    #[test]
    fn coercion_failures_default_to_zero() {
        let raw = raw(json!({
            "codigoExterno": "100",
            "valorBase": "not-a-price",
            "precoVenda": {"nested": true},
            "quantidadeEstoque": "many",
        }));

        let record = ProductRecord::from_raw(&raw, fixed_instant()).unwrap();
        assert_eq!(record.factory_price, 0.0);
        assert_eq!(record.stock_quantity, 0);
    }

    #[test]
    fn accepts_numbers_encoded_as_strings() {
        let raw = raw(json!({
            "codigoExterno": "100",
            "valorBase": "12.75",
            "quantidadeEstoque": "7",
        }));

        let record = ProductRecord::from_raw(&raw, fixed_instant()).unwrap();
        assert_eq!(record.factory_price, 12.75);
        assert_eq!(record.stock_quantity, 7);
    }

    #[test]
    fn price_prefers_valor_base_then_preco_venda() {
        let both = raw(json!({
            "codigoExterno": 1,
            "valorBase": 10.0,
            "precoVenda": 99.0,
        }));
        let record = ProductRecord::from_raw(&both, fixed_instant()).unwrap();
        assert_eq!(record.factory_price, 10.0);

        let fallback = raw(json!({
            "codigoExterno": 1,
            "precoVenda": 99.0,
        }));
        let record = ProductRecord::from_raw(&fallback, fixed_instant()).unwrap();
        assert_eq!(record.factory_price, 99.0);

        let unparseable_base = raw(json!({
            "codigoExterno": 1,
            "valorBase": "n/a",
            "precoVenda": "5.5",
        }));
        let record = ProductRecord::from_raw(&unparseable_base, fixed_instant()).unwrap();
        assert_eq!(record.factory_price, 5.5);
    }

    #[test]
    fn negative_stock_clamps_to_zero() {
        let raw = raw(json!({"codigoExterno": 1, "quantidadeEstoque": -3}));
        let record = ProductRecord::from_raw(&raw, fixed_instant()).unwrap();
        assert_eq!(record.stock_quantity, 0);
    }

    #[test]
    fn callback_wire_shape_uses_portuguese_keys() {
        let record = ProductRecord {
            gtin: "789".to_string(),
            code: "100".to_string(),
            description: "TESTE".to_string(),
            factory_price: 3.2,
            stock_quantity: 5,
            collected_at: fixed_instant(),
        };

        let value = serde_json::to_value(CallbackProduct::from(&record)).unwrap();
        assert_eq!(
            value,
            json!({
                "gtin": "789",
                "codigo": "100",
                "descricao": "TESTE",
                "preco_fabrica": 3.2,
                "estoque": 5,
            })
        );
    }
}
