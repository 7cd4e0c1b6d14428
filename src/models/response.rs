use serde::Deserialize;
use serde_json::Value;

use super::product::{coerce_string, RawProduct};

/// Page size the portal search is asked for and usually honors.
pub const PAGE_SIZE: u32 = 25;

fn default_page_size() -> u32 {
    PAGE_SIZE
}

/// Envelope of `POST /api/carrinho/oculto`.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub lista: Vec<RawProduct>,
    #[serde(rename = "totalRegistros", default)]
    pub total_registros: u32,
    // The server's echo is authoritative for the page-fullness check.
    #[serde(rename = "registrosPorPagina", default = "default_page_size")]
    pub registros_por_pagina: u32,
}

/// Envelope of `POST /api/Pedido/TrasmitirPedido`. Anything other than
/// `executado == "Ok"` is a rejection.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderResponse {
    #[serde(default)]
    pub executado: String,
}

impl OrderResponse {
    pub fn accepted(&self) -> bool {
        self.executado == "Ok"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
}

/// `POST /pedido` on the callback API answers with the created resource;
/// the id has been observed both as a number and as a string.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedOrder {
    #[serde(default)]
    pub id: Value,
}

impl CreatedOrder {
    pub fn id_string(&self) -> String {
        coerce_string(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn search_response_parses_portal_envelope() {
        let body = json!({
            "lista": [
                {"codigoExterno": 1, "descricao": "A", "valorBase": 1.0},
                {"codigoExterno": "2", "descricao": "B", "valorBase": "2.0"},
            ],
            "totalRegistros": 57,
            "registrosPorPagina": 25,
        });

        let response: SearchResponse = serde_json::from_value(body).unwrap();
        assert_eq!(response.lista.len(), 2);
        assert_eq!(response.total_registros, 57);
        assert_eq!(response.registros_por_pagina, 25);
    }

    #[test]
    fn missing_page_size_defaults_to_contract_value() {
        let response: SearchResponse =
            serde_json::from_value(json!({"lista": [], "totalRegistros": 0})).unwrap();
        assert_eq!(response.registros_por_pagina, PAGE_SIZE);
    }

    #[test]
    fn order_acceptance_is_exact() {
        let ok: OrderResponse = serde_json::from_value(json!({"executado": "Ok"})).unwrap();
        assert!(ok.accepted());

        let rejected: OrderResponse =
            serde_json::from_value(json!({"executado": "Erro de validacao"})).unwrap();
        assert!(!rejected.accepted());

        let silent: OrderResponse = serde_json::from_value(json!({})).unwrap();
        assert!(!silent.accepted());
    }

    #[test]
    fn created_order_id_coerces_number_or_string() {
        let numeric: CreatedOrder = serde_json::from_value(json!({"id": 91})).unwrap();
        assert_eq!(numeric.id_string(), "91");

        let text: CreatedOrder = serde_json::from_value(json!({"id": "91"})).unwrap();
        assert_eq!(text.id_string(), "91");

        let missing: CreatedOrder = serde_json::from_value(json!({})).unwrap();
        assert_eq!(missing.id_string(), "");
    }
}
