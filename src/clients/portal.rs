use async_trait::async_trait;
use chrono::Utc;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;
use rquest::{Client, RequestBuilder, Response};
use rquest_util::Emulation;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

use crate::config::PortalConfig;
use crate::error::{Error, Result};
use crate::models::{OrderPayload, OrderResponse, SearchResponse, PAGE_SIZE};

/// Anything that can run one page of the portal product search. The portal
/// client is the production implementation; tests substitute fakes.
#[async_trait]
pub trait ProductSearch: Send + Sync {
    async fn search(&self, filter: &str, page: u32) -> Result<SearchResponse>;
}

/// Authenticated transport to the distributor portal. Sessions are built
/// from pre-issued tokens; an expired token surfaces as 401/403 on first
/// use rather than being probed upfront.
pub struct PortalClient {
    client: Client,
    headers: HeaderMap,
    config: PortalConfig,
}

impl PortalClient {
    pub fn new(config: &PortalConfig) -> Result<Self> {
        config.validate()?;

        let headers = build_headers(config)?;

        debug!(
            base_url = %config.base_url,
            logged_user = config.logged_user,
            "Creating portal client"
        );

        // A single stable profile: rotating fingerprints mid-session would
        // not match the session the tokens were issued for.
        let client = Client::builder()
            .emulation(Emulation::Chrome133)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            headers,
            config: config.clone(),
        })
    }

    pub async fn search_products(&self, filter: &str, page: u32) -> Result<SearchResponse> {
        let url = format!(
            "{}/api/carrinho/oculto?siteVersion={}",
            self.config.base_url, self.config.site_version
        );
        let payload = search_payload(&self.config, filter, page);

        debug!(filter, page, "Requesting product page");

        let body = serde_json::to_vec(&payload)?;
        let response = self.post(&url).body(body).send().await?;
        self.decode("carrinho/oculto", response).await
    }

    pub async fn transmit_order(&self, payload: &OrderPayload) -> Result<OrderResponse> {
        let url = format!("{}/api/Pedido/TrasmitirPedido", self.config.base_url);

        debug!(items = payload.itens.len(), "Transmitting order");

        let body = serde_json::to_vec(payload)?;
        let response = self.post(&url).body(body).send().await?;
        self.decode("Pedido/TrasmitirPedido", response).await
    }

    pub fn client_id(&self) -> i64 {
        self.config.client_id
    }

    pub fn logged_user(&self) -> i64 {
        self.config.logged_user
    }

    fn post(&self, url: &str) -> RequestBuilder {
        let mut request = self.client.post(url);

        for (key, value) in self.headers.iter() {
            request = request.header(key, value);
        }

        // The portal rejects requests whose clock marker is stale, so it is
        // stamped per request rather than stored with the session headers.
        request.header("x-peperone", Utc::now().timestamp_millis().to_string())
    }

    async fn decode<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        response: Response,
    ) -> Result<T> {
        let status = response.status();
        if status != StatusCode::OK {
            error!(endpoint, status = status.as_u16(), "Portal request failed");
            return Err(Error::PortalStatus {
                endpoint,
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        match serde_json::from_slice(&bytes) {
            Ok(parsed) => Ok(parsed),
            Err(e) => {
                error!(
                    endpoint,
                    error = %e,
                    body = %String::from_utf8_lossy(&bytes[..bytes.len().min(500)]),
                    "Failed to parse portal response"
                );
                Err(Error::Json(e))
            }
        }
    }
}

#[async_trait]
impl ProductSearch for PortalClient {
    async fn search(&self, filter: &str, page: u32) -> Result<SearchResponse> {
        self.search_products(filter, page).await
    }
}

fn build_headers(config: &PortalConfig) -> Result<HeaderMap> {
    let entries = [
        ("accept", "application/json, text/plain, */*".to_string()),
        ("content-type", "application/json".to_string()),
        ("contenttype", "application/json".to_string()),
        ("accesstoken", config.access_token.clone()),
        ("loggeduser", config.logged_user.to_string()),
        ("origin", config.portal_url.clone()),
        ("referer", format!("{}/", config.portal_url)),
        ("x-cart", config.x_cart.clone()),
        (
            "cookie",
            format!(
                "accesstoken={}; sessiontoken={}",
                config.access_token, config.session_token
            ),
        ),
    ];

    let mut headers = HeaderMap::new();
    for (name, value) in entries {
        let header_value =
            HeaderValue::from_str(&value).map_err(|_| Error::InvalidHeader(name))?;
        headers.insert(HeaderName::from_static(name), header_value);
    }

    Ok(headers)
}

/// Fixed-shape search body. Everything except the filter, page, account
/// identifiers and user list is a constant the portal requires verbatim.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchPayload {
    filtro: String,
    pagina: u32,
    registros_por_pagina: u32,
    ordenar_decrescente: bool,
    coluna_ordenacao: String,
    cliente_id: i64,
    tipo_venda_id: u32,
    fabricante_id_filtro: u32,
    p_i_id_filtro: u32,
    #[serde(rename = "cestaPPFiltro")]
    cesta_pp_filtro: bool,
    codigo_externo: u32,
    codigo_usuario: i64,
    promocao_selecionada: String,
    indicador_tipo_usuario: String,
    kind_user: u32,
    xlsx: Vec<Value>,
    principio_ativo: String,
    master: bool,
    kind_seller: u32,
    grupo_economico: String,
    users: Vec<i64>,
    list: bool,
}

fn search_payload(config: &PortalConfig, filter: &str, page: u32) -> SearchPayload {
    SearchPayload {
        filtro: filter.to_string(),
        pagina: page,
        registros_por_pagina: PAGE_SIZE,
        ordenar_decrescente: false,
        coluna_ordenacao: "nenhuma".to_string(),
        cliente_id: config.client_id,
        tipo_venda_id: 1,
        fabricante_id_filtro: 0,
        p_i_id_filtro: 0,
        cesta_pp_filtro: false,
        codigo_externo: 0,
        codigo_usuario: config.logged_user,
        promocao_selecionada: String::new(),
        indicador_tipo_usuario: "CLI".to_string(),
        kind_user: 0,
        xlsx: Vec::new(),
        principio_ativo: String::new(),
        master: false,
        kind_seller: 0,
        grupo_economico: String::new(),
        users: config.payload_users(),
        list: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_config() -> PortalConfig {
        PortalConfig {
            access_token: "token-a".to_string(),
            session_token: "token-s".to_string(),
            logged_user: 267511,
            client_id: 267511,
            x_cart: "cart-77".to_string(),
            ..PortalConfig::default()
        }
    }

    #[test]
    fn missing_access_token_fails_before_any_client_is_built() {
        let config = PortalConfig {
            access_token: String::new(),
            ..test_config()
        };

        assert!(matches!(
            PortalClient::new(&config),
            Err(Error::MissingSetting("portal.access_token"))
        ));
    }

    #[test]
    fn headers_carry_tokens_and_cookies() {
        let headers = build_headers(&test_config()).unwrap();

        assert_eq!(headers.get("accesstoken").unwrap(), "token-a");
        assert_eq!(headers.get("loggeduser").unwrap(), "267511");
        assert_eq!(headers.get("x-cart").unwrap(), "cart-77");
        assert_eq!(
            headers.get("cookie").unwrap(),
            "accesstoken=token-a; sessiontoken=token-s"
        );
        assert_eq!(
            headers.get("origin").unwrap(),
            "https://pedidoeletronico.servimed.com.br"
        );
    }

    #[test]
    fn control_characters_in_tokens_are_rejected() {
        let config = PortalConfig {
            access_token: "bad\ntoken".to_string(),
            ..test_config()
        };

        assert!(matches!(
            build_headers(&config),
            Err(Error::InvalidHeader("accesstoken"))
        ));
    }

    #[test]
    fn search_payload_matches_portal_contract() {
        let value = serde_json::to_value(search_payload(&test_config(), "dipirona", 3)).unwrap();

        assert_eq!(value["filtro"], json!("dipirona"));
        assert_eq!(value["pagina"], json!(3));
        assert_eq!(value["registrosPorPagina"], json!(25));
        assert_eq!(value["ordenarDecrescente"], json!(false));
        assert_eq!(value["colunaOrdenacao"], json!("nenhuma"));
        assert_eq!(value["clienteId"], json!(267511));
        assert_eq!(value["tipoVendaId"], json!(1));
        assert_eq!(value["fabricanteIdFiltro"], json!(0));
        assert_eq!(value["pIIdFiltro"], json!(0));
        assert_eq!(value["cestaPPFiltro"], json!(false));
        assert_eq!(value["codigoExterno"], json!(0));
        assert_eq!(value["codigoUsuario"], json!(267511));
        assert_eq!(value["indicadorTipoUsuario"], json!("CLI"));
        assert_eq!(value["kindUser"], json!(0));
        assert_eq!(value["xlsx"], json!([]));
        assert_eq!(value["principioAtivo"], json!(""));
        assert_eq!(value["master"], json!(false));
        assert_eq!(value["kindSeller"], json!(0));
        assert_eq!(value["grupoEconomico"], json!(""));
        assert_eq!(value["users"], json!([267511]));
        assert_eq!(value["list"], json!(true));
    }
}
