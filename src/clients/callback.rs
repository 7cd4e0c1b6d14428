use http::StatusCode;
use rquest::{Client, Response};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::CallbackConfig;
use crate::error::{Error, Result};
use crate::models::{CallbackProduct, CreatedOrder, OrderConfirmation, ProductRecord, TokenResponse};

const USER_AGENT: &str = "servimed-etl/0.1";

/// Client for the callback API that receives scraped products and order
/// confirmations. Authenticates with an OAuth2 password grant; every other
/// call carries the bearer token.
pub struct CallbackClient {
    client: Client,
    config: CallbackConfig,
    token: Option<String>,
}

impl CallbackClient {
    pub fn new(config: &CallbackConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            config: config.clone(),
            token: None,
        })
    }

    /// Signs up (best effort) and fetches a bearer token. The signup result
    /// never decides the outcome; the token endpoint does.
    pub async fn authenticate(&mut self) -> Result<()> {
        self.signup().await;

        let form = [
            ("username", self.config.username.as_str()),
            ("password", self.config.password.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("grant_type", "password"),
        ];

        let response = self
            .client
            .post(format!("{}/oauth/token", self.config.base_url))
            .header("user-agent", USER_AGENT)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            error!(status = status.as_u16(), "Callback authentication failed");
            return Err(Error::Callback(format!(
                "token endpoint returned HTTP {}",
                status.as_u16()
            )));
        }

        let bytes = response.bytes().await?;
        let token: TokenResponse = serde_json::from_slice(&bytes)?;
        self.token = Some(token.access_token);

        info!(username = %self.config.username, "Authenticated against callback API");
        Ok(())
    }

    async fn signup(&self) {
        // The API answers 409 for an existing user, which is as good as a
        // successful signup here.
        let body = serde_json::json!({
            "username": self.config.username,
            "password": self.config.password,
            "email": self.config.username,
        });

        let result = self
            .client
            .post(format!("{}/oauth/signup", self.config.base_url))
            .header("user-agent", USER_AGENT)
            .header("content-type", "application/json")
            .body(body.to_string())
            .send()
            .await;

        match result {
            Ok(response) if response.status() == StatusCode::CONFLICT => {
                debug!("Callback user already exists");
            }
            Ok(response) if response.status().is_success() => {
                debug!("Callback user created");
            }
            Ok(response) => {
                warn!(status = response.status().as_u16(), "Callback signup refused");
            }
            Err(e) => {
                warn!(error = %e, "Callback signup unreachable");
            }
        }
    }

    /// Pushes a full scrape result to `POST /produto`. Returns how many
    /// records were delivered; an empty batch is a no-op.
    pub async fn send_products(&self, records: &[ProductRecord]) -> Result<usize> {
        if records.is_empty() {
            debug!("No records to deliver");
            return Ok(0);
        }

        let bearer = self.bearer()?;
        let body: Vec<CallbackProduct> = records.iter().map(CallbackProduct::from).collect();

        debug!(count = body.len(), "Delivering products to callback API");

        let response = self
            .client
            .post(format!("{}/produto", self.config.base_url))
            .header("user-agent", USER_AGENT)
            .header("content-type", "application/json")
            .bearer_auth(bearer)
            .body(serde_json::to_vec(&body)?)
            .send()
            .await?;

        expect_status("produto", response, &[StatusCode::OK, StatusCode::CREATED]).await?;

        info!(count = records.len(), "Products delivered");
        Ok(records.len())
    }

    /// Creates the order resource the confirmation will be patched onto.
    pub async fn create_order(&self) -> Result<String> {
        let bearer = self.bearer()?;

        let response = self
            .client
            .post(format!("{}/pedido", self.config.base_url))
            .header("user-agent", USER_AGENT)
            .header("content-type", "application/json")
            .bearer_auth(bearer)
            .body("{}")
            .send()
            .await?;

        let response = expect_status("pedido", response, &[StatusCode::CREATED]).await?;

        let bytes = response.bytes().await?;
        let created: CreatedOrder = serde_json::from_slice(&bytes)?;
        let id = created.id_string();
        if id.is_empty() {
            return Err(Error::Callback("order id missing from response".to_string()));
        }

        debug!(order_id = %id, "Callback order created");
        Ok(id)
    }

    pub async fn confirm_order(
        &self,
        order_id: &str,
        confirmation: &OrderConfirmation,
    ) -> Result<()> {
        let bearer = self.bearer()?;

        let response = self
            .client
            .patch(format!("{}/pedido/{}", self.config.base_url, order_id))
            .header("user-agent", USER_AGENT)
            .header("content-type", "application/json")
            .bearer_auth(bearer)
            .body(serde_json::to_vec(confirmation)?)
            .send()
            .await?;

        expect_status(
            "pedido (PATCH)",
            response,
            &[StatusCode::OK, StatusCode::CREATED, StatusCode::NO_CONTENT],
        )
        .await?;

        info!(order_id, code = %confirmation.codigo_confirmacao, "Order confirmed on callback API");
        Ok(())
    }

    fn bearer(&self) -> Result<&str> {
        self.token
            .as_deref()
            .ok_or_else(|| Error::Callback("not authenticated; call authenticate first".to_string()))
    }
}

async fn expect_status(
    endpoint: &'static str,
    response: Response,
    accepted: &[StatusCode],
) -> Result<Response> {
    let status = response.status();
    if accepted.contains(&status) {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    error!(
        endpoint,
        status = status.as_u16(),
        body = %body.chars().take(300).collect::<String>(),
        "Callback request failed"
    );

    Err(Error::Callback(format!(
        "{endpoint} returned HTTP {}",
        status.as_u16()
    )))
}
