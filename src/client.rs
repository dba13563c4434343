//! Outbound side of the gateway protocol: building the signed redirect
//! payment initiation and polling the status endpoint.

use rust_decimal::Decimal;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::config::{GatewayEndpoints, MerchantSettings};
use crate::envelope::{self, GatewayResponse};
use crate::errors::GatewayError;
use crate::orders::Order;
use crate::signature::{self, random_digit_code};

const SALT_DIGITS: usize = 8;

/// A fully-formed, signed parameter set bound for a gateway endpoint.
/// Serializable so the storefront can render it as an auto-posting form.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PaymentRequest {
    pub url: String,
    pub fields: Vec<(String, String)>,
}

impl PaymentRequest {
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Client for the gateway's payment-initiation and status endpoints.
#[derive(Debug)]
pub struct GatewayClient {
    http: reqwest::Client,
    endpoints: GatewayEndpoints,
}

impl GatewayClient {
    pub fn new(endpoints: GatewayEndpoints) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoints,
        }
    }

    /// Build the signed payment-initiation request for an order.
    ///
    /// Pure construction: the amount is rendered with exactly two dot-decimal
    /// digits, the description comes from the merchant template with
    /// `$orderId` substituted, and a fresh 8-digit salt keeps the signature
    /// unique to this request. Posting it is a separate concern.
    pub fn build_initiation_request(
        &self,
        order: &Order,
        merchant: &MerchantSettings,
        site_url: &str,
    ) -> PaymentRequest {
        let site = site_url.trim_end_matches('/');
        let description = merchant
            .template()
            .replace("$orderId", &order.id.to_string());

        let mut fields: Vec<(String, String)> = vec![
            ("pg_merchant_id".into(), merchant.merchant_id.clone()),
            ("pg_order_id".into(), order.token.to_string()),
            ("pg_currency".into(), order.currency.clone()),
            ("pg_amount".into(), format_amount(order.total)),
            ("pg_description".into(), description),
            ("pg_salt".into(), random_digit_code(SALT_DIGITS)),
            ("pg_request_method".into(), "POST".into()),
            ("pg_success_url_method".into(), "GET".into()),
            ("pg_failure_url_method".into(), "GET".into()),
            (
                "pg_testing_mode".into(),
                if merchant.testing_mode { "1" } else { "0" }.into(),
            ),
            // check callback suppressed
            ("pg_check_url".into(), String::new()),
            ("pg_site_url".into(), site.to_string()),
            ("pg_failure_url".into(), format!("{}/platron/cancel", site)),
            ("pg_success_url".into(), format!("{}/platron/success", site)),
            ("pg_result_url".into(), format!("{}/platron/confirm", site)),
        ];

        let script = signature::script_name(&self.endpoints.payment_url);
        let sig = signature::sign(&script, &fields, &merchant.secret_key);
        fields.push(("pg_sig".into(), sig));

        PaymentRequest {
            url: self.endpoints.payment_url.clone(),
            fields,
        }
    }

    /// POST a built initiation request to the gateway.
    #[instrument(skip(self, request), fields(url = %request.url))]
    pub async fn send_initiation(&self, request: &PaymentRequest) -> Result<(), GatewayError> {
        let response = self
            .http
            .post(&request.url)
            .form(&request.fields)
            .send()
            .await
            .map_err(|e| GatewayError::GatewayUnreachable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GatewayError::GatewayUnreachable(format!(
                "initiation endpoint answered {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Fetch the authoritative payment status for an order token.
    ///
    /// Poll failures are inert: transport errors, non-XML bodies, and
    /// missing elements all come back as the all-empty response, which
    /// callers treat as "unknown" and never as success.
    #[instrument(skip(self, merchant))]
    pub async fn poll_status(&self, order_token: Uuid, merchant: &MerchantSettings) -> GatewayResponse {
        let mut fields: Vec<(String, String)> = vec![
            ("pg_merchant_id".into(), merchant.merchant_id.clone()),
            ("pg_order_id".into(), order_token.to_string()),
            ("pg_salt".into(), random_digit_code(SALT_DIGITS)),
        ];
        let script = signature::script_name(&self.endpoints.status_url);
        let sig = signature::sign(&script, &fields, &merchant.secret_key);
        fields.push(("pg_sig".into(), sig));

        let response = match self
            .http
            .post(&self.endpoints.status_url)
            .form(&fields)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(%order_token, error = %e, "Status poll failed, treating as unknown");
                return GatewayResponse::empty();
            }
        };

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(%order_token, error = %e, "Status poll body unreadable, treating as unknown");
                return GatewayResponse::empty();
            }
        };

        let parsed = envelope::parse_status_body(&body);
        debug!(
            %order_token,
            request_status = %parsed.request_status,
            transaction_status = %parsed.transaction_status,
            "Status poll parsed"
        );
        parsed
    }
}

/// Locale-independent two-decimal amount rendering ("10.50", never "10,5").
fn format_amount(amount: Decimal) -> String {
    format!("{:.2}", amount)
}
