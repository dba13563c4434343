//! The payment-method facade the host integrates against.
//!
//! Wraps the gateway client with the host-facing lifecycle: redirect
//! initiation, fee calculation, re-post throttling, and explicit rejections
//! for the operations a redirect gateway cannot perform.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, instrument};

use crate::client::{GatewayClient, PaymentRequest};
use crate::config::MerchantSettings;
use crate::errors::GatewayError;
use crate::fees;
use crate::orders::{Order, PaymentState};

/// Minimum order age before the buyer may be sent to the gateway again.
const RE_POST_GUARD_SECONDS: i64 = 5;

#[derive(Debug)]
pub struct PlatronProcessor {
    client: Arc<GatewayClient>,
    merchant: MerchantSettings,
    site_url: String,
}

impl PlatronProcessor {
    /// Fail fast on missing credentials rather than at the first redirect.
    pub fn new(
        client: Arc<GatewayClient>,
        merchant: MerchantSettings,
        site_url: String,
    ) -> Result<Self, GatewayError> {
        if merchant.merchant_id.trim().is_empty() {
            return Err(GatewayError::ConfigurationMissing("merchant_id".into()));
        }
        if merchant.secret_key.trim().is_empty() {
            return Err(GatewayError::ConfigurationMissing("secret_key".into()));
        }
        Ok(Self {
            client,
            merchant,
            site_url,
        })
    }

    pub fn merchant(&self) -> &MerchantSettings {
        &self.merchant
    }

    /// Accept the payment locally; the money moves later, via redirect.
    pub fn process_payment(&self) -> PaymentState {
        PaymentState::Pending
    }

    /// Build the signed redirect form for the buyer's browser to post.
    pub fn payment_request(&self, order: &Order) -> PaymentRequest {
        self.client
            .build_initiation_request(order, &self.merchant, &self.site_url)
    }

    /// Send the buyer to the gateway: build the signed initiation and post it.
    #[instrument(skip(self, order), fields(order_id = order.id))]
    pub async fn post_process_payment(&self, order: &Order) -> Result<(), GatewayError> {
        let request = self.payment_request(order);
        self.client.send_initiation(&request).await?;
        info!(order_id = order.id, "Payment initiation posted to gateway");
        Ok(())
    }

    pub fn additional_handling_fee(&self, cart_total: Decimal) -> Decimal {
        fees::additional_handling_fee(
            cart_total,
            self.merchant.additional_fee,
            self.merchant.additional_fee_percentage,
        )
    }

    /// Whether the buyer may retry the redirect for this order. Orders
    /// younger than the guard window are still assumed to be mid-redirect.
    pub fn can_re_post_payment(&self, order: &Order) -> bool {
        let age = Utc::now().signed_duration_since(order.created_at);
        age.num_seconds() >= RE_POST_GUARD_SECONDS
    }

    pub fn capture(&self) -> Result<(), GatewayError> {
        Err(GatewayError::UnsupportedOperation(
            "Capture method not supported",
        ))
    }

    pub fn refund(&self) -> Result<(), GatewayError> {
        Err(GatewayError::UnsupportedOperation(
            "Refund method not supported",
        ))
    }

    pub fn void_payment(&self) -> Result<(), GatewayError> {
        Err(GatewayError::UnsupportedOperation(
            "Void method not supported",
        ))
    }

    pub fn process_recurring_payment(&self) -> Result<(), GatewayError> {
        Err(GatewayError::UnsupportedOperation(
            "Recurring payment not supported",
        ))
    }

    pub fn cancel_recurring_payment(&self) -> Result<(), GatewayError> {
        Err(GatewayError::UnsupportedOperation(
            "Recurring payment not supported",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayEndpoints;
    use crate::orders::test_order;
    use assert_matches::assert_matches;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn merchant() -> MerchantSettings {
        MerchantSettings {
            merchant_id: "1234".into(),
            secret_key: "secret".into(),
            testing_mode: false,
            description_template: String::new(),
            additional_fee: dec!(10),
            additional_fee_percentage: true,
        }
    }

    fn processor(merchant: MerchantSettings) -> Result<PlatronProcessor, GatewayError> {
        PlatronProcessor::new(
            Arc::new(GatewayClient::new(GatewayEndpoints::default())),
            merchant,
            "https://shop.example".into(),
        )
    }

    #[test]
    fn missing_credentials_fail_construction() {
        let mut m = merchant();
        m.merchant_id = "  ".into();
        assert_matches!(processor(m), Err(GatewayError::ConfigurationMissing(f)) if f == "merchant_id");

        let mut m = merchant();
        m.secret_key = String::new();
        assert_matches!(processor(m), Err(GatewayError::ConfigurationMissing(f)) if f == "secret_key");
    }

    #[test]
    fn new_payments_start_pending() {
        let p = processor(merchant()).unwrap();
        assert_eq!(p.process_payment(), PaymentState::Pending);
    }

    #[test]
    fn fee_follows_merchant_settings() {
        let p = processor(merchant()).unwrap();
        assert_eq!(p.additional_handling_fee(dec!(200)), dec!(20));
    }

    #[test]
    fn re_post_waits_out_the_guard_window() {
        let p = processor(merchant()).unwrap();

        let mut fresh = test_order(PaymentState::Pending);
        fresh.created_at = Utc::now();
        assert!(!p.can_re_post_payment(&fresh));

        let mut old = test_order(PaymentState::Pending);
        old.created_at = Utc::now() - Duration::seconds(RE_POST_GUARD_SECONDS + 1);
        assert!(p.can_re_post_payment(&old));
    }

    #[test]
    fn unsupported_operations_report_fixed_messages() {
        let p = processor(merchant()).unwrap();

        assert_matches!(p.capture(), Err(GatewayError::UnsupportedOperation("Capture method not supported")));
        assert_matches!(p.refund(), Err(GatewayError::UnsupportedOperation("Refund method not supported")));
        assert_matches!(p.void_payment(), Err(GatewayError::UnsupportedOperation("Void method not supported")));
        assert_matches!(
            p.process_recurring_payment(),
            Err(GatewayError::UnsupportedOperation("Recurring payment not supported"))
        );
        assert_matches!(
            p.cancel_recurring_payment(),
            Err(GatewayError::UnsupportedOperation("Recurring payment not supported"))
        );
    }
}
