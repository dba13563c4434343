//! Result-callback processing: the gateway's authoritative server-to-server
//! payment notification.
//!
//! The processor resolves the order, dumps the raw parameters into the
//! order's audit trail, verifies the detached signature, and only then acts
//! on the reported result. Every outcome, including rejections, is answered
//! with a signed acknowledgement envelope so the gateway stops retrying.

use std::sync::Arc;

use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::config::MerchantSettings;
use crate::envelope;
use crate::errors::GatewayError;
use crate::orders::OrderService;
use crate::signature;

const AUDIT_NOTE_HEADER: &str = "Platron:";

pub struct CallbackProcessor {
    orders: Arc<dyn OrderService>,
    merchant: MerchantSettings,
}

impl CallbackProcessor {
    pub fn new(orders: Arc<dyn OrderService>, merchant: MerchantSettings) -> Self {
        Self { orders, merchant }
    }

    /// Process a result callback and produce the XML acknowledgement body.
    ///
    /// `request_path` is the path the gateway actually posted to; its last
    /// segment keys the signature on both verification and the answer.
    /// Duplicate-key form bodies are preserved as ordered pairs so the audit
    /// note and the signature see exactly what arrived.
    #[instrument(skip(self, form), fields(path = %request_path))]
    pub async fn process(
        &self,
        request_path: &str,
        form: &[(String, String)],
    ) -> Result<String, GatewayError> {
        let script = signature::script_name(request_path);

        let order_token = field(form, "pg_order_id").unwrap_or_default();
        let claimed_sig = field(form, "pg_sig").unwrap_or_default();
        let result = field(form, "pg_result").unwrap_or_default();

        let order = match Uuid::parse_str(order_token) {
            Ok(token) => self.orders.order_by_token(token).await,
            Err(_) => None,
        };
        let Some(order) = order else {
            return Ok(self.respond(false, "Order cannot be loaded", &script));
        };

        // Raw parameter dump goes on the audit trail before any verification,
        // so rejected callbacks still leave a trace on the order.
        self.orders
            .add_order_note(order.token, audit_note(form))
            .await?;

        let unsigned: Vec<(String, String)> = form
            .iter()
            .filter(|(k, _)| k != "pg_sig")
            .cloned()
            .collect();
        if !signature::verify(&script, &unsigned, &self.merchant.secret_key, claimed_sig) {
            return Ok(self.respond(false, "Invalid order data", &script));
        }

        if result == "0" {
            info!(order_id = order.id, "Callback reported cancelled payment");
            return Ok(self.respond(true, "The payment has been canceled", &script));
        }

        if self.orders.can_mark_paid(order.token).await {
            self.orders.mark_paid(order.token).await?;
            info!(order_id = order.id, "Callback marked order paid");
        }
        Ok(self.respond(true, "The order has been paid", &script))
    }

    fn respond(&self, success: bool, text: &str, script: &str) -> String {
        if !success {
            error!("Platron. {}", text);
        }
        envelope::ack(success, text, script, &self.merchant.secret_key)
    }
}

fn field<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
    form.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

fn audit_note(form: &[(String, String)]) -> String {
    let mut note = String::from(AUDIT_NOTE_HEADER);
    note.push('\n');
    for (key, value) in form {
        note.push_str(key);
        note.push_str(": ");
        note.push_str(value);
        note.push('\n');
    }
    note
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::{test_order, InMemoryOrderService, Order, PaymentState};

    const SECRET: &str = "secret";
    const PATH: &str = "/platron/confirm";

    fn processor_with(order: Order) -> (Arc<InMemoryOrderService>, CallbackProcessor) {
        let store = Arc::new(InMemoryOrderService::new());
        store.insert(order);
        let merchant = MerchantSettings {
            merchant_id: "1234".into(),
            secret_key: SECRET.into(),
            testing_mode: false,
            description_template: String::new(),
            additional_fee: rust_decimal_macros::dec!(0),
            additional_fee_percentage: false,
        };
        let processor = CallbackProcessor::new(store.clone(), merchant);
        (store, processor)
    }

    fn signed_form(token: Uuid, result: &str) -> Vec<(String, String)> {
        let mut form = vec![
            ("pg_order_id".to_string(), token.to_string()),
            ("pg_payment_id".to_string(), "778899".to_string()),
            ("pg_result".to_string(), result.to_string()),
            ("pg_salt".to_string(), "13572468".to_string()),
        ];
        let sig = signature::sign("confirm", &form, SECRET);
        form.push(("pg_sig".to_string(), sig));
        form
    }

    #[tokio::test]
    async fn successful_callback_marks_order_paid_once() {
        let order = test_order(PaymentState::Pending);
        let token = order.token;
        let (store, processor) = processor_with(order);
        let form = signed_form(token, "1");

        let body = processor.process(PATH, &form).await.unwrap();
        assert!(body.contains("<pg_status>ok</pg_status>"));
        let stored = store.order_by_token(token).await.unwrap();
        assert_eq!(stored.payment_state, PaymentState::Paid);

        // duplicate delivery: same envelope, no second transition
        let body = processor.process(PATH, &form).await.unwrap();
        assert!(body.contains("<pg_status>ok</pg_status>"));
        let stored = store.order_by_token(token).await.unwrap();
        assert_eq!(stored.payment_state, PaymentState::Paid);
        assert_eq!(store.notes(token).len(), 2);
    }

    #[tokio::test]
    async fn cancelled_result_acknowledges_without_paying() {
        let order = test_order(PaymentState::Pending);
        let token = order.token;
        let (store, processor) = processor_with(order);

        let body = processor.process(PATH, &signed_form(token, "0")).await.unwrap();
        assert!(body.contains("<pg_status>ok</pg_status>"));
        let stored = store.order_by_token(token).await.unwrap();
        assert_eq!(stored.payment_state, PaymentState::Pending);
    }

    #[tokio::test]
    async fn tampered_signature_is_rejected_after_audit() {
        let order = test_order(PaymentState::Pending);
        let token = order.token;
        let (store, processor) = processor_with(order);

        let mut form = signed_form(token, "1");
        for (key, value) in form.iter_mut() {
            if key == "pg_result" {
                *value = "0".into();
            }
        }

        let body = processor.process(PATH, &form).await.unwrap();
        assert!(body.contains("<pg_status>error</pg_status>"));
        assert!(body.contains("<pg_error_description>Invalid order data</pg_error_description>"));

        let stored = store.order_by_token(token).await.unwrap();
        assert_eq!(stored.payment_state, PaymentState::Pending);
        // the audit note was written before the signature check failed
        assert_eq!(store.notes(token).len(), 1);
        assert!(store.notes(token)[0].note.starts_with("Platron:\n"));
    }

    #[tokio::test]
    async fn unknown_or_malformed_token_cannot_be_loaded() {
        let order = test_order(PaymentState::Pending);
        let token = order.token;
        let (store, processor) = processor_with(order);

        let form = vec![
            ("pg_order_id".to_string(), "not-a-guid".to_string()),
            ("pg_result".to_string(), "1".to_string()),
        ];
        let body = processor.process(PATH, &form).await.unwrap();
        assert!(body.contains("<pg_error_description>Order cannot be loaded</pg_error_description>"));

        let stranger = Uuid::new_v4();
        let body = processor.process(PATH, &signed_form(stranger, "1")).await.unwrap();
        assert!(body.contains("Order cannot be loaded"));

        // nothing mutated, no notes written
        let stored = store.order_by_token(token).await.unwrap();
        assert_eq!(stored.payment_state, PaymentState::Pending);
        assert!(store.notes(token).is_empty());
    }

    #[tokio::test]
    async fn already_paid_order_acknowledges_idempotently() {
        let order = test_order(PaymentState::Paid);
        let token = order.token;
        let (store, processor) = processor_with(order);

        let body = processor.process(PATH, &signed_form(token, "1")).await.unwrap();
        assert!(body.contains("<pg_status>ok</pg_status>"));
        let stored = store.order_by_token(token).await.unwrap();
        assert_eq!(stored.payment_state, PaymentState::Paid);
    }
}
