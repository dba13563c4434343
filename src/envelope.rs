//! The gateway's XML envelope: lenient parsing of status-poll responses and
//! construction of signed callback acknowledgements.
//!
//! Parsing is deliberately forgiving: any defect in the body collapses to the
//! all-empty response, which callers treat as "status unknown". The protocol
//! is three fixed flat elements, so no XML machinery is needed here.

use crate::signature;

/// Parsed status-poll response.
///
/// All three fields are empty when the body could not be understood; callers
/// must treat that as unknown, never as success.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewayResponse {
    /// Request-level status: "ok" or "error"
    pub request_status: String,
    /// Transaction status vocabulary: partial, pending, ok, failed, revoked
    pub transaction_status: String,
    /// Populated when request_status is "error"
    pub error_description: String,
}

impl GatewayResponse {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_ok(&self) -> bool {
        self.request_status == "ok"
    }
}

/// Parse a status-poll body. Returns the empty triple when the body carries
/// no XML declaration, lacks a `pg_status` element, or is otherwise
/// malformed - poll failures are inert for the caller.
pub fn parse_status_body(body: &str) -> GatewayResponse {
    if !body.contains("?xml") {
        return GatewayResponse::empty();
    }

    let Some(request_status) = extract_element(body, "pg_status") else {
        return GatewayResponse::empty();
    };

    GatewayResponse {
        request_status,
        transaction_status: extract_element(body, "pg_transaction_status").unwrap_or_default(),
        error_description: extract_element(body, "pg_error_description").unwrap_or_default(),
    }
}

/// Build the signed acknowledgement envelope returned for every callback
/// outcome. The gateway verifies `pg_sig` on its side, so the envelope is
/// signed with the same codec keyed on the callback script name.
pub fn ack(success: bool, text: &str, script_name: &str, secret_key: &str) -> String {
    let status = if success { "ok" } else { "error" };

    let mut fields: Vec<(String, String)> = vec![
        ("pg_status".to_string(), status.to_string()),
        ("pg_salt".to_string(), signature::random_digit_code(8)),
    ];
    if !success {
        fields.push(("pg_error_description".to_string(), text.to_string()));
    }

    let sig = signature::sign(script_name, &fields, secret_key);
    fields.push(("pg_sig".to_string(), sig));

    let content: String = fields
        .iter()
        .map(|(key, value)| format!("<{0}>{1}</{0}>", key, value))
        .collect();

    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?><response>{}</response>",
        content
    )
}

fn extract_element(body: &str, name: &str) -> Option<String> {
    let open = format!("<{}>", name);
    let close = format!("</{}>", name);
    let start = body.find(&open)? + open.len();
    let end = body[start..].find(&close)? + start;
    Some(body[start..end].to_string())
}
