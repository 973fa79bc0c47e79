use serde_json::Value;
use sha2::{Digest, Sha512};

use railbook_domain::error::BookingError;

/// Provider notification after field normalization. The provider encodes
/// `status_code` and `gross_amount` as either strings or numbers depending
/// on delivery path; both are carried here as the exact strings the
/// signature was computed over.
#[derive(Debug, Clone)]
pub struct PaymentNotification {
    pub order_id: String,
    pub status_code: String,
    pub gross_amount: String,
    pub signature_key: String,
    pub transaction_status: String,
}

impl PaymentNotification {
    /// Read the raw payload defensively. Missing `order_id` or
    /// `signature_key` is a validation failure; the other fields normalize
    /// to empty strings and fail signature verification downstream.
    pub fn from_payload(payload: &Value) -> Result<Self, BookingError> {
        let order_id = str_field(payload, "order_id");
        let signature_key = str_field(payload, "signature_key");

        if order_id.is_empty() || signature_key.is_empty() {
            return Err(BookingError::validation(
                "payload missing order_id or signature_key",
            ));
        }

        Ok(Self {
            order_id,
            status_code: numeric_or_string(payload.get("status_code"), false),
            gross_amount: numeric_or_string(payload.get("gross_amount"), true),
            signature_key,
            transaction_status: str_field(payload, "transaction_status"),
        })
    }

    /// Integrity check: SHA-512 over order_id + status_code + gross_amount
    /// + server_key, hex-encoded, must equal the payload's signature_key.
    pub fn verify_signature(&self, server_key: &str) -> bool {
        let expected = signature(
            &self.order_id,
            &self.status_code,
            &self.gross_amount,
            server_key,
        );
        expected == self.signature_key
    }
}

pub fn signature(order_id: &str, status_code: &str, gross_amount: &str, server_key: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(order_id.as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(server_key.as_bytes());
    hex::encode(hasher.finalize())
}

fn str_field(payload: &Value, key: &str) -> String {
    payload
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Accept a field sent as string or number. Amounts are formatted without
/// decimals, matching how the provider renders them into the signature.
fn numeric_or_string(value: Option<&Value>, amount: bool) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(f) = n.as_f64() {
                if amount {
                    format!("{:.0}", f)
                } else {
                    f.to_string()
                }
            } else {
                String::new()
            }
        }
        _ => String::new(),
    }
}
