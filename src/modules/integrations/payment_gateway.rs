//! Hosted-checkout payment gateway client and webhook signature checks.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;
use thiserror::Error;

use crate::domain::DomainError;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "Gateway-Signature";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub amount: i64,
    pub currency: String,
    pub reference: String,
    pub description: String,
    pub customer_email: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, DomainError>;
}

pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl HttpPaymentGateway {
    pub fn new(base_url: &str, secret_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, DomainError> {
        let url = format!("{}/v1/checkout/sessions", self.base_url);
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .json(request)
            .send()
            .await
            .map_err(|e| DomainError::External(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(DomainError::External(format!(
                "Payment gateway error: {} {}",
                status, body
            )));
        }

        res.json::<CheckoutSession>()
            .await
            .map_err(|e| DomainError::External(format!("Invalid gateway response: {}", e)))
    }
}

/// Webhook payload as delivered by the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookData {
    pub object: WebhookObject,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebhookObject {
    /// Checkout session id (or payment intent id for intent events)
    pub id: String,
    pub session_id: Option<String>,
    pub payment_id: Option<String>,
    pub metadata: Value,
}

impl WebhookObject {
    /// The checkout session this object refers to.
    pub fn checkout_session_id(&self) -> &str {
        self.session_id.as_deref().unwrap_or(&self.id)
    }

    /// The provider payment this object refers to; intent events carry it as their own id.
    pub fn provider_payment_id(&self) -> &str {
        self.payment_id.as_deref().unwrap_or(&self.id)
    }

    pub fn reference(&self) -> Option<&str> {
        self.metadata.get("reference").and_then(Value::as_str)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing or malformed signature header")]
    Malformed,
    #[error("signature timestamp outside tolerance")]
    Expired,
    #[error("signature mismatch")]
    Mismatch,
    #[error("webhook secret is not a usable HMAC key")]
    InvalidKey,
}

fn mac_for(secret: &str, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, SignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::InvalidKey)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Builds a `t=<ts>,v1=<hex>` header value for `payload`.
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String, SignatureError> {
    let signature = hex::encode(mac_for(secret, timestamp, payload)?.finalize().into_bytes());
    Ok(format!("t={},v1={}", timestamp, signature))
}

pub fn verify_signature(
    secret: &str,
    header: &str,
    payload: &[u8],
    now: i64,
    tolerance_secs: i64,
) -> Result<(), SignatureError> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<Vec<u8>> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if signatures.is_empty() {
        return Err(SignatureError::Malformed);
    }
    if (now - timestamp).abs() > tolerance_secs {
        return Err(SignatureError::Expired);
    }

    let mac = mac_for(secret, timestamp, payload)?;
    let matched = signatures
        .iter()
        .any(|signature| mac.clone().verify_slice(signature).is_ok());

    if matched {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";

    #[test]
    fn accepts_freshly_signed_payload() {
        let body = br#"{"id":"evt_1"}"#;
        let header = sign_payload(SECRET, 1_700_000_000, body).unwrap();
        assert_eq!(
            verify_signature(SECRET, &header, body, 1_700_000_030, 300),
            Ok(())
        );
    }

    #[test]
    fn rejects_tampered_body_and_wrong_secret() {
        let header = sign_payload(SECRET, 1_700_000_000, b"original").unwrap();
        assert_eq!(
            verify_signature(SECRET, &header, b"tampered", 1_700_000_000, 300),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            verify_signature("other", &header, b"original", 1_700_000_000, 300),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_stale_and_malformed_headers() {
        let header = sign_payload(SECRET, 1_700_000_000, b"x").unwrap();
        assert_eq!(
            verify_signature(SECRET, &header, b"x", 1_700_000_301, 300),
            Err(SignatureError::Expired)
        );
        assert_eq!(
            verify_signature(SECRET, "v1=abcd", b"x", 0, 300),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verify_signature(SECRET, "t=1", b"x", 1, 300),
            Err(SignatureError::Malformed)
        );
    }

    #[test]
    fn webhook_object_falls_back_to_id_for_session() {
        let event: WebhookEvent = serde_json::from_str(
            r#"{"id":"evt_1","type":"checkout.session.completed",
                "data":{"object":{"id":"cs_123","metadata":{"reference":"ref-1"}}}}"#,
        )
        .unwrap();
        assert_eq!(event.data.object.checkout_session_id(), "cs_123");
        assert_eq!(event.data.object.reference(), Some("ref-1"));
    }

    #[test]
    fn intent_objects_identify_the_payment_by_id() {
        let intent = WebhookObject {
            id: "pi_42".into(),
            ..Default::default()
        };
        assert_eq!(intent.provider_payment_id(), "pi_42");

        let charge = WebhookObject {
            id: "ch_1".into(),
            payment_id: Some("pi_42".into()),
            ..Default::default()
        };
        assert_eq!(charge.provider_payment_id(), "pi_42");
    }
}
