//! Envelope signing

use super::{UnsignedEnvelope, WorkflowError};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;
use std::time::Duration;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Produces the signature attached to a workflow envelope
#[async_trait]
pub trait EnvelopeSigner: Send + Sync {
    async fn sign(&self, envelope: &UnsignedEnvelope) -> Result<String, WorkflowError>;
}

/// Local HMAC-SHA256 over the serialized envelope
pub struct HmacSigner {
    secret: String,
}

impl HmacSigner {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn mac(&self, payload: &[u8]) -> Result<HmacSha256, WorkflowError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| WorkflowError::Signing(format!("Invalid HMAC key: {}", e)))?;
        mac.update(payload);
        Ok(mac)
    }

    /// Signature in `sha256=<hex>` form
    pub fn signature_for(&self, payload: &[u8]) -> Result<String, WorkflowError> {
        let mac = self.mac(payload)?;
        Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
    }

    /// Constant-time check of a `sha256=<hex>` signature
    pub fn verify(&self, payload: &[u8], signature: &str) -> bool {
        let Some(hex_sig) = signature.strip_prefix("sha256=") else {
            return false;
        };
        let Ok(expected) = hex::decode(hex_sig) else {
            return false;
        };
        match self.mac(payload) {
            Ok(mac) => mac.verify_slice(&expected).is_ok(),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl EnvelopeSigner for HmacSigner {
    async fn sign(&self, envelope: &UnsignedEnvelope) -> Result<String, WorkflowError> {
        let payload = serde_json::to_vec(envelope)?;
        self.signature_for(&payload)
    }
}

#[derive(Deserialize)]
struct SignatureResponse {
    signature: String,
}

/// Signing delegated to a remote endpoint that answers `{signature}`
pub struct RemoteSigner {
    http_client: Client,
    url: String,
    timeout: Duration,
}

impl RemoteSigner {
    pub fn new(http_client: Client, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http_client,
            url: url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl EnvelopeSigner for RemoteSigner {
    async fn sign(&self, envelope: &UnsignedEnvelope) -> Result<String, WorkflowError> {
        debug!(action = %envelope.action, "Requesting envelope signature");

        let response = self
            .http_client
            .post(&self.url)
            .json(envelope)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    WorkflowError::Signing(format!("signing timed out after {:?}", self.timeout))
                } else {
                    WorkflowError::Signing(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(WorkflowError::Signing(format!(
                "signing endpoint returned status {}",
                response.status()
            )));
        }

        let body: SignatureResponse = response
            .json()
            .await
            .map_err(|e| WorkflowError::Signing(format!("invalid signing response: {}", e)))?;

        Ok(body.signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn envelope() -> UnsignedEnvelope {
        UnsignedEnvelope {
            action: "health_check".to_string(),
            data: json!({}),
            timestamp: 1_700_000_000_000,
        }
    }

    #[tokio::test]
    async fn test_hmac_sign_and_verify() {
        let signer = HmacSigner::new("secret");
        let signature = signer.sign(&envelope()).await.unwrap();

        assert!(signature.starts_with("sha256="));
        assert_eq!(signature.len(), "sha256=".len() + 64);

        let payload = serde_json::to_vec(&envelope()).unwrap();
        assert!(signer.verify(&payload, &signature));
        assert!(!HmacSigner::new("other").verify(&payload, &signature));
        assert!(!signer.verify(&payload, "deadbeef"));
    }

    #[tokio::test]
    async fn test_remote_signer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sign"))
            .and(body_json(json!({
                "action": "health_check",
                "data": {},
                "timestamp": 1_700_000_000_000i64
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"signature": "sig-1"})))
            .mount(&server)
            .await;

        let signer = RemoteSigner::new(
            Client::new(),
            format!("{}/sign", server.uri()),
            Duration::from_secs(8),
        );

        assert_eq!(signer.sign(&envelope()).await.unwrap(), "sig-1");
    }

    #[tokio::test]
    async fn test_remote_signer_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let signer = RemoteSigner::new(Client::new(), server.uri(), Duration::from_secs(8));
        let err = signer.sign(&envelope()).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Signing(_)));
    }
}
