//! HTTP client for the workflow service

use super::signer::{EnvelopeSigner, HmacSigner, RemoteSigner};
use super::{
    actions, bounded, CallOptions, ResponseBody, SignedEnvelope, UnsignedEnvelope,
    WorkflowAction, WorkflowError,
};
use chrono::Utc;
use prospecta_common::config::WorkflowConfig;
use prospecta_common::{Error, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Workflow service client
pub struct WorkflowClient {
    http_client: Client,
    webhook_url: String,
    signer: Option<Arc<dyn EnvelopeSigner>>,
    timeout: Duration,
    batch_timeout: Duration,
    health_check_timeout: Duration,
}

impl WorkflowClient {
    /// Build the client from configuration.
    ///
    /// A signing endpoint takes precedence over a shared secret. With neither,
    /// envelopes are posted without a signature.
    pub fn new(config: &WorkflowConfig) -> Result<Self> {
        let http_client = Client::builder()
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        let signer: Option<Arc<dyn EnvelopeSigner>> =
            match (&config.signing_url, &config.signing_secret) {
                (Some(url), _) => Some(Arc::new(RemoteSigner::new(
                    http_client.clone(),
                    url.clone(),
                    Duration::from_secs(config.signing_timeout_secs),
                ))),
                (None, Some(secret)) => Some(Arc::new(HmacSigner::new(secret.clone()))),
                (None, None) => {
                    warn!("No workflow signing configured; envelopes will be unsigned");
                    None
                }
            };

        Ok(Self {
            http_client,
            webhook_url: config.webhook_url.clone(),
            signer,
            timeout: Duration::from_secs(config.timeout_secs),
            batch_timeout: Duration::from_secs(config.batch_timeout_secs),
            health_check_timeout: Duration::from_secs(config.health_check_timeout_secs),
        })
    }

    /// Replace the signer
    pub fn with_signer(mut self, signer: Arc<dyn EnvelopeSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn webhook_url(&self) -> &str {
        &self.webhook_url
    }

    /// Sign and post one envelope. Signing counts against the same deadline.
    pub async fn send(
        &self,
        action: &str,
        data: serde_json::Value,
        options: CallOptions,
    ) -> std::result::Result<ResponseBody, WorkflowError> {
        let timeout = options.timeout.unwrap_or(self.timeout);
        bounded(
            action,
            timeout,
            options.cancel.as_ref(),
            self.send_inner(action, data),
        )
        .await
    }

    async fn send_inner(
        &self,
        action: &str,
        data: serde_json::Value,
    ) -> std::result::Result<ResponseBody, WorkflowError> {
        let envelope = UnsignedEnvelope {
            action: action.to_string(),
            data,
            timestamp: Utc::now().timestamp_millis(),
        };

        let signature = match &self.signer {
            Some(signer) => Some(signer.sign(&envelope).await?),
            None => None,
        };

        let body = SignedEnvelope {
            envelope,
            signature,
        };

        debug!(action = %action, url = %self.webhook_url, "Posting workflow envelope");

        let response = self
            .http_client
            .post(&self.webhook_url)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("application/json"))
            .unwrap_or(false);
        let text = response.text().await?;

        let body = if is_json {
            match serde_json::from_str(&text) {
                Ok(value) => ResponseBody::Json(value),
                Err(_) => ResponseBody::Text(text),
            }
        } else {
            ResponseBody::Text(text)
        };

        if !status.is_success() {
            warn!(action = %action, status = status.as_u16(), "Workflow service rejected call");
            return Err(WorkflowError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }

    /// Trigger a single workflow
    pub async fn trigger_workflow(
        &self,
        workflow_id: &str,
        payload: serde_json::Value,
        cancel: Option<CancellationToken>,
    ) -> std::result::Result<ResponseBody, WorkflowError> {
        info!(workflow_id = %workflow_id, "Triggering workflow");
        self.send(
            actions::TRIGGER_WORKFLOW,
            json!({ "workflow_id": workflow_id, "payload": payload }),
            CallOptions {
                timeout: None,
                cancel,
            },
        )
        .await
    }

    /// Trigger several workflows in one call. An empty list is rejected
    /// without contacting the service.
    pub async fn batch_trigger(
        &self,
        workflow_actions: &[WorkflowAction],
        cancel: Option<CancellationToken>,
    ) -> std::result::Result<ResponseBody, WorkflowError> {
        if workflow_actions.is_empty() {
            return Err(WorkflowError::EmptyBatch);
        }

        info!(count = workflow_actions.len(), "Triggering workflow batch");
        self.send(
            actions::BATCH_TRIGGER,
            json!({ "actions": workflow_actions }),
            CallOptions {
                timeout: Some(self.batch_timeout),
                cancel,
            },
        )
        .await
    }

    pub async fn start_automation(
        &self,
        settings: serde_json::Value,
    ) -> std::result::Result<ResponseBody, WorkflowError> {
        self.send(actions::START_AUTOMATION, settings, CallOptions::default())
            .await
    }

    pub async fn stop_automation(&self) -> std::result::Result<ResponseBody, WorkflowError> {
        self.send(actions::STOP_AUTOMATION, json!({}), CallOptions::default())
            .await
    }

    pub async fn sync_status(&self) -> std::result::Result<ResponseBody, WorkflowError> {
        self.send(actions::SYNC_STATUS, json!({}), CallOptions::default())
            .await
    }

    /// Reachability probe. Never fails: any error is reported as `false`.
    pub async fn health_check(&self) -> bool {
        let options = CallOptions {
            timeout: Some(self.health_check_timeout),
            cancel: None,
        };
        match self.send(actions::HEALTH_CHECK, json!({}), options).await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "Workflow health check failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_partial_json, header_exists, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn config(webhook_url: String) -> WorkflowConfig {
        WorkflowConfig {
            webhook_url,
            signing_secret: Some("secret".to_string()),
            ..WorkflowConfig::default()
        }
    }

    async fn client(server: &MockServer) -> WorkflowClient {
        WorkflowClient::new(&config(format!("{}/hook", server.uri()))).unwrap()
    }

    #[tokio::test]
    async fn test_trigger_posts_signed_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header_exists("content-type"))
            .and(body_partial_json(json!({
                "action": "trigger_workflow",
                "data": {"workflow_id": "wf-1", "payload": {"prospect": "ana"}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let body = client(&server)
            .await
            .trigger_workflow("wf-1", json!({"prospect": "ana"}), None)
            .await
            .unwrap();

        assert_eq!(body, ResponseBody::Json(json!({"ok": true})));

        let requests: Vec<Request> = server.received_requests().await.unwrap();
        let sent: SignedEnvelope = serde_json::from_slice(&requests[0].body).unwrap();
        let signature = sent.signature.clone().unwrap();
        let payload = serde_json::to_vec(&sent.envelope).unwrap();
        assert!(HmacSigner::new("secret").verify(&payload, &signature));
    }

    #[tokio::test]
    async fn test_status_error_keeps_text_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("workflow exploded"))
            .mount(&server)
            .await;

        let err = client(&server)
            .await
            .trigger_workflow("wf-1", json!({}), None)
            .await
            .unwrap_err();

        match err {
            WorkflowError::Status { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, ResponseBody::Text("workflow exploded".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_status_error_decodes_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(422).set_body_json(json!({"error": "bad workflow"})),
            )
            .mount(&server)
            .await;

        let err = client(&server)
            .await
            .trigger_workflow("wf-1", json!({}), None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            WorkflowError::Status { status: 422, body: ResponseBody::Json(_) }
        ));
    }

    #[tokio::test]
    async fn test_timeout_is_distinct() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let err = client(&server)
            .await
            .send(
                actions::SYNC_STATUS,
                json!({}),
                CallOptions {
                    timeout: Some(Duration::from_millis(100)),
                    cancel: None,
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = client(&server).await.batch_trigger(&[], None).await.unwrap_err();
        assert!(matches!(err, WorkflowError::EmptyBatch));
    }

    #[tokio::test]
    async fn test_batch_trigger() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "action": "batch_trigger",
                "data": {"actions": [{"workflow_id": "a", "payload": null}]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string("queued"))
            .expect(1)
            .mount(&server)
            .await;

        let actions = vec![WorkflowAction {
            workflow_id: "a".to_string(),
            payload: serde_json::Value::Null,
        }];
        let body = client(&server).await.batch_trigger(&actions, None).await.unwrap();
        assert_eq!(body, ResponseBody::Text("queued".to_string()));
    }

    #[tokio::test]
    async fn test_cancelled_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let err = client(&server)
            .await
            .trigger_workflow("wf-1", json!({}), Some(token))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Cancelled { .. }));
    }

    #[tokio::test]
    async fn test_health_check() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"action": "health_check"})))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        assert!(client(&server).await.health_check().await);

        let unreachable = WorkflowClient::new(&config("http://127.0.0.1:9/hook".to_string())).unwrap();
        assert!(!unreachable.health_check().await);
    }
}
