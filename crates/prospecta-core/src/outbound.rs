//! Email gateway and domain enrichment collaborators

use async_trait::async_trait;
use prospecta_common::config::OutboundConfig;
use prospecta_common::types::{CampaignId, ProspectId, TemplateId};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Outbound call errors
#[derive(Debug, Error)]
pub enum OutboundError {
    #[error("{0} endpoint is not configured")]
    NotConfigured(&'static str),

    #[error("Provider returned status {status}: {message}")]
    Provider {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Request timed out")]
    Timeout,

    #[error("Transport error: {0}")]
    Transport(reqwest::Error),
}

impl OutboundError {
    /// HTTP status of the provider response, when one was received
    pub fn status(&self) -> Option<u16> {
        match self {
            OutboundError::Provider { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for OutboundError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            OutboundError::Timeout
        } else {
            OutboundError::Transport(e)
        }
    }
}

impl From<OutboundError> for prospecta_common::Error {
    fn from(err: OutboundError) -> Self {
        use prospecta_common::Error;
        match err {
            OutboundError::NotConfigured(_) => Error::Precondition(err.to_string()),
            OutboundError::Provider {
                status,
                ref code,
                ref message,
            } => Error::Upstream {
                status,
                message: match code {
                    Some(code) => format!("{} ({})", message, code),
                    None => message.clone(),
                },
            },
            OutboundError::Timeout => Error::Timeout(err.to_string()),
            OutboundError::Transport(_) => Error::Unavailable(err.to_string()),
        }
    }
}

/// Structured provider error body
#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    error: Option<String>,
    code: Option<String>,
}

async fn provider_error(response: reqwest::Response) -> OutboundError {
    let status = response.status().as_u16();
    let text = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ProviderErrorBody>(&text) {
        Ok(body) => OutboundError::Provider {
            status,
            code: body.code,
            message: body.error.unwrap_or(text),
        },
        Err(_) => OutboundError::Provider {
            status,
            code: None,
            message: text,
        },
    }
}

fn build_client(config: &OutboundConfig) -> Result<Client, OutboundError> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(OutboundError::Transport)
}

/// Email gateway request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailRequest {
    pub to: String,
    pub subject: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_id: Option<TemplateId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prospect_id: Option<ProspectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<CampaignId>,
}

/// Email gateway response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailResponse {
    pub success: bool,
    pub message_id: Option<String>,
}

/// Sends a rendered email
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, request: &SendEmailRequest) -> Result<SendEmailResponse, OutboundError>;
}

/// Looks up company data for a domain
#[async_trait]
pub trait DomainEnricher: Send + Sync {
    async fn enrich(&self, domain: &str, action: &str) -> Result<serde_json::Value, OutboundError>;
}

/// HTTP email gateway
pub struct HttpEmailSender {
    http_client: Client,
    url: String,
    api_key: Option<String>,
}

impl HttpEmailSender {
    pub fn new(config: &OutboundConfig) -> Result<Self, OutboundError> {
        let url = config
            .email_send_url
            .clone()
            .ok_or(OutboundError::NotConfigured("Email gateway"))?;
        Ok(Self {
            http_client: build_client(config)?,
            url,
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    async fn send(&self, request: &SendEmailRequest) -> Result<SendEmailResponse, OutboundError> {
        debug!(to = %request.to, "Sending email through gateway");

        let mut http_request = self.http_client.post(&self.url).json(request);
        if let Some(key) = &self.api_key {
            http_request = http_request.bearer_auth(key);
        }

        let response = http_request.send().await?;
        if !response.status().is_success() {
            let err = provider_error(response).await;
            warn!(error = %err, "Email gateway rejected send");
            return Err(err);
        }

        Ok(response.json().await?)
    }
}

/// HTTP domain enrichment proxy
pub struct HttpDomainEnricher {
    http_client: Client,
    url: String,
    api_key: Option<String>,
}

impl HttpDomainEnricher {
    pub fn new(config: &OutboundConfig) -> Result<Self, OutboundError> {
        let url = config
            .enrichment_url
            .clone()
            .ok_or(OutboundError::NotConfigured("Enrichment"))?;
        Ok(Self {
            http_client: build_client(config)?,
            url,
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl DomainEnricher for HttpDomainEnricher {
    async fn enrich(&self, domain: &str, action: &str) -> Result<serde_json::Value, OutboundError> {
        debug!(domain = %domain, action = %action, "Requesting domain enrichment");

        let mut http_request = self
            .http_client
            .post(&self.url)
            .json(&serde_json::json!({ "domain": domain, "action": action }));
        if let Some(key) = &self.api_key {
            http_request = http_request.bearer_auth(key);
        }

        let response = http_request.send().await?;
        if !response.status().is_success() {
            return Err(provider_error(response).await);
        }

        Ok(response.json().await?)
    }
}
