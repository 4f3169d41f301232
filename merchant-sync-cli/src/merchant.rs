//! Google Merchant API `productInputs.insert` client.

use std::time::Duration;

use merchant_sync_core::{MerchantSettings, TargetPayload};
use merchant_sync_engine::{RemoteId, UploadClient, UploadError};
use serde_json::Value;
use thiserror::Error;

use crate::auth::{self, TokenError, TokenProvider};

const TIMEOUT: Duration = Duration::from_secs(60);

/// Setup failures found before any record is uploaded.
#[derive(Debug, Error)]
pub enum PreflightError {
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("cannot reach {url}: {cause}")]
    Unreachable { url: String, cause: String },

    #[error("data source check at {url} failed: {details}")]
    Rejected { url: String, details: String },
}

pub struct MerchantClient {
    agent: ureq::Agent,
    endpoint: String,
    account_id: String,
    data_source: String,
    tokens: Box<dyn TokenProvider>,
}

impl MerchantClient {
    pub fn new(settings: &MerchantSettings) -> Self {
        Self::with_tokens(settings, auth::provider_for(&settings.token))
    }

    pub fn with_tokens(settings: &MerchantSettings, tokens: Box<dyn TokenProvider>) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(TIMEOUT).build(),
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            account_id: settings.account_id.clone(),
            data_source: format!(
                "accounts/{}/dataSources/{}",
                settings.account_id, settings.data_source_id
            ),
            tokens,
        }
    }

    /// Fetch the target data source once, so a missing token, an unreachable
    /// endpoint or a wrong account fails the run before any record is touched.
    pub fn preflight(&mut self) -> Result<(), PreflightError> {
        let token = self.tokens.token()?;
        let url = self.data_source_url();
        match self
            .agent
            .get(&url)
            .set("Authorization", &format!("Bearer {token}"))
            .call()
        {
            Ok(_) => {
                tracing::debug!("data source {} reachable", self.data_source);
                Ok(())
            }
            Err(ureq::Error::Status(code, resp)) => {
                if matches!(code, 401 | 403) {
                    self.tokens.invalidate();
                }
                Err(PreflightError::Rejected {
                    url,
                    details: error_details(code, resp.into_string().unwrap_or_default()),
                })
            }
            Err(ureq::Error::Transport(t)) => Err(PreflightError::Unreachable {
                url,
                cause: t.to_string(),
            }),
        }
    }

    fn data_source_url(&self) -> String {
        format!("{}/datasources/v1/{}", self.endpoint, self.data_source)
    }

    fn insert_url(&self) -> String {
        format!(
            "{}/products/v1/accounts/{}/productInputs:insert",
            self.endpoint, self.account_id
        )
    }

    /// Resource name the API gives a product input.
    fn derived_name(&self, payload: &TargetPayload) -> RemoteId {
        RemoteId(format!(
            "accounts/{}/productInputs/{}~{}~{}",
            self.account_id, payload.content_language, payload.feed_label, payload.offer_id
        ))
    }
}

impl UploadClient for MerchantClient {
    fn upload(&mut self, payload: &TargetPayload) -> Result<RemoteId, UploadError> {
        let token = self
            .tokens
            .token()
            .map_err(|e| UploadError::AuthError(e.to_string()))?;

        let response = self
            .agent
            .post(&self.insert_url())
            .query("dataSource", &self.data_source)
            .set("Authorization", &format!("Bearer {token}"))
            .send_json(payload);

        match response {
            Ok(resp) => {
                let body: Value = resp.into_json().unwrap_or(Value::Null);
                Ok(body
                    .get("name")
                    .and_then(Value::as_str)
                    .map(|name| RemoteId(name.to_string()))
                    .unwrap_or_else(|| self.derived_name(payload)))
            }
            Err(ureq::Error::Status(409, _)) => {
                tracing::debug!("{}: already exists, treating as success", payload.offer_id);
                Ok(self.derived_name(payload))
            }
            Err(ureq::Error::Status(code, resp)) => {
                let retry_after = resp
                    .header("Retry-After")
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .map(Duration::from_secs);
                let details = error_details(code, resp.into_string().unwrap_or_default());
                if matches!(code, 401 | 403) {
                    self.tokens.invalidate();
                }
                Err(classify(code, retry_after, details))
            }
            Err(ureq::Error::Transport(t)) => Err(UploadError::Transient {
                cause: t.to_string(),
            }),
        }
    }
}

fn classify(code: u16, retry_after: Option<Duration>, details: String) -> UploadError {
    match code {
        429 => UploadError::RateLimited { retry_after },
        401 | 403 => UploadError::AuthError(details),
        400 | 404 | 422 => UploadError::ValidationRejected { details },
        408 | 500 | 502 | 503 | 504 => UploadError::Transient { cause: details },
        _ => UploadError::Fatal { cause: details },
    }
}

/// `error.message` from a Google error body, else the raw body.
fn error_details(code: u16, body: String) -> String {
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(Value::as_str).map(str::to_string));
    match message {
        Some(m) => format!("HTTP {code}: {m}"),
        None if body.trim().is_empty() => format!("HTTP {code}"),
        None => format!("HTTP {code}: {}", body.trim()),
    }
}
