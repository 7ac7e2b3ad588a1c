// Hosted SMS provider over plain JSON HTTP

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use beacon_core::error::{BeaconError, Result};

use crate::dispatcher::{DeliveryReceipt, MessageDispatcher, OutboundSms};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// HTTP SMS provider
pub struct HttpSmsProvider {
    client: Client,
    api_url: String,
    api_key: String,
    from_number: String,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: &'a str,
    body: &'a str,
}

#[derive(Deserialize)]
struct SendResponse {
    id: String,
}

impl HttpSmsProvider {
    pub fn new(api_url: String, api_key: String, from_number: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BeaconError::config(e.to_string()))?;
        Ok(Self {
            client,
            api_url,
            api_key,
            from_number,
        })
    }
}

#[async_trait]
impl MessageDispatcher for HttpSmsProvider {
    async fn dispatch(&self, message: &OutboundSms) -> Result<DeliveryReceipt> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&SendRequest {
                from: &self.from_number,
                to: &message.to,
                body: &message.body,
            })
            .send()
            .await
            .map_err(|e| BeaconError::dispatch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BeaconError::dispatch(format!(
                "provider returned {status}: {body}"
            )));
        }

        let parsed: SendResponse = response
            .json()
            .await
            .map_err(|e| BeaconError::dispatch(format!("unreadable provider response: {e}")))?;
        Ok(DeliveryReceipt {
            provider_id: parsed.id,
        })
    }
}
