// SMS provider implementations
// Configuration is via SMS_API_URL / SMS_API_KEY / SMS_FROM; without a
// provider URL the sandbox dispatcher logs instead of sending.

pub mod http;
pub mod sandbox;

pub use http::HttpSmsProvider;
pub use sandbox::SandboxDispatcher;

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use crate::dispatcher::MessageDispatcher;

/// Configuration for the outbound SMS provider
#[derive(Debug, Clone, Default)]
pub struct DispatcherConfig {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub from_number: Option<String>,
}

impl DispatcherConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            api_url: std::env::var("SMS_API_URL").ok().filter(|s| !s.is_empty()),
            api_key: std::env::var("SMS_API_KEY").ok().filter(|s| !s.is_empty()),
            from_number: std::env::var("SMS_FROM").ok().filter(|s| !s.is_empty()),
        }
    }
}

/// Create the dispatcher for this process based on configuration
pub fn create_dispatcher(config: &DispatcherConfig) -> Result<Arc<dyn MessageDispatcher>> {
    match &config.api_url {
        Some(api_url) => {
            let api_key = config
                .api_key
                .clone()
                .ok_or_else(|| anyhow::anyhow!("SMS_API_KEY required when SMS_API_URL is set"))?;
            let from_number = config
                .from_number
                .clone()
                .ok_or_else(|| anyhow::anyhow!("SMS_FROM required when SMS_API_URL is set"))?;
            info!(api_url = %api_url, "Using HTTP SMS provider");
            Ok(Arc::new(HttpSmsProvider::new(
                api_url.clone(),
                api_key,
                from_number,
            )?))
        }
        None => {
            warn!("SMS_API_URL not set, messages will be logged instead of sent");
            Ok(Arc::new(SandboxDispatcher::new()))
        }
    }
}
