// Marker payload for active sessions
//
// One consolidated record written when a consumer opens a session. The
// reaper and the monitor derive age from `created_at` only; a marker whose
// value does not parse is treated as garbage and swept.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{BeaconError, Result};

/// Value stored under a session's marker key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MarkerPayload {
    /// When the consumer opened (or re-opened) the session
    pub created_at: DateTime<Utc>,
    /// The TTL the marker was written with, in seconds
    pub ttl_secs: u64,
}

impl MarkerPayload {
    /// Payload for a session opened now
    pub fn new(ttl: Duration) -> Self {
        Self {
            created_at: Utc::now(),
            ttl_secs: ttl.as_secs(),
        }
    }

    /// Seconds elapsed since the session was opened, clamped at zero
    pub fn age_secs(&self) -> i64 {
        (Utc::now() - self.created_at).num_seconds().max(0)
    }

    /// Serialize to the marker wire form
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Decode a marker value
    pub fn decode(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| BeaconError::malformed(format!("{e}: {raw}")))
    }
}
