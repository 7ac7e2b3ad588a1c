// Typed session channel over the relay store
//
// Producer, consumer and reaper never touch raw keys; everything goes
// through this facade so the store dependency stays mockable and the key
// conventions stay in one place.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

use beacon_core::config::StreamConfig;
use beacon_core::error::Result;
use beacon_core::event::PushEvent;
use beacon_core::keys::{counter_key, inbox_key, marker_key};
use beacon_core::session::MarkerPayload;
use beacon_core::traits::RelayStore;

/// Publish/drain/close facade for one relay deployment.
///
/// Sessions are single-consumer: the inbox drain is destructive, so at
/// most one subscriber may poll a given session id at a time. The drain
/// itself is atomic at the store layer; the one-subscriber rule is the
/// application's to keep.
#[derive(Clone)]
pub struct SessionChannel {
    store: Arc<dyn RelayStore>,
    config: StreamConfig,
}

impl SessionChannel {
    pub fn new(store: Arc<dyn RelayStore>, config: StreamConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<dyn RelayStore> {
        &self.store
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Create or refresh the active marker for a session. Re-opening an
    /// already-active session rewrites the one marker rather than
    /// duplicating it. Only a subscribing consumer calls this; nothing
    /// else may create a session implicitly.
    pub async fn open(&self, session_id: &str) -> Result<()> {
        let payload = MarkerPayload::new(self.config.marker_ttl);
        self.store
            .set_with_ttl(
                &marker_key(session_id),
                &payload.encode(),
                self.config.marker_ttl,
            )
            .await?;

        // daily rollup is best-effort; a miscount never blocks a stream
        let counter = counter_key(Utc::now().date_naive());
        if let Err(e) = self.store.incr(&counter).await {
            warn!(session_id = %session_id, error = %e, "failed to bump daily session counter");
        }
        Ok(())
    }

    /// Refresh the marker TTL mid-stream, keeping the original
    /// `created_at` so the age ceiling still applies
    pub async fn touch(&self, session_id: &str) -> Result<()> {
        let key = marker_key(session_id);
        let payload = match self.store.get(&key).await? {
            Some(raw) => match MarkerPayload::decode(&raw) {
                Ok(mut payload) => {
                    payload.ttl_secs = self.config.marker_ttl.as_secs();
                    payload
                }
                Err(e) => {
                    debug!(session_id = %session_id, error = %e, "rewriting unreadable marker");
                    MarkerPayload::new(self.config.marker_ttl)
                }
            },
            None => MarkerPayload::new(self.config.marker_ttl),
        };
        self.store
            .set_with_ttl(&key, &payload.encode(), self.config.marker_ttl)
            .await
    }

    /// Whether a consumer currently wants events for this session.
    /// Store failures surface as errors, never as `false` - an outage
    /// must not read as "receiver gone".
    pub async fn is_active(&self, session_id: &str) -> Result<bool> {
        Ok(self.store.get(&marker_key(session_id)).await?.is_some())
    }

    /// Queue one event for the session's consumer. Returns `false` when
    /// the marker is absent - the receiver is gone and the caller decides
    /// whether the underlying work continues.
    ///
    /// The marker check and the append are two operations; a marker can
    /// lapse in between. The leftover inbox entry is reaper fodder, not a
    /// correctness problem.
    pub async fn publish(&self, session_id: &str, event: &PushEvent) -> Result<bool> {
        if !self.is_active(session_id).await? {
            return Ok(false);
        }
        self.store
            .append(&inbox_key(session_id), &event.encode())
            .await?;
        Ok(true)
    }

    /// Atomically take everything queued for the session, in publish
    /// order. Entries that fail to decode are skipped with a warning;
    /// one bad entry never stalls the stream.
    pub async fn drain(&self, session_id: &str) -> Result<Vec<PushEvent>> {
        let raw = self.store.drain(&inbox_key(session_id)).await?;
        let mut events = Vec::with_capacity(raw.len());
        for entry in raw {
            match PushEvent::decode(&entry) {
                Ok(event) => events.push(event),
                Err(e) => {
                    warn!(session_id = %session_id, error = %e, "skipping malformed inbox entry");
                }
            }
        }
        Ok(events)
    }

    /// Queue the terminal event
    pub async fn complete(&self, session_id: &str) -> Result<bool> {
        self.publish(session_id, &PushEvent::complete_now()).await
    }

    /// Delete both session keys. The deletes are independent so a partial
    /// failure leaves at worst a stray key for the reaper; both are
    /// attempted before any error is reported.
    pub async fn close(&self, session_id: &str) -> Result<()> {
        let marker = self.store.delete(&marker_key(session_id)).await;
        let inbox = self.store.delete(&inbox_key(session_id)).await;
        marker.and(inbox)
    }
}
