// Cleanup sweep for crashed producers and consumers
//
// Consumers normally delete their own session keys, but a killed response
// or a crashed worker skips teardown. The sweep is the backstop: it is
// idempotent, safe to run alongside live traffic (it only deletes keys
// matching orphan or expiry criteria), and tolerant of per-key failures.

use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use beacon_core::config::StreamConfig;
use beacon_core::error::Result;
use beacon_core::keys::{
    date_from_counter_key, inbox_key, marker_key, session_id_from_inbox_key,
    session_id_from_marker_key, COUNTER_PREFIX, INBOX_PREFIX, MARKER_PREFIX,
};
use beacon_core::session::MarkerPayload;
use beacon_core::traits::RelayStore;

/// What one sweep removed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SweepReport {
    /// Inbox keys with no matching marker
    pub orphaned_inboxes: usize,
    /// Sessions whose marker TTL had lapsed
    pub expired_sessions: usize,
    /// Sessions older than the age ceiling, marker TTL notwithstanding
    pub aged_sessions: usize,
    /// Sessions whose marker payload would not parse
    pub unreadable_markers: usize,
    /// Day counters for days other than today
    pub stale_counters: usize,
    /// Keys skipped because the store failed on them; the sweep continues
    pub errors: usize,
}

impl SweepReport {
    /// Total keys or sessions removed
    pub fn removed(&self) -> usize {
        self.orphaned_inboxes
            + self.expired_sessions
            + self.aged_sessions
            + self.unreadable_markers
            + self.stale_counters
    }
}

enum Disposition {
    Live,
    Expired,
    Aged,
    Unreadable,
    /// Gone between listing and inspection
    Vanished,
}

/// Periodic relay-store sweep
pub struct Reaper {
    store: Arc<dyn RelayStore>,
    config: StreamConfig,
}

impl Reaper {
    pub fn new(store: Arc<dyn RelayStore>, config: StreamConfig) -> Self {
        Self { store, config }
    }

    /// Run one sweep to completion. Listing failures abort the sweep (it
    /// cannot see anything to clean); everything after that is per-key
    /// best effort.
    pub async fn sweep(&self) -> Result<SweepReport> {
        let mut report = SweepReport::default();

        let marker_keys = self.store.keys(MARKER_PREFIX).await?;
        let inbox_keys = self.store.keys(INBOX_PREFIX).await?;

        let marker_ids: HashSet<&str> = marker_keys
            .iter()
            .filter_map(|k| session_id_from_marker_key(k))
            .collect();

        // inboxes with no marker: nobody is listening and nobody will
        // delete them on completion
        for key in &inbox_keys {
            let session_id = session_id_from_inbox_key(key);
            if let Some(id) = session_id {
                if marker_ids.contains(id) {
                    continue;
                }
                // the session may have opened between the two listings;
                // probe the marker once more before declaring an orphan
                match self.store.get(&marker_key(id)).await {
                    Ok(Some(_)) => continue,
                    Ok(None) => {}
                    Err(e) => {
                        warn!(key = %key, error = %e, "failed to probe marker for inbox");
                        report.errors += 1;
                        continue;
                    }
                }
            }
            match self.store.delete(key).await {
                Ok(()) => {
                    debug!(key = %key, "removed orphaned inbox");
                    report.orphaned_inboxes += 1;
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "failed to remove orphaned inbox");
                    report.errors += 1;
                }
            }
        }

        for key in &marker_keys {
            let Some(session_id) = session_id_from_marker_key(key) else {
                continue;
            };
            match self.inspect_marker(key).await {
                Ok(Disposition::Live) | Ok(Disposition::Vanished) => {}
                Ok(Disposition::Expired) => {
                    self.remove_session(session_id, &mut report).await;
                    report.expired_sessions += 1;
                }
                Ok(Disposition::Aged) => {
                    self.remove_session(session_id, &mut report).await;
                    report.aged_sessions += 1;
                }
                Ok(Disposition::Unreadable) => {
                    self.remove_session(session_id, &mut report).await;
                    report.unreadable_markers += 1;
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "failed to inspect marker");
                    report.errors += 1;
                }
            }
        }

        self.sweep_counters(&mut report).await;

        info!(
            orphaned_inboxes = report.orphaned_inboxes,
            expired_sessions = report.expired_sessions,
            aged_sessions = report.aged_sessions,
            unreadable_markers = report.unreadable_markers,
            stale_counters = report.stale_counters,
            errors = report.errors,
            "sweep finished"
        );
        Ok(report)
    }

    async fn inspect_marker(&self, key: &str) -> Result<Disposition> {
        let Some(ttl) = self.store.ttl_secs(key).await? else {
            return Ok(Disposition::Vanished);
        };
        if lapsed(ttl) {
            return Ok(Disposition::Expired);
        }

        let Some(raw) = self.store.get(key).await? else {
            return Ok(Disposition::Vanished);
        };
        let payload = match MarkerPayload::decode(&raw) {
            Ok(payload) => payload,
            Err(_) => return Ok(Disposition::Unreadable),
        };

        if payload.age_secs() as u64 > self.config.max_session_age.as_secs() {
            return Ok(Disposition::Aged);
        }
        Ok(Disposition::Live)
    }

    async fn remove_session(&self, session_id: &str, report: &mut SweepReport) {
        for key in [marker_key(session_id), inbox_key(session_id)] {
            if let Err(e) = self.store.delete(&key).await {
                warn!(key = %key, error = %e, "failed to delete session key");
                report.errors += 1;
            }
        }
    }

    async fn sweep_counters(&self, report: &mut SweepReport) {
        let keys = match self.store.keys(COUNTER_PREFIX).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "failed to list day counters");
                report.errors += 1;
                return;
            }
        };
        let today = Utc::now().date_naive();
        for key in keys {
            if date_from_counter_key(&key) == Some(today) {
                continue;
            }
            match self.store.delete(&key).await {
                Ok(()) => report.stale_counters += 1,
                Err(e) => {
                    warn!(key = %key, error = %e, "failed to delete stale counter");
                    report.errors += 1;
                }
            }
        }
    }
}

/// A marker TTL at or below zero is lapsed - expired-but-not-evicted and
/// expiry-less markers are both garbage, with no gap at the boundary
fn lapsed(ttl_secs: i64) -> bool {
    ttl_secs <= 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::SessionChannel;
    use crate::memory::MemoryRelayStore;
    use beacon_core::event::PushEvent;
    use beacon_core::keys;
    use chrono::Duration as ChronoDuration;
    use serde_json::json;
    use std::time::Duration;

    fn fixture() -> (Arc<MemoryRelayStore>, SessionChannel, Reaper) {
        let store = Arc::new(MemoryRelayStore::new());
        let config = StreamConfig::default();
        let channel = SessionChannel::new(store.clone(), config.clone());
        let reaper = Reaper::new(store.clone(), config);
        (store, channel, reaper)
    }

    #[tokio::test]
    async fn test_live_sessions_are_untouched() {
        let (store, channel, reaper) = fixture();
        channel.open("live").await.unwrap();
        channel
            .publish("live", &PushEvent::status(json!({})))
            .await
            .unwrap();

        let report = reaper.sweep().await.unwrap();
        assert_eq!(report.removed(), 0);
        assert_eq!(store.keys(keys::MARKER_PREFIX).await.unwrap().len(), 1);
        assert_eq!(store.keys(keys::INBOX_PREFIX).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_orphaned_inbox_is_removed() {
        let (store, _channel, reaper) = fixture();
        store
            .append(&keys::inbox_key("X"), &PushEvent::Connected.encode())
            .await
            .unwrap();

        let report = reaper.sweep().await.unwrap();
        assert_eq!(report.orphaned_inboxes, 1);
        assert!(store.keys(keys::INBOX_PREFIX).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expired_marker_takes_both_keys() {
        let (store, channel, reaper) = fixture();
        channel.open("gone").await.unwrap();
        channel
            .publish("gone", &PushEvent::status(json!({})))
            .await
            .unwrap();
        store.force_expire(&keys::marker_key("gone"));

        let report = reaper.sweep().await.unwrap();
        assert_eq!(report.expired_sessions, 1);
        assert!(store.keys(keys::MARKER_PREFIX).await.unwrap().is_empty());
        assert!(store.keys(keys::INBOX_PREFIX).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expiry_less_marker_is_also_lapsed() {
        let (store, channel, reaper) = fixture();
        channel.open("odd").await.unwrap();
        store.strip_expiry(&keys::marker_key("odd"));

        let report = reaper.sweep().await.unwrap();
        assert_eq!(report.expired_sessions, 1);
    }

    #[test]
    fn test_lapsed_has_no_boundary_gap() {
        assert!(lapsed(0));
        assert!(lapsed(-1));
        assert!(!lapsed(1));
    }

    #[tokio::test]
    async fn test_aged_session_is_removed_despite_fresh_ttl() {
        let (store, channel, reaper) = fixture();
        channel.open("old").await.unwrap();

        // rewrite the payload as if opened long ago, marker TTL untouched
        let stale = MarkerPayload {
            created_at: Utc::now() - ChronoDuration::seconds(700),
            ttl_secs: 300,
        };
        store
            .set_with_ttl(
                &keys::marker_key("old"),
                &stale.encode(),
                Duration::from_secs(300),
            )
            .await
            .unwrap();

        let report = reaper.sweep().await.unwrap();
        assert_eq!(report.aged_sessions, 1);
        assert!(store.keys(keys::MARKER_PREFIX).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_marker_is_removed() {
        let (store, _channel, reaper) = fixture();
        store
            .set_with_ttl(&keys::marker_key("junk"), "???", Duration::from_secs(300))
            .await
            .unwrap();

        let report = reaper.sweep().await.unwrap();
        assert_eq!(report.unreadable_markers, 1);
    }

    #[tokio::test]
    async fn test_stale_counters_are_removed_today_kept() {
        let (store, _channel, reaper) = fixture();
        store.incr(&keys::counter_key(Utc::now().date_naive())).await.unwrap();
        store
            .incr(&keys::counter_key(
                (Utc::now() - ChronoDuration::days(1)).date_naive(),
            ))
            .await
            .unwrap();

        let report = reaper.sweep().await.unwrap();
        assert_eq!(report.stale_counters, 1);
        assert_eq!(store.keys(keys::COUNTER_PREFIX).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sweep_is_idempotent() {
        let (store, channel, reaper) = fixture();
        channel.open("live").await.unwrap();
        store
            .append(&keys::inbox_key("orphan"), "{}")
            .await
            .unwrap();
        store
            .set_with_ttl(&keys::marker_key("junk"), "???", Duration::from_secs(300))
            .await
            .unwrap();

        let first = reaper.sweep().await.unwrap();
        assert!(first.removed() > 0);

        let second = reaper.sweep().await.unwrap();
        assert_eq!(second.removed(), 0);
        assert_eq!(second.errors, 0);
        // the live session survived both passes
        assert_eq!(store.keys(keys::MARKER_PREFIX).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_listing_failure_aborts_cleanly() {
        let (store, _channel, reaper) = fixture();
        store.set_unavailable(true);
        assert!(reaper.sweep().await.is_err());
    }
}
