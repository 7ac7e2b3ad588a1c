// Blast batch loop
//
// Sends every message in order while reporting per-recipient outcomes
// through the session channel. Dispatch is the primary side effect: a
// store outage downgrades the blast to silent, it never stops it, and no
// per-item failure aborts the batch.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use beacon_core::error::{BeaconError, Result};
use beacon_core::event::PushEvent;
use beacon_store::SessionChannel;

use crate::dispatcher::{DeliveryReceipt, MessageDispatcher, OutboundSms};

const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(20);

/// What to do with the rest of the batch once the receiver is gone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReceiverGonePolicy {
    /// Keep dispatching without reports (default: the blast was asked for,
    /// the progress page merely watches it)
    #[default]
    ContinueSending,
    /// Abandon the remaining messages
    StopSending,
}

/// Outcome of one blast
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlastSummary {
    /// Messages the provider accepted
    pub sent: usize,
    /// Messages the provider rejected or that timed out
    pub failed: usize,
    /// Events that reached the inbox
    pub reported: usize,
    /// The active marker lapsed mid-batch
    pub listener_lost: bool,
}

/// Runs one blast while streaming progress to a session
pub struct BlastSender {
    channel: SessionChannel,
    dispatcher: Arc<dyn MessageDispatcher>,
    policy: ReceiverGonePolicy,
    dispatch_timeout: Duration,
}

impl BlastSender {
    pub fn new(channel: SessionChannel, dispatcher: Arc<dyn MessageDispatcher>) -> Self {
        Self {
            channel,
            dispatcher,
            policy: ReceiverGonePolicy::default(),
            dispatch_timeout: DEFAULT_DISPATCH_TIMEOUT,
        }
    }

    pub fn with_policy(mut self, policy: ReceiverGonePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_dispatch_timeout(mut self, dispatch_timeout: Duration) -> Self {
        self.dispatch_timeout = dispatch_timeout;
        self
    }

    /// Send the batch. Never returns an error: per-item and reporting
    /// failures are folded into the summary.
    pub async fn run(&self, session_id: &str, messages: Vec<OutboundSms>) -> BlastSummary {
        let mut summary = BlastSummary::default();
        let mut reporting = true;

        info!(session_id = %session_id, count = messages.len(), "blast starting");

        for message in &messages {
            let event = match self.dispatch_one(message).await {
                Ok(receipt) => {
                    summary.sent += 1;
                    PushEvent::Delivery {
                        recipient: message.to.clone(),
                        provider_id: receipt.provider_id,
                    }
                }
                Err(e) => {
                    summary.failed += 1;
                    warn!(session_id = %session_id, to = %message.to, error = %e, "dispatch failed");
                    PushEvent::recipient_error(&message.to, e.to_string())
                }
            };

            if !reporting {
                continue;
            }
            match self.channel.publish(session_id, &event).await {
                Ok(true) => summary.reported += 1,
                Ok(false) => {
                    info!(session_id = %session_id, "receiver gone, stopping progress reports");
                    summary.listener_lost = true;
                    reporting = false;
                    if self.policy == ReceiverGonePolicy::StopSending {
                        break;
                    }
                }
                Err(e) => {
                    // store outage: drop this report, the send stands
                    warn!(session_id = %session_id, error = %e, "failed to queue progress event");
                }
            }
        }

        if reporting {
            self.finish(session_id, &mut summary).await;
        }

        info!(
            session_id = %session_id,
            sent = summary.sent,
            failed = summary.failed,
            reported = summary.reported,
            "blast finished"
        );
        summary
    }

    async fn dispatch_one(&self, message: &OutboundSms) -> Result<DeliveryReceipt> {
        match timeout(self.dispatch_timeout, self.dispatcher.dispatch(message)).await {
            Ok(result) => result,
            Err(_) => Err(BeaconError::dispatch(format!(
                "send timed out after {:?}",
                self.dispatch_timeout
            ))),
        }
    }

    /// Publish the terminal event, give a slow poller a moment to observe
    /// it, then delete the session keys. The consumer deletes them too on
    /// its side; deletes of absent keys are no-ops, so the race is benign.
    async fn finish(&self, session_id: &str, summary: &mut BlastSummary) {
        match self.channel.complete(session_id).await {
            Ok(true) => {
                summary.reported += 1;
                tokio::time::sleep(self.channel.config().completion_grace).await;
                if let Err(e) = self.channel.close(session_id).await {
                    debug!(session_id = %session_id, error = %e, "post-complete cleanup failed");
                }
            }
            Ok(false) => summary.listener_lost = true,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "failed to queue terminal event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use beacon_core::config::StreamConfig;
    use beacon_core::keys;
    use beacon_core::traits::RelayStore;
    use beacon_store::MemoryRelayStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedDispatcher {
        calls: AtomicUsize,
        fail_on: Option<usize>,
        delay: Option<Duration>,
    }

    impl ScriptedDispatcher {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_on: None,
                delay: None,
            }
        }

        fn failing_on(call: usize) -> Self {
            Self {
                fail_on: Some(call),
                ..Self::new()
            }
        }

        fn slow(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::new()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MessageDispatcher for ScriptedDispatcher {
        async fn dispatch(&self, _message: &OutboundSms) -> Result<DeliveryReceipt> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_on == Some(call) {
                return Err(BeaconError::dispatch("provider rejected message"));
            }
            Ok(DeliveryReceipt {
                provider_id: format!("SM{call}"),
            })
        }
    }

    fn messages(n: usize) -> Vec<OutboundSms> {
        (0..n)
            .map(|i| OutboundSms {
                to: format!("+1612555010{i}"),
                body: "volunteer shift reminder".to_string(),
            })
            .collect()
    }

    fn fixture(
        dispatcher: Arc<dyn MessageDispatcher>,
    ) -> (Arc<MemoryRelayStore>, SessionChannel, BlastSender) {
        let store = Arc::new(MemoryRelayStore::new());
        let config = StreamConfig::default().with_completion_grace(Duration::from_millis(50));
        let channel = SessionChannel::new(store.clone(), config);
        let sender = BlastSender::new(channel.clone(), dispatcher);
        (store, channel, sender)
    }

    /// Drains the session like a consumer would until the terminal event
    async fn collect_stream(channel: SessionChannel, session_id: &str) -> Vec<PushEvent> {
        let session_id = session_id.to_string();
        let mut seen = Vec::new();
        loop {
            for event in channel.drain(&session_id).await.unwrap_or_default() {
                let terminal = event.is_terminal();
                seen.push(event);
                if terminal {
                    return seen;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_happy_path_reports_every_send_in_order() {
        let dispatcher = Arc::new(ScriptedDispatcher::new());
        let (store, channel, sender) = fixture(dispatcher.clone());
        channel.open("s1").await.unwrap();

        let collector = tokio::spawn(collect_stream(channel.clone(), "s1"));
        let summary = sender.run("s1", messages(3)).await;

        assert_eq!(summary.sent, 3);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.reported, 4);
        assert!(!summary.listener_lost);

        let events = collector.await.unwrap();
        assert_eq!(events.len(), 4);
        for (i, event) in events.iter().take(3).enumerate() {
            match event {
                PushEvent::Delivery { recipient, .. } => {
                    assert_eq!(recipient, &format!("+1612555010{i}"));
                }
                other => panic!("unexpected event: {other:?}"),
            }
        }
        assert!(events[3].is_terminal());

        // both keys gone once the blast wrapped up
        assert!(store.keys(keys::MARKER_PREFIX).await.unwrap().is_empty());
        assert!(store.keys(keys::INBOX_PREFIX).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_outage_never_touches_the_sends() {
        let dispatcher = Arc::new(ScriptedDispatcher::new());
        let (store, channel, sender) = fixture(dispatcher.clone());
        channel.open("s1").await.unwrap();
        store.set_unavailable(true);

        let summary = sender.run("s1", messages(5)).await;

        // every dispatch still happened and returned its real outcome
        assert_eq!(dispatcher.calls(), 5);
        assert_eq!(summary.sent, 5);
        assert_eq!(summary.reported, 0);

        // nothing was delivered to any consumer
        store.set_unavailable(false);
        assert!(channel.drain("s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_dispatch_reports_and_continues() {
        let dispatcher = Arc::new(ScriptedDispatcher::failing_on(2));
        let (_store, channel, sender) = fixture(dispatcher.clone());
        channel.open("s1").await.unwrap();

        let collector = tokio::spawn(collect_stream(channel.clone(), "s1"));
        let summary = sender.run("s1", messages(3)).await;

        assert_eq!(summary.sent, 2);
        assert_eq!(summary.failed, 1);

        let events = collector.await.unwrap();
        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], PushEvent::Delivery { .. }));
        match &events[1] {
            PushEvent::Error { recipient, .. } => {
                assert_eq!(recipient.as_deref(), Some("+16125550101"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(matches!(events[2], PushEvent::Delivery { .. }));
        assert!(events[3].is_terminal());
    }

    #[tokio::test]
    async fn test_receiver_gone_continue_sending() {
        let dispatcher = Arc::new(ScriptedDispatcher::new());
        let (_store, _channel, sender) = fixture(dispatcher.clone());
        // no open(): the marker never existed

        let summary = sender.run("s1", messages(3)).await;

        assert_eq!(dispatcher.calls(), 3);
        assert_eq!(summary.sent, 3);
        assert_eq!(summary.reported, 0);
        assert!(summary.listener_lost);
    }

    #[tokio::test]
    async fn test_receiver_gone_stop_sending_abandons_the_rest() {
        let dispatcher = Arc::new(ScriptedDispatcher::new());
        let (_store, _channel, sender) = fixture(dispatcher.clone());
        let sender = sender.with_policy(ReceiverGonePolicy::StopSending);

        let summary = sender.run("s1", messages(3)).await;

        // the first message was already in flight when the lapse was seen
        assert_eq!(dispatcher.calls(), 1);
        assert_eq!(summary.sent, 1);
        assert!(summary.listener_lost);
    }

    #[tokio::test]
    async fn test_stuck_provider_is_bounded() {
        let dispatcher = Arc::new(ScriptedDispatcher::slow(Duration::from_secs(5)));
        let (_store, channel, sender) = fixture(dispatcher.clone());
        let sender = sender.with_dispatch_timeout(Duration::from_millis(20));
        channel.open("s1").await.unwrap();

        let collector = tokio::spawn(collect_stream(channel.clone(), "s1"));
        let summary = sender.run("s1", messages(1)).await;

        assert_eq!(summary.failed, 1);
        let events = collector.await.unwrap();
        match &events[0] {
            PushEvent::Error { message, .. } => assert!(message.contains("timed out")),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
