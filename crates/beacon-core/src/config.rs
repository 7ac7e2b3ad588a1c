// Stream tuning knobs
//
// StreamConfig is shared by the channel (marker TTL), the SSE endpoint
// (poll interval, hard ceiling), the sender worker (completion grace) and
// the reaper (age ceiling). Defaults mirror the deployed values.

use std::time::Duration;

/// Configuration for one relay deployment
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// TTL written on the active marker; a lapsed marker means "receiver gone"
    pub marker_ttl: Duration,

    /// How often the SSE endpoint drains the inbox
    pub poll_interval: Duration,

    /// Hard ceiling on how long one SSE response stays open. The hosting
    /// runtime may also end the response on its own; the reaper is the
    /// backstop for teardown skipped on that path.
    pub max_stream_duration: Duration,

    /// How long the producer waits after publishing `complete` before it
    /// deletes the session keys, so a slow poller can observe the terminal
    /// event first
    pub completion_grace: Duration,

    /// Sessions older than this are garbage regardless of marker TTL
    pub max_session_age: Duration,

    /// The monitor reports `busy` above this many active sessions
    pub active_session_warning: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            marker_ttl: Duration::from_secs(300),
            poll_interval: Duration::from_millis(100),
            max_stream_duration: Duration::from_secs(60),
            completion_grace: Duration::from_secs(1),
            max_session_age: Duration::from_secs(600),
            active_session_warning: 25,
        }
    }
}

impl StreamConfig {
    /// Set the marker TTL
    pub fn with_marker_ttl(mut self, ttl: Duration) -> Self {
        self.marker_ttl = ttl;
        self
    }

    /// Set the poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the stream duration ceiling
    pub fn with_max_stream_duration(mut self, ceiling: Duration) -> Self {
        self.max_stream_duration = ceiling;
        self
    }

    /// Set the post-complete grace delay
    pub fn with_completion_grace(mut self, grace: Duration) -> Self {
        self.completion_grace = grace;
        self
    }

    /// Set the session age ceiling
    pub fn with_max_session_age(mut self, ceiling: Duration) -> Self {
        self.max_session_age = ceiling;
        self
    }

    /// Budget for a single inbox read; kept under one poll tick so a slow
    /// store cannot stall the loop
    pub fn read_budget(&self) -> Duration {
        self.poll_interval.mul_f32(0.8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_deployment() {
        let config = StreamConfig::default();
        assert_eq!(config.marker_ttl, Duration::from_secs(300));
        assert_eq!(config.poll_interval, Duration::from_millis(100));
        assert_eq!(config.max_stream_duration, Duration::from_secs(60));
        assert_eq!(config.max_session_age, Duration::from_secs(600));
    }

    #[test]
    fn test_read_budget_stays_under_one_tick() {
        let config = StreamConfig::default();
        assert!(config.read_budget() < config.poll_interval);
    }
}
