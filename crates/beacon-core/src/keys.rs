// Relay key derivation
//
// Pure string mapping from session ids to the keys that make up a stream.
// The reaper scans by these prefixes, so every key the channel writes must
// be derivable here and nowhere else.

use chrono::NaiveDate;

/// Prefix for active-marker keys
pub const MARKER_PREFIX: &str = "session-marker:";

/// Prefix for inbox keys
pub const INBOX_PREFIX: &str = "session-inbox:";

/// Prefix for the per-day session counters
pub const COUNTER_PREFIX: &str = "session-count:";

/// Key holding the "a consumer wants events" marker for a session
pub fn marker_key(session_id: &str) -> String {
    format!("{MARKER_PREFIX}{session_id}")
}

/// Key holding the FIFO inbox list for a session
pub fn inbox_key(session_id: &str) -> String {
    format!("{INBOX_PREFIX}{session_id}")
}

/// Key holding the rolling count of sessions opened on `date`
pub fn counter_key(date: NaiveDate) -> String {
    format!("{COUNTER_PREFIX}{}", date.format("%Y-%m-%d"))
}

/// Inverse of [`marker_key`]
pub fn session_id_from_marker_key(key: &str) -> Option<&str> {
    key.strip_prefix(MARKER_PREFIX).filter(|id| !id.is_empty())
}

/// Inverse of [`inbox_key`]
pub fn session_id_from_inbox_key(key: &str) -> Option<&str> {
    key.strip_prefix(INBOX_PREFIX).filter(|id| !id.is_empty())
}

/// Inverse of [`counter_key`]
pub fn date_from_counter_key(key: &str) -> Option<NaiveDate> {
    let raw = key.strip_prefix(COUNTER_PREFIX)?;
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_round_trip() {
        assert_eq!(marker_key("abc"), "session-marker:abc");
        assert_eq!(inbox_key("abc"), "session-inbox:abc");
        assert_eq!(session_id_from_marker_key("session-marker:abc"), Some("abc"));
        assert_eq!(session_id_from_inbox_key("session-inbox:abc"), Some("abc"));
    }

    #[test]
    fn test_ids_with_separators_survive() {
        // opaque ids may contain anything but are embedded verbatim
        let id = "blast:2026-08-05/42";
        assert_eq!(session_id_from_marker_key(&marker_key(id)), Some(id));
        assert_eq!(session_id_from_inbox_key(&inbox_key(id)), Some(id));
    }

    #[test]
    fn test_prefix_mismatch_is_none() {
        assert_eq!(session_id_from_marker_key("session-inbox:abc"), None);
        assert_eq!(session_id_from_inbox_key("session-marker:abc"), None);
        assert_eq!(session_id_from_marker_key("session-marker:"), None);
    }

    #[test]
    fn test_counter_key_dates() {
        let date = NaiveDate::from_ymd_opt(2026, 8, 5).unwrap();
        let key = counter_key(date);
        assert_eq!(key, "session-count:2026-08-05");
        assert_eq!(date_from_counter_key(&key), Some(date));
        assert_eq!(date_from_counter_key("session-count:yesterday"), None);
    }
}
