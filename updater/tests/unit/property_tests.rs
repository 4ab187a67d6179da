//! Property-based tests for decoding, scheduling and routing.
//!
//! Uses `proptest` to verify invariants across many random inputs.

#![allow(clippy::expect_used)]

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use agent_updater::domain::command::{Schedule, decode_update_command, normalize_sha256};
use agent_updater::domain::routing::{Route, route};
use agent_updater::domain::watchdog::rotated_log_path;
use updater_common::{filter_subjects, rollback_subject, update_subject, update_subject_v2};

fn payload(hash: &str, update_at: Option<&str>, update_now: bool) -> Vec<u8> {
    let at = update_at.map_or(String::new(), |t| format!(r#","updateAt":"{t}""#));
    format!(
        r#"{{"version":"3.1.4","downloadFrom":"https://u.example.com/a","downloadHash":"{hash}"{at},"updateNow":{update_now}}}"#
    )
    .into_bytes()
}

// ============================================================================
// Scheduling
// ============================================================================

proptest! {
    /// Future times run later unless the command asks to run now; past
    /// times always run now.
    #[test]
    fn prop_schedule_respects_time_and_override(
        offset_secs in -86_400i64..86_400,
        update_now in any::<bool>(),
    ) {
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 8, 0, 0).single().expect("time");
        let at = now + Duration::seconds(offset_secs);
        let hash = "a".repeat(64);
        let cmd = decode_update_command(&payload(&hash, Some(&at.to_rfc3339()), update_now))
            .expect("decode");

        let expected = if !update_now && offset_secs > 0 {
            Schedule::At(at)
        } else {
            Schedule::Now
        };
        prop_assert_eq!(cmd.schedule(now), expected);
    }
}

#[test]
fn zero_time_means_no_schedule() {
    let hash = "b".repeat(64);
    let cmd = decode_update_command(&payload(&hash, Some("0001-01-01T00:00:00Z"), false))
        .expect("decode");
    assert_eq!(cmd.scheduled_at, None);
    assert_eq!(cmd.schedule(Utc::now()), Schedule::Now);
}

// ============================================================================
// Digest normalization
// ============================================================================

proptest! {
    /// Any casing of a valid digest normalizes to lowercase.
    #[test]
    fn prop_hash_is_case_insensitive(hash in "[0-9a-fA-F]{64}") {
        let normalized = normalize_sha256(&hash).expect("valid digest");
        prop_assert_eq!(normalized, hash.to_ascii_lowercase());
    }

    /// Wrong lengths are rejected.
    #[test]
    fn prop_short_or_long_hash_rejected(hash in "[0-9a-f]{0,63}|[0-9a-f]{65,80}") {
        prop_assert!(normalize_sha256(&hash).is_err());
    }
}

// ============================================================================
// Routing
// ============================================================================

proptest! {
    /// Every subject the consumer filters on reaches a handler, and agent
    /// subjects for other agents never do.
    #[test]
    fn prop_routes_cover_filters_only_for_own_id(
        id in "[a-zA-Z0-9_-]{1,32}",
        other in "[a-zA-Z0-9_-]{1,32}",
    ) {
        prop_assume!(id != other && id != "messenger" && other != "messenger");
        for subject in filter_subjects(&id) {
            prop_assert!(route(&subject, &id).is_some(), "unrouted {}", subject);
        }
        prop_assert_eq!(route(&update_subject(&id), &id), Some(Route::AgentUpdate));
        prop_assert_eq!(route(&update_subject_v2(&id), &id), Some(Route::AgentUpdate));
        prop_assert_eq!(route(&rollback_subject(&id), &id), Some(Route::AgentRollback));
        prop_assert_eq!(route(&update_subject(&other), &id), None);
        prop_assert_eq!(route(&rollback_subject(&other), &id), None);
    }
}

// ============================================================================
// Log rotation names
// ============================================================================

proptest! {
    /// Rotated logs stay in the same directory and keep the extension.
    #[test]
    fn prop_rotated_log_stays_beside_original(stem in "[a-z]{1,12}", secs in 0i64..4_000_000_000) {
        let log = std::path::PathBuf::from("/var/log/agent").join(format!("{stem}.log"));
        let rotated = rotated_log_path(&log, secs);
        prop_assert_eq!(rotated.parent(), log.parent());
        prop_assert_eq!(
            rotated.file_name().and_then(|n| n.to_str()).expect("name"),
            format!("{stem}.{secs}.log")
        );
    }
}
