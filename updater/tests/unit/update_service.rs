//! Update, rollback and messenger services: outcomes and recorded status.

#![allow(clippy::expect_used)]

use semver::Version;
use url::Url;

use agent_updater::application::services::companion::{MessengerUpgrade, install_messenger};
use agent_updater::application::services::rollback::{
    RollbackOutcome, restore_previous, rollback_agent, rollback_messenger,
};
use agent_updater::application::services::update::{
    UpdateDeps, record_rejected, run_agent_update,
};
use agent_updater::domain::command::decode_update_command;
use agent_updater::domain::disposition::Disposition;
use agent_updater::domain::layout::ArtifactLayout;
use agent_updater::infra::fs::LocalFs;
use updater_common::{delays, status_keys};

use crate::mocks::{
    FixedClock, HASH, MemoryStore, RecordingHost, SERVICE, StubFetcher, read, update_payload,
    write_file,
};

fn deps<'a>(
    host: &'a RecordingHost,
    fetcher: &'a StubFetcher,
    store: &'a MemoryStore,
    clock: &'a FixedClock,
) -> UpdateDeps<'a, RecordingHost, StubFetcher, MemoryStore, LocalFs, FixedClock> {
    UpdateDeps {
        host,
        fetcher,
        store,
        fs: &LocalFs,
        clock,
    }
}

// ── Agent update ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn successful_update_acks_and_records_success() {
    let dir = tempfile::tempdir().expect("tempdir");
    let layout = ArtifactLayout::agent(dir.path(), "agent-bin", SERVICE);
    write_file(dir.path(), "agent-bin", b"old");
    let (host, fetcher, store, clock) = (
        RecordingHost::new(),
        StubFetcher::serving(b"new"),
        MemoryStore::default(),
        FixedClock::default(),
    );
    let cmd = decode_update_command(&update_payload("2.0.0", "")).expect("decode");

    let disposition = run_agent_update(&deps(&host, &fetcher, &store, &clock), &layout, &cmd).await;

    assert_eq!(disposition, Disposition::Ack);
    assert_eq!(
        fetcher.requests(),
        ["https://updates.example.com/agent-2.0.0"]
    );
    assert_eq!(
        store.value(status_keys::LAST_EXECUTION_STATUS).as_deref(),
        Some("SUCCESS")
    );
    assert_eq!(
        store.value(status_keys::LAST_EXECUTION_TIME).as_deref(),
        Some("2026-03-01T12:00:00")
    );
    assert!(
        store
            .value(status_keys::LAST_EXECUTION_RESULT)
            .expect("result")
            .contains("2.0.0")
    );
}

#[tokio::test]
async fn download_failure_naks_for_an_hour_and_records_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let layout = ArtifactLayout::agent(dir.path(), "agent-bin", SERVICE);
    let (host, fetcher, store, clock) = (
        RecordingHost::new(),
        StubFetcher::failing(),
        MemoryStore::default(),
        FixedClock::default(),
    );
    let cmd = decode_update_command(&update_payload("2.0.0", "")).expect("decode");

    let disposition = run_agent_update(&deps(&host, &fetcher, &store, &clock), &layout, &cmd).await;

    assert_eq!(disposition, Disposition::Nak(delays::NAK_LONG));
    assert_eq!(
        store.value(status_keys::LAST_EXECUTION_STATUS).as_deref(),
        Some("ERROR")
    );
    let result = store.value(status_keys::LAST_EXECUTION_RESULT).expect("result");
    assert!(!result.starts_with("fatal: "), "{result}");
}

#[tokio::test]
async fn rolled_back_update_is_fatal_and_naks_for_fifteen_minutes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let layout = ArtifactLayout::agent(dir.path(), "agent-bin", SERVICE);
    write_file(dir.path(), "agent-bin", b"old");
    let (host, fetcher, store, clock) = (
        RecordingHost::with_starts(&[false, true]),
        StubFetcher::serving(b"crashes"),
        MemoryStore::default(),
        FixedClock::default(),
    );
    let cmd = decode_update_command(&update_payload("2.0.0", "")).expect("decode");

    let disposition = run_agent_update(&deps(&host, &fetcher, &store, &clock), &layout, &cmd).await;

    assert_eq!(disposition, Disposition::Nak(delays::NAK_SHORT));
    assert_eq!(read(&layout.install_path), b"old");
    let result = store.value(status_keys::LAST_EXECUTION_RESULT).expect("result");
    assert!(result.starts_with("fatal: "), "{result}");
}

#[test]
fn rejected_payload_is_recorded_as_error() {
    let store = MemoryStore::default();
    let err = decode_update_command(b"{\"version\":\"\"}").expect_err("invalid");

    record_rejected(&store, &FixedClock::default(), &err);

    assert_eq!(
        store.value(status_keys::LAST_EXECUTION_STATUS).as_deref(),
        Some("ERROR")
    );
}

// ── Rollback ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn agent_rollback_restores_and_restarts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let layout = ArtifactLayout::agent(dir.path(), "agent-bin", SERVICE);
    write_file(dir.path(), "agent-bin", b"new");
    std::fs::create_dir_all(layout.staging_dir()).expect("mkdir");
    std::fs::write(&layout.rollback_path, b"old").expect("write");
    let (host, store) = (RecordingHost::new(), MemoryStore::default());

    rollback_agent(&host, &LocalFs, &store, &FixedClock::default(), &layout).await;

    assert_eq!(read(&layout.install_path), b"old");
    assert_eq!(host.calls(), ["stop:agent", "start:agent"]);
    assert_eq!(
        store.value(status_keys::LAST_EXECUTION_STATUS).as_deref(),
        Some("SUCCESS")
    );
}

#[tokio::test]
async fn agent_rollback_without_previous_records_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let layout = ArtifactLayout::agent(dir.path(), "agent-bin", SERVICE);
    let (host, store) = (RecordingHost::new(), MemoryStore::default());

    rollback_agent(&host, &LocalFs, &store, &FixedClock::default(), &layout).await;

    assert!(host.calls().is_empty());
    assert_eq!(
        store.value(status_keys::LAST_EXECUTION_STATUS).as_deref(),
        Some("ERROR")
    );
}

#[tokio::test]
async fn restore_reports_nothing_to_restore() {
    let dir = tempfile::tempdir().expect("tempdir");
    let layout = ArtifactLayout::messenger(dir.path(), "messenger-bin");

    let outcome = restore_previous(&RecordingHost::new(), &LocalFs, &layout)
        .await
        .expect("restore");

    assert_eq!(outcome, RollbackOutcome::NothingToRestore);
}

#[tokio::test]
async fn messenger_rollback_keeps_recorded_version() {
    let dir = tempfile::tempdir().expect("tempdir");
    let layout = ArtifactLayout::messenger(dir.path(), "messenger-bin");
    write_file(dir.path(), "messenger-bin", b"m2");
    std::fs::create_dir_all(layout.staging_dir()).expect("mkdir");
    std::fs::write(&layout.rollback_path, b"m1").expect("write");
    let host = RecordingHost::new();

    rollback_messenger(&host, &LocalFs, &layout).await;

    assert_eq!(read(&layout.install_path), b"m1");
    assert!(host.calls().is_empty());
}

// ── Messenger install ─────────────────────────────────────────────────────────

fn upgrade(version: &str) -> MessengerUpgrade {
    MessengerUpgrade {
        version: Version::parse(version).expect("semver"),
        url: Url::parse("https://dl.example.com/messenger").expect("url"),
        sha256: HASH.to_string(),
    }
}

#[tokio::test]
async fn messenger_install_records_version() {
    let dir = tempfile::tempdir().expect("tempdir");
    let layout = ArtifactLayout::messenger(dir.path(), "messenger-bin");
    let store = MemoryStore::with(&[(status_keys::MESSENGER_VERSION, "1.0.0")]);

    let disposition = install_messenger(
        &RecordingHost::new(),
        &LocalFs,
        &StubFetcher::serving(b"m"),
        &store,
        &layout,
        &upgrade("1.2.0"),
    )
    .await;

    assert_eq!(disposition, Disposition::Ack);
    assert_eq!(
        store.value(status_keys::MESSENGER_VERSION).as_deref(),
        Some("1.2.0")
    );
    assert_eq!(read(&layout.install_path), b"m");
}

#[tokio::test]
async fn messenger_install_skips_when_already_newer() {
    let dir = tempfile::tempdir().expect("tempdir");
    let layout = ArtifactLayout::messenger(dir.path(), "messenger-bin");
    let store = MemoryStore::with(&[(status_keys::MESSENGER_VERSION, "1.3.0")]);
    let fetcher = StubFetcher::serving(b"m");

    let disposition = install_messenger(
        &RecordingHost::new(),
        &LocalFs,
        &fetcher,
        &store,
        &layout,
        &upgrade("1.2.0"),
    )
    .await;

    assert_eq!(disposition, Disposition::Ack);
    assert!(fetcher.requests().is_empty());
    assert_eq!(
        store.value(status_keys::MESSENGER_VERSION).as_deref(),
        Some("1.3.0")
    );
}

#[tokio::test]
async fn messenger_download_failure_naks() {
    let dir = tempfile::tempdir().expect("tempdir");
    let layout = ArtifactLayout::messenger(dir.path(), "messenger-bin");
    let store = MemoryStore::default();

    let disposition = install_messenger(
        &RecordingHost::new(),
        &LocalFs,
        &StubFetcher::failing(),
        &store,
        &layout,
        &upgrade("1.2.0"),
    )
    .await;

    assert_eq!(disposition, Disposition::Nak(delays::NAK_LONG));
    assert_eq!(store.value(status_keys::MESSENGER_VERSION), None);
}
