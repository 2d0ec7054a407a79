//! History sync behaviour against an unreliable remote store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ticker_core::{
    CoreConfig, FormState, HistoryRecord, HistoryRemote, IdentityStore, LocalStore, RecordOrigin,
    SortOrder, SyncCoordinator, SyncNotice, TickerError, TickerResult, UserIdentity,
};

/// In-test remote whose failures can be switched on per operation.
#[derive(Default)]
struct FlakyRemote {
    stored: Mutex<Vec<HistoryRecord>>,
    fail_upload: AtomicBool,
    fail_fetch: AtomicBool,
    fail_delete: AtomicBool,
}

impl FlakyRemote {
    fn stored_ids(&self) -> Vec<String> {
        self.stored
            .lock()
            .expect("lock")
            .iter()
            .map(|r| r.id.clone())
            .collect()
    }
}

#[async_trait]
impl HistoryRemote for FlakyRemote {
    async fn upload(&self, _user_id: &str, records: &[HistoryRecord]) -> TickerResult<()> {
        if self.fail_upload.load(Ordering::SeqCst) {
            return Err(TickerError::Network("connection reset".into()));
        }
        self.stored
            .lock()
            .expect("lock")
            .extend_from_slice(records);
        Ok(())
    }

    async fn fetch(&self, _user_id: &str) -> TickerResult<Vec<HistoryRecord>> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(TickerError::Network("offline".into()));
        }
        Ok(self.stored.lock().expect("lock").clone())
    }

    async fn delete(&self, _user_id: &str, record_id: &str) -> TickerResult<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(TickerError::RemoteRejected {
                status: 500,
                message: "internal error".into(),
            });
        }
        self.stored
            .lock()
            .expect("lock")
            .retain(|r| r.id != record_id);
        Ok(())
    }

    async fn batch_delete(&self, _user_id: &str, record_ids: &[String]) -> TickerResult<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(TickerError::RemoteRejected {
                status: 500,
                message: "internal error".into(),
            });
        }
        self.stored
            .lock()
            .expect("lock")
            .retain(|r| !record_ids.contains(&r.id));
        Ok(())
    }
}

fn signed_in(store: &LocalStore) -> IdentityStore {
    let identity = IdentityStore::new(store.clone());
    identity
        .save(&UserIdentity {
            user_id: "user_1".into(),
            nick_name: None,
            avatar_url: None,
            register_time: None,
        })
        .expect("save identity");
    identity
}

fn record(timestamp_ms: u64) -> HistoryRecord {
    let mut record = HistoryRecord::new("red15", FormState::default(), None);
    record.timestamp_ms = timestamp_ms;
    record
}

fn coordinator(
    store: &LocalStore,
    identity: IdentityStore,
    remote: &Arc<FlakyRemote>,
    cap: usize,
) -> SyncCoordinator<FlakyRemote> {
    let config = CoreConfig {
        history_cap: cap,
        ..CoreConfig::default()
    };
    SyncCoordinator::new(store.clone(), identity, Arc::clone(remote), &config)
}

#[tokio::test]
async fn test_append_with_working_remote_is_remote_origin() {
    let store = LocalStore::new();
    let remote = Arc::new(FlakyRemote::default());
    let sync = coordinator(&store, signed_in(&store), &remote, 100);

    let outcome = sync.append(record(1)).await.expect("append");
    assert_eq!(outcome.origin, RecordOrigin::Remote);
    assert!(outcome.notice.is_none());
    assert_eq!(remote.stored_ids().len(), 1);
    assert_eq!(sync.snapshot(SortOrder::NewestFirst)[0].origin, RecordOrigin::Remote);
}

#[tokio::test]
async fn test_append_survives_remote_failure() {
    let store = LocalStore::new();
    let remote = Arc::new(FlakyRemote::default());
    remote.fail_upload.store(true, Ordering::SeqCst);
    let sync = coordinator(&store, signed_in(&store), &remote, 100);

    let outcome = sync.append(record(1)).await.expect("append");
    assert_eq!(outcome.origin, RecordOrigin::LocalOnly);
    assert!(matches!(outcome.notice, Some(SyncNotice::UploadFailed(_))));

    // The record is never lost to a failed remote write.
    let records = sync.snapshot(SortOrder::NewestFirst);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].origin, RecordOrigin::LocalOnly);
    assert!(remote.stored_ids().is_empty());
}

#[tokio::test]
async fn test_append_without_identity_is_local_only() {
    let store = LocalStore::new();
    let remote = Arc::new(FlakyRemote::default());
    let sync = coordinator(&store, IdentityStore::new(store.clone()), &remote, 100);

    let outcome = sync.append(record(1)).await.expect("append");
    assert_eq!(outcome.origin, RecordOrigin::LocalOnly);
    assert!(outcome.notice.is_none());
    assert!(remote.stored_ids().is_empty());
}

#[tokio::test]
async fn test_cap_enforced_across_appends() {
    let store = LocalStore::new();
    let remote = Arc::new(FlakyRemote::default());
    let sync = coordinator(&store, IdentityStore::new(store.clone()), &remote, 3);

    for ts in 1..=10 {
        sync.append(record(ts)).await.expect("append");
    }
    let stamps: Vec<u64> = sync
        .snapshot(SortOrder::NewestFirst)
        .iter()
        .map(|r| r.timestamp_ms)
        .collect();
    assert_eq!(stamps, vec![10, 9, 8]);
}

#[tokio::test]
async fn test_load_replaces_mirror_wholesale() {
    let store = LocalStore::new();
    let remote = Arc::new(FlakyRemote::default());
    remote
        .stored
        .lock()
        .expect("lock")
        .extend(vec![record(5), record(6)]);
    let sync = coordinator(&store, signed_in(&store), &remote, 100);

    // Seed a local-only record that the remote does not know about.
    remote.fail_upload.store(true, Ordering::SeqCst);
    sync.append(record(1)).await.expect("append");
    remote.fail_upload.store(false, Ordering::SeqCst);

    let outcome = sync.load().await.expect("load");
    assert!(outcome.notice.is_none());
    let stamps: Vec<u64> = outcome.records.iter().map(|r| r.timestamp_ms).collect();
    assert_eq!(stamps, vec![6, 5]);
    assert!(outcome
        .records
        .iter()
        .all(|r| r.origin == RecordOrigin::Remote));
}

#[tokio::test]
async fn test_load_failure_leaves_mirror_untouched() {
    let store = LocalStore::new();
    let remote = Arc::new(FlakyRemote::default());
    let sync = coordinator(&store, signed_in(&store), &remote, 100);
    sync.append(record(1)).await.expect("append");

    remote.fail_fetch.store(true, Ordering::SeqCst);
    let outcome = sync.load().await.expect("load");
    assert!(matches!(outcome.notice, Some(SyncNotice::FetchFailed(_))));
    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.records[0].timestamp_ms, 1);
}

#[tokio::test]
async fn test_load_without_identity_serves_mirror() {
    let store = LocalStore::new();
    let remote = Arc::new(FlakyRemote::default());
    remote.stored.lock().expect("lock").push(record(9));
    let sync = coordinator(&store, IdentityStore::new(store.clone()), &remote, 100);
    sync.append(record(1)).await.expect("append");

    let outcome = sync.load().await.expect("load");
    assert!(outcome.notice.is_none());
    // Remote content is not consulted without an identity.
    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.records[0].timestamp_ms, 1);
}

#[tokio::test]
async fn test_delete_is_local_immediate_despite_remote_failure() {
    let store = LocalStore::new();
    let remote = Arc::new(FlakyRemote::default());
    let sync = coordinator(&store, signed_in(&store), &remote, 100);
    let outcome = sync.append(record(1)).await.expect("append");
    assert_eq!(outcome.origin, RecordOrigin::Remote);
    let id = sync.snapshot(SortOrder::NewestFirst)[0].id.clone();

    remote.fail_delete.store(true, Ordering::SeqCst);
    let notice = sync.delete(&id).await.expect("delete");
    assert!(matches!(notice, Some(SyncNotice::RemoteDeleteFailed(_))));
    assert!(sync.is_empty());
    // Still on the remote, which is the accepted eventual-consistency gap.
    assert_eq!(remote.stored_ids(), vec![id]);
}

#[tokio::test]
async fn test_batch_delete_removes_locally_and_remotely() {
    let store = LocalStore::new();
    let remote = Arc::new(FlakyRemote::default());
    let sync = coordinator(&store, signed_in(&store), &remote, 100);
    for ts in 1..=3 {
        sync.append(record(ts)).await.expect("append");
    }
    let ids: Vec<String> = sync
        .snapshot(SortOrder::NewestFirst)
        .iter()
        .take(2)
        .map(|r| r.id.clone())
        .collect();

    let notice = sync.batch_delete(&ids).await.expect("batch delete");
    assert!(notice.is_none());
    assert_eq!(sync.len(), 1);
    assert_eq!(remote.stored_ids().len(), 1);
}

#[tokio::test]
async fn test_clear_all() {
    let store = LocalStore::new();
    let remote = Arc::new(FlakyRemote::default());
    let sync = coordinator(&store, signed_in(&store), &remote, 100);
    for ts in 1..=3 {
        sync.append(record(ts)).await.expect("append");
    }

    let notice = sync.clear_all().await.expect("clear");
    assert!(notice.is_none());
    assert!(sync.is_empty());
    assert!(remote.stored_ids().is_empty());
}

#[tokio::test]
async fn test_mirror_persists_across_restarts() {
    let store = LocalStore::new();
    let remote = Arc::new(FlakyRemote::default());
    {
        let sync = coordinator(&store, IdentityStore::new(store.clone()), &remote, 100);
        sync.append(record(1)).await.expect("append");
        sync.append(record(2)).await.expect("append");
    }

    let reopened = coordinator(&store, IdentityStore::new(store.clone()), &remote, 100);
    let stamps: Vec<u64> = reopened
        .snapshot(SortOrder::NewestFirst)
        .iter()
        .map(|r| r.timestamp_ms)
        .collect();
    assert_eq!(stamps, vec![2, 1]);
}
