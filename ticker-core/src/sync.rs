//! History synchronization against the remote store.
//!
//! The coordinator keeps a bounded local mirror ([`HistoryLog`]) and writes
//! through to a [`HistoryRemote`] when an identity is present. Remote
//! failures never fail the local operation: they degrade to a
//! [`SyncNotice`] the caller can surface, while the mirror stays the source
//! of truth for display.
//!
//! ```text
//!  append ──► remote upload (best effort) ──► mirror insert + persist
//!  load   ──► remote fetch ── ok ──► mirror replaced wholesale
//!                         └─ err ─► unchanged mirror + notice
//!  delete ──► mirror remove + persist ──► remote delete (best effort)
//! ```

use std::fmt;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::config::CoreConfig;
use crate::error::TickerResult;
use crate::history::{HistoryLog, HistoryRecord, RecordOrigin, SortOrder};
use crate::identity::IdentityStore;
use crate::store::{LocalStore, StoreError, KEY_HISTORY};

/// Remote history service boundary.
#[async_trait]
pub trait HistoryRemote: Send + Sync {
    /// Upload `records` for `user_id`.
    async fn upload(&self, user_id: &str, records: &[HistoryRecord]) -> TickerResult<()>;

    /// Fetch all records stored remotely for `user_id`.
    async fn fetch(&self, user_id: &str) -> TickerResult<Vec<HistoryRecord>>;

    /// Delete one record remotely.
    async fn delete(&self, user_id: &str, record_id: &str) -> TickerResult<()>;

    /// Delete several records remotely in one call.
    async fn batch_delete(&self, user_id: &str, record_ids: &[String]) -> TickerResult<()>;
}

/// Non-fatal degradation accompanying a successful local outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncNotice {
    /// The remote upload failed; the record is kept locally.
    UploadFailed(String),
    /// The remote fetch failed; the local mirror is being served.
    FetchFailed(String),
    /// The remote delete failed; the record may reappear on the next
    /// authoritative load.
    RemoteDeleteFailed(String),
}

impl fmt::Display for SyncNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UploadFailed(reason) => write!(f, "upload failed, kept locally: {reason}"),
            Self::FetchFailed(reason) => write!(f, "fetch failed, showing local history: {reason}"),
            Self::RemoteDeleteFailed(reason) => write!(f, "remote delete failed: {reason}"),
        }
    }
}

/// Result of [`SyncCoordinator::append`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendOutcome {
    /// Where the record ended up durably accepted.
    pub origin: RecordOrigin,
    /// Degradation notice, when the remote write failed.
    pub notice: Option<SyncNotice>,
}

/// Result of [`SyncCoordinator::load`].
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOutcome {
    /// Records for display, newest first.
    pub records: Vec<HistoryRecord>,
    /// Degradation notice, when the remote fetch failed.
    pub notice: Option<SyncNotice>,
}

/// Write-through history coordinator with local-first fallback.
///
/// Mutations take a single lock around the mirror mutation and its persist,
/// so a concurrent reader never observes a half-applied change.
pub struct SyncCoordinator<R> {
    log: RwLock<HistoryLog>,
    store: LocalStore,
    identity: IdentityStore,
    remote: Arc<R>,
}

impl<R: HistoryRemote> SyncCoordinator<R> {
    /// Coordinator over `store`'s persisted mirror, with the cap from
    /// `config`.
    #[must_use]
    pub fn new(
        store: LocalStore,
        identity: IdentityStore,
        remote: Arc<R>,
        config: &CoreConfig,
    ) -> Self {
        let mut log = HistoryLog::new(config.history_cap);
        if let Some(records) = store.get::<Vec<HistoryRecord>>(KEY_HISTORY) {
            log.replace_all(records);
        }
        Self {
            log: RwLock::new(log),
            store,
            identity,
            remote,
        }
    }

    /// Commit a generated ticket to history.
    ///
    /// With an identity the record is first offered to the remote store; a
    /// successful upload marks it [`RecordOrigin::Remote`], a failed one
    /// leaves it [`RecordOrigin::LocalOnly`] with a notice. Either way the
    /// record lands in the local mirror — a failed remote write never loses
    /// it.
    ///
    /// # Errors
    ///
    /// Returns a storage failure when persisting the mirror fails; the
    /// in-memory mirror still holds the record.
    pub async fn append(&self, mut record: HistoryRecord) -> TickerResult<AppendOutcome> {
        let mut notice = None;
        record.origin = RecordOrigin::LocalOnly;
        if let Some(user) = self.identity.current() {
            match self
                .remote
                .upload(&user.user_id, std::slice::from_ref(&record))
                .await
            {
                Ok(()) => record.origin = RecordOrigin::Remote,
                Err(e) => {
                    tracing::warn!(record_id = %record.id, "history upload failed: {e}");
                    notice = Some(SyncNotice::UploadFailed(e.to_string()));
                }
            }
        }

        let origin = record.origin;
        let mut log = self
            .log
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        log.insert(record);
        let persisted = self.persist(&log);
        drop(log);
        persisted?;

        Ok(AppendOutcome { origin, notice })
    }

    /// Load history for display.
    ///
    /// With an identity the remote store is authoritative: a successful
    /// fetch replaces the mirror wholesale and is persisted. This means a
    /// record whose remote delete failed earlier can reappear here; that
    /// eventual-consistency wrinkle is accepted. A failed fetch leaves the
    /// mirror untouched and adds a notice.
    ///
    /// # Errors
    ///
    /// Returns a storage failure when persisting the refreshed mirror fails.
    pub async fn load(&self) -> TickerResult<LoadOutcome> {
        let mut notice = None;
        if let Some(user) = self.identity.current() {
            match self.remote.fetch(&user.user_id).await {
                Ok(mut records) => {
                    for record in &mut records {
                        record.origin = RecordOrigin::Remote;
                    }
                    let mut log = self
                        .log
                        .write()
                        .unwrap_or_else(std::sync::PoisonError::into_inner);
                    log.replace_all(records);
                    let persisted = self.persist(&log);
                    drop(log);
                    persisted?;
                }
                Err(e) => {
                    tracing::warn!("history fetch failed, serving local mirror: {e}");
                    notice = Some(SyncNotice::FetchFailed(e.to_string()));
                }
            }
        }
        Ok(LoadOutcome {
            records: self.snapshot(SortOrder::NewestFirst),
            notice,
        })
    }

    /// Delete one record.
    ///
    /// The local removal is immediate and unconditional; the remote delete
    /// is best effort and its failure only produces a notice.
    ///
    /// # Errors
    ///
    /// Returns a storage failure when persisting the mirror fails.
    pub async fn delete(&self, record_id: &str) -> TickerResult<Option<SyncNotice>> {
        {
            let mut log = self
                .log
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            log.remove(record_id);
            let persisted = self.persist(&log);
            drop(log);
            persisted?;
        }

        let mut notice = None;
        if let Some(user) = self.identity.current() {
            if let Err(e) = self.remote.delete(&user.user_id, record_id).await {
                tracing::warn!(record_id, "remote delete failed: {e}");
                notice = Some(SyncNotice::RemoteDeleteFailed(e.to_string()));
            }
        }
        Ok(notice)
    }

    /// Delete several records at once, same policy as [`Self::delete`].
    ///
    /// # Errors
    ///
    /// Returns a storage failure when persisting the mirror fails.
    pub async fn batch_delete(&self, record_ids: &[String]) -> TickerResult<Option<SyncNotice>> {
        {
            let mut log = self
                .log
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            log.remove_many(record_ids);
            let persisted = self.persist(&log);
            drop(log);
            persisted?;
        }

        let mut notice = None;
        if let Some(user) = self.identity.current() {
            if let Err(e) = self.remote.batch_delete(&user.user_id, record_ids).await {
                tracing::warn!(count = record_ids.len(), "remote batch delete failed: {e}");
                notice = Some(SyncNotice::RemoteDeleteFailed(e.to_string()));
            }
        }
        Ok(notice)
    }

    /// Delete the whole history, local first, remote best effort.
    ///
    /// # Errors
    ///
    /// Returns a storage failure when persisting the cleared mirror fails.
    pub async fn clear_all(&self) -> TickerResult<Option<SyncNotice>> {
        let ids: Vec<String> = {
            let mut log = self
                .log
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let ids = log.records().iter().map(|r| r.id.clone()).collect();
            log.clear();
            let persisted = self.persist(&log);
            drop(log);
            persisted?;
            ids
        };

        let mut notice = None;
        if !ids.is_empty() {
            if let Some(user) = self.identity.current() {
                if let Err(e) = self.remote.batch_delete(&user.user_id, &ids).await {
                    tracing::warn!("remote clear failed: {e}");
                    notice = Some(SyncNotice::RemoteDeleteFailed(e.to_string()));
                }
            }
        }
        Ok(notice)
    }

    /// Snapshot of the mirror in the requested display order.
    #[must_use]
    pub fn snapshot(&self, order: SortOrder) -> Vec<HistoryRecord> {
        self.log
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .sorted(order)
    }

    /// Number of records in the mirror.
    #[must_use]
    pub fn len(&self) -> usize {
        self.log
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Whether the mirror is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn persist(&self, log: &HistoryLog) -> Result<(), StoreError> {
        self.store.set(KEY_HISTORY, &log.records())
    }
}
