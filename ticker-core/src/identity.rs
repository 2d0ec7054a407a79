//! User identity and privacy consent.
//!
//! Identity comes from an external login flow; the core only persists the
//! resulting [`UserIdentity`] and hands its `user_id` to the sync
//! coordinator. Consent is modeled as an awaitable [`ConsentGate`] the UI
//! resolves, instead of a poll loop.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::store::{LocalStore, StoreError, KEY_DRAFT, KEY_HISTORY, KEY_IDENTITY, KEY_PRIVACY};

/// A registered user, as returned by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Stable server-assigned user id.
    pub user_id: String,
    /// Display name, if the user shared one.
    #[serde(default)]
    pub nick_name: Option<String>,
    /// Avatar URL, if the user shared one.
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Registration time as reported by the server.
    #[serde(default)]
    pub register_time: Option<String>,
}

/// Persists the current identity and the privacy-consent flag.
#[derive(Debug, Clone)]
pub struct IdentityStore {
    store: LocalStore,
}

impl IdentityStore {
    /// Identity store backed by `store`.
    #[must_use]
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    /// The signed-in identity, if any.
    #[must_use]
    pub fn current(&self) -> Option<UserIdentity> {
        self.store.get(KEY_IDENTITY)
    }

    /// Persist `identity` as the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns the storage failure when persistence fails.
    pub fn save(&self, identity: &UserIdentity) -> Result<(), StoreError> {
        self.store.set(KEY_IDENTITY, identity)
    }

    /// Sign out: remove the identity and wipe user-scoped state (draft and
    /// history mirror). The consent flag is kept.
    ///
    /// # Errors
    ///
    /// Returns the first storage failure; earlier removals stay applied.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.remove(KEY_IDENTITY)?;
        self.store.remove(KEY_DRAFT)?;
        self.store.remove(KEY_HISTORY)?;
        Ok(())
    }

    /// Whether the user has agreed to the privacy policy.
    #[must_use]
    pub fn privacy_agreed(&self) -> bool {
        self.store.get(KEY_PRIVACY).unwrap_or(false)
    }

    /// Persist the privacy-consent flag.
    ///
    /// # Errors
    ///
    /// Returns the storage failure when persistence fails.
    pub fn set_privacy_agreed(&self, agreed: bool) -> Result<(), StoreError> {
        self.store.set(KEY_PRIVACY, &agreed)
    }
}

/// Outcome of waiting for the user's consent decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentDecision {
    /// The user agreed.
    Granted,
    /// The user declined.
    Denied,
    /// No decision arrived within the timeout.
    TimedOut,
}

/// One-shot gate the UI resolves when the user answers the consent dialog.
///
/// Callers await [`ConsentGate::wait`]; the dialog calls
/// [`ConsentGate::grant`] or [`ConsentGate::deny`]. Multiple waiters all see
/// the same decision, and a decision made before `wait` resolves it
/// immediately.
#[derive(Debug, Clone)]
pub struct ConsentGate {
    tx: watch::Sender<Option<bool>>,
}

impl ConsentGate {
    /// Gate with no decision yet.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Record that the user agreed.
    pub fn grant(&self) {
        // send_replace stores the value even with no live receiver, so a
        // decision made before anyone waits is kept.
        self.tx.send_replace(Some(true));
    }

    /// Record that the user declined.
    pub fn deny(&self) {
        self.tx.send_replace(Some(false));
    }

    /// Wait for the decision, up to `timeout`.
    pub async fn wait(&self, timeout: Duration) -> ConsentDecision {
        let mut rx = self.tx.subscribe();
        let decided = async {
            loop {
                let current = *rx.borrow_and_update();
                if let Some(agreed) = current {
                    return agreed;
                }
                if rx.changed().await.is_err() {
                    // Gate dropped without a decision.
                    return false;
                }
            }
        };
        match tokio::time::timeout(timeout, decided).await {
            Ok(true) => ConsentDecision::Granted,
            Ok(false) => ConsentDecision::Denied,
            Err(_) => ConsentDecision::TimedOut,
        }
    }
}

impl Default for ConsentGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::DraftStore;
    use crate::form::FormState;

    fn identity(user_id: &str) -> UserIdentity {
        UserIdentity {
            user_id: user_id.to_string(),
            nick_name: Some("旅客".to_string()),
            avatar_url: None,
            register_time: None,
        }
    }

    #[test]
    fn test_save_and_current() {
        let store = IdentityStore::new(LocalStore::new());
        assert!(store.current().is_none());
        store.save(&identity("user_1")).expect("save should succeed");
        assert_eq!(
            store.current().map(|i| i.user_id),
            Some("user_1".to_string())
        );
    }

    #[test]
    fn test_clear_wipes_user_scoped_state() {
        let local = LocalStore::new();
        let store = IdentityStore::new(local.clone());
        let drafts = DraftStore::new(local.clone());

        store.save(&identity("user_1")).expect("save should succeed");
        drafts
            .save(&FormState::default(), "red15")
            .expect("draft save should succeed");
        local
            .set(KEY_HISTORY, &[1, 2, 3])
            .expect("history save should succeed");
        store.set_privacy_agreed(true).expect("consent save");

        store.clear().expect("clear should succeed");
        assert!(store.current().is_none());
        assert!(!local.contains(KEY_DRAFT));
        assert!(!local.contains(KEY_HISTORY));
        // Consent is not user-scoped.
        assert!(store.privacy_agreed());
    }

    #[test]
    fn test_privacy_flag_defaults_false() {
        let store = IdentityStore::new(LocalStore::new());
        assert!(!store.privacy_agreed());
    }

    #[tokio::test]
    async fn test_consent_granted_before_wait() {
        let gate = ConsentGate::new();
        gate.grant();
        assert_eq!(
            gate.wait(Duration::from_secs(1)).await,
            ConsentDecision::Granted
        );
    }

    #[tokio::test]
    async fn test_consent_denied_before_wait() {
        let gate = ConsentGate::new();
        gate.deny();
        assert_eq!(
            gate.wait(Duration::from_secs(1)).await,
            ConsentDecision::Denied
        );
    }

    #[tokio::test]
    async fn test_consent_denied_while_waiting() {
        let gate = ConsentGate::new();
        let waiter = gate.clone();
        let handle = tokio::spawn(async move { waiter.wait(Duration::from_secs(5)).await });
        tokio::task::yield_now().await;
        gate.deny();
        assert_eq!(handle.await.expect("join"), ConsentDecision::Denied);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consent_times_out() {
        let gate = ConsentGate::new();
        assert_eq!(
            gate.wait(Duration::from_secs(10)).await,
            ConsentDecision::TimedOut
        );
    }
}
