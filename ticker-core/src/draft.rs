//! Single-slot draft persistence.

use serde::{Deserialize, Serialize};

use crate::form::FormState;
use crate::store::{now_ms, LocalStore, StoreError, KEY_DRAFT};

/// The persisted in-progress form snapshot. There is at most one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    /// Style the draft belongs to.
    pub style: String,
    /// Form contents at save time.
    pub form: FormState,
    /// Save time, milliseconds since the Unix epoch.
    pub saved_at_ms: u64,
}

/// Persists and restores the single draft slot.
///
/// A draft is only offered back for the style it was saved under; switching
/// styles leaves the stored draft untouched but invisible until the user
/// returns to that style.
#[derive(Debug, Clone)]
pub struct DraftStore {
    store: LocalStore,
}

impl DraftStore {
    /// Draft store backed by `store`.
    #[must_use]
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    /// Overwrite the draft slot with the current form and style.
    ///
    /// Saving identical content twice is a no-op, so the persisted state
    /// (including its timestamp) is unchanged by repeated saves.
    ///
    /// # Errors
    ///
    /// Returns the storage failure for the caller to surface; nothing is
    /// retried.
    pub fn save(&self, form: &FormState, style: &str) -> Result<(), StoreError> {
        if let Some(existing) = self.store.get::<Draft>(KEY_DRAFT) {
            if existing.style == style && existing.form == *form {
                return Ok(());
            }
        }
        let draft = Draft {
            style: style.to_string(),
            form: form.clone(),
            saved_at_ms: now_ms(),
        };
        self.store.set(KEY_DRAFT, &draft)
    }

    /// Load the draft if one exists for `current_style`.
    ///
    /// A draft saved under a different style is left in place and not
    /// returned.
    #[must_use]
    pub fn load(&self, current_style: &str) -> Option<Draft> {
        let draft: Draft = self.store.get(KEY_DRAFT)?;
        if draft.style == current_style {
            Some(draft)
        } else {
            tracing::debug!(
                saved = %draft.style,
                current = %current_style,
                "draft belongs to another style, not restoring"
            );
            None
        }
    }

    /// Delete the draft slot regardless of style. Missing drafts are fine.
    ///
    /// # Errors
    ///
    /// Returns the storage failure when the slot cannot be deleted.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.remove(KEY_DRAFT)
    }
}
