//! # Ticker Core
//!
//! Client-side core for the Ticker ticket-image generator: derives editable
//! field schemas from server templates, keeps the single in-progress draft
//! and the bounded history log, reconciles history against the remote store
//! with a local-first fallback, and debounces preview generation.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        UI layer                          │
//! │        (pages, dialogs — external to this crate)         │
//! └───────┬───────────────┬───────────────┬──────────────────┘
//!         │ edits         │ commits       │ login/consent
//! ┌───────▼──────┐ ┌──────▼─────────┐ ┌───▼──────────┐
//! │ FormState    │ │ SyncCoordinator│ │ IdentityStore│
//! │ + Scheduler  │ │ + HistoryLog   │ │ + ConsentGate│
//! └───────┬──────┘ └──────┬─────────┘ └───┬──────────┘
//!         │ RenderClient  │ HistoryRemote │
//! ┌───────▼───────────────▼───────────────▼──────────┐
//! │              remote service (ticker-api)         │
//! └──────────────────────────────────────────────────┘
//!                 LocalStore (draft / history / cache)
//! ```
//!
//! Remote boundaries are traits ([`RenderClient`], [`HistoryRemote`]) so the
//! core stays testable without a network; `ticker-api` provides the real
//! implementations.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod config;
pub mod draft;
pub mod error;
pub mod form;
pub mod history;
pub mod identity;
pub mod preview;
pub mod store;
pub mod sync;
pub mod template;

pub use cache::{CacheEntry, TtlCache};
pub use config::CoreConfig;
pub use draft::{Draft, DraftStore};
pub use error::{FieldError, TickerError, TickerResult};
pub use form::{FieldState, FormState};
pub use history::{HistoryLog, HistoryRecord, RecordOrigin, SortOrder};
pub use identity::{ConsentDecision, ConsentGate, IdentityStore, UserIdentity};
pub use preview::{
    GenerateRequest, PreviewEvent, PreviewImage, PreviewScheduler, RenderClient,
};
pub use store::{LocalStore, StoreError};
pub use sync::{
    AppendOutcome, HistoryRemote, LoadOutcome, SyncCoordinator, SyncNotice,
};
pub use template::{
    default_fields, placeholder_names, FieldSchema, SchemaResolver, TemplateDescriptor,
    TemplateEntry, TemplateSegment,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    fn test_version_set() {
        assert!(!super::VERSION.is_empty());
    }
}
