//! Provider source and model configuration sync engine.
//!
//! This crate provides:
//! - Typed records for templates, provider sources, providers and model metadata
//! - An entity store replaced wholesale on every catalog load
//! - An editable copy of the selected source with dirty tracking and
//!   basic/advanced field views
//! - A merged, searchable list of configured and available models
//! - A save/reload protocol against a remote configuration authority
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    ProviderSync                      │
//! │  ┌──────────────────────────────────────────────┐   │
//! │  │                 SessionState                  │   │
//! │  │  ┌─────────────┐  ┌──────────┐  ┌─────────┐  │   │
//! │  │  │ EntityStore │  │Selection │  │ Models  │  │   │
//! │  │  └─────────────┘  └──────────┘  └─────────┘  │   │
//! │  └──────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────┘
//!          │                 │                │
//!          ▼                 ▼                ▼
//!   RemoteAuthority       Notifier         Confirm
//!   (HTTP / memory)
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use provkit_core::{AutoConfirm, HttpRemote, ProviderSync, TracingNotifier};
//!
//! async fn example() -> provkit_core::Result<()> {
//!     let sync = ProviderSync::new(
//!         Arc::new(HttpRemote::new("http://localhost:6185")),
//!         Arc::new(TracingNotifier),
//!         Arc::new(AutoConfirm(true)),
//!     );
//!     sync.load_catalog().await?;
//!     sync.select_id("openai").await?;
//!     sync.fetch_available_models().await?;
//!     Ok(())
//! }
//! ```

mod error;

pub mod confirm;
pub mod editable;
pub mod fields;
pub mod merge;
pub mod notify;
pub mod remote;
pub mod state;
pub mod store;
pub mod sync;
pub mod template;
pub mod types;

pub use confirm::{AutoConfirm, Confirm};
pub use editable::{DirtyTracker, EditableSource};
pub use error::{Error, Result, describe};
pub use fields::{AdvancedView, BasicField, BasicView};
pub use merge::{AvailableModel, ModelEntry};
pub use notify::{Notice, NoticeLevel, NoticeQueue, Notifier, TracingNotifier};
pub use remote::{HttpRemote, InMemoryRemote, RemoteAuthority};
pub use state::{SessionState, SourceChoice, SyncState};
pub use store::{Catalog, EntityStore};
pub use sync::ProviderSync;
pub use types::{
    ModelMetadata, Modality, Provider, ProviderSource, ProviderTemplate, ProviderType, SourceKey,
};
