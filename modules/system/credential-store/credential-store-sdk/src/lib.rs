//! Credential Store SDK
//!
//! This crate provides the public API of the persistent credential store:
//!
//! - [`CredentialStore`] - Trait implemented by storage backends
//! - [`PublicKeyRecord`] - Per-tenant bearer-token verification key
//! - [`StoreError`] - Error types
//!
//! ## Usage
//!
//! The gateway receives an `Arc<dyn CredentialStore>` from its composition root:
//!
//! ```ignore
//! use credential_store_sdk::CredentialStore;
//!
//! let hit = store.lookup_by_username("acme.io", "foo").await?;
//! ```

pub mod api;
pub mod error;
pub mod models;

pub use api::CredentialStore;
pub use error::{RecordKind, StoreError};
pub use models::{DEFAULT_ROLE_KEY, PUBLIC_KEY_DOC_ID, PublicKeyRecord};
