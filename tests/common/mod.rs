//! Common test infrastructure
//!
//! End-to-end tests drive the real `ApiClient` and `SyncEngine` against an
//! in-process fake backend. Tests should only import from this module, not
//! from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::TestBackend;
//!
//! #[tokio::test]
//! async fn test_list() {
//!     let backend = TestBackend::spawn().await;
//!     let client = backend.client();
//!     // ...
//! }
//! ```

mod constants;
mod fixtures;
mod server;

// Public API - this is what tests import
pub use constants::*;
#[allow(unused_imports)]
pub use fixtures::{make_notification, seed_notifications};
pub use server::{BackendState, TestBackend};
