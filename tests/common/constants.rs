//! Shared constants for end-to-end tests
//!
//! When the seeded data changes, update only this file.

/// Bearer token the fake backend expects
pub const TEST_TOKEN: &str = "test-token-123";

/// Number of seeded notifications
pub const SEEDED_TOTAL: usize = 25;

/// Number of seeded notifications that start unread
pub const SEEDED_UNREAD: usize = 15;

/// Page size used by the test settings
pub const TEST_PER_PAGE: u32 = 10;

/// How long to wait for asynchronous conditions before failing a test
pub const WAIT_TIMEOUT_MS: u64 = 5000;

/// How often to re-check an asynchronous condition
pub const WAIT_POLL_INTERVAL_MS: u64 = 10;
