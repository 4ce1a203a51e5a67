//! Shared client state: the session mirror and the employee list cache.
//!
//! DESIGN
//! ======
//! Each store owns a `tokio::sync::watch` channel. Readers get snapshots or
//! a receiver; only the store's own methods write. Stores are injected as
//! `Arc`s so the route guard, the console and the auth listener share one
//! instance without globals.

pub mod employees;
pub mod session;

// =============================================================================
// TEST HELPERS
// =============================================================================
