//! Umbrella crate for host applications.
//!
//! With the default `desktop-shims` feature the sync service is re-exported
//! as [`service`], wired to the reqwest HTTP client. Hosts that bring their
//! own `HttpClient` can depend on `core-service` directly with default
//! features off.

#[cfg(feature = "desktop-shims")]
pub use core_service as service;
