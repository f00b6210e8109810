//! Shared helpers for unit tests.

pub mod fake;
pub mod socket_guard;
