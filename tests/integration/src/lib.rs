//! Integration tests for the mesh pipeline
//!
//! This test suite validates:
//! - Registration, topology and routing working together end to end
//! - Sealed delivery, tamper detection and expiry through the service
//! - The SQLite ledger backend behind the same service
//! - Battery drain and event fan-out under a running runtime

pub mod test_utils;

#[cfg(test)]
mod end_to_end_tests;

#[cfg(test)]
mod sqlite_backend_tests;

#[cfg(test)]
mod drain_event_tests;
