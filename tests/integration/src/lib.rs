//! Integration tests for the authring workspace
//!
//! This test suite validates:
//! - The verify-then-reset flow of a contact's identity key
//! - Single-flight initialisation under real multi-threaded contention
//! - Key-change detection and signed encryption keys across accounts
//! - Identity mismatches poisoning the context
//! - Persistence through the SQLite attribute store

pub mod test_utils;

#[cfg(test)]
mod end_to_end_tests;

#[cfg(test)]
mod key_change_tests;

#[cfg(test)]
mod persistence_tests;
