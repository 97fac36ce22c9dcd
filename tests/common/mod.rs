//! Shared helpers for the test targets.

pub mod fixtures;
