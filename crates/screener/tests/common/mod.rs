//! Shared test utilities for screener integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated job runs with temp upload/output directories
//! - A scripted search provider and a recording pause, so no test touches
//!   the network or sleeps

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
