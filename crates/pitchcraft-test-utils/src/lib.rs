// SPDX-FileCopyrightText: 2026 Pitchcraft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Pitchcraft integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without model downloads or network calls.
//!
//! # Components
//!
//! - [`MockEmbedder`] - Deterministic hashed bag-of-words embeddings
//! - [`MockGenerator`] - Mock generator with pre-configured responses and failures
//! - [`TestHarness`] - Full engine over a temp SQLite database

pub mod harness;
pub mod mock_embedder;
pub mod mock_generator;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_embedder::MockEmbedder;
pub use mock_generator::MockGenerator;
