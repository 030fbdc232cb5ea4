// SPDX-FileCopyrightText: 2026 Pitchcraft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Business-profile knowledge for the Pitchcraft RAG engine.
//!
//! ## Architecture
//!
//! - **extractor**: raw onboarding fields to one draft per source field
//! - **IngestionPipeline**: extract, embed with a timeout, single upsert
//! - **SqliteVectorStore**: BLOB embeddings with a scope-filtered cosine scan
//! - **Retriever**: scoped top-K with a deterministic tie-break

pub mod extractor;
pub mod ingest;
pub mod retriever;
pub mod store;
pub mod vector;

pub use extractor::{ExtractedProfile, extract};
pub use ingest::IngestionPipeline;
pub use retriever::Retriever;
pub use store::SqliteVectorStore;
