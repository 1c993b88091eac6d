#![deny(missing_docs)]

//! Core library for the ragingest document ingestion service.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Durable document records and their SQLite repository.
pub mod documents;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Page text extraction for supported document types.
pub mod extraction;
/// In-process task queue and job status gateway.
pub mod jobs;
/// Structured logging and tracing setup.
pub mod logging;
/// Ingestion metrics helpers.
pub mod metrics;
/// Ingestion pipeline orchestration.
pub mod pipeline;
/// Page chunking utilities.
pub mod processing;
/// Qdrant vector store integration.
pub mod qdrant;
/// Upload intake shared by the HTTP and CLI surfaces.
pub mod service;
/// Content-type detection for uploads.
pub mod sniff;
/// Raw document storage.
pub mod storage;
