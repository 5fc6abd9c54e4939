#![deny(missing_docs)]

//! Core library for the Government Reporter ingestion pipeline and MCP server.

/// Government API adapters and the shared document model.
pub mod apis;
/// Command-line parsing and command dispatch.
pub mod cli;
/// Environment-driven configuration management.
pub mod config;
/// Rate-limited HTTP client shared by the API adapters.
pub mod http;
/// Batch ingestion pipeline: progress tracking, monitoring, and ingesters.
pub mod ingestion;
/// Structured logging and tracing setup.
pub mod logging;
/// Model Context Protocol server implementation.
pub mod mcp;
/// Document processing pipeline: chunking, extraction, embeddings, payloads.
pub mod processing;
/// Qdrant vector store integration.
pub mod qdrant;
