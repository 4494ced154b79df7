//! # ragchat core
//!
//! Shared, I/O-free logic for ragchat: vector record models, document
//! identifiers, chunking, the vector store and embedder abstractions, and
//! the prompt templates used for retrieval augmentation.
//!
//! This crate contains no tokio runtime, HTTP client, or filesystem I/O.
//! Concrete adapters (OpenAI, Pinecone, PDF extraction) live in the
//! `ragchat` app crate.

pub mod chunk;
pub mod embedding;
pub mod models;
pub mod prompt;
pub mod store;
