//! # ragchat
//!
//! A retrieval-augmented chat backend over a folder of PDFs.
//!
//! PDFs dropped into (or uploaded to) the watched folder are extracted,
//! embedded with OpenAI, and stored in a Pinecone index. Chat queries are
//! embedded, the nearest documents are retrieved, and their text is
//! framed around the question before it goes to the chat model.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────┐
//! │   Watcher   │──▶│  Ingestion   │──▶│ Pinecone │
//! │  + Upload   │   │ Extract+Embed│   │  index   │
//! └─────────────┘   └─────────────┘   └────┬─────┘
//!                                          │ query
//!                   ┌─────────────┐   ┌────┴─────┐
//!   POST /api/chat ▶│  Augmenter  │──▶│   Chat   │
//!                   └─────────────┘   └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and credentials |
//! | [`extract`] | PDF text extraction |
//! | [`embedding`] | OpenAI embeddings |
//! | [`pinecone`] | Pinecone vector store adapter |
//! | [`ingest`] | Ingestion pipeline and single-writer worker |
//! | [`watcher`] | Folder events → ingestion commands |
//! | [`augment`] | Retrieval and prompt augmentation |
//! | [`generate`] | Chat completion |
//! | [`server`] | HTTP API |
//! | [`stats`] | Pipeline counters |
//! | [`app`] | Command wiring |

pub mod app;
pub mod augment;
pub mod config;
pub mod embedding;
pub mod extract;
pub mod generate;
pub mod http;
pub mod ingest;
pub mod pinecone;
pub mod server;
pub mod stats;
pub mod watcher;
