//! Pipe stdin to an Ollama-compatible `/api/generate` endpoint and stream the
//! model's answer to stdout.
//!
//! One-shot mode sends the whole input as a single prompt. Follow mode
//! batches lines per buffer window and carries the model's context from one
//! batch to the next, so the model keeps the conversation going.

pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod relay;
pub mod session;
pub mod stdin;
pub mod worker;

pub use client::{OllamaClient, Transport};
pub use config::{Args, Config};
pub use error::{ConfigError, Error, PartialRead, TransportError};
pub use models::{Context, GenerateFragment, GenerateRequest};
pub use worker::BatchWorker;
