//! Inference Module
//!
//! Model-inference collaborator implementations. The core only sees the
//! `ModelClient` trait.

mod ollama;

pub use ollama::OllamaClient;
