//! Hosted model clients for Syllabus.
//!
//! - [`AnthropicProvider`] implements `syllabus_core::Provider` over the
//!   Anthropic Messages API.
//! - [`OpenAiEmbedder`] implements `syllabus_core::Embedder` over an
//!   OpenAI-compatible `/embeddings` endpoint.

pub mod anthropic;
pub mod openai_embed;

pub use anthropic::AnthropicProvider;
pub use openai_embed::OpenAiEmbedder;
