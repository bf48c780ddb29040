//! The answering engine.
//!
//! A query flows through a fixed **two-round** protocol:
//!
//! 1. **Fetch history** for the session and build the system prompt
//! 2. **Round 1**: send prompt, question and tool descriptors to the model
//! 3. **If tool calls**: dispatch each one, append the results
//! 4. **Round 2**: send the full chain with descriptors withheld
//! 5. **Record** the exchange and return the answer with its sources
//!
//! A direct answer in round 1 ends the query there.

pub mod generator;
pub mod history;
pub mod prompt;
pub mod rag_system;

#[cfg(test)]
mod test_helpers;

pub use generator::{Generation, Generator};
pub use history::SessionStore;
pub use rag_system::{CourseCatalog, IngestSummary, QueryRequest, QueryResponse, RagSystem};
