//! Conversation memory
//!
//! Keeps the history handed to generation bounded: older messages are
//! folded into a rolling summary, the most recent ones stay verbatim.

pub mod compressor;

pub use compressor::{estimate_tokens, extract_key_points, extract_topics, ContextCompressor};
