//! Language Model traits

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::{GenerateRequest, GenerateResponse, Result, StreamChunk};

/// Boxed stream of generation deltas
pub type ChunkStream<'a> = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send + 'a>>;

/// Language Model interface
///
/// Implementations:
/// - `HttpLanguageModel` - messages-style HTTP API with SSE streaming
///
/// # Example
///
/// ```ignore
/// let llm: Arc<dyn LanguageModel> = Arc::new(HttpLanguageModel::new(config)?);
/// let request = GenerateRequest::new("You are a helpful assistant")
///     .with_user_message("Hello");
/// let mut stream = llm.generate_stream(request);
/// while let Some(chunk) = stream.next().await {
///     print!("{}", chunk?.delta);
/// }
/// ```
#[async_trait]
pub trait LanguageModel: Send + Sync + 'static {
    /// Generate a full completion.
    ///
    /// Used for summarization and other short utility calls.
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse>;

    /// Stream text deltas as they are generated.
    ///
    /// The stream yields text chunks followed by one chunk with
    /// `is_final` set. Dropping the stream abandons the request.
    fn generate_stream<'a>(&'a self, request: GenerateRequest) -> ChunkStream<'a>;

    /// Check if the backend is reachable
    async fn is_available(&self) -> bool {
        true
    }

    /// Get model name for logging
    fn model_name(&self) -> &str;
}
