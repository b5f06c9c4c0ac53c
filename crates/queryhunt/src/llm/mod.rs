pub mod anthropic;
pub mod sse;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;

pub use anthropic::AnthropicClient;

/// Finite, non-restartable sequence of response fragments.
pub type TextStream = BoxStream<'static, Result<String, GenerativeError>>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerativeError {
    #[error("missing credentials: {0}")]
    MissingCredentials(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("generative service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode generative service response: {0}")]
    Decode(String),
}

/// Remote text generation with a fixed persona and sampling configuration.
///
/// Calls are independent; implementations keep no conversation state.
#[async_trait]
pub trait GenerativeClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, GenerativeError>;

    async fn stream_complete(&self, prompt: &str) -> Result<TextStream, GenerativeError>;
}

/// Drains `stream` in order, handing every fragment to `on_fragment` as it arrives.
pub async fn collect_stream<F>(mut stream: TextStream, mut on_fragment: F) -> Result<String, GenerativeError>
where
    F: FnMut(&str) + Send,
{
    let mut full_text = String::new();
    while let Some(fragment) = stream.next().await {
        let fragment = fragment?;
        on_fragment(&fragment);
        full_text.push_str(&fragment);
    }
    Ok(full_text)
}
