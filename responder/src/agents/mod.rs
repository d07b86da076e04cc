pub mod completion;
pub mod retriever;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::RetrievedDocument;

pub use completion::CompletionAgent;
pub use retriever::RetrieverAgent;

/// Similarity search over an indexed document collection.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Returns up to `k` documents from `collection`, most similar first.
    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        collection: &str,
    ) -> Result<Vec<RetrievedDocument>>;
}

/// Text generation from a system role and a single user prompt.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, system_role: &str, prompt: &str, temperature: f32) -> Result<String>;
}
