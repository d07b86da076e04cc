// Retriever Agent: similarity search against the vector-store service

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use super::Retriever;
use crate::models::{RetrievalQuery, RetrievalResult, RetrievedDocument};

pub struct RetrieverAgent {
    client: reqwest::Client,
    vector_db_url: String,
}

impl RetrieverAgent {
    pub fn new(vector_db_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            vector_db_url: vector_db_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Retriever for RetrieverAgent {
    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        collection: &str,
    ) -> Result<Vec<RetrievedDocument>> {
        info!("Retriever: Searching '{}' (k={}) for: {}", collection, k, query);

        let resp = self
            .client
            .post(format!("{}/query", self.vector_db_url))
            .json(&RetrievalQuery { query, k, collection })
            .send()
            .await
            .context("vector store unreachable")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!("Retriever: vector store returned {}: {}", status, body);
            anyhow::bail!("vector store returned {}: {}", status, body);
        }

        let result: RetrievalResult = resp
            .json()
            .await
            .context("vector store sent an unreadable result")?;
        info!("Retriever: {} documents returned", result.documents.len());
        Ok(result.documents)
    }
}
