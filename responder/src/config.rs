use serde::Deserialize;
use anyhow::{Context, Result};

use crate::models::DataType;

const DEFAULT_SYSTEM_ROLE: &str = "You are a chatbot. You'll receive a prompt that includes retrieved content \
from the vectorDB based on the user's question, and the source. Your task is to respond to the user's new \
question using the information from the vectorDB without relying on your own knowledge.";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub server_url: String,
    pub vector_db_service_url: String,
    pub preprocessed_collection: String,
    pub uploaded_collection: String,
    pub retrieval_k: usize,
    pub llm_endpoint: String,
    pub llm_engine: String,
    pub openai_api_key: Option<String>,
    pub llm_system_role: String,
    pub llm_timeout_secs: u64,
    pub docs_dir: Option<String>,
    pub file_server_port: u16,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key/value source, falling back to defaults
    /// for absent keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let number = |key: &str, default: &str| {
            let raw = var(key, default);
            raw.parse::<u64>()
                .with_context(|| format!("{} must be a non-negative integer, got '{}'", key, raw))
        };

        Ok(Config {
            port: u16::try_from(number("PORT", "8080")?).context("PORT out of range")?,
            server_url: var("SERVER_URL", "http://localhost:8000"),
            vector_db_service_url: var("VECTOR_DB_SERVICE_URL", "http://localhost:8003"),
            preprocessed_collection: var("PREPROCESSED_COLLECTION", "preprocessed"),
            uploaded_collection: var("UPLOADED_COLLECTION", "uploaded"),
            retrieval_k: usize::try_from(number("RETRIEVAL_K", "3")?).context("RETRIEVAL_K out of range")?,
            llm_endpoint: var("LLM_ENDPOINT", "https://api.openai.com"),
            llm_engine: var("LLM_ENGINE", "gpt-3.5-turbo"),
            openai_api_key: lookup("OPENAI_API_KEY"),
            llm_system_role: var("LLM_SYSTEM_ROLE", DEFAULT_SYSTEM_ROLE),
            llm_timeout_secs: number("LLM_TIMEOUT_SECS", "60")?,
            docs_dir: lookup("DOCS_DIR"),
            file_server_port: u16::try_from(number("FILE_SERVER_PORT", "8000")?)
                .context("FILE_SERVER_PORT out of range")?,
            log_level: var("LOG_LEVEL", "info"),
        })
    }

    /// Vector-store collection that answers questions for `data_type`.
    pub fn collection_for(&self, data_type: DataType) -> &str {
        match data_type {
            DataType::Preprocessed => &self.preprocessed_collection,
            DataType::Uploaded => &self.uploaded_collection,
        }
    }
}
