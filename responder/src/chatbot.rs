// ChatBot: one retrieval-augmented question/answer turn

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::agents::{CompletionService, Retriever};
use crate::config::Config;
use crate::error::ApiError;
use crate::metrics;
use crate::models::{ChatExchange, ChatTurn, DataType};
use crate::references::ReferenceFormatter;

pub struct ChatBot {
    retriever: Arc<dyn Retriever>,
    completion: Arc<dyn CompletionService>,
    formatter: ReferenceFormatter,
    config: Config,
}

impl ChatBot {
    pub fn new(
        config: Config,
        retriever: Arc<dyn Retriever>,
        completion: Arc<dyn CompletionService>,
    ) -> Self {
        let formatter = ReferenceFormatter::new(config.server_url.clone());
        Self {
            retriever,
            completion,
            formatter,
            config,
        }
    }

    pub fn formatter(&self) -> &ReferenceFormatter {
        &self.formatter
    }

    /// Answers `message` from the documents most similar to it and appends the
    /// exchange to `history`. The returned references are the same text the
    /// model saw as context.
    pub async fn respond(
        &self,
        mut history: Vec<ChatExchange>,
        message: &str,
        data_type: DataType,
        temperature: f32,
    ) -> Result<ChatTurn, ApiError> {
        metrics::CHAT_REQUESTS.inc();
        let collection = self.config.collection_for(data_type);

        let docs = self
            .retriever
            .similarity_search(message, self.config.retrieval_k, collection)
            .await
            .map_err(|e| {
                error!("Retrieval failed: {:#}", e);
                metrics::CHAT_FAILURES.inc();
                ApiError::UpstreamError(format!("retrieval failed: {:#}", e))
            })?;

        let references = self.formatter.format(&docs).map_err(|e| {
            error!("Could not format references: {}", e);
            metrics::CHAT_FAILURES.inc();
            ApiError::from(e)
        })?;

        let prompt = build_prompt(&references, message);
        debug!("========================\n{}\n========================", prompt);

        let answer = self
            .completion
            .complete(&self.config.llm_system_role, &prompt, temperature)
            .await
            .map_err(|e| {
                error!("Completion failed: {:#}", e);
                metrics::CHAT_FAILURES.inc();
                ApiError::UpstreamError(format!("completion failed: {:#}", e))
            })?;

        info!("Answered question using {} references from '{}'", docs.len(), collection);
        history.push((message.to_string(), answer));

        Ok(ChatTurn {
            message: String::new(),
            history,
            references,
        })
    }

    /// Records a thumbs up/down on a generated answer.
    pub fn feedback(&self, liked: bool, value: &str) {
        if liked {
            metrics::FEEDBACK_VOTES.with_label_values(&["up"]).inc();
            info!("You upvoted this response: {}", value);
        } else {
            metrics::FEEDBACK_VOTES.with_label_values(&["down"]).inc();
            info!("You downvoted this response: {}", value);
        }
    }
}

pub fn build_prompt(references: &str, message: &str) -> String {
    format!(
        "# Retrieved contents:\n{}\n\n# User new question:\n{}",
        references, message
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    use crate::models::RetrievedDocument;

    struct FixedRetriever {
        docs: Vec<RetrievedDocument>,
        calls: Mutex<Vec<(String, usize, String)>>,
    }

    #[async_trait]
    impl Retriever for FixedRetriever {
        async fn similarity_search(
            &self,
            query: &str,
            k: usize,
            collection: &str,
        ) -> Result<Vec<RetrievedDocument>> {
            self.calls
                .lock()
                .unwrap()
                .push((query.to_string(), k, collection.to_string()));
            Ok(self.docs.clone())
        }
    }

    #[derive(Default)]
    struct EchoCompletion {
        prompts: Mutex<Vec<(String, String, f32)>>,
    }

    #[async_trait]
    impl CompletionService for EchoCompletion {
        async fn complete(&self, system_role: &str, prompt: &str, temperature: f32) -> Result<String> {
            self.prompts
                .lock()
                .unwrap()
                .push((system_role.to_string(), prompt.to_string(), temperature));
            Ok("the answer".to_string())
        }
    }

    struct FailingCompletion;

    #[async_trait]
    impl CompletionService for FailingCompletion {
        async fn complete(&self, _: &str, _: &str, _: f32) -> Result<String> {
            anyhow::bail!("model overloaded")
        }
    }

    fn config() -> Config {
        let mut config = Config::from_lookup(|_| None).unwrap();
        config.server_url = "http://files.local".to_string();
        config.retrieval_k = 2;
        config.llm_system_role = "system role".to_string();
        config.preprocessed_collection = "pre".to_string();
        config.uploaded_collection = "up".to_string();
        config
    }

    fn retriever() -> Arc<FixedRetriever> {
        Arc::new(FixedRetriever {
            docs: vec![RetrievedDocument::Serialized(
                "page_content='Self-attention\\nrelates tokens' metadata={'source': 'papers/attn.pdf', 'page': 5}"
                    .to_string(),
            )],
            calls: Mutex::new(vec![]),
        })
    }

    #[tokio::test]
    async fn respond_builds_prompt_and_appends_history() {
        let retriever = retriever();
        let completion = Arc::new(EchoCompletion::default());
        let bot = ChatBot::new(config(), retriever.clone(), completion.clone());

        let history = vec![("earlier".to_string(), "reply".to_string())];
        let turn = bot
            .respond(history, "What is attention?", DataType::Uploaded, 0.3)
            .await
            .unwrap();

        let expected_refs = "Reference 1:\nSelf-attention relates tokens\n\n\
             Filename: attn.pdf | Page number: 5 | [View PDF](http://files.local/attn.pdf)\n\n";
        assert_eq!(turn.message, "");
        assert_eq!(turn.references, expected_refs);
        assert_eq!(
            turn.history,
            vec![
                ("earlier".to_string(), "reply".to_string()),
                ("What is attention?".to_string(), "the answer".to_string()),
            ]
        );

        assert_eq!(
            retriever.calls.lock().unwrap().clone(),
            vec![("What is attention?".to_string(), 2, "up".to_string())]
        );
        let prompts = completion.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].0, "system role");
        assert_eq!(
            prompts[0].1,
            format!("# Retrieved contents:\n{}\n\n# User new question:\nWhat is attention?", expected_refs)
        );
        assert_eq!(prompts[0].2, 0.3);
    }

    #[tokio::test]
    async fn malformed_reference_stops_before_completion() {
        let retriever = Arc::new(FixedRetriever {
            docs: vec![RetrievedDocument::Serialized("no layout at all".to_string())],
            calls: Mutex::new(vec![]),
        });
        let completion = Arc::new(EchoCompletion::default());
        let bot = ChatBot::new(config(), retriever, completion.clone());

        let err = bot
            .respond(vec![], "q", DataType::Preprocessed, 0.0)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::ReferenceError(_)));
        assert!(completion.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn completion_failure_is_upstream_error() {
        let bot = ChatBot::new(config(), retriever(), Arc::new(FailingCompletion));
        let err = bot
            .respond(vec![], "q", DataType::Preprocessed, 0.0)
            .await
            .unwrap_err();
        match err {
            ApiError::UpstreamError(msg) => assert!(msg.contains("model overloaded")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn prompt_layout() {
        assert_eq!(
            build_prompt("", "hi"),
            "# Retrieved contents:\n\n\n# User new question:\nhi"
        );
    }
}
