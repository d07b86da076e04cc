use std::sync::Arc;

use tracing::info;
use warp::Filter;

use responder::agents::{CompletionAgent, RetrieverAgent};
use responder::chatbot::ChatBot;
use responder::{api, config, middleware};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = config::Config::from_env()?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .json()
        .init();

    info!("Starting RAG chat responder");
    info!("Configuration loaded");

    let retriever = RetrieverAgent::new(config.vector_db_service_url.clone());
    let completion = CompletionAgent::new(
        &config.llm_endpoint,
        config.llm_engine.clone(),
        config.openai_api_key.clone(),
        config.llm_timeout_secs,
    )?;
    info!("Collaborators configured");

    let chatbot = Arc::new(ChatBot::new(
        config.clone(),
        Arc::new(retriever),
        Arc::new(completion),
    ));

    // Static file server for the PDFs behind the reference links
    if let Some(dir) = config.docs_dir.clone() {
        let addr = ([0, 0, 0, 0], config.file_server_port);
        info!("Serving reference documents from {} on port {}", dir, addr.1);
        tokio::spawn(warp::serve(warp::fs::dir(dir).with(warp::log("docs"))).run(addr));
    }

    // Build API routes
    let routes = api::app(chatbot)
        .with(warp::log("api"))
        .with(middleware::cors());

    // Start server
    let addr = ([0, 0, 0, 0], config.port);
    info!("Server listening on {}", addr.1);

    warp::serve(routes).run(addr).await;

    Ok(())
}
