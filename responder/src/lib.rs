//! Retrieval-augmented chat responder: looks up similar document chunks,
//! cleans them into citation text, and asks a completion model to answer
//! with that text as context.

pub mod agents;
pub mod api;
pub mod chatbot;
pub mod config;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod references;
