//! Lexibook · English-Learning Assistant Backend
//!
//! - Axum HTTP API: document parsing, knowledge extraction, test generation
//!   and grading, chat Q&A, knowledge-point explanation
//! - Optional LLM integration (via environment variables)
//!
//! Important env variables:
//!   PORT            : u16 (default 3000)
//!   LLM_API_KEY     : enables LLM integration if present
//!   LLM_BASE_URL    : default DashScope compatible-mode endpoint
//!   LLM_MODEL       : default "qwen-max"
//!   LEXIBOOK_CONFIG_PATH : path to TOML config (prompt overrides)
//!   LOG_LEVEL       : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT      : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod config;
mod extract;
mod parser;
mod llm;
mod testgen;
mod grader;
mod assist;
mod state;
mod protocol;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Build shared application state (in-memory stores, parser, LLM client, prompts).
  let state = Arc::new(AppState::new());

  // Build the HTTP router with routes, CORS and tracing layers.
  let app = build_router(state.clone());

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "lexibook_backend", %addr, "HTTP server listening");
  axum::serve(listener, app).await?;
  Ok(())
}
