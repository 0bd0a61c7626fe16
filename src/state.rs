//! Application state: in-memory stores, prompts, document parser, and the
//! optional LLM client.
//!
//! This module owns:
//!   - the parsed-document store (by document id)
//!   - the generated-test store (by test id, with source knowledge points)
//!   - the latest grading result per test (review path input)
//!   - the prompts struct (from TOML or defaults)
//!   - the shared `DocumentParser`
//!
//! Stores are `Arc<RwLock<HashMap>>`; handlers clone values out and never hold
//! a lock across an await on the LLM.

use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::config::{load_config_from_env, Prompts};
use crate::domain::{ExtractionResult, GradingResult, KnowledgePoint, TestSpec};
use crate::llm::LlmClient;
use crate::parser::DocumentParser;

/// A generated test plus the knowledge points it was built from. Source
/// points stay attached so the review path can rebuild remediation tests.
#[derive(Clone, Debug)]
pub struct StoredTest {
    pub spec: TestSpec,
    pub source_points: Vec<KnowledgePoint>,
}

#[derive(Clone)]
pub struct AppState {
    pub documents: Arc<RwLock<HashMap<String, ExtractionResult>>>,
    pub tests: Arc<RwLock<HashMap<String, StoredTest>>>,
    /// Latest grading result per test id; feeds the review path.
    pub results: Arc<RwLock<HashMap<String, GradingResult>>>,
    pub parser: Arc<DocumentParser>,
    pub llm: Option<LlmClient>,
    pub prompts: Prompts,
}

impl AppState {
    /// Build state from env: load config, compile extraction patterns, init
    /// the LLM client if an API key is present.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg_opt = load_config_from_env();
        let prompts = cfg_opt
            .as_ref()
            .map(|c| c.prompts.clone())
            .unwrap_or_default();

        let llm = LlmClient::from_env();
        if let Some(client) = &llm {
            info!(target: "lexibook_backend", base_url = %client.base_url, model = %client.model, "LLM enabled.");
        } else {
            info!(target: "lexibook_backend", "LLM disabled (no LLM_API_KEY). Using local fallbacks.");
        }

        Self {
            documents: Arc::new(RwLock::new(HashMap::new())),
            tests: Arc::new(RwLock::new(HashMap::new())),
            results: Arc::new(RwLock::new(HashMap::new())),
            parser: Arc::new(DocumentParser::new()),
            llm,
            prompts,
        }
    }

    /// Store a parse result under a fresh document id and return the id.
    #[instrument(level = "debug", skip(self, result), fields(points = result.knowledge_points.len()))]
    pub async fn insert_document(&self, result: ExtractionResult) -> String {
        let id = Uuid::new_v4().to_string();
        self.documents.write().await.insert(id.clone(), result);
        id
    }

    /// Read-only access to a parsed document by id.
    #[instrument(level = "debug", skip(self), fields(%id))]
    pub async fn get_document(&self, id: &str) -> Option<ExtractionResult> {
        self.documents.read().await.get(id).cloned()
    }

    /// Store a generated test together with its source knowledge points.
    #[instrument(level = "debug", skip(self, spec, source_points), fields(test_id = %spec.test_id))]
    pub async fn insert_test(&self, spec: TestSpec, source_points: Vec<KnowledgePoint>) {
        let id = spec.test_id.clone();
        self.tests
            .write()
            .await
            .insert(id, StoredTest { spec, source_points });
    }

    /// Read-only access to a stored test by id.
    #[instrument(level = "debug", skip(self), fields(%id))]
    pub async fn get_test(&self, id: &str) -> Option<StoredTest> {
        self.tests.read().await.get(id).cloned()
    }

    /// Record the latest grading result for a test (overwrites resubmissions).
    #[instrument(level = "debug", skip(self, result), fields(%test_id, score = result.score))]
    pub async fn insert_result(&self, test_id: &str, result: GradingResult) {
        self.results.write().await.insert(test_id.to_string(), result);
    }

    /// Latest grading result for a test, if it was ever submitted.
    #[instrument(level = "debug", skip(self), fields(%test_id))]
    pub async fn get_result(&self, test_id: &str) -> Option<GradingResult> {
        self.results.read().await.get(test_id).cloned()
    }
}

#[cfg(test)]
impl AppState {
    /// Bare state with defaults and no LLM, for tests.
    pub fn for_tests() -> Self {
        Self {
            documents: Arc::new(RwLock::new(HashMap::new())),
            tests: Arc::new(RwLock::new(HashMap::new())),
            results: Arc::new(RwLock::new(HashMap::new())),
            parser: Arc::new(DocumentParser::new()),
            llm: None,
            prompts: Prompts::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ExtractionStats;

    #[tokio::test]
    async fn documents_round_trip_through_the_store() {
        let state = AppState::for_tests();
        let result = ExtractionResult {
            success: true,
            content: "# Unit 1".into(),
            knowledge_points: Vec::new(),
            statistics: ExtractionStats::default(),
            error: None,
        };

        let id = state.insert_document(result).await;
        let fetched = state.get_document(&id).await.expect("stored document");
        assert!(fetched.success);
        assert!(state.get_document("missing").await.is_none());
    }
}
