//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs parameters and basic result info.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
  extract::{Path, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::{info, instrument};

use crate::assist;
use crate::grader::grade_test;
use crate::protocol::*;
use crate::state::AppState;
use crate::testgen::{self, TestParams};

fn not_found(message: &str) -> Response {
  (StatusCode::NOT_FOUND, Json(ErrorOut { error: message.into() })).into_response()
}

fn bad_request(message: String) -> Response {
  (StatusCode::BAD_REQUEST, Json(ErrorOut { error: message })).into_response()
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, llm_enabled: state.llm.is_some() })
}

#[instrument(level = "info", skip(state, body), fields(path = %body.path))]
pub async fn http_post_parse(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ParseIn>,
) -> Response {
  let parser = state.parser.clone();
  let path = PathBuf::from(&body.path);
  // pdf/docx decoding is blocking work; keep it off the runtime threads.
  let parsed = match tokio::task::spawn_blocking(move || parser.parse(&path)).await {
    Ok(r) => r,
    Err(e) => {
      return (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorOut { error: e.to_string() }))
        .into_response()
    }
  };

  match parsed {
    Err(e) => bad_request(e.to_string()),
    Ok(result) if !result.success => {
      info!(target: "extract", path = %body.path, "Document parse failed; nothing stored");
      Json(ParseOut {
        document_id: None,
        success: false,
        error: result.error,
        statistics: result.statistics,
        knowledge_points: Vec::new(),
      })
      .into_response()
    }
    Ok(result) => {
      let statistics = result.statistics.clone();
      let knowledge_points = result.knowledge_points.clone();
      let id = state.insert_document(result).await;
      info!(target: "extract", path = %body.path, document_id = %id, points = knowledge_points.len(), "Document parsed and stored");
      Json(ParseOut {
        document_id: Some(id),
        success: true,
        error: None,
        statistics,
        knowledge_points,
      })
      .into_response()
    }
  }
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_get_document(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Response {
  match state.get_document(&id).await {
    None => not_found("文档不存在"),
    Some(doc) => Json(DocumentOut {
      document_id: id,
      success: doc.success,
      statistics: doc.statistics,
      knowledge_points: doc.knowledge_points,
    })
    .into_response(),
  }
}

#[instrument(level = "info", skip(state, body), fields(document_id = %body.document_id, difficulty = %body.difficulty.as_str()))]
pub async fn http_post_generate_test(
  State(state): State<Arc<AppState>>,
  Json(body): Json<GenerateTestIn>,
) -> Response {
  let Some(doc) = state.get_document(&body.document_id).await else {
    return not_found("文档不存在");
  };

  let mut points = doc.knowledge_points;
  if let Some(units) = &body.units {
    points.retain(|kp| kp.unit.as_deref().map_or(false, |u| units.iter().any(|x| x.as_str() == u)));
  }
  if let Some(types) = &body.point_types {
    points.retain(|kp| types.contains(&kp.point_type));
  }
  if points.is_empty() {
    return bad_request("没有匹配的知识点".into());
  }

  let scope = serde_json::json!({
    "type": "unit",
    "documentId": body.document_id,
    "units": body.units,
    "pointTypes": body.point_types,
  });
  let spec = testgen::generate_test(
    state.llm.as_ref(),
    &state.prompts,
    &points,
    TestParams { test_scope: scope, difficulty: body.difficulty, question_count: body.question_count },
  )
  .await;

  info!(target: "testgen", test_id = %spec.test_id, questions = spec.total_questions, "HTTP test generated");
  let out = to_test_out(&spec);
  state.insert_test(spec, points).await;
  Json(out).into_response()
}

#[instrument(level = "info", skip(state, body), fields(test_id = %body.test_id, answers = body.answers.len()))]
pub async fn http_post_submit_test(
  State(state): State<Arc<AppState>>,
  Json(body): Json<SubmitTestIn>,
) -> Response {
  let Some(stored) = state.get_test(&body.test_id).await else {
    return not_found("测试不存在");
  };

  let result = grade_test(&stored.spec.questions, &body.answers);
  let analysis = assist::analyze_wrong_answers(&state, &result.wrong_answers).await;
  state.insert_result(&body.test_id, result.clone()).await;

  info!(target: "testgen", test_id = %body.test_id, score = result.score, passed = result.passed, "HTTP submission graded");
  Json(SubmitTestOut { test_id: body.test_id, result, analysis }).into_response()
}

#[instrument(level = "info", skip(state, body), fields(test_id = %body.test_id))]
pub async fn http_post_review_test(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ReviewTestIn>,
) -> Response {
  let Some(stored) = state.get_test(&body.test_id).await else {
    return not_found("测试不存在");
  };
  let Some(result) = state.get_result(&body.test_id).await else {
    return not_found("测试尚未提交");
  };

  let spec = testgen::generate_wrong_test(
    state.llm.as_ref(),
    &state.prompts,
    &result.wrong_answers,
    &stored.source_points,
    body.difficulty,
  )
  .await;

  info!(target: "testgen", review_test_id = %spec.test_id, from = %body.test_id, questions = spec.total_questions, "HTTP review test generated");
  let out = to_test_out(&spec);
  state.insert_test(spec, stored.source_points).await;
  Json(out).into_response()
}

#[instrument(level = "info", skip(state, body), fields(message_len = body.message.len()))]
pub async fn http_post_chat(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ChatIn>,
) -> Response {
  let points = match &body.document_id {
    Some(id) => match state.get_document(id).await {
      Some(doc) => doc.knowledge_points,
      None => return not_found("文档不存在"),
    },
    None => Vec::new(),
  };

  let answer = assist::chat_reply(&state, &body.message, &points).await;
  Json(ChatOut { answer }).into_response()
}

#[instrument(level = "info", skip(state, body), fields(document_id = %body.document_id, content = %body.content))]
pub async fn http_post_explain(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ExplainIn>,
) -> Response {
  let Some(doc) = state.get_document(&body.document_id).await else {
    return not_found("文档不存在");
  };
  let Some(kp) = doc.knowledge_points.iter().find(|kp| kp.content == body.content) else {
    return not_found("知识点不存在");
  };

  let explanation = assist::explain_point(&state, kp).await;
  Json(ExplainOut { content: body.content, explanation }).into_response()
}
