//! Minimal chat-completions client for the LLM collaborator.
//!
//! We only call chat.completions and request either plain text or a strict
//! JSON object. Calls are instrumented and log model names, latencies, and
//! response sizes (not contents).
//!
//! All helpers return `Result<_, String>`; callers are expected to treat any
//! error as "no output" and fall back locally, so nothing here is fatal.
//!
//! NOTE: We never log the API key and we keep payload truncations short.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::Prompts;
use crate::domain::{Difficulty, ErrorAnalysis, KnowledgePoint, Question, QuestionKind, WrongRecord};
use crate::util::{fill_template, trunc_for_log};

const DEFAULT_BASE_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";
const DEFAULT_MODEL: &str = "qwen-max";

#[derive(Clone)]
pub struct LlmClient {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
}

impl LlmClient {
  /// Construct the client if we find LLM_API_KEY; otherwise return None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("LLM_API_KEY").ok()?;
    let base_url = std::env::var("LLM_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
    let model = std::env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(20))
      .build()
      .ok()?;

    Some(Self { client, api_key, base_url, model })
  }

  /// Plain-text chat completion. Used for Q&A and explanations.
  #[instrument(level = "info", skip(self, system, user), fields(model = %self.model))]
  async fn chat_plain(
    &self,
    system: &str,
    user: &str,
    temperature: f32,
    max_tokens: u32,
  ) -> Result<String, String> {
    let body = self.request(system, user, temperature, max_tokens, None).await?;
    let text = body
      .choices
      .first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default()
      .trim()
      .to_string();
    Ok(text)
  }

  /// JSON-object chat completion. Generic over the target type T. Malformed
  /// payloads are logged (truncated) and surface as an error the caller
  /// treats like an empty result.
  #[instrument(level = "info", skip(self, system, user), fields(model = %self.model))]
  async fn chat_json<T: for<'a> Deserialize<'a>>(
    &self,
    system: &str,
    user: &str,
    temperature: f32,
    max_tokens: u32,
  ) -> Result<T, String> {
    let body = self
      .request(system, user, temperature, max_tokens, Some(ResponseFormat { r#type: "json_object".into() }))
      .await?;
    let text = body
      .choices
      .first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default();

    serde_json::from_str::<T>(&text).map_err(|e| {
      warn!(target: "lexibook_backend", payload = %trunc_for_log(&text, 400), "Malformed JSON payload from model");
      format!("JSON parse error: {}", e)
    })
  }

  async fn request(
    &self,
    system: &str,
    user: &str,
    temperature: f32,
    max_tokens: u32,
    response_format: Option<ResponseFormat>,
  ) -> Result<ChatCompletionResponse, String> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature,
      response_format,
      max_tokens: Some(max_tokens),
    };

    let res = self
      .client
      .post(&url)
      .header(USER_AGENT, "lexibook-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req)
      .send()
      .await
      .map_err(|e| e.to_string())?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_api_error(&body).unwrap_or(body);
      return Err(format!("LLM HTTP {}: {}", status, msg));
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| e.to_string())?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "LLM usage");
    }
    Ok(body)
  }

  // --- High-level helpers (domain-specialized) ---

  /// Synthesize test questions from knowledge points. Each returned question
  /// gets a fresh id assigned here, at creation time.
  #[instrument(
    level = "info",
    skip(self, prompts, knowledge_points, kinds),
    fields(points = knowledge_points.len())
  )]
  pub async fn generate_questions(
    &self,
    prompts: &Prompts,
    knowledge_points: &[KnowledgePoint],
    kinds: &[QuestionKind],
    difficulty: Difficulty,
    count: usize,
  ) -> Result<Vec<Question>, String> {
    #[derive(Deserialize)]
    struct Batch {
      questions: Vec<Draft>,
    }
    #[derive(Deserialize)]
    struct Draft {
      #[serde(rename = "type")]
      kind: QuestionKind,
      question: String,
      #[serde(default)]
      options: Option<Vec<String>>,
      answer: String,
      #[serde(default)]
      explanation: String,
      #[serde(default)]
      knowledge_point: String,
    }

    let summary = knowledge_point_summary(knowledge_points);
    let kind_list = kinds.iter().map(kind_name).collect::<Vec<_>>().join(", ");
    let count_s = count.to_string();
    let user = fill_template(
      &prompts.generate_user_template,
      &[
        ("count", count_s.as_str()),
        ("knowledge_points", summary.as_str()),
        ("question_types", kind_list.as_str()),
        ("difficulty", difficulty.as_str()),
      ],
    );

    let start = std::time::Instant::now();
    let result = self.chat_json::<Batch>(&prompts.generate_system, &user, 0.5, 3000).await;
    let elapsed = start.elapsed();

    let batch = match result {
      Ok(b) => {
        info!(?elapsed, questions = b.questions.len(), "Model returned question batch");
        b
      }
      Err(e) => {
        error!(?elapsed, error = %e, "Model call failed during question generation");
        return Err(e);
      }
    };

    Ok(
      batch
        .questions
        .into_iter()
        .map(|d| Question {
          id: Uuid::new_v4().to_string(),
          kind: d.kind,
          question: d.question,
          options: d.options,
          answer: d.answer,
          explanation: d.explanation,
          knowledge_point: d.knowledge_point,
        })
        .collect(),
    )
  }

  /// Answer a learner question against extracted knowledge context.
  #[instrument(level = "info", skip(self, prompts, question, context), fields(question_len = question.len(), context_len = context.len()))]
  pub async fn answer_question(
    &self,
    prompts: &Prompts,
    question: &str,
    context: &str,
  ) -> Result<String, String> {
    let user = fill_template(
      &prompts.chat_user_template,
      &[("context", context), ("question", question)],
    );
    self.chat_plain(&prompts.chat_system, &user, 0.3, 1000).await
  }

  /// Explain a single knowledge point in teaching terms.
  #[instrument(level = "info", skip(self, prompts, kp), fields(content = %kp.content))]
  pub async fn explain_knowledge_point(
    &self,
    prompts: &Prompts,
    kp: &KnowledgePoint,
  ) -> Result<String, String> {
    let point_type = serde_json::to_value(kp.point_type)
      .ok()
      .and_then(|v| v.as_str().map(String::from))
      .unwrap_or_default();
    let user = fill_template(
      &prompts.explain_user_template,
      &[
        ("point_type", point_type.as_str()),
        ("content", kp.content.as_str()),
        ("phonetic", kp.phonetic.as_deref().unwrap_or("")),
        ("part_of_speech", kp.part_of_speech.map(|p| p.as_str()).unwrap_or("")),
        ("chinese_meaning", kp.chinese_meaning.as_deref().unwrap_or("")),
        ("collocations", kp.collocations.join(", ").as_str()),
      ],
    );
    self.chat_plain(&prompts.explain_system, &user, 0.5, 1500).await
  }

  /// Analyze a set of wrong answers into error types and study suggestions.
  #[instrument(level = "info", skip(self, prompts, wrong_answers), fields(wrong = wrong_answers.len()))]
  pub async fn analyze_errors(
    &self,
    prompts: &Prompts,
    wrong_answers: &[WrongRecord],
  ) -> Result<ErrorAnalysis, String> {
    let summary: Vec<serde_json::Value> = wrong_answers
      .iter()
      .map(|wa| {
        serde_json::json!({
          "question": wa.question,
          "user_answer": wa.your_answer,
          "correct_answer": wa.correct_answer,
          "knowledge_point": wa.knowledge_point,
        })
      })
      .collect();
    let summary_json =
      serde_json::to_string_pretty(&summary).map_err(|e| e.to_string())?;
    let user = fill_template(
      &prompts.analysis_user_template,
      &[("wrong_answers", summary_json.as_str())],
    );
    self.chat_json(&prompts.analysis_system, &user, 0.4, 2000).await
  }
}

/// Compact JSON summary of the first knowledge points, as prompt context.
fn knowledge_point_summary(points: &[KnowledgePoint]) -> String {
  let items: Vec<serde_json::Value> = points
    .iter()
    .take(20)
    .map(|kp| {
      serde_json::json!({
        "type": kp.point_type,
        "content": kp.content,
        "meaning": kp.chinese_meaning.as_deref().unwrap_or(""),
        "example": kp.examples.first().map(String::as_str).unwrap_or(""),
      })
    })
    .collect();
  serde_json::to_string_pretty(&items).unwrap_or_else(|_| "[]".into())
}

fn kind_name(kind: &QuestionKind) -> &'static str {
  match kind {
    QuestionKind::Choice => "choice",
    QuestionKind::Fill => "fill",
    QuestionKind::TrueFalse => "true_false",
    QuestionKind::Context => "context",
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ChatMessageReq {
  role: String,
  content: String,
}
#[derive(Serialize)]
struct ResponseFormat {
  #[serde(rename = "type")]
  r#type: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)]
  usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice {
  message: ChatMessageResp,
}
#[derive(Deserialize)]
struct ChatMessageResp {
  content: Option<String>,
}
#[derive(Deserialize)]
struct Usage {
  #[serde(default)]
  prompt_tokens: Option<u32>,
  #[serde(default)]
  completion_tokens: Option<u32>,
  #[serde(default)]
  total_tokens: Option<u32>,
}

/// Try to extract a clean error message from an OpenAI-style error body.
fn extract_api_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap {
    error: EObj,
  }
  #[derive(Deserialize)]
  struct EObj {
    message: String,
  }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}
