//! Learner-assist behaviors shared by the HTTP handlers.
//!
//! This includes:
//!   - Chat Q&A over extracted knowledge points
//!   - Knowledge-point explanation
//!   - Wrong-answer analysis after grading
//!
//! Each behavior tries the LLM first and falls back to a deterministic local
//! rendition on error or when no client is configured.

use tracing::{error, instrument};

use crate::domain::{ErrorAnalysis, KnowledgePoint, QuestionKind, WrongRecord};
use crate::state::AppState;

/// Compact JSON context over the first knowledge points, fed to the chat
/// prompt. Mirrors what the extraction output looks like to the learner.
pub fn knowledge_context(points: &[KnowledgePoint]) -> String {
  let items: Vec<serde_json::Value> = points
    .iter()
    .take(50)
    .map(|kp| {
      serde_json::json!({
        "type": kp.point_type,
        "content": kp.content,
        "meaning": kp.chinese_meaning.as_deref().unwrap_or(""),
        "collocations": kp.collocations,
        "examples": kp.examples,
      })
    })
    .collect();
  serde_json::to_string_pretty(&items).unwrap_or_else(|_| "[]".into())
}

/// Answer a learner question against the given knowledge points.
#[instrument(level = "info", skip(state, message, points), fields(message_len = message.len(), points = points.len()))]
pub async fn chat_reply(state: &AppState, message: &str, points: &[KnowledgePoint]) -> String {
  if let Some(llm) = &state.llm {
    let context = knowledge_context(points);
    match llm.answer_question(&state.prompts, message, &context).await {
      Ok(answer) => return answer,
      Err(e) => {
        error!(target: "lexibook_backend", error = %e, "LLM chat failed; using local reply.");
      }
    }
  }
  chat_reply_local(message, points)
}

/// Local chat fallback: surface the knowledge points mentioned in the message.
fn chat_reply_local(message: &str, points: &[KnowledgePoint]) -> String {
  let needle = message.to_lowercase();
  let hits: Vec<&KnowledgePoint> = points
    .iter()
    .filter(|kp| !kp.content.is_empty() && needle.contains(&kp.content.to_lowercase()))
    .take(5)
    .collect();

  if hits.is_empty() {
    return "抱歉，我暂时无法回答这个问题。请尝试询问教材中出现的词汇或短语。".into();
  }

  let mut lines = vec!["根据教材知识点：".to_string()];
  for kp in hits {
    let mut line = format!("- {}", kp.content);
    if let Some(p) = &kp.phonetic {
      line.push_str(&format!(" /{}/", p));
    }
    if let Some(m) = &kp.chinese_meaning {
      line.push_str(&format!("：{}", m));
    }
    if !kp.collocations.is_empty() {
      line.push_str(&format!("（搭配：{}）", kp.collocations.join("、")));
    }
    lines.push(line);
  }
  lines.join("\n")
}

/// Explain one knowledge point in teaching terms.
#[instrument(level = "info", skip(state, kp), fields(content = %kp.content))]
pub async fn explain_point(state: &AppState, kp: &KnowledgePoint) -> String {
  if let Some(llm) = &state.llm {
    match llm.explain_knowledge_point(&state.prompts, kp).await {
      Ok(text) => return text,
      Err(e) => {
        error!(target: "lexibook_backend", content = %kp.content, error = %e, "LLM explain failed; using local explanation.");
      }
    }
  }
  explain_local(kp)
}

/// Local explanation assembled from the fields the extractor captured.
fn explain_local(kp: &KnowledgePoint) -> String {
  let mut out = format!("知识点：{}", kp.content);
  if let Some(p) = &kp.phonetic {
    out.push_str(&format!("\n音标：/{}/", p));
  }
  if let Some(pos) = kp.part_of_speech {
    out.push_str(&format!("\n词性：{}", pos.as_str()));
  }
  if let Some(m) = &kp.chinese_meaning {
    out.push_str(&format!("\n中文释义：{}", m));
  }
  if !kp.collocations.is_empty() {
    out.push_str(&format!("\n常见搭配：{}", kp.collocations.join("、")));
  }
  if !kp.examples.is_empty() {
    out.push_str(&format!("\n例句：{}", kp.examples.join(" / ")));
  }
  out
}

/// Analyze a graded submission's wrong answers. Returns None when there is
/// nothing to analyze.
#[instrument(level = "info", skip(state, wrong_answers), fields(wrong = wrong_answers.len()))]
pub async fn analyze_wrong_answers(
  state: &AppState,
  wrong_answers: &[WrongRecord],
) -> Option<ErrorAnalysis> {
  if wrong_answers.is_empty() {
    return None;
  }

  if let Some(llm) = &state.llm {
    match llm.analyze_errors(&state.prompts, wrong_answers).await {
      Ok(analysis) => return Some(analysis),
      Err(e) => {
        error!(target: "lexibook_backend", error = %e, "LLM error analysis failed; using local analysis.");
      }
    }
  }
  Some(analyze_local(wrong_answers))
}

/// Local analysis: error types from question kinds, review points from the
/// distinct knowledge points behind the wrong answers.
fn analyze_local(wrong_answers: &[WrongRecord]) -> ErrorAnalysis {
  let mut error_types = Vec::new();
  let mut review_points = Vec::new();
  for wa in wrong_answers {
    let label = match wa.question_type {
      QuestionKind::Choice => "选择判断不准确",
      QuestionKind::Fill => "拼写或用法不熟练",
      QuestionKind::TrueFalse => "概念理解不清",
      QuestionKind::Context => "语境运用欠缺",
    };
    if !error_types.iter().any(|t: &String| t.as_str() == label) {
      error_types.push(label.to_string());
    }
    if !wa.knowledge_point.is_empty() && !review_points.iter().any(|p| p == &wa.knowledge_point) {
      review_points.push(wa.knowledge_point.clone());
    }
  }

  let analysis = if review_points.is_empty() {
    format!("共{}道错题，建议回顾本单元内容。", wrong_answers.len())
  } else {
    format!("共{}道错题，主要集中在：{}。", wrong_answers.len(), review_points.join("、"))
  };

  ErrorAnalysis {
    error_types,
    analysis,
    suggestions: vec![
      "重新复习相关知识点".into(),
      "多做同类题型的练习".into(),
      "整理错题并定期回顾".into(),
    ],
    review_points,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{PartOfSpeech, PointType};

  fn vocab(content: &str, meaning: &str) -> KnowledgePoint {
    KnowledgePoint {
      point_type: PointType::Vocabulary,
      content: content.into(),
      phonetic: Some("ˈhæpi".into()),
      part_of_speech: Some(PartOfSpeech::Adjective),
      chinese_meaning: Some(meaning.into()),
      collocations: vec!["happy birthday".into()],
      examples: Vec::new(),
      unit: Some("Unit 1".into()),
      page: None,
    }
  }

  #[tokio::test]
  async fn chat_without_llm_surfaces_mentioned_points() {
    let state = AppState::for_tests();
    let points = vec![vocab("happy", "快乐的")];
    let reply = chat_reply(&state, "What does happy mean?", &points).await;
    assert!(reply.contains("happy"));
    assert!(reply.contains("快乐的"));
    assert!(reply.contains("happy birthday"));
  }

  #[tokio::test]
  async fn chat_without_a_match_apologizes() {
    let state = AppState::for_tests();
    let points = vec![vocab("happy", "快乐的")];
    let reply = chat_reply(&state, "Tell me about quantum physics", &points).await;
    assert!(reply.contains("抱歉"));
  }

  #[tokio::test]
  async fn explain_without_llm_assembles_the_fields() {
    let state = AppState::for_tests();
    let text = explain_point(&state, &vocab("happy", "快乐的")).await;
    assert!(text.contains("知识点：happy"));
    assert!(text.contains("/ˈhæpi/"));
    assert!(text.contains("adjective"));
    assert!(text.contains("快乐的"));
  }

  #[tokio::test]
  async fn no_wrong_answers_means_no_analysis() {
    let state = AppState::for_tests();
    assert!(analyze_wrong_answers(&state, &[]).await.is_none());
  }

  #[tokio::test]
  async fn local_analysis_derives_types_and_review_points() {
    let state = AppState::for_tests();
    let wrong = vec![
      WrongRecord {
        question: "q1".into(),
        question_type: QuestionKind::Choice,
        your_answer: "B".into(),
        correct_answer: "A".into(),
        explanation: String::new(),
        knowledge_point: "happy".into(),
      },
      WrongRecord {
        question: "q2".into(),
        question_type: QuestionKind::Choice,
        your_answer: "C".into(),
        correct_answer: "A".into(),
        explanation: String::new(),
        knowledge_point: "happy".into(),
      },
      WrongRecord {
        question: "q3".into(),
        question_type: QuestionKind::Fill,
        your_answer: String::new(),
        correct_answer: "sad".into(),
        explanation: String::new(),
        knowledge_point: "sad".into(),
      },
    ];

    let analysis = analyze_wrong_answers(&state, &wrong).await.expect("analysis");
    assert_eq!(analysis.error_types.len(), 2);
    assert_eq!(analysis.review_points, vec!["happy".to_string(), "sad".to_string()]);
    assert!(analysis.analysis.contains("3"));
    assert!(!analysis.suggestions.is_empty());
  }
}
