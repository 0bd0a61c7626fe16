//! Test generation: question-count policy, question-type planning, LLM-backed
//! synthesis with a deterministic templated fallback, and the wrong-answer
//! retest path.
//!
//! The generator never fails on LLM trouble: any collaborator error is logged
//! and absorbed, and templated questions keep the pipeline gradable. Empty
//! knowledge-point sets and difficulty validation are the caller's concern.

use chrono::Utc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::Prompts;
use crate::domain::{Difficulty, KnowledgePoint, PointType, Question, QuestionKind, TestSpec, WrongRecord};
use crate::llm::LlmClient;

/// Parameters for one test-generation request.
#[derive(Clone, Debug)]
pub struct TestParams {
  pub test_scope: serde_json::Value,
  pub difficulty: Difficulty,
  /// When absent, derived from the knowledge-point count.
  pub question_count: Option<usize>,
}

/// Automatic question count: roughly 0.7 questions per knowledge point,
/// clamped to a sensible test size.
pub fn question_count_for(points: &[KnowledgePoint]) -> usize {
  let calculated = (points.len() as f64 * 0.7).round() as usize;
  calculated.clamp(5, 30)
}

/// Minutes allowed for `question_count` questions (1–2 minutes each).
pub fn time_limit_for(question_count: usize) -> u32 {
  ((question_count as f64 * 1.5).round() as u32).clamp(10, 60)
}

/// Derive the desired question-kind distribution from the knowledge-point mix.
///
/// The result is a cyclic template for generation, not a strict one-to-one
/// assignment: the synthesis step cycles through it by index.
pub fn question_kind_plan(points: &[KnowledgePoint]) -> Vec<QuestionKind> {
  let count_of = |t: PointType| points.iter().filter(|kp| kp.point_type == t).count();

  let mut plan = Vec::new();
  let push_n = |plan: &mut Vec<QuestionKind>, kind: QuestionKind, n: usize| {
    plan.extend(std::iter::repeat(kind).take(n));
  };

  // Vocabulary: choice, fill, true/false
  let vocab = count_of(PointType::Vocabulary);
  if vocab > 0 {
    push_n(&mut plan, QuestionKind::Choice, vocab.min(4));
    push_n(&mut plan, QuestionKind::Fill, vocab.min(3));
    push_n(&mut plan, QuestionKind::TrueFalse, vocab.min(2));
  }

  // Grammar: choice, fill
  let grammar = count_of(PointType::Grammar);
  if grammar > 0 {
    push_n(&mut plan, QuestionKind::Choice, grammar.min(3));
    push_n(&mut plan, QuestionKind::Fill, grammar.min(2));
  }

  // Sentence patterns: fill, context practice
  let sentence = count_of(PointType::Sentence);
  if sentence > 0 {
    push_n(&mut plan, QuestionKind::Fill, sentence.min(2));
    push_n(&mut plan, QuestionKind::Context, sentence.min(1));
  }

  // Too few knowledge points: pad with one of each common kind.
  if plan.len() < 5 {
    plan.extend([QuestionKind::Choice, QuestionKind::Fill, QuestionKind::TrueFalse]);
  }

  plan.truncate(15);
  plan
}

/// Generate a complete test over the given knowledge points.
#[instrument(level = "info", skip(llm, prompts, points, params), fields(points = points.len(), difficulty = %params.difficulty.as_str()))]
pub async fn generate_test(
  llm: Option<&LlmClient>,
  prompts: &Prompts,
  points: &[KnowledgePoint],
  params: TestParams,
) -> TestSpec {
  let count = params.question_count.unwrap_or_else(|| question_count_for(points));
  let plan = question_kind_plan(points);

  let mut questions = Vec::new();
  if let Some(client) = llm {
    match client.generate_questions(prompts, points, &plan, params.difficulty, count).await {
      Ok(qs) => questions = qs,
      Err(e) => {
        error!(target: "testgen", error = %e, "LLM question generation failed; using templated fallback");
      }
    }
  }
  if questions.is_empty() {
    questions = fallback_questions(points, &plan, count);
    warn!(target: "testgen", questions = questions.len(), "Templated fallback questions in use");
  }

  let total = questions.len();
  let spec = TestSpec {
    test_id: Uuid::new_v4().to_string(),
    test_scope: params.test_scope,
    questions,
    total_questions: total,
    total_score: total as u32,
    // 60% to pass.
    passing_score: total as f32 * 0.6,
    difficulty: params.difficulty,
    time_limit: time_limit_for(total),
    generated_at: Utc::now(),
  };
  info!(target: "testgen", test_id = %spec.test_id, total, time_limit = spec.time_limit, "test generated");
  spec
}

/// Deterministic templated questions, used whenever the LLM collaborator
/// fails or returns nothing. Cycles through the kind plan by index and emits
/// choice-shaped "select the correct meaning" questions with the correct
/// meaning as option A.
pub fn fallback_questions(
  points: &[KnowledgePoint],
  plan: &[QuestionKind],
  count: usize,
) -> Vec<Question> {
  points
    .iter()
    .take(count)
    .enumerate()
    .map(|(i, kp)| {
      let kind = if plan.is_empty() { QuestionKind::Choice } else { plan[i % plan.len()] };
      let meaning = kp.chinese_meaning.clone().unwrap_or_else(|| "未知".into());
      Question {
        id: Uuid::new_v4().to_string(),
        kind,
        question: format!("请选择正确的答案：{} 的中文意思是？", kp.content),
        options: Some(vec![
          format!("A. {}", meaning),
          "B. 选项2".into(),
          "C. 选项3".into(),
          "D. 选项4".into(),
        ]),
        answer: "A".into(),
        explanation: format!("{} 的意思是 {}", kp.content, meaning),
        knowledge_point: kp.content.clone(),
      }
    })
    .collect()
}

/// Build a remediation test over the knowledge points a learner got wrong.
/// Selection matches each wrong answer's back-reference against knowledge
/// point content; the question count equals the matched subset size.
#[instrument(level = "info", skip(llm, prompts, wrong_answers, points), fields(wrong = wrong_answers.len()))]
pub async fn generate_wrong_test(
  llm: Option<&LlmClient>,
  prompts: &Prompts,
  wrong_answers: &[WrongRecord],
  points: &[KnowledgePoint],
  difficulty: Difficulty,
) -> TestSpec {
  let mut selected: Vec<KnowledgePoint> = Vec::new();
  for wa in wrong_answers {
    if let Some(kp) = points.iter().find(|kp| kp.content == wa.knowledge_point) {
      selected.push(kp.clone());
    }
  }

  let scope = serde_json::json!({
    "type": "review",
    "description": "错题复习测试",
    "wrong_count": wrong_answers.len(),
  });

  generate_test(
    llm,
    prompts,
    &selected,
    TestParams {
      test_scope: scope,
      difficulty,
      question_count: Some(selected.len()),
    },
  )
  .await
}

#[cfg(test)]
mod tests {
  use super::*;

  fn vocab(content: &str, meaning: &str) -> KnowledgePoint {
    KnowledgePoint {
      point_type: PointType::Vocabulary,
      content: content.into(),
      phonetic: None,
      part_of_speech: None,
      chinese_meaning: Some(meaning.into()),
      collocations: Vec::new(),
      examples: Vec::new(),
      unit: None,
      page: None,
    }
  }

  fn of_type(t: PointType, n: usize) -> Vec<KnowledgePoint> {
    (0..n)
      .map(|i| KnowledgePoint {
        point_type: t,
        content: format!("kp{}", i),
        phonetic: None,
        part_of_speech: None,
        chinese_meaning: None,
        collocations: Vec::new(),
        examples: Vec::new(),
        unit: None,
        page: None,
      })
      .collect()
  }

  #[test]
  fn question_count_is_clamped_and_rounded() {
    assert_eq!(question_count_for(&[]), 5);
    assert_eq!(question_count_for(&of_type(PointType::Vocabulary, 3)), 5);
    assert_eq!(question_count_for(&of_type(PointType::Vocabulary, 10)), 7);
    assert_eq!(question_count_for(&of_type(PointType::Vocabulary, 11)), 8);
    assert_eq!(question_count_for(&of_type(PointType::Vocabulary, 100)), 30);
  }

  #[test]
  fn time_limit_is_clamped() {
    assert_eq!(time_limit_for(0), 10);
    assert_eq!(time_limit_for(7), 11);
    assert_eq!(time_limit_for(20), 30);
    assert_eq!(time_limit_for(100), 60);
  }

  #[test]
  fn small_plans_are_padded_with_one_of_each_kind() {
    let plan = question_kind_plan(&of_type(PointType::Vocabulary, 1));
    assert_eq!(
      plan,
      vec![
        QuestionKind::Choice,
        QuestionKind::Fill,
        QuestionKind::TrueFalse,
        QuestionKind::Choice,
        QuestionKind::Fill,
        QuestionKind::TrueFalse,
      ]
    );
  }

  #[test]
  fn rich_plans_are_capped_at_fifteen() {
    let mut points = of_type(PointType::Vocabulary, 10);
    points.extend(of_type(PointType::Grammar, 5));
    points.extend(of_type(PointType::Sentence, 3));
    let plan = question_kind_plan(&points);
    assert_eq!(plan.len(), 15);
    // 4 choice + 3 fill + 2 true/false from vocabulary, then grammar.
    assert_eq!(plan[0], QuestionKind::Choice);
    assert_eq!(plan[4], QuestionKind::Fill);
    assert_eq!(plan[7], QuestionKind::TrueFalse);
  }

  #[test]
  fn fallback_over_three_points_is_three_choice_questions() {
    let points = vec![vocab("happy", "快乐的"), vocab("sad", "悲伤的"), vocab("tall", "高的")];
    let plan = question_kind_plan(&points);
    let questions = fallback_questions(&points, &plan, 3);

    assert_eq!(questions.len(), 3);
    for (q, kp) in questions.iter().zip(&points) {
      assert_eq!(q.kind, QuestionKind::Choice);
      assert_eq!(q.answer, "A");
      let options = q.options.as_ref().unwrap();
      assert_eq!(options[0], format!("A. {}", kp.chinese_meaning.clone().unwrap()));
      assert_eq!(q.knowledge_point, kp.content);
    }
  }

  #[test]
  fn fallback_uses_placeholder_meaning_when_absent() {
    let points = of_type(PointType::Vocabulary, 1);
    let questions = fallback_questions(&points, &[QuestionKind::Choice], 1);
    assert_eq!(questions[0].options.as_ref().unwrap()[0], "A. 未知");
  }

  #[tokio::test]
  async fn generated_test_upholds_scoring_invariants() {
    let points = of_type(PointType::Vocabulary, 10);
    let prompts = Prompts::default();
    let spec = generate_test(
      None,
      &prompts,
      &points,
      TestParams { test_scope: serde_json::json!({"type": "unit"}), difficulty: Difficulty::Medium, question_count: None },
    )
    .await;

    assert_eq!(spec.total_questions, spec.questions.len());
    assert_eq!(spec.total_questions, 7); // round(10 * 0.7)
    assert_eq!(spec.total_score, 7);
    assert!((spec.passing_score - 7.0 * 0.6).abs() < f32::EPSILON);
    assert_eq!(spec.time_limit, time_limit_for(7));
  }

  #[tokio::test]
  async fn explicit_question_count_is_honored() {
    let points = of_type(PointType::Vocabulary, 10);
    let prompts = Prompts::default();
    let spec = generate_test(
      None,
      &prompts,
      &points,
      TestParams { test_scope: serde_json::json!({}), difficulty: Difficulty::Hard, question_count: Some(4) },
    )
    .await;
    assert_eq!(spec.total_questions, 4);
    assert_eq!(spec.difficulty, Difficulty::Hard);
  }

  #[tokio::test]
  async fn wrong_test_covers_only_matched_points() {
    let points = vec![vocab("happy", "快乐的"), vocab("sad", "悲伤的")];
    let wrong = vec![WrongRecord {
      question: "q".into(),
      question_type: QuestionKind::Choice,
      your_answer: "B".into(),
      correct_answer: "A".into(),
      explanation: String::new(),
      knowledge_point: "sad".into(),
    }];
    let prompts = Prompts::default();
    let spec = generate_wrong_test(None, &prompts, &wrong, &points, Difficulty::Medium).await;

    assert_eq!(spec.total_questions, 1);
    assert_eq!(spec.questions[0].knowledge_point, "sad");
    assert_eq!(spec.test_scope["type"], "review");
    assert_eq!(spec.time_limit, 10);
  }
}
