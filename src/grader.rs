//! Deterministic grading of test submissions.
//!
//! Answers are matched to questions by id first, then by exact question text
//! as a fallback for clients that echo the question instead of the id.
//! Submitted answers that match no question are dropped and do not count
//! toward the total. Comparison is whitespace-trimmed and case-insensitive.

use tracing::{debug, instrument, warn};

use crate::domain::{CorrectRecord, GradingResult, Question, SubmittedAnswer, WrongRecord};

/// Grading normalization: trim surrounding whitespace and lowercase.
/// A missing answer grades as the empty string.
pub fn normalize_answer(answer: Option<&str>) -> String {
  answer.unwrap_or("").trim().to_lowercase()
}

/// Grade a submission against the questions of a generated test.
/// Passing threshold is a score of 60 out of 100.
#[instrument(level = "info", skip(questions, answers), fields(questions = questions.len(), answers = answers.len()))]
pub fn grade_test(questions: &[Question], answers: &[SubmittedAnswer]) -> GradingResult {
  let mut correct_answers = Vec::new();
  let mut wrong_answers = Vec::new();

  for submitted in answers {
    let question = questions
      .iter()
      .find(|q| q.id == submitted.question_id)
      .or_else(|| questions.iter().find(|q| q.question == submitted.question_id));

    let Some(question) = question else {
      warn!(target: "testgen", question_id = %submitted.question_id, "Submitted answer matches no question; skipping");
      continue;
    };

    let given = normalize_answer(submitted.answer.as_deref());
    let expected = normalize_answer(Some(&question.answer));

    if given == expected {
      correct_answers.push(CorrectRecord {
        question: question.question.clone(),
        your_answer: submitted.answer.clone().unwrap_or_default(),
        correct_answer: question.answer.clone(),
        explanation: question.explanation.clone(),
      });
    } else {
      wrong_answers.push(WrongRecord {
        question: question.question.clone(),
        question_type: question.kind,
        your_answer: submitted.answer.clone().unwrap_or_default(),
        correct_answer: question.answer.clone(),
        explanation: question.explanation.clone(),
        knowledge_point: question.knowledge_point.clone(),
      });
    }
  }

  let correct_count = correct_answers.len();
  let wrong_count = wrong_answers.len();
  let total = correct_count + wrong_count;
  let score = if total == 0 {
    0.0
  } else {
    let raw = correct_count as f32 / total as f32 * 100.0;
    (raw * 100.0).round() / 100.0
  };

  debug!(target: "testgen", correct = correct_count, wrong = wrong_count, score, "submission graded");

  GradingResult {
    total_questions: total,
    correct_count,
    wrong_count,
    score,
    passed: score >= 60.0,
    correct_answers,
    wrong_answers,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::QuestionKind;

  fn question(id: &str, text: &str, answer: &str) -> Question {
    Question {
      id: id.into(),
      kind: QuestionKind::Choice,
      question: text.into(),
      options: None,
      answer: answer.into(),
      explanation: format!("{} explained", text),
      knowledge_point: text.into(),
    }
  }

  fn submission(question_id: &str, answer: Option<&str>) -> SubmittedAnswer {
    SubmittedAnswer { question_id: question_id.into(), answer: answer.map(String::from) }
  }

  fn ten_questions() -> Vec<Question> {
    (0..10).map(|i| question(&format!("q{}", i), &format!("question {}", i), "A")).collect()
  }

  #[test]
  fn six_of_ten_scores_sixty_and_passes() {
    let questions = ten_questions();
    let answers: Vec<_> = (0..10)
      .map(|i| submission(&format!("q{}", i), Some(if i < 6 { "A" } else { "B" })))
      .collect();

    let result = grade_test(&questions, &answers);
    assert_eq!(result.total_questions, 10);
    assert_eq!(result.correct_count, 6);
    assert_eq!(result.wrong_count, 4);
    assert!((result.score - 60.0).abs() < f32::EPSILON);
    assert!(result.passed);
  }

  #[test]
  fn five_of_ten_scores_fifty_and_fails() {
    let questions = ten_questions();
    let answers: Vec<_> = (0..10)
      .map(|i| submission(&format!("q{}", i), Some(if i < 5 { "A" } else { "B" })))
      .collect();

    let result = grade_test(&questions, &answers);
    assert!((result.score - 50.0).abs() < f32::EPSILON);
    assert!(!result.passed);
  }

  #[test]
  fn comparison_ignores_case_and_whitespace() {
    let questions = vec![question("q1", "pick one", "A"), question("q2", "pick two", "A")];
    let answers = vec![submission("q1", Some(" A ")), submission("q2", Some("a"))];
    let result = grade_test(&questions, &answers);
    assert_eq!(result.correct_count, 2);
  }

  #[test]
  fn missing_answer_grades_as_wrong() {
    let questions = vec![question("q1", "pick one", "A")];
    let result = grade_test(&questions, &[submission("q1", None)]);
    assert_eq!(result.wrong_count, 1);
    assert_eq!(result.wrong_answers[0].your_answer, "");
  }

  #[test]
  fn empty_submission_scores_zero_and_fails() {
    let result = grade_test(&ten_questions(), &[]);
    assert_eq!(result.total_questions, 0);
    assert_eq!(result.score, 0.0);
    assert!(!result.passed);
  }

  #[test]
  fn unmatched_answers_are_excluded_from_the_total() {
    let questions = vec![question("q1", "pick one", "A")];
    let answers = vec![submission("q1", Some("A")), submission("ghost", Some("A"))];
    let result = grade_test(&questions, &answers);
    assert_eq!(result.total_questions, 1);
    assert!((result.score - 100.0).abs() < f32::EPSILON);
  }

  #[test]
  fn answers_match_by_question_text_when_id_is_unknown() {
    let questions = vec![question("q1", "pick one", "A")];
    let result = grade_test(&questions, &[submission("pick one", Some("A"))]);
    assert_eq!(result.correct_count, 1);
  }

  #[test]
  fn wrong_records_carry_the_knowledge_point() {
    let mut q = question("q1", "pick one", "A");
    q.knowledge_point = "happy".into();
    let result = grade_test(&[q], &[submission("q1", Some("B"))]);
    assert_eq!(result.wrong_answers[0].knowledge_point, "happy");
    assert_eq!(result.wrong_answers[0].question_type, QuestionKind::Choice);
  }
}
