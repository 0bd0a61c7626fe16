//! Domain models: knowledge points extracted from textbooks, generated tests,
//! and grading results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category of a knowledge point found in a textbook document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointType {
  Vocabulary,
  Phrase,
  Grammar,
  Sentence,
}

/// Canonical part-of-speech names. Textbook glossaries abbreviate these
/// (`n.`, `adj.`, ...); see [`PartOfSpeech::from_abbrev`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartOfSpeech {
  Noun,
  Verb,
  Adjective,
  Adverb,
  Preposition,
  Conjunction,
  Pronoun,
  Numeral,
  Determiner,
}

impl PartOfSpeech {
  /// Map a glossary abbreviation (without the trailing dot) to its canonical name.
  pub fn from_abbrev(abbrev: &str) -> Option<Self> {
    match abbrev {
      "n" => Some(Self::Noun),
      "v" => Some(Self::Verb),
      "adj" => Some(Self::Adjective),
      "adv" => Some(Self::Adverb),
      "prep" => Some(Self::Preposition),
      "conj" => Some(Self::Conjunction),
      "pron" => Some(Self::Pronoun),
      "num" => Some(Self::Numeral),
      "det" => Some(Self::Determiner),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Noun => "noun",
      Self::Verb => "verb",
      Self::Adjective => "adjective",
      Self::Adverb => "adverb",
      Self::Preposition => "preposition",
      Self::Conjunction => "conjunction",
      Self::Pronoun => "pronoun",
      Self::Numeral => "numeral",
      Self::Determiner => "determiner",
    }
  }
}

/// One learnable unit extracted from a document. Immutable once produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KnowledgePoint {
  pub point_type: PointType,
  pub content: String,
  #[serde(default)] pub phonetic: Option<String>,
  #[serde(default)] pub part_of_speech: Option<PartOfSpeech>,
  #[serde(default)] pub chinese_meaning: Option<String>,
  #[serde(default)] pub collocations: Vec<String>,
  #[serde(default)] pub examples: Vec<String>,
  /// Unit heading in effect where the entry appeared (e.g. "Unit 3").
  #[serde(default)] pub unit: Option<String>,
  /// Page marker in effect where the entry appeared (digits as written).
  #[serde(default)] pub page: Option<String>,
}

/// Per-category counts for one extraction pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
  pub total_words: usize,
  pub vocabulary_count: usize,
  pub phrase_count: usize,
  pub grammar_count: usize,
  pub sentence_count: usize,
}

impl ExtractionStats {
  pub fn tally(points: &[KnowledgePoint]) -> Self {
    let mut stats = Self { total_words: points.len(), ..Self::default() };
    for kp in points {
      match kp.point_type {
        PointType::Vocabulary => stats.vocabulary_count += 1,
        PointType::Phrase => stats.phrase_count += 1,
        PointType::Grammar => stats.grammar_count += 1,
        PointType::Sentence => stats.sentence_count += 1,
      }
    }
    stats
  }
}

/// Normalized outcome of one document parse. Acquisition failures land here as
/// `success == false` with the message in `error`; they are never thrown.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExtractionResult {
  pub success: bool,
  pub content: String,
  pub knowledge_points: Vec<KnowledgePoint>,
  pub statistics: ExtractionStats,
  #[serde(default)] pub error: Option<String>,
}

impl ExtractionResult {
  pub fn failed(message: String) -> Self {
    Self {
      success: false,
      content: String::new(),
      knowledge_points: Vec::new(),
      statistics: ExtractionStats::default(),
      error: Some(message),
    }
  }
}

/// Question kinds a test can contain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
  Choice,
  Fill,
  TrueFalse,
  Context,
}

/// Test difficulty requested by the caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
  Easy,
  #[default]
  Medium,
  Hard,
}

impl Difficulty {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Easy => "easy",
      Self::Medium => "medium",
      Self::Hard => "hard",
    }
  }
}

/// A single test question. The `id` is assigned at creation time and is the
/// identifier answers are matched against.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Question {
  pub id: String,
  #[serde(rename = "type")] pub kind: QuestionKind,
  pub question: String,
  /// Present for choice-shaped questions only.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub options: Option<Vec<String>>,
  pub answer: String,
  pub explanation: String,
  /// Back-reference to the source knowledge point, matched by content equality.
  #[serde(default)] pub knowledge_point: String,
}

/// A generated test. Invariants: `total_questions == questions.len()`,
/// `passing_score == total_questions as f32 * 0.6`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestSpec {
  pub test_id: String,
  /// Free-form description of what the test covers (units, point types, ...).
  pub test_scope: serde_json::Value,
  pub questions: Vec<Question>,
  pub total_questions: usize,
  pub total_score: u32,
  pub passing_score: f32,
  pub difficulty: Difficulty,
  /// Minutes.
  pub time_limit: u32,
  pub generated_at: DateTime<Utc>,
}

/// One answer submitted for grading. `answer == None` grades as empty string.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubmittedAnswer {
  #[serde(rename = "questionId")]
  pub question_id: String,
  #[serde(default)] pub answer: Option<String>,
}

/// Correctly answered question, echoed back for review.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CorrectRecord {
  pub question: String,
  pub your_answer: String,
  pub correct_answer: String,
  pub explanation: String,
}

/// Wrongly answered question. Keeps the knowledge-point back-reference so a
/// remediation test can be built from it later.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WrongRecord {
  pub question: String,
  pub question_type: QuestionKind,
  pub your_answer: String,
  pub correct_answer: String,
  pub explanation: String,
  pub knowledge_point: String,
}

/// Outcome of grading one submission.
/// Invariant: `correct_count + wrong_count == total_questions`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GradingResult {
  pub total_questions: usize,
  pub correct_count: usize,
  pub wrong_count: usize,
  /// 0..=100, rounded to two decimals.
  pub score: f32,
  pub passed: bool,
  pub correct_answers: Vec<CorrectRecord>,
  pub wrong_answers: Vec<WrongRecord>,
}

/// LLM-produced (or locally derived) analysis of a set of wrong answers.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ErrorAnalysis {
  #[serde(default)] pub error_types: Vec<String>,
  #[serde(default)] pub analysis: String,
  #[serde(default)] pub suggestions: Vec<String>,
  #[serde(default)] pub review_points: Vec<String>,
}
