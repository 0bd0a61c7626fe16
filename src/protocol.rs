//! Public protocol structs for the HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{
    Difficulty, ErrorAnalysis, ExtractionStats, GradingResult, KnowledgePoint, PointType,
    QuestionKind, SubmittedAnswer, TestSpec,
};

#[derive(Debug, Serialize)]
pub struct HealthOut {
    pub ok: bool,
    #[serde(rename = "llmEnabled")]
    pub llm_enabled: bool,
}

/// Parse a textbook document already on disk (uploads are out of scope).
#[derive(Debug, Deserialize)]
pub struct ParseIn {
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct ParseOut {
    #[serde(rename = "documentId")]
    pub document_id: Option<String>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub statistics: ExtractionStats,
    #[serde(rename = "knowledgePoints")]
    pub knowledge_points: Vec<KnowledgePoint>,
}

#[derive(Debug, Serialize)]
pub struct DocumentOut {
    #[serde(rename = "documentId")]
    pub document_id: String,
    pub success: bool,
    pub statistics: ExtractionStats,
    #[serde(rename = "knowledgePoints")]
    pub knowledge_points: Vec<KnowledgePoint>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateTestIn {
    #[serde(rename = "documentId")]
    pub document_id: String,
    /// Restrict to knowledge points from these units (e.g. "Unit 3").
    #[serde(default)]
    pub units: Option<Vec<String>>,
    /// Restrict to these knowledge-point categories.
    #[serde(default, rename = "pointTypes")]
    pub point_types: Option<Vec<PointType>>,
    #[serde(default)]
    pub difficulty: Difficulty,
    /// Overrides the automatic count when present.
    #[serde(default, rename = "questionCount")]
    pub question_count: Option<usize>,
}

/// A question as the test taker sees it. Answers and explanations are
/// withheld until grading.
#[derive(Debug, Serialize)]
pub struct QuestionOut {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub question: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct TestOut {
    #[serde(rename = "testId")]
    pub test_id: String,
    #[serde(rename = "testScope")]
    pub test_scope: serde_json::Value,
    pub questions: Vec<QuestionOut>,
    #[serde(rename = "totalQuestions")]
    pub total_questions: usize,
    #[serde(rename = "totalScore")]
    pub total_score: u32,
    #[serde(rename = "passingScore")]
    pub passing_score: f32,
    pub difficulty: Difficulty,
    #[serde(rename = "timeLimit")]
    pub time_limit: u32,
    #[serde(rename = "generatedAt")]
    pub generated_at: chrono::DateTime<chrono::Utc>,
}

/// Strip answers from a generated test for the client.
pub fn to_test_out(spec: &TestSpec) -> TestOut {
    TestOut {
        test_id: spec.test_id.clone(),
        test_scope: spec.test_scope.clone(),
        questions: spec
            .questions
            .iter()
            .map(|q| QuestionOut {
                id: q.id.clone(),
                kind: q.kind,
                question: q.question.clone(),
                options: q.options.clone(),
            })
            .collect(),
        total_questions: spec.total_questions,
        total_score: spec.total_score,
        passing_score: spec.passing_score,
        difficulty: spec.difficulty,
        time_limit: spec.time_limit,
        generated_at: spec.generated_at,
    }
}

#[derive(Debug, Deserialize)]
pub struct SubmitTestIn {
    #[serde(rename = "testId")]
    pub test_id: String,
    pub answers: Vec<SubmittedAnswer>,
}

#[derive(Debug, Serialize)]
pub struct SubmitTestOut {
    #[serde(rename = "testId")]
    pub test_id: String,
    #[serde(flatten)]
    pub result: GradingResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<ErrorAnalysis>,
}

/// Build a remediation test from a previously submitted test's wrong answers.
#[derive(Debug, Deserialize)]
pub struct ReviewTestIn {
    #[serde(rename = "testId")]
    pub test_id: String,
    #[serde(default)]
    pub difficulty: Difficulty,
}

#[derive(Debug, Deserialize)]
pub struct ChatIn {
    pub message: String,
    /// Scope the conversation to one parsed document's knowledge points.
    #[serde(default, rename = "documentId")]
    pub document_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatOut {
    pub answer: String,
}

#[derive(Debug, Deserialize)]
pub struct ExplainIn {
    #[serde(rename = "documentId")]
    pub document_id: String,
    /// Knowledge-point content to explain, matched by equality.
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ExplainOut {
    pub content: String,
    pub explanation: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorOut {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Question;

    #[test]
    fn test_out_withholds_answers() {
        let spec = TestSpec {
            test_id: "t1".into(),
            test_scope: serde_json::json!({"type": "unit"}),
            questions: vec![Question {
                id: "q1".into(),
                kind: QuestionKind::Choice,
                question: "pick".into(),
                options: Some(vec!["A. x".into()]),
                answer: "A".into(),
                explanation: "secret".into(),
                knowledge_point: "x".into(),
            }],
            total_questions: 1,
            total_score: 1,
            passing_score: 0.6,
            difficulty: Difficulty::Medium,
            time_limit: 10,
            generated_at: chrono::Utc::now(),
        };

        let out = serde_json::to_value(to_test_out(&spec)).unwrap();
        let q = &out["questions"][0];
        assert_eq!(q["id"], "q1");
        assert_eq!(q["type"], "choice");
        assert!(q.get("answer").is_none());
        assert!(q.get("explanation").is_none());
    }
}
