//! Application configuration (LLM prompts) loaded from TOML.
//!
//! See `Prompts` for the expected schema; every field may be overridden to
//! tune tone or structure without rebuilding.

use serde::Deserialize;
use tracing::{error, info};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
  #[serde(default)]
  pub prompts: Prompts,
}

/// Prompts used by the LLM client. Defaults carry the teaching prompts the
/// backend ships with; Chinese wording matches the learner-facing material.
#[derive(Clone, Debug, Deserialize)]
pub struct Prompts {
  // Question generation
  pub generate_system: String,
  pub generate_user_template: String,
  // Knowledge Q&A
  pub chat_system: String,
  pub chat_user_template: String,
  // Knowledge-point explanation
  pub explain_system: String,
  pub explain_user_template: String,
  // Wrong-answer analysis
  pub analysis_system: String,
  pub analysis_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      generate_system: "你是专业的英语教师，擅长根据知识点生成高质量的英语测试题目。\
题目应准确反映知识点内容，选项设置合理，表述清晰，答案准确。\
请严格按照JSON格式返回题目列表。".into(),
      generate_user_template: "根据以下知识点生成{count}道测试题目：\n\n知识点：\n{knowledge_points}\n\n\
要求：\n- 题目类型：{question_types}\n- 难度等级：{difficulty}\n- 题目总数：{count}\n\n\
请按以下JSON格式返回（不要添加任何其他内容）：\n\
{\"questions\": [{\"type\": \"choice/fill/true_false/context\", \"question\": \"题目内容\", \
\"options\": [\"A. 选项1\", \"B. 选项2\", \"C. 选项3\", \"D. 选项4\"], \"answer\": \"正确答案\", \
\"explanation\": \"解析说明\", \"knowledge_point\": \"关联的知识点内容\"}]}".into(),
      chat_system: "你是专业的英语学习助手，根据提供的教材知识点回答用户的问题。\
回答要准确清晰，适当推荐相关知识点；如果知识点中没有相关信息，诚实说明。".into(),
      chat_user_template: "知识点上下文：\n{context}\n\n用户问题：{question}\n\n请回答用户的问题。".into(),
      explain_system: "你是专业的英语教师，擅长解释英语词汇、语法和句型的用法。\
请清晰说明含义和用法，提供典型例句和常见搭配，适当区分易混淆点。".into(),
      explain_user_template: "请详细解释以下英语知识点：\n\n类型：{point_type}\n内容：{content}\n\
音标：{phonetic}\n词性：{part_of_speech}\n中文释义：{chinese_meaning}\n词组搭配：{collocations}".into(),
      analysis_system: "你是专业的英语教师，擅长分析学生的错误并提供针对性的学习建议。\
请识别错误类型、分析原因并给出学习建议，按JSON格式返回。".into(),
      analysis_user_template: "请分析以下错题：\n\n错题详情：\n{wrong_answers}\n\n\
请按以下JSON格式返回：\n{\"error_types\": [\"概念不清\"], \"analysis\": \"综合分析\", \
\"suggestions\": [\"建议1\"], \"review_points\": [\"复习要点1\"]}".into(),
    }
  }
}

/// Attempt to load `AppConfig` from LEXIBOOK_CONFIG_PATH. On any parsing/IO
/// error, returns None and the caller falls back to defaults.
pub fn load_config_from_env() -> Option<AppConfig> {
  let path = std::env::var("LEXIBOOK_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<AppConfig>(&s) {
      Ok(cfg) => {
        info!(target: "lexibook_backend", %path, "Loaded config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "lexibook_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "lexibook_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
