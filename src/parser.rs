//! Document parsing: pick the extraction strategy from the file extension,
//! acquire plain text, and run the knowledge extractor over it.
//!
//! Acquisition and decode failures are folded into
//! `ExtractionResult { success: false, error }` so callers can persist a
//! failed status without special-casing errors. Only an unknown extension is
//! reported as a typed error, since no result object was ever produced.

use std::path::Path;

use tracing::{error, info, instrument};

use crate::domain::{ExtractionResult, ExtractionStats};
use crate::extract::{DocFormat, KnowledgeExtractor};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
  #[error("unsupported file format: {0}")]
  UnsupportedFormat(String),
  #[error("extraction failed: {0}")]
  ExtractionFailed(String),
}

/// Extension-based dispatch over the supported textbook formats.
pub struct DocumentParser {
  extractor: KnowledgeExtractor,
}

impl DocumentParser {
  pub fn new() -> Self {
    Self { extractor: KnowledgeExtractor::new() }
  }

  /// `.docx`/`.doc` are Word, `.md` is Markdown, `.pdf` is PDF.
  pub fn format_for(path: &Path) -> Result<DocFormat, ParseError> {
    let ext = path
      .extension()
      .and_then(|e| e.to_str())
      .map(|e| e.to_ascii_lowercase())
      .unwrap_or_default();
    match ext.as_str() {
      "docx" | "doc" => Ok(DocFormat::Word),
      "md" => Ok(DocFormat::Markdown),
      "pdf" => Ok(DocFormat::Pdf),
      other => Err(ParseError::UnsupportedFormat(format!(".{other}"))),
    }
  }

  /// Parse a document from disk into a normalized extraction result.
  #[instrument(level = "info", skip(self), fields(path = %path.display()))]
  pub fn parse(&self, path: &Path) -> Result<ExtractionResult, ParseError> {
    let format = Self::format_for(path)?;

    let content = match acquire_text(format, path) {
      Ok(text) => text,
      Err(e) => {
        error!(target: "extract", error = %e, "text acquisition failed");
        return Ok(ExtractionResult::failed(e.to_string()));
      }
    };

    let knowledge_points = self.extractor.extract(&content, format);
    let statistics = ExtractionStats::tally(&knowledge_points);
    info!(
      target: "extract",
      total = statistics.total_words,
      vocabulary = statistics.vocabulary_count,
      phrases = statistics.phrase_count,
      "document parsed"
    );

    Ok(ExtractionResult {
      success: true,
      content,
      knowledge_points,
      statistics,
      error: None,
    })
  }
}

impl Default for DocumentParser {
  fn default() -> Self {
    Self::new()
  }
}

/// Per-format text acquisition. Word and PDF go through their extraction
/// crates; Markdown is read as UTF-8 directly.
fn acquire_text(format: DocFormat, path: &Path) -> Result<String, ParseError> {
  match format {
    DocFormat::Markdown => {
      std::fs::read_to_string(path).map_err(|e| ParseError::ExtractionFailed(e.to_string()))
    }
    DocFormat::Pdf => {
      pdf_extract::extract_text(path).map_err(|e| ParseError::ExtractionFailed(e.to_string()))
    }
    DocFormat::Word => {
      let bytes =
        std::fs::read(path).map_err(|e| ParseError::ExtractionFailed(e.to_string()))?;
      let docx = docx_rs::read_docx(&bytes)
        .map_err(|e| ParseError::ExtractionFailed(e.to_string()))?;
      Ok(docx_text(&docx))
    }
  }
}

/// Join the document's paragraph runs into newline-separated plain text.
fn docx_text(docx: &docx_rs::Docx) -> String {
  let mut out = String::new();
  for child in &docx.document.children {
    if let docx_rs::DocumentChild::Paragraph(para) = child {
      let mut line = String::new();
      for pc in &para.children {
        match pc {
          docx_rs::ParagraphChild::Run(run) => push_run_text(run, &mut line),
          docx_rs::ParagraphChild::Hyperlink(link) => {
            for lc in &link.children {
              if let docx_rs::ParagraphChild::Run(run) = lc {
                push_run_text(run, &mut line);
              }
            }
          }
          _ => {}
        }
      }
      out.push_str(&line);
      out.push('\n');
    }
  }
  out
}

fn push_run_text(run: &docx_rs::Run, out: &mut String) {
  for rc in &run.children {
    if let docx_rs::RunChild::Text(t) = rc {
      out.push_str(&t.text);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  #[test]
  fn unknown_extension_is_a_typed_error() {
    let err = DocumentParser::format_for(Path::new("notes.txt")).unwrap_err();
    assert!(matches!(err, ParseError::UnsupportedFormat(_)));
    assert!(err.to_string().contains(".txt"));
  }

  #[test]
  fn extension_dispatch_is_case_insensitive() {
    assert_eq!(DocumentParser::format_for(Path::new("a.DOCX")).unwrap(), DocFormat::Word);
    assert_eq!(DocumentParser::format_for(Path::new("a.doc")).unwrap(), DocFormat::Word);
    assert_eq!(DocumentParser::format_for(Path::new("a.md")).unwrap(), DocFormat::Markdown);
    assert_eq!(DocumentParser::format_for(Path::new("a.pdf")).unwrap(), DocFormat::Pdf);
  }

  #[test]
  fn markdown_file_parses_with_statistics() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("unit1.md");
    let mut f = std::fs::File::create(&path).unwrap();
    writeln!(f, "## Unit 1").unwrap();
    writeln!(f, "**happy** /ˈhæpi/ *adj.* 快乐的").unwrap();
    writeln!(f, "- give up").unwrap();

    let result = DocumentParser::new().parse(&path).unwrap();
    assert!(result.success);
    assert_eq!(result.error, None);
    assert_eq!(result.statistics.total_words, 2);
    assert_eq!(result.statistics.vocabulary_count, 1);
    assert_eq!(result.statistics.phrase_count, 1);
    assert!(result.content.contains("Unit 1"));
  }

  #[test]
  fn missing_file_is_captured_not_thrown() {
    let result = DocumentParser::new()
      .parse(Path::new("/nonexistent/vocab.md"))
      .unwrap();
    assert!(!result.success);
    assert!(result.error.is_some());
    assert!(result.knowledge_points.is_empty());
  }
}
