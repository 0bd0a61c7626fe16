//! Knowledge-point extraction: a single forward scan over decoded document
//! text, carrying the current unit/page context.
//!
//! Each non-empty line is run through an ordered matcher cascade that yields a
//! tagged result; the first matcher that fires wins and the rest are skipped.
//! Lines that match nothing are ignored, never an error.

use regex::Regex;
use tracing::debug;

use crate::domain::{KnowledgePoint, PartOfSpeech, PointType};

/// Which family of sub-patterns applies to the document text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocFormat {
  Word,
  Markdown,
  Pdf,
}

/// Fields pulled out of one vocabulary line.
#[derive(Debug, PartialEq)]
struct VocabFields {
  word: String,
  phonetic: Option<String>,
  part_of_speech: Option<PartOfSpeech>,
  meaning: Option<String>,
  collocations: Vec<String>,
}

/// Outcome of matching a single trimmed line.
#[derive(Debug, PartialEq)]
enum LineMatch {
  UnitHeader(String),
  PageMarker(String),
  Vocab(VocabFields),
  Phrase(String),
  NoMatch,
}

struct Patterns {
  unit: Regex,
  page: Regex,
  headword: Regex,
  phonetic: Regex,
  pos_marker: Regex,
  colloc_paren: Regex,
  colloc_plus: Regex,
}

impl Patterns {
  fn compile() -> Self {
    Self {
      unit: Regex::new(r"(?i)^#{1,2}\s*(Unit\s*\d+)").unwrap(),
      page: Regex::new(r"^#{2,3}\s*p\.(\d+)").unwrap(),
      headword: Regex::new(r"^\*\*([^*]+)\*\*\s*(.*)$").unwrap(),
      phonetic: Regex::new(r"/([^/]+)/").unwrap(),
      pos_marker: Regex::new(r"\*(n|v|adj|adv|prep|conj|pron|num|det)\.\*?").unwrap(),
      colloc_paren: Regex::new(r"(?i)\b([a-z]+(?:\s+[a-z]+)+)\s*\([^)]+\)").unwrap(),
      colloc_plus: Regex::new(r"(?i)\b([a-z]+(?:\s+[a-z]+)+)\s+\+").unwrap(),
    }
  }
}

/// Pattern-based extractor. Regexes are compiled once at construction; the
/// instance is shared behind the owning parser and holds no mutable state.
pub struct KnowledgeExtractor {
  patterns: Patterns,
}

impl KnowledgeExtractor {
  pub fn new() -> Self {
    Self { patterns: Patterns::compile() }
  }

  /// Scan `content` and return knowledge points in order of first appearance.
  /// Pure function of the input; identical input yields an identical sequence.
  pub fn extract(&self, content: &str, format: DocFormat) -> Vec<KnowledgePoint> {
    let mut points = Vec::new();
    let mut current_unit: Option<String> = None;
    let mut current_page: Option<String> = None;

    for raw in content.lines() {
      let line = raw.trim();
      if line.is_empty() {
        continue;
      }

      match self.match_line(line, format) {
        LineMatch::UnitHeader(unit) => current_unit = Some(unit),
        LineMatch::PageMarker(page) => current_page = Some(page),
        LineMatch::Vocab(v) => {
          points.push(KnowledgePoint {
            point_type: PointType::Vocabulary,
            content: v.word,
            phonetic: v.phonetic,
            part_of_speech: v.part_of_speech,
            chinese_meaning: v.meaning,
            collocations: v.collocations,
            examples: Vec::new(),
            unit: current_unit.clone(),
            page: current_page.clone(),
          });
        }
        LineMatch::Phrase(phrase) => {
          // Phrase entries are only meaningful inside a unit.
          if current_unit.is_some() {
            points.push(KnowledgePoint {
              point_type: PointType::Phrase,
              content: phrase,
              phonetic: None,
              part_of_speech: None,
              chinese_meaning: None,
              collocations: Vec::new(),
              examples: Vec::new(),
              unit: current_unit.clone(),
              page: current_page.clone(),
            });
          }
        }
        LineMatch::NoMatch => {}
      }
    }

    debug!(target: "extract", points = points.len(), ?format, "extraction pass done");
    points
  }

  /// First match wins: a unit header never also produces a vocabulary entry.
  fn match_line(&self, line: &str, format: DocFormat) -> LineMatch {
    if let Some(caps) = self.patterns.unit.captures(line) {
      return LineMatch::UnitHeader(caps[1].to_string());
    }
    if let Some(caps) = self.patterns.page.captures(line) {
      return LineMatch::PageMarker(caps[1].to_string());
    }
    // Markdown glossaries separate units with long em-dash rules; skip them.
    if format == DocFormat::Markdown && line.contains('—') && line.chars().count() > 20 {
      return LineMatch::NoMatch;
    }
    if let Some(v) = self.vocab_fields(line, format) {
      return LineMatch::Vocab(v);
    }
    if format != DocFormat::Pdf {
      if let Some(phrase) = phrase_body(line, format) {
        return LineMatch::Phrase(phrase);
      }
    }
    LineMatch::NoMatch
  }

  /// A vocabulary line is a bolded headword, optionally followed by a
  /// `/phonetic/` transcription, a `*pos.*` abbreviation marker, and a
  /// trailing meaning.
  fn vocab_fields(&self, line: &str, format: DocFormat) -> Option<VocabFields> {
    let caps = self.patterns.headword.captures(line)?;
    let word = caps[1].trim().to_string();
    let rest = caps.get(2).map(|m| m.as_str()).unwrap_or("");

    let phonetic = self
      .patterns
      .phonetic
      .captures(line)
      .map(|c| c[1].trim().to_string())
      .filter(|p| !p.is_empty());

    let part_of_speech = self
      .patterns
      .pos_marker
      .captures(line)
      .and_then(|c| PartOfSpeech::from_abbrev(&c[1]));

    // The meaning is whatever remains after removing the structured markers.
    let mut meaning = rest.to_string();
    if let Some(m) = self.patterns.phonetic.find(&meaning) {
      meaning.replace_range(m.range(), "");
    }
    if let Some(m) = self.patterns.pos_marker.find(&meaning) {
      meaning.replace_range(m.range(), "");
    }
    let meaning = meaning.replace('*', "");
    let meaning = meaning.trim();

    match format {
      // The Word pattern requires a trailing meaning; a bare bold word is
      // heading-like text, not a glossary entry.
      DocFormat::Word if meaning.is_empty() => return None,
      // The PDF text is noisy, so only fully structured entries count.
      DocFormat::Pdf => {
        if !word.chars().all(|c| c.is_ascii_alphabetic())
          || phonetic.is_none()
          || part_of_speech.is_none()
          || meaning.is_empty()
        {
          return None;
        }
      }
      _ => {}
    }

    let collocations = match format {
      DocFormat::Word => self.collocations_in(line, true),
      DocFormat::Markdown => self.collocations_in(line, false),
      DocFormat::Pdf => Vec::new(),
    };

    Some(VocabFields {
      word,
      phonetic,
      part_of_speech,
      meaning: if meaning.is_empty() { None } else { Some(meaning.to_string()) },
      collocations,
    })
  }

  /// Collocations are lowercase word sequences followed by a parenthetical
  /// (`be scared of (doing sth.)`) or, in Word documents, a `+` marker
  /// (`be afraid of +`). Per-line duplicates are dropped, first occurrence kept.
  fn collocations_in(&self, line: &str, with_plus: bool) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for caps in self.patterns.colloc_paren.captures_iter(line) {
      found.push(caps[1].to_string());
    }
    if with_plus {
      for caps in self.patterns.colloc_plus.captures_iter(line) {
        found.push(caps[1].to_string());
      }
    }
    let mut unique = Vec::new();
    for c in found {
      if !unique.contains(&c) {
        unique.push(c);
      }
    }
    unique
  }
}

impl Default for KnowledgeExtractor {
  fn default() -> Self {
    Self::new()
  }
}

/// Bullet-list body, if the line is a plain `- ` / `* ` item. Markdown lists
/// additionally exclude bare links and trivially short items.
fn phrase_body(line: &str, format: DocFormat) -> Option<String> {
  if !(line.starts_with("- ") || line.starts_with("* ")) {
    return None;
  }
  if format == DocFormat::Markdown && line.chars().count() <= 3 {
    return None;
  }
  let body = line[2..].trim();
  if body.is_empty() {
    return None;
  }
  if format == DocFormat::Markdown && body.starts_with("http") {
    return None;
  }
  Some(body.to_string())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::ExtractionStats;

  fn extractor() -> KnowledgeExtractor {
    KnowledgeExtractor::new()
  }

  #[test]
  fn markdown_vocab_entry_with_unit_context() {
    let content = "## Unit 1\n\n**happy** /ˈhæpi/ *adj.* 快乐的\n";
    let points = extractor().extract(content, DocFormat::Markdown);

    assert_eq!(points.len(), 1);
    let kp = &points[0];
    assert_eq!(kp.point_type, PointType::Vocabulary);
    assert_eq!(kp.content, "happy");
    assert_eq!(kp.phonetic.as_deref(), Some("ˈhæpi"));
    assert_eq!(kp.part_of_speech, Some(PartOfSpeech::Adjective));
    assert_eq!(kp.chinese_meaning.as_deref(), Some("快乐的"));
    assert_eq!(kp.unit.as_deref(), Some("Unit 1"));
    assert_eq!(kp.page, None);
  }

  #[test]
  fn unit_header_is_case_insensitive_and_does_not_emit_a_point() {
    let content = "# UNIT 2\n**cold** /kəʊld/ *adj.* 寒冷的\n";
    let points = extractor().extract(content, DocFormat::Markdown);
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].unit.as_deref(), Some("UNIT 2"));
  }

  #[test]
  fn page_marker_updates_context() {
    let content = "## Unit 3\n### p.42\n- look forward to\n";
    let points = extractor().extract(content, DocFormat::Markdown);
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].point_type, PointType::Phrase);
    assert_eq!(points[0].content, "look forward to");
    assert_eq!(points[0].page.as_deref(), Some("42"));
  }

  #[test]
  fn phrases_require_a_unit_but_vocabulary_does_not() {
    let content = "- orphan phrase\n**alone** /əˈləʊn/ *adj.* 独自的\n";
    let points = extractor().extract(content, DocFormat::Markdown);
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].point_type, PointType::Vocabulary);
    assert_eq!(points[0].unit, None);
  }

  #[test]
  fn markdown_link_bullets_are_skipped() {
    let content = "## Unit 1\n- https://example.com/audio\n- real phrase\n";
    let points = extractor().extract(content, DocFormat::Markdown);
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].content, "real phrase");
  }

  #[test]
  fn word_vocab_without_meaning_is_ignored() {
    let points = extractor().extract("**Heading**\n", DocFormat::Word);
    assert!(points.is_empty());
  }

  #[test]
  fn markdown_vocab_without_meaning_is_kept() {
    let points = extractor().extract("**standalone**\n", DocFormat::Markdown);
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].content, "standalone");
    assert_eq!(points[0].chinese_meaning, None);
  }

  #[test]
  fn pos_abbreviations_map_to_canonical_names() {
    let content = "**beside** /bɪˈsaɪd/ *prep.* 在旁边\n**they** /ðeɪ/ *pron.* 他们\n";
    let points = extractor().extract(content, DocFormat::Word);
    assert_eq!(points[0].part_of_speech, Some(PartOfSpeech::Preposition));
    assert_eq!(points[1].part_of_speech, Some(PartOfSpeech::Pronoun));
  }

  #[test]
  fn collocations_are_extracted_and_deduplicated() {
    let line = "**afraid** /əˈfreɪd/ *adj.* 害怕的 be afraid of (doing sth.) be afraid of (sth.)\n";
    let points = extractor().extract(line, DocFormat::Word);
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].collocations, vec!["be afraid of".to_string()]);
  }

  #[test]
  fn word_plus_marker_collocation() {
    let line = "**keen** /kiːn/ *adj.* 热衷的 be keen on +\n";
    let points = extractor().extract(line, DocFormat::Word);
    assert_eq!(points[0].collocations, vec!["be keen on".to_string()]);
  }

  #[test]
  fn pdf_variant_only_accepts_fully_structured_entries() {
    let content = "**apple** /ˈæpl/ *n.* 苹果\n**banana** 没有音标\n- bullet ignored\n";
    let points = extractor().extract(content, DocFormat::Pdf);
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].content, "apple");
  }

  #[test]
  fn markdown_separator_lines_are_skipped() {
    let content = "## Unit 1\n————————————————————————\n- after the rule\n";
    let points = extractor().extract(content, DocFormat::Markdown);
    assert_eq!(points.len(), 1);
  }

  #[test]
  fn extraction_is_idempotent() {
    let content = "## Unit 1\n**happy** /ˈhæpi/ *adj.* 快乐的\n- give up\n";
    let ex = extractor();
    let a = ex.extract(content, DocFormat::Markdown);
    let b = ex.extract(content, DocFormat::Markdown);
    assert_eq!(a, b);
  }

  #[test]
  fn stats_totals_add_up() {
    let content = "## Unit 1\n**happy** /ˈhæpi/ *adj.* 快乐的\n- give up\n- hand in\n";
    let points = extractor().extract(content, DocFormat::Markdown);
    let stats = ExtractionStats::tally(&points);
    assert_eq!(stats.total_words, points.len());
    assert_eq!(
      stats.vocabulary_count + stats.phrase_count + stats.grammar_count + stats.sentence_count,
      stats.total_words
    );
    assert_eq!(stats.vocabulary_count, 1);
    assert_eq!(stats.phrase_count, 2);
  }
}
