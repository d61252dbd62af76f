//! Clause-level sentence splitting.
//!
//! Optional pipeline stage that subdivides a normalized segment's text
//! into clause rows at punctuation boundaries. Every other field (timing,
//! confidence, speaker) is copied unchanged onto each fragment row, so
//! fragment timings are approximate; that is a known limitation of the
//! stage, preserved rather than fixed here.

use serde::{Deserialize, Serialize};

use crate::domain::Segment;

/// Which text field the splitter operates on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitField {
    Text,
    TextEdited,
}

/// Splitter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitterConfig {
    /// Whether the stage runs at all
    #[serde(default)]
    pub enabled: bool,

    /// Punctuation marks, processed one at a time in order
    #[serde(default = "default_marks")]
    pub marks: Vec<String>,

    /// Text field the fragments are written to
    #[serde(default = "default_field")]
    pub field: SplitField,
}

fn default_marks() -> Vec<String> {
    vec![".".to_string(), "?".to_string(), "!".to_string()]
}

fn default_field() -> SplitField {
    SplitField::TextEdited
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            marks: default_marks(),
            field: default_field(),
        }
    }
}

/// Split `text` into clauses, processing one mark at a time.
///
/// For each mark the text is scanned word by word into a running clause;
/// a word containing the mark closes the clause. A non-empty trailing
/// clause is also emitted. Whitespace runs collapse to single spaces, so
/// joining the result with single spaces reproduces the trimmed input.
pub fn split_clauses(text: &str, marks: &[String]) -> Vec<String> {
    let mut fragments = vec![text.trim().to_string()];

    for mark in marks {
        fragments = fragments
            .iter()
            .flat_map(|fragment| split_on_mark(fragment, mark))
            .collect();
    }

    fragments
}

fn split_on_mark(sentence: &str, mark: &str) -> Vec<String> {
    if !sentence.contains(mark) {
        return vec![sentence.trim().to_string()];
    }

    let mut clauses = Vec::new();
    let mut current = String::new();

    for word in sentence.split_whitespace() {
        current.push_str(word);
        current.push(' ');

        if word.contains(mark) {
            clauses.push(current.trim().to_string());
            current.clear();
        }
    }

    if !current.trim().is_empty() {
        clauses.push(current.trim().to_string());
    }

    clauses
}

/// Expand each segment into one row per clause of its configured text
/// field, copying every other field unchanged.
pub fn explode(segments: Vec<Segment>, config: &SplitterConfig) -> Vec<Segment> {
    segments
        .into_iter()
        .flat_map(|segment| {
            let source = match config.field {
                SplitField::Text => segment.text.clone(),
                SplitField::TextEdited => segment.text_edited.clone(),
            };

            split_clauses(&source, &config.marks)
                .into_iter()
                .map(move |fragment| {
                    let mut row = segment.clone();
                    match config.field {
                        SplitField::Text => row.text = fragment,
                        SplitField::TextEdited => row.text_edited = fragment,
                    }
                    row
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marks() -> Vec<String> {
        vec![".".to_string(), "?".to_string(), "!".to_string()]
    }

    fn segment(text_edited: &str) -> Segment {
        Segment {
            start_ms: 1000,
            end_ms: 5000,
            text: "raw".to_string(),
            text_edited: text_edited.to_string(),
            confidence: 0.9,
            speaker: "1".to_string(),
        }
    }

    #[test]
    fn test_two_sentences_split_into_two_rows() {
        let clauses = split_clauses("안녕하세요. 반가워요!", &marks());
        assert_eq!(clauses, vec!["안녕하세요.", "반가워요!"]);
    }

    #[test]
    fn test_text_without_marks_stays_whole() {
        let clauses = split_clauses("  no punctuation here  ", &marks());
        assert_eq!(clauses, vec!["no punctuation here"]);
    }

    #[test]
    fn test_trailing_clause_is_emitted() {
        let clauses = split_clauses("done. and then", &marks());
        assert_eq!(clauses, vec!["done.", "and then"]);
    }

    #[test]
    fn test_marks_are_processed_in_order() {
        let clauses = split_clauses("one. two? three! four", &marks());
        assert_eq!(clauses, vec!["one.", "two?", "three!", "four"]);
    }

    #[test]
    fn test_mark_inside_a_word_closes_the_clause() {
        let clauses = split_clauses("wait... what", &marks());
        assert_eq!(clauses, vec!["wait...", "what"]);
    }

    #[test]
    fn test_joining_fragments_reproduces_collapsed_text() {
        let text = "  first.   second sentence?  third!  tail ";
        let clauses = split_clauses(text, &marks());

        let rejoined = clauses.join(" ");
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        assert_eq!(rejoined, collapsed);
    }

    #[test]
    fn test_explode_copies_every_other_field() {
        let config = SplitterConfig {
            enabled: true,
            marks: marks(),
            field: SplitField::TextEdited,
        };

        let rows = explode(vec![segment("안녕하세요. 반가워요!")], &config);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].text_edited, "안녕하세요.");
        assert_eq!(rows[1].text_edited, "반가워요!");
        for row in &rows {
            assert_eq!(row.start_ms, 1000);
            assert_eq!(row.end_ms, 5000);
            assert_eq!(row.text, "raw");
            assert_eq!(row.confidence, 0.9);
            assert_eq!(row.speaker, "1");
        }
    }

    #[test]
    fn test_explode_on_raw_text_leaves_edited_text_alone() {
        let config = SplitterConfig {
            enabled: true,
            marks: marks(),
            field: SplitField::Text,
        };

        let mut row = segment("edited stays");
        row.text = "a. b".to_string();

        let rows = explode(vec![row], &config);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].text, "a.");
        assert_eq!(rows[1].text, "b");
        assert_eq!(rows[0].text_edited, "edited stays");
        assert_eq!(rows[1].text_edited, "edited stays");
    }

    #[test]
    fn test_unsplittable_segment_passes_through() {
        let config = SplitterConfig {
            enabled: true,
            marks: marks(),
            field: SplitField::TextEdited,
        };

        let rows = explode(vec![segment("no marks at all")], &config);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text_edited, "no marks at all");
    }
}
