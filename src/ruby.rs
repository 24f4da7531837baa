//! Ruby markup generation and parsing.
//!
//! An annotated word is written as `r{original|gloss}`. Outside those
//! delimiters, and inside both fields, the characters `\`, `{`, `}` and `|`
//! are escaped with a backslash, so any text and any gloss can be carried
//! without breaking the markup and stripping it gives back the input exactly.
//!
//! The backslash belongs to this layer. The one sequence it does not produce
//! itself, `\N`, is the ASS line break written by the inline layout and reads
//! back as a newline.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, RubigeneError};
use crate::tokenize::Span;

pub const RUBY_OPEN: &str = "r{";
pub const RUBY_SEPARATOR: char = '|';
pub const RUBY_CLOSE: char = '}';
pub const ESCAPE: char = '\\';

/// A gloss to attach to `span` of cue `cue_index`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationSpan {
    pub cue_index: u32,
    pub span: Span,
    pub gloss: String,
}

/// One parsed `r{original|ruby}` tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RubyTag {
    pub original: String,
    pub ruby: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscardReason {
    Overlap,
    InvalidSpan,
    EmptyGloss,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscardedSpan {
    pub span: AnnotationSpan,
    pub reason: DiscardReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedText {
    pub text: String,
    pub applied: Vec<AnnotationSpan>,
    pub discarded: Vec<DiscardedSpan>,
}

/// `\N` after the escape character.
const LINE_BREAK: char = 'N';

fn is_special(c: char) -> bool {
    c == ESCAPE || c == '{' || c == RUBY_CLOSE || c == RUBY_SEPARATOR
}

pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if is_special(c) {
            escaped.push(ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

/// Glosses are single-line and trimmed.
fn sanitize_gloss(gloss: &str) -> String {
    gloss.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Wrap each span of `text` in ruby markup.
///
/// Spans are taken in order of start offset, longer first on ties. A span
/// overlapping an already accepted one, a span that does not address the
/// text, or one with an empty gloss is discarded and reported.
pub fn annotate(text: &str, spans: &[AnnotationSpan]) -> TaggedText {
    let mut discarded = Vec::new();
    let mut candidates: Vec<AnnotationSpan> = Vec::with_capacity(spans.len());

    for span in spans {
        let gloss = sanitize_gloss(&span.gloss);
        let valid = span.span.slice(text).is_some_and(|s| !s.is_empty());
        if !valid {
            warn!(
                "Discarding span {}..{} of cue {}: does not address the text",
                span.span.start, span.span.end, span.cue_index
            );
            discarded.push(DiscardedSpan { span: span.clone(), reason: DiscardReason::InvalidSpan });
        } else if gloss.is_empty() {
            discarded.push(DiscardedSpan { span: span.clone(), reason: DiscardReason::EmptyGloss });
        } else {
            candidates.push(AnnotationSpan { gloss, ..span.clone() });
        }
    }

    candidates.sort_by(|a, b| {
        a.span
            .start
            .cmp(&b.span.start)
            .then_with(|| b.span.len().cmp(&a.span.len()))
    });

    let mut applied: Vec<AnnotationSpan> = Vec::new();
    for candidate in candidates {
        if applied.last().is_some_and(|last| candidate.span.start < last.span.end) {
            warn!(
                "Discarding overlapping span {}..{} ('{}') of cue {}",
                candidate.span.start, candidate.span.end, candidate.gloss, candidate.cue_index
            );
            discarded.push(DiscardedSpan { span: candidate, reason: DiscardReason::Overlap });
        } else {
            applied.push(candidate);
        }
    }

    let mut tagged = String::with_capacity(text.len() + applied.len() * 16);
    let mut cursor = 0;
    for span in &applied {
        tagged.push_str(&escape(&text[cursor..span.span.start]));
        tagged.push_str(RUBY_OPEN);
        tagged.push_str(&escape(&text[span.span.start..span.span.end]));
        tagged.push(RUBY_SEPARATOR);
        tagged.push_str(&escape(&span.gloss));
        tagged.push(RUBY_CLOSE);
        cursor = span.span.end;
    }
    tagged.push_str(&escape(&text[cursor..]));

    TaggedText {
        text: tagged,
        applied,
        discarded,
    }
}

enum Segment {
    Text(String),
    Ruby(RubyTag),
}

/// The character that `\<c>` stands for.
fn unescape(c: char) -> char {
    if c == LINE_BREAK { '\n' } else { c }
}

/// Read an escaped field up to the unescaped `terminator`.
fn read_field(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, terminator: char) -> Result<String> {
    let mut field = String::new();
    while let Some(c) = chars.next() {
        if c == ESCAPE {
            let escaped = chars
                .next()
                .ok_or_else(|| RubigeneError::Markup("dangling escape at end of text".to_string()))?;
            field.push(unescape(escaped));
        } else if c == terminator {
            return Ok(field);
        } else if is_special(c) {
            return Err(RubigeneError::Markup(format!("unescaped '{}' inside a ruby tag", c)));
        } else {
            field.push(c);
        }
    }
    Err(RubigeneError::Markup(format!("unterminated ruby tag, expected '{}'", terminator)))
}

fn parse_segments(tagged: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut chars = tagged.chars().peekable();

    while let Some(c) = chars.next() {
        if c == ESCAPE {
            let escaped = chars
                .next()
                .ok_or_else(|| RubigeneError::Markup("dangling escape at end of text".to_string()))?;
            text.push(unescape(escaped));
        } else if c == 'r' && chars.peek() == Some(&'{') {
            chars.next();
            let original = read_field(&mut chars, RUBY_SEPARATOR)?;
            let ruby = read_field(&mut chars, RUBY_CLOSE)?;
            if !text.is_empty() {
                segments.push(Segment::Text(std::mem::take(&mut text)));
            }
            segments.push(Segment::Ruby(RubyTag { original, ruby }));
        } else if is_special(c) {
            return Err(RubigeneError::Markup(format!("unescaped '{}' outside a ruby tag", c)));
        } else {
            text.push(c);
        }
    }

    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }
    Ok(segments)
}

/// All ruby tags in `tagged`, in order.
pub fn parse_tags(tagged: &str) -> Result<Vec<RubyTag>> {
    Ok(parse_segments(tagged)?
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Ruby(tag) => Some(tag),
            Segment::Text(_) => None,
        })
        .collect())
}

/// The original text with every tag replaced by its original word.
pub fn strip_markup(tagged: &str) -> Result<String> {
    Ok(parse_segments(tagged)?
        .into_iter()
        .map(|segment| match segment {
            Segment::Text(text) => text,
            Segment::Ruby(tag) => tag.original,
        })
        .collect())
}

/// The text with every tag replaced by its gloss.
pub fn extract_ruby_only(tagged: &str) -> Result<String> {
    Ok(parse_segments(tagged)?
        .into_iter()
        .map(|segment| match segment {
            Segment::Text(text) => text,
            Segment::Ruby(tag) => tag.ruby,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(text: &str, word: &str, gloss: &str) -> AnnotationSpan {
        let start = text.find(word).unwrap();
        AnnotationSpan {
            cue_index: 1,
            span: Span::new(start, start + word.len()),
            gloss: gloss.to_string(),
        }
    }

    #[test]
    fn test_annotate_single_word() {
        let text = "The ephemeral beauty of dawn.";
        let tagged = annotate(text, &[span(text, "ephemeral", "はかない")]);
        assert_eq!(tagged.text, "The r{ephemeral|はかない} beauty of dawn.");
        assert_eq!(tagged.applied.len(), 1);
        assert!(tagged.discarded.is_empty());
        assert_eq!(strip_markup(&tagged.text).unwrap(), text);
    }

    #[test]
    fn test_round_trip_with_markup_characters() {
        let text = "a|b {c} \\d r{x|y} for{ er\nnext line – café";
        let spans = [span(text, "café", "カ|フェ}"), span(text, "for", "ために")];
        let tagged = annotate(text, &spans);
        assert_eq!(tagged.applied.len(), 2);
        assert_eq!(strip_markup(&tagged.text).unwrap(), text);

        let tags = parse_tags(&tagged.text).unwrap();
        assert_eq!(tags[0], RubyTag { original: "for".into(), ruby: "ために".into() });
        assert_eq!(tags[1].ruby, "カ|フェ}");
    }

    #[test]
    fn test_round_trip_without_spans() {
        for text in ["", "plain", "r{", "}|{\\", "rr{{"] {
            let tagged = annotate(text, &[]);
            assert_eq!(strip_markup(&tagged.text).unwrap(), text);
            assert!(parse_tags(&tagged.text).unwrap().is_empty());
        }
    }

    #[test]
    fn test_overlap_prefers_earliest_then_longest() {
        let text = "ice cream cone";
        let spans = [
            AnnotationSpan { cue_index: 1, span: Span::new(4, 14), gloss: "B".into() },
            AnnotationSpan { cue_index: 1, span: Span::new(0, 3), gloss: "short".into() },
            AnnotationSpan { cue_index: 1, span: Span::new(0, 9), gloss: "long".into() },
        ];
        let tagged = annotate(text, &spans);
        assert_eq!(tagged.text, "r{ice cream|long} cone");
        assert_eq!(tagged.discarded.len(), 2);
        assert!(tagged.discarded.iter().all(|d| d.reason == DiscardReason::Overlap));
        assert_eq!(strip_markup(&tagged.text).unwrap(), text);
    }

    #[test]
    fn test_adjacent_spans_both_apply() {
        let text = "runrun";
        let spans = [
            AnnotationSpan { cue_index: 1, span: Span::new(3, 6), gloss: "2".into() },
            AnnotationSpan { cue_index: 1, span: Span::new(0, 3), gloss: "1".into() },
        ];
        let tagged = annotate(text, &spans);
        assert_eq!(tagged.text, "r{run|1}r{run|2}");
        assert_eq!(strip_markup(&tagged.text).unwrap(), text);
    }

    #[test]
    fn test_invalid_and_empty_spans_are_discarded() {
        let text = "café";
        let spans = [
            AnnotationSpan { cue_index: 1, span: Span::new(0, 4), gloss: "x".into() },
            AnnotationSpan { cue_index: 1, span: Span::new(2, 20), gloss: "x".into() },
            AnnotationSpan { cue_index: 1, span: Span::new(0, 2), gloss: "  \n ".into() },
        ];
        let tagged = annotate(text, &spans);
        assert_eq!(tagged.text, "café");
        let reasons: Vec<_> = tagged.discarded.iter().map(|d| d.reason).collect();
        assert_eq!(
            reasons,
            vec![DiscardReason::InvalidSpan, DiscardReason::InvalidSpan, DiscardReason::EmptyGloss]
        );
    }

    #[test]
    fn test_gloss_whitespace_is_collapsed() {
        let text = "dawn";
        let tagged = annotate(text, &[span(text, "dawn", " 夜\n明け ")]);
        assert_eq!(tagged.text, "r{dawn|夜 明け}");
    }

    #[test]
    fn test_extract_ruby_only() {
        assert_eq!(
            extract_ruby_only("The r{ephemeral|はかない} beauty").unwrap(),
            "The はかない beauty"
        );
    }

    #[test]
    fn test_ass_line_break_reads_as_newline() {
        let text = "first {line}\nsecond N \\N";
        let tagged = annotate(text, &[span(text, "second", "二")]);
        let ass = tagged.text.replace('\n', "\\N");
        assert_eq!(strip_markup(&ass).unwrap(), text);
        assert_eq!(parse_tags(&ass).unwrap()[0].original, "second");
        assert_eq!(strip_markup("r{a\\Nb|x\\Ny}").unwrap(), "a\nb");
        assert_eq!(extract_ruby_only("r{a|x\\Ny}").unwrap(), "x\ny");
    }

    #[test]
    fn test_malformed_markup() {
        assert!(matches!(strip_markup("r{open|never"), Err(RubigeneError::Markup(_))));
        assert!(strip_markup("bare | pipe").is_err());
        assert!(strip_markup("dangling \\").is_err());
    }
}
