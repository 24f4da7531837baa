// Tokenization
//
// The linguistic model is an injected dependency behind `LinguisticModel`.
// `Tokenizer` owns the contract on its output: spans address the original
// text exactly, never overlap, and run left to right.
//
// - rules: deterministic rule-based English model used by default

pub mod rules;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{Result, RubigeneError};

pub use rules::RuleBasedModel;

/// Coarse part-of-speech classes (Universal Dependencies UPOS, with proper
/// nouns folded into `Noun` and flagged on the token instead).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartOfSpeech {
    Noun,
    Verb,
    Adjective,
    Adverb,
    Pronoun,
    Determiner,
    Adposition,
    Conjunction,
    Auxiliary,
    Numeral,
    Particle,
    Interjection,
    Punctuation,
    Symbol,
    Other,
}

impl PartOfSpeech {
    /// Map a UPOS tag. Returns the class and whether the tag marks a proper noun.
    pub fn from_upos(tag: &str) -> (Self, bool) {
        match tag.to_uppercase().as_str() {
            "NOUN" => (Self::Noun, false),
            "PROPN" => (Self::Noun, true),
            "VERB" => (Self::Verb, false),
            "ADJ" => (Self::Adjective, false),
            "ADV" => (Self::Adverb, false),
            "PRON" => (Self::Pronoun, false),
            "DET" => (Self::Determiner, false),
            "ADP" => (Self::Adposition, false),
            "CONJ" | "CCONJ" | "SCONJ" => (Self::Conjunction, false),
            "AUX" => (Self::Auxiliary, false),
            "NUM" => (Self::Numeral, false),
            "PART" => (Self::Particle, false),
            "INTJ" => (Self::Interjection, false),
            "PUNCT" => (Self::Punctuation, false),
            "SYM" => (Self::Symbol, false),
            _ => (Self::Other, false),
        }
    }

    /// Open word classes that may carry a gloss
    pub fn is_content_word(&self) -> bool {
        matches!(self, Self::Noun | Self::Verb | Self::Adjective | Self::Adverb)
    }
}

/// Half-open range `[start, end)` into the owning text, in UTF-8 byte
/// offsets. Both ends must fall on char boundaries; these are not character
/// indices, so "café" ends at 5, not 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// The addressed substring, if the span is in bounds and on char boundaries.
    pub fn slice<'a>(&self, text: &'a str) -> Option<&'a str> {
        if self.start > self.end {
            return None;
        }
        text.get(self.start..self.end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub surface: String,
    pub lemma: String,
    pub pos: PartOfSpeech,
    /// Byte offsets of `surface` in the analyzed text
    pub span: Span,
    pub is_proper_noun: bool,
}

impl Token {
    /// Alphabetic token (not punctuation, digits or symbols)
    pub fn is_word(&self) -> bool {
        self.surface.chars().any(char::is_alphabetic)
            && self
                .surface
                .chars()
                .all(|c| c.is_alphabetic() || c == '\'' || c == '’' || c == '-')
    }
}

/// Linguistic analysis service.
///
/// Implementations must be deterministic for identical input and `version()`,
/// and report token spans as byte offsets (see [`Span`]).
pub trait LinguisticModel: Send + Sync {
    fn version(&self) -> &str;

    fn analyze(&self, text: &str) -> Vec<Token>;
}

pub struct Tokenizer {
    model: Arc<dyn LinguisticModel>,
    min_token_length: usize,
}

impl Tokenizer {
    pub fn new(model: Arc<dyn LinguisticModel>, min_token_length: usize) -> Self {
        Self {
            model,
            min_token_length,
        }
    }

    pub fn model_version(&self) -> &str {
        self.model.version()
    }

    /// Analyze `text` and verify the shape of the model's output.
    pub fn tokenize(&self, text: &str) -> Result<Vec<Token>> {
        let tokens = self.model.analyze(text);
        validate_tokens(text, &tokens, self.model.version())?;
        Ok(tokens)
    }

    /// Tokens that are candidates for classification: words of at least
    /// `min_token_length` characters.
    pub fn tokenize_words(&self, text: &str) -> Result<Vec<Token>> {
        Ok(self
            .tokenize(text)?
            .into_iter()
            .filter(|token| token.is_word() && token.surface.chars().count() >= self.min_token_length)
            .collect())
    }
}

fn validate_tokens(text: &str, tokens: &[Token], version: &str) -> Result<()> {
    let mut previous_end = 0;

    for token in tokens {
        let slice = token.span.slice(text).ok_or_else(|| {
            RubigeneError::Tokenizer(format!(
                "model {} produced span {}..{} outside the text or off a char boundary",
                version, token.span.start, token.span.end
            ))
        })?;

        if slice != token.surface {
            return Err(RubigeneError::Tokenizer(format!(
                "model {} produced surface '{}' for span text '{}'",
                version, token.surface, slice
            )));
        }

        if token.span.is_empty() || token.span.start < previous_end {
            return Err(RubigeneError::Tokenizer(format!(
                "model {} produced empty, overlapping or out-of-order token '{}' at {}",
                version, token.surface, token.span.start
            )));
        }

        previous_end = token.span.end;
    }

    Ok(())
}
