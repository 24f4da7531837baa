// Difficulty classification
//
// Three independent signals decide whether a word is hard for the learner.
// A word is annotated when any signal flags it and it passes the
// part-of-speech and proper-noun filters.
//
// - tables: the NGSL, CEFR and frequency lookup tables

pub mod tables;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::DifficultyConfig;
use crate::tokenize::Token;

pub use tables::{CefrLevel, Lookup, LookupTables};

/// A single piece of evidence that a word is difficult.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DifficultySignal {
    /// NGSL band, 1 (core) to 3 (least common)
    GradedListLevel(u8),
    ProficiencyLevel(CefrLevel),
    /// Position in the frequency list, 1 = most common
    FrequencyRank(u32),
}

impl DifficultySignal {
    pub fn exceeds(&self, config: &DifficultyConfig) -> bool {
        match *self {
            DifficultySignal::GradedListLevel(level) => level >= config.ngsl_threshold,
            DifficultySignal::ProficiencyLevel(level) => level >= config.cefr_threshold,
            DifficultySignal::FrequencyRank(rank) => rank > config.frequency_threshold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    PosFiltered,
    ProperNoun,
    BelowThresholds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DifficultyVerdict {
    Annotate,
    Skip(SkipReason),
}

impl DifficultyVerdict {
    pub fn annotate(&self) -> bool {
        matches!(self, DifficultyVerdict::Annotate)
    }
}

/// The signal values found for one token. `None` means the word is not in that list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyAssessment {
    pub lemma: String,
    pub ngsl_level: Option<u8>,
    pub cefr_level: Option<CefrLevel>,
    pub frequency_rank: Option<u32>,
}

impl DifficultyAssessment {
    pub fn signals(&self) -> Vec<DifficultySignal> {
        let mut signals = Vec::new();
        if let Some(level) = self.ngsl_level {
            signals.push(DifficultySignal::GradedListLevel(level));
        }
        if let Some(level) = self.cefr_level {
            signals.push(DifficultySignal::ProficiencyLevel(level));
        }
        if let Some(rank) = self.frequency_rank {
            signals.push(DifficultySignal::FrequencyRank(rank));
        }
        signals
    }

    pub fn flagged_by(&self, config: &DifficultyConfig) -> Vec<DifficultySignal> {
        self.signals().into_iter().filter(|s| s.exceeds(config)).collect()
    }

    pub fn is_difficult(&self, config: &DifficultyConfig) -> bool {
        self.signals().iter().any(|s| s.exceeds(config))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyStatistics {
    pub total: usize,
    pub difficult: usize,
    pub flagged_by_ngsl: usize,
    pub flagged_by_cefr: usize,
    pub flagged_by_frequency: usize,
    /// Found in none of the three lists
    pub unknown: usize,
}

pub struct DifficultyClassifier {
    tables: Arc<LookupTables>,
    config: DifficultyConfig,
}

impl DifficultyClassifier {
    pub fn new(tables: Arc<LookupTables>, config: DifficultyConfig) -> Self {
        Self { tables, config }
    }

    pub fn config(&self) -> &DifficultyConfig {
        &self.config
    }

    pub fn assess(&self, token: &Token) -> DifficultyAssessment {
        DifficultyAssessment {
            lemma: token.lemma.to_lowercase(),
            ngsl_level: self.tables.ngsl_level(&token.lemma, &token.surface).found(),
            cefr_level: self.tables.cefr_level(&token.lemma, &token.surface).found(),
            frequency_rank: self.tables.frequency_rank(&token.lemma, &token.surface).found(),
        }
    }

    /// Pure: the verdict depends only on the token, the tables and the config.
    pub fn classify(&self, token: &Token) -> DifficultyVerdict {
        if !self.config.pos_filter.contains(&token.pos) {
            return DifficultyVerdict::Skip(SkipReason::PosFiltered);
        }
        if token.is_proper_noun && self.config.exclude_proper_nouns {
            return DifficultyVerdict::Skip(SkipReason::ProperNoun);
        }
        if self.assess(token).is_difficult(&self.config) {
            DifficultyVerdict::Annotate
        } else {
            DifficultyVerdict::Skip(SkipReason::BelowThresholds)
        }
    }

    /// Tokens of one cue that should be annotated, in order.
    pub fn select(&self, tokens: Vec<Token>) -> Vec<Token> {
        let mut seen = HashSet::new();
        tokens
            .into_iter()
            .filter(|token| self.classify(token).annotate())
            .filter(|token| !self.config.first_occurrence_only || seen.insert(token.lemma.to_lowercase()))
            .collect()
    }

    pub fn statistics(&self, assessments: &[DifficultyAssessment]) -> DifficultyStatistics {
        let mut stats = DifficultyStatistics {
            total: assessments.len(),
            ..Default::default()
        };

        for assessment in assessments {
            let flagged = assessment.flagged_by(&self.config);
            if !flagged.is_empty() {
                stats.difficult += 1;
            }
            for signal in flagged {
                match signal {
                    DifficultySignal::GradedListLevel(_) => stats.flagged_by_ngsl += 1,
                    DifficultySignal::ProficiencyLevel(_) => stats.flagged_by_cefr += 1,
                    DifficultySignal::FrequencyRank(_) => stats.flagged_by_frequency += 1,
                }
            }
            if assessment.signals().is_empty() {
                stats.unknown += 1;
            }
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenize::{PartOfSpeech, Span};
    use std::collections::HashMap;

    fn tables() -> Arc<LookupTables> {
        Arc::new(LookupTables::new(
            HashMap::from([("beauty".to_string(), 1), ("obscure".to_string(), 3)]),
            HashMap::from([
                ("ephemeral".to_string(), CefrLevel::C1),
                ("beauty".to_string(), CefrLevel::A2),
                ("dawn".to_string(), CefrLevel::B1),
            ]),
            HashMap::from([("beauty".to_string(), 900), ("dawn".to_string(), 2500), ("glimmer".to_string(), 9000)]),
        ))
    }

    fn config() -> DifficultyConfig {
        DifficultyConfig {
            ngsl_threshold: 3,
            cefr_threshold: CefrLevel::B2,
            frequency_threshold: 3000,
            pos_filter: vec![PartOfSpeech::Noun, PartOfSpeech::Verb, PartOfSpeech::Adjective],
            exclude_proper_nouns: true,
            first_occurrence_only: true,
        }
    }

    fn token(surface: &str, pos: PartOfSpeech) -> Token {
        Token {
            surface: surface.to_string(),
            lemma: surface.to_lowercase(),
            pos,
            span: Span::new(0, surface.len()),
            is_proper_noun: false,
        }
    }

    #[test]
    fn test_each_signal_flags_independently() {
        let classifier = DifficultyClassifier::new(tables(), config());
        assert_eq!(classifier.classify(&token("ephemeral", PartOfSpeech::Adjective)), DifficultyVerdict::Annotate);
        assert_eq!(classifier.classify(&token("obscure", PartOfSpeech::Adjective)), DifficultyVerdict::Annotate);
        assert_eq!(classifier.classify(&token("glimmer", PartOfSpeech::Noun)), DifficultyVerdict::Annotate);
        assert_eq!(
            classifier.classify(&token("beauty", PartOfSpeech::Noun)),
            DifficultyVerdict::Skip(SkipReason::BelowThresholds)
        );
    }

    #[test]
    fn test_missing_from_every_list_is_not_difficult() {
        let classifier = DifficultyClassifier::new(tables(), config());
        let verdict = classifier.classify(&token("zyzzyva", PartOfSpeech::Noun));
        assert_eq!(verdict, DifficultyVerdict::Skip(SkipReason::BelowThresholds));
    }

    #[test]
    fn test_pos_filter_and_proper_nouns() {
        let classifier = DifficultyClassifier::new(tables(), config());
        assert_eq!(
            classifier.classify(&token("ephemeral", PartOfSpeech::Adverb)),
            DifficultyVerdict::Skip(SkipReason::PosFiltered)
        );

        let mut paris = token("glimmer", PartOfSpeech::Noun);
        paris.is_proper_noun = true;
        assert_eq!(classifier.classify(&paris), DifficultyVerdict::Skip(SkipReason::ProperNoun));

        let mut allow = config();
        allow.exclude_proper_nouns = false;
        let classifier = DifficultyClassifier::new(tables(), allow);
        assert!(classifier.classify(&paris).annotate());
    }

    #[test]
    fn test_classification_is_case_insensitive_and_pure() {
        let classifier = DifficultyClassifier::new(tables(), config());
        let mut upper = token("Ephemeral", PartOfSpeech::Adjective);
        upper.lemma = "Ephemeral".to_string();
        let first = classifier.classify(&upper);
        for _ in 0..10 {
            assert_eq!(classifier.classify(&upper), first);
        }
        assert!(first.annotate());
    }

    #[test]
    fn test_select_keeps_first_occurrence() {
        let classifier = DifficultyClassifier::new(tables(), config());
        let tokens = vec![
            token("glimmer", PartOfSpeech::Noun),
            token("beauty", PartOfSpeech::Noun),
            token("glimmer", PartOfSpeech::Noun),
        ];
        assert_eq!(classifier.select(tokens.clone()).len(), 1);

        let mut all = config();
        all.first_occurrence_only = false;
        let classifier = DifficultyClassifier::new(tables(), all);
        assert_eq!(classifier.select(tokens).len(), 2);
    }

    #[test]
    fn test_statistics() {
        let classifier = DifficultyClassifier::new(tables(), config());
        let assessments: Vec<_> = ["ephemeral", "beauty", "glimmer", "zyzzyva"]
            .iter()
            .map(|w| classifier.assess(&token(w, PartOfSpeech::Noun)))
            .collect();
        let stats = classifier.statistics(&assessments);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.difficult, 2);
        assert_eq!(stats.flagged_by_cefr, 1);
        assert_eq!(stats.flagged_by_frequency, 1);
        assert_eq!(stats.unknown, 1);
    }
}
