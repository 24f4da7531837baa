use regex::Regex;

use super::{LinguisticModel, PartOfSpeech, Span, Token};

const PRONOUNS: &[&str] = &[
    "i", "me", "my", "mine", "myself", "you", "your", "yours", "yourself", "yourselves", "he",
    "him", "his", "himself", "she", "her", "hers", "herself", "it", "its", "itself", "we", "us",
    "our", "ours", "ourselves", "they", "them", "their", "theirs", "themselves", "who", "whom",
    "whose", "what", "which", "someone", "somebody", "something", "anyone", "anybody",
    "anything", "everyone", "everybody", "everything", "nobody", "nothing", "none",
];

const DETERMINERS: &[&str] = &[
    "the", "a", "an", "this", "that", "these", "those", "some", "any", "each", "every", "no",
    "another", "either", "neither", "all", "both", "such", "much", "many", "few", "several",
];

const ADPOSITIONS: &[&str] = &[
    "of", "in", "on", "at", "by", "for", "with", "about", "against", "between", "into",
    "through", "during", "before", "after", "above", "below", "from", "up", "down", "out",
    "off", "over", "under", "around", "among", "across", "behind", "beyond", "near", "since",
    "toward", "towards", "upon", "within", "without", "along", "despite", "except", "inside",
    "outside", "past", "per", "via", "than", "like",
];

const CONJUNCTIONS: &[&str] = &[
    "and", "or", "but", "nor", "so", "yet", "because", "although", "though", "if", "unless",
    "while", "whereas", "whether", "until", "when", "where", "once",
];

const AUXILIARIES: &[&str] = &[
    "be", "am", "is", "are", "was", "were", "been", "being", "have", "has", "had", "having",
    "do", "does", "did", "will", "would", "shall", "should", "can", "could", "may", "might",
    "must", "ought", "i'm", "you're", "he's", "she's", "it's", "we're", "they're", "that's",
    "there's", "i've", "you've", "we've", "they've", "i'll", "you'll", "he'll", "she'll",
    "we'll", "they'll", "i'd", "you'd", "he'd", "she'd", "we'd", "they'd", "don't", "doesn't",
    "didn't", "won't", "wouldn't", "can't", "couldn't", "shouldn't", "isn't", "aren't",
    "wasn't", "weren't", "haven't", "hasn't", "hadn't", "mustn't", "let's",
];

const PARTICLES: &[&str] = &["not", "to"];

const INTERJECTIONS: &[&str] = &[
    "oh", "ah", "uh", "um", "hey", "hi", "hello", "wow", "yes", "yeah", "okay", "ok", "oops",
    "huh", "hmm", "bye", "please",
];

const NUMERALS: &[&str] = &[
    "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten", "eleven",
    "twelve", "twenty", "hundred", "thousand", "million",
];

const COMMON_ADVERBS: &[&str] = &[
    "very", "too", "also", "just", "now", "then", "here", "there", "always", "never", "often",
    "soon", "still", "again", "ever", "even", "only", "almost", "quite", "rather", "perhaps",
    "maybe", "away", "back", "today", "tomorrow", "yesterday", "tonight", "well", "later",
    "instead", "together", "already", "else", "everywhere", "somewhere", "anywhere",
    "nowhere", "how", "why",
];

/// Words after which the next open-class word is read as a verb
const VERB_TRIGGERS: &[&str] = &[
    "i", "you", "we", "they", "he", "she", "it", "to", "will", "would", "can", "could",
    "should", "must", "might", "may", "shall", "don't", "didn't", "doesn't", "won't",
    "can't", "couldn't", "wouldn't", "shouldn't", "let's", "please",
];

const LY_NOUNS: &[&str] = &[
    "family", "supply", "reply", "ally", "belly", "jelly", "rally", "bully", "lily",
    "butterfly", "assembly", "monopoly", "anomaly", "fly", "july", "italy",
];

const LY_ADJECTIVES: &[&str] = &[
    "holy", "ugly", "lonely", "lovely", "friendly", "likely", "unlikely", "silly", "early",
    "daily", "costly", "deadly", "elderly", "lively", "worldly", "orderly", "cowardly",
    "curly", "chilly", "jolly",
];

const AL_NOUNS: &[&str] = &[
    "animal", "signal", "journal", "arrival", "proposal", "approval", "festival", "hospital",
    "capital", "crystal", "interval", "rival", "ritual", "material", "terminal", "survival",
    "denial", "trial", "funeral", "general", "principal", "criminal", "official", "original",
];

const IC_NOUNS: &[&str] = &[
    "music", "magic", "topic", "logic", "traffic", "panic", "picnic", "clinic", "fabric",
    "critic", "mechanic", "republic", "arithmetic", "rhetoric", "mosaic", "attic", "tunic",
];

const IVE_NOUNS: &[&str] = &[
    "olive", "detective", "executive", "relative", "objective", "motive", "archive",
    "representative", "initiative", "incentive", "perspective", "directive", "native",
];

const IVE_VERBS: &[&str] = &[
    "arrive", "survive", "derive", "thrive", "strive", "revive", "deprive", "forgive",
    "contrive",
];

const ISH_VERBS: &[&str] = &[
    "finish", "publish", "punish", "establish", "polish", "banish", "vanish", "cherish",
    "flourish", "nourish", "perish", "relish", "accomplish", "abolish", "demolish",
    "diminish", "distinguish", "extinguish", "astonish",
];

const ADJECTIVE_SUFFIXES: &[&str] = &["ous", "ful", "able", "ible", "ical", "less"];

const IRREGULAR_VERBS: &[(&str, &str)] = &[
    ("went", "go"), ("gone", "go"), ("ran", "run"), ("saw", "see"), ("seen", "see"),
    ("made", "make"), ("said", "say"), ("took", "take"), ("taken", "take"), ("got", "get"),
    ("gotten", "get"), ("came", "come"), ("knew", "know"), ("known", "know"),
    ("thought", "think"), ("gave", "give"), ("given", "give"), ("found", "find"),
    ("told", "tell"), ("felt", "feel"), ("kept", "keep"), ("brought", "bring"),
    ("began", "begin"), ("begun", "begin"), ("wrote", "write"), ("written", "write"),
    ("stood", "stand"), ("heard", "hear"), ("meant", "mean"), ("met", "meet"), ("paid", "pay"),
    ("sat", "sit"), ("spoke", "speak"), ("spoken", "speak"), ("bought", "buy"),
    ("caught", "catch"), ("taught", "teach"), ("fought", "fight"), ("sought", "seek"),
    ("held", "hold"), ("lost", "lose"), ("built", "build"), ("sent", "send"),
    ("spent", "spend"), ("fell", "fall"), ("fallen", "fall"), ("grew", "grow"),
    ("grown", "grow"), ("drew", "draw"), ("drawn", "draw"), ("flew", "fly"), ("flown", "fly"),
    ("threw", "throw"), ("thrown", "throw"), ("wore", "wear"), ("worn", "wear"),
    ("broke", "break"), ("broken", "break"), ("chose", "choose"), ("chosen", "choose"),
    ("forgot", "forget"), ("forgotten", "forget"), ("ate", "eat"), ("eaten", "eat"),
    ("drank", "drink"), ("sang", "sing"), ("sung", "sing"), ("swam", "swim"),
    ("rode", "ride"), ("ridden", "ride"), ("rose", "rise"), ("risen", "rise"),
    ("drove", "drive"), ("driven", "drive"), ("hid", "hide"), ("hidden", "hide"),
    ("shook", "shake"), ("woke", "wake"), ("understood", "understand"),
];

const IRREGULAR_NOUNS: &[(&str, &str)] = &[
    ("children", "child"), ("men", "man"), ("women", "woman"), ("people", "person"),
    ("mice", "mouse"), ("feet", "foot"), ("teeth", "tooth"), ("geese", "goose"),
    ("lives", "life"), ("wives", "wife"), ("knives", "knife"), ("leaves", "leaf"),
    ("wolves", "wolf"), ("thieves", "thief"), ("halves", "half"),
];

/// Deterministic English model built from word lists and suffix rules.
///
/// Words are runs of letters with optional internal apostrophes or hyphens,
/// so "don't" and "well-known" stay single tokens. Capitalized words that do
/// not start a sentence are treated as proper nouns.
pub struct RuleBasedModel {
    word_pattern: Regex,
}

impl RuleBasedModel {
    pub const VERSION: &'static str = "rule-based/1";

    pub fn new() -> Self {
        Self {
            word_pattern: Regex::new(r"\p{L}+(?:['’-]\p{L}+)*")
                .expect("word pattern is a valid regex"),
        }
    }
}

impl Default for RuleBasedModel {
    fn default() -> Self {
        Self::new()
    }
}

impl LinguisticModel for RuleBasedModel {
    fn version(&self) -> &str {
        Self::VERSION
    }

    fn analyze(&self, text: &str) -> Vec<Token> {
        let mut tokens: Vec<Token> = Vec::new();
        let mut previous_end = 0;
        let mut previous_lower: Option<String> = None;

        for m in self.word_pattern.find_iter(text) {
            let surface = m.as_str();
            let lower = surface.to_lowercase().replace('’', "'");
            let sentence_start =
                tokens.is_empty() || text[previous_end..m.start()].contains(['.', '!', '?']);

            let (pos, is_proper_noun) =
                classify_word(surface, &lower, previous_lower.as_deref(), sentence_start);
            let lemma = lemmatize(&lower, pos);

            tokens.push(Token {
                surface: surface.to_string(),
                lemma,
                pos,
                span: Span::new(m.start(), m.end()),
                is_proper_noun,
            });

            previous_end = m.end();
            previous_lower = Some(lower);
        }

        tokens
    }
}

fn classify_word(
    surface: &str,
    lower: &str,
    previous: Option<&str>,
    sentence_start: bool,
) -> (PartOfSpeech, bool) {
    let closed_class = [
        (PRONOUNS, PartOfSpeech::Pronoun),
        (DETERMINERS, PartOfSpeech::Determiner),
        (AUXILIARIES, PartOfSpeech::Auxiliary),
        (PARTICLES, PartOfSpeech::Particle),
        (ADPOSITIONS, PartOfSpeech::Adposition),
        (CONJUNCTIONS, PartOfSpeech::Conjunction),
        (INTERJECTIONS, PartOfSpeech::Interjection),
        (NUMERALS, PartOfSpeech::Numeral),
        (COMMON_ADVERBS, PartOfSpeech::Adverb),
    ];
    for (list, pos) in closed_class {
        if list.contains(&lower) {
            return (pos, false);
        }
    }

    let starts_upper = surface.chars().next().is_some_and(char::is_uppercase);
    if starts_upper && !sentence_start {
        return (PartOfSpeech::Noun, true);
    }

    let after_determiner = previous.is_some_and(|p| {
        DETERMINERS.contains(&p) || matches!(p, "my" | "your" | "his" | "her" | "its" | "our" | "their")
    });

    if let Some(pos) = suffix_class(lower) {
        if !(after_determiner && pos == PartOfSpeech::Verb) {
            return (pos, false);
        }
    }

    if after_determiner {
        return (PartOfSpeech::Noun, false);
    }

    if IRREGULAR_VERBS.iter().any(|(form, _)| *form == lower)
        || previous.is_some_and(|p| VERB_TRIGGERS.contains(&p))
    {
        return (PartOfSpeech::Verb, false);
    }

    (PartOfSpeech::Noun, false)
}

fn suffix_class(word: &str) -> Option<PartOfSpeech> {
    let len = word.chars().count();

    if word.ends_with("ly") {
        if LY_NOUNS.contains(&word) {
            return Some(PartOfSpeech::Noun);
        }
        if LY_ADJECTIVES.contains(&word) {
            return Some(PartOfSpeech::Adjective);
        }
        if matches!(word, "apply" | "reply" | "supply") {
            return Some(PartOfSpeech::Verb);
        }
        return Some(PartOfSpeech::Adverb);
    }

    if ADJECTIVE_SUFFIXES.iter().any(|suffix| word.ends_with(suffix)) && len >= 5 {
        return Some(PartOfSpeech::Adjective);
    }
    if word.ends_with("al") && len >= 6 && !AL_NOUNS.contains(&word) {
        return Some(PartOfSpeech::Adjective);
    }
    if word.ends_with("ic") && len >= 5 && !IC_NOUNS.contains(&word) {
        return Some(PartOfSpeech::Adjective);
    }
    if word.ends_with("ive") && !word.ends_with("eive") && len >= 6 {
        if IVE_VERBS.contains(&word) {
            return Some(PartOfSpeech::Verb);
        }
        if !IVE_NOUNS.contains(&word) {
            return Some(PartOfSpeech::Adjective);
        }
    }
    if word.ends_with("ish") && len >= 6 {
        if ISH_VERBS.contains(&word) {
            return Some(PartOfSpeech::Verb);
        }
        return Some(PartOfSpeech::Adjective);
    }
    if (word.ends_with("ing") && len >= 5) || (word.ends_with("ed") && !word.ends_with("eed") && len >= 4) {
        return Some(PartOfSpeech::Verb);
    }

    None
}

fn lemmatize(lower: &str, pos: PartOfSpeech) -> String {
    let word = lower
        .strip_suffix("'s")
        .filter(|stem| !stem.is_empty())
        .unwrap_or(lower);

    match pos {
        PartOfSpeech::Verb => IRREGULAR_VERBS
            .iter()
            .find(|(form, _)| *form == word)
            .map(|(_, lemma)| lemma.to_string())
            .unwrap_or_else(|| verb_lemma(word)),
        PartOfSpeech::Noun => IRREGULAR_NOUNS
            .iter()
            .find(|(form, _)| *form == word)
            .map(|(_, lemma)| lemma.to_string())
            .unwrap_or_else(|| noun_lemma(word)),
        _ => word.to_string(),
    }
}

fn noun_lemma(word: &str) -> String {
    let len = word.len();
    if word.ends_with("ies") && len > 4 {
        return format!("{}y", &word[..len - 3]);
    }
    if ["sses", "ches", "shes", "xes", "zzes"].iter().any(|s| word.ends_with(s)) {
        return word[..len - 2].to_string();
    }
    if word.ends_with('s') && !["ss", "us", "is"].iter().any(|s| word.ends_with(s)) && len > 3 {
        return word[..len - 1].to_string();
    }
    word.to_string()
}

fn verb_lemma(word: &str) -> String {
    let len = word.len();
    if (word.ends_with("ies") || word.ends_with("ied")) && len > 4 {
        return format!("{}y", &word[..len - 3]);
    }
    if word.ends_with("ing") && len > 4 {
        return restore_stem(word, &word[..len - 3]);
    }
    if word.ends_with("ed") && !word.ends_with("eed") && len > 3 {
        return restore_stem(word, &word[..len - 2]);
    }
    if ["sses", "ches", "shes", "xes", "zes"].iter().any(|s| word.ends_with(s)) {
        return word[..len - 2].to_string();
    }
    if word.ends_with('s') && !word.ends_with("ss") && len > 3 {
        return word[..len - 1].to_string();
    }
    word.to_string()
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')
}

/// Undo the spelling changes English applies before -ing / -ed.
fn restore_stem(word: &str, stem: &str) -> String {
    let chars: Vec<char> = stem.chars().collect();
    if !chars.iter().any(|&c| is_vowel(c) || c == 'y') {
        return word.to_string();
    }

    let n = chars.len();
    let last = chars[n - 1];

    // stopped -> stop, running -> run
    if n >= 3 && chars[n - 2] == last && !is_vowel(last) && !matches!(last, 'l' | 's' | 'z' | 'f') {
        return chars[..n - 1].iter().collect();
    }

    let needs_e = matches!(last, 'v' | 'c' | 'z')
        || stem.ends_with("dg")
        || stem.ends_with("rg")
        || stem.ends_with("ir")
        || stem.ends_with("ur")
        || (n >= 3 && stem.ends_with("at") && !is_vowel(chars[n - 3]))
        || (n <= 4 && stem.ends_with("us"))
        || (n >= 2 && last == 'l' && !is_vowel(chars[n - 2]) && chars[n - 2] != 'l')
        || (n == 3 && !is_vowel(chars[0]) && is_vowel(chars[1]) && !is_vowel(last) && !matches!(last, 'w' | 'x' | 'y'));

    if needs_e {
        format!("{}e", stem)
    } else {
        stem.to_string()
    }
}
