use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::difficulty::CefrLevel;
use crate::error::{Result, RubigeneError};
use crate::subtitle::{AssLayout, MalformedBlockPolicy};
use crate::tokenize::PartOfSpeech;
use crate::translate::RetryPolicy;

/// File looked up in the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "rubigene.toml";

fn default_first_occurrence_only() -> bool {
    true
}

fn default_min_token_length() -> usize {
    2
}

fn default_source_language() -> String {
    "EN".to_string()
}

fn default_min_request_interval_ms() -> u64 {
    50
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_output_suffix() -> String {
    "_ruby".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub difficulty: DifficultyConfig,
    #[serde(default)]
    pub tokenize: TokenizeConfig,
    #[serde(default)]
    pub translate: TranslateConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DifficultyConfig {
    /// NGSL level at or above which a word is difficult (1..=3)
    pub ngsl_threshold: u8,
    /// CEFR level at or above which a word is difficult
    pub cefr_threshold: CefrLevel,
    /// Frequency rank above which a word is difficult (lower rank = more common)
    pub frequency_threshold: u32,
    /// Parts of speech eligible for annotation
    pub pos_filter: Vec<PartOfSpeech>,
    /// Never annotate proper nouns
    pub exclude_proper_nouns: bool,
    /// Annotate a lemma only at its first occurrence within a cue
    #[serde(default = "default_first_occurrence_only")]
    pub first_occurrence_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenizeConfig {
    /// Words shorter than this (in characters) are never classified
    #[serde(default = "default_min_token_length")]
    pub min_token_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslateConfig {
    /// Gloss language (DeepL target code, e.g. "ja")
    pub target_language: String,
    /// Language of the subtitles
    #[serde(default = "default_source_language")]
    pub source_language: String,
    /// Translation service key; RUBIGENE_API_KEY overrides it on the command line
    #[serde(default)]
    pub api_key: String,
    /// Use the paid DeepL endpoint
    #[serde(default)]
    pub use_pro_api: bool,
    /// Directory holding one JSON file per cached gloss
    pub cache_dir: PathBuf,
    /// Upper bound on concurrent lemma resolutions
    pub max_concurrent_requests: usize,
    /// Minimum gap between two requests to the service
    #[serde(default = "default_min_request_interval_ms")]
    pub min_request_interval_ms: u64,
    /// Timeout of a single HTTP request
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// NGSL graded list (`word,level`)
    pub ngsl_path: PathBuf,
    /// CEFR list (`word,level` with A1..C2)
    pub cefr_path: PathBuf,
    /// Frequency ranks (`{"word": rank}`)
    pub frequency_path: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputConfig {
    /// Blocks with a bad index or no text: skip (with a warning) or abort
    #[serde(default)]
    pub on_malformed_block: MalformedBlockPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    #[serde(default)]
    pub layout: AssLayout,
    pub video_width: u32,
    pub video_height: u32,
    pub font_name: String,
    pub font_size: u32,
    pub ruby_font_size: u32,
    /// Appended to the input stem when batch processing
    #[serde(default = "default_output_suffix")]
    pub output_suffix: String,
    /// Write `<output>.report.json` next to each output file
    #[serde(default)]
    pub write_report: bool,
}

impl Default for DifficultyConfig {
    fn default() -> Self {
        Self {
            ngsl_threshold: 3,
            cefr_threshold: CefrLevel::B1,
            frequency_threshold: 3000,
            pos_filter: vec![PartOfSpeech::Noun, PartOfSpeech::Verb],
            exclude_proper_nouns: false,
            first_occurrence_only: true,
        }
    }
}

impl Default for TokenizeConfig {
    fn default() -> Self {
        Self {
            min_token_length: default_min_token_length(),
        }
    }
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            target_language: "ja".to_string(),
            source_language: default_source_language(),
            api_key: String::new(),
            use_pro_api: false,
            cache_dir: PathBuf::from(".rubigene/cache/translations"),
            max_concurrent_requests: 4,
            min_request_interval_ms: default_min_request_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            retry: RetryPolicy::default(),
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            ngsl_path: PathBuf::from("data/ngsl.csv"),
            cefr_path: PathBuf::from("data/cefr.csv"),
            frequency_path: PathBuf::from("data/frequency.json"),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            layout: AssLayout::default(),
            video_width: 1920,
            video_height: 1080,
            font_name: "Arial".to_string(),
            font_size: 52,
            ruby_font_size: 26,
            output_suffix: default_output_suffix(),
            write_report: false,
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RubigeneError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| RubigeneError::Config(format!("Failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| RubigeneError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| RubigeneError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Write the default configuration to `path`. An existing file is only
    /// replaced with `force`, and its contents are never read.
    pub fn write_default<P: AsRef<Path>>(path: P, force: bool) -> Result<()> {
        let path = path.as_ref();
        if path.exists() && !force {
            return Err(RubigeneError::Config(format!(
                "{} already exists (use --force to overwrite)",
                path.display()
            )));
        }
        Self::default().save_to_file(path)
    }

    /// `--config` if given, else `./rubigene.toml` when present, else defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(DEFAULT_CONFIG_FILE),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let difficulty = &self.difficulty;
        if !(1..=3).contains(&difficulty.ngsl_threshold) {
            return Err(RubigeneError::Config(format!(
                "difficulty.ngsl_threshold must be between 1 and 3, got {}",
                difficulty.ngsl_threshold
            )));
        }
        if difficulty.frequency_threshold == 0 {
            return Err(RubigeneError::Config(
                "difficulty.frequency_threshold must be positive".to_string(),
            ));
        }
        if difficulty.pos_filter.is_empty() {
            return Err(RubigeneError::Config(
                "difficulty.pos_filter must name at least one part of speech".to_string(),
            ));
        }
        if let Some(pos) = difficulty.pos_filter.iter().find(|pos| !pos.is_content_word()) {
            return Err(RubigeneError::Config(format!(
                "difficulty.pos_filter only accepts noun, verb, adjective and adverb, got {:?}",
                pos
            )));
        }
        if self.translate.target_language.trim().is_empty() {
            return Err(RubigeneError::Config(
                "translate.target_language must not be empty".to_string(),
            ));
        }
        if self.translate.max_concurrent_requests == 0 {
            return Err(RubigeneError::Config(
                "translate.max_concurrent_requests must be at least 1".to_string(),
            ));
        }
        if self.translate.retry.max_attempts == 0 {
            return Err(RubigeneError::Config(
                "translate.retry.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The configured API key, or a fatal error when none was supplied.
    pub fn require_api_key(&self) -> Result<&str> {
        let key = self.translate.api_key.trim();
        if key.is_empty() {
            return Err(RubigeneError::Config(
                "no translation API key: set translate.api_key or RUBIGENE_API_KEY".to_string(),
            ));
        }
        Ok(key)
    }
}
