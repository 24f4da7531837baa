use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

use crate::config::DataConfig;
use crate::error::{Result, RubigeneError};

/// CEFR proficiency level, ordered from easiest to hardest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CefrLevel {
    A1,
    A2,
    B1,
    B2,
    C1,
    C2,
}

impl FromStr for CefrLevel {
    type Err = RubigeneError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "A1" => Ok(Self::A1),
            "A2" => Ok(Self::A2),
            "B1" => Ok(Self::B1),
            "B2" => Ok(Self::B2),
            "C1" => Ok(Self::C1),
            "C2" => Ok(Self::C2),
            other => Err(RubigeneError::LookupTable(format!("unknown CEFR level '{}'", other))),
        }
    }
}

impl fmt::Display for CefrLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Result of a table lookup. Absence is an answer, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

impl<T> Lookup<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::NotFound => None,
        }
    }

    fn or_else(self, f: impl FnOnce() -> Lookup<T>) -> Lookup<T> {
        match self {
            Lookup::Found(value) => Lookup::Found(value),
            Lookup::NotFound => f(),
        }
    }
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Lookup::Found(value),
            None => Lookup::NotFound,
        }
    }
}

/// Read-only word lists shared by every classification worker.
///
/// Keys are stored lowercase; every lookup tries the lemma first and then
/// the surface form.
#[derive(Debug, Clone, Default)]
pub struct LookupTables {
    ngsl: HashMap<String, u8>,
    cefr: HashMap<String, CefrLevel>,
    frequency: HashMap<String, u32>,
}

impl LookupTables {
    pub fn new(
        ngsl: HashMap<String, u8>,
        cefr: HashMap<String, CefrLevel>,
        frequency: HashMap<String, u32>,
    ) -> Self {
        fn lower<V>(map: HashMap<String, V>) -> HashMap<String, V> {
            map.into_iter().map(|(k, v)| (k.trim().to_lowercase(), v)).collect()
        }

        Self {
            ngsl: lower(ngsl),
            cefr: lower(cefr),
            frequency: lower(frequency),
        }
    }

    /// Load all three tables. A missing or empty table is fatal.
    pub fn load(data: &DataConfig) -> Result<Self> {
        let ngsl = load_csv(&data.ngsl_path, "NGSL", |level| {
            level.parse::<u8>().ok().filter(|l| (1..=3).contains(l))
        })?;
        let cefr = load_csv(&data.cefr_path, "CEFR", |level| level.parse::<CefrLevel>().ok())?;
        let frequency = load_frequency(&data.frequency_path)?;

        info!(
            "Loaded lookup tables: {} NGSL, {} CEFR, {} frequency entries",
            ngsl.len(),
            cefr.len(),
            frequency.len()
        );

        Ok(Self {
            ngsl,
            cefr,
            frequency,
        })
    }

    pub fn ngsl_level(&self, lemma: &str, surface: &str) -> Lookup<u8> {
        lookup(&self.ngsl, lemma, surface)
    }

    pub fn cefr_level(&self, lemma: &str, surface: &str) -> Lookup<CefrLevel> {
        lookup(&self.cefr, lemma, surface)
    }

    /// The better (lower) rank of lemma and surface form.
    pub fn frequency_rank(&self, lemma: &str, surface: &str) -> Lookup<u32> {
        let by_lemma = self.frequency.get(&lemma.to_lowercase()).copied();
        let by_surface = self.frequency.get(&surface.to_lowercase()).copied();
        match (by_lemma, by_surface) {
            (Some(a), Some(b)) => Lookup::Found(a.min(b)),
            (a, b) => a.or(b).into(),
        }
    }

    /// Entry counts as (ngsl, cefr, frequency)
    pub fn sizes(&self) -> (usize, usize, usize) {
        (self.ngsl.len(), self.cefr.len(), self.frequency.len())
    }
}

fn lookup<V: Copy>(map: &HashMap<String, V>, lemma: &str, surface: &str) -> Lookup<V> {
    Lookup::from(map.get(&lemma.to_lowercase()).copied())
        .or_else(|| map.get(&surface.to_lowercase()).copied().into())
}

fn read_table(path: &Path, name: &str) -> Result<String> {
    if !path.exists() {
        return Err(RubigeneError::LookupTable(format!(
            "{} table not found at {}",
            name,
            path.display()
        )));
    }
    std::fs::read_to_string(path).map_err(|e| {
        RubigeneError::LookupTable(format!("failed to read {} table {}: {}", name, path.display(), e))
    })
}

/// `word,level` rows. A header row, blank lines and unparseable levels are skipped.
fn load_csv<V>(path: &Path, name: &str, parse_level: impl Fn(&str) -> Option<V>) -> Result<HashMap<String, V>> {
    let content = read_table(path, name)?;
    let content = content.strip_prefix('\u{feff}').unwrap_or(&content);

    let mut table = HashMap::new();
    let mut skipped = 0usize;

    for line in content.lines() {
        let mut fields = line.split(',').map(|f| f.trim().trim_matches('"'));
        let (Some(word), Some(level)) = (fields.next(), fields.next()) else {
            continue;
        };
        if word.is_empty() || word.eq_ignore_ascii_case("word") {
            continue;
        }
        match parse_level(level) {
            Some(level) => {
                table.insert(word.to_lowercase(), level);
            }
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        debug!("Skipped {} {} rows with unknown levels", skipped, name);
    }
    if table.is_empty() {
        return Err(RubigeneError::LookupTable(format!(
            "{} table {} contains no entries",
            name,
            path.display()
        )));
    }
    Ok(table)
}

fn load_frequency(path: &Path) -> Result<HashMap<String, u32>> {
    let content = read_table(path, "frequency")?;
    let raw: HashMap<String, u32> = serde_json::from_str(&content).map_err(|e| {
        RubigeneError::LookupTable(format!("frequency table {} is not valid: {}", path.display(), e))
    })?;

    let table: HashMap<String, u32> = raw
        .into_iter()
        .filter(|(word, rank)| *rank > 0 && !word.trim().is_empty())
        .map(|(word, rank)| (word.trim().to_lowercase(), rank))
        .collect();

    if table.is_empty() {
        return Err(RubigeneError::LookupTable(format!(
            "frequency table {} contains no entries",
            path.display()
        )));
    }
    Ok(table)
}
