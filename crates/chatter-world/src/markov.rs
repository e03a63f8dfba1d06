//! Backoff Markov text source for growing plants.
//!
//! The source keeps two transition tables built from a corpus: a unigram
//! table keyed by the previous word and a bigram table keyed by the two
//! previous words. [`MarkovSource::chain`] prefers the bigram, backs off to
//! the unigram (also taken at random two times in seven to keep output
//! varied), and finally to the *starter* pool: capitalised words that are
//! not all-caps acronyms.

use std::collections::BTreeMap;
use std::path::Path;

use rand::Rng;
use regex::Regex;
use tracing::info;

use crate::WorldError;

/// Separators between corpus tokens: whitespace, digits and the usual
/// sentence punctuation, including typographic quotes and dashes.
const TOKEN_SPLIT: &str = r#"[\s_"\-,.!?“”—0-9]+"#;

/// Built-in corpus used when a world has no corpus file.
pub const DEFAULT_CORPUS: &str = include_str!("../corpus/default.txt");

/// Odds (out of [`BACKOFF_DENOMINATOR`]) of skipping the bigram table.
const BACKOFF_NUMERATOR: u32 = 2;
const BACKOFF_DENOMINATOR: u32 = 7;

/// Key of the starter pool in both tables.
const STARTERS: &str = "";

/// Weighted multiset of words that followed some context.
#[derive(Debug, Clone, Default)]
struct Followers {
    counts: BTreeMap<String, u32>,
    total: u32,
}

impl Followers {
    fn record(&mut self, word: &str) {
        let count = self.counts.entry(word.to_owned()).or_insert(0);
        *count = count.saturating_add(1);
        self.total = self.total.saturating_add(1);
    }

    /// Pick a word with probability proportional to its count.
    fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&str> {
        if self.total == 0 {
            return None;
        }
        let mut roll = rng.random_range(0..self.total);
        for (word, count) in &self.counts {
            if roll < *count {
                return Some(word);
            }
            roll = roll.saturating_sub(*count);
        }
        None
    }
}

/// Word transition tables.
#[derive(Debug, Clone, Default)]
pub struct MarkovSource {
    unigrams: BTreeMap<String, Followers>,
    bigrams: BTreeMap<String, Followers>,
}

impl MarkovSource {
    /// An empty source. [`chain`](Self::chain) always returns `""`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a source from corpus text.
    pub fn from_text(text: &str) -> Result<Self, WorldError> {
        let mut source = Self::new();
        source.ingest(text)?;
        Ok(source)
    }

    /// Build a source from a UTF-8 corpus file.
    pub fn from_file(path: &Path) -> Result<Self, WorldError> {
        let text = std::fs::read_to_string(path)?;
        let source = Self::from_text(&text)?;
        info!(
            path = %path.display(),
            contexts = source.unigrams.len(),
            starters = source.starter_count(),
            "loaded markov corpus"
        );
        Ok(source)
    }

    /// Build a source from the built-in corpus.
    pub fn from_default_corpus() -> Result<Self, WorldError> {
        Self::from_text(DEFAULT_CORPUS)
    }

    /// Add every transition in `text` to the tables.
    ///
    /// Context carries across lines, so a corpus may be fed in pieces.
    pub fn ingest(&mut self, text: &str) -> Result<(), WorldError> {
        let splitter = Regex::new(TOKEN_SPLIT)?;
        let mut last = String::new();
        let mut last_last = String::new();

        for raw in splitter.split(text) {
            let word = raw.trim_matches(|c: char| c.is_ascii_punctuation());
            if word.is_empty() {
                continue;
            }

            self.unigrams.entry(last.clone()).or_default().record(word);
            self.bigrams
                .entry(bigram_key(&last_last, &last))
                .or_default()
                .record(word);

            if is_starter(word) {
                self.unigrams.entry(STARTERS.to_owned()).or_default().record(word);
                self.bigrams.entry(STARTERS.to_owned()).or_default().record(word);
            }

            last_last = std::mem::replace(&mut last, word.to_owned());
        }
        Ok(())
    }

    /// Next word after `current`, given the word before it.
    ///
    /// Passing `("", "")` draws from the starter pool. Returns `""` only
    /// if the source is empty.
    pub fn chain<R: Rng + ?Sized>(&self, current: &str, previous: &str, rng: &mut R) -> String {
        let from_bigram = self
            .bigrams
            .get(&bigram_key(previous, current))
            .and_then(|f| f.pick(rng));

        let word = match from_bigram {
            Some(word) if rng.random_range(0..BACKOFF_DENOMINATOR) >= BACKOFF_NUMERATOR => Some(word),
            _ => self.unigrams.get(current).and_then(|f| f.pick(rng)),
        };

        word.or_else(|| self.unigrams.get(STARTERS).and_then(|f| f.pick(rng)))
            .unwrap_or_default()
            .to_owned()
    }

    /// Number of distinct starter words.
    pub fn starter_count(&self) -> usize {
        self.unigrams.get(STARTERS).map_or(0, |f| f.counts.len())
    }

    /// Whether nothing has been ingested.
    pub fn is_empty(&self) -> bool {
        self.unigrams.is_empty()
    }
}

fn bigram_key(previous: &str, current: &str) -> String {
    if previous.is_empty() {
        current.to_owned()
    } else {
        format!("{previous} {current}")
    }
}

/// Capitalised, and not an all-caps run like "NASA".
fn is_starter(word: &str) -> bool {
    let mut chars = word.chars();
    chars.next().is_some_and(char::is_uppercase) && chars.next().is_none_or(|c| !c.is_uppercase())
}
