use rust_stemmers::{Algorithm, Stemmer};
use std::collections::{HashMap, HashSet};
use std::fmt;

use super::stop_words;

/// Minimum length (in characters) of an indexable word
const MIN_WORD_CHARS: usize = 2;

/// Splits text into maximal runs of alphabetic characters
///
/// # Arguments
///
/// * `text` - The text to split
///
/// # Returns
///
/// An iterator of `(byte_offset, word)` pairs in text order
pub fn tokenize(text: &str) -> impl Iterator<Item = (usize, &str)> + '_ {
    let mut chars = text.char_indices().peekable();

    std::iter::from_fn(move || {
        while let Some(&(_, c)) = chars.peek() {
            if c.is_alphabetic() {
                break;
            }
            chars.next();
        }

        let (start, _) = *chars.peek()?;
        let mut end = start;
        while let Some(&(i, c)) = chars.peek() {
            if !c.is_alphabetic() {
                break;
            }
            end = i + c.len_utf8();
            chars.next();
        }

        Some((start, &text[start..end]))
    })
}

/// Lowercases a word and folds `ё` into `е`
fn fold_case(word: &str) -> String {
    word.chars()
        .flat_map(char::to_lowercase)
        .map(|c| if c == 'ё' { 'е' } else { c })
        .collect()
}

fn is_cyrillic(c: char) -> bool {
    matches!(c, '\u{0400}'..='\u{04FF}')
}

/// Reduces words to lemmas and counts them
///
/// ASCII words go through the English Snowball stemmer, Cyrillic words
/// through the Russian one. One instance is shared by every worker and by
/// the query engine.
pub struct Lemmatizer {
    stop_words: HashSet<&'static str>,
    english: Stemmer,
    russian: Stemmer,
}

impl Lemmatizer {
    /// Creates a lemmatizer with the English and Russian stop-word tables
    pub fn new() -> Self {
        let stop_words = stop_words::ENGLISH
            .iter()
            .chain(stop_words::RUSSIAN.iter())
            .copied()
            .collect();
        Self {
            stop_words,
            english: Stemmer::create(Algorithm::English),
            russian: Stemmer::create(Algorithm::Russian),
        }
    }

    /// Counts the lemmas of every indexable word in `text`
    ///
    /// # Arguments
    ///
    /// * `text` - Visible page text (or a search query)
    ///
    /// # Returns
    ///
    /// A map from lemma to the number of times it occurs
    pub fn lemmatize(&self, text: &str) -> HashMap<String, u32> {
        let mut counts = HashMap::new();
        for (_, word) in tokenize(text) {
            if let Some(lemma) = self.lemma_of(word) {
                *counts.entry(lemma).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Lemmatizes a single word
    ///
    /// Returns None for words that are too short or are function words.
    pub fn lemma_of(&self, word: &str) -> Option<String> {
        let word = fold_case(word);
        if word.chars().count() < MIN_WORD_CHARS || self.stop_words.contains(word.as_str()) {
            return None;
        }

        let lemma = if word.chars().all(|c| c.is_ascii_alphabetic()) {
            self.english.stem(&word).into_owned()
        } else if word.chars().all(is_cyrillic) {
            self.russian.stem(&word).into_owned()
        } else {
            word
        };
        Some(lemma)
    }
}

impl fmt::Debug for Lemmatizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lemmatizer")
            .field("stop_words", &self.stop_words.len())
            .finish_non_exhaustive()
    }
}

impl Default for Lemmatizer {
    fn default() -> Self {
        Self::new()
    }
}
