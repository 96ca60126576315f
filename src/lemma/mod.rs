//! Lemma module for lemma-search
//!
//! Reduces words to normalized roots (lemmas), the unit the inverted index
//! is keyed by. English and Russian words are reduced with Snowball
//! stemmers (`rust-stemmers`); anything else is only lowercased.

mod lemmatizer;
mod stop_words;

// Re-export main types
pub use lemmatizer::{tokenize, Lemmatizer};
