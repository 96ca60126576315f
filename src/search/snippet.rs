//! Snippet building
//!
//! A snippet is a window of page text around the densest cluster of query
//! words, with matched words wrapped in `<b>..</b>`.

use crate::lemma::{tokenize, Lemmatizer};
use std::collections::HashSet;

/// Words shown before the first match of the chosen window
const LEAD_IN_WORDS: usize = 3;

const ELLIPSIS: &str = "...";

fn escape(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

/// Builds snippets for one query
pub struct SnippetBuilder<'a> {
    lemmatizer: &'a Lemmatizer,
    lemmas: &'a HashSet<String>,
    words: usize,
}

impl<'a> SnippetBuilder<'a> {
    /// # Arguments
    ///
    /// * `lemmatizer` - Lemmatizer used for the query
    /// * `lemmas` - The query's lemmas
    /// * `words` - Snippet length in words
    pub fn new(lemmatizer: &'a Lemmatizer, lemmas: &'a HashSet<String>, words: usize) -> Self {
        Self {
            lemmatizer,
            lemmas,
            words: words.max(1),
        }
    }

    fn is_match(&self, token: &str) -> bool {
        self.lemmatizer
            .lemma_of(token)
            .is_some_and(|lemma| self.lemmas.contains(&lemma))
    }

    /// Builds the snippet for a page's text
    pub fn build(&self, text: &str) -> String {
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return String::new();
        }

        let matches: Vec<bool> = words
            .iter()
            .map(|word| tokenize(word).any(|(_, token)| self.is_match(token)))
            .collect();

        let start = self.window_start(&matches);
        let end = (start + self.words).min(words.len());

        let mut snippet = String::new();
        if start > 0 {
            snippet.push_str(ELLIPSIS);
            snippet.push(' ');
        }
        for (i, word) in words[start..end].iter().enumerate() {
            if i > 0 {
                snippet.push(' ');
            }
            if matches[start + i] {
                self.highlight(word, &mut snippet);
            } else {
                escape(word, &mut snippet);
            }
        }
        if end < words.len() {
            snippet.push(' ');
            snippet.push_str(ELLIPSIS);
        }

        snippet
    }

    /// Start of the window with the most matches (earliest on ties),
    /// moved up to a few words before that window's first match
    fn window_start(&self, matches: &[bool]) -> usize {
        let window = self.words.min(matches.len());

        let mut count = matches[..window].iter().filter(|m| **m).count();
        let (mut best_start, mut best_count) = (0, count);
        for start in 1..=matches.len() - window {
            if matches[start - 1] {
                count -= 1;
            }
            if matches[start + window - 1] {
                count += 1;
            }
            if count > best_count {
                best_start = start;
                best_count = count;
            }
        }

        if best_count == 0 {
            return 0;
        }
        let first_match = matches[best_start..]
            .iter()
            .position(|m| *m)
            .map_or(best_start, |offset| best_start + offset);
        first_match.saturating_sub(LEAD_IN_WORDS)
    }

    /// Wraps the matching alphabetic runs of a word in `<b>..</b>`
    fn highlight(&self, word: &str, out: &mut String) {
        let mut last = 0;
        for (offset, token) in tokenize(word) {
            if !self.is_match(token) {
                continue;
            }
            escape(&word[last..offset], out);
            out.push_str("<b>");
            escape(token, out);
            out.push_str("</b>");
            last = offset + token.len();
        }
        escape(&word[last..], out);
    }
}
