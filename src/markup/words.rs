// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

//! Splitting of identifiers and token texts into words.

use crate::markup::levenshtein::Comparable;

/// Priority of a word made of letters and digits only.
pub const WORD_PRIORITY: f64 = 1.0;
/// Priority of a word containing other characters (operators, punctuation).
pub const SYMBOL_PRIORITY: f64 = 0.1;

#[derive(Clone, PartialEq, Debug)]
pub struct PrioritizedWord {
    pub text: String,
    pub priority: f64,
}

impl PrioritizedWord {
    pub fn new<T: Into<String>>(text: T, priority: f64) -> Self {
        PrioritizedWord { text: text.into(), priority }
    }

    fn from_part(text: &[char]) -> Self {
        let priority = if text.iter().all(|c| c.is_alphanumeric()) { WORD_PRIORITY } else { SYMBOL_PRIORITY };
        PrioritizedWord { text: text.iter().collect(), priority }
    }
}

impl Comparable for PrioritizedWord {
    fn priority(&self) -> f64 {
        self.priority
    }

    fn same_kind(&self, other: &Self) -> bool {
        self.priority == other.priority
    }

    fn similarity(&self, other: &Self) -> f64 {
        if self.text == other.text { 1.0 } else { 0.0 }
    }
}

/// Is there a word boundary between `chars[i - 1]` and `chars[i]`?
fn is_boundary(chars: &[char], i: usize) -> bool {
    let (prev, cur) = (chars[i - 1], chars[i]);
    prev.is_lowercase() && cur.is_uppercase()
        // "HTTPServer": the last capital of a run starts a new word
        || prev.is_uppercase() && cur.is_uppercase() && chars.get(i + 1).map(|c| c.is_lowercase()).unwrap_or(false)
        || prev.is_alphanumeric() != cur.is_alphanumeric()
        || prev.is_numeric() != cur.is_numeric()
}

/// Splits `text` into words: on `_` and spaces, at the lower-to-upper case transitions, before the
/// last capital of a run of capitals followed by a lower-case letter, and between letters, digits
/// and other characters.
///
/// ```
/// # use land::markup::words::get_words;
/// let words = get_words("myHTTPServer2Config").into_iter().map(|w| w.text).collect::<Vec<_>>();
/// assert_eq!(words, vec!["my", "HTTP", "Server", "2", "Config"]);
/// ```
pub fn get_words(text: &str) -> Vec<PrioritizedWord> {
    let mut words = Vec::new();
    for part in text.split(['_', ' ']).filter(|p| !p.is_empty()) {
        let chars = part.chars().collect::<Vec<_>>();
        let mut first = 0;
        for i in 1..chars.len() {
            if is_boundary(&chars, i) {
                words.push(PrioritizedWord::from_part(&chars[first..i]));
                first = i;
            }
        }
        words.push(PrioritizedWord::from_part(&chars[first..]));
    }
    words
}
