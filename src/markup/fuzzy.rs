// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

//! Context-triggered piecewise hashing (spamsum) of texts, and texts kept either verbatim or as
//! a fuzzy hash depending on their length.

use crate::markup::levenshtein::levenshtein_str;

/// Texts longer than this are hashed.
pub const MIN_TEXT_LENGTH: usize = 25;
/// Texts up to this length are kept verbatim.
pub const MAX_TEXT_LENGTH: usize = 100;

const ROLLING_WINDOW: usize = 7;
const MIN_BLOCK_SIZE: u32 = 3;
const HASH_PRIME: u32 = 0x0100_0193;
const HASH_INIT: u32 = 0x2802_1967;
const SPAMSUM_LENGTH: usize = 64;
const B64: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

#[derive(Default)]
struct RollingHash {
    window: [u8; ROLLING_WINDOW],
    h1: u32,
    h2: u32,
    h3: u32,
    n: usize,
}

impl RollingHash {
    fn update(&mut self, c: u8) -> u32 {
        let c32 = c as u32;
        self.h2 = self.h2.wrapping_sub(self.h1).wrapping_add((ROLLING_WINDOW as u32).wrapping_mul(c32));
        self.h1 = self.h1.wrapping_add(c32).wrapping_sub(self.window[self.n % ROLLING_WINDOW] as u32);
        self.window[self.n % ROLLING_WINDOW] = c;
        self.n += 1;
        self.h3 = (self.h3 << 5) ^ c32;
        self.sum()
    }

    fn sum(&self) -> u32 {
        self.h1.wrapping_add(self.h2).wrapping_add(self.h3)
    }
}

fn sum_hash(c: u8, h: u32) -> u32 {
    h.wrapping_mul(HASH_PRIME) ^ c as u32
}

/// Fuzzy hash of `data`, as `"<block size>:<signature>:<signature for the double block size>"`.
pub fn fuzzy_hash(data: &[u8]) -> String {
    let mut block_size = MIN_BLOCK_SIZE;
    while (block_size as usize) * SPAMSUM_LENGTH < data.len() {
        block_size *= 2;
    }
    loop {
        let mut roll = RollingHash::default();
        let (mut h2, mut h3) = (HASH_INIT, HASH_INIT);
        let (mut sig1, mut sig2) = (String::new(), String::new());
        for &c in data {
            h2 = sum_hash(c, h2);
            h3 = sum_hash(c, h3);
            let r = roll.update(c);
            if r % block_size == block_size - 1 {
                if sig1.len() < SPAMSUM_LENGTH - 1 {
                    sig1.push(B64[(h2 % 64) as usize] as char);
                    h2 = HASH_INIT;
                }
                if r % (block_size * 2) == block_size * 2 - 1 && sig2.len() < SPAMSUM_LENGTH / 2 - 1 {
                    sig2.push(B64[(h3 % 64) as usize] as char);
                    h3 = HASH_INIT;
                }
            }
        }
        if roll.sum() != 0 {
            sig1.push(B64[(h2 % 64) as usize] as char);
            sig2.push(B64[(h3 % 64) as usize] as char);
        }
        if block_size > MIN_BLOCK_SIZE && sig1.len() < SPAMSUM_LENGTH / 2 {
            block_size /= 2;
        } else {
            return format!("{block_size}:{sig1}:{sig2}");
        }
    }
}

/// Removes the characters repeated more than 3 times in a row, which carry little information.
fn eliminate_sequences(s: &str) -> Vec<u8> {
    let bytes = s.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    for (i, &b) in bytes.iter().enumerate() {
        if i < 3 || b != bytes[i - 1] || b != bytes[i - 2] || b != bytes[i - 3] {
            result.push(b);
        }
    }
    result
}

fn has_common_substring(s1: &[u8], s2: &[u8]) -> bool {
    s1.len() >= ROLLING_WINDOW && s2.len() >= ROLLING_WINDOW
        && s1.windows(ROLLING_WINDOW).any(|w| s2.windows(ROLLING_WINDOW).any(|v| v == w))
}

/// Edit distance where a substitution costs a removal plus an insertion.
fn edit_distance(s1: &[u8], s2: &[u8]) -> usize {
    let mut previous = (0..=s2.len()).collect::<Vec<_>>();
    let mut current = vec![0; s2.len() + 1];
    for (i, a) in s1.iter().enumerate() {
        current[0] = i + 1;
        for (j, b) in s2.iter().enumerate() {
            let change = if a == b { 0 } else { 2 };
            current[j + 1] = (previous[j + 1] + 1).min(current[j] + 1).min(previous[j] + change);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[s2.len()]
}

fn score_signatures(s1: &[u8], s2: &[u8], block_size: u32) -> u32 {
    if s1.len() > SPAMSUM_LENGTH || s2.len() > SPAMSUM_LENGTH || !has_common_substring(s1, s2) {
        return 0;
    }
    let distance = edit_distance(s1, s2) * SPAMSUM_LENGTH / (s1.len() + s2.len());
    let distance = 100 * distance / SPAMSUM_LENGTH;
    if distance >= 100 {
        return 0;
    }
    let score = (100 - distance) as u32;
    // small block sizes can't be trusted to give a high score to short signatures
    let cap_limit = (99 + ROLLING_WINDOW as u32) / ROLLING_WINDOW as u32 * MIN_BLOCK_SIZE;
    if block_size >= cap_limit {
        score
    } else {
        score.min(block_size / MIN_BLOCK_SIZE * s1.len().min(s2.len()) as u32)
    }
}

fn parse_hash(hash: &str) -> Option<(u32, &str, &str)> {
    let mut parts = hash.splitn(3, ':');
    let block_size = parts.next()?.parse().ok()?;
    Some((block_size, parts.next()?, parts.next()?))
}

/// Compares two fuzzy hashes and returns a score from 0 (no similarity) to 100 (identical).
pub fn compare_hashes(hash1: &str, hash2: &str) -> u32 {
    let (Some((bs1, a1, b1)), Some((bs2, a2, b2))) = (parse_hash(hash1), parse_hash(hash2)) else {
        return 0;
    };
    if bs1 != bs2 && bs1 != bs2 * 2 && bs2 != bs1 * 2 {
        return 0;
    }
    let (a1, b1, a2, b2) = (eliminate_sequences(a1), eliminate_sequences(b1), eliminate_sequences(a2), eliminate_sequences(b2));
    if bs1 == bs2 && a1 == a2 {
        return 100;
    }
    if bs1 == bs2 {
        score_signatures(&a1, &a2, bs1).max(score_signatures(&b1, &b2, bs1 * 2))
    } else if bs1 == bs2 * 2 {
        score_signatures(&a1, &b2, bs1)
    } else {
        score_signatures(&b1, &a2, bs2)
    }
}

// ---------------------------------------------------------------------------------------------

/// Text normalized for the comparison: lower case, without whitespace. It's kept verbatim when
/// it's short enough, and hashed when it's long enough; texts of intermediate length have both.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct TextOrHash {
    pub text: Option<String>,
    /// length of the normalized text, in characters
    pub text_length: usize,
    pub hash: Option<String>,
}

impl TextOrHash {
    pub fn new(text: &str) -> Self {
        TextOrHash::with_limits(text, MIN_TEXT_LENGTH, MAX_TEXT_LENGTH)
    }

    pub fn with_limits(text: &str, min_length: usize, max_length: usize) -> Self {
        let text = text.to_lowercase().chars().filter(|c| !c.is_whitespace()).collect::<String>();
        let text_length = text.chars().count();
        let hash = (text_length > min_length).then(|| fuzzy_hash(text.as_bytes()));
        let text = (text_length <= max_length).then_some(text);
        TextOrHash { text, text_length, hash }
    }

    pub fn is_empty(&self) -> bool {
        self.text_length == 0
    }

    /// Similarity between 0 and 1. The texts are compared when both are available, otherwise
    /// the hashes. A score below `min_score` isn't significant and gives 0.
    pub fn similarity(&self, other: &TextOrHash, min_score: f64) -> f64 {
        let score = match (&self.text, &other.text, &self.hash, &other.hash) {
            (Some(a), Some(b), _, _) => levenshtein_str(a, b),
            (_, _, Some(a), Some(b)) => compare_hashes(a, b) as f64 / 100.0,
            _ => 0.0,
        };
        if score < min_score { 0.0 } else { score }
    }
}
