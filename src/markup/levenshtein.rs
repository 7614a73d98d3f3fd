// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

//! Similarity of sequences based on the Levenshtein distance.
//!
//! The distance is computed with the Wagner-Fischer algorithm. The elements of a sequence have
//! a priority, which is the cost of inserting or removing them, and a similarity with other
//! elements of the same kind; elements of different kinds can't replace each other.

/// Element of a sequence compared with [levenshtein].
pub trait Comparable: PartialEq {
    fn priority(&self) -> f64 {
        1.0
    }

    /// Can the elements replace each other?
    fn same_kind(&self, _other: &Self) -> bool {
        true
    }

    /// Similarity between 0 and 1 of two elements of the same kind.
    fn similarity(&self, other: &Self) -> f64;
}

/// Sum of the priorities of `a`, plus those of the elements of `b` that have no counterpart of the
/// same kind in `a`. It's the highest possible distance between the sequences.
fn denominator<T: Comparable>(a: &[T], b: &[T]) -> f64 {
    let mut matched = vec![false; b.len()];
    for x in a {
        if let Some(j) = (0..b.len()).find(|j| !matched[*j] && b[*j].same_kind(x)) {
            matched[j] = true;
        }
    }
    a.iter().map(|x| x.priority()).sum::<f64>()
        + b.iter().zip(matched).filter(|(_, m)| !m).map(|(y, _)| y.priority()).sum::<f64>()
}

/// Similarity between 0 and 1 of the sequence `b` to the sequence `a`.
pub fn levenshtein<T: Comparable>(a: &[T], b: &[T]) -> f64 {
    if a.is_empty() != b.is_empty() {
        return 0.0;
    }
    if a.is_empty() {
        return 1.0;
    }
    let denominator = denominator(a, b);
    let prefix = a.iter().zip(b).take_while(|(x, y)| x == y).count();
    let (a, b) = (&a[prefix..], &b[prefix..]);
    let suffix = a.iter().rev().zip(b.iter().rev()).take_while(|(x, y)| x == y).count();
    let (a, b) = (&a[..a.len() - suffix], &b[..b.len() - suffix]);
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if denominator <= 0.0 {
        return 0.0;
    }
    let mut previous = Vec::with_capacity(b.len() + 1);
    previous.push(0.0);
    for y in b {
        previous.push(previous[previous.len() - 1] + y.priority());
    }
    let mut current = vec![0.0; b.len() + 1];
    for x in a {
        current[0] = previous[0] + x.priority();
        for (j, y) in b.iter().enumerate() {
            let mut distance = (previous[j + 1] + x.priority()).min(current[j] + y.priority());
            if x.same_kind(y) {
                distance = distance.min(previous[j] + x.priority() * (1.0 - x.similarity(y)));
            }
            current[j + 1] = distance;
        }
        std::mem::swap(&mut previous, &mut current);
    }
    (1.0 - previous[b.len()] / denominator).max(0.0)
}

impl<T: Comparable> Comparable for &T {
    fn priority(&self) -> f64 {
        (**self).priority()
    }

    fn same_kind(&self, other: &Self) -> bool {
        (**self).same_kind(*other)
    }

    fn similarity(&self, other: &Self) -> f64 {
        (**self).similarity(*other)
    }
}

impl Comparable for char {
    fn similarity(&self, other: &Self) -> f64 {
        if self == other { 1.0 } else { 0.0 }
    }
}

/// Similarity between 0 and 1 of the string `b` to the string `a`.
pub fn levenshtein_str(a: &str, b: &str) -> f64 {
    let a = a.chars().collect::<Vec<_>>();
    let b = b.chars().collect::<Vec<_>>();
    levenshtein(&a, &b)
}
