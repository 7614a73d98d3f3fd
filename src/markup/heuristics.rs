// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

//! Heuristics of the context finder.
//!
//! The weights heuristics run by decreasing priority; each of them sets the weights it can
//! decide and leaves the other ones for the next heuristics. The similarity heuristics adjust the
//! blended similarity of the candidates. The pre-heuristics look for an element identical to the
//! point before any similarity is computed.

use std::fmt::{Display, Formatter};
use crate::markup::context::PointContext;
use crate::markup::finder::{FinderConfig, RemapCandidateInfo};

/// Facets of a context that are compared separately, then blended.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub enum ContextType { HeaderCore, HeaderNonCore, Ancestors, Inner, Siblings }

impl ContextType {
    pub const ALL: [ContextType; 5] = [
        ContextType::HeaderCore, ContextType::HeaderNonCore, ContextType::Ancestors, ContextType::Inner, ContextType::Siblings
    ];

    /// Default weight of the facet.
    pub fn default_weight(&self) -> f64 {
        match self {
            ContextType::HeaderCore => 2.0,
            ContextType::HeaderNonCore => 1.0,
            ContextType::Ancestors => 1.0,
            ContextType::Inner => 1.0,
            ContextType::Siblings => 0.5,
        }
    }
}

impl Display for ContextType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ContextType::HeaderCore => "HC",
            ContextType::HeaderNonCore => "HN",
            ContextType::Ancestors => "A",
            ContextType::Inner => "I",
            ContextType::Siblings => "S",
        };
        write!(f, "{name}")
    }
}

/// Weights of the facets; a weight is `None` until a heuristic decides it.
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct Weights([Option<f64>; 5]);

impl Weights {
    pub fn get(&self, facet: ContextType) -> Option<f64> {
        self.0[facet as usize]
    }

    pub fn set(&mut self, facet: ContextType, weight: f64) {
        self.0[facet as usize] = Some(weight);
    }

    pub fn is_set(&self, facet: ContextType) -> bool {
        self.0[facet as usize].is_some()
    }

    /// Sum of the weights, the unset ones counting as 0.
    pub fn sum(&self) -> f64 {
        self.0.iter().flatten().sum()
    }

    /// Blended similarity of a candidate.
    pub fn blend(&self, candidate: &RemapCandidateInfo) -> f64 {
        let total = self.sum();
        if total > 0.0 {
            ContextType::ALL.iter().map(|t| self.get(*t).unwrap_or(0.0) * candidate.facet(*t)).sum::<f64>() / total
        } else {
            // no facet carries information: all the candidates are equally good
            1.0
        }
    }
}

impl Display for Weights {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let items = ContextType::ALL.iter()
            .map(|t| match self.get(*t) {
                Some(w) => format!("{t}: {w}"),
                None => format!("{t}: -"),
            })
            .collect::<Vec<_>>();
        write!(f, "{}", items.join("; "))
    }
}

// ---------------------------------------------------------------------------------------------

pub trait WeightsHeuristic {
    fn name(&self) -> &str;

    fn priority(&self) -> i32;

    fn tune_weights(&self, config: &FinderConfig, source: &PointContext, candidates: &[RemapCandidateInfo], weights: &mut Weights);
}

pub trait SimilarityHeuristic {
    fn name(&self) -> &str;

    fn priority(&self) -> i32;

    fn predict_similarity(&self, config: &FinderConfig, source: &PointContext, candidates: &mut [RemapCandidateInfo]);
}

pub trait PreHeuristic {
    fn name(&self) -> &str;

    /// Index of the candidate that is certainly the element of the point, if any.
    fn same_element(&self, source: &PointContext, candidates: &[RemapCandidateInfo]) -> Option<usize>;
}

/// Sets a zero weight to the facets that are empty for the point and all the candidates.
pub struct EmptyContextHeuristic;

impl WeightsHeuristic for EmptyContextHeuristic {
    fn name(&self) -> &str {
        "empty context"
    }

    fn priority(&self) -> i32 {
        100
    }

    fn tune_weights(&self, _config: &FinderConfig, source: &PointContext, candidates: &[RemapCandidateInfo], weights: &mut Weights) {
        let exists = |f: &dyn Fn(&PointContext) -> bool| f(source) || candidates.iter().any(|c| f(&c.context));
        let flags = [
            (ContextType::Inner, exists(&|c: &PointContext| !c.inner.content.is_empty())),
            (ContextType::HeaderCore, exists(&|c: &PointContext| !c.header.core_indices.is_empty())),
            (ContextType::HeaderNonCore, exists(&|c: &PointContext| !c.header.non_core_indices.is_empty())),
            (ContextType::Ancestors, exists(&|c: &PointContext| !c.ancestors.is_empty())),
            (ContextType::Siblings, source.not_unique && !source.siblings.is_empty()),
        ];
        for (facet, used) in flags {
            if !used {
                weights.set(facet, 0.0);
            }
        }
    }
}

/// Ignores the inner context when no candidate is close enough to the point on that facet:
/// the contents of the element have probably changed.
pub struct LowerChangedInnerHeuristic;

impl WeightsHeuristic for LowerChangedInnerHeuristic {
    fn name(&self) -> &str {
        "lower changed inner"
    }

    fn priority(&self) -> i32 {
        20
    }

    fn tune_weights(&self, config: &FinderConfig, _source: &PointContext, candidates: &[RemapCandidateInfo], weights: &mut Weights) {
        let max = candidates.iter().map(|c| c.inner_similarity).fold(0.0, f64::max);
        if !weights.is_set(ContextType::Inner) && max <= config.garbage_inner_threshold {
            weights.set(ContextType::Inner, 0.0);
        }
    }
}

/// Gives the highest weights to the facets that best separate the candidates.
pub struct PrioritizeByGapHeuristic;

struct FacetFeatures {
    max: f64,
    gap_from_max: f64,
    median_gap: f64,
}

impl PrioritizeByGapHeuristic {
    /// Requires at least two candidates.
    fn features(candidates: &[RemapCandidateInfo], facet: ContextType) -> FacetFeatures {
        let mut values = candidates.iter().map(|c| c.facet(facet)).collect::<Vec<_>>();
        values.sort_by(|a, b| b.total_cmp(a));
        let mut gaps = values.windows(2).map(|w| w[0] - w[1]).collect::<Vec<_>>();
        gaps.sort_by(|a, b| b.total_cmp(a));
        let n = gaps.len();
        let median_gap = if n % 2 == 0 { (gaps[n / 2] + gaps[n / 2 - 1]) / 2.0 } else { gaps[n / 2] };
        FacetFeatures { max: values[0], gap_from_max: values[0] - values[1], median_gap }
    }
}

impl WeightsHeuristic for PrioritizeByGapHeuristic {
    fn name(&self) -> &str {
        "prioritize by gap"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn tune_weights(&self, config: &FinderConfig, _source: &PointContext, candidates: &[RemapCandidateInfo], weights: &mut Weights) {
        if candidates.len() < 2 {
            return;
        }
        let max_weight = ContextType::ALL.len() as f64;
        let mut prioritized = Vec::new();
        let unset = ContextType::ALL.into_iter().filter(|t| !weights.is_set(*t)).collect::<Vec<_>>();
        for facet in unset {
            let features = Self::features(candidates, facet);
            // facets that don't separate the best candidate from the others get a minimal weight
            if features.max < config.candidate_similarity_threshold
                || (1.0 - features.max) * config.second_distance_gap_coefficient > features.gap_from_max
            {
                weights.set(facet, 1.0);
            } else {
                prioritized.push((facet, features.median_gap));
            }
        }
        prioritized.sort_by(|a, b| b.1.total_cmp(&a.1));
        for (i, (facet, _)) in prioritized.into_iter().enumerate() {
            weights.set(facet, max_weight - i as f64);
        }
    }
}

/// Sets the default weight of the facets that are still unset.
pub struct DefaultWeightsHeuristic;

impl WeightsHeuristic for DefaultWeightsHeuristic {
    fn name(&self) -> &str {
        "default weights"
    }

    fn priority(&self) -> i32 {
        0
    }

    fn tune_weights(&self, _config: &FinderConfig, _source: &PointContext, _candidates: &[RemapCandidateInfo], weights: &mut Weights) {
        for facet in ContextType::ALL {
            if !weights.is_set(facet) {
                weights.set(facet, facet.default_weight());
            }
        }
    }
}

// ---------------------------------------------------------------------------------------------

/// Promotes to a similarity of 1 the only candidate whose header and ancestors are identical to
/// those of the point.
pub struct SameHeaderAndAncestorsHeuristic;

impl SimilarityHeuristic for SameHeaderAndAncestorsHeuristic {
    fn name(&self) -> &str {
        "same header and ancestors"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn predict_similarity(&self, _config: &FinderConfig, _source: &PointContext, candidates: &mut [RemapCandidateInfo]) {
        let mut same = candidates.iter_mut().filter(|c| c.header_similarity == 1.0 && c.ancestor_similarity == 1.0);
        if let (Some(only), None) = (same.next(), same.next()) {
            only.similarity = Some(1.0);
        }
    }
}

// ---------------------------------------------------------------------------------------------

type ContextPredicate = fn(&PointContext, &PointContext) -> bool;

fn same_header_core(a: &PointContext, b: &PointContext) -> bool {
    a.header.eq_by_core(&b.header)
}

fn same_header(a: &PointContext, b: &PointContext) -> bool {
    a.header == b.header
}

fn same_inner(a: &PointContext, b: &PointContext) -> bool {
    let (a, b) = (&a.inner.content, &b.inner.content);
    a.text == b.text && (a.hash.is_none() || a.hash == b.hash)
}

fn same_ancestors_core(a: &PointContext, b: &PointContext) -> bool {
    a.ancestors.len() == b.ancestors.len()
        && a.ancestors.iter().zip(&b.ancestors).all(|(x, y)| {
            !x.header.core_indices.is_empty() && x.header.eq_by_core(&y.header) || x.header == y.header
        })
}

fn same_ancestors(a: &PointContext, b: &PointContext) -> bool {
    a.ancestors == b.ancestors
}

/// Finds the candidate whose context is equal to that of the point, when the equality is enough
/// to tell it apart from the other elements.
///
/// The closest contexts of the point show which comparison was needed in the original file to
/// distinguish the point from its most similar elements: header core, then whole header, then
/// inner context, and for the ancestors, the core of their headers, then their whole headers.
/// The candidates are compared with the same strictness, and the only candidate that remains
/// is the element.
pub struct ContextsEqualityHeuristic;

impl PreHeuristic for ContextsEqualityHeuristic {
    fn name(&self) -> &str {
        "contexts equality"
    }

    fn same_element(&self, point: &PointContext, candidates: &[RemapCandidateInfo]) -> Option<usize> {
        const BASE: [ContextPredicate; 3] = [same_header_core, same_header, same_inner];
        const ANCESTORS: [ContextPredicate; 2] = [same_ancestors_core, same_ancestors];
        let mut base_idx = if !point.header.core_indices.is_empty() {
            0
        } else if !point.header.is_empty() {
            1
        } else if !point.inner.content.is_empty() {
            2
        } else {
            return None;
        };
        let mut ancestors_idx = 0;
        let mut almost_same = point.closest.iter().filter(|e| ANCESTORS[0](e, point)).collect::<Vec<_>>();
        for (i, predicate) in BASE.iter().enumerate().skip(base_idx) {
            almost_same.retain(|e| predicate(e, point));
            if !almost_same.is_empty() {
                for (j, strict) in ANCESTORS.iter().enumerate().skip(1) {
                    if !almost_same.iter().any(|e| strict(e, point)) {
                        almost_same.clear();
                        ancestors_idx = j;
                        break;
                    }
                }
            }
            if almost_same.is_empty() {
                base_idx = i;
                break;
            }
        }
        if !almost_same.is_empty() {
            // even the strictest comparison didn't tell the point from other elements
            return None;
        }
        let mut similar = candidates.iter().enumerate()
            .filter(|(_, c)| BASE[..=base_idx].iter().all(|p| p(point, &c.context)) && ANCESTORS[ancestors_idx](&c.context, point))
            .map(|(i, _)| i)
            .collect::<Vec<_>>();
        if similar.len() <= 1 {
            return similar.first().copied();
        }
        for predicate in &BASE[base_idx + 1..] {
            similar.retain(|i| predicate(&candidates[*i].context, point));
            if similar.len() <= 1 {
                return similar.first().copied();
            }
            for strict in &ANCESTORS[ancestors_idx + 1..] {
                let strict_similar = similar.iter().copied().filter(|i| strict(&candidates[*i].context, point)).collect::<Vec<_>>();
                if strict_similar.len() <= 1 {
                    return strict_similar.first().copied();
                }
            }
        }
        None
    }
}
