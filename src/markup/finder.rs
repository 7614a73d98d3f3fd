// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

//! Context finder: finds the nodes of the current parsed files that correspond to points marked
//! in an earlier version of the files.
//!
//! For each point, the candidates are the nodes of the same type in the search area. Every facet
//! of their context is compared to the point context, then the facet similarities are blended
//! with weights tuned by the heuristics of the finder. The best candidate is accepted
//! automatically when it's similar enough to the point and sufficiently ahead of the next one.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use rayon::prelude::*;
use land_core::log::{BufLog, LogReader, Logger};
use crate::markup::context::{FileContext, ParsedFile, PointContext};
use crate::markup::fuzzy::{MAX_TEXT_LENGTH, MIN_TEXT_LENGTH};
use crate::markup::heuristics::{ContextType, ContextsEqualityHeuristic, DefaultWeightsHeuristic, EmptyContextHeuristic, LowerChangedInnerHeuristic, PreHeuristic, PrioritizeByGapHeuristic, SameHeaderAndAncestorsHeuristic, SimilarityHeuristic, Weights, WeightsHeuristic};
use crate::markup::levenshtein::levenshtein;
use crate::tree::visitors::GroupNodesByTypeVisitor;
use crate::tree::NodeId;

#[derive(Clone, PartialEq, Debug)]
pub struct FinderConfig {
    /// minimum similarity of a candidate accepted automatically
    pub candidate_similarity_threshold: f64,
    /// minimum content similarity of a file searched in a local search
    pub file_similarity_threshold: f64,
    /// the distance to 1 of the second candidate must be this many times that of the first one
    /// to accept the first one automatically
    pub second_distance_gap_coefficient: f64,
    /// best inner similarity under which the inner context is ignored
    pub garbage_inner_threshold: f64,
    /// maximum number of closest contexts stored with a point
    pub closest_count: usize,
    /// maximum number of ranked candidates returned for a point
    pub top_count: usize,
    /// texts longer than that are hashed
    pub min_text_length: usize,
    /// texts longer than that are only hashed
    pub max_text_length: usize,
}

impl FinderConfig {
    /// Minimum score of a text comparison; lower scores aren't significant.
    pub fn min_score(&self) -> f64 {
        self.min_text_length as f64 / self.max_text_length as f64
    }
}

impl Default for FinderConfig {
    fn default() -> Self {
        FinderConfig {
            candidate_similarity_threshold: 0.6,
            file_similarity_threshold: 0.6,
            second_distance_gap_coefficient: 1.5,
            garbage_inner_threshold: 0.6,
            closest_count: 10,
            top_count: 10,
            min_text_length: MIN_TEXT_LENGTH,
            max_text_length: MAX_TEXT_LENGTH,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SearchType {
    /// the file of the point, or the files that look like it
    Local,
    /// all the files of the search area
    Global,
}

// ---------------------------------------------------------------------------------------------

/// Candidate node for a point, with its similarities to the point.
#[derive(Clone, Debug)]
pub struct RemapCandidateInfo {
    /// index of the file in the search area
    pub file: usize,
    pub file_name: String,
    pub node: NodeId,
    pub context: Arc<PointContext>,
    pub header_similarity: f64,
    pub header_core_similarity: f64,
    pub header_non_core_similarity: f64,
    pub ancestor_similarity: f64,
    pub inner_similarity: f64,
    pub siblings_similarity: f64,
    /// blended similarity, once computed
    pub similarity: Option<f64>,
    pub is_auto: bool,
}

impl RemapCandidateInfo {
    pub fn new(file: usize, file_name: String, node: NodeId, context: Arc<PointContext>) -> Self {
        RemapCandidateInfo {
            file,
            file_name,
            node,
            context,
            header_similarity: 0.0,
            header_core_similarity: 0.0,
            header_non_core_similarity: 0.0,
            ancestor_similarity: 0.0,
            inner_similarity: 0.0,
            siblings_similarity: 0.0,
            similarity: None,
            is_auto: false,
        }
    }

    pub fn facet(&self, facet: ContextType) -> f64 {
        match facet {
            ContextType::HeaderCore => self.header_core_similarity,
            ContextType::HeaderNonCore => self.header_non_core_similarity,
            ContextType::Ancestors => self.ancestor_similarity,
            ContextType::Inner => self.inner_similarity,
            ContextType::Siblings => self.siblings_similarity,
        }
    }

    /// Blended similarity, 0 if it hasn't been computed.
    pub fn score(&self) -> f64 {
        self.similarity.unwrap_or(0.0)
    }

    fn key(&self) -> (usize, NodeId) {
        (self.file, self.node)
    }
}

impl Display for RemapCandidateInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{} line {} [{:.3}{}] HC: {:.2}, HN: {:.2}, A: {:.2}, I: {:.2}, S: {:.2}",
               self.file_name, self.node, self.context.line, self.score(), if self.is_auto { ", auto" } else { "" },
               self.header_core_similarity, self.header_non_core_similarity, self.ancestor_similarity,
               self.inner_similarity, self.siblings_similarity)
    }
}

// ---------------------------------------------------------------------------------------------

pub struct ContextFinder {
    config: FinderConfig,
    pre_heuristics: Vec<Box<dyn PreHeuristic>>,
    weights_heuristics: Vec<Box<dyn WeightsHeuristic>>,
    similarity_heuristics: Vec<Box<dyn SimilarityHeuristic>>,
    log: BufLog,
}

impl ContextFinder {
    /// Creates a finder with the standard heuristics.
    pub fn new(config: FinderConfig) -> Self {
        let mut finder = ContextFinder::without_heuristics(config);
        finder.add_pre_heuristic(Box::new(ContextsEqualityHeuristic));
        finder.add_weights_heuristic(Box::new(EmptyContextHeuristic));
        finder.add_weights_heuristic(Box::new(LowerChangedInnerHeuristic));
        finder.add_weights_heuristic(Box::new(PrioritizeByGapHeuristic));
        finder.add_weights_heuristic(Box::new(DefaultWeightsHeuristic));
        finder.add_similarity_heuristic(Box::new(SameHeaderAndAncestorsHeuristic));
        finder
    }

    pub fn without_heuristics(config: FinderConfig) -> Self {
        ContextFinder {
            config,
            pre_heuristics: Vec::new(),
            weights_heuristics: Vec::new(),
            similarity_heuristics: Vec::new(),
            log: BufLog::new(),
        }
    }

    pub fn config(&self) -> &FinderConfig {
        &self.config
    }

    pub fn add_pre_heuristic(&mut self, heuristic: Box<dyn PreHeuristic>) {
        self.pre_heuristics.push(heuristic);
    }

    pub fn add_weights_heuristic(&mut self, heuristic: Box<dyn WeightsHeuristic>) {
        self.weights_heuristics.push(heuristic);
        self.weights_heuristics.sort_by_key(|h| -h.priority());
    }

    pub fn add_similarity_heuristic(&mut self, heuristic: Box<dyn SimilarityHeuristic>) {
        self.similarity_heuristics.push(heuristic);
        self.similarity_heuristics.sort_by_key(|h| -h.priority());
    }

    /// Removes the heuristics called `name`, and returns `true` if there was any.
    pub fn remove_heuristic(&mut self, name: &str) -> bool {
        let count = self.pre_heuristics.len() + self.weights_heuristics.len() + self.similarity_heuristics.len();
        self.pre_heuristics.retain(|h| h.name() != name);
        self.weights_heuristics.retain(|h| h.name() != name);
        self.similarity_heuristics.retain(|h| h.name() != name);
        count != self.pre_heuristics.len() + self.weights_heuristics.len() + self.similarity_heuristics.len()
    }

    /// Builds the context of a point marked on `node`, with the contexts of the nodes of the file
    /// that are the most similar to it.
    pub fn point_context(&mut self, file: &ParsedFile, node: NodeId) -> PointContext {
        let mut context = PointContext::new(file, node, &self.config);
        let Some(root) = file.root else {
            return context;
        };
        let others = GroupNodesByTypeVisitor::groups(&file.tree, root, [context.node_type.as_str()])
            .remove(&context.node_type)
            .unwrap_or_default()
            .into_iter()
            .filter(|n| *n != node)
            .collect::<Vec<_>>();
        let config = &self.config;
        let mut candidates = others.par_iter()
            .map(|n| RemapCandidateInfo::new(0, file.name.clone(), *n, Arc::new(PointContext::new(file, *n, config))))
            .collect::<Vec<_>>();
        self.compute_core_similarities(&context, &mut candidates);
        self.compute_total_similarity(&context, &mut candidates);
        sort_candidates(&mut candidates);
        let threshold = self.config.candidate_similarity_threshold;
        context.closest = candidates.into_iter()
            .take(self.config.closest_count)
            .take_while(|c| c.score() >= threshold)
            .map(|c| Arc::try_unwrap(c.context).unwrap_or_else(|shared| (*shared).clone()))
            .collect();
        context
    }

    /// Candidates of type `node_type` in the `files` of the search area, without similarities.
    pub fn candidates(&mut self, area: &[ParsedFile], files: &[usize], node_type: &str) -> Vec<RemapCandidateInfo> {
        let mut nodes = Vec::new();
        for &f in files {
            let file = &area[f];
            match file.root {
                Some(root) => {
                    let found = GroupNodesByTypeVisitor::groups(&file.tree, root, [node_type]).remove(node_type).unwrap_or_default();
                    nodes.extend(found.into_iter().map(|n| (f, n)));
                }
                None => self.log.add_warning(format!("file '{}' has no tree to search", file.name), None),
            }
        }
        let config = &self.config;
        nodes.par_iter()
            .map(|&(f, n)| RemapCandidateInfo::new(f, area[f].name.clone(), n, Arc::new(PointContext::new(&area[f], n, config))))
            .collect()
    }

    /// Computes the similarity of each facet between the point and the candidates.
    pub fn compute_core_similarities(&self, point: &PointContext, candidates: &mut [RemapCandidateInfo]) {
        let min_score = self.config.min_score();
        candidates.par_iter_mut().for_each(|c| {
            let other = &c.context;
            c.header_similarity = levenshtein(&point.header.sequence, &other.header.sequence);
            c.header_core_similarity = levenshtein(&point.header.core(), &other.header.core());
            c.header_non_core_similarity = levenshtein(&point.header.non_core(), &other.header.non_core());
            c.ancestor_similarity = levenshtein(&point.ancestors, &other.ancestors);
            c.inner_similarity = point.inner.content.similarity(&other.inner.content, min_score);
            c.siblings_similarity = point.siblings.similarity(&other.siblings, min_score);
        });
    }

    /// Blends the facet similarities of the candidates with the weights given by the heuristics.
    pub fn compute_total_similarity(&mut self, point: &PointContext, candidates: &mut [RemapCandidateInfo]) {
        let mut weights = Weights::default();
        if candidates.len() == 1 {
            // nothing to separate
            EmptyContextHeuristic.tune_weights(&self.config, point, candidates, &mut weights);
            DefaultWeightsHeuristic.tune_weights(&self.config, point, candidates, &mut weights);
        } else {
            for heuristic in &self.weights_heuristics {
                heuristic.tune_weights(&self.config, point, candidates, &mut weights);
            }
        }
        self.log.add_trace(format!("weights for '{}' line {}: {weights}", point.node_type, point.line), None);
        for c in candidates.iter_mut().filter(|c| c.similarity.is_none()) {
            c.similarity = Some(weights.blend(c));
        }
        if candidates.len() > 1 {
            for heuristic in &self.similarity_heuristics {
                heuristic.predict_similarity(&self.config, point, candidates);
            }
        }
    }

    fn is_similar_enough(&self, candidate: &RemapCandidateInfo) -> bool {
        candidate.score() >= self.config.candidate_similarity_threshold
    }

    fn is_distant_enough(&self, first: &RemapCandidateInfo, second: Option<&RemapCandidateInfo>) -> bool {
        match second {
            None => true,
            Some(second) => second.score() != 1.0
                && 1.0 - second.score() >= self.config.second_distance_gap_coefficient * (1.0 - first.score()),
        }
    }

    /// Ranks the candidates of a point, the best first, and decides whether the first one can be
    /// accepted automatically.
    pub fn eval_candidates(&mut self, point: &PointContext, mut candidates: Vec<RemapCandidateInfo>) -> Vec<RemapCandidateInfo> {
        if candidates.is_empty() {
            return candidates;
        }
        let same = self.pre_heuristics.iter().find_map(|h| h.same_element(point, &candidates).map(|index| (h.name().to_string(), index)));
        if let Some((name, index)) = same {
            let mut same = candidates.swap_remove(index);
            self.compute_core_similarities(point, std::slice::from_mut(&mut same));
            same.similarity = Some(1.0);
            same.is_auto = true;
            self.log.add_trace(format!("'{}' line {}: same element found by '{name}'", point.node_type, point.line), None);
            return vec![same];
        }
        self.compute_core_similarities(point, &mut candidates);
        self.compute_total_similarity(point, &mut candidates);
        sort_candidates(&mut candidates);
        let is_auto = self.is_similar_enough(&candidates[0]) && self.is_distant_enough(&candidates[0], candidates.get(1));
        candidates[0].is_auto = is_auto;
        if self.config.top_count > 0 {
            candidates.truncate(self.config.top_count);
        }
        candidates
    }

    /// Files of the search area where a point of `file` is searched.
    fn search_files(&mut self, file: &FileContext, area: &[ParsedFile], search_type: SearchType) -> Vec<usize> {
        if search_type == SearchType::Global {
            return (0..area.len()).collect();
        }
        let same_name = area.iter().enumerate().filter(|(_, f)| f.name == file.name).map(|(i, _)| i).collect::<Vec<_>>();
        if !same_name.is_empty() {
            return same_name;
        }
        let base_name = std::path::Path::new(&file.name).file_name().and_then(|n| n.to_str());
        let same_base = area.iter().enumerate().filter(|(_, f)| base_name.is_some() && f.base_name() == base_name).map(|(i, _)| i).collect::<Vec<_>>();
        if !same_base.is_empty() {
            return same_base;
        }
        let min_score = self.config.min_score();
        let similar = area.iter().enumerate()
            .filter(|(_, f)| f.context.content.similarity(&file.content, min_score) > self.config.file_similarity_threshold)
            .map(|(i, _)| i)
            .collect::<Vec<_>>();
        if similar.is_empty() {
            self.log.add_warning(format!("no file of the search area matches '{}'", file.name), None);
        }
        similar
    }

    /// Groups the points that share the same files to search and the same type.
    fn search_groups(&mut self, points: &[PointContext], area: &[ParsedFile], search_type: SearchType) -> Vec<(Vec<usize>, String, Vec<usize>)> {
        let mut groups = BTreeMap::<(Vec<usize>, String), Vec<usize>>::new();
        let mut files_by_name = BTreeMap::<String, Vec<usize>>::new();
        for (i, point) in points.iter().enumerate() {
            let files = match files_by_name.get(&point.file.name) {
                Some(files) => files.clone(),
                None => {
                    let files = self.search_files(&point.file, area, search_type);
                    files_by_name.insert(point.file.name.clone(), files.clone());
                    files
                }
            };
            groups.entry((files, point.node_type.clone())).or_default().push(i);
        }
        groups.into_iter().map(|((files, node_type), indices)| (files, node_type, indices)).collect()
    }

    /// Finds the candidates of each point independently. The result has the order of `points`;
    /// each list is ranked, the best candidate first.
    pub fn find(&mut self, points: &[PointContext], area: &[ParsedFile], search_type: SearchType) -> Vec<Vec<RemapCandidateInfo>> {
        let mut result = vec![Vec::new(); points.len()];
        for (files, node_type, indices) in self.search_groups(points, area, search_type) {
            let candidates = self.candidates(area, &files, &node_type);
            for i in indices {
                result[i] = self.eval_candidates(&points[i], candidates.clone());
            }
        }
        result
    }

    /// Finds the candidates of all the points together: when several points claim the same node,
    /// each point gets the node of the assignment that maximizes the total similarity.
    pub fn find_all(&mut self, points: &[PointContext], area: &[ParsedFile], search_type: SearchType) -> Vec<Vec<RemapCandidateInfo>> {
        let mut result = vec![Vec::new(); points.len()];
        for (files, node_type, indices) in self.search_groups(points, area, search_type) {
            let candidates = self.candidates(area, &files, &node_type);
            let keys = candidates.iter().map(|c| c.key()).collect::<Vec<_>>();
            let top_count = std::mem::replace(&mut self.config.top_count, 0);
            let mut lists = indices.iter()
                .map(|i| self.eval_candidates(&points[*i], candidates.clone()))
                .collect::<Vec<_>>();
            self.config.top_count = top_count;
            let scores = lists.iter()
                .map(|list| keys.iter().map(|k| list.iter().find(|c| c.key() == *k).map(|c| c.score()).unwrap_or(0.0)).collect::<Vec<_>>())
                .collect::<Vec<_>>();
            let assignment = maximum_assignment(&scores);
            let assigned = assignment.iter().flatten().map(|j| keys[*j]).collect::<Vec<_>>();
            for (row, list) in lists.iter_mut().enumerate() {
                list.iter_mut().for_each(|c| c.is_auto = false);
                let Some(position) = assignment[row].and_then(|j| list.iter().position(|c| c.key() == keys[j])) else {
                    continue;
                };
                let chosen = list.remove(position);
                let runner_up = list.iter().find(|c| !assigned.contains(&c.key()));
                let is_auto = self.is_similar_enough(&chosen) && self.is_distant_enough(&chosen, runner_up);
                list.insert(0, chosen);
                list[0].is_auto = is_auto;
                if self.config.top_count > 0 {
                    list.truncate(self.config.top_count);
                }
            }
            for (i, list) in indices.into_iter().zip(lists) {
                result[i] = list;
            }
        }
        result
    }

    /// Checks whether the contents of two files are similar enough for a local search.
    pub fn are_files_similar(&self, a: &FileContext, b: &FileContext) -> bool {
        a.content.similarity(&b.content, self.config.min_score()) > self.config.file_similarity_threshold
    }
}

impl LogReader for ContextFinder {
    type Item = BufLog;

    fn get_log(&self) -> &Self::Item {
        &self.log
    }

    fn give_log(self) -> Self::Item {
        self.log
    }
}

/// Sorts the candidates by decreasing similarity, then by decreasing similarity of the ancestors.
fn sort_candidates(candidates: &mut [RemapCandidateInfo]) {
    candidates.sort_by(|a, b| b.score().total_cmp(&a.score()).then(b.ancestor_similarity.total_cmp(&a.ancestor_similarity)));
}

/// Assignment of the rows to distinct columns maximizing the total score (Hungarian algorithm).
/// All the rows must have the same length. Returns the column of each row, if any.
pub fn maximum_assignment(scores: &[Vec<f64>]) -> Vec<Option<usize>> {
    let n = scores.len();
    if n == 0 {
        return Vec::new();
    }
    let columns = scores[0].len();
    // dummy columns of score 0 so that each row can be assigned
    let m = columns.max(n);
    let cost = |i: usize, j: usize| if j < columns { -scores[i][j] } else { 0.0 };
    let mut u = vec![0.0; n + 1];
    let mut v = vec![0.0; m + 1];
    let mut p = vec![0_usize; m + 1];
    let mut way = vec![0_usize; m + 1];
    for i in 1..=n {
        p[0] = i;
        let mut j0 = 0;
        let mut min_v = vec![f64::INFINITY; m + 1];
        let mut used = vec![false; m + 1];
        loop {
            used[j0] = true;
            let i0 = p[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0;
            for j in 1..=m {
                if !used[j] {
                    let current = cost(i0 - 1, j - 1) - u[i0] - v[j];
                    if current < min_v[j] {
                        min_v[j] = current;
                        way[j] = j0;
                    }
                    if min_v[j] < delta {
                        delta = min_v[j];
                        j1 = j;
                    }
                }
            }
            for j in 0..=m {
                if used[j] {
                    u[p[j]] += delta;
                    v[j] -= delta;
                } else {
                    min_v[j] -= delta;
                }
            }
            j0 = j1;
            if p[j0] == 0 {
                break;
            }
        }
        loop {
            let j1 = way[j0];
            p[j0] = p[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }
    let mut assignment = vec![None; n];
    for j in 1..=m {
        if p[j] != 0 && j <= columns {
            assignment[p[j] - 1] = Some(j - 1);
        }
    }
    assignment
}
