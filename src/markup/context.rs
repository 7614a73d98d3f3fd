// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

//! Contexts describing a node of a parsed file, used to find the node again after the file has
//! been modified.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;
use land_core::location::SegmentLocation;
use crate::markup::finder::FinderConfig;
use crate::markup::fuzzy::TextOrHash;
use crate::markup::levenshtein::{levenshtein, Comparable};
use crate::markup::words::{get_words, PrioritizedWord};
use crate::parser::ParseOutput;
use crate::tree::visitors::GroupNodesByTypeVisitor;
use crate::tree::{Node, NodeId, Tree, DEFAULT_PRIORITY};

/// Parsed file, in which the points are marked or searched.
#[derive(Clone, Debug)]
pub struct ParsedFile {
    pub name: String,
    pub text: String,
    pub tree: Tree,
    pub root: Option<NodeId>,
    pub context: FileContext,
}

impl ParsedFile {
    pub fn new<T: Into<String>>(name: T, text: String, tree: Tree, root: Option<NodeId>) -> Self {
        let name = name.into();
        let context = FileContext::new(&name, &text);
        ParsedFile { name, text, tree, root, context }
    }

    pub fn from_output<T: Into<String>>(name: T, text: String, output: ParseOutput) -> Self {
        ParsedFile::new(name, text, output.tree, output.root)
    }

    /// Name of the file without its directories.
    pub fn base_name(&self) -> Option<&str> {
        Path::new(&self.name).file_name().and_then(|n| n.to_str())
    }

    /// Source text of the node.
    fn node_text(&self, node: NodeId) -> &str {
        self.tree.text(node, &self.text).unwrap_or("")
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct FileContext {
    pub name: String,
    pub line_count: usize,
    pub content: TextOrHash,
}

impl FileContext {
    pub fn new(name: &str, text: &str) -> Self {
        FileContext {
            name: name.to_string(),
            line_count: text.matches('\n').count() + 1,
            content: TextOrHash::new(text),
        }
    }
}

// ---------------------------------------------------------------------------------------------

/// Element of a header: a leaf of the node, split into words.
#[derive(Clone, PartialEq, Debug)]
pub struct HeaderContextElement {
    pub node_type: String,
    pub priority: f64,
    pub exact_match: bool,
    pub words: Vec<PrioritizedWord>,
}

impl HeaderContextElement {
    pub fn from_node(node: &Node) -> Self {
        let exact_match = node.is_exact_match();
        let words = if exact_match {
            vec![PrioritizedWord::new(node.value.concat(), DEFAULT_PRIORITY)]
        } else {
            node.value.iter().flat_map(|v| get_words(v)).collect()
        };
        HeaderContextElement {
            node_type: node.node_type().to_string(),
            priority: node.priority().unwrap_or(DEFAULT_PRIORITY),
            exact_match,
            words,
        }
    }

    pub fn text(&self) -> String {
        self.words.iter().map(|w| w.text.as_str()).collect()
    }
}

impl Comparable for HeaderContextElement {
    fn priority(&self) -> f64 {
        self.priority
    }

    fn same_kind(&self, other: &Self) -> bool {
        self.priority == other.priority && self.node_type == other.node_type && self.exact_match == other.exact_match
    }

    fn similarity(&self, other: &Self) -> f64 {
        if self.exact_match {
            if self.text() == other.text() { 1.0 } else { 0.0 }
        } else {
            levenshtein(&self.words, &other.words)
        }
    }
}

/// Header of a node: its value, or its leaves. The leaves whose type is declared as header core
/// for the type of the node form the core of the header.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct HeaderContext {
    pub sequence: Vec<HeaderContextElement>,
    pub core_indices: Vec<usize>,
    pub non_core_indices: Vec<usize>,
}

impl HeaderContext {
    pub fn new(tree: &Tree, node: NodeId) -> Self {
        let n = &tree[node];
        let header_core = n.header_core();
        let mut elements = Vec::new();
        if !n.value.is_empty() {
            elements.push(node);
        } else {
            let mut stack = n.children.iter().rev().copied().collect::<Vec<_>>();
            while let Some(current) = stack.pop() {
                let c = &tree[current];
                let leaf_like = c.children.iter().all(|gc| tree[*gc].is_custom_block());
                if leaf_like && c.priority().unwrap_or(DEFAULT_PRIORITY) > 0.0 {
                    elements.push(current);
                } else if c.is_custom_block() && c.children.len() > 2 {
                    // the contents of the block, without its delimiters
                    stack.extend(c.children[1..c.children.len() - 1].iter().rev());
                }
            }
        }
        let mut header = HeaderContext::default();
        for (i, e) in elements.into_iter().enumerate() {
            let e = &tree[e];
            let is_core = header_core.contains(&e.symbol) || e.alias.as_ref().map(|a| header_core.contains(a)).unwrap_or(false);
            if is_core {
                header.core_indices.push(i);
            } else {
                header.non_core_indices.push(i);
            }
            header.sequence.push(HeaderContextElement::from_node(e));
        }
        header
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn core(&self) -> Vec<&HeaderContextElement> {
        self.core_indices.iter().map(|i| &self.sequence[*i]).collect()
    }

    pub fn non_core(&self) -> Vec<&HeaderContextElement> {
        self.non_core_indices.iter().map(|i| &self.sequence[*i]).collect()
    }

    pub fn eq_by_core(&self, other: &HeaderContext) -> bool {
        self.core() == other.core()
    }
}

/// Land ancestor of a node.
#[derive(Clone, PartialEq, Debug)]
pub struct AncestorsContextElement {
    pub node_type: String,
    pub header: HeaderContext,
}

impl Comparable for AncestorsContextElement {
    fn similarity(&self, other: &Self) -> f64 {
        if self.node_type == other.node_type {
            levenshtein(&self.header.sequence, &other.header.sequence)
        } else {
            0.0
        }
    }
}

/// Nearest land ancestor of a node, custom blocks excluded.
pub fn land_ancestor(tree: &Tree, node: NodeId) -> Option<NodeId> {
    tree.ancestors(node).into_iter().find(|a| tree[*a].is_land() && !tree[*a].is_custom_block())
}

/// Land ancestors of the node, from the closest to the outermost.
pub fn ancestors_context(tree: &Tree, node: NodeId) -> Vec<AncestorsContextElement> {
    tree.ancestors(node).into_iter()
        .filter(|a| tree[*a].is_land() && !tree[*a].is_custom_block())
        .map(|a| AncestorsContextElement { node_type: tree[a].node_type().to_string(), header: HeaderContext::new(tree, a) })
        .collect()
}

/// Text of the inner structures of a node.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct InnerContext {
    pub content: TextOrHash,
}

impl InnerContext {
    pub fn new(file: &ParsedFile, node: NodeId, config: &FinderConfig) -> Self {
        let tree = &file.tree;
        let mut locations: Vec<SegmentLocation> = Vec::new();
        let mut stack = tree[node].children.iter().rev().copied().collect::<Vec<_>>();
        while let Some(current) = stack.pop() {
            let c = &tree[current];
            if c.children.is_empty() {
                continue;
            }
            if c.is_custom_block() {
                if c.children.len() > 2 {
                    stack.extend(c.children[1..c.children.len() - 1].iter().rev());
                }
            } else if let Some(location) = tree.location(current) {
                locations.push(location);
            }
        }
        let text = locations.iter()
            .filter_map(|l| file.text.get(l.start.offset..l.end.offset))
            .collect::<Vec<_>>()
            .join(" ");
        InnerContext { content: TextOrHash::with_limits(&text, config.min_text_length, config.max_text_length) }
    }
}

// ---------------------------------------------------------------------------------------------

/// Neighbourhood of a node on one side.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct SiblingsContextPart {
    /// text of all the siblings on that side
    pub all: TextOrHash,
    /// number of nodes of the same type on that side, in the whole file
    pub count: usize,
    /// type of the nearest sibling
    pub entity_type: Option<String>,
    /// hash of the normalized text of the nearest sibling
    pub entity_hash: Option<u64>,
    /// context of the nearest sibling of the same type, for the types that aren't unique
    pub nearest: Option<Box<PointContext>>,
}

impl SiblingsContextPart {
    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}

#[derive(Clone, PartialEq, Debug, Default)]
pub struct SiblingsContext {
    pub before: SiblingsContextPart,
    pub after: SiblingsContextPart,
}

impl SiblingsContext {
    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.after.is_empty()
    }

    /// Similarity of the siblings, each side weighted by the length of its text in `self`.
    pub fn similarity(&self, other: &SiblingsContext, min_score: f64) -> f64 {
        if self.is_empty() {
            return if other.is_empty() { 1.0 } else { 0.0 };
        }
        let before = self.before.all.similarity(&other.before.all, min_score);
        let after = self.after.all.similarity(&other.after.all, min_score);
        let (lb, la) = (self.before.all.text_length as f64, self.after.all.text_length as f64);
        (before * lb + after * la) / (lb + la)
    }
}

fn entity_hash(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.to_lowercase().chars().filter(|c| !c.is_whitespace()).collect::<String>().hash(&mut hasher);
    hasher.finish()
}

/// Land nodes at the level of `node` under its land ancestor: the non-land nodes are replaced
/// by their children.
fn land_level(tree: &Tree, ancestor: NodeId, node: NodeId) -> Vec<NodeId> {
    let mut siblings = tree[ancestor].children.clone();
    let mut i = 0;
    while i < siblings.len() {
        let s = siblings[i];
        if s != node && !tree[s].is_land() {
            siblings.splice(i..i + 1, tree[s].children.iter().copied());
        } else {
            i += 1;
        }
    }
    siblings
}

/// Builds the siblings context of `node`. With `count_only`, only the numbers of nodes of the same
/// type before and after the node are computed.
pub fn siblings_context(file: &ParsedFile, node: NodeId, config: &FinderConfig, count_only: bool) -> SiblingsContext {
    let tree = &file.tree;
    let mut context = SiblingsContext::default();
    let (Some(root), Some(location)) = (file.root, tree.location(node)) else {
        return context;
    };
    let node_type = tree[node].node_type();
    let same_type = GroupNodesByTypeVisitor::groups(tree, root, [node_type]).remove(node_type).unwrap_or_default();
    let mut ends = same_type.iter().filter_map(|n| tree.location(*n)).map(|l| l.end.offset).collect::<Vec<_>>();
    let mut starts = same_type.iter().filter_map(|n| tree.location(*n)).map(|l| l.start.offset).collect::<Vec<_>>();
    ends.sort_unstable();
    starts.sort_unstable();
    context.before.count = ends.partition_point(|e| *e <= location.start.offset);
    context.after.count = starts.len() - starts.partition_point(|s| *s < location.end.offset);
    if count_only {
        return context;
    }
    let ancestor = match land_ancestor(tree, node) {
        Some(a) => a,
        None if node != root => root,
        None => return context,
    };
    let mut siblings = land_level(tree, ancestor, node);
    let Some(index) = siblings.iter().position(|s| *s == node) else {
        return context;
    };
    siblings.remove(index);
    let (before, after) = siblings.split_at(index);
    let limits = (config.min_text_length, config.max_text_length);
    let all_text = |nodes: &[NodeId]| nodes.iter().map(|n| file.node_text(*n)).collect::<String>();
    context.before.all = TextOrHash::with_limits(&all_text(before), limits.0, limits.1);
    context.after.all = TextOrHash::with_limits(&all_text(after), limits.0, limits.1);
    if let Some(&b) = before.last() {
        context.before.entity_type = Some(tree[b].node_type().to_string());
        context.before.entity_hash = Some(entity_hash(file.node_text(b)));
    }
    if let Some(&a) = after.first() {
        context.after.entity_type = Some(tree[a].node_type().to_string());
        context.after.entity_hash = Some(entity_hash(file.node_text(a)));
    }
    if tree[node].is_not_unique() {
        let is_neighbour = |n: &&NodeId| tree[**n].node_type() == node_type && tree.location(**n).is_some();
        context.before.nearest = before.iter().rev().find(is_neighbour)
            .map(|n| Box::new(PointContext::build(file, *n, config, true)));
        context.after.nearest = after.iter().find(is_neighbour)
            .map(|n| Box::new(PointContext::build(file, *n, config, true)));
    }
    context
}

// ---------------------------------------------------------------------------------------------

/// Everything known about a marked node, to find it again in another version of its file.
#[derive(Clone, PartialEq, Debug)]
pub struct PointContext {
    pub node_type: String,
    /// line where the node starts
    pub line: u32,
    pub file: FileContext,
    pub header: HeaderContext,
    /// land ancestors, from the closest to the outermost
    pub ancestors: Vec<AncestorsContextElement>,
    pub inner: InnerContext,
    pub siblings: SiblingsContext,
    /// several nodes of that type may be identical
    pub not_unique: bool,
    /// contexts of the nodes of the file most similar to this one
    pub closest: Vec<PointContext>,
}

impl PointContext {
    /// Builds the context of `node`, without the closest contexts (see
    /// [ContextFinder::point_context](crate::markup::finder::ContextFinder::point_context)).
    pub fn new(file: &ParsedFile, node: NodeId, config: &FinderConfig) -> Self {
        PointContext::build(file, node, config, false)
    }

    pub(crate) fn build(file: &ParsedFile, node: NodeId, config: &FinderConfig, count_only: bool) -> Self {
        let tree = &file.tree;
        PointContext {
            node_type: tree[node].node_type().to_string(),
            line: tree.location(node).map(|l| l.start.line).unwrap_or(0),
            file: file.context.clone(),
            header: HeaderContext::new(tree, node),
            ancestors: ancestors_context(tree, node),
            inner: InnerContext::new(file, node, config),
            siblings: siblings_context(file, node, config, count_only),
            not_unique: tree[node].is_not_unique(),
            closest: Vec::new(),
        }
    }
}
