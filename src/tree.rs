// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

//! Parse tree.
//!
//! The nodes are stored in an arena and identified by their index. Each node knows its parent,
//! which is used to walk up the tree during the error recovery and to build the point contexts.
//! Detached nodes stay in the arena but are no longer reachable from the root.

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::ops::{Index, IndexMut};
use land_core::location::{PointLocation, SegmentLocation};
use land_core::{ANY_NAME, CUSTOM_BLOCK_RULE_NAME};
use crate::grammar::args::SymbolArguments;
use crate::grammar::options::{MarkupOption, SymbolOptions};

pub mod visitors;
pub(crate) mod tests;

pub type NodeId = usize;

/// Priority of a node in the header of its parent, when none is declared.
pub const DEFAULT_PRIORITY: f64 = 1.0;

#[derive(Clone, PartialEq, Debug)]
pub struct Node {
    /// grammar symbol of the node
    pub symbol: String,
    /// name of the symbol for the end user
    pub userified: Option<String>,
    /// alias given by the alternative that produced the node
    pub alias: Option<String>,
    /// text of the tokens of a leaf
    pub value: Vec<String>,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
    pub options: SymbolOptions,
    pub arguments: SymbolArguments,
    /// location set explicitly; otherwise it's computed from the children
    anchor: Option<SegmentLocation>,
}

impl Node {
    pub fn new<T: Into<String>>(symbol: T) -> Self {
        Node::with_options(symbol, SymbolOptions::new(), SymbolArguments::new())
    }

    pub fn with_options<T: Into<String>>(symbol: T, options: SymbolOptions, arguments: SymbolArguments) -> Self {
        Node {
            symbol: symbol.into(),
            userified: None,
            alias: None,
            value: Vec::new(),
            children: Vec::new(),
            parent: None,
            options,
            arguments,
            anchor: None,
        }
    }

    /// Type of the node: its alias, otherwise the user name of its symbol.
    pub fn node_type(&self) -> &str {
        self.alias.as_deref()
            .or(self.userified.as_deref())
            .unwrap_or(&self.symbol)
    }

    pub fn is_any(&self) -> bool {
        self.symbol == ANY_NAME
    }

    pub fn is_custom_block(&self) -> bool {
        self.symbol == CUSTOM_BLOCK_RULE_NAME
    }

    pub fn anchor(&self) -> Option<SegmentLocation> {
        self.anchor
    }

    pub fn priority(&self) -> Option<f64> {
        self.options.number(MarkupOption::Priority)
    }

    pub fn is_land(&self) -> bool {
        self.options.is_set(MarkupOption::Land)
    }

    pub fn is_exact_match(&self) -> bool {
        self.options.is_set(MarkupOption::ExactMatch)
    }

    /// Several nodes of that type may be identical, so their neighbours matter.
    pub fn is_not_unique(&self) -> bool {
        self.options.is_set(MarkupOption::NotUnique)
    }

    /// Symbols and aliases of the children forming the core of the header.
    pub fn header_core(&self) -> BTreeSet<String> {
        self.options.names(MarkupOption::HeaderCore)
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.node_type())?;
        if !self.value.is_empty() {
            write!(f, ": {}", self.value.iter().map(|v| v.trim()).collect::<Vec<_>>().join(" "))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------------------------

/// Creates the nodes for the parsers, so that both parsers produce the same node shapes.
pub trait NodeGenerator {
    fn generate(&self, symbol: &str, options: SymbolOptions, arguments: SymbolArguments) -> Node;
}

#[derive(Clone, Copy, Default, Debug)]
pub struct BaseNodeGenerator;

impl NodeGenerator for BaseNodeGenerator {
    fn generate(&self, symbol: &str, options: SymbolOptions, arguments: SymbolArguments) -> Node {
        Node::with_options(symbol, options, arguments)
    }
}

/// Visitor of a tree. The default implementation visits the children in order, after
/// reading the list of children, so a visitor may modify the children of the node before
/// calling [TreeVisitor::visit_children].
pub trait TreeVisitor {
    fn visit(&mut self, tree: &mut Tree, node: NodeId) {
        self.visit_children(tree, node);
    }

    fn visit_children(&mut self, tree: &mut Tree, node: NodeId) {
        let children = tree[node].children.clone();
        for child in children {
            self.visit(tree, child);
        }
    }
}

// ---------------------------------------------------------------------------------------------

#[derive(Clone, PartialEq, Debug, Default)]
pub struct Tree {
    nodes: Vec<Node>,
    root: Option<NodeId>,
}

impl Tree {
    pub fn new() -> Self {
        Tree { nodes: Vec::new(), root: None }
    }

    pub fn add(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn set_root(&mut self, root: Option<NodeId>) {
        if let Some(id) = root {
            self.nodes[id].parent = None;
        }
        self.root = root;
    }

    /// Number of nodes in the arena, including detached ones.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // -- location

    /// Location of the node: the anchor if it's set, otherwise the union of the locations
    /// of its children.
    pub fn location(&self, id: NodeId) -> Option<SegmentLocation> {
        let node = &self.nodes[id];
        if node.anchor.is_some() {
            return node.anchor;
        }
        node.children.iter().fold(None, |acc, c| SegmentLocation::smart_merge(acc, self.location(*c)))
    }

    pub fn set_location(&mut self, id: NodeId, start: PointLocation, end: PointLocation) {
        self.nodes[id].anchor = Some(SegmentLocation::new(start, end));
    }

    pub fn reset_location(&mut self, id: NodeId) {
        self.nodes[id].anchor = None;
    }

    // -- structure

    /// Text of the node: its own value or the concatenated values of its children.
    pub fn value(&self, id: NodeId) -> Vec<String> {
        let node = &self.nodes[id];
        if !node.value.is_empty() {
            return node.value.clone();
        }
        node.children.iter().flat_map(|c| self.value(*c)).collect()
    }

    pub fn set_value(&mut self, id: NodeId, value: Vec<String>) {
        self.nodes[id].value = value;
    }

    /// Text of the source covered by the node.
    pub fn text<'t>(&self, id: NodeId, source: &'t str) -> Option<&'t str> {
        self.location(id).and_then(|l| source.get(l.start.offset..l.end.offset))
    }

    pub fn add_last_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent].children.push(child);
        self.nodes[child].parent = Some(parent);
    }

    pub fn add_first_child(&mut self, parent: NodeId, child: NodeId) {
        self.insert_child(parent, child, 0);
    }

    pub fn insert_child(&mut self, parent: NodeId, child: NodeId, position: usize) {
        let position = position.min(self.nodes[parent].children.len());
        self.nodes[parent].children.insert(position, child);
        self.nodes[child].parent = Some(parent);
    }

    /// Replaces the child at `position`; the replaced node is detached.
    pub fn replace_child(&mut self, parent: NodeId, child: NodeId, position: usize) {
        if position < self.nodes[parent].children.len() {
            let old = self.nodes[parent].children[position];
            self.nodes[old].parent = None;
            self.nodes[parent].children[position] = child;
            self.nodes[child].parent = Some(parent);
        }
    }

    pub fn remove_child(&mut self, parent: NodeId, position: usize) -> Option<NodeId> {
        if position < self.nodes[parent].children.len() {
            let old = self.nodes[parent].children.remove(position);
            self.nodes[old].parent = None;
            Some(old)
        } else {
            None
        }
    }

    /// Replaces the child at `position` by its own children.
    pub fn splice_child(&mut self, parent: NodeId, position: usize) {
        if let Some(old) = self.remove_child(parent, position) {
            let grandchildren = std::mem::take(&mut self.nodes[old].children);
            for (i, gc) in grandchildren.into_iter().enumerate() {
                self.insert_child(parent, gc, position + i);
            }
        }
    }

    pub fn child_index(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        self.nodes[parent].children.iter().position(|c| *c == child)
    }

    pub fn reset_children(&mut self, id: NodeId) {
        let children = std::mem::take(&mut self.nodes[id].children);
        for c in children {
            self.nodes[c].parent = None;
        }
        self.nodes[id].anchor = None;
    }

    /// Removes the children, the value and the location.
    pub fn reset(&mut self, id: NodeId) {
        self.reset_children(id);
        self.nodes[id].value.clear();
    }

    /// Nodes under `id` in depth-first pre-order, `id` included.
    pub fn preorder(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            result.push(n);
            stack.extend(self.nodes[n].children.iter().rev());
        }
        result
    }

    /// Ancestors of the node, from its parent to the root.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut current = self.nodes[id].parent;
        while let Some(p) = current {
            result.push(p);
            current = self.nodes[p].parent;
        }
        result
    }

    /// Depth of the node, the root being at depth 0.
    pub fn depth(&self, id: NodeId) -> usize {
        self.ancestors(id).len()
    }

    /// Runs a visitor from the root.
    pub fn accept<V: TreeVisitor + ?Sized>(&mut self, visitor: &mut V) {
        if let Some(root) = self.root {
            visitor.visit(self, root);
        }
    }

    /// Indented representation of the tree under `id`, one node per line.
    pub fn to_string_at(&self, id: NodeId) -> String {
        let mut lines = Vec::new();
        let mut stack = vec![(id, 0)];
        while let Some((n, indent)) = stack.pop() {
            lines.push(format!("{:indent$}{}", "", self.nodes[n], indent = indent * 2));
            stack.extend(self.nodes[n].children.iter().rev().map(|c| (*c, indent + 1)));
        }
        lines.join("\n")
    }
}

impl Index<NodeId> for Tree {
    type Output = Node;

    fn index(&self, index: NodeId) -> &Self::Output {
        &self.nodes[index]
    }
}

impl IndexMut<NodeId> for Tree {
    fn index_mut(&mut self, index: NodeId) -> &mut Self::Output {
        &mut self.nodes[index]
    }
}

impl Display for Tree {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.root {
            Some(root) => write!(f, "{}", self.to_string_at(root)),
            None => write!(f, "<empty>"),
        }
    }
}
