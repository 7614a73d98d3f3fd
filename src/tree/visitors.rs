// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

//! Post-processing of the parse trees, and visitors used by the markup.

use std::collections::{BTreeMap, BTreeSet};
use land_core::location::SegmentLocation;
use land_core::{CUSTOM_BLOCK_END_NAME, CUSTOM_BLOCK_RULE_NAME, CUSTOM_BLOCK_START_NAME};
use crate::grammar::options::{MarkupOption, NodeOption, OptionGroup, OptionValue};
use crate::grammar::{Grammar, AUTO_RULE_PREFIX};
use crate::stream::CustomBlockNode;
use crate::tree::{Node, NodeGenerator, NodeId, Tree, TreeVisitor, DEFAULT_PRIORITY};

/// Is the node option set locally on the node, or, if the node has no local node option,
/// globally on its symbol or its alias?
fn is_node_option_set(grammar: &Grammar, node: &Node, option: NodeOption) -> bool {
    node.options.is_set(option)
        || !node.options.groups().contains(&OptionGroup::Nodes)
        && grammar.is_node_option_set(option, &node.symbol, node.alias.as_deref())
}

/// Removes the nodes of the generated rules (quantifiers and groups). Their children are moved
/// to the parent.
pub struct RemoveAutoVisitor;

impl TreeVisitor for RemoveAutoVisitor {
    fn visit(&mut self, tree: &mut Tree, node: NodeId) {
        let mut i = 0;
        while i < tree[node].children.len() {
            let child = tree[node].children[i];
            if tree[child].symbol.starts_with(AUTO_RULE_PREFIX) {
                // the alias of a last generated child goes to the parent
                if i == tree[node].children.len() - 1 {
                    if let Some(alias) = tree[child].alias.clone() {
                        tree[node].alias = Some(alias);
                    }
                }
                tree.splice_child(node, i);
            } else {
                i += 1;
            }
        }
        self.visit_children(tree, node);
    }
}

/// Processes the `ghost`, `void` and `list` options.
pub struct GhostListVisitor<'g> {
    grammar: &'g Grammar,
}

impl<'g> GhostListVisitor<'g> {
    pub fn new(grammar: &'g Grammar) -> Self {
        GhostListVisitor { grammar }
    }
}

impl TreeVisitor for GhostListVisitor<'_> {
    fn visit(&mut self, tree: &mut Tree, node: NodeId) {
        let n = &tree[node];
        if is_node_option_set(self.grammar, n, NodeOption::List) {
            let list_for_alias = n.alias.as_deref().map(|a| self.grammar.options().is_set(NodeOption::List, Some(a))).unwrap_or(false);
            let list_for_symbol = n.options.is_set(NodeOption::List) || self.grammar.options().is_set(NodeOption::List, Some(n.symbol.as_str()));
            let (symbol, alias) = (n.symbol.clone(), n.alias.clone());
            let mut i = 0;
            while i < tree[node].children.len() {
                let child = &tree[tree[node].children[i]];
                if list_for_symbol && child.symbol == symbol || list_for_alias && child.alias.is_some() && child.alias == alias {
                    tree.splice_child(node, i);
                } else {
                    i += 1;
                }
            }
        }
        let mut i = 0;
        while i < tree[node].children.len() {
            let child = tree[node].children[i];
            if is_node_option_set(self.grammar, &tree[child], NodeOption::Void) {
                tree.remove_child(node, i);
            } else if is_node_option_set(self.grammar, &tree[child], NodeOption::Ghost) {
                tree.splice_child(node, i);
            } else {
                i += 1;
            }
        }
        self.visit_children(tree, node);
    }
}

/// Processes the `leaf` option: the text of the subtree becomes the value of the node.
pub struct LeafVisitor<'g> {
    grammar: &'g Grammar,
}

impl<'g> LeafVisitor<'g> {
    pub fn new(grammar: &'g Grammar) -> Self {
        LeafVisitor { grammar }
    }
}

impl TreeVisitor for LeafVisitor<'_> {
    fn visit(&mut self, tree: &mut Tree, node: NodeId) {
        if is_node_option_set(self.grammar, &tree[node], NodeOption::Leaf) {
            let value = tree.value(node);
            let location = tree.location(node);
            tree.reset_children(node);
            tree[node].value = value;
            if let Some(loc) = location {
                tree.set_location(node, loc.start, loc.end);
            }
        } else {
            self.visit_children(tree, node);
        }
    }
}

/// Merges consecutive `Any` nodes.
pub struct MergeAnyVisitor;

impl TreeVisitor for MergeAnyVisitor {
    fn visit(&mut self, tree: &mut Tree, node: NodeId) {
        let mut i = 1;
        while i < tree[node].children.len() {
            let (prev, cur) = (tree[node].children[i - 1], tree[node].children[i]);
            match tree.location(cur) {
                Some(cur_loc) if tree[prev].is_any() && tree[cur].is_any() => {
                    let start = tree.location(prev).map(|l| l.start).unwrap_or(cur_loc.start);
                    tree.set_location(prev, start, cur_loc.end);
                    let value = std::mem::take(&mut tree[cur].value);
                    tree[prev].value.extend(value);
                    tree.remove_child(node, i);
                }
                _ => i += 1,
            }
        }
        self.visit_children(tree, node);
    }
}

/// Sets the user name of the symbols.
pub struct UserifyVisitor<'g> {
    grammar: &'g Grammar,
}

impl<'g> UserifyVisitor<'g> {
    pub fn new(grammar: &'g Grammar) -> Self {
        UserifyVisitor { grammar }
    }
}

impl TreeVisitor for UserifyVisitor<'_> {
    fn visit(&mut self, tree: &mut Tree, node: NodeId) {
        let name = self.grammar.userify(&tree[node].symbol);
        tree[node].userified = Some(name);
        self.visit_children(tree, node);
    }
}

/// Sets the markup options of the nodes: land, exact match, priority, header core and
/// not-unique flags.
pub struct MarkupOptionsVisitor<'g> {
    grammar: &'g Grammar,
    land: BTreeSet<String>,
    priorities: BTreeMap<String, f64>,
}

impl<'g> MarkupOptionsVisitor<'g> {
    pub fn new(grammar: &'g Grammar) -> Self {
        let options = grammar.options();
        let land = options.symbols(MarkupOption::Land);
        let priorities = options.symbols(MarkupOption::Priority).into_iter()
            .filter_map(|s| {
                let priority = options.params(MarkupOption::Priority, Some(s.as_str())).iter().find_map(|p| p.as_number())?;
                Some((s, priority))
            })
            .collect();
        MarkupOptionsVisitor { grammar, land, priorities }
    }
}

fn set_priority(node: &mut Node, priority: f64) {
    node.options.clear(MarkupOption::Priority);
    node.options.set(MarkupOption::Priority, vec![OptionValue::Number(priority)]);
}

impl TreeVisitor for MarkupOptionsVisitor<'_> {
    fn visit(&mut self, tree: &mut Tree, node: NodeId) {
        if tree[node].is_custom_block() {
            tree[node].options.set(MarkupOption::Land, vec![]);
            let children = &tree[node].children;
            let delimiters = [children.first().copied(), children.last().copied()];
            for d in delimiters.into_iter().flatten() {
                tree[d].options.set(MarkupOption::ExactMatch, vec![]);
                set_priority(&mut tree[d], DEFAULT_PRIORITY);
            }
        }
        let options = self.grammar.options();
        let n = &tree[node];
        let alias = n.alias.as_deref();
        let is_land = self.land.contains(&n.symbol) || alias.map(|a| self.land.contains(a)).unwrap_or(false);
        let exact = options.is_set(MarkupOption::ExactMatch, Some(n.symbol.as_str()))
            || alias.map(|a| options.is_set(MarkupOption::ExactMatch, Some(a))).unwrap_or(false);
        let priority = if n.priority().is_none() {
            Some(alias.and_then(|a| self.priorities.get(a))
                .or_else(|| self.priorities.get(&n.symbol))
                .copied()
                .unwrap_or(if n.is_any() { 0.0 } else { DEFAULT_PRIORITY }))
        } else {
            None
        };
        let inherited = [MarkupOption::HeaderCore, MarkupOption::NotUnique].into_iter()
            .filter(|o| !n.options.is_set(*o))
            .filter_map(|o| {
                let params = alias.filter(|a| options.is_set(o, Some(*a)))
                    .or(Some(n.symbol.as_str()).filter(|s| options.is_set(o, Some(*s))))
                    .map(|s| options.params(o, Some(s)).to_vec())?;
                Some((o, params))
            })
            .collect::<Vec<_>>();
        let n = &mut tree[node];
        for (option, params) in inherited {
            n.options.set(option, params);
        }
        if is_land && !n.is_land() {
            n.options.set(MarkupOption::Land, vec![]);
        }
        if exact && !n.is_exact_match() {
            n.options.set(MarkupOption::ExactMatch, vec![]);
        }
        if let Some(priority) = priority {
            set_priority(n, priority);
        }
        self.visit_children(tree, node);
    }
}

// ---------------------------------------------------------------------------------------------

/// Inserts the custom blocks found by the token stream in the tree. Each block becomes a
/// `custom_block` node with the start and end delimiter nodes as first and last children, and
/// the nodes it contains in between.
///
/// A block that doesn't nest properly in the tree structure is left out and reported in
/// [InsertCustomBlocksVisitor::bad_blocks].
pub struct InsertCustomBlocksVisitor<'a> {
    generator: &'a dyn NodeGenerator,
    blocks: &'a [CustomBlockNode],
    top_blocks: Vec<usize>,
    bad_blocks: Vec<usize>,
    root: Option<NodeId>,
}

impl<'a> InsertCustomBlocksVisitor<'a> {
    /// `blocks` are all the blocks, and `top_blocks` the indices of the blocks that aren't
    /// nested in another block.
    pub fn new(generator: &'a dyn NodeGenerator, blocks: &'a [CustomBlockNode], top_blocks: Vec<usize>) -> Self {
        InsertCustomBlocksVisitor { generator, blocks, top_blocks, bad_blocks: Vec::new(), root: None }
    }

    /// Root of the tree after the insertion, which may be a custom block.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn bad_blocks(&self) -> impl Iterator<Item = &CustomBlockNode> {
        self.bad_blocks.iter().map(|b| &self.blocks[*b])
    }

    fn node_from(&self, tree: &mut Tree, block: usize) -> NodeId {
        let block = &self.blocks[block];
        let node = tree.add(self.generator.generate(CUSTOM_BLOCK_RULE_NAME, Default::default(), Default::default()));
        let mut start = self.generator.generate(CUSTOM_BLOCK_START_NAME, Default::default(), Default::default());
        start.value = vec![block.name.clone()];
        let start = tree.add(start);
        tree.set_location(start, block.start.start, block.start.end);
        tree.add_last_child(node, start);
        let end = tree.add(self.generator.generate(CUSTOM_BLOCK_END_NAME, Default::default(), Default::default()));
        if let Some(loc) = block.end {
            tree.set_location(end, loc.start, loc.end);
        }
        tree.add_last_child(node, end);
        node
    }

    fn location(&self, block: usize) -> SegmentLocation {
        self.blocks[block].location
    }

    /// Replaces the block in the list by its children.
    fn expand(&self, blocks: &mut Vec<usize>, block: usize) {
        if let Some(index) = blocks.iter().position(|b| *b == block) {
            blocks.splice(index..index + 1, self.blocks[block].children.iter().copied());
        }
    }

    fn visit_node(&mut self, tree: &mut Tree, node: NodeId, mut blocks: Vec<usize>) {
        while !blocks.is_empty() {
            for block in blocks.clone() {
                let block_loc = self.location(block);
                let children = tree[node].children.clone();
                let crossing_or_outer = children.iter().any(|c| tree.location(*c)
                    .map(|l| l.crosses(&block_loc) || (l.includes(&block_loc) && l != block_loc))
                    .unwrap_or(false));
                if crossing_or_outer {
                    continue;
                }
                let inner = children.iter().enumerate()
                    .filter(|(_, c)| tree.location(**c).map(|l| block_loc.includes(&l)).unwrap_or(false))
                    .map(|(i, _)| i)
                    .collect::<Vec<_>>();
                let new_node = self.node_from(tree, block);
                if let (Some(&first), Some(&last)) = (inner.first(), inner.last()) {
                    for _ in first..=last {
                        if let Some(child) = tree.remove_child(node, first) {
                            let pos = tree[new_node].children.len() - 1;
                            tree.insert_child(new_node, child, pos);
                        }
                    }
                    tree.insert_child(node, new_node, first);
                } else {
                    let position = children.iter()
                        .position(|c| tree.location(*c).map(|l| l.start.offset >= block_loc.end.offset).unwrap_or(false))
                        .unwrap_or(children.len());
                    tree.insert_child(node, new_node, position);
                }
                self.expand(&mut blocks, block);
            }
            let located = tree[node].children.iter()
                .filter_map(|c| tree.location(*c).map(|l| (*c, l)))
                .collect::<Vec<_>>();
            for (i, (child, loc)) in located.iter().enumerate() {
                let inner_blocks = blocks.iter().copied()
                    .filter(|b| {
                        let b_loc = self.location(*b);
                        let apart = |other: Option<&(NodeId, SegmentLocation)>|
                            other.map(|(_, o)| !b_loc.crosses(o) && !b_loc.includes(o)).unwrap_or(true);
                        loc.crosses(&b_loc) && apart(located.get(i + 1)) && (i == 0 || apart(located.get(i - 1)))
                            || loc.includes(&b_loc) && *loc != b_loc
                    })
                    .collect::<Vec<_>>();
                if !inner_blocks.is_empty() {
                    blocks.retain(|b| !inner_blocks.contains(b));
                    self.visit_node(tree, *child, inner_blocks);
                }
            }
            self.bad_blocks.extend(blocks.iter().copied());
            blocks = blocks.iter().flat_map(|b| self.blocks[*b].children.iter().copied()).collect();
        }
    }
}

impl TreeVisitor for InsertCustomBlocksVisitor<'_> {
    fn visit(&mut self, tree: &mut Tree, root: NodeId) {
        let mut blocks = self.top_blocks.clone();
        let find_outer = |tree: &Tree, blocks: &[usize]| {
            let root_loc = tree.location(root)?;
            blocks.iter().copied().find(|b| self.blocks[*b].location.includes(&root_loc))
        };
        while let Some(outer) = find_outer(tree, &blocks) {
            let new_node = self.node_from(tree, outer);
            if let Some(parent) = tree[root].parent {
                tree.replace_child(parent, new_node, 1);
            }
            tree.insert_child(new_node, root, 1);
            self.expand(&mut blocks, outer);
        }
        let mut top = root;
        while let Some(parent) = tree[top].parent {
            top = parent;
        }
        self.root = Some(top);
        self.visit_node(tree, root, blocks);
    }
}

/// Can a custom block with that location be inserted in the tree without cutting through
/// a node?
pub fn can_insert_custom_block(tree: &Tree, root: NodeId, block: &SegmentLocation) -> bool {
    if tree[root].is_any() || tree.location(root).map(|l| block.includes(&l)).unwrap_or(false) {
        return true;
    }
    let mut node = root;
    loop {
        let children = &tree[node].children;
        let located = children.iter().filter_map(|c| tree.location(*c).map(|l| (*c, l))).collect::<Vec<_>>();
        let included = located.iter().filter(|(_, l)| block.includes(l)).collect::<Vec<_>>();
        let crossing = located.iter().filter(|(_, l)| block.crosses(l)).collect::<Vec<_>>();
        let outer = located.iter().filter(|(_, l)| l.includes(block) && l != block).collect::<Vec<_>>();
        if outer.len() == 1 {
            let (child, _) = outer[0];
            if tree[*child].is_any() && tree[*child].children.is_empty() {
                return true;
            }
            node = *child;
        } else if crossing.len() == 1 && included.is_empty() {
            let (child, _) = crossing[0];
            if tree[*child].is_any() && tree[*child].children.is_empty() {
                return true;
            }
            if tree[*child].is_custom_block() {
                return false;
            }
            node = *child;
        } else {
            // a block can't contain the delimiter of the block it's in
            let node_loc = tree.location(node);
            let on_delimiter_line = tree[node].is_custom_block() && included.iter().any(|(_, l)| {
                node_loc.map(|n| l.start.line == n.start.line || l.start.line == n.end.line).unwrap_or(false)
            });
            return !included.is_empty() && crossing.is_empty() && !on_delimiter_line
                || included.is_empty() && crossing.is_empty();
        }
    }
}

// ---------------------------------------------------------------------------------------------

/// Collects the land nodes, and the land nodes which aren't inside another land node.
#[derive(Default)]
pub struct LandExplorerVisitor {
    pub land: Vec<NodeId>,
    pub high_level_land: Vec<NodeId>,
    in_land: bool,
}

impl TreeVisitor for LandExplorerVisitor {
    fn visit(&mut self, tree: &mut Tree, node: NodeId) {
        let mut is_high_level = false;
        if tree[node].is_land() {
            self.land.push(node);
            if !self.in_land {
                self.high_level_land.push(node);
                is_high_level = true;
                self.in_land = true;
            }
        }
        self.visit_children(tree, node);
        if is_high_level {
            self.in_land = false;
        }
    }
}

/// Groups the located nodes by type, for the given types.
pub struct GroupNodesByTypeVisitor {
    pub grouped: BTreeMap<String, Vec<NodeId>>,
}

impl GroupNodesByTypeVisitor {
    pub fn new<I: IntoIterator<Item = T>, T: Into<String>>(types: I) -> Self {
        GroupNodesByTypeVisitor { grouped: types.into_iter().map(|t| (t.into(), Vec::new())).collect() }
    }

    /// Groups the nodes under `root`. The tree isn't modified.
    pub fn groups<I: IntoIterator<Item = T>, T: Into<String>>(tree: &Tree, root: NodeId, types: I) -> BTreeMap<String, Vec<NodeId>> {
        let mut grouped: BTreeMap<String, Vec<NodeId>> = types.into_iter().map(|t| (t.into(), Vec::new())).collect();
        for node in tree.preorder(root) {
            if let Some(group) = grouped.get_mut(tree[node].node_type()) {
                if tree.location(node).is_some() {
                    group.push(node);
                }
            }
        }
        grouped
    }
}

impl TreeVisitor for GroupNodesByTypeVisitor {
    fn visit(&mut self, tree: &mut Tree, node: NodeId) {
        let located = tree.location(node).is_some();
        if let Some(group) = self.grouped.get_mut(tree[node].node_type()) {
            if located {
                group.push(node);
            }
        }
        self.visit_children(tree, node);
    }
}
