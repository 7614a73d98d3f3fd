// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

#![cfg(test)]

use super::*;
use super::visitors::*;
use land_core::lexer::Lexer;
use land_core::{CUSTOM_BLOCK_END_NAME, CUSTOM_BLOCK_START_NAME};
use crate::grammar::options::{CustomBlockOption, NodeOption, OptionValue, ParsingOption};
use crate::grammar::{Alternative, Grammar, GrammarKind};
use crate::stream::ComplexTokenStream;

fn loc(start: usize, end: usize) -> (PointLocation, PointLocation) {
    (PointLocation::new(1, start as u32 + 1, start), PointLocation::new(1, end as u32 + 1, end))
}

/// Adds a leaf with a value and a location.
fn leaf(tree: &mut Tree, parent: Option<NodeId>, symbol: &str, value: &str, start: usize) -> NodeId {
    let mut node = Node::new(symbol);
    node.value = vec![value.to_string()];
    let id = tree.add(node);
    let (s, e) = loc(start, start + value.len());
    tree.set_location(id, s, e);
    if let Some(p) = parent {
        tree.add_last_child(p, id);
    }
    id
}

fn inner(tree: &mut Tree, parent: Option<NodeId>, symbol: &str) -> NodeId {
    let id = tree.add(Node::new(symbol));
    if let Some(p) = parent {
        tree.add_last_child(p, id);
    }
    id
}

fn types(tree: &Tree, id: NodeId) -> Vec<String> {
    tree[id].children.iter().map(|c| tree[*c].node_type().to_string()).collect()
}

fn grammar() -> Grammar {
    let mut g = Grammar::new(GrammarKind::LL);
    g.declare_terminal("ID", Some("[a-z]+")).unwrap();
    g.declare_terminal("COMMA", Some(",")).unwrap();
    g.declare_nonterminal("s", vec![Alternative::from_symbols(&["list"])]).unwrap();
    g.declare_nonterminal("list", vec![Alternative::from_symbols(&["ID", "COMMA", "list"]), Alternative::from_symbols(&["ID"])]).unwrap();
    g.set_start_symbol("s").unwrap();
    g
}

#[test]
fn structure() {
    let mut tree = Tree::new();
    let root = inner(&mut tree, None, "s");
    tree.set_root(Some(root));
    let a = leaf(&mut tree, Some(root), "ID", "a", 0);
    let b = leaf(&mut tree, Some(root), "ID", "b", 2);
    let x = inner(&mut tree, None, "x");
    tree.insert_child(root, x, 1);
    leaf(&mut tree, Some(x), "ID", "c", 1);
    assert_eq!(tree.value(root), vec!["a", "c", "b"]);
    assert_eq!(tree.location(root).map(|l| (l.start.offset, l.end.offset)), Some((0, 3)));
    assert_eq!(tree.child_index(root, b), Some(2));
    tree.splice_child(root, 1);
    assert_eq!(tree[root].children.len(), 3);
    assert_eq!(tree[x].parent, None);
    assert_eq!(tree.ancestors(tree[root].children[1]), vec![root]);
    assert_eq!(tree.preorder(root).len(), 4);
    assert_eq!(tree.remove_child(root, 0), Some(a));
    assert_eq!(tree.remove_child(root, 5), None);
    assert_eq!(tree.to_string(), "s\n  ID: c\n  ID: b");
}

#[test]
fn value_and_text() {
    let source = "ab cd";
    let mut tree = Tree::new();
    let root = inner(&mut tree, None, "s");
    tree.set_root(Some(root));
    let a = leaf(&mut tree, Some(root), "ID", "ab", 0);
    leaf(&mut tree, Some(root), "ID", "cd", 3);
    assert_eq!(tree.value(root), vec!["ab", "cd"]);
    assert_eq!(tree.text(root, source), Some("ab cd"));
    tree.set_value(a, vec!["x".to_string()]);
    assert_eq!(tree.value(root), vec!["x", "cd"]);
    assert_eq!(tree.text(a, source), Some("ab"));
    assert_eq!(tree.text(a, ""), None);
}

#[test]
fn reset_children_location() {
    let mut tree = Tree::new();
    let root = inner(&mut tree, None, "s");
    let x = inner(&mut tree, Some(root), "x");
    let id = leaf(&mut tree, Some(x), "ID", "abc", 4);
    assert_eq!(tree[x].anchor(), None);
    assert_eq!(tree.location(x).map(|l| l.len()), Some(3));
    // an explicit anchor goes away with the children
    let anchor = tree.location(x).unwrap();
    tree.set_location(x, anchor.start, anchor.end);
    tree.reset_children(x);
    assert!(tree[x].children.is_empty());
    assert_eq!(tree[id].parent, None);
    assert_eq!(tree.location(x), None);
    assert_eq!(tree.location(root), None);
}

#[test]
fn remove_auto() {
    let mut tree = Tree::new();
    let root = inner(&mut tree, None, "s");
    tree.set_root(Some(root));
    leaf(&mut tree, Some(root), "ID", "a", 0);
    let auto = inner(&mut tree, Some(root), "auto__0");
    tree[auto].alias = Some("items".to_string());
    leaf(&mut tree, Some(auto), "ID", "b", 2);
    let nested = inner(&mut tree, Some(auto), "auto__1");
    leaf(&mut tree, Some(nested), "ID", "c", 4);
    tree.accept(&mut RemoveAutoVisitor);
    assert_eq!(types(&tree, root), vec!["ID", "ID", "ID"]);
    assert_eq!(tree[root].alias.as_deref(), Some("items"));
}

#[test]
fn ghost_void_list() {
    let mut g = grammar();
    g.set_option(NodeOption::List, &["list"], vec![]).unwrap();
    g.set_option(NodeOption::Void, &["COMMA"], vec![]).unwrap();
    let mut tree = Tree::new();
    let root = inner(&mut tree, None, "s");
    tree.set_root(Some(root));
    let l1 = inner(&mut tree, Some(root), "list");
    leaf(&mut tree, Some(l1), "ID", "a", 0);
    leaf(&mut tree, Some(l1), "COMMA", ",", 1);
    let l2 = inner(&mut tree, Some(l1), "list");
    leaf(&mut tree, Some(l2), "ID", "b", 2);
    // a local option of the node group hides the global ones
    let ghost = tree.add(Node::with_options("ID", SymbolOptions::new().with(NodeOption::Ghost, vec![]), Default::default()));
    tree.add_last_child(l2, ghost);
    leaf(&mut tree, Some(ghost), "ID", "c", 4);
    tree.accept(&mut GhostListVisitor::new(&g));
    assert_eq!(types(&tree, l1), vec!["ID", "ID", "ID"]);
    assert_eq!(tree.value(l1), vec!["a", "b", "c"]);
    assert_eq!(tree[ghost].parent, None);
    assert_eq!(tree[l2].parent, None);
}

#[test]
fn leaf_and_merge_any() {
    let mut g = grammar();
    g.set_option(NodeOption::Leaf, &["list"], vec![]).unwrap();
    let mut tree = Tree::new();
    let root = inner(&mut tree, None, "s");
    tree.set_root(Some(root));
    let l1 = inner(&mut tree, Some(root), "list");
    leaf(&mut tree, Some(l1), "ID", "a", 0);
    leaf(&mut tree, Some(l1), "ID", "b", 2);
    let any1 = leaf(&mut tree, Some(root), "Any", "c", 4);
    leaf(&mut tree, Some(root), "Any", "d", 6);
    leaf(&mut tree, Some(root), "ID", "e", 8);
    tree.accept(&mut LeafVisitor::new(&g));
    assert!(tree[l1].children.is_empty());
    assert_eq!(tree[l1].value, vec!["a", "b"]);
    assert_eq!(tree.location(l1).map(|l| (l.start.offset, l.end.offset)), Some((0, 3)));
    tree.accept(&mut MergeAnyVisitor);
    assert_eq!(types(&tree, root), vec!["list", "Any", "ID"]);
    assert_eq!(tree[any1].value, vec!["c", "d"]);
    assert_eq!(tree.location(any1).map(|l| (l.start.offset, l.end.offset)), Some((4, 7)));
}

#[test]
fn userify_and_markup() {
    let mut g = grammar();
    g.set_option(ParsingOption::Userify, &["list"], vec!["items".into()]).unwrap();
    g.set_option(MarkupOption::Land, &["list"], vec![]).unwrap();
    g.set_option(MarkupOption::Priority, &["ID"], vec![OptionValue::Number(2.0)]).unwrap();
    g.set_option(MarkupOption::ExactMatch, &["ID"], vec![]).unwrap();
    g.set_option(MarkupOption::HeaderCore, &["list"], vec![OptionValue::token_set(["ID"])]).unwrap();
    g.set_option(MarkupOption::NotUnique, &["list"], vec![]).unwrap();
    let mut tree = Tree::new();
    let root = inner(&mut tree, None, "s");
    tree.set_root(Some(root));
    let l1 = inner(&mut tree, Some(root), "list");
    let id = leaf(&mut tree, Some(l1), "ID", "a", 0);
    let l2 = inner(&mut tree, Some(l1), "list");
    let any = leaf(&mut tree, Some(l2), "Any", "b", 2);
    tree.accept(&mut UserifyVisitor::new(&g));
    assert_eq!(tree[l1].node_type(), "items");
    tree.accept(&mut MarkupOptionsVisitor::new(&g));
    assert!(tree[l1].is_land() && tree[l2].is_land() && !tree[root].is_land());
    assert!(tree[id].is_exact_match());
    assert_eq!(tree[id].priority(), Some(2.0));
    assert_eq!(tree[any].priority(), Some(0.0));
    assert_eq!(tree[root].priority(), Some(DEFAULT_PRIORITY));
    assert_eq!(tree[l2].header_core(), BTreeSet::from(["ID".to_string()]));
    assert!(tree[l1].is_not_unique() && !tree[root].is_not_unique());
    let mut explorer = LandExplorerVisitor::default();
    tree.accept(&mut explorer);
    assert_eq!(explorer.land, vec![l1, l2]);
    assert_eq!(explorer.high_level_land, vec![l1]);
    let groups = GroupNodesByTypeVisitor::groups(&tree, root, ["items", "ID", "unknown"]);
    assert_eq!(groups["items"], vec![l1, l2]);
    assert_eq!(groups["ID"], vec![id]);
    assert!(groups["unknown"].is_empty());
}

/// Builds a flat tree with one ID leaf per word, and the custom blocks of the text.
fn custom_block_tree(text: &str) -> (Tree, Vec<crate::stream::CustomBlockNode>, Vec<usize>) {
    let mut g = Grammar::new(GrammarKind::LL);
    g.declare_terminal("ID", Some("[a-z]+")).unwrap();
    g.declare_terminal("COMMENT", Some("//[^\n]*")).unwrap();
    g.declare_nonterminal("s", vec![Alternative::from_symbols(&["Any"])]).unwrap();
    g.set_start_symbol("s").unwrap();
    g.set_option(CustomBlockOption::BaseToken, &["COMMENT"], vec![]).unwrap();
    g.set_option(CustomBlockOption::Start, &[], vec!["//+".into()]).unwrap();
    g.set_option(CustomBlockOption::End, &[], vec!["//-".into()]).unwrap();
    let mut lexer = g.build_lexer().unwrap();
    let mut stream = ComplexTokenStream::new(&g, &mut lexer as &mut dyn Lexer, text);
    let mut tree = Tree::new();
    let root = inner(&mut tree, None, "s");
    tree.set_root(Some(root));
    loop {
        let token = stream.next_token();
        if token.name == land_core::EOF {
            break;
        }
        if token.name == 6 {
            let id = leaf(&mut tree, Some(root), "ID", &token.text, 0);
            tree.set_location(id, token.location.start, token.location.end);
        }
    }
    (tree, stream.custom_blocks().to_vec(), stream.top_blocks())
}

#[test]
fn insert_custom_blocks() {
    let text = "a\n//+ one\nb\nc\n//-\nd\n//+ two\n//-\n";
    let (mut tree, blocks, top) = custom_block_tree(text);
    let root = tree.root().unwrap();
    let block_locations = blocks.iter().map(|b| b.location).collect::<Vec<_>>();
    assert!(block_locations.iter().all(|l| can_insert_custom_block(&tree, root, l)));
    let generator = BaseNodeGenerator;
    let mut visitor = InsertCustomBlocksVisitor::new(&generator, &blocks, top);
    tree.accept(&mut visitor);
    assert_eq!(visitor.root(), Some(root));
    assert_eq!(visitor.bad_blocks().count(), 0);
    assert_eq!(types(&tree, root), vec!["ID", "custom_block", "ID", "custom_block"]);
    let one = tree[root].children[1];
    assert_eq!(types(&tree, one), vec![CUSTOM_BLOCK_START_NAME, "ID", "ID", CUSTOM_BLOCK_END_NAME]);
    assert_eq!(tree[tree[one].children[0]].value, vec!["one"]);
    let two = tree[root].children[3];
    assert_eq!(types(&tree, two), vec![CUSTOM_BLOCK_START_NAME, CUSTOM_BLOCK_END_NAME]);
}

#[test]
fn custom_block_around_root() {
    let text = "//+ all\na b\n//-\n";
    let (mut tree, blocks, top) = custom_block_tree(text);
    let root = tree.root().unwrap();
    let generator = BaseNodeGenerator;
    let mut visitor = InsertCustomBlocksVisitor::new(&generator, &blocks, top);
    tree.accept(&mut visitor);
    let new_root = visitor.root().unwrap();
    assert_ne!(new_root, root);
    assert!(tree[new_root].is_custom_block());
    assert_eq!(tree[new_root].children[1], root);
}

#[test]
fn custom_block_cutting_nodes() {
    let text = "a\n//+ one\nb\nc\n//-\n";
    let (mut tree, blocks, top) = custom_block_tree(text);
    let root = tree.root().unwrap();
    // groups 'a' and 'b' under one node, which the block cuts through
    let x = tree.add(Node::new("x"));
    for _ in 0..2 {
        let child = tree.remove_child(root, 0).unwrap();
        tree.add_last_child(x, child);
    }
    tree.insert_child(root, x, 0);
    assert_eq!(types(&tree, root), vec!["x", "ID"]);
    assert!(!can_insert_custom_block(&tree, root, &blocks[0].location));
    let generator = BaseNodeGenerator;
    let mut visitor = InsertCustomBlocksVisitor::new(&generator, &blocks, top);
    tree.accept(&mut visitor);
    assert_eq!(visitor.bad_blocks().map(|b| b.name.clone()).collect::<Vec<_>>(), vec!["one".to_string()]);
    assert_eq!(types(&tree, root), vec!["x", "ID"]);
}

#[test]
fn custom_block_inside_node() {
    let text = "a\n//+ one\nb\n//-\nc\n";
    let (mut tree, blocks, top) = custom_block_tree(text);
    let root = tree.root().unwrap();
    // the block only contains 'b', so it can go inside 'x'
    let x = tree.add(Node::new("x"));
    for _ in 0..2 {
        let child = tree.remove_child(root, 0).unwrap();
        tree.add_last_child(x, child);
    }
    tree.insert_child(root, x, 0);
    assert!(can_insert_custom_block(&tree, root, &blocks[0].location));
    let generator = BaseNodeGenerator;
    let mut visitor = InsertCustomBlocksVisitor::new(&generator, &blocks, top);
    tree.accept(&mut visitor);
    assert_eq!(visitor.bad_blocks().count(), 0);
    assert_eq!(types(&tree, x), vec!["ID", "custom_block"]);
}
