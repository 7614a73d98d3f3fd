// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

#![cfg(test)]

use std::time::Duration;
use land_core::log::LogStatus;
use land_core::CollectJoin;
use crate::grammar::args::AnyArgument;
use crate::grammar::options::{CustomBlockOption, ParsingOption};
use crate::grammar::{Alternative, Entry, GrammarKind, Quantifier};
use crate::parser::ll::LlParser;
use crate::parser::lr::LrParser;
use crate::tree::TreeVisitor;
use super::*;

fn alt(symbols: &[&str]) -> Alternative {
    Alternative::from_symbols(symbols)
}

fn any_nodes(output: &ParseOutput) -> Vec<String> {
    let Some(root) = output.root else { return vec![] };
    output.tree.preorder(root).into_iter()
        .filter(|n| output.tree[*n].is_any())
        .map(|n| output.tree[n].value.join(" "))
        .to_vec()
}

fn warnings(log: &BufLog) -> Vec<String> {
    log.get_warnings().map(|m| m.text.clone()).to_vec()
}

fn expression_grammar(kind: GrammarKind) -> Grammar {
    let mut g = Grammar::new(kind);
    g.declare_terminal("PLUS", Some(r"\+")).unwrap();
    g.declare_terminal("LPAR", Some(r"\(")).unwrap();
    g.declare_terminal("RPAR", Some(r"\)")).unwrap();
    g.declare_terminal("ID", Some("[a-z]+")).unwrap();
    match kind {
        GrammarKind::LL => {
            g.declare_nonterminal("expr", vec![alt(&["term", "expr_rest"])]).unwrap();
            g.declare_nonterminal("expr_rest", vec![alt(&["PLUS", "term", "expr_rest"]), alt(&[])]).unwrap();
        }
        GrammarKind::LR => {
            g.declare_nonterminal("expr", vec![alt(&["expr", "PLUS", "term"]), alt(&["term"])]).unwrap();
        }
    }
    g.declare_nonterminal("term", vec![alt(&["ID"]), alt(&["LPAR", "expr", "RPAR"])]).unwrap();
    g.set_start_symbol("expr").unwrap();
    g
}

/// `program -> stmt*`, with statements that may start with `Any`.
fn statement_grammar(kind: GrammarKind, recovery: bool) -> Grammar {
    let mut g = Grammar::new(kind);
    g.declare_terminal("IF", Some("if")).unwrap();
    g.declare_terminal("THEN", Some("then")).unwrap();
    g.declare_terminal("ELSE", Some("else")).unwrap();
    g.declare_terminal("ID", Some("[a-z]+")).unwrap();
    g.declare_terminal("ASSIGN", Some("=")).unwrap();
    g.declare_terminal("SEMI", Some(";")).unwrap();
    let stmts = g.generate_nonterminal("stmt", Quantifier::ZeroOrMore, false);
    g.declare_nonterminal("program", vec![alt(&[stmts.as_str()])]).unwrap();
    g.declare_nonterminal("stmt", vec![
        alt(&["IF", "ID", "THEN", "stmt"]),
        alt(&["ID", "ASSIGN", "ID", "SEMI"]),
        alt(&["Any", "SEMI"]),
    ]).unwrap();
    g.set_start_symbol("program").unwrap();
    if recovery {
        g.set_option(ParsingOption::Recovery, &["stmt"], vec![]).unwrap();
    }
    g
}

/// `call -> ID ( Any ) ;` with declared parentheses.
fn call_grammar(kind: GrammarKind) -> Grammar {
    let mut g = Grammar::new(kind);
    g.declare_terminal("LPAR", Some(r"\(")).unwrap();
    g.declare_terminal("RPAR", Some(r"\)")).unwrap();
    g.declare_terminal("ID", Some("[a-z]+")).unwrap();
    g.declare_terminal("SEMI", Some(";")).unwrap();
    g.declare_pair("parens", &["LPAR"], &["RPAR"]).unwrap();
    g.declare_nonterminal("call", vec![alt(&["ID", "LPAR", "Any", "RPAR", "SEMI"])]).unwrap();
    g.set_start_symbol("call").unwrap();
    g
}

fn parsers(g: Grammar) -> Box<dyn Parser> {
    match g.kind() {
        GrammarKind::LL => Box::new(LlParser::new(g).unwrap()),
        GrammarKind::LR => Box::new(LrParser::new(g).unwrap()),
    }
}

// ---------------------------------------------------------------------------------------------

#[test]
fn statistics_add() {
    let a = Statistics {
        chars_count: 10, tokens_count: 4, general_time: Duration::from_millis(5), recovery_time: Duration::from_millis(1),
        recovery_times: 1, recovery_times_any: 3, longest_rollback: 2,
    };
    let b = Statistics {
        chars_count: 5, tokens_count: 2, general_time: Duration::from_millis(5), recovery_time: Duration::ZERO,
        recovery_times: 2, recovery_times_any: 1, longest_rollback: 4,
    };
    let sum = a + b;
    assert_eq!(sum.chars_count, 15);
    assert_eq!(sum.tokens_count, 6);
    assert_eq!(sum.general_time, Duration::from_millis(10));
    assert_eq!(sum.recovery_times, 3);
    assert_eq!(sum.recovery_times_any, 4);
    assert_eq!(sum.longest_rollback, 4);
    assert!(sum.to_string().contains("recoveries: 3"));
}

#[test]
fn parse_expressions() {
    for kind in [GrammarKind::LL, GrammarKind::LR] {
        let mut parser = parsers(expression_grammar(kind));
        let text = "a + (b + c)";
        let output = parser.parse(text);
        assert!(output.log.has_no_errors(), "{kind:?}: {}", output.log);
        let root = output.root.unwrap();
        assert_eq!(output.tree[root].symbol, "expr");
        assert_eq!(output.tree.value(root).join(" "), "a + ( b + c )");
        // locations cover the whole text
        assert_eq!(output.tree.location(root).map(|l| l.extract(text)), Some(text));
        assert_eq!(output.statistics.chars_count, text.len());
        assert_eq!(output.statistics.tokens_count, 8);
    }
}

#[test]
fn ll_table_conflict() {
    let mut g = Grammar::new(GrammarKind::LL);
    g.declare_terminal("A", Some("a")).unwrap();
    g.declare_terminal("B", Some("b")).unwrap();
    g.declare_terminal("C", Some("c")).unwrap();
    g.declare_nonterminal("s", vec![alt(&["A", "B"]), alt(&["A", "C"])]).unwrap();
    g.set_start_symbol("s").unwrap();
    match LlParser::new(g) {
        Err(ParserError::InvalidGrammar(log)) => {
            assert_eq!(log.num_errors(), 1, "{log}");
            assert!(log.get_errors().next().unwrap().text.contains("isn't LL(1)"));
        }
        _ => panic!("the grammar should be rejected"),
    }
}

#[test]
fn wrong_grammar_kind() {
    assert!(matches!(LrParser::new(expression_grammar(GrammarKind::LL)), Err(ParserError::InvalidGrammar(_))));
    assert!(matches!(LlParser::new(expression_grammar(GrammarKind::LR)), Err(ParserError::InvalidGrammar(_))));
}

#[test]
fn ll_table_csv() {
    let parser = LlParser::new(expression_grammar(GrammarKind::LL)).unwrap();
    let csv = parser.table().to_csv(parser.grammar());
    let lines = csv.lines().to_vec();
    assert!(lines[0].starts_with(",EOF,Any,ERROR"));
    assert_eq!(lines.len(), 1 + parser.grammar().num_nt());
    assert!(lines.iter().any(|l| l.starts_with("term,") && l.contains("LPAR expr RPAR")));
}

#[test]
fn lr_shift_reduce_conflict() {
    let mut g = Grammar::new(GrammarKind::LR);
    g.declare_terminal("IF", Some("if")).unwrap();
    g.declare_terminal("THEN", Some("then")).unwrap();
    g.declare_terminal("ELSE", Some("else")).unwrap();
    g.declare_terminal("ID", Some("[a-z]+")).unwrap();
    g.declare_terminal("SEMI", Some(";")).unwrap();
    g.declare_nonterminal("stmt", vec![
        alt(&["IF", "ID", "THEN", "stmt"]),
        alt(&["IF", "ID", "THEN", "stmt", "ELSE", "stmt"]),
        alt(&["ID", "SEMI"]),
    ]).unwrap();
    g.set_start_symbol("stmt").unwrap();
    let mut parser = LrParser::new(g).unwrap();
    assert!(warnings(parser.grammar().get_log()).iter().any(|w| w.contains("shift/reduce conflict")));
    let output = parser.parse("if a then if b then c; else d;");
    assert!(output.log.has_no_errors(), "{}", output.log);
    let root = output.root.unwrap();
    // the ELSE belongs to the inner statement
    assert_eq!(output.tree[root].children.len(), 4);
    let inner = output.tree[root].children[3];
    assert_eq!(output.tree[inner].children.len(), 6);
}

#[test]
fn lr_any_conflict() {
    let mut g = Grammar::new(GrammarKind::LR);
    g.declare_terminal("A", Some("a")).unwrap();
    g.declare_terminal("B", Some("b")).unwrap();
    g.declare_terminal("C", Some("c")).unwrap();
    g.declare_nonterminal("s", vec![alt(&["A", "Any", "B"]), alt(&["A", "Any", "C"])]).unwrap();
    g.set_start_symbol("s").unwrap();
    match LrParser::new(g) {
        Err(ParserError::InvalidGrammar(log)) => {
            assert!(log.get_errors().any(|m| m.text.contains("Any conflict")), "{log}");
        }
        _ => panic!("the grammar should be rejected"),
    }
}

#[test]
fn lr_state_description() {
    let parser = LrParser::new(expression_grammar(GrammarKind::LR)).unwrap();
    let table = parser.table();
    assert!(table.num_states() > 1);
    let description = table.state_to_string(parser.grammar(), 0, None);
    assert!(description.contains("• expr"), "{description}");
    assert!(table.expected_tokens(0).contains(&parser.grammar().token_id("ID").unwrap()));
    assert!(table.to_csv(parser.grammar()).lines().count() == table.num_states() + 1);
}

#[test]
fn any_in_pairs() {
    for kind in [GrammarKind::LL, GrammarKind::LR] {
        let mut parser = parsers(call_grammar(kind));
        let output = parser.parse("f(a (b) c);");
        assert!(output.log.has_no_errors(), "{kind:?}: {}", output.log);
        assert_eq!(any_nodes(&output), vec!["a ( b ) c".to_string()], "{kind:?}");
        let output = parser.parse("f();");
        assert!(output.log.has_no_errors(), "{kind:?}: {}", output.log);
    }
}

#[test]
fn unmatched_closing_pair() {
    for kind in [GrammarKind::LL, GrammarKind::LR] {
        let mut parser = parsers(call_grammar(kind));
        let output = parser.parse("f(a));");
        assert_eq!(output.root, None, "{kind:?}");
        assert_eq!(output.log.num_errors(), 1, "{kind:?}: {}", output.log);
        assert!(output.log.get_errors().next().unwrap().text.contains("missing opening token"));
    }
}

#[test]
fn unmatched_opening_pair() {
    for kind in [GrammarKind::LL, GrammarKind::LR] {
        let mut parser = parsers(call_grammar(kind));
        for text in ["f((a);", "f(a;"] {
            let output = parser.parse(text);
            assert_eq!(output.root, None, "{kind:?} {text}");
            assert_eq!(output.log.num_errors(), 1, "{kind:?} {text}: {}", output.log);
            assert!(warnings(&output.log).iter().any(|w| w.contains("while skipping Any")), "{kind:?} {text}: {}", output.log);
        }
        let output = parser.parse("f(a); g((");
        assert_eq!(output.log.num_errors(), 1, "{kind:?}: {}", output.log);
    }
}

/// `s -> Any(args) DOT`
fn any_grammar(kind: GrammarKind, argument: AnyArgument, tokens: &[&str]) -> Grammar {
    let mut g = Grammar::new(kind);
    g.declare_terminal("ID", Some("[a-z]+")).unwrap();
    g.declare_terminal("SEMI", Some(";")).unwrap();
    g.declare_terminal("DOT", Some(r"\.")).unwrap();
    let any = Entry::any(crate::grammar::args::SymbolArguments::new().with(argument, tokens.iter().copied()));
    g.declare_nonterminal("s", vec![Alternative::new().add(any).add("DOT")]).unwrap();
    g.set_start_symbol("s").unwrap();
    g
}

#[test]
fn any_except() {
    for kind in [GrammarKind::LL, GrammarKind::LR] {
        let mut parser = parsers(any_grammar(kind, AnyArgument::Except, &["DOT"]));
        let output = parser.parse("a ; b.");
        assert!(output.log.has_no_errors(), "{kind:?}: {}", output.log);
        assert_eq!(any_nodes(&output), vec!["a ; b".to_string()], "{kind:?}");
    }
}

#[test]
fn any_avoid() {
    for kind in [GrammarKind::LL, GrammarKind::LR] {
        let mut parser = parsers(any_grammar(kind, AnyArgument::Avoid, &["SEMI"]));
        let output = parser.parse("a b.");
        assert!(output.log.has_no_errors(), "{kind:?}: {}", output.log);
        assert_eq!(any_nodes(&output), vec!["a b".to_string()], "{kind:?}");
        let output = parser.parse("a ; b.");
        assert_eq!(output.root, None, "{kind:?}");
        assert_eq!(output.log.num_errors(), 1, "{kind:?}: {}", output.log);
        assert!(warnings(&output.log)[0].contains("';' (SEMI) while skipping Any"), "{kind:?}: {}", output.log);
    }
}

#[test]
fn repetition_greediness() {
    let mut g = Grammar::new(GrammarKind::LL);
    g.declare_terminal("A", Some("a")).unwrap();
    let star = g.generate_nonterminal("x", Quantifier::ZeroOrMore, true);
    let opt = g.generate_nonterminal("A", Quantifier::ZeroOrOne, true);
    g.declare_nonterminal("s", vec![alt(&[star.as_str(), opt.as_str()])]).unwrap();
    g.declare_nonterminal("x", vec![alt(&["A"])]).unwrap();
    g.set_start_symbol("s").unwrap();
    let mut parser = LlParser::new(g).unwrap();
    let output = parser.parse("a a a");
    assert!(output.log.has_no_errors(), "{}", output.log);
    let root = output.root.unwrap();
    let children = output.tree[root].children.iter().map(|c| output.tree[*c].symbol.as_str()).to_vec();
    assert_eq!(children, vec!["x", "x", "x"]);
}

#[test]
fn statement_recovery() {
    for kind in [GrammarKind::LL, GrammarKind::LR] {
        let mut parser = parsers(statement_grammar(kind, true));
        let output = parser.parse("x = y; if a b = c; d = e;");
        assert!(output.log.has_no_errors(), "{kind:?}: {}", output.log);
        let warnings = warnings(&output.log);
        assert!(warnings[0].starts_with("unexpected token 'b' (ID), expected"), "{kind:?}: {warnings:?}");
        assert!(warnings[1].starts_with("recovery started"), "{kind:?}: {warnings:?}");
        assert!(warnings.iter().any(|w| w.starts_with("recovered on 'stmt'")), "{kind:?}: {warnings:?}");
        assert_eq!(output.statistics.recovery_times, 1);
        assert_eq!(any_nodes(&output), vec!["if a b = c".to_string()], "{kind:?}");
        let root = output.root.unwrap();
        assert_eq!(output.tree[root].children.len(), 3, "{kind:?}:\n{}", output.tree);
        let recovered = output.tree[root].children[1];
        assert_eq!(output.tree[recovered].children.len(), 2);
    }
}

#[test]
fn statement_without_recovery() {
    for kind in [GrammarKind::LL, GrammarKind::LR] {
        let mut parser = parsers(statement_grammar(kind, false));
        let output = parser.parse("if a b = c;");
        assert_eq!(output.root, None, "{kind:?}");
        assert!(warnings(&output.log)[0].starts_with("unexpected token 'b' (ID)"), "{kind:?}: {}", output.log);
        assert_eq!(output.log.num_errors(), 1, "{kind:?}: {}", output.log);
        assert!(output.log.get_errors().next().unwrap().text.contains("error recovery is disabled"));
        let output = parser.parse("if a then b = c;");
        assert!(output.log.has_no_errors() && output.log.has_no_warnings(), "{kind:?}: {}", output.log);
    }
}

#[test]
fn tracing() {
    let mut parser = LlParser::new(expression_grammar(GrammarKind::LL)).unwrap();
    assert_eq!(parser.parse("a").log.num_traces(), 0);
    parser.set_tracing(true);
    let output = parser.parse("a + b");
    assert!(output.log.num_traces() > 0);
    assert!(output.log.get_traces().next().unwrap().text.contains("stack:"));
}

#[test]
fn custom_blocks_in_tree() {
    let mut g = statement_grammar(GrammarKind::LL, false);
    g.declare_terminal("COMMENT", Some("//[^\n]*")).unwrap();
    g.set_skip_tokens(&["COMMENT"]).unwrap();
    g.set_option(CustomBlockOption::BaseToken, &["COMMENT"], vec![]).unwrap();
    g.set_option(CustomBlockOption::Start, &[], vec!["//+".into()]).unwrap();
    g.set_option(CustomBlockOption::End, &[], vec!["//-".into()]).unwrap();
    let mut parser = LlParser::new(g).unwrap();
    let output = parser.parse("a = b;\n//+ block\nc = d;\ne = f;\n//-\ng = h;\n");
    assert!(output.log.has_no_errors(), "{}", output.log);
    let root = output.root.unwrap();
    let children = output.tree[root].children.clone();
    assert_eq!(children.len(), 3, "{}", output.tree);
    let block = &output.tree[children[1]];
    assert!(block.is_custom_block());
    assert!(block.is_land());
    assert_eq!(block.children.len(), 4);
    assert_eq!(output.tree[block.children[0]].value, vec!["block".to_string()]);
}

#[test]
fn unclosed_custom_block_in_tree() {
    let mut g = statement_grammar(GrammarKind::LR, false);
    g.declare_terminal("COMMENT", Some("//[^\n]*")).unwrap();
    g.set_skip_tokens(&["COMMENT"]).unwrap();
    g.set_option(CustomBlockOption::BaseToken, &["COMMENT"], vec![]).unwrap();
    g.set_option(CustomBlockOption::Start, &[], vec!["//+".into()]).unwrap();
    g.set_option(CustomBlockOption::End, &[], vec!["//-".into()]).unwrap();
    let mut parser = LrParser::new(g).unwrap();
    let output = parser.parse("a = b;\n//+ blk\ne = f;\n");
    assert!(output.log.has_no_errors(), "{}", output.log);
    assert_eq!(warnings(&output.log), vec!["custom block 'blk' is not closed".to_string()]);
    let root = output.root.unwrap();
    assert_eq!(output.tree[root].children.len(), 2, "{}", output.tree);
    assert!(output.tree[root].children.iter().all(|c| !output.tree[*c].is_custom_block()));
}

struct Lowercase;

impl Preprocessor for Lowercase {
    fn preprocess(&mut self, text: &str) -> Result<String, BufLog> {
        if text.contains('#') {
            let mut log = BufLog::new();
            log.add_error("unsupported directive", None);
            return Err(log);
        }
        Ok(text.to_lowercase())
    }
}

struct RenameAny;

impl TreeVisitor for RenameAny {
    fn visit(&mut self, tree: &mut Tree, node: NodeId) {
        if tree[node].is_any() {
            tree[node].alias = Some("skipped".to_string());
        }
        self.visit_children(tree, node);
    }
}

fn rename_any(_: &Grammar) -> Box<dyn TreeVisitor + '_> {
    Box::new(RenameAny)
}

#[test]
fn preprocessor_and_visitors() {
    let mut parser = LlParser::new(call_grammar(GrammarKind::LL)).unwrap();
    parser.set_preprocessor(Box::new(PipelinePreprocessor::new().add(Box::new(Lowercase))));
    parser.add_visitor(Box::new(rename_any));
    let output = parser.parse("F(A B);");
    assert!(output.log.has_no_errors(), "{}", output.log);
    let root = output.root.unwrap();
    let any = output.tree.preorder(root).into_iter().find(|n| output.tree[*n].is_any()).unwrap();
    assert_eq!(output.tree[any].node_type(), "skipped");
    assert_eq!(output.tree[any].value, vec!["a".to_string(), "b".to_string()]);
    let output = parser.parse("#include");
    assert_eq!(output.root, None);
    assert_eq!(output.log.num_errors(), 1);
}
