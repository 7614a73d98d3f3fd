// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

#![cfg(test)]

use super::*;
use land_core::log::LogStatus;
use crate::grammar::{Alternative, GrammarKind};

const LPAR: TokenId = 6;
const RPAR: TokenId = 7;
const ID: TokenId = 9;

fn build_grammar(custom_blocks: bool) -> Grammar {
    let mut g = Grammar::new(GrammarKind::LL);
    g.declare_terminal("LPAR", Some(r"\(")).unwrap();
    g.declare_terminal("RPAR", Some(r"\)")).unwrap();
    g.declare_terminal("QUOTE", Some("\"")).unwrap();
    g.declare_terminal("ID", Some("[a-z]+")).unwrap();
    g.declare_terminal("COMMENT", Some("//[^\n]*")).unwrap();
    g.declare_pair("parens", &["LPAR"], &["RPAR"]).unwrap();
    g.declare_pair("quotes", &["QUOTE"], &["QUOTE"]).unwrap();
    g.declare_nonterminal("s", vec![Alternative::from_symbols(&["Any"])]).unwrap();
    g.set_start_symbol("s").unwrap();
    if custom_blocks {
        g.set_option(CustomBlockOption::BaseToken, &["COMMENT"], vec![]).unwrap();
        g.set_option(CustomBlockOption::Start, &[], vec!["//+".into()]).unwrap();
        g.set_option(CustomBlockOption::End, &[], vec!["//-".into()]).unwrap();
    }
    g
}

/// Reads all the tokens and the nesting level at each of them.
fn read_all(stream: &mut ComplexTokenStream) -> Vec<(TokenId, usize)> {
    let mut result = vec![];
    loop {
        let t = stream.next_token();
        result.push((t.name, stream.pairs_count()));
        if t.name == EOF || t.name == ERROR {
            break result;
        }
    }
}

#[test]
fn token_history() {
    let g = build_grammar(false);
    let mut lexer = g.build_lexer().unwrap();
    let mut stream = TokenStream::new(&mut lexer, "a b");
    assert_eq!(stream.current_index(), None);
    assert_eq!(stream.next_token().0.text, "a");
    let (b, fresh) = stream.next_token();
    assert!(fresh);
    assert_eq!(b.text, "b");
    assert_eq!(stream.next_token().0.name, EOF);
    assert_eq!(stream.next_token().0.name, EOF);
    assert_eq!(stream.count(), 3);
    assert_eq!(stream.move_to(0).map(|t| t.text), Some("a".to_string()));
    let (b, fresh) = stream.next_token();
    assert!(!fresh);
    assert_eq!(b.text, "b");
    assert_eq!(stream.move_to(5), None);
}

#[test]
fn balanced_pairs() {
    let g = build_grammar(false);
    let mut lexer = g.build_lexer().unwrap();
    let mut stream = ComplexTokenStream::new(&g, &mut lexer, "a (b \"c\" (d)) e");
    let levels = read_all(&mut stream).into_iter().map(|(_, level)| level).to_vec();
    assert_eq!(levels, vec![0, 0, 1, 1, 2, 2, 1, 2, 2, 1, 0, 0]);
    assert!(stream.take_log().is_empty());
}

#[test]
fn unmatched_closing() {
    let g = build_grammar(false);
    let mut lexer = g.build_lexer().unwrap();
    let mut stream = ComplexTokenStream::new(&g, &mut lexer, "a ) b");
    let tokens = read_all(&mut stream).into_iter().map(|(t, _)| t).to_vec();
    assert_eq!(tokens, vec![ID, ERROR]);
    let log = stream.take_log();
    assert_eq!(log.num_errors(), 1);
    assert!(log.get_errors().next().unwrap().text.contains("missing opening token"));
}

#[test]
fn wrong_closing() {
    let g = build_grammar(false);
    let mut lexer = g.build_lexer().unwrap();
    let mut stream = ComplexTokenStream::new(&g, &mut lexer, "( \" )");
    let tokens = read_all(&mut stream).into_iter().map(|(t, _)| t).to_vec();
    assert_eq!(tokens, vec![LPAR, 8, ERROR]);
    let log = stream.take_log();
    assert_eq!(log.num_errors(), 1);
    assert!(log.get_errors().next().unwrap().text.contains("expected QUOTE"), "{log}");
}

#[test]
fn skip_to_level() {
    let g = build_grammar(false);
    let mut lexer = g.build_lexer().unwrap();
    let mut stream = ComplexTokenStream::new(&g, &mut lexer, "( a ( b ) c ) d");
    assert_eq!(stream.next_token().name, LPAR);
    let (token, skipped) = stream.next_token_at_level(0);
    assert_eq!(token.text, "d");
    assert_eq!(skipped.iter().map(|t| t.text.as_str()).join(" "), "a ( b ) c )");
}

#[test]
fn rollback() {
    let g = build_grammar(false);
    let mut lexer = g.build_lexer().unwrap();
    let mut stream = ComplexTokenStream::new(&g, &mut lexer, "( a ( b ) )");
    stream.next_token();
    let a = stream.next_token();
    let index = stream.current_index().unwrap();
    let state = stream.pairs_state();
    assert_eq!(stream.next_token().name, LPAR);
    assert_eq!(stream.next_token().text, "b");
    assert_eq!(stream.pairs_count(), 2);
    assert_eq!(stream.move_to(index, state), Some(a));
    assert_eq!(stream.pairs_count(), 1);
    assert_eq!(stream.next_token().name, LPAR);
    assert_eq!(stream.next_token().text, "b");
    assert_eq!(stream.pairs_count(), 2);
    assert_eq!(stream.next_token().name, RPAR);
}

#[test]
fn custom_blocks() {
    let g = build_grammar(true);
    let mut lexer = g.build_lexer().unwrap();
    let text = "//+ block one\na\n//+ inner\nb\n//-\n//-\nc\n//-\n";
    let mut stream = ComplexTokenStream::new(&g, &mut lexer, text);
    read_all(&mut stream);
    let blocks = stream.completed_blocks().to_vec();
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].name, "inner");
    assert_eq!(blocks[1].name, "block one");
    assert_eq!(blocks[0].parent, Some(0));
    assert_eq!(stream.custom_block(0).children, vec![1]);
    assert_eq!(blocks[1].location.extract(text), "//+ block one\na\n//+ inner\nb\n//-\n//-");
    assert_eq!(stream.unclosed_blocks().count(), 0);
    let log = stream.take_log();
    assert_eq!(log.num_errors(), 1, "{log}");
}

#[test]
fn unclosed_custom_block() {
    let g = build_grammar(true);
    let mut lexer = g.build_lexer().unwrap();
    let mut stream = ComplexTokenStream::new(&g, &mut lexer, "a\n//+ open\nb\n");
    read_all(&mut stream);
    assert_eq!(stream.completed_blocks().count(), 0);
    assert_eq!(stream.unclosed_blocks().map(|b| b.name.as_str()).to_vec(), vec!["open"]);
    // reading EOF again doesn't repeat the warning
    assert_eq!(stream.next_token().name, EOF);
    let log = stream.take_log();
    assert_eq!(log.num_errors(), 0, "{log}");
    assert_eq!(log.get_warnings().map(|m| m.text.as_str()).to_vec(), vec!["custom block 'open' is not closed"]);
}
