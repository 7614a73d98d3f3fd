// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

#![cfg(test)]

use super::*;
use crate::CollectJoin;

const ID: TokenId = 6;
const NUM: TokenId = 7;
const IF: TokenId = 8;
const SEMI: TokenId = 9;

fn build_lexer() -> RegexLexer {
    let mut lexer = RegexLexer::new();
    lexer.add_literal(IF, "if").unwrap();
    lexer.add_token(ID, "[a-zA-Z_][a-zA-Z0-9_]*").unwrap();
    lexer.add_token(NUM, "[0-9]+").unwrap();
    lexer.add_literal(SEMI, ";").unwrap();
    lexer.add_skip("[ \t\r\n]+").unwrap();
    lexer
}

fn all_tokens(lexer: &mut RegexLexer) -> Vec<Token> {
    let mut tokens = vec![];
    loop {
        let t = lexer.next_token();
        let end = t.name == EOF;
        tokens.push(t);
        if end {
            break tokens;
        }
    }
}

#[test]
fn longest_match() {
    let mut lexer = build_lexer();
    lexer.set_source_text("if iffy 12;\n x");
    let tokens = all_tokens(&mut lexer);
    let result = tokens.iter().map(|t| format!("{}:{}", t.name, t.text)).join(" ");
    assert_eq!(result, "8:if 6:iffy 7:12 9:; 6:x 0:");
    let x = &tokens[4];
    assert_eq!(x.location.start, PointLocation::new(2, 2, 13));
    assert_eq!(x.location.end, PointLocation::new(2, 3, 14));
}

#[test]
fn undefined_and_eof() {
    let mut lexer = build_lexer();
    lexer.set_source_text("a # b");
    let tokens = all_tokens(&mut lexer);
    assert_eq!(tokens.iter().map(|t| t.name).to_vec(), vec![ID, UNDEFINED, ID, EOF]);
    assert_eq!(tokens[1].text, "#");
    // EOF is repeated
    assert_eq!(lexer.next_token().name, EOF);
    let any = lexer.create_token(crate::ANY);
    assert_eq!(any.text, "");
    assert_eq!(any.location.start.offset, 5);
}

#[test]
fn ignore_case() {
    let mut lexer = RegexLexer::new();
    lexer.set_ignore_case(true);
    lexer.add_literal(IF, "if").unwrap();
    lexer.add_skip(" +").unwrap();
    lexer.set_source_text("IF iF");
    let tokens = all_tokens(&mut lexer);
    assert_eq!(tokens.iter().map(|t| t.name).to_vec(), vec![IF, IF, EOF]);
}
