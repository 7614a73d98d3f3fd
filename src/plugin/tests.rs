// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

#![cfg(test)]

use land_core::log::{LogStatus, Logger};
use crate::grammar::{Alternative, Grammar, GrammarKind, Quantifier};
use crate::parser::ll::LlParser;
use crate::parser::lr::LrParser;
use crate::parser::Parser;
use super::*;

fn words_grammar(kind: GrammarKind) -> Grammar {
    let mut g = Grammar::new(kind);
    g.declare_terminal("ID", Some("[a-z]+")).unwrap();
    let ids = g.generate_nonterminal("ID", Quantifier::ZeroOrMore, false);
    g.declare_nonterminal("words", vec![Alternative::from_symbols(&[ids.as_str()])]).unwrap();
    g.set_start_symbol("words").unwrap();
    g
}

/// Lower-cases the text before parsing it, and refuses empty texts.
struct LowerCasePlugin(LlParser);

impl ParserPlugin for LowerCasePlugin {
    fn parse(&mut self, text: &str) -> ParseOutput {
        Parser::parse(&mut self.0, text)
    }

    fn preprocess(&mut self, text: &str) -> Result<String, BufLog> {
        if text.trim().is_empty() {
            let mut log = BufLog::new();
            log.add_error("empty text", None);
            Err(log)
        } else {
            Ok(text.to_lowercase())
        }
    }
}

#[test]
fn registry() {
    let mut registry = PluginRegistry::new();
    registry.register(&[".ll", "LLX"], Box::new(LlParser::new(words_grammar(GrammarKind::LL)).unwrap()));
    registry.register(&["lr"], Box::new(LrParser::new(words_grammar(GrammarKind::LR)).unwrap()));
    registry.register(&["low"], Box::new(LowerCasePlugin(LlParser::new(words_grammar(GrammarKind::LL)).unwrap())));
    assert_eq!(registry.extensions().cloned().collect::<Vec<_>>(), vec!["ll", "llx", "low", "lr"]);
    assert!(registry.is_supported("dir/a.LLX"));
    assert!(!registry.is_supported("a.txt"));
    assert!(!registry.is_supported("ll"));

    for name in ["a.ll", "b.lr"] {
        let (file, log) = registry.parse_file(name, "one two three").unwrap();
        assert!(log.has_no_errors(), "{name}: {log}");
        assert_eq!(file.name, name);
        assert_eq!(file.tree.value(file.root.unwrap()), vec!["one", "two", "three"]);
    }
    let (file, _) = registry.parse_file("c.low", "One TWO").unwrap();
    assert_eq!(file.text, "one two");
    assert_eq!(file.tree.value(file.root.unwrap()), vec!["one", "two"]);
    assert!(matches!(registry.parse_file("c.low", "  "), Err(PluginError::Preprocess(..))));
    assert!(matches!(registry.parse_file("d.txt", "x"), Err(PluginError::NoPlugin(name)) if name == "d.txt"));
}
