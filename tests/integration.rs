// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.
//
// Integration tests: tests that all the functionalities are accessible and work as expected.

mod parsing {
    use land::grammar::options::ParsingOption;
    use land::grammar::{Alternative, Grammar, GrammarKind, Quantifier};
    use land::land_core::log::LogStatus;
    use land::parser::ll::LlParser;
    use land::parser::lr::LrParser;
    use land::parser::{ParseOutput, Parser};

    /// `stmt -> IF ID THEN stmt (ELSE stmt)? | ID = ID ; | Any ;`
    fn if_grammar(kind: GrammarKind, recovery: bool) -> Grammar {
        let mut g = Grammar::new(kind);
        for (name, pattern) in [("IF", "if"), ("THEN", "then"), ("ELSE", "else"), ("ID", "[a-z]+"), ("ASSIGN", "="), ("SEMI", ";")] {
            g.declare_terminal(name, Some(pattern)).unwrap();
        }
        let stmts = g.generate_nonterminal("stmt", Quantifier::ZeroOrMore, false);
        let else_part = g.generate_group(vec![Alternative::from_symbols(&["ELSE", "stmt"])]);
        let opt_else = g.generate_nonterminal(&else_part, Quantifier::ZeroOrOne, true);
        g.declare_nonterminal("program", vec![Alternative::from_symbols(&[stmts.as_str()])]).unwrap();
        g.declare_nonterminal("stmt", vec![
            Alternative::from_symbols(&["IF", "ID", "THEN", "stmt", opt_else.as_str()]),
            Alternative::from_symbols(&["ID", "ASSIGN", "ID", "SEMI"]),
            Alternative::from_symbols(&["Any", "SEMI"]),
        ]).unwrap();
        g.set_start_symbol("program").unwrap();
        if recovery {
            g.set_option(ParsingOption::Recovery, &["stmt"], vec![]).unwrap();
        }
        g
    }

    fn parser(kind: GrammarKind, recovery: bool) -> Box<dyn Parser> {
        let g = if_grammar(kind, recovery);
        match kind {
            GrammarKind::LL => Box::new(LlParser::new(g).unwrap()),
            GrammarKind::LR => Box::new(LrParser::new(g).unwrap()),
        }
    }

    fn warnings(output: &ParseOutput) -> Vec<String> {
        output.log.get_warnings().map(|m| m.text.clone()).collect()
    }

    #[test]
    fn valid_text() {
        for kind in [GrammarKind::LL, GrammarKind::LR] {
            let text = "if a then if b then c = d; else e = f; g = h;";
            let output = parser(kind, false).parse(text);
            assert!(output.log.has_no_errors() && output.log.has_no_warnings(), "{kind:?}: {}", output.log);
            let root = output.root.unwrap();
            // nothing is lost between the text and the tree
            assert_eq!(output.tree.location(root).map(|l| l.extract(text)), Some(text));
            assert_eq!(output.tree[root].children.len(), 2, "{kind:?}:\n{}", output.tree);
        }
    }

    #[test]
    fn missing_then_with_recovery() {
        for kind in [GrammarKind::LL, GrammarKind::LR] {
            let output = parser(kind, true).parse("x = y; if a b = c; d = e;");
            assert!(output.log.has_no_errors(), "{kind:?}: {}", output.log);
            let warnings = warnings(&output);
            assert!(warnings[0].starts_with("unexpected token 'b' (ID)"), "{kind:?}: {warnings:?}");
            assert!(warnings[1].starts_with("recovery started"), "{kind:?}: {warnings:?}");
            let root = output.root.unwrap();
            let gaps = output.tree.preorder(root).into_iter()
                .filter(|n| output.tree[*n].is_any())
                .map(|n| output.tree[n].value.join(" "))
                .collect::<Vec<_>>();
            assert_eq!(gaps, vec!["if a b = c".to_string()], "{kind:?}");
        }
    }

    #[test]
    fn missing_then_without_recovery() {
        for kind in [GrammarKind::LL, GrammarKind::LR] {
            let output = parser(kind, false).parse("x = y; if a b = c; d = e;");
            assert_eq!(output.root, None, "{kind:?}");
            assert!(warnings(&output)[0].starts_with("unexpected token 'b' (ID)"), "{kind:?}: {}", output.log);
            assert_eq!(output.log.num_errors(), 1, "{kind:?}: {}", output.log);
        }
    }
}

mod remapping {
    use land::grammar::options::{MarkupOption, OptionValue};
    use land::grammar::{Alternative, Grammar, GrammarKind, Quantifier};
    use land::land_core::log::LogStatus;
    use land::markup::context::ParsedFile;
    use land::markup::finder::{ContextFinder, FinderConfig, SearchType};
    use land::markup::words::get_words;
    use land::parser::lr::LrParser;
    use land::plugin::PluginRegistry;
    use land::tree::visitors::GroupNodesByTypeVisitor;
    use land::tree::NodeId;

    const SOURCE: &str = "\
section intro { title = welcome; text = hello; }
section body { text = content; }
section outro { title = bye; }
";

    /// `program -> section*`, `section -> SECTION ID { entry* }`, `entry -> ID = ID ;`
    fn section_grammar() -> Grammar {
        let mut g = Grammar::new(GrammarKind::LR);
        for (name, pattern) in [("SECTION", "section"), ("LBRACE", r"\{"), ("RBRACE", r"\}"), ("ASSIGN", "="), ("SEMI", ";"), ("ID", "[a-z]+")] {
            g.declare_terminal(name, Some(pattern)).unwrap();
        }
        let sections = g.generate_nonterminal("section", Quantifier::ZeroOrMore, false);
        let entries = g.generate_nonterminal("entry", Quantifier::ZeroOrMore, false);
        g.declare_nonterminal("program", vec![Alternative::from_symbols(&[sections.as_str()])]).unwrap();
        g.declare_nonterminal("section", vec![Alternative::from_symbols(&["SECTION", "ID", "LBRACE", entries.as_str(), "RBRACE"])]).unwrap();
        g.declare_nonterminal("entry", vec![Alternative::from_symbols(&["ID", "ASSIGN", "ID", "SEMI"])]).unwrap();
        g.set_start_symbol("program").unwrap();
        g.set_option(MarkupOption::Land, &["section", "entry"], vec![]).unwrap();
        g.set_option(MarkupOption::Priority, &["LBRACE", "RBRACE", "ASSIGN", "SEMI"], vec![OptionValue::Number(0.0)]).unwrap();
        g.set_option(MarkupOption::HeaderCore, &["section"], vec![OptionValue::token_set(["ID"])]).unwrap();
        g
    }

    fn registry() -> PluginRegistry {
        registry_with(section_grammar())
    }

    fn registry_with(grammar: Grammar) -> PluginRegistry {
        let mut registry = PluginRegistry::new();
        registry.register(&["sec"], Box::new(LrParser::new(grammar).unwrap()));
        registry
    }

    fn sections(file: &ParsedFile) -> Vec<NodeId> {
        GroupNodesByTypeVisitor::groups(&file.tree, file.root.unwrap(), ["section"]).remove("section").unwrap()
    }

    #[test]
    fn identifier_words() {
        let words = get_words("myHTTPServer2Config");
        assert_eq!(words.iter().map(|w| w.text.as_str()).collect::<Vec<_>>(), vec!["my", "HTTP", "Server", "2", "Config"]);
        assert!(words.iter().all(|w| w.priority == 1.0));
    }

    #[test]
    fn remap_stability() {
        let mut registry = registry();
        let (file, log) = registry.parse_file("doc.sec", SOURCE).unwrap();
        assert!(log.has_no_errors() && log.has_no_warnings(), "{log}");
        let mut finder = ContextFinder::new(FinderConfig::default());
        let marked = sections(&file);
        assert_eq!(marked.len(), 3);
        let points = marked.iter().map(|n| finder.point_context(&file, *n)).collect::<Vec<_>>();
        let (again, _) = registry.parse_file("doc.sec", SOURCE).unwrap();
        for result in [finder.find(&points, &[again.clone()], SearchType::Local), finder.find_all(&points, &[again], SearchType::Local)] {
            for (node, candidates) in marked.iter().zip(result) {
                assert_eq!(candidates[0].node, *node);
                assert_eq!(candidates[0].similarity, Some(1.0));
                assert!(candidates[0].is_auto, "{}", candidates[0]);
            }
        }
    }

    #[test]
    fn remap_stability_of_repeated_entries() {
        let mut grammar = section_grammar();
        grammar.set_option(MarkupOption::NotUnique, &["entry"], vec![]).unwrap();
        let mut registry = registry_with(grammar);
        let text = "\
section intro { title = welcome; text = hello; text = hello; }
section body { text = hello; title = welcome; }
section outro { title = bye; }
";
        let (file, _) = registry.parse_file("doc.sec", text).unwrap();
        let entries = GroupNodesByTypeVisitor::groups(&file.tree, file.root.unwrap(), ["entry"]).remove("entry").unwrap();
        assert_eq!(entries.len(), 6);
        let mut finder = ContextFinder::new(FinderConfig::default());
        let points = entries.iter().map(|n| finder.point_context(&file, *n)).collect::<Vec<_>>();
        assert!(points.iter().all(|p| p.not_unique));
        let (again, _) = registry.parse_file("doc.sec", text).unwrap();
        let result = finder.find(&points, &[again], SearchType::Local);
        for (node, candidates) in entries.iter().zip(result) {
            assert_eq!(candidates[0].node, *node, "{}", candidates[0]);
            assert_eq!(candidates[0].similarity, Some(1.0));
            assert!(candidates[0].is_auto, "{}", candidates[0]);
        }
    }

    #[test]
    fn remap_after_edition() {
        let mut registry = registry();
        let (file, _) = registry.parse_file("v1/doc.sec", SOURCE).unwrap();
        let mut finder = ContextFinder::new(FinderConfig::default());
        let body = sections(&file)[1];
        let point = finder.point_context(&file, body);
        let edited = SOURCE.replace("section body {", "section preface { text = first; }\nsection body {");
        let (new_file, _) = registry.parse_file("v2/doc.sec", &edited).unwrap();
        let result = finder.find(&[point], &[new_file.clone()], SearchType::Local);
        assert_eq!(result[0][0].node, sections(&new_file)[2]);
        assert!(result[0][0].is_auto);
    }

    #[test]
    fn remap_ambiguity() {
        let text = "section a { x = y; }\nsection a { x = y; }\n";
        let mut registry = registry();
        let (file, _) = registry.parse_file("twins.sec", text).unwrap();
        let twins = sections(&file);
        let mut finder = ContextFinder::new(FinderConfig::default());
        let point = finder.point_context(&file, twins[1]);
        let result = finder.find(&[point], &[file.clone()], SearchType::Global);
        let nodes = result[0].iter().map(|c| c.node).collect::<Vec<_>>();
        assert!(!result[0][0].is_auto);
        assert!(nodes.contains(&twins[0]) && nodes.contains(&twins[1]));
    }
}
