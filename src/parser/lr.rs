// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

//! Canonical LR(1) parser.
//!
//! The states are the LR(1) items built from the augmented start rule. `Any` is shifted like a
//! regular token, but the tokens it skips are decided by the actions of the state reached after
//! the shift: `Any` stops on the first token that state can process.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt::{Display, Formatter};
use std::time::Instant;
use land_core::lexer::{Lexer, Token};
use land_core::location::SegmentLocation;
use land_core::log::{BufLog, LogReader, LogStatus, Logger};
use land_core::{AltId, CollectJoin, TokenId, VarId, ANY, ANY_NAME, EOF, ERROR};
use crate::grammar::args::{AnyArgument, SymbolArguments};
use crate::grammar::closure::{Item, Marker};
use crate::grammar::options::SymbolOptions;
use crate::grammar::{Grammar, GrammarKind, Symbol};
use crate::parser::ll::csv_field;
use crate::parser::{token_info, tokens_to_string, ParseOutput, ParseRun, Parser, ParserCore, ParserError, Statistics};
use crate::stream::{ComplexTokenStream, Direction};
use crate::tree::{NodeGenerator, NodeId, Tree};

const VERBOSE: bool = false;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum Action {
    /// shifts the token and goes to the state
    Shift(usize),
    /// reduces the alternative
    Reduce(AltId),
    Accept,
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Shift(state) => write!(f, "s{state}"),
            Action::Reduce(alt) => write!(f, "r{alt}"),
            Action::Accept => write!(f, "acc"),
        }
    }
}

// ---------------------------------------------------------------------------------------------

#[derive(Clone, PartialEq, Debug)]
pub struct TableLr1 {
    items: Vec<Item>,
    transitions: Vec<HashMap<Symbol, usize>>,
    /// actions[state][token]
    actions: Vec<Vec<Vec<Action>>>,
    /// tokens that stop an `Any` shifted in the state, in addition to those with an action
    after_any: Vec<HashSet<TokenId>>,
}

impl TableLr1 {
    /// Builds the table of the grammar, which must have been post-processed so that its start
    /// rule is the augmented rule.
    pub fn new(grammar: &Grammar) -> Self {
        let num_t = grammar.num_t();
        let Some(start) = grammar.start() else {
            return TableLr1 { items: Vec::new(), transitions: Vec::new(), actions: Vec::new(), after_any: Vec::new() };
        };
        let initial = grammar.closure(
            grammar.rule(start).alts.iter().map(|a| Marker::new(*a, 0, EOF)).collect(),
            BTreeSet::new());
        let mut items = vec![initial.clone()];
        let mut index = HashMap::from([(initial, 0)]);
        let mut transitions: Vec<HashMap<Symbol, usize>> = vec![HashMap::new()];
        let mut state = 0;
        while state < items.len() {
            let symbols = items[state].markers.iter().filter_map(|m| grammar.marker_next(m)).collect::<BTreeSet<_>>();
            for symbol in symbols {
                let target = grammar.goto(&items[state], symbol);
                if target.is_empty() {
                    continue;
                }
                let id = match index.get(&target) {
                    Some(id) => *id,
                    None => {
                        items.push(target.clone());
                        transitions.push(HashMap::new());
                        index.insert(target, items.len() - 1);
                        items.len() - 1
                    }
                };
                transitions[state].insert(symbol, id);
            }
            state += 1;
        }
        if VERBOSE { println!("LR(1) table: {} states", items.len()); }
        let mut actions = vec![vec![Vec::<Action>::new(); num_t]; items.len()];
        let mut after_any = vec![HashSet::<TokenId>::new(); items.len()];
        for (state, item) in items.iter().enumerate() {
            let mut add = |token: TokenId, action: Action| {
                let cell = &mut actions[state][token as usize];
                if !cell.contains(&action) {
                    cell.push(action);
                }
            };
            for m in &item.markers {
                match grammar.marker_next(m) {
                    Some(Symbol::T(t)) => {
                        if let Some(target) = transitions[state].get(&Symbol::T(t)) {
                            add(t, Action::Shift(*target));
                        }
                        if t == ANY {
                            after_any[state].extend(grammar.marker_first(m).1);
                        }
                    }
                    None => {
                        if grammar.alt(m.alt).var() == start {
                            if m.lookahead == EOF {
                                add(EOF, Action::Accept);
                            }
                        } else {
                            add(m.lookahead, Action::Reduce(m.alt));
                        }
                    }
                    _ => {}
                }
            }
            for m in &item.any_markers {
                match grammar.marker_next(m) {
                    None => {
                        after_any[state].insert(m.lookahead);
                    }
                    Some(Symbol::T(_)) => {
                        let (first, any_first) = grammar.marker_first(m);
                        after_any[state].extend(first);
                        after_any[state].extend(any_first);
                    }
                    _ => {}
                }
            }
            after_any[state].remove(&ANY);
        }
        TableLr1 { items, transitions, actions, after_any }
    }

    pub fn num_states(&self) -> usize {
        self.items.len()
    }

    pub fn item(&self, state: usize) -> &Item {
        &self.items[state]
    }

    pub fn transition(&self, state: usize, symbol: Symbol) -> Option<usize> {
        self.transitions.get(state).and_then(|t| t.get(&symbol)).copied()
    }

    pub fn actions(&self, state: usize, token: TokenId) -> &[Action] {
        self.actions.get(state).and_then(|row| row.get(token as usize)).map(|c| c.as_slice()).unwrap_or(&[])
    }

    /// Action taken by the parser: the shift if there's one, otherwise the first action.
    pub fn action(&self, state: usize, token: TokenId) -> Option<Action> {
        let cell = self.actions(state, token);
        cell.iter().find(|a| matches!(a, Action::Shift(_))).or(cell.first()).copied()
    }

    /// Tokens the state can process.
    pub fn expected_tokens(&self, state: usize) -> HashSet<TokenId> {
        let mut tokens = self.after_any.get(state).cloned().unwrap_or_default();
        if let Some(row) = self.actions.get(state) {
            tokens.extend(row.iter().enumerate().filter(|(_, c)| !c.is_empty()).map(|(t, _)| t as TokenId));
        }
        tokens
    }

    /// Marker that shifts `Any` in the state, if any.
    pub fn any_marker(&self, grammar: &Grammar, state: usize) -> Option<Marker> {
        self.items[state].markers.iter().find(|m| grammar.marker_next(m) == Some(Symbol::T(ANY))).copied()
    }

    /// Reports the conflicts. A single shift/reduce conflict is resolved by shifting and is only
    /// a warning; the other conflicts, and `Any` shifted by several alternatives, are errors.
    pub fn check_validity(&self, grammar: &Grammar) -> BufLog {
        let mut log = BufLog::new();
        for (state, row) in self.actions.iter().enumerate() {
            for (token, cell) in row.iter().enumerate().filter(|(_, c)| c.len() > 1) {
                let token_name = grammar.developerify(grammar.symbol_name(Symbol::T(token as TokenId)));
                let shifts = cell.iter().filter(|a| matches!(a, Action::Shift(_))).count();
                let reduces = cell.iter().filter(|a| matches!(a, Action::Reduce(_))).count();
                let description = self.state_to_string(grammar, state, Some(token as TokenId));
                if cell.len() == 2 && shifts == 1 && reduces == 1 {
                    log.add_warning(format!("shift/reduce conflict in state {state} on {token_name}, shift is preferred:\n{description}"), None);
                } else {
                    log.add_error(
                        format!("the grammar isn't LR(1): conflict in state {state} on {token_name} ({}):\n{description}", cell.iter().join(", ")),
                        None);
                }
            }
            let before_any = self.items[state].markers.iter()
                .filter(|m| grammar.marker_next(m) == Some(Symbol::T(ANY)))
                .map(|m| (m.alt, m.pos))
                .collect::<BTreeSet<_>>();
            if before_any.len() > 1 {
                log.add_error(
                    format!("Any conflict in state {state}: {}",
                            before_any.iter().map(|(alt, pos)| grammar.marker_to_string(&Marker::new(*alt, *pos, EOF))).join("; ")),
                    None);
            }
        }
        log
    }

    /// Markers of the state, optionally only those with the given lookahead.
    pub fn state_to_string(&self, grammar: &Grammar, state: usize, lookahead: Option<TokenId>) -> String {
        self.items[state].markers.iter()
            .filter(|m| lookahead.map(|t| m.lookahead == t || grammar.marker_next(m) == Some(Symbol::T(t))).unwrap_or(true))
            .map(|m| format!("  {}", grammar.marker_to_string(m)))
            .join("\n")
    }

    /// Table in CSV format: one row per state, the actions on the tokens, then the transitions
    /// on the nonterminals.
    pub fn to_csv(&self, grammar: &Grammar) -> String {
        let num_t = grammar.num_t() as TokenId;
        let num_nt = grammar.num_nt() as VarId;
        let mut lines = Vec::new();
        let header = (0..num_t).map(Symbol::T)
            .chain((0..num_nt).map(Symbol::NT))
            .map(|s| csv_field(&grammar.developerify(grammar.symbol_name(s))))
            .join(",");
        lines.push(format!(",{header}"));
        for state in 0..self.items.len() {
            let actions = (0..num_t).map(|t| csv_field(&self.actions(state, t).iter().join(" / ")));
            let gotos = (0..num_nt).map(|v| self.transition(state, Symbol::NT(v)).map(|s| s.to_string()).unwrap_or_default());
            lines.push(format!("{state},{}", actions.chain(gotos).join(",")));
        }
        lines.join("\n")
    }
}

// ---------------------------------------------------------------------------------------------

pub struct LrParser {
    core: ParserCore,
    table: TableLr1,
}

impl LrParser {
    /// Creates a parser with the lexer generated from the grammar's token patterns.
    pub fn new(grammar: Grammar) -> Result<Self, ParserError> {
        let lexer = grammar.build_lexer()?;
        Self::with_lexer(grammar, Box::new(lexer))
    }

    /// Creates a parser with a custom lexer. The grammar is augmented with the start rule and
    /// checked; the warnings of the check remain in its log.
    pub fn with_lexer(mut grammar: Grammar, lexer: Box<dyn Lexer>) -> Result<Self, ParserError> {
        if grammar.kind() != GrammarKind::LR {
            grammar.add_error("the grammar is declared for an LL parser", None);
            return Err(ParserError::InvalidGrammar(grammar.get_log().clone()));
        }
        grammar.post_processing();
        ParserCore::check_grammar(&mut grammar)?;
        let table = TableLr1::new(&grammar);
        let table_log = table.check_validity(&grammar);
        let is_valid = table_log.has_no_errors();
        for message in table_log.get_messages() {
            grammar.add_message(message.clone());
        }
        if !is_valid {
            return Err(ParserError::InvalidGrammar(grammar.get_log().clone()));
        }
        Ok(LrParser { core: ParserCore::new(grammar, lexer), table })
    }

    pub fn table(&self) -> &TableLr1 {
        &self.table
    }
}

impl Parser for LrParser {
    fn core(&self) -> &ParserCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ParserCore {
        &mut self.core
    }

    fn parse(&mut self, text: &str) -> ParseOutput {
        let table = &self.table;
        self.core.run(text, |grammar, lexer, generator, text, tracing| {
            let mut run = LrRun {
                grammar,
                table,
                generator,
                stream: ComplexTokenStream::new(grammar, lexer, text),
                tree: Tree::new(),
                stack: vec![StackEntry { state: 0, node: None, level: 0 }],
                recovery_positions: HashSet::new(),
                log: BufLog::new(),
                statistics: Statistics::default(),
                tracing,
            };
            let root = run.parse();
            run.finish(root)
        })
    }
}

// ---------------------------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, Debug)]
struct StackEntry {
    state: usize,
    /// node of the symbol shifted or reduced to reach the state; `None` at the bottom
    node: Option<NodeId>,
    /// nesting level of the pairs where the node starts
    level: usize,
}

/// State of one parse.
struct LrRun<'a> {
    grammar: &'a Grammar,
    table: &'a TableLr1,
    generator: &'a dyn NodeGenerator,
    stream: ComplexTokenStream<'a>,
    tree: Tree,
    stack: Vec<StackEntry>,
    recovery_positions: HashSet<usize>,
    log: BufLog,
    statistics: Statistics,
    tracing: bool,
}

impl<'a> LrRun<'a> {
    fn finish(mut self, root: Option<NodeId>) -> ParseRun {
        self.log.extend(self.stream.take_log());
        self.statistics.tokens_count = self.stream.count();
        let custom_blocks = self.stream.custom_blocks().to_vec();
        let top_blocks = self.stream.top_blocks();
        ParseRun { tree: self.tree, root, log: self.log, statistics: self.statistics, custom_blocks, top_blocks }
    }

    // -- stream

    fn next_token(&mut self) -> Token {
        let token = self.stream.next_token();
        self.log.extend(self.stream.take_log());
        token
    }

    fn next_token_at_level(&mut self, level: usize) -> (Token, Vec<Token>) {
        let result = self.stream.next_token_at_level(level);
        self.log.extend(self.stream.take_log());
        result
    }

    fn current_token(&self) -> Token {
        self.stream.current_token().cloned().unwrap_or_else(|| self.stream.create_token(EOF))
    }

    fn current_index(&self) -> usize {
        self.stream.current_index().unwrap_or(0)
    }

    fn error_token(&self) -> Token {
        self.stream.create_token(ERROR)
    }

    // -- helpers

    fn new_node(&mut self, symbol: &str) -> NodeId {
        self.tree.add(self.generator.generate(symbol, SymbolOptions::new(), SymbolArguments::new()))
    }

    fn top_state(&self) -> usize {
        self.stack.last().map(|e| e.state).unwrap_or(0)
    }

    fn push(&mut self, state: usize, node: NodeId, level: usize) {
        self.stack.push(StackEntry { state, node: Some(node), level });
    }

    fn stack_to_string(&self) -> String {
        self.stack.iter().map(|e| e.state.to_string()).join(" ")
    }

    /// Tokens that stop an `Any` with the arguments `args`, shifted to the state `target`.
    fn stop_tokens(&self, args: &SymbolArguments, target: usize) -> HashSet<TokenId> {
        let grammar = self.grammar;
        match grammar.any_arguments_tokens(args, AnyArgument::Except) {
            Some(except) => except,
            None => {
                let mut tokens = self.table.expected_tokens(target);
                tokens.remove(&ANY);
                if let Some(include) = grammar.any_arguments_tokens(args, AnyArgument::Include) {
                    tokens.retain(|t| !include.contains(t));
                }
                tokens
            }
        }
    }

    fn starts_with_any(&self, node: NodeId) -> bool {
        let mut current = node;
        loop {
            if self.tree[current].is_any() {
                return true;
            }
            match self.tree[current].children.first() {
                Some(child) => current = *child,
                None => return false,
            }
        }
    }

    /// Target state and arguments of the `Any` shifted in the state.
    fn any_shift(&self, state: usize) -> Option<(usize, Marker)> {
        let target = self.table.actions(state, ANY).iter().find_map(|a| if let Action::Shift(s) = a { Some(*s) } else { None })?;
        let marker = self.table.any_marker(self.grammar, state)?;
        Some((target, marker))
    }

    // -- algorithm

    fn parse(&mut self) -> Option<NodeId> {
        let grammar = self.grammar;
        let mut token = self.next_token();
        loop {
            if token.name == ERROR {
                return None;
            }
            let state = self.top_state();
            if self.tracing {
                self.log.add_trace(format!("token: {} | stack: {}", token_info(grammar, &token), self.stack_to_string()), Some(token.location.start));
            }
            match self.table.action(state, token.name) {
                Some(Action::Shift(target)) => {
                    if token.name == ANY {
                        let any = self.new_node(ANY_NAME);
                        token = self.skip_any(any, true);
                    } else {
                        let node = self.new_node(grammar.symbol_name(Symbol::T(token.name)));
                        self.tree.set_location(node, token.location.start, token.location.end);
                        self.tree[node].value.push(token.text.clone());
                        let level = self.stream.pairs_count();
                        self.push(target, node, level);
                        token = self.next_token();
                    }
                }
                Some(Action::Reduce(alt)) => {
                    if !self.reduce(alt) {
                        return None;
                    }
                }
                Some(Action::Accept) => {
                    return self.stack.last().and_then(|e| e.node);
                }
                None => {
                    if token.name == ANY {
                        let current = self.current_token();
                        let expected = self.table.expected_tokens(state).into_iter().filter(|t| *t != ANY);
                        self.log.add_warning(
                            format!("unexpected token {}, expected one of: {}", token_info(grammar, &current), tokens_to_string(grammar, expected)),
                            Some(current.location.start));
                        token = self.error_recovery(None, None);
                    } else if grammar.is_skipped(token.name) {
                        token = self.next_token();
                    } else {
                        token = self.stream.create_token(ANY);
                    }
                }
            }
        }
    }

    /// Pops the symbols of the alternative and pushes the nonterminal with the node that holds
    /// them. The children get the options of the elements, unless they already have some.
    fn reduce(&mut self, alt: AltId) -> bool {
        let grammar = self.grammar;
        let alternative = grammar.alt(alt);
        let var = alternative.var();
        let node = self.new_node(grammar.symbol_name(Symbol::NT(var)));
        if let Some(alias) = &alternative.alias {
            self.tree[node].alias = Some(alias.clone());
        }
        let mut level = self.stream.pairs_count();
        for entry in alternative.elements.iter().take(grammar.alt_symbols(alt).len()).rev() {
            let Some(popped) = self.stack.pop() else { break };
            level = popped.level;
            if let Some(child) = popped.node {
                self.tree.add_first_child(node, child);
                if self.tree[child].options.is_empty() {
                    self.tree[child].options = entry.options.clone();
                }
                if self.tree[child].arguments.is_empty() {
                    self.tree[child].arguments = entry.arguments.clone();
                }
            }
        }
        match self.table.transition(self.top_state(), Symbol::NT(var)) {
            Some(target) => {
                self.push(target, node, level);
                true
            }
            None => {
                let current = self.current_token();
                self.log.add_error(format!("no transition on '{}' after reducing it", grammar.developerify(grammar.symbol_name(Symbol::NT(var)))), Some(current.location.start));
                false
            }
        }
    }

    /// Shifts `Any` and skips the tokens it matches, starting at the current token. When `Any`
    /// doesn't stop on a token the next state can process, the parser goes back to the first
    /// token and starts a recovery if `enable_recovery` is set.
    fn skip_any(&mut self, any: NodeId, enable_recovery: bool) -> Token {
        let grammar = self.grammar;
        let pairs_state = self.stream.pairs_state();
        let token_index = self.current_index();
        let mut token = self.current_token();
        let table = self.table;
        while let [Action::Reduce(alt)] = table.actions(self.top_state(), ANY) {
            if !self.reduce(*alt) {
                return self.error_token();
            }
        }
        let Some((target, marker)) = self.any_shift(self.top_state()) else {
            self.log.add_error(format!("unexpected token {}", token_info(grammar, &token)), Some(token.location.start));
            return self.error_token();
        };
        let entry = &grammar.alt(marker.alt).elements[marker.pos];
        self.tree[any].options = entry.options.clone();
        self.tree[any].arguments = entry.arguments.clone();
        let any_level = self.stream.pairs_count();
        self.push(target, any, any_level);
        let args = entry.arguments.clone();
        let stop = self.stop_tokens(&args, target);
        if stop.contains(&token.name) {
            return token;
        }
        let ignore_pairs = args.contains(AnyArgument::IgnorePairs);
        let avoid = grammar.any_arguments_tokens(&args, AnyArgument::Avoid).unwrap_or_default();
        let location = self.tree.location(any);
        let start = location.map(|l| l.start).unwrap_or(token.location.start);
        let mut end = location.map(|l| l.end).unwrap_or(token.location.start);
        while !stop.contains(&token.name)
            && (ignore_pairs || self.stream.direction() != Direction::Up)
            && !avoid.contains(&token.name)
            && token.name != EOF && token.name != ERROR
        {
            self.tree[any].value.push(token.text.clone());
            end = token.location.end;
            if ignore_pairs {
                token = self.next_token();
            } else {
                let (next, skipped) = self.next_token_at_level(any_level);
                if let Some(last) = skipped.last() {
                    end = last.location.end;
                }
                self.tree[any].value.extend(skipped.into_iter().map(|t| t.text));
                token = next;
            }
        }
        self.tree.set_location(any, start, end);
        if token.name == ERROR || stop.contains(&token.name) {
            return token;
        }
        let message = format!("unexpected token {} while skipping Any, expected one of: {}",
                              token_info(grammar, &token), tokens_to_string(grammar, stop.iter().copied()));
        if enable_recovery {
            self.log.add_warning(message, Some(token.location.start));
            self.statistics.recovery_times_any += 1;
            self.statistics.longest_rollback = self.statistics.longest_rollback.max(self.current_index() - token_index);
            self.stream.move_to(token_index, pairs_state);
            // the node stays on the stack, so that the recovery doesn't restart at the same place
            self.tree.reset(any);
            let avoided = avoid.contains(&token.name).then_some(token.name);
            self.error_recovery(Some(&stop), avoided)
        } else {
            self.log.add_error(message, Some(token.location.start));
            self.error_token()
        }
    }

    /// Recovery nonterminal that can restart with `Any` in `state` and that derives the marker
    /// which consumed `symbol`.
    fn recovery_var(&self, state: usize, symbol: Symbol) -> Option<VarId> {
        let grammar = self.grammar;
        let markers = &self.table.item(state).markers;
        // nonterminals started in the state, reached upward from the markers whose next symbol is `start`
        let started_vars = |start: Symbol| {
            let mut fragments = markers.iter().filter(|m| grammar.marker_next(m) == Some(start)).copied().collect::<BTreeSet<_>>();
            let mut vars = BTreeSet::<VarId>::new();
            loop {
                let new_vars = fragments.iter()
                    .filter(|m| m.pos == 0)
                    .map(|m| grammar.alt(m.alt).var())
                    .filter(|v| !vars.contains(v))
                    .collect::<BTreeSet<_>>();
                if new_vars.is_empty() {
                    break vars;
                }
                fragments = markers.iter().filter(|m| matches!(grammar.marker_next(m), Some(Symbol::NT(v)) if new_vars.contains(&v))).copied().collect();
                vars.extend(new_vars);
            }
        };
        let containing = started_vars(symbol);
        let with_any = started_vars(Symbol::T(ANY));
        containing.intersection(&with_any)
            .find(|v| grammar.is_recovery_symbol(**v) && self.table.transition(state, Symbol::NT(**v)).is_some())
            .copied()
    }

    /// Would restarting with `Any` in `state` fail again in the same way? `stop` are the tokens
    /// of the failed `Any` and `avoided` the avoided token that made it fail.
    fn is_unsafe_any(&self, stop: Option<&HashSet<TokenId>>, avoided: Option<TokenId>, state: usize, level: usize) -> bool {
        let Some(old_stop) = stop else { return false };
        if level != self.stream.pairs_count() {
            return false;
        }
        let grammar = self.grammar;
        let Some((target, marker)) = self.any_shift(state) else { return true };
        let args = &grammar.alt(marker.alt).elements[marker.pos].arguments;
        let avoid = grammar.any_arguments_tokens(args, AnyArgument::Avoid).unwrap_or_default();
        if avoid.contains(&self.current_token().name) {
            return true;
        }
        let new_stop = self.stop_tokens(args, target);
        new_stop.is_subset(old_stop) && avoided.map(|t| avoid.contains(&t)).unwrap_or(true)
    }

    /// Pops the stack until a state where a recovery nonterminal that includes the popped nodes
    /// can restart with `Any`, then parses it again from there.
    fn error_recovery(&mut self, stop: Option<&HashSet<TokenId>>, avoided: Option<TokenId>) -> Token {
        let grammar = self.grammar;
        let current = self.current_token();
        if !grammar.options().is_recovery_enabled() {
            self.log.add_error(format!("unexpected token {}, error recovery is disabled", token_info(grammar, &current)), Some(current.location.start));
            return self.error_token();
        }
        if !self.recovery_positions.insert(self.current_index()) {
            self.log.add_error(format!("recovery already attempted at token {}", token_info(grammar, &current)), Some(current.location.start));
            return self.error_token();
        }
        let started = Instant::now();
        self.log.add_warning(format!("recovery started at token {}", token_info(grammar, &current)), Some(current.location.start));
        let mut popped: Vec<NodeId> = Vec::new();
        let mut found = None;
        while self.stack.len() > 1 {
            let Some(entry) = self.stack.pop() else { break };
            let Some(node) = entry.node else { break };
            popped.insert(0, node);
            let state = self.top_state();
            let symbol = grammar.symbol(&self.tree[node].symbol).unwrap_or(Symbol::T(ANY));
            if let Some(var) = self.recovery_var(state, symbol) {
                if !self.starts_with_any(node) && !self.is_unsafe_any(stop, avoided, state, entry.level) {
                    found = Some((var, entry.level));
                    break;
                }
            }
        }
        if let Some((var, level)) = found {
            let mut skipped = Vec::new();
            if self.stream.pairs_count() != level {
                let (_, rest) = self.next_token_at_level(level);
                skipped.push(current.clone());
                skipped.extend(rest);
            }
            let any = self.new_node(ANY_NAME);
            let mut value = popped.iter().flat_map(|n| self.tree.value(*n)).to_vec();
            value.extend(skipped.iter().map(|t| t.text.clone()));
            self.tree[any].value = value;
            let location = popped.iter()
                .map(|n| self.tree.location(*n))
                .chain(skipped.iter().map(|t| Some(t.location)))
                .fold(None, SegmentLocation::smart_merge);
            if let Some(location) = location {
                self.tree.set_location(any, location.start, location.end);
            }
            let resume = self.current_token();
            let name = grammar.userify(grammar.symbol_name(Symbol::NT(var)));
            self.log.add_warning(format!("possible start of '{name}' found"), location.map(|l| l.start));
            self.log.add_warning(format!("trying to resume the parsing on '{name}' at token {}", token_info(grammar, &resume)), Some(resume.location.start));
            let token = self.skip_any(any, false);
            if token.name != ERROR {
                self.log.add_warning(format!("recovered on '{name}', parsing resumed at token {}", token_info(grammar, &token)), Some(token.location.start));
                self.statistics.recovery_times += 1;
                self.statistics.recovery_time += started.elapsed();
                return token;
            }
        }
        self.statistics.recovery_time += started.elapsed();
        self.log.add_error(format!("could not resume the parsing after token {}", token_info(grammar, &current)), Some(current.location.start));
        self.error_token()
    }
}
