// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

//! LL(1) parser.
//!
//! The table is indexed by the nonterminal on the top of the stack and the next token. `Any` has
//! its own column: it holds the alternatives that derive `Any` first, which are used when the
//! parser decides to skip tokens. The decision is taken with the FIRST sets where `Any` may be
//! empty, so `Any` stops as soon as a token that can follow it is found.

use std::collections::{HashMap, HashSet};
use std::time::Instant;
use land_core::lexer::{Lexer, Token};
use land_core::location::SegmentLocation;
use land_core::log::{BufLog, LogReader, LogStatus, Logger};
use land_core::{AltId, CollectJoin, TokenId, VarId, ANY, ANY_NAME, EOF, ERROR};
use crate::grammar::args::{AnyArgument, SymbolArguments};
use crate::grammar::options::SymbolOptions;
use crate::grammar::{Grammar, GrammarKind, Symbol};
use crate::parser::{token_info, tokens_to_string, ParseOutput, ParseRun, Parser, ParserCore, ParserError, Statistics};
use crate::stream::{ComplexTokenStream, Direction};
use crate::tree::{NodeGenerator, NodeId, Tree};

const VERBOSE: bool = false;

// ---------------------------------------------------------------------------------------------

/// LL(1) table: for each nonterminal and token, the alternatives to apply. A valid table has
/// at most one alternative in each cell.
#[derive(Clone, PartialEq, Debug)]
pub struct TableLl1 {
    num_t: usize,
    table: Vec<Vec<AltId>>,
}

impl TableLl1 {
    pub fn new(grammar: &Grammar) -> Self {
        let num_t = grammar.num_t();
        let mut table = vec![Vec::<AltId>::new(); grammar.num_nt() * num_t];
        for alt_id in 0..grammar.num_alts() as AltId {
            let var = grammar.alt(alt_id).var();
            let row = var as usize * num_t;
            let alt_first = grammar.first(grammar.alt_symbols(alt_id));
            for t in alt_first.iter().filter_map(|s| s.as_t()) {
                table[row + t as usize].push(alt_id);
            }
            if alt_first.contains(&Symbol::Empty) {
                let nep = grammar.non_empty_precedence(var);
                let var_first = grammar.first_var(var);
                for t in grammar.follow(var) {
                    let add = if nep {
                        !var_first.contains(&Symbol::T(*t))
                    } else {
                        !alt_first.contains(&Symbol::T(*t))
                    };
                    if add {
                        table[row + *t as usize].push(alt_id);
                    }
                }
            }
        }
        for cell in table.iter_mut() {
            cell.sort();
            cell.dedup();
        }
        if VERBOSE { println!("LL(1) table: {} x {}", grammar.num_nt(), num_t); }
        TableLl1 { num_t, table }
    }

    /// Alternatives for `var` when the next token is `token`.
    pub fn get(&self, var: VarId, token: TokenId) -> &[AltId] {
        self.table.get(var as usize * self.num_t + token as usize).map(|c| c.as_slice()).unwrap_or(&[])
    }

    /// Tokens with at least one alternative for `var`.
    pub fn expected_tokens(&self, var: VarId) -> Vec<TokenId> {
        (0..self.num_t as TokenId).filter(|t| !self.get(var, *t).is_empty()).to_vec()
    }

    /// Reports the cells with several alternatives.
    pub fn check_validity(&self, grammar: &Grammar) -> BufLog {
        let mut log = BufLog::new();
        for var in 0..grammar.num_nt() as VarId {
            for t in 0..self.num_t as TokenId {
                let cell = self.get(var, t);
                if cell.len() > 1 {
                    let name = grammar.symbol_name(Symbol::NT(var));
                    log.add_error(
                        format!("the grammar isn't LL(1): conflict in '{}' on {}: {}",
                                grammar.developerify(name),
                                grammar.developerify(grammar.symbol_name(Symbol::T(t))),
                                cell.iter().map(|a| format!("'{}'", grammar.alt_to_string(*a))).join(", ")),
                        grammar.location(name));
                }
            }
        }
        log
    }

    /// Table in CSV format, one row per nonterminal and one column per token.
    pub fn to_csv(&self, grammar: &Grammar) -> String {
        let mut lines = Vec::new();
        let header = (0..self.num_t as TokenId).map(|t| csv_field(&grammar.developerify(grammar.symbol_name(Symbol::T(t))))).join(",");
        lines.push(format!(",{header}"));
        for var in 0..grammar.num_nt() as VarId {
            let cells = (0..self.num_t as TokenId)
                .map(|t| csv_field(&self.get(var, t).iter().map(|a| grammar.alt_to_string(*a)).join(" / ")))
                .join(",");
            lines.push(format!("{},{cells}", csv_field(&grammar.developerify(grammar.symbol_name(Symbol::NT(var))))));
        }
        lines.join("\n")
    }
}

pub(crate) fn csv_field(text: &str) -> String {
    if text.contains([',', '"', '\n']) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}

// ---------------------------------------------------------------------------------------------

/// What a recovery nonterminal expects when it starts with `Any`: the arguments of that `Any`
/// and the symbols that follow it, top first.
#[derive(Clone, PartialEq, Debug)]
struct RecoveryPath {
    arguments: SymbolArguments,
    follow: Vec<Symbol>,
}

/// Derives each recovery nonterminal on the `Any` column until `Any` is on the top.
fn build_recovery_cache(grammar: &Grammar, table: &TableLl1) -> HashMap<VarId, RecoveryPath> {
    let mut cache = HashMap::new();
    for var in (0..grammar.num_nt() as VarId).filter(|v| grammar.is_recovery_symbol(*v)) {
        // stack of (symbol, (alternative, position) that produced it)
        let mut stack: Vec<(Symbol, Option<(AltId, usize)>)> = vec![(Symbol::NT(var), None)];
        while let Some(&(Symbol::NT(top), _)) = stack.last() {
            let Some(&alt) = table.get(top, ANY).first() else { break };
            stack.pop();
            stack.extend(grammar.alt_symbols(alt).iter().enumerate().rev().map(|(pos, s)| (*s, Some((alt, pos)))));
        }
        if let Some(&(Symbol::T(ANY), Some((alt, pos)))) = stack.last() {
            let arguments = grammar.alt(alt).elements[pos].arguments.clone();
            stack.pop();
            let follow = stack.iter().rev().map(|(s, _)| *s).to_vec();
            cache.insert(var, RecoveryPath { arguments, follow });
        }
    }
    cache
}

// ---------------------------------------------------------------------------------------------

pub struct LlParser {
    core: ParserCore,
    table: TableLl1,
    recovery_cache: HashMap<VarId, RecoveryPath>,
}

impl LlParser {
    /// Creates a parser with the lexer generated from the grammar's token patterns.
    pub fn new(grammar: Grammar) -> Result<Self, ParserError> {
        let lexer = grammar.build_lexer()?;
        Self::with_lexer(grammar, Box::new(lexer))
    }

    /// Creates a parser with a custom lexer. The grammar is checked, and the warnings of the
    /// check remain in its log.
    pub fn with_lexer(mut grammar: Grammar, lexer: Box<dyn Lexer>) -> Result<Self, ParserError> {
        if grammar.kind() != GrammarKind::LL {
            grammar.add_error("the grammar is declared for an LR parser", None);
            return Err(ParserError::InvalidGrammar(grammar.get_log().clone()));
        }
        ParserCore::check_grammar(&mut grammar)?;
        let table = TableLl1::new(&grammar);
        let table_log = table.check_validity(&grammar);
        let is_valid = table_log.has_no_errors();
        for message in table_log.get_messages() {
            grammar.add_message(message.clone());
        }
        if !is_valid {
            return Err(ParserError::InvalidGrammar(grammar.get_log().clone()));
        }
        let recovery_cache = build_recovery_cache(&grammar, &table);
        Ok(LlParser { core: ParserCore::new(grammar, lexer), table, recovery_cache })
    }

    pub fn table(&self) -> &TableLl1 {
        &self.table
    }
}

impl Parser for LlParser {
    fn core(&self) -> &ParserCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ParserCore {
        &mut self.core
    }

    fn parse(&mut self, text: &str) -> ParseOutput {
        let table = &self.table;
        let recovery_cache = &self.recovery_cache;
        self.core.run(text, |grammar, lexer, generator, text, tracing| {
            let mut run = LlRun {
                grammar,
                table,
                recovery_cache,
                generator,
                stream: ComplexTokenStream::new(grammar, lexer, text),
                tree: Tree::new(),
                stack: Vec::new(),
                nesting_level: HashMap::new(),
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

/// State of one parse.
struct LlRun<'a> {
    grammar: &'a Grammar,
    table: &'a TableLl1,
    recovery_cache: &'a HashMap<VarId, RecoveryPath>,
    generator: &'a dyn NodeGenerator,
    stream: ComplexTokenStream<'a>,
    tree: Tree,
    /// symbols still to match, top last, with the node created for each of them
    stack: Vec<(Symbol, NodeId)>,
    /// nesting level of the pairs when an alternative was applied to the node
    nesting_level: HashMap<NodeId, usize>,
    /// indices of the tokens where a recovery was started
    recovery_positions: HashSet<usize>,
    log: BufLog,
    statistics: Statistics,
    tracing: bool,
}

impl<'a> LlRun<'a> {
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

    /// Last token read from the text; unlike the token processed by the parser, it's never
    /// a synthetic [ANY].
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

    fn new_node(&mut self, symbol: &str, options: SymbolOptions, arguments: SymbolArguments) -> NodeId {
        self.tree.add(self.generator.generate(symbol, options, arguments))
    }

    /// Symbols of the stack, top first.
    fn stack_symbols(&self) -> Vec<Symbol> {
        self.stack.iter().rev().map(|(s, _)| *s).to_vec()
    }

    fn stack_to_string(&self) -> String {
        self.stack.iter().rev().map(|(s, _)| self.grammar.developerify(self.grammar.symbol_name(*s))).join(" ")
    }

    /// Tokens that stop an `Any` with the arguments `args`, followed by the symbols `follow`.
    fn stop_tokens(&self, args: &SymbolArguments, follow: &[Symbol]) -> HashSet<TokenId> {
        let grammar = self.grammar;
        match grammar.any_arguments_tokens(args, AnyArgument::Except) {
            Some(except) => except,
            None => {
                let mut tokens = grammar.first_modified(follow).into_iter().filter_map(|s| s.as_t()).collect::<HashSet<_>>();
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

    // -- algorithm

    fn parse(&mut self) -> Option<NodeId> {
        let grammar = self.grammar;
        let Some(start) = grammar.start() else {
            self.log.add_error("the grammar has no start symbol", None);
            return None;
        };
        let eof_node = self.new_node(grammar.symbol_name(Symbol::T(EOF)), SymbolOptions::new(), SymbolArguments::new());
        let root = self.new_node(grammar.symbol_name(Symbol::NT(start)), SymbolOptions::new(), SymbolArguments::new());
        self.stack.push((Symbol::T(EOF), eof_node));
        self.stack.push((Symbol::NT(start), root));
        self.tree.set_root(Some(root));
        let mut token = self.next_token();
        while let Some(&(top, node)) = self.stack.last() {
            if token.name == ERROR {
                break;
            }
            if self.tracing {
                self.log.add_trace(format!("token: {} | stack: {}", token_info(grammar, &token), self.stack_to_string()), Some(token.location.start));
            }
            match top {
                Symbol::T(t) if t == token.name => {
                    if t == ANY {
                        let any = self.new_node(ANY_NAME, SymbolOptions::new(), SymbolArguments::new());
                        token = self.skip_any(any, true);
                    } else {
                        self.stack.pop();
                        self.tree.set_location(node, token.location.start, token.location.end);
                        self.tree[node].value.push(token.text.clone());
                        token = self.next_token();
                    }
                }
                Symbol::NT(var) if !self.table.get(var, token.name).is_empty() => {
                    let alt = self.table.get(var, token.name)[0];
                    if token.name == ANY {
                        let runtime_first = grammar.first_modified(&self.stack_symbols());
                        if runtime_first.contains(&Symbol::T(ANY)) {
                            self.apply_alternative(alt);
                        } else {
                            let current = self.current_token();
                            let expected = runtime_first.iter().filter_map(|s| s.as_t()).filter(|t| *t != ANY);
                            self.log.add_warning(
                                format!("unexpected token {}, expected one of: {}", token_info(grammar, &current), tokens_to_string(grammar, expected)),
                                Some(current.location.start));
                            token = self.error_recovery(None, None);
                        }
                    } else {
                        self.apply_alternative(alt);
                    }
                }
                _ => {
                    if token.name == ANY {
                        let current = self.current_token();
                        let expected = match top {
                            Symbol::NT(var) => tokens_to_string(grammar, self.table.expected_tokens(var)),
                            _ => grammar.userify(grammar.symbol_name(top)),
                        };
                        self.log.add_warning(
                            format!("unexpected token {}, expected {}", token_info(grammar, &current), expected),
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
        if token.name == ERROR {
            None
        } else {
            Some(root)
        }
    }

    /// Replaces the nonterminal on the top by the symbols of the alternative, and adds the
    /// corresponding nodes to its node.
    fn apply_alternative(&mut self, alt: AltId) {
        let grammar = self.grammar;
        let Some((_, node)) = self.stack.pop() else { return };
        let alternative = grammar.alt(alt);
        if let Some(alias) = &alternative.alias {
            self.tree[node].alias = Some(alias.clone());
        }
        self.nesting_level.insert(node, self.stream.pairs_count());
        for (entry, symbol) in alternative.elements.iter().zip(grammar.alt_symbols(alt)).rev() {
            let child = self.new_node(&entry.symbol, entry.options.clone(), entry.arguments.clone());
            self.tree.add_first_child(node, child);
            self.stack.push((*symbol, child));
        }
    }

    /// Skips the tokens matched by `Any`, starting at the current token, and puts them in the
    /// node `any`. When `Any` doesn't stop on a token that can follow it, the parser goes back
    /// to the first token and starts a recovery if `enable_recovery` is set.
    fn skip_any(&mut self, any: NodeId, enable_recovery: bool) -> Token {
        let grammar = self.grammar;
        let pairs_state = self.stream.pairs_state();
        let token_index = self.current_index();
        let mut token = self.current_token();
        // derives the top until `Any` is on the top
        loop {
            match self.stack.last() {
                Some(&(Symbol::NT(var), _)) => match self.table.get(var, ANY).first() {
                    Some(&alt) => self.apply_alternative(alt),
                    None => {
                        self.log.add_error(
                            format!("unexpected token {}, '{}' can't start with Any", token_info(grammar, &token), grammar.userify(grammar.symbol_name(Symbol::NT(var)))),
                            Some(token.location.start));
                        return self.error_token();
                    }
                },
                Some(&(Symbol::T(ANY), _)) => break,
                _ => {
                    self.log.add_error(format!("unexpected token {}", token_info(grammar, &token)), Some(token.location.start));
                    return self.error_token();
                }
            }
        }
        let Some((_, placeholder)) = self.stack.pop() else { return self.error_token() };
        self.tree[any].options = self.tree[placeholder].options.clone();
        self.tree[any].arguments = self.tree[placeholder].arguments.clone();
        if let Some(parent) = self.tree[placeholder].parent {
            if let Some(position) = self.tree.child_index(parent, placeholder) {
                self.tree.replace_child(parent, any, position);
            }
        }
        let args = self.tree[any].arguments.clone();
        let stop = self.stop_tokens(&args, &self.stack_symbols());
        if stop.contains(&token.name) {
            return token;
        }
        let ignore_pairs = args.contains(AnyArgument::IgnorePairs);
        let avoid = grammar.any_arguments_tokens(&args, AnyArgument::Avoid).unwrap_or_default();
        let location = self.tree.location(any);
        let start = location.map(|l| l.start).unwrap_or(token.location.start);
        let mut end = location.map(|l| l.end).unwrap_or(token.location.start);
        let any_level = self.stream.pairs_count();
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
            self.tree.reset(any);
            self.stack.push((Symbol::T(ANY), any));
            let avoided = avoid.contains(&token.name).then_some(token.name);
            self.error_recovery(Some(&stop), avoided)
        } else {
            self.log.add_error(message, Some(token.location.start));
            self.error_token()
        }
    }

    /// Is `node` a recovery point that would make `Any` fail again in the same way? `stop` are
    /// the tokens of the failed `Any` and `avoided` the avoided token that made it fail.
    fn is_unsafe_any(&self, stop: Option<&HashSet<TokenId>>, avoided: Option<TokenId>, node: NodeId) -> bool {
        let Some(old_stop) = stop else { return false };
        if self.nesting_level.get(&node).copied() != Some(self.stream.pairs_count()) {
            return false;
        }
        let grammar = self.grammar;
        let Some(path) = grammar.rule_id(&self.tree[node].symbol).and_then(|v| self.recovery_cache.get(&v)) else {
            return true;
        };
        let avoid = grammar.any_arguments_tokens(&path.arguments, AnyArgument::Avoid).unwrap_or_default();
        if avoid.contains(&self.current_token().name) {
            return true;
        }
        let mut follow = path.follow.clone();
        follow.extend(self.stack_symbols());
        let new_stop = self.stop_tokens(&path.arguments, &follow);
        new_stop.is_subset(old_stop) && avoided.map(|t| avoid.contains(&t)).unwrap_or(true)
    }

    /// Walks up the tree from the failed node to the closest recovery nonterminal, then parses it
    /// again from its first token as if it started with `Any`.
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
        let Some((_, mut node)) = self.stack.pop() else { return self.error_token() };
        let found = loop {
            let Some(parent) = self.tree[node].parent else { break None };
            let position = self.tree.child_index(parent, node).unwrap_or(0);
            let right_siblings = self.tree[parent].children.len().saturating_sub(position + 1);
            self.stack.truncate(self.stack.len().saturating_sub(right_siblings));
            node = parent;
            let is_recovery = grammar.rule_id(&self.tree[node].symbol).map(|v| grammar.is_recovery_symbol(v)).unwrap_or(false);
            if is_recovery && !self.starts_with_any(node) && !self.is_unsafe_any(stop, avoided, node) {
                break Some(node);
            }
        };
        if let Some(node) = found {
            if let Some(var) = grammar.rule_id(&self.tree[node].symbol) {
                let level = self.nesting_level.get(&node).copied().unwrap_or(0);
                let mut skipped = Vec::new();
                if self.stream.pairs_count() != level {
                    let (_, rest) = self.next_token_at_level(level);
                    skipped.push(current.clone());
                    skipped.extend(rest);
                }
                let any = self.new_node(ANY_NAME, SymbolOptions::new(), SymbolArguments::new());
                let mut value = self.tree.value(node);
                value.extend(skipped.iter().map(|t| t.text.clone()));
                self.tree[any].value = value;
                let mut location = self.tree.location(node);
                if let (Some(first), Some(last)) = (skipped.first(), skipped.last()) {
                    let start = location.map(|l| l.start).unwrap_or(first.location.start);
                    location = Some(SegmentLocation::new(start, last.location.end));
                }
                if let Some(location) = location {
                    self.tree.set_location(any, location.start, location.end);
                }
                self.tree.reset_children(node);
                self.stack.push((Symbol::NT(var), node));
                let resume = self.current_token();
                let name = grammar.userify(&self.tree[node].symbol);
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
        }
        self.statistics.recovery_time += started.elapsed();
        self.log.add_error(format!("could not resume the parsing after token {}", token_info(grammar, &current)), Some(current.location.start));
        self.error_token()
    }
}
