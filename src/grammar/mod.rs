// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

//! Grammar model: terminals, nonterminals with their alternatives, pairs, aliases and options.
//!
//! The grammar is built with the `declare_*` and `generate_*` methods, then [Grammar::post_processing]
//! and [Grammar::check_validity] must be called before building a parser. Any mutation resets
//! the FIRST/FOLLOW caches, which are rebuilt on the next access.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt::{Display, Formatter};
use std::ops::Index;
use std::sync::OnceLock;
use iter_index::IndexerIterator;
use land_core::lexer::RegexLexer;
use land_core::location::PointLocation;
use land_core::log::{BufLog, LogReader, LogWriter, Logger};
use land_core::{AltId, CollectJoin, TokenId, VarId, ANY, ANY_NAME, CUSTOM_BLOCK_RULE_NAME, RESERVED_TOKEN_NAMES};
use crate::grammar::args::{AnyArgument, SymbolArguments};
use crate::grammar::options::{GrammarOption, NodeOption, OptionValue, OptionsManager, ParsingOption, SymbolOptions};
use crate::grammar::sets::{calc_first, calc_follow, calc_sentence_tokens, seq_first, RuleView};

pub mod args;
pub mod options;
pub mod closure;
pub(crate) mod sets;
mod check;
mod display;

pub const AUTO_RULE_PREFIX: &str = "auto__";
pub const AUTO_TOKEN_PREFIX: &str = "AUTO__";

// ---------------------------------------------------------------------------------------------

#[derive(Clone, Copy, Default, PartialEq, PartialOrd, Eq, Ord, Debug, Hash)]
pub enum Symbol {
    T(TokenId),         // terminal
    NT(VarId),          // non-terminal
    #[default] Empty,   // empty symbol
}

impl Symbol {
    pub fn is_empty(&self) -> bool {
        matches!(self, Symbol::Empty)
    }

    pub fn is_t(&self) -> bool {
        matches!(self, Symbol::T(_))
    }

    pub fn is_nt(&self) -> bool {
        matches!(self, Symbol::NT(_))
    }

    pub fn is_any(&self) -> bool {
        *self == Symbol::T(ANY)
    }

    pub fn as_t(&self) -> Option<TokenId> {
        if let Symbol::T(t) = self { Some(*t) } else { None }
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Symbol::Empty => write!(f, "ε"),
            Symbol::T(id) => write!(f, ":{id}"),
            Symbol::NT(id) => write!(f, "{id}"),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum GrammarKind { LL, LR }

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum GrammarState { Unknown, Valid, Invalid }

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum Quantifier { OneOrMore, ZeroOrMore, ZeroOrOne }

impl Display for Quantifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Quantifier::OneOrMore => write!(f, "+"),
            Quantifier::ZeroOrMore => write!(f, "*"),
            Quantifier::ZeroOrOne => write!(f, "?"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum GrammarError {
    #[error("'{0}' is a reserved name")]
    ReservedName(String),
    #[error("'{name}' is already declared as {kind}")]
    AlreadyDeclared { name: String, kind: &'static str },
    #[error("undefined symbol(s): {}", .0.join(", "))]
    UnknownSymbols(Vec<String>),
    #[error("{option}: {reason}")]
    InvalidOption { option: String, reason: String },
    #[error("invalid pattern for token '{name}': {reason}")]
    InvalidPattern { name: String, reason: String },
    #[error("too many symbols in the grammar")]
    TooManySymbols,
}

// ---------------------------------------------------------------------------------------------

/// Occurrence of a symbol in an alternative, with its local options and, for [ANY], its arguments.
#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    pub symbol: String,
    pub options: SymbolOptions,
    pub arguments: SymbolArguments,
}

impl Entry {
    pub fn new<T: Into<String>>(symbol: T) -> Self {
        Entry { symbol: symbol.into(), options: SymbolOptions::new(), arguments: SymbolArguments::new() }
    }

    pub fn any(arguments: SymbolArguments) -> Self {
        Entry { symbol: ANY_NAME.to_string(), options: SymbolOptions::new(), arguments }
    }

    pub fn with_option<O: Into<GrammarOption>>(mut self, option: O, params: Vec<OptionValue>) -> Self {
        self.options.set(option, params);
        self
    }

    pub fn is_any(&self) -> bool {
        self.symbol == ANY_NAME
    }
}

impl From<&str> for Entry {
    fn from(value: &str) -> Self {
        Entry::new(value)
    }
}

impl From<String> for Entry {
    fn from(value: String) -> Self {
        Entry::new(value)
    }
}

/// Alternative of a rule. An empty alternative stands for ε.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Alternative {
    var: VarId,
    pub alias: Option<String>,
    pub elements: Vec<Entry>,
}

impl Alternative {
    pub fn new() -> Self {
        Alternative { var: 0, alias: None, elements: Vec::new() }
    }

    pub fn from_symbols(symbols: &[&str]) -> Self {
        Alternative { var: 0, alias: None, elements: symbols.iter().map(|s| Entry::new(*s)).collect() }
    }

    pub fn add<E: Into<Entry>>(mut self, entry: E) -> Self {
        self.elements.push(entry.into());
        self
    }

    pub fn with_alias<T: Into<String>>(mut self, alias: T) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Nonterminal of the alternative, valid once it's declared in a grammar.
    pub fn var(&self) -> VarId {
        self.var
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.elements.iter()
    }

    /// Same sequence of symbols and arguments, ignoring the options and the alias.
    pub fn same_symbols(&self, other: &Alternative) -> bool {
        self.elements.len() == other.elements.len()
            && self.elements.iter().zip(&other.elements).all(|(a, b)| a.symbol == b.symbol && a.arguments == b.arguments)
    }
}

impl Index<usize> for Alternative {
    type Output = Entry;

    fn index(&self, index: usize) -> &Self::Output {
        &self.elements[index]
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TerminalSymbol {
    pub name: String,
    pub pattern: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Rule {
    pub name: String,
    pub alts: Vec<AltId>,
}

/// Pair of bracket-like tokens. A token may open and close the same pair (quotes).
#[derive(Clone, Debug, PartialEq)]
pub struct PairSymbol {
    pub name: String,
    pub left: BTreeSet<String>,
    pub right: BTreeSet<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ElementQuantifier {
    pub element: String,
    pub quantifier: Quantifier,
}

/// Cached sets, rebuilt after any mutation.
#[derive(Clone, Debug)]
pub(crate) struct GrammarSets {
    pub view: RuleView,
    pub first: Vec<HashSet<Symbol>>,
    pub first_modified: Vec<HashSet<Symbol>>,
    pub follow: Vec<HashSet<TokenId>>,
    pub sentence_tokens: Vec<HashSet<TokenId>>,
}

// ---------------------------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Grammar {
    kind: GrammarKind,
    tokens: Vec<TerminalSymbol>,
    token_ids: HashMap<String, TokenId>,
    rules: Vec<Rule>,
    rule_ids: HashMap<String, VarId>,
    alts: Vec<Alternative>,
    pairs: Vec<PairSymbol>,
    aliases: BTreeMap<String, BTreeSet<String>>,
    options: OptionsManager,
    non_empty_precedence: HashSet<VarId>,
    auto_rule_quantifier: HashMap<VarId, ElementQuantifier>,
    auto_rule_counter: usize,
    auto_token_counter: usize,
    locations: HashMap<String, PointLocation>,
    state: GrammarState,
    sets: OnceLock<GrammarSets>,
    log: BufLog,
}

impl Grammar {
    pub fn new(kind: GrammarKind) -> Self {
        let mut grammar = Grammar {
            kind,
            tokens: Vec::new(),
            token_ids: HashMap::new(),
            rules: Vec::new(),
            rule_ids: HashMap::new(),
            alts: Vec::new(),
            pairs: Vec::new(),
            aliases: BTreeMap::new(),
            options: OptionsManager::new(),
            non_empty_precedence: HashSet::new(),
            auto_rule_quantifier: HashMap::new(),
            auto_rule_counter: 0,
            auto_token_counter: 0,
            locations: HashMap::new(),
            state: GrammarState::Unknown,
            sets: OnceLock::new(),
            log: BufLog::new(),
        };
        for name in RESERVED_TOKEN_NAMES {
            grammar.add_token(name.to_string(), None);
        }
        grammar
    }

    fn on_update(&mut self) {
        self.state = GrammarState::Unknown;
        self.sets = OnceLock::new();
    }

    // -- accessors

    pub fn kind(&self) -> GrammarKind {
        self.kind
    }

    pub fn state(&self) -> GrammarState {
        self.state
    }

    pub fn num_t(&self) -> usize {
        self.tokens.len()
    }

    pub fn num_nt(&self) -> usize {
        self.rules.len()
    }

    pub fn tokens(&self) -> &[TerminalSymbol] {
        &self.tokens
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn rule(&self, var: VarId) -> &Rule {
        &self.rules[var as usize]
    }

    pub fn alt(&self, alt: AltId) -> &Alternative {
        &self.alts[alt as usize]
    }

    pub fn num_alts(&self) -> usize {
        self.alts.len()
    }

    pub fn pairs(&self) -> &[PairSymbol] {
        &self.pairs
    }

    pub fn options(&self) -> &OptionsManager {
        &self.options
    }

    pub fn aliases(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.aliases
    }

    pub fn non_empty_precedence(&self, var: VarId) -> bool {
        self.non_empty_precedence.contains(&var)
    }

    pub fn auto_rule_quantifier(&self, var: VarId) -> Option<&ElementQuantifier> {
        self.auto_rule_quantifier.get(&var)
    }

    pub fn token_id(&self, name: &str) -> Option<TokenId> {
        self.token_ids.get(name).copied()
    }

    pub fn rule_id(&self, name: &str) -> Option<VarId> {
        self.rule_ids.get(name).copied()
    }

    /// Finds the symbol with that name.
    pub fn symbol(&self, name: &str) -> Option<Symbol> {
        self.token_id(name).map(Symbol::T).or_else(|| self.rule_id(name).map(Symbol::NT))
    }

    pub fn symbol_name(&self, symbol: Symbol) -> &str {
        match symbol {
            Symbol::T(t) => &self.tokens[t as usize].name,
            Symbol::NT(v) => &self.rules[v as usize].name,
            Symbol::Empty => "ε",
        }
    }

    pub fn is_alias(&self, name: &str) -> bool {
        self.aliases.values().any(|a| a.contains(name))
    }

    pub fn start(&self) -> Option<VarId> {
        self.options.symbols(ParsingOption::Start).iter().next().and_then(|s| self.rule_id(s))
    }

    pub fn start_name(&self) -> Option<String> {
        self.options.symbols(ParsingOption::Start).into_iter().next()
    }

    pub fn add_location(&mut self, symbol: &str, location: PointLocation) {
        self.locations.insert(symbol.to_string(), location);
        // the helper rule of X* generated for X+ in LL shares the location
        if let Some(var) = self.rule_id(symbol) {
            if self.kind == GrammarKind::LL
                && matches!(self.auto_rule_quantifier.get(&var), Some(ElementQuantifier { quantifier: Quantifier::OneOrMore, .. })) {
                if let Some(star) = self.rules[var as usize].alts.first().and_then(|a| self.alts[*a as usize].elements.get(1)) {
                    self.locations.insert(star.symbol.clone(), location);
                }
            }
        }
    }

    pub fn location(&self, symbol: &str) -> Option<PointLocation> {
        self.locations.get(symbol).copied()
    }

    /// Converts a set of names to the IDs of the tokens among them.
    pub fn resolve_tokens<'a, I: IntoIterator<Item = &'a String>>(&self, names: I) -> HashSet<TokenId> {
        names.into_iter().filter_map(|n| self.token_id(n)).collect()
    }

    /// Is the token in the skip list?
    pub fn is_skipped(&self, token: TokenId) -> bool {
        self.options.is_set(ParsingOption::Skip, Some(&self.tokens[token as usize].name))
    }

    pub fn is_recovery_symbol(&self, var: VarId) -> bool {
        self.options.is_set(ParsingOption::Recovery, Some(&self.rules[var as usize].name))
    }

    // -- declarations

    fn already_declared_check(&self, name: &str) -> Result<(), GrammarError> {
        if name == CUSTOM_BLOCK_RULE_NAME {
            return Err(GrammarError::ReservedName(name.to_string()));
        }
        let kind = if self.rule_ids.contains_key(name) {
            "a nonterminal"
        } else if self.token_ids.contains_key(name) {
            "a terminal"
        } else if self.pairs.iter().any(|p| p.name == name) {
            "a pair"
        } else if self.is_alias(name) {
            "an alias"
        } else {
            return Ok(())
        };
        Err(GrammarError::AlreadyDeclared { name: name.to_string(), kind })
    }

    fn add_token(&mut self, name: String, pattern: Option<String>) -> TokenId {
        let id = self.tokens.len() as TokenId;
        self.token_ids.insert(name.clone(), id);
        self.tokens.push(TerminalSymbol { name, pattern });
        self.on_update();
        id
    }

    fn add_rule(&mut self, name: String, alternatives: Vec<Alternative>) -> VarId {
        let var = self.rules.len() as VarId;
        let mut alts = Vec::new();
        for mut alt in alternatives {
            alt.var = var;
            if let Some(alias) = &alt.alias {
                self.aliases.entry(name.clone()).or_default().insert(alias.clone());
            }
            alts.push(self.alts.len() as AltId);
            self.alts.push(alt);
        }
        self.rule_ids.insert(name.clone(), var);
        self.rules.push(Rule { name, alts });
        self.on_update();
        var
    }

    pub fn declare_terminal(&mut self, name: &str, pattern: Option<&str>) -> Result<TokenId, GrammarError> {
        self.already_declared_check(name)?;
        if self.tokens.len() >= TokenId::MAX as usize {
            return Err(GrammarError::TooManySymbols);
        }
        Ok(self.add_token(name.to_string(), pattern.map(|p| p.to_string())))
    }

    pub fn declare_nonterminal(&mut self, name: &str, alternatives: Vec<Alternative>) -> Result<VarId, GrammarError> {
        self.already_declared_check(name)?;
        if self.rules.len() >= VarId::MAX as usize || self.alts.len() + alternatives.len() >= AltId::MAX as usize {
            return Err(GrammarError::TooManySymbols);
        }
        Ok(self.add_rule(name.to_string(), alternatives))
    }

    pub fn declare_pair(&mut self, name: &str, left: &[&str], right: &[&str]) -> Result<(), GrammarError> {
        self.already_declared_check(name)?;
        self.pairs.push(PairSymbol {
            name: name.to_string(),
            left: left.iter().map(|s| s.to_string()).collect(),
            right: right.iter().map(|s| s.to_string()).collect(),
        });
        self.on_update();
        Ok(())
    }

    pub fn add_aliases(&mut self, symbol: &str, aliases: &[&str]) -> Result<(), GrammarError> {
        for alias in aliases {
            if self.symbol(alias).is_some() {
                return Err(GrammarError::AlreadyDeclared { name: alias.to_string(), kind: "a symbol" });
            }
        }
        self.aliases.entry(symbol.to_string()).or_default().extend(aliases.iter().map(|a| a.to_string()));
        Ok(())
    }

    /// Sets the start symbol. Equivalent to the `%parsing start` option.
    pub fn set_start_symbol(&mut self, name: &str) -> Result<(), GrammarError> {
        self.set_option(ParsingOption::Start, &[name], vec![])
    }

    /// Sets the skip tokens. Equivalent to the `%parsing skip` option.
    pub fn set_skip_tokens(&mut self, names: &[&str]) -> Result<(), GrammarError> {
        self.set_option(ParsingOption::Skip, names, vec![])
    }

    /// Sets a global option for `symbols`, or for the language if `symbols` is empty, after
    /// checking that the option is consistent with the grammar.
    pub fn set_option<O: Into<GrammarOption>>(&mut self, option: O, symbols: &[&str], params: Vec<OptionValue>) -> Result<(), GrammarError> {
        let option = option.into();
        let mut symbols = symbols.iter().map(|s| s.to_string()).to_vec();
        let invalid = |reason: String| GrammarError::InvalidOption { option: option.to_string(), reason };
        match option {
            GrammarOption::Nodes(_) => {
                let unknown = symbols.iter().filter(|s| self.symbol(s).is_none() && !self.is_alias(s)).cloned().to_vec();
                if !unknown.is_empty() {
                    return Err(GrammarError::UnknownSymbols(unknown));
                }
            }
            GrammarOption::Parsing(ParsingOption::Start) => {
                if symbols.len() != 1 {
                    return Err(invalid("exactly one start symbol must be given".to_string()));
                }
                if self.rule_id(&symbols[0]).is_none() {
                    return Err(invalid(format!("'{}' is not a nonterminal", symbols[0])));
                }
                self.options.clear(ParsingOption::Start);
            }
            GrammarOption::Parsing(ParsingOption::Skip) => {
                let unknown = symbols.iter().filter(|s| self.token_id(s).is_none()).cloned().to_vec();
                if !unknown.is_empty() {
                    return Err(invalid(format!("'{}' not defined as terminal(s)", unknown.join("', '"))));
                }
                let in_pairs = symbols.iter()
                    .filter(|s| self.pairs.iter().any(|p| p.left.contains(*s) || p.right.contains(*s)))
                    .cloned().to_vec();
                if !in_pairs.is_empty() {
                    return Err(invalid(format!("'{}' used in the definition of pair(s)", in_pairs.join("', '"))));
                }
            }
            GrammarOption::Parsing(ParsingOption::Recovery) => {
                let unknown = symbols.iter().filter(|s| self.rule_id(s).is_none()).cloned().to_vec();
                if !unknown.is_empty() {
                    return Err(invalid(format!("'{}' not defined as nonterminal(s)", unknown.join("', '"))));
                }
                let recovery = self.recovery_capable_rules();
                if symbols.is_empty() {
                    symbols = recovery.into_iter().map(|v| self.rules[v as usize].name.clone()).collect();
                } else if let Some(bad) = symbols.iter().find(|s| self.rule_id(s).map(|v| !recovery.contains(&v)).unwrap_or(true)) {
                    return Err(invalid(format!(
                        "recovery on '{bad}' is impossible: no derivation of it starts with {ANY_NAME} without a preceding nonterminal")));
                }
            }
            _ => {}
        }
        self.options.set(option, &symbols, params);
        self.on_update();
        Ok(())
    }

    /// Nonterminals having an alternative that starts with [ANY] or with such a nonterminal.
    fn recovery_capable_rules(&self) -> BTreeSet<VarId> {
        let mut recovery = self.rules.iter().index::<VarId>()
            .filter(|(_, r)| r.alts.iter().any(|a| self.alts[*a as usize].elements.first().map(|e| e.is_any()).unwrap_or(false)))
            .map(|(v, _)| v)
            .collect::<BTreeSet<_>>();
        let mut old_count = 0;
        while old_count != recovery.len() {
            old_count = recovery.len();
            let new = self.rules.iter().index::<VarId>()
                .filter(|(_, r)| r.alts.iter().any(|a| self.alts[*a as usize].elements.first()
                    .and_then(|e| self.rule_id(&e.symbol))
                    .map(|v| recovery.contains(&v))
                    .unwrap_or(false)))
                .map(|(v, _)| v)
                .to_vec();
            recovery.extend(new);
        }
        recovery
    }

    // -- generated symbols

    fn new_auto_rule_name(&mut self) -> String {
        let name = format!("{AUTO_RULE_PREFIX}{}", self.auto_rule_counter);
        self.auto_rule_counter += 1;
        name
    }

    /// Generates the rule of a parenthesized group of alternatives and returns its name.
    pub fn generate_group(&mut self, alternatives: Vec<Alternative>) -> String {
        if self.kind == GrammarKind::LR {
            let existing = self.rules.iter().index::<VarId>().find(|(v, r)| {
                r.name.starts_with(AUTO_RULE_PREFIX) && !self.auto_rule_quantifier.contains_key(v)
                    && r.alts.len() == alternatives.len()
                    && alternatives.iter().all(|alt| r.alts.iter().any(|a| self.alts[*a as usize].same_symbols(alt)))
            });
            if let Some((_, rule)) = existing {
                return rule.name.clone();
            }
        }
        let name = self.new_auto_rule_name();
        self.add_rule(name.clone(), alternatives);
        name
    }

    /// Generates the helper rule(s) of `element` with a quantifier and returns the name of the
    /// rule to use in place of the quantified element. `prec_nonempty` gives the priority to the
    /// non-empty alternative in the LL table.
    pub fn generate_nonterminal(&mut self, element: &str, quantifier: Quantifier, prec_nonempty: bool) -> String {
        if self.kind == GrammarKind::LR {
            let existing = self.auto_rule_quantifier.iter()
                .find(|(_, q)| q.element == element && q.quantifier == quantifier)
                .map(|(v, _)| self.rules[*v as usize].name.clone());
            if let Some(name) = existing {
                return name;
            }
        }
        let name = self.new_auto_rule_name();
        let elem = Entry::new(element);
        let var = match (quantifier, self.kind) {
            (Quantifier::OneOrMore, GrammarKind::LL) => {
                let star = self.add_rule(name.clone(), vec![
                    Alternative::new(),
                    Alternative::new().add(elem.clone()).add(name.as_str()),
                ]);
                if prec_nonempty {
                    self.non_empty_precedence.insert(star);
                }
                self.auto_rule_quantifier.insert(star, ElementQuantifier { element: element.to_string(), quantifier: Quantifier::ZeroOrMore });
                let plus_name = self.new_auto_rule_name();
                let plus = self.add_rule(plus_name.clone(), vec![
                    Alternative::new().add(elem).add(name.as_str()),
                ]);
                self.auto_rule_quantifier.insert(plus, ElementQuantifier { element: element.to_string(), quantifier });
                return plus_name;
            }
            (Quantifier::OneOrMore, GrammarKind::LR) => {
                self.add_rule(name.clone(), vec![
                    Alternative::new().add(elem.clone()),
                    Alternative::new().add(name.as_str()).add(elem),
                ])
            }
            (Quantifier::ZeroOrMore, GrammarKind::LL) => {
                self.add_rule(name.clone(), vec![
                    Alternative::new(),
                    Alternative::new().add(elem).add(name.as_str()),
                ])
            }
            (Quantifier::ZeroOrMore, GrammarKind::LR) => {
                self.add_rule(name.clone(), vec![
                    Alternative::new(),
                    Alternative::new().add(name.as_str()).add(elem),
                ])
            }
            (Quantifier::ZeroOrOne, _) => {
                self.add_rule(name.clone(), vec![
                    Alternative::new(),
                    Alternative::new().add(elem),
                ])
            }
        };
        if prec_nonempty && quantifier != Quantifier::OneOrMore {
            self.non_empty_precedence.insert(var);
        }
        self.auto_rule_quantifier.insert(var, ElementQuantifier { element: element.to_string(), quantifier });
        name
    }

    /// Declares a token for a pattern written directly in a rule, or returns the token that
    /// already has this pattern.
    pub fn generate_terminal(&mut self, pattern: &str) -> String {
        if let Some(t) = self.tokens.iter().find(|t| t.pattern.as_deref() == Some(pattern)) {
            return t.name.clone();
        }
        let name = format!("{AUTO_TOKEN_PREFIX}{}", self.auto_token_counter);
        self.auto_token_counter += 1;
        self.add_token(name.clone(), Some(pattern.to_string()));
        name
    }

    /// Final transformations once all the rules and options are declared. For LR grammars, adds
    /// the augmented start rule `auto__N -> start`, unless it's already there.
    pub fn post_processing(&mut self) {
        if self.kind == GrammarKind::LR {
            if let Some(start) = self.start_name().filter(|s| !s.starts_with(AUTO_RULE_PREFIX)) {
                let name = self.new_auto_rule_name();
                self.add_rule(name.clone(), vec![Alternative::new().add(start.as_str())]);
                self.options.clear(ParsingOption::Start);
                self.options.set(ParsingOption::Start, &[name], vec![]);
                self.on_update();
            }
        }
    }

    /// Builds a lexer from the token patterns, which are regular expressions. Fragment tokens
    /// are left out, and whitespace is skipped.
    pub fn build_lexer(&self) -> Result<RegexLexer, GrammarError> {
        let mut lexer = RegexLexer::new();
        lexer.set_ignore_case(self.options.is_set(ParsingOption::IgnoreCase, None));
        for (id, token) in self.tokens.iter().index::<TokenId>() {
            if let Some(pattern) = &token.pattern {
                if self.options.is_set(ParsingOption::Fragment, Some(token.name.as_str())) {
                    continue;
                }
                lexer.add_token(id, pattern)
                    .map_err(|e| GrammarError::InvalidPattern { name: token.name.clone(), reason: e.to_string() })?;
            }
        }
        lexer.add_skip(r"[ \t\r\n\f]+")
            .map_err(|e| GrammarError::InvalidPattern { name: "whitespace".to_string(), reason: e.to_string() })?;
        Ok(lexer)
    }

    // -- sets

    pub(crate) fn rule_view(&self) -> RuleView {
        RuleView {
            var_alts: self.rules.iter().map(|r| r.alts.iter().map(|a| *a as usize).collect()).collect(),
            alt_var: self.alts.iter().map(|a| a.var).collect(),
            alt_symbols: self.alts.iter()
                .map(|a| a.elements.iter().filter_map(|e| self.symbol(&e.symbol)).collect())
                .collect(),
            start: self.start(),
        }
    }

    pub(crate) fn sets(&self) -> &GrammarSets {
        self.sets.get_or_init(|| {
            let view = self.rule_view();
            let first = calc_first(&view, false);
            let first_modified = calc_first(&view, true);
            let follow = calc_follow(&view, &first);
            let sentence_tokens = calc_sentence_tokens(&view);
            GrammarSets { view, first, first_modified, follow, sentence_tokens }
        })
    }

    /// Symbols of an alternative. Undeclared symbols are left out; they're reported by
    /// [Grammar::check_validity].
    pub fn alt_symbols(&self, alt: AltId) -> &[Symbol] {
        &self.sets().view.alt_symbols[alt as usize]
    }

    /// FIRST of a sequence, with [Symbol::Empty] if the sequence can derive ε.
    pub fn first(&self, sequence: &[Symbol]) -> HashSet<Symbol> {
        seq_first(&self.sets().first, sequence, false)
    }

    /// FIRST of a sequence where [ANY] is considered as possibly matching an empty text.
    pub fn first_modified(&self, sequence: &[Symbol]) -> HashSet<Symbol> {
        seq_first(&self.sets().first_modified, sequence, true)
    }

    pub fn first_var(&self, var: VarId) -> &HashSet<Symbol> {
        &self.sets().first[var as usize]
    }

    pub fn follow(&self, var: VarId) -> &HashSet<TokenId> {
        &self.sets().follow[var as usize]
    }

    /// Tokens that may appear in a sentence derived from the start symbol.
    pub fn sentence_tokens(&self) -> HashSet<TokenId> {
        match self.start() {
            Some(start) => self.sets().sentence_tokens[start as usize].clone(),
            None => HashSet::new(),
        }
    }

    /// Tokens that may appear in a text derived from `var`.
    pub fn sentence_tokens_var(&self, var: VarId) -> &HashSet<TokenId> {
        &self.sets().sentence_tokens[var as usize]
    }

    /// Local options of an element merged with the global options of its symbol.
    pub fn entry_options(&self, entry: &Entry) -> SymbolOptions {
        match self.options.symbol_options(&entry.symbol) {
            Some(global) => entry.options.merge(global),
            None => entry.options.clone(),
        }
    }

    /// Is the node option set for the symbol, globally or on one of its aliases?
    pub fn is_node_option_set(&self, option: NodeOption, symbol: &str, alias: Option<&str>) -> bool {
        self.options.is_set(option, Some(symbol)) || alias.map(|a| self.options.is_set(option, Some(a))).unwrap_or(false)
    }

    pub fn any_arguments_tokens(&self, args: &SymbolArguments, arg: AnyArgument) -> Option<HashSet<TokenId>> {
        args.get(arg).map(|names| self.resolve_tokens(names))
    }
}

impl LogReader for Grammar {
    type Item = BufLog;

    fn get_log(&self) -> &Self::Item {
        &self.log
    }

    fn give_log(self) -> Self::Item {
        self.log
    }
}

impl LogWriter for Grammar {
    fn get_mut_log(&mut self) -> &mut impl Logger {
        &mut self.log
    }
}
