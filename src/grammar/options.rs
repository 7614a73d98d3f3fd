// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

//! Grammar options: global options attached to grammar symbols (`%parsing skip COMMENT`, ...)
//! and local options attached to an occurrence of a symbol in an alternative.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use land_core::CollectJoin;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub enum OptionGroup { Parsing, Nodes, CustomBlock, Markup }

/// Options driving the parsing process
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub enum ParsingOption { Start, Skip, IgnoreCase, Fragment, IgnoreUndefined, Recovery, Userify }

/// Options shaping the tree
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub enum NodeOption { Ghost, List, Leaf, Void }

/// Custom block delimiters
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub enum CustomBlockOption { Start, End, BaseToken }

/// Options of the markup (concern points)
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub enum MarkupOption { Priority, Land, ExactMatch, HeaderCore, NotUnique }

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub enum GrammarOption {
    Parsing(ParsingOption),
    Nodes(NodeOption),
    CustomBlock(CustomBlockOption),
    Markup(MarkupOption),
}

impl GrammarOption {
    pub fn group(&self) -> OptionGroup {
        match self {
            GrammarOption::Parsing(_) => OptionGroup::Parsing,
            GrammarOption::Nodes(_) => OptionGroup::Nodes,
            GrammarOption::CustomBlock(_) => OptionGroup::CustomBlock,
            GrammarOption::Markup(_) => OptionGroup::Markup,
        }
    }

    /// Parses an option from its textual group and name, case-insensitive (`"parsing"`, `"skip"`).
    pub fn parse(group: &str, name: &str) -> Option<GrammarOption> {
        let name = name.to_lowercase();
        Some(match group.to_lowercase().as_str() {
            "parsing" => GrammarOption::Parsing(match name.as_str() {
                "start" => ParsingOption::Start,
                "skip" => ParsingOption::Skip,
                "ignorecase" => ParsingOption::IgnoreCase,
                "fragment" => ParsingOption::Fragment,
                "ignoreundefined" => ParsingOption::IgnoreUndefined,
                "recovery" => ParsingOption::Recovery,
                "userify" => ParsingOption::Userify,
                _ => return None,
            }),
            "nodes" => GrammarOption::Nodes(match name.as_str() {
                "ghost" => NodeOption::Ghost,
                "list" => NodeOption::List,
                "leaf" => NodeOption::Leaf,
                "void" => NodeOption::Void,
                _ => return None,
            }),
            "customblock" => GrammarOption::CustomBlock(match name.as_str() {
                "start" => CustomBlockOption::Start,
                "end" => CustomBlockOption::End,
                "basetoken" => CustomBlockOption::BaseToken,
                _ => return None,
            }),
            "markup" => GrammarOption::Markup(match name.as_str() {
                "priority" => MarkupOption::Priority,
                "land" => MarkupOption::Land,
                "exactmatch" => MarkupOption::ExactMatch,
                "headercore" => MarkupOption::HeaderCore,
                "notunique" => MarkupOption::NotUnique,
                _ => return None,
            }),
            _ => return None,
        })
    }
}

impl Display for OptionGroup {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OptionGroup::Parsing => "parsing",
            OptionGroup::Nodes => "nodes",
            OptionGroup::CustomBlock => "customblock",
            OptionGroup::Markup => "markup",
        };
        write!(f, "{s}")
    }
}

impl Display for GrammarOption {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            GrammarOption::Parsing(o) => format!("{o:?}"),
            GrammarOption::Nodes(o) => format!("{o:?}"),
            GrammarOption::CustomBlock(o) => format!("{o:?}"),
            GrammarOption::Markup(o) => format!("{o:?}"),
        };
        write!(f, "%{} {}", self.group(), name.to_lowercase())
    }
}

impl From<ParsingOption> for GrammarOption {
    fn from(value: ParsingOption) -> Self {
        GrammarOption::Parsing(value)
    }
}

impl From<NodeOption> for GrammarOption {
    fn from(value: NodeOption) -> Self {
        GrammarOption::Nodes(value)
    }
}

impl From<CustomBlockOption> for GrammarOption {
    fn from(value: CustomBlockOption) -> Self {
        GrammarOption::CustomBlock(value)
    }
}

impl From<MarkupOption> for GrammarOption {
    fn from(value: MarkupOption) -> Self {
        GrammarOption::Markup(value)
    }
}

// ---------------------------------------------------------------------------------------------

/// Parameter of an option.
#[derive(Clone, PartialEq, Debug)]
pub enum OptionValue {
    String(String),
    Number(f64),
    Bool(bool),
    TokenSet(BTreeSet<String>),
}

impl OptionValue {
    pub fn token_set<I: IntoIterator<Item = T>, T: Into<String>>(names: I) -> Self {
        OptionValue::TokenSet(names.into_iter().map(|s| s.into()).collect())
    }

    pub fn as_str(&self) -> Option<&str> {
        if let OptionValue::String(s) = self { Some(s) } else { None }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            OptionValue::Number(n) => Some(*n),
            OptionValue::String(s) => s.trim().parse().ok(),
            _ => None
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        if let OptionValue::Bool(b) = self { Some(*b) } else { None }
    }

    pub fn as_token_set(&self) -> Option<&BTreeSet<String>> {
        if let OptionValue::TokenSet(s) = self { Some(s) } else { None }
    }
}

impl Display for OptionValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionValue::String(s) => write!(f, "\"{s}\""),
            OptionValue::Number(n) => write!(f, "{n}"),
            OptionValue::Bool(b) => write!(f, "{b}"),
            OptionValue::TokenSet(s) => write!(f, "({})", s.iter().join(", ")),
        }
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::String(value.to_string())
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        OptionValue::Number(value)
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Bool(value)
    }
}

// ---------------------------------------------------------------------------------------------

/// Options of one symbol, or local options of one occurrence of a symbol.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct SymbolOptions {
    options: BTreeMap<GrammarOption, Vec<OptionValue>>,
}

impl SymbolOptions {
    pub fn new() -> Self {
        SymbolOptions { options: BTreeMap::new() }
    }

    /// Sets the option; the parameters are appended to the existing ones.
    pub fn set<O: Into<GrammarOption>>(&mut self, option: O, params: Vec<OptionValue>) {
        self.options.entry(option.into()).or_default().extend(params);
    }

    pub fn with<O: Into<GrammarOption>>(mut self, option: O, params: Vec<OptionValue>) -> Self {
        self.set(option, params);
        self
    }

    pub fn is_set<O: Into<GrammarOption>>(&self, option: O) -> bool {
        self.options.contains_key(&option.into())
    }

    pub fn params<O: Into<GrammarOption>>(&self, option: O) -> &[OptionValue] {
        self.options.get(&option.into()).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn clear<O: Into<GrammarOption>>(&mut self, option: O) {
        self.options.remove(&option.into());
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn options(&self) -> impl Iterator<Item = (&GrammarOption, &Vec<OptionValue>)> {
        self.options.iter()
    }

    pub fn groups(&self) -> BTreeSet<OptionGroup> {
        self.options.keys().map(|o| o.group()).collect()
    }

    /// Local options take precedence; missing ones are completed with `global`.
    pub fn merge(&self, global: &SymbolOptions) -> SymbolOptions {
        let mut merged = self.clone();
        for (option, params) in &global.options {
            merged.options.entry(*option).or_insert_with(|| params.clone());
        }
        merged
    }

    /// First numerical parameter of the option, if any.
    pub fn number<O: Into<GrammarOption>>(&self, option: O) -> Option<f64> {
        self.params(option).iter().find_map(|p| p.as_number())
    }

    /// All the names given in string or token set parameters of the option.
    pub fn names<O: Into<GrammarOption>>(&self, option: O) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        for p in self.params(option) {
            match p {
                OptionValue::String(s) => { names.insert(s.clone()); }
                OptionValue::TokenSet(set) => names.extend(set.iter().cloned()),
                _ => {}
            }
        }
        names
    }
}

// ---------------------------------------------------------------------------------------------

/// Global options of a grammar. Options without symbol apply to the whole language.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct OptionsManager {
    global: SymbolOptions,
    symbols: BTreeMap<String, SymbolOptions>,
}

impl OptionsManager {
    pub fn new() -> Self {
        OptionsManager { global: SymbolOptions::new(), symbols: BTreeMap::new() }
    }

    /// Sets the option for the given symbols, or for the whole language if `symbols` is empty.
    pub fn set<O: Into<GrammarOption>>(&mut self, option: O, symbols: &[String], params: Vec<OptionValue>) {
        let option = option.into();
        if symbols.is_empty() {
            self.global.set(option, params);
        } else {
            for symbol in symbols {
                self.symbols.entry(symbol.clone()).or_default().set(option, params.clone());
            }
        }
    }

    /// Is the option set for `symbol` (or globally if `symbol` is `None`)?
    pub fn is_set<O: Into<GrammarOption>>(&self, option: O, symbol: Option<&str>) -> bool {
        match symbol {
            None => self.global.is_set(option),
            Some(s) => self.symbols.get(s).map(|o| o.is_set(option)).unwrap_or(false),
        }
    }

    /// Symbols for which the option is set.
    pub fn symbols<O: Into<GrammarOption>>(&self, option: O) -> BTreeSet<String> {
        let option = option.into();
        self.symbols.iter().filter(|(_, o)| o.is_set(option)).map(|(s, _)| s.clone()).collect()
    }

    pub fn params<O: Into<GrammarOption>>(&self, option: O, symbol: Option<&str>) -> &[OptionValue] {
        match symbol {
            None => self.global.params(option),
            Some(s) => self.symbols.get(s).map(|o| o.params(option)).unwrap_or(&[]),
        }
    }

    pub fn symbol_options(&self, symbol: &str) -> Option<&SymbolOptions> {
        self.symbols.get(symbol)
    }

    pub fn global_options(&self) -> &SymbolOptions {
        &self.global
    }

    pub fn all_symbols(&self) -> impl Iterator<Item = &String> {
        self.symbols.keys()
    }

    /// Removes the option from every symbol and from the global options.
    pub fn clear<O: Into<GrammarOption>>(&mut self, option: O) {
        let option = option.into();
        self.global.clear(option);
        for o in self.symbols.values_mut() {
            o.clear(option);
        }
    }

    pub fn is_recovery_enabled(&self) -> bool {
        self.global.is_set(ParsingOption::Recovery)
            || self.symbols.values().any(|o| o.is_set(ParsingOption::Recovery))
    }
}
