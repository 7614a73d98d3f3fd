// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use land_core::CollectJoin;

/// Arguments of an `Any` occurrence, like `Any(Except(SEMI), IgnorePairs)`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub enum AnyArgument {
    /// tokens that never stop the wildcard
    Include,
    /// the only tokens that stop the wildcard
    Except,
    /// tokens that make the wildcard fail
    Avoid,
    /// the wildcard doesn't stop at the closing token of the pair it started in
    IgnorePairs,
    /// marks the occurrence as an error placeholder
    Error,
}

impl Display for AnyArgument {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct SymbolArguments {
    any: BTreeMap<AnyArgument, BTreeSet<String>>,
}

impl SymbolArguments {
    pub fn new() -> Self {
        SymbolArguments { any: BTreeMap::new() }
    }

    pub fn set<I: IntoIterator<Item = T>, T: Into<String>>(&mut self, arg: AnyArgument, symbols: I) {
        self.any.entry(arg).or_default().extend(symbols.into_iter().map(|s| s.into()));
    }

    pub fn with<I: IntoIterator<Item = T>, T: Into<String>>(mut self, arg: AnyArgument, symbols: I) -> Self {
        self.set(arg, symbols);
        self
    }

    pub fn contains(&self, arg: AnyArgument) -> bool {
        self.any.contains_key(&arg)
    }

    pub fn contains_symbol(&self, arg: AnyArgument, symbol: &str) -> bool {
        self.any.get(&arg).map(|s| s.contains(symbol)).unwrap_or(false)
    }

    pub fn get(&self, arg: AnyArgument) -> Option<&BTreeSet<String>> {
        self.any.get(&arg)
    }

    pub fn is_empty(&self) -> bool {
        self.any.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AnyArgument, &BTreeSet<String>)> {
        self.any.iter()
    }
}

impl Display for SymbolArguments {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.any.iter()
            .map(|(arg, set)| if set.is_empty() { arg.to_string() } else { format!("{arg}({})", set.iter().join(", ")) })
            .join(", "))
    }
}
