// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

//! FIRST and FOLLOW sets.
//!
//! The sets are computed on a [RuleView], a resolved copy of the production rules, so that the
//! validity checks can compute them on a modified copy of the rules.

use std::collections::HashSet;
use iter_index::IndexerIterator;
use land_core::{CollectJoin, TokenId, VarId, ANY, EOF};
use crate::grammar::Symbol;

/// Resolved production rules: `var_alts[v]` are the alternatives of nonterminal `v`, and
/// `alt_symbols[a]` / `alt_var[a]` the symbols and nonterminal of alternative `a`.
#[derive(Clone, Debug)]
pub(crate) struct RuleView {
    pub var_alts: Vec<Vec<usize>>,
    pub alt_var: Vec<VarId>,
    pub alt_symbols: Vec<Vec<Symbol>>,
    pub start: Option<VarId>,
}

/// FIRST of each nonterminal. In modified mode, [ANY] is considered as possibly empty.
pub(crate) fn calc_first(view: &RuleView, modified: bool) -> Vec<HashSet<Symbol>> {
    const VERBOSE: bool = false;
    let mut first = vec![HashSet::<Symbol>::new(); view.var_alts.len()];
    let mut change = true;
    while change {
        change = false;
        for (var, alts) in view.var_alts.iter().index::<VarId>() {
            let num_items = first[var as usize].len();
            for &a in alts {
                let new = seq_first(&first, &view.alt_symbols[a], modified);
                first[var as usize].extend(new);
            }
            change |= first[var as usize].len() > num_items;
        }
        if VERBOSE && change { println!("---------------------------- again"); }
    }
    if VERBOSE {
        for (var, f) in first.iter().index::<VarId>() {
            println!("FIRST({var}) = {}", f.iter().join(", "));
        }
    }
    first
}

/// FIRST of a sequence of symbols, [Symbol::Empty] included if the whole sequence may be empty.
pub(crate) fn seq_first(first: &[HashSet<Symbol>], seq: &[Symbol], modified: bool) -> HashSet<Symbol> {
    let mut result = HashSet::new();
    for s in seq {
        match s {
            Symbol::T(t) => {
                result.insert(*s);
                if !(modified && *t == ANY) {
                    return result;
                }
            }
            Symbol::NT(v) => {
                let f = &first[*v as usize];
                result.extend(f.iter().filter(|s| !s.is_empty()));
                if !f.contains(&Symbol::Empty) {
                    return result;
                }
            }
            Symbol::Empty => {}
        }
    }
    result.insert(Symbol::Empty);
    result
}

/// FOLLOW of each nonterminal, seeded with [EOF] on the start symbol.
pub(crate) fn calc_follow(view: &RuleView, first: &[HashSet<Symbol>]) -> Vec<HashSet<TokenId>> {
    let mut follow = vec![HashSet::<TokenId>::new(); view.var_alts.len()];
    if let Some(start) = view.start {
        follow[start as usize].insert(EOF);
    }
    let mut change = true;
    while change {
        change = false;
        for (a, symbols) in view.alt_symbols.iter().enumerate() {
            let lhs = view.alt_var[a] as usize;
            for (i, s) in symbols.iter().enumerate() {
                if let Symbol::NT(v) = s {
                    let v = *v as usize;
                    let num_items = follow[v].len();
                    let rest = seq_first(first, &symbols[i + 1..], false);
                    follow[v].extend(rest.iter().filter_map(|s| if let Symbol::T(t) = s { Some(*t) } else { None }));
                    if rest.contains(&Symbol::Empty) && lhs != v {
                        let lhs_follow = follow[lhs].iter().cloned().to_vec();
                        follow[v].extend(lhs_follow);
                    }
                    change |= follow[v].len() > num_items;
                }
            }
        }
    }
    follow
}

/// Tokens that can occur anywhere in a derivation of each nonterminal.
pub(crate) fn calc_sentence_tokens(view: &RuleView) -> Vec<HashSet<TokenId>> {
    let mut tokens = vec![HashSet::<TokenId>::new(); view.var_alts.len()];
    let mut change = true;
    while change {
        change = false;
        for (var, alts) in view.var_alts.iter().enumerate() {
            let num_items = tokens[var].len();
            for &a in alts {
                for s in &view.alt_symbols[a] {
                    match s {
                        Symbol::T(t) => { tokens[var].insert(*t); }
                        Symbol::NT(v) if *v as usize != var => {
                            let sub = tokens[*v as usize].iter().cloned().to_vec();
                            tokens[var].extend(sub);
                        }
                        _ => {}
                    }
                }
            }
            change |= tokens[var].len() > num_items;
        }
    }
    tokens
}
