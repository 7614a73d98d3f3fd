// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

//! Validity checks of a grammar.

use std::collections::{BTreeSet, HashSet};
use iter_index::IndexerIterator;
use land_core::log::{LogStatus, Logger};
use land_core::{AltId, CollectJoin, TokenId, VarId, ANY};
use crate::grammar::args::AnyArgument;
use crate::grammar::options::OptionGroup;
use crate::grammar::sets::{calc_first, calc_follow, seq_first, RuleView};
use crate::grammar::{Grammar, GrammarKind, GrammarState, Quantifier, Symbol};

/// Option groups allowed on an occurrence of a symbol in an alternative.
const LOCAL_OPTION_GROUPS: [OptionGroup; 2] = [OptionGroup::Parsing, OptionGroup::Nodes];

/// Arguments whose token sets must not overlap.
const EXCLUSIVE_ARGUMENTS: [AnyArgument; 3] = [AnyArgument::Include, AnyArgument::Except, AnyArgument::Avoid];

impl Grammar {
    /// Checks the grammar, logs the problems, and sets the state to [GrammarState::Valid] or
    /// [GrammarState::Invalid]. Returns `true` if the grammar is valid.
    pub fn check_validity(&mut self) -> bool {
        const VERBOSE: bool = false;
        let num_errors = self.log.num_errors();
        if self.start().is_none() {
            self.log.add_error("start symbol is not set or is not a nonterminal", None);
        } else {
            for var in 0..self.rules.len() as VarId {
                let trace = self.rule_to_string(var);
                if VERBOSE { println!("{trace}"); }
                self.log.add_trace(trace, None);
                self.check_symbols(var);
            }
            if self.log.num_errors() == num_errors {
                if self.kind == GrammarKind::LL {
                    let empty_repetitions = self.check_empty_repetitions();
                    self.check_left_recursion(&empty_repetitions);
                }
                self.check_consecutive_any();
            }
            self.check_local_options();
        }
        self.state = if self.log.num_errors() == num_errors { GrammarState::Valid } else { GrammarState::Invalid };
        self.state == GrammarState::Valid
    }

    fn check_symbols(&mut self, var: VarId) {
        let mut errors = Vec::new();
        let rule_name = &self.rules[var as usize].name;
        for &a in &self.rules[var as usize].alts {
            for entry in &self.alts[a as usize].elements {
                if self.symbol(&entry.symbol).is_none() {
                    errors.push(format!("rule '{rule_name}': undefined symbol '{}'", entry.symbol));
                }
                for (arg, names) in entry.arguments.iter() {
                    for name in names.iter().filter(|n| self.symbol(n).is_none()) {
                        errors.push(format!("rule '{rule_name}': undefined symbol '{name}' in argument {arg} of {}", entry.symbol));
                    }
                }
                for (i, a1) in EXCLUSIVE_ARGUMENTS.iter().enumerate() {
                    for a2 in &EXCLUSIVE_ARGUMENTS[i + 1..] {
                        if let (Some(s1), Some(s2)) = (entry.arguments.get(*a1), entry.arguments.get(*a2)) {
                            let common = s1.intersection(s2).to_vec();
                            if !common.is_empty() {
                                errors.push(format!("rule '{rule_name}': arguments {a1} and {a2} of {} share {}",
                                                    entry.symbol, common.into_iter().join(", ")));
                            }
                        }
                    }
                }
            }
        }
        for e in errors {
            self.log.add_error(e, None);
        }
    }

    /// Repetition rules `X*` and `X+` whose element can be empty would loop forever.
    fn check_empty_repetitions(&mut self) -> HashSet<VarId> {
        let mut found = HashSet::new();
        let mut errors = BTreeSet::new();
        for (&var, q) in &self.auto_rule_quantifier {
            if matches!(q.quantifier, Quantifier::ZeroOrMore | Quantifier::OneOrMore) {
                if let Some(elem) = self.symbol(&q.element) {
                    if self.first(&[elem]).contains(&Symbol::Empty) {
                        found.insert(var);
                        errors.insert(format!("repetition of empty elements in '{}'", self.developerify(&self.rules[var as usize].name)));
                    }
                }
            }
        }
        for e in errors {
            self.log.add_error(e, None);
        }
        found
    }

    /// Left recursion is detected in the strongly connected components of the graph whose
    /// edges go from a nonterminal to the nonterminals that may start its alternatives.
    fn check_left_recursion(&mut self, ignored: &HashSet<VarId>) {
        let num_nt = self.rules.len();
        let mut edges = vec![BTreeSet::<VarId>::new(); num_nt];
        for (var, rule) in self.rules.iter().index::<VarId>() {
            if ignored.contains(&var) {
                continue;
            }
            for &a in &rule.alts {
                for s in self.alt_symbols(a) {
                    match s {
                        Symbol::NT(v) => {
                            edges[var as usize].insert(*v);
                            if !self.first_var(*v).contains(&Symbol::Empty) {
                                break;
                            }
                        }
                        _ => break,
                    }
                }
            }
        }
        let components = strong_components(&edges);
        let mut errors = Vec::new();
        for comp in components {
            let recursive = comp.len() > 1 || comp.first().map(|v| edges[*v as usize].contains(v)).unwrap_or(false);
            if recursive {
                errors.push(format!("left recursion in {}", comp.iter().map(|v| format!("'{}'", self.rules[*v as usize].name)).join(", ")));
            }
        }
        for e in errors {
            self.log.add_error(e, None);
        }
    }

    /// Warns when an `Any` may be directly followed by another `Any`: the first one would never
    /// let the second one match anything. Each occurrence is replaced by its own virtual token
    /// to know which occurrences can follow it.
    fn check_consecutive_any(&mut self) {
        let mut view: RuleView = self.rule_view();
        let mut next_virtual = self.tokens.len();
        let mut sources = Vec::<(AltId, usize, TokenId)>::new();
        let mut virtuals = HashSet::<TokenId>::new();
        for (a, alt) in self.alts.iter().index::<AltId>() {
            let mut pos = 0;
            for entry in &alt.elements {
                if self.symbol(&entry.symbol).is_none() {
                    continue;
                }
                if entry.is_any() {
                    let Ok(id) = TokenId::try_from(next_virtual) else { return };
                    next_virtual += 1;
                    view.alt_symbols[a as usize][pos] = Symbol::T(id);
                    virtuals.insert(id);
                    if !entry.arguments.contains(AnyArgument::Except) {
                        sources.push((a, pos, id));
                    }
                }
                pos += 1;
            }
        }
        if sources.is_empty() {
            return;
        }
        let first = calc_first(&view, false);
        let follow = calc_follow(&view, &first);
        let mut warnings = Vec::new();
        for (a, pos, id) in sources {
            let symbols = &view.alt_symbols[a as usize];
            let mut next = seq_first(&first, &symbols[pos + 1..], false)
                .into_iter()
                .filter_map(|s| s.as_t())
                .collect::<HashSet<_>>();
            let var = view.alt_var[a as usize];
            if seq_first(&first, &symbols[pos + 1..], false).contains(&Symbol::Empty) {
                next.extend(follow[var as usize].iter().copied());
            }
            next.remove(&id);
            if next.contains(&ANY) || next.iter().any(|t| virtuals.contains(t)) {
                warnings.push(format!("rule '{}', alternative {}: {} at position {} may be followed by another {}",
                                      self.rules[var as usize].name, self.alt_to_string(a), self.symbol_name(Symbol::T(ANY)),
                                      pos + 1, self.symbol_name(Symbol::T(ANY))));
            }
        }
        for w in warnings {
            self.log.add_warning(w, None);
        }
    }

    fn check_local_options(&mut self) {
        let mut errors = Vec::new();
        for alt in &self.alts {
            for entry in &alt.elements {
                for group in entry.options.groups() {
                    if !LOCAL_OPTION_GROUPS.contains(&group) {
                        errors.push(format!("rule '{}': option group '{group}' can't be used locally on '{}'",
                                            self.rules[alt.var as usize].name, entry.symbol));
                    }
                }
            }
        }
        for e in errors {
            self.log.add_error(e, None);
        }
    }
}

/// Kosaraju's algorithm. Returns the strongly connected components of the graph.
pub(crate) fn strong_components(edges: &[BTreeSet<VarId>]) -> Vec<Vec<VarId>> {
    let n = edges.len();
    let mut visited = vec![false; n];
    let mut order = Vec::with_capacity(n);
    for root in 0..n {
        if visited[root] {
            continue;
        }
        // iterative post-order DFS
        let mut stack = vec![(root, edges[root].iter().copied().to_vec(), 0)];
        visited[root] = true;
        while let Some((node, succ, idx)) = stack.last_mut() {
            if *idx < succ.len() {
                let next = succ[*idx] as usize;
                *idx += 1;
                if !visited[next] {
                    visited[next] = true;
                    stack.push((next, edges[next].iter().copied().to_vec(), 0));
                }
            } else {
                order.push(*node);
                stack.pop();
            }
        }
    }
    let mut reverse = vec![Vec::<usize>::new(); n];
    for (v, succ) in edges.iter().enumerate() {
        for &w in succ {
            reverse[w as usize].push(v);
        }
    }
    let mut assigned = vec![false; n];
    let mut components = Vec::new();
    for &root in order.iter().rev() {
        if assigned[root] {
            continue;
        }
        let mut comp = Vec::new();
        let mut stack = vec![root];
        assigned[root] = true;
        while let Some(v) = stack.pop() {
            comp.push(v as VarId);
            for &w in &reverse[v] {
                if !assigned[w] {
                    assigned[w] = true;
                    stack.push(w);
                }
            }
        }
        comp.sort();
        components.push(comp);
    }
    components
}
