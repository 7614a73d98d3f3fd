// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

//! LR(1) items with the markers provoked by `Any`.
//!
//! Since `Any` may match an empty sequence of tokens, an item also holds the "any markers": the
//! markers that are only reachable when `Any` stops on a token before them. They don't produce
//! regular actions but extend the set of tokens on which `Any` stops.

use std::collections::{BTreeSet, HashSet};
use std::fmt::{Display, Formatter};
use land_core::{AltId, CollectJoin, TokenId};
use crate::grammar::{Grammar, Symbol};

/// LR(1) marker: `alt` with the dot before position `pos`, and its lookahead.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub struct Marker {
    pub alt: AltId,
    pub pos: usize,
    pub lookahead: TokenId,
}

impl Marker {
    pub fn new(alt: AltId, pos: usize, lookahead: TokenId) -> Self {
        Marker { alt, pos, lookahead }
    }

    pub fn shifted(&self) -> Self {
        Marker { alt: self.alt, pos: self.pos + 1, lookahead: self.lookahead }
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Default, Hash)]
pub struct Item {
    pub markers: BTreeSet<Marker>,
    pub any_markers: BTreeSet<Marker>,
}

impl Item {
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

impl Grammar {
    /// Symbol after the dot, or `None` if the marker is complete.
    pub fn marker_next(&self, marker: &Marker) -> Option<Symbol> {
        self.alt_symbols(marker.alt).get(marker.pos).copied()
    }

    /// Symbols after the marker's next symbol, followed by the lookahead.
    fn marker_rest(&self, marker: &Marker) -> Vec<Symbol> {
        let symbols = self.alt_symbols(marker.alt);
        let mut rest = symbols.get(marker.pos + 1..).unwrap_or(&[]).to_vec();
        rest.push(Symbol::T(marker.lookahead));
        rest
    }

    /// FIRST of the sequence starting at the dot, followed by the lookahead. The second set holds
    /// the tokens only reachable after an empty `Any`.
    pub fn marker_first(&self, marker: &Marker) -> (HashSet<TokenId>, HashSet<TokenId>) {
        let symbols = self.alt_symbols(marker.alt);
        let mut seq = symbols.get(marker.pos..).unwrap_or(&[]).to_vec();
        seq.push(Symbol::T(marker.lookahead));
        let first = self.first(&seq).into_iter().filter_map(|s| s.as_t()).collect::<HashSet<_>>();
        let any_first = self.first_modified(&seq).into_iter()
            .filter_map(|s| s.as_t())
            .filter(|t| !first.contains(t))
            .collect();
        (first, any_first)
    }

    /// Closure of a set of markers.
    pub fn closure(&self, markers: BTreeSet<Marker>, any_markers: BTreeSet<Marker>) -> Item {
        let mut markers = markers;
        let mut any_markers = any_markers;
        loop {
            let mut new_markers = Vec::new();
            let mut new_any = Vec::new();
            for m in &any_markers {
                if let Some(Symbol::NT(v)) = self.marker_next(m) {
                    let rest = self.first_modified(&self.marker_rest(m));
                    for t in rest.iter().filter_map(|s| s.as_t()) {
                        new_any.extend(self.rule(v).alts.iter().map(|a| Marker::new(*a, 0, t)));
                    }
                }
            }
            for m in &markers {
                if let Some(Symbol::NT(v)) = self.marker_next(m) {
                    let rest = self.marker_rest(m);
                    let first = self.first(&rest);
                    let modified = self.first_modified(&rest);
                    for t in first.iter().filter_map(|s| s.as_t()) {
                        new_markers.extend(self.rule(v).alts.iter().map(|a| Marker::new(*a, 0, t)));
                    }
                    for t in modified.iter().filter(|s| !first.contains(s)).filter_map(|s| s.as_t()) {
                        new_any.extend(self.rule(v).alts.iter().map(|a| Marker::new(*a, 0, t)));
                    }
                }
            }
            let (num_markers, num_any) = (markers.len(), any_markers.len());
            markers.extend(new_markers);
            any_markers.extend(new_any);
            if markers.len() == num_markers && any_markers.len() == num_any {
                break;
            }
        }
        let any_markers = any_markers.difference(&markers).copied().collect();
        Item { markers, any_markers }
    }

    /// Item reached by shifting `symbol`.
    pub fn goto(&self, item: &Item, symbol: Symbol) -> Item {
        let shift = |set: &BTreeSet<Marker>| set.iter()
            .filter(|m| self.marker_next(m) == Some(symbol))
            .map(|m| m.shifted())
            .collect::<BTreeSet<_>>();
        let markers = shift(&item.markers);
        if markers.is_empty() {
            return Item::default();
        }
        self.closure(markers, shift(&item.any_markers))
    }

    pub fn marker_to_string(&self, marker: &Marker) -> String {
        let alt = &self.alts[marker.alt as usize];
        let mut elements = alt.elements.iter().map(|e| self.entry_to_string(e)).to_vec();
        elements.insert(marker.pos.min(elements.len()), "•".to_string());
        format!("{} -> {}, {}", self.developerify(&self.rules[alt.var as usize].name), elements.join(" "),
                self.symbol_name(Symbol::T(marker.lookahead)))
    }
}

impl Display for Marker {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}:{}, :{}]", self.alt, self.pos, self.lookahead)
    }
}
