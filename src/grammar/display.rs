// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

//! Human-readable names of the grammar symbols. Generated rules and tokens are shown as the
//! expression they were generated from (`X+`, `(a | b)`, the token pattern).

use land_core::{AltId, CollectJoin, VarId};
use crate::grammar::options::ParsingOption;
use crate::grammar::{Entry, Grammar, AUTO_RULE_PREFIX, AUTO_TOKEN_PREFIX};

impl Grammar {
    /// Name of a symbol as the grammar developer wrote it.
    pub fn developerify(&self, name: &str) -> String {
        if name.starts_with(AUTO_RULE_PREFIX) {
            if let Some(var) = self.rule_id(name) {
                return self.developerify_rule(var);
            }
        } else if name.starts_with(AUTO_TOKEN_PREFIX) {
            if let Some(pattern) = self.token_id(name).and_then(|t| self.tokens[t as usize].pattern.as_ref()) {
                return format!("'{pattern}'");
            }
        }
        name.to_string()
    }

    fn developerify_rule(&self, var: VarId) -> String {
        match self.auto_rule_quantifier.get(&var) {
            Some(q) => format!("{}{}", self.developerify(&q.element), q.quantifier),
            None => {
                let alts = self.rules[var as usize].alts.iter().map(|a| self.alt_to_string(*a)).join(" | ");
                format!("({alts})")
            }
        }
    }

    /// Name of a symbol for the end user: the `userify` parameter if one is given, otherwise the
    /// developer name.
    pub fn userify(&self, name: &str) -> String {
        self.options.params(ParsingOption::Userify, Some(name)).iter()
            .find_map(|p| p.as_str().map(|s| s.to_string()))
            .unwrap_or_else(|| self.developerify(name))
    }

    pub fn entry_to_string(&self, entry: &Entry) -> String {
        let name = self.developerify(&entry.symbol);
        if entry.is_any() && !entry.arguments.is_empty() {
            format!("{name}({})", entry.arguments)
        } else {
            name
        }
    }

    pub fn alt_to_string(&self, alt: AltId) -> String {
        let alt = &self.alts[alt as usize];
        if alt.elements.is_empty() {
            "ε".to_string()
        } else {
            alt.elements.iter().map(|e| self.entry_to_string(e)).join(" ")
        }
    }

    /// Rule in the form `name -> alt1 | alt2`.
    pub fn rule_to_string(&self, var: VarId) -> String {
        let rule = &self.rules[var as usize];
        format!("{} -> {}", self.developerify(&rule.name), rule.alts.iter().map(|a| self.alt_to_string(*a)).join(" | "))
    }
}
