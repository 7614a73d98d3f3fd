// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

#![cfg(test)]

use super::*;

#[derive(Debug)]
struct Owner {
    log: BufLog,
}

impl LogReader for Owner {
    type Item = BufLog;

    fn get_log(&self) -> &Self::Item {
        &self.log
    }

    fn give_log(self) -> Self::Item {
        self.log
    }
}

impl LogWriter for Owner {
    fn get_mut_log(&mut self) -> &mut impl Logger {
        &mut self.log
    }
}

#[test]
fn buf_log_counts() {
    let mut log = BufLog::new();
    assert!(log.is_empty());
    log.add_trace("stack: a b", None);
    log.add_warning("unexpected token", Some(PointLocation::new(2, 5, 14)));
    log.add_error("recovery failed", None);
    log.add_error("another", None);
    assert_eq!((log.num_traces(), log.num_warnings(), log.num_errors()), (1, 1, 2));
    assert!(!log.has_no_errors());
    assert_eq!(log.get_errors().map(|m| m.text.as_str()).collect::<Vec<_>>(), vec!["recovery failed", "another"]);
    assert_eq!(log.get_warnings().next().and_then(|m| m.location), Some(PointLocation::new(2, 5, 14)));
    log.clear();
    assert!(log.has_no_errors() && log.is_empty());
}

#[test]
fn buf_log_extend() {
    let mut a = BufLog::new();
    a.add_warning("w", None);
    let mut b = BufLog::new();
    b.add_error("e", None);
    b.set_source("table");
    a.extend(b);
    assert_eq!(a.len(), 2);
    assert_eq!(a.num_errors(), 1);
    assert_eq!(a.get_errors().next().and_then(|m| m.source.clone()), Some("table".to_string()));
    a.extend_messages([Message::trace("t", None)]);
    assert_eq!(a.num_traces(), 1);
}

#[test]
fn blanket_impls() {
    let mut owner = Owner { log: BufLog::new() };
    owner.add_error("bad", Some(PointLocation::new(1, 1, 0)));
    assert_eq!(owner.num_errors(), 1);
    assert_eq!(owner.get_messages_str(), "- ERROR  : (1:1) bad");
    let log = owner.give_log();
    assert_eq!(log.num_errors(), 1);
}
