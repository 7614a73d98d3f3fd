// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

//! Parsers with a wildcard token, and markup of concern points that survive the edition of the
//! parsed files.
//!
//! - [grammar]: grammar model, options, FIRST/FOLLOW sets and LR items
//! - [stream]: token stream with pair tracking and custom blocks
//! - [parser]: LL(1) and LR(1) parsers, with error recovery
//! - [tree]: parse trees and the visitors that clean them up
//! - [markup]: point contexts and the context finder that remaps the points
//! - [plugin]: parsers registered by file extension

mod macros;
pub mod grammar;
pub mod stream;
pub mod tree;
pub mod parser;
pub mod markup;
pub mod plugin;

pub use land_core;

// Parsing tables, See:
// - https://en.wikipedia.org/wiki/LL_parser
// - https://en.wikipedia.org/wiki/Canonical_LR_parser
//
// Remapping:
// - https://en.wikipedia.org/wiki/Levenshtein_distance
// - https://en.wikipedia.org/wiki/Hungarian_algorithm
// - https://www.dfrws.org/sites/default/files/session-files/paper-identifying_almost_identical_files_using_context_triggered_piecewise_hashing.pdf

// package name & version
pub const LAND_PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const LAND_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");
