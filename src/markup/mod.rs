// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

//! Concern points and their remapping.
//!
//! A point marks a node of a parsed file. Its [PointContext](context::PointContext) records the
//! header, the land ancestors, the inner text and the siblings of the node, so that the
//! [ContextFinder](finder::ContextFinder) can find the corresponding node after the file has been
//! modified, even when the file has been renamed or the node moved.

pub mod words;
pub mod levenshtein;
pub mod fuzzy;
pub mod context;
pub mod heuristics;
pub mod finder;
