// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

//! Parsers and their tables.
//!
//! Both parsers share a [ParserCore] that holds the grammar, the lexer, the node generator and the
//! optional preprocessor, and which runs the standard post-processing of the trees. The parsing
//! algorithms themselves are in [ll] and [lr].

use std::fmt::{Display, Formatter};
use std::ops::Add;
use std::time::{Duration, Instant};
use land_core::lexer::{Lexer, Token};
use land_core::log::{BufLog, LogReader, Logger};
use crate::grammar::{Grammar, GrammarError, Symbol};
use crate::stream::CustomBlockNode;
use crate::tree::visitors::{GhostListVisitor, InsertCustomBlocksVisitor, LeafVisitor, MarkupOptionsVisitor, MergeAnyVisitor, RemoveAutoVisitor, UserifyVisitor};
use crate::tree::{BaseNodeGenerator, NodeGenerator, NodeId, Tree, TreeVisitor};

pub mod ll;
pub mod lr;
pub(crate) mod tests;

// ---------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ParserError {
    /// The grammar or its table isn't valid; the log contains the messages
    #[error("invalid grammar:\n{0}")]
    InvalidGrammar(BufLog),
    #[error(transparent)]
    Grammar(#[from] GrammarError),
}

/// Figures collected while parsing, which can be added up to get the totals of several files.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Statistics {
    pub chars_count: usize,
    pub tokens_count: usize,
    pub general_time: Duration,
    pub recovery_time: Duration,
    /// number of successful recoveries
    pub recovery_times: usize,
    /// number of recoveries triggered by a failed `Any`
    pub recovery_times_any: usize,
    /// highest number of tokens read again after a rollback
    pub longest_rollback: usize,
}

impl Add for Statistics {
    type Output = Statistics;

    fn add(self, rhs: Self) -> Self::Output {
        Statistics {
            chars_count: self.chars_count + rhs.chars_count,
            tokens_count: self.tokens_count + rhs.tokens_count,
            general_time: self.general_time + rhs.general_time,
            recovery_time: self.recovery_time + rhs.recovery_time,
            recovery_times: self.recovery_times + rhs.recovery_times,
            recovery_times_any: self.recovery_times_any + rhs.recovery_times_any,
            longest_rollback: self.longest_rollback.max(rhs.longest_rollback),
        }
    }
}

impl Display for Statistics {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "characters: {}", self.chars_count)?;
        writeln!(f, "tokens: {}", self.tokens_count)?;
        writeln!(f, "parsing time: {:.3} s", self.general_time.as_secs_f64())?;
        writeln!(f, "recovery time: {:.3} s", self.recovery_time.as_secs_f64())?;
        writeln!(f, "recoveries: {}", self.recovery_times)?;
        writeln!(f, "recoveries after Any: {}", self.recovery_times_any)?;
        write!(f, "longest rollback: {} tokens", self.longest_rollback)
    }
}

/// Result of a parse. `root` is `None` when the parsing was aborted by a fatal error.
#[derive(Clone, Debug)]
pub struct ParseOutput {
    pub root: Option<NodeId>,
    pub tree: Tree,
    pub log: BufLog,
    pub statistics: Statistics,
}

impl LogReader for ParseOutput {
    type Item = BufLog;

    fn get_log(&self) -> &Self::Item {
        &self.log
    }

    fn give_log(self) -> Self::Item {
        self.log
    }
}

// ---------------------------------------------------------------------------------------------

/// Transforms the text before parsing, and the tree after parsing.
pub trait Preprocessor {
    /// Returns the text to parse, or the log of the errors if the text can't be parsed.
    fn preprocess(&mut self, text: &str) -> Result<String, BufLog>;

    /// Adjusts the tree, typically the locations of the nodes, and returns the root.
    fn postprocess(&mut self, _tree: &mut Tree, root: Option<NodeId>, _generator: &dyn NodeGenerator, _log: &mut BufLog) -> Option<NodeId> {
        root
    }
}

/// Runs several preprocessors in sequence; the trees are post-processed in reverse order.
#[derive(Default)]
pub struct PipelinePreprocessor {
    stages: Vec<Box<dyn Preprocessor>>,
}

impl PipelinePreprocessor {
    pub fn new() -> Self {
        PipelinePreprocessor { stages: Vec::new() }
    }

    pub fn add(mut self, stage: Box<dyn Preprocessor>) -> Self {
        self.stages.push(stage);
        self
    }
}

impl Preprocessor for PipelinePreprocessor {
    fn preprocess(&mut self, text: &str) -> Result<String, BufLog> {
        let mut text = text.to_string();
        for stage in &mut self.stages {
            text = stage.preprocess(&text)?;
        }
        Ok(text)
    }

    fn postprocess(&mut self, tree: &mut Tree, root: Option<NodeId>, generator: &dyn NodeGenerator, log: &mut BufLog) -> Option<NodeId> {
        self.stages.iter_mut().rev().fold(root, |root, stage| stage.postprocess(tree, root, generator, log))
    }
}

/// Creates a visitor run on every tree after the standard post-processing.
pub type VisitorFactory = Box<dyn for<'g> Fn(&'g Grammar) -> Box<dyn TreeVisitor + 'g>>;

/// Raw result of a parsing algorithm, before the post-processing.
pub(crate) struct ParseRun {
    pub tree: Tree,
    pub root: Option<NodeId>,
    pub log: BufLog,
    pub statistics: Statistics,
    pub custom_blocks: Vec<CustomBlockNode>,
    pub top_blocks: Vec<usize>,
}

/// Part common to both parsers.
pub struct ParserCore {
    grammar: Grammar,
    lexer: Box<dyn Lexer>,
    generator: Box<dyn NodeGenerator>,
    preprocessor: Option<Box<dyn Preprocessor>>,
    visitors: Vec<VisitorFactory>,
    tracing: bool,
}

impl ParserCore {
    pub(crate) fn new(grammar: Grammar, lexer: Box<dyn Lexer>) -> Self {
        ParserCore {
            grammar,
            lexer,
            generator: Box::new(BaseNodeGenerator),
            preprocessor: None,
            visitors: Vec::new(),
            tracing: false,
        }
    }

    /// Checks the grammar; on failure, returns its log in the error.
    pub(crate) fn check_grammar(grammar: &mut Grammar) -> Result<(), ParserError> {
        if grammar.check_validity() {
            Ok(())
        } else {
            Err(ParserError::InvalidGrammar(grammar.get_log().clone()))
        }
    }

    /// Runs a parsing algorithm on `text`, with the preprocessing and the post-processing.
    pub(crate) fn run<F>(&mut self, text: &str, algorithm: F) -> ParseOutput
        where F: FnOnce(&Grammar, &mut dyn Lexer, &dyn NodeGenerator, &str, bool) -> ParseRun
    {
        let started = Instant::now();
        let text = match &mut self.preprocessor {
            Some(preprocessor) => match preprocessor.preprocess(text) {
                Ok(text) => text,
                Err(log) => {
                    let statistics = Statistics { chars_count: text.chars().count(), general_time: started.elapsed(), ..Statistics::default() };
                    return ParseOutput { root: None, tree: Tree::new(), log, statistics };
                }
            }
            None => text.to_string(),
        };
        let mut run = algorithm(&self.grammar, self.lexer.as_mut(), self.generator.as_ref(), &text, self.tracing);
        let mut root = run.root.map(|root| self.post_process(&mut run, root));
        run.tree.set_root(root);
        if let Some(preprocessor) = &mut self.preprocessor {
            root = preprocessor.postprocess(&mut run.tree, root, self.generator.as_ref(), &mut run.log);
            run.tree.set_root(root);
        }
        run.statistics.chars_count = text.chars().count();
        run.statistics.general_time = started.elapsed();
        ParseOutput { root, tree: run.tree, log: run.log, statistics: run.statistics }
    }

    /// Standard transformations of the tree, followed by the user visitors.
    fn post_process(&self, run: &mut ParseRun, root: NodeId) -> NodeId {
        let tree = &mut run.tree;
        tree.set_root(Some(root));
        tree.accept(&mut RemoveAutoVisitor);
        tree.accept(&mut GhostListVisitor::new(&self.grammar));
        tree.accept(&mut LeafVisitor::new(&self.grammar));
        tree.accept(&mut MergeAnyVisitor);
        tree.accept(&mut UserifyVisitor::new(&self.grammar));
        let mut root = root;
        if !run.top_blocks.is_empty() {
            let top_blocks = std::mem::take(&mut run.top_blocks);
            let mut visitor = InsertCustomBlocksVisitor::new(self.generator.as_ref(), &run.custom_blocks, top_blocks);
            tree.accept(&mut visitor);
            if let Some(new_root) = visitor.root() {
                root = new_root;
            }
            for block in visitor.bad_blocks() {
                run.log.add_error(
                    format!("block '{}' cuts through several entities or lies in an area not covered by the parsing", block.name),
                    Some(block.start.start));
            }
            tree.set_root(Some(root));
        }
        tree.accept(&mut MarkupOptionsVisitor::new(&self.grammar));
        for factory in &self.visitors {
            let mut visitor = factory(&self.grammar);
            tree.accept(visitor.as_mut());
        }
        root
    }
}

/// Operations common to the LL(1) and LR(1) parsers.
pub trait Parser {
    fn core(&self) -> &ParserCore;

    fn core_mut(&mut self) -> &mut ParserCore;

    /// Parses `text` and returns the tree, the log and the statistics.
    fn parse(&mut self, text: &str) -> ParseOutput;

    fn grammar(&self) -> &Grammar {
        &self.core().grammar
    }

    /// Records the configuration of the parser at each step as trace messages.
    fn set_tracing(&mut self, tracing: bool) {
        self.core_mut().tracing = tracing;
    }

    fn set_node_generator(&mut self, generator: Box<dyn NodeGenerator>) {
        self.core_mut().generator = generator;
    }

    fn set_preprocessor(&mut self, preprocessor: Box<dyn Preprocessor>) {
        self.core_mut().preprocessor = Some(preprocessor);
    }

    fn add_visitor(&mut self, factory: VisitorFactory) {
        self.core_mut().visitors.push(factory);
    }
}

// ---------------------------------------------------------------------------------------------

/// Description of a token for the messages.
pub(crate) fn token_info(grammar: &Grammar, token: &Token) -> String {
    let name = grammar.userify(grammar.symbol_name(Symbol::T(token.name)));
    if token.text.is_empty() {
        name
    } else {
        format!("'{}' ({name})", token.text)
    }
}

/// Names of a list of tokens for the messages, sorted.
pub(crate) fn tokens_to_string<I: IntoIterator<Item = land_core::TokenId>>(grammar: &Grammar, tokens: I) -> String {
    let mut names = tokens.into_iter().map(|t| grammar.userify(grammar.symbol_name(Symbol::T(t)))).collect::<Vec<_>>();
    names.sort();
    names.join(", ")
}
