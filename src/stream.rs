// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

//! Token streams consumed by the parsers.
//!
//! [TokenStream] keeps the history of the tokens read from the lexer, so that a parser can go
//! back to an earlier position. [ComplexTokenStream] adds the tracking of the declared pairs and
//! the detection of the custom blocks.

use std::collections::HashSet;
use land_core::lexer::{Lexer, Token};
use land_core::location::SegmentLocation;
use land_core::log::{BufLog, Logger};
use land_core::{CollectJoin, TokenId, EOF, ERROR};
use crate::grammar::options::CustomBlockOption;
use crate::grammar::Grammar;

pub(crate) mod tests;

/// Token stream with the history of the read tokens.
pub struct TokenStream<'a> {
    lexer: &'a mut dyn Lexer,
    tokens: Vec<Token>,
    current: Option<usize>,
}

impl<'a> TokenStream<'a> {
    pub fn new(lexer: &'a mut dyn Lexer, text: &str) -> Self {
        lexer.set_source_text(text);
        TokenStream { lexer, tokens: Vec::new(), current: None }
    }

    /// Moves to the next token. The second value is `true` if the token was read from the lexer,
    /// `false` if it comes from the history. The stream stays on [EOF] once it's reached.
    pub fn next_token(&mut self) -> (Token, bool) {
        let next = self.current.map(|i| i + 1).unwrap_or(0);
        if next < self.tokens.len() {
            self.current = Some(next);
            (self.tokens[next].clone(), false)
        } else if self.tokens.last().map(|t| t.name == EOF).unwrap_or(false) {
            (self.tokens[self.tokens.len() - 1].clone(), false)
        } else {
            let token = self.lexer.next_token();
            self.tokens.push(token.clone());
            self.current = Some(next);
            (token, true)
        }
    }

    pub fn current_token(&self) -> Option<&Token> {
        self.current.map(|i| &self.tokens[i])
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    /// Number of tokens read so far.
    pub fn count(&self) -> usize {
        self.tokens.len()
    }

    pub fn token(&self, index: usize) -> Option<&Token> {
        self.tokens.get(index)
    }

    /// Goes back (or forth) to a token that was already read.
    pub fn move_to(&mut self, index: usize) -> Option<Token> {
        let token = self.tokens.get(index)?.clone();
        self.current = Some(index);
        Some(token)
    }

    /// Creates a token that isn't in the text, at the current position of the lexer.
    pub fn create_token(&self, name: TokenId) -> Token {
        self.lexer.create_token(name)
    }
}

// ---------------------------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Direction {
    /// the token doesn't change the nesting
    #[default] Forward,
    /// the token closes a pair
    Up,
    /// the token opens a pair
    Down,
}

/// Snapshot of the pair tracking, used to go back to an earlier token.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct PairAwareState {
    pub pair_stack: Vec<usize>,
    pub direction: Direction,
    pub opened_pair: Option<usize>,
}

#[derive(Clone, Debug)]
struct PairTokens {
    left: HashSet<TokenId>,
    right: HashSet<TokenId>,
}

/// Custom block found in the text, delimited by special lexemes of a base token (typically a
/// comment). Blocks are nested in their enclosing block.
#[derive(Clone, PartialEq, Debug)]
pub struct CustomBlockNode {
    pub name: String,
    /// location of the start lexeme
    pub start: SegmentLocation,
    /// location of the end lexeme
    pub end: Option<SegmentLocation>,
    /// location of the whole block, delimiters included
    pub location: SegmentLocation,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

impl CustomBlockNode {
    pub fn start_offset(&self) -> usize {
        self.location.start.offset
    }

    pub fn end_offset(&self) -> usize {
        self.location.end.offset
    }
}

#[derive(Clone, PartialEq, Debug, Default)]
pub struct CustomBlockDefinition {
    pub base_token: TokenId,
    pub start_prefix: String,
    pub start_suffix: String,
    pub end_prefix: String,
    pub end_suffix: String,
}

impl CustomBlockDefinition {
    /// Builds the definition from the grammar options, if a base token is declared.
    pub fn from_grammar(grammar: &Grammar) -> Option<Self> {
        let options = grammar.options();
        let base_token = options.symbols(CustomBlockOption::BaseToken).iter().find_map(|s| grammar.token_id(s))?;
        let strings = |option: CustomBlockOption| options.params(option, None).iter()
            .filter_map(|p| p.as_str().map(|s| s.to_string()))
            .to_vec();
        let start = strings(CustomBlockOption::Start);
        let end = strings(CustomBlockOption::End);
        Some(CustomBlockDefinition {
            base_token,
            start_prefix: start.first().cloned().unwrap_or_default(),
            start_suffix: start.get(1).cloned().unwrap_or_default(),
            end_prefix: end.first().cloned().unwrap_or_default(),
            end_suffix: end.get(1).cloned().unwrap_or_default(),
        })
    }

    pub fn is_start_lexeme(&self, lexeme: &str) -> bool {
        lexeme.len() >= self.start_prefix.len() + self.start_suffix.len()
            && lexeme.starts_with(&self.start_prefix) && lexeme.ends_with(&self.start_suffix)
    }

    pub fn is_end_lexeme(&self, lexeme: &str) -> bool {
        lexeme.len() >= self.end_prefix.len() + self.end_suffix.len()
            && lexeme.starts_with(&self.end_prefix) && lexeme.ends_with(&self.end_suffix)
    }

    /// Name of the block: the start lexeme without its delimiters.
    pub fn block_name(&self, lexeme: &str) -> String {
        lexeme.get(self.start_prefix.len()..lexeme.len() - self.start_suffix.len())
            .unwrap_or("")
            .trim()
            .to_string()
    }
}

/// Token stream that tracks the nesting of the pairs declared in the grammar and the custom
/// blocks.
///
/// A token that closes a pair with no opened pair, or which isn't the closing token of the last
/// opened pair, is replaced by an [ERROR] token.
pub struct ComplexTokenStream<'a> {
    stream: TokenStream<'a>,
    pairs: Vec<PairTokens>,
    token_names: Vec<String>,
    state: PairAwareState,
    custom_definition: Option<CustomBlockDefinition>,
    custom_blocks: Vec<CustomBlockNode>,
    completed_blocks: Vec<usize>,
    block_stack: Vec<usize>,
    log: BufLog,
}

impl<'a> ComplexTokenStream<'a> {
    pub fn new(grammar: &Grammar, lexer: &'a mut dyn Lexer, text: &str) -> Self {
        let pairs = grammar.pairs().iter()
            .map(|p| PairTokens { left: grammar.resolve_tokens(&p.left), right: grammar.resolve_tokens(&p.right) })
            .to_vec();
        let token_names = grammar.tokens().iter().map(|t| grammar.userify(&t.name)).to_vec();
        ComplexTokenStream {
            stream: TokenStream::new(lexer, text),
            pairs,
            token_names,
            state: PairAwareState::default(),
            custom_definition: CustomBlockDefinition::from_grammar(grammar),
            custom_blocks: Vec::new(),
            completed_blocks: Vec::new(),
            block_stack: Vec::new(),
            log: BufLog::new(),
        }
    }

    fn token_to_string(&self, token: &Token) -> String {
        let name = self.token_names.get(token.name as usize).map(|s| s.as_str()).unwrap_or("?");
        if token.text.is_empty() { name.to_string() } else { format!("'{}' ({name})", token.text) }
    }

    fn names_to_string(&self, tokens: &HashSet<TokenId>) -> String {
        let mut names = tokens.iter().filter_map(|t| self.token_names.get(*t as usize)).to_vec();
        names.sort();
        names.into_iter().join(" or ")
    }

    /// Reads the next token and updates the nesting of the pairs.
    pub fn next_token(&mut self) -> Token {
        match self.state.direction {
            Direction::Down => {
                if let Some(pair) = self.state.opened_pair.take() {
                    self.state.pair_stack.push(pair);
                }
            }
            Direction::Up => {
                self.state.pair_stack.pop();
            }
            Direction::Forward => {}
        }
        self.state.direction = Direction::Forward;
        let (token, fresh) = self.stream.next_token();
        if fresh {
            self.track_custom_blocks(&token);
            if token.name == EOF {
                self.report_unclosed_blocks();
            }
        }
        let closed = self.pairs.iter().position(|p| p.right.contains(&token.name));
        if let Some(closed) = closed {
            if !self.pairs[closed].left.contains(&token.name) {
                match self.state.pair_stack.last() {
                    None => {
                        let msg = format!("missing opening token for the closing {}", self.token_to_string(&token));
                        self.log.add_error(msg, Some(token.location.start));
                        return self.stream.create_token(ERROR);
                    }
                    Some(&top) if top != closed => {
                        let msg = format!("unexpected closing {}, expected {} for the opening {}",
                                          self.token_to_string(&token),
                                          self.names_to_string(&self.pairs[top].right),
                                          self.names_to_string(&self.pairs[top].left));
                        self.log.add_error(msg, Some(token.location.start));
                        return self.stream.create_token(ERROR);
                    }
                    _ => self.state.direction = Direction::Up,
                }
            } else if self.state.pair_stack.last() == Some(&closed) {
                self.state.direction = Direction::Up;
            } else {
                self.state.direction = Direction::Down;
                self.state.opened_pair = Some(closed);
            }
        } else if let Some(opened) = self.pairs.iter().position(|p| p.left.contains(&token.name)) {
            self.state.direction = Direction::Down;
            self.state.opened_pair = Some(opened);
        }
        token
    }

    fn track_custom_blocks(&mut self, token: &Token) {
        let Some(definition) = &self.custom_definition else { return };
        if definition.base_token != token.name {
            return;
        }
        if definition.is_start_lexeme(&token.text) {
            let id = self.custom_blocks.len();
            self.custom_blocks.push(CustomBlockNode {
                name: definition.block_name(&token.text),
                start: token.location,
                end: None,
                location: token.location,
                parent: None,
                children: Vec::new(),
            });
            self.block_stack.push(id);
        } else if definition.is_end_lexeme(&token.text) {
            match self.block_stack.pop() {
                None => {
                    let msg = format!("unexpected closing {} of a custom block", self.token_to_string(token));
                    self.log.add_error(msg, Some(token.location.start));
                }
                Some(id) => {
                    let parent = self.block_stack.last().copied();
                    let block = &mut self.custom_blocks[id];
                    block.end = Some(token.location);
                    block.location.end = token.location.end;
                    block.parent = parent;
                    if let Some(parent) = parent {
                        self.custom_blocks[parent].children.push(id);
                    }
                    self.completed_blocks.push(id);
                }
            }
        }
    }

    fn report_unclosed_blocks(&mut self) {
        let messages = self.unclosed_blocks()
            .map(|b| (format!("custom block '{}' is not closed", b.name), b.start.start))
            .to_vec();
        for (msg, location) in messages {
            self.log.add_warning(msg, Some(location));
        }
    }

    /// Reads tokens until the nesting level is `level`, or until [EOF] or [ERROR]. Returns the
    /// token at that level and the tokens skipped before it.
    pub fn next_token_at_level(&mut self, level: usize) -> (Token, Vec<Token>) {
        let mut skipped = Vec::new();
        loop {
            let next = self.next_token();
            if self.state.pair_stack.len() == level || next.name == EOF || next.name == ERROR {
                return (next, skipped);
            }
            skipped.push(next);
        }
    }

    pub fn pairs_state(&self) -> PairAwareState {
        self.state.clone()
    }

    /// Current nesting level.
    pub fn pairs_count(&self) -> usize {
        self.state.pair_stack.len()
    }

    pub fn direction(&self) -> Direction {
        self.state.direction
    }

    /// Goes back to a token already read, with the pair tracking state it had.
    pub fn move_to(&mut self, index: usize, state: PairAwareState) -> Option<Token> {
        let token = self.stream.move_to(index)?;
        self.state = state;
        Some(token)
    }

    pub fn current_index(&self) -> Option<usize> {
        self.stream.current_index()
    }

    pub fn current_token(&self) -> Option<&Token> {
        self.stream.current_token()
    }

    pub fn count(&self) -> usize {
        self.stream.count()
    }

    pub fn create_token(&self, name: TokenId) -> Token {
        self.stream.create_token(name)
    }

    pub fn has_custom_blocks(&self) -> bool {
        self.custom_definition.is_some()
    }

    /// Blocks in the order they were closed.
    pub fn completed_blocks(&self) -> impl Iterator<Item = &CustomBlockNode> {
        let blocks = &self.custom_blocks;
        self.completed_blocks.iter().map(move |id| &blocks[*id])
    }

    /// Blocks whose end lexeme wasn't found.
    pub fn unclosed_blocks(&self) -> impl Iterator<Item = &CustomBlockNode> {
        let blocks = &self.custom_blocks;
        self.block_stack.iter().map(move |id| &blocks[*id])
    }

    pub fn custom_block(&self, id: usize) -> &CustomBlockNode {
        &self.custom_blocks[id]
    }

    /// All the blocks, closed or not, indexed by their ID.
    pub fn custom_blocks(&self) -> &[CustomBlockNode] {
        &self.custom_blocks
    }

    /// IDs of the closed blocks that aren't nested in another block, in the order they were closed.
    pub fn top_blocks(&self) -> Vec<usize> {
        self.completed_blocks.iter().copied().filter(|id| self.custom_blocks[*id].parent.is_none()).collect()
    }

    /// Takes the messages logged since the last call.
    pub fn take_log(&mut self) -> BufLog {
        std::mem::take(&mut self.log)
    }
}
