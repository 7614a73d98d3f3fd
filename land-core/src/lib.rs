// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

pub mod lexer;
pub mod location;
pub mod log;

// package name & version
pub const CORE_PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const CORE_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// ID of a lexer token
pub type TokenId = u16;
/// ID of a nonterminal
pub type VarId = u16;
/// ID of a rule alternative. We use the same type as [VarId] because they're very similar quantities.
pub type AltId = VarId;

// ---------------------------------------------------------------------------------------------
// Reserved tokens, declared by every grammar in this order

/// End of the input
pub const EOF: TokenId = 0;
/// Wildcard matching any sequence of tokens
pub const ANY: TokenId = 1;
/// Fatal error marker produced by the token stream or the parsers
pub const ERROR: TokenId = 2;
/// Lexeme that doesn't match any token pattern
pub const UNDEFINED: TokenId = 3;
/// Start marker of a custom block
pub const CUSTOM_BLOCK_START: TokenId = 4;
/// End marker of a custom block
pub const CUSTOM_BLOCK_END: TokenId = 5;
/// Number of reserved tokens
pub const NUM_RESERVED_TOKENS: usize = 6;

pub const EOF_NAME: &str = "EOF";
pub const ANY_NAME: &str = "Any";
pub const ERROR_NAME: &str = "ERROR";
pub const UNDEFINED_NAME: &str = "UNDEFINED";
pub const CUSTOM_BLOCK_START_NAME: &str = "CUSTOM_BLOCK_START";
pub const CUSTOM_BLOCK_END_NAME: &str = "CUSTOM_BLOCK_END";
/// Name of the node wrapping a custom block
pub const CUSTOM_BLOCK_RULE_NAME: &str = "custom_block";

pub const RESERVED_TOKEN_NAMES: [&str; NUM_RESERVED_TOKENS] = [
    EOF_NAME, ANY_NAME, ERROR_NAME, UNDEFINED_NAME, CUSTOM_BLOCK_START_NAME, CUSTOM_BLOCK_END_NAME
];

pub trait CollectJoin {
    fn join(&mut self, separator: &str) -> String
        where Self: Iterator,
              <Self as Iterator>::Item: ToString
    {
        self.map(|x| x.to_string()).collect::<Vec<_>>().join(separator)
    }

    fn to_vec(self) -> Vec<<Self as Iterator>::Item>
        where Self: Iterator + Sized
    {
        self.collect::<Vec<_>>()
    }
}

impl<I: Iterator> CollectJoin for I {}
