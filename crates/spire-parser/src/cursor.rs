//! Read-only cursor over a token list.

use spire_ir::CodePosition;

use crate::token::{Token, TokenType};

/// A cheap, copyable position in a token slice.
///
/// The last token of the slice acts as the end-of-file sentinel: reading at
/// or past it always reports [`TokenType::EndOfFile`] and never advances
/// further. Copy the cursor to snapshot it and assign it back to rewind.
#[derive(Clone, Copy, Debug)]
pub struct TokenCursor<'a> {
    tokens: &'a [Token],
    index: usize,
}

impl<'a> TokenCursor<'a> {
    /// Creates a cursor at the first token.
    ///
    /// # Panics
    ///
    /// Panics if `tokens` is empty. Lexer output always holds at least the
    /// end-of-file token.
    pub fn new(tokens: &'a [Token]) -> Self {
        assert!(
            !tokens.is_empty(),
            "internal error: token cursor over an empty token list"
        );
        Self { tokens, index: 0 }
    }

    fn end(&self) -> usize {
        self.tokens.len() - 1
    }

    pub fn is_at_end(&self) -> bool {
        self.index >= self.end()
    }

    /// The next token. At the end this is the sentinel token.
    pub fn peek(&self) -> &'a Token {
        &self.tokens[self.index.min(self.end())]
    }

    pub fn peek_type(&self) -> TokenType {
        if self.is_at_end() {
            TokenType::EndOfFile
        } else {
            self.tokens[self.index].ty
        }
    }

    pub fn peek_position(&self) -> CodePosition {
        self.peek().position.clone()
    }

    /// The type of the token `offset` places ahead.
    pub fn peek_type_at(&self, offset: usize) -> TokenType {
        let mut ahead = *self;
        for _ in 0..offset {
            ahead.advance();
        }
        ahead.peek_type()
    }

    /// Returns the next token and moves past it, unless at the end.
    pub fn advance(&mut self) -> &'a Token {
        let token = self.peek();
        if !self.is_at_end() {
            self.index += 1;
        }
        token
    }

    /// Number of tokens consumed so far.
    pub fn index(&self) -> usize {
        self.index
    }
}
