//! Tokens produced by the lexer.

use std::fmt;

use spire_ir::CodePosition;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenType {
    EndOfFile,
    Unknown,
    Identifier,
    IntLiteral,
    DoubleLiteral,
    StringLiteral,
    CharLiteral,

    Semicolon,
    Comma,
    Dot,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    LParen,
    RParen,

    OpAssign,
    OpAdd,
    OpSub,
    OpMul,
    OpDiv,
    OpMod,
    OpNot,
    OpBitNot,
    OpLsh,
    OpRsh,
    OpEql,
    OpNeq,
    OpGreater,
    OpLess,
    OpGeq,
    OpLeq,
    OpAnd,
    OpOr,
    OpBitXor,
    OpBitAnd,
    OpBitOr,
    OpInc,
    OpDec,

    OpAddAssign,
    OpSubAssign,
    OpMulAssign,
    OpDivAssign,
    OpModAssign,
    OpShlAssign,
    OpShrAssign,
    OpOrAssign,
    OpAndAssign,
    OpXorAssign,

    QuestionMark,
    Colon,
    RightArrow,
    At,
    Pound,
    PoundPound,
}

impl TokenType {
    /// Whether this token closes a balanced group. End of file counts.
    pub fn is_closing(self) -> bool {
        matches!(
            self,
            Self::EndOfFile | Self::RBracket | Self::RParen | Self::RBrace
        )
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::EndOfFile => "end of file",
            Self::Unknown => "unknown token",
            Self::Identifier => "identifier",
            Self::IntLiteral => "integer literal",
            Self::DoubleLiteral => "floating-point literal",
            Self::StringLiteral => "string literal",
            Self::CharLiteral => "character literal",
            Self::Semicolon => "';'",
            Self::Comma => "','",
            Self::Dot => "'.'",
            Self::LBrace => "'{'",
            Self::RBrace => "'}'",
            Self::LBracket => "'['",
            Self::RBracket => "']'",
            Self::LParen => "'('",
            Self::RParen => "')'",
            Self::OpAssign => "'='",
            Self::OpAdd => "'+'",
            Self::OpSub => "'-'",
            Self::OpMul => "'*'",
            Self::OpDiv => "'/'",
            Self::OpMod => "'%'",
            Self::OpNot => "'!'",
            Self::OpBitNot => "'~'",
            Self::OpLsh => "'<<'",
            Self::OpRsh => "'>>'",
            Self::OpEql => "'=='",
            Self::OpNeq => "'!='",
            Self::OpGreater => "'>'",
            Self::OpLess => "'<'",
            Self::OpGeq => "'>='",
            Self::OpLeq => "'<='",
            Self::OpAnd => "'&&'",
            Self::OpOr => "'||'",
            Self::OpBitXor => "'^'",
            Self::OpBitAnd => "'&'",
            Self::OpBitOr => "'|'",
            Self::OpInc => "'++'",
            Self::OpDec => "'--'",
            Self::OpAddAssign => "'+='",
            Self::OpSubAssign => "'-='",
            Self::OpMulAssign => "'*='",
            Self::OpDivAssign => "'/='",
            Self::OpModAssign => "'%='",
            Self::OpShlAssign => "'<<='",
            Self::OpShrAssign => "'>>='",
            Self::OpOrAssign => "'|='",
            Self::OpAndAssign => "'&='",
            Self::OpXorAssign => "'^='",
            Self::QuestionMark => "'?'",
            Self::Colon => "':'",
            Self::RightArrow => "'->'",
            Self::At => "'@'",
            Self::Pound => "'#'",
            Self::PoundPound => "'##'",
        };
        f.write_str(text)
    }
}

/// Layout facts about the whitespace in front of a token.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq)]
pub struct TokenFlags(u8);

impl TokenFlags {
    pub const EMPTY: Self = Self(0);
    /// First token on its line.
    pub const AT_START_OF_LINE: Self = Self(1);
    /// Preceded by whitespace or a comment.
    pub const AFTER_WHITESPACE: Self = Self(2);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for TokenFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for TokenFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub ty: TokenType,
    /// Source text, with escapes resolved for string and char literals.
    pub content: String,
    pub position: CodePosition,
    pub flags: TokenFlags,
}

impl Token {
    pub fn new(
        ty: TokenType,
        content: impl Into<String>,
        position: CodePosition,
        flags: TokenFlags,
    ) -> Self {
        Self {
            ty,
            content: content.into(),
            position,
            flags,
        }
    }

    /// Whether this is the identifier `word`.
    pub fn is_word(&self, word: &str) -> bool {
        self.ty == TokenType::Identifier && self.content == word
    }
}

/// Lexer output. Always ends with an [`TokenType::EndOfFile`] token.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenList {
    pub tokens: Vec<Token>,
}

impl TokenList {
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Token> {
        self.tokens.iter()
    }

    pub fn types(&self) -> Vec<TokenType> {
        self.tokens.iter().map(|t| t.ty).collect()
    }
}
