//! Source text to tokens.
//!
//! The lexer never fails: illegal characters and malformed character
//! literals are reported to the sink and skipped. The output always ends with
//! an end-of-file token.

use std::sync::Arc;

use spire_ir::{CodePosition, DiagnosticKind, DiagnosticSink};

use crate::token::{Token, TokenFlags, TokenList, TokenType};

/// Splits `source` into tokens, reporting bad input to `sink`.
pub fn tokenize(file_name: &str, source: &str, sink: &mut DiagnosticSink) -> TokenList {
    let mut lexer = Lexer {
        text: source,
        bytes: source.as_bytes(),
        file: Arc::from(file_name),
        pos: 0,
        line: 1,
        line_start: 0,
        flags: TokenFlags::AT_START_OF_LINE,
        tokens: Vec::new(),
        sink,
    };
    lexer.run();

    let end = lexer.position_at(lexer.bytes.len());
    let mut tokens = lexer.tokens;
    tokens.push(Token::new(
        TokenType::EndOfFile,
        "",
        end,
        TokenFlags::AT_START_OF_LINE | TokenFlags::AFTER_WHITESPACE,
    ));
    TokenList { tokens }
}

fn is_letter(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_punctuation(c: u8) -> bool {
    matches!(
        c,
        b'+' | b'-'
            | b'*'
            | b'/'
            | b'%'
            | b'!'
            | b'^'
            | b'&'
            | b'('
            | b')'
            | b'='
            | b'{'
            | b'}'
            | b'['
            | b']'
            | b'|'
            | b';'
            | b','
            | b'<'
            | b'>'
            | b'~'
            | b'@'
            | b':'
            | b'?'
            | b'#'
    )
}

/// Longest operator spelled at the start of `run`.
fn match_operator(run: &[u8]) -> (TokenType, usize) {
    let at = |i: usize| run.get(i).copied().unwrap_or(0);
    use TokenType::*;
    match (at(0), at(1), at(2)) {
        (b'+', b'+', _) => (OpInc, 2),
        (b'+', b'=', _) => (OpAddAssign, 2),
        (b'+', _, _) => (OpAdd, 1),
        (b'-', b'-', _) => (OpDec, 2),
        (b'-', b'=', _) => (OpSubAssign, 2),
        (b'-', b'>', _) => (RightArrow, 2),
        (b'-', _, _) => (OpSub, 1),
        (b'*', b'=', _) => (OpMulAssign, 2),
        (b'*', _, _) => (OpMul, 1),
        (b'/', b'=', _) => (OpDivAssign, 2),
        (b'/', _, _) => (OpDiv, 1),
        (b'%', b'=', _) => (OpModAssign, 2),
        (b'%', _, _) => (OpMod, 1),
        (b'|', b'|', _) => (OpOr, 2),
        (b'|', b'=', _) => (OpOrAssign, 2),
        (b'|', _, _) => (OpBitOr, 1),
        (b'&', b'&', _) => (OpAnd, 2),
        (b'&', b'=', _) => (OpAndAssign, 2),
        (b'&', _, _) => (OpBitAnd, 1),
        (b'^', b'=', _) => (OpXorAssign, 2),
        (b'^', _, _) => (OpBitXor, 1),
        (b'>', b'>', b'=') => (OpShrAssign, 3),
        (b'>', b'>', _) => (OpRsh, 2),
        (b'>', b'=', _) => (OpGeq, 2),
        (b'>', _, _) => (OpGreater, 1),
        (b'<', b'<', b'=') => (OpShlAssign, 3),
        (b'<', b'<', _) => (OpLsh, 2),
        (b'<', b'=', _) => (OpLeq, 2),
        (b'<', _, _) => (OpLess, 1),
        (b'=', b'=', _) => (OpEql, 2),
        (b'=', _, _) => (OpAssign, 1),
        (b'!', b'=', _) => (OpNeq, 2),
        (b'!', _, _) => (OpNot, 1),
        (b'#', b'#', _) => (PoundPound, 2),
        (b'#', _, _) => (Pound, 1),
        (b'?', _, _) => (QuestionMark, 1),
        (b'@', _, _) => (At, 1),
        (b':', _, _) => (Colon, 1),
        (b'~', _, _) => (OpBitNot, 1),
        (b';', _, _) => (Semicolon, 1),
        (b',', _, _) => (Comma, 1),
        (b'.', _, _) => (Dot, 1),
        (b'{', _, _) => (LBrace, 1),
        (b'}', _, _) => (RBrace, 1),
        (b'[', _, _) => (LBracket, 1),
        (b']', _, _) => (RBracket, 1),
        (b'(', _, _) => (LParen, 1),
        (b')', _, _) => (RParen, 1),
        _ => (Unknown, 1),
    }
}

struct Lexer<'a, 's> {
    text: &'a str,
    bytes: &'a [u8],
    file: Arc<str>,
    pos: usize,
    line: u32,
    line_start: usize,
    flags: TokenFlags,
    tokens: Vec<Token>,
    sink: &'s mut DiagnosticSink,
}

impl Lexer<'_, '_> {
    fn peek(&self, offset: usize) -> u8 {
        self.bytes.get(self.pos + offset).copied().unwrap_or(0)
    }

    fn position_at(&self, pos: usize) -> CodePosition {
        let col = pos.saturating_sub(self.line_start) + 1;
        CodePosition::new(self.line, col as u32, pos as u32, self.file.clone())
    }

    /// Consumes one byte, tracking line starts.
    fn bump(&mut self) {
        if self.peek(0) == b'\n' {
            self.line += 1;
            self.line_start = self.pos + 1;
        }
        self.pos += 1;
    }

    fn push(&mut self, ty: TokenType, content: String, position: CodePosition) {
        self.tokens.push(Token::new(ty, content, position, self.flags));
        self.flags = TokenFlags::EMPTY;
    }

    fn run(&mut self) {
        while self.pos < self.bytes.len() {
            let c = self.peek(0);
            match c {
                b'\r' | b'\n' => {
                    self.flags |= TokenFlags::AT_START_OF_LINE | TokenFlags::AFTER_WHITESPACE;
                    self.bump();
                }
                b' ' | b'\t' => {
                    self.flags |= TokenFlags::AFTER_WHITESPACE;
                    self.bump();
                }
                // U+00A0 no-break space.
                0xC2 if self.peek(1) == 0xA0 => {
                    self.flags |= TokenFlags::AFTER_WHITESPACE;
                    self.pos += 2;
                }
                b'/' if self.peek(1) == b'/' => self.line_comment(),
                b'/' if self.peek(1) == b'*' => self.block_comment(),
                b'"' => self.quoted(b'"', TokenType::StringLiteral),
                b'\'' => self.quoted(b'\'', TokenType::CharLiteral),
                b'.' if self.peek(1).is_ascii_digit() => self.number(),
                b'.' => self.operators(),
                _ if is_letter(c) => self.identifier(),
                _ if c.is_ascii_digit() => self.number(),
                _ if is_punctuation(c) => self.operators(),
                _ => self.illegal_character(),
            }
        }
    }

    fn line_comment(&mut self) {
        while self.pos < self.bytes.len() && !matches!(self.peek(0), b'\r' | b'\n') {
            self.bump();
        }
        self.flags |= TokenFlags::AFTER_WHITESPACE;
    }

    fn block_comment(&mut self) {
        self.pos += 2;
        while self.pos < self.bytes.len() {
            if self.peek(0) == b'*' && self.peek(1) == b'/' {
                self.pos += 2;
                break;
            }
            if self.peek(0) == b'\n' {
                self.flags |= TokenFlags::AT_START_OF_LINE;
            }
            self.bump();
        }
        self.flags |= TokenFlags::AFTER_WHITESPACE;
    }

    fn identifier(&mut self) {
        let start = self.pos;
        let position = self.position_at(start);
        while is_letter(self.peek(0)) || self.peek(0).is_ascii_digit() {
            self.pos += 1;
        }
        let content = self.text[start..self.pos].to_owned();
        self.push(TokenType::Identifier, content, position);
    }

    fn exponent(&mut self) {
        self.pos += 1;
        if matches!(self.peek(0), b'+' | b'-') {
            self.pos += 1;
        }
        while self.peek(0).is_ascii_digit() {
            self.pos += 1;
        }
    }

    fn number(&mut self) {
        let start = self.pos;
        let position = self.position_at(start);
        let mut is_float = false;

        if self.peek(0) == b'0' && matches!(self.peek(1), b'x' | b'X') {
            self.pos += 2;
            while self.peek(0).is_ascii_hexdigit() {
                self.pos += 1;
            }
        } else {
            while self.peek(0).is_ascii_digit() {
                self.pos += 1;
            }
            if self.peek(0) == b'.' {
                is_float = true;
                self.pos += 1;
                while self.peek(0).is_ascii_digit() {
                    self.pos += 1;
                }
            }
            if matches!(self.peek(0), b'e' | b'E') {
                is_float = true;
                self.exponent();
            }
        }

        let mut content = self.text[start..self.pos].to_owned();
        if is_float {
            // The float suffix is dropped from the literal text.
            if matches!(self.peek(0), b'f' | b'F') {
                self.pos += 1;
            }
            self.push(TokenType::DoubleLiteral, content, position);
        } else {
            if matches!(self.peek(0), b'u' | b'U') {
                content.push(self.peek(0) as char);
                self.pos += 1;
            }
            self.push(TokenType::IntLiteral, content, position);
        }
    }

    fn quoted(&mut self, quote: u8, ty: TokenType) {
        let position = self.position_at(self.pos);
        self.pos += 1;
        let mut content = String::new();
        let mut chunk_start = self.pos;
        while self.pos < self.bytes.len() && self.peek(0) != quote {
            if self.peek(0) == b'\\' {
                content.push_str(&self.text[chunk_start..self.pos]);
                match self.peek(1) {
                    c @ (b'\\' | b'"' | b'\'') => content.push(c as char),
                    b't' => content.push('\t'),
                    b's' => content.push(' '),
                    b'n' => content.push('\n'),
                    b'r' => content.push('\r'),
                    b'b' => content.push('\u{8}'),
                    _ => {}
                }
                let escaped = self.text[self.pos + 1..]
                    .chars()
                    .next()
                    .map_or(0, char::len_utf8);
                self.pos += 1 + escaped;
                chunk_start = self.pos;
            } else {
                self.bump();
            }
        }
        content.push_str(&self.text[chunk_start..self.pos]);
        // Skip the closing quote.
        self.pos = (self.pos + 1).min(self.bytes.len());

        if ty == TokenType::CharLiteral && content.chars().count() > 1 {
            self.sink
                .diagnose(&position, DiagnosticKind::IllegalCharacterLiteral);
        }
        self.push(ty, content, position);
    }

    /// A run of punctuation, split into operators by maximal munch.
    fn operators(&mut self) {
        let start = self.pos;
        self.pos += 1;
        while is_punctuation(self.peek(0)) && !(self.peek(0) == b'/' && matches!(self.peek(1), b'/' | b'*')) {
            self.pos += 1;
        }
        let run = &self.bytes[start..self.pos];
        let mut offset = 0;
        while offset < run.len() {
            let (ty, len) = match_operator(&run[offset..]);
            let position = self.position_at(start + offset);
            let content = self.text[start + offset..start + offset + len].to_owned();
            self.push(ty, content, position);
            offset += len;
        }
    }

    fn illegal_character(&mut self) {
        let position = self.position_at(self.pos);
        let c = self.text[self.pos..].chars().next().unwrap_or('\0');
        let kind = if (' '..='~').contains(&c) {
            DiagnosticKind::IllegalCharacterPrint(c)
        } else {
            DiagnosticKind::IllegalCharacterHex(c as u32)
        };
        self.sink.diagnose(&position, kind);
        self.pos += c.len_utf8().max(1);
    }
}
