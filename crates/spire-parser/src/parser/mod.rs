//! Recursive-descent parser with panic-mode error recovery.
//!
//! On the first unexpected token the parser reports one diagnostic and
//! enters recovery. While recovering, further mismatches are silent; the
//! parser skips balanced token groups until it reaches a token the caller
//! named as a synchronization point, then resumes normally. Recovery never
//! skips past an unmatched `}` and always stops at end of file.

mod decl;
mod expr;
mod stmt;

use std::collections::HashSet;

use spire_ir::{CodePosition, DiagnosticKind, DiagnosticSink};

use crate::ast::{Decl, DeclId, DeclKind, ExprId, ExprKind, ModifierKind, Modifiers, Program};
use crate::cursor::TokenCursor;
use crate::token::{Token, TokenList, TokenType};

/// Parser settings.
#[derive(Clone, Debug, Default)]
pub struct ParseOptions {
    /// Keep function bodies as raw token lists instead of parsing them.
    pub no_checking: bool,
}

/// Type names known before any declaration is seen.
const BUILTIN_TYPE_NAMES: &[&str] = &[
    "int",
    "uint",
    "bool",
    "float",
    "half",
    "void",
    "ivec2",
    "ivec3",
    "ivec4",
    "uvec2",
    "uvec3",
    "uvec4",
    "vec2",
    "vec3",
    "vec4",
    "mat3",
    "mat4",
    "mat4x4",
    "mat3x3",
    "int2",
    "int3",
    "int4",
    "uint2",
    "uint3",
    "uint4",
    "float2",
    "float3",
    "float4",
    "half2",
    "half3",
    "half4",
    "float3x3",
    "float4x4",
    "half3x3",
    "half4x4",
    "Texture1D",
    "Texture2D",
    "Texture2DArray",
    "Texture2DArrayShadow",
    "TextureCube",
    "TextureCubeShadow",
    "Texture3D",
    "texture",
    "Texture",
    "sampler",
    "SamplerState",
    "SamplerComparisonState",
    "sampler_state",
    "Uniform",
    "StructuredBuffer",
    "RWStructuredBuffer",
    "PackedBuffer",
    "StorageBuffer",
    "Patch",
];

/// Blocks and parenthesized expressions nested deeper than this are
/// rejected with a syntax error instead of exhausting the stack.
const MAX_NESTING: u32 = 64;

/// Parses a whole translation unit.
///
/// `predefined` is the already-parsed standard library; its struct and
/// typedef names are known type names here. When it is absent the input is
/// the standard library itself and every top-level declaration is marked
/// [`ModifierKind::FromStdLib`].
pub fn parse(
    tokens: &TokenList,
    sink: &mut DiagnosticSink,
    file_name: &str,
    predefined: Option<&Program>,
    options: &ParseOptions,
) -> Program {
    if tokens.is_empty() {
        return Program::new(file_name);
    }
    let mut parser = Parser::new(&tokens.tokens, sink, file_name, options);
    if let Some(predefined) = predefined {
        parser.learn_type_names(predefined);
    }
    parser.parse_source_file(predefined.is_none());
    parser.program
}

/// What kind of declaration the parser is currently inside.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Container {
    Program,
    Struct,
    Other,
}

pub(crate) struct Parser<'a, 's> {
    cursor: TokenCursor<'a>,
    sink: &'s mut DiagnosticSink,
    program: Program,
    options: ParseOptions,
    recovering: bool,
    /// Depth of generic argument lists; `>` closes a list instead of
    /// comparing while it is positive.
    generic_depth: u32,
    /// The second half of a `>>` that closed a nested generic argument list.
    split_greater: Option<&'a Token>,
    nesting: u32,
    anonymous_counter: u32,
    type_names: HashSet<String>,
    container: Container,
}

impl<'a, 's> Parser<'a, 's> {
    fn new(
        tokens: &'a [Token],
        sink: &'s mut DiagnosticSink,
        file_name: &str,
        options: &ParseOptions,
    ) -> Self {
        Self {
            cursor: TokenCursor::new(tokens),
            sink,
            program: Program::new(file_name),
            options: options.clone(),
            recovering: false,
            generic_depth: 0,
            split_greater: None,
            nesting: 0,
            anonymous_counter: 0,
            type_names: BUILTIN_TYPE_NAMES.iter().map(|s| s.to_string()).collect(),
            container: Container::Program,
        }
    }

    fn learn_type_names(&mut self, program: &Program) {
        for &id in &program.members {
            let decl = &program.decls[id];
            let is_type = match &decl.kind {
                DeclKind::Struct { .. } | DeclKind::Class { .. } | DeclKind::TypeDef { .. } => {
                    true
                }
                DeclKind::Generic {
                    inner: Some(inner), ..
                } => matches!(
                    program.decls[*inner].kind,
                    DeclKind::Struct { .. } | DeclKind::Class { .. }
                ),
                _ => false,
            };
            if is_type {
                self.type_names.insert(decl.name.clone());
            }
        }
    }

    fn parse_source_file(&mut self, from_stdlib: bool) {
        self.program.position = self.cursor.peek_position();
        let mut members = Vec::new();
        while !self.cursor.is_at_end() {
            let before = self.cursor.index();
            self.parse_decl(&mut members);
            self.try_recover_default();
            self.ensure_progress(before);
        }
        if from_stdlib {
            for &id in &members {
                let position = self.program.decls[id].position.clone();
                self.program.decls[id]
                    .modifiers
                    .push(ModifierKind::FromStdLib, position);
            }
        }
        self.program.members = members;
    }

    // -----------------------------------------------------------------------
    // Token access
    // -----------------------------------------------------------------------

    fn peek(&self) -> &'a Token {
        self.split_greater.unwrap_or_else(|| self.cursor.peek())
    }

    fn peek_type(&self) -> TokenType {
        if self.split_greater.is_some() {
            TokenType::OpGreater
        } else {
            self.cursor.peek_type()
        }
    }

    fn peek_position(&self) -> CodePosition {
        self.peek().position.clone()
    }

    fn advance(&mut self) -> &'a Token {
        match self.split_greater.take() {
            Some(token) => token,
            None => self.cursor.advance(),
        }
    }

    fn look_ahead(&self, ty: TokenType) -> bool {
        self.peek_type() == ty
    }

    fn look_ahead_word(&self, word: &str) -> bool {
        self.split_greater.is_none() && self.cursor.peek().is_word(word)
    }

    /// Consumes the next token if it has type `ty`. A match ends recovery.
    fn advance_if(&mut self, ty: TokenType) -> bool {
        if self.look_ahead(ty) {
            self.advance();
            self.recovering = false;
            true
        } else {
            false
        }
    }

    fn advance_if_word(&mut self, word: &str) -> bool {
        if self.look_ahead_word(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Whether the next token is a known type name.
    fn look_ahead_type_name(&self) -> bool {
        let token = self.peek();
        token.ty == TokenType::Identifier && self.type_names.contains(&token.content)
    }

    /// Skips one token, or a whole bracketed group. Returns the type of the
    /// last token skipped.
    fn skip_balanced(&mut self) -> TokenType {
        let first = self.advance().ty;
        let Some(outer) = closing_of(first) else {
            return first;
        };
        let mut open = vec![outer];
        while let Some(&close) = open.last() {
            if self.cursor.is_at_end() {
                return TokenType::EndOfFile;
            }
            let ty = self.advance().ty;
            if ty == close {
                open.pop();
            } else if let Some(nested) = closing_of(ty) {
                open.push(nested);
            }
        }
        outer
    }

    /// Advances one token when nothing was consumed since `before`.
    fn ensure_progress(&mut self, before: usize) {
        if self.cursor.index() == before && self.split_greater.is_none() {
            self.advance();
        }
    }

    // -----------------------------------------------------------------------
    // Diagnostics and recovery
    // -----------------------------------------------------------------------

    /// Reports a syntax error unless one was already reported for the
    /// current recovery region.
    fn unexpected(&mut self, kind: DiagnosticKind) {
        if !self.recovering {
            let position = self.peek_position();
            self.sink.diagnose(&position, kind);
            self.recovering = true;
        }
    }

    fn unexpected_expecting(&mut self, expected: TokenType) {
        let found = describe(self.peek());
        self.unexpected(DiagnosticKind::UnexpectedTokenExpectedTokenType {
            found,
            expected: expected.to_string(),
        });
    }

    /// Reads a token of type `ty`. On a mismatch, reports it (or, while
    /// recovering, skips ahead looking for `ty`) and returns the next token
    /// without consuming it.
    fn read_token(&mut self, ty: TokenType) -> &'a Token {
        if self.look_ahead(ty) {
            self.recovering = false;
            return self.advance();
        }
        if !self.recovering {
            self.unexpected_expecting(ty);
            return self.peek();
        }
        if self.try_recover(&[ty], &[]) {
            self.recovering = false;
            return self.advance();
        }
        self.peek()
    }

    /// Reads the identifier `word`, with the same recovery as
    /// [`Self::read_token`].
    fn read_word(&mut self, word: &str) -> &'a Token {
        if self.look_ahead_word(word) {
            self.recovering = false;
            return self.advance();
        }
        if !self.recovering {
            let found = describe(self.peek());
            self.unexpected(DiagnosticKind::UnexpectedTokenExpectedTokenName {
                found,
                expected: word.to_string(),
            });
            return self.peek();
        }
        loop {
            if self.look_ahead_word(word) {
                self.recovering = false;
                return self.advance();
            }
            if self.peek_type().is_closing() {
                return self.peek();
            }
            self.skip_balanced();
        }
    }

    /// Skips tokens until the next one is in `before`, or until one in
    /// `after` has been consumed. Returns `false` if recovery had to stop
    /// at a closing token or end of file instead.
    fn try_recover(&mut self, before: &[TokenType], after: &[TokenType]) -> bool {
        if !self.recovering {
            return true;
        }
        let looking_for_close = before
            .iter()
            .chain(after)
            .any(|t| matches!(t, TokenType::RParen | TokenType::RBracket | TokenType::RBrace));
        loop {
            let peek = self.peek_type();
            if before.contains(&peek) {
                self.recovering = false;
                return true;
            }
            if after.contains(&peek) {
                self.advance();
                self.recovering = false;
                return true;
            }
            match peek {
                TokenType::EndOfFile | TokenType::RBrace => return false,
                TokenType::RParen | TokenType::RBracket if !looking_for_close => return false,
                _ => {}
            }
            let skipped = self.skip_balanced();
            if after.contains(&skipped) {
                self.recovering = false;
                return true;
            }
        }
    }

    /// Recovers at the end of a declaration or statement.
    fn try_recover_default(&mut self) -> bool {
        self.try_recover(&[TokenType::RBrace], &[TokenType::Semicolon])
    }

    /// Consumes `ty` if it is next, recovering towards it first. At end of
    /// file the missing token is reported and treated as present, so loops
    /// driven by this always terminate.
    fn advance_if_match(&mut self, ty: TokenType) -> bool {
        if self.recovering {
            self.try_recover(&[ty], &[]);
        }
        if self.look_ahead(ty) {
            self.read_token(ty);
            return true;
        }
        if self.look_ahead(TokenType::EndOfFile) {
            self.read_token(ty);
            return true;
        }
        false
    }

    /// Reads an identifier and returns its text and position.
    fn read_identifier(&mut self) -> (String, CodePosition) {
        let token = self.read_token(TokenType::Identifier);
        let name = if token.ty == TokenType::Identifier {
            token.content.clone()
        } else {
            String::new()
        };
        (name, token.position.clone())
    }

    fn generate_anonymous_name(&mut self) -> String {
        let name = format!("_anonymous_{}", self.anonymous_counter);
        self.anonymous_counter += 1;
        name
    }

    fn add_decl(
        &mut self,
        name: String,
        position: CodePosition,
        modifiers: Modifiers,
        kind: DeclKind,
    ) -> DeclId {
        self.program.add_decl(Decl {
            name,
            position,
            modifiers,
            kind,
        })
    }

    fn error_expr(&mut self, position: CodePosition) -> ExprId {
        self.program.add_expr(ExprKind::Error, position)
    }

    // -----------------------------------------------------------------------
    // Modifiers and semantics
    // -----------------------------------------------------------------------

    fn parse_modifiers(&mut self) -> Modifiers {
        let mut modifiers = Modifiers::default();
        loop {
            let token = self.peek();
            let position = token.position.clone();
            match token.ty {
                TokenType::LBracket => self.parse_attributes(&mut modifiers),
                TokenType::Identifier => {
                    if let Some(kind) = ModifierKind::from_keyword(&token.content) {
                        self.advance();
                        modifiers.push(kind, position);
                        continue;
                    }
                    match token.content.as_str() {
                        "layout" => {
                            self.advance();
                            let layout = self.parse_layout();
                            modifiers.push(ModifierKind::Layout(layout), position);
                        }
                        "__builtin_type" => {
                            self.advance();
                            self.read_token(TokenType::LParen);
                            let tag = self.read_int_literal();
                            self.read_token(TokenType::RParen);
                            modifiers.push(ModifierKind::BuiltinType(tag as i32), position);
                        }
                        "__magic_type" => {
                            self.advance();
                            self.read_token(TokenType::LParen);
                            let (name, _) = self.read_identifier();
                            let tag = if self.advance_if(TokenType::Comma) {
                                self.read_int_literal() as u32
                            } else {
                                0
                            };
                            self.read_token(TokenType::RParen);
                            modifiers.push(ModifierKind::MagicType { name, tag }, position);
                        }
                        _ => return modifiers,
                    }
                }
                _ => return modifiers,
            }
        }
    }

    /// `layout(a = 1, b)` after the keyword, normalized to `"a=1, b"`.
    fn parse_layout(&mut self) -> String {
        let mut entries = Vec::new();
        self.read_token(TokenType::LParen);
        while !self.advance_if_match(TokenType::RParen) {
            let before = self.cursor.index();
            let (id, _) = self.read_identifier();
            let entry = if self.advance_if(TokenType::OpAssign) {
                let value = self.read_token(TokenType::IntLiteral);
                format!("{id}={}", value.content)
            } else {
                id
            };
            entries.push(entry);
            if self.advance_if(TokenType::RParen) {
                break;
            }
            self.read_token(TokenType::Comma);
            if self.cursor.index() == before {
                break;
            }
        }
        entries.join(", ")
    }

    /// `[name(args), name2]`.
    fn parse_attributes(&mut self, modifiers: &mut Modifiers) {
        self.read_token(TokenType::LBracket);
        while !self.advance_if_match(TokenType::RBracket) {
            let before = self.cursor.index();
            let (name, position) = self.read_identifier();
            let mut args = Vec::new();
            if self.advance_if(TokenType::LParen) {
                while !self.advance_if_match(TokenType::RParen) {
                    let arg_start = self.cursor.index();
                    args.push(self.parse_arg_expression());
                    if self.advance_if(TokenType::RParen) {
                        break;
                    }
                    self.read_token(TokenType::Comma);
                    if self.cursor.index() == arg_start {
                        break;
                    }
                }
            }
            modifiers.push(ModifierKind::Attribute { name, args }, position);
            if self.advance_if(TokenType::RBracket) {
                break;
            }
            self.read_token(TokenType::Comma);
            if self.cursor.index() == before {
                break;
            }
        }
    }

    fn read_int_literal(&mut self) -> i64 {
        let token = self.read_token(TokenType::IntLiteral);
        if token.ty == TokenType::IntLiteral {
            parse_int_literal(&token.content)
        } else {
            0
        }
    }

    /// `: SV_Target`, `: register(t0, space1)`, `: packoffset(c0.x)`,
    /// possibly repeated.
    fn parse_optional_semantics(&mut self, modifiers: &mut Modifiers) {
        while self.advance_if(TokenType::Colon) {
            let position = self.peek_position();
            if self.advance_if_word("register") {
                self.read_token(TokenType::LParen);
                let (register, _) = self.read_identifier();
                let mask = self.parse_optional_mask();
                let space = if self.advance_if(TokenType::Comma) {
                    Some(self.read_identifier().0)
                } else {
                    None
                };
                self.read_token(TokenType::RParen);
                modifiers.push(
                    ModifierKind::Register {
                        register,
                        space,
                        mask,
                    },
                    position,
                );
            } else if self.advance_if_word("packoffset") {
                self.read_token(TokenType::LParen);
                let (register, _) = self.read_identifier();
                let mask = self.parse_optional_mask();
                self.read_token(TokenType::RParen);
                modifiers.push(ModifierKind::PackOffset { register, mask }, position);
            } else {
                let (name, _) = self.read_identifier();
                modifiers.push(ModifierKind::Semantic(name), position);
            }
        }
    }

    fn parse_optional_mask(&mut self) -> Option<String> {
        if self.advance_if(TokenType::Dot) {
            Some(self.read_identifier().0)
        } else {
            None
        }
    }
}

fn closing_of(ty: TokenType) -> Option<TokenType> {
    match ty {
        TokenType::LParen => Some(TokenType::RParen),
        TokenType::LBrace => Some(TokenType::RBrace),
        TokenType::LBracket => Some(TokenType::RBracket),
        _ => None,
    }
}

/// Human-readable name of a token for diagnostics.
fn describe(token: &Token) -> String {
    match token.ty {
        TokenType::Identifier => format!("identifier '{}'", token.content),
        TokenType::IntLiteral | TokenType::DoubleLiteral => format!("'{}'", token.content),
        TokenType::StringLiteral => format!("string \"{}\"", token.content),
        _ => token.ty.to_string(),
    }
}

/// Value of an integer literal token: decimal or `0x` hex, with an optional
/// `u` suffix. Out-of-range values wrap.
pub(crate) fn parse_int_literal(text: &str) -> i64 {
    let digits = text.trim_end_matches(['u', 'U']);
    let parsed = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => digits.parse::<u64>(),
    };
    parsed.map(|v| v as i64).unwrap_or(0)
}
