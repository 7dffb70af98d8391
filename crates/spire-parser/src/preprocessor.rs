//! Token-level preprocessor.
//!
//! Runs between the lexer and the parser. A directive is a `#` token that
//! starts a line, followed by the directive name; the directive extends to
//! the end of that line. Supported directives are `#include "file"`,
//! object-like `#define`, `#undef`, `#ifdef`, `#ifndef`, `#else` and
//! `#endif`. Problems are reported to the sink and the offending directive
//! is dropped.

use std::collections::{HashMap, HashSet};

use spire_ir::{CodePosition, DiagnosticKind, DiagnosticSink};

use crate::lexer::tokenize;
use crate::token::{Token, TokenFlags, TokenList, TokenType};

/// Include files nested deeper than this are rejected.
pub const MAX_INCLUDE_DEPTH: usize = 32;

/// Resolves `#include` paths to source text.
pub trait IncludeHandler {
    /// Looks up `path` as included from the file `included_from`.
    /// Returns the resolved path and the file contents.
    fn try_find_include_file(&self, path: &str, included_from: &str) -> Option<(String, String)>;
}

/// A preprocessor definition supplied by the caller, e.g. `-D NAME=VALUE`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Define {
    pub name: String,
    pub value: String,
}

impl Define {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Parses `NAME` or `NAME=VALUE`. A bare name defines an empty macro.
    pub fn parse(text: &str) -> Self {
        match text.split_once('=') {
            Some((name, value)) => Self::new(name.trim(), value),
            None => Self::new(text.trim(), ""),
        }
    }
}

struct Conditional {
    /// The enclosing region is active.
    parent_active: bool,
    /// The branch currently being read is active.
    active: bool,
    seen_else: bool,
    position: CodePosition,
}

struct Preprocessor<'h, 's> {
    macros: HashMap<String, Vec<Token>>,
    handler: Option<&'h dyn IncludeHandler>,
    sink: &'s mut DiagnosticSink,
    output: Vec<Token>,
}

/// Applies directives and macro expansion to `tokens`.
///
/// The result always ends with the end-of-file token of the input.
pub fn preprocess(
    tokens: &TokenList,
    file_name: &str,
    defines: &[Define],
    handler: Option<&dyn IncludeHandler>,
    sink: &mut DiagnosticSink,
) -> TokenList {
    let mut pp = Preprocessor {
        macros: HashMap::new(),
        handler,
        sink,
        output: Vec::with_capacity(tokens.len()),
    };
    for define in defines {
        let body = tokenize("<command line>", &define.value, pp.sink);
        pp.macros.insert(define.name.clone(), strip_eof(body.tokens));
    }

    pp.run(&tokens.tokens, file_name, 0);

    let eof = tokens
        .tokens
        .last()
        .filter(|t| t.ty == TokenType::EndOfFile)
        .cloned()
        .unwrap_or_else(|| {
            Token::new(
                TokenType::EndOfFile,
                "",
                CodePosition::unknown(),
                TokenFlags::AT_START_OF_LINE | TokenFlags::AFTER_WHITESPACE,
            )
        });
    let mut output = pp.output;
    output.push(eof);
    TokenList { tokens: output }
}

fn strip_eof(mut tokens: Vec<Token>) -> Vec<Token> {
    if tokens.last().is_some_and(|t| t.ty == TokenType::EndOfFile) {
        tokens.pop();
    }
    tokens
}

fn is_directive_start(token: &Token) -> bool {
    token.ty == TokenType::Pound && token.flags.contains(TokenFlags::AT_START_OF_LINE)
}

impl Preprocessor<'_, '_> {
    fn run(&mut self, tokens: &[Token], file_name: &str, depth: usize) {
        let mut conditionals: Vec<Conditional> = Vec::new();
        let mut i = 0;
        while i < tokens.len() {
            let token = &tokens[i];
            if token.ty == TokenType::EndOfFile {
                break;
            }
            if !is_directive_start(token) {
                if conditionals.last().is_none_or(|c| c.active) {
                    self.emit(token);
                }
                i += 1;
                continue;
            }

            // The directive runs up to the next token that starts a line.
            let mut end = i + 1;
            while end < tokens.len()
                && tokens[end].ty != TokenType::EndOfFile
                && !tokens[end].flags.contains(TokenFlags::AT_START_OF_LINE)
            {
                end += 1;
            }
            let line = &tokens[i + 1..end];
            self.directive(token, line, file_name, depth, &mut conditionals);
            i = end;
        }

        if let Some(open) = conditionals.first() {
            self.sink
                .diagnose(&open.position, DiagnosticKind::UnterminatedConditional);
        }
    }

    fn directive(
        &mut self,
        pound: &Token,
        line: &[Token],
        file_name: &str,
        depth: usize,
        conditionals: &mut Vec<Conditional>,
    ) {
        let active = conditionals.last().is_none_or(|c| c.active);
        let Some(name) = line.first().filter(|t| t.ty == TokenType::Identifier) else {
            // A lone `#` line is a null directive.
            if active && !line.is_empty() {
                self.sink.diagnose(
                    &line[0].position,
                    DiagnosticKind::UnknownDirective(line[0].content.clone()),
                );
            }
            return;
        };
        let args = &line[1..];

        match name.content.as_str() {
            "ifdef" | "ifndef" => {
                let defined = match args.first().filter(|t| t.ty == TokenType::Identifier) {
                    Some(macro_name) => self.macros.contains_key(&macro_name.content),
                    None => {
                        if active {
                            self.sink.diagnose(
                                &name.position,
                                DiagnosticKind::ExpectedMacroName(name.content.clone()),
                            );
                        }
                        false
                    }
                };
                let taken = if name.content == "ifdef" {
                    defined
                } else {
                    !defined
                };
                conditionals.push(Conditional {
                    parent_active: active,
                    active: active && taken,
                    seen_else: false,
                    position: pound.position.clone(),
                });
            }
            "else" => match conditionals.last_mut() {
                Some(c) if !c.seen_else => {
                    c.seen_else = true;
                    c.active = c.parent_active && !c.active;
                }
                _ => self.sink.diagnose(
                    &name.position,
                    DiagnosticKind::DirectiveWithoutConditional(name.content.clone()),
                ),
            },
            "endif" => {
                if conditionals.pop().is_none() {
                    self.sink.diagnose(
                        &name.position,
                        DiagnosticKind::DirectiveWithoutConditional(name.content.clone()),
                    );
                }
            }
            _ if !active => {}
            "define" => match args.first().filter(|t| t.ty == TokenType::Identifier) {
                Some(macro_name) => {
                    self.macros
                        .insert(macro_name.content.clone(), args[1..].to_vec());
                }
                None => self.sink.diagnose(
                    &name.position,
                    DiagnosticKind::ExpectedMacroName(name.content.clone()),
                ),
            },
            "undef" => match args.first().filter(|t| t.ty == TokenType::Identifier) {
                Some(macro_name) => {
                    self.macros.remove(&macro_name.content);
                }
                None => self.sink.diagnose(
                    &name.position,
                    DiagnosticKind::ExpectedMacroName(name.content.clone()),
                ),
            },
            "include" => self.include(name, args, file_name, depth),
            other => self.sink.diagnose(
                &name.position,
                DiagnosticKind::UnknownDirective(other.to_string()),
            ),
        }
    }

    fn include(&mut self, directive: &Token, args: &[Token], file_name: &str, depth: usize) {
        let Some(path) = args.first().filter(|t| t.ty == TokenType::StringLiteral) else {
            self.sink
                .diagnose(&directive.position, DiagnosticKind::ExpectedIncludePath);
            return;
        };
        let Some(handler) = self.handler else {
            self.sink.diagnose(
                &path.position,
                DiagnosticKind::NoIncludeHandler(path.content.clone()),
            );
            return;
        };
        if depth >= MAX_INCLUDE_DEPTH {
            self.sink.diagnose(
                &path.position,
                DiagnosticKind::IncludeDepthExceeded(path.content.clone()),
            );
            return;
        }
        let Some((resolved, source)) = handler.try_find_include_file(&path.content, file_name)
        else {
            self.sink.diagnose(
                &path.position,
                DiagnosticKind::IncludeNotFound(path.content.clone()),
            );
            return;
        };

        log::debug!("including '{}' as '{resolved}' from '{file_name}'", path.content);
        let included = tokenize(&resolved, &source, self.sink);
        self.run(&included.tokens, &resolved, depth + 1);
    }

    fn emit(&mut self, token: &Token) {
        if token.ty == TokenType::Identifier && self.macros.contains_key(&token.content) {
            let mut expanding = HashSet::new();
            self.expand(token, token, &mut expanding);
        } else {
            self.output.push(token.clone());
        }
    }

    /// Expands the macro named by `token`. Expanded tokens take the position
    /// and leading-whitespace flags of the invocation `site`. A macro is not
    /// expanded again inside its own expansion.
    fn expand(&mut self, token: &Token, site: &Token, expanding: &mut HashSet<String>) {
        let body = match self.macros.get(&token.content) {
            Some(body) if !expanding.contains(&token.content) => body.clone(),
            _ => {
                let mut copy = token.clone();
                copy.position = site.position.clone();
                self.output.push(copy);
                return;
            }
        };
        expanding.insert(token.content.clone());
        for (index, expanded) in body.iter().enumerate() {
            if expanded.ty == TokenType::Identifier && self.macros.contains_key(&expanded.content) {
                self.expand(expanded, site, expanding);
                continue;
            }
            let mut copy = expanded.clone();
            copy.position = site.position.clone();
            if index == 0 {
                copy.flags = site.flags;
            }
            self.output.push(copy);
        }
        expanding.remove(&token.content);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MapHandler(Vec<(&'static str, &'static str)>);

    impl IncludeHandler for MapHandler {
        fn try_find_include_file(&self, path: &str, _: &str) -> Option<(String, String)> {
            self.0
                .iter()
                .find(|(name, _)| *name == path)
                .map(|(name, text)| (format!("lib/{name}"), text.to_string()))
        }
    }

    fn run(source: &str, defines: &[Define], handler: Option<&dyn IncludeHandler>) -> (Vec<String>, DiagnosticSink) {
        let mut sink = DiagnosticSink::new();
        let tokens = tokenize("main.spire", source, &mut sink);
        let out = preprocess(&tokens, "main.spire", defines, handler, &mut sink);
        assert_eq!(out.tokens.last().map(|t| t.ty), Some(TokenType::EndOfFile));
        let words = out
            .tokens
            .iter()
            .filter(|t| t.ty != TokenType::EndOfFile)
            .map(|t| t.content.clone())
            .collect();
        (words, sink)
    }

    #[test]
    fn object_macros_expand() {
        let (words, sink) = run("#define N 4\nint a[N];", &[], None);
        assert_eq!(words, ["int", "a", "[", "4", "]", ";"]);
        assert!(!sink.has_errors());
    }

    #[test]
    fn self_reference_does_not_loop() {
        let (words, _) = run("#define A B\n#define B A\nA;", &[], None);
        assert_eq!(words, ["A", ";"]);
    }

    #[test]
    fn conditionals_select_branches() {
        let source = "#ifdef FAST\nint fast;\n#else\nint slow;\n#endif\n#ifndef FAST\nint x;\n#endif";
        let (words, _) = run(source, &[], None);
        assert_eq!(words, ["int", "slow", ";", "int", "x", ";"]);

        let (words, _) = run(source, &[Define::parse("FAST")], None);
        assert_eq!(words, ["int", "fast", ";"]);
    }

    #[test]
    fn caller_defines_and_undef() {
        let (words, _) = run(
            "float v = SCALE;\n#undef SCALE\nSCALE",
            &[Define::parse("SCALE=2.5")],
            None,
        );
        assert_eq!(words, ["float", "v", "=", "2.5", ";", "SCALE"]);
    }

    #[test]
    fn include_splices_tokens() {
        let handler = MapHandler(vec![("common.spire", "struct Light { float3 dir; };")]);
        let (words, sink) = run("#include \"common.spire\"\nLight l;", &[], Some(&handler));
        assert!(!sink.has_errors(), "{}", sink.output());
        assert_eq!(words[..2], ["struct", "Light"]);
        assert_eq!(words[words.len() - 3..], ["Light", "l", ";"]);
    }

    #[test]
    fn include_problems_are_diagnosed() {
        let (_, sink) = run("#include \"missing.spire\"", &[], None);
        assert!(matches!(
            sink.diagnostics()[0].kind,
            DiagnosticKind::NoIncludeHandler(_)
        ));

        let handler = MapHandler(vec![]);
        let (_, sink) = run("#include \"missing.spire\"\n#include <x>", &[], Some(&handler));
        assert!(matches!(
            sink.diagnostics()[0].kind,
            DiagnosticKind::IncludeNotFound(_)
        ));
        assert_eq!(sink.diagnostics()[1].kind, DiagnosticKind::ExpectedIncludePath);
    }

    #[test]
    fn recursive_include_stops() {
        let handler = MapHandler(vec![("self.spire", "#include \"self.spire\"\nint x;")]);
        let (words, sink) = run("#include \"self.spire\"", &[], Some(&handler));
        assert!(sink
            .diagnostics()
            .iter()
            .any(|d| matches!(d.kind, DiagnosticKind::IncludeDepthExceeded(_))));
        assert_eq!(words.len(), 3 * MAX_INCLUDE_DEPTH);
    }

    #[test]
    fn unbalanced_conditionals() {
        let (_, sink) = run("#endif\n#ifdef X\nint a;", &[], None);
        let kinds: Vec<_> = sink.diagnostics().iter().map(|d| d.kind.clone()).collect();
        assert_eq!(
            kinds,
            [
                DiagnosticKind::DirectiveWithoutConditional("endif".into()),
                DiagnosticKind::UnterminatedConditional,
            ]
        );
    }

    #[test]
    fn unknown_directive_and_inline_pound() {
        let (words, sink) = run("#pragma once\nint a # b;", &[], None);
        assert_eq!(
            sink.diagnostics()[0].kind,
            DiagnosticKind::UnknownDirective("pragma".into())
        );
        assert_eq!(words, ["int", "a", "#", "b", ";"]);
    }
}
