//! Statements.

use spire_ir::{CodePosition, DiagnosticKind, DiagnosticSink};

use super::{MAX_NESTING, Parser};
use crate::ast::{Program, StmtId, StmtKind, VarKind};
use crate::token::TokenType;

impl Parser<'_, '_> {
    pub(super) fn parse_statement(&mut self) -> StmtId {
        if self.nesting >= MAX_NESTING {
            let position = self.peek_position();
            self.unexpected(DiagnosticKind::SyntaxError);
            return self.program.add_stmt(StmtKind::Empty, position);
        }
        self.nesting += 1;
        let stmt = self.parse_statement_inner();
        self.nesting -= 1;
        stmt
    }

    fn parse_statement_inner(&mut self) -> StmtId {
        let modifiers = self.parse_modifiers();
        let position = self.peek_position();

        let stmt = if self.look_ahead(TokenType::LBrace) {
            self.parse_block_statement()
        } else if self.look_ahead_word("if") {
            self.parse_if_statement(position)
        } else if self.look_ahead_word("for") {
            self.parse_for_statement(position)
        } else if self.look_ahead_word("while") {
            self.parse_while_statement(position)
        } else if self.look_ahead_word("do") {
            self.parse_do_while_statement(position)
        } else if self.look_ahead_word("break") {
            self.parse_keyword_statement(StmtKind::Break, position)
        } else if self.look_ahead_word("continue") {
            self.parse_keyword_statement(StmtKind::Continue, position)
        } else if self.look_ahead_word("discard") {
            self.parse_keyword_statement(StmtKind::Discard, position)
        } else if self.look_ahead_word("return") {
            self.parse_return_statement(position)
        } else if self.look_ahead_word("switch") {
            self.parse_switch_statement(position)
        } else if self.look_ahead_word("case") {
            self.advance();
            let value = self.parse_expression();
            self.read_token(TokenType::Colon);
            self.program.add_stmt(StmtKind::Case(value), position)
        } else if self.look_ahead_word("default") {
            self.advance();
            self.read_token(TokenType::Colon);
            self.program.add_stmt(StmtKind::Default, position)
        } else if self.starts_declaration() {
            self.parse_var_decl_statement(position)
        } else if self.advance_if(TokenType::Semicolon) {
            self.program.add_stmt(StmtKind::Empty, position)
        } else {
            self.parse_expression_statement(position)
        };

        if !modifiers.is_empty() {
            if let StmtKind::VarDecl(decls) = &self.program.stmts[stmt].kind {
                for decl in decls.clone() {
                    self.prepend_modifiers(decl, &modifiers);
                }
            }
            self.program.stmts[stmt].modifiers = modifiers;
        }
        stmt
    }

    /// Whether the statement ahead declares variables.
    ///
    /// A known type name always starts a declaration. Any other identifier
    /// is parsed as a type by a throwaway parser sharing this one's cursor
    /// position: the statement is a declaration when that parse succeeds
    /// and an identifier follows, so `Foo x`, `Foo<T> x` and `Foo[4] x`
    /// declare while `a < b`, `a[i] = 1` and `f(x)` do not. The syntax tree
    /// and diagnostics of this parser are left untouched.
    fn starts_declaration(&mut self) -> bool {
        if self.look_ahead_type_name() {
            return true;
        }
        if self.split_greater.is_some() || !self.look_ahead(TokenType::Identifier) {
            return false;
        }
        let mut sink = DiagnosticSink::new();
        let mut trial = Parser {
            cursor: self.cursor,
            sink: &mut sink,
            program: Program::default(),
            options: self.options.clone(),
            recovering: false,
            generic_depth: 0,
            split_greater: None,
            nesting: self.nesting,
            anonymous_counter: 0,
            type_names: std::mem::take(&mut self.type_names),
            container: self.container,
        };
        trial.parse_type();
        let declares = !trial.sink.has_errors() && trial.look_ahead(TokenType::Identifier);
        self.type_names = std::mem::take(&mut trial.type_names);
        declares
    }

    pub(super) fn parse_block_statement(&mut self) -> StmtId {
        let position = self.peek_position();
        self.read_token(TokenType::LBrace);
        let mut stmts = Vec::new();
        while !self.advance_if_match(TokenType::RBrace) {
            let before = self.cursor.index();
            stmts.push(self.parse_statement());
            self.try_recover_default();
            self.ensure_progress(before);
        }
        self.program.add_stmt(StmtKind::Block(stmts), position)
    }

    fn parse_var_decl_statement(&mut self, position: CodePosition) -> StmtId {
        let ty = self.parse_type();
        let first = self.parse_init_declarator(true);
        let decls = self.parse_var_group(ty, first, VarKind::Variable);
        self.program.add_stmt(StmtKind::VarDecl(decls), position)
    }

    fn parse_expression_statement(&mut self, position: CodePosition) -> StmtId {
        let expr = self.parse_expression();
        self.read_token(TokenType::Semicolon);
        self.program.add_stmt(StmtKind::Expression(expr), position)
    }

    fn parse_keyword_statement(&mut self, kind: StmtKind, position: CodePosition) -> StmtId {
        self.advance();
        self.read_token(TokenType::Semicolon);
        self.program.add_stmt(kind, position)
    }

    fn parse_parenthesized_condition(&mut self) -> crate::ast::ExprId {
        self.read_token(TokenType::LParen);
        let condition = self.parse_expression();
        self.read_token(TokenType::RParen);
        condition
    }

    fn parse_if_statement(&mut self, position: CodePosition) -> StmtId {
        self.advance();
        let condition = self.parse_parenthesized_condition();
        let accept = self.parse_statement();
        let reject = if self.advance_if_word("else") {
            Some(self.parse_statement())
        } else {
            None
        };
        self.program.add_stmt(
            StmtKind::If {
                condition,
                accept,
                reject,
            },
            position,
        )
    }

    fn parse_for_statement(&mut self, position: CodePosition) -> StmtId {
        self.advance();
        self.read_token(TokenType::LParen);
        let init_position = self.peek_position();
        let init = if self.starts_declaration() {
            Some(self.parse_var_decl_statement(init_position))
        } else if self.advance_if(TokenType::Semicolon) {
            None
        } else {
            Some(self.parse_expression_statement(init_position))
        };
        let condition = if self.look_ahead(TokenType::Semicolon) {
            None
        } else {
            Some(self.parse_expression())
        };
        self.read_token(TokenType::Semicolon);
        let step = if self.look_ahead(TokenType::RParen) {
            None
        } else {
            Some(self.parse_expression())
        };
        self.read_token(TokenType::RParen);
        let body = self.parse_statement();
        self.program.add_stmt(
            StmtKind::For {
                init,
                condition,
                step,
                body,
            },
            position,
        )
    }

    fn parse_while_statement(&mut self, position: CodePosition) -> StmtId {
        self.advance();
        let condition = self.parse_parenthesized_condition();
        let body = self.parse_statement();
        self.program
            .add_stmt(StmtKind::While { condition, body }, position)
    }

    fn parse_do_while_statement(&mut self, position: CodePosition) -> StmtId {
        self.advance();
        let body = self.parse_statement();
        self.read_word("while");
        let condition = self.parse_parenthesized_condition();
        self.read_token(TokenType::Semicolon);
        self.program
            .add_stmt(StmtKind::DoWhile { body, condition }, position)
    }

    fn parse_return_statement(&mut self, position: CodePosition) -> StmtId {
        self.advance();
        let value = if self.look_ahead(TokenType::Semicolon) {
            None
        } else {
            Some(self.parse_expression())
        };
        self.read_token(TokenType::Semicolon);
        self.program.add_stmt(StmtKind::Return(value), position)
    }

    fn parse_switch_statement(&mut self, position: CodePosition) -> StmtId {
        self.advance();
        let condition = self.parse_parenthesized_condition();
        let body = self.parse_block_statement();
        self.program
            .add_stmt(StmtKind::Switch { condition, body }, position)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::parse_source;
    use crate::ast::{ExprKind, ModifierKind, Operator, Program, StmtKind};

    fn body(program: &Program) -> Vec<&StmtKind> {
        let (_, _, function) = program.functions().next().expect("function");
        let StmtKind::Block(stmts) = &program.stmts[function.body.expect("body")].kind else {
            panic!("body is not a block");
        };
        stmts.iter().map(|&s| &program.stmts[s].kind).collect()
    }

    #[test]
    fn control_flow_statements() {
        let (program, sink) = parse_source(
            "void f(int n) {
                for (int i = 0; i < n; i++) { if (i == 2) continue; else break; }
                while (n > 0) n--;
                do { n += 1; } while (n < 10);
                switch (n) { case 1: discard; default: ; }
                return;
            }",
        );
        assert!(!sink.has_errors(), "{}", sink.output());
        let stmts = body(&program);
        assert!(matches!(
            stmts[0],
            StmtKind::For {
                init: Some(_),
                condition: Some(_),
                step: Some(_),
                ..
            }
        ));
        assert!(matches!(stmts[1], StmtKind::While { .. }));
        assert!(matches!(stmts[2], StmtKind::DoWhile { .. }));
        let StmtKind::Switch { body: switch_body, .. } = stmts[3] else {
            panic!("expected switch");
        };
        let StmtKind::Block(cases) = &program.stmts[*switch_body].kind else {
            panic!("switch body is a block");
        };
        assert_eq!(cases.len(), 4);
        assert!(matches!(stmts[4], StmtKind::Return(None)));
    }

    #[test]
    fn identifier_statements_disambiguate() {
        let (program, sink) = parse_source(
            "void f() { Light l; Buffer<float> b; Foo[2] arr; l.x = 1; b * c; g(l); }",
        );
        assert!(!sink.has_errors(), "{}", sink.output());
        let stmts = body(&program);
        assert!(matches!(stmts[0], StmtKind::VarDecl(_)));
        assert!(matches!(stmts[1], StmtKind::VarDecl(_)));
        assert!(matches!(stmts[2], StmtKind::VarDecl(_)));
        for stmt in &stmts[3..] {
            assert!(matches!(stmt, StmtKind::Expression(_)), "{stmt:?}");
        }
        let StmtKind::Expression(e) = stmts[4] else {
            unreachable!()
        };
        assert!(matches!(
            program.exprs[*e].kind,
            ExprKind::Operator {
                op: Operator::Mul,
                ..
            }
        ));
    }

    #[test]
    fn statement_modifiers_reach_local_declarations() {
        let (program, sink) = parse_source("void f() { const float k = 2.0; [unroll] for (;;) {} }");
        assert!(!sink.has_errors(), "{}", sink.output());
        let (_, _, function) = program.functions().next().expect("function");
        let StmtKind::Block(stmts) = &program.stmts[function.body.expect("body")].kind else {
            panic!("body is not a block");
        };
        let StmtKind::VarDecl(decls) = &program.stmts[stmts[0]].kind else {
            panic!("expected declaration");
        };
        assert!(program.decls[decls[0]].modifiers.has(&ModifierKind::Const));
        assert!(program.stmts[stmts[1]].modifiers.attribute("unroll").is_some());
    }

    #[test]
    fn declarations_are_recognized_by_parsing_a_type() {
        let (program, sink) = parse_source(
            "void f(int n, int m) {\n\
                 Map<Key<int>> table;\n\
                 Grid[n + 1][2] cells;\n\
                 n < m;\n\
                 cells[n] = 1;\n\
                 n < m >> 1;\n\
             }",
        );
        // Failed trial parses report nothing.
        assert!(sink.diagnostics().is_empty(), "{}", sink.output());
        let stmts = body(&program);
        assert!(matches!(stmts[0], StmtKind::VarDecl(_)), "{:?}", stmts[0]);
        assert!(matches!(stmts[1], StmtKind::VarDecl(_)), "{:?}", stmts[1]);
        for stmt in &stmts[2..] {
            assert!(matches!(stmt, StmtKind::Expression(_)), "{stmt:?}");
        }
        let mut names: Vec<_> = program
            .decls
            .iter()
            .map(|(_, d)| d.name.as_str())
            .collect();
        names.sort_unstable();
        assert_eq!(names, ["cells", "f", "m", "n", "table"]);
    }
}
