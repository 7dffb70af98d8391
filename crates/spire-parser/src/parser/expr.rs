//! Expressions and type expressions.

use spire_ir::{CodePosition, DiagnosticKind};

use super::{MAX_NESTING, Parser, describe, parse_int_literal};
use crate::ast::{ConstantValue, ExprId, ExprKind, Operator};
use crate::token::TokenType;

/// Binding strength, loosest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Comma,
    Assignment,
    Ternary,
    LogicalOr,
    LogicalAnd,
    BitOr,
    BitXor,
    BitAnd,
    Equality,
    Relational,
    Shift,
    Additive,
    Multiplicative,
    Prefix,
    Postfix,
}

impl Precedence {
    fn tighter(self) -> Self {
        use Precedence::*;
        match self {
            Comma => Assignment,
            Assignment => Ternary,
            Ternary => LogicalOr,
            LogicalOr => LogicalAnd,
            LogicalAnd => BitOr,
            BitOr => BitXor,
            BitXor => BitAnd,
            BitAnd => Equality,
            Equality => Relational,
            Relational => Shift,
            Shift => Additive,
            Additive => Multiplicative,
            Multiplicative => Prefix,
            Prefix | Postfix => Postfix,
        }
    }
}

impl Parser<'_, '_> {
    /// The binary operator spelled by `ty` and its level. Inside generic
    /// argument lists `>`, `>=` and `>>` are not operators.
    fn binary_operator(&self, ty: TokenType) -> Option<(Operator, Precedence)> {
        use Operator as O;
        use Precedence as P;
        use TokenType as T;
        let in_generic = self.generic_depth > 0;
        Some(match ty {
            T::Comma => (O::Sequence, P::Comma),
            T::OpAssign => (O::Assign, P::Assignment),
            T::OpAddAssign => (O::AddAssign, P::Assignment),
            T::OpSubAssign => (O::SubAssign, P::Assignment),
            T::OpMulAssign => (O::MulAssign, P::Assignment),
            T::OpDivAssign => (O::DivAssign, P::Assignment),
            T::OpModAssign => (O::ModAssign, P::Assignment),
            T::OpShlAssign => (O::LshAssign, P::Assignment),
            T::OpShrAssign => (O::RshAssign, P::Assignment),
            T::OpOrAssign => (O::OrAssign, P::Assignment),
            T::OpAndAssign => (O::AndAssign, P::Assignment),
            T::OpXorAssign => (O::XorAssign, P::Assignment),
            T::OpOr => (O::Or, P::LogicalOr),
            T::OpAnd => (O::And, P::LogicalAnd),
            T::OpBitOr => (O::BitOr, P::BitOr),
            T::OpBitXor => (O::BitXor, P::BitXor),
            T::OpBitAnd => (O::BitAnd, P::BitAnd),
            T::OpEql => (O::Eql, P::Equality),
            T::OpNeq => (O::Neq, P::Equality),
            T::OpGreater | T::OpGeq | T::OpRsh if in_generic => return None,
            T::OpGreater => (O::Greater, P::Relational),
            T::OpGeq => (O::Geq, P::Relational),
            T::OpLess => (O::Less, P::Relational),
            T::OpLeq => (O::Leq, P::Relational),
            T::OpLsh => (O::Lsh, P::Shift),
            T::OpRsh => (O::Rsh, P::Shift),
            T::OpAdd => (O::Add, P::Additive),
            T::OpSub => (O::Sub, P::Additive),
            T::OpMul => (O::Mul, P::Multiplicative),
            T::OpDiv => (O::Div, P::Multiplicative),
            T::OpMod => (O::Mod, P::Multiplicative),
            _ => return None,
        })
    }

    /// A full expression, including the comma operator.
    pub(super) fn parse_expression(&mut self) -> ExprId {
        self.parse_expression_at(Precedence::Comma)
    }

    /// An expression that stops at a comma: initializers, call and
    /// generic arguments.
    pub(super) fn parse_arg_expression(&mut self) -> ExprId {
        self.parse_expression_at(Precedence::Assignment)
    }

    fn parse_expression_at(&mut self, level: Precedence) -> ExprId {
        match level {
            Precedence::Prefix | Precedence::Postfix => self.parse_leaf_expression(),
            Precedence::Ternary => {
                let condition = self.parse_expression_at(level.tighter());
                if !self.look_ahead(TokenType::QuestionMark) {
                    return condition;
                }
                let position = self.advance().position.clone();
                let accept = self.parse_expression_at(level);
                self.read_token(TokenType::Colon);
                let reject = self.parse_expression_at(level);
                self.program.add_expr(
                    ExprKind::Select {
                        condition,
                        accept,
                        reject,
                    },
                    position,
                )
            }
            Precedence::Assignment => {
                let left = self.parse_expression_at(level.tighter());
                match self.binary_operator(self.peek_type()) {
                    Some((op, found)) if found == level => {
                        let position = self.advance().position.clone();
                        let right = self.parse_expression_at(level);
                        self.program.add_expr(
                            ExprKind::Operator {
                                op,
                                args: vec![left, right],
                            },
                            position,
                        )
                    }
                    _ => left,
                }
            }
            _ => {
                let mut left = self.parse_expression_at(level.tighter());
                loop {
                    let op = match self.binary_operator(self.peek_type()) {
                        Some((op, found)) if found == level => op,
                        _ => return left,
                    };
                    let position = self.advance().position.clone();
                    let right = self.parse_expression_at(level.tighter());
                    left = self.program.add_expr(
                        ExprKind::Operator {
                            op,
                            args: vec![left, right],
                        },
                        position,
                    );
                }
            }
        }
    }

    fn parse_leaf_expression(&mut self) -> ExprId {
        if self.nesting >= MAX_NESTING {
            let position = self.peek_position();
            self.unexpected(DiagnosticKind::SyntaxError);
            return self.error_expr(position);
        }
        self.nesting += 1;
        let expr = self.parse_leaf_inner();
        self.nesting -= 1;
        expr
    }

    fn parse_leaf_inner(&mut self) -> ExprId {
        let position = self.peek_position();
        let prefix = match self.peek_type() {
            TokenType::OpInc => Some(Operator::PreInc),
            TokenType::OpDec => Some(Operator::PreDec),
            TokenType::OpNot => Some(Operator::Not),
            TokenType::OpBitNot => Some(Operator::BitNot),
            TokenType::OpSub => Some(Operator::Neg),
            _ => None,
        };
        if let Some(op) = prefix {
            self.advance();
            let operand = self.parse_leaf_expression();
            return self.program.add_expr(
                ExprKind::Operator {
                    op,
                    args: vec![operand],
                },
                position,
            );
        }

        let primary = match self.peek_type() {
            TokenType::LParen => {
                self.advance();
                if self.look_ahead_type_name() && self.cursor.peek_type_at(1) == TokenType::RParen
                {
                    let target = self.parse_type();
                    self.read_token(TokenType::RParen);
                    let expr = self.parse_expression_at(Precedence::Multiplicative);
                    return self
                        .program
                        .add_expr(ExprKind::TypeCast { target, expr }, position);
                }
                let inner = self.parse_expression();
                self.read_token(TokenType::RParen);
                inner
            }
            TokenType::LBrace => self.parse_initializer_list(position.clone()),
            TokenType::IntLiteral => {
                let value = parse_int_literal(&self.advance().content);
                self.program
                    .add_expr(ExprKind::Constant(ConstantValue::Int(value)), position.clone())
            }
            TokenType::DoubleLiteral => {
                let value = self.advance().content.parse::<f32>().unwrap_or(0.0);
                self.program.add_expr(
                    ExprKind::Constant(ConstantValue::Float(value)),
                    position.clone(),
                )
            }
            TokenType::Identifier => self.parse_identifier_expression(position.clone()),
            _ => {
                let found = describe(self.peek());
                log::trace!("no expression starts with {found}");
                self.unexpected(DiagnosticKind::SyntaxError);
                return self.error_expr(position);
            }
        };
        self.parse_postfix(primary)
    }

    fn parse_identifier_expression(&mut self, position: CodePosition) -> ExprId {
        let token = self.advance();
        match token.content.as_str() {
            "true" => {
                return self
                    .program
                    .add_expr(ExprKind::Constant(ConstantValue::Bool(true)), position);
            }
            "false" => {
                return self
                    .program
                    .add_expr(ExprKind::Constant(ConstantValue::Bool(false)), position);
            }
            _ => {}
        }
        let var = self.program.add_expr(
            ExprKind::Var {
                name: token.content.clone(),
                component: None,
            },
            position.clone(),
        );
        let generic = self.type_names.contains(&token.content) || self.generic_depth > 0;
        if generic && self.look_ahead(TokenType::OpLess) {
            return self.parse_generic_app(var, position);
        }
        var
    }

    fn parse_initializer_list(&mut self, position: CodePosition) -> ExprId {
        self.advance();
        let mut items = Vec::new();
        while !self.advance_if_match(TokenType::RBrace) {
            let before = self.cursor.index();
            items.push(self.parse_arg_expression());
            if self.advance_if(TokenType::RBrace) {
                break;
            }
            self.read_token(TokenType::Comma);
            if self.cursor.index() == before {
                break;
            }
        }
        self.program
            .add_expr(ExprKind::InitializerList(items), position)
    }

    fn parse_postfix(&mut self, mut expr: ExprId) -> ExprId {
        loop {
            let position = self.peek_position();
            let kind = match self.peek_type() {
                TokenType::OpInc | TokenType::OpDec => {
                    let op = if self.advance().ty == TokenType::OpInc {
                        Operator::PostInc
                    } else {
                        Operator::PostDec
                    };
                    ExprKind::Operator {
                        op,
                        args: vec![expr],
                    }
                }
                TokenType::LBracket => {
                    self.advance();
                    let index = self.parse_expression();
                    self.read_token(TokenType::RBracket);
                    ExprKind::Index {
                        base: expr,
                        index: Some(index),
                    }
                }
                TokenType::LParen => {
                    self.advance();
                    let args = self.parse_call_arguments();
                    ExprKind::Invoke {
                        function: expr,
                        args,
                        callee: None,
                    }
                }
                TokenType::Dot => {
                    self.advance();
                    let (member, _) = self.read_identifier();
                    ExprKind::Member {
                        base: expr,
                        member,
                        component: None,
                    }
                }
                _ => return expr,
            };
            expr = self.program.add_expr(kind, position);
        }
    }

    /// Arguments after `(`, through the closing `)`.
    fn parse_call_arguments(&mut self) -> Vec<ExprId> {
        let mut args = Vec::new();
        while !self.advance_if_match(TokenType::RParen) {
            let before = self.cursor.index();
            args.push(self.parse_arg_expression());
            if self.advance_if(TokenType::RParen) {
                break;
            }
            self.read_token(TokenType::Comma);
            if self.cursor.index() == before {
                break;
            }
        }
        args
    }

    // -----------------------------------------------------------------------
    // Types
    // -----------------------------------------------------------------------

    /// A type: a name, optional generic arguments, optional array suffixes.
    pub(super) fn parse_type(&mut self) -> ExprId {
        let position = self.peek_position();
        if !self.look_ahead(TokenType::Identifier) {
            let found = describe(self.peek());
            self.unexpected(DiagnosticKind::TypeNameExpected(found));
            return self.error_expr(position);
        }
        let name = self.advance().content.clone();
        let mut ty = self.program.add_expr(
            ExprKind::Var {
                name,
                component: None,
            },
            position.clone(),
        );
        if self.look_ahead(TokenType::OpLess) {
            ty = self.parse_generic_app(ty, position.clone());
        }
        while self.advance_if(TokenType::LBracket) {
            let index = if self.look_ahead(TokenType::RBracket) {
                None
            } else {
                Some(self.parse_expression())
            };
            self.read_token(TokenType::RBracket);
            ty = self
                .program
                .add_expr(ExprKind::Index { base: ty, index }, position.clone());
        }
        ty
    }

    /// `<args>` after `base`. A `>>` closing two lists at once is split.
    fn parse_generic_app(&mut self, base: ExprId, position: CodePosition) -> ExprId {
        self.read_token(TokenType::OpLess);
        self.generic_depth += 1;
        let mut args = Vec::new();
        while !self.look_ahead(TokenType::OpGreater)
            && !self.look_ahead(TokenType::OpRsh)
            && !self.look_ahead(TokenType::EndOfFile)
        {
            let before = self.cursor.index();
            args.push(self.parse_arg_expression());
            if !self.advance_if(TokenType::Comma) || self.cursor.index() == before {
                break;
            }
        }
        self.generic_depth -= 1;
        self.read_generic_close();
        self.program
            .add_expr(ExprKind::GenericApp { base, args }, position)
    }

    fn read_generic_close(&mut self) {
        if self.split_greater.is_none() && self.cursor.peek_type() == TokenType::OpRsh {
            self.split_greater = Some(self.cursor.advance());
            self.recovering = false;
        } else {
            self.read_token(TokenType::OpGreater);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::parse_source;
    use crate::ast::{ConstantValue, ExprId, ExprKind, Operator, Program, StmtKind};

    /// The expression of the single `return` in the first function.
    fn returned(program: &Program) -> ExprId {
        let (_, _, function) = program.functions().next().expect("function");
        let StmtKind::Block(stmts) = &program.stmts[function.body.expect("body")].kind else {
            panic!("body is not a block");
        };
        let StmtKind::Return(Some(value)) = program.stmts[stmts[0]].kind else {
            panic!("expected return");
        };
        value
    }

    fn op(program: &Program, id: ExprId) -> (Operator, Vec<ExprId>) {
        match &program.exprs[id].kind {
            ExprKind::Operator { op, args } => (*op, args.clone()),
            other => panic!("expected operator, got {other:?}"),
        }
    }

    fn returned_of(source: &str) -> (Program, ExprId) {
        let (program, sink) = parse_source(source);
        assert!(!sink.has_errors(), "{}", sink.output());
        let value = returned(&program);
        (program, value)
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let (program, value) = returned_of("int f() { return a + b * c - d; }");
        let (sub, args) = op(&program, value);
        assert_eq!(sub, Operator::Sub);
        let (add, add_args) = op(&program, args[0]);
        assert_eq!(add, Operator::Add);
        assert_eq!(op(&program, add_args[1]).0, Operator::Mul);
    }

    #[test]
    fn ternary_and_logical_levels() {
        let (program, value) = returned_of("int f() { return a || b && c ? x : y ? z : w; }");
        let ExprKind::Select {
            condition, reject, ..
        } = &program.exprs[value].kind
        else {
            panic!("expected select");
        };
        let (or, args) = op(&program, *condition);
        assert_eq!(or, Operator::Or);
        assert_eq!(op(&program, args[1]).0, Operator::And);
        assert!(matches!(program.exprs[*reject].kind, ExprKind::Select { .. }));
    }

    #[test]
    fn prefix_postfix_and_casts() {
        let (program, value) = returned_of("float f() { return -(float)x.y * ++i + a[2](t)--; }");
        let (add, args) = op(&program, value);
        assert_eq!(add, Operator::Add);
        let (neg, neg_args) = op(&program, args[0]);
        assert_eq!(neg, Operator::Neg);
        let ExprKind::TypeCast { expr, .. } = &program.exprs[neg_args[0]].kind else {
            panic!("expected cast");
        };
        assert_eq!(op(&program, *expr).0, Operator::Mul);
        let (post, post_args) = op(&program, args[1]);
        assert_eq!(post, Operator::PostDec);
        assert!(matches!(
            program.exprs[post_args[0]].kind,
            ExprKind::Invoke { .. }
        ));
    }

    #[test]
    fn literals() {
        let (program, value) = returned_of("int f() { return {0x10, 2.5, true, 3u,}; }");
        let ExprKind::InitializerList(items) = &program.exprs[value].kind else {
            panic!("expected initializer list");
        };
        let values: Vec<_> = items
            .iter()
            .map(|&i| match program.exprs[i].kind {
                ExprKind::Constant(c) => c,
                _ => panic!("expected constant"),
            })
            .collect();
        assert_eq!(
            values,
            [
                ConstantValue::Int(16),
                ConstantValue::Float(2.5),
                ConstantValue::Bool(true),
                ConstantValue::Int(3),
            ]
        );
    }

    #[test]
    fn comma_is_lowest() {
        let (program, value) = returned_of("int f() { return a = 1, b; }");
        let (seq, args) = op(&program, value);
        assert_eq!(seq, Operator::Sequence);
        assert_eq!(op(&program, args[0]).0, Operator::Assign);
    }

    #[test]
    fn missing_operand_is_one_syntax_error() {
        let (program, sink) = parse_source("int f() { return 1 + ; }");
        assert_eq!(sink.error_count(), 1, "{}", sink.output());
        assert_eq!(
            sink.diagnostics()[0].kind,
            spire_ir::DiagnosticKind::SyntaxError
        );
        let (_, args) = op(&program, returned(&program));
        assert!(matches!(program.exprs[args[1]].kind, ExprKind::Error));
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let source = format!("int f() {{ return {}1{}; }}", "(".repeat(500), ")".repeat(500));
        let (_, sink) = parse_source(&source);
        assert_eq!(sink.error_count(), 1, "{}", sink.output());
    }
}
