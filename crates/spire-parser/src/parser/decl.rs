//! Declarations: structs, typedefs, buffers, generics, traits, functions
//! and C-style declarator groups.

use spire_ir::{CodePosition, DiagnosticKind};

use super::{Container, Parser};
use crate::ast::{
    DeclId, DeclKind, ExprId, ExprKind, FunctionDecl, ModifierKind, Modifiers, StmtId, StmtKind,
    VarDecl, VarKind,
};
use crate::token::TokenType;

#[derive(Default)]
pub(super) struct Declarator {
    name: Option<(String, CodePosition)>,
    /// Array suffixes in source order; `None` for `[]`.
    array_dims: Vec<Option<ExprId>>,
}

pub(super) struct InitDeclarator {
    declarator: Declarator,
    semantics: Modifiers,
    init: Option<ExprId>,
}

impl Parser<'_, '_> {
    /// Parses one declaration and appends what it declares to `out`.
    ///
    /// Most declarations produce one entry; a declarator group produces one
    /// per declarator, `cbuffer` produces its anonymous struct and the
    /// buffer variable, and a stray `;` produces nothing.
    pub(super) fn parse_decl(&mut self, out: &mut Vec<DeclId>) {
        let modifiers = self.parse_modifiers();

        let decls = if self.advance_if(TokenType::Semicolon) {
            Vec::new()
        } else if self.look_ahead_word("struct") {
            vec![self.parse_struct(false)]
        } else if self.look_ahead_word("class") {
            vec![self.parse_struct(true)]
        } else if self.look_ahead_word("typedef") {
            vec![self.parse_typedef()]
        } else if self.look_ahead_word("using") {
            vec![self.parse_using()]
        } else if self.look_ahead_word("cbuffer") {
            vec![self.parse_buffer_decl("ConstantBuffer", out)]
        } else if self.look_ahead_word("tbuffer") {
            vec![self.parse_buffer_decl("TextureBuffer", out)]
        } else if self.look_ahead_word("__generic") {
            vec![self.parse_generic()]
        } else if self.look_ahead_word("__conforms") {
            vec![self.parse_conformance()]
        } else if self.look_ahead_word("__extension") {
            vec![self.parse_extension()]
        } else if self.look_ahead_word("__init") {
            vec![self.parse_constructor()]
        } else if self.look_ahead_word("__trait") {
            vec![self.parse_trait()]
        } else {
            self.parse_declarator_decl()
        };

        for &id in &decls {
            self.prepend_modifiers(id, &modifiers);
        }
        out.extend(decls);
    }

    pub(super) fn prepend_modifiers(&mut self, id: DeclId, modifiers: &Modifiers) {
        if modifiers.is_empty() {
            return;
        }
        let decl = &mut self.program.decls[id];
        let mut combined = modifiers.clone();
        combined.extend(&decl.modifiers);
        decl.modifiers = combined;
    }

    /// Parses exactly one declaration, as wrapped by `__generic`.
    fn parse_single_decl(&mut self) -> Option<DeclId> {
        let position = self.peek_position();
        let mut decls = Vec::new();
        self.parse_decl(&mut decls);
        if decls.len() > 1 {
            self.sink.diagnose(
                &position,
                DiagnosticKind::Unimplemented("didn't expect multiple declarations here".into()),
            );
        }
        decls.last().copied()
    }

    /// Member declarations between braces.
    fn parse_decl_body(&mut self, container: Container) -> Vec<DeclId> {
        let saved = std::mem::replace(&mut self.container, container);
        let mut members = Vec::new();
        self.read_token(TokenType::LBrace);
        while !self.advance_if_match(TokenType::RBrace) {
            let before = self.cursor.index();
            self.parse_decl(&mut members);
            self.try_recover_default();
            self.ensure_progress(before);
        }
        self.container = saved;
        members
    }

    // -----------------------------------------------------------------------
    // Type declarations
    // -----------------------------------------------------------------------

    fn parse_struct(&mut self, is_class: bool) -> DeclId {
        self.advance();
        let (name, position) = self.read_identifier();
        self.type_names.insert(name.clone());
        let is_intrinsic = !is_class && self.advance_if_word("__intrinsic");
        let members = self.parse_decl_body(Container::Struct);
        let kind = if is_class {
            DeclKind::Class { members }
        } else {
            DeclKind::Struct {
                members,
                is_intrinsic,
            }
        };
        self.add_decl(name, position, Modifiers::default(), kind)
    }

    fn parse_typedef(&mut self) -> DeclId {
        self.advance();
        let ty = self.parse_type();
        let (name, position) = self.read_identifier();
        self.read_token(TokenType::Semicolon);
        self.type_names.insert(name.clone());
        self.add_decl(name, position, Modifiers::default(), DeclKind::TypeDef { ty })
    }

    fn parse_using(&mut self) -> DeclId {
        let position = self.advance().position.clone();
        let token = self.read_token(TokenType::StringLiteral);
        let file = if token.ty == TokenType::StringLiteral {
            token.content.clone()
        } else {
            String::new()
        };
        self.read_token(TokenType::Semicolon);
        self.add_decl(
            file.clone(),
            position,
            Modifiers::default(),
            DeclKind::UsingFile { file },
        )
    }

    /// `cbuffer Name : register(b0) { fields }` declares an anonymous struct
    /// holding the fields and a transparent variable of type
    /// `ConstantBuffer<struct>` named `Name`. The struct goes straight to
    /// `out`; the variable is returned.
    fn parse_buffer_decl(&mut self, wrapper: &str, out: &mut Vec<DeclId>) -> DeclId {
        self.advance();
        let (name, position) = self.read_identifier();
        let struct_name = self.generate_anonymous_name();

        let mut modifiers = Modifiers::default();
        self.parse_optional_semantics(&mut modifiers);
        modifiers.push(ModifierKind::Transparent, position.clone());

        let members = self.parse_decl_body(Container::Struct);
        let struct_id = self.add_decl(
            struct_name.clone(),
            position.clone(),
            Modifiers::default(),
            DeclKind::Struct {
                members,
                is_intrinsic: false,
            },
        );
        out.push(struct_id);

        let base = self.program.add_expr(
            ExprKind::Var {
                name: wrapper.to_string(),
                component: None,
            },
            position.clone(),
        );
        let arg = self.program.add_expr(
            ExprKind::Var {
                name: struct_name,
                component: None,
            },
            position.clone(),
        );
        let ty = self.program.add_expr(
            ExprKind::GenericApp {
                base,
                args: vec![arg],
            },
            position.clone(),
        );
        let kind = self.var_kind();
        self.add_decl(
            name,
            position,
            modifiers,
            DeclKind::Variable(VarDecl {
                kind,
                ty,
                init: None,
            }),
        )
    }

    // -----------------------------------------------------------------------
    // Generics and traits
    // -----------------------------------------------------------------------

    fn parse_generic(&mut self) -> DeclId {
        let position = self.advance().position.clone();
        self.read_token(TokenType::OpLess);
        self.generic_depth += 1;
        let mut params = Vec::new();
        while !self.look_ahead(TokenType::OpGreater) && !self.look_ahead(TokenType::EndOfFile) {
            let before = self.cursor.index();
            params.push(self.parse_generic_param());
            if self.look_ahead(TokenType::OpGreater) {
                break;
            }
            self.read_token(TokenType::Comma);
            if self.cursor.index() == before {
                break;
            }
        }
        self.generic_depth -= 1;
        self.read_token(TokenType::OpGreater);

        let inner = self.parse_single_decl();
        let name = inner
            .map(|id| self.program.decls[id].name.clone())
            .unwrap_or_default();
        self.add_decl(
            name,
            position,
            Modifiers::default(),
            DeclKind::Generic { params, inner },
        )
    }

    /// `let N : int = 4` or `T : Constraint = Default`.
    fn parse_generic_param(&mut self) -> DeclId {
        if self.advance_if_word("let") {
            let (name, position) = self.read_identifier();
            let ty = if self.advance_if(TokenType::Colon) {
                Some(self.parse_type())
            } else {
                None
            };
            let init = if self.advance_if(TokenType::OpAssign) {
                Some(self.parse_arg_expression())
            } else {
                None
            };
            return self.add_decl(
                name,
                position,
                Modifiers::default(),
                DeclKind::GenericValueParam { ty, init },
            );
        }

        let (name, position) = self.read_identifier();
        self.type_names.insert(name.clone());
        let constraint = if self.advance_if(TokenType::Colon) {
            Some(self.parse_type())
        } else {
            None
        };
        let default = if self.advance_if(TokenType::OpAssign) {
            Some(self.parse_type())
        } else {
            None
        };
        self.add_decl(
            name,
            position,
            Modifiers::default(),
            DeclKind::GenericTypeParam {
                constraint,
                default,
            },
        )
    }

    fn parse_trait(&mut self) -> DeclId {
        self.advance();
        let (name, position) = self.read_identifier();
        self.type_names.insert(name.clone());
        let mut bases = Vec::new();
        if self.advance_if(TokenType::Colon) {
            loop {
                bases.push(self.parse_type());
                if !self.advance_if(TokenType::Comma) {
                    break;
                }
            }
        }
        let members = self.parse_decl_body(Container::Other);
        self.add_decl(
            name,
            position,
            Modifiers::default(),
            DeclKind::Trait { bases, members },
        )
    }

    fn parse_conformance(&mut self) -> DeclId {
        let position = self.advance().position.clone();
        let base = self.parse_type();
        self.read_token(TokenType::Semicolon);
        self.add_decl(
            String::new(),
            position,
            Modifiers::default(),
            DeclKind::TraitConformance { base },
        )
    }

    fn parse_extension(&mut self) -> DeclId {
        let position = self.advance().position.clone();
        let target = self.parse_type();
        let members = self.parse_decl_body(Container::Other);
        self.add_decl(
            String::new(),
            position,
            Modifiers::default(),
            DeclKind::Extension { target, members },
        )
    }

    fn parse_constructor(&mut self) -> DeclId {
        let token = self.advance();
        let (name, position) = (token.content.clone(), token.position.clone());
        self.read_token(TokenType::LParen);
        let params = self.parse_parameter_list();
        let body = if self.advance_if(TokenType::Semicolon) {
            None
        } else {
            Some(self.parse_function_body())
        };
        self.add_decl(
            name,
            position,
            Modifiers::default(),
            DeclKind::Constructor { params, body },
        )
    }

    // -----------------------------------------------------------------------
    // Declarators, variables and functions
    // -----------------------------------------------------------------------

    fn var_kind(&self) -> VarKind {
        match self.container {
            Container::Struct => VarKind::Field,
            Container::Program | Container::Other => VarKind::Variable,
        }
    }

    /// `Type declarator ...`: either a function or a group of variables.
    fn parse_declarator_decl(&mut self) -> Vec<DeclId> {
        let ty = self.parse_type();
        if matches!(self.program.exprs[ty].kind, ExprKind::Error)
            || self.advance_if(TokenType::Semicolon)
        {
            return Vec::new();
        }
        let first = self.parse_init_declarator(true);
        if first.init.is_none() && first.semantics.is_empty() && self.look_ahead(TokenType::LParen)
        {
            return vec![self.parse_function(ty, first.declarator)];
        }
        let kind = self.var_kind();
        self.parse_var_group(ty, first, kind)
    }

    /// Declarators after the first, separated by commas, up to `;`.
    pub(super) fn parse_var_group(
        &mut self,
        ty: ExprId,
        first: InitDeclarator,
        kind: VarKind,
    ) -> Vec<DeclId> {
        let mut decls = Vec::new();
        let mut current = first;
        loop {
            decls.push(self.make_variable(ty, current, kind));
            if self.advance_if(TokenType::Semicolon) {
                break;
            }
            if self.recovering {
                self.read_token(TokenType::Semicolon);
                break;
            }
            self.read_token(TokenType::Comma);
            if self.recovering {
                break;
            }
            current = self.parse_init_declarator(true);
        }
        decls
    }

    fn make_variable(&mut self, ty: ExprId, init_decl: InitDeclarator, kind: VarKind) -> DeclId {
        let type_position = self.program.exprs[ty].position.clone();
        let (name, position) = match init_decl.declarator.name {
            Some(named) => named,
            None => (self.generate_anonymous_name(), type_position),
        };
        let ty = self.wrap_array_type(ty, &init_decl.declarator.array_dims);
        self.add_decl(
            name,
            position,
            init_decl.semantics,
            DeclKind::Variable(VarDecl {
                kind,
                ty,
                init: init_decl.init,
            }),
        )
    }

    /// Applies array suffixes so that `T a[2][3]` has type
    /// `Index(Index(T, 3), 2)`.
    fn wrap_array_type(&mut self, ty: ExprId, dims: &[Option<ExprId>]) -> ExprId {
        let position = self.program.exprs[ty].position.clone();
        let mut wrapped = ty;
        for &index in dims.iter().rev() {
            wrapped = self.program.add_expr(
                ExprKind::Index {
                    base: wrapped,
                    index,
                },
                position.clone(),
            );
        }
        wrapped
    }

    pub(super) fn parse_init_declarator(&mut self, require_name: bool) -> InitDeclarator {
        let declarator = self.parse_declarator();
        if require_name && declarator.name.is_none() {
            self.unexpected_expecting(TokenType::Identifier);
        }
        let mut semantics = Modifiers::default();
        self.parse_optional_semantics(&mut semantics);
        let init = if self.advance_if(TokenType::OpAssign) {
            Some(self.parse_arg_expression())
        } else {
            None
        };
        InitDeclarator {
            declarator,
            semantics,
            init,
        }
    }

    /// Pointer stars (ignored), a name or a parenthesized declarator, then
    /// array suffixes.
    fn parse_declarator(&mut self) -> Declarator {
        while self.advance_if(TokenType::OpMul) {}

        let mut declarator = if self.look_ahead(TokenType::Identifier) {
            Declarator {
                name: Some(self.parse_decl_name()),
                array_dims: Vec::new(),
            }
        } else if self.look_ahead(TokenType::LParen)
            && self.cursor.peek_type_at(1) == TokenType::OpMul
        {
            self.advance();
            let inner = self.parse_declarator();
            self.read_token(TokenType::RParen);
            inner
        } else {
            Declarator::default()
        };

        while self.advance_if(TokenType::LBracket) {
            let size = if self.look_ahead(TokenType::RBracket) {
                None
            } else {
                Some(self.parse_expression())
            };
            self.read_token(TokenType::RBracket);
            declarator.array_dims.push(size);
        }
        declarator
    }

    /// An identifier, or `operator` followed by an operator token.
    fn parse_decl_name(&mut self) -> (String, CodePosition) {
        if !self.look_ahead_word("operator") {
            return self.read_identifier();
        }
        let position = self.advance().position.clone();
        let token = self.advance();
        use TokenType as T;
        let name = match token.ty {
            T::OpAdd
            | T::OpSub
            | T::OpMul
            | T::OpDiv
            | T::OpMod
            | T::OpNot
            | T::OpBitNot
            | T::OpLsh
            | T::OpRsh
            | T::OpEql
            | T::OpNeq
            | T::OpGreater
            | T::OpLess
            | T::OpGeq
            | T::OpLeq
            | T::OpAnd
            | T::OpOr
            | T::OpBitXor
            | T::OpBitAnd
            | T::OpBitOr
            | T::OpInc
            | T::OpDec
            | T::OpAddAssign
            | T::OpSubAssign
            | T::OpMulAssign
            | T::OpDivAssign
            | T::OpModAssign
            | T::OpShlAssign
            | T::OpShrAssign
            | T::OpOrAssign
            | T::OpAndAssign
            | T::OpXorAssign => token.content.clone(),
            T::QuestionMark => {
                self.read_token(T::Colon);
                "?:".to_string()
            }
            _ => {
                self.sink.diagnose(
                    &token.position,
                    DiagnosticKind::InvalidOperator(token.content.clone()),
                );
                token.content.clone()
            }
        };
        (name, position)
    }

    fn parse_function(&mut self, return_type: ExprId, declarator: Declarator) -> DeclId {
        let (name, position) = match declarator.name {
            Some(named) => named,
            None => (
                self.generate_anonymous_name(),
                self.program.exprs[return_type].position.clone(),
            ),
        };
        self.read_token(TokenType::LParen);
        let params = self.parse_parameter_list();
        let mut modifiers = Modifiers::default();
        self.parse_optional_semantics(&mut modifiers);
        let body = if self.advance_if(TokenType::Semicolon) {
            None
        } else {
            Some(self.parse_function_body())
        };
        self.add_decl(
            name,
            position,
            modifiers,
            DeclKind::Function(FunctionDecl {
                return_type,
                params,
                body,
                internal_name: None,
            }),
        )
    }

    /// Parameters after the opening parenthesis, through the closing one.
    fn parse_parameter_list(&mut self) -> Vec<DeclId> {
        let mut params = Vec::new();
        while !self.advance_if_match(TokenType::RParen) {
            let before = self.cursor.index();
            params.push(self.parse_parameter());
            if self.advance_if(TokenType::RParen) {
                break;
            }
            self.read_token(TokenType::Comma);
            if self.cursor.index() == before {
                break;
            }
        }
        params
    }

    fn parse_parameter(&mut self) -> DeclId {
        let mut modifiers = self.parse_modifiers();
        let ty = self.parse_type();
        let init_decl = self.parse_init_declarator(false);
        let type_position = self.program.exprs[ty].position.clone();
        let (name, position) = match init_decl.declarator.name {
            Some(named) => named,
            None => (self.generate_anonymous_name(), type_position),
        };
        let ty = self.wrap_array_type(ty, &init_decl.declarator.array_dims);
        modifiers.extend(&init_decl.semantics);
        self.add_decl(
            name,
            position,
            modifiers,
            DeclKind::Variable(VarDecl {
                kind: VarKind::Parameter,
                ty,
                init: init_decl.init,
            }),
        )
    }

    /// A function body: a block, or raw tokens in no-checking mode.
    fn parse_function_body(&mut self) -> StmtId {
        if !self.options.no_checking {
            return self.parse_block_statement();
        }
        let position = self.peek_position();
        let mut tokens = Vec::new();
        if !self.look_ahead(TokenType::LBrace) {
            self.read_token(TokenType::LBrace);
            return self.program.add_stmt(StmtKind::Unparsed(tokens), position);
        }
        self.advance();
        let mut depth = 1usize;
        loop {
            if self.cursor.is_at_end() {
                self.read_token(TokenType::RBrace);
                break;
            }
            let token = self.advance();
            match token.ty {
                TokenType::LBrace => depth += 1,
                TokenType::RBrace => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
            tokens.push(token.clone());
        }
        self.program.add_stmt(StmtKind::Unparsed(tokens), position)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::parse_source;
    use crate::ast::{DeclKind, ExprKind, ModifierKind, VarKind};

    #[test]
    fn cbuffer_desugars_to_struct_and_transparent_variable() {
        let (program, sink) =
            parse_source("cbuffer PerFrame : register(b0) { float4x4 view; float time; };");
        assert!(!sink.has_errors(), "{}", sink.output());
        assert_eq!(program.members.len(), 2);

        let record = &program.decls[program.members[0]];
        assert_eq!(record.name, "_anonymous_0");
        let DeclKind::Struct { members, .. } = &record.kind else {
            panic!("expected struct, got {:?}", record.kind);
        };
        assert_eq!(members.len(), 2);
        let field = program.decls[members[1]].as_variable().unwrap();
        assert_eq!(field.kind, VarKind::Field);

        let var = &program.decls[program.members[1]];
        assert_eq!(var.name, "PerFrame");
        assert!(var.modifiers.has(&ModifierKind::Transparent));
        let ty = var.as_variable().unwrap().ty;
        let ExprKind::GenericApp { base, args } = &program.exprs[ty].kind else {
            panic!("expected generic application");
        };
        assert!(matches!(&program.exprs[*base].kind, ExprKind::Var { name, .. } if name == "ConstantBuffer"));
        assert!(matches!(&program.exprs[args[0]].kind, ExprKind::Var { name, .. } if name == "_anonymous_0"));
    }

    #[test]
    fn typedef_introduces_type_name() {
        let (program, sink) = parse_source("typedef float4 Color; void f() { Color c; c = 1; }");
        assert!(!sink.has_errors(), "{}", sink.output());
        assert!(matches!(
            program.decls[program.members[0]].kind,
            DeclKind::TypeDef { .. }
        ));
    }

    #[test]
    fn generic_wraps_inner_declaration() {
        let (program, sink) = parse_source(
            "__generic<T : IArithmetic = float, let N : int = 4> T sum(T v[N]);",
        );
        assert!(!sink.has_errors(), "{}", sink.output());
        let generic = &program.decls[program.members[0]];
        assert_eq!(generic.name, "sum");
        let DeclKind::Generic { params, inner } = &generic.kind else {
            panic!("expected generic");
        };
        assert!(matches!(
            program.decls[params[0]].kind,
            DeclKind::GenericTypeParam {
                constraint: Some(_),
                default: Some(_)
            }
        ));
        assert!(matches!(
            program.decls[params[1]].kind,
            DeclKind::GenericValueParam {
                ty: Some(_),
                init: Some(_)
            }
        ));
        let inner = inner.unwrap();
        let f = program.decls[inner].as_function().unwrap();
        assert!(f.body.is_none());
        let param = program.decls[f.params[0]].as_variable().unwrap();
        assert_eq!(param.kind, VarKind::Parameter);
        assert!(matches!(program.exprs[param.ty].kind, ExprKind::Index { index: Some(_), .. }));
    }

    #[test]
    fn traits_extensions_and_constructors() {
        let (program, sink) = parse_source(
            "__trait IShape : IBase, IOther { float area(); }\n\
             __extension float3 { __conforms IShape; float area() { return 0.0; } }\n\
             struct Box { float w; __init(float width) { w = width; } };",
        );
        assert!(!sink.has_errors(), "{}", sink.output());
        let kinds: Vec<_> = program
            .members
            .iter()
            .map(|&id| &program.decls[id].kind)
            .collect();
        assert!(matches!(kinds[0], DeclKind::Trait { bases, members } if bases.len() == 2 && members.len() == 1));
        assert!(matches!(kinds[1], DeclKind::Extension { members, .. } if members.len() == 2));
        let DeclKind::Struct { members, .. } = kinds[2] else {
            panic!("expected struct");
        };
        assert!(matches!(
            program.decls[members[1]].kind,
            DeclKind::Constructor { body: Some(_), .. }
        ));
    }

    #[test]
    fn declarator_groups_and_arrays() {
        let (program, sink) = parse_source("float a = 1.0, b[2][3], *c;");
        assert!(!sink.has_errors(), "{}", sink.output());
        let names: Vec<_> = program
            .members
            .iter()
            .map(|&id| program.decls[id].name.as_str())
            .collect();
        assert_eq!(names, ["a", "b", "c"]);
        let b = program.decls[program.members[1]].as_variable().unwrap();
        let ExprKind::Index { base, index } = &program.exprs[b.ty].kind else {
            panic!("expected array type");
        };
        assert!(matches!(
            program.exprs[index.unwrap()].kind,
            ExprKind::Constant(crate::ast::ConstantValue::Int(2))
        ));
        assert!(matches!(program.exprs[*base].kind, ExprKind::Index { .. }));
    }

    #[test]
    fn operator_names() {
        let (program, sink) = parse_source(
            "float3 operator+(float3 a, float3 b); float operator?:(bool c, float a, float b);",
        );
        assert!(!sink.has_errors(), "{}", sink.output());
        assert_eq!(program.decls[program.members[0]].name, "+");
        assert_eq!(program.decls[program.members[1]].name, "?:");

        let (_, sink) = parse_source("float operator;(float a);");
        assert!(matches!(
            sink.diagnostics()[0].kind,
            spire_ir::DiagnosticKind::InvalidOperator(_)
        ));
    }

    #[test]
    fn function_semantics_and_using() {
        let (program, sink) =
            parse_source("using \"lib.spire\";\nfloat4 main(float2 uv : TEXCOORD0) : SV_Target { return 0.0; }");
        assert!(!sink.has_errors(), "{}", sink.output());
        assert!(matches!(
            &program.decls[program.members[0]].kind,
            DeclKind::UsingFile { file } if file == "lib.spire"
        ));
        let main = &program.decls[program.members[1]];
        assert!(main.modifiers.has(&ModifierKind::Semantic("SV_Target".into())));
        let f = main.as_function().unwrap();
        assert!(program.decls[f.params[0]]
            .modifiers
            .has(&ModifierKind::Semantic("TEXCOORD0".into())));
    }
}
