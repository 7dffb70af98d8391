//! Syntax tree.
//!
//! Nodes live in three arenas owned by [`Program`]: declarations, statements
//! and expressions. Parents own their children through handles, so the tree
//! has no back-pointers; the lexical parent of a declaration is answered by
//! the [`ScopeTable`] built after parsing.
//!
//! Expressions carry annotation slots (`ty`, component references, callee
//! resolution, import bindings). The parser leaves them empty; the semantic
//! checker fills them in before code generation.

mod display;
mod scope;
mod visit;

pub use display::{dump_ast, format_expr};
pub use scope::ScopeTable;
pub use visit::{walk_expr, walk_stmt_exprs};

use spire_ir::{Arena, CodePosition, Handle, IlType, ParameterQualifier};

use crate::token::Token;

pub type DeclId = Handle<Decl>;
pub type StmtId = Handle<Stmt>;
pub type ExprId = Handle<Expr>;

// ---------------------------------------------------------------------------
// Modifiers
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub enum ModifierKind {
    In,
    Input,
    Out,
    InOut,
    Const,
    Instance,
    Builtin,
    Intrinsic,
    Inline,
    Public,
    Require,
    Param,
    Extern,
    RowMajor,
    ColumnMajor,
    NoInterpolation,
    Linear,
    Sample,
    Centroid,
    Precise,
    Shared,
    GroupShared,
    Static,
    Uniform,
    Volatile,
    Point,
    Line,
    Triangle,
    LineAdj,
    TriangleAdj,
    /// `layout(binding = 0, std140)`, kept as normalized text.
    Layout(String),
    /// `[name(args)]`.
    Attribute { name: String, args: Vec<ExprId> },
    /// `__builtin_type(N)`.
    BuiltinType(i32),
    /// `__magic_type(Name, N)`.
    MagicType { name: String, tag: u32 },
    /// `: SV_Target`.
    Semantic(String),
    /// `: register(t0, space1)`.
    Register {
        register: String,
        space: Option<String>,
        mask: Option<String>,
    },
    /// `: packoffset(c0.x)`.
    PackOffset { register: String, mask: Option<String> },
    /// Members of the declared variable are visible in the enclosing scope.
    Transparent,
    /// Declared by the standard library unit.
    FromStdLib,
}

impl ModifierKind {
    /// Parses a plain keyword modifier such as `inout` or `uniform`.
    pub fn from_keyword(word: &str) -> Option<Self> {
        Some(match word {
            "in" => Self::In,
            "input" => Self::Input,
            "out" => Self::Out,
            "inout" => Self::InOut,
            "const" => Self::Const,
            "instance" => Self::Instance,
            "__builtin" => Self::Builtin,
            "__intrinsic" => Self::Intrinsic,
            "inline" => Self::Inline,
            "public" => Self::Public,
            "require" => Self::Require,
            "param" => Self::Param,
            "extern" => Self::Extern,
            "row_major" => Self::RowMajor,
            "column_major" => Self::ColumnMajor,
            "nointerpolation" => Self::NoInterpolation,
            "linear" => Self::Linear,
            "sample" => Self::Sample,
            "centroid" => Self::Centroid,
            "precise" => Self::Precise,
            "shared" => Self::Shared,
            "groupshared" => Self::GroupShared,
            "static" => Self::Static,
            "uniform" => Self::Uniform,
            "volatile" => Self::Volatile,
            "point" => Self::Point,
            "line" => Self::Line,
            "triangle" => Self::Triangle,
            "lineadj" => Self::LineAdj,
            "triangleadj" => Self::TriangleAdj,
            _ => return None,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Modifier {
    pub kind: ModifierKind,
    pub position: CodePosition,
}

/// Modifier list with the queries the later phases need.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Modifiers(pub Vec<Modifier>);

impl Modifiers {
    pub fn has(&self, kind: &ModifierKind) -> bool {
        self.0.iter().any(|m| &m.kind == kind)
    }

    pub fn push(&mut self, kind: ModifierKind, position: CodePosition) {
        self.0.push(Modifier { kind, position });
    }

    pub fn extend(&mut self, other: &Modifiers) {
        self.0.extend(other.0.iter().cloned());
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Modifier> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parameter passing mode. `inout` wins over `out`.
    pub fn qualifier(&self) -> ParameterQualifier {
        if self.has(&ModifierKind::InOut) {
            ParameterQualifier::InOut
        } else if self.has(&ModifierKind::Out) {
            ParameterQualifier::Out
        } else {
            ParameterQualifier::In
        }
    }

    /// Whether the declaration writes through this parameter.
    pub fn is_out(&self) -> bool {
        self.qualifier() != ParameterQualifier::In
    }

    /// The `[name(...)]` attribute called `name`, if present.
    pub fn attribute(&self, name: &str) -> Option<&[ExprId]> {
        self.0.iter().find_map(|m| match &m.kind {
            ModifierKind::Attribute { name: n, args } if n == name => Some(args.as_slice()),
            _ => None,
        })
    }
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VarKind {
    /// Global or local variable.
    Variable,
    /// Struct or class field.
    Field,
    /// Function or constructor parameter.
    Parameter,
}

#[derive(Clone, Debug)]
pub struct VarDecl {
    pub kind: VarKind,
    /// Type expression. Declarations of one group share it.
    pub ty: ExprId,
    pub init: Option<ExprId>,
}

#[derive(Clone, Debug)]
pub struct FunctionDecl {
    pub return_type: ExprId,
    pub params: Vec<DeclId>,
    /// `None` for a declaration without a body.
    pub body: Option<StmtId>,
    /// Overload-unique name assigned by the semantic checker.
    pub internal_name: Option<String>,
}

#[derive(Clone, Debug)]
pub enum DeclKind {
    Variable(VarDecl),
    Function(FunctionDecl),
    Struct {
        members: Vec<DeclId>,
        is_intrinsic: bool,
    },
    Class {
        members: Vec<DeclId>,
    },
    TypeDef {
        ty: ExprId,
    },
    /// `using "file";`
    UsingFile {
        file: String,
    },
    Generic {
        params: Vec<DeclId>,
        inner: Option<DeclId>,
    },
    GenericTypeParam {
        constraint: Option<ExprId>,
        default: Option<ExprId>,
    },
    GenericValueParam {
        ty: Option<ExprId>,
        init: Option<ExprId>,
    },
    Trait {
        bases: Vec<ExprId>,
        members: Vec<DeclId>,
    },
    TraitConformance {
        base: ExprId,
    },
    Extension {
        target: ExprId,
        members: Vec<DeclId>,
    },
    Constructor {
        params: Vec<DeclId>,
        body: Option<StmtId>,
    },
}

#[derive(Clone, Debug)]
pub struct Decl {
    pub name: String,
    pub position: CodePosition,
    pub modifiers: Modifiers,
    pub kind: DeclKind,
}

impl Decl {
    /// Child declarations, for container kinds.
    pub fn members(&self) -> &[DeclId] {
        match &self.kind {
            DeclKind::Struct { members, .. }
            | DeclKind::Class { members }
            | DeclKind::Trait { members, .. }
            | DeclKind::Extension { members, .. } => members,
            DeclKind::Function(f) => &f.params,
            DeclKind::Constructor { params, .. } => params,
            DeclKind::Generic { params, .. } => params,
            _ => &[],
        }
    }

    pub fn is_extern(&self) -> bool {
        self.modifiers.has(&ModifierKind::Extern)
    }

    pub fn as_function(&self) -> Option<&FunctionDecl> {
        match &self.kind {
            DeclKind::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_variable(&self) -> Option<&VarDecl> {
        match &self.kind {
            DeclKind::Variable(v) => Some(v),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub enum StmtKind {
    Block(Vec<StmtId>),
    Empty,
    /// Local declarations, one entry per declarator.
    VarDecl(Vec<DeclId>),
    If {
        condition: ExprId,
        accept: StmtId,
        reject: Option<StmtId>,
    },
    For {
        init: Option<StmtId>,
        condition: Option<ExprId>,
        step: Option<ExprId>,
        body: StmtId,
    },
    While {
        condition: ExprId,
        body: StmtId,
    },
    DoWhile {
        body: StmtId,
        condition: ExprId,
    },
    Break,
    Continue,
    Return(Option<ExprId>),
    Discard,
    Expression(ExprId),
    Switch {
        condition: ExprId,
        body: StmtId,
    },
    Case(ExprId),
    Default,
    /// A function body kept as raw tokens in no-checking mode.
    Unparsed(Vec<Token>),
}

#[derive(Clone, Debug)]
pub struct Stmt {
    pub position: CodePosition,
    pub modifiers: Modifiers,
    pub kind: StmtKind,
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operator {
    Neg,
    Not,
    BitNot,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
    Mul,
    Div,
    Mod,
    Add,
    Sub,
    Lsh,
    Rsh,
    Eql,
    Neq,
    Greater,
    Less,
    Geq,
    Leq,
    BitAnd,
    BitXor,
    BitOr,
    And,
    Or,
    Sequence,
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    LshAssign,
    RshAssign,
    OrAssign,
    AndAssign,
    XorAssign,
}

impl Operator {
    /// The binary operator a compound assignment applies before storing.
    pub fn compound_base(self) -> Option<Operator> {
        Some(match self {
            Self::AddAssign => Self::Add,
            Self::SubAssign => Self::Sub,
            Self::MulAssign => Self::Mul,
            Self::DivAssign => Self::Div,
            Self::ModAssign => Self::Mod,
            Self::LshAssign => Self::Lsh,
            Self::RshAssign => Self::Rsh,
            Self::OrAssign => Self::BitOr,
            Self::AndAssign => Self::BitAnd,
            Self::XorAssign => Self::BitXor,
            _ => return None,
        })
    }

    pub fn is_assignment(self) -> bool {
        self == Self::Assign || self.compound_base().is_some()
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Neg | Self::Sub => "-",
            Self::Not => "!",
            Self::BitNot => "~",
            Self::PreInc | Self::PostInc => "++",
            Self::PreDec | Self::PostDec => "--",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Add => "+",
            Self::Lsh => "<<",
            Self::Rsh => ">>",
            Self::Eql => "==",
            Self::Neq => "!=",
            Self::Greater => ">",
            Self::Less => "<",
            Self::Geq => ">=",
            Self::Leq => "<=",
            Self::BitAnd => "&",
            Self::BitXor => "^",
            Self::BitOr => "|",
            Self::And => "&&",
            Self::Or => "||",
            Self::Sequence => ",",
            Self::Assign => "=",
            Self::AddAssign => "+=",
            Self::SubAssign => "-=",
            Self::MulAssign => "*=",
            Self::DivAssign => "/=",
            Self::ModAssign => "%=",
            Self::LshAssign => "<<=",
            Self::RshAssign => ">>=",
            Self::OrAssign => "|=",
            Self::AndAssign => "&=",
            Self::XorAssign => "^=",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ConstantValue {
    Int(i64),
    Float(f32),
    Bool(bool),
}

/// A resolved call target, filled in by the semantic checker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Callee {
    Function {
        name: String,
        internal_name: String,
        is_extern: bool,
        /// Any parameter is `out` or `inout`.
        has_out_param: bool,
    },
    /// A component used as a function, by unique component name.
    Component(String),
}

#[derive(Clone, Debug)]
pub enum ExprKind {
    Constant(ConstantValue),
    Var {
        name: String,
        /// Unique name of the component this identifier refers to.
        component: Option<String>,
    },
    Operator {
        op: Operator,
        args: Vec<ExprId>,
    },
    Select {
        condition: ExprId,
        accept: ExprId,
        reject: ExprId,
    },
    Invoke {
        function: ExprId,
        args: Vec<ExprId>,
        callee: Option<Callee>,
    },
    Member {
        base: ExprId,
        member: String,
        component: Option<String>,
    },
    /// `base[index]`; also array type suffixes, where the index may be empty.
    Index {
        base: ExprId,
        index: Option<ExprId>,
    },
    TypeCast {
        target: ExprId,
        expr: ExprId,
    },
    GenericApp {
        base: ExprId,
        args: Vec<ExprId>,
    },
    InitializerList(Vec<ExprId>),
    /// Moves a value across worlds through an import operator.
    Import {
        operator: String,
        /// Unique name of the component being imported.
        component: String,
        args: Vec<ExprId>,
    },
    /// Reads the imported component inside an import operator body.
    Project {
        base: ExprId,
    },
    /// Placeholder for an expression that failed to parse.
    Error,
}

#[derive(Clone, Debug)]
pub struct Expr {
    pub position: CodePosition,
    pub kind: ExprKind,
    /// Checked type. For type expressions, the type they denote.
    pub ty: Option<IlType>,
}

impl Expr {
    pub fn new(kind: ExprKind, position: CodePosition) -> Self {
        Self {
            position,
            kind,
            ty: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Program
// ---------------------------------------------------------------------------

/// One parsed translation unit.
#[derive(Clone, Debug, Default)]
pub struct Program {
    pub file_name: String,
    pub position: CodePosition,
    /// Top-level declarations in source order.
    pub members: Vec<DeclId>,
    pub decls: Arena<Decl>,
    pub stmts: Arena<Stmt>,
    pub exprs: Arena<Expr>,
}

impl Program {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            ..Self::default()
        }
    }

    pub fn add_decl(&mut self, decl: Decl) -> DeclId {
        self.decls.append(decl)
    }

    pub fn add_stmt(&mut self, kind: StmtKind, position: CodePosition) -> StmtId {
        self.stmts.append(Stmt {
            position,
            modifiers: Modifiers::default(),
            kind,
        })
    }

    pub fn add_expr(&mut self, kind: ExprKind, position: CodePosition) -> ExprId {
        self.exprs.append(Expr::new(kind, position))
    }

    /// Top-level declarations with the given name.
    pub fn find_members<'a>(&'a self, name: &'a str) -> impl Iterator<Item = DeclId> + 'a {
        self.members
            .iter()
            .copied()
            .filter(move |&id| self.decls[id].name == name)
    }

    /// Top-level functions, in declaration order.
    pub fn functions(&self) -> impl Iterator<Item = (DeclId, &Decl, &FunctionDecl)> {
        self.members.iter().filter_map(|&id| {
            let decl = &self.decls[id];
            decl.as_function().map(|f| (id, decl, f))
        })
    }

    /// Top-level struct declarations, in declaration order.
    pub fn structs(&self) -> impl Iterator<Item = (DeclId, &Decl)> {
        self.members
            .iter()
            .map(|&id| (id, &self.decls[id]))
            .filter(|(_, d)| matches!(d.kind, DeclKind::Struct { .. }))
    }
}
