//! IL instructions and control-flow-graph nodes.

use crate::arena::Handle;
use crate::constant::Constant;
use crate::types::IlType;

/// A value an instruction can consume.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Operand {
    /// The result of an instruction.
    Inst(Handle<Instruction>),
    /// A pooled constant.
    Const(Handle<Constant>),
    /// A module parameter, addressed by parameter-set binding name and
    /// parameter key.
    ModuleParam {
        set: String,
        key: String,
        ty: IlType,
    },
    Undefined,
}

impl From<Handle<Instruction>> for Operand {
    fn from(handle: Handle<Instruction>) -> Self {
        Self::Inst(handle)
    }
}

impl From<Handle<Constant>> for Operand {
    fn from(handle: Handle<Constant>) -> Self {
        Self::Const(handle)
    }
}

/// Binary operators, arithmetic and comparisons alike.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    CmpEq,
    CmpNeq,
    CmpGt,
    CmpGe,
    CmpLt,
    CmpLe,
}

impl BinaryOp {
    pub fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
            Self::Mod => "mod",
            Self::And => "and",
            Self::Or => "or",
            Self::BitAnd => "bitand",
            Self::BitOr => "bitor",
            Self::BitXor => "bitxor",
            Self::Shl => "shl",
            Self::Shr => "shr",
            Self::CmpEq => "cmpeql",
            Self::CmpNeq => "cmpneq",
            Self::CmpGt => "cmpgt",
            Self::CmpGe => "cmpge",
            Self::CmpLt => "cmplt",
            Self::CmpLe => "cmple",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::CmpEq | Self::CmpNeq | Self::CmpGt | Self::CmpGe | Self::CmpLt | Self::CmpLe
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Neg,
    BitNot,
    Float2Int,
    Int2Float,
    Copy,
}

impl UnaryOp {
    pub fn name(self) -> &'static str {
        match self {
            Self::Not => "not",
            Self::Neg => "neg",
            Self::BitNot => "bnot",
            Self::Float2Int => "f2i",
            Self::Int2Float => "i2f",
            Self::Copy => "copy",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ParameterQualifier {
    #[default]
    In,
    Out,
    InOut,
}

/// What an instruction does.
#[derive(Clone, Debug, PartialEq)]
pub enum InstKind {
    Binary {
        op: BinaryOp,
        left: Operand,
        right: Operand,
    },
    Unary {
        op: UnaryOp,
        operand: Operand,
    },
    Select {
        condition: Operand,
        accept: Operand,
        reject: Operand,
    },
    Swizzle {
        operand: Operand,
        pattern: String,
    },
    /// Reads element `index` of an aggregate.
    Retrieve {
        base: Operand,
        index: Operand,
    },
    /// Writes `value` into element `index` of an aggregate.
    Update {
        base: Operand,
        index: Operand,
        value: Operand,
    },
    Load {
        address: Operand,
    },
    Store {
        address: Operand,
        value: Operand,
    },
    /// A local variable; arrays carry their length in `size`.
    AllocVar {
        size: Operand,
    },
    FetchArg {
        index: u32,
        qualifier: ParameterQualifier,
    },
    Call {
        function: String,
        arguments: Vec<Operand>,
        side_effect: bool,
    },
    /// Reads a world input component.
    LoadInput {
        component: String,
    },
    /// Writes a component value into the world's output record.
    Export {
        component: String,
        world: String,
        value: Operand,
    },
    /// A world-crossing import; `operator_code` is the lowered body of the
    /// import operator.
    Import {
        component: String,
        arguments: Vec<Operand>,
        operator_code: CfgNode,
    },
    /// Projects the imported component out of a source-world record.
    Project {
        component: String,
        operand: Operand,
    },
    If {
        condition: Operand,
        accept: CfgNode,
        reject: Option<CfgNode>,
    },
    /// `condition` ends in a `Return` of the loop predicate.
    While {
        condition: CfgNode,
        body: CfgNode,
    },
    DoWhile {
        body: CfgNode,
        condition: CfgNode,
    },
    For {
        condition: Option<CfgNode>,
        side_effect: Option<CfgNode>,
        body: CfgNode,
    },
    Return(Option<Operand>),
    Break,
    Continue,
    Discard,
}

/// One IL instruction. Instructions live in the program's instruction arena
/// and are referenced from exactly one [`CfgNode`].
#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    pub kind: InstKind,
    pub ty: IlType,
    pub name: Option<String>,
}

impl Instruction {
    pub fn new(kind: InstKind, ty: IlType) -> Self {
        Self {
            kind,
            ty,
            name: None,
        }
    }

    /// Nested CFG nodes owned by this instruction, in evaluation order.
    pub fn sub_blocks(&self) -> Vec<&CfgNode> {
        match &self.kind {
            InstKind::Import { operator_code, .. } => vec![operator_code],
            InstKind::If { accept, reject, .. } => {
                let mut blocks = vec![accept];
                blocks.extend(reject);
                blocks
            }
            InstKind::While { condition, body } => vec![condition, body],
            InstKind::DoWhile { body, condition } => vec![body, condition],
            InstKind::For {
                condition,
                side_effect,
                body,
            } => condition
                .iter()
                .chain(side_effect.iter())
                .chain(std::iter::once(body))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// An ordered list of instructions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CfgNode {
    pub instructions: Vec<Handle<Instruction>>,
}

impl CfgNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, handle: Handle<Instruction>) {
        self.instructions.push(handle);
    }

    /// Removes `handle` from this node. Returns whether it was present.
    pub fn remove(&mut self, handle: Handle<Instruction>) -> bool {
        match self.instructions.iter().position(|h| *h == handle) {
            Some(i) => {
                self.instructions.remove(i);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, handle: Handle<Instruction>) -> bool {
        self.instructions.contains(&handle)
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}
