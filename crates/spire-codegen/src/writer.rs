//! Instruction builder over a stack of open CFG nodes.

use spire_ir::{
    Arena, BinaryOp, CfgNode, Handle, IlType, InstKind, Instruction, Operand, ParameterQualifier,
    UnaryOp,
};

/// Every instruction the code generator emits enters a CFG node through
/// [`CodeWriter::insert`], which appends to the innermost open node.
#[derive(Debug, Default)]
pub struct CodeWriter {
    nodes: Vec<CfgNode>,
}

impl CodeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_node(&mut self) {
        self.nodes.push(CfgNode::new());
    }

    pub fn pop_node(&mut self) -> CfgNode {
        match self.nodes.pop() {
            Some(node) => node,
            None => panic!("internal error: CFG node stack underflow"),
        }
    }

    pub fn depth(&self) -> usize {
        self.nodes.len()
    }

    pub fn current_node(&self) -> Option<&CfgNode> {
        self.nodes.last()
    }

    pub fn insert(&mut self, insts: &mut Arena<Instruction>, inst: Instruction) -> Handle<Instruction> {
        let handle = insts.append(inst);
        match self.nodes.last_mut() {
            Some(node) => node.push(handle),
            None => panic!("internal error: instruction emitted outside of a CFG node"),
        }
        handle
    }

    /// Removes an already inserted instruction from whichever open node
    /// holds it, innermost first.
    pub fn erase(&mut self, handle: Handle<Instruction>) -> bool {
        self.nodes.iter_mut().rev().any(|node| node.remove(handle))
    }

    fn emit(&mut self, insts: &mut Arena<Instruction>, kind: InstKind, ty: IlType) -> Operand {
        Operand::Inst(self.insert(insts, Instruction::new(kind, ty)))
    }

    pub fn binary(
        &mut self,
        insts: &mut Arena<Instruction>,
        op: BinaryOp,
        left: Operand,
        right: Operand,
        ty: IlType,
    ) -> Operand {
        self.emit(insts, InstKind::Binary { op, left, right }, ty)
    }

    pub fn unary(
        &mut self,
        insts: &mut Arena<Instruction>,
        op: UnaryOp,
        operand: Operand,
        ty: IlType,
    ) -> Operand {
        self.emit(insts, InstKind::Unary { op, operand }, ty)
    }

    pub fn select(
        &mut self,
        insts: &mut Arena<Instruction>,
        condition: Operand,
        accept: Operand,
        reject: Operand,
        ty: IlType,
    ) -> Operand {
        self.emit(
            insts,
            InstKind::Select {
                condition,
                accept,
                reject,
            },
            ty,
        )
    }

    pub fn swizzle(
        &mut self,
        insts: &mut Arena<Instruction>,
        operand: Operand,
        pattern: &str,
        ty: IlType,
    ) -> Operand {
        let pattern = pattern.to_owned();
        self.emit(insts, InstKind::Swizzle { operand, pattern }, ty)
    }

    pub fn retrieve(
        &mut self,
        insts: &mut Arena<Instruction>,
        base: Operand,
        index: Operand,
        ty: IlType,
    ) -> Operand {
        self.emit(insts, InstKind::Retrieve { base, index }, ty)
    }

    pub fn update(
        &mut self,
        insts: &mut Arena<Instruction>,
        base: Operand,
        index: Operand,
        value: Operand,
    ) {
        self.emit(insts, InstKind::Update { base, index, value }, IlType::VOID);
    }

    pub fn store(&mut self, insts: &mut Arena<Instruction>, address: Operand, value: Operand) {
        self.emit(insts, InstKind::Store { address, value }, IlType::VOID);
    }

    /// A local variable of `ty`; arrays pass their length in `size`.
    pub fn alloc_var(
        &mut self,
        insts: &mut Arena<Instruction>,
        ty: IlType,
        size: Operand,
        name: String,
    ) -> Operand {
        let mut inst = Instruction::new(InstKind::AllocVar { size }, ty);
        inst.name = Some(name);
        Operand::Inst(self.insert(insts, inst))
    }

    pub fn fetch_arg(
        &mut self,
        insts: &mut Arena<Instruction>,
        ty: IlType,
        index: u32,
        qualifier: ParameterQualifier,
        name: String,
    ) -> Operand {
        let mut inst = Instruction::new(InstKind::FetchArg { index, qualifier }, ty);
        inst.name = Some(name);
        Operand::Inst(self.insert(insts, inst))
    }

    pub fn call(
        &mut self,
        insts: &mut Arena<Instruction>,
        function: String,
        arguments: Vec<Operand>,
        side_effect: bool,
        ty: IlType,
    ) -> Operand {
        self.emit(
            insts,
            InstKind::Call {
                function,
                arguments,
                side_effect,
            },
            ty,
        )
    }

    pub fn ret(&mut self, insts: &mut Arena<Instruction>, value: Option<Operand>) {
        self.emit(insts, InstKind::Return(value), IlType::VOID);
    }

    pub fn discard(&mut self, insts: &mut Arena<Instruction>) {
        self.emit(insts, InstKind::Discard, IlType::VOID);
    }
}
