//! Expression lowering.
//!
//! Every expression lowers to one [`Operand`]. Lvalues are lowered with
//! [`Access::Write`]: element and member accesses then produce an `add` of
//! base and index instead of a `retrieve`, and [`CodeGenerator::assign`]
//! turns that address into an `update`.

use spire_ir::{
    BaseType, BinaryOp, DiagnosticKind, IlType, InstKind, Instruction, Operand, UnaryOp,
};
use spire_parser::ast::{Callee, ConstantValue, ExprId, ExprKind, Operator};

use super::CodeGenerator;
use crate::types::builtin_type;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Access {
    Read,
    Write,
}

fn binary_op(op: Operator) -> Option<BinaryOp> {
    Some(match op {
        Operator::Add => BinaryOp::Add,
        Operator::Sub => BinaryOp::Sub,
        Operator::Mul => BinaryOp::Mul,
        Operator::Div => BinaryOp::Div,
        Operator::Mod => BinaryOp::Mod,
        Operator::And => BinaryOp::And,
        Operator::Or => BinaryOp::Or,
        Operator::BitAnd => BinaryOp::BitAnd,
        Operator::BitOr => BinaryOp::BitOr,
        Operator::BitXor => BinaryOp::BitXor,
        Operator::Lsh => BinaryOp::Shl,
        Operator::Rsh => BinaryOp::Shr,
        Operator::Eql => BinaryOp::CmpEq,
        Operator::Neq => BinaryOp::CmpNeq,
        Operator::Greater => BinaryOp::CmpGt,
        Operator::Geq => BinaryOp::CmpGe,
        Operator::Less => BinaryOp::CmpLt,
        Operator::Leq => BinaryOp::CmpLe,
        _ => return None,
    })
}

/// Vector component index of a swizzle letter.
fn swizzle_index(letter: char) -> i32 {
    match letter {
        'y' | 'g' => 1,
        'z' | 'b' => 2,
        'w' | 'a' => 3,
        _ => 0,
    }
}

impl CodeGenerator<'_> {
    pub(super) fn lower_expr(&mut self, expr: ExprId) -> Operand {
        self.lower_access(expr, Access::Read)
    }

    /// The checked type of `expr`, with generic names substituted.
    fn annotation(&self, expr: ExprId) -> Option<IlType> {
        self.program.exprs[expr]
            .ty
            .as_ref()
            .map(|ty| self.types.translate(ty))
    }

    fn int_const(&mut self, value: i32) -> Operand {
        Operand::Const(self.il.constants.int(value))
    }

    pub(super) fn emit(&mut self, kind: InstKind, ty: IlType) -> Operand {
        Operand::Inst(
            self.writer
                .insert(&mut self.il.instructions, Instruction::new(kind, ty)),
        )
    }

    fn unimplemented(&mut self, expr: ExprId, what: &str) -> Operand {
        self.sink.diagnose(
            &self.program.exprs[expr].position,
            DiagnosticKind::Unimplemented(what.to_owned()),
        );
        Operand::Undefined
    }

    fn lower_access(&mut self, expr: ExprId, access: Access) -> Operand {
        let program = self.program;
        let node = &program.exprs[expr];
        match &node.kind {
            ExprKind::Constant(value) => match *value {
                ConstantValue::Int(v) => self.int_const(v as i32),
                ConstantValue::Float(v) => Operand::Const(self.il.constants.float(v)),
                ConstantValue::Bool(v) => Operand::Const(self.il.constants.bool(v)),
            },
            ExprKind::Var { name, component } => match component {
                Some(component) => self.component_value(component),
                None => match self.variables.try_get(name.as_str()) {
                    Some(op) => op.clone(),
                    None => panic!(
                        "internal error: unresolved identifier '{name}' reached code generation"
                    ),
                },
            },
            ExprKind::Operator { op, args } => self.lower_operator(expr, *op, args),
            ExprKind::Select {
                condition,
                accept,
                reject,
            } => {
                let condition = self.lower_expr(*condition);
                let accept = self.lower_expr(*accept);
                let reject = self.lower_expr(*reject);
                let ty = self
                    .annotation(expr)
                    .unwrap_or_else(|| self.il.operand_type(&accept));
                self.writer
                    .select(&mut self.il.instructions, condition, accept, reject, ty)
            }
            ExprKind::Invoke {
                function,
                args,
                callee,
            } => self.lower_invoke(expr, *function, args, callee.as_ref()),
            ExprKind::Member {
                base,
                member,
                component,
            } => match component {
                Some(component) => self.component_value(component),
                None => self.lower_member(expr, *base, member, access),
            },
            ExprKind::Index { base, index } => {
                let Some(index) = index else {
                    return self.unimplemented(expr, "index without a subscript");
                };
                let base = self.lower_access(*base, access);
                let index = self.lower_expr(*index);
                let ty = self.annotation(expr).unwrap_or_else(|| {
                    self.il
                        .operand_type(&base)
                        .element_type()
                        .unwrap_or(IlType::VOID)
                });
                self.element(base, index, ty, access)
            }
            ExprKind::TypeCast { target, expr: inner } => {
                let value = self.lower_expr(*inner);
                let from = self
                    .annotation(*inner)
                    .unwrap_or_else(|| self.il.operand_type(&value));
                let Some(to) = self.types.type_expr(program, *target) else {
                    return value;
                };
                if from == to {
                    value
                } else if from == IlType::FLOAT && to == IlType::INT {
                    self.writer
                        .unary(&mut self.il.instructions, UnaryOp::Float2Int, value, to)
                } else if from == IlType::INT && to == IlType::FLOAT {
                    self.writer
                        .unary(&mut self.il.instructions, UnaryOp::Int2Float, value, to)
                } else {
                    self.sink.diagnose(
                        &node.position,
                        DiagnosticKind::InvalidTypeCast {
                            from: from.to_string(),
                            to: to.to_string(),
                        },
                    );
                    value
                }
            }
            ExprKind::Import {
                operator,
                component,
                args,
            } => self.lower_import(expr, operator, component, args),
            ExprKind::Project { base } => {
                let operand = self.lower_expr(*base);
                let Some((component, ty)) = self.import.clone() else {
                    panic!("internal error: project outside of an import operator");
                };
                self.emit(InstKind::Project { component, operand }, ty)
            }
            ExprKind::InitializerList(_) => self.unimplemented(expr, "initializer list"),
            ExprKind::GenericApp { .. } => self.unimplemented(expr, "generic application value"),
            ExprKind::Error => panic!("internal error: erroneous expression reached code generation"),
        }
    }

    /// The operand computing component `unique_name` in the current scope.
    pub(super) fn component_value(&self, unique_name: &str) -> Operand {
        match self.variables.try_get(unique_name) {
            Some(op) => op.clone(),
            None => panic!(
                "internal error: component '{unique_name}' referenced before it was computed"
            ),
        }
    }

    /// `retrieve` for reads; for writes, the `add` address that
    /// [`assign`](Self::assign) turns into an `update`.
    fn element(&mut self, base: Operand, index: Operand, ty: IlType, access: Access) -> Operand {
        match access {
            Access::Read => self
                .writer
                .retrieve(&mut self.il.instructions, base, index, ty),
            Access::Write => self.writer.binary(
                &mut self.il.instructions,
                BinaryOp::Add,
                base,
                index,
                ty,
            ),
        }
    }

    fn lower_member(&mut self, expr: ExprId, base_expr: ExprId, member: &str, access: Access) -> Operand {
        let base = self.lower_access(base_expr, access);
        let base_ty = self
            .annotation(base_expr)
            .unwrap_or_else(|| self.il.operand_type(&base));
        match &base_ty {
            IlType::Vector { base: scalar, .. } => {
                let mut letters = member.chars();
                match (letters.next(), letters.next()) {
                    (Some(letter), None) => {
                        let index = self.int_const(swizzle_index(letter));
                        self.element(base, index, IlType::Basic(*scalar), access)
                    }
                    _ => {
                        let ty = self.annotation(expr).unwrap_or_else(|| {
                            IlType::vector(*scalar, member.chars().count() as u32)
                        });
                        self.writer
                            .swizzle(&mut self.il.instructions, base, member, ty)
                    }
                }
            }
            IlType::Struct(s) => match s.fields.iter().position(|f| f.name == member) {
                Some(position) => {
                    let ty = s.fields[position].ty.clone();
                    let index = self.int_const(position as i32);
                    self.element(base, index, ty, access)
                }
                None => self.unimplemented(expr, &format!("member '{member}' of '{}'", s.name)),
            },
            other => self.unimplemented(expr, &format!("member access on '{other}'")),
        }
    }

    /// `!x` needs a boolean operand.
    fn ensure_bool(&mut self, value: Operand, ty: &IlType) -> Operand {
        if *ty == IlType::BOOL {
            return value;
        }
        let zero = self.int_const(0);
        self.writer.binary(
            &mut self.il.instructions,
            BinaryOp::CmpNeq,
            value,
            zero,
            IlType::BOOL,
        )
    }

    fn lower_operator(&mut self, expr: ExprId, op: Operator, args: &[ExprId]) -> Operand {
        match op {
            Operator::Neg | Operator::Not | Operator::BitNot => {
                let value = self.lower_expr(args[0]);
                let ty = self
                    .annotation(args[0])
                    .unwrap_or_else(|| self.il.operand_type(&value));
                let (op, value, ty) = match op {
                    Operator::Not => (UnaryOp::Not, self.ensure_bool(value, &ty), IlType::BOOL),
                    Operator::Neg => (UnaryOp::Neg, value, ty),
                    _ => (UnaryOp::BitNot, value, ty),
                };
                self.writer.unary(&mut self.il.instructions, op, value, ty)
            }
            Operator::PreInc | Operator::PreDec | Operator::PostInc | Operator::PostDec => {
                let base = self.lower_expr(args[0]);
                let ty = self
                    .annotation(expr)
                    .unwrap_or_else(|| self.il.operand_type(&base));
                let one = if ty.base_type() == Some(BaseType::Float) {
                    Operand::Const(self.il.constants.float(1.0))
                } else {
                    self.int_const(1)
                };
                let bin = match op {
                    Operator::PreDec | Operator::PostDec => BinaryOp::Sub,
                    _ => BinaryOp::Add,
                };
                let updated = self.writer.binary(
                    &mut self.il.instructions,
                    bin,
                    base.clone(),
                    one,
                    ty,
                );
                let target = self.lower_access(args[0], Access::Write);
                self.assign(target, updated.clone());
                match op {
                    Operator::PostInc | Operator::PostDec => base,
                    _ => updated,
                }
            }
            Operator::Sequence => {
                self.lower_expr(args[0]);
                self.lower_expr(args[1])
            }
            Operator::Assign => {
                let right = self.lower_expr(args[1]);
                let left = self.lower_access(args[0], Access::Write);
                self.assign(left, right)
            }
            _ => {
                let right = self.lower_expr(args[1]);
                let left = self.lower_expr(args[0]);
                let base_op = op.compound_base().unwrap_or(op);
                let Some(bin) = binary_op(base_op) else {
                    panic!("internal error: operator '{}' has no binary lowering", op.symbol());
                };
                let ty = self.annotation(expr).unwrap_or_else(|| {
                    if bin.is_comparison() || matches!(bin, BinaryOp::And | BinaryOp::Or) {
                        IlType::BOOL
                    } else {
                        self.il.operand_type(&left)
                    }
                });
                let value = self
                    .writer
                    .binary(&mut self.il.instructions, bin, left, right, ty);
                if op.is_assignment() {
                    let target = self.lower_access(args[0], Access::Write);
                    self.assign(target, value.clone());
                }
                value
            }
        }
    }

    /// Stores `right` into the lvalue `left` and returns the value of the
    /// assignment expression.
    ///
    /// Element addresses become an `update` of their base and vector
    /// swizzles one `update` per letter; the address instruction itself is
    /// erased, so the assignment then evaluates to `right`.
    pub(super) fn assign(&mut self, left: Operand, right: Operand) -> Operand {
        let Operand::Inst(handle) = left else {
            self.writer
                .store(&mut self.il.instructions, left.clone(), right);
            return left;
        };
        match self.il.instructions[handle].kind.clone() {
            InstKind::Binary {
                op: BinaryOp::Add,
                left: base,
                right: index,
            } => {
                self.writer
                    .update(&mut self.il.instructions, base, index, right.clone());
                self.writer.erase(handle);
                right
            }
            InstKind::Swizzle {
                operand: base,
                pattern,
            } => {
                let element_ty = self
                    .il
                    .operand_type(&right)
                    .element_type()
                    .unwrap_or(IlType::FLOAT);
                for (i, letter) in pattern.chars().enumerate() {
                    let source_index = self.int_const(i as i32);
                    let component = self.writer.retrieve(
                        &mut self.il.instructions,
                        right.clone(),
                        source_index,
                        element_ty.clone(),
                    );
                    let dest_index = self.int_const(swizzle_index(letter));
                    self.writer
                        .update(&mut self.il.instructions, base.clone(), dest_index, component);
                }
                self.writer.erase(handle);
                right
            }
            _ => {
                self.writer
                    .store(&mut self.il.instructions, left.clone(), right);
                left
            }
        }
    }

    fn lower_invoke(
        &mut self,
        expr: ExprId,
        function: ExprId,
        args: &[ExprId],
        callee: Option<&Callee>,
    ) -> Operand {
        let program = self.program;
        let mut arguments = Vec::new();
        let (name, side_effect) = match callee {
            Some(Callee::Function {
                name,
                internal_name,
                is_extern,
                has_out_param,
            }) => {
                let name = if *is_extern { name } else { internal_name };
                (name.clone(), *has_out_param)
            }
            Some(Callee::Component(component)) => {
                let (index, name) = self.component_callee(component);
                let Some(shader) = self.shader else {
                    panic!("internal error: component call outside of a shader");
                };
                let def = &shader.definitions[index];
                for dep in shader.dependency_closure(index) {
                    let dep = &shader.definitions[dep];
                    if !dep.is_component_function() {
                        arguments.push(self.component_value(&dep.unique_name));
                    }
                }
                let side_effect = def
                    .params
                    .iter()
                    .any(|&p| program.decls[p].modifiers.is_out());
                (name, side_effect)
            }
            None => match &program.exprs[function].kind {
                ExprKind::Var { name, .. } => self.resolve_function(name),
                _ => return self.unimplemented(expr, "call through an expression"),
            },
        };
        for &arg in args {
            arguments.push(self.lower_expr(arg));
        }
        self.call_targets.insert(name.clone());
        let ty = self
            .annotation(expr)
            .or_else(|| self.il.functions.get(&name).map(|f| f.return_type.clone()))
            .or_else(|| self.declared_return_type(&name))
            .or_else(|| builtin_type(&name))
            .unwrap_or(IlType::VOID);
        self.writer
            .call(&mut self.il.instructions, name, arguments, side_effect, ty)
    }

    /// Definition index and function name of component function `component`
    /// in the world of the component being lowered.
    fn component_callee(&self, component: &str) -> (usize, String) {
        let (Some(shader), Some(current)) = (self.shader, self.component) else {
            panic!("internal error: component call outside of a component");
        };
        let world = &shader.definitions[current].world;
        let Some(&index) = shader
            .definitions_by_component
            .get(component)
            .and_then(|by_world| by_world.get(world))
        else {
            panic!("internal error: component function '{component}' has no definition in world '{world}'");
        };
        (index, self.component_function_name(index))
    }

    /// Call target for an unresolved call of `name`: a function of this
    /// program when one exists, otherwise an intrinsic of that name.
    fn resolve_function(&self, name: &str) -> (String, bool) {
        let program = self.program;
        let found = program.functions().find(|(_, decl, _)| decl.name == name);
        match found {
            Some((_, decl, function)) => {
                let target = if decl.is_extern() {
                    decl.name.clone()
                } else {
                    function
                        .internal_name
                        .clone()
                        .unwrap_or_else(|| decl.name.clone())
                };
                let side_effect = function
                    .params
                    .iter()
                    .any(|&p| program.decls[p].modifiers.is_out());
                (target, side_effect)
            }
            None => (name.to_owned(), false),
        }
    }

    fn declared_return_type(&mut self, name: &str) -> Option<IlType> {
        let program = self.program;
        let (_, _, function) = program.functions().find(|(_, decl, f)| {
            decl.name == name || f.internal_name.as_deref() == Some(name)
        })?;
        self.types.type_expr(program, function.return_type)
    }

    fn lower_import(
        &mut self,
        expr: ExprId,
        operator: &str,
        component: &str,
        args: &[ExprId],
    ) -> Operand {
        let Some(shader) = self.shader else {
            panic!("internal error: import outside of a shader");
        };
        let Some(import_op) = shader.pipeline.import_operator(operator) else {
            panic!("internal error: unknown import operator '{operator}'");
        };
        let ty = self
            .annotation(expr)
            .or_else(|| {
                shader
                    .definition_by_unique_name(component)
                    .map(|d| self.types.translate(&d.ty))
            })
            .unwrap_or(IlType::VOID);

        self.variables.push_scope();
        let mut arguments = Vec::with_capacity(args.len());
        for (param, &arg) in import_op.params.iter().zip(args) {
            let value = self.lower_expr(arg);
            self.variables.add(param.clone(), value.clone());
            arguments.push(value);
        }
        let previous_import = self.import.replace((component.to_owned(), ty.clone()));
        let previous_mapping = self.types.set_mapping(&import_op.type_param, ty.clone());
        self.writer.push_node();
        self.lower_stmt(import_op.body);
        let operator_code = self.writer.pop_node();
        self.types
            .restore_mapping(&import_op.type_param, previous_mapping);
        self.import = previous_import;
        self.variables.pop_scope();

        self.emit(
            InstKind::Import {
                component: component.to_owned(),
                arguments,
                operator_code,
            },
            ty,
        )
    }
}
