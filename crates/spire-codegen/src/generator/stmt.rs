//! Statement lowering.

use spire_ir::{CfgNode, DiagnosticKind, InstKind, Instruction, IlType, Operand};
use spire_parser::ast::{StmtId, StmtKind};

use super::CodeGenerator;

impl CodeGenerator<'_> {
    pub(super) fn lower_stmt(&mut self, stmt: StmtId) {
        let program = self.program;
        let node = &program.stmts[stmt];
        match &node.kind {
            StmtKind::Block(stmts) => {
                self.variables.push_scope();
                for &s in stmts {
                    self.lower_stmt(s);
                }
                self.variables.pop_scope();
            }
            StmtKind::Empty => {}
            StmtKind::VarDecl(decls) => {
                for &decl in decls {
                    self.declare_variable(decl);
                }
            }
            StmtKind::Expression(expr) => {
                self.lower_expr(*expr);
            }
            StmtKind::If {
                condition,
                accept,
                reject,
            } => {
                self.variables.push_scope();
                let condition = self.lower_expr(*condition);
                let accept = self.lower_node(*accept);
                let reject = reject.map(|r| self.lower_node(r));
                self.emit_control(InstKind::If {
                    condition,
                    accept,
                    reject,
                });
                self.variables.pop_scope();
            }
            StmtKind::While { condition, body } => {
                self.variables.push_scope();
                let condition = self.condition_node(*condition);
                let body = self.lower_node(*body);
                self.emit_control(InstKind::While { condition, body });
                self.variables.pop_scope();
            }
            StmtKind::DoWhile { body, condition } => {
                self.variables.push_scope();
                let condition = self.condition_node(*condition);
                let body = self.lower_node(*body);
                self.emit_control(InstKind::DoWhile { body, condition });
                self.variables.pop_scope();
            }
            StmtKind::For {
                init,
                condition,
                step,
                body,
            } => {
                self.variables.push_scope();
                if let Some(init) = init {
                    self.lower_stmt(*init);
                }
                let condition = condition.map(|c| self.condition_node(c));
                let side_effect = step.map(|s| {
                    self.writer.push_node();
                    self.lower_expr(s);
                    self.writer.pop_node()
                });
                let body = self.lower_node(*body);
                self.emit_control(InstKind::For {
                    condition,
                    side_effect,
                    body,
                });
                self.variables.pop_scope();
            }
            StmtKind::Break => self.emit_control(InstKind::Break),
            StmtKind::Continue => self.emit_control(InstKind::Continue),
            StmtKind::Discard => self.writer.discard(&mut self.il.instructions),
            StmtKind::Return(value) => self.lower_return(*value),
            StmtKind::Switch { .. } | StmtKind::Case(_) | StmtKind::Default => {
                self.sink.diagnose(
                    &node.position,
                    DiagnosticKind::Unimplemented("switch statement".into()),
                );
            }
            StmtKind::Unparsed(_) => {
                self.sink.diagnose(
                    &node.position,
                    DiagnosticKind::Unimplemented("unchecked statement".into()),
                );
            }
        }
    }

    /// Lowers `stmt` into a fresh node.
    fn lower_node(&mut self, stmt: StmtId) -> CfgNode {
        self.writer.push_node();
        self.lower_stmt(stmt);
        self.writer.pop_node()
    }

    /// A loop condition: its code, ending in a return of the tested value.
    fn condition_node(&mut self, condition: spire_parser::ast::ExprId) -> CfgNode {
        self.writer.push_node();
        let value = self.lower_expr(condition);
        self.writer.ret(&mut self.il.instructions, Some(value));
        self.writer.pop_node()
    }

    fn emit_control(&mut self, kind: InstKind) {
        self.writer
            .insert(&mut self.il.instructions, Instruction::new(kind, IlType::VOID));
    }

    /// Inside a world component, `return` produces the component's value:
    /// plain components export it when the world's record carries it,
    /// component functions return it. Everywhere else, including import
    /// operator bodies, it is an ordinary return.
    fn lower_return(&mut self, value: Option<spire_parser::ast::ExprId>) {
        self.return_register = None;
        let component = match (&self.world, self.component, &self.import) {
            (Some(_), Some(component), None) => Some(component),
            _ => None,
        };
        let Some(component) = component else {
            let value = value.map(|v| self.lower_expr(v));
            self.return_register = value.clone();
            self.writer.ret(&mut self.il.instructions, value);
            return;
        };
        let Some(value) = value else {
            return;
        };
        let value = self.lower_expr(value);
        self.return_register = Some(value.clone());
        let Some(shader) = self.shader else {
            panic!("internal error: component lowered outside of a shader");
        };
        let def = &shader.definitions[component];
        if def.is_component_function() {
            self.writer.ret(&mut self.il.instructions, Some(value));
        } else {
            self.export_if_recorded(&def.unique_name, value);
        }
    }

    /// Exports `value` as `component` when the current world's record
    /// contains it.
    pub(super) fn export_if_recorded(&mut self, component: &str, value: Operand) {
        let Some(world) = self.world.clone() else {
            return;
        };
        let recorded = self
            .compiled
            .as_ref()
            .and_then(|s| s.world(&world))
            .is_some_and(|w| w.output_type.contains(component));
        if recorded {
            let export = InstKind::Export {
                component: component.to_owned(),
                world,
                value,
            };
            self.writer
                .insert(&mut self.il.instructions, Instruction::new(export, IlType::VOID));
        }
    }
}

#[cfg(test)]
mod tests {
    use spire_ir::dump_program;

    use crate::generator::tests::lower;

    #[test]
    fn loops_put_their_condition_in_its_own_node() {
        let (il, sink) = lower(
            "int count(int n) { int i = 0; while (i < n) { i += 1; } do { i -= 1; } while (i > 0); return i; }",
        );
        assert!(sink.diagnostics().is_empty(), "{}", sink.output());
        let dump = dump_program(&il);
        assert!(dump.contains("    while {\n"), "{dump}");
        assert!(dump.contains("} do {"), "{dump}");
        assert!(dump.contains("    do {\n"), "{dump}");
        assert!(dump.contains("} while {"), "{dump}");
        assert!(dump.contains("= cmplt %1(i), %0(p_n) : bool"), "{dump}");
    }

    #[test]
    fn for_loop_has_all_parts() {
        let (il, sink) = lower("float sum() { float s = 0.0; for (int i = 0; i < 4; i++) { s += 1.0; } return s; }");
        assert!(sink.diagnostics().is_empty(), "{}", sink.output());
        let dump = dump_program(&il);
        assert!(dump.contains("for {"), "{dump}");
        assert!(dump.contains("condition:"), "{dump}");
        assert!(dump.contains("step:"), "{dump}");
        assert!(dump.contains("body:"), "{dump}");
        // The loop variable is declared before the loop, in the enclosing node.
        let var = dump.find("(i) = var int").expect("loop variable");
        assert!(var < dump.find("for {").expect("loop"), "{dump}");
    }

    #[test]
    fn if_else_and_discard() {
        let (il, sink) = lower("void f(float a) { if (a > 0.5) { discard; } else { return; } }");
        assert!(sink.diagnostics().is_empty(), "{}", sink.output());
        let dump = dump_program(&il);
        assert!(dump.contains("if %"), "{dump}");
        assert!(dump.contains("discard"), "{dump}");
        assert!(dump.contains("} else {"), "{dump}");
        assert!(dump.contains("        return\n"), "{dump}");
    }

    #[test]
    fn switch_is_reported_as_unimplemented() {
        let (_, sink) = lower("int f(int a) { switch (a) { case 1: return 2; default: return 3; } return 0; }");
        assert!(sink.diagnostics().iter().any(|d| matches!(
            &d.kind,
            spire_ir::DiagnosticKind::Unimplemented(what) if what == "switch statement"
        )));
    }
}
