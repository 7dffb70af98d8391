//! Pre-order walks over statements and expressions.

use super::{ExprId, ExprKind, Program, StmtId, StmtKind};

/// Calls `f` on `expr` and then on every expression nested inside it.
pub fn walk_expr(program: &Program, expr: ExprId, f: &mut dyn FnMut(ExprId)) {
    let mut stack = vec![expr];
    while let Some(id) = stack.pop() {
        f(id);
        let children: Vec<ExprId> = match &program.exprs[id].kind {
            ExprKind::Constant(_) | ExprKind::Var { .. } | ExprKind::Error => Vec::new(),
            ExprKind::Operator { args, .. } | ExprKind::InitializerList(args) => args.clone(),
            ExprKind::Import { args, .. } => args.clone(),
            ExprKind::Select {
                condition,
                accept,
                reject,
            } => vec![*condition, *accept, *reject],
            ExprKind::Invoke { function, args, .. } => {
                let mut all = vec![*function];
                all.extend(args);
                all
            }
            ExprKind::Member { base, .. } | ExprKind::Project { base } => vec![*base],
            ExprKind::Index { base, index } => {
                let mut all = vec![*base];
                all.extend(index);
                all
            }
            ExprKind::TypeCast { target, expr } => vec![*target, *expr],
            ExprKind::GenericApp { base, args } => {
                let mut all = vec![*base];
                all.extend(args);
                all
            }
        };
        // Reversed so children are visited left to right.
        stack.extend(children.into_iter().rev());
    }
}

/// Calls `f` on every expression inside `stmt`, including the initializers
/// of local declarations.
pub fn walk_stmt_exprs(program: &Program, stmt: StmtId, f: &mut dyn FnMut(ExprId)) {
    let mut stack = vec![stmt];
    while let Some(id) = stack.pop() {
        let mut exprs = Vec::new();
        let mut stmts = Vec::new();
        match &program.stmts[id].kind {
            StmtKind::Block(children) => stmts.extend(children),
            StmtKind::VarDecl(decls) => {
                for &decl in decls {
                    if let Some(var) = program.decls[decl].as_variable() {
                        exprs.extend(var.init);
                    }
                }
            }
            StmtKind::If {
                condition,
                accept,
                reject,
            } => {
                exprs.push(*condition);
                stmts.push(*accept);
                stmts.extend(reject);
            }
            StmtKind::For {
                init,
                condition,
                step,
                body,
            } => {
                stmts.extend(init);
                exprs.extend(condition);
                exprs.extend(step);
                stmts.push(*body);
            }
            StmtKind::While { condition, body } | StmtKind::DoWhile { body, condition } => {
                exprs.push(*condition);
                stmts.push(*body);
            }
            StmtKind::Return(value) => exprs.extend(value),
            StmtKind::Expression(e) | StmtKind::Case(e) => exprs.push(*e),
            StmtKind::Switch { condition, body } => {
                exprs.push(*condition);
                stmts.push(*body);
            }
            StmtKind::Empty
            | StmtKind::Break
            | StmtKind::Continue
            | StmtKind::Discard
            | StmtKind::Default
            | StmtKind::Unparsed(_) => {}
        }
        for e in exprs {
            walk_expr(program, e, f);
        }
        stack.extend(stmts.into_iter().rev());
    }
}
