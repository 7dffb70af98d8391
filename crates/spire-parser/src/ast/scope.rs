//! Lexical-parent lookup, built once after parsing.

use std::collections::HashMap;

use super::{DeclId, DeclKind, Program, StmtId, StmtKind};

/// Non-owning parent links for declarations and statements.
///
/// Top-level declarations have no parent. Local declarations and every
/// statement of a function body map to the enclosing function or
/// constructor.
#[derive(Clone, Debug, Default)]
pub struct ScopeTable {
    decl_parents: HashMap<DeclId, DeclId>,
    stmt_owners: HashMap<StmtId, DeclId>,
}

impl ScopeTable {
    pub fn build(program: &Program) -> Self {
        let mut table = Self::default();
        for &member in &program.members {
            table.visit_decl(program, member);
        }
        table
    }

    fn visit_decl(&mut self, program: &Program, id: DeclId) {
        let decl = &program.decls[id];
        for &child in decl.members() {
            self.decl_parents.insert(child, id);
            self.visit_decl(program, child);
        }
        match &decl.kind {
            DeclKind::Function(f) => {
                if let Some(body) = f.body {
                    self.visit_stmt(program, body, id);
                }
            }
            DeclKind::Constructor {
                body: Some(body), ..
            } => self.visit_stmt(program, *body, id),
            DeclKind::Generic {
                inner: Some(inner), ..
            } => {
                self.decl_parents.insert(*inner, id);
                self.visit_decl(program, *inner);
            }
            _ => {}
        }
    }

    fn visit_stmt(&mut self, program: &Program, id: StmtId, owner: DeclId) {
        self.stmt_owners.insert(id, owner);
        match &program.stmts[id].kind {
            StmtKind::Block(stmts) => {
                for &s in stmts {
                    self.visit_stmt(program, s, owner);
                }
            }
            StmtKind::VarDecl(decls) => {
                for &d in decls {
                    self.decl_parents.insert(d, owner);
                }
            }
            StmtKind::If { accept, reject, .. } => {
                self.visit_stmt(program, *accept, owner);
                if let Some(reject) = reject {
                    self.visit_stmt(program, *reject, owner);
                }
            }
            StmtKind::For { init, body, .. } => {
                if let Some(init) = init {
                    self.visit_stmt(program, *init, owner);
                }
                self.visit_stmt(program, *body, owner);
            }
            StmtKind::While { body, .. }
            | StmtKind::DoWhile { body, .. }
            | StmtKind::Switch { body, .. } => self.visit_stmt(program, *body, owner),
            _ => {}
        }
    }

    /// The container declaring `decl`, or `None` at the top level.
    pub fn parent(&self, decl: DeclId) -> Option<DeclId> {
        self.decl_parents.get(&decl).copied()
    }

    /// The function or constructor whose body contains `stmt`.
    pub fn owner(&self, stmt: StmtId) -> Option<DeclId> {
        self.stmt_owners.get(&stmt).copied()
    }

    /// Resolves `name` starting in `scope` and walking outwards to the top
    /// level. Members declared later in a container shadow earlier ones.
    pub fn lookup(&self, program: &Program, scope: Option<DeclId>, name: &str) -> Option<DeclId> {
        let mut current = scope;
        while let Some(container) = current {
            let found = program.decls[container]
                .members()
                .iter()
                .rev()
                .copied()
                .find(|&m| program.decls[m].name == name);
            if found.is_some() {
                return found;
            }
            current = self.parent(container);
        }
        program
            .members
            .iter()
            .rev()
            .copied()
            .find(|&m| program.decls[m].name == name)
    }
}
