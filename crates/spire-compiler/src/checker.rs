//! The semantic-checking seam.
//!
//! Full type checking of shaders, pipelines and modules is supplied by the
//! embedder through [`SemanticChecker`]. It fills the annotation slots of
//! the syntax tree and returns the [`ShaderIr`] descriptions code
//! generation consumes. [`ScopeChecker`] is the built-in fallback for
//! programs without shaders: it resolves names and call targets and
//! rejects types defined in terms of themselves.

use spire_codegen::{ScopeDictionary, ShaderIr, recursive_type_decls};
use spire_ir::{DiagnosticKind, DiagnosticSink};
use spire_parser::Program;
use spire_parser::ScopeTable;
use spire_parser::ast::{Callee, DeclId, ExprId, ExprKind, StmtId, StmtKind};

use crate::session::CompileUnit;

/// Checks one parsed unit against the standard library.
pub trait SemanticChecker {
    /// Annotates `unit.program` in place and returns the shaders it
    /// declares. Problems are reported to `sink`; the driver will not run
    /// code generation while `sink` holds errors.
    fn check(
        &mut self,
        unit: &mut CompileUnit,
        predefined: &Program,
        sink: &mut DiagnosticSink,
    ) -> Vec<ShaderIr>;
}

/// Name resolution for plain functions and globals.
///
/// A name is visible when it is a local or parameter in scope, or a
/// variable declared at the top level of the unit. Global initializers see
/// only the globals declared before them. Identifiers that name nothing
/// visible are reported, and the callee of every call whose target is a
/// declared function is recorded. Calls to names that are not declared
/// anywhere are left unresolved; code generation lowers them as intrinsic
/// calls.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScopeChecker;

impl SemanticChecker for ScopeChecker {
    fn check(
        &mut self,
        unit: &mut CompileUnit,
        predefined: &Program,
        sink: &mut DiagnosticSink,
    ) -> Vec<ShaderIr> {
        let program = &unit.program;
        for decl in recursive_type_decls(program) {
            let decl = &program.decls[decl];
            sink.diagnose(&decl.position, DiagnosticKind::RecursiveType(decl.name.clone()));
        }
        let scopes = ScopeTable::build(program);
        let mut resolver = Resolver {
            program,
            predefined,
            scopes: &scopes,
            function: None,
            globals_declared: 0,
            locals: ScopeDictionary::new(),
            sink,
            callees: Vec::new(),
        };
        for (i, &member) in program.members.iter().enumerate() {
            let decl = &program.decls[member];
            if let Some(init) = decl.as_variable().and_then(|v| v.init) {
                resolver.function = None;
                resolver.globals_declared = i;
                resolver.expr(init);
            }
            if let Some(body) = decl.as_function().and_then(|f| f.body) {
                resolver.function = Some(member);
                resolver.locals.push_scope();
                resolver.stmt(body);
                resolver.locals.pop_scope();
            }
        }
        let callees = resolver.callees;
        log::debug!(
            "resolved {} call(s) in '{}'",
            callees.len(),
            unit.file_name
        );
        for (expr, resolved) in callees {
            if let ExprKind::Invoke { callee, .. } = &mut unit.program.exprs[expr].kind {
                *callee = Some(resolved);
            }
        }
        Vec::new()
    }
}

struct Resolver<'a, 's> {
    program: &'a Program,
    predefined: &'a Program,
    scopes: &'a ScopeTable,
    function: Option<DeclId>,
    /// Top-level members visible to the global initializer being checked.
    globals_declared: usize,
    /// Locals of the function being checked.
    locals: ScopeDictionary<String, DeclId>,
    sink: &'s mut DiagnosticSink,
    callees: Vec<(ExprId, Callee)>,
}

impl Resolver<'_, '_> {
    fn stmt(&mut self, id: StmtId) {
        let program = self.program;
        match &program.stmts[id].kind {
            StmtKind::Block(stmts) => {
                self.locals.push_scope();
                for &s in stmts {
                    self.stmt(s);
                }
                self.locals.pop_scope();
            }
            StmtKind::VarDecl(decls) => {
                for &decl in decls {
                    // The initializer cannot see the name it initializes.
                    if let Some(init) = program.decls[decl].as_variable().and_then(|v| v.init) {
                        self.expr(init);
                    }
                    self.locals.add(program.decls[decl].name.clone(), decl);
                }
            }
            StmtKind::If {
                condition,
                accept,
                reject,
            } => {
                self.expr(*condition);
                self.scoped(*accept);
                if let Some(reject) = reject {
                    self.scoped(*reject);
                }
            }
            StmtKind::For {
                init,
                condition,
                step,
                body,
            } => {
                self.locals.push_scope();
                if let Some(init) = init {
                    self.stmt(*init);
                }
                if let Some(condition) = condition {
                    self.expr(*condition);
                }
                if let Some(step) = step {
                    self.expr(*step);
                }
                self.scoped(*body);
                self.locals.pop_scope();
            }
            StmtKind::While { condition, body } | StmtKind::DoWhile { body, condition } => {
                self.expr(*condition);
                self.scoped(*body);
            }
            StmtKind::Switch { condition, body } => {
                self.expr(*condition);
                self.scoped(*body);
            }
            StmtKind::Case(e) | StmtKind::Expression(e) | StmtKind::Return(Some(e)) => {
                self.expr(*e)
            }
            StmtKind::Empty
            | StmtKind::Break
            | StmtKind::Continue
            | StmtKind::Return(None)
            | StmtKind::Discard
            | StmtKind::Default
            | StmtKind::Unparsed(_) => {}
        }
    }

    fn scoped(&mut self, id: StmtId) {
        self.locals.push_scope();
        self.stmt(id);
        self.locals.pop_scope();
    }

    fn expr(&mut self, id: ExprId) {
        let program = self.program;
        let node = &program.exprs[id];
        match &node.kind {
            ExprKind::Constant(_) | ExprKind::Error => {}
            ExprKind::Var {
                component: Some(_), ..
            } => {}
            ExprKind::Var { name, .. } => {
                if !self.is_visible(name) {
                    self.sink
                        .diagnose(&node.position, DiagnosticKind::UndefinedIdentifier(name.clone()));
                }
            }
            ExprKind::Invoke { function, args, .. } => {
                match &program.exprs[*function].kind {
                    ExprKind::Var {
                        name,
                        component: None,
                    } => {
                        if let Some(callee) = self.resolve_call(name) {
                            self.callees.push((id, callee));
                        }
                    }
                    _ => self.expr(*function),
                }
                for &arg in args {
                    self.expr(arg);
                }
            }
            ExprKind::Operator { args, .. }
            | ExprKind::InitializerList(args)
            | ExprKind::Import { args, .. } => {
                for &arg in args {
                    self.expr(arg);
                }
            }
            ExprKind::Select {
                condition,
                accept,
                reject,
            } => {
                self.expr(*condition);
                self.expr(*accept);
                self.expr(*reject);
            }
            ExprKind::Member { base, .. } | ExprKind::Project { base } => self.expr(*base),
            ExprKind::Index { base, index } => {
                self.expr(*base);
                if let Some(index) = index {
                    self.expr(*index);
                }
            }
            // Type operands are not names of values.
            ExprKind::TypeCast { expr, .. } => self.expr(*expr),
            ExprKind::GenericApp { .. } => {}
        }
    }

    fn is_visible(&self, name: &str) -> bool {
        if self.locals.try_get(name).is_some() {
            return true;
        }
        let program = self.program;
        let is_variable = |decl: DeclId| program.decls[decl].as_variable().is_some();
        let is_global = |decl: &DeclId| program.decls[*decl].name == name && is_variable(*decl);
        match self.function {
            Some(function) => {
                self.scopes
                    .lookup(program, Some(function), name)
                    .is_some_and(is_variable)
                    || program.members.iter().any(is_global)
            }
            None => program.members[..self.globals_declared].iter().any(is_global),
        }
    }

    /// The first function called `name`, searching the unit before the
    /// standard library.
    fn resolve_call(&self, name: &str) -> Option<Callee> {
        if self.locals.try_get(name).is_some() {
            return None;
        }
        [self.program, self.predefined].into_iter().find_map(|program| {
            program.functions().find_map(|(_, decl, function)| {
                (decl.name == name).then(|| Callee::Function {
                    name: decl.name.clone(),
                    internal_name: function
                        .internal_name
                        .clone()
                        .unwrap_or_else(|| decl.name.clone()),
                    is_extern: decl.is_extern(),
                    has_out_param: function
                        .params
                        .iter()
                        .any(|&p| program.decls[p].modifiers.is_out()),
                })
            })
        })
    }
}
