//! Lowering of checked programs into IL.
//!
//! [`CodeGenerator`] walks the syntax tree once. Top-level structs,
//! variables and functions are lowered in declaration order, then every
//! checked shader becomes an [`IlShader`] with one CFG per concrete world.
//! All instructions go through the [`CodeWriter`]; names resolve through a
//! [`ScopeDictionary`] mapping source names and component unique names to
//! operands.

mod expr;
mod shader;
mod stmt;

use std::collections::BTreeSet;

use spire_ir::{
    DiagnosticKind, DiagnosticSink, IlFunction, IlParameter, IlProgram, IlShader, IlType,
    Operand,
};
use spire_parser::Program;
use spire_parser::ast::{DeclId, DeclKind, StmtKind};

use crate::naming::escape_code_name;
use crate::scope::ScopeDictionary;
use crate::shader_ir::ShaderIr;
use crate::types::TypeTranslator;
use crate::writer::CodeWriter;

/// Lowers `program` and its checked `shaders` into one IL program.
///
/// Problems found while lowering (binding conflicts, invalid casts,
/// constructs without a lowering) are reported to `sink`; the returned
/// program is complete but should not be handed to a backend when `sink`
/// has errors.
pub fn generate(program: &Program, shaders: &[ShaderIr], sink: &mut DiagnosticSink) -> IlProgram {
    let mut generator = CodeGenerator::new(program, sink);
    generator.process_program();
    for shader in shaders {
        generator.process_shader(shader);
    }
    generator.finish()
}

/// The code generator's state while lowering one program.
pub struct CodeGenerator<'a> {
    program: &'a Program,
    sink: &'a mut DiagnosticSink,
    il: IlProgram,
    writer: CodeWriter,
    variables: ScopeDictionary<String, Operand>,
    types: TypeTranslator,

    // Per-shader state.
    shader: Option<&'a ShaderIr>,
    compiled: Option<IlShader>,
    world: Option<String>,
    component: Option<usize>,
    /// Component unique name and type of the import being lowered.
    import: Option<(String, IlType)>,
    return_register: Option<Operand>,
    /// Functions called by the function or world being lowered.
    call_targets: BTreeSet<String>,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(program: &'a Program, sink: &'a mut DiagnosticSink) -> Self {
        let mut variables = ScopeDictionary::new();
        variables.push_scope();
        Self {
            program,
            sink,
            il: IlProgram::new(),
            writer: CodeWriter::new(),
            variables,
            types: TypeTranslator::new(),
            shader: None,
            compiled: None,
            world: None,
            component: None,
            import: None,
            return_register: None,
            call_targets: BTreeSet::new(),
        }
    }

    /// Lowers every top-level struct, variable and function.
    ///
    /// Globals are declared before any function body is lowered, so a
    /// function may use a global declared after it.
    pub fn process_program(&mut self) {
        let program = self.program;
        for &member in &program.members {
            match &program.decls[member].kind {
                DeclKind::Struct { .. } => self.process_struct(member),
                DeclKind::Variable(_) => self.process_global_var(member),
                _ => {}
            }
        }
        for &member in &program.members {
            if let DeclKind::Function(_) = &program.decls[member].kind {
                self.process_function(member);
            }
        }
    }

    pub fn finish(self) -> IlProgram {
        self.il
    }

    fn process_struct(&mut self, decl: DeclId) {
        let (ty, created) = self.types.translate_struct(self.program, decl);
        if created {
            self.il.structs.push(ty);
        }
    }

    fn process_global_var(&mut self, decl: DeclId) {
        self.writer.push_node();
        self.declare_variable(decl);
        let node = self.writer.pop_node();
        self.il.globals.instructions.extend(node.instructions);
    }

    /// Type of a declared variable or parameter; `void` when unresolved.
    fn decl_type(&mut self, decl: DeclId) -> IlType {
        let program = self.program;
        match program.decls[decl].as_variable() {
            Some(var) => self
                .types
                .type_expr(program, var.ty)
                .unwrap_or(IlType::VOID),
            None => IlType::VOID,
        }
    }

    /// Allocates a variable in the current node and binds its name.
    fn declare_variable(&mut self, decl: DeclId) {
        let program = self.program;
        let node = &program.decls[decl];
        let ty = self.decl_type(decl);
        let len = match ty {
            IlType::Array { len, .. } => len,
            _ => 0,
        };
        let len = match i32::try_from(len) {
            Ok(len) => len,
            Err(_) => {
                self.sink.diagnose(
                    &node.position,
                    DiagnosticKind::ArrayTooLarge {
                        name: node.name.clone(),
                        len,
                    },
                );
                0
            }
        };
        let size = Operand::Const(self.il.constants.int(len));
        let var = self.writer.alloc_var(
            &mut self.il.instructions,
            ty,
            size,
            escape_code_name(&node.name),
        );
        // The initializer cannot see the name it initializes.
        if let Some(init) = node.as_variable().and_then(|v| v.init) {
            let value = self.lower_expr(init);
            self.assign(var.clone(), value);
        }
        self.variables.add(node.name.clone(), var);
    }

    fn process_function(&mut self, decl: DeclId) {
        let program = self.program;
        let node = &program.decls[decl];
        let Some(function) = node.as_function() else {
            return;
        };
        if node.is_extern() {
            return;
        }
        let Some(body) = function.body else {
            return;
        };
        let name = function
            .internal_name
            .clone()
            .unwrap_or_else(|| node.name.clone());
        log::debug!("lowering function '{name}'");

        let return_type = self
            .types
            .type_expr(program, function.return_type)
            .unwrap_or(IlType::VOID);
        let mut il_function = IlFunction {
            name: name.clone(),
            parameters: Vec::new(),
            return_type,
            code: Default::default(),
            referenced_functions: BTreeSet::new(),
        };
        // Register before lowering so recursive calls resolve their type.
        self.il.functions.insert(name.clone(), il_function.clone());

        let saved_targets = std::mem::take(&mut self.call_targets);
        self.variables.push_scope();
        self.writer.push_node();
        for (i, &param) in function.params.iter().enumerate() {
            let param_decl = &program.decls[param];
            let ty = self.decl_type(param);
            let qualifier = param_decl.modifiers.qualifier();
            il_function.parameters.push(IlParameter {
                name: param_decl.name.clone(),
                ty: ty.clone(),
                qualifier,
            });
            let arg = self.writer.fetch_arg(
                &mut self.il.instructions,
                ty,
                i as u32 + 1,
                qualifier,
                escape_code_name(&format!("p_{}", param_decl.name)),
            );
            self.variables.add(param_decl.name.clone(), arg);
        }
        if let StmtKind::Unparsed(_) = program.stmts[body].kind {
            self.sink.diagnose(
                &node.position,
                DiagnosticKind::Unimplemented(format!("unchecked body of function '{}'", node.name)),
            );
        } else {
            self.lower_stmt(body);
        }
        il_function.code = self.writer.pop_node();
        self.variables.pop_scope();
        il_function.referenced_functions = std::mem::replace(&mut self.call_targets, saved_targets);
        self.il.functions.insert(name, il_function);
    }
}
