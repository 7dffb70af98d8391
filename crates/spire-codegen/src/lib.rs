//! Code generation for the Spire shading language.
//!
//! Takes a checked [`spire_parser::Program`] plus the [`ShaderIr`]
//! descriptions the semantic checker derives from it, and lowers both into
//! an [`spire_ir::IlProgram`]: structs, plain functions, module-scope
//! variables and, per shader, the parameter binding layout and one
//! control-flow graph per world.

mod binding;
mod generator;
mod naming;
mod scope;
mod shader_ir;
mod types;
mod writer;

pub use binding::generate_parameter_binding_info;
pub use generator::{CodeGenerator, generate};
pub use naming::escape_code_name;
pub use scope::ScopeDictionary;
pub use shader_ir::{
    ComponentBody, ComponentDefinitionIr, ImportOperatorDef, ModuleInstanceIr, PipelineIr,
    ShaderIr, StageDecl, UNIFORM_WORLD, WorldDecl,
};
pub use types::{TypeTranslator, recursive_type_decls};
pub use writer::CodeWriter;
