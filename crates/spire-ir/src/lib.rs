//! Spire intermediate language.
//!
//! Holds everything the compiler phases share: typed arenas, source
//! positions and the diagnostic sink, plus the IL itself. The IL is a typed,
//! per-world control-flow-graph representation organised into shaders,
//! worlds and functions, ready for backend emission. The crate also reads
//! and writes the ShaderLib text format.

pub mod arena;
mod constant;
mod diagnostic;
mod display;
mod error;
mod inst;
pub mod layout;
mod program;
pub mod shader_lib;
mod source;
mod types;

pub use arena::{Arena, Handle, UniqueArena};
pub use constant::{Constant, ConstantPool, FloatBits};
pub use diagnostic::{Diagnostic, DiagnosticCallback, DiagnosticKind, DiagnosticSink, Severity};
pub use display::{dump_program, format_operand};
pub use error::ShaderLibError;
pub use inst::{BinaryOp, CfgNode, InstKind, Instruction, Operand, ParameterQualifier, UnaryOp};
pub use layout::{LayoutError, LayoutInfo, Placement};
pub use program::{
    Attribute, Attributes, IlFunction, IlParameter, IlProgram, IlShader, IlStage, IlWorld,
    ModuleParameterInstance, ModuleParameterSet, ObjectDefinition, RecordType,
};
pub use shader_lib::{ShaderLibFile, StageSource};
pub use source::CodePosition;
pub use types::{
    ArrayLikeKind, BaseType, BindableResourceType, IlType, PointerLikeKind, StructField,
    StructType, TextureFlavor, TextureShape,
};
