//! Program, shader, world and module-parameter containers.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::arena::{Arena, Handle};
use crate::constant::ConstantPool;
use crate::inst::{CfgNode, Instruction, Operand, ParameterQualifier};
use crate::source::CodePosition;
use crate::types::{IlType, StructType};

/// A layout attribute copied from a declaration, e.g. `[Binding: "2"]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    pub value: String,
    pub position: CodePosition,
}

pub type Attributes = BTreeMap<String, Attribute>;

/// A named, typed slot of a world record or a world input.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectDefinition {
    pub name: String,
    pub ty: IlType,
    pub attributes: Attributes,
    pub position: CodePosition,
    pub binding: Option<i32>,
}

/// Output record of a world. Members keep insertion order and are unique by
/// name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordType {
    pub name: String,
    pub members: Vec<ObjectDefinition>,
}

impl RecordType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
        }
    }

    /// Adds `member` unless a member of the same name exists already.
    pub fn add_if_not_exists(&mut self, member: ObjectDefinition) -> bool {
        if self.contains(&member.name) {
            return false;
        }
        self.members.push(member);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.members.iter().any(|m| m.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&ObjectDefinition> {
        self.members.iter().find(|m| m.name == name)
    }
}

/// A parameter of a module instance, after binding allocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleParameterInstance {
    pub key: String,
    pub name: String,
    pub ty: IlType,
    /// Byte offset inside the module's constant buffer, for ordinary values.
    pub buffer_offset: Option<u32>,
    /// Resource slots, for textures, samplers and buffers. Usually one entry.
    pub binding_points: Vec<i32>,
}

impl ModuleParameterInstance {
    pub fn operand(&self, set: &str) -> Operand {
        Operand::ModuleParam {
            set: set.to_owned(),
            key: self.key.clone(),
            ty: self.ty.clone(),
        }
    }
}

/// The parameters of one module instance bound to a descriptor set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModuleParameterSet {
    pub binding_name: String,
    pub buffer_size: u32,
    pub descriptor_set_id: i32,
    pub uniform_buffer_legacy_binding_point: i32,
    pub parameters: Vec<ModuleParameterInstance>,
}

impl ModuleParameterSet {
    pub fn parameter(&self, key: &str) -> Option<&ModuleParameterInstance> {
        self.parameters.iter().find(|p| p.key == key)
    }

    pub fn parameter_mut(&mut self, key: &str) -> Option<&mut ModuleParameterInstance> {
        self.parameters.iter_mut().find(|p| p.key == key)
    }
}

/// A pipeline stage the backend emits an entry point for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IlStage {
    pub name: String,
    pub stage_type: String,
    pub position: CodePosition,
    pub attributes: Attributes,
}

/// Lowered code of one world.
#[derive(Clone, Debug, PartialEq)]
pub struct IlWorld {
    pub name: String,
    pub position: CodePosition,
    pub is_abstract: bool,
    pub attributes: Attributes,
    pub output_type: RecordType,
    pub inputs: Vec<ObjectDefinition>,
    pub code: CfgNode,
    /// Component unique name to the value computing it.
    pub components: BTreeMap<String, Operand>,
    /// Transitive closure of the functions this world calls.
    pub referenced_functions: BTreeSet<String>,
}

impl IlWorld {
    pub fn new(name: impl Into<String>, position: CodePosition) -> Self {
        let name = name.into();
        Self {
            output_type: RecordType::new(name.clone()),
            name,
            position,
            is_abstract: false,
            attributes: Attributes::new(),
            inputs: Vec::new(),
            code: CfgNode::new(),
            components: BTreeMap::new(),
            referenced_functions: BTreeSet::new(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct IlShader {
    pub name: String,
    pub position: CodePosition,
    /// Worlds in declaration order.
    pub worlds: Vec<IlWorld>,
    /// Binding name to parameter set.
    pub module_param_sets: BTreeMap<String, ModuleParameterSet>,
    pub stages: BTreeMap<String, IlStage>,
}

impl IlShader {
    pub fn world(&self, name: &str) -> Option<&IlWorld> {
        self.worlds.iter().find(|w| w.name == name)
    }

    pub fn world_mut(&mut self, name: &str) -> Option<&mut IlWorld> {
        self.worlds.iter_mut().find(|w| w.name == name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IlParameter {
    pub name: String,
    pub ty: IlType,
    pub qualifier: ParameterQualifier,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IlFunction {
    pub name: String,
    pub parameters: Vec<IlParameter>,
    pub return_type: IlType,
    pub code: CfgNode,
    /// Functions called from this function's body.
    pub referenced_functions: BTreeSet<String>,
}

/// A complete lowered program.
#[derive(Clone, Debug, Default)]
pub struct IlProgram {
    pub structs: Vec<Arc<StructType>>,
    pub functions: BTreeMap<String, IlFunction>,
    pub shaders: BTreeMap<String, IlShader>,
    /// Module-scope variables, in declaration order.
    pub globals: CfgNode,
    pub instructions: Arena<Instruction>,
    pub constants: ConstantPool,
}

impl IlProgram {
    pub fn new() -> Self {
        Self::default()
    }

    /// The type of any operand in this program.
    pub fn operand_type(&self, operand: &Operand) -> IlType {
        match operand {
            Operand::Inst(h) => self.instructions[*h].ty.clone(),
            Operand::Const(h) => self.constants[*h].ty(),
            Operand::ModuleParam { ty, .. } => ty.clone(),
            Operand::Undefined => IlType::VOID,
        }
    }

    pub fn instruction(&self, handle: Handle<Instruction>) -> &Instruction {
        &self.instructions[handle]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(name: &str) -> ObjectDefinition {
        ObjectDefinition {
            name: name.into(),
            ty: IlType::FLOAT,
            attributes: Attributes::new(),
            position: CodePosition::unknown(),
            binding: None,
        }
    }

    #[test]
    fn record_members_are_unique() {
        let mut record = RecordType::new("vs");
        assert!(record.add_if_not_exists(member("pos")));
        assert!(record.add_if_not_exists(member("uv")));
        assert!(!record.add_if_not_exists(member("pos")));
        let names: Vec<_> = record.members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["pos", "uv"]);
    }

    #[test]
    fn operand_types() {
        let mut program = IlProgram::new();
        let c = program.constants.float(1.0);
        assert_eq!(program.operand_type(&Operand::Const(c)), IlType::FLOAT);
        let param = Operand::ModuleParam {
            set: "Material".into(),
            key: "albedo".into(),
            ty: IlType::INT,
        };
        assert_eq!(program.operand_type(&param), IlType::INT);
    }
}
