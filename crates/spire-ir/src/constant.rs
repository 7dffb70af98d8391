//! Deduplicated constant operands.

use std::fmt;

use crate::arena::{Handle, UniqueArena};
use crate::types::{BaseType, IlType};

/// Bit pattern of an `f32`, so constants can be hashed and compared exactly.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct FloatBits(pub u32);

impl FloatBits {
    pub fn new(value: f32) -> Self {
        Self(value.to_bits())
    }

    pub fn get(self) -> f32 {
        f32::from_bits(self.0)
    }
}

/// A constant value. Vectors hold two to four components.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub enum Constant {
    Bool(bool),
    Int(i32),
    UInt(u32),
    Float(FloatBits),
    IntVector(Vec<i32>),
    FloatVector(Vec<FloatBits>),
}

impl Constant {
    pub fn ty(&self) -> IlType {
        match self {
            Self::Bool(_) => IlType::BOOL,
            Self::Int(_) => IlType::INT,
            Self::UInt(_) => IlType::UINT,
            Self::Float(_) => IlType::FLOAT,
            Self::IntVector(v) => IlType::vector(BaseType::Int, v.len() as u32),
            Self::FloatVector(v) => IlType::vector(BaseType::Float, v.len() as u32),
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}u"),
            Self::Float(v) => write!(f, "{:?}f", v.get()),
            Self::IntVector(values) => {
                let parts: Vec<_> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "int{}({})", values.len(), parts.join(", "))
            }
            Self::FloatVector(values) => {
                let parts: Vec<_> = values.iter().map(|v| format!("{:?}f", v.get())).collect();
                write!(f, "float{}({})", values.len(), parts.join(", "))
            }
        }
    }
}

/// The single owner of every constant operand in a program.
#[derive(Clone, Debug, Default)]
pub struct ConstantPool {
    constants: UniqueArena<Constant>,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, constant: Constant) -> Handle<Constant> {
        self.constants.insert(constant)
    }

    pub fn bool(&mut self, value: bool) -> Handle<Constant> {
        self.insert(Constant::Bool(value))
    }

    pub fn int(&mut self, value: i32) -> Handle<Constant> {
        self.insert(Constant::Int(value))
    }

    pub fn uint(&mut self, value: u32) -> Handle<Constant> {
        self.insert(Constant::UInt(value))
    }

    pub fn float(&mut self, value: f32) -> Handle<Constant> {
        self.insert(Constant::Float(FloatBits::new(value)))
    }

    /// Zero of the given type, if the type has a scalar or vector zero.
    pub fn default_value(&mut self, ty: &IlType) -> Option<Handle<Constant>> {
        let constant = match ty {
            IlType::Basic(BaseType::Float) => Constant::Float(FloatBits::new(0.0)),
            IlType::Basic(BaseType::Int) => Constant::Int(0),
            IlType::Basic(BaseType::UInt) => Constant::UInt(0),
            IlType::Basic(BaseType::Bool) => Constant::Bool(false),
            IlType::Vector {
                base: BaseType::Float,
                size,
            } => Constant::FloatVector(vec![FloatBits::new(0.0); *size as usize]),
            IlType::Vector {
                base: BaseType::Int,
                size,
            } => Constant::IntVector(vec![0; *size as usize]),
            _ => return None,
        };
        Some(self.insert(constant))
    }

    pub fn len(&self) -> usize {
        self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle<Constant>, &Constant)> {
        self.constants.iter()
    }
}

impl std::ops::Index<Handle<Constant>> for ConstantPool {
    type Output = Constant;

    fn index(&self, handle: Handle<Constant>) -> &Constant {
        &self.constants[handle]
    }
}
