//! Type system for the Spire IL.

use std::fmt;
use std::sync::Arc;

/// The scalar element kind of basic, vector and matrix types.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum BaseType {
    Void,
    Bool,
    Int,
    UInt,
    UInt64,
    Float,
}

impl BaseType {
    /// Size of one element in bytes.
    pub fn size(self) -> u32 {
        match self {
            Self::Void => 0,
            Self::UInt64 => 8,
            Self::Bool | Self::Int | Self::UInt | Self::Float => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::UInt => "uint",
            Self::UInt64 => "uint64_t",
            Self::Float => "float",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "void" => Self::Void,
            "bool" => Self::Bool,
            "int" => Self::Int,
            "uint" => Self::UInt,
            "uint64_t" => Self::UInt64,
            "float" => Self::Float,
            _ => return None,
        })
    }
}

/// Resource category that decides which binding registry a parameter uses.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum BindableResourceType {
    NonBindable,
    Texture,
    Sampler,
    Buffer,
    StorageBuffer,
}

impl BindableResourceType {
    /// The four bindable registries, in allocation order.
    pub const REGISTRIES: [Self; 4] = [
        Self::Texture,
        Self::Sampler,
        Self::Buffer,
        Self::StorageBuffer,
    ];

    /// Device limit on the number of slots of this kind per module.
    pub fn max_bindings(self) -> u32 {
        match self {
            Self::Texture | Self::Sampler => 32,
            Self::Buffer | Self::StorageBuffer => 16,
            Self::NonBindable => 0,
        }
    }
}

impl fmt::Display for BindableResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NonBindable => "non-bindable",
            Self::Texture => "texture",
            Self::Sampler => "sampler",
            Self::Buffer => "buffer",
            Self::StorageBuffer => "storage buffer",
        })
    }
}

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum TextureShape {
    Texture1D = 1,
    Texture2D = 2,
    Texture3D = 3,
    TextureCube = 4,
}

/// Shape plus sampling flags of a texture, packed into one integer when
/// serialised: bits 0-2 shape, bit 3 multisample, bit 4 array, bit 5 shadow.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct TextureFlavor {
    pub shape: TextureShape,
    pub multisample: bool,
    pub array: bool,
    pub shadow: bool,
}

impl TextureFlavor {
    const MULTISAMPLE: u32 = 1 << 3;
    const ARRAY: u32 = 1 << 4;
    const SHADOW: u32 = 1 << 5;

    pub fn new(shape: TextureShape) -> Self {
        Self {
            shape,
            multisample: false,
            array: false,
            shadow: false,
        }
    }

    pub fn bits(self) -> u32 {
        let mut bits = self.shape as u32;
        if self.multisample {
            bits |= Self::MULTISAMPLE;
        }
        if self.array {
            bits |= Self::ARRAY;
        }
        if self.shadow {
            bits |= Self::SHADOW;
        }
        bits
    }

    pub fn from_bits(bits: u32) -> Option<Self> {
        let shape = match bits & 0b111 {
            1 => TextureShape::Texture1D,
            2 => TextureShape::Texture2D,
            3 => TextureShape::Texture3D,
            4 => TextureShape::TextureCube,
            _ => return None,
        };
        Some(Self {
            shape,
            multisample: bits & Self::MULTISAMPLE != 0,
            array: bits & Self::ARRAY != 0,
            shadow: bits & Self::SHADOW != 0,
        })
    }
}

/// Array-like resource kinds. They all bind as storage buffers.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum ArrayLikeKind {
    Buffer = 0,
    RwBuffer = 1,
    StructuredBuffer = 2,
    RwStructuredBuffer = 3,
}

impl ArrayLikeKind {
    pub fn from_index(index: u32) -> Option<Self> {
        Some(match index {
            0 => Self::Buffer,
            1 => Self::RwBuffer,
            2 => Self::StructuredBuffer,
            3 => Self::RwStructuredBuffer,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Buffer => "Buffer",
            Self::RwBuffer => "RWBuffer",
            Self::StructuredBuffer => "StructuredBuffer",
            Self::RwStructuredBuffer => "RWStructuredBuffer",
        }
    }
}

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum PointerLikeKind {
    ConstantBuffer = 0,
}

impl PointerLikeKind {
    pub fn from_index(index: u32) -> Option<Self> {
        match index {
            0 => Some(Self::ConstantBuffer),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct StructField {
    pub name: String,
    pub ty: IlType,
}

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct StructType {
    pub name: String,
    pub is_intrinsic: bool,
    pub fields: Vec<StructField>,
}

/// A type in the IL.
///
/// Struct types are shared; every lowered reference to the same source
/// struct points at one `Arc<StructType>`.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub enum IlType {
    Basic(BaseType),
    Vector {
        base: BaseType,
        size: u32,
    },
    /// `rows` x `columns`; laid out as an array of row vectors.
    Matrix {
        base: BaseType,
        rows: u32,
        columns: u32,
    },
    Texture {
        base: Box<IlType>,
        flavor: TextureFlavor,
    },
    SamplerState {
        comparison: bool,
    },
    ArrayLike {
        base: Box<IlType>,
        kind: ArrayLikeKind,
    },
    PointerLike {
        base: Box<IlType>,
        kind: PointerLikeKind,
    },
    /// A named generic wrapper that the backend resolves, e.g. `ByteAddressBuffer`.
    Generic {
        name: String,
        base: Box<IlType>,
    },
    /// Fixed-size array; a length of zero means unsized.
    Array {
        base: Box<IlType>,
        len: u32,
    },
    Struct(Arc<StructType>),
    /// Output record of a world, referenced by name.
    Record(String),
}

impl IlType {
    pub const VOID: Self = Self::Basic(BaseType::Void);
    pub const BOOL: Self = Self::Basic(BaseType::Bool);
    pub const INT: Self = Self::Basic(BaseType::Int);
    pub const UINT: Self = Self::Basic(BaseType::UInt);
    pub const FLOAT: Self = Self::Basic(BaseType::Float);

    pub fn vector(base: BaseType, size: u32) -> Self {
        Self::Vector { base, size }
    }

    pub fn array(base: IlType, len: u32) -> Self {
        Self::Array {
            base: Box::new(base),
            len,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Self::Basic(BaseType::Void))
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Self::Basic(BaseType::Bool))
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Self::Basic(BaseType::Int))
    }

    pub fn is_uint(&self) -> bool {
        matches!(self, Self::Basic(BaseType::UInt | BaseType::UInt64))
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Self::Basic(BaseType::Float))
    }

    pub fn is_integral(&self) -> bool {
        self.is_int() || self.is_uint()
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Self::Basic(b) if *b != BaseType::Void)
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, Self::Vector { .. })
    }

    pub fn is_texture(&self) -> bool {
        matches!(self, Self::Texture { .. })
    }

    /// Base type of a scalar, vector or matrix.
    pub fn base_type(&self) -> Option<BaseType> {
        match self {
            Self::Basic(b) | Self::Vector { base: b, .. } | Self::Matrix { base: b, .. } => {
                Some(*b)
            }
            _ => None,
        }
    }

    /// Number of scalar components in a vector, 1 for scalars.
    pub fn vector_size(&self) -> u32 {
        match self {
            Self::Vector { size, .. } => *size,
            _ => 1,
        }
    }

    pub fn bindable_resource_type(&self) -> BindableResourceType {
        match self {
            Self::Texture { .. } => BindableResourceType::Texture,
            Self::SamplerState { .. } => BindableResourceType::Sampler,
            Self::PointerLike { .. } => BindableResourceType::Buffer,
            Self::ArrayLike { .. } => BindableResourceType::StorageBuffer,
            Self::Generic { name, .. } => match name.as_str() {
                "StructuredBuffer" | "RWStructuredBuffer" => BindableResourceType::StorageBuffer,
                "Buffer" | "RWBuffer" | "ByteAddressBuffer" | "RWByteAddressBuffer" => {
                    BindableResourceType::Buffer
                }
                _ => BindableResourceType::NonBindable,
            },
            _ => BindableResourceType::NonBindable,
        }
    }

    /// The element type obtained by indexing into this type.
    pub fn element_type(&self) -> Option<IlType> {
        match self {
            Self::Vector { base, .. } => Some(Self::Basic(*base)),
            Self::Matrix { base, columns, .. } => Some(Self::vector(*base, *columns)),
            Self::Array { base, .. }
            | Self::ArrayLike { base, .. }
            | Self::PointerLike { base, .. }
            | Self::Generic { base, .. } => Some((**base).clone()),
            _ => None,
        }
    }
}

impl fmt::Display for IlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic(b) => f.write_str(b.name()),
            Self::Vector { base, size } => write!(f, "{}{size}", base.name()),
            Self::Matrix {
                base,
                rows,
                columns,
            } => write!(f, "{}{rows}x{columns}", base.name()),
            Self::Texture { base, flavor } => {
                let shape = match flavor.shape {
                    TextureShape::Texture1D => "Texture1D",
                    TextureShape::Texture2D => "Texture2D",
                    TextureShape::Texture3D => "Texture3D",
                    TextureShape::TextureCube => "TextureCube",
                };
                f.write_str(shape)?;
                if flavor.multisample {
                    f.write_str("MS")?;
                }
                if flavor.array {
                    f.write_str("Array")?;
                }
                if flavor.shadow {
                    f.write_str("Shadow")?;
                }
                if !matches!(**base, Self::Vector { base: BaseType::Float, size: 4 }) {
                    write!(f, "<{base}>")?;
                }
                Ok(())
            }
            Self::SamplerState { comparison: false } => f.write_str("SamplerState"),
            Self::SamplerState { comparison: true } => f.write_str("SamplerComparisonState"),
            Self::ArrayLike { base, kind } => write!(f, "{}<{base}>", kind.name()),
            Self::PointerLike { base, .. } => write!(f, "ConstantBuffer<{base}>"),
            Self::Generic { name, base } => write!(f, "{name}<{base}>"),
            Self::Array { base, len: 0 } => write!(f, "{base}[]"),
            Self::Array { base, len } => write!(f, "{base}[{len}]"),
            Self::Struct(s) => f.write_str(&s.name),
            Self::Record(name) => f.write_str(name),
        }
    }
}
