//! std140 buffer layout.
//!
//! Rules implemented here:
//!
//! - scalars are 4 bytes, aligned to 4 (`uint64_t` is 8/8);
//! - a vector of `n` elements of size `e` is `e * n` bytes, aligned to the
//!   next power of two of `e * n` (so `float2` aligns to 8, `float3` and
//!   `float4` to 16);
//! - array elements are aligned to at least 16 and the stride is the
//!   element size rounded up to that alignment;
//! - a matrix is an array of its row vectors;
//! - a struct is aligned to at least 16, fields are placed in order at
//!   their own alignment and the total size is rounded up to the struct
//!   alignment.
//!
//! Resource types (textures, samplers, buffers) occupy no buffer space and
//! have no layout. Sizes that do not fit in `u32` are reported as
//! [`LayoutError::Overflow`].

use crate::types::{BaseType, IlType};

/// Size and alignment of a type in bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayoutInfo {
    pub size: u32,
    pub alignment: u32,
}

/// Why a type has no place in a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    /// Resources, records and generic types are not stored in a buffer.
    #[error("type is not stored in a buffer")]
    NotInBuffer,
    #[error("type does not fit in a 32-bit buffer")]
    Overflow,
}

/// Rounds `offset` up to the next multiple of `alignment`.
pub fn round_to_alignment(offset: u32, alignment: u32) -> Result<u32, LayoutError> {
    if alignment <= 1 {
        return Ok(offset);
    }
    offset
        .div_ceil(alignment)
        .checked_mul(alignment)
        .ok_or(LayoutError::Overflow)
}

const MIN_AGGREGATE_ALIGNMENT: u32 = 16;

/// std140 layout of `ty`.
pub fn std140(ty: &IlType) -> Result<LayoutInfo, LayoutError> {
    match ty {
        IlType::Basic(BaseType::Void) => Err(LayoutError::NotInBuffer),
        IlType::Basic(base) => Ok(LayoutInfo {
            size: base.size(),
            alignment: base.size(),
        }),
        IlType::Vector { base, size } => {
            let bytes = base.size() * size;
            Ok(LayoutInfo {
                size: bytes,
                alignment: bytes.next_power_of_two(),
            })
        }
        IlType::Matrix {
            base,
            rows,
            columns,
        } => array_layout(&IlType::vector(*base, *columns), *rows),
        IlType::Array { base, len } => array_layout(base, *len),
        IlType::Struct(s) => {
            let mut offset = 0u32;
            let mut alignment = MIN_AGGREGATE_ALIGNMENT;
            for field in &s.fields {
                let field_layout = std140(&field.ty)?;
                offset = round_to_alignment(offset, field_layout.alignment)?
                    .checked_add(field_layout.size)
                    .ok_or(LayoutError::Overflow)?;
                alignment = alignment.max(field_layout.alignment);
            }
            Ok(LayoutInfo {
                size: round_to_alignment(offset, alignment)?,
                alignment,
            })
        }
        IlType::Texture { .. }
        | IlType::SamplerState { .. }
        | IlType::ArrayLike { .. }
        | IlType::PointerLike { .. }
        | IlType::Generic { .. }
        | IlType::Record(_) => Err(LayoutError::NotInBuffer),
    }
}

fn array_layout(element: &IlType, len: u32) -> Result<LayoutInfo, LayoutError> {
    let element = std140(element)?;
    let alignment = element.alignment.max(MIN_AGGREGATE_ALIGNMENT);
    let stride = round_to_alignment(element.size, alignment)?;
    Ok(LayoutInfo {
        size: stride.checked_mul(len).ok_or(LayoutError::Overflow)?,
        alignment,
    })
}

/// Offset and size of a value placed in a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    pub offset: u32,
    pub size: u32,
}

/// Places `ty` at the running `cursor` and advances the cursor past it.
///
/// On error the cursor is left unchanged.
pub fn place(cursor: &mut u32, ty: &IlType) -> Result<Placement, LayoutError> {
    let layout = std140(ty)?;
    let offset = round_to_alignment(*cursor, layout.alignment)?;
    *cursor = offset.checked_add(layout.size).ok_or(LayoutError::Overflow)?;
    Ok(Placement {
        offset,
        size: layout.size,
    })
}
