//! Translation of checked types into IL types.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use spire_ir::{BaseType, IlType, StructField, StructType, TextureFlavor, TextureShape};
use spire_parser::Program;
use spire_parser::ast::{DeclId, DeclKind, ExprId, ExprKind, VarKind};

/// Resolves type annotations for the code generator.
///
/// World names and the type parameter of the import operator being lowered
/// are generic: annotations refer to them as `IlType::Record(name)` and the
/// current mapping decides what they stand for. Struct types are translated
/// once per declaration and shared afterwards.
#[derive(Debug, Default)]
pub struct TypeTranslator {
    generic_mappings: HashMap<String, IlType>,
    structs: HashMap<DeclId, Arc<StructType>>,
    structs_by_name: HashMap<String, Arc<StructType>>,
    /// Typedefs and structs currently being resolved.
    resolving: HashSet<DeclId>,
}

impl TypeTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `name` to `ty`, returning the mapping it replaces.
    pub fn set_mapping(&mut self, name: &str, ty: IlType) -> Option<IlType> {
        self.generic_mappings.insert(name.to_owned(), ty)
    }

    /// Undoes a [`set_mapping`](Self::set_mapping).
    pub fn restore_mapping(&mut self, name: &str, previous: Option<IlType>) {
        match previous {
            Some(ty) => {
                self.generic_mappings.insert(name.to_owned(), ty);
            }
            None => {
                self.generic_mappings.remove(name);
            }
        }
    }

    pub fn mapping(&self, name: &str) -> Option<&IlType> {
        self.generic_mappings.get(name)
    }

    pub fn clear_mappings(&mut self) {
        self.generic_mappings.clear();
    }

    /// Substitutes generic names and shares struct types.
    pub fn translate(&self, ty: &IlType) -> IlType {
        match ty {
            IlType::Record(name) => self
                .generic_mappings
                .get(name)
                .cloned()
                .unwrap_or_else(|| ty.clone()),
            IlType::Struct(s) => match self.structs_by_name.get(&s.name) {
                Some(shared) => IlType::Struct(Arc::clone(shared)),
                None => ty.clone(),
            },
            IlType::Array { base, len } => IlType::array(self.translate(base), *len),
            IlType::Texture { base, flavor } => IlType::Texture {
                base: Box::new(self.translate(base)),
                flavor: *flavor,
            },
            IlType::ArrayLike { base, kind } => IlType::ArrayLike {
                base: Box::new(self.translate(base)),
                kind: *kind,
            },
            IlType::PointerLike { base, kind } => IlType::PointerLike {
                base: Box::new(self.translate(base)),
                kind: *kind,
            },
            IlType::Generic { name, base } => IlType::Generic {
                name: name.clone(),
                base: Box::new(self.translate(base)),
            },
            IlType::Basic(_)
            | IlType::Vector { .. }
            | IlType::Matrix { .. }
            | IlType::SamplerState { .. } => ty.clone(),
        }
    }

    /// The IL type of struct declaration `decl`, translated on first use.
    ///
    /// Returns the type and whether this call created it.
    pub fn translate_struct(&mut self, program: &Program, decl: DeclId) -> (Arc<StructType>, bool) {
        if let Some(existing) = self.structs.get(&decl) {
            return (Arc::clone(existing), false);
        }
        let node = &program.decls[decl];
        let is_intrinsic = matches!(node.kind, DeclKind::Struct { is_intrinsic: true, .. });
        self.resolving.insert(decl);
        let mut fields = Vec::new();
        for &member in node.members() {
            let member_decl = &program.decls[member];
            let Some(var) = member_decl.as_variable() else {
                continue;
            };
            if var.kind != VarKind::Field {
                continue;
            }
            fields.push(StructField {
                name: member_decl.name.clone(),
                ty: self.type_expr(program, var.ty).unwrap_or(IlType::VOID),
            });
        }
        self.resolving.remove(&decl);
        let ty = Arc::new(StructType {
            name: node.name.clone(),
            is_intrinsic,
            fields,
        });
        self.structs.insert(decl, Arc::clone(&ty));
        self.structs_by_name.insert(node.name.clone(), Arc::clone(&ty));
        (ty, true)
    }

    /// The type a type expression denotes.
    ///
    /// Uses the checker's annotation when present. Otherwise resolves the
    /// syntax: built-in scalar, vector and matrix names, generic mappings,
    /// top-level structs and typedefs, and array suffixes. A name that is
    /// already being resolved does not resolve again.
    pub fn type_expr(&mut self, program: &Program, expr: ExprId) -> Option<IlType> {
        let node = &program.exprs[expr];
        if let Some(ty) = &node.ty {
            return Some(self.translate(ty));
        }
        match &node.kind {
            ExprKind::Var { name, .. } => {
                if let Some(ty) = builtin_type(name) {
                    return Some(ty);
                }
                if let Some(ty) = self.generic_mappings.get(name) {
                    return Some(ty.clone());
                }
                let decl = program.find_members(name).find(|&d| {
                    matches!(
                        program.decls[d].kind,
                        DeclKind::Struct { .. } | DeclKind::TypeDef { .. }
                    )
                })?;
                if self.resolving.contains(&decl) {
                    return None;
                }
                match program.decls[decl].kind {
                    DeclKind::TypeDef { ty } => {
                        self.resolving.insert(decl);
                        let resolved = self.type_expr(program, ty);
                        self.resolving.remove(&decl);
                        resolved
                    }
                    _ => Some(IlType::Struct(self.translate_struct(program, decl).0)),
                }
            }
            ExprKind::Index { base, index } => {
                let base = self.type_expr(program, *base)?;
                let len = match index {
                    Some(index) => match program.exprs[*index].kind {
                        ExprKind::Constant(spire_parser::ast::ConstantValue::Int(n)) => {
                            u32::try_from(n).ok()?
                        }
                        _ => return None,
                    },
                    None => 0,
                };
                Some(IlType::array(base, len))
            }
            _ => None,
        }
    }
}

// ----------------------------------------------------------------------
// Recursive type detection
// ----------------------------------------------------------------------

/// Top-level typedefs and structs whose definition reaches back to
/// themselves, in declaration order.
///
/// Follows names the way [`TypeTranslator::type_expr`] resolves them, so a
/// program without such declarations translates every type in finite steps.
pub fn recursive_type_decls(program: &Program) -> Vec<DeclId> {
    program
        .members
        .iter()
        .copied()
        .filter(|&decl| {
            let mut visited = HashSet::new();
            reaches(program, decl, decl, &mut visited)
        })
        .collect()
}

fn reaches(program: &Program, from: DeclId, target: DeclId, visited: &mut HashSet<DeclId>) -> bool {
    for next in referenced_type_decls(program, from) {
        if next == target {
            return true;
        }
        if visited.insert(next) && reaches(program, next, target, visited) {
            return true;
        }
    }
    false
}

/// Named types a typedef or struct is defined with.
fn referenced_type_decls(program: &Program, decl: DeclId) -> Vec<DeclId> {
    let node = &program.decls[decl];
    match &node.kind {
        DeclKind::TypeDef { ty } => named_type_decl(program, *ty).into_iter().collect(),
        DeclKind::Struct { .. } => node
            .members()
            .iter()
            .filter_map(|&member| program.decls[member].as_variable())
            .filter(|var| var.kind == VarKind::Field)
            .filter_map(|var| named_type_decl(program, var.ty))
            .collect(),
        _ => Vec::new(),
    }
}

fn named_type_decl(program: &Program, expr: ExprId) -> Option<DeclId> {
    match &program.exprs[expr].kind {
        ExprKind::Index { base, .. } => named_type_decl(program, *base),
        ExprKind::Var { name, .. } => {
            if builtin_type(name).is_some() {
                return None;
            }
            program.find_members(name).find(|&d| {
                matches!(
                    program.decls[d].kind,
                    DeclKind::Struct { .. } | DeclKind::TypeDef { .. }
                )
            })
        }
        _ => None,
    }
}

/// `float`, `int3`, `float4x4` and the like.
pub(crate) fn builtin_type(name: &str) -> Option<IlType> {
    if let Some(base) = BaseType::from_name(name) {
        return Some(IlType::Basic(base));
    }
    if let Some(ty) = resource_type(name) {
        return Some(ty);
    }
    let split = name.find(|c: char| c.is_ascii_digit())?;
    let (base, dims) = name.split_at(split);
    let base = match base {
        "float" => BaseType::Float,
        "int" => BaseType::Int,
        "uint" => BaseType::UInt,
        "bool" => BaseType::Bool,
        _ => return None,
    };
    let dim = |text: &str| match text.parse::<u32>() {
        Ok(n @ 1..=4) => Some(n),
        _ => None,
    };
    match dims.split_once('x') {
        None => Some(IlType::vector(base, dim(dims)?)),
        Some((rows, columns)) => Some(IlType::Matrix {
            base,
            rows: dim(rows)?,
            columns: dim(columns)?,
        }),
    }
}

/// Texture and sampler names usable without an annotation.
fn resource_type(name: &str) -> Option<IlType> {
    let (shape, array, shadow) = match name {
        "Texture1D" => (TextureShape::Texture1D, false, false),
        "Texture2D" | "texture" | "Texture" => (TextureShape::Texture2D, false, false),
        "Texture2DArray" => (TextureShape::Texture2D, true, false),
        "Texture2DArrayShadow" => (TextureShape::Texture2D, true, true),
        "Texture3D" => (TextureShape::Texture3D, false, false),
        "TextureCube" => (TextureShape::TextureCube, false, false),
        "TextureCubeShadow" => (TextureShape::TextureCube, false, true),
        "SamplerState" | "sampler" | "sampler_state" => {
            return Some(IlType::SamplerState { comparison: false });
        }
        "SamplerComparisonState" => return Some(IlType::SamplerState { comparison: true }),
        _ => return None,
    };
    let mut flavor = TextureFlavor::new(shape);
    flavor.array = array;
    flavor.shadow = shadow;
    Some(IlType::Texture {
        base: Box::new(IlType::vector(BaseType::Float, 4)),
        flavor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use spire_ir::DiagnosticSink;
    use spire_parser::{ParseOptions, parse, tokenize};

    fn program(source: &str) -> Program {
        let mut sink = DiagnosticSink::new();
        let tokens = tokenize("types.spire", source, &mut sink);
        let program = parse(
            &tokens,
            &mut sink,
            "types.spire",
            Some(&Program::default()),
            &ParseOptions::default(),
        );
        assert!(!sink.has_errors(), "{}", sink.output());
        program
    }

    #[test]
    fn builtin_names() {
        assert_eq!(builtin_type("float"), Some(IlType::FLOAT));
        assert_eq!(builtin_type("int3"), Some(IlType::vector(BaseType::Int, 3)));
        assert_eq!(
            builtin_type("float4x4"),
            Some(IlType::Matrix {
                base: BaseType::Float,
                rows: 4,
                columns: 4
            })
        );
        assert_eq!(builtin_type("float5"), None);
        assert_eq!(builtin_type("Light"), None);
    }

    #[test]
    fn resource_names() {
        let texture = builtin_type("Texture2D").expect("texture");
        assert_eq!(texture.to_string(), "Texture2D");
        assert_eq!(
            texture.bindable_resource_type(),
            spire_ir::BindableResourceType::Texture
        );
        match builtin_type("TextureCubeShadow") {
            Some(IlType::Texture { flavor, .. }) => {
                assert_eq!(flavor.shape, TextureShape::TextureCube);
                assert!(flavor.shadow && !flavor.array);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            builtin_type("SamplerComparisonState"),
            Some(IlType::SamplerState { comparison: true })
        );
    }

    #[test]
    fn generic_mapping_is_scoped() {
        let mut types = TypeTranslator::new();
        let record = IlType::Record("T".into());
        assert_eq!(types.translate(&record), record);
        let previous = types.set_mapping("T", IlType::FLOAT);
        assert_eq!(types.translate(&IlType::array(record.clone(), 2)), IlType::array(IlType::FLOAT, 2));
        let inner = types.set_mapping("T", IlType::INT);
        assert_eq!(types.translate(&record), IlType::INT);
        types.restore_mapping("T", inner);
        assert_eq!(types.translate(&record), IlType::FLOAT);
        types.restore_mapping("T", previous);
        assert_eq!(types.mapping("T"), None);
    }

    #[test]
    fn structs_are_translated_once() {
        let program = program("struct Light { float3 dir; float intensity[2]; }; typedef Light Sun;");
        let mut types = TypeTranslator::new();
        let decl = program.find_members("Light").next().expect("struct");
        let (first, created) = types.translate_struct(&program, decl);
        assert!(created);
        assert_eq!(first.fields.len(), 2);
        assert_eq!(first.fields[1].ty, IlType::array(IlType::FLOAT, 2));
        let (second, created) = types.translate_struct(&program, decl);
        assert!(!created);
        assert!(Arc::ptr_eq(&first, &second));

        let sun = program.find_members("Sun").next().expect("typedef");
        let DeclKind::TypeDef { ty } = program.decls[sun].kind else {
            panic!("expected typedef");
        };
        match types.type_expr(&program, ty) {
            Some(IlType::Struct(s)) => assert!(Arc::ptr_eq(&s, &first)),
            other => panic!("unexpected {other:?}"),
        }
    }

    fn unchecked_program(source: &str) -> Program {
        let mut sink = DiagnosticSink::new();
        let tokens = tokenize("types.spire", source, &mut sink);
        parse(
            &tokens,
            &mut sink,
            "types.spire",
            Some(&Program::default()),
            &ParseOptions::default(),
        )
    }

    fn recursive_names(program: &Program) -> Vec<&str> {
        recursive_type_decls(program)
            .into_iter()
            .map(|d| program.decls[d].name.as_str())
            .collect()
    }

    #[test]
    fn self_referencing_typedefs_are_found() {
        let program = unchecked_program("typedef A A;");
        assert_eq!(recursive_names(&program), ["A"]);

        let program = unchecked_program("typedef A B; typedef B A; typedef float C;");
        assert_eq!(recursive_names(&program), ["B", "A"]);

        let program = unchecked_program("struct Node { float v; Node next[2]; }; struct Leaf { float v; };");
        assert_eq!(recursive_names(&program), ["Node"]);

        let program = unchecked_program("struct Light { float3 dir; }; typedef Light Sun; typedef Sun Star;");
        assert!(recursive_type_decls(&program).is_empty());
    }

    #[test]
    fn recursive_types_resolve_without_looping() {
        let program = unchecked_program("typedef A B; typedef B A; typedef A[4] C;");
        let mut types = TypeTranslator::new();
        for name in ["A", "B", "C"] {
            let decl = program.find_members(name).next().expect("typedef");
            let DeclKind::TypeDef { ty } = program.decls[decl].kind else {
                panic!("expected typedef");
            };
            assert_eq!(types.type_expr(&program, ty), None, "{name}");
        }

        let program = unchecked_program("struct S { float a; S inner; };");
        let decl = program.find_members("S").next().expect("struct");
        let (ty, _) = types.translate_struct(&program, decl);
        assert_eq!(ty.fields[0].ty, IlType::FLOAT);
        assert_eq!(ty.fields[1].ty, IlType::VOID);
    }
}
