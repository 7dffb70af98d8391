use std::collections::HashSet;

use spire_backend_core::BackendRegistry;
use spire_codegen::{
    ComponentBody, ComponentDefinitionIr, ImportOperatorDef, ModuleInstanceIr, PipelineIr,
    ShaderIr, TypeTranslator, UNIFORM_WORLD, WorldDecl,
};
use spire_compiler::{
    CompileError, CompileOptions, CompileResult, CompileUnit, ScopeChecker, SemanticChecker,
    Session,
};
use spire_ir::{Attribute, Attributes, DiagnosticKind, DiagnosticSink, IlType};
use spire_parser::Program;
use spire_parser::ast::{ConstantValue, Decl, DeclId, ExprKind, Operator, StmtKind, walk_expr};

/// Builds one shader from attributed top-level variables:
///
/// ```text
/// [Input(vs)] float3 pos;             // world input
/// [Param] float3 tint;                // module parameter
/// [Param] [Binding(0)] Texture2D map; // resource with an explicit slot
/// [World(vs)] [Output] float3 p = pos * 2.0;
/// [World(fs)] float3 c = p * tint;    // p is imported from vs
/// ```
///
/// Worlds are ordered by first use; each world can import from the one
/// declared before it through `to_<world>`, a pass-through operator. All
/// components belong to the module `Material`, bound as `material`.
#[allow(dead_code)]
pub struct AttributeChecker {
    pub shader_name: String,
    pub binding_index: Option<i32>,
}

#[allow(dead_code)]
impl AttributeChecker {
    pub fn new(shader_name: &str) -> Self {
        Self {
            shader_name: shader_name.into(),
            binding_index: Some(0),
        }
    }
}

enum Role {
    Input(String),
    Param,
    World(String),
}

struct Found {
    decl: DeclId,
    role: Role,
    is_output: bool,
    binding: Option<String>,
}

/// First argument of attribute `name`, as written.
fn attribute_word(program: &Program, decl: &Decl, name: &str) -> Option<Option<String>> {
    let args = decl.modifiers.attribute(name)?;
    Some(args.first().and_then(|&arg| match &program.exprs[arg].kind {
        ExprKind::Var { name, .. } => Some(name.clone()),
        ExprKind::Constant(ConstantValue::Int(n)) => Some(n.to_string()),
        _ => None,
    }))
}

impl SemanticChecker for AttributeChecker {
    fn check(
        &mut self,
        unit: &mut CompileUnit,
        predefined: &Program,
        sink: &mut DiagnosticSink,
    ) -> Vec<ShaderIr> {
        // Components leave the member list; the rest is ordinary code.
        let mut found = Vec::new();
        let mut plain = Vec::new();
        for &member in &unit.program.members {
            let program = &unit.program;
            let decl = &program.decls[member];
            let role = if let Some(world) = attribute_word(program, decl, "Input") {
                Role::Input(world.unwrap_or_default())
            } else if attribute_word(program, decl, "Param").is_some() {
                Role::Param
            } else if let Some(world) = attribute_word(program, decl, "World") {
                Role::World(world.unwrap_or_default())
            } else {
                plain.push(member);
                continue;
            };
            found.push(Found {
                decl: member,
                role,
                is_output: decl.modifiers.attribute("Output").is_some(),
                binding: attribute_word(program, decl, "Binding").flatten(),
            });
        }
        unit.program.members = plain;
        ScopeChecker.check(unit, predefined, sink);
        if found.is_empty() {
            return Vec::new();
        }

        let program = &mut unit.program;
        let mut worlds: Vec<String> = Vec::new();
        for f in &found {
            if let Role::Input(w) | Role::World(w) = &f.role {
                if !worlds.contains(w) {
                    worlds.push(w.clone());
                }
            }
        }
        let pipeline = pipeline(program, &worlds);
        let mut shader = ShaderIr::new(self.shader_name.clone(), program.position.clone(), pipeline);
        shader.add_module_instance(ModuleInstanceIr {
            module_name: "Material".into(),
            binding_name: "material".into(),
            binding_index: self.binding_index,
            using_position: program.position.clone(),
        });

        let mut types = TypeTranslator::new();
        for f in &found {
            let decl = &program.decls[f.decl];
            let var = decl.as_variable();
            let ty = var
                .and_then(|v| types.type_expr(program, v.ty))
                .unwrap_or(IlType::VOID);
            let (world, unique, body) = match &f.role {
                Role::Input(w) => (w.clone(), format!("{}_{w}", decl.name), ComponentBody::Input),
                Role::Param => (
                    UNIFORM_WORLD.to_owned(),
                    format!("{}_u", decl.name),
                    ComponentBody::Param,
                ),
                Role::World(w) => {
                    let body = match var.and_then(|v| v.init) {
                        Some(init) => ComponentBody::Expression(init),
                        None => ComponentBody::Input,
                    };
                    (w.clone(), format!("{}_{w}", decl.name), body)
                }
            };
            let mut attributes = Attributes::new();
            if let Some(binding) = &f.binding {
                attributes.insert(
                    "Binding".into(),
                    Attribute {
                        value: binding.clone(),
                        position: decl.position.clone(),
                    },
                );
            }
            shader.add_definition(ComponentDefinitionIr {
                unique_name: unique,
                original_name: decl.name.clone(),
                component: decl.name.clone(),
                module: 0,
                world,
                ty,
                position: decl.position.clone(),
                attributes,
                is_output: f.is_output,
                is_function: false,
                params: Vec::new(),
                body,
                dependencies: Vec::new(),
            });
        }

        // Point component references at their definitions.
        for index in 0..shader.definitions.len() {
            let ComponentBody::Expression(root) = shader.definitions[index].body else {
                continue;
            };
            let world = shader.definitions[index].world.clone();
            let mut vars = Vec::new();
            let mut called = HashSet::new();
            walk_expr(program, root, &mut |e| match &program.exprs[e].kind {
                ExprKind::Var {
                    name,
                    component: None,
                } => vars.push((e, name.clone())),
                ExprKind::Invoke { function, .. } => {
                    called.insert(*function);
                }
                _ => {}
            });
            let previous = worlds
                .iter()
                .position(|w| *w == world)
                .and_then(|i| i.checked_sub(1))
                .map(|i| worlds[i].clone());
            for (expr, name) in vars {
                if called.contains(&expr) || is_global_variable(program, &name) {
                    continue;
                }
                let Some(by_world) = shader.definitions_by_component.get(&name) else {
                    let position = program.exprs[expr].position.clone();
                    sink.diagnose(&position, DiagnosticKind::UndefinedIdentifier(name));
                    continue;
                };
                let local = by_world
                    .get(&world)
                    .or_else(|| by_world.get(UNIFORM_WORLD))
                    .copied();
                if let Some(dep) = local {
                    let unique = shader.definitions[dep].unique_name.clone();
                    program.exprs[expr].kind = ExprKind::Var {
                        name,
                        component: Some(unique),
                    };
                    shader.definitions[index].dependencies.push(dep);
                } else if let Some(dep) = previous.as_ref().and_then(|p| by_world.get(p)).copied() {
                    let position = program.exprs[expr].position.clone();
                    let one = program.add_expr(ExprKind::Constant(ConstantValue::Float(1.0)), position);
                    program.exprs[expr].kind = ExprKind::Import {
                        operator: format!("to_{world}"),
                        component: shader.definitions[dep].unique_name.clone(),
                        args: vec![one],
                    };
                    shader.definitions[index].dependencies.push(dep);
                } else {
                    let position = program.exprs[expr].position.clone();
                    sink.diagnose(&position, DiagnosticKind::UndefinedIdentifier(name));
                }
            }
        }
        vec![shader]
    }
}

fn is_global_variable(program: &Program, name: &str) -> bool {
    program
        .members
        .iter()
        .any(|&m| program.decls[m].name == name && program.decls[m].as_variable().is_some())
}

/// Concrete worlds plus one pass-through import operator per adjacent pair.
fn pipeline(program: &mut Program, worlds: &[String]) -> PipelineIr {
    let at = program.position.clone();
    let mut import_operators = Vec::new();
    for pair in worlds.windows(2) {
        // return project(w) * w;
        let w = program.add_expr(
            ExprKind::Var {
                name: "w".into(),
                component: None,
            },
            at.clone(),
        );
        let projected = program.add_expr(ExprKind::Project { base: w }, at.clone());
        let w_again = program.add_expr(
            ExprKind::Var {
                name: "w".into(),
                component: None,
            },
            at.clone(),
        );
        let value = program.add_expr(
            ExprKind::Operator {
                op: Operator::Mul,
                args: vec![projected, w_again],
            },
            at.clone(),
        );
        let ret = program.add_stmt(StmtKind::Return(Some(value)), at.clone());
        let body = program.add_stmt(StmtKind::Block(vec![ret]), at.clone());
        import_operators.push(ImportOperatorDef {
            name: format!("to_{}", pair[1]),
            position: at.clone(),
            source_world: pair[0].clone(),
            dest_world: pair[1].clone(),
            type_param: "T".into(),
            params: vec!["w".into()],
            body,
        });
    }
    PipelineIr {
        name: "Forward".into(),
        worlds: worlds
            .iter()
            .map(|w| WorldDecl {
                name: w.clone(),
                position: at.clone(),
                is_abstract: false,
                attributes: Attributes::new(),
            })
            .collect(),
        import_operators,
        stages: Vec::new(),
    }
}

/// Parses `source` as `main.spire` and compiles it to the IL dump.
#[allow(dead_code)]
pub fn compile(
    session: &Session,
    source: &str,
    checker: &mut dyn SemanticChecker,
) -> (CompileResult, Result<(), CompileError>) {
    let options = CompileOptions::default();
    let mut result = CompileResult::new();
    let unit = session.parse(&mut result, &options, source, "main.spire", None);
    let outcome = session.compile(
        &mut result,
        &mut [unit],
        &options,
        checker,
        &BackendRegistry::with_builtins(),
    );
    (result, outcome)
}

/// Like [`compile`], panicking on any diagnostic.
#[allow(dead_code)]
pub fn compile_clean(session: &Session, source: &str, checker: &mut dyn SemanticChecker) -> CompileResult {
    let (result, outcome) = compile(session, source, checker);
    assert!(
        result.sink.diagnostics().is_empty(),
        "{}",
        result.diagnostic_text()
    );
    outcome.expect("compile failed");
    result
}
