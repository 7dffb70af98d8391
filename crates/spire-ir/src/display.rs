//! Text dump of an [`IlProgram`] for debugging and golden tests.

use std::fmt::Write as _;

use crate::inst::{CfgNode, InstKind, Operand, ParameterQualifier};
use crate::program::{IlFunction, IlProgram, IlShader, IlWorld, ObjectDefinition};

/// Formats an operand the way it appears in the dump.
pub fn format_operand(program: &IlProgram, operand: &Operand) -> String {
    match operand {
        Operand::Inst(h) => match &program.instructions[*h].name {
            Some(name) => format!("%{}({name})", h.index()),
            None => format!("%{}", h.index()),
        },
        Operand::Const(h) => program.constants[*h].to_string(),
        Operand::ModuleParam { set, key, .. } => format!("moduleParam<{set}.{key}>"),
        Operand::Undefined => "undef".into(),
    }
}

fn format_args(program: &IlProgram, args: &[Operand]) -> String {
    args.iter()
        .map(|a| format_operand(program, a))
        .collect::<Vec<_>>()
        .join(", ")
}

fn write_node(out: &mut String, program: &IlProgram, node: &CfgNode, indent: usize) {
    let pad = " ".repeat(indent);
    for &handle in &node.instructions {
        let inst = &program.instructions[handle];
        let op = |o: &Operand| format_operand(program, o);
        let lhs = match &inst.name {
            Some(name) => format!("%{}({name})", handle.index()),
            None => format!("%{}", handle.index()),
        };
        let ty = &inst.ty;
        let _ = match &inst.kind {
            InstKind::Binary { op: bin, left, right } => writeln!(
                out,
                "{pad}{lhs} = {} {}, {} : {ty}",
                bin.name(),
                op(left),
                op(right)
            ),
            InstKind::Unary { op: un, operand } => {
                writeln!(out, "{pad}{lhs} = {} {} : {ty}", un.name(), op(operand))
            }
            InstKind::Select {
                condition,
                accept,
                reject,
            } => writeln!(
                out,
                "{pad}{lhs} = select {} ? {} : {} : {ty}",
                op(condition),
                op(accept),
                op(reject)
            ),
            InstKind::Swizzle { operand, pattern } => {
                writeln!(out, "{pad}{lhs} = swizzle {}.{pattern} : {ty}", op(operand))
            }
            InstKind::Retrieve { base, index } => writeln!(
                out,
                "{pad}{lhs} = retrieve {}[{}] : {ty}",
                op(base),
                op(index)
            ),
            InstKind::Update { base, index, value } => writeln!(
                out,
                "{pad}update {}[{}] = {}",
                op(base),
                op(index),
                op(value)
            ),
            InstKind::Load { address } => writeln!(out, "{pad}{lhs} = load {} : {ty}", op(address)),
            InstKind::Store { address, value } => {
                writeln!(out, "{pad}store {} = {}", op(address), op(value))
            }
            InstKind::AllocVar { size } => {
                writeln!(out, "{pad}{lhs} = var {ty} [{}]", op(size))
            }
            InstKind::FetchArg { index, qualifier } => {
                let q = match qualifier {
                    ParameterQualifier::In => "",
                    ParameterQualifier::Out => "out ",
                    ParameterQualifier::InOut => "inout ",
                };
                writeln!(out, "{pad}{lhs} = arg {q}{index} : {ty}")
            }
            InstKind::Call {
                function,
                arguments,
                ..
            } => writeln!(
                out,
                "{pad}{lhs} = call {function}({}) : {ty}",
                format_args(program, arguments)
            ),
            InstKind::LoadInput { component } => {
                writeln!(out, "{pad}{lhs} = input {component} : {ty}")
            }
            InstKind::Export {
                component,
                world,
                value,
            } => writeln!(out, "{pad}export {world}.{component} = {}", op(value)),
            InstKind::Import {
                component,
                arguments,
                operator_code,
            } => {
                let _ = writeln!(
                    out,
                    "{pad}{lhs} = import {component}({}) : {ty} {{",
                    format_args(program, arguments)
                );
                write_node(out, program, operator_code, indent + 4);
                writeln!(out, "{pad}}}")
            }
            InstKind::Project { component, operand } => writeln!(
                out,
                "{pad}{lhs} = project {}.{component} : {ty}",
                op(operand)
            ),
            InstKind::If {
                condition,
                accept,
                reject,
            } => {
                let _ = writeln!(out, "{pad}if {} {{", op(condition));
                write_node(out, program, accept, indent + 4);
                if let Some(reject) = reject {
                    let _ = writeln!(out, "{pad}}} else {{");
                    write_node(out, program, reject, indent + 4);
                }
                writeln!(out, "{pad}}}")
            }
            InstKind::While { condition, body } => {
                let _ = writeln!(out, "{pad}while {{");
                write_node(out, program, condition, indent + 4);
                let _ = writeln!(out, "{pad}}} do {{");
                write_node(out, program, body, indent + 4);
                writeln!(out, "{pad}}}")
            }
            InstKind::DoWhile { body, condition } => {
                let _ = writeln!(out, "{pad}do {{");
                write_node(out, program, body, indent + 4);
                let _ = writeln!(out, "{pad}}} while {{");
                write_node(out, program, condition, indent + 4);
                writeln!(out, "{pad}}}")
            }
            InstKind::For {
                condition,
                side_effect,
                body,
            } => {
                let _ = writeln!(out, "{pad}for {{");
                if let Some(condition) = condition {
                    let _ = writeln!(out, "{pad}  condition:");
                    write_node(out, program, condition, indent + 4);
                }
                if let Some(side_effect) = side_effect {
                    let _ = writeln!(out, "{pad}  step:");
                    write_node(out, program, side_effect, indent + 4);
                }
                let _ = writeln!(out, "{pad}  body:");
                write_node(out, program, body, indent + 4);
                writeln!(out, "{pad}}}")
            }
            InstKind::Return(Some(value)) => writeln!(out, "{pad}return {}", op(value)),
            InstKind::Return(None) => writeln!(out, "{pad}return"),
            InstKind::Break => writeln!(out, "{pad}break"),
            InstKind::Continue => writeln!(out, "{pad}continue"),
            InstKind::Discard => writeln!(out, "{pad}discard"),
        };
    }
}

fn write_function(out: &mut String, program: &IlProgram, func: &IlFunction) {
    let params: Vec<_> = func
        .parameters
        .iter()
        .map(|p| match p.qualifier {
            ParameterQualifier::In => format!("{}: {}", p.name, p.ty),
            ParameterQualifier::Out => format!("out {}: {}", p.name, p.ty),
            ParameterQualifier::InOut => format!("inout {}: {}", p.name, p.ty),
        })
        .collect();
    let _ = writeln!(
        out,
        "  fn {}({}) -> {} {{",
        func.name,
        params.join(", "),
        func.return_type
    );
    write_node(out, program, &func.code, 4);
    out.push_str("  }\n");
}

fn write_definitions(out: &mut String, label: &str, defs: &[ObjectDefinition]) {
    if defs.is_empty() {
        return;
    }
    let _ = writeln!(out, "      {label}:");
    for def in defs {
        let _ = writeln!(out, "        {}: {}", def.name, def.ty);
    }
}

fn write_world(out: &mut String, program: &IlProgram, world: &IlWorld) {
    let kind = if world.is_abstract { "abstract world" } else { "world" };
    let _ = writeln!(out, "    {kind} {} {{", world.name);
    write_definitions(out, "inputs", &world.inputs);
    write_definitions(out, "record", &world.output_type.members);
    if !world.components.is_empty() {
        out.push_str("      components:\n");
        for (name, value) in &world.components {
            let _ = writeln!(out, "        {name} = {}", format_operand(program, value));
        }
    }
    if !world.referenced_functions.is_empty() {
        let names: Vec<_> = world.referenced_functions.iter().cloned().collect();
        let _ = writeln!(out, "      references: {}", names.join(", "));
    }
    if !world.code.is_empty() {
        out.push_str("      code:\n");
        write_node(out, program, &world.code, 8);
    }
    out.push_str("    }\n");
}

fn write_shader(out: &mut String, program: &IlProgram, shader: &IlShader) {
    let _ = writeln!(out, "  shader {} {{", shader.name);
    for (binding, set) in &shader.module_param_sets {
        let _ = writeln!(
            out,
            "    paramset \"{binding}\" set {} size {}",
            set.descriptor_set_id, set.buffer_size
        );
        for param in &set.parameters {
            let location = match param.buffer_offset {
                Some(offset) => format!("offset {offset}"),
                None => {
                    let slots: Vec<_> = param.binding_points.iter().map(i32::to_string).collect();
                    format!("binding {}", slots.join(" "))
                }
            };
            let _ = writeln!(out, "      {}: {} @ {location}", param.key, param.ty);
        }
    }
    for stage in shader.stages.values() {
        let _ = writeln!(out, "    stage {} : {}", stage.name, stage.stage_type);
    }
    for world in &shader.worlds {
        write_world(out, program, world);
    }
    out.push_str("  }\n");
}

/// Produces a human-readable text dump of an [`IlProgram`].
pub fn dump_program(program: &IlProgram) -> String {
    let mut out = String::new();

    if !program.structs.is_empty() {
        out.push_str("Structs:\n");
        for s in &program.structs {
            let fields: Vec<_> = s
                .fields
                .iter()
                .map(|f| format!("{}: {}", f.name, f.ty))
                .collect();
            let _ = writeln!(out, "  struct {} {{ {} }}", s.name, fields.join(", "));
        }
    }

    if !program.globals.is_empty() {
        out.push_str("\nGlobals:\n");
        write_node(&mut out, program, &program.globals, 2);
    }

    if !program.functions.is_empty() {
        out.push_str("\nFunctions:\n");
        for func in program.functions.values() {
            write_function(&mut out, program, func);
        }
    }

    if !program.shaders.is_empty() {
        out.push_str("\nShaders:\n");
        for shader in program.shaders.values() {
            write_shader(&mut out, program, shader);
        }
    }

    out
}
