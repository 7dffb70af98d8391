//! Human-readable syntax tree dump, used by `--emit-ast` and tests.

use std::fmt::Write;

use super::{
    ConstantValue, DeclId, DeclKind, ExprId, ExprKind, ModifierKind, Modifiers, Operator, Program,
    StmtId, StmtKind, VarKind,
};

/// Formats a whole program, one declaration per line group.
pub fn dump_ast(program: &Program) -> String {
    let mut out = String::new();
    for &id in &program.members {
        write_decl(&mut out, program, id, 0);
    }
    out
}

/// Formats one expression on a single line, fully parenthesized.
pub fn format_expr(program: &Program, id: ExprId) -> String {
    let expr = &program.exprs[id];
    let list = |ids: &[ExprId]| {
        ids.iter()
            .map(|&a| format_expr(program, a))
            .collect::<Vec<_>>()
            .join(", ")
    };
    match &expr.kind {
        ExprKind::Constant(ConstantValue::Int(v)) => v.to_string(),
        ExprKind::Constant(ConstantValue::Float(v)) => format!("{v:?}f"),
        ExprKind::Constant(ConstantValue::Bool(v)) => v.to_string(),
        ExprKind::Var { name, .. } => name.clone(),
        ExprKind::Operator { op, args } => match (op, args.as_slice()) {
            (Operator::PostInc | Operator::PostDec, [a]) => {
                format!("({}{})", format_expr(program, *a), op.symbol())
            }
            (_, [a]) => format!("({}{})", op.symbol(), format_expr(program, *a)),
            (_, [a, b]) => format!(
                "({} {} {})",
                format_expr(program, *a),
                op.symbol(),
                format_expr(program, *b)
            ),
            _ => format!("{}({})", op.symbol(), list(args)),
        },
        ExprKind::Select {
            condition,
            accept,
            reject,
        } => format!(
            "({} ? {} : {})",
            format_expr(program, *condition),
            format_expr(program, *accept),
            format_expr(program, *reject)
        ),
        ExprKind::Invoke { function, args, .. } => {
            format!("{}({})", format_expr(program, *function), list(args))
        }
        ExprKind::Member { base, member, .. } => {
            format!("{}.{member}", format_expr(program, *base))
        }
        ExprKind::Index { base, index } => match index {
            Some(index) => format!(
                "{}[{}]",
                format_expr(program, *base),
                format_expr(program, *index)
            ),
            None => format!("{}[]", format_expr(program, *base)),
        },
        ExprKind::TypeCast { target, expr } => format!(
            "(({}){})",
            format_expr(program, *target),
            format_expr(program, *expr)
        ),
        ExprKind::GenericApp { base, args } => {
            format!("{}<{}>", format_expr(program, *base), list(args))
        }
        ExprKind::InitializerList(items) => format!("{{{}}}", list(items)),
        ExprKind::Import {
            operator,
            component,
            args,
        } => format!("import {operator}[{component}]({})", list(args)),
        ExprKind::Project { base } => format!("project({})", format_expr(program, *base)),
        ExprKind::Error => "<error>".to_string(),
    }
}

fn format_modifier(kind: &ModifierKind) -> String {
    match kind {
        ModifierKind::Layout(text) => format!("layout({text})"),
        ModifierKind::Attribute { name, args } => format!("[{name}/{}]", args.len()),
        ModifierKind::BuiltinType(tag) => format!("__builtin_type({tag})"),
        ModifierKind::MagicType { name, tag } => format!("__magic_type({name}, {tag})"),
        ModifierKind::Semantic(name) => format!(": {name}"),
        ModifierKind::Register {
            register,
            space,
            mask,
        } => {
            let mut text = format!(": register({register}");
            if let Some(mask) = mask {
                let _ = write!(text, ".{mask}");
            }
            if let Some(space) = space {
                let _ = write!(text, ", {space}");
            }
            text.push(')');
            text
        }
        ModifierKind::PackOffset { register, mask } => match mask {
            Some(mask) => format!(": packoffset({register}.{mask})"),
            None => format!(": packoffset({register})"),
        },
        other => format!("{other:?}").to_lowercase(),
    }
}

fn modifiers_prefix(modifiers: &Modifiers) -> String {
    modifiers
        .iter()
        .map(|m| format_modifier(&m.kind) + " ")
        .collect()
}

fn write_decl(out: &mut String, program: &Program, id: DeclId, depth: usize) {
    let decl = &program.decls[id];
    let pad = "  ".repeat(depth);
    let mods = modifiers_prefix(&decl.modifiers);
    let members = |out: &mut String| {
        for &member in decl.members() {
            write_decl(out, program, member, depth + 1);
        }
    };
    match &decl.kind {
        DeclKind::Variable(var) => {
            let keyword = match var.kind {
                VarKind::Variable => "var",
                VarKind::Field => "field",
                VarKind::Parameter => "param",
            };
            let _ = write!(
                out,
                "{pad}{mods}{keyword} {} : {}",
                decl.name,
                format_expr(program, var.ty)
            );
            if let Some(init) = var.init {
                let _ = write!(out, " = {}", format_expr(program, init));
            }
            out.push('\n');
        }
        DeclKind::Function(f) => {
            let params: Vec<_> = f
                .params
                .iter()
                .map(|&p| {
                    let param = &program.decls[p];
                    let ty = param
                        .as_variable()
                        .map(|v| format_expr(program, v.ty))
                        .unwrap_or_default();
                    format!("{}{} : {ty}", modifiers_prefix(&param.modifiers), param.name)
                })
                .collect();
            let _ = write!(
                out,
                "{pad}{mods}func {}({}) -> {}",
                decl.name,
                params.join(", "),
                format_expr(program, f.return_type)
            );
            match f.body {
                Some(body) => {
                    out.push('\n');
                    write_stmt(out, program, body, depth);
                }
                None => out.push_str(";\n"),
            }
        }
        DeclKind::Struct { .. } | DeclKind::Class { .. } => {
            let keyword = if matches!(decl.kind, DeclKind::Class { .. }) {
                "class"
            } else {
                "struct"
            };
            let _ = writeln!(out, "{pad}{mods}{keyword} {} {{", decl.name);
            members(out);
            let _ = writeln!(out, "{pad}}}");
        }
        DeclKind::TypeDef { ty } => {
            let _ = writeln!(
                out,
                "{pad}{mods}typedef {} = {}",
                decl.name,
                format_expr(program, *ty)
            );
        }
        DeclKind::UsingFile { file } => {
            let _ = writeln!(out, "{pad}using \"{file}\"");
        }
        DeclKind::Generic { inner, .. } => {
            let _ = writeln!(out, "{pad}{mods}generic {} <", decl.name);
            members(out);
            let _ = writeln!(out, "{pad}>");
            if let Some(inner) = inner {
                write_decl(out, program, *inner, depth + 1);
            }
        }
        DeclKind::GenericTypeParam {
            constraint,
            default,
        } => {
            let _ = write!(out, "{pad}type {}", decl.name);
            if let Some(c) = constraint {
                let _ = write!(out, " : {}", format_expr(program, *c));
            }
            if let Some(d) = default {
                let _ = write!(out, " = {}", format_expr(program, *d));
            }
            out.push('\n');
        }
        DeclKind::GenericValueParam { ty, init } => {
            let _ = write!(out, "{pad}let {}", decl.name);
            if let Some(ty) = ty {
                let _ = write!(out, " : {}", format_expr(program, *ty));
            }
            if let Some(init) = init {
                let _ = write!(out, " = {}", format_expr(program, *init));
            }
            out.push('\n');
        }
        DeclKind::Trait { bases, .. } => {
            let bases: Vec<_> = bases.iter().map(|&b| format_expr(program, b)).collect();
            let _ = writeln!(out, "{pad}{mods}trait {} : [{}] {{", decl.name, bases.join(", "));
            members(out);
            let _ = writeln!(out, "{pad}}}");
        }
        DeclKind::TraitConformance { base } => {
            let _ = writeln!(out, "{pad}conforms {}", format_expr(program, *base));
        }
        DeclKind::Extension { target, .. } => {
            let _ = writeln!(out, "{pad}{mods}extension {} {{", format_expr(program, *target));
            members(out);
            let _ = writeln!(out, "{pad}}}");
        }
        DeclKind::Constructor { params, body } => {
            let names: Vec<_> = params
                .iter()
                .map(|&p| program.decls[p].name.as_str())
                .collect();
            let _ = write!(out, "{pad}{mods}init({})", names.join(", "));
            match body {
                Some(body) => {
                    out.push('\n');
                    write_stmt(out, program, *body, depth);
                }
                None => out.push_str(";\n"),
            }
        }
    }
}

fn write_stmt(out: &mut String, program: &Program, id: StmtId, depth: usize) {
    let stmt = &program.stmts[id];
    let pad = "  ".repeat(depth);
    let expr = |e: ExprId| format_expr(program, e);
    match &stmt.kind {
        StmtKind::Block(stmts) => {
            let _ = writeln!(out, "{pad}{{");
            for &s in stmts {
                write_stmt(out, program, s, depth + 1);
            }
            let _ = writeln!(out, "{pad}}}");
        }
        StmtKind::Empty => {
            let _ = writeln!(out, "{pad};");
        }
        StmtKind::VarDecl(decls) => {
            for &d in decls {
                write_decl(out, program, d, depth);
            }
        }
        StmtKind::If {
            condition,
            accept,
            reject,
        } => {
            let _ = writeln!(out, "{pad}if {}", expr(*condition));
            write_stmt(out, program, *accept, depth + 1);
            if let Some(reject) = reject {
                let _ = writeln!(out, "{pad}else");
                write_stmt(out, program, *reject, depth + 1);
            }
        }
        StmtKind::For {
            init,
            condition,
            step,
            body,
        } => {
            let _ = writeln!(
                out,
                "{pad}for ; {} ; {}",
                condition.map(expr).unwrap_or_default(),
                step.map(expr).unwrap_or_default()
            );
            if let Some(init) = init {
                write_stmt(out, program, *init, depth + 1);
            }
            write_stmt(out, program, *body, depth + 1);
        }
        StmtKind::While { condition, body } => {
            let _ = writeln!(out, "{pad}while {}", expr(*condition));
            write_stmt(out, program, *body, depth + 1);
        }
        StmtKind::DoWhile { body, condition } => {
            let _ = writeln!(out, "{pad}do");
            write_stmt(out, program, *body, depth + 1);
            let _ = writeln!(out, "{pad}while {}", expr(*condition));
        }
        StmtKind::Break => {
            let _ = writeln!(out, "{pad}break");
        }
        StmtKind::Continue => {
            let _ = writeln!(out, "{pad}continue");
        }
        StmtKind::Return(value) => match value {
            Some(value) => {
                let _ = writeln!(out, "{pad}return {}", expr(*value));
            }
            None => {
                let _ = writeln!(out, "{pad}return");
            }
        },
        StmtKind::Discard => {
            let _ = writeln!(out, "{pad}discard");
        }
        StmtKind::Expression(e) => {
            let _ = writeln!(out, "{pad}{}", expr(*e));
        }
        StmtKind::Switch { condition, body } => {
            let _ = writeln!(out, "{pad}switch {}", expr(*condition));
            write_stmt(out, program, *body, depth + 1);
        }
        StmtKind::Case(value) => {
            let _ = writeln!(out, "{pad}case {}:", expr(*value));
        }
        StmtKind::Default => {
            let _ = writeln!(out, "{pad}default:");
        }
        StmtKind::Unparsed(tokens) => {
            let _ = writeln!(out, "{pad}<unparsed {} tokens>", tokens.len());
        }
    }
}
