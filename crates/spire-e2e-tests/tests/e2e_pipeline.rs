mod common;

use std::collections::BTreeMap;

use common::{AttributeChecker, compile_clean};
use spire_backend_core::{Backend, BackendOptions, IlDumpBackend};
use spire_compiler::{CompileOptions, CompileResult, ScopeChecker, Session};
use spire_ir::{IlProgram, ShaderLibFile, StageSource, dump_program};

const LIT: &str = r#"
float3 tone(float3 c) { return c * 0.5; }

[Input(vs)] float3 pos;
[Param] float3 tint;
[Param] float gain;
[Param] Texture2D albedo;
[Param] [Binding(0)] Texture2D normalMap;

[World(vs)] float3 scaled = pos * 2.0;
[World(vs)] [Output] float3 outPos = scaled * gain;
[World(fs)] [Output] float3 color = tone(outPos) * tint;
"#;

fn lit() -> CompileResult {
    let session = Session::empty();
    compile_clean(&session, LIT, &mut AttributeChecker::new("Lit"))
}

// ----------------------------------------------------------------------
// Full pipeline
// ----------------------------------------------------------------------

#[test]
fn shader_parameters_are_laid_out_and_bound() {
    let result = lit();
    let dump = result.source_text("il").expect("il output");
    assert!(dump.contains("shader Lit {"), "{dump}");
    assert!(dump.contains("paramset \"material\" set 0 size 16"), "{dump}");
    assert!(dump.contains("tint_u: float3 @ offset 0"), "{dump}");
    assert!(dump.contains("gain_u: float @ offset 12"), "{dump}");
    // The explicit slot is taken first; the gap filler gets the next one.
    assert!(dump.contains("normalMap_u: Texture2D @ binding 0"), "{dump}");
    assert!(dump.contains("albedo_u: Texture2D @ binding 1"), "{dump}");
}

#[test]
fn worlds_export_and_import_components() {
    let result = lit();
    let dump = result.source_text("il").expect("il output");
    assert!(dump.contains("world vs {"), "{dump}");
    assert!(dump.contains("world fs {"), "{dump}");
    assert!(dump.contains("export vs.outPos_vs = %"), "{dump}");
    assert!(dump.contains("= import outPos_vs(1.0f) : float3 {"), "{dump}");
    assert!(dump.contains("export fs.color_fs = %"), "{dump}");
    assert!(dump.contains("moduleParam<material.gain_u>"), "{dump}");

    let program = &result.programs["main.spire"];
    let shader = &program.shaders["Lit"];
    let vs = shader.world("vs").expect("vs");
    assert_eq!(vs.inputs[0].name, "pos_vs");
    let fs = shader.world("fs").expect("fs");
    assert!(fs.inputs.is_empty());
}

#[test]
fn helper_functions_are_referenced_by_the_world_that_calls_them() {
    let result = lit();
    let dump = result.source_text("il").expect("il output");
    assert!(dump.contains("fn tone(c: float3) -> float3 {"), "{dump}");
    assert!(dump.contains("= call tone("), "{dump}");
    assert!(dump.contains("references: tone"), "{dump}");

    let shader = &result.programs["main.spire"].shaders["Lit"];
    assert!(shader.world("fs").expect("fs").referenced_functions.contains("tone"));
    assert!(!shader.world("vs").expect("vs").referenced_functions.contains("tone"));
}

#[test]
fn backend_filters_shaders_by_name() {
    let result = lit();
    let program = &result.programs["main.spire"];
    let backend = IlDumpBackend;

    let options = BackendOptions {
        shaders: vec!["Lit".into()],
        ..BackendOptions::default()
    };
    let output = backend.compile(program, &options).unwrap();
    let text = output.files[0].content.as_text().unwrap();
    assert!(text.contains("shader Lit {"));

    let options = BackendOptions {
        shaders: vec!["Unlit".into()],
        ..BackendOptions::default()
    };
    let err = backend.compile(program, &options).unwrap_err();
    assert_eq!(err.to_string(), "no shader named 'Unlit'");
}

#[test]
fn empty_program_dumps_nothing() {
    let output = IlDumpBackend
        .compile(&IlProgram::default(), &BackendOptions::default())
        .unwrap();
    assert_eq!(output.files[0].name, "program.il");
    assert_eq!(output.files[0].content.as_text(), Some(""));
    assert_eq!(output.diagnostics.len(), 1);
}

// ----------------------------------------------------------------------
// ShaderLib
// ----------------------------------------------------------------------

#[test]
fn compiled_parameters_survive_a_shader_lib_round_trip() {
    let result = lit();
    let program = &result.programs["main.spire"];
    let shader = &program.shaders["Lit"];

    let mut sources = BTreeMap::new();
    for world in &shader.worlds {
        let mut text = String::new();
        for (name, _) in &world.components {
            text.push_str(&format!("out {name};\n"));
        }
        text.push_str("void main() {\n    emit();\n}");
        sources.insert(
            world.name.clone(),
            StageSource {
                binary: Vec::new(),
                text,
            },
        );
    }
    let lib = ShaderLibFile {
        name: shader.name.clone(),
        parameter_sets: shader.module_param_sets.clone(),
        sources,
    };

    let text = lib.to_text();
    assert!(text.starts_with("name Lit\n"), "{text}");
    assert!(text.contains("paramset \"material\" size 16 binding 0"), "{text}");

    let back = ShaderLibFile::from_text(&text).unwrap();
    assert_eq!(back, lib);
    assert_eq!(back.to_text(), text);
}

// ----------------------------------------------------------------------
// Plain functions through the driver
// ----------------------------------------------------------------------

#[test]
fn stdlib_functions_lower_alongside_user_code() {
    let session = Session::new(
        "__intrinsic float saturate(float x);\n\
         float luminance(float3 c) { return c.x * 0.3 + c.y * 0.6 + c.z * 0.1; }",
    )
    .unwrap();
    let result = compile_clean(
        &session,
        "float exposure(float3 c, float ev) {\n\
             float l = luminance(c);\n\
             for (int i = 0; i < 4; i++) { l = l * ev; }\n\
             return saturate(l);\n\
         }",
        &mut ScopeChecker,
    );
    let dump = result.source_text("il").expect("il output");
    assert!(dump.contains("fn exposure(c: float3, ev: float) -> float {"), "{dump}");
    assert!(dump.contains("= call luminance("), "{dump}");
    assert!(dump.contains("= call saturate("), "{dump}");
    assert!(!dump.contains("Shaders:"), "{dump}");
}

#[test]
fn output_name_comes_from_the_options() {
    let session = Session::empty();
    let options = CompileOptions {
        output_name: "forward".into(),
        ..CompileOptions::default()
    };
    let mut result = CompileResult::new();
    let unit = session.parse(&mut result, &options, "float f() { return 1.0; }", "main.spire", None);
    session
        .compile(
            &mut result,
            &mut [unit],
            &options,
            &mut ScopeChecker,
            &spire_backend_core::BackendRegistry::with_builtins(),
        )
        .unwrap();
    let names: Vec<_> = result.files("il").iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["forward.il"]);
    let program = &result.programs["main.spire"];
    assert_eq!(result.source_text("il"), Some(dump_program(program).as_str()));
}
