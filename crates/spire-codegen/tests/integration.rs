//! Parse-then-lower tests over the public code generator API.

use spire_codegen::{
    ComponentBody, ComponentDefinitionIr, ModuleInstanceIr, PipelineIr, ShaderIr, TypeTranslator,
    UNIFORM_WORLD, generate, generate_parameter_binding_info,
};
use spire_ir::{
    Attribute, Attributes, BaseType, CodePosition, DiagnosticSink, IlProgram, IlType, InstKind,
    TextureFlavor, TextureShape, dump_program,
};
use spire_parser::{ParseOptions, Program, parse, tokenize};

fn lower(source: &str) -> (IlProgram, DiagnosticSink) {
    let mut sink = DiagnosticSink::new();
    let tokens = tokenize("test.spire", source, &mut sink);
    let program = parse(
        &tokens,
        &mut sink,
        "test.spire",
        Some(&Program::default()),
        &ParseOptions::default(),
    );
    assert!(!sink.has_errors(), "{}", sink.output());
    let il = generate(&program, &[], &mut sink);
    (il, sink)
}

#[test]
fn return_of_arithmetic() {
    let (il, sink) = lower("float foo() { return 1 + 2 * 3; }");
    assert!(sink.diagnostics().is_empty(), "{}", sink.output());
    let foo = &il.functions["foo"];
    let kinds: Vec<_> = foo
        .code
        .instructions
        .iter()
        .map(|&h| &il.instructions[h].kind)
        .collect();
    assert_eq!(kinds.len(), 3);
    assert!(matches!(kinds[0], InstKind::Binary { op: spire_ir::BinaryOp::Mul, .. }));
    assert!(matches!(kinds[1], InstKind::Binary { op: spire_ir::BinaryOp::Add, .. }));
    assert!(matches!(kinds[2], InstKind::Return(Some(_))));
}

#[test]
fn struct_members_are_retrieved_by_field_index() {
    let (il, sink) = lower(
        "struct Light { float3 dir; float power; };\n\
         float brightness(Light l) { return l.power * 2.0; }\n\
         void dim(inout Light l) { l.power = 0.5; }",
    );
    assert!(sink.diagnostics().is_empty(), "{}", sink.output());
    let dump = dump_program(&il);
    assert!(dump.contains("struct Light { dir: float3, power: float }"), "{dump}");
    assert!(dump.contains("= retrieve %0(p_l)[1] : float"), "{dump}");
    assert!(dump.contains("update %"), "{dump}");
    assert!(dump.contains("(p_l)[1] = 0.5f"), "{dump}");
}

#[test]
fn calls_resolve_to_program_functions() {
    let (il, sink) = lower(
        "float sq(float x) { return x * x; }\n\
         void split(float v, out float hi) { hi = v; }\n\
         float use_both(float a) { float h; split(a, h); return sq(h); }",
    );
    assert!(sink.diagnostics().is_empty(), "{}", sink.output());
    let body = &il.functions["use_both"];
    let calls: Vec<_> = body
        .code
        .instructions
        .iter()
        .filter_map(|&h| match &il.instructions[h].kind {
            InstKind::Call {
                function,
                side_effect,
                ..
            } => Some((function.as_str(), *side_effect, il.instructions[h].ty.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(
        calls,
        [("split", true, IlType::VOID), ("sq", false, IlType::FLOAT)]
    );
}

fn param(
    shader: &mut ShaderIr,
    module: usize,
    name: &str,
    ty: IlType,
    binding: Option<&str>,
) -> usize {
    let mut attributes = Attributes::new();
    if let Some(value) = binding {
        attributes.insert(
            "Binding".into(),
            Attribute {
                value: value.into(),
                position: CodePosition::unknown(),
            },
        );
    }
    shader.add_definition(ComponentDefinitionIr {
        unique_name: format!("{name}_0"),
        original_name: name.into(),
        component: name.into(),
        module,
        world: UNIFORM_WORLD.into(),
        ty,
        position: CodePosition::unknown(),
        attributes,
        is_output: false,
        is_function: false,
        params: Vec::new(),
        body: ComponentBody::Param,
        dependencies: Vec::new(),
    })
}

#[test]
fn parameter_sets_mix_buffer_and_resources() {
    let mut shader = ShaderIr::new("Forward", CodePosition::unknown(), PipelineIr::default());
    shader.add_module_instance(ModuleInstanceIr {
        module_name: "Camera".into(),
        binding_name: "camera".into(),
        binding_index: Some(1),
        using_position: CodePosition::unknown(),
    });
    shader.add_module_instance(ModuleInstanceIr {
        module_name: "Material".into(),
        binding_name: "material".into(),
        binding_index: Some(0),
        using_position: CodePosition::unknown(),
    });
    let texture = IlType::Texture {
        base: Box::new(IlType::vector(BaseType::Float, 4)),
        flavor: TextureFlavor::new(TextureShape::Texture2D),
    };
    param(&mut shader, 1, "albedo", texture.clone(), None);
    param(&mut shader, 0, "near", IlType::FLOAT, None);
    param(&mut shader, 0, "eye", IlType::vector(BaseType::Float, 3), None);
    param(&mut shader, 0, "far", IlType::FLOAT, None);
    param(&mut shader, 1, "normal", texture, Some("0"));

    let mut sink = DiagnosticSink::new();
    let sets = generate_parameter_binding_info(&shader, &TypeTranslator::new(), &mut sink);
    assert!(sink.diagnostics().is_empty(), "{}", sink.output());

    let camera = &sets["camera"];
    let offsets: Vec<_> = camera.parameters.iter().map(|p| p.buffer_offset).collect();
    assert_eq!(offsets, [Some(0), Some(16), Some(28)]);
    assert_eq!(camera.descriptor_set_id, 1);

    let material = &sets["material"];
    let slots: Vec<_> = material
        .parameters
        .iter()
        .map(|p| (p.name.as_str(), p.binding_points.clone()))
        .collect();
    assert_eq!(slots, [("albedo", vec![1]), ("normal", vec![0])]);

    // The shader lowers to the same sets.
    let program = Program::default();
    let il = generate(&program, std::slice::from_ref(&shader), &mut sink);
    assert_eq!(il.shaders["Forward"].module_param_sets, sets);
    let dump = dump_program(&il);
    assert!(dump.contains("paramset \"camera\" set 1 size 32"), "{dump}");
    assert!(dump.contains("eye_0: float3 @ offset 16"), "{dump}");
    assert!(dump.contains("albedo_0: Texture2D @ binding 1"), "{dump}");
}
