//! Integration tests for the lexer, preprocessor and parser.

use spire_ir::{DiagnosticKind, DiagnosticSink};
use spire_parser::ast::{DeclKind, ExprKind, Operator, StmtKind};
use spire_parser::{
    Define, ParseOptions, Program, TokenType, dump_ast, parse, preprocess, tokenize,
};

fn parse_user(source: &str, options: &ParseOptions) -> (Program, DiagnosticSink) {
    let mut sink = DiagnosticSink::new();
    let tokens = tokenize("user.spire", source, &mut sink);
    let stdlib = Program::default();
    let program = parse(&tokens, &mut sink, "user.spire", Some(&stdlib), options);
    (program, sink)
}

fn parse_ok(source: &str) -> Program {
    let (program, sink) = parse_user(source, &ParseOptions::default());
    assert!(!sink.has_errors(), "unexpected errors:\n{}", sink.output());
    program
}

#[test]
fn return_of_arithmetic() {
    let source = "float foo() { return 1 + 2 * 3; }";
    let mut sink = DiagnosticSink::new();
    let tokens = tokenize("t.spire", source, &mut sink);
    // float foo ( ) { return 1 + 2 * 3 ; } <eof>
    assert_eq!(tokens.len(), 14);
    assert_eq!(tokens.tokens.last().map(|t| t.ty), Some(TokenType::EndOfFile));

    let program = parse_ok(source);
    assert_eq!(program.members.len(), 1);
    let dump = dump_ast(&program);
    assert!(dump.contains("func foo() -> float"), "{dump}");
    assert!(dump.contains("return (1 + (2 * 3))"), "{dump}");
}

#[test]
fn assignment_is_right_associative() {
    let program = parse_ok("void f() { a = b = c; }");
    let dump = dump_ast(&program);
    assert!(dump.contains("(a = (b = c))"), "{dump}");
}

#[test]
fn nested_generics_versus_shift() {
    let program = parse_ok(
        "struct Foo { int x; }; struct Bar { int y; };\n\
         Foo<Bar<int>> nested;\n\
         int g() { return a >> b; }",
    );
    let dump = dump_ast(&program);
    assert!(dump.contains("var nested : Foo<Bar<int>>"), "{dump}");
    assert!(dump.contains("return (a >> b)"), "{dump}");

    let nested = program.find_members("nested").next().expect("nested");
    let var = program.decls[nested].as_variable().expect("variable");
    let ExprKind::GenericApp { args, .. } = &program.exprs[var.ty].kind else {
        panic!("expected generic application");
    };
    assert!(matches!(
        program.exprs[args[0]].kind,
        ExprKind::GenericApp { .. }
    ));
}

#[test]
fn and_assign_is_not_add_assign() {
    let program = parse_ok("void f() { a &= b; a += b; }");
    let dump = dump_ast(&program);
    assert!(dump.contains("(a &= b)"), "{dump}");
    assert!(dump.contains("(a += b)"), "{dump}");

    let (_, _, f) = program.functions().next().expect("function");
    let StmtKind::Block(stmts) = &program.stmts[f.body.expect("body")].kind else {
        panic!("body is a block");
    };
    let StmtKind::Expression(e) = program.stmts[stmts[0]].kind else {
        panic!("expression statement");
    };
    assert!(matches!(
        program.exprs[e].kind,
        ExprKind::Operator {
            op: Operator::AndAssign,
            ..
        }
    ));
}

#[test]
fn unterminated_block_reports_once() {
    let (program, sink) = parse_user(
        "float f() { return 1;",
        &ParseOptions::default(),
    );
    assert_eq!(sink.error_count(), 1, "{}", sink.output());
    assert!(matches!(
        &sink.diagnostics()[0].kind,
        DiagnosticKind::UnexpectedTokenExpectedTokenType { found, expected }
            if found == "end of file" && expected == "'}'"
    ));
    assert_eq!(program.members.len(), 1);
}

#[test]
fn stray_closing_brace_terminates() {
    let (program, sink) = parse_user("} float x; }} int y;", &ParseOptions::default());
    assert!(sink.has_errors());
    let names: Vec<_> = program
        .members
        .iter()
        .map(|&id| program.decls[id].name.as_str())
        .collect();
    assert!(names.contains(&"x"), "{names:?}");
    assert!(names.contains(&"y"), "{names:?}");
}

#[test]
fn recovery_resumes_at_next_declaration() {
    let (program, sink) = parse_user(
        "float a = 1 + ; float b = 2; void f() { x = ; y = 3; }",
        &ParseOptions::default(),
    );
    let dump = dump_ast(&program);
    assert_eq!(sink.error_count(), 2, "{}", sink.output());
    assert!(dump.contains("var b : float = 2"), "{dump}");
    assert!(dump.contains("(y = 3)"), "{dump}");
}

#[test]
fn garbage_input_terminates() {
    for source in [
        "",
        "(((",
        ")))",
        "]]]]",
        "struct { ",
        "__generic< ",
        "float f( int a int b ) {",
        "cbuffer { float x }",
        "void f() { for (;;",
        "void f() { if (a) else }",
        "x y z w ; ; ) } { ( ] [",
        "layout( [ ] float",
        "float operator",
        "Foo<<<>>> a;",
    ] {
        let (_, _) = parse_user(source, &ParseOptions::default());
        let (_, _) = parse_user(
            source,
            &ParseOptions {
                no_checking: true,
            },
        );
    }
}

#[test]
fn no_checking_keeps_bodies_as_tokens() {
    let (program, sink) = parse_user(
        "float f(float x) { if (x > 0) { return x; } return -x; }",
        &ParseOptions { no_checking: true },
    );
    assert!(!sink.has_errors(), "{}", sink.output());
    let (_, _, f) = program.functions().next().expect("function");
    let StmtKind::Unparsed(tokens) = &program.stmts[f.body.expect("body")].kind else {
        panic!("expected unparsed body");
    };
    assert_eq!(tokens.first().map(|t| t.content.as_str()), Some("if"));
    assert_eq!(tokens.last().map(|t| t.ty), Some(TokenType::Semicolon));
}

#[test]
fn preprocessed_source_parses() {
    let source = "#define SIZE 4\n#ifdef USE_HALF\ntypedef half real;\n#else\ntypedef float real;\n#endif\nreal weights[SIZE];";
    let mut sink = DiagnosticSink::new();
    let tokens = tokenize("pp.spire", source, &mut sink);
    let tokens = preprocess(&tokens, "pp.spire", &[Define::parse("USE_HALF")], None, &mut sink);
    let program = parse(
        &tokens,
        &mut sink,
        "pp.spire",
        Some(&Program::default()),
        &ParseOptions::default(),
    );
    assert!(!sink.has_errors(), "{}", sink.output());
    let dump = dump_ast(&program);
    assert!(dump.contains("typedef real = half"), "{dump}");
    assert!(dump.contains("var weights : real[4]"), "{dump}");
    assert!(matches!(
        program.decls[program.members[0]].kind,
        DeclKind::TypeDef { .. }
    ));
}
