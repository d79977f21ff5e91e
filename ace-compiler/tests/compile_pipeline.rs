//! End-to-end pipeline test: parse -> analyze -> optimize -> emit -> build,
//! writing the result to a temp file the way `ace-cli compile` does.

use ace_compiler::emit::chunk::build_root;
use ace_compiler::{analyze, optimize, CompilationUnit, Emitter};
use ace_compiler::bytecode::{ByteWriter, Opcode};

fn compile_to_bytes(source: &str) -> Vec<u8> {
    let program = ace_parser::parse("t.ace", source).expect("parses");
    let mut unit = CompilationUnit::new();
    analyze(&mut unit, &program);
    assert!(!unit.has_fatal_errors(), "unexpected analysis errors: {:?}", unit.diagnostics.diagnostics());

    let mut program = program;
    optimize(&mut program);

    let mut emitter = Emitter::new();
    let chunk = emitter.emit_program(&program);
    let code = build_root(&chunk);

    let mut writer = ByteWriter::new();
    for static_object in &emitter.statics {
        match static_object {
            ace_compiler::emit::StaticObject::String(value) => {
                writer.u8(Opcode::StoreStaticString as u8);
                writer.string(value);
            }
            ace_compiler::emit::StaticObject::Function { label, nargs, flags } => {
                writer.u8(Opcode::StoreStaticFunction as u8);
                writer.u32(*label as u32);
                writer.u8(*nargs);
                writer.u8(*flags);
            }
        }
    }
    writer.raw(&code);
    writer.into_bytes()
}

#[test]
fn a_straight_line_program_compiles_and_ends_in_exit() {
    let bytes = compile_to_bytes("let x = 1 + 2; let y = x * 3;");
    assert_eq!(bytes.last(), Some(&(Opcode::Exit as u8)));
    assert!(bytes.contains(&(Opcode::Add as u8)));
    assert!(bytes.contains(&(Opcode::Mul as u8)));
}

#[test]
fn writing_the_compiled_bytes_to_a_temp_file_round_trips() {
    let bytes = compile_to_bytes("let greeting = \"hi\";");
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("greeting.acb");
    std::fs::write(&path, &bytes).unwrap();

    let read_back = std::fs::read(&path).unwrap();
    assert_eq!(read_back, bytes);
}

#[test]
fn a_function_call_emits_call_and_ret() {
    let bytes = compile_to_bytes("let add = func(a, b) { return a + b; }; add(1, 2);");
    assert!(bytes.contains(&(Opcode::Call as u8)));
    assert!(bytes.contains(&(Opcode::Ret as u8)));
}

#[test]
fn an_if_else_with_a_comparison_never_uses_arithmetic_opcodes_for_the_condition() {
    let bytes = compile_to_bytes("if 1 > 0 { let a = 1; } else { let b = 2; }");
    assert!(bytes.contains(&(Opcode::Cmp as u8)));
    assert!(bytes.contains(&(Opcode::Cmpz as u8)));
}
