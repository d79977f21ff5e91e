use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use ace_compiler::bytecode::{ByteReader, ByteWriter, Opcode, ReadError};
use ace_compiler::emit::{chunk::build_root, Emitter, StaticObject};
use ace_compiler::unit::CompilationUnit;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ace-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Ace bytecode compiler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lex, parse, analyze, optimize and emit a .ace source file to bytecode.
    Compile {
        /// Input .ace file
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output bytecode file (defaults to the input's file stem + .acb)
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<PathBuf>,
    },

    /// Disassemble a compiled bytecode file into a textual listing.
    Decompile {
        /// Input bytecode file
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output listing file (defaults to stdout)
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Compile { input, output } => compile(input, output),
        Commands::Decompile { input, output } => decompile(input, output),
    }
}

fn compile(input: PathBuf, output: Option<PathBuf>) -> Result<()> {
    log::info!("compiling: {:?}", input);

    let source = std::fs::read_to_string(&input).with_context(|| format!("reading {:?}", input))?;
    let file_name = input.to_string_lossy().into_owned();

    let mut program = match ace_parser::parse(&file_name, &source) {
        Ok(program) => program,
        Err(err) => {
            eprintln!("{}", err);
            bail!("parsing failed");
        }
    };
    log::debug!("parsed {} top-level statement(s)", program.len());

    let mut unit = CompilationUnit::new();
    ace_compiler::analyze(&mut unit, &program);
    if unit.has_fatal_errors() {
        unit.diagnostics.print_all(&source);
        unit.diagnostics.print_summary();
        bail!("semantic analysis failed");
    }
    log::debug!("analysis passed ({} diagnostic(s))", unit.diagnostics.diagnostics().len());

    ace_compiler::optimize(&mut program);
    log::debug!("optimization pass complete");

    let mut emitter = Emitter::new();
    let chunk = emitter.emit_program(&program);
    let code = build_root(&chunk);
    log::debug!("emitted {} byte(s) of code", code.len());

    let mut writer = ByteWriter::new();
    for static_object in &emitter.statics {
        write_static(&mut writer, static_object);
    }
    writer.raw(&code);
    let bytes = writer.into_bytes();

    let output_path = output.unwrap_or_else(|| {
        let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("out");
        PathBuf::from(format!("{stem}.acb"))
    });
    std::fs::write(&output_path, &bytes).with_context(|| format!("writing {:?}", output_path))?;

    println!("compiled {} -> {} ({} bytes)", input.display(), output_path.display(), bytes.len());
    Ok(())
}

/// Writes one interned static as the `STORE_STATIC_*` prelude instruction
/// that seeds the loader's static table (spec §6), matching
/// `ace_vm::bytecode_file::load`'s read side instruction-for-instruction.
fn write_static(writer: &mut ByteWriter, static_object: &StaticObject) {
    match static_object {
        StaticObject::String(value) => {
            writer.u8(Opcode::StoreStaticString as u8);
            writer.string(value);
        }
        StaticObject::Function { label, nargs, flags } => {
            writer.u8(Opcode::StoreStaticFunction as u8);
            writer.u32(*label as u32);
            writer.u8(*nargs);
            writer.u8(*flags);
        }
    }
}

fn decompile(input: PathBuf, output: Option<PathBuf>) -> Result<()> {
    log::info!("decompiling: {:?}", input);

    let bytes = std::fs::read(&input).with_context(|| format!("reading {:?}", input))?;

    let mut heap = ace_vm::Heap::default();
    let loaded = ace_vm::load(&bytes, &mut heap).context("reading the static prelude")?;
    log::debug!("static prelude holds {} value(s), code starts at {:#x}", loaded.statics.len(), loaded.code_start);

    let mut listing = disassemble(&bytes).context("decoding bytecode stream")?;
    let marker = format!("{:08x}", loaded.code_start);
    if let Some(pos) = listing.find(&format!("{marker}  ")) {
        listing.insert_str(pos, "-- code --\n");
    }

    match output {
        Some(path) => {
            std::fs::write(&path, &listing).with_context(|| format!("writing {:?}", path))?;
            println!("wrote listing to {}", path.display());
        }
        None => print!("{listing}"),
    }
    Ok(())
}

/// A flat, offset-annotated disassembly of an entire bytecode stream
/// (static prelude and main instruction stream alike — both use the same
/// opcode encoding, so one pass over the whole file suffices).
fn disassemble(bytes: &[u8]) -> Result<String, ReadError> {
    let mut reader = ByteReader::new(bytes);
    let mut out = String::new();
    while reader.has_more() {
        let offset = reader.position();
        let opcode_byte = reader.u8()?;
        let opcode = Opcode::from_byte(opcode_byte).ok_or(ReadError::UnknownOpcode(opcode_byte))?;
        let operands = decode_operands(opcode, &mut reader)?;
        out.push_str(&format!("{offset:08x}  {:<18}{operands}\n", opcode.mnemonic()));
    }
    Ok(out)
}

/// Decodes one instruction's operands per the layout documented on each
/// `Opcode` variant, rendering them the way a reader would want to see
/// them (registers as `%n`, addresses as `@n`, static ids as `#n`).
fn decode_operands(opcode: Opcode, reader: &mut ByteReader<'_>) -> Result<String, ReadError> {
    use Opcode::*;
    Ok(match opcode {
        Nop | Pop | Ret | EndTry | Exit => String::new(),

        StoreStaticString => format!("{:?}", reader.string()?),
        StoreStaticAddress => format!("@{}", reader.u32()?),
        StoreStaticFunction => {
            let addr = reader.u32()?;
            let nargs = reader.u8()?;
            let flags = reader.u8()?;
            format!("@{addr}, nargs={nargs}, flags={flags:#x}")
        }
        StoreStaticType => {
            let count = reader.u16()?;
            let name = reader.short_string()?;
            let mut members = Vec::with_capacity(count as usize);
            for _ in 0..count {
                members.push(reader.short_string()?);
            }
            format!("{name:?}, members={members:?}")
        }

        LoadI32 => format!("%{}, {}", reader.u8()?, reader.i32()?),
        LoadI64 => format!("%{}, {}", reader.u8()?, reader.i64()?),
        LoadF32 => format!("%{}, {}", reader.u8()?, reader.f32()?),
        LoadF64 => format!("%{}, {}", reader.u8()?, reader.f64()?),
        LoadOffset => format!("%{}, ${}", reader.u8()?, reader.u16()?),
        LoadIndex => format!("%{}, {}", reader.u8()?, reader.u16()?),
        LoadStatic => format!("%{}, #{}", reader.u8()?, reader.u16()?),
        LoadString => format!("%{}, {:?}", reader.u8()?, reader.string()?),
        LoadAddr => format!("%{}, @{}", reader.u8()?, reader.u32()?),
        LoadFunc => {
            let reg = reader.u8()?;
            let addr = reader.u32()?;
            let nargs = reader.u8()?;
            let flags = reader.u8()?;
            format!("%{reg}, @{addr}, nargs={nargs}, flags={flags:#x}")
        }
        LoadType => {
            let reg = reader.u8()?;
            let count = reader.u16()?;
            let name = reader.short_string()?;
            let mut members = Vec::with_capacity(count as usize);
            for _ in 0..count {
                members.push(reader.short_string()?);
            }
            format!("%{reg}, {name:?}, members={members:?}")
        }
        LoadMem => format!("%{}, %{}, {}", reader.u8()?, reader.u8()?, reader.u8()?),
        LoadMemHash => format!("%{}, %{}, #{:#010x}", reader.u8()?, reader.u8()?, reader.u32()?),
        LoadArrayIdx => format!("%{}, %{}, %{}", reader.u8()?, reader.u8()?, reader.u8()?),
        LoadNull | LoadTrue | LoadFalse => format!("%{}", reader.u8()?),

        MovOffset => format!("${}, %{}", reader.u16()?, reader.u8()?),
        MovIndex => format!("{}, %{}", reader.u16()?, reader.u8()?),
        MovMem => format!("%{}, {}, %{}", reader.u8()?, reader.u8()?, reader.u8()?),
        MovMemHash => format!("%{}, #{:#010x}, %{}", reader.u8()?, reader.u32()?, reader.u8()?),
        MovArrayIdx => format!("%{}, %{}, %{}", reader.u8()?, reader.u8()?, reader.u8()?),
        MovReg => format!("%{}, %{}", reader.u8()?, reader.u8()?),

        HasMemHash => format!("%{}, %{}, #{:#010x}", reader.u8()?, reader.u8()?, reader.u32()?),

        Push => format!("%{}", reader.u8()?),
        PopN => format!("{}", reader.u8()?),
        PushArray => format!("%{}, %{}", reader.u8()?, reader.u8()?),

        Jmp | Je | Jne | Jg | Jge => format!("@{}", reader.u32()?),

        Call => format!("%{}, argc={}", reader.u8()?, reader.u8()?),
        BeginTry => format!("@{}", reader.u32()?),

        New => format!("%{}, %{}", reader.u8()?, reader.u8()?),
        NewArray => format!("%{}, {}", reader.u8()?, reader.u32()?),

        Cmp => format!("%{}, %{}", reader.u8()?, reader.u8()?),
        Cmpz => format!("%{}", reader.u8()?),

        Add | Sub | Mul | Div | Mod => format!("%{}, %{}, %{}", reader.u8()?, reader.u8()?, reader.u8()?),
        Neg | Not => format!("%{}", reader.u8()?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disassembles_a_hand_built_prelude_and_exit() {
        let mut w = ByteWriter::new();
        w.u8(Opcode::StoreStaticString as u8);
        w.string("hi");
        w.u8(Opcode::LoadI64 as u8);
        w.u8(0);
        w.i64(5);
        w.u8(Opcode::Exit as u8);
        let bytes = w.into_bytes();

        let listing = disassemble(&bytes).unwrap();
        assert!(listing.contains("store_static_string"));
        assert!(listing.contains("load_i64"));
        assert!(listing.contains("%0, 5"));
        assert!(listing.contains("exit"));
    }

    #[test]
    fn unknown_opcode_byte_is_reported() {
        let bytes = vec![0xff];
        assert!(disassemble(&bytes).is_err());
    }

    #[test]
    fn compiling_an_empty_program_produces_a_loadable_bytecode_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("empty.ace");
        std::fs::write(&input, "let x = 1;\n").unwrap();
        let output = dir.path().join("empty.acb");

        compile(input, Some(output.clone())).unwrap();
        let bytes = std::fs::read(&output).unwrap();
        let mut heap = ace_vm::Heap::default();
        let program = ace_vm::load(&bytes, &mut heap).unwrap();
        assert!((program.code_start as usize) < bytes.len());
    }

    #[test]
    fn round_trips_compile_then_decompile() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("prog.ace");
        std::fs::write(&input, "let x = 1;\nlet y = \"hi\";\n").unwrap();
        let bytecode = dir.path().join("prog.acb");
        let listing = dir.path().join("prog.txt");

        compile(input, Some(bytecode.clone())).unwrap();
        decompile(bytecode, Some(listing.clone())).unwrap();

        let text = std::fs::read_to_string(&listing).unwrap();
        assert!(text.contains("-- code --"));
        assert!(text.contains("exit"));
    }
}
