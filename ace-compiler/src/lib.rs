//! Semantic analysis and bytecode emission for Ace.
//!
//! `ace-ast` owns node data; the three traversals (`Visit`, `Optimize`,
//! `Build`) live here as free functions taking a `CompilationUnit` as
//! explicit context (spec Design Notes §9).

pub mod analyzer;
pub mod bytecode;
pub mod emit;
pub mod lints;
pub mod module;
pub mod optimizer;
pub mod scope;
pub mod types;
pub mod unit;

pub use analyzer::{analyze, lookup_identifier, substitute_function_args, Lookup};
pub use bytecode::{ByteReader, ByteWriter, Opcode};
pub use emit::{Buildable, Chunk, Emitter, StaticObject};
pub use lints::{LintRule, NamingConventionRule, UnusedIdentifierRule};
pub use module::{Module, ModuleId, ModuleTree};
pub use optimizer::optimize;
pub use scope::{FunctionFlags, Identifier, IdentifierFlags, Scope, ScopeKind};
pub use types::{Builtins, Member, SymbolType, TypeClass, TypeError, TypeId, TypeTable};
pub use unit::CompilationUnit;
