//! Front end and semantic core of a CHP simulator.
//!
//! CHP (Communicating Hardware Processes) is a concurrent
//! hardware-description language: processes exchange values over typed
//! channels with send (`!`), receive (`?`), peek (`#?`) and probe (`#`)
//! primitives, and coordinate with guarded selection and loops. This
//! crate takes raw source bytes to a fully annotated, cross-referenced
//! tree ready to execute:
//!
//! 1. the lexer (tokenization, with file and interactive command modes),
//! 2. the recursive-descent parser and its tagged node tree,
//! 3. the module resolver (search path, load-once, cycle detection,
//!    reverse topological ordering),
//! 4. the two-pass semantic analyzer (scopes, import/export, forward
//!    declarations, type checking).
//!
//! The executor proper (scheduling, channel rendezvous) is a separate
//! subsystem; see `exec` for the hand-off interface.

pub mod ast;
pub mod cli;
pub mod error;
pub mod exec;
pub mod intern;
pub mod lexer;
pub mod modules;
pub mod parser;
pub mod scope;
pub mod sem;
pub mod style;
pub mod token;
pub mod types;

pub use ast::{Ast, Node, NodeFlags, NodeId, NodeKind};
pub use error::{DiagKind, Diagnostic, Result};
pub use exec::{find_main, prepare_exec, read_source, ExecState, ProcessState, Value};
pub use intern::{Interner, Symbol};
pub use lexer::{LexFlags, Lexer};
pub use modules::{Driver, Module, ModuleId};
pub use parser::{ParseFlags, Parser};
pub use scope::{Binding, Context, CtxId, ScopeArena};
pub use sem::{Analyzer, SemFlags};
pub use token::{Token, TokenKind, TokenValue};
pub use types::{assignable, type_compatible, type_compatible_exec, Type};
