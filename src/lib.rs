//! # openscad-parse
//!
//! An `OpenSCAD` front-end: parses `.scad` source into a typed,
//! position-annotated AST suitable for building linters, formatters,
//! refactoring tools, and language servers.
//!
//! Beyond the parser itself, the crate provides the plumbing real tools
//! need: textual `include` expansion backed by a source map (so every node
//! still reports its true file, line, and column), `OpenSCAD`-compatible
//! library path resolution, an mtime-keyed AST cache for file parsing, and
//! a JSON serialization of the tree.
//!
//! ## Quick Start
//!
//! ```rust
//! use openscad_parse::parse;
//!
//! let source = r#"
//!     module box(size = 10) {
//!         cube(size);
//!     }
//!     box(size = 20);
//! "#;
//!
//! let ast = parse(source).expect("parse error");
//! println!("Parsed {} statements", ast.statements.len());
//! ```
//!
//! For file input with include expansion and caching, use
//! [`parse_file`]; for library lookup via `OPENSCADPATH`, use
//! [`parse_library_file`] or [`find_library_file`].

pub mod ast;
pub mod error;
pub mod files;
pub mod includes;
pub mod lexer;
pub mod parser;
pub mod resolver;
pub mod serialize;
pub mod source_map;
pub mod span;
pub mod token;
pub mod visit;

// Re-exports for convenience
pub use ast::{
    Argument, Assignment, BinaryOp, Expr, ExprKind, Instantiation, InstantiationKind,
    ListCompElement, ListCompElementKind, Parameter, Position, SourceFile, Statement,
    StatementKind, UnaryOp,
};
pub use error::{DeserializeError, Error, OutOfRange, ParseError, ParseResult};
pub use files::{ParseOptions, clear_ast_cache, parse_file, parse_library_file, parse_string};
pub use parser::parse;
pub use resolver::find_library_file;
pub use source_map::{SourceMap, SourceSegment};
pub use span::Span;
pub use visit::Visitor;
