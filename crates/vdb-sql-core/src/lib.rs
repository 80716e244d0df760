//! # vdb-sql-core
//!
//! SQL front end for the virtual database engine: a hand-written lexer, a
//! recursive-descent parser with Pratt expression parsing, a typed AST,
//! and a `Display`-based SQL renderer.
//!
//! ## Parsing
//!
//! ```rust
//! use vdb_sql_core::parse_select;
//!
//! let select = parse_select("SELECT name FROM users WHERE age >= 18").unwrap();
//! assert_eq!(select.columns.len(), 1);
//! ```
//!
//! ## Round-tripping
//!
//! Rendering an AST with `to_string()` produces SQL that parses back to a
//! structurally equal tree:
//!
//! ```rust
//! use vdb_sql_core::parse_select;
//!
//! let first = parse_select("SELECT a, b FROM t WHERE a = 1 LIMIT 3").unwrap();
//! let second = parse_select(&first.to_string()).unwrap();
//! assert_eq!(first, second);
//! ```

pub mod ast;
pub mod lexer;
pub mod parser;

pub use ast::{Expr, SelectStatement, Statement};
pub use lexer::{Keyword, Lexer, Span, Token, TokenKind};
pub use parser::{parse_select, parse_statement, ParseError, Parser};
