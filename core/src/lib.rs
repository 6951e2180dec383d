//! Expression language front end: lexer, shunting-yard parser, typer,
//! simplifier and a tree-walking evaluator with host method dispatch.

pub mod ast;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod native;
pub mod operators;
pub mod parser;
pub mod shunting_yard;
pub mod simplify;
pub mod typer;
pub mod types;
pub mod value;

pub use ast::{Ast, Node, NodeKind};
pub use error::{Result, TallyError};
pub use interpreter::{Evaluator, MapScope, Scope};
pub use lexer::{Lexer, Scanner, Token, TokenKind};
pub use native::{NativeFn, NativeMethod, NativeRegistry};
pub use operators::OperatorType;
pub use parser::{ExpressionParser, ParseListener};
pub use shunting_yard::{AstBuilder, ShuntingYard};
pub use simplify::Simplifier;
pub use typer::Typer;
pub use types::{DataType, NumericType, Type};
pub use value::Value;

/// Parse source text into an AST, one tree per semicolon-separated
/// statement.
pub fn parse(source: &str) -> Result<Ast> {
    let _span = tracing::debug_span!("parse", len = source.len()).entered();
    let mut lexer = Lexer::from_source(source);
    let mut builder = AstBuilder::new();
    ExpressionParser::new().parse(&mut lexer, &mut builder)?;
    // Errors from draining the final statement carry no position of their
    // own; attach the end-of-input offset.
    builder.build().map_err(|e| match e {
        TallyError::ParseError { message, offset: 0 } => {
            TallyError::parse(message, lexer.offset())
        }
        other => other,
    })
}
