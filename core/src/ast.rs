use std::fmt;

use crate::operators::OperatorType;
use crate::value::Value;

/// One node of the expression tree. `ty` is populated by the typer; an
/// untyped tree can still be evaluated by the tree-walking interpreter.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub ty: Option<crate::types::Type>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Literal(Value),
    Variable(String),
    Operator {
        op: OperatorType,
        operands: Vec<Node>,
    },
    Call {
        name: String,
        args: Vec<Node>,
        /// Registry index recorded by the typer for downstream consumers;
        /// the evaluator re-resolves against the current target.
        resolved: Option<usize>,
    },
    /// An explicitly parenthesized group that is not a function argument
    /// list. Kept so printing preserves the author's parentheses.
    Expression(Vec<Node>),
}

impl Node {
    pub fn literal(value: Value) -> Node {
        Node {
            kind: NodeKind::Literal(value),
            ty: None,
        }
    }

    pub fn variable(name: impl Into<String>) -> Node {
        Node {
            kind: NodeKind::Variable(name.into()),
            ty: None,
        }
    }

    pub fn operator(op: OperatorType, operands: Vec<Node>) -> Node {
        Node {
            kind: NodeKind::Operator { op, operands },
            ty: None,
        }
    }

    pub fn call(name: impl Into<String>, args: Vec<Node>) -> Node {
        Node {
            kind: NodeKind::Call {
                name: name.into(),
                args,
                resolved: None,
            },
            ty: None,
        }
    }

    pub fn expression(children: Vec<Node>) -> Node {
        Node {
            kind: NodeKind::Expression(children),
            ty: None,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self.kind, NodeKind::Literal(_))
    }

    pub fn literal_value(&self) -> Option<&Value> {
        match &self.kind {
            NodeKind::Literal(value) => Some(value),
            _ => None,
        }
    }

    fn precedence(&self) -> Option<u8> {
        match &self.kind {
            NodeKind::Operator { op, .. } => Some(op.precedence()),
            _ => None,
        }
    }
}

/// Root of a parsed input: one tree per semicolon-separated statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ast {
    pub statements: Vec<Node>,
}

impl Ast {
    pub fn new() -> Ast {
        Ast::default()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// Prints a literal the way the lexer would read it back: strings quoted
/// with escapes, floats always with a decimal point.
fn write_literal(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Str(s) => {
            write!(f, "'")?;
            for c in s.chars() {
                if c == '\'' || c == '\\' {
                    write!(f, "\\")?;
                }
                write!(f, "{}", c)?;
            }
            write!(f, "'")
        }
        Value::F32(v) => write!(f, "{:?}", v),
        Value::F64(v) => write!(f, "{:?}", v),
        other => write!(f, "{}", other),
    }
}

/// Wraps an operand in parentheses when printing it bare would re-parse
/// with a different shape: lower-precedence children always, and
/// equal-precedence right operands of left-associative operators.
fn write_operand(
    f: &mut fmt::Formatter<'_>,
    parent: OperatorType,
    operand: &Node,
    is_right: bool,
) -> fmt::Result {
    let needs_parens = match operand.precedence() {
        Some(child) => {
            child < parent.precedence()
                || (child == parent.precedence() && is_right && parent.is_left_associative())
        }
        None => false,
    };
    if needs_parens {
        write!(f, "({})", operand)
    } else {
        write!(f, "{}", operand)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NodeKind::Literal(value) => write_literal(f, value),
            NodeKind::Variable(name) => write!(f, "{}", name),
            NodeKind::Operator { op, operands } => {
                if op.argument_count() == 1 {
                    write!(f, "{} ", op)?;
                    write_operand(f, *op, &operands[0], false)
                } else {
                    write_operand(f, *op, &operands[0], false)?;
                    write!(f, " {} ", op)?;
                    write_operand(f, *op, &operands[1], true)
                }
            }
            NodeKind::Call { name, args, .. } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            NodeKind::Expression(children) => {
                write!(f, "(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", child)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for Ast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, statement) in self.statements.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", statement)?;
        }
        Ok(())
    }
}
