use crate::ast::{Ast, Node};
use crate::error::{Result, TallyError};
use crate::operators::OperatorType;
use crate::parser::ParseListener;
use crate::value::Value;

#[derive(Debug)]
enum StackEntry {
    Operator(OperatorType),
    Function { name: String },
    ParensOpen,
}

/// Dijkstra's shunting yard, extended for variable-argument functions with
/// a per-call argument counter plus a were-values marker stack (the marker
/// distinguishes `f()` from `f(x)`).
///
/// Errors produced here carry offset 0; the parser attaches the real source
/// offset when it forwards the event.
#[derive(Debug, Default)]
pub struct ShuntingYard {
    values: Vec<Node>,
    stack: Vec<StackEntry>,
    args_count: Vec<usize>,
    were_values: Vec<bool>,
}

impl ShuntingYard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.stack.is_empty()
    }

    fn is_function_on_stack(&self) -> bool {
        self.stack
            .iter()
            .any(|e| matches!(e, StackEntry::Function { .. }))
    }

    fn mark_value_seen(&mut self) {
        if let Some(top) = self.were_values.last_mut() {
            *top = true;
        }
    }

    pub fn push_value(&mut self, node: Node) {
        self.values.push(node);
        self.mark_value_seen();
    }

    pub fn push_function(&mut self, name: String) {
        self.args_count.push(0);
        self.mark_value_seen();
        self.were_values.push(false);
        self.stack.push(StackEntry::Function { name });
    }

    pub fn push_opening_parens(&mut self) {
        self.stack.push(StackEntry::ParensOpen);
    }

    pub fn push_argument_delimiter(&mut self) -> Result<()> {
        if !self.is_function_on_stack() {
            return Err(TallyError::parse("Unexpected argument delimiter", 0));
        }
        self.pop_until_parens_open()?;

        if self.were_values.pop().unwrap_or(false) {
            if let Some(count) = self.args_count.last_mut() {
                *count += 1;
            }
        }
        self.were_values.push(false);
        Ok(())
    }

    pub fn push_closing_parens(&mut self) -> Result<()> {
        let before = self.values.len() as isize;
        if !self.pop_until_parens_open()? {
            return Err(TallyError::parse("Mismatched closing parens", 0));
        }
        let mut delta = self.values.len() as isize - before;

        self.stack.pop(); // the opening parens

        if matches!(self.stack.last(), Some(StackEntry::Function { .. })) {
            let entry = self.stack.pop().expect("peeked");
            return self.output(entry);
        }

        // A parenthesized group that is not an argument list keeps its
        // parentheses as an explicit Expression node. A negative delta
        // means an operator already consumed the group's values.
        if delta >= 0 {
            let mut children = Vec::new();
            while let Some(node) = self.values.pop() {
                children.insert(0, node);
                delta -= 1;
                if delta < 0 {
                    break;
                }
            }
            self.values.push(Node::expression(children));
        }
        Ok(())
    }

    pub fn push_operator(&mut self, op: OperatorType) -> Result<()> {
        while let Some(StackEntry::Operator(top)) = self.stack.last() {
            let pops = (op.is_left_associative() && op.precedence() <= top.precedence())
                || op.precedence() < top.precedence();
            if !pops {
                break;
            }
            let entry = self.stack.pop().expect("peeked");
            self.output(entry)?;
        }
        self.stack.push(StackEntry::Operator(op));
        Ok(())
    }

    fn pop_until_parens_open(&mut self) -> Result<bool> {
        loop {
            match self.stack.last() {
                None => return Ok(false),
                Some(StackEntry::ParensOpen) => return Ok(true),
                Some(_) => {
                    let entry = self.stack.pop().expect("peeked");
                    self.output(entry)?;
                }
            }
        }
    }

    fn output(&mut self, entry: StackEntry) -> Result<()> {
        match entry {
            StackEntry::ParensOpen => Err(TallyError::parse("No matching closing parens", 0)),
            StackEntry::Function { name } => {
                let mut arg_count = self.args_count.pop().unwrap_or(0);
                if self.were_values.pop().unwrap_or(false) {
                    arg_count += 1;
                }

                let mut args = Vec::with_capacity(arg_count);
                for _ in 0..arg_count {
                    let node = self.values.pop().ok_or_else(|| {
                        TallyError::parse(format!("Function '{}' lacks argument", name), 0)
                    })?;
                    args.insert(0, node);
                }
                self.values.push(Node::call(name, args));
                Ok(())
            }
            StackEntry::Operator(op) => {
                let mut operands = Vec::with_capacity(op.argument_count());
                for _ in 0..op.argument_count() {
                    let node = self.values.pop().ok_or_else(|| {
                        TallyError::parse(format!("Operator '{}' lacks operand", op), 0)
                    })?;
                    operands.insert(0, node);
                }
                self.values.push(Node::operator(op, operands));
                Ok(())
            }
        }
    }

    /// Drain the operator stack and return the single finished tree.
    pub fn result(&mut self) -> Result<Node> {
        while let Some(entry) = self.stack.pop() {
            self.output(entry)?;
        }

        if self.values.is_empty() {
            return Err(TallyError::parse("Empty expression?", 0));
        }
        if self.values.len() != 1 {
            return Err(TallyError::parse("Values without operator?", 0));
        }
        Ok(self.values.pop().expect("length checked"))
    }
}

/// `ParseListener` that feeds the shunting yard and collects one tree per
/// expression delimiter.
#[derive(Debug, Default)]
pub struct AstBuilder {
    yard: ShuntingYard,
    ast: Ast,
}

impl AstBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(mut self) -> Result<Ast> {
        if !self.yard.is_empty() {
            self.push_expression_delimiter()?;
        }
        Ok(self.ast)
    }
}

impl ParseListener for AstBuilder {
    fn push_value(&mut self, value: Value) -> Result<()> {
        self.yard.push_value(Node::literal(value));
        Ok(())
    }

    fn push_identifier(&mut self, name: String) -> Result<()> {
        self.yard.push_value(Node::variable(name));
        Ok(())
    }

    fn push_operator(&mut self, op: OperatorType) -> Result<()> {
        self.yard.push_operator(op)
    }

    fn push_function_invocation(&mut self, name: String) -> Result<()> {
        self.yard.push_function(name);
        Ok(())
    }

    fn push_opening_parens(&mut self) -> Result<()> {
        self.yard.push_opening_parens();
        Ok(())
    }

    fn push_closing_parens(&mut self) -> Result<()> {
        self.yard.push_closing_parens()
    }

    fn push_argument_delimiter(&mut self) -> Result<()> {
        self.yard.push_argument_delimiter()
    }

    fn push_expression_delimiter(&mut self) -> Result<()> {
        let statement = self.yard.result()?;
        tracing::debug!(statement = %statement, "finished statement");
        self.ast.statements.push(statement);
        self.yard = ShuntingYard::new();
        Ok(())
    }
}
