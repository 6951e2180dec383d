use std::collections::HashMap;

use crate::ast::{Ast, Node, NodeKind};
use crate::error::{Result, TallyError};
use crate::native::NativeRegistry;
use crate::operators::OperatorType;
use crate::types::Type;
use crate::value::Value;

/// Variable storage visible to a running program.
pub trait Scope {
    fn read_variable(&self, name: &str) -> Option<Value>;
    fn write_variable(&mut self, name: &str, value: Value);

    fn data_type(&self, name: &str) -> Option<Type> {
        self.read_variable(name).map(|v| v.ty())
    }
}

/// Plain in-memory scope.
#[derive(Debug, Default, Clone)]
pub struct MapScope {
    variables: HashMap<String, Value>,
}

impl MapScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.variables.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn variables(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.variables.iter()
    }
}

impl Scope for MapScope {
    fn read_variable(&self, name: &str) -> Option<Value> {
        self.variables.get(name).cloned()
    }

    fn write_variable(&mut self, name: &str, value: Value) {
        self.variables.insert(name.to_string(), value);
    }
}

/// Tree-walking evaluator. Calls are resolved against the current target
/// registry and the resolution is memoized per (name, argument types);
/// swapping the target drops the cache.
///
/// `and` and `or` evaluate both operands, there is no short-circuiting.
#[derive(Default)]
pub struct Evaluator {
    target: Option<NativeRegistry>,
    method_cache: HashMap<(String, Vec<Type>), usize>,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_target(target: NativeRegistry) -> Self {
        Self {
            target: Some(target),
            method_cache: HashMap::new(),
        }
    }

    pub fn set_target(&mut self, target: Option<NativeRegistry>) {
        tracing::debug!(cached = self.method_cache.len(), "target changed, dropping method cache");
        self.method_cache.clear();
        self.target = target;
    }

    pub fn target(&self) -> Option<&NativeRegistry> {
        self.target.as_ref()
    }

    /// Evaluate every statement in order; the last statement's value is the
    /// program's result. An empty program evaluates to unit.
    pub fn evaluate(&mut self, ast: &Ast, scope: &mut dyn Scope) -> Result<Value> {
        let _span = tracing::debug_span!("evaluate", statements = ast.statements.len()).entered();
        let mut result = Value::Unit;
        for statement in &ast.statements {
            result = self.eval_node(statement, scope)?;
        }
        Ok(result)
    }

    fn eval_node(&mut self, node: &Node, scope: &mut dyn Scope) -> Result<Value> {
        match &node.kind {
            NodeKind::Literal(value) => Ok(value.clone()),
            NodeKind::Variable(name) => scope
                .read_variable(name)
                .ok_or_else(|| TallyError::UnknownVariable(name.clone())),
            NodeKind::Operator { op, operands } => {
                if *op == OperatorType::Assign {
                    return self.eval_assignment(operands, scope);
                }
                let mut values = Vec::with_capacity(operands.len());
                for operand in operands {
                    values.push(self.eval_node(operand, scope)?);
                }
                op.apply(&values)
            }
            NodeKind::Call { name, args, .. } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval_node(arg, scope)?);
                }
                self.invoke(name, values)
            }
            NodeKind::Expression(children) => {
                let mut result = Value::Unit;
                for child in children {
                    result = self.eval_node(child, scope)?;
                }
                Ok(result)
            }
        }
    }

    /// Only the right-hand side is evaluated; the left-hand side names the
    /// variable to write. The assigned value is the expression's value.
    fn eval_assignment(&mut self, operands: &[Node], scope: &mut dyn Scope) -> Result<Value> {
        let [lhs, rhs] = operands else {
            return Err(TallyError::RuntimeError(
                "assignment requires exactly two operands".to_string(),
            ));
        };
        let NodeKind::Variable(name) = &lhs.kind else {
            return Err(TallyError::TypeError(format!(
                "Left-hand side of assignment must be a variable, got {}",
                lhs
            )));
        };
        let value = self.eval_node(rhs, scope)?;
        if value.is_unit() {
            return Err(TallyError::VoidValue(format!(
                "cannot assign a void result to '{}'",
                name
            )));
        }
        scope.write_variable(name, value.clone());
        Ok(value)
    }

    fn invoke(&mut self, name: &str, args: Vec<Value>) -> Result<Value> {
        let target = self.target.as_ref().ok_or_else(|| {
            TallyError::NoMatchingMethod(format!(
                "cannot invoke '{}', no target object set",
                name
            ))
        })?;

        let types: Vec<Type> = args.iter().map(Value::ty).collect();
        let key = (name.to_string(), types);
        let index = match self.method_cache.get(&key) {
            Some(index) => *index,
            None => {
                let index = target.find_method(name, &key.1)?;
                self.method_cache.insert(key, index);
                index
            }
        };
        target.invoke(index, args)
    }
}
