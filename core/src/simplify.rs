use crate::ast::{Ast, Node, NodeKind};
use crate::error::{Result, TallyError};
use crate::interpreter::Scope;
use crate::native::NativeRegistry;
use crate::operators::OperatorType;
use crate::types::Type;

/// Rewrites a tree into a simpler equivalent one: constant subtrees fold
/// into literals and, optionally, variables resolve to their current scope
/// values. Assignments are never folded; calls fold only when the resolved
/// overload is pure and returns a value.
pub struct Simplifier<'a> {
    target: Option<&'a NativeRegistry>,
    resolve_variables: bool,
    fold_constants: bool,
}

impl<'a> Simplifier<'a> {
    pub fn new(target: Option<&'a NativeRegistry>) -> Self {
        Self {
            target,
            resolve_variables: false,
            fold_constants: true,
        }
    }

    pub fn resolve_variables(mut self, resolve: bool) -> Self {
        self.resolve_variables = resolve;
        self
    }

    pub fn fold_constants(mut self, fold: bool) -> Self {
        self.fold_constants = fold;
        self
    }

    pub fn simplify(&self, ast: Ast, scope: &dyn Scope) -> Result<Ast> {
        let mut statements = Vec::with_capacity(ast.statements.len());
        for statement in ast.statements {
            statements.push(self.simplify_node(statement, scope)?);
        }
        Ok(Ast { statements })
    }

    pub fn simplify_node(&self, node: Node, scope: &dyn Scope) -> Result<Node> {
        match node.kind {
            NodeKind::Literal(_) => Ok(node),
            NodeKind::Variable(ref name) => {
                if !self.resolve_variables {
                    return Ok(node);
                }
                match scope.read_variable(name) {
                    Some(value) if value.is_unit() => Err(TallyError::VoidValue(format!(
                        "variable '{}' holds a void value",
                        name
                    ))),
                    Some(value) => Ok(Node::literal(value)),
                    // Unknown here may still exist at evaluation time.
                    None => Ok(node),
                }
            }
            NodeKind::Operator { op, operands } => {
                let mut simplified = Vec::with_capacity(operands.len());
                for (i, operand) in operands.into_iter().enumerate() {
                    // An assignment's left-hand side names a variable, it
                    // must not resolve to that variable's current value.
                    if op == OperatorType::Assign && i == 0 {
                        simplified.push(operand);
                    } else {
                        simplified.push(self.simplify_node(operand, scope)?);
                    }
                }
                if op != OperatorType::Assign
                    && self.fold_constants
                    && simplified.iter().all(Node::is_literal)
                {
                    let values: Vec<_> = simplified
                        .iter()
                        .filter_map(|n| n.literal_value().cloned())
                        .collect();
                    let folded = op.apply(&values)?;
                    tracing::trace!(%op, %folded, "folded constant operator");
                    return Ok(Node::literal(folded));
                }
                Ok(Node::operator(op, simplified))
            }
            NodeKind::Call {
                name,
                args,
                resolved,
            } => {
                let mut simplified = Vec::with_capacity(args.len());
                for arg in args {
                    simplified.push(self.simplify_node(arg, scope)?);
                }
                if self.fold_constants && simplified.iter().all(Node::is_literal) {
                    if let Some(target) = self.target {
                        if let Some(folded) = self.try_fold_call(target, &name, &simplified)? {
                            return Ok(folded);
                        }
                    }
                }
                let mut node = Node::call(name, simplified);
                if let NodeKind::Call { resolved: slot, .. } = &mut node.kind {
                    *slot = resolved;
                }
                Ok(node)
            }
            NodeKind::Expression(children) => {
                let mut simplified = Vec::with_capacity(children.len());
                for child in children {
                    simplified.push(self.simplify_node(child, scope)?);
                }
                // A parenthesized lone constant no longer needs its parens.
                if simplified.len() == 1 && simplified[0].is_literal() {
                    return Ok(simplified.pop().expect("length checked"));
                }
                Ok(Node::expression(simplified))
            }
        }
    }

    fn try_fold_call(
        &self,
        target: &NativeRegistry,
        name: &str,
        args: &[Node],
    ) -> Result<Option<Node>> {
        let types: Vec<Type> = args
            .iter()
            .filter_map(|n| n.literal_value())
            .map(|v| v.ty())
            .collect();
        let Ok(index) = target.find_method(name, &types) else {
            return Ok(None);
        };
        let method = target.get(index).expect("resolved index");
        if !method.pure_fn || method.return_type == Type::Unit {
            return Ok(None);
        }
        let values: Vec<_> = args
            .iter()
            .filter_map(|n| n.literal_value().cloned())
            .collect();
        let result = target.invoke(index, values)?;
        tracing::trace!(name, %result, "folded pure call");
        Ok(Some(Node::literal(result)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::MapScope;
    use crate::native::NativeMethod;
    use crate::parse;
    use crate::value::Value;

    fn fold(source: &str) -> Ast {
        let scope = MapScope::new();
        Simplifier::new(None)
            .simplify(parse(source).unwrap(), &scope)
            .unwrap()
    }

    #[test]
    fn constant_arithmetic_folds_to_a_literal() {
        let ast = fold("1 + 2 * 3");
        assert_eq!(ast.statements[0], Node::literal(Value::I32(7)));
    }

    #[test]
    fn folding_is_idempotent() {
        let scope = MapScope::new();
        let once = fold("(1 + 2) * 3 == 9");
        let twice = Simplifier::new(None)
            .simplify(once.clone(), &scope)
            .unwrap();
        assert_eq!(once, twice);
        assert_eq!(once.statements[0], Node::literal(Value::Bool(true)));
    }

    #[test]
    fn non_constant_subtrees_survive() {
        let ast = fold("a + (1 + 2)");
        assert_eq!(ast.statements[0].to_string(), "a + 3");
    }

    #[test]
    fn assignments_never_fold() {
        let ast = fold("a = 1 + 2");
        assert_eq!(ast.statements[0].to_string(), "a = 3");
    }

    #[test]
    fn variables_resolve_on_request() {
        let mut scope = MapScope::new();
        scope.set("a", Value::I32(4));
        let ast = Simplifier::new(None)
            .resolve_variables(true)
            .simplify(parse("a + 1").unwrap(), &scope)
            .unwrap();
        assert_eq!(ast.statements[0], Node::literal(Value::I32(5)));
    }

    #[test]
    fn assignment_targets_survive_variable_resolution() {
        let mut scope = MapScope::new();
        scope.set("a", Value::I32(1));
        let ast = Simplifier::new(None)
            .resolve_variables(true)
            .simplify(parse("a = a + 1").unwrap(), &scope)
            .unwrap();
        assert_eq!(ast.statements[0].to_string(), "a = 2");
    }

    #[test]
    fn only_pure_calls_fold() {
        let mut registry = NativeRegistry::new();
        registry.register(
            NativeMethod::new("double", vec![Type::I32], Type::I32, |args| {
                match &args[0] {
                    Value::I32(v) => Ok(Value::I32(v * 2)),
                    _ => unreachable!(),
                }
            })
            .pure_fn(),
        );
        registry.register(NativeMethod::new("now", vec![], Type::I64, |_| {
            Ok(Value::I64(0))
        }));

        let scope = MapScope::new();
        let ast = Simplifier::new(Some(&registry))
            .simplify(parse("double(21)").unwrap(), &scope)
            .unwrap();
        assert_eq!(ast.statements[0], Node::literal(Value::I32(42)));

        let ast = Simplifier::new(Some(&registry))
            .simplify(parse("now()").unwrap(), &scope)
            .unwrap();
        assert_eq!(ast.statements[0].to_string(), "now()");
    }

    #[test]
    fn folding_can_be_disabled() {
        let scope = MapScope::new();
        let ast = Simplifier::new(None)
            .fold_constants(false)
            .simplify(parse("1 + 2").unwrap(), &scope)
            .unwrap();
        assert_eq!(ast.statements[0].to_string(), "1 + 2");
    }
}
