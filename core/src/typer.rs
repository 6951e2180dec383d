use std::collections::HashMap;

use crate::ast::{Ast, Node, NodeKind};
use crate::error::{Result, TallyError};
use crate::interpreter::Scope;
use crate::native::NativeRegistry;
use crate::types::Type;

/// Annotates every node with its static type and resolves calls against
/// the host method registry. Variable types come from assignments seen
/// earlier in the same program, falling back to the scope.
pub struct Typer<'a> {
    target: Option<&'a NativeRegistry>,
    scope: Option<&'a dyn Scope>,
    locals: HashMap<String, Type>,
}

impl<'a> Typer<'a> {
    pub fn new(target: Option<&'a NativeRegistry>) -> Self {
        Self {
            target,
            scope: None,
            locals: HashMap::new(),
        }
    }

    pub fn with_scope(mut self, scope: &'a dyn Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn type_ast(&mut self, ast: &mut Ast) -> Result<()> {
        for statement in &mut ast.statements {
            self.type_node(statement)?;
        }
        Ok(())
    }

    pub fn type_node(&mut self, node: &mut Node) -> Result<Type> {
        let ty = match &mut node.kind {
            NodeKind::Literal(value) => value.ty(),
            NodeKind::Variable(name) => self.variable_type(name)?,
            NodeKind::Operator { op, operands } => {
                if matches!(op, crate::operators::OperatorType::Assign) {
                    self.type_assignment(operands)?
                } else {
                    let mut types = Vec::with_capacity(operands.len());
                    for operand in operands.iter_mut() {
                        types.push(self.type_node(operand)?);
                    }
                    op.result_type(&types)?
                }
            }
            NodeKind::Call {
                name,
                args,
                resolved,
            } => {
                let mut types = Vec::with_capacity(args.len());
                for arg in args.iter_mut() {
                    types.push(self.type_node(arg)?);
                }
                let target = self.target.ok_or_else(|| {
                    TallyError::NoMatchingMethod(format!(
                        "cannot resolve '{}', no target object set",
                        name
                    ))
                })?;
                let index = target.find_method(name, &types)?;
                *resolved = Some(index);
                target.get(index).expect("resolved index").return_type
            }
            NodeKind::Expression(children) => {
                let mut last = Type::Unit;
                for child in children.iter_mut() {
                    last = self.type_node(child)?;
                }
                last
            }
        };
        node.ty = Some(ty);
        Ok(ty)
    }

    fn variable_type(&self, name: &str) -> Result<Type> {
        if let Some(ty) = self.locals.get(name) {
            return Ok(*ty);
        }
        if let Some(ty) = self.scope.and_then(|s| s.data_type(name)) {
            return Ok(ty);
        }
        Err(TallyError::UnknownVariable(name.to_string()))
    }

    /// The left-hand side must be a plain variable; its type becomes the
    /// right-hand side's. Re-assigning with a conflicting type is an error.
    fn type_assignment(&mut self, operands: &mut [Node]) -> Result<Type> {
        let [lhs, rhs] = operands else {
            return Err(TallyError::TypeError(
                "assignment requires exactly two operands".to_string(),
            ));
        };
        let NodeKind::Variable(name) = &lhs.kind else {
            return Err(TallyError::TypeError(format!(
                "Left-hand side of assignment must be a variable, got {}",
                lhs
            )));
        };
        let name = name.clone();

        let rhs_type = self.type_node(rhs)?;
        if rhs_type == Type::Unit {
            return Err(TallyError::VoidValue(format!(
                "cannot assign a void result to '{}'",
                name
            )));
        }
        match self.locals.get(&name) {
            Some(existing) if *existing != rhs_type => {
                return Err(TallyError::TypeError(format!(
                    "variable '{}' was {} and cannot be re-assigned as {}",
                    name, existing, rhs_type
                )));
            }
            _ => {}
        }
        lhs.ty = Some(rhs_type);
        self.locals.insert(name, rhs_type);
        Ok(rhs_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::NativeMethod;
    use crate::parse;
    use crate::value::Value;

    fn typed(source: &str, target: Option<&NativeRegistry>) -> Result<Ast> {
        let mut ast = parse(source)?;
        Typer::new(target).type_ast(&mut ast)?;
        Ok(ast)
    }

    #[test]
    fn arithmetic_widens() {
        let ast = typed("1 + 2.5", None).unwrap();
        assert_eq!(ast.statements[0].ty, Some(Type::F64));
    }

    #[test]
    fn comparisons_are_boolean() {
        let ast = typed("1 < 2 and true", None).unwrap();
        assert_eq!(ast.statements[0].ty, Some(Type::Bool));
    }

    #[test]
    fn assignment_types_later_uses() {
        let ast = typed("a = 3; a + 1", None).unwrap();
        assert_eq!(ast.statements[1].ty, Some(Type::I32));
    }

    #[test]
    fn conflicting_reassignment_is_rejected() {
        let err = typed("a = 3; a = 'x'", None).unwrap_err();
        assert!(matches!(err, TallyError::TypeError(_)));
    }

    #[test]
    fn assignment_to_non_variable_is_rejected() {
        let err = typed("1 = 2", None).unwrap_err();
        assert!(matches!(err, TallyError::TypeError(_)));
    }

    #[test]
    fn unknown_variables_are_reported() {
        let err = typed("missing + 1", None).unwrap_err();
        assert!(matches!(err, TallyError::UnknownVariable(_)));
    }

    #[test]
    fn calls_resolve_and_record_the_overload() {
        let mut registry = NativeRegistry::new();
        registry.register(NativeMethod::new(
            "twice",
            vec![Type::I32],
            Type::I32,
            |args| match &args[0] {
                Value::I32(v) => Ok(Value::I32(v * 2)),
                _ => unreachable!(),
            },
        ));
        let ast = typed("twice(21) + 1", Some(&registry)).unwrap();
        assert_eq!(ast.statements[0].ty, Some(Type::I32));
        let NodeKind::Operator { operands, .. } = &ast.statements[0].kind else {
            panic!("expected operator");
        };
        let NodeKind::Call { resolved, .. } = &operands[0].kind else {
            panic!("expected call");
        };
        assert_eq!(*resolved, Some(0));
    }

    #[test]
    fn void_results_cannot_be_operands() {
        let mut registry = NativeRegistry::new();
        registry.register(NativeMethod::new("ping", vec![], Type::Unit, |_| {
            Ok(Value::Unit)
        }));
        let err = typed("ping() + 1", Some(&registry)).unwrap_err();
        assert!(matches!(err, TallyError::TypeError(_)));
        let err = typed("a = ping()", Some(&registry)).unwrap_err();
        assert!(matches!(err, TallyError::VoidValue(_)));
    }

    #[test]
    fn calls_without_a_target_are_rejected() {
        let err = typed("f(1)", None).unwrap_err();
        assert!(matches!(err, TallyError::NoMatchingMethod(_)));
    }
}
