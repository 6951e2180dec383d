use std::cmp::Ordering;
use std::fmt;

use crate::error::{Result, TallyError};
use crate::types::{DataType, NumericType, Type};
use crate::value::Value;

/// The closed catalog of operators. Precedence and associativity are only
/// consulted by the shunting yard; `apply` computes a value with numeric
/// widening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorType {
    Or,
    And,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    Plus,
    Minus,
    Times,
    Divide,
    Not,
    Assign,
}

impl OperatorType {
    pub const ALL: [OperatorType; 14] = [
        OperatorType::Or,
        OperatorType::And,
        OperatorType::Eq,
        OperatorType::Neq,
        OperatorType::Lt,
        OperatorType::Lte,
        OperatorType::Gt,
        OperatorType::Gte,
        OperatorType::Plus,
        OperatorType::Minus,
        OperatorType::Times,
        OperatorType::Divide,
        OperatorType::Not,
        OperatorType::Assign,
    ];

    pub fn symbol(&self) -> &'static str {
        match self {
            OperatorType::Or => "or",
            OperatorType::And => "and",
            OperatorType::Eq => "==",
            OperatorType::Neq => "!=",
            OperatorType::Lt => "<",
            OperatorType::Lte => "<=",
            OperatorType::Gt => ">",
            OperatorType::Gte => ">=",
            OperatorType::Plus => "+",
            OperatorType::Minus => "-",
            OperatorType::Times => "*",
            OperatorType::Divide => "/",
            OperatorType::Not => "not",
            OperatorType::Assign => "=",
        }
    }

    pub fn argument_count(&self) -> usize {
        match self {
            OperatorType::Not => 1,
            _ => 2,
        }
    }

    pub fn precedence(&self) -> u8 {
        match self {
            OperatorType::Assign => 0,
            OperatorType::Or => 1,
            OperatorType::And => 2,
            OperatorType::Eq | OperatorType::Neq => 3,
            OperatorType::Lt | OperatorType::Lte | OperatorType::Gt | OperatorType::Gte => 4,
            OperatorType::Plus | OperatorType::Minus => 5,
            OperatorType::Times | OperatorType::Divide => 6,
            OperatorType::Not => 7,
        }
    }

    pub fn is_left_associative(&self) -> bool {
        !matches!(self, OperatorType::Not)
    }

    pub fn accepted_operand_types(&self) -> &'static [DataType] {
        match self {
            OperatorType::Or | OperatorType::And | OperatorType::Not => &[DataType::Boolean],
            OperatorType::Eq | OperatorType::Neq => {
                &[DataType::Boolean, DataType::Number, DataType::String]
            }
            OperatorType::Lt
            | OperatorType::Lte
            | OperatorType::Gt
            | OperatorType::Gte
            | OperatorType::Minus
            | OperatorType::Times
            | OperatorType::Divide => &[DataType::Number],
            OperatorType::Plus => &[DataType::Number, DataType::String],
            OperatorType::Assign => &[DataType::Number, DataType::String, DataType::Boolean],
        }
    }

    /// Case-insensitive exact symbol lookup.
    pub fn exact_match(text: &str) -> Option<OperatorType> {
        OperatorType::ALL
            .into_iter()
            .find(|op| op.symbol().eq_ignore_ascii_case(text))
    }

    /// Whether some operator symbol starts with the given prefix; drives
    /// the lexer's greedy longest-match accumulation.
    pub fn may_be_operator(prefix: &str) -> bool {
        let prefix = prefix.to_ascii_lowercase();
        OperatorType::ALL
            .into_iter()
            .any(|op| op.symbol().starts_with(&prefix))
    }

    fn assert_supported_arguments(&self, args: &[Value]) -> Result<()> {
        for (i, arg) in args.iter().enumerate() {
            let data_type = arg.data_type().ok_or_else(|| {
                TallyError::VoidValue(format!("operand {i} of operator {self}"))
            })?;
            if !self.accepted_operand_types().contains(&data_type) {
                return Err(TallyError::TypeError(format!(
                    "Operand {i} with type {data_type} is not supported for operator {self} \
                     (supported types are: {:?})",
                    self.accepted_operand_types()
                )));
            }
        }
        Ok(())
    }

    /// Apply the operator to already-evaluated operands. Assignment is a
    /// side effect special-cased by the evaluator and must not end up here.
    pub fn apply(&self, args: &[Value]) -> Result<Value> {
        if args.len() != self.argument_count() {
            return Err(TallyError::RuntimeError(format!(
                "Operator {self} cannot be called with {} arguments (requires {})",
                args.len(),
                self.argument_count()
            )));
        }
        self.assert_supported_arguments(args)?;
        match self {
            OperatorType::Or => {
                Ok(Value::Bool(expect_bool(&args[0])? || expect_bool(&args[1])?))
            }
            OperatorType::And => {
                Ok(Value::Bool(expect_bool(&args[0])? && expect_bool(&args[1])?))
            }
            OperatorType::Not => Ok(Value::Bool(!expect_bool(&args[0])?)),
            OperatorType::Eq => Ok(Value::Bool(values_equal(&args[0], &args[1])?)),
            OperatorType::Neq => Ok(Value::Bool(!values_equal(&args[0], &args[1])?)),
            OperatorType::Lt => compare(&args[0], &args[1], |o| o == Ordering::Less),
            OperatorType::Lte => compare(&args[0], &args[1], |o| o != Ordering::Greater),
            OperatorType::Gt => compare(&args[0], &args[1], |o| o == Ordering::Greater),
            OperatorType::Gte => compare(&args[0], &args[1], |o| o != Ordering::Less),
            OperatorType::Plus => plus(&args[0], &args[1]),
            OperatorType::Minus | OperatorType::Times | OperatorType::Divide => {
                numeric_binary_op(*self, &args[0], &args[1])
            }
            OperatorType::Assign => Err(TallyError::RuntimeError(
                "assignment is applied by the evaluator, not the operator catalog".to_string(),
            )),
        }
    }

    /// Static result type rule used by the typer. Operand types must
    /// already be known and are validated against the accepted set.
    pub fn result_type(&self, operands: &[Type]) -> Result<Type> {
        if operands.len() != self.argument_count() {
            return Err(TallyError::TypeError(format!(
                "Operator {self} requires {} arguments, got {}",
                self.argument_count(),
                operands.len()
            )));
        }
        for (i, ty) in operands.iter().enumerate() {
            let data_type = ty.data_type().ok_or_else(|| {
                TallyError::TypeError(format!(
                    "operand {i} of operator {self} has no value type"
                ))
            })?;
            if !self.accepted_operand_types().contains(&data_type) {
                return Err(TallyError::TypeError(format!(
                    "Operand {i} with type {ty} is not supported for operator {self} \
                     (supported types are: {:?})",
                    self.accepted_operand_types()
                )));
            }
        }
        match self {
            OperatorType::Or
            | OperatorType::And
            | OperatorType::Not
            | OperatorType::Eq
            | OperatorType::Neq
            | OperatorType::Lt
            | OperatorType::Lte
            | OperatorType::Gt
            | OperatorType::Gte => Ok(Type::Bool),
            OperatorType::Plus => {
                if operands[0] == Type::Str || operands[1] == Type::Str {
                    Ok(Type::Str)
                } else {
                    widened_type(operands[0], operands[1])
                }
            }
            OperatorType::Minus | OperatorType::Times | OperatorType::Divide => {
                widened_type(operands[0], operands[1])
            }
            OperatorType::Assign => Err(TallyError::TypeError(
                "assignment result type is derived from its right-hand side".to_string(),
            )),
        }
    }
}

impl fmt::Display for OperatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

fn widened_type(a: Type, b: Type) -> Result<Type> {
    let ta = NumericType::from_type(a)
        .ok_or_else(|| TallyError::TypeError(format!("{a} is not numeric")))?;
    let tb = NumericType::from_type(b)
        .ok_or_else(|| TallyError::TypeError(format!("{b} is not numeric")))?;
    Ok(NumericType::wider(ta, tb).to_type())
}

fn expect_bool(value: &Value) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| TallyError::TypeError(format!("{value} is not a boolean")))
}

/// Equality across differing data types is `false`, not an error.
fn values_equal(left: &Value, right: &Value) -> Result<bool> {
    match (left.data_type(), right.data_type()) {
        (Some(lt), Some(rt)) if lt == rt => {}
        _ => return Ok(false),
    }
    if left.data_type() == Some(DataType::Number) {
        let wider = NumericType::wider_of_values(left, right)?;
        Ok(wider.convert(left)? == wider.convert(right)?)
    } else {
        Ok(left == right)
    }
}

fn compare(left: &Value, right: &Value, check: fn(Ordering) -> bool) -> Result<Value> {
    let wider = NumericType::wider_of_values(left, right)?;
    let a = wider.convert(left)?;
    let b = wider.convert(right)?;
    let ordering = match (&a, &b) {
        (Value::I8(x), Value::I8(y)) => x.cmp(y),
        (Value::I16(x), Value::I16(y)) => x.cmp(y),
        (Value::I32(x), Value::I32(y)) => x.cmp(y),
        (Value::I64(x), Value::I64(y)) => x.cmp(y),
        (Value::F32(x), Value::F32(y)) => x.total_cmp(y),
        (Value::F64(x), Value::F64(y)) => x.total_cmp(y),
        _ => {
            return Err(TallyError::TypeError(format!(
                "cannot compare {left} and {right}"
            )));
        }
    };
    Ok(Value::Bool(check(ordering)))
}

/// `+` is string concatenation as soon as either side is a string; the
/// other side converts via its display form. Otherwise numeric addition
/// with widening.
fn plus(left: &Value, right: &Value) -> Result<Value> {
    if left.data_type() == Some(DataType::String) || right.data_type() == Some(DataType::String) {
        let mut out = left.to_str_value()?;
        out.push_str(&right.to_str_value()?);
        return Ok(Value::Str(out));
    }
    numeric_binary_op(OperatorType::Plus, left, right)
}

fn numeric_binary_op(op: OperatorType, left: &Value, right: &Value) -> Result<Value> {
    let wider = NumericType::wider_of_values(left, right)?;
    let a = wider.convert(left)?;
    let b = wider.convert(right)?;
    match (a, b) {
        (Value::I8(x), Value::I8(y)) => checked_int_op(op, x as i64, y as i64)
            .map(|v| Value::I8(v as i8)),
        (Value::I16(x), Value::I16(y)) => checked_int_op(op, x as i64, y as i64)
            .map(|v| Value::I16(v as i16)),
        (Value::I32(x), Value::I32(y)) => checked_int_op(op, x as i64, y as i64)
            .map(|v| Value::I32(v as i32)),
        (Value::I64(x), Value::I64(y)) => checked_int_op(op, x, y).map(Value::I64),
        (Value::F32(x), Value::F32(y)) => Ok(Value::F32(float_op(op, x as f64, y as f64) as f32)),
        (Value::F64(x), Value::F64(y)) => Ok(Value::F64(float_op(op, x, y))),
        (a, b) => Err(TallyError::TypeError(format!(
            "operator {op} cannot combine {a} and {b}"
        ))),
    }
}

/// Integral arithmetic; division truncates and division by zero is a
/// runtime arithmetic fault.
fn checked_int_op(op: OperatorType, a: i64, b: i64) -> Result<i64> {
    let result = match op {
        OperatorType::Plus => a.checked_add(b),
        OperatorType::Minus => a.checked_sub(b),
        OperatorType::Times => a.checked_mul(b),
        OperatorType::Divide => {
            if b == 0 {
                return Err(TallyError::RuntimeError("Division by zero".to_string()));
            }
            a.checked_div(b)
        }
        _ => {
            return Err(TallyError::RuntimeError(format!(
                "{op} is not an arithmetic operator"
            )));
        }
    };
    result.ok_or_else(|| TallyError::RuntimeError("Integer overflow".to_string()))
}

fn float_op(op: OperatorType, a: f64, b: f64) -> f64 {
    match op {
        OperatorType::Plus => a + b,
        OperatorType::Minus => a - b,
        OperatorType::Times => a * b,
        OperatorType::Divide => a / b,
        _ => unreachable!("not an arithmetic operator"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_are_unique() {
        // The catalog must never contain two operators sharing a symbol;
        // exact_match relies on it.
        for (i, a) in OperatorType::ALL.iter().enumerate() {
            for b in &OperatorType::ALL[i + 1..] {
                assert_ne!(a.symbol(), b.symbol());
            }
        }
    }

    #[test]
    fn exact_match_is_case_insensitive() {
        assert_eq!(OperatorType::exact_match("AND"), Some(OperatorType::And));
        assert_eq!(OperatorType::exact_match("<="), Some(OperatorType::Lte));
        assert_eq!(OperatorType::exact_match("<>"), None);
    }

    #[test]
    fn may_be_operator_matches_prefixes() {
        assert!(OperatorType::may_be_operator("a"));
        assert!(OperatorType::may_be_operator("an"));
        assert!(OperatorType::may_be_operator("<"));
        assert!(!OperatorType::may_be_operator("x"));
        assert!(!OperatorType::may_be_operator("ax"));
    }

    #[test]
    fn addition_widens_operands() {
        let result = OperatorType::Plus
            .apply(&[Value::I32(1), Value::F64(2.5)])
            .unwrap();
        assert_eq!(result, Value::F64(3.5));
        let result = OperatorType::Plus
            .apply(&[Value::I8(1), Value::I64(2)])
            .unwrap();
        assert_eq!(result, Value::I64(3));
    }

    #[test]
    fn string_wins_over_numeric_addition() {
        let result = OperatorType::Plus
            .apply(&[Value::Str("n=".to_string()), Value::I32(1)])
            .unwrap();
        assert_eq!(result, Value::Str("n=1".to_string()));
        let result = OperatorType::Plus
            .apply(&[Value::I32(1), Value::Str("a".to_string())])
            .unwrap();
        assert_eq!(result, Value::Str("1a".to_string()));
    }

    #[test]
    fn integral_division_truncates() {
        let result = OperatorType::Divide
            .apply(&[Value::I32(7), Value::I32(2)])
            .unwrap();
        assert_eq!(result, Value::I32(3));
    }

    #[test]
    fn integral_division_by_zero_is_a_runtime_fault() {
        let err = OperatorType::Divide
            .apply(&[Value::I32(1), Value::I32(0)])
            .unwrap_err();
        assert!(matches!(err, TallyError::RuntimeError(_)));
    }

    #[test]
    fn equality_across_data_types_is_false() {
        let result = OperatorType::Eq
            .apply(&[Value::I32(1), Value::Str("1".to_string())])
            .unwrap();
        assert_eq!(result, Value::Bool(false));
        let result = OperatorType::Eq
            .apply(&[Value::I32(1), Value::F64(1.0)])
            .unwrap();
        assert_eq!(result, Value::Bool(true));
    }

    #[test]
    fn boolean_operand_validation() {
        let err = OperatorType::And
            .apply(&[Value::I32(1), Value::Bool(true)])
            .unwrap_err();
        assert!(matches!(err, TallyError::TypeError(_)));
    }

    #[test]
    fn result_types() {
        assert_eq!(
            OperatorType::Plus.result_type(&[Type::I32, Type::F64]).unwrap(),
            Type::F64
        );
        assert_eq!(
            OperatorType::Plus.result_type(&[Type::I32, Type::Str]).unwrap(),
            Type::Str
        );
        assert_eq!(
            OperatorType::Lte.result_type(&[Type::I32, Type::I64]).unwrap(),
            Type::Bool
        );
        assert!(OperatorType::Times.result_type(&[Type::Bool, Type::I32]).is_err());
    }
}
