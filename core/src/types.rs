use std::fmt;

use crate::error::{Result, TallyError};
use crate::value::Value;

/// Coarse value category. Every runtime value belongs to exactly one of
/// these; operators declare which categories they accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Number,
    String,
    Boolean,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Number => write!(f, "number"),
            DataType::String => write!(f, "string"),
            DataType::Boolean => write!(f, "boolean"),
        }
    }
}

/// Concrete static type tag assigned to AST nodes and used in host method
/// signatures. `Unit` marks a void return, `Any` a parameter that accepts
/// every value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Str,
    Bool,
    Unit,
    Any,
}

impl Type {
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Type::I8 | Type::I16 | Type::I32 | Type::I64 | Type::F32 | Type::F64 => {
                Some(DataType::Number)
            }
            Type::Str => Some(DataType::String),
            Type::Bool => Some(DataType::Boolean),
            Type::Unit | Type::Any => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        NumericType::from_type(*self).is_some()
    }

    /// Whether a parameter of this type accepts an argument of type `rhs`.
    /// Numeric parameters accept anything they can widen from; `Any`
    /// accepts every value type.
    pub fn is_assignable_from(&self, rhs: &Type) -> bool {
        if *rhs == Type::Unit {
            return false;
        }
        if *self == Type::Any || self == rhs {
            return true;
        }
        match (NumericType::from_type(*self), NumericType::from_type(*rhs)) {
            (Some(lhs), Some(rhs)) => lhs.is_assignable_from(rhs),
            _ => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::I8 => write!(f, "i8"),
            Type::I16 => write!(f, "i16"),
            Type::I32 => write!(f, "i32"),
            Type::I64 => write!(f, "i64"),
            Type::F32 => write!(f, "f32"),
            Type::F64 => write!(f, "f64"),
            Type::Str => write!(f, "str"),
            Type::Bool => write!(f, "bool"),
            Type::Unit => write!(f, "()"),
            Type::Any => write!(f, "any"),
        }
    }
}

/// Refined numeric category, ordered by (is-floating-point, byte width).
/// Binary numeric operators compute on the wider of their operand types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericType {
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl NumericType {
    pub fn is_floating_point(&self) -> bool {
        matches!(self, NumericType::F32 | NumericType::F64)
    }

    pub fn width(&self) -> u8 {
        match self {
            NumericType::I8 => 1,
            NumericType::I16 => 2,
            NumericType::I32 | NumericType::F32 => 4,
            NumericType::I64 | NumericType::F64 => 8,
        }
    }

    /// Position in the widening order; used as a measure of conversion
    /// distance during overload resolution.
    pub fn rank(&self) -> u8 {
        match self {
            NumericType::I8 => 0,
            NumericType::I16 => 1,
            NumericType::I32 => 2,
            NumericType::I64 => 3,
            NumericType::F32 => 4,
            NumericType::F64 => 5,
        }
    }

    pub fn from_type(ty: Type) -> Option<NumericType> {
        match ty {
            Type::I8 => Some(NumericType::I8),
            Type::I16 => Some(NumericType::I16),
            Type::I32 => Some(NumericType::I32),
            Type::I64 => Some(NumericType::I64),
            Type::F32 => Some(NumericType::F32),
            Type::F64 => Some(NumericType::F64),
            _ => None,
        }
    }

    pub fn to_type(&self) -> Type {
        match self {
            NumericType::I8 => Type::I8,
            NumericType::I16 => Type::I16,
            NumericType::I32 => Type::I32,
            NumericType::I64 => Type::I64,
            NumericType::F32 => Type::F32,
            NumericType::F64 => Type::F64,
        }
    }

    pub fn of_value(value: &Value) -> Option<NumericType> {
        NumericType::from_type(value.ty())
    }

    /// Floating point wins over integral regardless of width; among the
    /// same category the larger width wins.
    pub fn wider(a: NumericType, b: NumericType) -> NumericType {
        if a.is_floating_point() == b.is_floating_point() {
            if a.width() > b.width() { a } else { b }
        } else if a.is_floating_point() {
            a
        } else {
            b
        }
    }

    /// An integral type never accepts a floating point value; otherwise the
    /// wider (or equally wide) type accepts the narrower one.
    pub fn is_assignable_from(&self, rhs: NumericType) -> bool {
        if self.is_floating_point() {
            self.width() >= rhs.width()
        } else if rhs.is_floating_point() {
            false
        } else {
            self.width() >= rhs.width()
        }
    }

    /// Convert a numeric value into this type. Must only be called on
    /// numeric values.
    pub fn convert(&self, value: &Value) -> Result<Value> {
        let wrong = || TallyError::TypeError(format!("cannot convert {value} to {self:?}"));
        Ok(match self {
            NumericType::I8 => Value::I8(value.as_i64().ok_or_else(wrong)? as i8),
            NumericType::I16 => Value::I16(value.as_i64().ok_or_else(wrong)? as i16),
            NumericType::I32 => Value::I32(value.as_i64().ok_or_else(wrong)? as i32),
            NumericType::I64 => Value::I64(value.as_i64().ok_or_else(wrong)?),
            NumericType::F32 => Value::F32(value.as_f64().ok_or_else(wrong)? as f32),
            NumericType::F64 => Value::F64(value.as_f64().ok_or_else(wrong)?),
        })
    }

    pub fn wider_of_values(a: &Value, b: &Value) -> Result<NumericType> {
        let ta = NumericType::of_value(a)
            .ok_or_else(|| TallyError::TypeError(format!("{a} is not numeric")))?;
        let tb = NumericType::of_value(b)
            .ok_or_else(|| TallyError::TypeError(format!("{b} is not numeric")))?;
        Ok(NumericType::wider(ta, tb))
    }
}
