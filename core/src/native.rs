use std::sync::Arc;

use crate::error::{Result, TallyError};
use crate::types::{NumericType, Type};
use crate::value::Value;

// Type for native method implementations
pub type NativeFn = Arc<dyn Fn(Vec<Value>) -> Result<Value> + Send + Sync>;

/// One overload of a host method. For a varargs method the last entry of
/// `params` is the element type of the variable tail.
#[derive(Clone)]
pub struct NativeMethod {
    pub name: String,
    pub params: Vec<Type>,
    pub return_type: Type,
    pub varargs: bool,
    /// Pure methods may be invoked at simplification time when all
    /// arguments are constant.
    pub pure_fn: bool,
    func: NativeFn,
}

impl std::fmt::Debug for NativeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeMethod")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("return_type", &self.return_type)
            .field("varargs", &self.varargs)
            .field("pure_fn", &self.pure_fn)
            .finish_non_exhaustive()
    }
}

impl NativeMethod {
    pub fn new<F>(name: &str, params: Vec<Type>, return_type: Type, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Value> + 'static + Send + Sync,
    {
        Self {
            name: name.to_string(),
            params,
            return_type,
            varargs: false,
            pure_fn: false,
            func: Arc::new(f),
        }
    }

    pub fn pure_fn(mut self) -> Self {
        self.pure_fn = true;
        self
    }

    pub fn varargs(mut self) -> Self {
        self.varargs = true;
        self
    }

    fn signature(&self) -> String {
        let params: Vec<String> = self.params.iter().map(|t| t.to_string()).collect();
        format!("{}({})", self.name, params.join(", "))
    }
}

const DISTANCE_EXACT: u32 = 0;
const DISTANCE_ANY: u32 = 10;
const DISTANCE_VARARGS: u32 = 100_000;

/// Registry of host method overloads. Resolution matches the name
/// case-sensitively, checks pairwise assignability and picks the candidate
/// with the smallest conversion distance; varargs candidates only win when
/// nothing else applies.
#[derive(Debug, Default, Clone)]
pub struct NativeRegistry {
    methods: Vec<NativeMethod>,
}

impl NativeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, method: NativeMethod) {
        tracing::debug!(signature = %method.signature(), "registering method");
        self.methods.push(method);
    }

    pub fn get(&self, index: usize) -> Option<&NativeMethod> {
        self.methods.get(index)
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Resolve an overload for the given argument types, returning its
    /// registry index.
    pub fn find_method(&self, name: &str, arg_types: &[Type]) -> Result<usize> {
        let mut best: Option<(usize, u32)> = None;
        let mut name_seen = false;

        for (index, method) in self.methods.iter().enumerate() {
            if method.name != name {
                continue;
            }
            name_seen = true;
            let Some(distance) = Self::distance(method, arg_types) else {
                continue;
            };
            match best {
                Some((_, d)) if d <= distance => {}
                _ => best = Some((index, distance)),
            }
        }

        match best {
            Some((index, distance)) => {
                tracing::trace!(name, index, distance, "resolved method");
                Ok(index)
            }
            None => {
                let types: Vec<String> = arg_types.iter().map(|t| t.to_string()).collect();
                let detail = if name_seen {
                    format!("no overload of '{}' accepts ({})", name, types.join(", "))
                } else {
                    format!("unknown method '{}'", name)
                };
                Err(TallyError::NoMatchingMethod(detail))
            }
        }
    }

    /// Conversion cost of calling `method` with `arg_types`, or `None` when
    /// the call does not apply.
    fn distance(method: &NativeMethod, arg_types: &[Type]) -> Option<u32> {
        if method.varargs {
            let fixed = method.params.len().saturating_sub(1);
            if arg_types.len() < fixed {
                return None;
            }
            let element = *method.params.last()?;
            for (param, arg) in method.params[..fixed].iter().zip(arg_types) {
                Self::param_distance(*param, *arg)?;
            }
            for arg in &arg_types[fixed..] {
                Self::param_distance(element, *arg)?;
            }
            return Some(DISTANCE_VARARGS);
        }

        if method.params.len() != arg_types.len() {
            return None;
        }
        let mut total = 0;
        for (param, arg) in method.params.iter().zip(arg_types) {
            total += Self::param_distance(*param, *arg)?;
        }
        Some(total)
    }

    fn param_distance(param: Type, arg: Type) -> Option<u32> {
        if !param.is_assignable_from(&arg) {
            return None;
        }
        if param == arg {
            return Some(DISTANCE_EXACT);
        }
        if param == Type::Any {
            return Some(DISTANCE_ANY);
        }
        match (NumericType::from_type(param), NumericType::from_type(arg)) {
            (Some(p), Some(a)) => Some((p.rank() - a.rank()) as u32),
            _ => None,
        }
    }

    /// Invoke an overload by index. Numeric arguments are widened to the
    /// declared parameter types first, the way the typer assumed they
    /// would be.
    pub fn invoke(&self, index: usize, args: Vec<Value>) -> Result<Value> {
        let method = self.methods.get(index).ok_or_else(|| {
            TallyError::RuntimeError(format!("no method registered at index {}", index))
        })?;

        let mut converted = Vec::with_capacity(args.len());
        for (i, arg) in args.into_iter().enumerate() {
            let param = if method.varargs && i >= method.params.len().saturating_sub(1) {
                method.params.last().copied()
            } else {
                method.params.get(i).copied()
            };
            let value = match param.and_then(NumericType::from_type) {
                Some(numeric) if arg.ty() != param.expect("param present") => {
                    numeric.convert(&arg)?
                }
                _ => arg,
            };
            converted.push(value);
        }

        tracing::trace!(name = %method.name, index, "invoking method");
        (method.func)(converted)
    }
}
