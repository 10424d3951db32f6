//!
//! Script Value Representation
//!
//! Values crossing the host boundary are modelled as a small dynamic enum.
//! The host engine converts its own values into `ScriptValue` before calling
//! a native operation and converts results back afterwards.
//!
//! Functions are carried as `ScriptFunction`, a thread-safe shared handle that
//! stays valid until the last clone is dropped. This is what lets a worker
//! thread hold on to a callback and have it invoked later on the origin thread.
//!

use std::fmt;
use std::sync::Arc;

use crate::exception::ScriptError;

type NativeFn = dyn Fn(&[ScriptValue]) -> Result<ScriptValue, ScriptError> + Send + Sync;

#[derive(Clone)]
pub struct ScriptFunction {
    inner: Arc<NativeFn>,
}

impl ScriptFunction {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[ScriptValue]) -> Result<ScriptValue, ScriptError> + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    pub fn call(&self, args: &[ScriptValue]) -> Result<ScriptValue, ScriptError> {
        (self.inner)(args)
    }

    pub fn ptr_eq(&self, other: &ScriptFunction) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ScriptFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScriptFunction({:p})", Arc::as_ptr(&self.inner))
    }
}

#[derive(Debug, Clone, Default)]
pub enum ScriptValue {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<ScriptValue>),
    Function(ScriptFunction),
}

impl PartialEq for ScriptValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ScriptValue::Undefined, ScriptValue::Undefined) => true,
            (ScriptValue::Null, ScriptValue::Null) => true,
            (ScriptValue::Bool(a), ScriptValue::Bool(b)) => a == b,
            (ScriptValue::Number(a), ScriptValue::Number(b)) => a == b,
            (ScriptValue::String(a), ScriptValue::String(b)) => a == b,
            (ScriptValue::Array(a), ScriptValue::Array(b)) => a == b,
            (ScriptValue::Function(a), ScriptValue::Function(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl ScriptValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            ScriptValue::Undefined => "undefined",
            ScriptValue::Null => "null",
            ScriptValue::Bool(_) => "boolean",
            ScriptValue::Number(_) => "number",
            ScriptValue::String(_) => "string",
            ScriptValue::Array(_) => "array",
            ScriptValue::Function(_) => "function",
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, ScriptValue::Undefined | ScriptValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScriptValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[ScriptValue]> {
        match self {
            ScriptValue::Array(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for ScriptValue {
    fn from(s: &str) -> Self {
        ScriptValue::String(s.to_string())
    }
}

impl From<String> for ScriptValue {
    fn from(s: String) -> Self {
        ScriptValue::String(s)
    }
}

impl From<i32> for ScriptValue {
    fn from(n: i32) -> Self {
        ScriptValue::Number(n as f64)
    }
}

impl From<usize> for ScriptValue {
    fn from(n: usize) -> Self {
        ScriptValue::Number(n as f64)
    }
}

impl From<bool> for ScriptValue {
    fn from(b: bool) -> Self {
        ScriptValue::Bool(b)
    }
}

impl From<ScriptFunction> for ScriptValue {
    fn from(f: ScriptFunction) -> Self {
        ScriptValue::Function(f)
    }
}

/// Read argument `index` as a nullable string.
///
/// Missing, `undefined` and `null` all map to `None`. Any other non-string
/// value is a type error naming the 1-based parameter position.
pub fn arg_string(args: &[ScriptValue], index: usize) -> Result<Option<String>, ScriptError> {
    match args.get(index) {
        None | Some(ScriptValue::Undefined) | Some(ScriptValue::Null) => Ok(None),
        Some(ScriptValue::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ScriptError::Type(format!(
            "parameter {}: must be string or null or undefined",
            index + 1
        ))),
    }
}

/// Read argument `index` as a 32-bit integer, defaulting to 0 when absent.
pub fn arg_int(args: &[ScriptValue], index: usize) -> Result<i32, ScriptError> {
    match args.get(index) {
        None | Some(ScriptValue::Undefined) | Some(ScriptValue::Null) => Ok(0),
        Some(ScriptValue::Number(n))
            if n.fract() == 0.0 && *n >= i32::MIN as f64 && *n <= i32::MAX as f64 =>
        {
            Ok(*n as i32)
        }
        Some(other) => Err(ScriptError::Type(format!(
            "parameter {}: must be integer, got {}",
            index + 1,
            other.type_name()
        ))),
    }
}

/// Read argument `index` as a callback. Non-functions count as "no callback".
pub fn arg_function(args: &[ScriptValue], index: usize) -> Option<ScriptFunction> {
    match args.get(index) {
        Some(ScriptValue::Function(f)) => Some(f.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arg_string_accepts_nullish() {
        let args = vec![ScriptValue::Undefined, ScriptValue::Null, "db".into()];
        assert_eq!(arg_string(&args, 0).unwrap(), None);
        assert_eq!(arg_string(&args, 1).unwrap(), None);
        assert_eq!(arg_string(&args, 2).unwrap(), Some("db".to_string()));
        assert_eq!(arg_string(&args, 7).unwrap(), None);
    }

    #[test]
    fn test_arg_string_rejects_numbers() {
        let args = vec!["h".into(), ScriptValue::Number(3.0)];
        let err = arg_string(&args, 1).unwrap_err();
        assert!(matches!(err, ScriptError::Type(_)));
        assert!(err.to_string().contains("parameter 2"));
    }

    #[test]
    fn test_arg_int() {
        let args = vec![ScriptValue::Number(3306.0), ScriptValue::Number(1.5), "x".into()];
        assert_eq!(arg_int(&args, 0).unwrap(), 3306);
        assert!(arg_int(&args, 1).is_err());
        assert!(arg_int(&args, 2).is_err());
        assert_eq!(arg_int(&args, 3).unwrap(), 0);
    }

    #[test]
    fn test_arg_function_ignores_non_functions() {
        let f = ScriptFunction::new(|_| Ok(ScriptValue::Undefined));
        let args = vec![ScriptValue::Bool(true), ScriptValue::Function(f.clone())];
        assert!(arg_function(&args, 0).is_none());
        assert!(arg_function(&args, 1).unwrap().ptr_eq(&f));
    }
}
