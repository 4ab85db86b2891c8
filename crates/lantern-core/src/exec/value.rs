//! Runtime values.

use core::fmt;

use crate::exec::trap::Trap;

/// A value on the operand stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    I32(i32),
    I64(i64),
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::I32(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::I64(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::I32(if value { 1 } else { 0 })
    }
}

impl TryFrom<Value> for i32 {
    type Error = Trap;

    fn try_from(value: Value) -> Result<Self, Trap> {
        match value {
            Value::I32(v) => Ok(v),
            Value::I64(_) => Err(Trap::TypeMismatch { expected: "i32" }),
        }
    }
}

impl TryFrom<Value> for i64 {
    type Error = Trap;

    fn try_from(value: Value) -> Result<Self, Trap> {
        match value {
            Value::I64(v) => Ok(v),
            Value::I32(_) => Err(Trap::TypeMismatch { expected: "i64" }),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::I32(v) => write!(f, "{v}"),
            Value::I64(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions() {
        assert_eq!(Value::from(5i32), Value::I32(5));
        assert_eq!(Value::from(true), Value::I32(1));
        assert_eq!(Value::from(false), Value::I32(0));
        assert_eq!(i32::try_from(Value::I32(-3)), Ok(-3));
        assert_eq!(
            i32::try_from(Value::I64(0)),
            Err(Trap::TypeMismatch { expected: "i32" })
        );
    }
}
