use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::context::Block;
use crate::error::RuntimeError;
use crate::object::{Class, Instance};
use crate::signature::Signature;

/// A tagged VM value.
///
/// Immediates are stored inline; everything with identity is behind an
/// `Arc`, so cloning a value never copies object state.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    True,
    False,
    Integer(i64),
    BigInteger(i128),
    Double(f64),
    Symbol(Signature),
    String(Arc<str>),
    Array(Arc<Array>),
    Block(Arc<Block>),
    Object(Arc<Instance>),
    Class(Arc<Class>),
}

impl Value {
    pub fn from_bool(b: bool) -> Self {
        if b { Value::True } else { Value::False }
    }

    /// Normalizes to the small representation when the value fits.
    pub fn from_i128(v: i128) -> Self {
        match i64::try_from(v) {
            Ok(small) => Value::Integer(small),
            Err(_) => Value::BigInteger(v),
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn is_true(&self) -> bool {
        matches!(self, Value::True)
    }

    pub fn is_false(&self) -> bool {
        matches!(self, Value::False)
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Value::Integer(i) => Some(*i as i128),
            Value::BigInteger(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&Signature> {
        match self {
            Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Arc<Array>> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_instance(&self) -> Option<&Arc<Instance>> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// `==` in the object model: immediates by value, references by pointer.
    pub fn is_identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) | (Value::True, Value::True) | (Value::False, Value::False) => {
                true
            }
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::BigInteger(a), Value::BigInteger(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::String(a), Value::String(b)) => Arc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(a, b),
            (Value::Block(a), Value::Block(b)) => Arc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn increment(&self) -> Result<Value, RuntimeError> {
        match self {
            Value::Integer(i) => Ok(i.increment()),
            Value::BigInteger(i) => Ok(i.increment()),
            Value::Double(d) => Ok(d.increment()),
            other => Err(RuntimeError::NotNumeric { got: other.type_name() }),
        }
    }

    pub fn decrement(&self) -> Result<Value, RuntimeError> {
        match self {
            Value::Integer(i) => Ok(i.decrement()),
            Value::BigInteger(i) => Ok(i.decrement()),
            Value::Double(d) => Ok(d.decrement()),
            other => Err(RuntimeError::NotNumeric { got: other.type_name() }),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::True | Value::False => "boolean",
            Value::Integer(_) | Value::BigInteger(_) => "integer",
            Value::Double(_) => "double",
            Value::Symbol(_) => "symbol",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Block(_) => "block",
            Value::Object(_) => "object",
            Value::Class(_) => "class",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.is_identical(other)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::from_bool(v)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::True => write!(f, "true"),
            Value::False => write!(f, "false"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::BigInteger(i) => write!(f, "{i}"),
            Value::Double(d) => write!(f, "{d:?}"),
            Value::Symbol(s) => write!(f, "{s:?}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Array(a) => write!(f, "an Array({})", a.len()),
            Value::Block(b) => write!(f, "a Block({})", b.method().signature()),
            Value::Object(o) => write!(f, "a {}", o.class().name()),
            Value::Class(c) => write!(f, "{}", c.name()),
        }
    }
}

/// Arithmetic shared by the numeric representations.
pub trait Numeric: Copy {
    fn increment(self) -> Value;
    fn decrement(self) -> Value;
}

impl Numeric for i64 {
    fn increment(self) -> Value {
        match self.checked_add(1) {
            Some(v) => Value::Integer(v),
            None => Value::BigInteger(self as i128 + 1),
        }
    }

    fn decrement(self) -> Value {
        match self.checked_sub(1) {
            Some(v) => Value::Integer(v),
            None => Value::BigInteger(self as i128 - 1),
        }
    }
}

impl Numeric for i128 {
    fn increment(self) -> Value {
        match self.checked_add(1) {
            Some(v) => Value::from_i128(v),
            None => Value::Double(self as f64 + 1.0),
        }
    }

    fn decrement(self) -> Value {
        match self.checked_sub(1) {
            Some(v) => Value::from_i128(v),
            None => Value::Double(self as f64 - 1.0),
        }
    }
}

impl Numeric for f64 {
    fn increment(self) -> Value {
        Value::Double(self + 1.0)
    }

    fn decrement(self) -> Value {
        Value::Double(self - 1.0)
    }
}

/// Fixed-size, indexable storage.
pub struct Array {
    elements: RwLock<Box<[Value]>>,
}

impl Array {
    pub fn new(size: usize) -> Self {
        Self { elements: RwLock::new(vec![Value::Nil; size].into_boxed_slice()) }
    }

    pub fn from_values(values: Vec<Value>) -> Self {
        Self { elements: RwLock::new(values.into_boxed_slice()) }
    }

    pub fn len(&self) -> usize {
        self.elements.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Zero-based read.
    pub fn get(&self, index: usize) -> Option<Value> {
        self.elements.read().get(index).cloned()
    }

    /// Zero-based write. Returns `false` when out of bounds.
    pub fn set(&self, index: usize, value: Value) -> bool {
        match self.elements.write().get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.elements.read().to_vec()
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.elements.read().iter()).finish()
    }
}
