use std::sync::Arc;

use crate::error::RuntimeError;
use crate::invokable::PrimitiveFn;
use crate::value::{Array, Value};

pub mod array;
pub mod block;
pub mod number;
pub mod object;

/// A native method body and the class/selector it is installed under.
#[derive(Clone, Copy)]
pub struct PrimitiveDesc {
    pub class: &'static str,
    pub selector: &'static str,
    pub func: PrimitiveFn,
}

impl PrimitiveDesc {
    pub const fn new(class: &'static str, selector: &'static str, func: PrimitiveFn) -> Self {
        Self { class, selector, func }
    }
}

pub fn default_primitives() -> Vec<PrimitiveDesc> {
    vec![
        PrimitiveDesc::new("Integer", "+", number::number_add),
        PrimitiveDesc::new("Integer", "-", number::number_sub),
        PrimitiveDesc::new("Integer", "*", number::number_mul),
        PrimitiveDesc::new("Integer", "<", number::number_lt),
        PrimitiveDesc::new("Integer", ">", number::number_gt),
        PrimitiveDesc::new("Integer", "=", number::number_eq),
        PrimitiveDesc::new("Double", "+", number::number_add),
        PrimitiveDesc::new("Double", "-", number::number_sub),
        PrimitiveDesc::new("Double", "*", number::number_mul),
        PrimitiveDesc::new("Double", "<", number::number_lt),
        PrimitiveDesc::new("Double", ">", number::number_gt),
        PrimitiveDesc::new("Block", "value", block::block_value),
        PrimitiveDesc::new("Block", "value:", block::block_value),
        PrimitiveDesc::new("Block", "value:with:", block::block_value),
        PrimitiveDesc::new("Array", "at:", array::array_at),
        PrimitiveDesc::new("Array", "at:put:", array::array_at_put),
        PrimitiveDesc::new("Array", "size", array::array_size),
        PrimitiveDesc::new("Object", "==", object::object_identical),
        PrimitiveDesc::new("Object", "class", object::object_class),
        PrimitiveDesc::new(
            "Object",
            "doesNotUnderstand:arguments:",
            object::object_does_not_understand,
        ),
        PrimitiveDesc::new("Object", "escapedBlock:", object::object_escaped_block),
        PrimitiveDesc::new("Object", "unknownGlobal:", object::object_unknown_global),
    ]
}

pub(crate) fn argument(args: &[Value], index: usize) -> Result<&Value, RuntimeError> {
    args.get(index)
        .ok_or(RuntimeError::ArgumentCountMismatch { expected: index + 1, got: args.len() })
}

pub(crate) fn expect_array(value: &Value) -> Result<&Arc<Array>, RuntimeError> {
    value.as_array().ok_or(RuntimeError::TypeError { expected: "array", got: value.type_name() })
}

pub(crate) fn expect_integer(value: &Value) -> Result<i64, RuntimeError> {
    value.as_integer().ok_or(RuntimeError::TypeError { expected: "integer", got: value.type_name() })
}
