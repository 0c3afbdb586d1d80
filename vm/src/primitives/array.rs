use crate::completion::Completion;
use crate::error::RuntimeError;
use crate::interpreter::Interpreter;
use crate::primitives::{argument, expect_array, expect_integer};
use crate::value::Value;

/// Converts a one-based index to a checked zero-based one.
fn element_index(index: i64, len: usize) -> Result<usize, RuntimeError> {
    if index < 1 || index as u64 > len as u64 {
        return Err(RuntimeError::IndexOutOfBounds { index, len });
    }
    Ok(index as usize - 1)
}

pub fn array_size(
    _interp: &mut Interpreter,
    receiver: Value,
    _args: &[Value],
) -> Result<Completion, RuntimeError> {
    let array = expect_array(&receiver)?;
    Ok(Completion::Normal(Value::Integer(array.len() as i64)))
}

pub fn array_at(
    _interp: &mut Interpreter,
    receiver: Value,
    args: &[Value],
) -> Result<Completion, RuntimeError> {
    let array = expect_array(&receiver)?;
    let index = element_index(expect_integer(argument(args, 0)?)?, array.len())?;
    let value = array
        .get(index)
        .ok_or(RuntimeError::IndexOutOfBounds { index: index as i64 + 1, len: array.len() })?;
    Ok(Completion::Normal(value))
}

pub fn array_at_put(
    _interp: &mut Interpreter,
    receiver: Value,
    args: &[Value],
) -> Result<Completion, RuntimeError> {
    let array = expect_array(&receiver)?;
    let index = element_index(expect_integer(argument(args, 0)?)?, array.len())?;
    let value = argument(args, 1)?.clone();
    if !array.set(index, value.clone()) {
        return Err(RuntimeError::IndexOutOfBounds { index: index as i64 + 1, len: array.len() });
    }
    Ok(Completion::Normal(value))
}
