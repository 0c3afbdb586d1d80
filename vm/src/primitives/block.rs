use crate::completion::Completion;
use crate::error::RuntimeError;
use crate::interpreter::Interpreter;
use crate::value::Value;

/// `value`, `value:` and `value:with:`.
pub fn block_value(
    interp: &mut Interpreter,
    receiver: Value,
    args: &[Value],
) -> Result<Completion, RuntimeError> {
    match &receiver {
        Value::Block(block) => interp.activate_block(block, args),
        other => Err(RuntimeError::TypeError { expected: "block", got: other.type_name() }),
    }
}
