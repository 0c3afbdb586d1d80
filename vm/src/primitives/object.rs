use crate::completion::Completion;
use crate::error::RuntimeError;
use crate::interpreter::Interpreter;
use crate::primitives::argument;
use crate::value::Value;

pub fn object_identical(
    _interp: &mut Interpreter,
    receiver: Value,
    args: &[Value],
) -> Result<Completion, RuntimeError> {
    let other = argument(args, 0)?;
    Ok(Completion::Normal(Value::from_bool(receiver.is_identical(other))))
}

pub fn object_class(
    interp: &mut Interpreter,
    receiver: Value,
    _args: &[Value],
) -> Result<Completion, RuntimeError> {
    Ok(Completion::Normal(Value::Class(interp.universe().class_of(&receiver))))
}

/// Default `doesNotUnderstand:arguments:`. Classes override it to intercept
/// failed sends.
pub fn object_does_not_understand(
    _interp: &mut Interpreter,
    receiver: Value,
    args: &[Value],
) -> Result<Completion, RuntimeError> {
    let selector = argument(args, 0)?;
    match selector {
        Value::Symbol(selector) => Err(RuntimeError::MessageNotUnderstood {
            receiver: format!("{receiver:?}"),
            selector: selector.clone(),
        }),
        other => Err(RuntimeError::TypeError { expected: "symbol", got: other.type_name() }),
    }
}

pub fn object_escaped_block(
    _interp: &mut Interpreter,
    receiver: Value,
    _args: &[Value],
) -> Result<Completion, RuntimeError> {
    Err(RuntimeError::EscapedBlock { receiver: format!("{receiver:?}") })
}

pub fn object_unknown_global(
    _interp: &mut Interpreter,
    _receiver: Value,
    args: &[Value],
) -> Result<Completion, RuntimeError> {
    match argument(args, 0)? {
        Value::Symbol(name) => Err(RuntimeError::UnknownGlobal { name: name.clone() }),
        other => Err(RuntimeError::TypeError { expected: "symbol", got: other.type_name() }),
    }
}
