use crate::completion::Completion;
use crate::error::RuntimeError;
use crate::interpreter::Interpreter;
use crate::primitives::argument;
use crate::value::Value;

enum Operands {
    Integers(i128, i128),
    Doubles(f64, f64),
}

fn operands(receiver: &Value, arg: &Value) -> Result<Operands, RuntimeError> {
    if let (Some(a), Some(b)) = (receiver.as_i128(), arg.as_i128()) {
        return Ok(Operands::Integers(a, b));
    }
    let as_f64 = |v: &Value| match v {
        Value::Double(d) => Ok(*d),
        Value::Integer(i) => Ok(*i as f64),
        Value::BigInteger(i) => Ok(*i as f64),
        other => Err(RuntimeError::NotNumeric { got: other.type_name() }),
    };
    Ok(Operands::Doubles(as_f64(receiver)?, as_f64(arg)?))
}

fn arithmetic(
    receiver: Value,
    args: &[Value],
    int_op: fn(i128, i128) -> Option<i128>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Completion, RuntimeError> {
    let result = match operands(&receiver, argument(args, 0)?)? {
        Operands::Integers(a, b) => match int_op(a, b) {
            Some(v) => Value::from_i128(v),
            None => Value::Double(float_op(a as f64, b as f64)),
        },
        Operands::Doubles(a, b) => Value::Double(float_op(a, b)),
    };
    Ok(Completion::Normal(result))
}

fn comparison(
    receiver: Value,
    args: &[Value],
    int_op: fn(&i128, &i128) -> bool,
    float_op: fn(&f64, &f64) -> bool,
) -> Result<Completion, RuntimeError> {
    let result = match operands(&receiver, argument(args, 0)?)? {
        Operands::Integers(a, b) => int_op(&a, &b),
        Operands::Doubles(a, b) => float_op(&a, &b),
    };
    Ok(Completion::Normal(Value::from_bool(result)))
}

pub fn number_add(
    _interp: &mut Interpreter,
    receiver: Value,
    args: &[Value],
) -> Result<Completion, RuntimeError> {
    arithmetic(receiver, args, i128::checked_add, |a, b| a + b)
}

pub fn number_sub(
    _interp: &mut Interpreter,
    receiver: Value,
    args: &[Value],
) -> Result<Completion, RuntimeError> {
    arithmetic(receiver, args, i128::checked_sub, |a, b| a - b)
}

pub fn number_mul(
    _interp: &mut Interpreter,
    receiver: Value,
    args: &[Value],
) -> Result<Completion, RuntimeError> {
    arithmetic(receiver, args, i128::checked_mul, |a, b| a * b)
}

pub fn number_lt(
    _interp: &mut Interpreter,
    receiver: Value,
    args: &[Value],
) -> Result<Completion, RuntimeError> {
    comparison(receiver, args, i128::lt, f64::lt)
}

pub fn number_gt(
    _interp: &mut Interpreter,
    receiver: Value,
    args: &[Value],
) -> Result<Completion, RuntimeError> {
    comparison(receiver, args, i128::gt, f64::gt)
}

pub fn number_eq(
    _interp: &mut Interpreter,
    receiver: Value,
    args: &[Value],
) -> Result<Completion, RuntimeError> {
    match operands(&receiver, argument(args, 0)?) {
        Ok(Operands::Integers(a, b)) => Ok(Completion::Normal(Value::from_bool(a == b))),
        Ok(Operands::Doubles(a, b)) => Ok(Completion::Normal(Value::from_bool(a == b))),
        Err(_) => Ok(Completion::Normal(Value::False)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(a: Value, b: Value) -> Value {
        match arithmetic(a, &[b], i128::checked_add, |a, b| a + b).unwrap() {
            Completion::Normal(v) => v,
            Completion::Unwind(_) => panic!("arithmetic never unwinds"),
        }
    }

    #[test]
    fn integers_stay_exact() {
        assert_eq!(add(Value::Integer(5), Value::Integer(7)), Value::Integer(12));
        assert!(matches!(
            add(Value::Integer(i64::MAX), Value::Integer(1)),
            Value::BigInteger(v) if v == i64::MAX as i128 + 1
        ));
        assert_eq!(add(Value::Integer(1), Value::Double(0.5)), Value::Double(1.5));
    }

    #[test]
    fn non_numbers_are_rejected() {
        let err = arithmetic(Value::Integer(1), &[Value::Nil], i128::checked_add, |a, b| a + b)
            .unwrap_err();
        assert!(matches!(err, RuntimeError::NotNumeric { got: "nil" }));
        let err = arithmetic(Value::Integer(1), &[], i128::checked_add, |a, b| a + b).unwrap_err();
        assert!(matches!(err, RuntimeError::ArgumentCountMismatch { .. }));
    }
}
