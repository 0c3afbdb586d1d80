use std::fmt;
use std::sync::Arc;

use crate::completion::{Completion, propagate};
use crate::error::RuntimeError;
use crate::interpreter::Interpreter;
use crate::method::Method;
use crate::signature::Signature;
use crate::value::Value;

/// Native method body. Receives the receiver and the arguments in call order.
pub type PrimitiveFn = fn(&mut Interpreter, Value, &[Value]) -> Result<Completion, RuntimeError>;

pub struct Primitive {
    signature: Signature,
    func: Option<PrimitiveFn>,
}

impl Primitive {
    pub fn new(signature: Signature, func: PrimitiveFn) -> Self {
        Self { signature, func: Some(func) }
    }

    /// A declared primitive with no native body bound yet.
    pub fn empty(signature: Signature) -> Self {
        Self { signature, func: None }
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn is_empty(&self) -> bool {
        self.func.is_none()
    }

    pub fn invoke(
        &self,
        interp: &mut Interpreter,
        receiver: Value,
        args: &[Value],
    ) -> Result<Completion, RuntimeError> {
        match self.func {
            Some(func) => func(interp, receiver, args),
            None => Err(RuntimeError::PrimitiveMissing { selector: self.signature.clone() }),
        }
    }
}

/// Something a send can dispatch to.
#[derive(Clone)]
pub enum Invokable {
    Method(Arc<Method>),
    Primitive(Arc<Primitive>),
}

impl Invokable {
    pub fn signature(&self) -> &Signature {
        match self {
            Invokable::Method(m) => m.signature(),
            Invokable::Primitive(p) => p.signature(),
        }
    }

    pub fn is_same(&self, other: &Invokable) -> bool {
        match (self, other) {
            (Invokable::Method(a), Invokable::Method(b)) => Arc::ptr_eq(a, b),
            (Invokable::Primitive(a), Invokable::Primitive(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub(crate) fn invoke(
        &self,
        interp: &mut Interpreter,
        receiver: Value,
        args: &[Value],
    ) -> Result<Completion, RuntimeError> {
        match self {
            Invokable::Method(method) => interp.activate(method, receiver, args, None),
            Invokable::Primitive(primitive) => primitive.invoke(interp, receiver, args),
        }
    }

    pub fn invoke_1(
        &self,
        interp: &mut Interpreter,
        receiver: Value,
    ) -> Result<Completion, RuntimeError> {
        self.invoke(interp, receiver, &[])
    }

    pub fn invoke_2(
        &self,
        interp: &mut Interpreter,
        receiver: Value,
        arg: Value,
    ) -> Result<Completion, RuntimeError> {
        self.invoke(interp, receiver, &[arg])
    }

    pub fn invoke_3(
        &self,
        interp: &mut Interpreter,
        receiver: Value,
        arg1: Value,
        arg2: Value,
    ) -> Result<Completion, RuntimeError> {
        self.invoke(interp, receiver, &[arg1, arg2])
    }

    /// N-ary send straight off an operand stack.
    ///
    /// `sp` indexes the topmost argument. The receiver and arguments are
    /// replaced by the result and the new stack pointer is returned.
    pub fn invoke_n(
        &self,
        interp: &mut Interpreter,
        stack: &mut [Value],
        sp: usize,
    ) -> Result<Completion<usize>, RuntimeError> {
        let arity = self.signature().arity() as usize;
        let base = sp + 1 - arity;
        let receiver = std::mem::take(&mut stack[base]);
        let args: Vec<Value> = stack[base + 1..=sp].iter_mut().map(std::mem::take).collect();
        let result = propagate!(self.invoke(interp, receiver, &args)?);
        stack[base] = result;
        Ok(Completion::Normal(base))
    }
}

impl fmt::Debug for Invokable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Invokable::Method(m) => write!(f, "Method({})", m.signature()),
            Invokable::Primitive(p) => write!(f, "Primitive({})", p.signature()),
        }
    }
}
