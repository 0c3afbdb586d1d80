use crate::activation::ActivationToken;
use crate::value::Value;

/// Outcome of running an activation.
///
/// `Unwind` carries a non-local return towards the activation named by its
/// token. Frames between the returning block and the target pass it through
/// untouched with [`propagate!`].
#[derive(Debug, Clone)]
pub enum Completion<T = Value> {
    Normal(T),
    Unwind(Unwind),
}

#[derive(Debug, Clone)]
pub struct Unwind {
    pub target: ActivationToken,
    pub value: Value,
}

impl<T> Completion<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Completion<U> {
        match self {
            Completion::Normal(v) => Completion::Normal(f(v)),
            Completion::Unwind(u) => Completion::Unwind(u),
        }
    }

    pub fn is_unwind(&self) -> bool {
        matches!(self, Completion::Unwind(_))
    }
}

/// Unwraps a normal completion, or returns the unwind from the enclosing
/// function.
macro_rules! propagate {
    ($e:expr) => {
        match $e {
            $crate::completion::Completion::Normal(v) => v,
            $crate::completion::Completion::Unwind(u) => {
                return Ok($crate::completion::Completion::Unwind(u));
            }
        }
    };
}

pub(crate) use propagate;
