use std::sync::Arc;

use parking_lot::RwLock;

use crate::activation::ActivationToken;
use crate::method::Method;
use crate::value::Value;

/// Heap-side part of an activation: the variables inner blocks capture.
///
/// Slot 0 of the captured storage holds the receiver. A context outlives its
/// activation whenever a block referencing it escapes.
pub struct Context {
    receiver: Value,
    inner: RwLock<Vec<Value>>,
    outer: Option<Arc<Context>>,
    /// Set for activations that catch non-local returns.
    home: Option<ActivationToken>,
}

impl Context {
    pub fn new(
        receiver: Value,
        inner_size: usize,
        outer: Option<Arc<Context>>,
        home: Option<ActivationToken>,
    ) -> Arc<Context> {
        let mut inner = vec![Value::Nil; inner_size.max(1)];
        inner[0] = receiver.clone();
        Arc::new(Context { receiver, inner: RwLock::new(inner), outer, home })
    }

    pub fn receiver(&self) -> &Value {
        &self.receiver
    }

    pub fn outer(&self) -> Option<&Arc<Context>> {
        self.outer.as_ref()
    }

    pub fn home(&self) -> Option<ActivationToken> {
        self.home
    }

    /// The context `level` steps out along the lexical chain.
    pub fn at_level(&self, level: u8) -> Option<&Context> {
        let mut ctx = self;
        for _ in 0..level {
            ctx = ctx.outer.as_deref()?;
        }
        Some(ctx)
    }

    pub fn read(&self, index: usize) -> Option<Value> {
        self.inner.read().get(index).cloned()
    }

    pub fn write(&self, index: usize, value: Value) -> bool {
        match self.inner.write().get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// The first receiver along the lexical chain that is not a block.
    pub fn dynamic_self(&self) -> Value {
        let mut ctx = self;
        loop {
            match (&ctx.receiver, ctx.outer.as_deref()) {
                (Value::Block(_), Some(outer)) => ctx = outer,
                (receiver, _) => return receiver.clone(),
            }
        }
    }
}

/// A closure: a block method plus the context it was created in.
pub struct Block {
    method: Arc<Method>,
    context: Option<Arc<Context>>,
}

impl Block {
    pub fn new(method: Arc<Method>, context: Option<Arc<Context>>) -> Self {
        Self { method, context }
    }

    pub fn method(&self) -> &Arc<Method> {
        &self.method
    }

    pub fn context(&self) -> Option<&Arc<Context>> {
        self.context.as_ref()
    }

    /// Arguments the block takes, not counting itself.
    pub fn argument_count(&self) -> usize {
        self.method.signature().argument_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_and_dynamic_self() {
        let outer = Context::new(Value::Integer(1), 3, None, None);
        assert_eq!(outer.read(0), Some(Value::Integer(1)));
        assert!(outer.write(2, Value::True));
        assert!(!outer.write(3, Value::True));

        let inner = Context::new(Value::Nil, 1, Some(outer.clone()), None);
        assert_eq!(inner.at_level(1).and_then(|c| c.read(2)), Some(Value::True));
        assert!(inner.at_level(2).is_none());
        assert_eq!(inner.dynamic_self(), Value::Nil);
    }
}
