use std::sync::Arc;

use crate::activation::ActivationToken;
use crate::context::Context;
use crate::error::RuntimeError;
use crate::method::Method;
use crate::value::Value;

/// Activation record for one invocation.
///
/// Slot layout: receiver, arguments, locals, then (tier 1 only) the operand
/// stack and a guard slot. Variables captured by inner blocks live in the
/// frame's [`Context`] instead.
pub struct Frame {
    slots: Box<[Value]>,
    /// Index of the top of the embedded stack. Equal to `stack_start` when
    /// the stack is empty.
    stack_ptr: usize,
    stack_start: usize,
    context: Arc<Context>,
}

impl Frame {
    pub fn new(
        method: &Method,
        receiver: Value,
        args: &[Value],
        outer: Option<Arc<Context>>,
        home: Option<ActivationToken>,
    ) -> Result<Self, RuntimeError> {
        let layout = method.scope().layout();
        if args.len() != layout.number_of_arguments() {
            return Err(RuntimeError::ArgumentCountMismatch {
                expected: layout.number_of_arguments(),
                got: args.len(),
            });
        }

        let mut slots = vec![Value::Nil; method.frame_size()].into_boxed_slice();
        slots[0] = receiver.clone();
        slots[1..=args.len()].clone_from_slice(args);

        let context = Context::new(receiver, layout.inner_size(), outer, home);
        for &(frame_slot, inner_slot) in layout.captured_arguments() {
            context.write(inner_slot, slots[frame_slot].clone());
        }

        let stack_start = layout.before_stack_start();
        Ok(Self { slots, stack_ptr: stack_start, stack_start, context })
    }

    pub fn receiver(&self) -> &Value {
        &self.slots[0]
    }

    pub fn read(&self, index: u8) -> Value {
        self.slots[index as usize].clone()
    }

    pub fn write(&mut self, index: u8, value: Value) {
        self.slots[index as usize] = value;
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    pub fn context_at(&self, level: u8) -> Result<&Context, RuntimeError> {
        self.context.at_level(level).ok_or(RuntimeError::MissingContext { level })
    }

    /// Receiver of the nearest enclosing method activation.
    pub fn dynamic_self(&self) -> Value {
        self.context.dynamic_self()
    }

    // ── embedded operand stack (tier 1) ────────────────────────────

    #[inline(always)]
    pub fn push(&mut self, value: Value) {
        self.stack_ptr += 1;
        self.slots[self.stack_ptr] = value;
    }

    #[inline(always)]
    pub fn pop(&mut self) -> Value {
        debug_assert!(self.stack_ptr > self.stack_start, "operand stack underflow");
        let value = std::mem::take(&mut self.slots[self.stack_ptr]);
        self.stack_ptr -= 1;
        value
    }

    #[inline(always)]
    pub fn top(&self) -> &Value {
        &self.slots[self.stack_ptr]
    }

    #[inline(always)]
    pub fn set_top(&mut self, value: Value) {
        self.slots[self.stack_ptr] = value;
    }

    /// Element `depth` entries below the top.
    #[inline(always)]
    pub fn peek(&self, depth: usize) -> &Value {
        &self.slots[self.stack_ptr - depth]
    }

    pub fn stack_ptr(&self) -> usize {
        self.stack_ptr
    }

    pub fn set_stack_ptr(&mut self, sp: usize) {
        debug_assert!(sp >= self.stack_start && sp < self.slots.len());
        self.stack_ptr = sp;
    }

    pub fn stack_depth(&self) -> usize {
        self.stack_ptr - self.stack_start
    }

    pub(crate) fn slots_mut(&mut self) -> &mut [Value] {
        &mut self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
