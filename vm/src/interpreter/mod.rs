//! Activation and the two dispatch loops.
//!
//! [`tier1`] decodes each instruction and runs it against the operand stack
//! embedded in the [`Frame`]. [`tier2`] dispatches on raw opcodes over an
//! external [`OperandStack`], keys its inline caches on object shapes and
//! cooperates with an optimizing tier through [`TierHooks`].

mod nlr;
mod send;
pub mod tier1;
pub mod tier2;

use std::sync::Arc;

use bytecode::Tier;

pub use tier2::OperandStack;

use crate::activation::ActivationArena;
use crate::completion::Completion;
use crate::context::{Block, Context};
use crate::error::RuntimeError;
use crate::frame::Frame;
use crate::hooks::{Interpreted, TierHooks};
use crate::method::Method;
use crate::signature::Signature;
use crate::universe::Universe;
use crate::value::Value;

const MAX_DEPTH: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterpreterSettings {
    /// Nested activations allowed before [`RuntimeError::StackOverflow`].
    pub max_depth: usize,
}

impl Default for InterpreterSettings {
    fn default() -> Self {
        Self { max_depth: MAX_DEPTH }
    }
}

/// One call stack.
///
/// Methods, classes and the universe are shared; the activation arena and
/// depth counter belong to this interpreter alone.
pub struct Interpreter {
    universe: Arc<Universe>,
    hooks: Arc<dyn TierHooks>,
    settings: InterpreterSettings,
    activations: ActivationArena,
    depth: usize,
}

impl Interpreter {
    pub fn new(universe: Arc<Universe>) -> Self {
        Self::with_hooks(universe, Arc::new(Interpreted), InterpreterSettings::default())
    }

    pub fn with_hooks(
        universe: Arc<Universe>,
        hooks: Arc<dyn TierHooks>,
        settings: InterpreterSettings,
    ) -> Self {
        Self { universe, hooks, settings, activations: ActivationArena::new(), depth: 0 }
    }

    pub fn universe(&self) -> &Arc<Universe> {
        &self.universe
    }

    pub fn hooks(&self) -> &Arc<dyn TierHooks> {
        &self.hooks
    }

    pub fn settings(&self) -> &InterpreterSettings {
        &self.settings
    }

    pub fn activations(&self) -> &ActivationArena {
        &self.activations
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Runs `method` as the outermost activation. A non-local return that
    /// no activation caught is reported as [`RuntimeError::StrayUnwind`].
    pub fn run(
        &mut self,
        method: &Arc<Method>,
        receiver: Value,
        args: &[Value],
    ) -> Result<Value, RuntimeError> {
        match self.activate(method, receiver, args, None)? {
            Completion::Normal(value) => Ok(value),
            Completion::Unwind(_) => Err(RuntimeError::StrayUnwind),
        }
    }

    /// Invokes `method`. Methods that catch non-local returns get an
    /// activation token, which dies on every exit path; an unwind aimed at
    /// that token becomes this activation's result.
    pub fn activate(
        &mut self,
        method: &Arc<Method>,
        receiver: Value,
        args: &[Value],
        outer: Option<Arc<Context>>,
    ) -> Result<Completion, RuntimeError> {
        if self.depth >= self.settings.max_depth {
            return Err(RuntimeError::StackOverflow);
        }
        let home = method.catches_non_local_return().then(|| self.activations.enter());
        let result = Frame::new(method, receiver, args, outer, home)
            .and_then(|mut frame| self.execute(method, &mut frame));
        if let Some(token) = home {
            self.activations.exit(token);
        }
        match result? {
            Completion::Unwind(unwind) if Some(unwind.target) == home => {
                Ok(Completion::Normal(unwind.value))
            }
            other => Ok(other),
        }
    }

    pub fn activate_block(
        &mut self,
        block: &Arc<Block>,
        args: &[Value],
    ) -> Result<Completion, RuntimeError> {
        if args.len() != block.argument_count() {
            return Err(RuntimeError::ArgumentCountMismatch {
                expected: block.argument_count(),
                got: args.len(),
            });
        }
        let method = block.method().clone();
        self.activate(&method, Value::Block(block.clone()), args, block.context().cloned())
    }

    fn execute(&mut self, method: &Arc<Method>, frame: &mut Frame) -> Result<Completion, RuntimeError> {
        match method.tier() {
            Tier::One => self.execute_tier1(method, frame),
            Tier::Two => {
                let mut stack = OperandStack::new(method.max_stack_size());
                self.execute_tier2(method, frame, &mut stack)
            }
        }
    }

    /// Runs `method` in tier 1 on an already built frame.
    pub fn execute_tier1(
        &mut self,
        method: &Arc<Method>,
        frame: &mut Frame,
    ) -> Result<Completion, RuntimeError> {
        self.depth += 1;
        let result = tier1::interpret(self, method, frame);
        self.depth -= 1;
        result
    }

    /// Runs `method` in tier 2 on an already built frame and operand stack.
    pub fn execute_tier2(
        &mut self,
        method: &Arc<Method>,
        frame: &mut Frame,
        stack: &mut OperandStack,
    ) -> Result<Completion, RuntimeError> {
        self.depth += 1;
        let result = tier2::interpret(self, method, frame, stack);
        self.depth -= 1;
        result
    }

    /// Full lookup on the receiver's class, falling back to
    /// `doesNotUnderstand:arguments:`.
    pub fn send(
        &mut self,
        receiver: Value,
        selector: &Signature,
        args: &[Value],
    ) -> Result<Completion, RuntimeError> {
        let class = self.universe.class_of(&receiver);
        match class.lookup_invokable(selector) {
            Some(target) => target.invoke(self, receiver, args),
            None => send::does_not_understand(self, receiver, selector, args.to_vec()),
        }
    }

    pub fn send_named(
        &mut self,
        receiver: Value,
        selector: &str,
        args: &[Value],
    ) -> Result<Completion, RuntimeError> {
        let selector = self.universe.symbol_for(selector);
        self.send(receiver, &selector, args)
    }
}

// Variable access shared by both tiers.

fn read_inner(frame: &Frame, idx: u8, level: u8) -> Result<Value, RuntimeError> {
    frame.context_at(level)?.read(idx as usize).ok_or(RuntimeError::MissingContext { level })
}

fn write_inner(frame: &Frame, idx: u8, level: u8, value: Value) -> Result<(), RuntimeError> {
    if frame.context_at(level)?.write(idx as usize, value) {
        Ok(())
    } else {
        Err(RuntimeError::MissingContext { level })
    }
}

/// The receiver whose fields `level` addresses.
fn self_at(frame: &Frame, level: u8) -> Result<Value, RuntimeError> {
    if level == 0 {
        Ok(frame.receiver().clone())
    } else {
        Ok(frame.context_at(level)?.receiver().clone())
    }
}

fn read_field(frame: &Frame, idx: u8, level: u8) -> Result<Value, RuntimeError> {
    match self_at(frame, level)? {
        Value::Object(instance) => instance.field(idx as usize).ok_or(
            RuntimeError::IndexOutOfBounds {
                index: idx as i64,
                len: instance.class().number_of_instance_fields(),
            },
        ),
        other => Err(RuntimeError::TypeError { expected: "object", got: other.type_name() }),
    }
}

fn write_field(frame: &Frame, idx: u8, level: u8, value: Value) -> Result<(), RuntimeError> {
    match self_at(frame, level)? {
        Value::Object(instance) => {
            if instance.set_field(idx as usize, value) {
                Ok(())
            } else {
                Err(RuntimeError::IndexOutOfBounds {
                    index: idx as i64,
                    len: instance.class().number_of_instance_fields(),
                })
            }
        }
        other => Err(RuntimeError::TypeError { expected: "object", got: other.type_name() }),
    }
}

fn new_block(method: &Method, literal: u8, context: Option<Arc<Context>>) -> Result<Value, RuntimeError> {
    let body = method.block_literal(literal)?;
    Ok(Value::Block(Arc::new(Block::new(body, context))))
}

/// Dispatch-fatal: the method holds a byte no tier can execute. The whole
/// method is dumped before the error is returned.
fn unknown_bytecode(byte: u8, pc: usize, method: &Method) -> RuntimeError {
    log::error!(
        "unknown bytecode {byte:#04x} at {pc} in {}\n{}",
        method.qualified_name(),
        crate::describe::disassemble(method)
    );
    RuntimeError::UnknownBytecode { byte, pc, method: method.qualified_name() }
}
