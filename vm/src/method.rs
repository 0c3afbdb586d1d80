use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use bytecode::{DecodeError, Instruction, Op, Tier};

use crate::cache::InlineCache;
use crate::error::{AssemblyError, RuntimeError};
use crate::object::Class;
use crate::scope::Scope;
use crate::signature::Signature;
use crate::value::Value;

/// A literal pool entry.
#[derive(Clone)]
pub enum Literal {
    Value(Value),
    /// The compiled body of a nested block.
    Method(Arc<Method>),
}

impl Literal {
    pub fn symbol(signature: Signature) -> Self {
        Literal::Value(Value::Symbol(signature))
    }

    pub fn is_same(&self, other: &Literal) -> bool {
        match (self, other) {
            (Literal::Value(a), Literal::Value(b)) => a.is_identical(b),
            (Literal::Method(a), Literal::Method(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Value(v) => write!(f, "{v:?}"),
            Literal::Method(m) => write!(f, "[block {}]", m.signature()),
        }
    }
}

/// An assembled method or block body.
///
/// Bytecode is kept in atomics so the interpreters can rewrite instructions
/// in place while other call stacks execute the same method. Every rewrite
/// stores operands first and publishes the opcode last.
pub struct Method {
    signature: Signature,
    bytecode: Box<[AtomicU8]>,
    literals: Box<[Literal]>,
    /// Parallel to `bytecode`; present at every send.
    inline_caches: Box<[Option<InlineCache>]>,
    scope: Arc<Scope>,
    max_stack_size: usize,
    tier: Tier,
    catches_non_local_return: bool,
    holder: OnceLock<Weak<Class>>,
}

impl Method {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        signature: Signature,
        bytecode: Vec<u8>,
        literals: Vec<Literal>,
        scope: Arc<Scope>,
        max_stack_size: usize,
        tier: Tier,
        catches_non_local_return: bool,
        call_sites: &[usize],
    ) -> Self {
        let mut inline_caches: Vec<Option<InlineCache>> =
            (0..bytecode.len()).map(|_| None).collect();
        for &pc in call_sites {
            inline_caches[pc] = Some(InlineCache::new());
        }
        Self {
            signature,
            bytecode: bytecode.into_iter().map(AtomicU8::new).collect(),
            literals: literals.into_boxed_slice(),
            inline_caches: inline_caches.into_boxed_slice(),
            scope,
            max_stack_size,
            tier,
            catches_non_local_return,
            holder: OnceLock::new(),
        }
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn scope(&self) -> &Arc<Scope> {
        &self.scope
    }

    pub fn max_stack_size(&self) -> usize {
        self.max_stack_size
    }

    pub fn frame_size(&self) -> usize {
        self.scope.layout().frame_size(self.max_stack_size)
    }

    pub fn number_of_arguments(&self) -> usize {
        self.scope.layout().number_of_arguments()
    }

    pub fn number_of_locals(&self) -> usize {
        self.scope.layout().number_of_locals()
    }

    pub fn catches_non_local_return(&self) -> bool {
        self.catches_non_local_return
    }

    pub fn literals(&self) -> &[Literal] {
        &self.literals
    }

    pub fn bytecode_len(&self) -> usize {
        self.bytecode.len()
    }

    #[inline(always)]
    pub fn bytecode(&self, pc: usize) -> u8 {
        self.bytecode[pc].load(Ordering::Acquire)
    }

    #[inline(always)]
    pub fn operand(&self, pc: usize) -> u8 {
        self.bytecode[pc].load(Ordering::Relaxed)
    }

    /// Snapshot of the bytecode stream.
    pub fn bytecodes(&self) -> Vec<u8> {
        self.bytecode.iter().map(|b| b.load(Ordering::Acquire)).collect()
    }

    /// Rewrites the opcode at `pc`, leaving its operands alone.
    pub fn set_bytecode(&self, pc: usize, op: Op) {
        self.bytecode[pc].store(op as u8, Ordering::Release);
    }

    /// Decodes the instruction at `pc` from a consistent snapshot: the opcode
    /// is read first, so operands written before it are visible.
    pub fn decode_at(&self, pc: usize) -> Result<(Instruction, usize), DecodeError> {
        let mut buf = [0u8; 3];
        buf[0] = self.bytecode(pc);
        let end = (pc + 3).min(self.bytecode.len());
        for (i, at) in (pc + 1..end).enumerate() {
            buf[i + 1] = self.operand(at);
        }
        bytecode::decode(&buf[..end - pc])
    }

    pub fn literal(&self, index: u8) -> Option<&Literal> {
        self.literals.get(index as usize)
    }

    pub fn constant(&self, index: u8) -> Result<Value, RuntimeError> {
        match self.literal(index) {
            Some(Literal::Value(v)) => Ok(v.clone()),
            _ => Err(RuntimeError::InvalidLiteral { index, expected: "value" }),
        }
    }

    pub fn signature_literal(&self, index: u8) -> Result<Signature, RuntimeError> {
        match self.literal(index) {
            Some(Literal::Value(Value::Symbol(s))) => Ok(s.clone()),
            _ => Err(RuntimeError::InvalidLiteral { index, expected: "symbol" }),
        }
    }

    pub fn block_literal(&self, index: u8) -> Result<Arc<Method>, RuntimeError> {
        match self.literal(index) {
            Some(Literal::Method(m)) => Ok(m.clone()),
            _ => Err(RuntimeError::InvalidLiteral { index, expected: "block method" }),
        }
    }

    pub fn inline_cache(&self, pc: usize) -> Result<&InlineCache, RuntimeError> {
        self.inline_caches
            .get(pc)
            .and_then(Option::as_ref)
            .ok_or(RuntimeError::MissingCacheEntry { pc })
    }

    pub fn holder(&self) -> Option<Arc<Class>> {
        self.holder.get().and_then(Weak::upgrade)
    }

    /// Records the class the method is installed in. Nested block methods
    /// share their enclosing method's holder. The first holder wins.
    pub(crate) fn set_holder(&self, class: &Arc<Class>) {
        if self.holder.set(Arc::downgrade(class)).is_err() {
            return;
        }
        for literal in self.literals.iter() {
            if let Literal::Method(block) = literal {
                block.set_holder(class);
            }
        }
    }

    /// `Holder>>#selector`, or just the selector for uninstalled methods.
    pub fn qualified_name(&self) -> String {
        match self.holder() {
            Some(class) => format!("{}>>#{}", class.name(), self.signature),
            None => format!("#{}", self.signature),
        }
    }

    /// Replaces the variable placeholder at `pc` with the frame or context
    /// access it denotes. A site another call stack already patched is left
    /// as is.
    pub fn patch_variable_access(&self, pc: usize) -> Result<(), AssemblyError> {
        let placeholder = match self.decode_at(pc) {
            Ok((instruction, _)) if instruction.is_placeholder() => instruction,
            Ok(_) => return Ok(()),
            Err(DecodeError::UnknownOpcode { byte }) => {
                return Err(AssemblyError::MalformedBytecode { pc, byte });
            }
            Err(DecodeError::Truncated { op }) => {
                return Err(AssemblyError::TruncatedInstruction { pc, op });
            }
        };
        let resolved = self.scope.resolve(placeholder)?;
        let len = Op::try_from(resolved[0])
            .map(Op::length)
            .map_err(|byte| AssemblyError::MalformedBytecode { pc, byte })?;
        for i in 1..len {
            self.bytecode[pc + i].store(resolved[i], Ordering::Relaxed);
        }
        self.bytecode[pc].store(resolved[0], Ordering::Release);
        log::trace!(
            "{}: patched {placeholder} @ {pc} to {}",
            self.qualified_name(),
            Op::try_from(resolved[0]).map(Op::name).unwrap_or("?")
        );
        Ok(())
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("signature", &self.signature)
            .field("tier", &self.tier)
            .field("max_stack_size", &self.max_stack_size)
            .field("bytecode_len", &self.bytecode.len())
            .finish()
    }
}
