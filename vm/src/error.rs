use std::fmt;

use bytecode::{Op, Tier};

use crate::signature::Signature;

/// Failures while turning a method generation context into a [`Method`].
///
/// Also raised at run time when a deferred placeholder cannot be resolved.
///
/// [`Method`]: crate::method::Method
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    UnresolvedVariable { index: u8, level: u8, argument: bool },
    /// A variable that lives only in its own frame was referenced from an
    /// inner block.
    UncapturedOuterAccess { index: u8, level: u8 },
    ReceiverAssignment,
    AccessIndexOutOfRange { index: usize },
    LiteralPoolOverflow { limit: usize },
    LiteralMismatch { index: usize },
    MissingSignature { pc: usize, literal: u8 },
    UnsupportedInTier { op: Op, tier: Tier, pc: usize },
    MalformedBytecode { pc: usize, byte: u8 },
    TruncatedInstruction { pc: usize, op: Op },
    StackUnderflow { pc: usize },
    /// Two paths reach `pc` with different stack depths.
    InconsistentStackDepth { pc: usize, expected: usize, found: usize },
    /// The jump at `pc` lands outside the method or inside another
    /// instruction.
    InvalidJumpTarget { pc: usize },
    NotAPlaceholder { pc: usize },
}

impl fmt::Display for AssemblyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssemblyError::UnresolvedVariable { index, level, argument } => {
                let kind = if *argument { "argument" } else { "local" };
                write!(f, "unresolved {kind} {index} at context level {level}")
            }
            AssemblyError::UncapturedOuterAccess { index, level } => {
                write!(f, "variable {index} is not captured but accessed from level {level}")
            }
            AssemblyError::ReceiverAssignment => write!(f, "cannot assign to self"),
            AssemblyError::AccessIndexOutOfRange { index } => {
                write!(f, "resolved variable index {index} does not fit in a byte")
            }
            AssemblyError::LiteralPoolOverflow { limit } => {
                write!(f, "literal pool exceeds {limit} entries")
            }
            AssemblyError::LiteralMismatch { index } => {
                write!(f, "literal {index} does not hold the expected value")
            }
            AssemblyError::MissingSignature { pc, literal } => {
                write!(f, "send at {pc} names literal {literal}, which is not a symbol")
            }
            AssemblyError::UnsupportedInTier { op, tier, pc } => {
                write!(f, "{} at {pc} is not available in {tier:?}", op.name())
            }
            AssemblyError::MalformedBytecode { pc, byte } => {
                write!(f, "unknown bytecode 0x{byte:02x} at {pc}")
            }
            AssemblyError::TruncatedInstruction { pc, op } => {
                write!(f, "{} at {pc} runs past the end of the method", op.name())
            }
            AssemblyError::StackUnderflow { pc } => write!(f, "operand stack underflows at {pc}"),
            AssemblyError::InconsistentStackDepth { pc, expected, found } => {
                write!(f, "stack depth at {pc} is {found} on one path and {expected} on another")
            }
            AssemblyError::InvalidJumpTarget { pc } => {
                write!(f, "jump at {pc} does not land on an instruction")
            }
            AssemblyError::NotAPlaceholder { pc } => {
                write!(f, "bytecode at {pc} is not a variable placeholder")
            }
        }
    }
}

impl std::error::Error for AssemblyError {}

#[derive(Debug, Clone)]
pub enum RuntimeError {
    /// Dispatch hit a byte that is not an instruction of the method's tier.
    UnknownBytecode { byte: u8, pc: usize, method: String },
    MessageNotUnderstood { receiver: String, selector: Signature },
    EscapedBlock { receiver: String },
    UnknownGlobal { name: Signature },
    NotNumeric { got: &'static str },
    TypeError { expected: &'static str, got: &'static str },
    ArgumentCountMismatch { expected: usize, got: usize },
    IndexOutOfBounds { index: i64, len: usize },
    StackOverflow,
    /// The tier-2 operand stack was popped past its guard slot.
    StackUnderflow { pc: usize },
    PrimitiveMissing { selector: Signature },
    NoHolder { method: String },
    MissingCacheEntry { pc: usize },
    MissingContext { level: u8 },
    InvalidLiteral { index: u8, expected: &'static str },
    /// An unwind reached the bottom of the call stack without meeting its
    /// target activation.
    StrayUnwind,
    Assembly(AssemblyError),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::UnknownBytecode { byte, pc, method } => {
                write!(f, "unknown bytecode 0x{byte:02x} @ {pc} in {method}")
            }
            RuntimeError::MessageNotUnderstood { receiver, selector } => {
                write!(f, "{receiver} does not understand #{selector}")
            }
            RuntimeError::EscapedBlock { receiver } => {
                write!(f, "block escaped its home method (sent to {receiver})")
            }
            RuntimeError::UnknownGlobal { name } => write!(f, "unknown global {name}"),
            RuntimeError::NotNumeric { got } => write!(f, "expected a number, got {got}"),
            RuntimeError::TypeError { expected, got } => write!(f, "expected {expected}, got {got}"),
            RuntimeError::ArgumentCountMismatch { expected, got } => {
                write!(f, "expected {expected} arguments, got {got}")
            }
            RuntimeError::IndexOutOfBounds { index, len } => {
                write!(f, "index {index} out of bounds for size {len}")
            }
            RuntimeError::StackOverflow => write!(f, "stack overflow"),
            RuntimeError::StackUnderflow { pc } => write!(f, "operand stack underflow at {pc}"),
            RuntimeError::PrimitiveMissing { selector } => {
                write!(f, "no primitive implementation for #{selector}")
            }
            RuntimeError::NoHolder { method } => write!(f, "{method} is not installed in a class"),
            RuntimeError::MissingCacheEntry { pc } => write!(f, "no inline cache at {pc}"),
            RuntimeError::MissingContext { level } => write!(f, "no context at level {level}"),
            RuntimeError::InvalidLiteral { index, expected } => {
                write!(f, "literal {index} is not a {expected}")
            }
            RuntimeError::StrayUnwind => write!(f, "non-local return found no target activation"),
            RuntimeError::Assembly(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RuntimeError::Assembly(e) => Some(e),
            _ => None,
        }
    }
}

impl From<AssemblyError> for RuntimeError {
    fn from(e: AssemblyError) -> Self {
        RuntimeError::Assembly(e)
    }
}
