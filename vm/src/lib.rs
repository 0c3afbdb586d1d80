//! Execution core of a SOM bytecode VM: the method assembler, two
//! interpreter tiers with inline caching, non-local return and
//! does-not-understand handling.

pub mod activation;
pub mod assembler;
pub mod cache;
pub mod completion;
pub mod context;
pub mod describe;
pub mod error;
pub mod frame;
pub mod hooks;
pub mod interpreter;
pub mod invokable;
pub mod method;
pub mod object;
pub mod primitives;
pub mod scope;
pub mod signature;
pub mod universe;
pub mod value;

pub use activation::{ActivationArena, ActivationToken};
pub use assembler::{Assembled, AssemblerSettings, MethodGenerationContext, assemble};
pub use bytecode::{BytecodeBuilder, JumpCondition, Op, Tier};
pub use cache::{CacheKey, InlineCache};
pub use completion::{Completion, Unwind};
pub use context::{Block, Context};
pub use describe::{describe, disassemble};
pub use error::{AssemblyError, RuntimeError};
pub use frame::Frame;
pub use hooks::{Interpreted, LoopProfiler, TierHooks};
pub use interpreter::{Interpreter, InterpreterSettings, OperandStack};
pub use invokable::{Invokable, Primitive, PrimitiveFn};
pub use method::{Literal, Method};
pub use object::{Class, Instance, Shape};
pub use scope::{HEADER_SLOTS, Scope, Variable};
pub use signature::{Signature, SymbolTable};
pub use universe::Universe;
pub use value::{Array, Value};
