use std::sync::Arc;

use bytecode::{Instruction, Op, StackEffect, Tier};

use crate::error::AssemblyError;
use crate::invokable::{Invokable, Primitive};
use crate::method::{Literal, Method};
use crate::scope::{FoundVariable, Scope};
use crate::signature::Signature;
use crate::value::Value;

/// Cap for [`MethodGenerationContext::add_literal`].
pub const MAX_LITERALS: usize = 128;
/// Literal operands are one byte wide.
const MAX_LITERAL_OPERAND: usize = u8::MAX as usize + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssemblerSettings {
    pub tier: Tier,
    /// Rewrite variable placeholders now. When off, the interpreters patch
    /// each placeholder the first time it executes.
    pub resolve_variables: bool,
}

impl Default for AssemblerSettings {
    fn default() -> Self {
        Self { tier: Tier::One, resolve_variables: true }
    }
}

impl AssemblerSettings {
    pub fn tier(tier: Tier) -> Self {
        Self { tier, ..Self::default() }
    }
}

pub enum Assembled {
    Method(Arc<Method>),
    /// A body-less primitive declaration, keyed by its selector.
    Primitive(Arc<Primitive>),
}

impl Assembled {
    pub fn into_method(self) -> Option<Arc<Method>> {
        match self {
            Assembled::Method(m) => Some(m),
            Assembled::Primitive(_) => None,
        }
    }

    pub fn into_invokable(self) -> Invokable {
        match self {
            Assembled::Method(m) => Invokable::Method(m),
            Assembled::Primitive(p) => Invokable::Primitive(p),
        }
    }
}

/// Collects everything the front end produces for one method or block and
/// assembles it into an immutable [`Method`].
pub struct MethodGenerationContext {
    signature: Signature,
    scope: Arc<Scope>,
    literals: Vec<Literal>,
    bytecode: Vec<u8>,
    primitive: bool,
    catches_non_local_return: bool,
}

impl MethodGenerationContext {
    pub fn new(signature: Signature, scope: Arc<Scope>) -> Self {
        Self {
            signature,
            scope,
            literals: Vec::new(),
            bytecode: Vec::new(),
            primitive: false,
            catches_non_local_return: false,
        }
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn scope(&self) -> &Arc<Scope> {
        &self.scope
    }

    pub fn set_primitive(&mut self) {
        self.primitive = true;
    }

    pub fn is_primitive(&self) -> bool {
        self.primitive
    }

    /// Marks that a block nested in this method returns non-locally.
    pub fn mark_catches_non_local_return(&mut self) {
        self.catches_non_local_return = true;
    }

    pub fn set_bytecode(&mut self, bytecode: Vec<u8>) {
        self.bytecode = bytecode;
    }

    pub fn bytecode(&self) -> &[u8] {
        &self.bytecode
    }

    pub fn literals(&self) -> &[Literal] {
        &self.literals
    }

    pub fn find_literal_index(&self, literal: &Literal) -> Option<u8> {
        self.literals.iter().position(|l| l.is_same(literal)).map(|i| i as u8)
    }

    /// Reuses an identical literal when one exists.
    pub fn add_literal_if_absent(&mut self, literal: Literal) -> Result<u8, AssemblyError> {
        if let Some(index) = self.find_literal_index(&literal) {
            return Ok(index);
        }
        self.push_literal(literal, MAX_LITERAL_OPERAND)
    }

    /// Always appends a fresh slot.
    pub fn add_literal(&mut self, literal: Literal) -> Result<u8, AssemblyError> {
        self.push_literal(literal, MAX_LITERALS)
    }

    fn push_literal(&mut self, literal: Literal, limit: usize) -> Result<u8, AssemblyError> {
        if self.literals.len() >= limit {
            return Err(AssemblyError::LiteralPoolOverflow { limit });
        }
        self.literals.push(literal);
        Ok((self.literals.len() - 1) as u8)
    }

    /// Replaces the literal at `index`, which must currently be `old`.
    pub fn update_literal(
        &mut self,
        old: &Literal,
        index: u8,
        new: Literal,
    ) -> Result<(), AssemblyError> {
        match self.literals.get_mut(index as usize) {
            Some(slot) if slot.is_same(old) => {
                *slot = new;
                Ok(())
            }
            _ => Err(AssemblyError::LiteralMismatch { index: index as usize }),
        }
    }

    pub fn find_var(&self, name: &str) -> Option<FoundVariable> {
        self.scope.find_var(name)
    }

    pub fn max_context_level(&self) -> usize {
        self.scope.max_context_level()
    }

    pub fn assemble(self, settings: &AssemblerSettings) -> Result<Assembled, AssemblyError> {
        if self.primitive {
            return Ok(Assembled::Primitive(Arc::new(Primitive::empty(self.signature))));
        }
        let method = assemble(
            self.signature,
            self.bytecode,
            self.literals,
            self.scope,
            self.catches_non_local_return,
            settings,
        )?;
        Ok(Assembled::Method(method))
    }
}

/// Analyzes `bytecode`, resolves its placeholders and builds the method.
pub fn assemble(
    signature: Signature,
    mut bytecode: Vec<u8>,
    literals: Vec<Literal>,
    scope: Arc<Scope>,
    catches_non_local_return: bool,
    settings: &AssemblerSettings,
) -> Result<Arc<Method>, AssemblyError> {
    let analysis = analyze(&mut bytecode, &literals, &scope, settings)?;
    let method = Method::new(
        signature,
        bytecode,
        literals,
        scope,
        analysis.max_stack_size,
        settings.tier,
        catches_non_local_return,
        &analysis.call_sites,
    );
    log::debug!(
        "assembled #{} for {:?}: {} bytes, max stack {}, frame size {}",
        method.signature(),
        settings.tier,
        method.bytecode_len(),
        method.max_stack_size(),
        method.frame_size()
    );
    Ok(Arc::new(method))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackAnalysis {
    pub max_stack_size: usize,
    /// Indices of send instructions, which get inline caches.
    pub call_sites: Vec<usize>,
}

/// How a jump moves the stack on its taken edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Branch {
    Forward,
    Backward,
    /// The condition stays on the stack as nil when taken.
    KeepTop,
    Pop,
    /// Both compared operands are dropped when taken.
    IfGreater,
}

impl Branch {
    fn of(op: Op) -> Option<Branch> {
        use Op::*;
        match op {
            Jump | Jump2 => Some(Branch::Forward),
            JumpBackward | Jump2Backward => Some(Branch::Backward),
            JumpOnTrueTopNil | JumpOnFalseTopNil | Jump2OnTrueTopNil | Jump2OnFalseTopNil => {
                Some(Branch::KeepTop)
            }
            JumpOnTruePop | JumpOnFalsePop | Jump2OnTruePop | Jump2OnFalsePop => Some(Branch::Pop),
            JumpIfGreater | Jump2IfGreater => Some(Branch::IfGreater),
            _ => None,
        }
    }

    /// Depth at the target, given the depth before the jump.
    fn taken_depth(self, depth: i32) -> i32 {
        match self {
            Branch::Forward | Branch::Backward | Branch::KeepTop => depth,
            Branch::Pop => depth - 1,
            Branch::IfGreater => depth - 2,
        }
    }
}

fn jump_operand(bytecode: &[u8], pc: usize, op: Op) -> usize {
    if op.is_long_jump() {
        u16::from_le_bytes([bytecode[pc + 1], bytecode[pc + 2]]) as usize
    } else {
        bytecode[pc + 1] as usize
    }
}

/// Nothing falls through past these.
fn ends_path(op: Op) -> bool {
    matches!(
        op,
        Op::Halt
            | Op::ReturnLocal
            | Op::ReturnSelf
            | Op::ReturnNonLocal
            | Op::Jump
            | Op::Jump2
            | Op::JumpBackward
            | Op::Jump2Backward
    )
}

/// Walks the stream in program order, following the taken edge of every
/// jump as well as the fall-through. Every path into an instruction must
/// arrive at the same depth, and no path may pop below an empty stack.
/// Placeholders are rewritten when `settings.resolve_variables` is set.
pub fn analyze(
    bytecode: &mut [u8],
    literals: &[Literal],
    scope: &Scope,
    settings: &AssemblerSettings,
) -> Result<StackAnalysis, AssemblyError> {
    let mut depth: i32 = 0;
    let mut max_depth: i32 = 0;
    let mut call_sites = Vec::new();
    // Depth on entry to each offset, from whichever path got there first.
    let mut entry: Vec<Option<i32>> = vec![None; bytecode.len()];
    let mut starts = vec![false; bytecode.len()];
    let mut forward_jumps = Vec::new();
    let mut falls_through = true;
    let mut pc = 0;

    while pc < bytecode.len() {
        depth = match entry[pc] {
            Some(expected) if falls_through && expected != depth => {
                return Err(AssemblyError::InconsistentStackDepth {
                    pc,
                    expected: expected as usize,
                    found: depth as usize,
                });
            }
            Some(expected) => expected,
            None => depth,
        };
        entry[pc] = Some(depth);
        starts[pc] = true;

        let byte = bytecode[pc];
        let op = Op::try_from(byte).map_err(|byte| AssemblyError::MalformedBytecode { pc, byte })?;
        if !op.available_in(settings.tier) {
            return Err(AssemblyError::UnsupportedInTier { op, tier: settings.tier, pc });
        }
        let len = op.length();
        if pc + len > bytecode.len() {
            return Err(AssemblyError::TruncatedInstruction { pc, op });
        }

        let arity = match op.stack_effect() {
            StackEffect::Fixed(_) => 0,
            StackEffect::Send => {
                let literal = bytecode[pc + 1];
                match literals.get(literal as usize) {
                    Some(Literal::Value(Value::Symbol(sig))) => sig.arity(),
                    _ => return Err(AssemblyError::MissingSignature { pc, literal }),
                }
            }
        };

        if let Some(branch) = Branch::of(op) {
            let taken = branch.taken_depth(depth);
            if taken < 0 {
                return Err(AssemblyError::StackUnderflow { pc });
            }
            let offset = jump_operand(bytecode, pc, op);
            if branch == Branch::Backward {
                let target = pc
                    .checked_sub(offset)
                    .filter(|&target| starts[target])
                    .ok_or(AssemblyError::InvalidJumpTarget { pc })?;
                if let Some(expected) = entry[target].filter(|&expected| expected != taken) {
                    return Err(AssemblyError::InconsistentStackDepth {
                        pc: target,
                        expected: expected as usize,
                        found: taken as usize,
                    });
                }
            } else {
                let target = pc + offset;
                if target >= bytecode.len() {
                    return Err(AssemblyError::InvalidJumpTarget { pc });
                }
                match entry[target] {
                    Some(expected) if expected != taken => {
                        return Err(AssemblyError::InconsistentStackDepth {
                            pc: target,
                            expected: expected as usize,
                            found: taken as usize,
                        });
                    }
                    _ => entry[target] = Some(taken),
                }
                forward_jumps.push((pc, target));
            }
        }

        depth += op.stack_effect().resolve(arity);
        if depth < 0 {
            return Err(AssemblyError::StackUnderflow { pc });
        }
        max_depth = max_depth.max(depth);
        falls_through = !ends_path(op);

        if op.is_send() {
            call_sites.push(pc);
        }
        if op.is_compiler_only() && settings.resolve_variables {
            let (placeholder, _) = bytecode::decode(&bytecode[pc..pc + len])
                .map_err(|_| AssemblyError::TruncatedInstruction { pc, op })?;
            let resolved = scope.resolve(placeholder)?;
            bytecode[pc..pc + len].copy_from_slice(&resolved[..len]);
        }
        pc += len;
    }

    if let Some(&(pc, _)) = forward_jumps.iter().find(|&&(_, target)| !starts[target]) {
        return Err(AssemblyError::InvalidJumpTarget { pc });
    }

    Ok(StackAnalysis { max_stack_size: max_depth as usize, call_sites })
}

/// Replays the stream and reports the deepest stack it reaches, or `None` if
/// it underflows. Independent of [`analyze`]; used to cross-check it.
pub fn simulate_max_depth(bytecode: &[u8], literals: &[Literal]) -> Option<usize> {
    let mut depth: i32 = 0;
    let mut max_depth = 0;
    for step in bytecode::BytecodeDecoder::new(bytecode) {
        let (_, instruction) = step.ok()?;
        let effect = match instruction {
            Instruction::Send { literal, .. }
            | Instruction::SuperSend { literal }
            | Instruction::QuickSuperSend { literal, .. } => match literals.get(literal as usize)? {
                Literal::Value(Value::Symbol(sig)) => 1 - sig.arity() as i32,
                _ => return None,
            },
            Instruction::Halt
            | Instruction::ReturnLocal
            | Instruction::ReturnSelf
            | Instruction::ReturnNonLocal { .. }
            | Instruction::Inc
            | Instruction::Dec
            | Instruction::NilFrame { .. }
            | Instruction::NilInner { .. }
            | Instruction::NilLocal { .. }
            | Instruction::JumpBackward { .. } => 0,
            Instruction::Jump { condition, .. } => match condition {
                bytecode::JumpCondition::Always | bytecode::JumpCondition::IfGreater => 0,
                _ => -1,
            },
            Instruction::Pop
            | Instruction::PopFrame { .. }
            | Instruction::PopInner { .. }
            | Instruction::PopField { .. }
            | Instruction::PopLocal { .. }
            | Instruction::PopArgument { .. } => -1,
            _ => 1,
        };
        depth += effect;
        if depth < 0 {
            return None;
        }
        max_depth = max_depth.max(depth as usize);
    }
    Some(max_depth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::{HEADER_SLOTS, Variable};
    use crate::signature::SymbolTable;
    use bytecode::{BytecodeBuilder, JumpCondition};

    #[test]
    fn add_then_send_scenario() {
        let symbols = SymbolTable::new();
        let mut mgenc = MethodGenerationContext::new(symbols.intern("run"), Scope::empty());
        let five = mgenc.add_literal(Literal::Value(Value::Integer(5))).unwrap();
        let seven = mgenc.add_literal(Literal::Value(Value::Integer(7))).unwrap();
        let plus = mgenc.add_literal_if_absent(Literal::symbol(symbols.intern("+"))).unwrap();

        let mut b = BytecodeBuilder::new();
        b.push_constant(five);
        b.push_constant(seven);
        b.send(plus, 2);
        b.return_local();
        mgenc.set_bytecode(b.into_bytes());

        let method = mgenc.assemble(&AssemblerSettings::default()).unwrap().into_method().unwrap();
        assert_eq!(method.max_stack_size(), 2);
        assert_eq!(method.frame_size(), HEADER_SLOTS + 2 + 1);
        assert!(method.inline_cache(4).is_ok());
        assert!(method.inline_cache(0).is_err());
    }

    #[test]
    fn literal_pool_discipline() {
        let symbols = SymbolTable::new();
        let mut mgenc = MethodGenerationContext::new(symbols.intern("run"), Scope::empty());
        let sym = Literal::symbol(symbols.intern("foo"));
        let a = mgenc.add_literal_if_absent(sym.clone()).unwrap();
        let b = mgenc.add_literal_if_absent(sym.clone()).unwrap();
        assert_eq!(a, b);
        let c = mgenc.add_literal(sym.clone()).unwrap();
        assert_ne!(a, c);
        assert_eq!(mgenc.find_literal_index(&sym), Some(a));

        let bar = Literal::symbol(symbols.intern("bar"));
        assert_eq!(
            mgenc.update_literal(&bar, a, Literal::Value(Value::Nil)),
            Err(AssemblyError::LiteralMismatch { index: a as usize })
        );
        assert_eq!(mgenc.update_literal(&sym, a, bar.clone()), Ok(()));
        assert_eq!(mgenc.find_literal_index(&bar), Some(a));
        assert_eq!(
            mgenc.update_literal(&sym, 99, bar),
            Err(AssemblyError::LiteralMismatch { index: 99 })
        );
    }

    #[test]
    fn fresh_literals_are_capped() {
        let symbols = SymbolTable::new();
        let mut mgenc = MethodGenerationContext::new(symbols.intern("run"), Scope::empty());
        for i in 0..MAX_LITERALS {
            mgenc.add_literal(Literal::Value(Value::Integer(i as i64))).unwrap();
        }
        assert_eq!(
            mgenc.add_literal(Literal::Value(Value::Nil)),
            Err(AssemblyError::LiteralPoolOverflow { limit: MAX_LITERALS })
        );
        // The if-absent path is limited only by the operand width.
        assert!(mgenc.add_literal_if_absent(Literal::Value(Value::Nil)).is_ok());
    }

    #[test]
    fn sends_take_their_effect_from_the_signature() {
        let symbols = SymbolTable::new();
        let literals = vec![
            Literal::Value(Value::Integer(1)),
            Literal::symbol(symbols.intern("at:put:")),
        ];
        let mut b = BytecodeBuilder::new();
        b.push_constant(0);
        b.push_constant(0);
        b.push_constant(0);
        b.send(1, 3);
        b.return_local();
        let mut bytes = b.into_bytes();
        let analysis =
            analyze(&mut bytes, &literals, &Scope::empty(), &AssemblerSettings::default()).unwrap();
        assert_eq!(analysis.max_stack_size, 3);
        assert_eq!(analysis.call_sites, vec![6]);
    }

    #[test]
    fn send_without_symbol_literal_fails() {
        let symbols = SymbolTable::new();
        let mut mgenc = MethodGenerationContext::new(symbols.intern("run"), Scope::empty());
        mgenc.add_literal(Literal::Value(Value::Integer(1))).unwrap();
        let mut b = BytecodeBuilder::new();
        b.push_constant(0);
        b.send(0, 1);
        mgenc.set_bytecode(b.into_bytes());
        assert_eq!(
            mgenc.assemble(&AssemblerSettings::default()).err(),
            Some(AssemblyError::MissingSignature { pc: 2, literal: 0 })
        );
    }

    #[test]
    fn tier_one_rejects_tier_two_forms() {
        let symbols = SymbolTable::new();
        let mut mgenc = MethodGenerationContext::new(symbols.intern("run"), Scope::empty());
        let mut b = BytecodeBuilder::for_tier(Tier::Two);
        b.push_nil();
        b.return_local();
        mgenc.set_bytecode(b.into_bytes());
        assert_eq!(
            mgenc.assemble(&AssemblerSettings::default()).err(),
            Some(AssemblyError::UnsupportedInTier { op: Op::PushNil, tier: Tier::One, pc: 0 })
        );
    }

    #[test]
    fn malformed_and_underflowing_streams_fail() {
        let scope = Scope::empty();
        let settings = AssemblerSettings::default();
        assert_eq!(
            analyze(&mut [0xee], &[], &scope, &settings),
            Err(AssemblyError::MalformedBytecode { pc: 0, byte: 0xee })
        );
        assert_eq!(
            analyze(&mut [Op::Pop as u8], &[], &scope, &settings),
            Err(AssemblyError::StackUnderflow { pc: 0 })
        );
        assert_eq!(
            analyze(&mut [Op::PushConstant as u8], &[], &scope, &settings),
            Err(AssemblyError::TruncatedInstruction { pc: 0, op: Op::PushConstant })
        );
    }

    #[test]
    fn paths_must_meet_at_the_same_depth() {
        let settings = AssemblerSettings::tier(Tier::Two);
        // The taken edge drops both operands, the fall-through only one.
        let mut b = BytecodeBuilder::for_tier(Tier::Two);
        b.push_0();
        b.push_1();
        let exit = b.jump(JumpCondition::IfGreater);
        b.pop();
        b.bind(exit);
        b.pop();
        b.push_nil();
        b.return_local();
        assert_eq!(
            analyze(&mut b.into_bytes(), &[], &Scope::empty(), &settings),
            Err(AssemblyError::InconsistentStackDepth { pc: 6, expected: 0, found: 1 })
        );

        // A loop whose body leaves one extra value behind.
        let mut b = BytecodeBuilder::for_tier(Tier::Two);
        let head = b.current_offset();
        b.push_1();
        b.jump_backward(head);
        assert_eq!(
            analyze(&mut b.into_bytes(), &[], &Scope::empty(), &settings),
            Err(AssemblyError::InconsistentStackDepth { pc: 0, expected: 0, found: 1 })
        );
    }

    #[test]
    fn taken_edges_count_toward_underflow_and_targets() {
        let settings = AssemblerSettings::tier(Tier::Two);
        // Only one operand for a comparison that pops two when taken.
        let mut b = BytecodeBuilder::for_tier(Tier::Two);
        b.push_1();
        let exit = b.jump(JumpCondition::IfGreater);
        b.bind(exit);
        b.return_local();
        assert_eq!(
            analyze(&mut b.into_bytes(), &[], &Scope::empty(), &settings),
            Err(AssemblyError::StackUnderflow { pc: 1 })
        );

        // Lands on the operand byte of the push_constant.
        let mut bytes = vec![Op::Jump as u8, 4, 0, Op::PushConstant as u8, 0, Op::ReturnLocal as u8];
        assert_eq!(
            analyze(&mut bytes, &[Literal::Value(Value::Nil)], &Scope::empty(), &settings),
            Err(AssemblyError::InvalidJumpTarget { pc: 0 })
        );
        let mut bytes = vec![Op::Push1 as u8, Op::JumpBackward as u8, 5, 0];
        assert_eq!(
            analyze(&mut bytes, &[], &Scope::empty(), &settings),
            Err(AssemblyError::InvalidJumpTarget { pc: 1 })
        );
    }

    #[test]
    fn code_after_a_jump_starts_at_the_jump_depth() {
        // flag ifTrue: [1] ifFalse: [2]
        let mut b = BytecodeBuilder::for_tier(Tier::Two);
        b.push_argument(1, 0);
        let otherwise = b.jump(JumpCondition::OnFalsePop);
        b.push_1();
        let done = b.jump(JumpCondition::Always);
        b.bind(otherwise);
        b.push_constant(0);
        b.bind(done);
        b.return_local();
        let scope = Scope::new(vec![Variable::new("flag")], Vec::new(), None);
        let literals = [Literal::Value(Value::Integer(2))];
        let analysis =
            analyze(&mut b.into_bytes(), &literals, &scope, &AssemblerSettings::tier(Tier::Two))
                .unwrap();
        assert_eq!(analysis.max_stack_size, 1);
    }

    #[test]
    fn placeholders_are_resolved_or_deferred() {
        let symbols = SymbolTable::new();
        let scope = Scope::new(vec![Variable::new("a")], vec![Variable::captured("t")], None);
        let mut b = BytecodeBuilder::new();
        b.push_argument(1, 0);
        b.pop_local(0, 0);
        b.push_local(0, 0);
        b.return_local();
        let bytes = b.into_bytes();

        let mut mgenc = MethodGenerationContext::new(symbols.intern("run:"), scope.clone());
        mgenc.set_bytecode(bytes.clone());
        let method = mgenc.assemble(&AssemblerSettings::default()).unwrap().into_method().unwrap();
        assert_eq!(method.bytecodes(), vec![
            Op::PushFrame as u8, 1, 0,
            Op::PopInner as u8, 1, 0,
            Op::PushInner as u8, 1, 0,
            Op::ReturnLocal as u8,
        ]);

        let mut mgenc = MethodGenerationContext::new(symbols.intern("run:"), scope);
        mgenc.set_bytecode(bytes.clone());
        let settings = AssemblerSettings { resolve_variables: false, ..Default::default() };
        let method = mgenc.assemble(&settings).unwrap().into_method().unwrap();
        assert_eq!(method.bytecodes(), bytes);
        method.patch_variable_access(0).unwrap();
        assert_eq!(method.bytecodes()[..3], [Op::PushFrame as u8, 1, 0]);
    }

    #[test]
    fn unresolvable_placeholder_fails_assembly() {
        let symbols = SymbolTable::new();
        let mut b = BytecodeBuilder::new();
        b.push_local(3, 0);
        b.return_local();
        let mut mgenc = MethodGenerationContext::new(symbols.intern("run"), Scope::empty());
        mgenc.set_bytecode(b.into_bytes());
        assert_eq!(
            mgenc.assemble(&AssemblerSettings::default()).err(),
            Some(AssemblyError::UnresolvedVariable { index: 3, level: 0, argument: false })
        );
    }

    #[test]
    fn primitive_contexts_produce_markers() {
        let symbols = SymbolTable::new();
        let mut mgenc = MethodGenerationContext::new(symbols.intern("foo"), Scope::empty());
        mgenc.set_primitive();
        match mgenc.assemble(&AssemblerSettings::default()).unwrap() {
            Assembled::Primitive(p) => {
                assert_eq!(p.signature(), &symbols.intern("foo"));
                assert!(p.is_empty());
            }
            Assembled::Method(_) => panic!("expected a primitive marker"),
        }
    }

    #[test]
    fn analyzer_agrees_with_replay() {
        let symbols = SymbolTable::new();
        let selectors = ["negated", "+", "at:put:", "a:b:c:"];
        let literals: Vec<Literal> = std::iter::once(Literal::Value(Value::Integer(1)))
            .chain(selectors.iter().map(|s| Literal::symbol(symbols.intern(s))))
            .collect();

        // Deterministic mix of pushes, pops and sends that never underflows.
        let mut seed: u32 = 0x2545_f491;
        for _ in 0..200 {
            let mut b = BytecodeBuilder::for_tier(Tier::Two);
            let mut depth = 0usize;
            for _ in 0..40 {
                seed ^= seed << 13;
                seed ^= seed >> 17;
                seed ^= seed << 5;
                match seed % 5 {
                    0 | 1 => {
                        b.push_constant(0);
                        depth += 1;
                    }
                    2 if depth > 1 => {
                        b.pop();
                        depth -= 1;
                    }
                    3 => {
                        b.dup();
                        depth += 1;
                    }
                    _ => {
                        let sel = (seed >> 8) as usize % selectors.len();
                        let arity = symbols.intern(selectors[sel]).arity() as usize;
                        if depth >= arity {
                            b.send(sel as u8 + 1, arity as u8);
                            depth = depth + 1 - arity;
                        }
                    }
                }
            }
            b.return_local();
            let mut bytes = b.into_bytes();
            let expected = simulate_max_depth(&bytes, &literals).expect("never underflows");
            let analysis = analyze(
                &mut bytes,
                &literals,
                &Scope::empty(),
                &AssemblerSettings::tier(Tier::Two),
            )
            .unwrap();
            assert_eq!(analysis.max_stack_size, expected);
        }
    }
}
