use crate::instruction::JumpCondition;
use crate::op::{Op, Tier};

/// A forward jump whose offset has not yet been resolved.
///
/// Created by [`BytecodeBuilder::jump`]. Resolve it with
/// [`BytecodeBuilder::bind`].
#[derive(Debug)]
pub struct Label {
    /// Index of the jump opcode; offsets are relative to it.
    pc: usize,
    op: Op,
}

/// Builds a bytecode byte sequence.
///
/// A builder configured for [`Tier::Two`] picks the specialized short forms
/// (`push_constant_1`, `pop_frame_2`, `push_field_0`, ...) whenever the
/// operands allow it. Variable accesses are emitted as compiler-only
/// placeholders; the assembler resolves them to frame or context accesses.
pub struct BytecodeBuilder {
    buf: Vec<u8>,
    tier: Tier,
}

impl Default for BytecodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BytecodeBuilder {
    pub fn new() -> Self {
        Self::for_tier(Tier::One)
    }

    pub fn for_tier(tier: Tier) -> Self {
        Self { buf: Vec::new(), tier }
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// Current byte offset in the bytecode stream.
    pub fn current_offset(&self) -> usize {
        self.buf.len()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    fn specialize(&self) -> bool {
        self.tier == Tier::Two
    }

    fn emit_op(&mut self, op: Op) {
        self.buf.push(op as u8);
    }

    fn emit1(&mut self, op: Op, a: u8) {
        self.buf.extend_from_slice(&[op as u8, a]);
    }

    fn emit2(&mut self, op: Op, a: u8, b: u8) {
        self.buf.extend_from_slice(&[op as u8, a, b]);
    }

    pub fn halt(&mut self) {
        self.emit_op(Op::Halt);
    }

    pub fn dup(&mut self) {
        self.emit_op(Op::Dup);
    }

    pub fn dup_second(&mut self) {
        self.emit_op(Op::DupSecond);
    }

    // ── variable placeholders ─────────────────────────────────────

    /// Argument index 0 is the receiver.
    pub fn push_argument(&mut self, idx: u8, level: u8) {
        self.emit2(Op::PushArgument, idx, level);
    }

    pub fn push_local(&mut self, idx: u8, level: u8) {
        self.emit2(Op::PushLocal, idx, level);
    }

    pub fn pop_argument(&mut self, idx: u8, level: u8) {
        self.emit2(Op::PopArgument, idx, level);
    }

    pub fn pop_local(&mut self, idx: u8, level: u8) {
        self.emit2(Op::PopLocal, idx, level);
    }

    pub fn nil_local(&mut self, idx: u8) {
        self.emit1(Op::NilLocal, idx);
    }

    pub fn push_self(&mut self, level: u8) {
        self.push_argument(0, level);
    }

    // ── resolved variable accesses ────────────────────────────────

    pub fn push_frame(&mut self, idx: u8) {
        match (self.specialize(), idx) {
            (true, 0) => self.emit_op(Op::PushFrame0),
            (true, 1) => self.emit_op(Op::PushFrame1),
            (true, 2) => self.emit_op(Op::PushFrame2),
            _ => self.emit2(Op::PushFrame, idx, 0),
        }
    }

    pub fn push_inner(&mut self, idx: u8, level: u8) {
        match (self.specialize(), idx, level) {
            (true, 0, 0) => self.emit_op(Op::PushInner0),
            (true, 1, 0) => self.emit_op(Op::PushInner1),
            (true, 2, 0) => self.emit_op(Op::PushInner2),
            _ => self.emit2(Op::PushInner, idx, level),
        }
    }

    pub fn pop_frame(&mut self, idx: u8) {
        match (self.specialize(), idx) {
            (true, 0) => self.emit_op(Op::PopFrame0),
            (true, 1) => self.emit_op(Op::PopFrame1),
            (true, 2) => self.emit_op(Op::PopFrame2),
            _ => self.emit2(Op::PopFrame, idx, 0),
        }
    }

    pub fn pop_inner(&mut self, idx: u8, level: u8) {
        match (self.specialize(), idx, level) {
            (true, 0, 0) => self.emit_op(Op::PopInner0),
            (true, 1, 0) => self.emit_op(Op::PopInner1),
            (true, 2, 0) => self.emit_op(Op::PopInner2),
            _ => self.emit2(Op::PopInner, idx, level),
        }
    }

    pub fn push_field(&mut self, idx: u8, level: u8) {
        match (self.specialize(), idx, level) {
            (true, 0, 0) => self.emit_op(Op::PushField0),
            (true, 1, 0) => self.emit_op(Op::PushField1),
            _ => self.emit2(Op::PushField, idx, level),
        }
    }

    pub fn pop_field(&mut self, idx: u8, level: u8) {
        match (self.specialize(), idx, level) {
            (true, 0, 0) => self.emit_op(Op::PopField0),
            (true, 1, 0) => self.emit_op(Op::PopField1),
            _ => self.emit2(Op::PopField, idx, level),
        }
    }

    // ── literals and constants ────────────────────────────────────

    pub fn push_block(&mut self, literal: u8) {
        self.emit1(Op::PushBlock, literal);
    }

    pub fn push_block_no_context(&mut self, literal: u8) {
        self.emit1(Op::PushBlockNoContext, literal);
    }

    pub fn push_constant(&mut self, literal: u8) {
        match (self.specialize(), literal) {
            (true, 0) => self.emit_op(Op::PushConstant0),
            (true, 1) => self.emit_op(Op::PushConstant1),
            (true, 2) => self.emit_op(Op::PushConstant2),
            _ => self.emit1(Op::PushConstant, literal),
        }
    }

    pub fn push_0(&mut self) {
        self.emit_op(Op::Push0);
    }

    pub fn push_1(&mut self) {
        self.emit_op(Op::Push1);
    }

    pub fn push_nil(&mut self) {
        self.emit_op(Op::PushNil);
    }

    pub fn push_global(&mut self, literal: u8) {
        self.emit1(Op::PushGlobal, literal);
    }

    pub fn pop(&mut self) {
        self.emit_op(Op::Pop);
    }

    // ── sends and returns ─────────────────────────────────────────

    /// `arity` counts the receiver, matching the selector's signature.
    pub fn send(&mut self, literal: u8, arity: u8) {
        self.emit1(Op::send(arity), literal);
    }

    pub fn super_send(&mut self, literal: u8) {
        self.emit1(Op::SuperSend, literal);
    }

    pub fn return_local(&mut self) {
        self.emit_op(Op::ReturnLocal);
    }

    pub fn return_self(&mut self) {
        self.emit_op(Op::ReturnSelf);
    }

    pub fn return_non_local(&mut self, level: u8) {
        self.emit1(Op::ReturnNonLocal, level);
    }

    pub fn inc(&mut self) {
        self.emit_op(Op::Inc);
    }

    pub fn dec(&mut self) {
        self.emit_op(Op::Dec);
    }

    // ── control flow ──────────────────────────────────────────────

    /// Emit a forward jump with a placeholder offset.
    pub fn jump(&mut self, condition: JumpCondition) -> Label {
        let op = match condition {
            JumpCondition::Always => Op::Jump,
            JumpCondition::OnTrueTopNil => Op::JumpOnTrueTopNil,
            JumpCondition::OnFalseTopNil => Op::JumpOnFalseTopNil,
            JumpCondition::OnTruePop => Op::JumpOnTruePop,
            JumpCondition::OnFalsePop => Op::JumpOnFalsePop,
            JumpCondition::IfGreater => Op::JumpIfGreater,
        };
        let pc = self.current_offset();
        self.emit2(op, 0, 0);
        Label { pc, op }
    }

    /// Resolve a forward jump to the current offset. Offsets that do not fit
    /// a byte switch the jump to its 16-bit form, which has the same length.
    pub fn bind(&mut self, label: Label) {
        let offset = self.current_offset() - label.pc;
        self.patch_jump(label.pc, label.op, offset);
    }

    /// Emit a backward jump to `target`, an earlier offset.
    pub fn jump_backward(&mut self, target: usize) {
        let pc = self.current_offset();
        assert!(target <= pc, "backward jump target {target} is ahead of {pc}");
        self.emit2(Op::JumpBackward, 0, 0);
        self.patch_jump(pc, Op::JumpBackward, pc - target);
    }

    fn patch_jump(&mut self, pc: usize, op: Op, offset: usize) {
        assert!(offset <= u16::MAX as usize, "jump offset {offset} exceeds 16 bits");
        let (op, bytes) = if offset <= u8::MAX as usize {
            (op, [offset as u8, 0])
        } else {
            (op.widened(), (offset as u16).to_le_bytes())
        };
        self.buf[pc] = op as u8;
        self.buf[pc + 1] = bytes[0];
        self.buf[pc + 2] = bytes[1];
    }
}
