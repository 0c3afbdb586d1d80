use core::fmt;

use crate::instruction::{Instruction, JumpCondition, SendArity};
use crate::op::Op;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    UnknownOpcode { byte: u8 },
    Truncated { op: Op },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::UnknownOpcode { byte } => write!(f, "unknown opcode 0x{byte:02x}"),
            DecodeError::Truncated { op } => write!(f, "truncated {}", op.name()),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Decodes the instruction starting at `bytes[0]`, returning it together with
/// its encoded length.
pub fn decode(bytes: &[u8]) -> Result<(Instruction, usize), DecodeError> {
    let Some(&byte) = bytes.first() else {
        return Err(DecodeError::UnknownOpcode { byte: 0 });
    };
    let op = Op::try_from(byte).map_err(|byte| DecodeError::UnknownOpcode { byte })?;
    let len = op.length();
    if bytes.len() < len {
        return Err(DecodeError::Truncated { op });
    }
    let b1 = bytes.get(1).copied().unwrap_or(0);
    let b2 = bytes.get(2).copied().unwrap_or(0);
    let short = b1 as u16;
    let long = u16::from_le_bytes([b1, b2]);

    let instruction = match op {
        Op::Halt => Instruction::Halt,
        Op::Dup => Instruction::Dup,
        Op::DupSecond => Instruction::DupSecond,

        Op::PushFrame => Instruction::PushFrame { idx: b1 },
        Op::PushFrame0 => Instruction::PushFrame { idx: 0 },
        Op::PushFrame1 => Instruction::PushFrame { idx: 1 },
        Op::PushFrame2 => Instruction::PushFrame { idx: 2 },
        Op::PushInner => Instruction::PushInner { idx: b1, level: b2 },
        Op::PushInner0 => Instruction::PushInner { idx: 0, level: 0 },
        Op::PushInner1 => Instruction::PushInner { idx: 1, level: 0 },
        Op::PushInner2 => Instruction::PushInner { idx: 2, level: 0 },
        Op::PushField => Instruction::PushField { idx: b1, level: b2 },
        Op::PushField0 => Instruction::PushField { idx: 0, level: 0 },
        Op::PushField1 => Instruction::PushField { idx: 1, level: 0 },

        Op::PushBlock => Instruction::PushBlock { literal: b1 },
        Op::PushBlockNoContext => Instruction::PushBlockNoContext { literal: b1 },
        Op::PushConstant => Instruction::PushConstant { literal: b1 },
        Op::PushConstant0 => Instruction::PushConstant { literal: 0 },
        Op::PushConstant1 => Instruction::PushConstant { literal: 1 },
        Op::PushConstant2 => Instruction::PushConstant { literal: 2 },
        Op::Push0 => Instruction::PushInteger { value: 0 },
        Op::Push1 => Instruction::PushInteger { value: 1 },
        Op::PushNil => Instruction::PushNil,
        Op::PushGlobal => Instruction::PushGlobal { literal: b1 },

        Op::Pop => Instruction::Pop,
        Op::PopFrame => Instruction::PopFrame { idx: b1 },
        Op::PopFrame0 => Instruction::PopFrame { idx: 0 },
        Op::PopFrame1 => Instruction::PopFrame { idx: 1 },
        Op::PopFrame2 => Instruction::PopFrame { idx: 2 },
        Op::PopInner => Instruction::PopInner { idx: b1, level: b2 },
        Op::PopInner0 => Instruction::PopInner { idx: 0, level: 0 },
        Op::PopInner1 => Instruction::PopInner { idx: 1, level: 0 },
        Op::PopInner2 => Instruction::PopInner { idx: 2, level: 0 },
        Op::NilFrame => Instruction::NilFrame { idx: b1 },
        Op::NilInner => Instruction::NilInner { idx: b1 },
        Op::PopField => Instruction::PopField { idx: b1, level: b2 },
        Op::PopField0 => Instruction::PopField { idx: 0, level: 0 },
        Op::PopField1 => Instruction::PopField { idx: 1, level: 0 },

        Op::Send1 => Instruction::Send { literal: b1, arity: SendArity::One },
        Op::Send2 => Instruction::Send { literal: b1, arity: SendArity::Two },
        Op::Send3 => Instruction::Send { literal: b1, arity: SendArity::Three },
        Op::SendN => Instruction::Send { literal: b1, arity: SendArity::N },
        Op::SuperSend => Instruction::SuperSend { literal: b1 },
        Op::QSuperSend1 => Instruction::QuickSuperSend { literal: b1, arity: SendArity::One },
        Op::QSuperSend2 => Instruction::QuickSuperSend { literal: b1, arity: SendArity::Two },
        Op::QSuperSend3 => Instruction::QuickSuperSend { literal: b1, arity: SendArity::Three },
        Op::QSuperSendN => Instruction::QuickSuperSend { literal: b1, arity: SendArity::N },

        Op::ReturnLocal => Instruction::ReturnLocal,
        Op::ReturnNonLocal => Instruction::ReturnNonLocal { level: b1 },
        Op::ReturnSelf => Instruction::ReturnSelf,
        Op::Inc => Instruction::Inc,
        Op::Dec => Instruction::Dec,

        Op::Jump => jump(JumpCondition::Always, short),
        Op::JumpOnTrueTopNil => jump(JumpCondition::OnTrueTopNil, short),
        Op::JumpOnFalseTopNil => jump(JumpCondition::OnFalseTopNil, short),
        Op::JumpOnTruePop => jump(JumpCondition::OnTruePop, short),
        Op::JumpOnFalsePop => jump(JumpCondition::OnFalsePop, short),
        Op::JumpIfGreater => jump(JumpCondition::IfGreater, short),
        Op::JumpBackward => Instruction::JumpBackward { offset: short },
        Op::Jump2 => jump(JumpCondition::Always, long),
        Op::Jump2OnTrueTopNil => jump(JumpCondition::OnTrueTopNil, long),
        Op::Jump2OnFalseTopNil => jump(JumpCondition::OnFalseTopNil, long),
        Op::Jump2OnTruePop => jump(JumpCondition::OnTruePop, long),
        Op::Jump2OnFalsePop => jump(JumpCondition::OnFalsePop, long),
        Op::Jump2IfGreater => jump(JumpCondition::IfGreater, long),
        Op::Jump2Backward => Instruction::JumpBackward { offset: long },

        Op::PushLocal => Instruction::PushLocal { idx: b1, level: b2 },
        Op::PushArgument => Instruction::PushArgument { idx: b1, level: b2 },
        Op::PopLocal => Instruction::PopLocal { idx: b1, level: b2 },
        Op::PopArgument => Instruction::PopArgument { idx: b1, level: b2 },
        Op::NilLocal => Instruction::NilLocal { idx: b1 },
    };
    Ok((instruction, len))
}

fn jump(condition: JumpCondition, offset: u16) -> Instruction {
    Instruction::Jump { condition, offset }
}

/// Walks a bytecode stream instruction by instruction.
///
/// Yields `(pc, instruction)` pairs. After the first decode error the
/// iterator yields that error once and then stops.
pub struct BytecodeDecoder<'a> {
    bytes: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> BytecodeDecoder<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0, failed: false }
    }

    /// Current byte offset in the stream.
    #[inline(always)]
    pub fn offset(&self) -> usize {
        self.pos
    }

    #[inline(always)]
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }
}

impl Iterator for BytecodeDecoder<'_> {
    type Item = Result<(usize, Instruction), DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.is_at_end() {
            return None;
        }
        let pc = self.pos;
        match decode(&self.bytes[pc..]) {
            Ok((instruction, len)) => {
                self.pos += len;
                Some(Ok((pc, instruction)))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
