/// Execution tier a method is assembled for.
///
/// Tier 1 is the minimal, portable subset. Tier 2 adds control-flow jumps and
/// specialized short forms for the most common operand values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Tier {
    #[default]
    One,
    Two,
}

/// Static stack effect of an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackEffect {
    Fixed(i8),
    /// `1 - arity` of the signature named by the literal operand.
    Send,
}

impl StackEffect {
    /// Resolves the effect given the arity of the send's signature.
    pub const fn resolve(self, arity: u8) -> i32 {
        match self {
            StackEffect::Fixed(n) => n as i32,
            StackEffect::Send => 1 - arity as i32,
        }
    }
}

/// Bytecode opcodes.
///
/// Every instruction is one opcode byte followed by zero, one or two operand
/// bytes. Variable accesses carry `idx level`, literal operands are a single
/// byte, jumps carry an offset relative to the jump's own index (one byte for
/// the short forms, a little-endian `u16` for the `Jump2*` forms).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Op {
    Halt = 0x00,

    /// Duplicate the top of stack.
    Dup,
    /// Push a copy of the element below the top.
    DupSecond,

    /// Push a frame slot. Operands: `idx:u8`, `level:u8` (always 0).
    PushFrame,
    PushFrame0,
    PushFrame1,
    PushFrame2,

    /// Push from a context's captured storage. Operands: `idx:u8`, `level:u8`.
    PushInner,
    PushInner0,
    PushInner1,
    PushInner2,

    /// Push a field of the receiver at `level`. Operands: `idx:u8`, `level:u8`.
    PushField,
    PushField0,
    PushField1,

    /// Push a new block closing over the current context. Operands: `lit:u8`.
    PushBlock,
    /// Push a new block without a context. Operands: `lit:u8`.
    PushBlockNoContext,

    /// Operands: `lit:u8`.
    PushConstant,
    PushConstant0,
    PushConstant1,
    PushConstant2,
    Push0,
    Push1,
    PushNil,
    /// Push the global named by a literal symbol. Operands: `lit:u8`.
    PushGlobal,

    Pop,
    /// Pop into a frame slot. Operands: `idx:u8`, `level:u8` (always 0).
    PopFrame,
    PopFrame0,
    PopFrame1,
    PopFrame2,
    /// Pop into a context's captured storage. Operands: `idx:u8`, `level:u8`.
    PopInner,
    PopInner0,
    PopInner1,
    PopInner2,

    /// Reset a frame slot to nil. Operands: `idx:u8`.
    NilFrame,
    /// Reset a captured slot of the current context to nil. Operands: `idx:u8`.
    NilInner,

    /// Pop into a field of the receiver at `level`. Operands: `idx:u8`, `level:u8`.
    PopField,
    PopField0,
    PopField1,

    /// Sends. Operands: `lit:u8` naming the selector.
    Send1,
    Send2,
    Send3,
    SendN,
    SuperSend,

    ReturnLocal,
    /// Operands: `level:u8`.
    ReturnNonLocal,
    ReturnSelf,

    Inc,
    Dec,

    /// Short jumps. Operands: `offset:u8`, one unused byte.
    Jump,
    JumpOnTrueTopNil,
    JumpOnFalseTopNil,
    JumpOnTruePop,
    JumpOnFalsePop,
    JumpIfGreater,
    JumpBackward,

    /// Long jumps. Operands: `offset:u16` (little-endian).
    Jump2,
    Jump2OnTrueTopNil,
    Jump2OnFalseTopNil,
    Jump2OnTruePop,
    Jump2OnFalsePop,
    Jump2IfGreater,
    Jump2Backward,

    /// Super sends whose target was resolved once and cached in the call
    /// site. Operands: `lit:u8`.
    QSuperSend1,
    QSuperSend2,
    QSuperSend3,
    QSuperSendN,

    /// Compiler-only placeholders, resolved at assembly or on first execution.
    /// Operands: `idx:u8`, `level:u8`.
    PushLocal,
    PushArgument,
    PopLocal,
    PopArgument,
    /// Operands: `idx:u8`.
    NilLocal,
}

impl Op {
    pub const COUNT: usize = Op::NilLocal as usize + 1;

    /// Number of bytes the instruction occupies, opcode included.
    pub const fn length(self) -> usize {
        use Op::*;
        match self {
            Halt | Dup | DupSecond => 1,
            PushFrame | PushInner | PushField => 3,
            PushFrame0 | PushFrame1 | PushFrame2 => 1,
            PushInner0 | PushInner1 | PushInner2 => 1,
            PushField0 | PushField1 => 1,
            PushBlock | PushBlockNoContext => 2,
            PushConstant => 2,
            PushConstant0 | PushConstant1 | PushConstant2 => 1,
            Push0 | Push1 | PushNil => 1,
            PushGlobal => 2,
            Pop => 1,
            PopFrame | PopInner | PopField => 3,
            PopFrame0 | PopFrame1 | PopFrame2 => 1,
            PopInner0 | PopInner1 | PopInner2 => 1,
            PopField0 | PopField1 => 1,
            NilFrame | NilInner => 2,
            Send1 | Send2 | Send3 | SendN | SuperSend => 2,
            QSuperSend1 | QSuperSend2 | QSuperSend3 | QSuperSendN => 2,
            ReturnLocal | ReturnSelf => 1,
            ReturnNonLocal => 2,
            Inc | Dec => 1,
            Jump | JumpOnTrueTopNil | JumpOnFalseTopNil | JumpOnTruePop | JumpOnFalsePop
            | JumpIfGreater | JumpBackward => 3,
            Jump2 | Jump2OnTrueTopNil | Jump2OnFalseTopNil | Jump2OnTruePop | Jump2OnFalsePop
            | Jump2IfGreater | Jump2Backward => 3,
            PushLocal | PushArgument | PopLocal | PopArgument => 3,
            NilLocal => 2,
        }
    }

    pub const fn stack_effect(self) -> StackEffect {
        use Op::*;
        match self {
            Halt | ReturnLocal | ReturnSelf | ReturnNonLocal | Inc | Dec => StackEffect::Fixed(0),
            NilFrame | NilInner | NilLocal => StackEffect::Fixed(0),
            Dup | DupSecond => StackEffect::Fixed(1),
            PushFrame | PushFrame0 | PushFrame1 | PushFrame2 => StackEffect::Fixed(1),
            PushInner | PushInner0 | PushInner1 | PushInner2 => StackEffect::Fixed(1),
            PushField | PushField0 | PushField1 => StackEffect::Fixed(1),
            PushBlock | PushBlockNoContext => StackEffect::Fixed(1),
            PushConstant | PushConstant0 | PushConstant1 | PushConstant2 => StackEffect::Fixed(1),
            Push0 | Push1 | PushNil | PushGlobal => StackEffect::Fixed(1),
            PushLocal | PushArgument => StackEffect::Fixed(1),
            Pop => StackEffect::Fixed(-1),
            PopFrame | PopFrame0 | PopFrame1 | PopFrame2 => StackEffect::Fixed(-1),
            PopInner | PopInner0 | PopInner1 | PopInner2 => StackEffect::Fixed(-1),
            PopField | PopField0 | PopField1 => StackEffect::Fixed(-1),
            PopLocal | PopArgument => StackEffect::Fixed(-1),
            Send1 | Send2 | Send3 | SendN | SuperSend => StackEffect::Send,
            QSuperSend1 | QSuperSend2 | QSuperSend3 | QSuperSendN => StackEffect::Send,
            Jump | Jump2 | JumpBackward | Jump2Backward => StackEffect::Fixed(0),
            // The fall-through path keeps both operands.
            JumpIfGreater | Jump2IfGreater => StackEffect::Fixed(0),
            JumpOnTrueTopNil | JumpOnFalseTopNil | JumpOnTruePop | JumpOnFalsePop => {
                StackEffect::Fixed(-1)
            }
            Jump2OnTrueTopNil | Jump2OnFalseTopNil | Jump2OnTruePop | Jump2OnFalsePop => {
                StackEffect::Fixed(-1)
            }
        }
    }

    /// Placeholders emitted by the front end and resolved before execution.
    pub const fn is_compiler_only(self) -> bool {
        matches!(
            self,
            Op::PushLocal | Op::PushArgument | Op::PopLocal | Op::PopArgument | Op::NilLocal
        )
    }

    /// Whether the instruction owns an inline cache.
    pub const fn is_send(self) -> bool {
        matches!(
            self,
            Op::Send1
                | Op::Send2
                | Op::Send3
                | Op::SendN
                | Op::SuperSend
                | Op::QSuperSend1
                | Op::QSuperSend2
                | Op::QSuperSend3
                | Op::QSuperSendN
        )
    }

    pub const fn is_jump(self) -> bool {
        (self as u8) >= (Op::Jump as u8) && (self as u8) <= (Op::Jump2Backward as u8)
    }

    pub const fn is_long_jump(self) -> bool {
        (self as u8) >= (Op::Jump2 as u8) && (self as u8) <= (Op::Jump2Backward as u8)
    }

    /// The 16-bit counterpart of a short jump, or the jump itself.
    pub const fn widened(self) -> Op {
        use Op::*;
        match self {
            Jump => Jump2,
            JumpOnTrueTopNil => Jump2OnTrueTopNil,
            JumpOnFalseTopNil => Jump2OnFalseTopNil,
            JumpOnTruePop => Jump2OnTruePop,
            JumpOnFalsePop => Jump2OnFalsePop,
            JumpIfGreater => Jump2IfGreater,
            JumpBackward => Jump2Backward,
            other => other,
        }
    }

    pub const fn available_in(self, tier: Tier) -> bool {
        use Op::*;
        match tier {
            Tier::Two => true,
            Tier::One => matches!(
                self,
                Halt | Dup
                    | PushFrame
                    | PushInner
                    | PushField
                    | PushBlock
                    | PushConstant
                    | PushGlobal
                    | Pop
                    | PopFrame
                    | PopInner
                    | PopField
                    | Send1
                    | Send2
                    | Send3
                    | SendN
                    | SuperSend
                    | QSuperSend1
                    | QSuperSend2
                    | QSuperSend3
                    | QSuperSendN
                    | ReturnLocal
                    | ReturnNonLocal
                    | ReturnSelf
                    | Inc
                    | Dec
                    | PushLocal
                    | PushArgument
                    | PopLocal
                    | PopArgument
            ),
        }
    }

    /// The quickened super send for a signature of the given arity.
    pub const fn quick_super_send(arity: u8) -> Op {
        match arity {
            0 | 1 => Op::QSuperSend1,
            2 => Op::QSuperSend2,
            3 => Op::QSuperSend3,
            _ => Op::QSuperSendN,
        }
    }

    /// The plain send for a signature of the given arity.
    pub const fn send(arity: u8) -> Op {
        match arity {
            0 | 1 => Op::Send1,
            2 => Op::Send2,
            3 => Op::Send3,
            _ => Op::SendN,
        }
    }

    pub const fn name(self) -> &'static str {
        use Op::*;
        match self {
            Halt => "halt",
            Dup => "dup",
            DupSecond => "dup_second",
            PushFrame => "push_frame",
            PushFrame0 => "push_frame_0",
            PushFrame1 => "push_frame_1",
            PushFrame2 => "push_frame_2",
            PushInner => "push_inner",
            PushInner0 => "push_inner_0",
            PushInner1 => "push_inner_1",
            PushInner2 => "push_inner_2",
            PushField => "push_field",
            PushField0 => "push_field_0",
            PushField1 => "push_field_1",
            PushBlock => "push_block",
            PushBlockNoContext => "push_block_no_ctx",
            PushConstant => "push_constant",
            PushConstant0 => "push_constant_0",
            PushConstant1 => "push_constant_1",
            PushConstant2 => "push_constant_2",
            Push0 => "push_0",
            Push1 => "push_1",
            PushNil => "push_nil",
            PushGlobal => "push_global",
            Pop => "pop",
            PopFrame => "pop_frame",
            PopFrame0 => "pop_frame_0",
            PopFrame1 => "pop_frame_1",
            PopFrame2 => "pop_frame_2",
            PopInner => "pop_inner",
            PopInner0 => "pop_inner_0",
            PopInner1 => "pop_inner_1",
            PopInner2 => "pop_inner_2",
            NilFrame => "nil_frame",
            NilInner => "nil_inner",
            PopField => "pop_field",
            PopField0 => "pop_field_0",
            PopField1 => "pop_field_1",
            Send1 => "send_1",
            Send2 => "send_2",
            Send3 => "send_3",
            SendN => "send_n",
            SuperSend => "super_send",
            ReturnLocal => "return_local",
            ReturnNonLocal => "return_non_local",
            ReturnSelf => "return_self",
            Inc => "inc",
            Dec => "dec",
            Jump => "jump",
            JumpOnTrueTopNil => "jump_on_true_top_nil",
            JumpOnFalseTopNil => "jump_on_false_top_nil",
            JumpOnTruePop => "jump_on_true_pop",
            JumpOnFalsePop => "jump_on_false_pop",
            JumpIfGreater => "jump_if_greater",
            JumpBackward => "jump_backward",
            Jump2 => "jump2",
            Jump2OnTrueTopNil => "jump2_on_true_top_nil",
            Jump2OnFalseTopNil => "jump2_on_false_top_nil",
            Jump2OnTruePop => "jump2_on_true_pop",
            Jump2OnFalsePop => "jump2_on_false_pop",
            Jump2IfGreater => "jump2_if_greater",
            Jump2Backward => "jump2_backward",
            QSuperSend1 => "q_super_send_1",
            QSuperSend2 => "q_super_send_2",
            QSuperSend3 => "q_super_send_3",
            QSuperSendN => "q_super_send_n",
            PushLocal => "push_local",
            PushArgument => "push_argument",
            PopLocal => "pop_local",
            PopArgument => "pop_argument",
            NilLocal => "nil_local",
        }
    }
}

impl TryFrom<u8> for Op {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, u8> {
        if byte < Self::COUNT as u8 {
            // SAFETY: Op is repr(u8) with contiguous variants starting at 0.
            Ok(unsafe { core::mem::transmute::<u8, Op>(byte) })
        } else {
            Err(byte)
        }
    }
}
