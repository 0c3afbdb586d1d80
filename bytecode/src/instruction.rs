use core::fmt;

/// Operand count class of a send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendArity {
    One,
    Two,
    Three,
    N,
}

impl SendArity {
    /// Number of stack entries (receiver included) for the fixed forms.
    pub const fn fixed(self) -> Option<usize> {
        match self {
            SendArity::One => Some(1),
            SendArity::Two => Some(2),
            SendArity::Three => Some(3),
            SendArity::N => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpCondition {
    Always,
    OnTrueTopNil,
    OnFalseTopNil,
    OnTruePop,
    OnFalsePop,
    IfGreater,
}

/// A decoded instruction.
///
/// Specialized short forms decode to the general instruction they abbreviate,
/// so `push_constant_1` and `push_constant 1` both become
/// `PushConstant { literal: 1 }`. Short and long jumps decode alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Halt,
    Dup,
    DupSecond,

    PushFrame { idx: u8 },
    PushInner { idx: u8, level: u8 },
    PushField { idx: u8, level: u8 },
    PushBlock { literal: u8 },
    PushBlockNoContext { literal: u8 },
    PushConstant { literal: u8 },
    PushInteger { value: u8 },
    PushNil,
    PushGlobal { literal: u8 },

    Pop,
    PopFrame { idx: u8 },
    PopInner { idx: u8, level: u8 },
    NilFrame { idx: u8 },
    NilInner { idx: u8 },
    PopField { idx: u8, level: u8 },

    Send { literal: u8, arity: SendArity },
    SuperSend { literal: u8 },
    QuickSuperSend { literal: u8, arity: SendArity },

    ReturnLocal,
    ReturnNonLocal { level: u8 },
    ReturnSelf,

    Inc,
    Dec,

    Jump { condition: JumpCondition, offset: u16 },
    JumpBackward { offset: u16 },

    PushLocal { idx: u8, level: u8 },
    PushArgument { idx: u8, level: u8 },
    PopLocal { idx: u8, level: u8 },
    PopArgument { idx: u8, level: u8 },
    NilLocal { idx: u8 },
}

impl Instruction {
    pub const fn is_placeholder(&self) -> bool {
        matches!(
            self,
            Instruction::PushLocal { .. }
                | Instruction::PushArgument { .. }
                | Instruction::PopLocal { .. }
                | Instruction::PopArgument { .. }
                | Instruction::NilLocal { .. }
        )
    }
}

impl fmt::Display for JumpCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JumpCondition::Always => "always",
            JumpCondition::OnTrueTopNil => "on_true_top_nil",
            JumpCondition::OnFalseTopNil => "on_false_top_nil",
            JumpCondition::OnTruePop => "on_true_pop",
            JumpCondition::OnFalsePop => "on_false_pop",
            JumpCondition::IfGreater => "if_greater",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Halt => write!(f, "Halt"),
            Instruction::Dup => write!(f, "Dup"),
            Instruction::DupSecond => write!(f, "DupSecond"),
            Instruction::PushFrame { idx } => write!(f, "PushFrame {idx}"),
            Instruction::PushInner { idx, level } => write!(f, "PushInner {idx} @{level}"),
            Instruction::PushField { idx, level } => write!(f, "PushField {idx} @{level}"),
            Instruction::PushBlock { literal } => write!(f, "PushBlock L{literal}"),
            Instruction::PushBlockNoContext { literal } => {
                write!(f, "PushBlockNoContext L{literal}")
            }
            Instruction::PushConstant { literal } => write!(f, "PushConstant L{literal}"),
            Instruction::PushInteger { value } => write!(f, "PushInteger {value}"),
            Instruction::PushNil => write!(f, "PushNil"),
            Instruction::PushGlobal { literal } => write!(f, "PushGlobal L{literal}"),
            Instruction::Pop => write!(f, "Pop"),
            Instruction::PopFrame { idx } => write!(f, "PopFrame {idx}"),
            Instruction::PopInner { idx, level } => write!(f, "PopInner {idx} @{level}"),
            Instruction::NilFrame { idx } => write!(f, "NilFrame {idx}"),
            Instruction::NilInner { idx } => write!(f, "NilInner {idx}"),
            Instruction::PopField { idx, level } => write!(f, "PopField {idx} @{level}"),
            Instruction::Send { literal, arity } => write!(f, "Send{arity:?} L{literal}"),
            Instruction::SuperSend { literal } => write!(f, "SuperSend L{literal}"),
            Instruction::QuickSuperSend { literal, arity } => {
                write!(f, "QuickSuperSend{arity:?} L{literal}")
            }
            Instruction::ReturnLocal => write!(f, "ReturnLocal"),
            Instruction::ReturnNonLocal { level } => write!(f, "ReturnNonLocal @{level}"),
            Instruction::ReturnSelf => write!(f, "ReturnSelf"),
            Instruction::Inc => write!(f, "Inc"),
            Instruction::Dec => write!(f, "Dec"),
            Instruction::Jump { condition, offset } => write!(f, "Jump {condition} +{offset}"),
            Instruction::JumpBackward { offset } => write!(f, "JumpBackward -{offset}"),
            Instruction::PushLocal { idx, level } => write!(f, "PushLocal {idx} @{level}"),
            Instruction::PushArgument { idx, level } => {
                write!(f, "PushArgument {idx} @{level}")
            }
            Instruction::PopLocal { idx, level } => write!(f, "PopLocal {idx} @{level}"),
            Instruction::PopArgument { idx, level } => write!(f, "PopArgument {idx} @{level}"),
            Instruction::NilLocal { idx } => write!(f, "NilLocal {idx}"),
        }
    }
}
